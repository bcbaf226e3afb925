use clap::{Parser as ClapParser, ValueEnum};
use keiro::prelude::*;
use std::fs;
use std::sync::Arc;
use std::time::Instant;

/// Define a CLI-specific enum for clap to parse.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyCli {
    Sequential,
    Parallel,
}

/// Compile a rule flow and run a batch of records through it
#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the flow JSON document (or a compiled artifact with --compiled)
    flow_path: String,
    /// Path to the records JSON file (rows or columns)
    records_path: Option<String>,

    /// Treat `flow_path` as a compiled artifact produced by --save
    #[arg(long)]
    compiled: bool,

    /// Directory searched for sub-flows the document does not embed
    #[arg(long)]
    flows_dir: Option<String>,

    /// Runner configuration JSON file
    #[arg(short, long)]
    config: Option<String>,

    /// Scheduling strategy, overriding the config file
    #[arg(short, long, value_enum)]
    strategy: Option<StrategyCli>,

    /// Abort on the first failing record
    #[arg(long)]
    strict: bool,

    /// Batch deadline in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Save the compiled flow to this path
    #[arg(long)]
    save: Option<String>,

    /// Write results to this file instead of stdout
    #[arg(short, long)]
    output: Option<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    run(cli);
}

fn run(cli: Cli) {
    let total_start = Instant::now();

    // --- 1. Configuration ---
    let mut config = match &cli.config {
        Some(path) => RunnerConfig::from_file(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to load config: {}", e))),
        None => RunnerConfig::default(),
    };
    if let Some(strategy) = cli.strategy {
        config.strategy = match strategy {
            StrategyCli::Sequential => ExecutionStrategy::Sequential,
            StrategyCli::Parallel => ExecutionStrategy::Parallel,
        };
    }
    if cli.strict {
        config.error_policy = ErrorPolicy::Strict;
    }
    if cli.timeout_ms.is_some() {
        config.timeout_ms = cli.timeout_ms;
    }

    // --- 2. Compilation ---
    let compile_start = Instant::now();
    let runner = if cli.compiled {
        let artifact = CompiledFlow::from_file(&cli.flow_path).unwrap_or_else(|e| {
            exit_with_error(&format!("Failed to load compiled flow '{}': {}", cli.flow_path, e))
        });
        Runner::from_artifact(artifact)
    } else {
        let source = serde_json::Value::String(cli.flow_path.clone());
        let built = match &cli.flows_dir {
            Some(dir) => Runner::from_json_with_resolver(source, Arc::new(DirectoryResolver::new(dir))),
            None => Runner::from_json(source),
        };
        built.unwrap_or_else(|e| exit_with_error(&format!("Compilation failed: {}", e)))
    };
    let runner = Runner::with_config(Arc::clone(runner.graph()), config);
    let compile_duration = compile_start.elapsed();

    let graph = runner.graph();
    eprintln!(
        "Compiled '{}@{}': {} nodes, {} edges, {} direct sub-flows in {:?}",
        graph.id(),
        graph.version(),
        graph.nodes().len(),
        graph.edges().len(),
        graph.subflows().len(),
        compile_duration
    );

    if let Some(path) = &cli.save {
        CompiledFlow::new(graph.as_ref().clone())
            .save(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to save compiled flow: {}", e)));
        eprintln!("Saved compiled flow to {}", path);
    }

    let Some(records_path) = &cli.records_path else {
        eprintln!("No records file provided. Nothing to run.");
        return;
    };

    // --- 3. Records ---
    let load_start = Instant::now();
    let records = RecordBatch::from_file(records_path)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to load records: {}", e)));
    let load_duration = load_start.elapsed();

    // --- 4. Execution ---
    let exec_start = Instant::now();
    let results = runner
        .execute(&records)
        .unwrap_or_else(|e| exit_with_error(&format!("Execution failed: {}", e)));
    let exec_duration = exec_start.elapsed();

    let rendered = serde_json::to_string_pretty(&results.to_json())
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to render results: {}", e)));
    match &cli.output {
        Some(path) => fs::write(path, rendered)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to write '{}': {}", path, e))),
        None => println!("{}", rendered),
    }

    // --- 5. Summary ---
    eprintln!("\n--- Batch Summary ---");
    eprintln!("Records:              {}", records.len());
    eprintln!("Completed:            {}", results.completed());
    eprintln!("Failed:               {}", results.failures().len());
    eprintln!("\n--- Performance Summary ---");
    eprintln!("Compilation:          {:?}", compile_duration);
    eprintln!("Record Loading:       {:?}", load_duration);
    eprintln!("Execution:            {:?}", exec_duration);
    eprintln!("-----------------------------");
    eprintln!("Total:                {:?}", total_start.elapsed());
    eprintln!("Strategy:             {:?}", runner.config().strategy);
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
