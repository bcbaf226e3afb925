//! Records going into a runner and results coming out of it.

mod record;
mod results;

pub use record::{Record, RecordBatch};
pub use results::{ResultBatch, ResultRecord};
