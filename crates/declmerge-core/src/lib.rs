pub mod config;
pub mod logging;
pub mod report;

pub use config::Settings;
pub use report::{generate_run_id, MergeReport};
