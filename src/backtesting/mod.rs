pub mod data_fetcher;
pub mod report;
pub mod runner;

pub use report::ReplayReport;
pub use runner::ReplayRunner;
