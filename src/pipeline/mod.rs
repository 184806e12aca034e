// Pipeline module - batch orchestration of a dataset build

pub mod driver;
pub mod report;

pub use driver::PipelineDriver;
pub use report::RunReport;
