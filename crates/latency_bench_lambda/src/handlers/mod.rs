pub mod driver;
pub mod workload;
