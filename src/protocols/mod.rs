pub mod mqtt;
pub mod ssh;
