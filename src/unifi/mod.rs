pub mod attribute;
pub mod commands;
pub mod device;
pub mod error;
pub mod polling;
pub mod queue;
pub mod session;
pub mod topic;
