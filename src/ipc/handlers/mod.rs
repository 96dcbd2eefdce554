pub mod attendance;
pub mod backup;
pub mod batches;
pub mod core;
pub mod reports;
