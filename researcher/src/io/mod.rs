//! Side-effecting operations: filesystem, HTTP, and child processes.

pub mod config;
pub mod explorer;
pub mod images;
pub mod iteration_log;
pub mod missing_log;
pub mod oracle;
pub mod process;
pub mod prompt;
pub mod report;
pub mod subjects;
