// Library root: re-exports all modules so integration tests and the binary
// share the same code.

pub mod app;
pub mod config;
pub mod console;
pub mod pipeline;
pub mod protocol;
pub mod report;
pub mod scheduler;
