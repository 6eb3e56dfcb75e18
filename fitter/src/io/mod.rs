//! Side-effecting operations: document ownership, persistence, remote
//! services, child processes and run logs.

pub mod config;
pub mod document_owner;
pub mod document_store;
pub mod process;
pub mod run_log;
pub mod service;
pub mod snapshot;
