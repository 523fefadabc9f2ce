// Common library for shared code across the herald bot binary and tests

pub mod commands;
pub mod config;
pub mod errors;
pub mod models;
pub mod notify;
pub mod registry;
pub mod schedule;
pub mod scheduler;
pub mod storage;
pub mod transport;
