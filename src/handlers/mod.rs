//! Per-connection workers

pub mod client;
