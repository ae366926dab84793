pub mod api;
pub mod artifacts;
pub mod chain;
pub mod indexer;
pub mod metrics;
pub mod models;
pub mod session;
pub mod trace;
pub mod utils;
