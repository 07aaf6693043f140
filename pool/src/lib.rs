pub mod api;
pub mod blockchain;
pub mod config;
pub mod metrics;
pub mod shares;
