pub mod api;
pub mod clients;
pub mod config;
pub mod dedup;
pub mod formatter;
pub mod models;
pub mod pipeline;
pub mod relay;
pub mod seen;
pub mod traits;
pub mod utils;
