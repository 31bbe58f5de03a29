pub mod catalog;
pub mod circuit_breaker;
pub mod error;
pub mod event;
pub mod health;
pub mod mail;
pub mod relay_config;
pub mod report;
pub mod retry;
pub mod status;
