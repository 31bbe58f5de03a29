pub mod account;
pub mod circuit_breaker;
pub mod database;
pub mod health;
pub mod mailer;
pub mod redis;
