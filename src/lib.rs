// Feature Bench - Library root for testing

pub mod app;
pub mod bench;
pub mod config;
pub mod decision;
pub mod error;
pub mod history;
pub mod http_client;
pub mod sink;
