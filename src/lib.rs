pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod scrape;
pub mod services;
pub mod session;
