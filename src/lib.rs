pub mod config;
pub mod database;
pub mod models;
pub mod services;
pub mod tasks;
pub mod utils;
