pub mod auth;
pub mod client;
pub mod config;
pub mod constants;
pub mod database;
pub mod logging;
pub mod models;
pub mod server;
pub mod token;
pub mod utils;
