pub mod cli_client;
pub mod config;
pub mod forms;
pub mod models;
pub mod render;
pub mod services;
pub mod session;
pub mod utils;
