pub mod cli;
pub mod core;
pub mod dataset;
pub mod query;
pub mod render;
pub mod utils;
pub mod web;

pub use web::start_web_server;
