pub mod args;
pub mod auth;
pub mod chart;
pub mod commands;
mod config;
pub mod dashboard;
mod error;
pub mod loader;
pub mod metrics;
pub mod model;
pub mod render;
pub mod server;
pub mod trend;
mod utils;


pub use config::Config;
pub use error::Error;
pub use error::Result;
