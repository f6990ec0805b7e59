pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod plugins;
pub mod utils;
pub mod wrapper;
