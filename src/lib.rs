pub mod app;
pub mod backend;
pub mod cli;
pub mod config;
pub mod context;
pub mod models;
pub mod storage;

pub use cli::Command;
pub use config::{init_logger, load_configuration, resolve_path};
