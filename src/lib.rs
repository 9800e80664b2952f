pub mod app;
pub mod commands;
pub mod config;
pub mod core;
pub mod export;
pub mod models;
pub mod notifier;
pub mod plugins;
pub mod scheduler;
pub mod sources;
pub mod storage;
pub mod utils;
pub mod web;

// Re-export commonly used types
pub use app::App;
pub use commands::{Command, CommandResponse, CommandRouter};
pub use config::{AppConfig, ConfigStore, WatchConfig, WatchSettings};
pub use models::{Deal, DealStatus, Listing, NewDeal};
pub use scheduler::{CycleReport, DealScheduler, Trigger};
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
