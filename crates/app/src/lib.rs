pub mod app;
pub mod config;
pub mod error;
pub mod pricing;
pub mod services;

pub use app::AppState;
pub use config::{AppConfig, ConfigLoad, default_config_path, load_or_create};
pub use error::{AppError, RefreshError, Result};
pub use pricing::{load_pricing, write_pricing};
pub use services::{AnalyticsService, AppServices, ImportService, RefreshService, SnapshotCache};
