use std::sync::Arc;

use tracing::debug;

use crate::config::AppConfig;
use crate::error::Result;
use crate::pricing::load_pricing;
use crate::services::AppServices;

/// Everything a front end needs, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: AppServices,
}

impl AppState {
    /// Loads pricing, migrates the store and wires up the services.
    pub fn open(config: AppConfig) -> Result<Self> {
        let pricing = Arc::new(load_pricing(config.pricing_path.as_deref())?);
        let config = Arc::new(config);
        let services = AppServices::open(config.clone(), pricing)?;
        debug!(db = %config.db_path.display(), "app state ready");
        Ok(Self { config, services })
    }
}
