// server/src/state.rs

use crate::config::ServerConfig;
use crate::registry::JobRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: JobRegistry,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            registry: JobRegistry::new(config.wait_range),
        }
    }
}
