use std::sync::Arc;

use crate::config::ServerConfig;
use crate::notifications::AlertService;

#[derive(Clone)]
pub struct AppState {
    pub alerts: Arc<AlertService>,
    pub server_config: Option<ServerConfig>,
}

impl AppState {
    pub fn new(alerts: Arc<AlertService>, server_config: Option<ServerConfig>) -> Self {
        Self {
            alerts,
            server_config,
        }
    }
}
