use std::sync::Arc;

use reqwest::Client;

use super::config::Config;

pub struct AppState {
    pub config: Config,
    pub http: Client,
}

impl AppState {
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self {
            config,
            http: Client::new(),
        })
    }
}
