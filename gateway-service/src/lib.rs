pub mod config;
pub mod handlers;
pub mod models;
pub mod proxy;
pub mod services;
pub mod startup;
pub mod utils;

use crate::config::Settings;
use crate::services::{backend::BackendClient, token::ServiceTokenCache};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Shared application state: configuration, the backend client with its
/// token cache, and the Prometheus render handle.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub backend: Arc<BackendClient>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(settings: Settings, metrics: Option<PrometheusHandle>) -> Self {
        let http = reqwest::Client::new();
        let tokens = Arc::new(ServiceTokenCache::new(
            http.clone(),
            settings.backend.clone(),
        ));
        let backend = Arc::new(BackendClient::new(http, tokens));

        Self {
            settings: Arc::new(settings),
            backend,
            metrics,
        }
    }
}
