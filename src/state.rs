use std::sync::Arc;

use tracing::info;

use crate::{
    api::ApiClient,
    cache::QueryClient,
    config::ClientConfig,
    error::ApiResult,
    http::HttpClient,
};

/// Everything a view needs: configuration, the endpoint groups and the
/// query cache. Built once per application instance and handed to views by
/// reference.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ClientConfig>,
    pub api: ApiClient,
    pub queries: QueryClient,
}

impl AppState {
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        let http = HttpClient::new(&config)?;
        let queries = QueryClient::new(config.stale_time, config.gc_time);
        info!(
            api_url = %config.redacted_api_url(),
            timeout_ms = config.timeout.as_millis() as u64,
            stale_time_ms = config.stale_time.as_millis() as u64,
            gc_time_ms = config.gc_time.as_millis() as u64,
            "initialised client state"
        );
        Ok(Self {
            config: Arc::new(config),
            api: ApiClient::new(http),
            queries,
        })
    }

    /// Aborts outstanding requests and drops every cached entry.
    pub async fn shutdown(&self) {
        self.queries.clear().await;
        info!("client state torn down");
    }
}
