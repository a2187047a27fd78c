use crate::error::ApiResult;
use crate::http::HttpClient;
use crate::models::HealthStatus;

pub struct HealthApi<'a> {
    http: &'a HttpClient,
}

impl<'a> HealthApi<'a> {
    pub fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    pub async fn check(&self) -> ApiResult<HealthStatus> {
        self.http.get("health").await
    }
}
