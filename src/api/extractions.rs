use serde::Serialize;

use crate::error::ApiResult;
use crate::http::{encode_segment, HttpClient};
use crate::models::{CompleteExtraction, Extraction, ExtractionFilter, StartExtraction};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FailExtraction<'a> {
    error_message: &'a str,
}

pub struct ExtractionsApi<'a> {
    http: &'a HttpClient,
}

impl<'a> ExtractionsApi<'a> {
    pub fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    pub async fn get_all(&self, filter: &ExtractionFilter) -> ApiResult<Vec<Extraction>> {
        self.http.get_with_query("extractions", filter).await
    }

    pub async fn get_by_id(&self, id: &str) -> ApiResult<Extraction> {
        self.http
            .get(&format!("extractions/{}", encode_segment(id)))
            .await
    }

    pub async fn start(&self, data: &StartExtraction) -> ApiResult<Extraction> {
        self.http.post("extractions/start", data).await
    }

    pub async fn complete(&self, id: &str, data: &CompleteExtraction) -> ApiResult<Extraction> {
        self.http
            .post(&format!("extractions/{}/complete", encode_segment(id)), data)
            .await
    }

    pub async fn mark_failed(&self, id: &str, error_message: &str) -> ApiResult<Extraction> {
        self.http
            .patch(
                &format!("extractions/{}/fail", encode_segment(id)),
                &FailExtraction { error_message },
            )
            .await
    }
}
