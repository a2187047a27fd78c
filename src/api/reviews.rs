use crate::error::ApiResult;
use crate::http::{encode_segment, HttpClient};
use crate::models::{Review, ReviewFilter, ReviewUpdate, Statistics};

pub struct ReviewsApi<'a> {
    http: &'a HttpClient,
}

impl<'a> ReviewsApi<'a> {
    pub fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    pub async fn get_all(&self, filter: &ReviewFilter) -> ApiResult<Vec<Review>> {
        self.http.get_with_query("reviews", filter).await
    }

    pub async fn get_by_id(&self, id: &str) -> ApiResult<Review> {
        self.http
            .get(&format!("reviews/{}", encode_segment(id)))
            .await
    }

    pub async fn get_by_extracted_field(&self, extracted_field_id: &str) -> ApiResult<Review> {
        self.http
            .get(&format!(
                "reviews/extracted-field/{}",
                encode_segment(extracted_field_id)
            ))
            .await
    }

    pub async fn update(&self, id: &str, data: &ReviewUpdate) -> ApiResult<Review> {
        self.http
            .patch(&format!("reviews/{}", encode_segment(id)), data)
            .await
    }

    pub async fn get_statistics(&self, project_id: &str) -> ApiResult<Statistics> {
        self.http
            .get(&format!("reviews/statistics/{}", encode_segment(project_id)))
            .await
    }

    pub async fn get_progress(&self, project_id: &str) -> ApiResult<Statistics> {
        self.http
            .get(&format!("reviews/progress/{}", encode_segment(project_id)))
            .await
    }
}
