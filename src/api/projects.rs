use crate::error::ApiResult;
use crate::http::{encode_segment, HttpClient};
use crate::models::{NewProject, Project, ProjectUpdate, Statistics};

pub struct ProjectsApi<'a> {
    http: &'a HttpClient,
}

impl<'a> ProjectsApi<'a> {
    pub fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    pub async fn get_all(&self) -> ApiResult<Vec<Project>> {
        self.http.get("projects").await
    }

    pub async fn get_by_id(&self, id: &str) -> ApiResult<Project> {
        self.http
            .get(&format!("projects/{}", encode_segment(id)))
            .await
    }

    pub async fn get_statistics(&self, id: &str) -> ApiResult<Statistics> {
        self.http
            .get(&format!("projects/{}/statistics", encode_segment(id)))
            .await
    }

    pub async fn create(&self, data: &NewProject) -> ApiResult<Project> {
        self.http.post("projects", data).await
    }

    pub async fn update(&self, id: &str, data: &ProjectUpdate) -> ApiResult<Project> {
        self.http
            .patch(&format!("projects/{}", encode_segment(id)), data)
            .await
    }

    /// Child resources are removed by the server.
    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        self.http
            .delete::<serde_json::Value>(&format!("projects/{}", encode_segment(id)))
            .await
            .map(|_| ())
    }
}
