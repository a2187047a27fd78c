use super::ProjectScope;
use crate::error::ApiResult;
use crate::http::{encode_segment, HttpClient};
use crate::models::{FieldTemplate, FieldTemplateUpdate, NewFieldTemplate};

pub struct FieldTemplatesApi<'a> {
    http: &'a HttpClient,
}

impl<'a> FieldTemplatesApi<'a> {
    pub fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    pub async fn get_all(&self, project_id: Option<&str>) -> ApiResult<Vec<FieldTemplate>> {
        self.http
            .get_with_query("field-templates", &ProjectScope { project_id })
            .await
    }

    pub async fn get_by_id(&self, id: &str) -> ApiResult<FieldTemplate> {
        self.http
            .get(&format!("field-templates/{}", encode_segment(id)))
            .await
    }

    pub async fn create(&self, data: &NewFieldTemplate) -> ApiResult<FieldTemplate> {
        self.http.post("field-templates", data).await
    }

    pub async fn update(&self, id: &str, data: &FieldTemplateUpdate) -> ApiResult<FieldTemplate> {
        self.http
            .patch(&format!("field-templates/{}", encode_segment(id)), data)
            .await
    }

    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        self.http
            .delete::<serde_json::Value>(&format!("field-templates/{}", encode_segment(id)))
            .await
            .map(|_| ())
    }
}
