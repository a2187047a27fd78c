use serde::Serialize;

use crate::http::HttpClient;

pub mod documents;
pub mod extractions;
pub mod field_templates;
pub mod health;
pub mod projects;
pub mod reviews;

pub use documents::DocumentsApi;
pub use extractions::ExtractionsApi;
pub use field_templates::FieldTemplatesApi;
pub use health::HealthApi;
pub use projects::ProjectsApi;
pub use reviews::ReviewsApi;

/// Entry point to the endpoint groups. Cheap to clone; every group borrows
/// the same configured [`HttpClient`].
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: HttpClient,
}

impl ApiClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn projects(&self) -> ProjectsApi<'_> {
        ProjectsApi::new(&self.http)
    }

    pub fn documents(&self) -> DocumentsApi<'_> {
        DocumentsApi::new(&self.http)
    }

    pub fn field_templates(&self) -> FieldTemplatesApi<'_> {
        FieldTemplatesApi::new(&self.http)
    }

    pub fn extractions(&self) -> ExtractionsApi<'_> {
        ExtractionsApi::new(&self.http)
    }

    pub fn reviews(&self) -> ReviewsApi<'_> {
        ReviewsApi::new(&self.http)
    }

    pub fn health(&self) -> HealthApi<'_> {
        HealthApi::new(&self.http)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProjectScope<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<&'a str>,
}
