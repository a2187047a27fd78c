use std::path::Path;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use tracing::info;
use url::Url;

use super::ProjectScope;
use crate::error::{ApiError, ApiResult};
use crate::http::{encode_segment, HttpClient};
use crate::models::{Document, NewDocument, UploadFile};

pub struct DocumentsApi<'a> {
    http: &'a HttpClient,
}

impl<'a> DocumentsApi<'a> {
    pub fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    pub async fn get_all(&self, project_id: Option<&str>) -> ApiResult<Vec<Document>> {
        self.http
            .get_with_query("documents", &ProjectScope { project_id })
            .await
    }

    pub async fn get_by_id(&self, id: &str) -> ApiResult<Document> {
        self.http
            .get(&format!("documents/{}", encode_segment(id)))
            .await
    }

    /// Sends `file` and `projectId` as `multipart/form-data`.
    pub async fn upload(&self, file: UploadFile, project_id: &str) -> ApiResult<Document> {
        let content_type = file.content_type.unwrap_or_else(|| {
            mime_guess::from_path(&file.file_name)
                .first_or_octet_stream()
                .to_string()
        });
        let part = Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&content_type)
            .map_err(ApiError::Network)?;
        let form = Form::new()
            .part("file", part)
            .text("projectId", project_id.to_string());
        self.http.post_multipart("documents/upload", form).await
    }

    pub async fn upload_path(&self, path: &Path, project_id: &str) -> ApiResult<Document> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        info!(file_name = %file_name, size = bytes.len(), project_id, "uploading document");
        self.upload(
            UploadFile {
                file_name,
                content_type: None,
                bytes,
            },
            project_id,
        )
        .await
    }

    pub async fn create(&self, data: &NewDocument) -> ApiResult<Document> {
        self.http.post("documents", data).await
    }

    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        self.http
            .delete::<serde_json::Value>(&format!("documents/{}", encode_segment(id)))
            .await
            .map(|_| ())
    }

    pub async fn download(&self, id: &str) -> ApiResult<Bytes> {
        self.http
            .get_bytes(&format!("documents/{}/download", encode_segment(id)))
            .await
    }

    /// Link handed to a browser or download tool.
    pub fn download_url(&self, id: &str) -> ApiResult<Url> {
        self.http
            .url(&format!("documents/{}/download", encode_segment(id)))
    }
}
