use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;
use url::Url;

use super::table::{format_size, format_timestamp, Table};
use super::{
    error_banner, render_confirmation, render_query, require, Confirmation, View, ViewError,
    ViewResult,
};
use crate::cache::{keys, Mutation, QueryObserver, QueryState};
use crate::models::{Document, DocumentFormat, Project};
use crate::state::AppState;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadForm {
    pub project_id: String,
    pub file: Option<PathBuf>,
}

impl UploadForm {
    pub fn validate(&self) -> ViewResult<()> {
        require(&self.project_id, "project")?;
        let name = match &self.file {
            Some(path) if !path.as_os_str().is_empty() => path.to_string_lossy(),
            _ => return Err(ViewError::MissingField("file")),
        };
        DocumentFormat::from_file_name(&name)
            .map(|_| ())
            .ok_or_else(|| ViewError::UnsupportedFile(name.into_owned()))
    }
}

pub struct DocumentsView {
    state: AppState,
    project_filter: Option<String>,
    documents: QueryObserver<Vec<Document>>,
    projects: QueryObserver<Vec<Project>>,
    documents_state: QueryState<Vec<Document>>,
    projects_state: QueryState<Vec<Project>>,
    modal: Option<UploadForm>,
    upload: Mutation,
    delete: Mutation,
    confirmation: Option<Confirmation<String>>,
}

impl DocumentsView {
    pub async fn mount(state: &AppState, project_filter: Option<&str>) -> Self {
        let api = state.api.clone();
        let filter = project_filter.map(str::to_string);
        let documents = state
            .queries
            .observe(keys::documents(project_filter), move || {
                let api = api.clone();
                let filter = filter.clone();
                async move { api.documents().get_all(filter.as_deref()).await }
            })
            .await;

        let api = state.api.clone();
        let projects = state
            .queries
            .observe(keys::projects(), move || {
                let api = api.clone();
                async move { api.projects().get_all().await }
            })
            .await;

        // Uploads and deletes change the per-project document counts too.
        let invalidates = [keys::documents(None), keys::projects()];
        Self {
            state: state.clone(),
            project_filter: project_filter.map(str::to_string),
            documents_state: documents.state().await,
            projects_state: projects.state().await,
            documents,
            projects,
            modal: None,
            upload: Mutation::new(state.queries.clone(), invalidates.clone()),
            delete: Mutation::new(state.queries.clone(), invalidates),
            confirmation: None,
        }
    }

    pub fn documents(&self) -> Option<&[Document]> {
        self.documents_state.data.as_deref().map(Vec::as_slice)
    }

    pub fn query_state(&self) -> &QueryState<Vec<Document>> {
        &self.documents_state
    }

    pub async fn refresh(&mut self) {
        let _ = self.documents.refetch().await;
        self.documents_state = self.documents.state().await;
        self.projects_state = self.projects.state().await;
    }

    pub fn open_upload(&mut self) {
        self.upload.reset();
        self.modal = Some(UploadForm {
            project_id: self.project_filter.clone().unwrap_or_default(),
            file: None,
        });
    }

    pub fn form_mut(&mut self) -> Option<&mut UploadForm> {
        self.modal.as_mut()
    }

    pub fn form(&self) -> Option<&UploadForm> {
        self.modal.as_ref()
    }

    pub fn close_modal(&mut self) {
        self.modal = None;
    }

    pub fn upload_mutation(&self) -> &Mutation {
        &self.upload
    }

    pub async fn submit(&mut self) -> ViewResult<Document> {
        let form = self.modal.as_ref().ok_or(ViewError::NoOpenForm)?;
        form.validate()?;
        let project_id = form.project_id.trim().to_string();
        let path = form.file.clone().ok_or(ViewError::MissingField("file"))?;

        let api = self.state.api.clone();
        let document = self
            .upload
            .run(async move { api.documents().upload_path(&path, &project_id).await })
            .await?;
        info!(document_id = %document.id, file_name = %document.file_name, "document uploaded");
        self.modal = None;
        self.refresh().await;
        Ok(document)
    }

    pub fn download_url(&self, id: &str) -> ViewResult<Url> {
        Ok(self
            .state
            .api
            .documents()
            .download_url(id)
            .map_err(std::sync::Arc::new)?)
    }

    pub fn request_delete(&mut self, id: &str) {
        let name = self
            .documents()
            .and_then(|documents| documents.iter().find(|document| document.id == id))
            .map(|document| document.file_name.clone())
            .unwrap_or_else(|| id.to_string());
        self.confirmation = Some(Confirmation {
            prompt: format!("Delete document \"{name}\"?"),
            action: id.to_string(),
        });
    }

    pub fn confirmation(&self) -> Option<&Confirmation<String>> {
        self.confirmation.as_ref()
    }

    pub fn cancel_confirmation(&mut self) {
        self.confirmation = None;
    }

    pub async fn confirm(&mut self) -> ViewResult<()> {
        let pending = self
            .confirmation
            .take()
            .ok_or(ViewError::NothingToConfirm)?;
        let api = self.state.api.clone();
        let id = pending.action;
        self.delete
            .run(async move { api.documents().delete(&id).await })
            .await?;
        self.refresh().await;
        Ok(())
    }

    pub fn delete_mutation(&self) -> &Mutation {
        &self.delete
    }

    fn project_name(&self, project_id: &str) -> String {
        self.projects_state
            .data
            .as_deref()
            .and_then(|projects| projects.iter().find(|project| project.id == project_id))
            .map(|project| project.name.clone())
            .unwrap_or_else(|| project_id.to_string())
    }

    fn render_list(&self, documents: &[Document]) -> String {
        if documents.is_empty() {
            return "No documents uploaded yet.".to_string();
        }
        let mut table = Table::new(["ID", "File", "Project", "Format", "Size", "Uploaded"]);
        for document in documents {
            table.row([
                document.id.clone(),
                document.file_name.clone(),
                self.project_name(&document.project_id),
                document.format.to_string(),
                format_size(document.file_size),
                format_timestamp(&document.uploaded_at),
            ]);
        }
        table.render()
    }

    fn render_modal(&self, form: &UploadForm) -> String {
        let project = if form.project_id.is_empty() {
            String::new()
        } else {
            self.project_name(&form.project_id)
        };
        let mut lines = vec![
            "[Upload Document]".to_string(),
            format!("  Project*: {project}"),
            format!(
                "  File*:    {}",
                form.file
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_default()
            ),
        ];
        if self.upload.is_pending() {
            lines.push("  Uploading...".to_string());
        }
        if let Some(error) = self.upload.error() {
            lines.push(format!("  {}", error_banner(error)));
        }
        lines.join("\n")
    }
}

#[async_trait]
impl View for DocumentsView {
    fn title(&self) -> &'static str {
        "Documents"
    }

    async fn load(&mut self) {
        self.documents_state = self.documents.load().await;
        self.projects_state = self.projects.load().await;
    }

    fn render(&self) -> String {
        let mut sections = vec![
            self.title().to_string(),
            render_query(&self.documents_state, |documents| self.render_list(documents)),
        ];
        if let Some(error) = self.delete.error() {
            sections.push(error_banner(error));
        }
        if let Some(form) = &self.modal {
            sections.push(self.render_modal(form));
        }
        if let Some(prompt) = render_confirmation(&self.confirmation) {
            sections.push(prompt);
        }
        sections.join("\n\n")
    }
}
