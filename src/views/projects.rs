use async_trait::async_trait;
use tracing::info;

use super::table::{format_timestamp, Table};
use super::{
    error_banner, optional_input, render_confirmation, render_query, require, Confirmation, View,
    ViewError, ViewResult,
};
use crate::cache::{keys, Mutation, QueryObserver, QueryState};
use crate::models::{NewProject, Project, ProjectStatus, ProjectUpdate};
use crate::state::AppState;
use crate::utils::json::Patch;

/// Uncommitted input of the create/edit modal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectForm {
    pub name: String,
    pub description: String,
    pub status: Option<ProjectStatus>,
    editing: Option<String>,
}

impl ProjectForm {
    pub fn editing(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    fn for_project(project: &Project) -> Self {
        Self {
            name: project.name.clone(),
            description: project.description.clone().unwrap_or_default(),
            status: Some(project.status),
            editing: Some(project.id.clone()),
        }
    }

    pub fn validate(&self) -> ViewResult<()> {
        require(&self.name, "name")
    }

    fn to_new(&self) -> NewProject {
        NewProject {
            name: self.name.trim().to_string(),
            description: optional_input(&self.description),
            status: self.status,
        }
    }

    fn to_update(&self) -> ProjectUpdate {
        ProjectUpdate {
            name: Some(self.name.trim().to_string()),
            description: Patch::from_input(&self.description),
            status: self.status,
        }
    }
}

pub struct ProjectsView {
    state: AppState,
    projects: QueryObserver<Vec<Project>>,
    snapshot: QueryState<Vec<Project>>,
    modal: Option<ProjectForm>,
    save: Mutation,
    delete: Mutation,
    confirmation: Option<Confirmation<String>>,
}

impl ProjectsView {
    pub async fn mount(state: &AppState) -> Self {
        let api = state.api.clone();
        let projects = state
            .queries
            .observe(keys::projects(), move || {
                let api = api.clone();
                async move { api.projects().get_all().await }
            })
            .await;
        let snapshot = projects.state().await;
        Self {
            state: state.clone(),
            projects,
            snapshot,
            modal: None,
            save: Mutation::new(state.queries.clone(), [keys::projects()]),
            delete: Mutation::new(state.queries.clone(), [keys::projects()]),
            confirmation: None,
        }
    }

    pub fn projects(&self) -> Option<&[Project]> {
        self.snapshot.data.as_deref().map(Vec::as_slice)
    }

    pub fn query_state(&self) -> &QueryState<Vec<Project>> {
        &self.snapshot
    }

    /// Waits for a response issued after the latest invalidation.
    pub async fn refresh(&mut self) {
        let _ = self.projects.refetch().await;
        self.snapshot = self.projects.state().await;
    }

    pub fn open_create(&mut self) {
        self.save.reset();
        self.modal = Some(ProjectForm::default());
    }

    pub fn open_edit(&mut self, id: &str) -> ViewResult<()> {
        let form = self
            .projects()
            .and_then(|projects| projects.iter().find(|project| project.id == id))
            .map(ProjectForm::for_project)
            .ok_or_else(|| ViewError::UnknownItem {
                kind: "project",
                id: id.to_string(),
            })?;
        self.save.reset();
        self.modal = Some(form);
        Ok(())
    }

    pub fn form(&self) -> Option<&ProjectForm> {
        self.modal.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut ProjectForm> {
        self.modal.as_mut()
    }

    pub fn close_modal(&mut self) {
        self.modal = None;
    }

    pub fn save_mutation(&self) -> &Mutation {
        &self.save
    }

    /// Creates or updates from the open form. Success closes the modal and
    /// refreshes the list; failure leaves the modal open with the error.
    pub async fn submit(&mut self) -> ViewResult<Project> {
        let form = self.modal.as_ref().ok_or(ViewError::NoOpenForm)?;
        form.validate()?;

        let api = self.state.api.clone();
        let result = match form.editing.clone() {
            Some(id) => {
                let update = form.to_update();
                self.save
                    .run(async move { api.projects().update(&id, &update).await })
                    .await
            }
            None => {
                let new_project = form.to_new();
                self.save
                    .run(async move { api.projects().create(&new_project).await })
                    .await
            }
        };

        let project = result?;
        info!(project_id = %project.id, name = %project.name, "project saved");
        self.modal = None;
        self.refresh().await;
        Ok(project)
    }

    pub fn request_delete(&mut self, id: &str) {
        let name = self
            .projects()
            .and_then(|projects| projects.iter().find(|project| project.id == id))
            .map(|project| project.name.clone())
            .unwrap_or_else(|| id.to_string());
        self.confirmation = Some(Confirmation {
            prompt: format!("Delete project \"{name}\" and everything in it?"),
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
            .run(async move { api.projects().delete(&id).await })
            .await?;
        info!("project deleted");
        self.refresh().await;
        Ok(())
    }

    pub fn delete_mutation(&self) -> &Mutation {
        &self.delete
    }

    fn render_list(&self, projects: &[Project]) -> String {
        if projects.is_empty() {
            return "No projects yet. Get started by creating your first document review project."
                .to_string();
        }
        let mut table = Table::new([
            "ID",
            "Name",
            "Status",
            "Documents",
            "Templates",
            "Extractions",
            "Created",
        ]);
        for project in projects {
            let (documents, templates, extractions) = project
                .counts
                .as_ref()
                .map(|c| {
                    (
                        c.documents.to_string(),
                        c.field_templates.to_string(),
                        c.extractions.to_string(),
                    )
                })
                .unwrap_or_else(|| ("0".into(), "0".into(), "0".into()));
            table.row([
                project.id.clone(),
                project.name.clone(),
                project.status.to_string(),
                documents,
                templates,
                extractions,
                format_timestamp(&project.created_at),
            ]);
        }
        table.render()
    }

    fn render_modal(&self, form: &ProjectForm) -> String {
        let heading = if form.editing.is_some() {
            "Edit Project"
        } else {
            "New Project"
        };
        let mut lines = vec![
            format!("[{heading}]"),
            format!("  Name*:       {}", form.name),
            format!("  Description: {}", form.description),
        ];
        if let Some(status) = form.status {
            lines.push(format!("  Status:      {status}"));
        }
        if self.save.is_pending() {
            lines.push("  Saving...".to_string());
        }
        if let Some(error) = self.save.error() {
            lines.push(format!("  {}", error_banner(error)));
        }
        lines.join("\n")
    }
}

#[async_trait]
impl View for ProjectsView {
    fn title(&self) -> &'static str {
        "Projects"
    }

    async fn load(&mut self) {
        self.snapshot = self.projects.load().await;
    }

    fn render(&self) -> String {
        let mut sections = vec![
            self.title().to_string(),
            render_query(&self.snapshot, |projects| self.render_list(projects)),
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
