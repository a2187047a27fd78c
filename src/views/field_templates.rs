use async_trait::async_trait;
use tracing::info;

use super::table::Table;
use super::{
    error_banner, optional_input, render_confirmation, render_query, require, Confirmation, View,
    ViewError, ViewResult,
};
use crate::cache::{keys, Mutation, QueryObserver, QueryState};
use crate::models::{FieldTemplate, FieldTemplateUpdate, FieldType, NewFieldTemplate, Project};
use crate::state::AppState;
use crate::utils::json::Patch;

#[derive(Debug, Clone, PartialEq)]
pub struct FieldTemplateForm {
    pub project_id: String,
    pub field_name: String,
    pub field_type: FieldType,
    pub description: String,
    pub is_required: bool,
    editing: Option<String>,
}

impl Default for FieldTemplateForm {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            field_name: String::new(),
            field_type: FieldType::Text,
            description: String::new(),
            is_required: false,
            editing: None,
        }
    }
}

impl FieldTemplateForm {
    pub fn editing(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    fn for_template(template: &FieldTemplate) -> Self {
        Self {
            project_id: template.project_id.clone(),
            field_name: template.field_name.clone(),
            field_type: template.field_type,
            description: template.description.clone().unwrap_or_default(),
            is_required: template.is_required,
            editing: Some(template.id.clone()),
        }
    }

    pub fn validate(&self) -> ViewResult<()> {
        require(&self.project_id, "project")?;
        require(&self.field_name, "field name")
    }

    fn to_new(&self) -> NewFieldTemplate {
        NewFieldTemplate {
            project_id: self.project_id.trim().to_string(),
            field_name: self.field_name.trim().to_string(),
            field_type: self.field_type,
            description: optional_input(&self.description),
            is_required: self.is_required,
            validation_rules: None,
            normalization_rules: None,
            display_order: None,
        }
    }

    fn to_update(&self) -> FieldTemplateUpdate {
        FieldTemplateUpdate {
            field_name: Some(self.field_name.trim().to_string()),
            field_type: Some(self.field_type),
            description: Patch::from_input(&self.description),
            is_required: Some(self.is_required),
            ..FieldTemplateUpdate::default()
        }
    }
}

pub struct FieldTemplatesView {
    state: AppState,
    project_filter: Option<String>,
    templates: QueryObserver<Vec<FieldTemplate>>,
    projects: QueryObserver<Vec<Project>>,
    templates_state: QueryState<Vec<FieldTemplate>>,
    projects_state: QueryState<Vec<Project>>,
    modal: Option<FieldTemplateForm>,
    save: Mutation,
    delete: Mutation,
    confirmation: Option<Confirmation<String>>,
}

impl FieldTemplatesView {
    pub async fn mount(state: &AppState, project_filter: Option<&str>) -> Self {
        let api = state.api.clone();
        let filter = project_filter.map(str::to_string);
        let templates = state
            .queries
            .observe(keys::field_templates(project_filter), move || {
                let api = api.clone();
                let filter = filter.clone();
                async move { api.field_templates().get_all(filter.as_deref()).await }
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

        let invalidates = [keys::field_templates(None), keys::projects()];
        Self {
            state: state.clone(),
            project_filter: project_filter.map(str::to_string),
            templates_state: templates.state().await,
            projects_state: projects.state().await,
            templates,
            projects,
            modal: None,
            save: Mutation::new(state.queries.clone(), invalidates.clone()),
            delete: Mutation::new(state.queries.clone(), invalidates),
            confirmation: None,
        }
    }

    pub fn templates(&self) -> Option<&[FieldTemplate]> {
        self.templates_state.data.as_deref().map(Vec::as_slice)
    }

    pub fn query_state(&self) -> &QueryState<Vec<FieldTemplate>> {
        &self.templates_state
    }

    pub async fn refresh(&mut self) {
        let _ = self.templates.refetch().await;
        self.templates_state = self.templates.state().await;
        self.projects_state = self.projects.state().await;
    }

    pub fn open_create(&mut self) {
        self.save.reset();
        self.modal = Some(FieldTemplateForm {
            project_id: self.project_filter.clone().unwrap_or_default(),
            ..FieldTemplateForm::default()
        });
    }

    pub fn open_edit(&mut self, id: &str) -> ViewResult<()> {
        let form = self
            .templates()
            .and_then(|templates| templates.iter().find(|template| template.id == id))
            .map(FieldTemplateForm::for_template)
            .ok_or_else(|| ViewError::UnknownItem {
                kind: "field template",
                id: id.to_string(),
            })?;
        self.save.reset();
        self.modal = Some(form);
        Ok(())
    }

    pub fn form(&self) -> Option<&FieldTemplateForm> {
        self.modal.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut FieldTemplateForm> {
        self.modal.as_mut()
    }

    pub fn close_modal(&mut self) {
        self.modal = None;
    }

    pub fn save_mutation(&self) -> &Mutation {
        &self.save
    }

    pub async fn submit(&mut self) -> ViewResult<FieldTemplate> {
        let form = self.modal.as_ref().ok_or(ViewError::NoOpenForm)?;
        form.validate()?;

        let api = self.state.api.clone();
        let result = match form.editing.clone() {
            Some(id) => {
                let update = form.to_update();
                self.save
                    .run(async move { api.field_templates().update(&id, &update).await })
                    .await
            }
            None => {
                let template = form.to_new();
                self.save
                    .run(async move { api.field_templates().create(&template).await })
                    .await
            }
        };

        let template = result?;
        info!(
            template_id = %template.id,
            field_name = %template.field_name,
            "field template saved"
        );
        self.modal = None;
        self.refresh().await;
        Ok(template)
    }

    pub fn request_delete(&mut self, id: &str) {
        let name = self
            .templates()
            .and_then(|templates| templates.iter().find(|template| template.id == id))
            .map(|template| template.field_name.clone())
            .unwrap_or_else(|| id.to_string());
        self.confirmation = Some(Confirmation {
            prompt: format!("Delete field template \"{name}\"?"),
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
            .run(async move { api.field_templates().delete(&id).await })
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

    fn render_list(&self, templates: &[FieldTemplate]) -> String {
        if templates.is_empty() {
            return "No field templates defined.".to_string();
        }
        let mut ordered: Vec<&FieldTemplate> = templates.iter().collect();
        ordered.sort_by_key(|template| template.display_order);
        let mut table = Table::new(["ID", "Field", "Type", "Required", "Project", "Description"]);
        for template in ordered {
            table.row([
                template.id.clone(),
                template.field_name.clone(),
                template.field_type.to_string(),
                if template.is_required { "yes" } else { "no" }.to_string(),
                self.project_name(&template.project_id),
                template.description.clone().unwrap_or_default(),
            ]);
        }
        table.render()
    }

    fn render_modal(&self, form: &FieldTemplateForm) -> String {
        let heading = if form.editing.is_some() {
            "Edit Field Template"
        } else {
            "New Field Template"
        };
        let mut lines = vec![
            format!("[{heading}]"),
            format!("  Project*:    {}", self.project_name(&form.project_id)),
            format!("  Field name*: {}", form.field_name),
            format!("  Type:        {}", form.field_type),
            format!("  Required:    {}", if form.is_required { "yes" } else { "no" }),
            format!("  Description: {}", form.description),
        ];
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
impl View for FieldTemplatesView {
    fn title(&self) -> &'static str {
        "Field Templates"
    }

    async fn load(&mut self) {
        self.templates_state = self.templates.load().await;
        self.projects_state = self.projects.load().await;
    }

    fn render(&self) -> String {
        let mut sections = vec![
            self.title().to_string(),
            render_query(&self.templates_state, |templates| self.render_list(templates)),
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
