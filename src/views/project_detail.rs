use async_trait::async_trait;

use super::table::format_timestamp;
use super::{error_banner, View, LOADING_PLACEHOLDER};
use crate::cache::{keys, QueryObserver, QueryState};
use crate::models::{Project, ProjectCounts, Statistics};
use crate::state::AppState;
use crate::utils::json::{number_field, string_field};

pub struct ProjectDetailView {
    project_id: String,
    project: QueryObserver<Project>,
    statistics: QueryObserver<Statistics>,
    project_state: QueryState<Project>,
    statistics_state: QueryState<Statistics>,
}

impl ProjectDetailView {
    pub async fn mount(state: &AppState, project_id: &str) -> Self {
        let api = state.api.clone();
        let id = project_id.to_string();
        let project = state
            .queries
            .observe(keys::project(project_id), move || {
                let api = api.clone();
                let id = id.clone();
                async move { api.projects().get_by_id(&id).await }
            })
            .await;

        let api = state.api.clone();
        let id = project_id.to_string();
        let statistics = state
            .queries
            .observe(keys::project_statistics(project_id), move || {
                let api = api.clone();
                let id = id.clone();
                async move { api.projects().get_statistics(&id).await }
            })
            .await;

        let project_state = project.state().await;
        let statistics_state = statistics.state().await;
        Self {
            project_id: project_id.to_string(),
            project,
            statistics,
            project_state,
            statistics_state,
        }
    }

    pub fn project(&self) -> Option<&Project> {
        self.project_state.data.as_deref()
    }

    pub fn is_not_found(&self) -> bool {
        self.project_state.data.is_none()
            && self
                .project_state
                .error
                .as_ref()
                .is_some_and(|error| error.is_not_found())
    }

    fn render_statistics(&self) -> Option<String> {
        let statistics = self.statistics_state.data.as_deref()?;
        let mut names: Vec<&String> = statistics.keys().collect();
        names.sort();
        let lines: Vec<String> = names
            .into_iter()
            .filter_map(|name| {
                let value = match number_field(statistics, name) {
                    Ok(Some(value)) => value.to_string(),
                    _ => string_field(statistics, name).ok().flatten()?,
                };
                Some(format!("  {name}: {value}"))
            })
            .collect();
        (!lines.is_empty()).then(|| format!("Statistics\n{}", lines.join("\n")))
    }
}

#[async_trait]
impl View for ProjectDetailView {
    fn title(&self) -> &'static str {
        "Project"
    }

    async fn load(&mut self) {
        self.project_state = self.project.load().await;
        if self.project_state.data.is_some() {
            self.statistics_state = self.statistics.load().await;
        }
    }

    fn render(&self) -> String {
        if self.is_not_found() {
            return format!("Project not found: {}\nBack to Projects", self.project_id);
        }
        let project = match (&self.project_state.data, &self.project_state.error) {
            (Some(project), _) => project,
            (None, Some(error)) => return error_banner(error),
            (None, None) => return LOADING_PLACEHOLDER.to_string(),
        };

        let mut lines = vec![
            format!("{} [{}]", project.name, project.status),
            format!("Created {}", format_timestamp(&project.created_at)),
        ];
        if let Some(description) = &project.description {
            lines.push(description.clone());
        }
        lines.push(String::new());
        let counts = project.counts.clone().unwrap_or(ProjectCounts {
            documents: 0,
            field_templates: 0,
            extractions: 0,
        });
        lines.push(format!("Documents:       {}", counts.documents));
        lines.push(format!("Field Templates: {}", counts.field_templates));
        lines.push(format!("Extractions:     {}", counts.extractions));

        if let Some(statistics) = self.render_statistics() {
            lines.push(String::new());
            lines.push(statistics);
        } else if let Some(error) = &self.statistics_state.error {
            lines.push(error_banner(error));
        }
        lines.join("\n")
    }
}
