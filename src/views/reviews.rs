use async_trait::async_trait;
use tracing::info;

use super::table::{format_optional_timestamp, Table};
use super::{error_banner, render_query, require, View, ViewError, ViewResult};
use crate::cache::{keys, Mutation, QueryKey, QueryObserver, QueryState};
use crate::models::{Review, ReviewFilter, ReviewStatus, ReviewUpdate, Statistics};
use crate::state::AppState;
use crate::utils::json::{number_field, Patch};

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewForm {
    pub status: ReviewStatus,
    pub manual_value: String,
    pub reviewer_notes: String,
    pub reviewed_by: String,
    review_id: String,
    original: ReviewStatus,
}

impl ReviewForm {
    fn for_review(review: &Review) -> Self {
        Self {
            status: review.status,
            manual_value: review.manual_value.clone().unwrap_or_default(),
            reviewer_notes: review.reviewer_notes.clone().unwrap_or_default(),
            reviewed_by: review.reviewed_by.clone().unwrap_or_default(),
            review_id: review.id.clone(),
            original: review.status,
        }
    }

    pub fn review_id(&self) -> &str {
        &self.review_id
    }

    pub fn validate(&self) -> ViewResult<()> {
        if self.status.requires_manual_value() {
            require(&self.manual_value, "manual value")?;
        }
        require(&self.reviewed_by, "reviewer")
    }

    /// Only a changed status is sent; notes may be saved on their own.
    fn to_update(&self) -> ReviewUpdate {
        ReviewUpdate {
            status: self
                .original
                .can_transition_to(self.status)
                .then_some(self.status),
            manual_value: Patch::from_input(&self.manual_value),
            reviewer_notes: Patch::from_input(&self.reviewer_notes),
            reviewed_by: Some(self.reviewed_by.trim().to_string()),
        }
    }
}

struct ProjectSummary {
    project_id: String,
    statistics: QueryObserver<Statistics>,
    progress: QueryObserver<Statistics>,
    statistics_state: QueryState<Statistics>,
    progress_state: QueryState<Statistics>,
}

pub struct ReviewsView {
    state: AppState,
    filter: ReviewFilter,
    reviews: QueryObserver<Vec<Review>>,
    snapshot: QueryState<Vec<Review>>,
    summary: Option<ProjectSummary>,
    modal: Option<ReviewForm>,
    save: Mutation,
}

fn list_key(filter: &ReviewFilter) -> QueryKey {
    let status = filter.status.map(|status| status.to_string());
    let mut key = keys::reviews().with("list");
    if let Some(extraction_id) = &filter.extraction_id {
        key = key.with("extraction").with(extraction_id.as_str());
    }
    if let Some(status) = status {
        key = key.with("status").with(status);
    }
    key
}

async fn observe_reviews(state: &AppState, filter: &ReviewFilter) -> QueryObserver<Vec<Review>> {
    let api = state.api.clone();
    let request = filter.clone();
    state
        .queries
        .observe(list_key(filter), move || {
            let api = api.clone();
            let request = request.clone();
            async move { api.reviews().get_all(&request).await }
        })
        .await
}

impl ReviewsView {
    pub async fn mount(state: &AppState, filter: ReviewFilter) -> Self {
        let reviews = observe_reviews(state, &filter).await;
        Self {
            state: state.clone(),
            snapshot: reviews.state().await,
            filter,
            reviews,
            summary: None,
            modal: None,
            // Review decisions show up on the extraction detail as well.
            save: Mutation::new(state.queries.clone(), [keys::reviews(), keys::extractions()]),
        }
    }

    pub fn reviews(&self) -> Option<&[Review]> {
        self.snapshot.data.as_deref().map(Vec::as_slice)
    }

    pub fn query_state(&self) -> &QueryState<Vec<Review>> {
        &self.snapshot
    }

    pub fn filter(&self) -> &ReviewFilter {
        &self.filter
    }

    /// Switches the status filter and reads the matching list.
    pub async fn set_status_filter(&mut self, status: Option<ReviewStatus>) {
        if self.filter.status == status {
            return;
        }
        self.filter.status = status;
        self.reviews = observe_reviews(&self.state, &self.filter).await;
        self.snapshot = self.reviews.load().await;
    }

    /// Adds the per-project statistics and progress panels.
    pub async fn show_project_summary(&mut self, project_id: &str) {
        let api = self.state.api.clone();
        let id = project_id.to_string();
        let statistics = self
            .state
            .queries
            .observe(keys::review_statistics(project_id), move || {
                let api = api.clone();
                let id = id.clone();
                async move { api.reviews().get_statistics(&id).await }
            })
            .await;

        let api = self.state.api.clone();
        let id = project_id.to_string();
        let progress = self
            .state
            .queries
            .observe(keys::review_progress(project_id), move || {
                let api = api.clone();
                let id = id.clone();
                async move { api.reviews().get_progress(&id).await }
            })
            .await;

        let statistics_state = statistics.load().await;
        let progress_state = progress.load().await;
        self.summary = Some(ProjectSummary {
            project_id: project_id.to_string(),
            statistics,
            progress,
            statistics_state,
            progress_state,
        });
    }

    pub fn summary(&self) -> Option<(&QueryState<Statistics>, &QueryState<Statistics>)> {
        self.summary
            .as_ref()
            .map(|summary| (&summary.statistics_state, &summary.progress_state))
    }

    pub async fn refresh(&mut self) {
        let _ = self.reviews.refetch().await;
        self.snapshot = self.reviews.state().await;
        if let Some(summary) = self.summary.as_mut() {
            let _ = summary.statistics.refetch().await;
            let _ = summary.progress.refetch().await;
            summary.statistics_state = summary.statistics.state().await;
            summary.progress_state = summary.progress.state().await;
        }
    }

    pub fn open_edit(&mut self, id: &str) -> ViewResult<()> {
        let form = self
            .reviews()
            .and_then(|reviews| reviews.iter().find(|review| review.id == id))
            .map(ReviewForm::for_review)
            .ok_or_else(|| ViewError::UnknownItem {
                kind: "review",
                id: id.to_string(),
            })?;
        self.save.reset();
        self.modal = Some(form);
        Ok(())
    }

    pub fn form(&self) -> Option<&ReviewForm> {
        self.modal.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut ReviewForm> {
        self.modal.as_mut()
    }

    pub fn close_modal(&mut self) {
        self.modal = None;
    }

    pub fn save_mutation(&self) -> &Mutation {
        &self.save
    }

    pub async fn submit(&mut self) -> ViewResult<Review> {
        let form = self.modal.as_ref().ok_or(ViewError::NoOpenForm)?;
        form.validate()?;

        let api = self.state.api.clone();
        let id = form.review_id.clone();
        let update = form.to_update();
        let review = self
            .save
            .run(async move { api.reviews().update(&id, &update).await })
            .await?;
        info!(review_id = %review.id, status = %review.status, "review saved");
        self.modal = None;
        self.refresh().await;
        Ok(review)
    }

    fn render_list(&self, reviews: &[Review]) -> String {
        if reviews.is_empty() {
            return match self.filter.status {
                Some(status) => format!("No reviews with status {status}."),
                None => "No reviews yet.".to_string(),
            };
        }
        let mut table = Table::new([
            "ID",
            "Extracted field",
            "Status",
            "Manual value",
            "Reviewed by",
            "Reviewed at",
        ]);
        for review in reviews {
            table.row([
                review.id.clone(),
                review.extracted_field_id.clone(),
                review.status.to_string(),
                review.manual_value.clone().unwrap_or_default(),
                review.reviewed_by.clone().unwrap_or_default(),
                format_optional_timestamp(review.reviewed_at.as_ref()),
            ]);
        }
        table.render()
    }

    fn render_summary(summary: &ProjectSummary) -> String {
        let panel = |title: &str, state: &QueryState<Statistics>| {
            render_query(state, |values| {
                let mut names: Vec<&String> = values.keys().collect();
                names.sort();
                let mut lines = vec![title.to_string()];
                lines.extend(names.into_iter().filter_map(|name| {
                    number_field(values, name)
                        .ok()
                        .flatten()
                        .map(|value| format!("  {name}: {value}"))
                }));
                lines.join("\n")
            })
        };
        format!(
            "Project {}\n{}\n{}",
            summary.project_id,
            panel("Review statistics", &summary.statistics_state),
            panel("Progress", &summary.progress_state)
        )
    }

    fn render_modal(&self, form: &ReviewForm) -> String {
        let mut lines = vec![
            format!("[Review {}]", form.review_id),
            format!("  Status:       {}", form.status),
        ];
        let marker = if form.status.requires_manual_value() { "*" } else { "" };
        lines.push(format!("  Manual value{marker}: {}", form.manual_value));
        lines.push(format!("  Notes:        {}", form.reviewer_notes));
        lines.push(format!("  Reviewer*:    {}", form.reviewed_by));
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
impl View for ReviewsView {
    fn title(&self) -> &'static str {
        "Reviews"
    }

    async fn load(&mut self) {
        self.snapshot = self.reviews.load().await;
        if let Some(summary) = self.summary.as_mut() {
            summary.statistics_state = summary.statistics.load().await;
            summary.progress_state = summary.progress.load().await;
        }
    }

    fn render(&self) -> String {
        let mut sections = vec![self.title().to_string()];
        if let Some(status) = self.filter.status {
            sections.push(format!("Filter: {status}"));
        }
        if let Some(summary) = &self.summary {
            sections.push(Self::render_summary(summary));
        }
        sections.push(render_query(&self.snapshot, |reviews| self.render_list(reviews)));
        if let Some(form) = &self.modal {
            sections.push(self.render_modal(form));
        }
        sections.join("\n\n")
    }
}
