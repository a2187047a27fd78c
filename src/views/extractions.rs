use async_trait::async_trait;
use tracing::{info, warn};

use super::table::{format_confidence, format_optional_timestamp, Table, NOT_AVAILABLE};
use super::{
    error_banner, render_confirmation, render_query, require, Confirmation, View, ViewError,
    ViewResult,
};
use crate::cache::{keys, Mutation, QueryObserver, QueryState};
use crate::models::{
    CompleteExtraction, Document, Extraction, ExtractionFilter, ExtractionStatus,
    StartExtraction,
};
use crate::state::AppState;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartForm {
    pub document_id: String,
}

/// A mark-failed request held for confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailRequest {
    pub extraction_id: String,
    pub message: String,
}

struct Details {
    observer: QueryObserver<Extraction>,
    state: QueryState<Extraction>,
}

pub struct ExtractionsView {
    state: AppState,
    extractions: QueryObserver<Vec<Extraction>>,
    documents: QueryObserver<Vec<Document>>,
    extractions_state: QueryState<Vec<Extraction>>,
    documents_state: QueryState<Vec<Document>>,
    modal: Option<StartForm>,
    details: Option<Details>,
    start: Mutation,
    complete: Mutation,
    fail: Mutation,
    confirmation: Option<Confirmation<FailRequest>>,
}

impl ExtractionsView {
    pub async fn mount(state: &AppState, project_filter: Option<&str>) -> Self {
        let api = state.api.clone();
        let filter = ExtractionFilter {
            project_id: project_filter.map(str::to_string),
            document_id: None,
        };
        let extractions = state
            .queries
            .observe(keys::extractions().with_opt(project_filter), move || {
                let api = api.clone();
                let filter = filter.clone();
                async move { api.extractions().get_all(&filter).await }
            })
            .await;

        let api = state.api.clone();
        let documents = state
            .queries
            .observe(keys::documents(None), move || {
                let api = api.clone();
                async move { api.documents().get_all(None).await }
            })
            .await;

        Self {
            state: state.clone(),
            extractions_state: extractions.state().await,
            documents_state: documents.state().await,
            extractions,
            documents,
            modal: None,
            details: None,
            // Starting an extraction bumps the project's extraction count.
            start: Mutation::new(state.queries.clone(), [keys::extractions(), keys::projects()]),
            // Completion creates a pending review for every extracted field.
            complete: Mutation::new(
                state.queries.clone(),
                [keys::extractions(), keys::reviews(), keys::projects()],
            ),
            fail: Mutation::new(state.queries.clone(), [keys::extractions()]),
            confirmation: None,
        }
    }

    pub fn extractions(&self) -> Option<&[Extraction]> {
        self.extractions_state.data.as_deref().map(Vec::as_slice)
    }

    pub fn query_state(&self) -> &QueryState<Vec<Extraction>> {
        &self.extractions_state
    }

    pub async fn refresh(&mut self) {
        let _ = self.extractions.refetch().await;
        self.extractions_state = self.extractions.state().await;
        self.documents_state = self.documents.state().await;
        if let Some(details) = self.details.as_mut() {
            let _ = details.observer.refetch().await;
            details.state = details.observer.state().await;
        }
    }

    pub fn open_start(&mut self) {
        self.start.reset();
        self.modal = Some(StartForm::default());
    }

    pub fn form_mut(&mut self) -> Option<&mut StartForm> {
        self.modal.as_mut()
    }

    pub fn form(&self) -> Option<&StartForm> {
        self.modal.as_ref()
    }

    pub fn close_modal(&mut self) {
        self.modal = None;
    }

    pub fn start_mutation(&self) -> &Mutation {
        &self.start
    }

    /// Starts an extraction for the selected document; the project comes
    /// from the document itself.
    pub async fn submit(&mut self) -> ViewResult<Extraction> {
        let form = self.modal.as_ref().ok_or(ViewError::NoOpenForm)?;
        require(&form.document_id, "document")?;
        let document_id = form.document_id.trim().to_string();
        let project_id = self
            .documents_state
            .data
            .as_deref()
            .and_then(|documents| documents.iter().find(|document| document.id == document_id))
            .map(|document| document.project_id.clone())
            .ok_or_else(|| ViewError::UnknownItem {
                kind: "document",
                id: document_id.clone(),
            })?;

        let api = self.state.api.clone();
        let request = StartExtraction {
            project_id,
            document_id,
        };
        let extraction = self
            .start
            .run(async move { api.extractions().start(&request).await })
            .await?;
        info!(extraction_id = %extraction.id, status = %extraction.status, "extraction started");
        self.modal = None;
        self.refresh().await;
        Ok(extraction)
    }

    pub async fn open_details(&mut self, id: &str) -> &QueryState<Extraction> {
        let api = self.state.api.clone();
        let extraction_id = id.to_string();
        let observer = self
            .state
            .queries
            .observe(keys::extraction(id), move || {
                let api = api.clone();
                let id = extraction_id.clone();
                async move { api.extractions().get_by_id(&id).await }
            })
            .await;
        let state = observer.load().await;
        &self.details.insert(Details { observer, state }).state
    }

    pub fn details(&self) -> Option<&QueryState<Extraction>> {
        self.details.as_ref().map(|details| &details.state)
    }

    pub fn close_details(&mut self) {
        self.details = None;
    }

    fn cached_status(&self, id: &str) -> Option<ExtractionStatus> {
        let from_list = self
            .extractions()
            .and_then(|extractions| extractions.iter().find(|extraction| extraction.id == id))
            .map(|extraction| extraction.status);
        from_list.or_else(|| {
            self.details
                .as_ref()
                .and_then(|details| details.state.data.as_deref())
                .filter(|extraction| extraction.id == id)
                .map(|extraction| extraction.status)
        })
    }

    /// Queues a mark-failed for confirmation. Extractions already in a
    /// terminal state are refused before anything is sent.
    pub fn request_fail(&mut self, id: &str, message: &str) -> ViewResult<()> {
        require(message, "error message")?;
        let status = self.cached_status(id).ok_or_else(|| ViewError::UnknownItem {
            kind: "extraction",
            id: id.to_string(),
        })?;
        if !status.can_transition_to(ExtractionStatus::Failed) {
            return Err(ViewError::InvalidTransition {
                from: status.to_string(),
                to: ExtractionStatus::Failed.to_string(),
            });
        }
        self.confirmation = Some(Confirmation {
            prompt: format!("Mark extraction {id} as failed?"),
            action: FailRequest {
                extraction_id: id.to_string(),
                message: message.trim().to_string(),
            },
        });
        Ok(())
    }

    pub fn confirmation(&self) -> Option<&Confirmation<FailRequest>> {
        self.confirmation.as_ref()
    }

    pub fn cancel_confirmation(&mut self) {
        self.confirmation = None;
    }

    pub async fn confirm(&mut self) -> ViewResult<Extraction> {
        let pending = self
            .confirmation
            .take()
            .ok_or(ViewError::NothingToConfirm)?;
        let previous = self.cached_status(&pending.action.extraction_id);
        let api = self.state.api.clone();
        let FailRequest {
            extraction_id,
            message,
        } = pending.action;
        let extraction = self
            .fail
            .run(async move { api.extractions().mark_failed(&extraction_id, &message).await })
            .await?;
        if let Some(previous) = previous {
            if previous != extraction.status && !previous.can_transition_to(extraction.status) {
                warn!(
                    extraction_id = %extraction.id,
                    from = %previous,
                    to = %extraction.status,
                    "server reported an unexpected extraction transition"
                );
            }
        }
        self.refresh().await;
        Ok(extraction)
    }

    pub fn fail_mutation(&self) -> &Mutation {
        &self.fail
    }

    /// Stores extracted fields for a processing extraction.
    pub async fn complete(
        &mut self,
        id: &str,
        payload: CompleteExtraction,
    ) -> ViewResult<Extraction> {
        let status = self.cached_status(id).ok_or_else(|| ViewError::UnknownItem {
            kind: "extraction",
            id: id.to_string(),
        })?;
        if !status.can_transition_to(ExtractionStatus::Completed) {
            return Err(ViewError::InvalidTransition {
                from: status.to_string(),
                to: ExtractionStatus::Completed.to_string(),
            });
        }

        let api = self.state.api.clone();
        let extraction_id = id.to_string();
        let extraction = self
            .complete
            .run(async move { api.extractions().complete(&extraction_id, &payload).await })
            .await?;
        info!(
            extraction_id = %extraction.id,
            fields = extraction.extracted_fields.as_ref().map_or(0, Vec::len),
            "extraction completed"
        );
        self.refresh().await;
        Ok(extraction)
    }

    pub fn complete_mutation(&self) -> &Mutation {
        &self.complete
    }

    fn document_name(&self, document_id: &str) -> String {
        self.documents_state
            .data
            .as_deref()
            .and_then(|documents| documents.iter().find(|document| document.id == document_id))
            .map(|document| document.file_name.clone())
            .unwrap_or_else(|| document_id.to_string())
    }

    fn render_list(&self, extractions: &[Extraction]) -> String {
        if extractions.is_empty() {
            return "No extractions yet.".to_string();
        }
        let mut table = Table::new(["ID", "Document", "Status", "Started", "Completed", "Error"]);
        for extraction in extractions {
            table.row([
                extraction.id.clone(),
                self.document_name(&extraction.document_id),
                extraction.status.to_string(),
                format_optional_timestamp(extraction.started_at.as_ref()),
                format_optional_timestamp(extraction.completed_at.as_ref()),
                extraction.error_message.clone().unwrap_or_default(),
            ]);
        }
        table.render()
    }

    fn render_details(&self, extraction: &Extraction) -> String {
        let mut lines = vec![
            format!("Extraction {}", extraction.id),
            format!("  Document: {}", self.document_name(&extraction.document_id)),
            format!("  Status:   {}", extraction.status),
        ];
        if let Some(message) = &extraction.error_message {
            lines.push(format!("  Error:    {message}"));
        }
        let fields = extraction.extracted_fields.as_deref().unwrap_or_default();
        if fields.is_empty() {
            lines.push("  No extracted fields.".to_string());
            return lines.join("\n");
        }
        let mut table = Table::new(["Field", "Value", "Confidence", "Citations", "Review"]);
        for field in fields {
            let name = field
                .field_template
                .as_ref()
                .map(|template| template.field_name.clone())
                .unwrap_or_else(|| field.field_template_id.clone());
            let citations = field
                .citations
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|citation| match (citation.page_number, &citation.text_snippet) {
                    (Some(page), Some(snippet)) => format!("p.{page} \"{snippet}\""),
                    (Some(page), None) => format!("p.{page}"),
                    (None, Some(snippet)) => format!("\"{snippet}\""),
                    (None, None) => citation.id.clone(),
                })
                .collect::<Vec<_>>()
                .join("; ");
            table.row([
                name,
                field.display_value().unwrap_or(NOT_AVAILABLE).to_string(),
                format_confidence(field.confidence),
                citations,
                field
                    .review
                    .as_ref()
                    .map(|review| review.status.to_string())
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            ]);
        }
        lines.push(table.render());
        lines.join("\n")
    }
}

#[async_trait]
impl View for ExtractionsView {
    fn title(&self) -> &'static str {
        "Extractions"
    }

    async fn load(&mut self) {
        self.extractions_state = self.extractions.load().await;
        self.documents_state = self.documents.load().await;
        if let Some(details) = self.details.as_mut() {
            details.state = details.observer.load().await;
        }
    }

    fn render(&self) -> String {
        let mut sections = vec![
            self.title().to_string(),
            render_query(&self.extractions_state, |extractions| {
                self.render_list(extractions)
            }),
        ];
        if let Some(details) = &self.details {
            sections.push(render_query(&details.state, |extraction| {
                self.render_details(extraction)
            }));
        }
        if let Some(error) = self.fail.error() {
            sections.push(error_banner(error));
        }
        if let Some(form) = &self.modal {
            let mut lines = vec![
                "[Start Extraction]".to_string(),
                format!("  Document*: {}", self.document_name(&form.document_id)),
            ];
            if self.start.is_pending() {
                lines.push("  Starting...".to_string());
            }
            if let Some(error) = self.start.error() {
                lines.push(format!("  {}", error_banner(error)));
            }
            sections.push(lines.join("\n"));
        }
        if let Some(prompt) = render_confirmation(&self.confirmation) {
            sections.push(prompt);
        }
        sections.join("\n\n")
    }
}
