//! Headless screens. Each view declares the keys it reads through the query
//! cache, keeps local form state, and renders plain text: a loading
//! placeholder, an error banner, or the resolved table/form.

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::{QueryState, SharedError};

pub mod documents;
pub mod extractions;
pub mod field_templates;
pub mod home;
pub mod project_detail;
pub mod projects;
pub mod reviews;
pub mod table;

pub use documents::DocumentsView;
pub use extractions::ExtractionsView;
pub use field_templates::FieldTemplatesView;
pub use home::HomeView;
pub use project_detail::ProjectDetailView;
pub use projects::ProjectsView;
pub use reviews::ReviewsView;

pub const LOADING_PLACEHOLDER: &str = "Loading...";

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{0} is not a supported document type")]
    UnsupportedFile(String),
    #[error("no form is open")]
    NoOpenForm,
    #[error("nothing is awaiting confirmation")]
    NothingToConfirm,
    #[error("{kind} {id} is not in the current list")]
    UnknownItem { kind: &'static str, id: String },
    #[error("cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error(transparent)]
    Request(#[from] SharedError),
}

pub type ViewResult<T> = Result<T, ViewError>;

/// A destructive action held back until the user confirms it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation<A> {
    pub prompt: String,
    pub action: A,
}

#[async_trait]
pub trait View: Send {
    fn title(&self) -> &'static str;

    /// Issues (or re-reads) the view's queries.
    async fn load(&mut self);

    fn render(&self) -> String;
}

pub fn require(value: &str, field: &'static str) -> ViewResult<()> {
    if value.trim().is_empty() {
        Err(ViewError::MissingField(field))
    } else {
        Ok(())
    }
}

pub fn optional_input(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn error_banner(error: &SharedError) -> String {
    format!("! Error: {error}")
}

/// Loading placeholder, error banner, or `ready(data)`. A failed background
/// refresh keeps the cached data on screen with the banner above it.
pub fn render_query<T>(state: &QueryState<T>, ready: impl FnOnce(&T) -> String) -> String {
    match (&state.data, &state.error) {
        (None, None) => LOADING_PLACEHOLDER.to_string(),
        (None, Some(error)) => error_banner(error),
        (Some(data), None) => ready(data),
        (Some(data), Some(error)) => format!("{}\n{}", error_banner(error), ready(data)),
    }
}

pub fn render_confirmation<A>(confirmation: &Option<Confirmation<A>>) -> Option<String> {
    confirmation
        .as_ref()
        .map(|pending| format!("? {} [y/N]", pending.prompt))
}
