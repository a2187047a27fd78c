use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::json::{JsonMap, Patch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Draft,
    Active,
    Completed,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCounts {
    pub documents: u64,
    pub field_templates: u64,
    pub extractions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "_count", default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<ProjectCounts>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Patch::is_omitted")]
    pub description: Patch<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Html,
    Txt,
}

impl DocumentFormat {
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "html" | "htm" => Some(Self::Html),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub project_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub format: DocumentFormat,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub parsed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parsed_text: Option<String>,
    #[serde(default)]
    pub metadata: Option<JsonMap>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    pub project_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub format: DocumentFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonMap>,
}

/// File contents for a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Boolean,
    Currency,
    Percentage,
    Email,
    Url,
    Phone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldTemplate {
    pub id: String,
    pub project_id: String,
    pub field_name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub description: Option<String>,
    pub is_required: bool,
    #[serde(default)]
    pub validation_rules: Option<JsonMap>,
    #[serde(default)]
    pub normalization_rules: Option<JsonMap>,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFieldTemplate {
    pub project_id: String,
    pub field_name: String,
    pub field_type: FieldType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_rules: Option<JsonMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalization_rules: Option<JsonMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldTemplateUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    #[serde(skip_serializing_if = "Patch::is_omitted")]
    pub description: Patch<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_required: Option<bool>,
    #[serde(skip_serializing_if = "Patch::is_omitted")]
    pub validation_rules: Patch<JsonMap>,
    #[serde(skip_serializing_if = "Patch::is_omitted")]
    pub normalization_rules: Patch<JsonMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExtractionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ExtractionStatus {
    /// Transitions the server is expected to perform. The client never
    /// refuses a response that breaks this table; it only logs it.
    pub fn can_transition_to(self, next: ExtractionStatus) -> bool {
        use ExtractionStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ExtractionStatus::Completed | ExtractionStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    pub id: String,
    pub project_id: String,
    pub document_id: String,
    pub status: ExtractionStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub extracted_fields: Option<Vec<ExtractedField>>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartExtraction {
    pub project_id: String,
    pub document_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFieldInput {
    pub field_template_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_value: Option<String>,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<CitationInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationInput {
    pub document_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_position: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_position: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_snippet: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteExtraction {
    pub extracted_fields: Vec<ExtractedFieldInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedField {
    pub id: String,
    pub extraction_id: String,
    pub field_template_id: String,
    #[serde(default)]
    pub raw_value: Option<String>,
    #[serde(default)]
    pub normalized_value: Option<String>,
    pub confidence: f64,
    pub extracted_at: DateTime<Utc>,
    #[serde(default)]
    pub field_template: Option<FieldTemplate>,
    #[serde(default)]
    pub citations: Option<Vec<Citation>>,
    #[serde(default)]
    pub review: Option<Review>,
}

impl ExtractedField {
    /// Value shown to reviewers: a manual correction wins over the normalized
    /// value, which wins over the raw capture.
    pub fn display_value(&self) -> Option<&str> {
        self.review
            .as_ref()
            .and_then(|review| review.manual_value.as_deref())
            .or(self.normalized_value.as_deref())
            .or(self.raw_value.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub id: String,
    pub extracted_field_id: String,
    pub document_id: String,
    #[serde(default)]
    pub start_position: Option<u64>,
    #[serde(default)]
    pub end_position: Option<u64>,
    #[serde(default)]
    pub page_number: Option<u32>,
    #[serde(default)]
    pub text_snippet: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    Pending,
    Confirmed,
    Rejected,
    ManualUpdated,
    MissingData,
}

impl ReviewStatus {
    /// Pending moves to any decision; decisions may be revised or reopened.
    pub fn can_transition_to(self, next: ReviewStatus) -> bool {
        self != next
    }

    /// A manual update is only meaningful with a replacement value.
    pub fn requires_manual_value(self) -> bool {
        self == ReviewStatus::ManualUpdated
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub extracted_field_id: String,
    pub status: ReviewStatus,
    #[serde(default)]
    pub manual_value: Option<String>,
    #[serde(default)]
    pub reviewer_notes: Option<String>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewed_by: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ReviewStatus>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ReviewStatus>,
    #[serde(skip_serializing_if = "Patch::is_omitted")]
    pub manual_value: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_omitted")]
    pub reviewer_notes: Patch<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub timestamp: DateTime<Utc>,
}

/// Aggregates returned by the statistics/progress endpoints.
pub type Statistics = JsonMap;

macro_rules! wire_name_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    match serde_json::to_value(self) {
                        Ok(serde_json::Value::String(name)) => f.write_str(&name),
                        _ => write!(f, "{self:?}"),
                    }
                }
            }
        )*
    };
}

wire_name_display!(
    ProjectStatus,
    DocumentFormat,
    FieldType,
    ExtractionStatus,
    ReviewStatus
);

macro_rules! wire_name_from_str {
    ($($ty:ty),* $(,)?) => {
        $(
            impl std::str::FromStr for $ty {
                type Err = String;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
                    serde_json::from_value(serde_json::Value::String(normalized))
                        .map_err(|_| format!("unknown {} {s:?}", stringify!($ty)))
                }
            }
        )*
    };
}

wire_name_from_str!(
    ProjectStatus,
    DocumentFormat,
    FieldType,
    ExtractionStatus,
    ReviewStatus
);
