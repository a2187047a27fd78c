use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Multipart, Path, Query, Request, State};
use axum::http::{header, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use review_console::config::ClientConfig;
use review_console::models::Project;
use review_console::AppState;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

const REVIEW_STATUSES: [&str; 5] = [
    "PENDING",
    "CONFIRMED",
    "REJECTED",
    "MANUAL_UPDATED",
    "MISSING_DATA",
];

#[derive(Default)]
struct Store {
    projects: Vec<Value>,
    documents: Vec<Value>,
    files: HashMap<String, (Vec<u8>, String)>,
    templates: Vec<Value>,
    extractions: Vec<Value>,
    fields: Vec<Value>,
    citations: Vec<Value>,
    reviews: Vec<Value>,
}

/// In-memory stand-in for the review API, served over real HTTP.
#[derive(Default)]
pub struct FakeBackend {
    store: Mutex<Store>,
    hits: Mutex<HashMap<String, usize>>,
    failures: Mutex<HashMap<String, StatusCode>>,
    latency: Mutex<Duration>,
    content_types: Mutex<Vec<(String, String)>>,
}

impl FakeBackend {
    #[allow(dead_code)]
    /// Number of requests seen for `"<METHOD> <path>"`, e.g. `"GET /projects"`.
    pub async fn hits(&self, route: &str) -> usize {
        self.hits.lock().await.get(route).copied().unwrap_or(0)
    }

    #[allow(dead_code)]
    pub async fn total_hits(&self) -> usize {
        self.hits.lock().await.values().sum()
    }

    /// Delays every GET by `latency`.
    #[allow(dead_code)]
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.lock().await = latency;
    }

    /// Fails the next request to `route` with `status`.
    #[allow(dead_code)]
    pub async fn fail_next(&self, route: &str, status: StatusCode) {
        self.failures.lock().await.insert(route.to_string(), status);
    }

    /// Content-type header of the last request to `route`.
    #[allow(dead_code)]
    pub async fn content_type(&self, route: &str) -> Option<String> {
        self.content_types
            .lock()
            .await
            .iter()
            .rev()
            .find(|(seen, _)| seen == route)
            .map(|(_, value)| value.clone())
    }

    #[allow(dead_code)]
    pub async fn document_count(&self) -> usize {
        self.store.lock().await.documents.len()
    }
}

pub struct TestApp {
    pub state: AppState,
    pub backend: Arc<FakeBackend>,
    pub addr: SocketAddr,
    server: JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::with_stale_time(Duration::ZERO).await
    }

    #[allow(dead_code)]
    pub async fn with_stale_time(stale_time: Duration) -> Result<Self> {
        let backend = Arc::new(FakeBackend::default());
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind fake backend")?;
        let addr = listener.local_addr()?;
        let router = router(Arc::clone(&backend));
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let config = ClientConfig {
            stale_time,
            ..ClientConfig::default()
        }
        .with_api_url(&format!("http://{addr}"))?;
        let state = AppState::new(config)?;

        Ok(Self {
            state,
            backend,
            addr,
            server,
        })
    }

    #[allow(dead_code)]
    pub async fn seed_project(&self, name: &str) -> Result<Project> {
        let project = self
            .state
            .api
            .projects()
            .create(&review_console::models::NewProject {
                name: name.to_string(),
                ..Default::default()
            })
            .await?;
        Ok(project)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.server.abort();
    }
}

type Backend = State<Arc<FakeBackend>>;

struct Failure(StatusCode, Value);

impl Failure {
    fn not_found(kind: &str) -> Self {
        Self(StatusCode::NOT_FOUND, json!(format!("{kind} not found")))
    }

    fn bad_request(messages: &[&str]) -> Self {
        Self(StatusCode::BAD_REQUEST, json!(messages))
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let Failure(status, message) = self;
        let body = json!({
            "statusCode": status.as_u16(),
            "message": message,
            "error": status.canonical_reason().unwrap_or("Error"),
        });
        (status, Json(body)).into_response()
    }
}

type Reply = Result<Json<Value>, Failure>;

fn router(backend: Arc<FakeBackend>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/:id",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route("/projects/:id/statistics", get(project_statistics))
        .route("/documents", get(list_documents).post(create_document))
        .route("/documents/upload", post(upload_document))
        .route("/documents/:id", get(get_document).delete(delete_document))
        .route("/documents/:id/download", get(download_document))
        .route("/field-templates", get(list_templates).post(create_template))
        .route(
            "/field-templates/:id",
            get(get_template)
                .patch(update_template)
                .delete(delete_template),
        )
        .route("/extractions", get(list_extractions))
        .route("/extractions/start", post(start_extraction))
        .route("/extractions/:id", get(get_extraction))
        .route("/extractions/:id/complete", post(complete_extraction))
        .route("/extractions/:id/fail", patch(fail_extraction))
        .route("/reviews", get(list_reviews))
        .route("/reviews/:id", get(get_review).patch(update_review))
        .route("/reviews/extracted-field/:id", get(review_by_field))
        .route("/reviews/statistics/:project_id", get(review_statistics))
        .route("/reviews/progress/:project_id", get(review_progress))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&backend),
            track_requests,
        ))
        .with_state(backend)
}

async fn track_requests(State(backend): Backend, request: Request, next: Next) -> Response {
    let route = format!("{} {}", request.method(), request.uri().path());
    *backend.hits.lock().await.entry(route.clone()).or_default() += 1;
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    if let Some(value) = content_type {
        backend
            .content_types
            .lock()
            .await
            .push((route.clone(), value));
    }

    if request.method() == Method::GET {
        let latency = *backend.latency.lock().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
    if let Some(status) = backend.failures.lock().await.remove(&route) {
        return Failure(status, json!("injected failure")).into_response();
    }
    next.run(request).await
}

fn now() -> Value {
    json!(Utc::now().to_rfc3339())
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn id_of(value: &Value) -> &str {
    value["id"].as_str().unwrap_or_default()
}

fn find<'a>(items: &'a [Value], id: &str) -> Option<&'a Value> {
    items.iter().find(|item| id_of(item) == id)
}

fn find_mut<'a>(items: &'a mut [Value], id: &str) -> Option<&'a mut Value> {
    items.iter_mut().find(|item| id_of(item) == id)
}

fn body_object(body: Value) -> Map<String, Value> {
    match body {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn merge(target: &mut Value, body: &Map<String, Value>, allowed: &[&str]) {
    for key in allowed {
        if let Some(value) = body.get(*key) {
            target[*key] = value.clone();
        }
    }
    target["updatedAt"] = now();
}

fn matches_query(item: &Value, query: &HashMap<String, String>, field: &str) -> bool {
    query
        .get(field)
        .map_or(true, |wanted| item[field].as_str() == Some(wanted.as_str()))
}

fn with_counts(store: &Store, project: &Value) -> Value {
    let id = id_of(project);
    let count = |items: &[Value]| {
        items
            .iter()
            .filter(|item| item["projectId"].as_str() == Some(id))
            .count()
    };
    let mut project = project.clone();
    project["_count"] = json!({
        "documents": count(&store.documents),
        "fieldTemplates": count(&store.templates),
        "extractions": count(&store.extractions),
    });
    project
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "legal-review-api",
        "timestamp": now(),
    }))
}

async fn list_projects(State(backend): Backend) -> Json<Value> {
    let store = backend.store.lock().await;
    let projects: Vec<Value> = store
        .projects
        .iter()
        .map(|project| with_counts(&store, project))
        .collect();
    Json(json!(projects))
}

async fn create_project(State(backend): Backend, Json(body): Json<Value>) -> Reply {
    let body = body_object(body);
    let name = body
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if name.is_empty() {
        return Err(Failure::bad_request(&["name should not be empty"]));
    }
    let mut store = backend.store.lock().await;
    let project = json!({
        "id": new_id(),
        "name": name,
        "description": body.get("description").cloned().unwrap_or(Value::Null),
        "status": body.get("status").cloned().unwrap_or_else(|| json!("DRAFT")),
        "createdAt": now(),
        "updatedAt": now(),
    });
    store.projects.push(project.clone());
    Ok(Json(with_counts(&store, &project)))
}

async fn get_project(State(backend): Backend, Path(id): Path<String>) -> Reply {
    let store = backend.store.lock().await;
    let project = find(&store.projects, &id).ok_or_else(|| Failure::not_found("Project"))?;
    Ok(Json(with_counts(&store, project)))
}

async fn update_project(
    State(backend): Backend,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    let body = body_object(body);
    let mut store = backend.store.lock().await;
    let project =
        find_mut(&mut store.projects, &id).ok_or_else(|| Failure::not_found("Project"))?;
    merge(project, &body, &["name", "description", "status"]);
    let project = project.clone();
    Ok(Json(with_counts(&store, &project)))
}

async fn delete_project(State(backend): Backend, Path(id): Path<String>) -> Reply {
    let mut store = backend.store.lock().await;
    let index = store
        .projects
        .iter()
        .position(|project| id_of(project) == id)
        .ok_or_else(|| Failure::not_found("Project"))?;
    let project = store.projects.remove(index);
    let in_project = |item: &Value| item["projectId"].as_str() == Some(id.as_str());
    store.documents.retain(|item| !in_project(item));
    store.templates.retain(|item| !in_project(item));
    let removed: Vec<String> = store
        .extractions
        .iter()
        .filter(|item| in_project(item))
        .map(|item| id_of(item).to_string())
        .collect();
    store.extractions.retain(|item| !in_project(item));
    store
        .fields
        .retain(|field| !removed.iter().any(|id| field["extractionId"] == json!(id)));
    Ok(Json(project))
}

async fn project_statistics(State(backend): Backend, Path(id): Path<String>) -> Reply {
    let store = backend.store.lock().await;
    find(&store.projects, &id).ok_or_else(|| Failure::not_found("Project"))?;
    let extractions: Vec<&Value> = store
        .extractions
        .iter()
        .filter(|item| item["projectId"].as_str() == Some(id.as_str()))
        .collect();
    let with_status =
        |status: &str| extractions.iter().filter(|item| item["status"] == status).count();
    Ok(Json(json!({
        "totalDocuments": store.documents.iter().filter(|d| d["projectId"] == json!(id)).count(),
        "totalFieldTemplates": store.templates.iter().filter(|t| t["projectId"] == json!(id)).count(),
        "totalExtractions": extractions.len(),
        "completedExtractions": with_status("COMPLETED"),
        "failedExtractions": with_status("FAILED"),
    })))
}

async fn list_documents(
    State(backend): Backend,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let store = backend.store.lock().await;
    let documents: Vec<&Value> = store
        .documents
        .iter()
        .filter(|document| matches_query(document, &query, "projectId"))
        .collect();
    Json(json!(documents))
}

fn format_for(file_name: &str) -> &'static str {
    match file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "pdf" => "PDF",
        Some(ext) if ext == "docx" => "DOCX",
        Some(ext) if ext == "html" || ext == "htm" => "HTML",
        _ => "TXT",
    }
}

async fn create_document(State(backend): Backend, Json(body): Json<Value>) -> Reply {
    let body = body_object(body);
    let mut store = backend.store.lock().await;
    let project_id = body
        .get("projectId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    find(&store.projects, &project_id).ok_or_else(|| Failure::not_found("Project"))?;
    let mut document = Value::Object(body);
    document["id"] = json!(new_id());
    document["uploadedAt"] = now();
    store.documents.push(document.clone());
    Ok(Json(document))
}

async fn upload_document(State(backend): Backend, mut multipart: Multipart) -> Reply {
    let mut project_id = None;
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| Failure::bad_request(&["malformed multipart body"]))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("projectId") => {
                project_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|_| Failure::bad_request(&["projectId must be text"]))?,
                );
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| Failure::bad_request(&["unreadable file"]))?;
                file = Some((file_name, content_type, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let project_id = project_id.ok_or_else(|| Failure::bad_request(&["projectId is required"]))?;
    let (file_name, content_type, bytes) =
        file.ok_or_else(|| Failure::bad_request(&["file is required"]))?;
    let mut store = backend.store.lock().await;
    find(&store.projects, &project_id).ok_or_else(|| Failure::not_found("Project"))?;

    let id = new_id();
    let document = json!({
        "id": id,
        "projectId": project_id,
        "fileName": file_name,
        "fileSize": bytes.len(),
        "format": format_for(&file_name),
        "uploadedAt": now(),
        "parsedAt": null,
        "metadata": { "contentType": content_type },
    });
    store.files.insert(id, (bytes, content_type));
    store.documents.push(document.clone());
    Ok(Json(document))
}

async fn get_document(State(backend): Backend, Path(id): Path<String>) -> Reply {
    let store = backend.store.lock().await;
    let document = find(&store.documents, &id).ok_or_else(|| Failure::not_found("Document"))?;
    Ok(Json(document.clone()))
}

async fn delete_document(State(backend): Backend, Path(id): Path<String>) -> Reply {
    let mut store = backend.store.lock().await;
    let index = store
        .documents
        .iter()
        .position(|document| id_of(document) == id)
        .ok_or_else(|| Failure::not_found("Document"))?;
    store.files.remove(&id);
    Ok(Json(store.documents.remove(index)))
}

async fn download_document(
    State(backend): Backend,
    Path(id): Path<String>,
) -> Result<Response, Failure> {
    let store = backend.store.lock().await;
    let (bytes, content_type) = store
        .files
        .get(&id)
        .cloned()
        .ok_or_else(|| Failure::not_found("Document"))?;
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

async fn list_templates(
    State(backend): Backend,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let store = backend.store.lock().await;
    let templates: Vec<&Value> = store
        .templates
        .iter()
        .filter(|template| matches_query(template, &query, "projectId"))
        .collect();
    Json(json!(templates))
}

async fn create_template(State(backend): Backend, Json(body): Json<Value>) -> Reply {
    let body = body_object(body);
    let mut store = backend.store.lock().await;
    let project_id = body
        .get("projectId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    find(&store.projects, &project_id).ok_or_else(|| Failure::not_found("Project"))?;
    if body
        .get("fieldName")
        .and_then(Value::as_str)
        .map_or(true, |name| name.trim().is_empty())
    {
        return Err(Failure::bad_request(&["fieldName should not be empty"]));
    }
    let order = store
        .templates
        .iter()
        .filter(|template| template["projectId"] == json!(project_id))
        .count();
    let template = json!({
        "id": new_id(),
        "projectId": project_id,
        "fieldName": body["fieldName"],
        "fieldType": body.get("fieldType").cloned().unwrap_or_else(|| json!("TEXT")),
        "description": body.get("description").cloned().unwrap_or(Value::Null),
        "isRequired": body.get("isRequired").cloned().unwrap_or(json!(false)),
        "validationRules": body.get("validationRules").cloned().unwrap_or(Value::Null),
        "normalizationRules": body.get("normalizationRules").cloned().unwrap_or(Value::Null),
        "displayOrder": body.get("displayOrder").cloned().unwrap_or(json!(order)),
        "createdAt": now(),
        "updatedAt": now(),
    });
    store.templates.push(template.clone());
    Ok(Json(template))
}

async fn get_template(State(backend): Backend, Path(id): Path<String>) -> Reply {
    let store = backend.store.lock().await;
    let template =
        find(&store.templates, &id).ok_or_else(|| Failure::not_found("Field template"))?;
    Ok(Json(template.clone()))
}

async fn update_template(
    State(backend): Backend,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    let body = body_object(body);
    let mut store = backend.store.lock().await;
    let template = find_mut(&mut store.templates, &id)
        .ok_or_else(|| Failure::not_found("Field template"))?;
    merge(
        template,
        &body,
        &[
            "fieldName",
            "fieldType",
            "description",
            "isRequired",
            "validationRules",
            "normalizationRules",
            "displayOrder",
        ],
    );
    Ok(Json(template.clone()))
}

async fn delete_template(State(backend): Backend, Path(id): Path<String>) -> Reply {
    let mut store = backend.store.lock().await;
    let index = store
        .templates
        .iter()
        .position(|template| id_of(template) == id)
        .ok_or_else(|| Failure::not_found("Field template"))?;
    Ok(Json(store.templates.remove(index)))
}

fn extraction_detail(store: &Store, extraction: &Value) -> Value {
    let id = id_of(extraction);
    let fields: Vec<Value> = store
        .fields
        .iter()
        .filter(|field| field["extractionId"].as_str() == Some(id))
        .map(|field| {
            let field_id = id_of(field);
            let mut field = field.clone();
            field["fieldTemplate"] = field["fieldTemplateId"]
                .as_str()
                .and_then(|template_id| find(&store.templates, template_id))
                .cloned()
                .unwrap_or(Value::Null);
            field["citations"] = json!(store
                .citations
                .iter()
                .filter(|citation| citation["extractedFieldId"].as_str() == Some(field_id))
                .collect::<Vec<_>>());
            field["review"] = store
                .reviews
                .iter()
                .find(|review| review["extractedFieldId"].as_str() == Some(field_id))
                .cloned()
                .unwrap_or(Value::Null);
            field
        })
        .collect();
    let mut extraction = extraction.clone();
    extraction["extractedFields"] = json!(fields);
    extraction
}

async fn list_extractions(
    State(backend): Backend,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let store = backend.store.lock().await;
    let extractions: Vec<&Value> = store
        .extractions
        .iter()
        .filter(|item| matches_query(item, &query, "projectId"))
        .filter(|item| matches_query(item, &query, "documentId"))
        .collect();
    Json(json!(extractions))
}

async fn start_extraction(State(backend): Backend, Json(body): Json<Value>) -> Reply {
    let body = body_object(body);
    let field = |name: &str| {
        body.get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let (project_id, document_id) = (field("projectId"), field("documentId"));
    let mut store = backend.store.lock().await;
    find(&store.projects, &project_id).ok_or_else(|| Failure::not_found("Project"))?;
    find(&store.documents, &document_id).ok_or_else(|| Failure::not_found("Document"))?;
    let extraction = json!({
        "id": new_id(),
        "projectId": project_id,
        "documentId": document_id,
        "status": "PROCESSING",
        "startedAt": now(),
        "completedAt": null,
        "errorMessage": null,
    });
    store.extractions.push(extraction.clone());
    Ok(Json(extraction))
}

async fn get_extraction(State(backend): Backend, Path(id): Path<String>) -> Reply {
    let store = backend.store.lock().await;
    let extraction =
        find(&store.extractions, &id).ok_or_else(|| Failure::not_found("Extraction"))?;
    Ok(Json(extraction_detail(&store, extraction)))
}

async fn complete_extraction(
    State(backend): Backend,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    let mut guard = backend.store.lock().await;
    let store = &mut *guard;
    find(&store.extractions, &id).ok_or_else(|| Failure::not_found("Extraction"))?;
    let inputs = body["extractedFields"].as_array().cloned().unwrap_or_default();
    for input in inputs {
        let field_id = new_id();
        store.fields.push(json!({
            "id": field_id,
            "extractionId": id,
            "fieldTemplateId": input["fieldTemplateId"],
            "rawValue": input.get("rawValue").cloned().unwrap_or(Value::Null),
            "normalizedValue": input.get("normalizedValue").cloned().unwrap_or(Value::Null),
            "confidence": input["confidence"],
            "extractedAt": now(),
        }));
        for citation in input["citations"].as_array().cloned().unwrap_or_default() {
            let mut citation = citation;
            citation["id"] = json!(new_id());
            citation["extractedFieldId"] = json!(field_id);
            store.citations.push(citation);
        }
        store.reviews.push(json!({
            "id": new_id(),
            "extractedFieldId": field_id,
            "status": "PENDING",
            "manualValue": null,
            "reviewerNotes": null,
            "reviewedAt": null,
            "reviewedBy": null,
        }));
    }
    let extraction =
        find_mut(&mut store.extractions, &id).ok_or_else(|| Failure::not_found("Extraction"))?;
    extraction["status"] = json!("COMPLETED");
    extraction["completedAt"] = now();
    let extraction = extraction.clone();
    Ok(Json(extraction_detail(store, &extraction)))
}

async fn fail_extraction(
    State(backend): Backend,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    let mut store = backend.store.lock().await;
    let extraction =
        find_mut(&mut store.extractions, &id).ok_or_else(|| Failure::not_found("Extraction"))?;
    extraction["status"] = json!("FAILED");
    extraction["errorMessage"] = body.get("errorMessage").cloned().unwrap_or(Value::Null);
    extraction["completedAt"] = now();
    Ok(Json(extraction.clone()))
}

fn extraction_of_review<'a>(store: &'a Store, review: &Value) -> Option<&'a Value> {
    let field = find(&store.fields, review["extractedFieldId"].as_str()?)?;
    find(&store.extractions, field["extractionId"].as_str()?)
}

async fn list_reviews(
    State(backend): Backend,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let store = backend.store.lock().await;
    let reviews: Vec<&Value> = store
        .reviews
        .iter()
        .filter(|review| matches_query(review, &query, "status"))
        .filter(|review| match query.get("extractionId") {
            Some(wanted) => extraction_of_review(&store, review)
                .is_some_and(|extraction| id_of(extraction) == wanted),
            None => true,
        })
        .collect();
    Json(json!(reviews))
}

async fn get_review(State(backend): Backend, Path(id): Path<String>) -> Reply {
    let store = backend.store.lock().await;
    let review = find(&store.reviews, &id).ok_or_else(|| Failure::not_found("Review"))?;
    Ok(Json(review.clone()))
}

async fn review_by_field(State(backend): Backend, Path(field_id): Path<String>) -> Reply {
    let store = backend.store.lock().await;
    let review = store
        .reviews
        .iter()
        .find(|review| review["extractedFieldId"].as_str() == Some(field_id.as_str()))
        .ok_or_else(|| Failure::not_found("Review"))?;
    Ok(Json(review.clone()))
}

async fn update_review(
    State(backend): Backend,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    let body = body_object(body);
    if let Some(status) = body.get("status") {
        if !REVIEW_STATUSES.iter().any(|known| status == known) {
            return Err(Failure::bad_request(&["status must be a valid review status"]));
        }
    }
    let mut store = backend.store.lock().await;
    let review = find_mut(&mut store.reviews, &id).ok_or_else(|| Failure::not_found("Review"))?;
    merge(
        review,
        &body,
        &["status", "manualValue", "reviewerNotes", "reviewedBy"],
    );
    if review["status"] != "PENDING" {
        review["reviewedAt"] = now();
    }
    Ok(Json(review.clone()))
}

fn project_reviews<'a>(store: &'a Store, project_id: &str) -> Vec<&'a Value> {
    store
        .reviews
        .iter()
        .filter(|review| {
            extraction_of_review(store, review)
                .is_some_and(|extraction| extraction["projectId"].as_str() == Some(project_id))
        })
        .collect()
}

async fn review_statistics(State(backend): Backend, Path(project_id): Path<String>) -> Json<Value> {
    let store = backend.store.lock().await;
    let reviews = project_reviews(&store, &project_id);
    let count = |status: &str| reviews.iter().filter(|r| r["status"] == status).count();
    Json(json!({
        "total": reviews.len(),
        "pending": count("PENDING"),
        "confirmed": count("CONFIRMED"),
        "rejected": count("REJECTED"),
        "manualUpdated": count("MANUAL_UPDATED"),
        "missingData": count("MISSING_DATA"),
    }))
}

async fn review_progress(State(backend): Backend, Path(project_id): Path<String>) -> Json<Value> {
    let store = backend.store.lock().await;
    let reviews = project_reviews(&store, &project_id);
    let reviewed = reviews.iter().filter(|r| r["status"] != "PENDING").count();
    let percentage = if reviews.is_empty() {
        0.0
    } else {
        reviewed as f64 * 100.0 / reviews.len() as f64
    };
    Json(json!({
        "total": reviews.len(),
        "reviewed": reviewed,
        "percentage": percentage,
    }))
}
