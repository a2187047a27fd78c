use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use review_console::{
    config::ClientConfig,
    models::{CompleteExtraction, FieldType, ProjectStatus, ReviewFilter, ReviewStatus},
    views::{
        DocumentsView, ExtractionsView, FieldTemplatesView, HomeView, ProjectDetailView,
        ProjectsView, ReviewsView, View,
    },
    AppState,
};

#[derive(Parser)]
#[command(
    name = "review-console",
    version,
    about = "Admin console for legal document review"
)]
struct Cli {
    /// Backend base URL; overrides API_URL.
    #[arg(long, global = true, env = "API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Landing page with backend status.
    Home,
    /// Probe the backend health endpoint.
    Health,
    #[command(subcommand)]
    Projects(ProjectCommand),
    #[command(subcommand)]
    Documents(DocumentCommand),
    #[command(subcommand)]
    FieldTemplates(TemplateCommand),
    #[command(subcommand)]
    Extractions(ExtractionCommand),
    #[command(subcommand)]
    Reviews(ReviewCommand),
}

#[derive(Subcommand)]
enum ProjectCommand {
    List,
    Show {
        id: String,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        status: Option<ProjectStatus>,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        /// Pass an empty string to clear.
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        status: Option<ProjectStatus>,
    },
    Delete {
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum DocumentCommand {
    List {
        #[arg(long)]
        project: Option<String>,
    },
    Upload {
        path: PathBuf,
        #[arg(long)]
        project: String,
    },
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
    /// Print the download link.
    Url {
        id: String,
    },
}

#[derive(Subcommand)]
enum TemplateCommand {
    List {
        #[arg(long)]
        project: Option<String>,
    },
    Create {
        #[arg(long)]
        project: String,
        #[arg(long)]
        name: String,
        #[arg(long = "type", default_value = "TEXT")]
        field_type: FieldType,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        required: bool,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "type")]
        field_type: Option<FieldType>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        required: Option<bool>,
    },
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ExtractionCommand {
    List {
        #[arg(long)]
        project: Option<String>,
    },
    Show {
        id: String,
    },
    Start {
        #[arg(long)]
        document: String,
    },
    /// Record extracted fields from a JSON file (`{"extractedFields": [...]}`).
    Complete {
        id: String,
        #[arg(long)]
        fields: PathBuf,
    },
    Fail {
        id: String,
        #[arg(long)]
        message: String,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ReviewCommand {
    List {
        #[arg(long)]
        status: Option<ReviewStatus>,
        #[arg(long)]
        extraction: Option<String>,
        /// Show review statistics and progress for a project.
        #[arg(long)]
        project: Option<String>,
    },
    Update {
        id: String,
        #[arg(long)]
        status: Option<ReviewStatus>,
        #[arg(long)]
        manual_value: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        reviewer: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(api_url) = cli.api_url.as_deref() {
        config = config.with_api_url(api_url)?;
    }
    let state = AppState::new(config).context("failed to build HTTP client")?;

    let outcome = match cli.command {
        Commands::Home => show(HomeView::mount(&state).await).await,
        Commands::Health => health(&state).await,
        Commands::Projects(command) => projects(&state, command).await,
        Commands::Documents(command) => documents(&state, command).await,
        Commands::FieldTemplates(command) => templates(&state, command).await,
        Commands::Extractions(command) => extractions(&state, command).await,
        Commands::Reviews(command) => reviews(&state, command).await,
    };

    state.shutdown().await;
    outcome
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn show(mut view: impl View) -> Result<()> {
    view.load().await;
    println!("{}", view.render());
    Ok(())
}

async fn confirmed(prompt: Option<String>, yes: bool) -> Result<bool> {
    let Some(prompt) = prompt else {
        return Ok(false);
    };
    if yes {
        return Ok(true);
    }
    println!("{prompt}");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read confirmation")?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

async fn health(state: &AppState) -> Result<()> {
    let status = state.api.health().check().await?;
    println!("{} ({}) at {}", status.status, status.service, status.timestamp);
    Ok(())
}

async fn projects(state: &AppState, command: ProjectCommand) -> Result<()> {
    match command {
        ProjectCommand::List => show(ProjectsView::mount(state).await).await,
        ProjectCommand::Show { id } => show(ProjectDetailView::mount(state, &id).await).await,
        ProjectCommand::Create {
            name,
            description,
            status,
        } => {
            let mut view = ProjectsView::mount(state).await;
            view.open_create();
            if let Some(form) = view.form_mut() {
                form.name = name;
                form.description = description;
                form.status = status;
            }
            let project = view.submit().await?;
            println!("Created project {} ({})", project.name, project.id);
            Ok(())
        }
        ProjectCommand::Update {
            id,
            name,
            description,
            status,
        } => {
            let mut view = ProjectsView::mount(state).await;
            view.load().await;
            view.open_edit(&id)?;
            if let Some(form) = view.form_mut() {
                if let Some(name) = name {
                    form.name = name;
                }
                if let Some(description) = description {
                    form.description = description;
                }
                if status.is_some() {
                    form.status = status;
                }
            }
            let project = view.submit().await?;
            println!("Updated project {} ({})", project.name, project.id);
            Ok(())
        }
        ProjectCommand::Delete { id, yes } => {
            let mut view = ProjectsView::mount(state).await;
            view.load().await;
            view.request_delete(&id);
            let prompt = view.confirmation().map(|pending| pending.prompt.clone());
            if confirmed(prompt, yes).await? {
                view.confirm().await?;
                println!("Deleted project {id}");
            } else {
                view.cancel_confirmation();
                println!("Cancelled.");
            }
            Ok(())
        }
    }
}

async fn documents(state: &AppState, command: DocumentCommand) -> Result<()> {
    match command {
        DocumentCommand::List { project } => {
            show(DocumentsView::mount(state, project.as_deref()).await).await
        }
        DocumentCommand::Upload { path, project } => {
            let mut view = DocumentsView::mount(state, Some(&project)).await;
            view.open_upload();
            if let Some(form) = view.form_mut() {
                form.file = Some(path);
            }
            let document = view.submit().await?;
            println!(
                "Uploaded {} ({}, {} bytes) as {}",
                document.file_name, document.format, document.file_size, document.id
            );
            Ok(())
        }
        DocumentCommand::Delete { id, yes } => {
            let mut view = DocumentsView::mount(state, None).await;
            view.load().await;
            view.request_delete(&id);
            let prompt = view.confirmation().map(|pending| pending.prompt.clone());
            if confirmed(prompt, yes).await? {
                view.confirm().await?;
                println!("Deleted document {id}");
            } else {
                view.cancel_confirmation();
                println!("Cancelled.");
            }
            Ok(())
        }
        DocumentCommand::Url { id } => {
            let view = DocumentsView::mount(state, None).await;
            println!("{}", view.download_url(&id)?);
            Ok(())
        }
    }
}

async fn templates(state: &AppState, command: TemplateCommand) -> Result<()> {
    match command {
        TemplateCommand::List { project } => {
            show(FieldTemplatesView::mount(state, project.as_deref()).await).await
        }
        TemplateCommand::Create {
            project,
            name,
            field_type,
            description,
            required,
        } => {
            let mut view = FieldTemplatesView::mount(state, Some(&project)).await;
            view.open_create();
            if let Some(form) = view.form_mut() {
                form.field_name = name;
                form.field_type = field_type;
                form.description = description;
                form.is_required = required;
            }
            let template = view.submit().await?;
            println!("Created field template {} ({})", template.field_name, template.id);
            Ok(())
        }
        TemplateCommand::Update {
            id,
            name,
            field_type,
            description,
            required,
        } => {
            let mut view = FieldTemplatesView::mount(state, None).await;
            view.load().await;
            view.open_edit(&id)?;
            if let Some(form) = view.form_mut() {
                if let Some(name) = name {
                    form.field_name = name;
                }
                if let Some(field_type) = field_type {
                    form.field_type = field_type;
                }
                if let Some(description) = description {
                    form.description = description;
                }
                if let Some(required) = required {
                    form.is_required = required;
                }
            }
            let template = view.submit().await?;
            println!("Updated field template {} ({})", template.field_name, template.id);
            Ok(())
        }
        TemplateCommand::Delete { id, yes } => {
            let mut view = FieldTemplatesView::mount(state, None).await;
            view.load().await;
            view.request_delete(&id);
            let prompt = view.confirmation().map(|pending| pending.prompt.clone());
            if confirmed(prompt, yes).await? {
                view.confirm().await?;
                println!("Deleted field template {id}");
            } else {
                view.cancel_confirmation();
                println!("Cancelled.");
            }
            Ok(())
        }
    }
}

async fn extractions(state: &AppState, command: ExtractionCommand) -> Result<()> {
    match command {
        ExtractionCommand::List { project } => {
            show(ExtractionsView::mount(state, project.as_deref()).await).await
        }
        ExtractionCommand::Show { id } => {
            let mut view = ExtractionsView::mount(state, None).await;
            view.load().await;
            view.open_details(&id).await;
            println!("{}", view.render());
            Ok(())
        }
        ExtractionCommand::Start { document } => {
            let mut view = ExtractionsView::mount(state, None).await;
            view.load().await;
            view.open_start();
            if let Some(form) = view.form_mut() {
                form.document_id = document;
            }
            let extraction = view.submit().await?;
            println!("Started extraction {} ({})", extraction.id, extraction.status);
            Ok(())
        }
        ExtractionCommand::Complete { id, fields } => {
            let raw = tokio::fs::read_to_string(&fields)
                .await
                .with_context(|| format!("failed to read {}", fields.display()))?;
            let payload: CompleteExtraction =
                serde_json::from_str(&raw).context("invalid extracted fields file")?;
            let mut view = ExtractionsView::mount(state, None).await;
            view.load().await;
            let extraction = view.complete(&id, payload).await?;
            println!(
                "Extraction {} is {} with {} fields",
                extraction.id,
                extraction.status,
                extraction.extracted_fields.as_ref().map_or(0, Vec::len)
            );
            Ok(())
        }
        ExtractionCommand::Fail { id, message, yes } => {
            let mut view = ExtractionsView::mount(state, None).await;
            view.load().await;
            view.request_fail(&id, &message)?;
            let prompt = view.confirmation().map(|pending| pending.prompt.clone());
            if confirmed(prompt, yes).await? {
                let extraction = view.confirm().await?;
                println!("Extraction {} is {}", extraction.id, extraction.status);
            } else {
                view.cancel_confirmation();
                println!("Cancelled.");
            }
            Ok(())
        }
    }
}

async fn reviews(state: &AppState, command: ReviewCommand) -> Result<()> {
    match command {
        ReviewCommand::List {
            status,
            extraction,
            project,
        } => {
            let filter = ReviewFilter {
                extraction_id: extraction,
                status,
            };
            let mut view = ReviewsView::mount(state, filter).await;
            if let Some(project) = project.as_deref() {
                view.show_project_summary(project).await;
            }
            show(view).await
        }
        ReviewCommand::Update {
            id,
            status,
            manual_value,
            notes,
            reviewer,
        } => {
            let mut view = ReviewsView::mount(state, ReviewFilter::default()).await;
            view.load().await;
            view.open_edit(&id)?;
            let Some(form) = view.form_mut() else {
                bail!("review {id} could not be opened");
            };
            if let Some(status) = status {
                form.status = status;
            }
            if let Some(manual_value) = manual_value {
                form.manual_value = manual_value;
            }
            if let Some(notes) = notes {
                form.reviewer_notes = notes;
            }
            if let Some(reviewer) = reviewer {
                form.reviewed_by = reviewer;
            }
            let review = view.submit().await?;
            println!("Review {} is {}", review.id, review.status);
            Ok(())
        }
    }
}
