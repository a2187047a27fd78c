use async_trait::async_trait;

use super::{error_banner, View};
use crate::cache::{keys, QueryObserver, QueryState};
use crate::models::HealthStatus;
use crate::state::AppState;

pub struct Feature {
    pub title: &'static str,
    pub description: &'static str,
    pub command: &'static str,
}

pub const FEATURES: [Feature; 5] = [
    Feature {
        title: "Projects",
        description: "Organize and manage legal document review projects",
        command: "projects",
    },
    Feature {
        title: "Documents",
        description: "Upload and process legal documents for review",
        command: "documents",
    },
    Feature {
        title: "Field Templates",
        description: "Define custom fields to extract from documents",
        command: "field-templates",
    },
    Feature {
        title: "Extractions",
        description: "View and manage extracted field data with citations",
        command: "extractions",
    },
    Feature {
        title: "Reviews",
        description: "Review and validate extracted information",
        command: "reviews",
    },
];

pub struct HomeView {
    health: QueryObserver<HealthStatus>,
    snapshot: QueryState<HealthStatus>,
}

impl HomeView {
    pub async fn mount(state: &AppState) -> Self {
        let api = state.api.clone();
        let health = state
            .queries
            .observe(keys::health(), move || {
                let api = api.clone();
                async move { api.health().check().await }
            })
            .await;
        let snapshot = health.state().await;
        Self { health, snapshot }
    }

    pub fn health(&self) -> Option<&HealthStatus> {
        self.snapshot.data.as_deref()
    }
}

#[async_trait]
impl View for HomeView {
    fn title(&self) -> &'static str {
        "Document Review"
    }

    async fn load(&mut self) {
        self.snapshot = self.health.load().await;
    }

    fn render(&self) -> String {
        let mut lines = vec![
            self.title().to_string(),
            "Professional document analysis and review platform".to_string(),
            String::new(),
        ];
        match (&self.snapshot.data, &self.snapshot.error) {
            (Some(health), _) => lines.push(format!(
                "Backend: {} ({}, {})",
                health.status,
                health.service,
                health.timestamp.to_rfc3339()
            )),
            (None, Some(error)) => lines.push(error_banner(error)),
            (None, None) => {}
        }
        lines.push(String::new());
        for feature in &FEATURES {
            lines.push(format!(
                "{:<16} {}  (review-console {})",
                feature.title, feature.description, feature.command
            ));
        }
        lines.join("\n")
    }
}
