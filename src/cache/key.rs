use std::fmt;

/// Composite cache key: a resource name followed by optional parameters,
/// e.g. `projects` or `projects/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new(resource: impl Into<String>) -> Self {
        Self(vec![resource.into()])
    }

    pub fn with(mut self, part: impl Into<String>) -> Self {
        self.0.push(part.into());
        self
    }

    /// Appends `part` only when present, so an unfiltered list keeps the
    /// bare resource key.
    pub fn with_opt(self, part: Option<&str>) -> Self {
        match part {
            Some(part) => self.with(part),
            None => self,
        }
    }

    /// Invalidation matches by prefix: `projects` covers `projects/<id>`.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.len() >= prefix.0.len() && self.0.iter().zip(&prefix.0).all(|(a, b)| a == b)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// Keys shared between the views that read a resource and the mutations
/// that change it.
pub mod keys {
    use super::QueryKey;

    pub fn health() -> QueryKey {
        QueryKey::new("health")
    }

    pub fn projects() -> QueryKey {
        QueryKey::new("projects")
    }

    pub fn project(id: &str) -> QueryKey {
        projects().with(id)
    }

    pub fn project_statistics(id: &str) -> QueryKey {
        project(id).with("statistics")
    }

    pub fn documents(project_id: Option<&str>) -> QueryKey {
        QueryKey::new("documents").with_opt(project_id)
    }

    pub fn field_templates(project_id: Option<&str>) -> QueryKey {
        QueryKey::new("field-templates").with_opt(project_id)
    }

    pub fn extractions() -> QueryKey {
        QueryKey::new("extractions")
    }

    pub fn extraction(id: &str) -> QueryKey {
        extractions().with("detail").with(id)
    }

    pub fn reviews() -> QueryKey {
        QueryKey::new("reviews")
    }

    pub fn review_statistics(project_id: &str) -> QueryKey {
        reviews().with("statistics").with(project_id)
    }

    pub fn review_progress(project_id: &str) -> QueryKey {
        reviews().with("progress").with(project_id)
    }
}
