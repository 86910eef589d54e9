//! Per-category extraction schemas.
//!
//! Each triage category maps to a JSON schema file describing the fields the
//! extraction stage should pull out of a notice. A missing schema is a signal,
//! not an error: it means the category has no extraction support yet and the
//! notice fails with a reviewable record instead of producing garbage.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use crate::model::NoticeCategory;

/// Source of extraction schemas, keyed by category.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Return the schema text for a category, or `None` when the category has
    /// no schema configured.
    async fn schema_for(&self, category: NoticeCategory) -> Option<String>;
}

/// Schema provider backed by a directory of `<category>.json` files.
///
/// Lookup tries the lowercased canonical name first (`land_property.json`),
/// then the canonical spelling as-is (`Land_Property.json`), so deployments
/// can name files either way.
pub struct DirSchemaProvider {
    dir: PathBuf,
}

impl DirSchemaProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirSchemaProvider { dir: dir.into() }
    }
}

#[async_trait]
impl SchemaProvider for DirSchemaProvider {
    async fn schema_for(&self, category: NoticeCategory) -> Option<String> {
        let canonical = category.as_str();
        let candidates = [
            self.dir.join(format!("{}.json", canonical.to_lowercase())),
            self.dir.join(format!("{canonical}.json")),
        ];

        for path in &candidates {
            match tokio::fs::read_to_string(path).await {
                Ok(text) => {
                    debug!("Loaded schema for {canonical} from {}", path.display());
                    return Some(text);
                }
                Err(_) => continue,
            }
        }
        debug!("No schema file for category {canonical} under {}", self.dir.display());
        None
    }
}

/// In-memory provider for tests and embedding.
pub struct StaticSchemaProvider {
    entries: Vec<(NoticeCategory, String)>,
}

impl StaticSchemaProvider {
    pub fn new(entries: impl IntoIterator<Item = (NoticeCategory, String)>) -> Self {
        StaticSchemaProvider {
            entries: entries.into_iter().collect(),
        }
    }
}

#[async_trait]
impl SchemaProvider for StaticSchemaProvider {
    async fn schema_for(&self, category: NoticeCategory) -> Option<String> {
        self.entries
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, s)| s.clone())
    }
}
