//! The staging document: accumulated records not yet drained into the store.
//!
//! On disk it is a JSON object keyed by generated id:
//!
//! ```json
//! {
//!     "genArt0001": {
//!         "Type": "General Article",
//!         "Name": "Random headline",
//!         "URL": "https://example.com/a"
//!     }
//! }
//! ```
//!
//! The field names are a compatibility surface with counter restore and
//! resume, so `Type` is kept verbatim as read. In memory the document keeps
//! a URL set next to the records; it is rebuilt on load and extended on
//! every insert. Writes go to a sibling temp file and are renamed into
//! place.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::error::{PipelineError, Result};
use crate::models::ArticleRecord;

/// One staged record. Status and notebook link are added at sync time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedRecord {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "URL", default)]
    pub url: String,
}

impl StagedRecord {
    pub fn new(category: Category, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: category.label(),
            name: name.into(),
            url: url.into(),
        }
    }

    pub fn category(&self) -> Option<Category> {
        Category::from_label(&self.kind)
    }

    /// The canonical record for this entry, or `None` for an unknown `Type`.
    pub fn to_record(&self, id: &str) -> Option<ArticleRecord> {
        let category = self.category()?;
        Some(ArticleRecord::new_uncovered(
            id,
            self.name.clone(),
            category,
            self.url.clone(),
        ))
    }
}

#[derive(Debug, Clone, Default)]
pub struct StagingDocument {
    records: BTreeMap<String, StagedRecord>,
    urls: HashSet<String>,
    dirty: bool,
}

impl StagingDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the document at `path`; a missing file is [`PipelineError::InputNotFound`].
    pub fn load(path: &Path) -> Result<Self> {
        let origin = path.display().to_string();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::input_not_found(origin.clone(), e))?;
        Self::from_json(&origin, &content)
    }

    /// Reads the document at `path`, or starts empty when it does not exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    pub fn from_json(origin: &str, content: &str) -> Result<Self> {
        let records: BTreeMap<String, StagedRecord> =
            serde_json::from_str(content).map_err(|e| PipelineError::malformed(origin, e))?;
        let urls = records
            .values()
            .filter(|r| !r.url.is_empty())
            .map(|r| r.url.clone())
            .collect();
        Ok(Self {
            records,
            urls,
            dirty: false,
        })
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    /// Adds a record under `id`. Returns `false` and leaves the document
    /// unchanged if `id` is already present.
    pub fn insert(&mut self, id: impl Into<String>, record: StagedRecord) -> bool {
        let id = id.into();
        if self.records.contains_key(&id) {
            return false;
        }
        if !record.url.is_empty() {
            self.urls.insert(record.url.clone());
        }
        self.records.insert(id, record);
        self.dirty = true;
        true
    }

    pub fn get(&self, id: &str) -> Option<&StagedRecord> {
        self.records.get(id)
    }

    /// Records in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &StagedRecord)> {
        self.records.iter()
    }

    pub fn ids(&self) -> HashSet<String> {
        self.records.keys().cloned().collect()
    }

    pub fn urls(&self) -> &HashSet<String> {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `true` when records were added since the last load or save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Serializes with four-space indentation.
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.records
            .serialize(&mut ser)
            .map_err(|e| PipelineError::malformed("staging document", e))?;
        String::from_utf8(buf).map_err(|e| PipelineError::malformed("staging document", e))
    }

    /// Writes the document to `path` through a temp file and rename.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        let write_err = |source| PipelineError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        // Serialize before touching the file so a failure leaves it intact.
        let json = self.to_json()?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(write_err)?;
        std::fs::rename(&tmp, path).map_err(write_err)?;
        self.dirty = false;
        Ok(())
    }

    /// Saves only if there are unsaved records. Returns whether it wrote.
    pub fn flush(&mut self, path: &Path) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.save(path)?;
        tracing::debug!(path = %path.display(), records = self.len(), "staging flushed");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> StagingDocument {
        let mut doc = StagingDocument::new();
        doc.insert(
            "genArt0001",
            StagedRecord::new(Category::GeneralArticle, "Random headline", "https://x/a"),
        );
        doc.insert(
            "mainsAns0001",
            StagedRecord::new(Category::MainsAnswerWeekly(Some(7)), "topic", "https://x/m"),
        );
        doc
    }

    #[test]
    fn test_json_shape() {
        let json = sample().to_json().unwrap();
        assert!(json.starts_with("{\n    \"genArt0001\": {\n        \"Type\": \"General Article\""));
        assert!(json.contains("\"Type\": \"Mains Answer Writing - Week 7\""));
        assert!(json.contains("\"URL\": \"https://x/m\""));
    }

    #[test]
    fn test_save_and_reload_preserves_ids_and_urls() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("backup.json");

        let mut doc = sample();
        assert!(doc.is_dirty());
        doc.save(&path).unwrap();
        assert!(!doc.is_dirty());

        let reloaded = StagingDocument::load(&path).unwrap();
        assert_eq!(reloaded.ids(), doc.ids());
        assert_eq!(reloaded.urls(), doc.urls());
        assert_eq!(reloaded.to_json().unwrap(), doc.to_json().unwrap());
        assert!(!reloaded.is_dirty());
    }

    #[test]
    fn test_failed_save_leaves_previous_file_intact() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("backup.json");
        sample().save(&path).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        // A directory where the temp file should go makes the write fail.
        std::fs::create_dir(path.with_extension("json.tmp")).unwrap();
        let mut doc = sample();
        doc.insert(
            "uKey0001",
            StagedRecord::new(Category::UpscKey, "k", "https://x/k"),
        );
        let err = doc.save(&path).unwrap_err();

        assert!(matches!(err, PipelineError::Write { .. }));
        assert!(doc.is_dirty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_foreign_type_label_is_kept_verbatim() {
        let content = r#"{"mainsAns0004": {"Type": "Mains Answer Writing", "Name": "n", "URL": "u"}}"#;
        let doc = StagingDocument::from_json("test", content).unwrap();
        let record = doc.get("mainsAns0004").unwrap();
        assert_eq!(record.kind, "Mains Answer Writing");
        assert_eq!(record.category(), Some(Category::MainsAnswerWeekly(None)));
        assert!(doc.to_json().unwrap().contains("\"Type\": \"Mains Answer Writing\""));
    }

    #[test]
    fn test_missing_and_malformed() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("missing.json");
        assert!(matches!(
            StagingDocument::load(&missing),
            Err(PipelineError::InputNotFound { .. })
        ));
        assert!(StagingDocument::load_or_default(&missing).unwrap().is_empty());

        assert!(matches!(
            StagingDocument::from_json("test", "[1, 2, 3]"),
            Err(PipelineError::MalformedInput { .. })
        ));
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let mut doc = sample();
        let inserted = doc.insert(
            "genArt0001",
            StagedRecord::new(Category::GeneralArticle, "other", "https://x/other"),
        );
        assert!(!inserted);
        assert!(!doc.contains_url("https://x/other"));
    }
}
