//! Project persistence: arrangements travel as versioned JSON
//! documents on disk. The engine in `arrangement` stays storage-free;
//! this crate owns the file format, the version gate, and the load-time
//! validation boundary.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use arrangement::{Arrangement, Element, TrackMeta};

/// Current on-disk format. Documents carrying any other version are
/// refused at load; there is no silent migration.
pub const DOCUMENT_VERSION: u32 = 1;

pub fn app_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(std::env::temp_dir);
    base.join("frameline")
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported document version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error(transparent)]
    InvalidElement(#[from] arrangement::ArrangementError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub version: u32,
    pub name: String,
    /// Unix seconds.
    pub created_at: i64,
    pub modified_at: i64,
    pub elements: Vec<Element>,
    #[serde(default)]
    pub tracks: Vec<TrackMeta>,
}

impl ProjectDocument {
    pub fn new(name: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            version: DOCUMENT_VERSION,
            name: name.into(),
            created_at: now,
            modified_at: now,
            elements: Vec::new(),
            tracks: vec![TrackMeta::new("Main")],
        }
    }

    pub fn from_arrangement(arr: &Arrangement) -> Self {
        let mut doc = Self::new(arr.name.clone());
        doc.elements = arr.elements.clone();
        doc.tracks = arr.tracks.clone();
        doc
    }

    pub fn into_arrangement(self) -> Arrangement {
        let mut arr = Arrangement::new(self.name);
        arr.elements = self.elements;
        arr.tracks = self.tracks;
        arr
    }
}

/// Read and validate a document. Version mismatch and malformed
/// elements are both load failures; a half-valid document never
/// reaches the engine.
pub fn load_document(path: &Path) -> Result<ProjectDocument, ProjectError> {
    let raw = fs::read_to_string(path)?;
    let doc: ProjectDocument = serde_json::from_str(&raw)?;
    if doc.version != DOCUMENT_VERSION {
        return Err(ProjectError::UnsupportedVersion {
            found: doc.version,
            supported: DOCUMENT_VERSION,
        });
    }
    for element in &doc.elements {
        element.validate()?;
    }
    Ok(doc)
}

/// Write the document, re-stamping `modified_at`. Parent directories
/// are created as needed.
pub fn save_document(path: &Path, doc: &mut ProjectDocument) -> Result<(), ProjectError> {
    doc.modified_at = chrono::Utc::now().timestamp();
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(doc)?;
    fs::write(path, json)?;
    Ok(())
}

/// Project documents under `dir`, newest modification first. Missing
/// directories read as empty rather than failing, so a fresh install
/// lists no projects.
pub fn list_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut out: Vec<(std::time::SystemTime, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let modified = entry
            .metadata()?
            .modified()
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        out.push((modified, path));
    }
    out.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(out.into_iter().map(|(_, p)| p).collect())
}
