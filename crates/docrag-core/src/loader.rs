//! Turns ingestion sources (files, directories, inline text) into documents.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{Document, DocumentFormat};

#[derive(Debug, Clone)]
pub enum DocumentSource {
    File(PathBuf),
    /// Every file below the directory whose extension the loader accepts.
    Directory(PathBuf),
    Inline { source: String, title: String, text: String, format: DocumentFormat },
}

impl DocumentSource {
    pub fn inline(source: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Inline { source: source.into(), title: title.into(), text: text.into(), format: DocumentFormat::Text }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::File(p) | Self::Directory(p) => p.display().to_string(),
            Self::Inline { source, .. } => source.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentLoader {
    extensions: Vec<String>,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::new(["txt", "md", "rst"])
    }
}

impl DocumentLoader {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        Self { extensions }
    }

    /// Loads every document named by `source`, skipping empty ones.
    pub fn load(&self, source: &DocumentSource) -> Result<Vec<Document>> {
        let documents = match source {
            DocumentSource::File(path) => {
                if !path.is_file() {
                    return Err(Error::NotFound(format!("file {}", path.display())));
                }
                vec![self.load_file(path)?]
            }
            DocumentSource::Directory(dir) => {
                if !dir.is_dir() {
                    return Err(Error::NotFound(format!("directory {}", dir.display())));
                }
                let files = self.list_files(dir);
                info!(dir = %dir.display(), files = files.len(), "found documents");
                files.iter().map(|f| self.load_file(f)).collect::<Result<Vec<_>>>()?
            }
            DocumentSource::Inline { source, title, text, format } => {
                vec![Document::new(source.clone(), title.clone(), text.clone(), *format)]
            }
        };
        Ok(documents
            .into_iter()
            .filter(|d| {
                let keep = !d.text.trim().is_empty();
                if !keep {
                    debug!(source = %d.source, "skipping empty document");
                }
                keep
            })
            .collect())
    }

    fn load_file(&self, path: &Path) -> Result<Document> {
        let text = read_file_content(path)?;
        let title = path
            .file_stem()
            .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().to_string());
        Ok(Document::new(path.to_string_lossy().to_string(), title, text, DocumentFormat::from_path(path)))
    }

    /// Accepted files below `root`, sorted for a deterministic ingestion order.
    pub fn list_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
            })
            .map(|e| e.path().to_path_buf())
            .collect();
        files.sort();
        files
    }
}

fn read_file_content(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(path)?).to_string()),
    }
}
