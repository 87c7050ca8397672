//! Loading documents from a directory.
//!
//! `.txt` and `.md` files are chunked with the [`RecursiveSplitter`]; `.json`
//! files hold an array of already chunked [`Document`]s. Files that cannot be
//! read or parsed are logged and skipped.

use crate::chunk::RecursiveSplitter;
use crate::error::IngestError;
use mangrove_core::{Document, DocumentMetadata};
use std::path::{Path, PathBuf};

/// File extensions the loader understands.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "json"];

/// True if `path` has a supported extension (case-insensitive).
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Turns files into corpus documents.
pub struct DocumentLoader {
    splitter: RecursiveSplitter,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::new(RecursiveSplitter::default())
    }
}

impl DocumentLoader {
    pub fn new(splitter: RecursiveSplitter) -> Self {
        Self { splitter }
    }

    /// Chunk `text` into documents attributed to `path`.
    pub fn chunk_text(&self, text: &str, path: &Path) -> Vec<Document> {
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let file_path = path.display().to_string();
        self.splitter
            .split(text)
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let metadata = DocumentMetadata::new(source.clone(), i)
                    .with_extra("file_path", serde_json::Value::String(file_path.clone()));
                Document::new(chunk, metadata)
            })
            .collect()
    }

    /// Load one file.
    pub async fn load_file(&self, path: &Path) -> Result<Vec<Document>, IngestError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let io_err = |source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        };

        match ext.as_deref() {
            Some("txt") | Some("md") => {
                let text = tokio::fs::read_to_string(path).await.map_err(io_err)?;
                Ok(self.chunk_text(&text, path))
            }
            Some("json") => {
                let raw = tokio::fs::read_to_string(path).await.map_err(io_err)?;
                serde_json::from_str::<Vec<Document>>(&raw).map_err(|e| IngestError::Parse {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
            _ => Err(IngestError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Load every supported file under `dir`, in sorted path order.
    ///
    /// A missing directory yields an empty corpus.
    pub async fn load_dir(&self, dir: &Path) -> Vec<Document> {
        if !dir.exists() {
            tracing::warn!(dir = %dir.display(), "Documents directory does not exist");
            return Vec::new();
        }

        let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(dir)
            .into_iter()
            .flatten()
            .filter(|entry| entry.file_type().is_file() && is_supported(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        paths.sort();

        let mut documents = Vec::new();
        for path in paths {
            match self.load_file(&path).await {
                Ok(docs) => {
                    tracing::debug!(path = %path.display(), chunks = docs.len(), "Loaded file");
                    documents.extend(docs);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping file")
                }
            }
        }
        documents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_is_supported() {
        assert!(is_supported(Path::new("notes.md")));
        assert!(is_supported(Path::new("NOTES.TXT")));
        assert!(is_supported(Path::new("chunks.json")));
        assert!(!is_supported(Path::new("paper.pdf")));
        assert!(!is_supported(Path::new("README")));
    }

    #[test]
    fn test_chunk_text_metadata() {
        let loader = DocumentLoader::new(RecursiveSplitter::new(12, 0));
        let docs = loader.chunk_text("first part\n\nsecond part", Path::new("/data/notes.txt"));
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source(), Some("notes.txt"));
        assert_eq!(docs[1].metadata.chunk_index, 1);
        assert_eq!(docs[1].metadata.extra["file_path"], "/data/notes.txt");
    }

    #[tokio::test]
    async fn test_load_dir_mixed_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.md"), "Mangroves store carbon.").unwrap();
        std::fs::write(
            dir.path().join("a.json"),
            r#"[{"content": "Roots trap sediment", "metadata": {"source": "field.pdf", "chunk_index": 4}}]"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("ignored.pdf"), "%PDF").unwrap();

        let docs = DocumentLoader::default().load_dir(dir.path()).await;
        let contents: Vec<&str> = docs.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["Roots trap sediment", "Mangroves store carbon."]);
        assert_eq!(docs[0].source(), Some("field.pdf"));
        assert_eq!(docs[1].source(), Some("b.md"));
    }

    #[tokio::test]
    async fn test_load_dir_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let docs = DocumentLoader::default()
            .load_dir(&dir.path().join("nope"))
            .await;
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_load_file_unsupported() {
        let err = DocumentLoader::default()
            .load_file(Path::new("paper.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat { .. }));
    }
}
