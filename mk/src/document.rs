//! Line-addressed documents and the editor seam used by write-back
//!
//! [`Documents`] is what the sync engine needs from an editor: open a file as
//! text, apply a single-line edit if the line still holds what we expect,
//! save, reveal a line, and tell the user when something went wrong.
//! [`FsDocuments`] implements it directly on the file system.

use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use colored::*;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::DocumentError;

/// Full text of a file, addressable by 0-based line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    path: PathBuf,
    text: String,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of lines; a trailing newline starts one more (empty) line
    pub fn line_count(&self) -> usize {
        self.text.matches('\n').count() + 1
    }

    /// Text of line `n` without its terminator
    pub fn line(&self, n: usize) -> Result<&str, DocumentError> {
        let range = self.line_range(n, false)?;
        Ok(&self.text[range])
    }

    /// Byte range of line `n`, optionally including its `\n` or `\r\n`
    pub fn line_range(&self, n: usize, include_terminator: bool) -> Result<Range<usize>, DocumentError> {
        let mut start = 0;
        for _ in 0..n {
            match self.text[start..].find('\n') {
                Some(offset) => start += offset + 1,
                None => return Err(self.out_of_range(n)),
            }
        }

        let (content_end, full_end) = match self.text[start..].find('\n') {
            Some(offset) => {
                let newline = start + offset;
                let content_end = if self.text[..newline].ends_with('\r') {
                    newline - 1
                } else {
                    newline
                };
                (content_end, newline + 1)
            }
            None => (self.text.len(), self.text.len()),
        };

        Ok(start..if include_terminator { full_end } else { content_end })
    }

    fn out_of_range(&self, line: usize) -> DocumentError {
        DocumentError::LineOutOfRange {
            path: self.path.clone(),
            line,
            line_count: self.line_count(),
        }
    }

    /// Replace the content of line `n`, keeping its terminator
    fn replace_line(&mut self, n: usize, new_text: &str) -> Result<(), DocumentError> {
        let range = self.line_range(n, false)?;
        self.text.replace_range(range, new_text);
        Ok(())
    }

    /// Delete line `n` including its terminator
    ///
    /// The last line has no terminator of its own, so the newline before it goes instead.
    fn delete_line(&mut self, n: usize) -> Result<(), DocumentError> {
        let range = self.line_range(n, true)?;
        let range = if range.end == self.text.len() && !self.text[range.clone()].ends_with('\n') && n > 0 {
            let before = &self.text[..range.start];
            let trim = if before.ends_with("\r\n") { 2 } else { 1 };
            (range.start - trim)..range.end
        } else {
            range
        };
        self.text.replace_range(range, "");
        Ok(())
    }
}

/// A single-line edit, guarded by the line text the caller expects to find
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEdit {
    Replace {
        path: PathBuf,
        line: usize,
        expected: String,
        new_text: String,
    },
    Delete {
        path: PathBuf,
        line: usize,
        expected: String,
    },
}

impl LineEdit {
    pub fn path(&self) -> &Path {
        match self {
            Self::Replace { path, .. } | Self::Delete { path, .. } => path,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            Self::Replace { line, .. } | Self::Delete { line, .. } => *line,
        }
    }

    fn expected(&self) -> &str {
        match self {
            Self::Replace { expected, .. } | Self::Delete { expected, .. } => expected,
        }
    }

    /// Apply to `document` if the addressed line still equals `expected`
    ///
    /// Returns false, leaving the document untouched, when it does not.
    pub fn apply_to(&self, document: &mut Document) -> Result<bool, DocumentError> {
        match document.line(self.line()) {
            Ok(current) if current == self.expected() => {}
            Ok(current) => {
                debug!(line = self.line(), %current, expected = self.expected(), "LineEdit::apply_to: line changed");
                return Ok(false);
            }
            Err(DocumentError::LineOutOfRange { .. }) => return Ok(false),
            Err(e) => return Err(e),
        }

        match self {
            Self::Replace { line, new_text, .. } => document.replace_line(*line, new_text)?,
            Self::Delete { line, .. } => document.delete_line(*line)?,
        }
        Ok(true)
    }
}

/// What the sync engine needs from an editor
#[async_trait]
pub trait Documents: Send + Sync {
    /// Open `path`, including any unsaved edits
    async fn open(&self, path: &Path) -> Result<Document, DocumentError>;

    /// Apply `edit`; `Ok(false)` means the document no longer matched
    async fn apply(&self, edit: LineEdit) -> Result<bool, DocumentError>;

    /// Persist pending edits for `path`
    async fn save(&self, path: &Path) -> Result<(), DocumentError>;

    /// Show `path` with the cursor on 0-based `line`
    async fn reveal(&self, path: &Path, line: usize) -> Result<(), DocumentError>;

    /// Surface a failure to the user
    fn show_error(&self, message: &str);
}

/// [`Documents`] on the local file system
///
/// Edits are buffered in memory per path until [`Documents::save`] writes them.
#[derive(Debug, Default)]
pub struct FsDocuments {
    buffers: Mutex<HashMap<PathBuf, Document>>,
}

impl FsDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read(path: &Path) -> Result<Document, DocumentError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| DocumentError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Document::new(path, text))
    }
}

#[async_trait]
impl Documents for FsDocuments {
    async fn open(&self, path: &Path) -> Result<Document, DocumentError> {
        debug!(path = %path.display(), "FsDocuments::open: called");
        if let Some(buffered) = self.buffers.lock().await.get(path) {
            return Ok(buffered.clone());
        }
        Self::read(path).await
    }

    async fn apply(&self, edit: LineEdit) -> Result<bool, DocumentError> {
        debug!(path = %edit.path().display(), line = edit.line(), "FsDocuments::apply: called");
        let mut buffers = self.buffers.lock().await;
        let mut document = match buffers.get(edit.path()) {
            Some(buffered) => buffered.clone(),
            None => Self::read(edit.path()).await?,
        };

        if !edit.apply_to(&mut document)? {
            warn!(path = %edit.path().display(), line = edit.line(), "Edit rejected, document changed");
            return Ok(false);
        }

        buffers.insert(edit.path().to_path_buf(), document);
        Ok(true)
    }

    async fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let Some(document) = self.buffers.lock().await.remove(path) else {
            debug!(path = %path.display(), "FsDocuments::save: nothing to save");
            return Ok(());
        };

        tokio::fs::write(path, document.text())
            .await
            .map_err(|source| DocumentError::Save {
                path: path.to_path_buf(),
                source,
            })?;
        info!(path = %path.display(), "Saved document");
        Ok(())
    }

    async fn reveal(&self, path: &Path, line: usize) -> Result<(), DocumentError> {
        let document = self.open(path).await?;
        let text = document.line(line)?;
        info!(path = %path.display(), line, "Revealing line");
        println!("{}:{}", path.display().to_string().cyan(), (line + 1).to_string().yellow());
        println!("  {}", text.trim());
        Ok(())
    }

    fn show_error(&self, message: &str) {
        error!("{}", message);
        eprintln!("{} {}", "✗".red(), message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lines_and_count() {
        let doc = Document::new("a.rs", "one\r\ntwo\nthree");
        assert_eq!(doc.line_count(), 3);
        assert_eq!(doc.line(0).unwrap(), "one");
        assert_eq!(doc.line(1).unwrap(), "two");
        assert_eq!(doc.line(2).unwrap(), "three");
        assert!(matches!(doc.line(3), Err(DocumentError::LineOutOfRange { .. })));
    }

    #[test]
    fn test_replace_keeps_terminator() {
        let mut doc = Document::new("a.rs", "one\r\ntwo\n");
        doc.replace_line(0, "uno").unwrap();
        assert_eq!(doc.text(), "uno\r\ntwo\n");
    }

    #[test]
    fn test_delete_middle_line() {
        let mut doc = Document::new("a.rs", "one\ntwo\nthree\n");
        doc.delete_line(1).unwrap();
        assert_eq!(doc.text(), "one\nthree\n");
    }

    #[test]
    fn test_delete_last_line_without_newline() {
        let mut doc = Document::new("a.rs", "one\ntwo");
        doc.delete_line(1).unwrap();
        assert_eq!(doc.text(), "one");
    }

    #[test]
    fn test_delete_only_line() {
        let mut doc = Document::new("a.rs", "one");
        doc.delete_line(0).unwrap();
        assert_eq!(doc.text(), "");
    }

    #[test]
    fn test_guarded_edit_rejects_changed_line() {
        let mut doc = Document::new("a.rs", "// TODO: a\n");
        let edit = LineEdit::Replace {
            path: PathBuf::from("a.rs"),
            line: 0,
            expected: "// TODO: b".to_string(),
            new_text: "// DONE: b".to_string(),
        };
        assert!(!edit.apply_to(&mut doc).unwrap());
        assert_eq!(doc.text(), "// TODO: a\n");

        let missing = LineEdit::Delete {
            path: PathBuf::from("a.rs"),
            line: 9,
            expected: String::new(),
        };
        assert!(!missing.apply_to(&mut doc).unwrap());
    }

    #[tokio::test]
    async fn test_fs_documents_buffer_until_save() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.rs");
        std::fs::write(&path, "// TODO: a\nfn main() {}\n").unwrap();

        let docs = FsDocuments::new();
        let applied = docs
            .apply(LineEdit::Replace {
                path: path.clone(),
                line: 0,
                expected: "// TODO: a".to_string(),
                new_text: "// DONE: a".to_string(),
            })
            .await
            .unwrap();
        assert!(applied);

        // Unsaved edit is visible through open, not on disk
        assert_eq!(docs.open(&path).await.unwrap().line(0).unwrap(), "// DONE: a");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "// TODO: a\nfn main() {}\n");

        docs.save(&path).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "// DONE: a\nfn main() {}\n");
    }

    #[tokio::test]
    async fn test_fs_documents_open_missing_file() {
        let temp = TempDir::new().unwrap();
        let docs = FsDocuments::new();
        let err = docs.open(&temp.path().join("missing.rs")).await.unwrap_err();
        assert!(matches!(err, DocumentError::Open { .. }));
    }
}
