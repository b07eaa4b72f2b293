//! Document loading from a directory of PDF and text files.
//!
//! Text extraction is delegated: plain text is read as UTF-8 and PDFs go
//! through `pdf-extract`, one [`Document`] per non-blank page.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::document::Document;
use crate::error::{RagError, Result};

/// Page separator emitted by `pdf-extract`.
const PAGE_BREAK: char = '\x0c';

/// Loads the documents contained in one file.
pub trait DocumentLoader: Send + Sync {
    /// Whether this loader handles `path`.
    fn supports(&self, path: &Path) -> bool;

    /// Load `path` into one or more documents, each with `source` metadata.
    fn load(&self, path: &Path) -> Result<Vec<Document>>;
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn load_error(path: &Path, message: impl Into<String>) -> RagError {
    RagError::LoadError { path: path.to_path_buf(), message: message.into() }
}

/// Loads `*.txt` files as a single document.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLoader;

impl DocumentLoader for TextLoader {
    fn supports(&self, path: &Path) -> bool {
        has_extension(path, "txt")
    }

    fn load(&self, path: &Path) -> Result<Vec<Document>> {
        let text = std::fs::read_to_string(path).map_err(|e| load_error(path, e.to_string()))?;
        let source = path.display().to_string();
        Ok(vec![Document::new(source.clone(), text, source)])
    }
}

/// Loads `*.pdf` files as one document per page.
///
/// Pages carry a zero-based `page` metadata field. Pages without text are
/// skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    fn supports(&self, path: &Path) -> bool {
        has_extension(path, "pdf")
    }

    fn load(&self, path: &Path) -> Result<Vec<Document>> {
        // pdf-extract panics on some malformed documents instead of erroring.
        let extracted = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text(path)))
            .map_err(|panic| {
                load_error(path, format!("PDF extraction panicked: {}", panic_message(&*panic)))
            })?;
        let text = extracted
            .map_err(|e| load_error(path, format!("failed to extract PDF text: {e}")))?;
        Ok(split_pages(path, &text))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn split_pages(path: &Path, text: &str) -> Vec<Document> {
    let source = path.display().to_string();
    text.split(PAGE_BREAK)
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(page, content)| {
            Document::new(format!("{source}#page={page}"), content, source.clone())
                .with_metadata("page", page.to_string())
        })
        .collect()
}

/// A file that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    /// The file.
    pub path: PathBuf,
    /// Why it was skipped.
    pub reason: String,
}

/// Documents loaded from a directory plus the files that failed.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Successfully loaded documents, in discovery order.
    pub documents: Vec<Document>,
    /// Files that failed to load.
    pub skipped: Vec<SkippedFile>,
}

/// Recursively loads every supported file under a directory.
///
/// Files are visited loader by loader (PDFs first, then text files), each
/// group in path order, so repeated runs see the same document sequence.
pub struct DirectoryLoader {
    loaders: Vec<Box<dyn DocumentLoader>>,
}

impl Default for DirectoryLoader {
    fn default() -> Self {
        Self { loaders: vec![Box::new(PdfLoader), Box::new(TextLoader)] }
    }
}

impl DirectoryLoader {
    /// A directory loader for PDF and text files.
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory loader with a custom set of per-file loaders.
    pub fn with_loaders(loaders: Vec<Box<dyn DocumentLoader>>) -> Self {
        Self { loaders }
    }

    /// Load every supported file under `root`.
    ///
    /// A file that fails to load is logged and recorded in
    /// [`LoadOutcome::skipped`]; loading continues with the next file.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::LoadError`] if `root` is not a directory.
    pub fn load(&self, root: &Path) -> Result<LoadOutcome> {
        if !root.is_dir() {
            return Err(load_error(root, "document directory does not exist"));
        }

        let Discovery { files, unreadable } = discover_files(root);
        let mut outcome = LoadOutcome { skipped: unreadable, ..LoadOutcome::default() };
        for loader in &self.loaders {
            for path in files.iter().filter(|p| loader.supports(p)) {
                match loader.load(path) {
                    Ok(documents) => {
                        debug!(path = %path.display(), documents = documents.len(), "loaded file");
                        outcome.documents.extend(documents);
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unreadable document");
                        let reason = e.to_string();
                        outcome.skipped.push(SkippedFile { path: path.clone(), reason });
                    }
                }
            }
        }
        Ok(outcome)
    }
}

/// Files found under a directory, plus the entries the walk could not read.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Every regular file, symlinks followed, sorted by path.
    pub files: Vec<PathBuf>,
    /// Entries that could not be visited, such as broken links.
    pub unreadable: Vec<SkippedFile>,
}

/// Walk `root` recursively, following symbolic links.
pub fn discover_files(root: &Path) -> Discovery {
    let mut discovery = Discovery::default();
    for entry in WalkDir::new(root).follow_links(true) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => discovery.files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                discovery.unreadable.push(SkippedFile { path, reason: e.to_string() });
            }
        }
    }
    discovery.files.sort();
    discovery
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn loads_text_files_recursively_with_source() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("plans/dental")).unwrap();
        fs::write(root.join("b.txt"), "Plan B covers vision.").unwrap();
        fs::write(root.join("plans/dental/a.txt"), "Dental cleanings twice a year.").unwrap();
        fs::write(root.join("notes.md"), "ignored").unwrap();

        let outcome = DirectoryLoader::new().load(root).unwrap();
        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.documents.len(), 2);

        let first = &outcome.documents[0];
        assert_eq!(first.text, "Plan B covers vision.");
        assert_eq!(first.source(), Some(root.join("b.txt").display().to_string().as_str()));
        assert!(outcome.documents[1].source().unwrap().ends_with("a.txt"));
    }

    #[test]
    fn corrupt_pdf_is_skipped_not_fatal() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("broken.pdf"), b"definitely not a pdf").unwrap();
        fs::write(temp.path().join("ok.txt"), "Annual limit is $10,000.").unwrap();

        let outcome = DirectoryLoader::new().load(temp.path()).unwrap();
        assert_eq!(outcome.documents.len(), 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.skipped[0].path.ends_with("broken.pdf"));
    }

    /// A well-formed PDF whose page draws text in font `/F1` without
    /// declaring any resources.
    fn pdf_with_undeclared_font() -> Vec<u8> {
        let content = "BT /F1 12 Tf 72 712 Td (Deductible: $500) Tj ET";
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>"
                .to_string(),
            format!("<< /Length {} >>\nstream\n{content}\nendstream", content.len()),
        ];

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
        }
        let xref = pdf.len();
        let mut table = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            table.push_str(&format!("{offset:010} 00000 n \n"));
        }
        table.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
            objects.len() + 1
        ));
        pdf.extend_from_slice(table.as_bytes());
        pdf
    }

    #[test]
    fn malformed_pdf_is_skipped_without_aborting() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("bad-font.pdf"), pdf_with_undeclared_font()).unwrap();
        fs::write(temp.path().join("ok.txt"), "Annual limit is $10,000.").unwrap();

        let outcome = DirectoryLoader::new().load(temp.path()).unwrap();
        assert_eq!(outcome.documents.len(), 1);
        assert_eq!(outcome.documents[0].text, "Annual limit is $10,000.");
        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.skipped[0].path.ends_with("bad-font.pdf"));
    }

    #[test]
    fn panic_payloads_become_messages() {
        let payload = catch_unwind(|| -> u8 { panic!("bad font {}", 1) }).unwrap_err();
        assert_eq!(panic_message(&*payload), "bad font 1");
        let payload = catch_unwind(|| -> u8 { std::panic::panic_any(7_u8) }).unwrap_err();
        assert_eq!(panic_message(&*payload), "unknown panic");
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_files_are_loaded() {
        let temp = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let target = outside.path().join("rider.txt");
        fs::write(&target, "Rental car rider: $30 per day.").unwrap();
        fs::write(temp.path().join("plain.txt"), "Base policy.").unwrap();
        std::os::unix::fs::symlink(&target, temp.path().join("linked.txt")).unwrap();

        let outcome = DirectoryLoader::new().load(temp.path()).unwrap();
        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.documents.len(), 2);
        assert_eq!(outcome.documents[0].text, "Rental car rider: $30 per day.");
        assert!(outcome.documents[0].source().unwrap().ends_with("linked.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn broken_links_are_reported_as_skipped() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("plain.txt"), "Base policy.").unwrap();
        std::os::unix::fs::symlink(temp.path().join("gone.txt"), temp.path().join("dangling.txt"))
            .unwrap();

        let outcome = DirectoryLoader::new().load(temp.path()).unwrap();
        assert_eq!(outcome.documents.len(), 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.skipped[0].path.ends_with("dangling.txt"));
    }

    #[test]
    fn invalid_utf8_text_is_skipped() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("latin1.txt"), [0xff, 0xfe, 0x41]).unwrap();
        let outcome = DirectoryLoader::new().load(temp.path()).unwrap();
        assert!(outcome.documents.is_empty());
        assert_eq!(outcome.skipped.len(), 1);
    }

    #[test]
    fn empty_directory_loads_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let outcome = DirectoryLoader::new().load(temp.path()).unwrap();
        assert!(outcome.documents.is_empty() && outcome.skipped.is_empty());
    }

    #[test]
    fn missing_directory_is_load_error() {
        let temp = tempfile::tempdir().unwrap();
        let err = DirectoryLoader::new().load(&temp.path().join("nope")).unwrap_err();
        assert!(matches!(err, RagError::LoadError { .. }));
    }

    #[test]
    fn pdf_text_splits_into_pages() {
        let docs = split_pages(Path::new("data/policy.pdf"), "Page one.\x0c  \x0cPage three.");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata["page"], "0");
        assert_eq!(docs[1].metadata["page"], "2");
        assert_eq!(docs[1].text, "Page three.");
        assert_eq!(docs[1].id, "data/policy.pdf#page=2");
        assert_eq!(docs[1].source(), Some("data/policy.pdf"));
    }
}
