use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

use crate::books;
use crate::catalog::Translation;
use crate::model::{Book, BookFile, BookFileInfo};
use crate::util::write_json_indented;

mod passage_html;
mod source;

pub use passage_html::PassageExtractor;
pub use source::{BibleGatewayClient, PassageSource};

pub const DEFAULT_MAX_CHAPTERS: u32 = 200;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub base_url: String,
    /// Upper bound on the chapter range requested for a single book.
    pub max_chapters: u32,
    pub timeout: Duration,
    pub user_agent: String,
}

/// Clamps a chapter count into `1..=max_chapters`.
pub fn capped_chapter_count(count: u32, max_chapters: u32) -> u32 {
    count.max(1).min(max_chapters.max(1))
}

pub fn book_file_path(folder: &Path, book: &str) -> PathBuf {
    folder.join(format!("{book}.json"))
}

/// Downloads one book at a time into per-book intermediate files.
pub struct BookFetcher<'a, S: PassageSource> {
    source: &'a S,
    extractor: PassageExtractor,
    max_chapters: u32,
}

impl<'a, S: PassageSource> BookFetcher<'a, S> {
    pub fn new(source: &'a S, max_chapters: u32) -> Result<Self> {
        Ok(Self {
            source,
            extractor: PassageExtractor::new()?,
            max_chapters,
        })
    }

    /// Writes `<folder>/<book>.json`. Failures are logged and reported as
    /// `false`, never raised.
    pub fn download_book(&self, translation: &Translation, book: &str, folder: &Path) -> bool {
        match self.try_download_book(translation, book, folder) {
            Ok(verses) => {
                debug!(book, translation = translation.id, verses, "book downloaded");
                true
            }
            Err(err) => {
                warn!(
                    book,
                    translation = translation.id,
                    error = %format!("{err:#}"),
                    "book download failed"
                );
                false
            }
        }
    }

    fn try_download_book(
        &self,
        translation: &Translation,
        book: &str,
        folder: &Path,
    ) -> Result<usize> {
        let chapters = books::chapter_count(book)
            .with_context(|| format!("'{book}' is not a canonical book"))?;
        let last_chapter = capped_chapter_count(chapters, self.max_chapters);

        let html = self
            .source
            .fetch_passage(translation.id, book, last_chapter)?;
        let chapters = self.extractor.extract(&html);
        if chapters.is_empty() {
            bail!("no verses found for {book} in {}", translation.id);
        }

        let book = Book {
            name: book.to_string(),
            chapters,
        };
        let info = BookFileInfo {
            language: translation.language.to_string(),
            translation: translation.id.to_string(),
        };
        let path = book_file_path(folder, &book.name);
        write_json_indented(
            &path,
            &BookFile {
                info: &info,
                book: &book,
            },
        )?;

        Ok(book.chapters.iter().map(|chapter| chapter.verses.len()).sum())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;

    use serde_json::Value;

    use super::*;
    use crate::catalog;

    struct RecordingSource {
        html: Option<String>,
        requests: RefCell<Vec<(String, String, u32)>>,
    }

    impl PassageSource for RecordingSource {
        fn fetch_passage(
            &self,
            translation: &str,
            book: &str,
            last_chapter: u32,
        ) -> Result<String> {
            self.requests
                .borrow_mut()
                .push((translation.to_string(), book.to_string(), last_chapter));
            match &self.html {
                Some(html) => Ok(html.clone()),
                None => bail!("connection refused"),
            }
        }
    }

    fn source(html: Option<&str>) -> RecordingSource {
        RecordingSource {
            html: html.map(ToOwned::to_owned),
            requests: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn capped_chapter_count_respects_bounds() {
        assert_eq!(capped_chapter_count(150, DEFAULT_MAX_CHAPTERS), 150);
        assert_eq!(capped_chapter_count(150, 100), 100);
        assert_eq!(capped_chapter_count(0, 200), 1);
        assert_eq!(capped_chapter_count(5, 0), 1);
    }

    #[test]
    fn download_book_writes_info_and_verses() {
        let scratch = tempfile::tempdir().unwrap();
        let source = source(Some(
            r#"<span class="text Ps-1-1">Blessed is the man</span><span class="text Ps-1-2">but his delight</span>"#,
        ));
        let fetcher = BookFetcher::new(&source, DEFAULT_MAX_CHAPTERS).unwrap();
        let esv = catalog::resolve("ESV").unwrap();

        assert!(fetcher.download_book(esv, "Psalm", scratch.path()));
        assert_eq!(
            source.requests.borrow().as_slice(),
            &[("ESV".to_string(), "Psalm".to_string(), 150)]
        );

        let raw = fs::read(scratch.path().join("Psalm.json")).unwrap();
        let written: Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(written["Info"]["Translation"], "ESV");
        assert_eq!(written["Info"]["Language"], "English");
        assert_eq!(written["Psalm"]["1"]["2"], "but his delight");
    }

    #[test]
    fn download_book_reports_false_on_source_error() {
        let scratch = tempfile::tempdir().unwrap();
        let source = source(None);
        let fetcher = BookFetcher::new(&source, DEFAULT_MAX_CHAPTERS).unwrap();
        let esv = catalog::resolve("ESV").unwrap();

        assert!(!fetcher.download_book(esv, "Genesis", scratch.path()));
        assert!(!scratch.path().join("Genesis.json").exists());
    }

    #[test]
    fn download_book_reports_false_when_page_has_no_verses() {
        let scratch = tempfile::tempdir().unwrap();
        let source = source(Some("<p>No results found.</p>"));
        let fetcher = BookFetcher::new(&source, DEFAULT_MAX_CHAPTERS).unwrap();
        let esv = catalog::resolve("ESV").unwrap();

        assert!(!fetcher.download_book(esv, "Genesis", scratch.path()));
    }

    #[test]
    fn download_book_rejects_unknown_books() {
        let scratch = tempfile::tempdir().unwrap();
        let source = source(Some(r#"<span class="text X-1-1">x</span>"#));
        let fetcher = BookFetcher::new(&source, DEFAULT_MAX_CHAPTERS).unwrap();
        let esv = catalog::resolve("ESV").unwrap();

        assert!(!fetcher.download_book(esv, "Psalms", scratch.path()));
        assert!(source.requests.borrow().is_empty());
    }
}
