use anyhow::{Context, Result, bail};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Key of the metadata section written at the top of every book file.
pub const INFO_KEY: &str = "Info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verse {
    pub number: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub number: String,
    pub verses: Vec<Verse>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub name: String,
    pub chapters: Vec<Chapter>,
}

/// Ordered book -> chapter -> verse -> text mapping. Serializes to a nested
/// JSON object in stored order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BibleDocument {
    pub books: Vec<Book>,
}

impl BibleDocument {
    /// Parses a book -> chapter -> verse -> text object. The caller strips
    /// the `Info` section first.
    pub fn from_json_map(map: Map<String, Value>) -> Result<Self> {
        let mut books = Vec::with_capacity(map.len());

        for (name, chapters) in map {
            let Value::Object(chapters) = chapters else {
                bail!("book '{name}' is not a chapter mapping");
            };

            let mut parsed_chapters = Vec::with_capacity(chapters.len());
            for (chapter, verses) in chapters {
                let Value::Object(verses) = verses else {
                    bail!("{name} {chapter} is not a verse mapping");
                };

                let verses = verses
                    .into_iter()
                    .map(|(number, text)| match text {
                        Value::String(text) => Ok(Verse { number, text }),
                        other => bail!("{name} {chapter}:{number} is not text: {other}"),
                    })
                    .collect::<Result<Vec<_>>>()?;

                parsed_chapters.push(Chapter {
                    number: chapter,
                    verses,
                });
            }

            books.push(Book {
                name,
                chapters: parsed_chapters,
            });
        }

        Ok(Self { books })
    }

    pub fn from_json_slice(raw: &[u8]) -> Result<Self> {
        let map: Map<String, Value> =
            serde_json::from_slice(raw).context("document is not a json object")?;
        Self::from_json_map(map)
    }

    /// Inserts `book`, replacing an existing book of the same name in place.
    pub fn upsert_book(&mut self, book: Book) {
        match self.books.iter_mut().find(|existing| existing.name == book.name) {
            Some(existing) => *existing = book,
            None => self.books.push(book),
        }
    }

    #[cfg(test)]
    pub fn book(&self, name: &str) -> Option<&Book> {
        self.books.iter().find(|book| book.name == name)
    }

    pub fn chapter_count(&self) -> usize {
        self.books.iter().map(|book| book.chapters.len()).sum()
    }

    pub fn verse_count(&self) -> usize {
        self.books
            .iter()
            .flat_map(|book| &book.chapters)
            .map(|chapter| chapter.verses.len())
            .sum()
    }
}

struct Verses<'a>(&'a [Verse]);

impl Serialize for Verses<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for verse in self.0 {
            map.serialize_entry(&verse.number, &verse.text)?;
        }
        map.end()
    }
}

struct Chapters<'a>(&'a [Chapter]);

impl Serialize for Chapters<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for chapter in self.0 {
            map.serialize_entry(&chapter.number, &Verses(&chapter.verses))?;
        }
        map.end()
    }
}

impl Serialize for BibleDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.books.len()))?;
        for book in &self.books {
            map.serialize_entry(&book.name, &Chapters(&book.chapters))?;
        }
        map.end()
    }
}

/// Metadata section of a per-book intermediate file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct BookFileInfo {
    pub language: String,
    pub translation: String,
}

/// A per-book intermediate file: `Info` followed by the book itself.
pub struct BookFile<'a> {
    pub info: &'a BookFileInfo,
    pub book: &'a Book,
}

impl Serialize for BookFile<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(INFO_KEY, self.info)?;
        map.serialize_entry(&self.book.name, &Chapters(&self.book.chapters))?;
        map.end()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHash {
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunPaths {
    pub translation_dir: String,
    pub books_dir: String,
    pub json_path: String,
    pub sql_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunCounts {
    pub books_requested: usize,
    pub books_downloaded: usize,
    pub books_merged: usize,
    pub chapters: usize,
    pub verses: usize,
    pub insert_statements: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub base_url: String,
    pub max_chapters: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub translation: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub failed_book: Option<String>,
    pub provider: Option<ProviderSettings>,
    pub paths: RunPaths,
    pub counts: RunCounts,
    pub artifacts: Vec<ArtifactHash>,
}
