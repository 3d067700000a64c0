use std::path::{Path, PathBuf};

/// On-disk layout for one translation under the output root:
///
/// ```text
/// <root>/<T>/<T>_books/<Book>.json
/// <root>/<T>/<T>_bible.json
/// <root>/<T>/<T>_bible.sql
/// <root>/<T>/<T>_manifest.json
/// ```
#[derive(Debug, Clone)]
pub struct TranslationLayout {
    pub translation_dir: PathBuf,
    pub books_dir: PathBuf,
    pub json_path: PathBuf,
    pub sql_path: PathBuf,
    pub manifest_path: PathBuf,
}

impl TranslationLayout {
    pub fn new(output_root: &Path, translation: &str) -> Self {
        let translation_dir = output_root.join(translation);
        Self {
            books_dir: translation_dir.join(format!("{translation}_books")),
            json_path: translation_dir.join(format!("{translation}_bible.json")),
            sql_path: translation_dir.join(format!("{translation}_bible.sql")),
            manifest_path: translation_dir.join(format!("{translation}_manifest.json")),
            translation_dir,
        }
    }
}
