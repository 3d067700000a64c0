use anyhow::Result;
use tracing::info;

use crate::catalog::{EXCLUDED_FROM_BULK, TRANSLATIONS};

pub fn run() -> Result<()> {
    for translation in TRANSLATIONS {
        if EXCLUDED_FROM_BULK.contains(&translation.id) {
            println!(
                "{:<10} {:<12} (skipped by generate-all)",
                translation.id, translation.language
            );
        } else {
            println!("{:<10} {}", translation.id, translation.language);
        }
    }

    info!(count = TRANSLATIONS.len(), "available translations");
    Ok(())
}
