use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::commands::fetch::{DEFAULT_MAX_CHAPTERS, FetchOptions};

#[derive(Parser, Debug)]
#[command(
    name = "bible-export",
    version,
    about = "Download Bible translations and export them as JSON and SQL"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the supported translation identifiers.
    Translations,
    /// Download, merge and export a single translation.
    Generate(GenerateArgs),
    /// Run the pipeline for every complete translation in the catalog.
    GenerateAll(GenerateAllArgs),
    /// Merge and export already downloaded book files.
    Combine(CombineArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    #[arg(long, default_value = "https://www.biblegateway.com")]
    pub base_url: String,

    #[arg(long, default_value_t = DEFAULT_MAX_CHAPTERS)]
    pub max_chapters: u32,

    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    #[arg(long, default_value = concat!("bible-export/", env!("CARGO_PKG_VERSION")))]
    pub user_agent: String,
}

impl FetchArgs {
    pub fn to_options(&self) -> FetchOptions {
        FetchOptions {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            max_chapters: self.max_chapters,
            timeout: Duration::from_secs(self.timeout_secs),
            user_agent: self.user_agent.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[arg(long, short)]
    pub translation: String,

    #[arg(long, default_value = ".")]
    pub output_root: PathBuf,

    #[command(flatten)]
    pub fetch: FetchArgs,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateAllArgs {
    #[arg(long, default_value = ".")]
    pub output_root: PathBuf,

    #[command(flatten)]
    pub fetch: FetchArgs,
}

#[derive(Args, Debug, Clone)]
pub struct CombineArgs {
    #[arg(long, short)]
    pub translation: String,

    #[arg(long, default_value = ".")]
    pub output_root: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, short)]
    pub translation: String,

    #[arg(long, default_value = ".")]
    pub output_root: PathBuf,
}
