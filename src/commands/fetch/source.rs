use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use tracing::debug;

use super::FetchOptions;

/// Anything that can hand back the printable passage page for chapters
/// `1..=last_chapter` of a book.
pub trait PassageSource {
    fn fetch_passage(&self, translation: &str, book: &str, last_chapter: u32) -> Result<String>;
}

/// BibleGateway passage lookup over blocking HTTP.
#[derive(Debug)]
pub struct BibleGatewayClient {
    client: Client,
    base_url: String,
    user_agent: String,
}

impl BibleGatewayClient {
    pub fn new(options: &FetchOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            client,
            base_url: options.base_url.clone(),
            user_agent: options.user_agent.clone(),
        })
    }

    fn passage_url(&self) -> String {
        format!("{}/passage/", self.base_url)
    }
}

impl PassageSource for BibleGatewayClient {
    fn fetch_passage(&self, translation: &str, book: &str, last_chapter: u32) -> Result<String> {
        let url = self.passage_url();
        let search = if last_chapter > 1 {
            format!("{book} 1-{last_chapter}")
        } else {
            format!("{book} 1")
        };
        debug!(url = %url, search = %search, translation, "requesting passage");

        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, self.user_agent.as_str())
            .query(&[
                ("search", search.as_str()),
                ("version", translation),
                ("interface", "print"),
            ])
            .send()
            .with_context(|| format!("request for {search} ({translation}) failed"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("{url} answered {status} for {search} ({translation})");
        }

        response
            .text()
            .with_context(|| format!("failed to read passage body for {search} ({translation})"))
    }
}
