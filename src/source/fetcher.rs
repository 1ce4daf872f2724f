use crate::model::SourceError;
use crate::source::PriceSource;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Reads the export from the local filesystem.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl PriceSource for FileSource {
    async fn fetch(&self) -> Result<String, SourceError> {
        info!("Reading price history from {}", self.path.display());
        Ok(tokio::fs::read_to_string(&self.path).await?)
    }
}

/// Downloads the export over HTTP.
pub struct HttpSource {
    client: Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent("support-breaks/0.1")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait::async_trait]
impl PriceSource for HttpSource {
    async fn fetch(&self) -> Result<String, SourceError> {
        info!("Fetching price history from {}", self.url);
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(SourceError::InvalidResponse(response.status().as_u16()));
        }

        Ok(response.text().await?)
    }
}
