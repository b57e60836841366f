//! Byte transfer primitive used by background fetches.

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Copies the resource at a URL into a local file.
///
/// Implementations must write progressively: the cache polls the file size
/// while the transfer runs and hands the file out once enough bytes landed.
/// An existing file at `dest` is truncated.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Returns the number of bytes written.
    async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64>;
}

#[cfg(feature = "http-streaming")]
pub use http::HttpMediaFetcher;

#[cfg(feature = "http-streaming")]
mod http {
    use super::MediaFetcher;
    use crate::error::{PlaybackError, Result};
    use async_trait::async_trait;
    use core_runtime::logging::redact_url;
    use futures_util::StreamExt;
    use reqwest::Client;
    use std::path::Path;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tracing::debug;

    /// Streams HTTP responses to disk chunk by chunk.
    pub struct HttpMediaFetcher {
        client: Client,
    }

    impl HttpMediaFetcher {
        /// Create a fetcher with a 10s connect timeout and no overall limit,
        /// since full tracks can take minutes on slow links.
        pub fn new() -> Result<Self> {
            let client = Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .user_agent(concat!("streamcache/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| PlaybackError::Internal(format!("Failed to build HTTP client: {}", e)))?;

            Ok(Self { client })
        }

        pub fn with_client(client: Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl MediaFetcher for HttpMediaFetcher {
        async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64> {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| PlaybackError::StreamingFailed(e.without_url().to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(PlaybackError::StreamingFailed(format!(
                    "HTTP {} for {}",
                    status,
                    redact_url(url)
                )));
            }

            let mut file = tokio::fs::File::create(dest).await?;
            let mut stream = response.bytes_stream();
            let mut written = 0u64;

            while let Some(chunk) = stream.next().await {
                let chunk =
                    chunk.map_err(|e| PlaybackError::StreamingFailed(e.without_url().to_string()))?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }

            file.flush().await?;
            debug!(url = %redact_url(url), bytes = written, "Fetch complete");
            Ok(written)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_unreachable_host_is_streaming_failure() {
            let fetcher = HttpMediaFetcher::new().unwrap();
            let dir = tempfile::tempdir().unwrap();
            let dest = dir.path().join("out");

            let err = fetcher
                .fetch_to_file("http://127.0.0.1:9/track.flac?token=secret", &dest)
                .await
                .unwrap_err();

            assert!(matches!(err, PlaybackError::StreamingFailed(_)));
            assert!(!err.to_string().contains("secret"));
            assert!(!dest.exists());
        }
    }
}
