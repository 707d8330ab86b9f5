use std::{path::Path, time::Duration};

use async_trait::async_trait;
use tokio::{fs::File, io::AsyncWriteExt};

use crate::error::{Result, TartilError};

/// Downloads remote media into the job workspace.
#[async_trait]
pub trait MediaFetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

pub fn is_remote(reference: &str) -> bool {
    let lower = reference.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Streaming HTTP GET into a file.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        // Stalls time out; a slow but steady transfer may take as long as it needs.
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut response = self.client.get(url).send().await?.error_for_status()?;

        let mut file = File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        match self.download(url, dest).await {
            Ok(bytes) => {
                tracing::debug!(url, bytes, dest = %dest.display(), "download complete");
                Ok(())
            }
            Err(e) => {
                // Leave no truncated file behind.
                let _ = tokio::fs::remove_file(dest).await;
                Err(TartilError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://cdn.example.com/a.mp3"));
        assert!(is_remote("HTTP://example.com/bg.mp4"));
        assert!(!is_remote("nature/forest.mp4"));
        assert!(!is_remote("/var/audio/a.mp3"));
        assert!(!is_remote("ftp://example.com/a.mp3"));
    }

    #[tokio::test]
    async fn test_slow_transfer_outlives_the_stall_timeout() {
        use tokio::{io::AsyncReadExt, net::TcpListener};

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await.unwrap();
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
            for byte in b"bytes" {
                tokio::time::sleep(Duration::from_millis(400)).await;
                socket.write_all(&[*byte]).await.unwrap();
                socket.flush().await.unwrap();
            }
        });

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("bg.mp4");
        let fetcher = HttpFetcher::new(Duration::from_secs(1)).unwrap();

        fetcher
            .fetch(&format!("http://{addr}/bg.mp4"), &dest)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn test_unreachable_url_reports_download_failure() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested/audio.mp3");
        let fetcher = HttpFetcher::new(Duration::from_secs(2)).unwrap();

        let err = fetcher.fetch("http://127.0.0.1:9/audio.mp3", &dest).await.unwrap_err();
        assert!(matches!(err, TartilError::DownloadFailed { .. }));
        assert!(!dest.exists());
    }
}
