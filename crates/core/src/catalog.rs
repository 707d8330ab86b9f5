use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Result, TartilError};

pub const DEFAULT_RECITER: &str = "ar.alafasy";

/// Source of verse text and recitation audio.
#[async_trait]
pub trait ScriptureCatalog: Send + Sync + 'static {
    async fn verse_text(&self, surah: u32, ayah: u32) -> Result<String>;

    fn recitation_url(&self, reciter: &str, surah: u32, ayah: u32) -> String;
}

pub struct CatalogConfig {
    pub text_api_url: &'static str,
    pub audio_cdn_url: &'static str,
    pub bitrate: u32,
}

/// The alquran.cloud text API paired with the islamic.network audio CDN.
pub struct AlQuranCloud {
    client: reqwest::Client,
    config: CatalogConfig,
}

// `data` is an object on success and an error string otherwise.
#[derive(Deserialize)]
struct AyahResponse {
    code: u16,
    #[serde(default)]
    data: serde_json::Value,
}

impl AlQuranCloud {
    pub fn config() -> CatalogConfig {
        CatalogConfig {
            text_api_url: "https://api.alquran.cloud/v1/ayah",
            audio_cdn_url: "https://cdn.islamic.network/quran/audio",
            bitrate: 128,
        }
    }

    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            config: Self::config(),
        })
    }

    pub fn text_url(&self, surah: u32, ayah: u32) -> String {
        format!("{}/{}:{}", self.config.text_api_url, surah, ayah)
    }

    fn extract_text(body: AyahResponse) -> Result<String> {
        if body.code != 200 {
            return Err(TartilError::CatalogFailed {
                reason: format!("catalog answered with code {}", body.code),
            });
        }
        body.data
            .get("text")
            .and_then(|t| t.as_str())
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| TartilError::CatalogFailed {
                reason: "response carried no verse text".to_string(),
            })
    }
}

#[async_trait]
impl ScriptureCatalog for AlQuranCloud {
    async fn verse_text(&self, surah: u32, ayah: u32) -> Result<String> {
        let url = self.text_url(surah, ayah);
        tracing::debug!(%url, "fetching verse text");

        let body: AyahResponse = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| TartilError::CatalogFailed {
                reason: e.to_string(),
            })?
            .json()
            .await
            .map_err(|e| TartilError::CatalogFailed {
                reason: e.to_string(),
            })?;

        Self::extract_text(body)
    }

    fn recitation_url(&self, reciter: &str, surah: u32, ayah: u32) -> String {
        format!(
            "{}/{}/{}/{}_{}.mp3",
            self.config.audio_cdn_url, self.config.bitrate, reciter, surah, ayah
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> AlQuranCloud {
        AlQuranCloud::new(Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn test_urls() {
        let catalog = catalog();
        assert_eq!(catalog.text_url(2, 255), "https://api.alquran.cloud/v1/ayah/2:255");
        assert_eq!(
            catalog.recitation_url(DEFAULT_RECITER, 1, 1),
            "https://cdn.islamic.network/quran/audio/128/ar.alafasy/1_1.mp3"
        );
    }

    #[test]
    fn test_extract_text_requires_success_code() {
        let ok: AyahResponse =
            serde_json::from_str(r#"{"code":200,"status":"OK","data":{"number":1,"text":"بِسْمِ ٱللَّهِ"}}"#)
                .unwrap();
        assert_eq!(AlQuranCloud::extract_text(ok).unwrap(), "بِسْمِ ٱللَّهِ");

        let not_found: AyahResponse =
            serde_json::from_str(r#"{"code":404,"status":"Not Found","data":"Invalid ayah"}"#)
                .unwrap();
        assert!(matches!(
            AlQuranCloud::extract_text(not_found),
            Err(TartilError::CatalogFailed { .. })
        ));
    }

    #[test]
    fn test_extract_text_rejects_missing_text() {
        let empty: AyahResponse =
            serde_json::from_str(r#"{"code":200,"data":{"text":"  "}}"#).unwrap();
        assert!(AlQuranCloud::extract_text(empty).is_err());

        let no_data: AyahResponse = serde_json::from_str(r#"{"code":200}"#).unwrap();
        assert!(AlQuranCloud::extract_text(no_data).is_err());
    }
}
