//! Render and service configuration.
//!
//! `RenderConfig` is built per request by merging caller overrides (a JSON
//! object) over the defaults. `ServiceConfig` describes the process-wide
//! settings of a running [`JobService`](crate::jobs::JobService).

use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use serde_json::{Map, Value};

use crate::{
    error::{Result, TartilError},
    text::CleanPolicy,
};

/// Output canvas presets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Resolution {
    #[default]
    Hd1080,
    Hd720,
    Vertical,
    Square,
    Uhd4k,
}

impl Resolution {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Resolution::Hd1080 => (1920, 1080),
            Resolution::Hd720 => (1280, 720),
            Resolution::Vertical => (1080, 1920),
            Resolution::Square => (1080, 1080),
            Resolution::Uhd4k => (3840, 2160),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Resolution::Hd1080 => "1080p",
            Resolution::Hd720 => "720p",
            Resolution::Vertical => "vertical",
            Resolution::Square => "square",
            Resolution::Uhd4k => "4k",
        }
    }
}

/// Unknown names fall back to 1080p.
impl From<String> for Resolution {
    fn from(name: String) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "720p" => Resolution::Hd720,
            "vertical" => Resolution::Vertical,
            "square" => Resolution::Square,
            "4k" => Resolution::Uhd4k,
            "1080p" => Resolution::Hd1080,
            other => {
                tracing::warn!(resolution = other, "unknown resolution, using 1080p");
                Resolution::Hd1080
            }
        }
    }
}

impl From<Resolution> for String {
    fn from(resolution: Resolution) -> Self {
        resolution.name().to_string()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReciterPosition {
    Above,
    #[default]
    Below,
}

/// Anything but `above` places the reciter below the verse.
impl From<String> for ReciterPosition {
    fn from(name: String) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "above" => ReciterPosition::Above,
            "below" => ReciterPosition::Below,
            other => {
                tracing::warn!(reciter_position = other, "unknown reciter position, using below");
                ReciterPosition::Below
            }
        }
    }
}

impl From<ReciterPosition> for String {
    fn from(position: ReciterPosition) -> Self {
        match position {
            ReciterPosition::Above => "above",
            ReciterPosition::Below => "below",
        }
        .to_string()
    }
}

/// Named encoder quality presets mapped onto a (crf, speed preset) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    Draft,
    Fast,
    Standard,
    Hq,
}

impl QualityPreset {
    pub fn encoder_settings(&self) -> (u8, &'static str) {
        match self {
            QualityPreset::Draft => (28, "ultrafast"),
            QualityPreset::Fast => (23, "fast"),
            QualityPreset::Standard => (21, "medium"),
            QualityPreset::Hq => (18, "slow"),
        }
    }
}

impl FromStr for QualityPreset {
    type Err = TartilError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(QualityPreset::Draft),
            "fast" => Ok(QualityPreset::Fast),
            "standard" => Ok(QualityPreset::Standard),
            "hq" => Ok(QualityPreset::Hq),
            other => Err(TartilError::InvalidConfig(format!(
                "unknown quality preset '{other}'"
            ))),
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QualityPreset::Draft => "draft",
            QualityPreset::Fast => "fast",
            QualityPreset::Standard => "standard",
            QualityPreset::Hq => "hq",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub font_name: String,
    #[serde(deserialize_with = "lenient_u32")]
    pub font_size: u32,
    pub alignment: u8,
    pub outline: u32,
    pub shadow: u32,
    #[serde(deserialize_with = "lenient_usize")]
    pub words_per_segment: usize,
    /// Accepted for compatibility; segmentation does not enforce it.
    pub min_segments: usize,
    pub max_segments: usize,
    pub crf: u8,
    pub preset: String,
    /// Overrides `crf` and `preset` when present. Unknown names are ignored.
    #[serde(deserialize_with = "lenient_quality", skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityPreset>,
    pub audio_bitrate: String,
    pub clean_text: bool,
    pub aggressive_clean: bool,
    pub remove_diacritics: bool,
    pub night_mode: bool,
    pub fade_in: bool,
    pub fade_out: bool,
    pub fade_duration: f64,
    pub reciter: String,
    pub reciter_name: String,
    pub show_reciter: bool,
    pub reciter_duration: f64,
    pub reciter_font: String,
    #[serde(deserialize_with = "lenient_u32")]
    pub reciter_font_size: u32,
    pub reciter_position: ReciterPosition,
    pub reciter_spacing: f64,
    pub resolution: Resolution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fonts_dir: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_name: "KFGQPC Uthman Taha Naskh Regular".to_string(),
            font_size: 150,
            alignment: 5,
            outline: 5,
            shadow: 3,
            words_per_segment: 4,
            min_segments: 1,
            max_segments: 50,
            crf: 23,
            preset: "fast".to_string(),
            quality: None,
            audio_bitrate: "192k".to_string(),
            clean_text: true,
            aggressive_clean: false,
            remove_diacritics: false,
            night_mode: false,
            fade_in: true,
            fade_out: true,
            fade_duration: 0.3,
            reciter: "ar.alafasy".to_string(),
            reciter_name: String::new(),
            show_reciter: true,
            reciter_duration: 3.0,
            reciter_font: String::new(),
            reciter_font_size: 0,
            reciter_position: ReciterPosition::Below,
            reciter_spacing: 80.0,
            resolution: Resolution::Hd1080,
            fonts_dir: None,
        }
    }
}

impl RenderConfig {
    /// Merge caller overrides over the defaults, apply the quality preset and
    /// validate the result.
    pub fn merged(overrides: &Map<String, Value>) -> Result<Self> {
        let mut config: RenderConfig = serde_json::from_value(Value::Object(overrides.clone()))
            .map_err(|e| TartilError::InvalidConfig(e.to_string()))?;

        if let Some(quality) = config.quality {
            let (crf, preset) = quality.encoder_settings();
            config.crf = crf;
            config.preset = preset.to_string();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.words_per_segment == 0 {
            return Err(TartilError::InvalidConfig(
                "words_per_segment must be at least 1".to_string(),
            ));
        }
        if self.max_segments == 0 {
            return Err(TartilError::InvalidConfig(
                "max_segments must be at least 1".to_string(),
            ));
        }
        if !self.fade_duration.is_finite() || self.fade_duration < 0.0 {
            return Err(TartilError::InvalidConfig(
                "fade_duration must be a non-negative number".to_string(),
            ));
        }
        if !self.reciter_duration.is_finite() || self.reciter_duration < 0.0 {
            return Err(TartilError::InvalidConfig(
                "reciter_duration must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }

    pub fn clean_policy(&self) -> CleanPolicy {
        if self.aggressive_clean {
            CleanPolicy::Aggressive
        } else if self.clean_text {
            CleanPolicy::Preserve
        } else {
            CleanPolicy::Raw
        }
    }
}

fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom("number out of range")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| D::Error::custom(format!("expected a number, got '{s}'"))),
        other => Err(D::Error::custom(format!("expected a number, got {other}"))),
    }
}

// Truncates like an integer cast of the caller's value ("72.9" -> 72).
fn lenient_u32<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let n = lenient_number(deserializer)?;
    if !(0.0..=u32::MAX as f64).contains(&n) {
        return Err(D::Error::custom(format!("{n} is out of range")));
    }
    Ok(n.trunc() as u32)
}

fn lenient_usize<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_u32(deserializer).map(|n| n as usize)
}

fn lenient_quality<'de, D>(deserializer: D) -> std::result::Result<Option<QualityPreset>, D::Error>
where
    D: Deserializer<'de>,
{
    let name = Option::<String>::deserialize(deserializer)?;
    Ok(name.and_then(|name| match name.parse::<QualityPreset>() {
        Ok(preset) => Some(preset),
        Err(_) => {
            tracing::warn!(quality = %name, "unknown quality preset ignored");
            None
        }
    }))
}

/// Process-wide settings of the job service.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Root holding `uploads/`, `outputs/`, `temp/` and `backgrounds/`.
    pub root_dir: PathBuf,
    /// Maximum number of non-terminal jobs; further submissions are rejected.
    pub max_pending_jobs: usize,
    /// Terminal jobs older than this are evicted from the job map.
    pub job_ttl: Duration,
    /// Upper bound on retained job records.
    pub max_retained_jobs: usize,
    pub probe_timeout: Duration,
    pub encode_timeout: Duration,
    pub download_timeout: Duration,
    pub ffmpeg_bin: PathBuf,
    pub ffprobe_bin: PathBuf,
    /// Prefix of the download reference stored on completed jobs.
    pub download_prefix: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            max_pending_jobs: 8,
            job_ttl: Duration::from_secs(6 * 60 * 60),
            max_retained_jobs: 500,
            probe_timeout: Duration::from_secs(30),
            encode_timeout: Duration::from_secs(30 * 60),
            download_timeout: Duration::from_secs(30),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
            download_prefix: "/api/download".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn with_root(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = root_dir.into();
        self
    }
}

pub fn default_root_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("tartil")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn overrides(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = RenderConfig::merged(&Map::new()).unwrap();
        assert_eq!(config, RenderConfig::default());
        assert_eq!(config.font_size, 150);
        assert_eq!(config.words_per_segment, 4);
        assert_eq!(config.max_segments, 50);
        assert_eq!(config.resolution, Resolution::Hd1080);
        assert_eq!(config.clean_policy(), CleanPolicy::Preserve);
    }

    #[test]
    fn test_overrides_replace_only_named_keys() {
        let config = RenderConfig::merged(&overrides(json!({
            "font_size": 72,
            "night_mode": true,
            "reciter_name": "Mishary Al-Afasy",
            "resolution": "vertical",
            "unknown_key": "ignored",
        })))
        .unwrap();

        assert_eq!(config.font_size, 72);
        assert!(config.night_mode);
        assert_eq!(config.reciter_name, "Mishary Al-Afasy");
        assert_eq!(config.resolution, Resolution::Vertical);
        assert_eq!(config.font_name, RenderConfig::default().font_name);
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let config = RenderConfig::merged(&overrides(json!({
            "font_size": "96",
            "words_per_segment": 3.7,
        })))
        .unwrap();

        assert_eq!(config.font_size, 96);
        assert_eq!(config.words_per_segment, 3);
    }

    #[test]
    fn test_quality_preset_sets_crf_and_preset() {
        let config = RenderConfig::merged(&overrides(json!({ "quality": "hq", "crf": 30 }))).unwrap();
        assert_eq!(config.crf, 18);
        assert_eq!(config.preset, "slow");

        let config = RenderConfig::merged(&overrides(json!({ "quality": "draft" }))).unwrap();
        assert_eq!((config.crf, config.preset.as_str()), (28, "ultrafast"));
    }

    #[test]
    fn test_unknown_quality_keeps_explicit_encoder_settings() {
        let config =
            RenderConfig::merged(&overrides(json!({ "quality": "cinema", "crf": 20 }))).unwrap();
        assert_eq!(config.quality, None);
        assert_eq!(config.crf, 20);
        assert_eq!(config.preset, "fast");
    }

    #[test]
    fn test_unknown_resolution_falls_back_to_1080p() {
        let config = RenderConfig::merged(&overrides(json!({ "resolution": "8k" }))).unwrap();
        assert_eq!(config.resolution, Resolution::Hd1080);
        assert_eq!(config.resolution.dimensions(), (1920, 1080));
    }

    #[test]
    fn test_resolution_presets() {
        assert_eq!(Resolution::Hd720.dimensions(), (1280, 720));
        assert_eq!(Resolution::Vertical.dimensions(), (1080, 1920));
        assert_eq!(Resolution::Square.dimensions(), (1080, 1080));
        assert_eq!(Resolution::Uhd4k.dimensions(), (3840, 2160));
    }

    #[test]
    fn test_reciter_position_is_lenient() {
        let config = RenderConfig::merged(&overrides(json!({ "reciter_position": " Above " }))).unwrap();
        assert_eq!(config.reciter_position, ReciterPosition::Above);

        for other in ["center", "BELOW", ""] {
            let config = RenderConfig::merged(&overrides(json!({ "reciter_position": other }))).unwrap();
            assert_eq!(config.reciter_position, ReciterPosition::Below, "{other}");
        }
    }

    #[test]
    fn test_zero_words_per_segment_is_rejected() {
        let err = RenderConfig::merged(&overrides(json!({ "words_per_segment": 0 }))).unwrap_err();
        assert!(matches!(err, TartilError::InvalidConfig(_)));
    }

    #[test]
    fn test_clean_policy_selection() {
        let mut config = RenderConfig::default();
        config.aggressive_clean = true;
        assert_eq!(config.clean_policy(), CleanPolicy::Aggressive);

        config.aggressive_clean = false;
        config.clean_text = false;
        assert_eq!(config.clean_policy(), CleanPolicy::Raw);
    }
}
