//! ASS subtitle track generation.
//!
//! [`StyleSheet`] resolves a [`RenderConfig`] into concrete render parameters
//! (canvas, colors, reciter placement); [`build`] turns a [`Timeline`] into a
//! complete subtitle script using those parameters.

use std::{fmt, path::Path};

use tokio::fs;

use crate::{
    config::{ReciterPosition, RenderConfig},
    error::{Result, TartilError},
    format::ass_time,
    types::Timeline,
};

const SECONDARY_COLOR: &str = "&H000000FF";
const BACK_COLOR: &str = "&H00000000";
const RECITER_COLOR: &str = "&H0000A5FF";
const MARGIN_H: u32 = 80;
const VERSE_MARGIN_V: i64 = 40;

/// Foreground/outline color pair. Exactly one is active per render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Theme {
    /// Light text on a dark outline.
    Day,
    /// Dark text on a light outline.
    Night,
}

impl Theme {
    pub fn from_night_mode(night_mode: bool) -> Self {
        if night_mode { Theme::Night } else { Theme::Day }
    }

    pub fn primary_color(&self) -> &'static str {
        match self {
            Theme::Day => "&H00FFFFFF",
            Theme::Night => "&H00000000",
        }
    }

    pub fn outline_color(&self) -> &'static str {
        match self {
            Theme::Day => "&H00101010",
            Theme::Night => "&H00FFFFFF",
        }
    }
}

/// Fade applied at both edges of each event's own time window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fade {
    pub in_ms: u64,
    pub out_ms: u64,
}

impl Fade {
    fn from_config(config: &RenderConfig) -> Option<Self> {
        if !config.fade_in && !config.fade_out {
            return None;
        }
        let ms = (config.fade_duration * 1000.0).trunc() as u64;
        Some(Fade {
            in_ms: if config.fade_in { ms } else { 0 },
            out_ms: if config.fade_out { ms } else { 0 },
        })
    }

    pub fn directive(&self) -> String {
        format!("{{\\fad({},{})}}", self.in_ms, self.out_ms)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReciterStyle {
    pub font: String,
    pub font_size: u32,
    pub alignment: u8,
    pub margin_v: i64,
    pub duration: f64,
}

impl ReciterStyle {
    fn from_config(config: &RenderConfig, canvas_height: u32) -> Self {
        let font = if config.reciter_font.is_empty() {
            config.font_name.clone()
        } else {
            config.reciter_font.clone()
        };

        let font_size = if config.reciter_font_size > 0 {
            config.reciter_font_size
        } else {
            (config.font_size as f64 * 0.4) as u32
        };

        let height = canvas_height as f64;
        let (alignment, margin_v) = match config.reciter_position {
            // Top-center anchor, measured down from the top edge.
            ReciterPosition::Above => (
                8,
                (height / 2.0 - config.font_size as f64 - config.reciter_spacing) as i64,
            ),
            // Bottom-center anchor, measured up from the bottom edge.
            ReciterPosition::Below => (2, (height - (height / 2.0 + config.reciter_spacing)) as i64),
        };

        Self {
            font,
            font_size,
            alignment,
            margin_v,
            duration: config.reciter_duration,
        }
    }
}

/// Concrete render parameters derived from a config.
#[derive(Clone, Debug, PartialEq)]
pub struct StyleSheet {
    pub width: u32,
    pub height: u32,
    pub theme: Theme,
    pub font: String,
    pub font_size: u32,
    pub alignment: u8,
    pub outline: u32,
    pub shadow: u32,
    pub fade: Option<Fade>,
    /// `None` when the reciter overlay is switched off.
    pub reciter: Option<ReciterStyle>,
}

impl StyleSheet {
    pub fn from_config(config: &RenderConfig) -> Self {
        let (width, height) = config.resolution.dimensions();
        let reciter = config
            .show_reciter
            .then(|| ReciterStyle::from_config(config, height));

        Self {
            width,
            height,
            theme: Theme::from_night_mode(config.night_mode),
            font: config.font_name.clone(),
            font_size: config.font_size,
            alignment: config.alignment,
            outline: config.outline,
            shadow: config.shadow,
            fade: Fade::from_config(config),
            reciter,
        }
    }

    fn style_line(&self, name: &str, font: &str, size: u32, color: &str, alignment: u8, margin_v: i64) -> String {
        format!(
            "Style: {name},{font},{size},{color},{SECONDARY_COLOR},{outline_color},{BACK_COLOR},0,0,0,0,100,100,0,0,1,{outline},{shadow},{alignment},{MARGIN_H},{MARGIN_H},{margin_v},1",
            outline_color = self.theme.outline_color(),
            outline = self.outline,
            shadow = self.shadow,
        )
    }

    fn header(&self, with_reciter: bool) -> String {
        let mut styles = vec![self.style_line(
            "Verse",
            &self.font,
            self.font_size,
            self.theme.primary_color(),
            self.alignment,
            VERSE_MARGIN_V,
        )];
        if let (true, Some(reciter)) = (with_reciter, &self.reciter) {
            styles.push(self.style_line(
                "Reciter",
                &reciter.font,
                reciter.font_size,
                RECITER_COLOR,
                reciter.alignment,
                reciter.margin_v,
            ));
        }

        format!(
            "[Script Info]
ScriptType: v4.00+
PlayResX: {width}
PlayResY: {height}
ScaledBorderAndShadow: yes
WrapStyle: 2

[V4+ Styles]
Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding
{styles}

[Events]
Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
",
            width = self.width,
            height = self.height,
            styles = styles.join("\n"),
        )
    }
}

/// A rendered subtitle script.
#[derive(Clone, Debug, PartialEq)]
pub struct SubtitleDocument {
    text: String,
    events: usize,
}

impl SubtitleDocument {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of dialogue events, reciter line included.
    pub fn event_count(&self) -> usize {
        self.events
    }

    pub async fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, &self.text).await?;
        Ok(())
    }
}

impl fmt::Display for SubtitleDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn dialogue(start: f64, end: f64, style: &str, fade: Option<Fade>, text: &str) -> String {
    let fade = fade.map(|f| f.directive()).unwrap_or_default();
    format!(
        "Dialogue: 0,{},{},{style},,0,0,0,,{fade}{text}",
        ass_time(start),
        ass_time(end)
    )
}

/// Render the timeline into a subtitle script.
///
/// Fails with [`TartilError::NoCaptions`] on an empty timeline.
pub fn build(timeline: &Timeline, style: &StyleSheet, reciter_name: Option<&str>) -> Result<SubtitleDocument> {
    if timeline.is_empty() {
        return Err(TartilError::NoCaptions);
    }

    let reciter = match (reciter_name.map(str::trim), &style.reciter) {
        (Some(name), Some(reciter)) if !name.is_empty() => Some((name, reciter)),
        _ => None,
    };

    let mut lines = Vec::with_capacity(timeline.len() + 1);
    if let Some((name, reciter)) = reciter {
        lines.push(dialogue(0.0, reciter.duration, "Reciter", style.fade, name));
    }
    for unit in &timeline.units {
        lines.push(dialogue(unit.start, unit.end, "Verse", style.fade, &unit.text));
    }

    let text = format!("{}{}\n", style.header(reciter.is_some()), lines.join("\n"));
    Ok(SubtitleDocument {
        text,
        events: lines.len(),
    })
}
