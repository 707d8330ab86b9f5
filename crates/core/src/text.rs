//! Scripture text cleaning and caption segmentation.

use unicode_normalization::UnicodeNormalization;

/// How much of the raw text survives cleaning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CleanPolicy {
    /// Leave the text untouched.
    Raw,
    /// NFC, drop zero-width marks, trim. Pause and annotation marks stay.
    Preserve,
    /// `Preserve` plus removal of pause/annotation marks and whitespace collapsing.
    Aggressive,
}

/// Characters trimmed from both ends of the text before segmentation.
const EDGE_PUNCTUATION: &[char] = &[' ', ',', '،'];

fn is_zero_width(c: char) -> bool {
    matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}')
}

/// Small high ligatures, pause marks and the rub el hizb sign.
fn is_pause_mark(c: char) -> bool {
    matches!(c, '\u{06D6}'..='\u{06ED}')
}

/// Harakat, tanwin, shadda, sukun, superscript alef and the pause marks.
fn is_diacritic(c: char) -> bool {
    matches!(c, '\u{064B}'..='\u{065F}' | '\u{0670}') || is_pause_mark(c)
}

pub fn normalize(raw: &str, policy: CleanPolicy) -> String {
    match policy {
        CleanPolicy::Raw => raw.to_string(),
        CleanPolicy::Preserve => {
            let composed: String = raw.nfc().filter(|c| !is_zero_width(*c)).collect();
            composed.trim().to_string()
        }
        CleanPolicy::Aggressive => {
            // Zero-width marks go before collapsing so they cannot leave a double space behind.
            let composed: String = raw
                .nfc()
                .filter(|c| !is_pause_mark(*c) && !is_zero_width(*c))
                .collect();
            composed.split_whitespace().collect::<Vec<_>>().join(" ")
        }
    }
}

pub fn strip_diacritics(text: &str) -> String {
    text.chars().filter(|c| !is_diacritic(*c)).collect()
}

/// Split text into caption units of `words_per_unit` words. When that yields
/// more than `max_units` units, the chunk size is widened once so the count
/// fits.
pub fn segment(text: &str, words_per_unit: usize, max_units: usize) -> Vec<String> {
    let words: Vec<&str> = text.trim_matches(EDGE_PUNCTUATION).split_whitespace().collect();

    if words.is_empty() {
        return Vec::new();
    }

    let mut size = words_per_unit.max(1);
    let max_units = max_units.max(1);
    if words.len().div_ceil(size) > max_units {
        size = words.len().div_ceil(max_units);
    }

    words.chunks(size).map(|chunk| chunk.join(" ")).collect()
}

/// Normalize according to the config's policy, then optionally strip diacritics.
pub fn prepare(raw: &str, policy: CleanPolicy, remove_diacritics: bool) -> String {
    let cleaned = normalize(raw, policy);
    if remove_diacritics {
        strip_diacritics(&cleaned)
    } else {
        cleaned
    }
}

/// First 50 characters of the text, suffixed with `...` when cut.
pub fn preview(text: &str) -> String {
    const LIMIT: usize = 50;
    if text.chars().count() > LIMIT {
        let head: String = text.chars().take(LIMIT).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASMALA: &str = "بِسْمِ ٱللَّهِ ٱلرَّحْمَـٰنِ ٱلرَّحِيمِ";

    #[test]
    fn test_preserve_strips_zero_width_and_trims() {
        let raw = "  \u{200B}بِسْمِ\u{FEFF} ٱللَّهِ  ";
        assert_eq!(normalize(raw, CleanPolicy::Preserve), "بِسْمِ ٱللَّهِ");
    }

    #[test]
    fn test_preserve_keeps_pause_marks_and_inner_spacing() {
        let raw = "ذَٰلِكَ ٱلْكِتَـٰبُ لَا رَيْبَ ۛ  فِيهِ";
        let cleaned = normalize(raw, CleanPolicy::Preserve);
        assert!(cleaned.contains('\u{06DB}'));
        assert!(cleaned.contains("  "));
    }

    #[test]
    fn test_preserve_is_a_fixed_point() {
        let raw = " \u{200C}ذَٰلِكَ ٱلْكِتَـٰبُ ۛ فِيهِ ۛ هُدًى \u{200D}";
        let once = normalize(raw, CleanPolicy::Preserve);
        let twice = normalize(&once, CleanPolicy::Preserve);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_aggressive_strips_pause_marks_and_collapses_spaces() {
        let raw = "لَا رَيْبَ ۛ   فِيهِ ۛ\u{200B} هُدًى";
        let cleaned = normalize(raw, CleanPolicy::Aggressive);
        assert!(!cleaned.chars().any(is_pause_mark));
        assert!(!cleaned.contains("  "));
        assert!(!cleaned.contains('\u{200B}'));
        assert_eq!(cleaned.split(' ').count(), 4);
    }

    #[test]
    fn test_raw_leaves_text_untouched() {
        let raw = " \u{200B}text ۛ ";
        assert_eq!(normalize(raw, CleanPolicy::Raw), raw);
    }

    #[test]
    fn test_strip_diacritics_keeps_base_letters() {
        assert_eq!(strip_diacritics("بِسْمِ"), "بسم");
        assert_eq!(strip_diacritics("ٱلرَّحْمَـٰنِ"), "ٱلرحمـن");
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert_eq!(normalize("", CleanPolicy::Preserve), "");
        assert_eq!(normalize("   ", CleanPolicy::Aggressive), "");
        assert!(segment("", 4, 50).is_empty());
        assert!(segment(" ،, ", 4, 50).is_empty());
    }

    #[test]
    fn test_segment_groups_by_words_per_unit() {
        let text = "w1 w2 w3 w4 w5 w6 w7 w8 w9";
        let units = segment(text, 4, 50);
        let sizes: Vec<usize> = units.iter().map(|u| u.split(' ').count()).collect();
        assert_eq!(sizes, vec![4, 4, 1]);
        assert_eq!(units[0], "w1 w2 w3 w4");
    }

    #[test]
    fn test_segment_rechunks_when_over_max_units() {
        let text = "w1 w2 w3 w4 w5 w6 w7 w8 w9";
        let units = segment(text, 4, 2);
        assert!(units.len() <= 2);
        assert_eq!(units, vec!["w1 w2 w3 w4 w5", "w6 w7 w8 w9"]);
    }

    #[test]
    fn test_segment_trims_edge_punctuation_and_whitespace_runs() {
        let units = segment(", a  b\tc ،", 2, 50);
        assert_eq!(units, vec!["a b", "c"]);
    }

    #[test]
    fn test_prepare_composes_policy_and_diacritics() {
        let prepared = prepare(BASMALA, CleanPolicy::Preserve, true);
        assert_eq!(prepared, "بسم ٱلله ٱلرحمـن ٱلرحيم");
    }

    #[test]
    fn test_preview_truncates_by_characters() {
        let long = "ب".repeat(60);
        let short = preview(&long);
        assert_eq!(short.chars().count(), 53);
        assert!(short.ends_with("..."));
        assert_eq!(preview("short"), "short");
    }
}
