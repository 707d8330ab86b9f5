//! Proportional caption timing.

use crate::types::{CaptionUnit, Timeline};

/// Shortest time a caption stays on screen, in seconds.
pub const MIN_UNIT_DURATION: f64 = 0.35;

/// Duration used when the narration could not be measured.
pub const FALLBACK_DURATION: f64 = 0.1;

/// Non-space character count, floored at 1.
pub fn weight(text: &str) -> usize {
    text.chars().filter(|c| *c != ' ').count().max(1)
}

/// Spread `units` over `total_duration` proportionally to their weight.
///
/// Units shorter than [`MIN_UNIT_DURATION`] are stretched at the expense of
/// the running clock, and the last unit always ends exactly at the usable
/// duration.
pub fn allocate<S: AsRef<str>>(units: &[S], total_duration: f64) -> Timeline {
    // f64::max ignores NaN, so an unmeasured duration lands on the fallback too.
    let usable = total_duration.max(FALLBACK_DURATION);

    let weights: Vec<usize> = units.iter().map(|u| weight(u.as_ref())).collect();
    let total_weight: usize = weights.iter().sum();

    let mut clock = 0.0_f64;
    let mut timed = Vec::with_capacity(units.len());

    for (index, (text, w)) in units.iter().zip(&weights).enumerate() {
        let share = usable * (*w as f64 / total_weight as f64);
        let start = clock;
        let mut end = (clock + share).min(usable);
        if end - start < MIN_UNIT_DURATION {
            end = (start + MIN_UNIT_DURATION).min(usable);
        }

        timed.push(CaptionUnit {
            index,
            text: text.as_ref().to_string(),
            weight: *w,
            start,
            end,
        });
        clock = end;
    }

    if let Some(last) = timed.last_mut() {
        last.end = usable;
    }

    Timeline {
        units: timed,
        duration: usable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_contiguous(timeline: &Timeline) {
        assert_eq!(timeline.units[0].start, 0.0);
        for pair in timeline.units.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert!(pair[0].end <= pair[1].end);
        }
    }

    #[test]
    fn test_weight_ignores_spaces_and_floors_at_one() {
        assert_eq!(weight("ab cd"), 4);
        assert_eq!(weight("   "), 1);
        assert_eq!(weight("بِسْمِ"), 6);
    }

    #[test]
    fn test_durations_follow_character_weight() {
        let timeline = allocate(&["aaaa", "aaaaaaaaaaaa"], 16.0);
        assert_eq!(timeline.len(), 2);
        assert!((timeline.units[0].duration() - 4.0).abs() < 1e-9);
        assert_eq!(timeline.units[1].end, 16.0);
        assert_contiguous(&timeline);
    }

    #[test]
    fn test_last_unit_ends_exactly_at_duration() {
        let units = ["one", "two words", "three little words", "x"];
        for duration in [1.7, 3.0, 12.345, 97.03] {
            let timeline = allocate(&units, duration);
            assert_eq!(timeline.units.last().unwrap().end, duration);
            assert_contiguous(&timeline);
        }
    }

    #[test]
    fn test_short_units_are_stretched_to_the_floor() {
        let units = ["a", "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb", "c"];
        let timeline = allocate(&units, 10.0);

        for unit in &timeline.units[..timeline.len() - 1] {
            assert!(unit.duration() >= MIN_UNIT_DURATION - 1e-9);
        }
        assert!((timeline.units[0].end - MIN_UNIT_DURATION).abs() < 1e-9);
        assert_eq!(timeline.units[2].end, 10.0);
    }

    #[test]
    fn test_tiny_duration_collapses_units_into_the_window() {
        let timeline = allocate(&["a", "b", "c"], 0.2);
        for unit in &timeline.units {
            assert!(unit.start >= 0.0 && unit.end <= 0.2);
        }
        assert_eq!(timeline.units[0].end, 0.2);
        assert_eq!(timeline.units[2].start, 0.2);
        assert_eq!(timeline.units[2].end, 0.2);
    }

    #[test]
    fn test_unmeasured_duration_uses_fallback() {
        let timeline = allocate(&["a"], 0.0);
        assert_eq!(timeline.duration, FALLBACK_DURATION);
        assert_eq!(timeline.units[0].end, FALLBACK_DURATION);

        let timeline = allocate(&["a"], f64::NAN);
        assert_eq!(timeline.duration, FALLBACK_DURATION);
    }

    #[test]
    fn test_empty_units_yield_empty_timeline() {
        let timeline = allocate::<&str>(&[], 10.0);
        assert!(timeline.is_empty());
    }
}
