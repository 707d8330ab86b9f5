/// Format seconds as an ASS timestamp (`H:MM:SS.CC`), rounded to the nearest
/// centisecond.
pub fn ass_time(seconds: f64) -> String {
    let total_cs = (seconds.max(0.0) * 100.0).round_ties_even() as u64;
    let hours = total_cs / 360_000;
    let minutes = (total_cs % 360_000) / 6_000;
    let secs = (total_cs % 6_000) / 100;
    let cs = total_cs % 100;
    format!("{}:{:02}:{:02}.{:02}", hours, minutes, secs, cs)
}

/// Parse an ASS timestamp back into seconds.
pub fn parse_ass_time(stamp: &str) -> Option<f64> {
    let mut parts = stamp.trim().splitn(3, ':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let (secs, cs) = parts.next()?.split_once('.')?;
    let secs: u64 = secs.parse().ok()?;
    if minutes >= 60 || secs >= 60 || cs.len() != 2 {
        return None;
    }
    let cs: u64 = cs.parse().ok()?;

    Some((hours * 3600 + minutes * 60 + secs) as f64 + cs as f64 / 100.0)
}
