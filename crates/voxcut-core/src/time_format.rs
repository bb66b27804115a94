//! Time position formatting and parsing
//!
//! - `MM:SS` for the manifest
//! - `MM:SS.ss` for status text and section labels
//! - [`parse_time`] for numeric entry (`SS`, `MM:SS`, `HH:MM:SS`)

/// Format seconds as `MM:SS` (truncating fractions)
pub fn format_time(secs: f64) -> String {
    let whole = secs.max(0.0) as u64;
    format!("{:02}:{:02}", whole / 60, whole % 60)
}

/// Format seconds as `MM:SS.ss`
pub fn format_time_precise(secs: f64) -> String {
    // Round once so hundredths carry into seconds and minutes
    let centis = (secs.max(0.0) * 100.0).round() as u64;
    let minutes = centis / 6000;
    let seconds = (centis / 100) % 60;
    format!("{:02}:{:02}.{:02}", minutes, seconds, centis % 100)
}

/// Parse a time position in seconds
///
/// Accepts `90`, `90.5`, `1:30`, `01:30.25` and `1:01:30`. Each field after
/// the first must be below 60.
pub fn parse_time(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let fields: Vec<&str> = text.split(':').collect();
    if fields.len() > 3 {
        return None;
    }

    let (last, leading) = fields.split_last()?;
    let seconds: f64 = last.parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    if !leading.is_empty() && seconds >= 60.0 {
        return None;
    }

    let mut total = seconds;
    let mut scale = 60.0;
    for (i, field) in leading.iter().rev().enumerate() {
        let value: u64 = field.parse().ok()?;
        // Minutes are bounded only when hours are present
        if i == 0 && leading.len() == 2 && value >= 60 {
            return None;
        }
        total += value as f64 * scale;
        scale *= 60.0;
    }
    Some(total)
}
