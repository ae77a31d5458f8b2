//! Plain-text rendering of transcripts and artifact file names.

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::{Offset, TranscriptEntry};

/// Title used when the platform gives none
pub const DEFAULT_TITLE: &str = "Meeting Transcript";

/// Compact timestamp embedded in recording names, e.g. `20260211_093510`
const COMPACT_STAMP: &str = "%Y%m%d_%H%M%S";

const MAX_FILENAME_CHARS: usize = 180;

/// Render an entry offset as `HH:MM:SS`.
///
/// Numbers above 1e12 are 100ns ticks, above 1e6 milliseconds, otherwise
/// seconds. Clock strings lose their fractional part.
pub fn format_offset(offset: Option<&Offset>) -> String {
    match offset {
        None => String::new(),
        Some(Offset::Number(n)) => format_seconds(to_seconds(*n)),
        Some(Offset::Text(s)) => {
            if s.contains(':') {
                s.split('.').next().unwrap_or_default().to_string()
            } else if let Ok(n) = s.trim().parse::<f64>() {
                format_seconds(to_seconds(n))
            } else {
                s.clone()
            }
        }
    }
}

fn to_seconds(value: f64) -> f64 {
    if value > 1e12 {
        value / 1e7
    } else if value > 1e6 {
        value / 1000.0
    } else {
        value
    }
}

fn format_seconds(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

/// `YYYYMMDD_HHMMSS` → `YYYY-MM-DD HH:MM:SS`; other text passes through;
/// empty falls back to `now`.
pub fn format_scheduled_start(scheduled_start: &str, now: NaiveDateTime) -> String {
    let raw = scheduled_start.trim();
    if raw.is_empty() {
        return now.format("%Y-%m-%d %H:%M:%S").to_string();
    }
    match NaiveDateTime::parse_from_str(raw, COMPACT_STAMP) {
        Ok(parsed) => parsed.format("%Y-%m-%d %H:%M:%S").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Render the transcript as the text written by the sink
pub fn format_transcript_text(
    title: &str,
    scheduled_start: &str,
    entries: &[TranscriptEntry],
    now: NaiveDateTime,
) -> String {
    let title = if title.trim().is_empty() {
        DEFAULT_TITLE
    } else {
        title
    };

    let mut rows = vec![
        title.to_string(),
        format_scheduled_start(scheduled_start, now),
        String::new(),
    ];

    for entry in entries {
        rows.push(
            entry
                .speaker_display_name
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
        );
        rows.push(format_offset(entry.start_offset.as_ref()));
        rows.push(entry.text.clone().unwrap_or_default());
        rows.push(String::new());
    }

    rows.join("\n")
}

/// Strip characters that are invalid in file names on common platforms
pub fn sanitize_filename(name: &str) -> String {
    let stripped: String = name
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();

    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_FILENAME_CHARS)
        .collect::<String>()
        .trim()
        .to_string()
}

/// `"2026-02-11 0935 - Weekly Sync.txt"`, or `"<today> - <title>.txt"`
/// when the scheduled start is unknown.
pub fn build_transcript_filename(title: &str, scheduled_start: &str, today: NaiveDate) -> String {
    let mut safe_title = sanitize_filename(title);
    if safe_title.is_empty() {
        safe_title = DEFAULT_TITLE.to_string();
    }

    let prefix = match NaiveDateTime::parse_from_str(scheduled_start.trim(), COMPACT_STAMP) {
        Ok(start) => start.format("%Y-%m-%d %H%M").to_string(),
        Err(_) => today.format("%Y-%m-%d").to_string(),
    };

    format!("{} - {}.txt", prefix, safe_title)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 11)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_format_offset_units() {
        assert_eq!(format_offset(Some(&Offset::Number(3.7))), "00:00:03");
        assert_eq!(format_offset(Some(&Offset::Number(1_230_000.0))), "00:20:30");
        // 1.23e13 ticks = 1_230_000 seconds
        assert_eq!(format_offset(Some(&Offset::Number(12_300_000_000_000.0))), "341:40:00");
        assert_eq!(format_offset(Some(&Offset::Number(-5.0))), "00:00:00");
    }

    #[test]
    fn test_format_offset_strings() {
        assert_eq!(format_offset(Some(&Offset::Text("00:01:02.123".into()))), "00:01:02");
        assert_eq!(format_offset(Some(&Offset::Text("7".into()))), "00:00:07");
        assert_eq!(format_offset(Some(&Offset::Text("soon".into()))), "soon");
        assert_eq!(format_offset(None), "");
    }

    #[test]
    fn test_format_scheduled_start() {
        assert_eq!(
            format_scheduled_start("20260211_093510", fixed_now()),
            "2026-02-11 09:35:10"
        );
        assert_eq!(format_scheduled_start("Tuesday", fixed_now()), "Tuesday");
        assert_eq!(format_scheduled_start("", fixed_now()), "2026-02-11 12:00:00");
    }

    #[test]
    fn test_transcript_text_layout() {
        let entries = vec![
            TranscriptEntry::new("Chris", Offset::Text("00:00:05.000".into()), "Hello"),
            TranscriptEntry::new("Sam", Offset::Number(7.0), "World"),
            TranscriptEntry::default(),
        ];
        let text = format_transcript_text("Weekly Sync", "20260211_093510", &entries, fixed_now());

        let lines: Vec<&str> = text.split('\n').collect();
        assert_eq!(lines[0], "Weekly Sync");
        assert_eq!(lines[1], "2026-02-11 09:35:10");
        assert_eq!(lines[2], "");
        assert_eq!(&lines[3..7], &["Chris", "00:00:05", "Hello", ""]);
        assert_eq!(&lines[7..11], &["Sam", "00:00:07", "World", ""]);
        assert_eq!(&lines[11..15], &["Unknown", "", "", ""]);
    }

    #[test]
    fn test_transcript_text_default_title() {
        let text = format_transcript_text("  ", "", &[], fixed_now());
        assert!(text.starts_with("Meeting Transcript\n"));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a/b:c*\"d?e<f>g|"), "abcdefg");
        assert_eq!(sanitize_filename("  Weekly \t  Sync  "), "Weekly Sync");
        assert_eq!(sanitize_filename(&"x".repeat(300)).len(), 180);
    }

    #[test]
    fn test_build_filename() {
        let today = fixed_now().date();
        assert_eq!(
            build_transcript_filename("Weekly Sync", "20260211_093510", today),
            "2026-02-11 0935 - Weekly Sync.txt"
        );
        assert_eq!(
            build_transcript_filename("Weekly Sync", "", today),
            "2026-02-11 - Weekly Sync.txt"
        );
        assert_eq!(
            build_transcript_filename("???", "", today),
            "2026-02-11 - Meeting Transcript.txt"
        );
    }
}
