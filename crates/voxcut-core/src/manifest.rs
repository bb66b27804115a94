//! Processing manifest
//!
//! A plain-text record written next to the output audio:
//!
//! ```text
//! Vocal Removal Sections:
//!
//! Section 1: 00:10 to 00:20
//! Section 2: 00:50 to 01:00
//!
//! Original file: song.mp3
//! Processed on: 2026-10-16 14:03:27
//! ```

use chrono::{DateTime, Local};

use crate::section::TimeRange;
use crate::time_format::format_time;

/// First line of every manifest
pub const MANIFEST_HEADER: &str = "Vocal Removal Sections:";

/// Which sections one run processed, in processing (start-sorted) order
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingManifest {
    sections: Vec<TimeRange>,
    source_name: String,
    processed_at: DateTime<Local>,
}

impl ProcessingManifest {
    pub fn new(
        sections: Vec<TimeRange>,
        source_name: impl Into<String>,
        processed_at: DateTime<Local>,
    ) -> Self {
        Self {
            sections,
            source_name: source_name.into(),
            processed_at,
        }
    }

    pub fn sections(&self) -> &[TimeRange] {
        &self.sections
    }

    /// File name of the source track (no directory)
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn processed_at(&self) -> DateTime<Local> {
        self.processed_at
    }

    /// Source file name without its extension
    pub fn source_basename(&self) -> &str {
        match self.source_name.rfind('.') {
            Some(dot) if dot > 0 => &self.source_name[..dot],
            _ => &self.source_name,
        }
    }

    /// Render the manifest text
    pub fn render(&self) -> String {
        let mut text = String::new();
        text.push_str(MANIFEST_HEADER);
        text.push_str("\n\n");
        for (i, section) in self.sections.iter().enumerate() {
            text.push_str(&format!(
                "Section {}: {} to {}\n",
                i + 1,
                format_time(section.start),
                format_time(section.end)
            ));
        }
        text.push_str(&format!("\nOriginal file: {}\n", self.source_name));
        text.push_str(&format!(
            "Processed on: {}\n",
            self.processed_at.format("%Y-%m-%d %H:%M:%S")
        ));
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn manifest() -> ProcessingManifest {
        let at = Local.with_ymd_and_hms(2026, 10, 16, 14, 3, 27).unwrap();
        ProcessingManifest::new(
            vec![
                TimeRange::new(10.0, 20.0).unwrap(),
                TimeRange::new(50.5, 60.0).unwrap(),
            ],
            "my song.mp3",
            at,
        )
    }

    #[test]
    fn test_render_layout() {
        let text = manifest().render();
        let expected = "Vocal Removal Sections:\n\
                        \n\
                        Section 1: 00:10 to 00:20\n\
                        Section 2: 00:50 to 01:00\n\
                        \n\
                        Original file: my song.mp3\n\
                        Processed on: 2026-10-16 14:03:27\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_source_basename() {
        assert_eq!(manifest().source_basename(), "my song");
        let at = Local.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(ProcessingManifest::new(vec![], "noext", at).source_basename(), "noext");
        assert_eq!(ProcessingManifest::new(vec![], ".hidden", at).source_basename(), ".hidden");
        assert_eq!(ProcessingManifest::new(vec![], "a.b.flac", at).source_basename(), "a.b");
    }
}
