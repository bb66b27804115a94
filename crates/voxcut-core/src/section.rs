//! Section editing: time ranges and the per-session section list
//!
//! A [`SectionSet`] keeps sections in the order the user added them (this
//! is the display order). Processing always works on a start-sorted copy
//! from [`SectionSet::sorted_by_start`].
//!
//! Boundaries are never compared exactly. Two positions closer than
//! [`TIME_EPSILON`] are the same position, so sections that touch within a
//! millisecond are adjacent, not overlapping.

use serde::{Deserialize, Serialize};

use crate::error::{ProcessingError, Result};
use crate::time_format::format_time_precise;

/// Tolerance for comparing section boundaries (1ms)
pub const TIME_EPSILON: f64 = 0.001;

/// A `[start, end)` interval in seconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    /// Create a range, rejecting `end <= start`
    pub fn new(start: f64, end: f64) -> Result<Self> {
        let range = Self { start, end };
        range.check()?;
        Ok(range)
    }

    fn check(&self) -> Result<()> {
        let finite = self.start.is_finite() && self.end.is_finite();
        if !finite || self.end - self.start <= TIME_EPSILON {
            return Err(ProcessingError::InvalidRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// Length in seconds
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Whether the range lies within `[0, duration]`
    pub fn fits_within(&self, duration: f64) -> bool {
        self.start >= -TIME_EPSILON && self.end <= duration + TIME_EPSILON
    }

    /// Whether `self` runs past the start of a later range
    pub fn overlaps_next(&self, next: &TimeRange) -> bool {
        self.end - next.start > TIME_EPSILON
    }

    /// Human-readable `MM:SS.ss to MM:SS.ss`
    pub fn describe(&self) -> String {
        format!(
            "{} to {}",
            format_time_precise(self.start),
            format_time_precise(self.end)
        )
    }
}

impl PartialEq for TimeRange {
    fn eq(&self, other: &Self) -> bool {
        (self.start - other.start).abs() < TIME_EPSILON
            && (self.end - other.end).abs() < TIME_EPSILON
    }
}

/// The sections selected in one editing session, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionSet {
    sections: Vec<TimeRange>,
}

impl SectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a section, returning its index
    ///
    /// Only `end > start` is checked here; bounds and overlap are checked
    /// by [`validate_against`](Self::validate_against) and
    /// [`overlap_check`](Self::overlap_check) before processing.
    pub fn add(&mut self, range: TimeRange) -> Result<usize> {
        range.check()?;
        self.sections.push(range);
        log::debug!("SectionSet: added {} as section {}", range.describe(), self.sections.len());
        Ok(self.sections.len() - 1)
    }

    /// Remove the section at `index`; later sections shift down by one
    pub fn remove(&mut self, index: usize) -> Result<TimeRange> {
        if index >= self.sections.len() {
            return Err(ProcessingError::IndexOutOfRange {
                index,
                len: self.sections.len(),
            });
        }
        Ok(self.sections.remove(index))
    }

    pub fn clear(&mut self) {
        self.sections.clear();
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TimeRange> {
        self.sections.get(index)
    }

    /// Sections in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &TimeRange> {
        self.sections.iter()
    }

    /// Index of a section equal (within epsilon) to `range`
    pub fn position(&self, range: &TimeRange) -> Option<usize> {
        self.sections.iter().position(|s| s == range)
    }

    /// Start-sorted copy; equal starts keep insertion order
    pub fn sorted_by_start(&self) -> Vec<TimeRange> {
        let mut sorted = self.sections.clone();
        // sort_by is stable
        sorted.sort_by(|a, b| a.start.total_cmp(&b.start));
        sorted
    }

    /// Fail with `OutOfBounds` if any section leaves `[0, duration]`
    pub fn validate_against(&self, duration: f64) -> Result<()> {
        match self.sections.iter().find(|s| !s.fits_within(duration)) {
            Some(bad) => Err(ProcessingError::OutOfBounds {
                start: bad.start,
                end: bad.end,
                duration,
            }),
            None => Ok(()),
        }
    }

    /// Fail with `OverlappingSections` if any two sorted sections overlap
    pub fn overlap_check(&self) -> Result<()> {
        let sorted = self.sorted_by_start();
        for pair in sorted.windows(2) {
            if pair[0].overlaps_next(&pair[1]) {
                return Err(ProcessingError::OverlappingSections {
                    first_end: pair[0].end,
                    second_start: pair[1].start,
                });
            }
        }
        Ok(())
    }

    /// Display labels in insertion order, numbered from the current list
    ///
    /// `Section 1: 00:10.00 to 00:20.00`
    pub fn labels(&self) -> Vec<String> {
        self.sections
            .iter()
            .enumerate()
            .map(|(i, s)| section_label(i + 1, s))
            .collect()
    }
}

/// Label for the `number`th section (1-based)
pub fn section_label(number: usize, range: &TimeRange) -> String {
    format!("Section {}: {}", number, range.describe())
}

impl<'a> IntoIterator for &'a SectionSet {
    type Item = &'a TimeRange;
    type IntoIter = std::slice::Iter<'a, TimeRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.sections.iter()
    }
}
