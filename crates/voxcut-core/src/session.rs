//! Editing session
//!
//! Holds one loaded track, its section list and the in-progress
//! mark-start / mark-end selection. Loading another file means building a
//! new session; nothing here is global.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ProcessingError, Result};
use crate::pipeline::ProcessingRequest;
use crate::section::{SectionSet, TimeRange, TIME_EPSILON};
use crate::time_format::format_time_precise;
use crate::types::Track;

/// What a [`EditingSession::mark`] call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkAction {
    StartMarked,
    EndMarked,
    /// Index of the new section in the set
    SectionAdded(usize),
}

pub struct EditingSession {
    track: Arc<Track>,
    source_path: PathBuf,
    sections: SectionSet,
    pending_start: Option<f64>,
    pending_end: Option<f64>,
}

impl EditingSession {
    pub fn new(track: Track, source_path: impl Into<PathBuf>) -> Self {
        let source_path = source_path.into();
        log::info!(
            "EditingSession: loaded {:?} ({:.2}s, {} Hz, {} ch)",
            source_path,
            track.duration_secs(),
            track.sample_rate(),
            track.channels()
        );
        Self {
            track: Arc::new(track),
            source_path,
            sections: SectionSet::new(),
            pending_start: None,
            pending_end: None,
        }
    }

    pub fn track(&self) -> &Arc<Track> {
        &self.track
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn sections(&self) -> &SectionSet {
        &self.sections
    }

    /// Pending selection, if both ends are marked
    pub fn selection(&self) -> Option<(f64, f64)> {
        self.pending_start.zip(self.pending_end)
    }

    /// Mark the start of a new selection at `position` (seconds)
    ///
    /// Replaces any pending selection.
    pub fn mark_start(&mut self, position: f64) {
        let position = self.clamp_position(position);
        self.pending_start = Some(position);
        self.pending_end = None;
        log::debug!("EditingSession: start marked at {}", format_time_precise(position));
    }

    /// Mark the end of the pending selection
    ///
    /// Fails with `InvalidRange` unless a start is marked and `position`
    /// lies after it.
    pub fn mark_end(&mut self, position: f64) -> Result<()> {
        let position = self.clamp_position(position);
        match self.pending_start {
            Some(start) if position - start > TIME_EPSILON => {
                self.pending_end = Some(position);
                log::debug!("EditingSession: end marked at {}", format_time_precise(position));
                Ok(())
            }
            Some(start) => Err(ProcessingError::InvalidRange { start, end: position }),
            None => Err(ProcessingError::InvalidRange {
                start: f64::NAN,
                end: position,
            }),
        }
    }

    /// Turn the pending selection into a section and clear it
    ///
    /// Returns `None` when the selection is incomplete.
    pub fn add_selection(&mut self) -> Result<Option<usize>> {
        let Some((start, end)) = self.selection() else {
            return Ok(None);
        };
        let index = self.sections.add(TimeRange::new(start, end)?)?;
        self.cancel_selection();
        Ok(Some(index))
    }

    /// Add a section typed in directly
    pub fn add_section(&mut self, range: TimeRange) -> Result<usize> {
        self.sections.add(range)
    }

    /// Drop the pending selection; sections are untouched
    pub fn cancel_selection(&mut self) {
        self.pending_start = None;
        self.pending_end = None;
    }

    /// One press of the mark key: start, then end, then add
    pub fn mark(&mut self, position: f64) -> Result<MarkAction> {
        match (self.pending_start, self.pending_end) {
            (None, _) => {
                self.mark_start(position);
                Ok(MarkAction::StartMarked)
            }
            (Some(_), None) => {
                self.mark_end(position)?;
                Ok(MarkAction::EndMarked)
            }
            (Some(start), Some(end)) => match self.add_selection()? {
                Some(index) => Ok(MarkAction::SectionAdded(index)),
                None => Err(ProcessingError::InvalidRange { start, end }),
            },
        }
    }

    /// Status text for the pending selection
    pub fn selection_label(&self) -> String {
        match (self.pending_start, self.pending_end) {
            (None, _) => "No section selected".to_string(),
            (Some(start), None) => format!(
                "Start: {} - Click 'Mark End' to set end point",
                format_time_precise(start)
            ),
            (Some(start), Some(end)) => format!(
                "Selected: {} to {}",
                format_time_precise(start),
                format_time_precise(end)
            ),
        }
    }

    /// `Section N: ...` labels for the list view
    pub fn section_labels(&self) -> Vec<String> {
        self.sections.labels()
    }

    /// Delete a section; the remaining ones are renumbered
    pub fn remove_section(&mut self, index: usize) -> Result<TimeRange> {
        let removed = self.sections.remove(index)?;
        log::debug!("EditingSession: removed section {} ({})", index + 1, removed.describe());
        Ok(removed)
    }

    pub fn clear_sections(&mut self) {
        self.sections.clear();
        self.cancel_selection();
    }

    /// Copy of the current state for a processing run
    ///
    /// Later edits don't reach a run that was already started.
    pub fn snapshot(&self) -> Result<ProcessingRequest> {
        if self.sections.is_empty() {
            return Err(ProcessingError::NoSections);
        }
        Ok(ProcessingRequest {
            track: Arc::clone(&self.track),
            sections: self.sections.clone(),
            source_path: self.source_path.clone(),
        })
    }

    fn clamp_position(&self, position: f64) -> f64 {
        position.clamp(0.0, self.track.duration_secs())
    }
}
