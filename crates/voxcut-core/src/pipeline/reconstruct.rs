//! Section-based track reconstruction
//!
//! # Algorithm
//!
//! ```text
//! cursor = 0
//! for (s, e) in sections sorted by start:
//!     if s > cursor: emit Track[cursor, s)     gap, original audio
//!     emit Track[s, e)                         original section, with vocals
//!     emit separate(Track[s, e))               instrumental twin
//!     cursor = e
//! if cursor < D: emit Track[cursor, D)         trailing original audio
//! ```
//!
//! Every section therefore appears twice in the output (A/B comparison),
//! and the output is `D + Σ(e - s)` long.
//!
//! Boundaries are converted to frame indices once, up front, so gap and
//! original fragments tile the source track exactly. A section whose start
//! lands within epsilon before the previous end is snapped to that end.
//!
//! Separation runs before assembly. With `max_parallel_sections > 1` the
//! adapter calls fan out over a rayon pool; results are collected in
//! section order, so the assembled output is identical either way.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;
use rayon::prelude::*;

use super::message::ProcessingStatus;
use super::PipelineOptions;
use crate::error::{ProcessingError, Result};
use crate::manifest::ProcessingManifest;
use crate::section::{SectionSet, TimeRange};
use crate::separation::{conform_instrumental, SeparationAdapter};
use crate::types::{Clip, Track};

/// Origin of one stretch of the output track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    /// Original audio between sections (or before the first / after the last)
    Gap,
    /// Original audio of a section, vocals included
    Original,
    /// Adapter output for a section
    Instrumental,
}

/// One stretch of the output track and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub kind: FragmentKind,
    /// Frames of the source track this fragment covers
    pub source: Range<usize>,
    /// Frames of the output track this fragment occupies
    pub output: Range<usize>,
    /// Section number in processing order (1-based); `None` for gaps
    pub section: Option<usize>,
}

impl Fragment {
    pub fn frames(&self) -> usize {
        self.output.end - self.output.start
    }
}

/// Result of a reconstruction run
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// Combined track, same rate and layout as the source
    pub output: Track,
    /// Sections processed, in processing order
    pub manifest: ProcessingManifest,
    /// Fragment layout of `output`, in order
    pub fragments: Vec<Fragment>,
}

/// A validated section mapped onto source frames
#[derive(Debug, Clone)]
struct SectionSpan {
    number: usize,
    range: TimeRange,
    frames: Range<usize>,
}

/// Runs the reconstruction for one track and one section snapshot
pub struct ReconstructionPipeline<'a> {
    adapter: &'a dyn SeparationAdapter,
    options: PipelineOptions,
    cancel: Option<&'a AtomicBool>,
    observer: Option<&'a (dyn Fn(ProcessingStatus) + Sync)>,
}

impl<'a> ReconstructionPipeline<'a> {
    pub fn new(adapter: &'a dyn SeparationAdapter, mut options: PipelineOptions) -> Self {
        options.validate();
        Self {
            adapter,
            options,
            cancel: None,
            observer: None,
        }
    }

    /// Abort between steps once `flag` is set
    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Receive status messages as the run progresses
    pub fn with_observer(mut self, observer: &'a (dyn Fn(ProcessingStatus) + Sync)) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Build the combined track
    ///
    /// Validation (empty set, bounds, overlap) happens before the adapter is
    /// called for any section. Any separation failure aborts the whole run.
    pub fn run(
        &self,
        track: &Track,
        sections: &SectionSet,
        source_name: &str,
    ) -> Result<Reconstruction> {
        if sections.is_empty() {
            return Err(ProcessingError::NoSections);
        }
        sections.validate_against(track.duration_secs())?;
        sections.overlap_check()?;

        let sorted = sections.sorted_by_start();
        let spans = plan_spans(track, &sorted)?;

        log::info!(
            "ReconstructionPipeline: {} sections over {:.2}s track ({} Hz, {} ch) using {}",
            spans.len(),
            track.duration_secs(),
            track.sample_rate(),
            track.channels(),
            self.adapter.name()
        );
        self.notify(ProcessingStatus::Started {
            total_sections: spans.len(),
            track_secs: track.duration_secs(),
        });

        let instrumentals = self.separate_all(track, &spans)?;
        self.check_cancelled()?;

        let (output, fragments) = assemble(track, &spans, &instrumentals);
        log::info!(
            "ReconstructionPipeline: assembled {} fragments, {:.2}s output",
            fragments.len(),
            output.duration_secs()
        );

        let manifest = ProcessingManifest::new(sorted, source_name, Local::now());
        Ok(Reconstruction {
            output,
            manifest,
            fragments,
        })
    }

    fn notify(&self, status: ProcessingStatus) {
        if let Some(observer) = self.observer {
            observer(status);
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        match self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => {
                log::info!("ReconstructionPipeline: cancelled");
                Err(ProcessingError::Cancelled)
            }
            _ => Ok(()),
        }
    }

    fn separate_all(&self, track: &Track, spans: &[SectionSpan]) -> Result<Vec<Clip>> {
        let total = spans.len();
        let workers = self.options.max_parallel_sections.min(total);

        if workers > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("voxcut-separate-{}", i))
                .build()
            {
                Ok(pool) => {
                    log::info!("ReconstructionPipeline: separating on {} workers", workers);
                    return pool.install(|| {
                        spans
                            .par_iter()
                            .map(|span| self.separate_one(track, span, total))
                            .collect()
                    });
                }
                Err(e) => {
                    log::warn!(
                        "ReconstructionPipeline: no worker pool ({}), separating sequentially",
                        e
                    );
                }
            }
        }

        spans
            .iter()
            .map(|span| self.separate_one(track, span, total))
            .collect()
    }

    fn separate_one(&self, track: &Track, span: &SectionSpan, total: usize) -> Result<Clip> {
        self.check_cancelled()?;
        self.notify(ProcessingStatus::SectionStarted {
            number: span.number,
            total,
            range: span.range,
        });
        log::info!(
            "Section {}/{}: separating {} ({} frames)",
            span.number,
            total,
            span.range.describe(),
            span.frames.len()
        );

        let original = track.clip(span.frames.clone());
        let instrumental = self
            .adapter
            .separate(&original)
            .map_err(|e| ProcessingError::SeparationFailed {
                section: span.number,
                reason: format!("{:#}", e),
            })?;
        let tolerance = self.options.length_tolerance_frames;
        let instrumental = conform_instrumental(&original, instrumental, tolerance).map_err(
            |reason| ProcessingError::SeparationFailed {
                section: span.number,
                reason,
            },
        )?;

        // The adapter call can't be interrupted; drop its result instead
        self.check_cancelled()?;
        self.notify(ProcessingStatus::SectionComplete {
            number: span.number,
            total,
        });
        Ok(instrumental)
    }
}

/// Map sorted sections onto frame ranges that never overlap
fn plan_spans(track: &Track, sorted: &[TimeRange]) -> Result<Vec<SectionSpan>> {
    let mut cursor = 0usize;
    let mut spans = Vec::with_capacity(sorted.len());

    for (i, range) in sorted.iter().enumerate() {
        let start = track.frame_at(range.start).max(cursor);
        let end = track.frame_at(range.end);
        if end <= start {
            // Shorter than one frame at this sample rate
            return Err(ProcessingError::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }
        spans.push(SectionSpan {
            number: i + 1,
            range: *range,
            frames: start..end,
        });
        cursor = end;
    }
    Ok(spans)
}

/// Splice gaps, originals and instrumentals into one track
fn assemble(
    track: &Track,
    spans: &[SectionSpan],
    instrumentals: &[Clip],
) -> (Track, Vec<Fragment>) {
    let section_frames: usize = spans.iter().map(|s| s.frames.len()).sum();
    let mut output = track.empty_like();
    output.reserve_frames(track.frames() + section_frames);

    let mut fragments = Vec::with_capacity(spans.len() * 3 + 1);
    let mut cursor = 0usize;

    let mut push = |output: &mut Track,
                    kind: FragmentKind,
                    source: Range<usize>,
                    samples: &[f32],
                    section: Option<usize>| {
        let start = output.frames();
        output.extend_from_slice(samples);
        fragments.push(Fragment {
            kind,
            source,
            output: start..output.frames(),
            section,
        });
    };

    for (span, instrumental) in spans.iter().zip(instrumentals) {
        if span.frames.start > cursor {
            let gap = cursor..span.frames.start;
            push(&mut output, FragmentKind::Gap, gap.clone(), track.frame_slice(gap), None);
        }
        push(
            &mut output,
            FragmentKind::Original,
            span.frames.clone(),
            track.frame_slice(span.frames.clone()),
            Some(span.number),
        );
        push(
            &mut output,
            FragmentKind::Instrumental,
            span.frames.clone(),
            &instrumental.samples,
            Some(span.number),
        );
        cursor = span.frames.end;
    }

    if cursor < track.frames() {
        let tail = cursor..track.frames();
        push(&mut output, FragmentKind::Gap, tail.clone(), track.frame_slice(tail), None);
    }

    (output, fragments)
}
