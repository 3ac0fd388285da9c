//! Sync channel edge detection and line phases.
//!
//! A sync pulse is a run of samples below the sync threshold. The falling
//! edge starts a line; the rising edge marks the start of the line's video.
//! Vertical sync shows up as falling edges that follow the previous rising
//! edge too closely to have enclosed a full line of video.
use std::ops::Range;

/// Crossing of the sync threshold between two consecutive samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Previous sample at or above the threshold, current sample below.
    Falling,
    /// Previous sample below the threshold, current sample at or above.
    Rising,
}

impl Edge {
    /// Classify the step from `previous` to `current`.
    ///
    /// # Examples
    ///
    /// ```
    /// use scopevideo::decode::Edge;
    ///
    /// assert_eq!(Edge::detect(0, -1, 0), Some(Edge::Falling));
    /// assert_eq!(Edge::detect(-1, 0, 0), Some(Edge::Rising));
    /// assert_eq!(Edge::detect(5, 9, 0), None);
    /// ```
    #[inline]
    pub fn detect(previous: i16, current: i16, threshold: i16) -> Option<Edge> {
        match (previous >= threshold, current >= threshold) {
            (true, false) => Some(Edge::Falling),
            (false, true) => Some(Edge::Rising),
            _ => None,
        }
    }
}

/// What a falling edge means for the line bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// End of a line, start of the next one.
    Horizontal,
    /// End of a frame.
    FrameBoundary,
}

impl SyncEvent {
    /// Classify a falling edge at `index` given the last rising edge.
    ///
    /// Without a usable rising edge (none seen yet, or one that lies ahead of
    /// `index` after a restart) the edge counts as horizontal.
    #[inline]
    pub fn classify(index: u64, previous_rising: Option<u64>, short_pulse_gap: u64) -> SyncEvent {
        match previous_rising.and_then(|rising| index.checked_sub(rising)) {
            Some(gap) if gap < short_pulse_gap => SyncEvent::FrameBoundary,
            _ => SyncEvent::Horizontal,
        }
    }
}

/// Where the decoder is within the frame, derived from the line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePhase {
    /// No frame boundary seen since start, or too many lines since the last
    /// one; waiting for the next boundary to lock.
    Unlocked,
    /// Lines between the frame boundary and the first picture line.
    PreRoll,
    /// A picture line is being reconstructed.
    LineActive(usize),
    /// All picture lines are done; the next frame boundary emits the frame.
    FrameBoundaryPending,
}

impl LinePhase {
    pub fn of(line_number: i32, active_lines: usize, emission: &Range<i32>) -> LinePhase {
        if line_number < 0 {
            LinePhase::PreRoll
        } else if (line_number as usize) < active_lines {
            LinePhase::LineActive(line_number as usize)
        } else if emission.contains(&line_number) {
            LinePhase::FrameBoundaryPending
        } else {
            LinePhase::Unlocked
        }
    }

    /// The picture line, if one is being reconstructed.
    #[inline]
    pub fn active_line(self) -> Option<usize> {
        match self {
            LinePhase::LineActive(line) => Some(line),
            _ => None,
        }
    }
}
