//! Playback position and the seek handoff

use std::sync::atomic::{AtomicU64, Ordering};

/// Marks an empty mailbox. Requests are finite, non-negative seconds, so
/// their bit patterns can never collide with this NaN.
const EMPTY: u64 = u64::MAX;

/// Single-slot, last-write-wins seek request
///
/// The control thread overwrites the slot; the audio thread takes it at the
/// start of the next block.
#[derive(Debug)]
pub struct SeekMailbox {
    slot: AtomicU64,
}

impl SeekMailbox {
    pub fn new() -> Self {
        Self {
            slot: AtomicU64::new(EMPTY),
        }
    }

    /// Post a seek target, replacing any request not yet consumed
    pub fn request(&self, seconds: f64) {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self.slot.store(seconds.to_bits(), Ordering::Release);
    }

    /// Take the pending request, leaving the mailbox empty
    #[inline]
    pub fn take(&self) -> Option<f64> {
        match self.slot.swap(EMPTY, Ordering::AcqRel) {
            EMPTY => None,
            bits => Some(f64::from_bits(bits)),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot.load(Ordering::Acquire) != EMPTY
    }

    pub fn clear(&self) {
        self.slot.store(EMPTY, Ordering::Release);
    }
}

impl Default for SeekMailbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Sample-indexed read position into the loaded track
///
/// The index is authoritative; seconds are derived from it, so the cursor
/// never drifts from the sample it will read next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackCursor {
    index: usize,
    sample_rate: u32,
}

impl PlaybackCursor {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            index: 0,
            sample_rate,
        }
    }

    /// Next source sample to be rendered
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn position_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.index as f64 / self.sample_rate as f64
    }

    /// Jump to `round(seconds * sample_rate)`, clamped to `[0, len]`
    pub fn seek_seconds(&mut self, seconds: f64, len: usize) {
        let target = if seconds.is_finite() && seconds > 0.0 {
            (seconds * self.sample_rate as f64).round()
        } else {
            0.0
        };
        self.index = if target >= len as f64 {
            len
        } else {
            target as usize
        };
    }

    #[inline]
    pub fn advance(&mut self, frames: usize) {
        self.index = self.index.saturating_add(frames);
    }

    /// Back to the start, optionally at a new sample rate
    pub fn reset(&mut self, sample_rate: u32) {
        self.index = 0;
        self.sample_rate = sample_rate;
    }

    pub fn is_at_end(&self, len: usize) -> bool {
        self.index >= len
    }
}
