//! Sync Channel
//!
//! Keeps the previous snapshot between frames so callers only deal with
//! live state and wire bytes. One channel per direction; both ends must
//! see every frame in order (reliable, ordered transport).

use tracing::debug;

use super::codec::{buffer_size, collect, restore, NetsyncError, NetsyncInstr, SyncImage};

/// Stateful encoder/decoder over a fixed instruction list.
pub struct SyncChannel<S: ?Sized> {
    instrs: Vec<NetsyncInstr<S>>,
    frame_size: usize,
    /// Snapshot of the last frame sent or received
    baseline: Option<Vec<u8>>,
    frames: u64,
}

impl<S: SyncImage + ?Sized> SyncChannel<S> {
    /// Create a channel. The first frame is always a keyframe.
    pub fn new(instrs: Vec<NetsyncInstr<S>>) -> Self {
        let frame_size = buffer_size(&instrs);
        Self { instrs, frame_size, baseline: None, frames: 0 }
    }

    /// Bytes per frame.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Frames processed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// True once a baseline exists (next frame will be delta-capable).
    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    /// Drop the baseline; the next frame is a keyframe on both ends.
    pub fn reset(&mut self) {
        self.baseline = None;
    }

    /// Encode the live state into a frame.
    pub fn encode(&mut self, live: &S) -> Result<Vec<u8>, NetsyncError> {
        let mut out = vec![0u8; self.frame_size];
        let mut snapshot = vec![0u8; self.frame_size];
        collect(&self.instrs, live, &mut out, self.baseline.as_deref(), &mut snapshot)?;
        self.baseline = Some(snapshot);
        self.frames += 1;
        debug!("netsync: encoded frame {} ({} bytes)", self.frames, out.len());
        Ok(out)
    }

    /// Decode a frame into the live state.
    pub fn decode(&mut self, live: &mut S, frame: &[u8]) -> Result<(), NetsyncError> {
        let mut snapshot = vec![0u8; self.frame_size];
        restore(&self.instrs, live, frame, self.baseline.as_deref(), &mut snapshot)?;
        self.baseline = Some(snapshot);
        self.frames += 1;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
