//! Delta-Encoded State Sync Codec
//!
//! Turns a list of instructions, each naming one region of a live state,
//! into a wire buffer (`collect`) and back (`restore`). Regions can be
//! sent raw or as a byte-wise difference against the previous snapshot.
//!
//! ## Wire layout
//!
//! ```text
//! ┌──────────────┬──────────────────┬──────────────┬─────────────┐
//! │ [hdr] region │ [hdr] region     │ region       │ ...         │
//! │  1B    len0  │  1B    len1      │  len2        │             │
//! └──────────────┴──────────────────┴──────────────┴─────────────┘
//!   hdr only present for SelectBest instructions with len > 0
//! ```
//!
//! The `old` and `new` snapshot buffers use exactly the same layout
//! (header slots included), so one cursor walks all three buffers.
//! There is no framing, length prefix or checksum: both ends must use
//! byte-identical instruction lists.

use serde::{Serialize, Deserialize};
use tracing::error;

// =============================================================================
// ENCODING MODES
// =============================================================================

/// Per-region encoding policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NetsyncMode {
    /// Send the region bytes as they are.
    None = 0,
    /// Send `new - old` per byte (mod 256).
    PrevState = 1,
    /// Pick whichever of `None`/`PrevState` has lower byte entropy and
    /// record the choice in a one-byte header.
    SelectBest = 2,
}

impl NetsyncMode {
    /// Decode a header byte.
    pub fn from_index(index: u8) -> Option<NetsyncMode> {
        match index {
            0 => Some(NetsyncMode::None),
            1 => Some(NetsyncMode::PrevState),
            2 => Some(NetsyncMode::SelectBest),
            _ => None,
        }
    }
}

// =============================================================================
// INSTRUCTIONS
// =============================================================================

/// Byte image of a state, for instructions addressing raw offsets.
///
/// States synchronized purely through hooks can use the default (empty)
/// image.
pub trait SyncImage {
    /// Read-only view of the state's bytes.
    fn image(&self) -> &[u8] {
        &[]
    }

    /// Writable view of the state's bytes.
    fn image_mut(&mut self) -> &mut [u8] {
        &mut []
    }
}

impl SyncImage for [u8] {
    fn image(&self) -> &[u8] {
        self
    }
    fn image_mut(&mut self) -> &mut [u8] {
        self
    }
}

impl SyncImage for Vec<u8> {
    fn image(&self) -> &[u8] {
        self
    }
    fn image_mut(&mut self) -> &mut [u8] {
        self
    }
}

impl<const N: usize> SyncImage for [u8; N] {
    fn image(&self) -> &[u8] {
        self
    }
    fn image_mut(&mut self) -> &mut [u8] {
        self
    }
}

/// Where an instruction's bytes come from and go to.
pub enum SyncField<S: ?Sized> {
    /// Contiguous bytes at `offset` in the state's [`SyncImage`].
    Raw {
        /// Start of the region in the byte image
        offset: usize,
    },
    /// Caller-provided snapshot producer and consumer.
    ///
    /// `on_collect` fills the snapshot region from the live state;
    /// `on_restore` receives the restored bytes and writes the live state.
    Hooked {
        /// Live state -> snapshot bytes
        on_collect: fn(&S, &mut [u8]),
        /// Snapshot bytes -> live state
        on_restore: fn(&mut S, &[u8]),
    },
}

impl<S: ?Sized> Clone for SyncField<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ?Sized> Copy for SyncField<S> {}

/// One region to synchronize.
pub struct NetsyncInstr<S: ?Sized> {
    /// Region length in bytes. Zero-length instructions are skipped.
    pub len: usize,
    /// Encoding policy
    pub mode: NetsyncMode,
    /// Field accessor
    pub field: SyncField<S>,
}

impl<S: ?Sized> Clone for NetsyncInstr<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ?Sized> Copy for NetsyncInstr<S> {}

impl<S: ?Sized> NetsyncInstr<S> {
    /// Instruction over raw bytes of the state image.
    pub const fn raw(offset: usize, len: usize, mode: NetsyncMode) -> Self {
        Self { len, mode, field: SyncField::Raw { offset } }
    }

    /// Instruction with custom collect/restore hooks.
    pub const fn hooked(
        len: usize,
        mode: NetsyncMode,
        on_collect: fn(&S, &mut [u8]),
        on_restore: fn(&mut S, &[u8]),
    ) -> Self {
        Self { len, mode, field: SyncField::Hooked { on_collect, on_restore } }
    }

    /// Bytes this instruction occupies in the wire/snapshot layout.
    #[inline]
    pub fn footprint(&self) -> usize {
        match (self.len, self.mode) {
            (0, _) => 0,
            (len, NetsyncMode::SelectBest) => len + 1,
            (len, _) => len,
        }
    }
}

/// Codec failures. Only buffer sizing and header decoding are checked;
/// everything else is the caller's contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetsyncError {
    /// A buffer is shorter than the layout requires.
    #[error("{which} buffer too small: need {needed} bytes, have {actual}")]
    BufferTooSmall {
        /// Which buffer
        which: &'static str,
        /// Required length
        needed: usize,
        /// Provided length
        actual: usize,
    },

    /// A SelectBest header carried an unknown mode.
    #[error("invalid encoding header {value} at offset {offset}")]
    BadHeader {
        /// Header byte found
        value: u8,
        /// Offset of the header in the input buffer
        offset: usize,
    },
}

// =============================================================================
// CODEC
// =============================================================================

/// Size of the wire (and snapshot) buffer for an instruction list.
pub fn buffer_size<S: ?Sized>(instrs: &[NetsyncInstr<S>]) -> usize {
    instrs.iter().map(NetsyncInstr::footprint).sum()
}

/// Encode the live state into `out`.
///
/// `new` receives the raw snapshot (to be passed as `old` next time).
/// With `old == None` every region is forced to `NetsyncMode::None`.
/// Returns the number of bytes written.
pub fn collect<S: SyncImage + ?Sized>(
    instrs: &[NetsyncInstr<S>],
    live: &S,
    out: &mut [u8],
    old: Option<&[u8]>,
    new: &mut [u8],
) -> Result<usize, NetsyncError> {
    let size = buffer_size(instrs);
    check_len("output", size, out.len())?;
    check_len("new snapshot", size, new.len())?;
    if let Some(old) = old {
        check_len("old snapshot", size, old.len())?;
    }

    let mut cursor = 0;
    for instr in instrs {
        if instr.len == 0 {
            continue;
        }
        let header_at = if instr.mode == NetsyncMode::SelectBest {
            cursor += 1;
            Some(cursor - 1)
        } else {
            None
        };
        let region = cursor..cursor + instr.len;

        snapshot_field(instr, live, &mut new[region.clone()]);

        let mode = match old {
            None => NetsyncMode::None,
            Some(old) => match instr.mode {
                NetsyncMode::SelectBest => select_best(&new[region.clone()], &old[region.clone()]),
                mode => mode,
            },
        };

        match (mode, old) {
            (NetsyncMode::PrevState, Some(old)) => {
                for i in region.clone() {
                    out[i] = new[i].wrapping_sub(old[i]);
                }
            }
            _ => out[region.clone()].copy_from_slice(&new[region.clone()]),
        }

        if let Some(h) = header_at {
            out[h] = mode as u8;
            new[h] = mode as u8;
        }
        cursor = region.end;
    }
    Ok(cursor)
}

/// Decode `input` into the live state.
///
/// Mirror of [`collect`]: `old` must be the snapshot the sender used and
/// `new` receives the reconstructed snapshot.
pub fn restore<S: SyncImage + ?Sized>(
    instrs: &[NetsyncInstr<S>],
    live: &mut S,
    input: &[u8],
    old: Option<&[u8]>,
    new: &mut [u8],
) -> Result<usize, NetsyncError> {
    let size = buffer_size(instrs);
    check_len("input", size, input.len())?;
    check_len("new snapshot", size, new.len())?;
    if let Some(old) = old {
        check_len("old snapshot", size, old.len())?;
    }

    let mut cursor = 0;
    for instr in instrs {
        if instr.len == 0 {
            continue;
        }
        let mut header_at = None;
        let mode = if instr.mode == NetsyncMode::SelectBest {
            let value = input[cursor];
            let decoded = match NetsyncMode::from_index(value) {
                Some(m @ (NetsyncMode::None | NetsyncMode::PrevState)) => m,
                _ => return Err(NetsyncError::BadHeader { value, offset: cursor }),
            };
            header_at = Some(cursor);
            cursor += 1;
            decoded
        } else {
            instr.mode
        };
        // Same forcing rule as collect
        let mode = if old.is_none() { NetsyncMode::None } else { mode };
        let region = cursor..cursor + instr.len;

        match (mode, old) {
            (NetsyncMode::PrevState, Some(old)) => {
                for i in region.clone() {
                    new[i] = input[i].wrapping_add(old[i]);
                }
            }
            _ => new[region.clone()].copy_from_slice(&input[region.clone()]),
        }
        if let Some(h) = header_at {
            new[h] = mode as u8;
        }

        apply_field(instr, live, &new[region.clone()]);
        cursor = region.end;
    }
    Ok(cursor)
}

/// Order-0 empirical entropy of a byte string, scaled by its length.
///
/// Sum over byte values of `-count * ln(count / len)`. Lower means fewer,
/// more skewed distinct values and better downstream compression.
pub fn byte_entropy(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }
    let mut counts = [0u32; 256];
    for &b in bytes {
        counts[b as usize] += 1;
    }
    let len = bytes.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let c = c as f64;
            -c * (c / len).ln()
        })
        .sum()
}

/// Choose between raw and delta encoding for one region.
///
/// Equal entropy keeps the raw encoding.
fn select_best(new: &[u8], old: &[u8]) -> NetsyncMode {
    let delta: Vec<u8> = new.iter().zip(old).map(|(n, o)| n.wrapping_sub(*o)).collect();
    if byte_entropy(new) <= byte_entropy(&delta) {
        NetsyncMode::None
    } else {
        NetsyncMode::PrevState
    }
}

fn snapshot_field<S: SyncImage + ?Sized>(instr: &NetsyncInstr<S>, live: &S, dest: &mut [u8]) {
    match instr.field {
        SyncField::Raw { offset } => match live.image().get(offset..offset + instr.len) {
            Some(src) => dest.copy_from_slice(src),
            None => {
                error!("netsync: raw region {}+{} outside state image", offset, instr.len);
                dest.fill(0);
            }
        },
        SyncField::Hooked { on_collect, .. } => on_collect(live, dest),
    }
}

fn apply_field<S: SyncImage + ?Sized>(instr: &NetsyncInstr<S>, live: &mut S, src: &[u8]) {
    match instr.field {
        SyncField::Raw { offset } => match live.image_mut().get_mut(offset..offset + instr.len) {
            Some(dest) => dest.copy_from_slice(src),
            None => error!("netsync: raw region {}+{} outside state image", offset, instr.len),
        },
        SyncField::Hooked { on_restore, .. } => on_restore(live, src),
    }
}

fn check_len(which: &'static str, needed: usize, actual: usize) -> Result<(), NetsyncError> {
    if actual < needed {
        return Err(NetsyncError::BufferTooSmall { which, needed, actual });
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
