//! State synchronization.
//!
//! - `codec`: Delta-encoded collect/restore over an instruction list
//! - `channel`: Sender/receiver wrapper holding the previous snapshot
//! - `display`: Per-turn display table synchronized by the demo

pub mod codec;
pub mod channel;
pub mod display;

pub use codec::{collect, restore, NetsyncError, NetsyncInstr, NetsyncMode, SyncImage};
pub use channel::SyncChannel;
pub use display::{display_instrs, DisplayState, DISPLAY_SLOTS};
