//! Display Snapshot
//!
//! A fixed-size table of what a remote view needs each turn: the turn
//! number and one row per visible creature. Synchronized through hooked
//! instructions so the state itself never exposes a byte image.
//!
//! ```text
//! instr 0  turn        4B                PrevState
//! instr 1  positions   16 rows × 12B     SelectBest
//! instr 2  vitals      16 rows × 12B     SelectBest
//! ```

use serde::{Deserialize, Serialize};

use crate::game::world::World;

use super::codec::{NetsyncInstr, NetsyncMode, SyncImage};

/// Rows in the display table.
pub const DISPLAY_SLOTS: usize = 16;

const POSITION_ROW: usize = 12;
const VITALS_ROW: usize = 12;

/// One displayed creature.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayRow {
    /// Row holds a creature
    pub present: bool,
    /// Creature kind id
    pub kind: u8,
    /// Owning player
    pub owner: u8,
    /// Experience level
    pub level: u8,
    /// Position (map coords)
    pub x: i32,
    /// Position (map coords)
    pub y: i32,
    /// Position (map coords)
    pub z: i32,
    /// Current health
    pub health: i32,
    /// Live status flag bits
    pub flags: u32,
}

/// Display table for one turn.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayState {
    /// Turn the table was captured on
    pub turn: u32,
    /// Creature rows; unused rows are default
    pub rows: [DisplayRow; DISPLAY_SLOTS],
}

impl SyncImage for DisplayState {}

impl DisplayState {
    /// Capture the first [`DISPLAY_SLOTS`] creatures in slot order.
    pub fn capture(world: &World) -> Self {
        let mut state = DisplayState { turn: world.turn, ..Default::default() };
        for (row, h) in state.rows.iter_mut().zip(world.creatures()) {
            let Some(thing) = world.thing(h) else {
                continue;
            };
            let Some(ctrl) = world.control(h) else {
                continue;
            };
            *row = DisplayRow {
                present: true,
                kind: ctrl.kind as u8,
                owner: thing.owner.0,
                level: ctrl.exp_level,
                x: thing.pos.x,
                y: thing.pos.y,
                z: thing.pos.z,
                health: thing.health,
                flags: ctrl.spell_flags.bits(),
            };
        }
        state
    }

    /// Rows in use.
    pub fn occupied(&self) -> usize {
        self.rows.iter().filter(|r| r.present).count()
    }
}

// =============================================================================
// HOOKS
// =============================================================================

fn collect_turn(state: &DisplayState, out: &mut [u8]) {
    out.copy_from_slice(&state.turn.to_le_bytes());
}

fn restore_turn(state: &mut DisplayState, bytes: &[u8]) {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[..4]);
    state.turn = u32::from_le_bytes(raw);
}

fn collect_positions(state: &DisplayState, out: &mut [u8]) {
    for (row, chunk) in state.rows.iter().zip(out.chunks_exact_mut(POSITION_ROW)) {
        chunk[0..4].copy_from_slice(&row.x.to_le_bytes());
        chunk[4..8].copy_from_slice(&row.y.to_le_bytes());
        chunk[8..12].copy_from_slice(&row.z.to_le_bytes());
    }
}

fn restore_positions(state: &mut DisplayState, bytes: &[u8]) {
    for (row, chunk) in state.rows.iter_mut().zip(bytes.chunks_exact(POSITION_ROW)) {
        row.x = read_i32(&chunk[0..4]);
        row.y = read_i32(&chunk[4..8]);
        row.z = read_i32(&chunk[8..12]);
    }
}

fn collect_vitals(state: &DisplayState, out: &mut [u8]) {
    for (row, chunk) in state.rows.iter().zip(out.chunks_exact_mut(VITALS_ROW)) {
        chunk[0] = row.present as u8;
        chunk[1] = row.kind;
        chunk[2] = row.owner;
        chunk[3] = row.level;
        chunk[4..8].copy_from_slice(&row.health.to_le_bytes());
        chunk[8..12].copy_from_slice(&row.flags.to_le_bytes());
    }
}

fn restore_vitals(state: &mut DisplayState, bytes: &[u8]) {
    for (row, chunk) in state.rows.iter_mut().zip(bytes.chunks_exact(VITALS_ROW)) {
        row.present = chunk[0] != 0;
        row.kind = chunk[1];
        row.owner = chunk[2];
        row.level = chunk[3];
        row.health = read_i32(&chunk[4..8]);
        row.flags = read_i32(&chunk[8..12]) as u32;
    }
}

#[inline]
fn read_i32(bytes: &[u8]) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    i32::from_le_bytes(raw)
}

/// Instruction list both ends of a display channel must share.
pub fn display_instrs() -> Vec<NetsyncInstr<DisplayState>> {
    vec![
        NetsyncInstr::hooked(4, NetsyncMode::PrevState, collect_turn, restore_turn),
        NetsyncInstr::hooked(
            DISPLAY_SLOTS * POSITION_ROW,
            NetsyncMode::SelectBest,
            collect_positions,
            restore_positions,
        ),
        NetsyncInstr::hooked(
            DISPLAY_SLOTS * VITALS_ROW,
            NetsyncMode::SelectBest,
            collect_vitals,
            restore_vitals,
        ),
    ]
}

// =============================================================================
// TESTS
// =============================================================================
