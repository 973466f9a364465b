//! Player State
//!
//! Keepers own creatures, pay for powers and hold the preferences the
//! spell engine consults (teleport destination, obey compulsion).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Serialize, Deserialize};

use crate::config::PowerKind;
use crate::core::coord::{Coord3d, SubtileCoord};
use crate::core::hash::StateHasher;
use crate::game::thing::ThingHandle;

/// Player identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u8);

impl PlayerId {
    /// Owner of unclaimed things and territory.
    pub const NEUTRAL: PlayerId = PlayerId(5);

    /// True for the neutral owner.
    pub fn is_neutral(self) -> bool {
        self == Self::NEUTRAL
    }

    /// Bit in a block's reveal mask, if the id fits.
    pub fn reveal_bit(self) -> Option<u8> {
        if self.0 < 8 {
            Some(1 << self.0)
        } else {
            None
        }
    }
}

/// Room kinds a teleport can aim for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RoomKind {
    /// Gold storage
    Treasury,
    /// Sleeping quarters
    Lair,
    /// Food
    Hatchery,
    /// Research
    Library,
    /// Training
    Training,
    /// Prison
    Prison,
    /// Temple
    Temple,
}

/// Where teleported creatures go.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TeleportDestination {
    /// The dungeon heart
    #[default]
    Heart,
    /// The last battle
    Battle,
    /// The creature's own lair
    Lair,
    /// The first room of a kind
    Room(RoomKind),
    /// A fixed subtile
    Fixed(SubtileCoord),
}

/// Relation between a caster and the owner of something.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    /// Same player
    Owned,
    /// Allied player
    Allied,
    /// Hostile player
    Enemy,
    /// Nobody's
    Neutral,
}

/// Messages surfaced to a human keeper.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerMessage {
    /// Treasury cannot cover a price
    NotEnoughGold,
}

/// Per-player state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    /// Identifier
    pub id: PlayerId,
    /// Treasury
    pub gold: i64,
    /// Local human; only they receive messages
    pub is_local_human: bool,
    /// Allied players
    pub allies: BTreeSet<PlayerId>,
    /// Unlocked powers
    pub available_powers: BTreeSet<PowerKind>,
    /// Turn until which delay-gated powers are blocked
    pub power_cooldown_turn: u32,
    /// Free diggers before the digger price rises
    pub cheaper_diggers: u32,
    /// Obey power active
    pub must_obey: bool,
    /// Rally point of the call to arms power
    pub call_to_arms: Option<SubtileCoord>,
    /// Dungeon heart position
    pub heart_pos: Option<Coord3d>,
    /// Where the last fight happened
    pub last_battle: Option<Coord3d>,
    /// Room locations by kind
    pub rooms: BTreeMap<RoomKind, Vec<SubtileCoord>>,
    /// Preferred teleport destination
    pub teleport_destination: TeleportDestination,
    /// Creature under direct control
    pub controlled_thing: Option<ThingHandle>,
    /// Things held in the hand
    pub hand: Vec<ThingHandle>,
}

impl Player {
    /// Create a player with an empty treasury.
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            gold: 0,
            is_local_human: false,
            allies: BTreeSet::new(),
            available_powers: BTreeSet::new(),
            power_cooldown_turn: 0,
            cheaper_diggers: 0,
            must_obey: false,
            call_to_arms: None,
            heart_pos: None,
            last_battle: None,
            rooms: BTreeMap::new(),
            teleport_destination: TeleportDestination::Heart,
            controlled_thing: None,
            hand: Vec::new(),
        }
    }

    /// Relation of this player to an owner.
    pub fn relation_to(&self, owner: PlayerId) -> Relation {
        if owner == self.id {
            Relation::Owned
        } else if owner.is_neutral() {
            Relation::Neutral
        } else if self.allies.contains(&owner) {
            Relation::Allied
        } else {
            Relation::Enemy
        }
    }

    /// Power unlocked.
    pub fn has_power(&self, power: PowerKind) -> bool {
        self.available_powers.contains(&power)
    }

    /// Hash state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u8(self.id.0);
        hasher.update_i64(self.gold);
        hasher.update_u32(self.power_cooldown_turn);
        hasher.update_bool(self.must_obey);
        hasher.update_bool(self.call_to_arms.is_some());
        for power in &self.available_powers {
            hasher.update_u8(*power as u8);
        }
        hasher.update_u32(self.hand.len() as u32);
    }
}
