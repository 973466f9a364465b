//! Game Events
//!
//! Events generated during simulation. They carry everything the audio,
//! visual and UI collaborators need; the core never waits on them.

use serde::{Serialize, Deserialize};

use crate::config::{InstanceKind, PowerKind, ShotKind, SpellKind};
use crate::core::coord::{Coord3d, SubtileCoord};
use crate::game::map::SlabKind;
use crate::game::player::{PlayerId, PlayerMessage};
use crate::game::thing::{ThingClass, ThingHandle};

/// Priority for event processing order.
///
/// Lower value = processed first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventPriority {
    /// Removals first
    Death = 0,
    /// Then hits and explosions
    Combat = 1,
    /// Then status changes
    Spell = 2,
    /// Then keeper powers
    Power = 3,
    /// Then terrain changes
    Terrain = 4,
    /// Sounds and messages
    Feedback = 5,
    /// Lowest priority
    Other = 255,
}

/// Why a cast was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Power not unlocked
    Unavailable,
    /// Treasury too small
    NotEnoughGold,
    /// Target not allowed
    InvalidTarget,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Thing removed from the world
    ThingKilled {
        thing: ThingHandle,
        class: ThingClass,
        owner: PlayerId,
    },

    /// Spell landed (first apply or refresh)
    SpellApplied {
        thing: ThingHandle,
        spell: SpellKind,
        level: u8,
        caster: PlayerId,
        refreshed: bool,
    },

    /// Spell slot ended
    SpellExpired {
        thing: ThingHandle,
        spell: SpellKind,
    },

    /// Instance action fired
    InstanceFired {
        thing: ThingHandle,
        instance: InstanceKind,
    },

    /// Projectile launched
    ShotFired {
        shot: ThingHandle,
        kind: ShotKind,
        owner: PlayerId,
    },

    /// Projectile struck a creature
    ShotHit {
        kind: ShotKind,
        target: ThingHandle,
        damage: i32,
    },

    /// Power cast succeeded
    PowerCast {
        player: PlayerId,
        power: PowerKind,
        level: u8,
        price: i64,
    },

    /// Power cast refused
    CastRejected {
        player: PlayerId,
        power: PowerKind,
        reason: RejectReason,
    },

    /// Sound to play, optionally on a thing
    SoundPlayed {
        sample: u16,
        thing: Option<ThingHandle>,
    },

    /// Message for a human keeper
    Message {
        player: PlayerId,
        message: PlayerMessage,
    },

    /// Visual effect at a position
    EffectSpawned {
        effect: u16,
        pos: Coord3d,
    },

    /// Terrain changed
    SlabChanged {
        stl: SubtileCoord,
        slab: SlabKind,
        owner: Option<PlayerId>,
    },

    /// Flying creature bumped into a door
    DoorCollision {
        thing: ThingHandle,
        stl: SubtileCoord,
    },

    /// Creature arrived at its teleport destination
    Teleported {
        thing: ThingHandle,
        to: Coord3d,
    },

    /// Embedded thing moved to the nearest free spot
    Relocated {
        thing: ThingHandle,
        to: Coord3d,
    },

    /// Embedded thing with nowhere to go
    Stranded {
        thing: ThingHandle,
    },

    /// Area damage burst
    Explosion {
        source: Option<ThingHandle>,
        pos: Coord3d,
        damage: i32,
    },

    /// Chicken transformation completed
    CreatureMorphed {
        thing: ThingHandle,
    },

    /// Familiar spawned for a host
    FamiliarSummoned {
        host: ThingHandle,
        familiar: ThingHandle,
    },
}

/// A game event with timing and priority.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameEvent {
    /// Turn when event occurred
    pub turn: u32,

    /// Processing priority
    pub priority: EventPriority,

    /// Player involved (for tie-breaking)
    pub player_id: Option<PlayerId>,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(turn: u32, priority: EventPriority, data: GameEventData) -> Self {
        let player_id = match &data {
            GameEventData::ThingKilled { owner, .. } => Some(*owner),
            GameEventData::SpellApplied { caster, .. } => Some(*caster),
            GameEventData::ShotFired { owner, .. } => Some(*owner),
            GameEventData::PowerCast { player, .. } => Some(*player),
            GameEventData::CastRejected { player, .. } => Some(*player),
            GameEventData::Message { player, .. } => Some(*player),
            GameEventData::SlabChanged { owner, .. } => *owner,
            _ => None,
        };

        Self {
            turn,
            priority,
            player_id,
            data,
        }
    }

    /// Create thing killed event.
    pub fn thing_killed(turn: u32, thing: ThingHandle, class: ThingClass, owner: PlayerId) -> Self {
        Self::new(turn, EventPriority::Death, GameEventData::ThingKilled { thing, class, owner })
    }

    /// Create spell applied event.
    pub fn spell_applied(
        turn: u32,
        thing: ThingHandle,
        spell: SpellKind,
        level: u8,
        caster: PlayerId,
        refreshed: bool,
    ) -> Self {
        Self::new(
            turn,
            EventPriority::Spell,
            GameEventData::SpellApplied {
                thing,
                spell,
                level,
                caster,
                refreshed,
            },
        )
    }

    /// Create spell expired event.
    pub fn spell_expired(turn: u32, thing: ThingHandle, spell: SpellKind) -> Self {
        Self::new(turn, EventPriority::Spell, GameEventData::SpellExpired { thing, spell })
    }

    /// Create cast rejected event.
    pub fn cast_rejected(turn: u32, player: PlayerId, power: PowerKind, reason: RejectReason) -> Self {
        Self::new(
            turn,
            EventPriority::Power,
            GameEventData::CastRejected { player, power, reason },
        )
    }

    /// Create sound event.
    pub fn sound(turn: u32, sample: u16, thing: Option<ThingHandle>) -> Self {
        Self::new(turn, EventPriority::Feedback, GameEventData::SoundPlayed { sample, thing })
    }

    /// Create visual effect event.
    pub fn effect(turn: u32, effect: u16, pos: Coord3d) -> Self {
        Self::new(turn, EventPriority::Feedback, GameEventData::EffectSpawned { effect, pos })
    }

    /// Create terrain change event.
    pub fn slab_changed(turn: u32, stl: SubtileCoord, slab: SlabKind, owner: Option<PlayerId>) -> Self {
        Self::new(turn, EventPriority::Terrain, GameEventData::SlabChanged { stl, slab, owner })
    }
}

impl PartialEq for GameEvent {
    fn eq(&self, other: &Self) -> bool {
        self.turn == other.turn
            && self.priority == other.priority
            && self.player_id == other.player_id
    }
}

impl Eq for GameEvent {}

impl PartialOrd for GameEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GameEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Sort by: turn, then priority, then player_id
        self.turn
            .cmp(&other.turn)
            .then(self.priority.cmp(&other.priority))
            .then(self.player_id.cmp(&other.player_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::handle::Handle;

    #[test]
    fn test_event_ordering() {
        let h = Handle::from_raw(1, 0);

        let death = GameEvent::thing_killed(10, h, ThingClass::Creature, PlayerId(1));
        let spell = GameEvent::spell_applied(10, h, SpellKind::Speed, 2, PlayerId(1), false);
        let later = GameEvent::thing_killed(11, h, ThingClass::Creature, PlayerId(0));
        let other_owner = GameEvent::thing_killed(10, h, ThingClass::Creature, PlayerId(2));

        // Same turn, but death < spell
        assert!(death < spell);

        // Turn dominates
        assert!(spell < later);

        // Same turn and priority, lower player first
        assert!(death < other_owner);
    }

    #[test]
    fn test_player_attribution() {
        let rejected = GameEvent::cast_rejected(1, PlayerId(3), PowerKind::Slap, RejectReason::InvalidTarget);
        assert_eq!(rejected.player_id, Some(PlayerId(3)));
        let sound = GameEvent::sound(1, 119, None);
        assert_eq!(sound.player_id, None);
    }
}
