//! Creature Kind Table
//!
//! Per-kind base stats the simulation reads when spawning creatures and
//! recomputing their movement capabilities.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

use super::instance::InstanceKind;
use super::magic::SpellFlags;

/// Creature kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CreatureKind {
    /// Digger
    Imp = 0,
    /// Sturdy digger and fighter
    Dwarf = 1,
    /// Spellcaster
    Warlock = 2,
    /// Fire breather, glows
    Dragon = 3,
    /// Heavy melee
    BileDemon = 4,
    /// Flying caster
    Fairy = 5,
    /// Summoned familiar, flies and glows
    Firefly = 6,
}

impl CreatureKind {
    /// Every creature kind, in id order.
    pub const ALL: [CreatureKind; 7] = [
        CreatureKind::Imp,
        CreatureKind::Dwarf,
        CreatureKind::Warlock,
        CreatureKind::Dragon,
        CreatureKind::BileDemon,
        CreatureKind::Fairy,
        CreatureKind::Firefly,
    ];

    /// Kind from its numeric id.
    pub fn from_index(index: u8) -> Option<CreatureKind> {
        Self::ALL.get(index as usize).copied()
    }
}

/// Animation slots an instance can play.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnimSlot {
    /// Melee or ranged attack
    Attack,
    /// Spell casting
    Cast,
    /// Digging and claiming
    Dig,
    /// Eating
    Eat,
}

/// Natural length of one animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimInfo {
    /// Frame count
    pub frames: i32,
    /// Playback speed (frame units per turn, 256 = one frame per turn)
    pub speed: i32,
    /// Loops back to the first frame
    pub looping: bool,
}

/// Static per-kind stats.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreatureStats {
    /// Display name
    pub name: String,
    /// Movement speed before status modifiers
    pub base_speed: i32,
    /// Maximum health at level 0
    pub health: i32,
    /// Extra max health per experience level
    pub health_per_level: i32,
    /// Flies by nature
    pub flying: bool,
    /// Glows by nature
    pub illuminated: bool,
    /// Status flags this kind never receives
    pub immunities: SpellFlags,
    /// Horizontal clip box
    pub size_xy: i32,
    /// Vertical clip box
    pub size_yz: i32,
    /// Health restored by one meal
    pub hunger_heal: i32,
    /// Counts towards the digger price
    pub is_digger: bool,
    /// Instances this kind may use
    pub instances: Vec<InstanceKind>,
    /// Animation lengths
    pub anims: BTreeMap<AnimSlot, AnimInfo>,
}

impl CreatureStats {
    fn new(name: &str, base_speed: i32, health: i32) -> Self {
        let mut anims = BTreeMap::new();
        anims.insert(AnimSlot::Attack, AnimInfo { frames: 8, speed: 256, looping: false });
        anims.insert(AnimSlot::Cast, AnimInfo { frames: 10, speed: 256, looping: false });
        anims.insert(AnimSlot::Dig, AnimInfo { frames: 6, speed: 192, looping: true });
        anims.insert(AnimSlot::Eat, AnimInfo { frames: 12, speed: 128, looping: true });
        Self {
            name: name.to_string(),
            base_speed,
            health,
            health_per_level: health / 10,
            flying: false,
            illuminated: false,
            immunities: SpellFlags::empty(),
            size_xy: 150,
            size_yz: 200,
            hunger_heal: health / 5,
            is_digger: false,
            instances: vec![InstanceKind::Swing, InstanceKind::Eat],
            anims,
        }
    }

    /// Maximum health at an experience level.
    pub fn max_health(&self, exp_level: u8) -> i32 {
        self.health + self.health_per_level * exp_level as i32
    }
}

/// Built-in creature table.
pub fn default_creatures() -> Vec<(CreatureKind, CreatureStats)> {
    use InstanceKind as I;
    vec![
        (CreatureKind::Imp, CreatureStats {
            is_digger: true,
            size_xy: 100,
            size_yz: 120,
            instances: vec![I::Swing, I::Dig, I::Reinforce, I::PrettyPath, I::Eat, I::Tunnel],
            ..CreatureStats::new("IMP", 48, 75)
        }),
        (CreatureKind::Dwarf, CreatureStats {
            instances: vec![I::Swing, I::Dig, I::Eat],
            ..CreatureStats::new("DWARF", 32, 250)
        }),
        (CreatureKind::Warlock, CreatureStats {
            instances: vec![I::Swing, I::Fireball, I::Freeze, I::Heal, I::Speed, I::Eat],
            ..CreatureStats::new("WARLOCK", 24, 350)
        }),
        (CreatureKind::Dragon, CreatureStats {
            illuminated: true,
            immunities: SpellFlags::FREEZE,
            size_xy: 200,
            size_yz: 240,
            instances: vec![I::Swing, I::Fireball, I::Armour, I::Eat],
            ..CreatureStats::new("DRAGON", 32, 900)
        }),
        (CreatureKind::BileDemon, CreatureStats {
            immunities: SpellFlags::DISEASE | SpellFlags::CHICKEN,
            size_xy: 200,
            instances: vec![I::Swing, I::Fart, I::Eat],
            ..CreatureStats::new("BILE_DEMON", 16, 1000)
        }),
        (CreatureKind::Fairy, CreatureStats {
            flying: true,
            size_xy: 100,
            size_yz: 120,
            instances: vec![I::FireArrow, I::Heal, I::Speed, I::Eat],
            ..CreatureStats::new("FAIRY", 40, 250)
        }),
        (CreatureKind::Firefly, CreatureStats {
            flying: true,
            illuminated: true,
            size_xy: 64,
            size_yz: 64,
            instances: vec![I::Swing],
            ..CreatureStats::new("FIREFLY", 56, 50)
        }),
    ]
}
