//! Instance Table
//!
//! Timed, cooldown-gated creature abilities. Each row gives the phase
//! lengths for AI-driven and directly controlled creatures and the action
//! fired on the action turn.

use serde::{Serialize, Deserialize};
use bitflags::bitflags;

use super::creature::AnimSlot;
use super::magic::{ShotKind, SpellKind};

/// Instance identifiers. Id 0 is the empty instance and has no variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum InstanceKind {
    /// Melee attack
    Swing = 1,
    /// Ranged attack
    FireArrow = 2,
    /// Fireball spell
    Fireball = 3,
    /// Freeze spell
    Freeze = 4,
    /// Armour self-buff
    Armour = 5,
    /// Speed buff
    Speed = 6,
    /// Heal buff
    Heal = 7,
    /// Dig a slab
    Dig = 8,
    /// Fortify a wall
    Reinforce = 9,
    /// Claim a path
    PrettyPath = 10,
    /// Eat food
    Eat = 11,
    /// Noxious gas
    Fart = 12,
    /// Scripted tunnelling
    Tunnel = 13,
}

impl InstanceKind {
    /// Every instance kind, in id order.
    pub const ALL: [InstanceKind; 13] = [
        InstanceKind::Swing,
        InstanceKind::FireArrow,
        InstanceKind::Fireball,
        InstanceKind::Freeze,
        InstanceKind::Armour,
        InstanceKind::Speed,
        InstanceKind::Heal,
        InstanceKind::Dig,
        InstanceKind::Reinforce,
        InstanceKind::PrettyPath,
        InstanceKind::Eat,
        InstanceKind::Fart,
        InstanceKind::Tunnel,
    ];

    /// Kind from a raw id. Zero and negative ids are placeholders.
    pub fn from_index(index: i32) -> Option<InstanceKind> {
        if index <= 0 {
            return None;
        }
        Self::ALL.iter().copied().find(|k| *k as i32 == index)
    }
}

bitflags! {
    /// Instance property flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct InstanceFlags: u8 {
        /// Targets the caster
        const SELF_BUFF         = 0x01;
        /// May target another creature
        const RANGED_BUFF       = 0x02;
        /// Needs a target thing or position
        const NEEDS_TARGET      = 0x04;
        /// Holding the trigger extends instead of restarting
        const REPEAT_TRIGGER    = 0x08;
        /// Keeps advancing while the hand holds the creature still
        const IGNORES_HAND_HOLD = 0x10;
    }
}

/// What an instance does on its action turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InstanceAction {
    /// Animation only
    #[default]
    None,
    /// Launch a projectile at the target
    FireShot(ShotKind),
    /// Cast a spell (projectile or buff)
    CastSpell(SpellKind),
    /// Dig out the target subtile
    Dig,
    /// Fortify the target subtile
    Reinforce,
    /// Claim the target subtile
    PrettyPath,
    /// Eat and heal
    Eat,
    /// Release gas
    Fart,
    /// Handled by the script host
    Script(u16),
}

/// Static instance data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstanceInfo {
    /// Display name
    pub name: String,
    /// Total turns
    pub time: u32,
    /// Turn the action fires
    pub action_time: u32,
    /// Cooldown after the action
    pub reset_time: u32,
    /// Total turns when directly controlled
    pub fp_time: u32,
    /// Action turn when directly controlled
    pub fp_action_time: u32,
    /// Cooldown when directly controlled
    pub fp_reset_time: u32,
    /// Animation played
    pub graphics: Option<AnimSlot>,
    /// Turns the creature stays visible after triggering
    pub force_visibility: u32,
    /// Property flags
    pub flags: InstanceFlags,
    /// Action fired on the action turn
    pub action: InstanceAction,
}

impl InstanceInfo {
    fn new(name: &str, time: u32, action_time: u32, reset_time: u32, action: InstanceAction) -> Self {
        Self {
            name: name.to_string(),
            time,
            action_time,
            reset_time,
            fp_time: (time / 2).max(1),
            fp_action_time: (action_time / 2).max(1),
            fp_reset_time: reset_time / 2,
            graphics: None,
            force_visibility: 0,
            flags: InstanceFlags::empty(),
            action,
        }
    }

    /// Phase lengths `(total, action, reset)` for the control mode.
    pub fn times(&self, first_person: bool) -> (u32, u32, u32) {
        if first_person {
            (self.fp_time, self.fp_action_time, self.fp_reset_time)
        } else {
            (self.time, self.action_time, self.reset_time)
        }
    }
}

/// Built-in instance table.
pub fn default_instances() -> Vec<(InstanceKind, InstanceInfo)> {
    use InstanceAction as A;
    use InstanceFlags as F;
    let attack = |name: &str, time, action, reset, act| InstanceInfo {
        graphics: Some(AnimSlot::Attack),
        force_visibility: 8,
        flags: F::NEEDS_TARGET,
        ..InstanceInfo::new(name, time, action, reset, act)
    };
    let buff = |name: &str, spell, flags| InstanceInfo {
        graphics: Some(AnimSlot::Cast),
        flags,
        ..InstanceInfo::new(name, 10, 6, 100, A::CastSpell(spell))
    };
    let work = |name: &str, act| InstanceInfo {
        graphics: Some(AnimSlot::Dig),
        flags: F::NEEDS_TARGET | F::REPEAT_TRIGGER,
        ..InstanceInfo::new(name, 8, 4, 1, act)
    };
    vec![
        (InstanceKind::Swing, attack("SWING", 8, 4, 8, A::FireShot(ShotKind::Swing))),
        (InstanceKind::FireArrow, attack("FIRE_ARROW", 8, 4, 8, A::FireShot(ShotKind::Arrow))),
        (InstanceKind::Fireball, attack("FIREBALL", 10, 5, 24, A::CastSpell(SpellKind::Fireball))),
        (InstanceKind::Freeze, attack("FREEZE", 10, 6, 100, A::CastSpell(SpellKind::Freeze))),
        (InstanceKind::Armour, buff("ARMOUR", SpellKind::Armour, F::SELF_BUFF)),
        (InstanceKind::Speed, buff("SPEED", SpellKind::Speed, F::SELF_BUFF | F::RANGED_BUFF)),
        (InstanceKind::Heal, buff("HEAL", SpellKind::Heal, F::SELF_BUFF | F::RANGED_BUFF)),
        (InstanceKind::Dig, work("DIG", A::Dig)),
        (InstanceKind::Reinforce, work("REINFORCE", A::Reinforce)),
        (InstanceKind::PrettyPath, work("PRETTY_PATH", A::PrettyPath)),
        (InstanceKind::Eat, InstanceInfo {
            graphics: Some(AnimSlot::Eat),
            flags: F::IGNORES_HAND_HOLD,
            ..InstanceInfo::new("EAT", 16, 8, 1, A::Eat)
        }),
        (InstanceKind::Fart, InstanceInfo::new("FART", 8, 4, 100, A::Fart)),
        (InstanceKind::Tunnel, InstanceInfo {
            flags: F::NEEDS_TARGET | F::REPEAT_TRIGGER,
            ..InstanceInfo::new("TUNNEL", 8, 4, 1, A::Script(1))
        }),
    ]
}
