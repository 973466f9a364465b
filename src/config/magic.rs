//! Spell, Shot and Power Tables
//!
//! Status-effect spells, the projectiles that carry them and the
//! player-level powers that cast them. Everything here is read-only to
//! the simulation.

use serde::{Serialize, Deserialize};
use bitflags::bitflags;

use super::creature::CreatureKind;

/// Highest spell/power level.
pub const SPELL_MAX_LEVEL: u8 = 8;

/// Entries in per-level tables (levels 0..=SPELL_MAX_LEVEL).
pub const MAGIC_OVERCHARGE_LEVELS: usize = SPELL_MAX_LEVEL as usize + 1;

// =============================================================================
// STATUS FLAGS
// =============================================================================

bitflags! {
    /// Live status flags on a creature, and the flags a spell sets.
    ///
    /// `HEAL` only ever appears in spell tables; it is applied on the spot
    /// and never lands in a creature's live mask.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SpellFlags: u32 {
        const SLOW         = 1 << 0;
        const SPEED        = 1 << 1;
        const ARMOUR       = 1 << 2;
        const REBOUND      = 1 << 3;
        const FLYING       = 1 << 4;
        const INVISIBILITY = 1 << 5;
        const SIGHT        = 1 << 6;
        const LIGHT        = 1 << 7;
        const DISEASE      = 1 << 8;
        const CHICKEN      = 1 << 9;
        const FREEZE       = 1 << 10;
        const MAD_KILLING  = 1 << 11;
        const FEAR         = 1 << 12;
        const TELEPORT     = 1 << 13;
        const TIMEBOMB     = 1 << 14;
        const HEAL         = 1 << 15;
    }
}

// =============================================================================
// SPELLS
// =============================================================================

/// Spell identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SpellKind {
    /// Fire projectile
    Fireball = 1,
    /// Stops the target in place
    Freeze = 3,
    /// Damage reduction with orbiting lights
    Armour = 4,
    /// Bolt from the sky
    Lightning = 5,
    /// Reflects projectiles
    Rebound = 6,
    /// Instant healing
    Heal = 7,
    /// Damage over time without a status flag
    PoisonCloud = 8,
    /// Hidden from enemies
    Invisibility = 9,
    /// Sends the creature to a chosen destination
    Teleport = 10,
    /// Doubles movement speed
    Speed = 11,
    /// Halves movement speed
    Slow = 12,
    /// Makes the creature flee
    Fear = 14,
    /// Illuminates surroundings
    Light = 19,
    /// Grants flight
    Fly = 20,
    /// Extended vision
    Sight = 21,
    /// Attack friend and foe
    CrazyGas = 25,
    /// Spreading sickness
    Disease = 26,
    /// Turns the creature into a chicken
    Chicken = 27,
    /// Explodes when it runs out
    TimeBomb = 28,
    /// Calls companion creatures
    SummonFamiliar = 29,
    /// Removes harmful conditions
    Cure = 30,
    /// Heals over time
    Regeneration = 31,
}

impl SpellKind {
    /// Every spell kind, in id order.
    pub const ALL: [SpellKind; 22] = [
        SpellKind::Fireball,
        SpellKind::Freeze,
        SpellKind::Armour,
        SpellKind::Lightning,
        SpellKind::Rebound,
        SpellKind::Heal,
        SpellKind::PoisonCloud,
        SpellKind::Invisibility,
        SpellKind::Teleport,
        SpellKind::Speed,
        SpellKind::Slow,
        SpellKind::Fear,
        SpellKind::Light,
        SpellKind::Fly,
        SpellKind::Sight,
        SpellKind::CrazyGas,
        SpellKind::Disease,
        SpellKind::Chicken,
        SpellKind::TimeBomb,
        SpellKind::SummonFamiliar,
        SpellKind::Cure,
        SpellKind::Regeneration,
    ];

    /// Spell from its numeric id.
    pub fn from_index(index: u8) -> Option<SpellKind> {
        Self::ALL.iter().copied().find(|k| *k as u8 == index)
    }
}

/// How a periodic pulse computes its amount.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DamageMode {
    /// `damage` as is
    #[default]
    Fixed,
    /// `damage * (level + 1)`
    LevelScaled,
    /// `damage` percent of max health
    PercentMaxHealth,
    /// `damage` percent of current health
    PercentCurrentHealth,
}

/// Companion creatures spawned by a spell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummonConfig {
    /// Kind of familiar
    pub kind: CreatureKind,
    /// How many
    pub count: u8,
}

/// Static spell data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpellConfig {
    /// Display name
    pub name: String,
    /// Fixed duration in turns (0 = take it from the linked power)
    pub duration: i32,
    /// Power whose strength table supplies duration or healing
    pub linked_power: Option<PowerKind>,
    /// Status flags set while active
    pub flags: SpellFlags,
    /// Flags removed once when the spell lands
    pub cleanse_flags: SpellFlags,
    /// Pulse amount; positive harms, negative heals
    pub damage: i32,
    /// Turns between pulses (0 = one-shot on apply)
    pub damage_frequency: u32,
    /// Pulse formula
    pub damage_mode: DamageMode,
    /// Survives losing its flags (pure periodic effects)
    pub continuous: bool,
    /// Fixed healing when not taken from the linked power
    pub healing: i32,
    /// Visual effect re-triggered while active
    pub aura_effect: Option<u16>,
    /// Turns between aura triggers
    pub aura_frequency: u32,
    /// Projectile fired instead of applying to the caster
    pub shot: Option<ShotKind>,
    /// Familiars spawned on first apply
    pub summon: Option<SummonConfig>,
    /// Sound played on the target when applied
    pub cast_sound: Option<u16>,
}

impl SpellConfig {
    /// Spell that only sets flags for a fixed time.
    pub fn status(name: &str, flags: SpellFlags, duration: i32) -> Self {
        Self {
            name: name.to_string(),
            duration,
            linked_power: None,
            flags,
            cleanse_flags: SpellFlags::empty(),
            damage: 0,
            damage_frequency: 0,
            damage_mode: DamageMode::Fixed,
            continuous: false,
            healing: 0,
            aura_effect: None,
            aura_frequency: 0,
            shot: None,
            summon: None,
            cast_sound: None,
        }
    }

    /// Status spell whose duration comes from a power's strength table.
    pub fn powered(name: &str, flags: SpellFlags, power: PowerKind) -> Self {
        Self { linked_power: Some(power), ..Self::status(name, flags, 0) }
    }

    /// Spell that fires a projectile.
    pub fn projectile(name: &str, shot: ShotKind) -> Self {
        Self { shot: Some(shot), ..Self::status(name, SpellFlags::empty(), 0) }
    }

    /// True if the spell has a periodic damage/heal component.
    pub fn has_periodic(&self) -> bool {
        self.damage != 0 && self.damage_frequency > 0
    }
}

// =============================================================================
// SHOTS
// =============================================================================

/// Projectile identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ShotKind {
    /// Melee reach, lives one turn
    Swing = 1,
    /// Plain arrow
    Arrow = 2,
    /// Fireball, bounces once off walls
    Fireball = 3,
    /// Carries the freeze spell
    FreezeBolt = 4,
    /// Rolling boulder, clipped on Z like a creature
    Boulder = 5,
}

/// Static projectile data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShotConfig {
    /// Launch speed (coord units per turn)
    pub speed: i32,
    /// Damage on hit
    pub damage: i32,
    /// Lifespan in turns
    pub health: i32,
    /// Reflection strength on walls, in 1/128 (0 = dies on walls)
    pub bounce_angle: i32,
    /// Damping of unblocked axes on bounce, in 1/256
    pub bounce_damping: i32,
    /// Horizontal box size
    pub size_xy: i32,
    /// Vertical box size
    pub size_yz: i32,
    /// Downward acceleration per turn
    pub fall_acceleration: i32,
    /// Spell applied to the creature hit
    pub spell: Option<SpellKind>,
    /// Boulders are clipped on Z like creatures
    pub boulder: bool,
    /// Sound on hit
    pub hit_sound: Option<u16>,
}

impl Default for ShotConfig {
    fn default() -> Self {
        Self {
            speed: 64,
            damage: 10,
            health: 40,
            bounce_angle: 0,
            bounce_damping: 0,
            size_xy: 32,
            size_yz: 32,
            fall_acceleration: 0,
            spell: None,
            boulder: false,
            hit_sound: None,
        }
    }
}

// =============================================================================
// POWERS
// =============================================================================

/// Player power identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PowerKind {
    /// Aggregate of the pickup powers
    Hand = 1,
    /// Conjure a digger
    CreateDigger = 2,
    /// Creatures work and fight harder
    Obey = 3,
    /// Slap a creature
    Slap = 4,
    /// Reveal an area
    Sight = 5,
    /// Rally point for the owner's creatures
    CallToArms = 6,
    /// Collapse the ceiling
    CaveIn = 7,
    /// Heal a creature
    HealCreature = 8,
    /// Strike an area
    Lightning = 10,
    /// Haste a creature
    SpeedCreature = 11,
    /// Armour a creature
    Protect = 12,
    /// Make a creature invisible
    Conceal = 13,
    /// Infect an enemy
    Disease = 14,
    /// Turn an enemy into a chicken
    Chicken = 15,
    /// Break fortified walls
    DestroyWalls = 16,
    /// Arm a creature as a bomb
    TimeBomb = 17,
    /// Take direct control of a creature
    Possess = 18,
    /// Pick up a creature
    PickupCreature = 20,
    /// Pick up gold
    PickupGold = 21,
    /// Pick up food
    PickupFood = 22,
}

impl PowerKind {
    /// Every power kind, in id order.
    pub const ALL: [PowerKind; 20] = [
        PowerKind::Hand,
        PowerKind::CreateDigger,
        PowerKind::Obey,
        PowerKind::Slap,
        PowerKind::Sight,
        PowerKind::CallToArms,
        PowerKind::CaveIn,
        PowerKind::HealCreature,
        PowerKind::Lightning,
        PowerKind::SpeedCreature,
        PowerKind::Protect,
        PowerKind::Conceal,
        PowerKind::Disease,
        PowerKind::Chicken,
        PowerKind::DestroyWalls,
        PowerKind::TimeBomb,
        PowerKind::Possess,
        PowerKind::PickupCreature,
        PowerKind::PickupGold,
        PowerKind::PickupFood,
    ];

    /// Power from its numeric id.
    pub fn from_index(index: u8) -> Option<PowerKind> {
        Self::ALL.iter().copied().find(|k| *k as u8 == index)
    }
}

bitflags! {
    /// What a power may target.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CastFlags: u32 {
        /// Enemy creatures kept in the caster's custody
        const CUSTODY_CRTRS  = 0x0000_0001;
        /// Own creatures not held by an enemy
        const OWNED_CRTRS    = 0x0000_0002;
        /// Allied creatures
        const ALLIED_CRTRS   = 0x0000_0004;
        /// Enemy creatures
        const ENEMY_CRTRS    = 0x0000_0008;
        /// Unconscious or dying creatures
        const NCONSC_CRTRS   = 0x0000_0010;
        /// Creatures bound by state (dragged, sacrificed, teleporting, armed)
        const BOUND_CRTRS    = 0x0000_0020;
        /// Unowned walkable ground: path, water, lava
        const UNCLMD_GROUND  = 0x0000_0080;
        /// Neutral claimed ground and rooms
        const NEUTRL_GROUND  = 0x0000_0100;
        /// Own claimed ground and rooms
        const OWNED_GROUND   = 0x0000_0200;
        /// Allied claimed ground and rooms
        const ALLIED_GROUND  = 0x0000_0400;
        /// Enemy claimed ground and rooms
        const ENEMY_GROUND   = 0x0000_0800;
        /// Neutral tall slabs: earth, rock, gold
        const NEUTRL_TALL    = 0x0000_1000;
        /// Own fortified walls
        const OWNED_TALL     = 0x0000_2000;
        /// Allied fortified walls
        const ALLIED_TALL    = 0x0000_4000;
        /// Enemy fortified walls
        const ENEMY_TALL     = 0x0000_8000;
        /// Own food
        const OWNED_FOOD     = 0x0002_0000;
        /// Neutral food
        const NEUTRL_FOOD    = 0x0004_0000;
        /// Enemy food
        const ENEMY_FOOD     = 0x0008_0000;
        /// Own gold
        const OWNED_GOLD     = 0x0010_0000;
        /// Neutral gold
        const NEUTRL_GOLD    = 0x0020_0000;
        /// Enemy gold
        const ENEMY_GOLD     = 0x0040_0000;
        /// Own spell books
        const OWNED_SPELL    = 0x0080_0000;
        /// Own boulders
        const OWNED_BOULDERS = 0x0100_0000;
        /// Only after the caster's cooldown elapsed
        const NEEDS_DELAY    = 0x0400_0000;
        /// Only claimable/fortifiable slabs
        const CLAIMABLE      = 0x0800_0000;
        /// Also on unrevealed subtiles
        const UNREVEALED     = 0x1000_0000;
        /// Also on temporarily revealed subtiles
        const REVEALED_TEMP  = 0x2000_0000;
        /// Either the map check or the thing check is enough
        const THING_OR_MAP   = 0x4000_0000;
        /// No map conditions beyond reveal
        const ANYWHERE       = 0x8000_0000;

        /// Every creature category
        const ALL_CRTRS = Self::CUSTODY_CRTRS.bits() | Self::OWNED_CRTRS.bits()
            | Self::ALLIED_CRTRS.bits() | Self::ENEMY_CRTRS.bits()
            | Self::NCONSC_CRTRS.bits() | Self::BOUND_CRTRS.bits();
        /// Every food category
        const ALL_FOOD = Self::OWNED_FOOD.bits() | Self::NEUTRL_FOOD.bits() | Self::ENEMY_FOOD.bits();
        /// Every gold category
        const ALL_GOLD = Self::OWNED_GOLD.bits() | Self::NEUTRL_GOLD.bits() | Self::ENEMY_GOLD.bits();
        /// Every thing category
        const ALL_THINGS = Self::CUSTODY_CRTRS.bits() | Self::OWNED_CRTRS.bits()
            | Self::ALLIED_CRTRS.bits() | Self::ENEMY_CRTRS.bits()
            | Self::ALL_FOOD.bits() | Self::ALL_GOLD.bits()
            | Self::OWNED_SPELL.bits() | Self::OWNED_BOULDERS.bits();
        /// Every ground category
        const ALL_GROUND = Self::UNCLMD_GROUND.bits() | Self::NEUTRL_GROUND.bits()
            | Self::OWNED_GROUND.bits() | Self::ALLIED_GROUND.bits() | Self::ENEMY_GROUND.bits();
        /// Every tall category
        const ALL_TALL = Self::NEUTRL_TALL.bits() | Self::OWNED_TALL.bits()
            | Self::ALLIED_TALL.bits() | Self::ENEMY_TALL.bits();
    }
}

bitflags! {
    /// Power behaviour flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PowerFlags: u8 {
        /// Usable without selecting it first
        const INSTINCTIVE  = 0x01;
        /// Shows a progress bar while active
        const HAS_PROGRESS = 0x02;
        /// Aggregate of child powers
        const IS_PARENT    = 0x04;
    }
}

/// Price formula.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PricingRule {
    /// `cost[level]`
    #[default]
    Flat,
    /// `cost[level] + cost[0] * max(0, diggers - cheaper_diggers)`
    Diggers,
    /// `cost[level] + cost[0] * (count(kind) / divisor)`
    Population {
        /// Creature kind counted
        kind: CreatureKind,
        /// Creatures per price step
        divisor: u32,
    },
}

/// Effect producer invoked by a successful cast.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PowerEffect {
    /// Nothing registered
    #[default]
    None,
    /// Apply a status spell to the target creature
    ApplySpell(SpellKind),
    /// Slap a creature
    Slap,
    /// Damage everything around the target subtile
    Lightning,
    /// Spawn a digger
    CreateDigger,
    /// Toggle the obey compulsion
    Obey,
    /// Toggle the rally point
    CallToArms,
    /// Reveal an area
    Sight,
    /// Fill ground with earth
    CaveIn,
    /// Turn a wall back into path
    DestroyWalls,
    /// Take control of a creature
    Possess,
    /// Lift a thing into the hand
    PickUp,
    /// Externally scripted handler
    Script(u16),
}

/// Static power data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PowerConfig {
    /// Display name
    pub name: String,
    /// Gold cost by level
    pub cost: [i32; MAGIC_OVERCHARGE_LEVELS],
    /// Effect strength by level (duration, damage, radius...)
    pub strength: [i32; MAGIC_OVERCHARGE_LEVELS],
    /// Fixed duration (0 = use strength)
    pub duration: i32,
    /// Turns before the owner may cast delay-gated powers again
    pub cooldown: u32,
    /// Target categories
    pub can_cast: CastFlags,
    /// Behaviour flags
    pub flags: PowerFlags,
    /// Aggregate this power belongs to
    pub parent: Option<PowerKind>,
    /// Price formula
    pub pricing: PricingRule,
    /// What happens on success
    pub effect: PowerEffect,
}

impl PowerConfig {
    fn new(name: &str, effect: PowerEffect, can_cast: CastFlags) -> Self {
        Self {
            name: name.to_string(),
            cost: [0; MAGIC_OVERCHARGE_LEVELS],
            strength: [0; MAGIC_OVERCHARGE_LEVELS],
            duration: 0,
            cooldown: 0,
            can_cast,
            flags: PowerFlags::empty(),
            parent: None,
            pricing: PricingRule::Flat,
            effect,
        }
    }

    fn with_cost(mut self, base: i32, step: i32) -> Self {
        for (lvl, c) in self.cost.iter_mut().enumerate() {
            *c = base + step * lvl as i32;
        }
        self
    }

    fn with_strength(mut self, base: i32, step: i32) -> Self {
        for (lvl, s) in self.strength.iter_mut().enumerate() {
            *s = base + step * lvl as i32;
        }
        self
    }

    fn child_of(mut self, parent: PowerKind) -> Self {
        self.parent = Some(parent);
        self
    }
}

// =============================================================================
// DEFAULT TABLES
// =============================================================================

/// Built-in spell table.
pub fn default_spells() -> Vec<(SpellKind, SpellConfig)> {
    use SpellFlags as F;
    vec![
        (SpellKind::Fireball, SpellConfig::projectile("FIREBALL", ShotKind::Fireball)),
        (SpellKind::Freeze, SpellConfig {
            shot: Some(ShotKind::FreezeBolt),
            cast_sound: Some(28),
            ..SpellConfig::status("FREEZE", F::FREEZE, 60)
        }),
        (SpellKind::Armour, SpellConfig {
            cast_sound: Some(32),
            ..SpellConfig::powered("ARMOUR", F::ARMOUR, PowerKind::Protect)
        }),
        (SpellKind::Lightning, SpellConfig {
            damage: 40,
            ..SpellConfig::status("LIGHTNING", F::empty(), 0)
        }),
        (SpellKind::Rebound, SpellConfig::status("REBOUND", F::REBOUND, 120)),
        (SpellKind::Heal, SpellConfig {
            healing: 50,
            ..SpellConfig::powered("HEAL", F::HEAL, PowerKind::HealCreature)
        }),
        (SpellKind::PoisonCloud, SpellConfig {
            damage: 8,
            damage_frequency: 4,
            continuous: true,
            aura_effect: Some(7),
            aura_frequency: 8,
            ..SpellConfig::status("POISON_CLOUD", F::empty(), 40)
        }),
        (SpellKind::Invisibility, SpellConfig::powered("INVISIBILITY", F::INVISIBILITY, PowerKind::Conceal)),
        (SpellKind::Teleport, SpellConfig::status("TELEPORT", F::TELEPORT, 20)),
        (SpellKind::Speed, SpellConfig {
            aura_effect: Some(12),
            aura_frequency: 10,
            ..SpellConfig::powered("SPEED", F::SPEED, PowerKind::SpeedCreature)
        }),
        (SpellKind::Slow, SpellConfig::status("SLOW", F::SLOW, 100)),
        (SpellKind::Fear, SpellConfig::status("FEAR", F::FEAR, 80)),
        (SpellKind::Light, SpellConfig::status("LIGHT", F::LIGHT, 200)),
        (SpellKind::Fly, SpellConfig::status("FLY", F::FLYING, 300)),
        (SpellKind::Sight, SpellConfig::status("SIGHT", F::SIGHT, 150)),
        (SpellKind::CrazyGas, SpellConfig::status("CRAZY_GAS", F::MAD_KILLING, 100)),
        (SpellKind::Disease, SpellConfig {
            damage: 2,
            damage_frequency: 16,
            damage_mode: DamageMode::PercentMaxHealth,
            aura_effect: Some(9),
            aura_frequency: 16,
            ..SpellConfig::powered("DISEASE", F::DISEASE, PowerKind::Disease)
        }),
        (SpellKind::Chicken, SpellConfig::powered("CHICKEN", F::CHICKEN, PowerKind::Chicken)),
        (SpellKind::TimeBomb, SpellConfig::powered("TIME_BOMB", F::TIMEBOMB, PowerKind::TimeBomb)),
        (SpellKind::SummonFamiliar, SpellConfig {
            summon: Some(SummonConfig { kind: CreatureKind::Firefly, count: 2 }),
            ..SpellConfig::status("SUMMON_FAMILIAR", F::empty(), 400)
        }),
        (SpellKind::Cure, SpellConfig {
            cleanse_flags: F::DISEASE | F::SLOW | F::CHICKEN | F::FREEZE,
            ..SpellConfig::status("CURE", F::empty(), 0)
        }),
        (SpellKind::Regeneration, SpellConfig {
            damage: -5,
            damage_frequency: 8,
            continuous: true,
            ..SpellConfig::status("REGENERATION", F::empty(), 64)
        }),
    ]
}

/// Built-in shot table.
pub fn default_shots() -> Vec<(ShotKind, ShotConfig)> {
    vec![
        (ShotKind::Swing, ShotConfig { speed: 192, damage: 12, health: 1, size_xy: 64, size_yz: 64, ..ShotConfig::default() }),
        (ShotKind::Arrow, ShotConfig { speed: 96, damage: 16, health: 30, fall_acceleration: 1, hit_sound: Some(75), ..ShotConfig::default() }),
        (ShotKind::Fireball, ShotConfig {
            speed: 72,
            damage: 35,
            health: 40,
            bounce_angle: 64,
            bounce_damping: 32,
            hit_sound: Some(47),
            ..ShotConfig::default()
        }),
        (ShotKind::FreezeBolt, ShotConfig { speed: 64, damage: 2, spell: Some(SpellKind::Freeze), ..ShotConfig::default() }),
        (ShotKind::Boulder, ShotConfig {
            speed: 48,
            damage: 80,
            health: 600,
            size_xy: 200,
            size_yz: 200,
            fall_acceleration: 4,
            boulder: true,
            ..ShotConfig::default()
        }),
    ]
}

/// Built-in power table.
pub fn default_powers() -> Vec<(PowerKind, PowerConfig)> {
    use CastFlags as C;
    use PowerEffect as E;
    let crtr_buff = C::OWNED_CRTRS | C::ALLIED_CRTRS | C::ANYWHERE;
    vec![
        (PowerKind::Hand, PowerConfig {
            flags: PowerFlags::IS_PARENT | PowerFlags::INSTINCTIVE,
            ..PowerConfig::new("HAND", E::None, C::ALL_THINGS | C::ANYWHERE)
        }),
        (PowerKind::CreateDigger, PowerConfig {
            pricing: PricingRule::Diggers,
            ..PowerConfig::new("MAKE_DIGGER", E::CreateDigger, C::OWNED_GROUND).with_cost(300, 0)
        }),
        (PowerKind::Obey, PowerConfig::new("OBEY", E::Obey, C::ANYWHERE | C::UNREVEALED)),
        (PowerKind::Slap, PowerConfig {
            flags: PowerFlags::INSTINCTIVE,
            ..PowerConfig::new("SLAP", E::Slap, C::OWNED_CRTRS | C::CUSTODY_CRTRS | C::ANYWHERE)
                .with_strength(40, 0)
        }),
        (PowerKind::Sight, PowerConfig {
            flags: PowerFlags::HAS_PROGRESS,
            ..PowerConfig::new("SIGHT", E::Sight, C::ANYWHERE | C::UNREVEALED)
                .with_cost(300, 150)
                .with_strength(4, 1)
        }),
        (PowerKind::CallToArms, PowerConfig::new("CALL_TO_ARMS", E::CallToArms, C::ANYWHERE).with_cost(100, 50)),
        (PowerKind::CaveIn, PowerConfig::new("CAVE_IN", E::CaveIn, C::ALL_GROUND).with_cost(600, 200).with_strength(1, 0)),
        (PowerKind::HealCreature, PowerConfig::new("HEAL_CREATURE", E::ApplySpell(SpellKind::Heal), crtr_buff)
            .with_cost(250, 100)
            .with_strength(50, 25)),
        (PowerKind::Lightning, PowerConfig {
            cooldown: 10,
            ..PowerConfig::new("LIGHTNING", E::Lightning, C::ALL_GROUND | C::NEEDS_DELAY)
                .with_cost(150, 100)
                .with_strength(30, 15)
        }),
        (PowerKind::SpeedCreature, PowerConfig::new("SPEED", E::ApplySpell(SpellKind::Speed), crtr_buff)
            .with_cost(200, 100)
            .with_strength(100, 20)),
        (PowerKind::Protect, PowerConfig::new("PROTECT", E::ApplySpell(SpellKind::Armour), crtr_buff)
            .with_cost(250, 100)
            .with_strength(120, 20)),
        (PowerKind::Conceal, PowerConfig::new("CONCEAL", E::ApplySpell(SpellKind::Invisibility), crtr_buff)
            .with_cost(300, 100)
            .with_strength(150, 30)),
        (PowerKind::Disease, PowerConfig::new("DISEASE", E::ApplySpell(SpellKind::Disease), C::ENEMY_CRTRS | C::ANYWHERE)
            .with_cost(500, 150)
            .with_strength(160, 32)),
        (PowerKind::Chicken, PowerConfig::new("CHICKEN", E::ApplySpell(SpellKind::Chicken), C::ENEMY_CRTRS | C::OWNED_CRTRS | C::ANYWHERE)
            .with_cost(500, 150)
            .with_strength(100, 20)),
        (PowerKind::DestroyWalls, PowerConfig::new("DESTROY_WALLS", E::DestroyWalls, C::ENEMY_TALL | C::CLAIMABLE)
            .with_cost(800, 200)),
        (PowerKind::TimeBomb, PowerConfig::new("TIME_BOMB", E::ApplySpell(SpellKind::TimeBomb), C::OWNED_CRTRS | C::ANYWHERE)
            .with_cost(400, 100)
            .with_strength(60, 0)),
        (PowerKind::Possess, PowerConfig::new("POSSESS", E::Possess, C::OWNED_CRTRS | C::ANYWHERE)),
        (PowerKind::PickupCreature, PowerConfig::new("PICKUP_CREATURE", E::PickUp, C::OWNED_CRTRS | C::ANYWHERE)
            .child_of(PowerKind::Hand)),
        (PowerKind::PickupGold, PowerConfig::new("PICKUP_GOLD", E::PickUp, C::OWNED_GOLD | C::NEUTRL_GOLD | C::ANYWHERE)
            .child_of(PowerKind::Hand)),
        (PowerKind::PickupFood, PowerConfig::new("PICKUP_FOOD", E::PickUp, C::OWNED_FOOD | C::NEUTRL_FOOD | C::ANYWHERE)
            .child_of(PowerKind::Hand)),
    ]
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spell_ids_round_trip() {
        for kind in SpellKind::ALL {
            assert_eq!(SpellKind::from_index(kind as u8), Some(kind));
        }
        assert_eq!(SpellKind::from_index(0), None);
        assert_eq!(SpellKind::from_index(2), None);
    }

    #[test]
    fn test_power_ids_round_trip() {
        for kind in PowerKind::ALL {
            assert_eq!(PowerKind::from_index(kind as u8), Some(kind));
        }
        assert_eq!(PowerKind::from_index(9), None);
    }

    #[test]
    fn test_cast_flag_groups() {
        assert!(CastFlags::ALL_THINGS.contains(CastFlags::OWNED_GOLD));
        assert!(!CastFlags::ALL_THINGS.contains(CastFlags::NCONSC_CRTRS));
        assert!(CastFlags::ALL_CRTRS.contains(CastFlags::BOUND_CRTRS));
        assert_eq!(CastFlags::ANYWHERE.bits(), 0x8000_0000);
        assert!(!CastFlags::ALL_GROUND.intersects(CastFlags::ALL_TALL));
    }

    #[test]
    fn test_default_tables_cover_every_kind() {
        let spells = default_spells();
        assert_eq!(spells.len(), SpellKind::ALL.len());
        let powers = default_powers();
        assert_eq!(powers.len(), PowerKind::ALL.len());
    }

    #[test]
    fn test_level_tables() {
        let (_, speed) = default_powers()
            .into_iter()
            .find(|(k, _)| *k == PowerKind::SpeedCreature)
            .unwrap();
        assert_eq!(speed.strength[0], 100);
        assert_eq!(speed.strength[2], 140);
        assert_eq!(speed.cost[SPELL_MAX_LEVEL as usize], 1000);
    }
}
