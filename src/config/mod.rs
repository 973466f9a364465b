//! Simulation Configuration
//!
//! Read-only tables the simulation consults: instances, spells, shots,
//! powers and creature kinds, plus a handful of global rules. Built-in
//! defaults come from `Default`; custom tables load from JSON or bincode
//! and are validated before use.

pub mod creature;
pub mod instance;
pub mod magic;

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::hash::{StateHash, StateHasher};

pub use creature::{AnimInfo, AnimSlot, CreatureKind, CreatureStats};
pub use instance::{InstanceAction, InstanceFlags, InstanceInfo, InstanceKind};
pub use magic::{
    CastFlags, DamageMode, PowerConfig, PowerEffect, PowerFlags, PowerKind, PricingRule,
    ShotConfig, ShotKind, SpellConfig, SpellFlags, SpellKind, SummonConfig,
    MAGIC_OVERCHARGE_LEVELS, SPELL_MAX_LEVEL,
};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JSON could not be parsed or produced
    #[error("config json: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary blob could not be decoded or produced
    #[error("config binary: {0}")]
    Binary(#[from] bincode::Error),

    /// Instance fires after it ends
    #[error("instance {kind:?}: action turn {action} exceeds total {total}")]
    InstanceTiming {
        /// Offending instance
        kind: InstanceKind,
        /// Configured action turn
        action: u32,
        /// Configured total turns
        total: u32,
    },

    /// Spell refers to a power that is not configured
    #[error("spell {spell:?} links to missing power {power:?}")]
    MissingLinkedPower {
        /// Offending spell
        spell: SpellKind,
        /// Missing power
        power: PowerKind,
    },

    /// Power lists a parent that is not configured or not a parent
    #[error("power {power:?} has invalid parent {parent:?}")]
    InvalidParent {
        /// Offending power
        power: PowerKind,
        /// Referenced parent
        parent: PowerKind,
    },

    /// Table entry references a kind with no row
    #[error("{what} references unconfigured {missing}")]
    MissingEntry {
        /// Referencing entry
        what: String,
        /// Missing entry
        missing: String,
    },
}

// =============================================================================
// GLOBAL RULES
// =============================================================================

/// Global simulation rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameRules {
    /// Thing storage capacity
    pub max_things: usize,
    /// Creature control storage capacity
    pub max_controls: usize,
    /// Damage dealt by a slap
    pub slap_damage: i32,
    /// Turns a slapped creature cowers
    pub slap_cower_turns: u32,
    /// Distance of armour lights from their host
    pub armour_orbit_radius: i32,
    /// Distance of disease motes from their host
    pub disease_orbit_radius: i32,
    /// Turns until a chicken spell completes the transformation
    pub chicken_grow_turns: u32,
    /// Reach of a time bomb explosion
    pub timebomb_radius: i32,
    /// Damage of a time bomb explosion
    pub timebomb_damage: i32,
    /// Reach of the lightning power
    pub lightning_radius: i32,
    /// Creature dug out by the digger power
    pub digger_kind: CreatureKind,
    /// Downward acceleration of walking creatures and objects
    pub creature_fall_acceleration: i32,
    /// Subtile radius searched when relocating an embedded thing
    pub relocate_search_radius: i32,
    /// Sound for rejected casts and immune targets
    pub rejection_sound: u16,
    /// Sound for powers not yet available
    pub unavailable_sound: u16,
    /// Effect spawned by the fart instance
    pub fart_effect: u16,
    /// Effect spawned by an explosion
    pub explosion_effect: u16,
    /// Lifespan of short visual effects
    pub effect_lifespan: i32,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            max_things: 2048,
            max_controls: 256,
            slap_damage: 3,
            slap_cower_turns: 18,
            armour_orbit_radius: 96,
            disease_orbit_radius: 64,
            chicken_grow_turns: 10,
            timebomb_radius: 768,
            timebomb_damage: 400,
            lightning_radius: 384,
            digger_kind: CreatureKind::Imp,
            creature_fall_acceleration: 8,
            relocate_search_radius: 8,
            rejection_sound: 119,
            unavailable_sound: 177,
            fart_effect: 13,
            explosion_effect: 4,
            effect_lifespan: 12,
        }
    }
}

// =============================================================================
// AGGREGATE
// =============================================================================

/// All configuration tables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Global rules
    pub rules: GameRules,
    /// Instance rows
    pub instances: BTreeMap<InstanceKind, InstanceInfo>,
    /// Spell rows
    pub spells: BTreeMap<SpellKind, SpellConfig>,
    /// Shot rows
    pub shots: BTreeMap<ShotKind, ShotConfig>,
    /// Power rows
    pub powers: BTreeMap<PowerKind, PowerConfig>,
    /// Creature kind rows
    pub creatures: BTreeMap<CreatureKind, CreatureStats>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            rules: GameRules::default(),
            instances: instance::default_instances().into_iter().collect(),
            spells: magic::default_spells().into_iter().collect(),
            shots: magic::default_shots().into_iter().collect(),
            powers: magic::default_powers().into_iter().collect(),
            creatures: creature::default_creatures().into_iter().collect(),
        }
    }
}

impl SimConfig {
    /// Parse and validate JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serialize to a compact binary blob.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode and validate a binary blob.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: SimConfig = bincode::deserialize(bytes)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-table consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (kind, info) in &self.instances {
            if info.action_time > info.time {
                return Err(ConfigError::InstanceTiming {
                    kind: *kind,
                    action: info.action_time,
                    total: info.time,
                });
            }
            if info.fp_action_time > info.fp_time {
                return Err(ConfigError::InstanceTiming {
                    kind: *kind,
                    action: info.fp_action_time,
                    total: info.fp_time,
                });
            }
            match info.action {
                InstanceAction::FireShot(shot) if !self.shots.contains_key(&shot) => {
                    return Err(missing(format!("instance {:?}", kind), format!("shot {:?}", shot)));
                }
                InstanceAction::CastSpell(spell) if !self.spells.contains_key(&spell) => {
                    return Err(missing(format!("instance {:?}", kind), format!("spell {:?}", spell)));
                }
                _ => {}
            }
        }

        for (kind, spell) in &self.spells {
            if let Some(power) = spell.linked_power {
                if !self.powers.contains_key(&power) {
                    return Err(ConfigError::MissingLinkedPower { spell: *kind, power });
                }
            }
            if let Some(shot) = spell.shot {
                if !self.shots.contains_key(&shot) {
                    return Err(missing(format!("spell {:?}", kind), format!("shot {:?}", shot)));
                }
            }
            if let Some(summon) = spell.summon {
                if !self.creatures.contains_key(&summon.kind) {
                    return Err(missing(format!("spell {:?}", kind), format!("creature {:?}", summon.kind)));
                }
            }
        }

        for (kind, power) in &self.powers {
            if let Some(parent) = power.parent {
                let valid = self
                    .powers
                    .get(&parent)
                    .map(|p| p.flags.contains(PowerFlags::IS_PARENT))
                    .unwrap_or(false);
                if !valid {
                    return Err(ConfigError::InvalidParent { power: *kind, parent });
                }
            }
            if let PowerEffect::ApplySpell(spell) = power.effect {
                if !self.spells.contains_key(&spell) {
                    return Err(missing(format!("power {:?}", kind), format!("spell {:?}", spell)));
                }
            }
        }

        if !self.creatures.contains_key(&self.rules.digger_kind) {
            return Err(missing("rules".to_string(), format!("creature {:?}", self.rules.digger_kind)));
        }

        Ok(())
    }

    /// Fingerprint of the tables, exchanged by peers before a session.
    pub fn fingerprint(&self) -> Result<StateHash, ConfigError> {
        let mut hasher = StateHasher::for_config();
        hasher.update_bytes(&self.to_bytes()?);
        Ok(hasher.finalize())
    }

    /// Spell row.
    pub fn spell(&self, kind: SpellKind) -> Option<&SpellConfig> {
        self.spells.get(&kind)
    }

    /// Power row.
    pub fn power(&self, kind: PowerKind) -> Option<&PowerConfig> {
        self.powers.get(&kind)
    }

    /// Instance row.
    pub fn instance(&self, kind: InstanceKind) -> Option<&InstanceInfo> {
        self.instances.get(&kind)
    }

    /// Shot row.
    pub fn shot(&self, kind: ShotKind) -> Option<&ShotConfig> {
        self.shots.get(&kind)
    }

    /// Creature kind row.
    pub fn creature(&self, kind: CreatureKind) -> Option<&CreatureStats> {
        self.creatures.get(&kind)
    }

    /// Powers whose parent is `parent`.
    pub fn children_of(&self, parent: PowerKind) -> impl Iterator<Item = PowerKind> + '_ {
        self.powers
            .iter()
            .filter(move |(_, p)| p.parent == Some(parent))
            .map(|(k, _)| *k)
    }
}

fn missing(what: String, missing: String) -> ConfigError {
    ConfigError::MissingEntry { what, missing }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn test_json_round_trip() {
        let config = SimConfig::default();
        let json = config.to_json().unwrap();
        let back = SimConfig::from_json(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_binary_round_trip() {
        let config = SimConfig::default();
        let bytes = config.to_bytes().unwrap();
        let back = SimConfig::from_bytes(&bytes).unwrap();
        assert_eq!(back, config);
        assert_eq!(back.fingerprint().unwrap(), config.fingerprint().unwrap());
    }

    #[test]
    fn test_rejects_late_action() {
        let mut config = SimConfig::default();
        if let Some(info) = config.instances.get_mut(&InstanceKind::Swing) {
            info.action_time = info.time + 1;
        }
        assert!(matches!(config.validate(), Err(ConfigError::InstanceTiming { .. })));
    }

    #[test]
    fn test_rejects_dangling_links() {
        let mut config = SimConfig::default();
        config.powers.remove(&PowerKind::SpeedCreature);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingLinkedPower { spell: SpellKind::Speed, .. })
        ));

        let mut config = SimConfig::default();
        config.powers.remove(&PowerKind::Hand);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidParent { .. })));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(SimConfig::from_json("{ not json"), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_children_of_parent() {
        let config = SimConfig::default();
        let children: Vec<_> = config.children_of(PowerKind::Hand).collect();
        assert_eq!(
            children,
            vec![PowerKind::PickupCreature, PowerKind::PickupGold, PowerKind::PickupFood]
        );
    }
}
