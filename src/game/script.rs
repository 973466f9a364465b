//! Script Hooks
//!
//! Instances and powers configured with a `Script(id)` action hand control
//! to the host. The core never interprets script ids.

use crate::config::{PowerKind, SimConfig};
use crate::game::cast::CastTarget;
use crate::game::player::PlayerId;
use crate::game::thing::{InstanceTarget, ThingHandle};
use crate::game::world::World;

/// External handler for scripted instance actions and power effects.
///
/// Both hooks return whether the script handled the request.
pub trait ScriptHost {
    /// Run a scripted instance action on its action turn.
    fn instance_action(
        &mut self,
        _world: &mut World,
        _cfg: &SimConfig,
        _id: u16,
        _actor: ThingHandle,
        _target: InstanceTarget,
    ) -> bool {
        false
    }

    /// Run a scripted power effect.
    #[allow(clippy::too_many_arguments)]
    fn power_effect(
        &mut self,
        _world: &mut World,
        _cfg: &SimConfig,
        _id: u16,
        _player: PlayerId,
        _power: PowerKind,
        _level: u8,
        _target: CastTarget,
    ) -> bool {
        false
    }
}

/// Host without scripts; every scripted request is refused.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoScripts;

impl ScriptHost for NoScripts {}
