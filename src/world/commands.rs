use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    core::{body::BodySpec, collider::ColliderSpec, entity::EntityId},
    error::{PhysicsError, Result},
};

use super::World;

/// A world edit requested from outside the simulation thread.
///
/// Objects are addressed by name since handles of queued spawns are not
/// known to the sender.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldCommand {
    SpawnBody(BodySpec),
    DespawnBody(String),
    SpawnCollider(ColliderSpec),
    DespawnCollider(String),
    Connect { a: String, b: String, stiffness: f64 },
    Disconnect { a: String, b: String },
}

type Pending = Arc<Mutex<Vec<WorldCommand>>>;

/// Receiving end of the command channel, owned by the simulation thread.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: Pending,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sender(&self) -> CommandSender {
        CommandSender {
            pending: self.pending.clone(),
        }
    }

    /// Takes every queued command, oldest first.
    pub fn drain(&self) -> Vec<WorldCommand> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

/// Cloneable handle for enqueueing commands from any thread.
#[derive(Debug, Clone)]
pub struct CommandSender {
    pending: Pending,
}

impl CommandSender {
    pub fn send(&self, command: WorldCommand) {
        self.pending.lock().push(command);
    }
}

impl World {
    pub fn apply_command(&mut self, command: WorldCommand) -> Result<()> {
        match command {
            WorldCommand::SpawnBody(spec) => self.spawn_body(spec).map(|_| ()),
            WorldCommand::DespawnBody(name) => {
                let id = self
                    .body_by_name(&name)
                    .ok_or(PhysicsError::UnknownBody(name))?;
                self.despawn_body(id);
                Ok(())
            }
            WorldCommand::SpawnCollider(spec) => self.spawn_collider(spec).map(|_| ()),
            WorldCommand::DespawnCollider(name) => {
                if let Some(id) = self.collider_by_name(&name) {
                    self.despawn_collider(id);
                }
                Ok(())
            }
            WorldCommand::Connect { a, b, stiffness } => {
                let (a, b) = (self.named_entity(a)?, self.named_entity(b)?);
                self.connect(a, b, stiffness).map(|_| ())
            }
            WorldCommand::Disconnect { a, b } => {
                let (a, b) = (self.named_entity(a)?, self.named_entity(b)?);
                self.disconnect(a, b);
                Ok(())
            }
        }
    }

    /// Applies every queued command in order. Failures are logged and skipped.
    pub fn apply_commands(&mut self, queue: &CommandQueue) -> usize {
        let commands = queue.drain();
        let count = commands.len();
        for command in commands {
            if let Err(err) = self.apply_command(command) {
                log::warn!("dropping world command: {err}");
            }
        }
        count
    }

    fn named_entity(&self, name: String) -> Result<EntityId> {
        self.entity_by_name(&name)
            .ok_or(PhysicsError::UnknownEntity(name))
    }
}
