//! End-of-level sound effects.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ClockError;

/// A playable sound effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundEffect {
    /// Sound identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// What it sounds like.
    pub description: String,
    /// Asset path the viewer plays.
    pub path: String,
}

/// Looks up sound effects by id.
pub trait SoundEffectFetcher: Send + Sync + fmt::Debug {
    /// Returns the sound effect with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidRequest`] for an unknown id.
    fn fetch_sound_effect(&self, id: i64) -> Result<SoundEffect, ClockError>;
}

/// The sound effects shipped with the server.
#[derive(Debug, Clone)]
pub struct BuiltinSounds {
    effects: Vec<SoundEffect>,
}

impl BuiltinSounds {
    /// Creates the built-in catalogue.
    #[must_use]
    pub fn new() -> Self {
        let effect = |id: i64, name: &str, description: &str, path: &str| SoundEffect {
            id,
            name: name.to_string(),
            description: description.to_string(),
            path: path.to_string(),
        };
        Self {
            effects: vec![
                effect(1, "School Bell", "Ding, ding, ding", "/fs/SchoolBell.mp3"),
                effect(
                    2,
                    "Inchy",
                    "inchworm sound effect from Millipede",
                    "/fs/inchy.mp3",
                ),
                effect(
                    3,
                    "Sax A-D Fanfare",
                    "alto sax playing A-D fanfare",
                    "/fs/alto-sax-a-d-fanfare.mp3",
                ),
            ],
        }
    }
}

impl Default for BuiltinSounds {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundEffectFetcher for BuiltinSounds {
    fn fetch_sound_effect(&self, id: i64) -> Result<SoundEffect, ClockError> {
        self.effects
            .iter()
            .find(|effect| effect.id == id)
            .cloned()
            .ok_or_else(|| ClockError::InvalidRequest(format!("no such sound effect id {id}")))
    }
}
