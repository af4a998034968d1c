//! Game entity ids and central card storage
//!
//! Ids are simple contiguous integers: human readable in logs and dense for
//! storage. They are stable throughout a game - entities never get
//! deallocated, even when a token ceases to exist (its zone membership is
//! dropped, its record stays).

use crate::EngineError;
use crate::Result;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Id of a card-like object (real card, token, or a transformed face).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CardId(u32);

impl CardId {
    pub fn new(id: u32) -> Self {
        CardId(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Id of one of the two players (0 or 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(u32);

impl PlayerId {
    pub fn new(id: u32) -> Self {
        PlayerId(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn as_index(&self) -> usize {
        self.0 as usize
    }

    /// The other player in a two-player game.
    pub fn opponent(&self) -> PlayerId {
        PlayerId(1 - self.0)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Central storage for all cards in a game
///
/// Fast lookup by [`CardId`] via FxHashMap (integer keys hash cheaply).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityStore<T> {
    entities: FxHashMap<CardId, T>,
    next_id: u32,
}

impl<T> EntityStore<T> {
    pub fn new() -> Self {
        EntityStore {
            entities: FxHashMap::default(),
            next_id: 0,
        }
    }

    /// Generate a new unique CardId
    pub fn next_id(&mut self) -> CardId {
        let id = CardId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert an entity with a specific ID
    pub fn insert(&mut self, id: CardId, entity: T) {
        self.entities.insert(id, entity);
    }

    /// Get an entity by ID
    pub fn get(&self, id: CardId) -> Result<&T> {
        self.entities
            .get(&id)
            .ok_or(EngineError::EntityNotFound(id.as_u32()))
    }

    /// Get a mutable reference to an entity
    pub fn get_mut(&mut self, id: CardId) -> Result<&mut T> {
        self.entities
            .get_mut(&id)
            .ok_or(EngineError::EntityNotFound(id.as_u32()))
    }

    /// Check if an entity exists
    pub fn contains(&self, id: CardId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Iterate over all entities
    pub fn iter(&self) -> impl Iterator<Item = (&CardId, &T)> {
        self.entities.iter()
    }

    /// Get count of entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl<T> Default for EntityStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
