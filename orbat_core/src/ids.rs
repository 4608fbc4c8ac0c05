use std::collections::HashSet;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::model::EntityId;

/// URL-safe alphabet shared with nanoid-style identifiers.
const URL_ALPHABET: &[u8; 64] =
    b"useandom-26T198340PX75pxJACKVERYMINDBUSHWOLF_GQZbfghjklqvwyzrict";

pub const DEFAULT_ID_LENGTH: usize = 21;

/// Issues random identifiers that never repeat within one generator.
///
/// Ids read from an input document are [`reserve`](Self::reserve)d first so a
/// freshly drawn id can never shadow one that already exists.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    rng: SmallRng,
    length: usize,
    issued: HashSet<EntityId>,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ID_LENGTH)
    }
}

impl IdGenerator {
    pub fn new(length: usize) -> Self {
        Self {
            rng: SmallRng::from_entropy(),
            length: length.max(1),
            issued: HashSet::new(),
        }
    }

    /// Deterministic generator for tests and reproducible fixtures.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            length: DEFAULT_ID_LENGTH,
            issued: HashSet::new(),
        }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length.max(1);
        self
    }

    /// Record an externally supplied id. Returns `false` if it was already known.
    pub fn reserve(&mut self, id: &str) -> bool {
        self.issued.insert(id.to_string())
    }

    pub fn is_known(&self, id: &str) -> bool {
        self.issued.contains(id)
    }

    pub fn next_id(&mut self) -> EntityId {
        loop {
            let candidate: String = (0..self.length)
                .map(|_| URL_ALPHABET[self.rng.gen_range(0..URL_ALPHABET.len())] as char)
                .collect();
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Keep a present, non-empty id or draw a new one.
    pub fn ensure(&mut self, id: Option<EntityId>) -> EntityId {
        match id {
            Some(id) if !id.is_empty() => {
                self.issued.insert(id.clone());
                id
            }
            _ => self.next_id(),
        }
    }
}
