//! Identifier generators.
//!
//! Ids only need to be unique within one plan. Callers draw candidates through
//! [`fresh_id`], which skips ids already taken.

use rand::{Rng, distributions::Alphanumeric};

pub trait IdGenerator {
    fn next_id(&mut self) -> String;
}

/// Short random lowercase alphanumeric ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

const RANDOM_ID_LEN: usize = 8;

impl IdGenerator for RandomIds {
    fn next_id(&mut self) -> String {
        let mut rng = rand::thread_rng();
        std::iter::repeat_with(|| rng.sample(Alphanumeric))
            .map(char::from)
            .take(RANDOM_ID_LEN)
            .collect::<String>()
            .to_lowercase()
    }
}

/// Deterministic `<prefix>-<n>` ids, starting at 1.
#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> String {
        let id = format!("{}-{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

/// Draw ids from `ids` until one is not `taken`.
pub fn fresh_id(ids: &mut dyn IdGenerator, taken: impl Fn(&str) -> bool) -> String {
    loop {
        let candidate = ids.next_id();
        if !taken(&candidate) {
            return candidate;
        }
    }
}
