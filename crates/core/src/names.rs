// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CVCV name allocation.
//!
//! Instance names are 4-letter consonant-vowel-consonant-vowel words.
//! A curated "gold" subset is preferred via softmax sampling with
//! temperature, so the pretty names come up often without being
//! monopolised. Candidates within Hamming distance 1 of a live name are
//! rejected to keep names visually distinct; so are tokens that collide
//! with CLI verbs.
//!
//! The same deterministic pool backs [`hash_to_name`], which maps arbitrary
//! strings (device UUIDs) to a stable 4-letter word.

use rand::Rng;
use sha2::{Digest, Sha256};

const CONSONANTS: &[u8] = b"bdfgjklmnprstvz";
const VOWELS: &[u8] = b"aeiou";

/// Hand-picked names that read well; sampled preferentially.
const GOLD: &[&str] = &[
    "luna", "nova", "veki", "nora", "kivo", "mira", "zola", "juno", "rive", "tala",
    "suki", "remo", "vega", "nilo", "sage", "kite", "lira", "doze", "peri", "moto",
    "zuri", "neva", "fido", "gala", "biru", "kona", "lumo", "pika", "rafa", "timo",
];

/// Tokens that would collide with the CLI surface or read as directives.
const BANNED: &[&str] = &[
    "send", "stop", "kill", "list", "help", "show", "logs", "init", "exit",
    "self", "tags", "from", "...",
];

/// Softmax temperature; lower values favour gold names more strongly.
const TEMPERATURE: f64 = 0.6;

/// Hamming distance between two equal-length ASCII names.
fn hamming(a: &str, b: &str) -> usize {
    a.bytes().zip(b.bytes()).filter(|(x, y)| x != y).count()
}

/// Aesthetic score for one candidate. Gold names dominate; repetition and
/// near-rhymes score down.
fn score(name: &str) -> f64 {
    let b = name.as_bytes();
    let mut s = 0.0;
    if GOLD.contains(&name) {
        s += 3.0;
    }
    // Distinct letters read better than "dada"/"nono" shapes
    if b[0] != b[2] {
        s += 0.5;
    }
    if b[1] != b[3] {
        s += 0.5;
    }
    // Slight penalty for the rarer consonants at word start
    if matches!(b[0], b'z' | b'j') {
        s -= 0.25;
    }
    s
}

/// The deterministic candidate pool: every CVCV word plus the gold set,
/// minus banned tokens. Order is stable across processes (required by
/// [`hash_to_name`]).
fn pool() -> Vec<String> {
    let mut names = Vec::with_capacity(CONSONANTS.len() * VOWELS.len() * CONSONANTS.len() * VOWELS.len());
    for &c1 in CONSONANTS {
        for &v1 in VOWELS {
            for &c2 in CONSONANTS {
                for &v2 in VOWELS {
                    let name = String::from_utf8(vec![c1, v1, c2, v2]).unwrap_or_default();
                    if !BANNED.contains(&name.as_str()) {
                        names.push(name);
                    }
                }
            }
        }
    }
    for &gold in GOLD {
        if !names.iter().any(|n| n == gold) && !BANNED.contains(&gold) {
            names.push(gold.to_string());
        }
    }
    names
}

/// Map an arbitrary string to a stable pool name (device short IDs).
pub fn hash_to_name(s: &str) -> String {
    let digest = Sha256::digest(s.as_bytes());
    let mut idx = 0u64;
    for &byte in digest.iter().take(8) {
        idx = (idx << 8) | byte as u64;
    }
    let names = pool();
    names[(idx % names.len() as u64) as usize].clone()
}

/// Errors from name allocation
#[derive(Debug, thiserror::Error)]
pub enum NameError {
    #[error("name pool exhausted")]
    Exhausted,
    #[error("invalid name: {0}")]
    Invalid(String),
}

/// Allocates unique instance names from the CVCV pool.
pub struct NameAllocator {
    names: Vec<String>,
}

impl Default for NameAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl NameAllocator {
    pub fn new() -> Self {
        Self { names: pool() }
    }

    /// Validate a user-supplied name (`start --name`): lowercase
    /// alphanumeric plus `_`, not a banned token.
    pub fn validate(&self, name: &str) -> Result<(), NameError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(NameError::Invalid(name.to_string()));
        }
        if BANNED.contains(&name) {
            return Err(NameError::Invalid(name.to_string()));
        }
        Ok(())
    }

    fn available<'a>(&'a self, live: &'a [String]) -> impl Iterator<Item = &'a String> {
        self.names.iter().filter(move |candidate| {
            !live.iter().any(|taken| {
                taken == *candidate
                    || (taken.len() == candidate.len() && hamming(taken, candidate) <= 1)
            })
        })
    }

    /// Pick a fresh name, softmax-sampled by score, avoiding everything in
    /// `live` (and near-collisions with it). Falls back to a greedy scan if
    /// sampling fails to land.
    pub fn allocate<R: Rng>(&self, live: &[String], rng: &mut R) -> Result<String, NameError> {
        let candidates: Vec<&String> = self.available(live).collect();
        if candidates.is_empty() {
            return Err(NameError::Exhausted);
        }

        // Softmax over scores; subtract the max for numeric stability
        let scores: Vec<f64> = candidates.iter().map(|n| score(n)).collect();
        let max = scores.iter().cloned().fold(f64::MIN, f64::max);
        let weights: Vec<f64> = scores.iter().map(|s| ((s - max) / TEMPERATURE).exp()).collect();
        let total: f64 = weights.iter().sum();

        if total.is_finite() && total > 0.0 {
            let mut target = rng.random::<f64>() * total;
            for (candidate, weight) in candidates.iter().zip(&weights) {
                target -= weight;
                if target <= 0.0 {
                    return Ok((*candidate).clone());
                }
            }
        }

        // Greedy fallback: best-scoring available name
        candidates
            .into_iter()
            .max_by(|a, b| score(a).total_cmp(&score(b)))
            .cloned()
            .ok_or(NameError::Exhausted)
    }
}

/// Whether a name has the pool shape (CVCV word or gold name). Allocation
/// only produces pool members; this is the externally checkable predicate.
pub fn is_pool_shape(name: &str) -> bool {
    let b = name.as_bytes();
    let cvcv = b.len() == 4
        && CONSONANTS.contains(&b[0])
        && VOWELS.contains(&b[1])
        && CONSONANTS.contains(&b[2])
        && VOWELS.contains(&b[3]);
    cvcv || GOLD.contains(&name)
}

#[cfg(test)]
#[path = "names_tests.rs"]
mod tests;
