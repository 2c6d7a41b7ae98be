// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message addressing: `@target[:DEVICE]` parsing and fan-out resolution.
//!
//! Resolution rules, in order:
//! 1. `@name:DEVICE` — exact cross-device pair; delivered only when the
//!    relay is enabled, otherwise dropped with a warning.
//! 2. `@name` — live instance with matching base name (preferred) plus any
//!    live instance whose full (tag-prefixed) name matches exactly.
//! 3. `@api-` — trailing dash addresses every live instance with that tag.
//! 4. `@api` — when nothing matched exactly and the token names an existing
//!    tag, expands to that tag's instances. A `_` in a candidate name
//!    blocks prefix expansion, so `@luna` never matches `luna_reviewer_1`.
//! 5. No targets — broadcast to all live participants.

use crate::event::Scope;
use thiserror::Error;

/// Errors from target parsing
#[derive(Debug, Error, PartialEq)]
pub enum AddressError {
    #[error("empty target '@'")]
    EmptyTarget,
    #[error("malformed target '{0}'")]
    Malformed(String),
}

/// One parsed `@token[:DEVICE]`
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTarget {
    /// Token as written, without the leading `@`
    pub raw: String,
    /// Name portion (before any `:DEVICE` suffix)
    pub name: String,
    /// Device short-id suffix, upper-cased
    pub device: Option<String>,
}

/// A live instance as the resolver sees it
#[derive(Debug, Clone, PartialEq)]
pub struct LiveName {
    pub base: String,
    pub full: String,
    pub tag: Option<String>,
}

impl LiveName {
    pub fn new(base: impl Into<String>, tag: Option<&str>) -> Self {
        let base = base.into();
        let full = match tag {
            Some(t) => format!("{}-{}", t, base),
            None => base.clone(),
        };
        Self {
            base,
            full,
            tag: tag.map(str::to_string),
        }
    }
}

/// Outcome of resolving a target list against the live set
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resolution {
    pub scope: Scope,
    /// Resolved full names, ordered, deduplicated
    pub delivered_to: Vec<String>,
    /// Raw tokens as written (for subscription filtering)
    pub mentions: Vec<String>,
    /// Human-readable warnings (unmatched targets, relay-disabled drops)
    pub warnings: Vec<String>,
}

/// Parse `@`-prefixed tokens. Tokens without `@` are rejected so the CLI
/// can distinguish targets from message words.
pub fn parse_targets(tokens: &[String]) -> Result<Vec<ParsedTarget>, AddressError> {
    let mut targets = Vec::with_capacity(tokens.len());
    for token in tokens {
        let Some(body) = token.strip_prefix('@') else {
            return Err(AddressError::Malformed(token.clone()));
        };
        if body.is_empty() {
            return Err(AddressError::EmptyTarget);
        }
        let (name, device) = match body.split_once(':') {
            Some((name, device)) if !device.is_empty() => {
                (name.to_string(), Some(device.to_ascii_uppercase()))
            }
            Some(_) => return Err(AddressError::Malformed(token.clone())),
            None => (body.to_string(), None),
        };
        if name.is_empty() {
            return Err(AddressError::EmptyTarget);
        }
        targets.push(ParsedTarget {
            raw: body.to_string(),
            name,
            device,
        });
    }
    Ok(targets)
}

/// Resolve parsed targets to the delivered set.
///
/// `live` is the current participating set (full names unique). An empty
/// target list is a broadcast.
pub fn resolve_targets(
    targets: &[ParsedTarget],
    live: &[LiveName],
    relay_enabled: bool,
) -> Resolution {
    if targets.is_empty() {
        return Resolution {
            scope: Scope::Broadcast,
            delivered_to: live.iter().map(|l| l.full.clone()).collect(),
            mentions: Vec::new(),
            warnings: Vec::new(),
        };
    }

    let mut resolution = Resolution {
        scope: Scope::Mentions,
        ..Default::default()
    };

    for target in targets {
        resolution.mentions.push(target.raw.clone());

        if let Some(device) = &target.device {
            // Cross-device pair: deliverable only through the relay
            if relay_enabled {
                push_unique(
                    &mut resolution.delivered_to,
                    format!("{}:{}", target.name, device),
                );
            } else {
                resolution
                    .warnings
                    .push(format!("@{} dropped: relay is disabled", target.raw));
            }
            continue;
        }

        let exact: Vec<&LiveName> = live
            .iter()
            .filter(|l| l.base == target.name || l.full == target.name)
            .collect();
        if !exact.is_empty() {
            for l in exact {
                push_unique(&mut resolution.delivered_to, l.full.clone());
            }
            continue;
        }

        // `@api-`: explicit tag form
        if let Some(tag) = target.name.strip_suffix('-') {
            let mut matched = false;
            for l in live.iter().filter(|l| l.tag.as_deref() == Some(tag)) {
                push_unique(&mut resolution.delivered_to, l.full.clone());
                matched = true;
            }
            if !matched {
                resolution
                    .warnings
                    .push(format!("@{} matched no live instances", target.raw));
            }
            continue;
        }

        // Prefix expansion: tag match or name prefix, blocked by `_` in the
        // candidate (subagent names are never reachable by prefix).
        let mut matched = false;
        for l in live {
            let by_tag = l.tag.as_deref() == Some(target.name.as_str());
            let by_prefix = l.full.starts_with(target.name.as_str()) && !l.full.contains('_');
            if by_tag || by_prefix {
                push_unique(&mut resolution.delivered_to, l.full.clone());
                matched = true;
            }
        }
        if !matched {
            resolution
                .warnings
                .push(format!("@{} matched no live instances", target.raw));
        }
    }

    resolution
}

fn push_unique(list: &mut Vec<String>, name: String) {
    if !list.contains(&name) {
        list.push(name);
    }
}

#[cfg(test)]
#[path = "address_tests.rs"]
mod tests;
