//! Per-request cache of evaluated scope conditions.
//!
//! # Responsibilities
//! - Remember the result of each scope condition for the current request
//! - Drop results of one domain when the input they depend on changes
//!
//! # Design Decisions
//! - Owned by the request state, never shared between requests
//! - Keyed by (domain, condition id); condition ids are assigned when the
//!   scope resolver is compiled

use std::collections::HashMap;

/// What a cached decision was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheDomain {
    Host,
    Path,
    /// Decisions derived from the remote address.
    RemoteIp,
    /// Decisions derived from the request scheme.
    Scheme,
}

/// Evaluated condition results for a single request.
#[derive(Debug, Default)]
pub struct ConditionCache {
    entries: HashMap<(CacheDomain, usize), bool>,
}

impl ConditionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, domain: CacheDomain, id: usize) -> Option<bool> {
        self.entries.get(&(domain, id)).copied()
    }

    /// Return the cached result, evaluating and storing it on a miss.
    pub fn get_or_eval(
        &mut self,
        domain: CacheDomain,
        id: usize,
        eval: impl FnOnce() -> bool,
    ) -> bool {
        *self.entries.entry((domain, id)).or_insert_with(eval)
    }

    /// Forget every decision in `domain`.
    pub fn invalidate(&mut self, domain: CacheDomain) {
        self.entries.retain(|(d, _), _| *d != domain);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
