//! The source-manager collaborator contract (spec §6).
//!
//! The core never parses or owns source text; it only carries an opaque
//! [`SourceLocation`] on every AST/GIL entity and, for diagnostics, asks a
//! collaborator to resolve it to a human-readable position. Production
//! callers plug in their own lexer/parser's source manager; this crate
//! ships a minimal in-memory implementation for tests and for callers that
//! don't otherwise need one (e.g. GIL printed straight from a
//! programmatically built AST).

use std::fmt;

/// An opaque handle into a collaborator-owned source manager. Carries no
/// semantics of its own beyond equality/ordering and a sentinel "detached"
/// value for synthesized nodes (e.g. implicit casts) that have no source
/// text to point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SourceLocation(u32);

impl SourceLocation {
    pub const DETACHED: SourceLocation = SourceLocation(u32::MAX);

    pub fn from_raw(offset: u32) -> Self {
        SourceLocation(offset)
    }

    pub fn is_detached(self) -> bool {
        self == Self::DETACHED
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_detached() {
            write!(f, "<synthesized>")
        } else {
            write!(f, "@{}", self.0)
        }
    }
}

/// A resolved, human-presentable position. Rendering is entirely on the
/// diagnostic collaborator (spec §6); this is just the data it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPosition {
    pub buffer_name: String,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for ResolvedPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.buffer_name, self.line, self.column)
    }
}

/// Given an opaque [`SourceLocation`], yields buffer name, line, and
/// column. The core uses this only for diagnostics (spec §6).
pub trait SourceManager {
    fn resolve(&self, location: SourceLocation) -> Option<ResolvedPosition>;
}

/// A source manager backed by a flat table of (buffer, line, column)
/// triples, indexed by the raw offset of a [`SourceLocation`]. Good enough
/// for tests and for embedders that already resolved positions upstream.
#[derive(Debug, Default)]
pub struct TableSourceManager {
    positions: Vec<ResolvedPosition>,
}

impl TableSourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new position and returns the [`SourceLocation`] that
    /// resolves to it.
    pub fn push(&mut self, buffer_name: impl Into<String>, line: u32, column: u32) -> SourceLocation {
        let loc = SourceLocation::from_raw(self.positions.len() as u32);
        self.positions.push(ResolvedPosition { buffer_name: buffer_name.into(), line, column });
        loc
    }
}

impl SourceManager for TableSourceManager {
    fn resolve(&self, location: SourceLocation) -> Option<ResolvedPosition> {
        if location.is_detached() {
            return None;
        }
        self.positions.get(location.0 as usize).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_locations_do_not_resolve() {
        let mgr = TableSourceManager::new();
        assert_eq!(mgr.resolve(SourceLocation::DETACHED), None);
    }

    #[test]
    fn pushed_locations_round_trip() {
        let mut mgr = TableSourceManager::new();
        let loc = mgr.push("main.glu", 3, 8);
        assert_eq!(mgr.resolve(loc), Some(ResolvedPosition { buffer_name: "main.glu".into(), line: 3, column: 8 }));
    }
}
