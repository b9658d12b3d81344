//! The dependency graph engine.
//!
//! [`Engine`] is the sole owner of the graph state: the set of indexed packages, the forward
//! dependency map (package → the packages it depends on) and the reverse dependency map
//! (package → the packages that depend on it). It exposes three operations —
//! [`Engine::index_package`], [`Engine::remove_package`] and [`Engine::query_package`] — each
//! executed atomically under one `tokio::sync::RwLock`, plus a read-only [`Engine::stats`]
//! snapshot used by the admin surface.
//!
//! The following invariants hold at the boundary of every successful mutating operation:
//!
//! 1. `p ∈ indexed ⇔ p ∈ forward`.
//! 2. `q ∈ forward[p] ⇔ p ∈ reverse[q]`.
//! 3. `reverse[q]` is never present as an empty set.
//! 4. For every `p ∈ indexed`, every `q ∈ forward[p]` is itself in `indexed`.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

/// The outcome of an [`Engine::index_package`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The package was indexed (or re-indexed).
    Indexed,
    /// At least one declared dependency was not already indexed; nothing was mutated.
    MissingDependency,
}

/// The outcome of an [`Engine::remove_package`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The package was indexed and has been removed.
    Removed,
    /// The package was not indexed; removal is treated as an idempotent success.
    NotIndexed,
    /// The package is indexed but at least one other indexed package depends on it.
    Blocked,
}

/// A point-in-time view of the graph's size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Number of currently indexed packages.
    pub indexed: usize,
    /// Number of packages with a non-empty forward edge set (always equal to `indexed`).
    pub forward_edges: usize,
    /// Number of packages that are depended upon by at least one other package.
    pub reverse_edges: usize,
}

#[derive(Debug, Default)]
struct GraphState {
    indexed: HashSet<String>,
    forward: HashMap<String, HashSet<String>>,
    reverse: HashMap<String, HashSet<String>>,
}

/// The shared, mutating dependency graph.
///
/// Cheaply cloneable: clone and share an `Arc<Engine>` rather than the `Engine` itself, following
/// the same "construct once at startup, share behind an `Arc`" shape as the rest of the service.
#[derive(Debug, Default)]
pub struct Engine {
    state: RwLock<GraphState>,
}

impl Engine {
    /// Constructs a fresh, empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes `package` with dependency set `deps`.
    ///
    /// Fails (returning [`IndexOutcome::MissingDependency`], with no mutation whatsoever) if any
    /// distinct dependency in `deps` is not already indexed. Otherwise, replaces `package`'s
    /// dependency set with `deps` in full — a prior dependency absent from the new list is
    /// released — and marks `package` as indexed.
    ///
    /// Self-dependency (`package` appearing in its own `deps`) is checked against membership in
    /// `indexed` as observed at entry, before any mutation: if `package` is already indexed, a
    /// re-index that lists `package` among its own dependencies succeeds.
    pub async fn index_package(&self, package: &str, deps: &[String]) -> IndexOutcome {
        let mut state = self.state.write().await;

        for dep in deps {
            if !state.indexed.contains(dep) {
                return IndexOutcome::MissingDependency;
            }
        }

        let new_deps: HashSet<String> = deps.iter().cloned().collect();
        let old_deps = state.forward.remove(package).unwrap_or_default();

        for released in old_deps.difference(&new_deps) {
            if let Some(dependents) = state.reverse.get_mut(released) {
                dependents.remove(package);
                if dependents.is_empty() {
                    state.reverse.remove(released);
                }
            }
        }

        for acquired in new_deps.difference(&old_deps) {
            state
                .reverse
                .entry(acquired.clone())
                .or_default()
                .insert(package.to_owned());
        }

        state.forward.insert(package.to_owned(), new_deps);
        state.indexed.insert(package.to_owned());

        IndexOutcome::Indexed
    }

    /// Removes `package` from the index.
    ///
    /// Returns [`RemoveOutcome::NotIndexed`] (an idempotent success, no mutation) if `package`
    /// isn't indexed, [`RemoveOutcome::Blocked`] (no mutation) if another indexed package still
    /// depends on it, or [`RemoveOutcome::Removed`] after releasing its forward edges.
    pub async fn remove_package(&self, package: &str) -> RemoveOutcome {
        let mut state = self.state.write().await;

        if !state.indexed.contains(package) {
            return RemoveOutcome::NotIndexed;
        }

        if state
            .reverse
            .get(package)
            .is_some_and(|dependents| !dependents.is_empty())
        {
            return RemoveOutcome::Blocked;
        }

        state.indexed.remove(package);
        if let Some(deps) = state.forward.remove(package) {
            for dep in deps {
                if let Some(dependents) = state.reverse.get_mut(&dep) {
                    dependents.remove(package);
                    if dependents.is_empty() {
                        state.reverse.remove(&dep);
                    }
                }
            }
        }
        state.reverse.remove(package);

        RemoveOutcome::Removed
    }

    /// Reports whether `package` is currently indexed.
    pub async fn query_package(&self, package: &str) -> bool {
        let state = self.state.read().await;
        state.indexed.contains(package)
    }

    /// Takes a consistent snapshot of the graph's size.
    pub async fn stats(&self) -> Stats {
        let state = self.state.read().await;
        Stats {
            indexed: state.indexed.len(),
            forward_edges: state.forward.len(),
            reverse_edges: state.reverse.len(),
        }
    }
}
