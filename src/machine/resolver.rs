//! Hierarchy resolution: auto-descent, event bubbling, and path deltas.
//!
//! Everything here is a pure function of (table, active paths, event,
//! context) - no scheduling, no mutation. The engine composes these to
//! turn a resolved transition into an exact exit/entry plan:
//!
//! - [`resolve`] walks an active path leaf-to-root looking for a handler
//!   (local handlers override ancestors).
//! - [`domain_index`] finds the deepest node that stays active across a
//!   transition; everything strictly below it on the source side is
//!   exited and the target branch below it is entered.
//! - [`exit_set`] / [`entry_set`] expand that into ordered hook plans,
//!   fanning out into every child region when a parallel node is entered.

use crate::core::{EventId, StateId};
use crate::table::{NodeKind, StateKind, TransitionSpec, TransitionTable};
use std::collections::HashSet;

/// Outcome of bubbling an event along one active path.
pub(crate) enum Resolution<S: StateId, C, E: EventId> {
    /// A node on the path handles the event and its guard passes.
    Matched(TransitionSpec<S, C, E>),
    /// At least one node declares the event but every guard failed.
    Blocked,
    /// No node on the path declares the event at all.
    Undeclared,
}

/// Walk `path` from the leaf toward the root looking for a transition on
/// `event` whose guard passes against `context`.
pub(crate) fn resolve<S: StateId, C, E: EventId>(
    table: &TransitionTable<S, C, E>,
    path: &[S],
    event: E,
    context: &C,
) -> Resolution<S, C, E> {
    let mut declared = false;
    for &state in path.iter().rev() {
        if let Some(spec) = table.node(state).transitions.get(&event) {
            declared = true;
            let passes = spec.guard.as_ref().map_or(true, |g| g.check(context));
            if passes {
                return Resolution::Matched(spec.clone());
            }
        }
    }
    if declared {
        Resolution::Blocked
    } else {
        Resolution::Undeclared
    }
}

/// Index into the source path of the transition domain: the deepest node
/// that remains active. `-1` means nothing survives (the root itself is
/// re-entered).
///
/// A target on the source path (self- or ancestor-target) uses the
/// target's parent as the domain, so the target is exited and re-entered;
/// re-entry re-runs hooks and re-arms transients.
pub(crate) fn domain_index<S: StateId, C, E: EventId>(
    table: &TransitionTable<S, C, E>,
    source_path: &[S],
    target: S,
) -> isize {
    let target_path = table.path_to(target);
    let mut common = 0;
    while common < source_path.len()
        && common < target_path.len()
        && source_path[common] == target_path[common]
    {
        common += 1;
    }
    if common == target_path.len() {
        common as isize - 2
    } else {
        common as isize - 1
    }
}

/// Collect the states exited by a transition with the given domain, in
/// exit order (leaf first), plus the indices of the active paths being
/// replaced.
///
/// Every active path running through the domain is affected; when the
/// domain sits above a parallel node this exits all of its regions.
pub(crate) fn exit_set<S: StateId>(
    config: &[Vec<S>],
    source_path: &[S],
    domain: isize,
) -> (Vec<S>, Vec<usize>) {
    let mut replaced = Vec::new();
    let mut exited: Vec<(S, usize)> = Vec::new();
    let mut seen = HashSet::new();

    for (index, path) in config.iter().enumerate() {
        let affected = if domain < 0 {
            true
        } else {
            let d = domain as usize;
            path.len() > d && path[..=d] == source_path[..=d]
        };
        if affected {
            replaced.push(index);
            let from = (domain + 1) as usize;
            for (depth, &state) in path.iter().enumerate().skip(from) {
                if seen.insert(state) {
                    exited.push((state, depth));
                }
            }
        }
    }

    exited.sort_by(|a, b| b.1.cmp(&a.1));
    (exited.into_iter().map(|(state, _)| state).collect(), replaced)
}

/// Compute the states entered below the domain on the way to `target`,
/// in entry order (top-down), along with the resulting active leaf paths
/// (full paths from the root).
///
/// Covers auto-descent through initial children, fan-out into every
/// region of entered parallel nodes, and re-entry of the domain's other
/// regions when the domain itself is parallel.
pub(crate) fn entry_set<S: StateId, C, E: EventId>(
    table: &TransitionTable<S, C, E>,
    domain: isize,
    target: S,
) -> (Vec<S>, Vec<Vec<S>>) {
    let target_path = table.path_to(target);
    let start = (domain + 1) as usize;
    let mut entry: Vec<S> = target_path[start..].to_vec();
    let mut paths: Vec<Vec<S>> = Vec::new();

    expand(table, target, target_path.clone(), &mut entry, &mut paths);

    for i in start..target_path.len().saturating_sub(1) {
        enter_sibling_regions(table, &target_path, i, &mut entry, &mut paths);
    }
    if domain >= 0 {
        enter_sibling_regions(table, &target_path, domain as usize, &mut entry, &mut paths);
    }

    (entry, paths)
}

/// Entry order and active paths for entering the root at construction.
pub(crate) fn initial_configuration<S: StateId, C, E: EventId>(
    table: &TransitionTable<S, C, E>,
) -> (Vec<S>, Vec<Vec<S>>) {
    entry_set(table, -1, table.root())
}

fn enter_sibling_regions<S: StateId, C, E: EventId>(
    table: &TransitionTable<S, C, E>,
    target_path: &[S],
    index: usize,
    entry: &mut Vec<S>,
    paths: &mut Vec<Vec<S>>,
) {
    if table.kind(target_path[index]) != Some(StateKind::Parallel) {
        return;
    }
    let taken = target_path[index + 1];
    let children = table.node(target_path[index]).children.clone();
    for child in children {
        if child != taken {
            entry.push(child);
            let mut prefix = target_path[..=index].to_vec();
            prefix.push(child);
            expand(table, child, prefix, entry, paths);
        }
    }
}

fn expand<S: StateId, C, E: EventId>(
    table: &TransitionTable<S, C, E>,
    state: S,
    prefix: Vec<S>,
    entry: &mut Vec<S>,
    paths: &mut Vec<Vec<S>>,
) {
    let node = table.node(state);
    match node.kind {
        NodeKind::Atomic => paths.push(prefix),
        NodeKind::Compound { initial } => {
            entry.push(initial);
            let mut next = prefix;
            next.push(initial);
            expand(table, initial, next, entry, paths);
        }
        NodeKind::Parallel => {
            for child in node.children.clone() {
                entry.push(child);
                let mut next = prefix.clone();
                next.push(child);
                expand(table, child, next, entry, paths);
            }
        }
    }
}
