//! Builder for constructing validated transition tables.

use crate::builder::error::ConfigError;
use crate::builder::state::{ActionRef, GuardRef, StateSpec};
use crate::core::{Action, EventId, Guard, StateId};
use crate::table::{Node, NodeKind, StateKind, TransientSpec, TransitionSpec, TransitionTable};
use std::collections::{HashMap, HashSet, VecDeque};

/// Builder for a [`TransitionTable`] with a fluent API.
///
/// Collects state declarations plus a registry of named guards and
/// actions, then validates everything in [`TableBuilder::build`]. All
/// configuration errors surface at construction time; a built table can
/// be trusted by the engine without further checks.
pub struct TableBuilder<S: StateId, C, E: EventId> {
    states: Vec<StateSpec<S, C, E>>,
    guards: HashMap<String, Guard<C>>,
    actions: HashMap<String, Action<C, E>>,
}

impl<S: StateId, C, E: EventId> TableBuilder<S, C, E> {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            guards: HashMap::new(),
            actions: HashMap::new(),
        }
    }

    /// Declare a state node.
    pub fn state(mut self, spec: StateSpec<S, C, E>) -> Self {
        self.states.push(spec);
        self
    }

    /// Register a guard under a name, for use with
    /// [`StateSpec::on_named`].
    pub fn guard<F>(mut self, name: &str, predicate: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.guards.insert(name.to_string(), Guard::new(predicate));
        self
    }

    /// Register an action under a name, for use with
    /// [`StateSpec::on_named`].
    pub fn action<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(C) -> C + Send + Sync + 'static,
    {
        self.actions.insert(name.to_string(), Action::new(f));
        self
    }

    /// Register a pre-built action under a name.
    pub fn action_spec(mut self, name: &str, action: Action<C, E>) -> Self {
        self.actions.insert(name.to_string(), action);
        self
    }

    /// Validate the declarations and produce the immutable table.
    pub fn build(self) -> Result<TransitionTable<S, C, E>, ConfigError> {
        let TableBuilder {
            states,
            guards,
            actions,
        } = self;

        let mut declared: HashSet<S> = HashSet::new();
        for spec in &states {
            if !declared.insert(spec.id) {
                return Err(ConfigError::DuplicateState(spec.id.name().to_string()));
            }
        }

        let mut root: Option<S> = None;
        for spec in &states {
            match spec.parent {
                None => match root {
                    None => root = Some(spec.id),
                    Some(existing) => {
                        return Err(ConfigError::MultipleRoots(
                            existing.name().to_string(),
                            spec.id.name().to_string(),
                        ))
                    }
                },
                Some(parent) => {
                    if !declared.contains(&parent) {
                        return Err(ConfigError::UnknownParent {
                            child: spec.id.name().to_string(),
                            parent: format!("{:?}", parent),
                        });
                    }
                }
            }
        }
        let root = root.ok_or(ConfigError::NoRoot)?;

        let mut children: HashMap<S, Vec<S>> = HashMap::new();
        for spec in &states {
            if let Some(parent) = spec.parent {
                children.entry(parent).or_default().push(spec.id);
            }
        }

        for spec in &states {
            let kids = children.get(&spec.id).map(Vec::as_slice).unwrap_or(&[]);
            match spec.kind {
                StateKind::Atomic => {
                    if !kids.is_empty() {
                        return Err(ConfigError::ChildrenOnAtomic {
                            state: spec.id.name().to_string(),
                        });
                    }
                }
                StateKind::Compound => {
                    let initial = spec.initial.unwrap_or(spec.id);
                    if !kids.contains(&initial) {
                        return Err(ConfigError::InvalidInitialChild {
                            state: spec.id.name().to_string(),
                            child: format!("{:?}", initial),
                        });
                    }
                }
                StateKind::Parallel => {
                    if kids.is_empty() {
                        return Err(ConfigError::EmptyParallel {
                            state: spec.id.name().to_string(),
                        });
                    }
                }
            }
        }

        for spec in &states {
            let mut seen: HashSet<E> = HashSet::new();
            for (event, decl) in &spec.transitions {
                if !seen.insert(*event) {
                    return Err(ConfigError::DuplicateTransition {
                        state: spec.id.name().to_string(),
                        event: event.name().to_string(),
                    });
                }
                if !declared.contains(&decl.target) {
                    return Err(ConfigError::UnknownTarget {
                        state: spec.id.name().to_string(),
                        event: event.name().to_string(),
                        target: format!("{:?}", decl.target),
                    });
                }
            }
            if let Some(transient) = &spec.transient {
                if !declared.contains(&transient.target) {
                    return Err(ConfigError::UnknownTransientTarget {
                        state: spec.id.name().to_string(),
                        target: format!("{:?}", transient.target),
                    });
                }
            }
        }

        // Reachability doubles as cycle detection: a parent-link cycle has
        // no path from the root.
        let mut depth: HashMap<S, usize> = HashMap::new();
        let mut queue = VecDeque::new();
        depth.insert(root, 0);
        queue.push_back(root);
        while let Some(s) = queue.pop_front() {
            let d = depth[&s];
            if let Some(kids) = children.get(&s) {
                for kid in kids {
                    if depth.insert(*kid, d + 1).is_none() {
                        queue.push_back(*kid);
                    }
                }
            }
        }
        for spec in &states {
            if !depth.contains_key(&spec.id) {
                return Err(ConfigError::UnreachableState(spec.id.name().to_string()));
            }
        }

        let resolve_guard = |r: GuardRef<C>| -> Result<Guard<C>, ConfigError> {
            match r {
                GuardRef::Inline(g) => Ok(g),
                GuardRef::Named(name) => guards
                    .get(&name)
                    .cloned()
                    .ok_or(ConfigError::UndeclaredGuard(name)),
            }
        };
        let resolve_action = |r: ActionRef<C, E>| -> Result<Action<C, E>, ConfigError> {
            match r {
                ActionRef::Inline(a) => Ok(a),
                ActionRef::Named(name) => actions
                    .get(&name)
                    .cloned()
                    .ok_or(ConfigError::UndeclaredAction(name)),
            }
        };

        let mut nodes: HashMap<S, Node<S, C, E>> = HashMap::new();
        for spec in states {
            let mut transitions = HashMap::new();
            for (event, decl) in spec.transitions {
                let guard = decl.guard.map(&resolve_guard).transpose()?;
                let action = decl.action.map(&resolve_action).transpose()?;
                transitions.insert(
                    event,
                    TransitionSpec {
                        target: decl.target,
                        guard,
                        action,
                    },
                );
            }
            let transient = match spec.transient {
                Some(decl) => Some(TransientSpec {
                    delay: decl.delay,
                    target: decl.target,
                    guard: decl.guard.map(&resolve_guard).transpose()?,
                    action: decl.action.map(&resolve_action).transpose()?,
                }),
                None => None,
            };
            // Compound initial children were validated above.
            let kind = match spec.kind {
                StateKind::Atomic => NodeKind::Atomic,
                StateKind::Compound => NodeKind::Compound {
                    initial: spec.initial.unwrap_or(spec.id),
                },
                StateKind::Parallel => NodeKind::Parallel,
            };
            nodes.insert(
                spec.id,
                Node {
                    kind,
                    parent: spec.parent,
                    children: children.remove(&spec.id).unwrap_or_default(),
                    transitions,
                    transient,
                    on_entry: spec.on_entry,
                    on_exit: spec.on_exit,
                },
            );
        }

        Ok(TransitionTable::from_parts(root, nodes))
    }
}

impl<S: StateId, C, E: EventId> Default for TableBuilder<S, C, E> {
    fn default() -> Self {
        Self::new()
    }
}
