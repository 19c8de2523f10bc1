//! Constraint entries and the ordered list that evaluates them.
//!
//! A constraint list is a sequence of AND-connected runs separated by OR
//! joins. Every entry records the run it belongs to in `group_index`, which
//! is non-decreasing along the list and bumped by each `or` join.
//! `a AND b OR c AND d` is stored as:
//!
//! | entry | join | group_index |
//! |-------|------|-------------|
//! | a     | -    | 0           |
//! | b     | and  | 0           |
//! | c     | or   | 1           |
//! | d     | and  | 1           |

mod key_value;

pub use key_value::KeyValueArg;

use serde::Deserialize;

use crate::error::QueryError;
use crate::query::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Join {
    And,
    Or,
}

impl Join {
    pub fn as_str(&self) -> &'static str {
        match self {
            Join::And => "and",
            Join::Or => "or",
        }
    }
}

/// What a constraint entry tests.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgKind {
    KeyValue(KeyValueArg),
    /// A parenthesized sub-expression held by a nested grouped node
    Grouped { query: NodeId },
    /// A test against the related records of virtual field `name`
    VirtualField {
        name: String,
        query: NodeId,
        is_many: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub kind: ArgKind,
    pub join: Option<Join>,
    pub negated: bool,
    pub arg_index: usize,
    pub group_index: usize,
}

impl Arg {
    /// Node owned by a grouped or virtual-field entry.
    pub fn nested(&self) -> Option<NodeId> {
        match &self.kind {
            ArgKind::KeyValue(_) => None,
            ArgKind::Grouped { query } | ArgKind::VirtualField { query, .. } => Some(*query),
        }
    }

    pub fn is_virtual_field(&self) -> bool {
        matches!(self.kind, ArgKind::VirtualField { .. })
    }
}

/// Result of removing an entry from an [`ArgList`].
#[derive(Debug)]
pub(crate) struct Removed {
    pub(crate) arg: Arg,
    /// The removed entry was the only member of its run, so every following
    /// run moved down by one group.
    pub(crate) collapsed: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgList {
    args: Vec<Arg>,
    group_counter: usize,
}

impl ArgList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.args.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arg> {
        self.args.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Arg> {
        self.args.iter_mut()
    }

    /// Appends an entry and returns its index.
    ///
    /// The caller guarantees that only the first entry has no join.
    pub(crate) fn push(&mut self, kind: ArgKind, negated: bool, join: Option<Join>) -> usize {
        let join = if self.args.is_empty() { None } else { join };
        if join == Some(Join::Or) {
            self.group_counter += 1;
        }
        let arg_index = self.args.len();
        self.args.push(Arg {
            kind,
            join,
            negated,
            arg_index,
            group_index: self.group_counter,
        });
        arg_index
    }

    /// Replaces the test of an entry, keeping its join and run.
    pub(crate) fn replace(&mut self, index: usize, kind: ArgKind, negated: bool) -> Result<Arg, QueryError> {
        let slot = self
            .args
            .get_mut(index)
            .ok_or(QueryError::ConstraintOutOfRange(index))?;
        let old = std::mem::replace(&mut slot.kind, kind);
        let old_negated = std::mem::replace(&mut slot.negated, negated);
        Ok(Arg {
            kind: old,
            negated: old_negated,
            ..slot.clone()
        })
    }

    /// Removes the entry at `index`, keeping join markers and group indices
    /// consistent with the remaining runs.
    pub(crate) fn remove(&mut self, index: usize) -> Result<Removed, QueryError> {
        if index >= self.args.len() {
            return Err(QueryError::ConstraintOutOfRange(index));
        }
        let arg = self.args.remove(index);
        let group = arg.group_index;
        let prev_same = index > 0 && self.args[index - 1].group_index == group;
        let next_same = self.args.get(index).is_some_and(|a| a.group_index == group);
        let collapsed = !prev_same && !next_same;

        if !prev_same && next_same {
            // the next entry now opens the run
            self.args[index].join = arg.join;
        }
        if collapsed {
            for a in &mut self.args[index..] {
                a.group_index -= 1;
            }
            self.group_counter = self.group_counter.saturating_sub(1);
        }
        for (i, a) in self.args.iter_mut().enumerate().skip(index) {
            a.arg_index = i;
        }
        if let Some(first) = self.args.first_mut() {
            first.join = None;
        }
        if self.args.is_empty() {
            self.group_counter = 0;
        }
        Ok(Removed { arg, collapsed })
    }

    /// Evaluates the list: OR across runs, AND within a run.
    ///
    /// Returns `true` as soon as a completed run holds; an empty list is
    /// `true`. Members of a run after a failing member are not tested.
    pub fn check_with(&self, mut test: impl FnMut(&Arg) -> bool) -> bool {
        let mut current = None;
        let mut run = true;
        for arg in &self.args {
            if current != Some(arg.group_index) {
                if current.is_some() && run {
                    return true;
                }
                current = Some(arg.group_index);
                run = true;
            }
            if run && !test(arg) {
                run = false;
            }
        }
        run
    }
}

impl<'a> IntoIterator for &'a ArgList {
    type Item = &'a Arg;
    type IntoIter = std::slice::Iter<'a, Arg>;

    fn into_iter(self) -> Self::IntoIter {
        self.args.iter()
    }
}
