// src/engine/ready_set.rs

//! Ordered collection of schedulable tasks.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use crate::engine::TaskId;
use crate::types::Priority;

/// Everything the ordering rule looks at for one task.
///
/// A rank compares *less* when its task should run *first*:
/// 1. more urgent priority wins;
/// 2. at equal priority, a ready task beats a waiting one;
/// 3. otherwise the older task wins, then the smaller id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRank {
    pub priority: Priority,
    pub waiting: bool,
    pub created: Instant,
    pub id: TaskId,
}

impl Ord for TaskRank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then(self.waiting.cmp(&other.waiting))
            .then(self.created.cmp(&other.created))
            .then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for TaskRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Tasks eligible to run (or waiting on an external operation), kept sorted
/// by [`TaskRank`]. Tasks parked on a sub-task are never in here.
///
/// A rank changes whenever its task starts or stops waiting, so callers
/// re-`insert` after every state change; inserting a known id replaces its
/// old rank.
#[derive(Debug, Default)]
pub struct ReadySet {
    ordered: BTreeSet<TaskRank>,
    ranks: HashMap<TaskId, TaskRank>,
}

impl ReadySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rank: TaskRank) {
        if let Some(old) = self.ranks.insert(rank.id, rank) {
            self.ordered.remove(&old);
        }
        self.ordered.insert(rank);
    }

    /// Returns `true` if the task was present.
    pub fn remove(&mut self, id: TaskId) -> bool {
        match self.ranks.remove(&id) {
            Some(rank) => {
                self.ordered.remove(&rank);
                true
            }
            None => false,
        }
    }

    /// The task that should run next.
    pub fn front(&self) -> Option<TaskId> {
        self.ordered.first().map(|rank| rank.id)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.ranks.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Ids in scheduling order.
    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.ordered.iter().map(|rank| rank.id)
    }
}
