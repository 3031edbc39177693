//! # Task registry - the structural bookkeeping of every live task tree.
//!
//! The registry is the scheduler's own serialized state: one mutex guards the
//! whole forest, so every structural operation (register, seal, complete,
//! cancel) is applied atomically with respect to the others.
//!
//! ## Architecture
//! ```text
//! HashMap<TaskId, Node>
//!   Node { parent: Option<TaskId>, children: Vec<TaskId>, token, phase,
//!          live: watch<usize>, failures, observed }
//!
//! register_root / register_child ──► insert node (child: parent.live += 1)
//! seal(id)                        ──► phase = Joining, returns live-children receiver
//! remove(id)                      ──► drop node, unlink from parent (roots -= 1)
//! release(detached, state)        ──► parent.live -= 1, record child failure
//! ```
//!
//! A task's joiners are woken between `remove` and `release`, so a parent
//! never finishes before its children's outcomes are published.
//!
//! ## Rules
//! - Parents own children by id; children refer back to parents by id only.
//! - A node is removed as soon as its task is terminal.
//! - Child tokens derive from the parent token: cancelling a parent reaches
//!   every existing **and** every future child.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::core::config::CancelledSpawn;
use crate::error::{ParentRejection, TaskError};
use crate::tasks::{Priority, TaskId, TaskState};

/// Lifecycle phase as seen by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    Running,
    Joining,
}

struct Node {
    name: Arc<str>,
    parent: Option<TaskId>,
    children: Vec<TaskId>,
    priority: Priority,
    token: CancellationToken,
    phase: Phase,
    live: watch::Sender<usize>,
    failures: Vec<FailedChild>,
    /// Set once some joiner received this task's outcome.
    observed: Arc<AtomicBool>,
}

struct FailedChild {
    id: TaskId,
    error: TaskError,
    observed: Arc<AtomicBool>,
}

impl Node {
    fn new(
        name: Arc<str>,
        parent: Option<TaskId>,
        priority: Priority,
        token: CancellationToken,
        observed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            priority,
            token,
            phase: Phase::Pending,
            live: watch::Sender::new(0),
            failures: Vec::new(),
            observed,
        }
    }
}

/// A removed task whose parent has not been notified yet.
pub(crate) struct Detached {
    id: TaskId,
    parent: Option<TaskId>,
    observed: Arc<AtomicBool>,
}

/// Placement of a newly registered child.
pub(crate) struct Placement {
    pub(crate) priority: Priority,
    pub(crate) token: CancellationToken,
}

/// Point-in-time view of one live task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    /// Task identity.
    pub id: TaskId,
    /// Task name.
    pub name: String,
    /// Parent, if any.
    pub parent: Option<TaskId>,
    /// Effective priority.
    pub priority: Priority,
    /// `Pending` or `Running` (terminal tasks are no longer registered).
    pub state: TaskState,
    /// Whether cancellation has been requested.
    pub cancelled: bool,
    /// Live children, in spawn order.
    pub children: Vec<TaskId>,
}

/// Forest of live tasks.
pub(crate) struct Registry {
    nodes: Mutex<HashMap<TaskId, Node>>,
    roots: watch::Sender<usize>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Mutex::new(HashMap::new()),
            roots: watch::Sender::new(0),
        }
    }

    /// Registers a new tree root.
    pub(crate) fn register_root(
        &self,
        id: TaskId,
        name: Arc<str>,
        priority: Priority,
        token: CancellationToken,
    ) {
        let mut nodes = self.nodes.lock();
        nodes.insert(id, Node::new(name, None, priority, token, Arc::default()));
        self.roots.send_modify(|n| *n += 1);
    }

    /// Registers `id` as the newest child of `parent`.
    ///
    /// The child's token is derived while the lock is held, so a concurrent
    /// `cancel(parent)` is either already visible in the child token or will
    /// reach it through the token tree.
    ///
    /// `observed` is shared with the child's handles: a failure that one of
    /// them already handed to a joiner is not held against the parent.
    pub(crate) fn register_child(
        &self,
        parent: TaskId,
        id: TaskId,
        name: Arc<str>,
        priority: Option<Priority>,
        policy: CancelledSpawn,
        observed: Arc<AtomicBool>,
    ) -> Result<Placement, TaskError> {
        let mut nodes = self.nodes.lock();
        let reject = |reason| TaskError::InvalidParentState { parent, reason };

        let p = nodes
            .get_mut(&parent)
            .ok_or_else(|| reject(ParentRejection::Finished))?;
        match p.phase {
            Phase::Pending => return Err(reject(ParentRejection::NotStarted)),
            Phase::Joining => return Err(reject(ParentRejection::Joining)),
            Phase::Running => {}
        }
        if policy == CancelledSpawn::Reject && p.token.is_cancelled() {
            return Err(reject(ParentRejection::Cancelling));
        }

        let placement = Placement {
            priority: priority.unwrap_or(p.priority),
            token: p.token.child_token(),
        };
        p.children.push(id);
        p.live.send_modify(|n| *n += 1);

        nodes.insert(
            id,
            Node::new(
                name,
                Some(parent),
                placement.priority,
                placement.token.clone(),
                observed,
            ),
        );
        Ok(placement)
    }

    /// Marks the body as started.
    pub(crate) fn mark_running(&self, id: TaskId) {
        if let Some(node) = self.nodes.lock().get_mut(&id) {
            node.phase = Phase::Running;
        }
    }

    /// Closes the node to new children and returns a receiver of its live-children count.
    pub(crate) fn seal(&self, id: TaskId) -> Option<watch::Receiver<usize>> {
        let mut nodes = self.nodes.lock();
        let node = nodes.get_mut(&id)?;
        node.phase = Phase::Joining;
        Some(node.live.subscribe())
    }

    /// Takes the first child failure of `id` that no joiner received.
    pub(crate) fn take_first_failure(&self, id: TaskId) -> Option<(TaskId, TaskError)> {
        let mut nodes = self.nodes.lock();
        let node = nodes.get_mut(&id)?;
        std::mem::take(&mut node.failures)
            .into_iter()
            .find(|f| !f.observed.load(Ordering::Acquire))
            .map(|f| (f.id, f.error))
    }

    /// Removes a terminal task from the forest.
    ///
    /// The parent still counts it as live until [`Registry::release`].
    pub(crate) fn remove(&self, id: TaskId) -> Option<Detached> {
        let mut nodes = self.nodes.lock();
        let node = nodes.remove(&id)?;

        match node.parent {
            Some(p) => {
                if let Some(parent) = nodes.get_mut(&p) {
                    parent.children.retain(|c| *c != id);
                }
            }
            None => self.roots.send_modify(|n| *n = n.saturating_sub(1)),
        }
        Some(Detached {
            id,
            parent: node.parent,
            observed: node.observed,
        })
    }

    /// Tells the parent of a removed task that it is done.
    pub(crate) fn release(&self, detached: Detached, state: &TaskState) {
        let Some(parent_id) = detached.parent else {
            return;
        };
        let mut nodes = self.nodes.lock();
        let Some(parent) = nodes.get_mut(&parent_id) else {
            return;
        };
        if let TaskState::Failed(error) = state {
            parent.failures.push(FailedChild {
                id: detached.id,
                error: error.clone(),
                observed: detached.observed,
            });
        }
        parent.live.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Requests cancellation of `id`. Returns `(known, first_request)`.
    pub(crate) fn cancel(&self, id: TaskId) -> (bool, bool) {
        let nodes = self.nodes.lock();
        match nodes.get(&id) {
            Some(node) => {
                let first = !node.token.is_cancelled();
                node.token.cancel();
                (true, first)
            }
            None => (false, false),
        }
    }

    /// Cancels every current child of `id` without cancelling `id` itself.
    pub(crate) fn cancel_children(&self, id: TaskId) -> usize {
        let nodes = self.nodes.lock();
        let Some(node) = nodes.get(&id) else {
            return 0;
        };
        for child in &node.children {
            if let Some(c) = nodes.get(child) {
                c.token.cancel();
            }
        }
        node.children.len()
    }

    /// Ids of the live children of `id`, in spawn order.
    pub(crate) fn children(&self, id: TaskId) -> Vec<TaskId> {
        self.nodes
            .lock()
            .get(&id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Name of a live task.
    pub(crate) fn name(&self, id: TaskId) -> Option<Arc<str>> {
        self.nodes.lock().get(&id).map(|n| Arc::clone(&n.name))
    }

    /// Receiver of the number of live roots.
    pub(crate) fn roots(&self) -> watch::Receiver<usize> {
        self.roots.subscribe()
    }

    /// Number of live tasks.
    pub(crate) fn len(&self) -> usize {
        self.nodes.lock().len()
    }

    /// Snapshot of every live task, sorted by id.
    pub(crate) fn snapshot(&self) -> Vec<TaskInfo> {
        let nodes = self.nodes.lock();
        let mut out: Vec<TaskInfo> = nodes
            .iter()
            .map(|(id, n)| TaskInfo {
                id: *id,
                name: n.name.to_string(),
                parent: n.parent,
                priority: n.priority,
                state: match n.phase {
                    Phase::Pending => TaskState::Pending,
                    Phase::Running | Phase::Joining => TaskState::Running,
                },
                cancelled: n.token.is_cancelled(),
                children: n.children.clone(),
            })
            .collect();
        out.sort_unstable_by_key(|t| t.id);
        out
    }
}
