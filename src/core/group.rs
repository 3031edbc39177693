//! # Task groups: fan-out / fan-in over sibling children.
//!
//! A [`TaskGroup`] is spawned as one implicit *group task* whose children are
//! the members. Cancelling the group handle cancels the group task, which
//! cascades to every member and their subtrees.
//!
//! ```text
//! group task (absorbs member failures)
//!   ├── member #0 ─┐
//!   ├── member #1 ─┼── FailFast:   first Err → cancel siblings → surface that Err
//!   └── member #2 ─┘   CollectAll: wait every member → Ok(values) | Group{failures}
//! ```
//!
//! Results are always reported in insertion order. A group resolves only
//! once every member is terminal (the group task joins its children).
//!
//! Timeouts are built on an internal race: the work and a timer are spawned
//! as siblings, the first to finish wins and the other is cancelled.

use std::time::Duration;

use futures::StreamExt;
use futures::future::join_all;
use futures::stream::FuturesUnordered;

use crate::core::context::TaskContext;
use crate::core::handle::TaskHandle;
use crate::error::{MemberFailure, TaskError};
use crate::events::{Event, EventKind};
use crate::tasks::{BoxWork, Priority, SpawnOptions, boxed};

/// How a group aggregates its members.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GroupPolicy {
    /// The first failing member cancels its siblings; the group fails with that error.
    #[default]
    FailFast,
    /// Every member runs to completion; failures are aggregated into
    /// [`TaskError::Group`].
    CollectAll,
}

impl GroupPolicy {
    fn as_label(&self) -> &'static str {
        match self {
            GroupPolicy::FailFast => "fail-fast",
            GroupPolicy::CollectAll => "collect-all",
        }
    }
}

struct Member<T> {
    opts: SpawnOptions,
    work: BoxWork<T>,
}

/// Ordered list of sibling tasks to run together.
///
/// ```rust,no_run
/// use tasktree::{GroupPolicy, Scheduler, SchedulerConfig, TaskGroup};
///
/// # async fn demo() {
/// let sched = Scheduler::builder(SchedulerConfig::default()).build();
/// let mut group = TaskGroup::new(GroupPolicy::CollectAll);
/// for i in 0..3u32 {
///     group.add(move |_ctx| async move { Ok(i * 10) });
/// }
/// let handle = sched.spawn_group(group);
/// assert_eq!(handle.join().await, Ok(vec![0, 10, 20]));
/// # }
/// ```
pub struct TaskGroup<T> {
    policy: GroupPolicy,
    members: Vec<Member<T>>,
}

impl<T> TaskGroup<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates an empty group.
    pub fn new(policy: GroupPolicy) -> Self {
        Self {
            policy,
            members: Vec::new(),
        }
    }

    /// Appends a member that inherits the group's priority.
    pub fn add<F, Fut>(&mut self, work: F) -> &mut Self
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.add_with(SpawnOptions::new(), work)
    }

    /// Appends a member with its own priority.
    pub fn add_with_priority<F, Fut>(&mut self, priority: Priority, work: F) -> &mut Self
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.add_with(SpawnOptions::new().with_priority(priority), work)
    }

    /// Appends a member with explicit spawn options.
    pub fn add_with<F, Fut>(&mut self, opts: SpawnOptions, work: F) -> &mut Self
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        self.members.push(Member {
            opts,
            work: boxed(work),
        });
        self
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True if the group has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Aggregation policy.
    pub fn policy(&self) -> GroupPolicy {
        self.policy
    }

    pub(crate) fn default_name(&self) -> String {
        format!("{}-group", self.policy.as_label())
    }

    /// Turns the group into the body of its implicit group task.
    pub(crate) fn into_work(self) -> BoxWork<Vec<T>> {
        boxed(move |ctx: TaskContext| self.run(ctx))
    }

    async fn run(self, ctx: TaskContext) -> Result<Vec<T>, TaskError> {
        let handles = spawn_members(&ctx, self.members)?;
        match self.policy {
            GroupPolicy::FailFast => fail_fast(&ctx, &handles).await,
            GroupPolicy::CollectAll => collect_all(&ctx, &handles).await,
        }
    }
}

fn spawn_members<T>(
    ctx: &TaskContext,
    members: Vec<Member<T>>,
) -> Result<Vec<TaskHandle<T>>, TaskError>
where
    T: Clone + Send + Sync + 'static,
{
    let mut handles = Vec::with_capacity(members.len());
    for m in members {
        match ctx.spawn_boxed(m.opts, m.work, false) {
            Ok(h) => handles.push(h),
            Err(e) => {
                ctx.cancel_children();
                return Err(e);
            }
        }
    }
    Ok(handles)
}

async fn fail_fast<T>(ctx: &TaskContext, handles: &[TaskHandle<T>]) -> Result<Vec<T>, TaskError>
where
    T: Clone + Send + Sync + 'static,
{
    let mut pending: FuturesUnordered<_> = handles
        .iter()
        .enumerate()
        .map(|(idx, h)| async move { (idx, h.join().await) })
        .collect();

    let mut values: Vec<Option<T>> = (0..handles.len()).map(|_| None).collect();
    while let Some((idx, res)) = pending.next().await {
        match res {
            Ok(v) => values[idx] = Some(v),
            Err(e) => {
                ctx.cancel_children();
                return Err(e);
            }
        }
    }
    Ok(values.into_iter().flatten().collect())
}

async fn collect_all<T>(ctx: &TaskContext, handles: &[TaskHandle<T>]) -> Result<Vec<T>, TaskError>
where
    T: Clone + Send + Sync + 'static,
{
    let results = join_all(handles.iter().map(|h| h.join())).await;

    let mut values = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for (index, (h, res)) in handles.iter().zip(results).enumerate() {
        match res {
            Ok(v) => values.push(v),
            Err(error) => failures.push(MemberFailure {
                index,
                task: h.id(),
                error,
            }),
        }
    }

    if failures.is_empty() {
        Ok(values)
    } else if ctx.is_cancelled() && failures.iter().all(|f| f.error.is_cancelled()) {
        Err(TaskError::Cancelled)
    } else {
        Err(TaskError::Group { failures })
    }
}

/// Runs `members` as siblings; the first to reach a terminal state decides
/// the outcome and the rest are cancelled.
pub(crate) async fn race<T>(
    ctx: &TaskContext,
    members: Vec<(SpawnOptions, BoxWork<T>)>,
) -> Result<T, TaskError>
where
    T: Clone + Send + Sync + 'static,
{
    let members = members
        .into_iter()
        .map(|(opts, work)| Member { opts, work })
        .collect();
    let handles = spawn_members(ctx, members)?;

    let mut pending: FuturesUnordered<_> = handles.iter().map(|h| h.join()).collect();
    let first = pending.next().await.unwrap_or(Err(TaskError::Cancelled));
    ctx.cancel_children();
    first
}

/// Wraps `work` so that it races against a timer of `timeout`.
pub(crate) fn with_timeout<T>(timeout: Duration, work: BoxWork<T>) -> BoxWork<T>
where
    T: Clone + Send + Sync + 'static,
{
    boxed(move |ctx: TaskContext| async move {
        let (owner, owner_id) = (ctx.name_arc(), ctx.id());
        let timer: BoxWork<T> = boxed(move |tctx: TaskContext| async move {
            tctx.sleep(timeout).await?;
            tctx.publish(
                Event::new(EventKind::TimeoutHit)
                    .with_task(owner)
                    .with_task_id(owner_id)
                    .with_timeout(timeout),
            );
            Err(TaskError::Timeout { timeout })
        });

        let timer_name = format!("{}-timer", ctx.name());
        race(
            &ctx,
            vec![
                (SpawnOptions::new(), work),
                (SpawnOptions::named(timer_name), timer),
            ],
        )
        .await
    })
}
