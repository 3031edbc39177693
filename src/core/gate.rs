//! # Priority admission gate for root tasks.
//!
//! When [`SchedulerConfig::max_concurrent_roots`](crate::SchedulerConfig::max_concurrent_roots)
//! is set, every root waits here for a permit before its body runs.
//!
//! ## Rules
//! - Free capacity and no waiters → permit granted immediately.
//! - Otherwise waiters are served by **effective priority**, oldest first within a level.
//! - Every time a waiter is overtaken by a younger one, its overtake counter grows;
//!   after `aging_step` overtakes it is promoted one [`Priority`] level (no starvation).
//! - A permit is handed over directly to the next waiter when dropped; a waiter
//!   that gave up (cancelled) passes it on.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::tasks::Priority;

struct Waiter {
    seq: u64,
    priority: Priority,
    overtaken: usize,
    tx: oneshot::Sender<AdmissionPermit>,
}

#[derive(Default)]
struct GateState {
    in_use: usize,
    next_seq: u64,
    waiters: Vec<Waiter>,
}

impl GateState {
    /// Removes the waiter to serve next and ages the ones it overtook.
    fn pop_next(&mut self, aging_step: usize) -> Option<Waiter> {
        self.waiters.retain(|w| !w.tx.is_closed());
        let (best, _) = self.waiters.iter().enumerate().max_by(|(_, a), (_, b)| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| b.seq.cmp(&a.seq))
        })?;
        let chosen = self.waiters.remove(best);

        for w in self.waiters.iter_mut().filter(|w| w.seq < chosen.seq) {
            w.overtaken += 1;
            if w.overtaken >= aging_step {
                w.priority = w.priority.promote();
                w.overtaken = 0;
            }
        }
        Some(chosen)
    }
}

/// Counting gate with priority-ordered, aging admission.
pub(crate) struct AdmissionGate {
    capacity: usize,
    aging_step: usize,
    state: Mutex<GateState>,
}

/// Held by a running root; returns its slot on drop.
pub(crate) struct AdmissionPermit {
    gate: Arc<AdmissionGate>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.gate.release();
    }
}

impl AdmissionGate {
    pub(crate) fn new(capacity: usize, aging_step: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity: capacity.max(1),
            aging_step: aging_step.max(1),
            state: Mutex::new(GateState::default()),
        })
    }

    /// Waits for a permit. Returns `None` only if the gate went away.
    ///
    /// Dropping the returned future withdraws the request.
    pub(crate) async fn acquire(self: &Arc<Self>, priority: Priority) -> Option<AdmissionPermit> {
        let rx = {
            let mut st = self.state.lock();
            if st.in_use < self.capacity && st.waiters.is_empty() {
                st.in_use += 1;
                return Some(AdmissionPermit {
                    gate: Arc::clone(self),
                });
            }
            let (tx, rx) = oneshot::channel();
            let seq = st.next_seq;
            st.next_seq += 1;
            st.waiters.push(Waiter {
                seq,
                priority,
                overtaken: 0,
                tx,
            });
            rx
        };
        rx.await.ok()
    }

    /// Number of queued waiters (including ones that already gave up).
    pub(crate) fn waiting(&self) -> usize {
        self.state.lock().waiters.len()
    }

    fn release(self: &Arc<Self>) {
        let next = {
            let mut st = self.state.lock();
            match st.pop_next(self.aging_step) {
                Some(w) => w,
                None => {
                    st.in_use -= 1;
                    return;
                }
            }
        };
        // A waiter that vanished after selection hands the permit straight
        // back: the rejected permit is dropped here, outside the lock.
        let _ = next.tx.send(AdmissionPermit {
            gate: Arc::clone(self),
        });
    }
}
