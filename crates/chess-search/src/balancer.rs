//! Hands work to idle workers.
//!
//! Idle workers announce themselves on the `idle` channel and then block on
//! their own single-slot assignment channel. A worker that opens a split
//! point drains the idle channel, attaching each idle worker to the new split
//! point before handing it over, so every assignment it sends is already
//! counted by the split point's master. Open split points are also kept in a
//! priority index so a worker that goes idle later, or a master waiting for
//! its servants, can find one to join.

use crate::engine::RootJob;
use crate::split::SplitPoint;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub(crate) enum Assignment {
    Root(RootJob),
    Split(Arc<SplitPoint>),
    Quit,
}

pub(crate) struct Balancer {
    index: Mutex<BTreeMap<(u32, u64), Arc<SplitPoint>>>,
    idle_tx: Sender<usize>,
    idle_rx: Receiver<usize>,
    assign: Vec<Sender<Assignment>>,
}

impl Balancer {
    pub(crate) fn new(assign: Vec<Sender<Assignment>>) -> Self {
        let (idle_tx, idle_rx) = unbounded();
        Balancer {
            index: Mutex::new(BTreeMap::new()),
            idle_tx,
            idle_rx,
            assign,
        }
    }

    /// Called by a worker with nothing to do. Either joins the best open
    /// split point or registers as idle; in both cases the worker then reads
    /// its assignment channel.
    pub(crate) fn park(&self, worker: usize) {
        let index = self.index.lock();
        for sp in index.values().rev() {
            if sp.try_attach(worker) {
                self.deliver(worker, Assignment::Split(Arc::clone(sp)));
                return;
            }
        }
        // Still under the index lock, so a split point opened concurrently
        // either was seen above or will find this worker on the channel.
        let _ = self.idle_tx.send(worker);
    }

    /// Publishes a new split point and attaches every idle worker to it.
    pub(crate) fn add(&self, sp: &Arc<SplitPoint>) {
        let mut index = self.index.lock();
        index.insert((sp.priority(), sp.id), Arc::clone(sp));
        let mut declined = Vec::new();
        while let Ok(worker) = self.idle_rx.try_recv() {
            if sp.try_attach(worker) {
                debug!(worker, sp = sp.id, "servant attached");
                self.deliver(worker, Assignment::Split(Arc::clone(sp)));
            } else {
                declined.push(worker);
                break;
            }
        }
        for worker in declined {
            let _ = self.idle_tx.send(worker);
        }
    }

    pub(crate) fn remove(&self, sp: &SplitPoint) {
        self.index.lock().remove(&(sp.priority(), sp.id));
    }

    /// An open split point below `own` that `worker` can serve while its own
    /// servants finish. The worker is attached on return.
    pub(crate) fn find_helpable(&self, worker: usize, own: &SplitPoint) -> Option<Arc<SplitPoint>> {
        let index = self.index.lock();
        index
            .values()
            .rev()
            .find(|sp| sp.master != worker && sp.descends_from(own) && sp.try_attach(worker))
            .cloned()
    }

    /// Hands the root search to the first idle worker, waiting for one if needed.
    pub(crate) fn assign_root(&self, job: RootJob) {
        if let Ok(worker) = self.idle_rx.recv() {
            self.deliver(worker, Assignment::Root(job));
        }
    }

    pub(crate) fn has_idle(&self) -> bool {
        !self.idle_rx.is_empty()
    }

    /// Number of split points currently open.
    pub(crate) fn open(&self) -> usize {
        self.index.lock().len()
    }

    pub(crate) fn quit_all(&self) {
        for sender in &self.assign {
            let _ = sender.send(Assignment::Quit);
        }
    }

    fn deliver(&self, worker: usize, assignment: Assignment) {
        if self.assign[worker].send(assignment).is_err() {
            debug!(worker, "worker has exited");
        }
    }
}
