//! Asynchronous, queue-based belief propagation for one factor's subgraph.
//!
//! The queue starts with the factor's characters. Each step pops one character
//! (chosen by a [`SelectionOrder`]), recomputes its node, and if the node changed
//! enqueues every character sharing a factor with it. The loop stops when the
//! queue empties or the iteration budget runs out; loopy graphs need not converge.

use rand::Rng;
use rustc_hash::FxHashSet;

use crate::engine::errors::YomiError;
use crate::engine::factor::FactorId;
use crate::engine::model::Model;
use crate::engine::node::NodeId;

/// Chooses which queued character is recomputed next.
pub trait SelectionOrder {
    /// Returns an index in `0..len`. `len` is never zero.
    fn pick(&mut self, len: usize) -> usize;
}

/// Any random source picks uniformly among queued characters.
impl<R: Rng + ?Sized> SelectionOrder for R {
    fn pick(&mut self, len: usize) -> usize {
        self.gen_range(0..len)
    }
}

/// Deterministic policy: always the character queued earliest.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstInQueue;

impl SelectionOrder for FirstInQueue {
    fn pick(&mut self, _len: usize) -> usize {
        0
    }
}

/// Set-like work queue preserving insertion order.
#[derive(Debug, Default)]
struct WorkQueue {
    order: Vec<NodeId>,
    members: FxHashSet<NodeId>,
}

impl WorkQueue {
    fn extend<I: IntoIterator<Item = NodeId>>(&mut self, ids: I) {
        for id in ids {
            if self.members.insert(id) {
                self.order.push(id);
            }
        }
    }

    fn take<S: SelectionOrder + ?Sized>(&mut self, order: &mut S) -> Option<NodeId> {
        if self.order.is_empty() {
            return None;
        }
        let slot = order.pick(self.order.len()).min(self.order.len() - 1);
        let id = self.order.remove(slot);
        self.members.remove(&id);
        Some(id)
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

/// Runtime diagnostics for one factor's propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct InferenceDiagnostics {
    /// Iteration limit configured for this run.
    pub max_iterations: usize,
    /// Number of node updates actually executed.
    pub iterations_run: usize,
    /// Whether the queue emptied before the iteration limit.
    pub converged: bool,
    /// Number of updates that changed a distribution.
    pub updates_applied: usize,
    /// Characters still queued when the loop stopped.
    pub queue_remaining: usize,
}

/// Propagates beliefs around `factor` until fixpoint or the configured iteration cap.
pub fn infer_factor<S: SelectionOrder + ?Sized>(
    model: &mut Model,
    factor: FactorId,
    order: &mut S,
) -> Result<InferenceDiagnostics, YomiError> {
    let max_iterations = model.config().max_iterations;
    let mut queue = WorkQueue::default();
    queue.extend(model.factor_nodes(factor)?);

    let mut diagnostics = InferenceDiagnostics {
        max_iterations,
        iterations_run: 0,
        converged: false,
        updates_applied: 0,
        queue_remaining: 0,
    };

    while diagnostics.iterations_run < max_iterations {
        let Some(node) = queue.take(order) else {
            break;
        };
        if model.update_distribution(node)? {
            diagnostics.updates_applied += 1;
            queue.extend(model.neighbors(node)?);
        }
        diagnostics.iterations_run += 1;
    }

    diagnostics.queue_remaining = queue.len();
    diagnostics.converged = diagnostics.queue_remaining == 0;

    #[cfg(feature = "tracing")]
    if !diagnostics.converged {
        tracing::debug!(
            "factor {:?} hit the iteration cap ({}) with {} characters queued",
            factor,
            max_iterations,
            diagnostics.queue_remaining
        );
    }

    Ok(diagnostics)
}
