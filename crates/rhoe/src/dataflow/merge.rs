//! Merge/phi engine: combines the local states of several control-flow
//! paths into one, creating Block/Cond/Phi nodes only where values actually
//! diverge.

use super::builder::{Builder, Locals};
use super::node::{Graph, Node, NodeId};
use crate::ir::ExprId;

/// The local state of one incoming control-flow path, together with the
/// predicate that gated it (Bad where no condition is available).
pub(super) struct FlowState {
    pub(super) locals: Locals,
    pub(super) condition: NodeId,
}

impl<'f> Builder<'f> {
    /// Merge local state for an if, creating the arm conditions.
    ///
    /// For a two-armed if the states are (after-true, after-false); for a
    /// one-armed if they are (before, after-true). Either way the first
    /// state is gated by the condition as an i1 and the second by its
    /// zero-equality, and the pair is recorded in the condition map.
    pub(super) fn merge_if(
        &mut self,
        a_state: Locals,
        b_state: Locals,
        condition: NodeId,
        expr: ExprId,
    ) {
        let (if_true, if_false);
        if !self.graph.is_bad(condition) {
            if_true = self.ensure_i1(condition);
            if_false = self.make_zero_comp(condition, true);
            self.expression_condition_map
                .insert(expr, vec![if_true, if_false]);
        } else {
            if_true = Graph::BAD;
            if_false = Graph::BAD;
        }
        let states = vec![
            FlowState {
                locals: a_state,
                condition: if_true,
            },
            FlowState {
                locals: b_state,
                condition: if_false,
            },
        ];
        self.merge(states);
    }

    /// Merge local state for a block: every state captured at a branch to
    /// its label plus the state flowing out, none of them conditional.
    pub(super) fn merge_block(&mut self, localses: Vec<Locals>) {
        let states = localses
            .into_iter()
            .map(|locals| FlowState {
                locals,
                condition: Graph::BAD,
            })
            .collect();
        self.merge(states);
    }

    /// Merge the given states into the builder's locals, creating phis as
    /// needed.
    pub(super) fn merge(&mut self, mut states: Vec<FlowState>) {
        let num_locals = self.func.num_locals();
        // Unreachable states don't flow anywhere; drop them.
        states.retain(|state| !state.locals.is_empty());
        if states.is_empty() {
            // We were unreachable, and still are.
            debug_assert!(self.is_in_unreachable());
            self.set_in_unreachable();
            return;
        }
        // We may have just become reachable, if we were not before.
        self.set_in_reachable();
        // Just one thing to merge is trivial.
        if states.len() == 1 {
            self.locals = states.swap_remove(0).locals;
            return;
        }
        // A Block is created lazily, only once some local actually
        // diverges across the incoming paths.
        let mut block = None;
        for i in 0..num_locals {
            // If any input is bad, the merged value is bad.
            if states
                .iter()
                .any(|state| self.graph.is_bad(state.locals[i]))
            {
                self.locals[i] = Graph::BAD;
                continue;
            }
            let first = states[0].locals[i];
            if states.iter().all(|state| state.locals[i] == first) {
                self.locals[i] = first;
                continue;
            }
            // We need to actually merge some stuff.
            let block = *block.get_or_insert_with(|| {
                let block = self.graph.add(Node::block());
                for (index, state) in states.iter().enumerate() {
                    let mut condition = state.condition;
                    if !self.graph.is_bad(condition) {
                        condition = self
                            .graph
                            .add(Node::cond(block, index as u32, condition));
                    }
                    self.graph.get_mut(block).values.push(condition);
                }
                block
            });
            let mut inputs = Vec::with_capacity(states.len());
            for index in 0..states.len() {
                let input = states[index].locals[i];
                inputs.push(self.expand_from_i1(input));
            }
            let phi = self.graph.add(Node::phi(block, inputs));
            self.locals[i] = phi;
        }
    }
}
