//! The DataFlow builder: one structural walk over a function body.
//!
//! Each visited expression produces a [`NodeId`] — a real node for the
//! supported integer fragment, a fresh Var for opaque-but-typed values
//! (calls, loads, globals, unsupported operators), or the canonical Bad for
//! everything else. The builder threads a per-path locals state through the
//! walk; control-flow constructs snapshot and restore it around their arms
//! and call into the merge engine at joins.
//!
//! The locals state has two shapes: a vector of one node per local
//! (reachable), or the empty vector (the path cannot flow onward). While
//! unreachable, gets and sets degrade to Bad and record nothing; a merge
//! with at least one reachable incoming state restores reachability.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use super::node::{ExprOp, Graph, Node, NodeId};
use crate::ir::{BinaryOp, Expr, ExprId, Function, Literal, Name, Type, UnaryOp};

/// Per-path mapping from local index to the node holding its value.
/// The empty vector is the unreachable state.
pub(super) type Locals = Vec<NodeId>;

/// Builds and owns the DataFlow graph for one function.
///
/// After [`build`](Builder::build) returns, the public fields hold the
/// outputs a consumer needs: the node arena, the sets in source order with
/// their value nodes, the structural parent of each control-flow expression
/// and set, and the per-if arm conditions.
pub struct Builder<'f> {
    pub(super) func: &'f Function,

    /// All nodes, owned by value; index 0 is the canonical Bad.
    pub graph: Graph,

    /// Every local-assignment expression, in order of appearance.
    pub sets: Vec<ExprId>,

    /// Connects each recorded set to the node its value produced.
    pub set_node_map: HashMap<ExprId, NodeId>,

    /// Maps an if to the predicates gating its arms: `[true arm, false arm]`.
    pub expression_condition_map: HashMap<ExprId, Vec<NodeId>>,

    /// Maps blocks, ifs, loops, and sets to their nearest enclosing
    /// control-flow expression (`None` at the top level).
    pub parent_map: HashMap<ExprId, Option<ExprId>>,

    /// The locals state flowing out of the function body.
    pub locals: Locals,

    pub(super) parent: Option<ExprId>,
    pub(super) break_states: HashMap<Name, Vec<Locals>>,
}

impl<'f> Builder<'f> {
    /// Walk `func` and build its DataFlow graph.
    pub fn build(func: &'f Function) -> Builder<'f> {
        let mut builder = Builder {
            func,
            graph: Graph::new(),
            sets: Vec::new(),
            set_node_map: HashMap::new(),
            expression_condition_map: HashMap::new(),
            parent_map: HashMap::new(),
            locals: Vec::new(),
            parent: None,
            break_states: HashMap::new(),
        };
        debug!(function = %func.name, "building dataflow graph");
        let num_locals = func.num_locals();
        if num_locals == 0 {
            // No locals means no trackable state; nothing to do.
            return builder;
        }
        // Initial reachable local state: parameters are unknown values,
        // other locals start at their zero value.
        builder.set_in_reachable();
        for i in 0..num_locals {
            let ty = func.local_type(i);
            builder.locals[i] = if func.is_param(i) {
                builder.make_var(ty)
            } else {
                builder.make_zero(ty)
            };
        }
        builder.visit(func.body());
        builder
    }

    // ─── Node helpers ────────────────────────────────────────────────────

    /// A Var node, representing a value that could be anything. Bad for
    /// non-integer types.
    pub(super) fn make_var(&mut self, ty: Type) -> NodeId {
        if ty.is_integer() {
            self.graph.add(Node::var(ty))
        } else {
            Graph::BAD
        }
    }

    pub(super) fn make_zero(&mut self, ty: Type) -> NodeId {
        self.graph
            .add(Node::expr(ExprOp::Const(Literal::zero(ty)), ty, vec![]))
    }

    /// Builds `node == 0` (or `node != 0` when `equal` is false) over the
    /// node's integer width.
    pub(super) fn make_zero_comp(&mut self, node: NodeId, equal: bool) -> NodeId {
        debug_assert!(!self.graph.is_bad(node));
        let ty = self.graph.wasm_type(node);
        let op = match (ty, equal) {
            (Type::I32, true) => BinaryOp::I32Eq,
            (Type::I32, false) => BinaryOp::I32Ne,
            (Type::I64, true) => BinaryOp::I64Eq,
            (Type::I64, false) => BinaryOp::I64Ne,
            _ => unreachable!("zero comparison over non-integer type {}", ty),
        };
        let value = self.expand_from_i1(node);
        let zero = self.make_zero(ty);
        self.graph
            .add(Node::expr(ExprOp::Binary(op), ty, vec![value, zero]))
    }

    /// If the node returns an i1, wrap it in a Zext so the surrounding
    /// integer context sees a value at its natural width.
    pub(super) fn expand_from_i1(&mut self, node: NodeId) -> NodeId {
        if !self.graph.is_bad(node) && self.graph.returns_i1(node) {
            self.graph.add(Node::zext(node))
        } else {
            node
        }
    }

    /// If the node is not already a predicate, compare it against zero so a
    /// predicate context (if/select condition) gets an i1.
    pub(super) fn ensure_i1(&mut self, node: NodeId) -> NodeId {
        if !self.graph.is_bad(node) && !self.graph.returns_i1(node) {
            self.make_zero_comp(node, false)
        } else {
            node
        }
    }

    // ─── Reachability ────────────────────────────────────────────────────

    pub(super) fn set_in_unreachable(&mut self) {
        self.locals.clear();
    }

    pub(super) fn set_in_reachable(&mut self) {
        self.locals.resize(self.func.num_locals(), Graph::BAD);
    }

    pub(super) fn is_in_unreachable(&self) -> bool {
        self.locals.is_empty()
    }

    fn is_relevant_local(&self, index: u32) -> bool {
        self.func.local_type(index as usize).is_integer()
    }

    // ─── The walk ────────────────────────────────────────────────────────

    pub(super) fn visit(&mut self, id: ExprId) -> NodeId {
        let func = self.func;
        match func.expr(id) {
            Expr::Block { name, list } => self.visit_block(id, name.as_ref(), list),
            Expr::If {
                condition,
                if_true,
                if_false,
            } => self.visit_if(id, *condition, *if_true, *if_false),
            Expr::Loop { name, body } => self.visit_loop(id, name.as_ref(), *body),
            Expr::Break {
                name, condition, ..
            } => self.visit_break(name, condition.is_some()),
            Expr::Switch {
                targets, default, ..
            } => self.visit_switch(targets, default),
            Expr::LocalGet { index } => self.visit_local_get(*index),
            Expr::LocalSet { index, value, .. } => self.visit_local_set(id, *index, *value),
            Expr::Const { value } => self.visit_const(*value),
            Expr::Unary { op, value } => self.visit_unary(*op, *value),
            Expr::Binary { op, left, right } => self.visit_binary(*op, *left, *right),
            Expr::Select {
                condition,
                if_true,
                if_false,
            } => self.visit_select(*condition, *if_true, *if_false),

            // Opaque values: we know the type, nothing else.
            Expr::Call { .. }
            | Expr::CallImport { .. }
            | Expr::CallIndirect { .. }
            | Expr::Load { .. }
            | Expr::GlobalGet { .. } => self.make_var(func.ty(id)),

            // No value of interest.
            Expr::GlobalSet { .. }
            | Expr::Store { .. }
            | Expr::AtomicRmw { .. }
            | Expr::AtomicCmpxchg { .. }
            | Expr::AtomicWait { .. }
            | Expr::AtomicWake { .. }
            | Expr::Drop { .. }
            | Expr::Host { .. }
            | Expr::Nop => Graph::BAD,

            Expr::Return { .. } | Expr::Unreachable => {
                self.set_in_unreachable();
                Graph::BAD
            }
        }
    }

    fn visit_block(&mut self, id: ExprId, name: Option<&Name>, list: &[ExprId]) -> NodeId {
        let old_parent = self.parent;
        self.parent_map.insert(id, old_parent);
        self.parent = Some(id);
        for &child in list {
            self.visit(child);
        }
        // Merge the locals flowing out with every state captured at a
        // branch to this block's label.
        if let Some(name) = name {
            if let Some(mut states) = self.break_states.remove(name) {
                states.push(self.locals.clone());
                self.merge_block(states);
            }
        }
        self.parent = old_parent;
        Graph::BAD
    }

    fn visit_if(
        &mut self,
        id: ExprId,
        condition: ExprId,
        if_true: ExprId,
        if_false: Option<ExprId>,
    ) -> NodeId {
        let old_parent = self.parent;
        self.parent_map.insert(id, old_parent);
        self.parent = Some(id);
        let condition = self.visit(condition);
        let initial_state = self.locals.clone();
        self.visit(if_true);
        let after_if_true_state = self.locals.clone();
        if let Some(if_false) = if_false {
            self.locals = initial_state;
            self.visit(if_false);
            let after_if_false_state = self.locals.clone();
            self.merge_if(after_if_true_state, after_if_false_state, condition, id);
        } else {
            self.merge_if(initial_state, after_if_true_state, condition, id);
        }
        self.parent = old_parent;
        Graph::BAD
    }

    // We avoid loop phis, as a trace that represents a value differing
    // across loop iterations is useless to the downstream consumer. At loop
    // entry every local becomes a fresh Var; after the body we check, per
    // local, whether every path back to the loop header carries either that
    // Var or the pre-loop value. If so the Var was unnecessary and every
    // reference to it (in nodes added since the loop started, and in the
    // outflowing locals) is rewritten to the pre-loop value. Otherwise the
    // Var stays: the loop-carried value is unknown and analysis stops there.
    fn visit_loop(&mut self, id: ExprId, name: Option<&Name>, body: ExprId) -> NodeId {
        let old_parent = self.parent;
        self.parent_map.insert(id, old_parent);
        self.parent = Some(id);
        let name = match name {
            // No label means no branch back, so no phi is possible.
            Some(name) if !self.is_in_unreachable() => name.clone(),
            _ => {
                self.visit(body);
                self.parent = old_parent;
                return Graph::BAD;
            }
        };
        let previous = self.locals.clone();
        let num_locals = self.func.num_locals();
        for i in 0..num_locals {
            self.locals[i] = self.make_var(self.func.local_type(i));
        }
        let vars = self.locals.clone();
        // Only nodes added from here on can reference the new Vars.
        let first_node_from_loop = self.graph.len();
        self.visit(body);
        let breaks = self.break_states.remove(&name).unwrap_or_default();
        for i in 0..num_locals {
            let var = vars[i];
            if self.graph.is_bad(var) {
                // Non-integer local; the sentinel is shared and must not
                // be rewritten.
                continue;
            }
            let proper = previous[i];
            let need_phi = breaks.iter().any(|other| {
                let curr = other[i];
                !self.graph.structurally_equal(curr, var)
                    && !self.graph.structurally_equal(curr, proper)
            });
            if need_phi {
                // Leave the Var; the loop phi is an unknown value to us.
                trace!(local = i, "loop-carried value stays opaque");
                continue;
            }
            self.graph
                .replace_value_refs_from(first_node_from_loop, var, proper);
            for node in &mut self.locals {
                if *node == var {
                    *node = proper;
                }
            }
        }
        self.parent = old_parent;
        Graph::BAD
    }

    fn visit_break(&mut self, name: &Name, has_condition: bool) -> NodeId {
        if !self.is_in_unreachable() {
            self.break_states
                .entry(name.clone())
                .or_default()
                .push(self.locals.clone());
        }
        if !has_condition {
            self.set_in_unreachable();
        }
        Graph::BAD
    }

    fn visit_switch(&mut self, targets: &[Name], default: &Name) -> NodeId {
        if !self.is_in_unreachable() {
            // Each distinct target gets one state, in source order.
            let mut seen = HashSet::new();
            for target in targets.iter().chain(std::iter::once(default)) {
                if seen.insert(target) {
                    self.break_states
                        .entry(target.clone())
                        .or_default()
                        .push(self.locals.clone());
                }
            }
        }
        self.set_in_unreachable();
        Graph::BAD
    }

    fn visit_local_get(&mut self, index: u32) -> NodeId {
        if !self.is_relevant_local(index) || self.is_in_unreachable() {
            return Graph::BAD;
        }
        self.locals[index as usize]
    }

    fn visit_local_set(&mut self, id: ExprId, index: u32, value: ExprId) -> NodeId {
        if !self.is_relevant_local(index) || self.is_in_unreachable() {
            return Graph::BAD;
        }
        self.sets.push(id);
        self.parent_map.insert(id, self.parent);
        let node = self.visit(value);
        self.locals[index as usize] = node;
        self.set_node_map.insert(id, node);
        Graph::BAD
    }

    fn visit_const(&mut self, value: Literal) -> NodeId {
        let ty = value.ty();
        self.graph.add(Node::expr(ExprOp::Const(value), ty, vec![]))
    }

    fn visit_unary(&mut self, op: UnaryOp, value: ExprId) -> NodeId {
        match op {
            UnaryOp::I32Clz
            | UnaryOp::I64Clz
            | UnaryOp::I32Ctz
            | UnaryOp::I64Ctz
            | UnaryOp::I32Popcnt
            | UnaryOp::I64Popcnt => {
                let value = self.visit(value);
                let value = self.expand_from_i1(value);
                if self.graph.is_bad(value) {
                    return value;
                }
                self.graph
                    .add(Node::expr(ExprOp::Unary(op), op.result_type(), vec![value]))
            }
            UnaryOp::I32Eqz | UnaryOp::I64Eqz => {
                // eqz reduces to an equality with zero.
                let value = self.visit(value);
                let value = self.expand_from_i1(value);
                if self.graph.is_bad(value) {
                    return value;
                }
                self.make_zero_comp(value, true)
            }
            // Anything else is an unknown value.
            _ => self.make_var(op.result_type()),
        }
    }

    fn visit_binary(&mut self, op: BinaryOp, left: ExprId, right: ExprId) -> NodeId {
        // Greater-than flavors are redundant for the downstream consumer;
        // rewrite `a Gt b` as `b Lt a` (and Ge as Le) before lifting.
        if let Some(swapped) = op.swapped_comparison() {
            return self.visit_binary(swapped, right, left);
        }
        // The supported set is exactly the integer binaries (arithmetic,
        // bitwise, shifts, rotates, and the normalized comparisons).
        if !op.operand_type().is_integer() {
            return self.make_var(op.result_type());
        }
        let left = self.visit(left);
        let left = self.expand_from_i1(left);
        if self.graph.is_bad(left) {
            return left;
        }
        let right = self.visit(right);
        let right = self.expand_from_i1(right);
        if self.graph.is_bad(right) {
            return right;
        }
        // Comparisons record their operand width; see the node model docs.
        self.graph.add(Node::expr(
            ExprOp::Binary(op),
            op.operand_type(),
            vec![left, right],
        ))
    }

    fn visit_select(&mut self, condition: ExprId, if_true: ExprId, if_false: ExprId) -> NodeId {
        let if_true = self.visit(if_true);
        let if_true = self.expand_from_i1(if_true);
        if self.graph.is_bad(if_true) {
            return if_true;
        }
        let if_false = self.visit(if_false);
        let if_false = self.expand_from_i1(if_false);
        if self.graph.is_bad(if_false) {
            return if_false;
        }
        let condition = self.visit(condition);
        let condition = self.ensure_i1(condition);
        if self.graph.is_bad(condition) {
            return condition;
        }
        let ty = self.graph.wasm_type(if_true);
        self.graph.add(Node::expr(
            ExprOp::Select,
            ty,
            vec![condition, if_true, if_false],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::node::NodeKind;

    fn empty_builder(func: &Function) -> Builder<'_> {
        Builder {
            func,
            graph: Graph::new(),
            sets: Vec::new(),
            set_node_map: HashMap::new(),
            expression_condition_map: HashMap::new(),
            parent_map: HashMap::new(),
            locals: Vec::new(),
            parent: None,
            break_states: HashMap::new(),
        }
    }

    #[test]
    fn test_make_var_is_bad_for_non_integers() {
        let func = Function::new("f", vec![], vec![], Type::None);
        let mut b = empty_builder(&func);
        let v = b.make_var(Type::I32);
        assert!(!b.graph.is_bad(v));
        let v = b.make_var(Type::I64);
        assert!(!b.graph.is_bad(v));
        let v = b.make_var(Type::F32);
        assert!(b.graph.is_bad(v));
        let v = b.make_var(Type::F64);
        assert!(b.graph.is_bad(v));
        let v = b.make_var(Type::None);
        assert!(b.graph.is_bad(v));
    }

    #[test]
    fn test_expand_from_i1_wraps_only_predicates() {
        let func = Function::new("f", vec![], vec![], Type::None);
        let mut b = empty_builder(&func);
        let var = b.make_var(Type::I32);
        assert_eq!(b.expand_from_i1(var), var);

        let cmp = b.make_zero_comp(var, false);
        let expanded = b.expand_from_i1(cmp);
        assert_ne!(expanded, cmp);
        assert!(matches!(b.graph.get(expanded).kind, NodeKind::Zext));
        assert_eq!(b.graph.get(expanded).values, vec![cmp]);

        assert_eq!(b.expand_from_i1(Graph::BAD), Graph::BAD);
    }

    #[test]
    fn test_ensure_i1_is_identity_on_predicates() {
        let func = Function::new("f", vec![], vec![], Type::None);
        let mut b = empty_builder(&func);
        let var = b.make_var(Type::I64);
        let cmp = b.make_zero_comp(var, false);
        assert_eq!(b.ensure_i1(cmp), cmp);

        let ensured = b.ensure_i1(var);
        assert_ne!(ensured, var);
        assert!(b.graph.returns_i1(ensured));
        // The synthesized comparison carries the operand width.
        assert_eq!(b.graph.wasm_type(ensured), Type::I64);

        assert_eq!(b.ensure_i1(Graph::BAD), Graph::BAD);
    }

    #[test]
    fn test_zero_comp_builds_comparison_against_zero() {
        let func = Function::new("f", vec![], vec![], Type::None);
        let mut b = empty_builder(&func);
        let var = b.make_var(Type::I32);
        let eq = b.make_zero_comp(var, true);
        let node = b.graph.get(eq);
        assert!(matches!(
            node.kind,
            NodeKind::Expr {
                op: ExprOp::Binary(BinaryOp::I32Eq),
                ty: Type::I32,
            }
        ));
        assert_eq!(node.values[0], var);
        let NodeKind::Expr {
            op: ExprOp::Const(lit),
            ..
        } = b.graph.get(node.values[1]).kind
        else {
            panic!("second operand must be the zero constant");
        };
        assert_eq!(lit, Literal::I32(0));
    }
}
