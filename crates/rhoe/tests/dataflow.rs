//! DataFlow builder integration tests: merge behavior at control joins,
//! loop-phi resolution, reachability tracking, and graph invariants.

use rhoe::dataflow::verify::verify_graph;
use rhoe::dataflow::{ExprOp, Graph, NodeId, NodeKind};
use rhoe::ir::{BinaryOp, Function, Literal, Type};
use rhoe::lift_function;

fn count_kind(graph: &Graph, pred: impl Fn(&NodeKind) -> bool) -> usize {
    graph.iter().filter(|(_, node)| pred(&node.kind)).count()
}

fn count_vars(graph: &Graph) -> usize {
    count_kind(graph, |kind| matches!(kind, NodeKind::Var(_)))
}

fn count_phis(graph: &Graph) -> usize {
    count_kind(graph, |kind| matches!(kind, NodeKind::Phi { .. }))
}

fn count_blocks(graph: &Graph) -> usize {
    count_kind(graph, |kind| matches!(kind, NodeKind::Block))
}

fn any_node_references(graph: &Graph, target: NodeId) -> bool {
    graph.iter().any(|(_, node)| node.values.contains(&target))
}

/// Is there an Expr with this binary operator anywhere in the graph?
fn find_binary(graph: &Graph, op: BinaryOp) -> Option<NodeId> {
    graph
        .iter()
        .find(|(_, node)| {
            matches!(
                node.kind,
                NodeKind::Expr {
                    op: ExprOp::Binary(found),
                    ..
                } if found == op
            )
        })
        .map(|(id, _)| id)
}

// ─── Concrete scenarios ───────────────────────────────────────────────────

#[test]
fn if_with_unchanged_locals_creates_no_phi() {
    // (func (param i32 i32) (if (local.get 0) (nop) (nop)))
    let mut func = Function::new("f", vec![Type::I32, Type::I32], vec![], Type::None);
    let cond = func.local_get(0);
    let t = func.nop();
    let e = func.nop();
    let body = func.if_(cond, t, Some(e), Type::None);
    func.set_body(body);

    let built = lift_function(&func);
    verify_graph(&built.graph).unwrap();

    // One Var per parameter, never shared, and nothing merged.
    assert_eq!(count_vars(&built.graph), 2);
    assert_ne!(built.locals[0], built.locals[1]);
    assert_eq!(count_phis(&built.graph), 0);
    assert_eq!(count_blocks(&built.graph), 0);
    // The arm conditions still exist: x != 0 and x == 0.
    assert!(find_binary(&built.graph, BinaryOp::I32Ne).is_some());
    assert!(find_binary(&built.graph, BinaryOp::I32Eq).is_some());
    let conditions = &built.expression_condition_map[&body];
    assert_eq!(conditions.len(), 2);
    assert!(built.graph.returns_i1(conditions[0]));
    assert!(built.graph.returns_i1(conditions[1]));
}

#[test]
fn divergent_assignment_in_if_creates_phi() {
    // (func (param i32) (local i32)
    //   (if (local.get 0) (local.set 1 (i32.const 1)) (local.set 1 (i32.const 2))))
    let mut func = Function::new("f", vec![Type::I32], vec![Type::I32], Type::None);
    let cond = func.local_get(0);
    let one = func.const_(Literal::I32(1));
    let set1 = func.local_set(1, one);
    let two = func.const_(Literal::I32(2));
    let set2 = func.local_set(1, two);
    let body = func.if_(cond, set1, Some(set2), Type::None);
    func.set_body(body);

    let built = lift_function(&func);
    verify_graph(&built.graph).unwrap();

    assert_eq!(count_blocks(&built.graph), 1);
    assert_eq!(count_phis(&built.graph), 1);

    let (phi_id, phi) = built
        .graph
        .iter()
        .find(|(_, node)| matches!(node.kind, NodeKind::Phi { .. }))
        .unwrap();
    // Two inputs, the constants 1 and 2, lining up with two conditions.
    assert_eq!(phi.values.len(), 2);
    let NodeKind::Phi { block } = phi.kind else {
        unreachable!()
    };
    assert_eq!(built.graph.get(block).values.len(), 2);
    let as_const = |id: NodeId| match built.graph.get(id).kind {
        NodeKind::Expr {
            op: ExprOp::Const(lit),
            ..
        } => lit,
        _ => panic!("phi input is not a constant"),
    };
    assert_eq!(as_const(phi.values[0]), Literal::I32(1));
    assert_eq!(as_const(phi.values[1]), Literal::I32(2));
    // The merged local is the phi.
    assert_eq!(built.locals[1], phi_id);
    // Both sets were recorded, in source order, with their value nodes.
    assert_eq!(built.sets, vec![set1, set2]);
    assert_eq!(as_const(built.set_node_map[&set1]), Literal::I32(1));
    assert_eq!(as_const(built.set_node_map[&set2]), Literal::I32(2));
}

#[test]
fn code_after_unconditional_branch_is_ignored() {
    // (block $l (br $l) (local.set 0 (i32.const 5)))
    let mut func = Function::new("f", vec![], vec![Type::I32], Type::None);
    let br = func.break_("l", None, None);
    let five = func.const_(Literal::I32(5));
    let set = func.local_set(0, five);
    let body = func.block(Some("l".to_string()), vec![br, set], Type::None);
    func.set_body(body);

    let built = lift_function(&func);
    verify_graph(&built.graph).unwrap();

    // The dead set was never recorded and the merge saw one reachable
    // state (the branch's), so no phi formed.
    assert!(built.sets.is_empty());
    assert_eq!(count_phis(&built.graph), 0);
    assert!(!built.locals.is_empty(), "merge must restore reachability");
    // The local still holds its initial zero.
    assert_eq!(
        built.graph.wasm_type(built.locals[0]),
        Type::I32,
    );
    let NodeKind::Expr {
        op: ExprOp::Const(lit),
        ..
    } = built.graph.get(built.locals[0]).kind
    else {
        panic!("local should still be its initial constant");
    };
    assert_eq!(lit, Literal::I32(0));
}

#[test]
fn loop_with_untouched_local_restores_previous_value() {
    // (loop $l (br_if $l (local.get 0)))
    let mut func = Function::new("f", vec![Type::I32], vec![], Type::None);
    let cond = func.local_get(0);
    let br = func.break_("l", None, Some(cond));
    let body = func.loop_(Some("l".to_string()), br, Type::None);
    func.set_body(body);

    let built = lift_function(&func);
    verify_graph(&built.graph).unwrap();

    // The placeholder Var resolved away: the outflowing local is the
    // original parameter Var, and nothing references the placeholder.
    assert_eq!(count_vars(&built.graph), 2); // parameter + placeholder
    let param = built.locals[0];
    assert!(matches!(built.graph.get(param).kind, NodeKind::Var(_)));
    for (id, node) in built.graph.iter() {
        if matches!(node.kind, NodeKind::Var(_)) && id != param {
            assert!(
                !any_node_references(&built.graph, id),
                "loop placeholder must not survive in any node"
            );
        }
    }
}

#[test]
fn loop_with_modified_local_keeps_the_var() {
    // (loop $l (if (local.get 1) (block (local.set 0 (+ (local.get 0) 1)) (br $l))))
    let mut func = Function::new("f", vec![Type::I32, Type::I32], vec![], Type::None);
    let get = func.local_get(0);
    let one = func.const_(Literal::I32(1));
    let add = func.binary(BinaryOp::I32Add, get, one);
    let set = func.local_set(0, add);
    let br = func.break_("l", None, None);
    let then = func.block(None, vec![set, br], Type::None);
    let cond = func.local_get(1);
    let if_ = func.if_(cond, then, None, Type::None);
    let body = func.loop_(Some("l".to_string()), if_, Type::None);
    func.set_body(body);

    let built = lift_function(&func);
    verify_graph(&built.graph).unwrap();

    // Resolution failed for local 0: the loop-entry Var is what flows out.
    let out = built.locals[0];
    assert!(matches!(built.graph.get(out).kind, NodeKind::Var(_)));
    // And the add in the loop body still consumes that Var.
    let add_node = find_binary(&built.graph, BinaryOp::I32Add).unwrap();
    assert!(built.graph.get(add_node).values.contains(&out));
}

#[test]
fn loop_rewrite_recognizes_rematerialized_constants() {
    // A local that is zero on entry and re-zeroed inside the loop does not
    // need a phi, even though the zeros are distinct nodes.
    let mut func = Function::new("f", vec![Type::I32], vec![Type::I32], Type::None);
    let zero = func.const_(Literal::I32(0));
    let set = func.local_set(1, zero);
    let br = func.break_("l", None, None);
    let then = func.block(None, vec![set, br], Type::None);
    let cond = func.local_get(0);
    let if_ = func.if_(cond, then, None, Type::None);
    let body = func.loop_(Some("l".to_string()), if_, Type::None);
    func.set_body(body);

    let built = lift_function(&func);
    verify_graph(&built.graph).unwrap();

    // No node still references the placeholder Var for local 1; every
    // surviving Var is referenced at most as the parameter.
    let vars: Vec<NodeId> = built
        .graph
        .iter()
        .filter(|(_, node)| matches!(node.kind, NodeKind::Var(_)))
        .map(|(id, _)| id)
        .collect();
    // Parameter var + two placeholders (one per local).
    assert_eq!(vars.len(), 3);
    let placeholder_for_local1 = vars[2];
    assert!(!any_node_references(&built.graph, placeholder_for_local1));
}

#[test]
fn gt_rewrites_to_lt_with_swapped_operands() {
    // (i32.gt_s (local.get 0) (local.get 1)) lifts as (i32.lt_s y x).
    let mut func = Function::new("f", vec![Type::I32, Type::I32], vec![], Type::I32);
    let x = func.local_get(0);
    let y = func.local_get(1);
    let cmp = func.binary(BinaryOp::I32GtS, x, y);
    func.set_body(cmp);

    let built = lift_function(&func);
    verify_graph(&built.graph).unwrap();

    assert!(find_binary(&built.graph, BinaryOp::I32GtS).is_none());
    let lt = find_binary(&built.graph, BinaryOp::I32LtS).unwrap();
    let node = built.graph.get(lt);
    // Operand order flipped: y first, then x.
    assert_eq!(node.values, vec![built.locals[1], built.locals[0]]);
}

// ─── If-merge properties ──────────────────────────────────────────────────

#[test]
fn merge_with_one_unreachable_arm_takes_the_other() {
    // (if (local.get 0) (return) (local.set 1 (i32.const 7)))
    let mut func = Function::new("f", vec![Type::I32], vec![Type::I32], Type::None);
    let cond = func.local_get(0);
    let ret = func.return_(None);
    let seven = func.const_(Literal::I32(7));
    let set = func.local_set(1, seven);
    let body = func.if_(cond, ret, Some(set), Type::None);
    func.set_body(body);

    let built = lift_function(&func);
    verify_graph(&built.graph).unwrap();

    assert_eq!(count_phis(&built.graph), 0);
    assert!(!built.locals.is_empty());
    let NodeKind::Expr {
        op: ExprOp::Const(lit),
        ..
    } = built.graph.get(built.locals[1]).kind
    else {
        panic!("local 1 should hold the false arm's constant");
    };
    assert_eq!(lit, Literal::I32(7));
}

#[test]
fn merge_with_both_arms_unreachable_stays_unreachable() {
    let mut func = Function::new("f", vec![Type::I32], vec![], Type::None);
    let cond = func.local_get(0);
    let r1 = func.return_(None);
    let r2 = func.return_(None);
    let body = func.if_(cond, r1, Some(r2), Type::None);
    func.set_body(body);

    let built = lift_function(&func);
    verify_graph(&built.graph).unwrap();
    assert!(built.locals.is_empty());
}

#[test]
fn one_armed_if_merges_against_entry_state() {
    // (if (local.get 0) (local.set 1 (i32.const 3)))
    let mut func = Function::new("f", vec![Type::I32], vec![Type::I32], Type::None);
    let cond = func.local_get(0);
    let three = func.const_(Literal::I32(3));
    let set = func.local_set(1, three);
    let body = func.if_(cond, set, None, Type::None);
    func.set_body(body);

    let built = lift_function(&func);
    verify_graph(&built.graph).unwrap();

    // Local 1 is zero on the fallthrough path and 3 in the arm.
    assert_eq!(count_blocks(&built.graph), 1);
    assert_eq!(count_phis(&built.graph), 1);
    let phi = built.locals[1];
    assert!(matches!(built.graph.get(phi).kind, NodeKind::Phi { .. }));
}

// ─── Bad propagation and opacity ──────────────────────────────────────────

#[test]
fn float_locals_stay_out_of_the_graph() {
    // A float assignment is not recorded and gets no node.
    let mut func = Function::new("f", vec![Type::F64], vec![Type::F64], Type::None);
    let x = func.local_get(0);
    let set = func.local_set(1, x);
    func.set_body(set);

    let built = lift_function(&func);
    verify_graph(&built.graph).unwrap();
    assert!(built.sets.is_empty());
    assert_eq!(count_vars(&built.graph), 0);
}

#[test]
fn call_results_are_opaque_vars() {
    let mut func = Function::new("f", vec![], vec![Type::I32], Type::None);
    let call = func.call(3, vec![], Type::I32);
    let set = func.local_set(0, call);
    func.set_body(set);

    let built = lift_function(&func);
    verify_graph(&built.graph).unwrap();
    assert_eq!(count_vars(&built.graph), 1);
    assert!(matches!(
        built.graph.get(built.locals[0]).kind,
        NodeKind::Var(Type::I32)
    ));
}

#[test]
fn unsupported_operand_degenerates_to_bad() {
    // An i64 add over a float local get: the get is Bad (not an integer
    // local) and poisons the add, and the set records the Bad value.
    let mut func = Function::new("f", vec![Type::F32], vec![Type::I64], Type::None);
    let f = func.local_get(0);
    let g = func.local_get(1);
    let add = func.binary(BinaryOp::I64Add, f, g);
    let set = func.local_set(1, add);
    func.set_body(set);

    let built = lift_function(&func);
    verify_graph(&built.graph).unwrap();
    assert_eq!(built.sets.len(), 1);
    assert!(built.graph.is_bad(built.set_node_map[&built.sets[0]]));
    assert!(built.graph.is_bad(built.locals[1]));
}

#[test]
fn eqz_reduces_to_zero_equality() {
    use rhoe::ir::UnaryOp;
    let mut func = Function::new("f", vec![Type::I64], vec![], Type::I32);
    let x = func.local_get(0);
    let eqz = func.unary(UnaryOp::I64Eqz, x);
    func.set_body(eqz);

    let built = lift_function(&func);
    verify_graph(&built.graph).unwrap();
    let eq = find_binary(&built.graph, BinaryOp::I64Eq).unwrap();
    let node = built.graph.get(eq);
    assert!(built.graph.returns_i1(eq));
    // Second operand is an i64 zero.
    let NodeKind::Expr {
        op: ExprOp::Const(lit),
        ..
    } = built.graph.get(node.values[1]).kind
    else {
        panic!("zero-comparison operand must be a constant");
    };
    assert_eq!(lit, Literal::I64(0));
}

#[test]
fn predicate_used_as_integer_gets_zext() {
    // (local.set 0 (i32.add (i32.lt_s x y) (i32.const 1)))
    let mut func = Function::new("f", vec![Type::I32, Type::I32], vec![Type::I32], Type::None);
    let x = func.local_get(0);
    let y = func.local_get(1);
    let lt = func.binary(BinaryOp::I32LtS, x, y);
    let one = func.const_(Literal::I32(1));
    let add = func.binary(BinaryOp::I32Add, lt, one);
    let set = func.local_set(2, add);
    func.set_body(set);

    let built = lift_function(&func);
    verify_graph(&built.graph).unwrap();

    let add_node = find_binary(&built.graph, BinaryOp::I32Add).unwrap();
    let first = built.graph.get(add_node).values[0];
    assert!(matches!(built.graph.get(first).kind, NodeKind::Zext));
}

// ─── Determinism ──────────────────────────────────────────────────────────

#[test]
fn lifting_is_deterministic() {
    let build = || {
        let mut func = Function::new("f", vec![Type::I32], vec![Type::I32], Type::None);
        let cond = func.local_get(0);
        let one = func.const_(Literal::I32(1));
        let set1 = func.local_set(1, one);
        let two = func.const_(Literal::I32(2));
        let set2 = func.local_set(1, two);
        let body = func.if_(cond, set1, Some(set2), Type::None);
        func.set_body(body);
        let built = lift_function(&func);
        format!("{:?}", built.graph.iter().collect::<Vec<_>>())
    };
    assert_eq!(build(), build());
}
