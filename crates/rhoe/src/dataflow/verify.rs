//! Well-formedness checks over a built DataFlow graph.
//!
//! These are the structural guarantees consumers may rely on:
//!
//! - *Bad propagation*: no `Expr` node has a Bad child; an unsupported
//!   operand makes the whole expression Bad at its construction site.
//! - *Type consistency*: an `Expr` node's non-predicate children carry the
//!   node's own integer width; predicate children appear either behind a
//!   Zext or as the first (condition) child of a select.
//! - *Phi arity*: a Phi has exactly one input per condition of its Block,
//!   and none of its inputs is Bad.
//! - *Acyclicity*: child references never form a cycle.

use anyhow::{bail, ensure, Result};

use super::node::{ExprOp, Graph, NodeId, NodeKind};

/// Check every invariant over the whole graph.
pub fn verify_graph(graph: &Graph) -> Result<()> {
    for (id, node) in graph.iter() {
        match &node.kind {
            NodeKind::Bad => {
                ensure!(
                    id == Graph::BAD,
                    "Bad node at index {} duplicates the canonical sentinel",
                    id.0
                );
            }
            NodeKind::Var(ty) => {
                ensure!(
                    ty.is_integer(),
                    "Var node {} has non-integer type {}",
                    id.0,
                    ty
                );
            }
            NodeKind::Expr { op, ty } => {
                for (child_pos, &child) in node.values.iter().enumerate() {
                    ensure!(
                        !graph.is_bad(child),
                        "Expr node {} has a Bad child; Bad must propagate at construction",
                        id.0
                    );
                    let is_select_condition = matches!(op, ExprOp::Select) && child_pos == 0;
                    if is_select_condition {
                        ensure!(
                            graph.returns_i1(child),
                            "select condition of node {} is not a predicate",
                            id.0
                        );
                    } else if matches!(graph.get(child).kind, NodeKind::Zext) {
                        let inner = graph.get(child).values[0];
                        ensure!(
                            graph.returns_i1(inner),
                            "Zext child of node {} does not wrap a predicate",
                            id.0
                        );
                    } else {
                        ensure!(
                            graph.wasm_type(child) == *ty,
                            "child of Expr node {} has type {}, expected {}",
                            id.0,
                            graph.wasm_type(child),
                            ty
                        );
                    }
                }
            }
            NodeKind::Phi { block } => {
                let block_node = graph.get(*block);
                ensure!(
                    matches!(block_node.kind, NodeKind::Block),
                    "Phi node {} does not reference a Block",
                    id.0
                );
                ensure!(
                    node.values.len() == block_node.values.len(),
                    "Phi node {} has {} inputs for {} block conditions",
                    id.0,
                    node.values.len(),
                    block_node.values.len()
                );
                for &input in &node.values {
                    ensure!(
                        !graph.is_bad(input),
                        "Phi node {} has a Bad input; the merge should have been Bad",
                        id.0
                    );
                }
            }
            NodeKind::Cond { block, .. } => {
                ensure!(
                    matches!(graph.get(*block).kind, NodeKind::Block),
                    "Cond node {} does not reference a Block",
                    id.0
                );
                ensure!(
                    node.values.len() == 1,
                    "Cond node {} must have exactly one predicate child",
                    id.0
                );
            }
            NodeKind::Block => {}
            NodeKind::Zext => {
                ensure!(
                    node.values.len() == 1,
                    "Zext node {} must have exactly one child",
                    id.0
                );
                ensure!(
                    graph.returns_i1(node.values[0]),
                    "Zext node {} does not wrap a predicate",
                    id.0
                );
            }
        }
    }
    check_acyclic(graph)
}

/// Depth-first search over child references; a back edge is a cycle.
fn check_acyclic(graph: &Graph) -> Result<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        White,
        Grey,
        Black,
    }
    let mut marks = vec![Mark::White; graph.len()];
    for (root, _) in graph.iter() {
        if marks[root.index()] != Mark::White {
            continue;
        }
        // Iterative DFS: (node, next child position to visit).
        let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];
        marks[root.index()] = Mark::Grey;
        while let Some(frame) = stack.last_mut() {
            let (id, pos) = *frame;
            frame.1 += 1;
            let node = graph.get(id);
            if pos >= node.values.len() {
                marks[id.index()] = Mark::Black;
                stack.pop();
                continue;
            }
            let child = node.values[pos];
            match marks[child.index()] {
                Mark::Grey => bail!("cycle through node {}", child.0),
                Mark::White => {
                    marks[child.index()] = Mark::Grey;
                    stack.push((child, 0));
                }
                Mark::Black => {}
            }
        }
    }
    Ok(())
}
