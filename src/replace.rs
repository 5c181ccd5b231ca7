use crate::ast::{Node, NodeId, NodeMut, Stmt};
use crate::error::{MutationError, Result};
use crate::ids::walk_mut;

/// Put `replacement` in the slot of the first node (pre-order) carrying
/// `target`, wherever that slot is: the root, an element of a body list or a
/// named field of the parent. Everything else in `tree` is left untouched.
///
/// The replacement's root takes over the target's ID so the edited slot can
/// still be found by ID afterwards.
pub fn replace_node(
    tree: &mut Stmt,
    target: NodeId,
    replacement: Node,
) -> Result<()> {
    let mut pending = Some(replacement);
    let mut mismatch = false;

    walk_mut(tree, &mut |node| {
        if pending.is_none() || mismatch {
            return;
        }
        let node_id = match &node {
            NodeMut::Stmt(stmt) => stmt.id,
            NodeMut::Expr(expr) => expr.id,
            NodeMut::Handler(handler) => handler.id,
        };
        if node_id != Some(target) {
            return;
        }
        let Some(mut new_node) = pending.take() else {
            return;
        };
        new_node.set_id(Some(target));
        match (node, new_node) {
            (NodeMut::Stmt(slot), Node::Stmt(stmt)) => *slot = stmt,
            (NodeMut::Expr(slot), Node::Expr(expr)) => *slot = expr,
            (NodeMut::Handler(slot), Node::Handler(handler)) => *slot = handler,
            _ => mismatch = true,
        }
    });

    if mismatch {
        return Err(MutationError::ReplacementMismatch { node_id: target });
    }
    if pending.is_some() {
        return Err(MutationError::CloneIntegrity { node_id: target });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Constant, Expr, StmtKind};
    use crate::ids::{assign_node_ids, find_node_by_id};
    use crate::parser::parse_function;
    use crate::render::render_stmt;

    fn stamped(source: &str) -> Stmt {
        let mut tree = parse_function(source).unwrap();
        assign_node_ids(&mut tree);
        tree
    }

    #[test]
    fn test_replace_named_field() {
        let mut tree = stamped("def f(a, b):\n    return a + b\n");
        // id 2 is the binop under the return
        replace_node(&mut tree, NodeId(2), Node::Expr(Expr::name("a"))).unwrap();
        assert_eq!(render_stmt(&tree).unwrap(), "def f(a, b):\n    return a\n");
    }

    #[test]
    fn test_replace_list_element() {
        let mut tree = stamped("def f():\n    x = 1\n    return x\n");
        replace_node(&mut tree, NodeId(4), Node::Stmt(Stmt::pass())).unwrap();
        assert_eq!(
            render_stmt(&tree).unwrap(),
            "def f():\n    x = 1\n    pass\n"
        );
    }

    #[test]
    fn test_replace_root() {
        let mut tree = stamped("def f():\n    return 1\n");
        let replacement = stamped("def g():\n    pass\n");
        replace_node(&mut tree, NodeId(0), Node::Stmt(replacement)).unwrap();
        assert_eq!(render_stmt(&tree).unwrap(), "def g():\n    pass\n");
        assert_eq!(tree.id, Some(NodeId(0)));
    }

    #[test]
    fn test_equal_subtrees_only_target_replaced() {
        let mut tree = stamped("def f(a):\n    return a + a\n");
        // ids: def 0, return 1, binop 2, a 3, a 4
        replace_node(
            &mut tree,
            NodeId(4),
            Node::Expr(Expr::constant(Constant::int(1))),
        )
        .unwrap();
        assert_eq!(render_stmt(&tree).unwrap(), "def f(a):\n    return a + 1\n");
    }

    #[test]
    fn test_replacement_keeps_target_id() {
        let mut tree = stamped("def f():\n    return 1\n");
        replace_node(&mut tree, NodeId(1), Node::Stmt(Stmt::pass())).unwrap();
        let found = find_node_by_id(&tree, NodeId(1)).unwrap();
        assert_eq!(found.to_owned_node(), {
            let mut pass = Stmt::pass();
            pass.id = Some(NodeId(1));
            Node::Stmt(pass)
        });
    }

    #[test]
    fn test_family_mismatch_is_an_error() {
        let mut tree = stamped("def f():\n    return 1\n");
        let err = replace_node(&mut tree, NodeId(1), Node::Expr(Expr::name("x"))).unwrap_err();
        assert!(matches!(
            err,
            MutationError::ReplacementMismatch { node_id: NodeId(1) }
        ));
    }

    #[test]
    fn test_missing_target_is_an_error() {
        let mut tree = stamped("def f():\n    pass\n");
        let err = replace_node(&mut tree, NodeId(42), Node::Stmt(Stmt::pass())).unwrap_err();
        assert!(matches!(err, MutationError::CloneIntegrity { .. }));
        assert!(matches!(tree.kind, StmtKind::FunctionDef { .. }));
    }
}
