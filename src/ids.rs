//! Pre-order traversal, node ID stamping and lookup.
//!
//! All traversals visit a node before its children and children in source
//! order. IDs assigned by [`assign_node_ids`] only mean something relative
//! to the tree they were stamped on and its clones.

use crate::ast::*;

/// Visit every ID-carrying node of `root` in pre-order.
pub fn walk<'a, F>(root: &'a Stmt, f: &mut F)
where
    F: FnMut(NodeRef<'a>),
{
    walk_stmt(root, f);
}

fn walk_stmts<'a, F: FnMut(NodeRef<'a>)>(stmts: &'a [Stmt], f: &mut F) {
    for stmt in stmts {
        walk_stmt(stmt, f);
    }
}

fn walk_exprs<'a, F: FnMut(NodeRef<'a>)>(exprs: &'a [Expr], f: &mut F) {
    for expr in exprs {
        walk_expr(expr, f);
    }
}

fn walk_opt<'a, F: FnMut(NodeRef<'a>)>(expr: Option<&'a Expr>, f: &mut F) {
    if let Some(expr) = expr {
        walk_expr(expr, f);
    }
}

fn walk_params<'a, F: FnMut(NodeRef<'a>)>(params: &'a Parameters, f: &mut F) {
    for param in params.iter() {
        walk_opt(param.annotation.as_ref(), f);
        walk_opt(param.default.as_ref(), f);
    }
}

fn walk_generators<'a, F: FnMut(NodeRef<'a>)>(generators: &'a [Comprehension], f: &mut F) {
    for generator in generators {
        walk_expr(&generator.target, f);
        walk_expr(&generator.iter, f);
        walk_exprs(&generator.ifs, f);
    }
}

fn walk_stmt<'a, F: FnMut(NodeRef<'a>)>(stmt: &'a Stmt, f: &mut F) {
    f(NodeRef::Stmt(stmt));
    match &stmt.kind {
        StmtKind::FunctionDef {
            params,
            body,
            decorators,
            returns,
            ..
        } => {
            walk_exprs(decorators, f);
            walk_params(params, f);
            walk_opt(returns.as_ref(), f);
            walk_stmts(body, f);
        }
        StmtKind::ClassDef {
            bases,
            keywords,
            body,
            decorators,
            ..
        } => {
            walk_exprs(decorators, f);
            walk_exprs(bases, f);
            for keyword in keywords {
                walk_expr(&keyword.value, f);
            }
            walk_stmts(body, f);
        }
        StmtKind::Return(value) => walk_opt(value.as_ref(), f),
        StmtKind::Delete(targets) => walk_exprs(targets, f),
        StmtKind::Assign { targets, value } => {
            walk_exprs(targets, f);
            walk_expr(value, f);
        }
        StmtKind::AugAssign { target, value, .. } => {
            walk_expr(target, f);
            walk_expr(value, f);
        }
        StmtKind::AnnAssign {
            target,
            annotation,
            value,
        } => {
            walk_expr(target, f);
            walk_expr(annotation, f);
            walk_opt(value.as_ref(), f);
        }
        StmtKind::For {
            target,
            iter,
            body,
            orelse,
            ..
        } => {
            walk_expr(target, f);
            walk_expr(iter, f);
            walk_stmts(body, f);
            walk_stmts(orelse, f);
        }
        StmtKind::While { test, body, orelse } | StmtKind::If { test, body, orelse } => {
            walk_expr(test, f);
            walk_stmts(body, f);
            walk_stmts(orelse, f);
        }
        StmtKind::With { items, body, .. } => {
            for item in items {
                walk_expr(&item.context_expr, f);
                walk_opt(item.optional_vars.as_ref(), f);
            }
            walk_stmts(body, f);
        }
        StmtKind::Raise { exc, cause } => {
            walk_opt(exc.as_ref(), f);
            walk_opt(cause.as_ref(), f);
        }
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            walk_stmts(body, f);
            for handler in handlers {
                f(NodeRef::Handler(handler));
                walk_opt(handler.type_.as_ref(), f);
                walk_stmts(&handler.body, f);
            }
            walk_stmts(orelse, f);
            walk_stmts(finalbody, f);
        }
        StmtKind::Assert { test, msg } => {
            walk_expr(test, f);
            walk_opt(msg.as_ref(), f);
        }
        StmtKind::Expr(expr) => walk_expr(expr, f),
        StmtKind::Import(_)
        | StmtKind::ImportFrom { .. }
        | StmtKind::Global(_)
        | StmtKind::Nonlocal(_)
        | StmtKind::Pass
        | StmtKind::Break
        | StmtKind::Continue => {}
    }
}

fn walk_expr<'a, F: FnMut(NodeRef<'a>)>(expr: &'a Expr, f: &mut F) {
    f(NodeRef::Expr(expr));
    match &expr.kind {
        ExprKind::BoolOp { values, .. } => walk_exprs(values, f),
        ExprKind::NamedExpr { target, value } => {
            walk_expr(target, f);
            walk_expr(value, f);
        }
        ExprKind::BinOp { left, right, .. } => {
            walk_expr(left, f);
            walk_expr(right, f);
        }
        ExprKind::UnaryOp { operand, .. } => walk_expr(operand, f),
        ExprKind::Lambda { params, body } => {
            walk_params(params, f);
            walk_expr(body, f);
        }
        ExprKind::IfExp { test, body, orelse } => {
            walk_expr(body, f);
            walk_expr(test, f);
            walk_expr(orelse, f);
        }
        ExprKind::Dict { keys, values } => {
            for (key, value) in keys.iter().zip(values) {
                walk_opt(key.as_ref(), f);
                walk_expr(value, f);
            }
        }
        ExprKind::Set(elts) | ExprKind::List(elts) | ExprKind::Tuple(elts) => walk_exprs(elts, f),
        ExprKind::ListComp { elt, generators }
        | ExprKind::SetComp { elt, generators }
        | ExprKind::GeneratorExp { elt, generators } => {
            walk_expr(elt, f);
            walk_generators(generators, f);
        }
        ExprKind::DictComp {
            key,
            value,
            generators,
        } => {
            walk_expr(key, f);
            walk_expr(value, f);
            walk_generators(generators, f);
        }
        ExprKind::Await(value) | ExprKind::YieldFrom(value) | ExprKind::Starred(value) => {
            walk_expr(value, f)
        }
        ExprKind::Yield(value) => walk_opt(value.as_deref(), f),
        ExprKind::Compare {
            left, comparators, ..
        } => {
            walk_expr(left, f);
            walk_exprs(comparators, f);
        }
        ExprKind::Call {
            func,
            args,
            keywords,
        } => {
            walk_expr(func, f);
            walk_exprs(args, f);
            for keyword in keywords {
                walk_expr(&keyword.value, f);
            }
        }
        ExprKind::Attribute { value, .. } => walk_expr(value, f),
        ExprKind::Subscript { value, slice } => {
            walk_expr(value, f);
            walk_expr(slice, f);
        }
        ExprKind::Slice { lower, upper, step } => {
            walk_opt(lower.as_deref(), f);
            walk_opt(upper.as_deref(), f);
            walk_opt(step.as_deref(), f);
        }
        ExprKind::FormattedString(_) | ExprKind::Constant(_) | ExprKind::Name(_) => {}
    }
}

/// Mutable pre-order traversal. The callback sees a node before the walker
/// descends into it, so overwriting the node in the callback makes the walker
/// descend into the new contents.
pub fn walk_mut<F>(root: &mut Stmt, f: &mut F)
where
    F: FnMut(NodeMut<'_>),
{
    walk_stmt_mut(root, f);
}

fn walk_stmts_mut<F: FnMut(NodeMut<'_>)>(stmts: &mut [Stmt], f: &mut F) {
    for stmt in stmts {
        walk_stmt_mut(stmt, f);
    }
}

fn walk_exprs_mut<F: FnMut(NodeMut<'_>)>(exprs: &mut [Expr], f: &mut F) {
    for expr in exprs {
        walk_expr_mut(expr, f);
    }
}

fn walk_opt_mut<F: FnMut(NodeMut<'_>)>(expr: Option<&mut Expr>, f: &mut F) {
    if let Some(expr) = expr {
        walk_expr_mut(expr, f);
    }
}

fn walk_params_mut<F: FnMut(NodeMut<'_>)>(params: &mut Parameters, f: &mut F) {
    for param in params.iter_mut() {
        walk_opt_mut(param.annotation.as_mut(), f);
        walk_opt_mut(param.default.as_mut(), f);
    }
}

fn walk_generators_mut<F: FnMut(NodeMut<'_>)>(generators: &mut [Comprehension], f: &mut F) {
    for generator in generators {
        walk_expr_mut(&mut generator.target, f);
        walk_expr_mut(&mut generator.iter, f);
        walk_exprs_mut(&mut generator.ifs, f);
    }
}

fn walk_stmt_mut<F: FnMut(NodeMut<'_>)>(stmt: &mut Stmt, f: &mut F) {
    f(NodeMut::Stmt(&mut *stmt));
    match &mut stmt.kind {
        StmtKind::FunctionDef {
            params,
            body,
            decorators,
            returns,
            ..
        } => {
            walk_exprs_mut(decorators, f);
            walk_params_mut(params, f);
            walk_opt_mut(returns.as_mut(), f);
            walk_stmts_mut(body, f);
        }
        StmtKind::ClassDef {
            bases,
            keywords,
            body,
            decorators,
            ..
        } => {
            walk_exprs_mut(decorators, f);
            walk_exprs_mut(bases, f);
            for keyword in keywords {
                walk_expr_mut(&mut keyword.value, f);
            }
            walk_stmts_mut(body, f);
        }
        StmtKind::Return(value) => walk_opt_mut(value.as_mut(), f),
        StmtKind::Delete(targets) => walk_exprs_mut(targets, f),
        StmtKind::Assign { targets, value } => {
            walk_exprs_mut(targets, f);
            walk_expr_mut(value, f);
        }
        StmtKind::AugAssign { target, value, .. } => {
            walk_expr_mut(target, f);
            walk_expr_mut(value, f);
        }
        StmtKind::AnnAssign {
            target,
            annotation,
            value,
        } => {
            walk_expr_mut(target, f);
            walk_expr_mut(annotation, f);
            walk_opt_mut(value.as_mut(), f);
        }
        StmtKind::For {
            target,
            iter,
            body,
            orelse,
            ..
        } => {
            walk_expr_mut(target, f);
            walk_expr_mut(iter, f);
            walk_stmts_mut(body, f);
            walk_stmts_mut(orelse, f);
        }
        StmtKind::While { test, body, orelse } | StmtKind::If { test, body, orelse } => {
            walk_expr_mut(test, f);
            walk_stmts_mut(body, f);
            walk_stmts_mut(orelse, f);
        }
        StmtKind::With { items, body, .. } => {
            for item in items {
                walk_expr_mut(&mut item.context_expr, f);
                walk_opt_mut(item.optional_vars.as_mut(), f);
            }
            walk_stmts_mut(body, f);
        }
        StmtKind::Raise { exc, cause } => {
            walk_opt_mut(exc.as_mut(), f);
            walk_opt_mut(cause.as_mut(), f);
        }
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            walk_stmts_mut(body, f);
            for handler in handlers {
                f(NodeMut::Handler(&mut *handler));
                walk_opt_mut(handler.type_.as_mut(), f);
                walk_stmts_mut(&mut handler.body, f);
            }
            walk_stmts_mut(orelse, f);
            walk_stmts_mut(finalbody, f);
        }
        StmtKind::Assert { test, msg } => {
            walk_expr_mut(test, f);
            walk_opt_mut(msg.as_mut(), f);
        }
        StmtKind::Expr(expr) => walk_expr_mut(expr, f),
        StmtKind::Import(_)
        | StmtKind::ImportFrom { .. }
        | StmtKind::Global(_)
        | StmtKind::Nonlocal(_)
        | StmtKind::Pass
        | StmtKind::Break
        | StmtKind::Continue => {}
    }
}

fn walk_expr_mut<F: FnMut(NodeMut<'_>)>(expr: &mut Expr, f: &mut F) {
    f(NodeMut::Expr(&mut *expr));
    match &mut expr.kind {
        ExprKind::BoolOp { values, .. } => walk_exprs_mut(values, f),
        ExprKind::NamedExpr { target, value } => {
            walk_expr_mut(target, f);
            walk_expr_mut(value, f);
        }
        ExprKind::BinOp { left, right, .. } => {
            walk_expr_mut(left, f);
            walk_expr_mut(right, f);
        }
        ExprKind::UnaryOp { operand, .. } => walk_expr_mut(operand, f),
        ExprKind::Lambda { params, body } => {
            walk_params_mut(params, f);
            walk_expr_mut(body, f);
        }
        ExprKind::IfExp { test, body, orelse } => {
            walk_expr_mut(body, f);
            walk_expr_mut(test, f);
            walk_expr_mut(orelse, f);
        }
        ExprKind::Dict { keys, values } => {
            for (key, value) in keys.iter_mut().zip(values.iter_mut()) {
                walk_opt_mut(key.as_mut(), f);
                walk_expr_mut(value, f);
            }
        }
        ExprKind::Set(elts) | ExprKind::List(elts) | ExprKind::Tuple(elts) => {
            walk_exprs_mut(elts, f)
        }
        ExprKind::ListComp { elt, generators }
        | ExprKind::SetComp { elt, generators }
        | ExprKind::GeneratorExp { elt, generators } => {
            walk_expr_mut(elt, f);
            walk_generators_mut(generators, f);
        }
        ExprKind::DictComp {
            key,
            value,
            generators,
        } => {
            walk_expr_mut(key, f);
            walk_expr_mut(value, f);
            walk_generators_mut(generators, f);
        }
        ExprKind::Await(value) | ExprKind::YieldFrom(value) | ExprKind::Starred(value) => {
            walk_expr_mut(value, f)
        }
        ExprKind::Yield(value) => walk_opt_mut(value.as_deref_mut(), f),
        ExprKind::Compare {
            left, comparators, ..
        } => {
            walk_expr_mut(left, f);
            walk_exprs_mut(comparators, f);
        }
        ExprKind::Call {
            func,
            args,
            keywords,
        } => {
            walk_expr_mut(func, f);
            walk_exprs_mut(args, f);
            for keyword in keywords {
                walk_expr_mut(&mut keyword.value, f);
            }
        }
        ExprKind::Attribute { value, .. } => walk_expr_mut(value, f),
        ExprKind::Subscript { value, slice } => {
            walk_expr_mut(value, f);
            walk_expr_mut(slice, f);
        }
        ExprKind::Slice { lower, upper, step } => {
            walk_opt_mut(lower.as_deref_mut(), f);
            walk_opt_mut(upper.as_deref_mut(), f);
            walk_opt_mut(step.as_deref_mut(), f);
        }
        ExprKind::FormattedString(_) | ExprKind::Constant(_) | ExprKind::Name(_) => {}
    }
}

/// Stamp every node with a consecutive ID starting at 0. Returns the number
/// of nodes stamped.
pub fn assign_node_ids(root: &mut Stmt) -> usize {
    let mut next = 0u32;
    walk_mut(root, &mut |node| {
        let id = Some(NodeId(next));
        next += 1;
        match node {
            NodeMut::Stmt(stmt) => stmt.id = id,
            NodeMut::Expr(expr) => expr.id = id,
            NodeMut::Handler(handler) => handler.id = id,
        }
    });
    next as usize
}

/// Remove every ID from the tree.
pub fn clear_node_ids(root: &mut Stmt) {
    walk_mut(root, &mut |node| match node {
        NodeMut::Stmt(stmt) => stmt.id = None,
        NodeMut::Expr(expr) => expr.id = None,
        NodeMut::Handler(handler) => handler.id = None,
    });
}

/// First node carrying `id`, in pre-order.
pub fn find_node_by_id(root: &Stmt, id: NodeId) -> Option<NodeRef<'_>> {
    let mut found = None;
    walk(root, &mut |node| {
        if found.is_none() && node.id() == Some(id) {
            found = Some(node);
        }
    });
    found
}

/// All nodes of the tree in pre-order.
pub fn collect_nodes(root: &Stmt) -> Vec<NodeRef<'_>> {
    let mut nodes = Vec::new();
    walk(root, &mut |node| nodes.push(node));
    nodes
}

pub fn count_nodes(root: &Stmt) -> usize {
    let mut count = 0;
    walk(root, &mut |_| count += 1);
    count
}

/// Structural equality: same shape and contents, IDs ignored.
pub fn same_structure(a: &Node, b: &Node) -> bool {
    let wrap = |node: &Node| -> Stmt {
        let mut stmt = match node {
            Node::Stmt(stmt) => stmt.clone(),
            Node::Expr(expr) => Stmt::new(StmtKind::Expr(expr.clone())),
            Node::Handler(handler) => Stmt::new(StmtKind::Try {
                body: Vec::new(),
                handlers: vec![handler.clone()],
                orelse: Vec::new(),
                finalbody: Vec::new(),
            }),
        };
        clear_node_ids(&mut stmt);
        stmt
    };
    std::mem::discriminant(a) == std::mem::discriminant(b) && wrap(a) == wrap(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_function;

    #[test]
    fn test_assign_ids_pre_order() {
        let mut tree = parse_function("def f(a, b):\n    return a + b\n").unwrap();
        let count = assign_node_ids(&mut tree);

        // def, return, binop, a, b
        assert_eq!(count, 5);
        let nodes = collect_nodes(&tree);
        let ids: Vec<u32> = nodes.iter().map(|n| n.id().unwrap().0).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);

        match nodes[2] {
            NodeRef::Expr(Expr {
                kind: ExprKind::BinOp { .. },
                ..
            }) => {}
            other => panic!("expected binop at id 2, got {:?}", other),
        }
        match nodes[4] {
            NodeRef::Expr(Expr {
                kind: ExprKind::Name(name),
                ..
            }) => assert_eq!(name, "b"),
            other => panic!("expected name at id 4, got {:?}", other),
        }
    }

    #[test]
    fn test_reassigning_ids_is_consistent() {
        let mut tree = parse_function("def f(x):\n    if x:\n        pass\n").unwrap();
        let first = assign_node_ids(&mut tree);
        let snapshot = tree.clone();
        let second = assign_node_ids(&mut tree);
        assert_eq!(first, second);
        assert_eq!(snapshot, tree);
    }

    #[test]
    fn test_find_node_survives_clone() {
        let mut tree = parse_function("def f(x):\n    return x * 2\n").unwrap();
        assign_node_ids(&mut tree);
        let clone = tree.clone();

        let original = find_node_by_id(&tree, NodeId(3)).unwrap();
        let cloned = find_node_by_id(&clone, NodeId(3)).unwrap();
        assert_eq!(original, cloned);
        assert!(find_node_by_id(&clone, NodeId(99)).is_none());
    }

    #[test]
    fn test_find_node_in_unstamped_tree() {
        let tree = parse_function("def f():\n    pass\n").unwrap();
        assert!(find_node_by_id(&tree, NodeId(0)).is_none());
    }

    #[test]
    fn test_handlers_are_visited() {
        let mut tree = parse_function(
            "def f():\n    try:\n        g()\n    except ValueError:\n        pass\n",
        )
        .unwrap();
        assign_node_ids(&mut tree);
        let handlers = collect_nodes(&tree)
            .into_iter()
            .filter(|n| matches!(n, NodeRef::Handler(_)))
            .count();
        assert_eq!(handlers, 1);
    }

    #[test]
    fn test_same_structure_ignores_ids() {
        let mut stamped = parse_function("def f(a):\n    return a\n").unwrap();
        let plain = stamped.clone();
        assign_node_ids(&mut stamped);
        assert!(same_structure(&Node::Stmt(stamped), &Node::Stmt(plain)));
        assert!(!same_structure(
            &Node::Expr(Expr::name("a")),
            &Node::Expr(Expr::name("b"))
        ));
    }
}
