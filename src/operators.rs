use crate::ast::*;
use crate::error::MutationError;
use crate::ids::same_structure;
use num_bigint::BigInt;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Mutation operator codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    /// Arithmetic operator replacement
    Aor,
    /// Arithmetic operator deletion
    Aod,
    /// Augmented assignment replacement
    Asr,
    /// Break/continue replacement
    Bcr,
    /// Logical connector replacement
    Lcr,
    /// Logical operator deletion
    Lod,
    /// Conditional operator insertion
    Coi,
    /// Conditional deletion
    Cod,
    /// Constant replacement
    Crp,
    /// Decorator deletion
    Ddl,
    /// Super call insertion
    Sci,
    /// Exception handler deletion
    Ehd,
    /// Exception swallowing
    Exs,
    /// Logical negation replacement
    Lor,
    /// Relational operator replacement
    Ror,
    /// Super call deletion
    Scd,
    /// Slice index removal
    Sir,
    /// Assignment value replacement
    Asn,
    /// Return statement deletion
    Rsd,
}

impl Operator {
    pub const ALL: [Operator; 19] = [
        Operator::Aor,
        Operator::Aod,
        Operator::Asr,
        Operator::Bcr,
        Operator::Lcr,
        Operator::Lod,
        Operator::Coi,
        Operator::Cod,
        Operator::Crp,
        Operator::Ddl,
        Operator::Sci,
        Operator::Ehd,
        Operator::Exs,
        Operator::Lor,
        Operator::Ror,
        Operator::Scd,
        Operator::Sir,
        Operator::Asn,
        Operator::Rsd,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Operator::Aor => "AOR",
            Operator::Aod => "AOD",
            Operator::Asr => "ASR",
            Operator::Bcr => "BCR",
            Operator::Lcr => "LCR",
            Operator::Lod => "LOD",
            Operator::Coi => "COI",
            Operator::Cod => "COD",
            Operator::Crp => "CRP",
            Operator::Ddl => "DDL",
            Operator::Sci => "SCI",
            Operator::Ehd => "EHD",
            Operator::Exs => "EXS",
            Operator::Lor => "LOR",
            Operator::Ror => "ROR",
            Operator::Scd => "SCD",
            Operator::Sir => "SIR",
            Operator::Asn => "ASN",
            Operator::Rsd => "RSD",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Operator::Aor => "arithmetic operator replacement",
            Operator::Aod => "arithmetic operator deletion",
            Operator::Asr => "augmented assignment replacement",
            Operator::Bcr => "break/continue replacement",
            Operator::Lcr => "logical connector replacement",
            Operator::Lod => "logical operator deletion",
            Operator::Coi => "conditional operator insertion",
            Operator::Cod => "conditional deletion",
            Operator::Crp => "constant replacement",
            Operator::Ddl => "decorator deletion",
            Operator::Sci => "super call insertion",
            Operator::Ehd => "exception handler deletion",
            Operator::Exs => "exception swallowing",
            Operator::Lor => "logical negation replacement",
            Operator::Ror => "relational operator replacement",
            Operator::Scd => "super call deletion",
            Operator::Sir => "slice index removal",
            Operator::Asn => "assignment value replacement",
            Operator::Rsd => "return statement deletion",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Operator {
    type Err = MutationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Operator::ALL
            .iter()
            .copied()
            .find(|op| op.code().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| MutationError::InvalidInput(format!("unknown operator code '{}'", s)))
    }
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// A proposed replacement for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub operator: Operator,
    pub node: Node,
}

impl Candidate {
    fn new(operator: Operator, node: Node) -> Self {
        Self { operator, node }
    }
}

const ARITHMETIC_OPERATORS: [BinOperator; 7] = [
    BinOperator::Add,
    BinOperator::Sub,
    BinOperator::Mult,
    BinOperator::Div,
    BinOperator::Mod,
    BinOperator::Pow,
    BinOperator::FloorDiv,
];

const RELATIONAL_OPERATORS: [CmpOperator; 6] = [
    CmpOperator::Eq,
    CmpOperator::NotEq,
    CmpOperator::Lt,
    CmpOperator::LtE,
    CmpOperator::Gt,
    CmpOperator::GtE,
];

/// Every single-edit replacement the catalog knows for `node`, in emission
/// order. Candidates are pairwise distinct and never equal to `node`.
pub fn generate_mutations(node: NodeRef<'_>) -> Vec<Candidate> {
    let raw = match node {
        NodeRef::Stmt(stmt) => stmt_mutations(stmt),
        NodeRef::Expr(expr) => expr_mutations(expr),
        NodeRef::Handler(handler) => handler_mutations(handler),
    };

    let original = node.to_owned_node();
    let mut candidates: Vec<Candidate> = Vec::with_capacity(raw.len());
    for candidate in raw {
        if same_structure(&candidate.node, &original)
            || candidates
                .iter()
                .any(|seen| same_structure(&seen.node, &candidate.node))
        {
            continue;
        }
        candidates.push(candidate);
    }
    candidates
}

fn stmt_mutations(stmt: &Stmt) -> Vec<Candidate> {
    let mut out = Vec::new();
    let with_kind = |kind: StmtKind| {
        Node::Stmt(Stmt {
            id: stmt.id,
            kind,
        })
    };

    match &stmt.kind {
        StmtKind::FunctionDef {
            name,
            params,
            decorators,
            ..
        } => {
            if !decorators.is_empty() {
                let mut mutated = stmt.clone();
                if let StmtKind::FunctionDef { decorators, .. } = &mut mutated.kind {
                    decorators.clear();
                }
                out.push(Candidate::new(Operator::Ddl, Node::Stmt(mutated)));
            }
            if params.args.first().map(|p| p.name.as_str()) == Some("self") {
                let call = super_call(name, &params.args[1..]);
                let mut mutated = stmt.clone();
                if let StmtKind::FunctionDef { body, .. } = &mut mutated.kind {
                    body.insert(0, Stmt::new(StmtKind::Expr(call)));
                }
                out.push(Candidate::new(Operator::Sci, Node::Stmt(mutated)));
            }
        }
        StmtKind::AugAssign { target, op, value } => {
            for replacement in ARITHMETIC_OPERATORS {
                if replacement != *op {
                    out.push(Candidate::new(
                        Operator::Asr,
                        with_kind(StmtKind::AugAssign {
                            target: target.clone(),
                            op: replacement,
                            value: value.clone(),
                        }),
                    ));
                }
            }
        }
        StmtKind::Break => {
            out.push(Candidate::new(
                Operator::Bcr,
                Node::Stmt(Stmt::new(StmtKind::Continue)),
            ));
        }
        StmtKind::Continue => {
            out.push(Candidate::new(
                Operator::Bcr,
                Node::Stmt(Stmt::new(StmtKind::Break)),
            ));
        }
        StmtKind::If { test, body, orelse } => {
            for (op, constant) in [(BoolOperator::And, true), (BoolOperator::Or, false)] {
                let test = Expr::new(ExprKind::BoolOp {
                    op,
                    values: vec![test.clone(), Expr::constant(Constant::Bool(constant))],
                });
                out.push(Candidate::new(
                    Operator::Coi,
                    with_kind(StmtKind::If {
                        test,
                        body: body.clone(),
                        orelse: orelse.clone(),
                    }),
                ));
            }
            out.push(Candidate::new(Operator::Cod, Node::Stmt(Stmt::pass())));
        }
        StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        } => {
            if !handlers.is_empty() {
                // Without handlers the else suite would be a syntax error;
                // it ran exactly when the body did not raise, so it follows
                // the body. A handler-less try also needs a finally suite.
                let mut body = body.clone();
                body.extend(orelse.iter().cloned());
                let finalbody = if finalbody.is_empty() {
                    vec![Stmt::pass()]
                } else {
                    finalbody.clone()
                };
                out.push(Candidate::new(
                    Operator::Ehd,
                    with_kind(StmtKind::Try {
                        body,
                        handlers: Vec::new(),
                        orelse: Vec::new(),
                        finalbody,
                    }),
                ));
            }
        }
        StmtKind::Assign { targets, value } => {
            if !value.is_none_constant() {
                out.push(Candidate::new(
                    Operator::Asn,
                    with_kind(StmtKind::Assign {
                        targets: targets.clone(),
                        value: Expr::constant(Constant::None),
                    }),
                ));
            }
        }
        StmtKind::Return(_) => {
            out.push(Candidate::new(Operator::Rsd, Node::Stmt(Stmt::pass())));
        }
        _ => {}
    }
    out
}

/// `super().<name>(<rest...>)`
fn super_call(name: &str, rest: &[Param]) -> Expr {
    let super_ = Expr::new(ExprKind::Call {
        func: Box::new(Expr::name("super")),
        args: Vec::new(),
        keywords: Vec::new(),
    });
    Expr::new(ExprKind::Call {
        func: Box::new(Expr::new(ExprKind::Attribute {
            value: Box::new(super_),
            attr: name.to_string(),
        })),
        args: rest.iter().map(|param| Expr::name(param.name.as_str())).collect(),
        keywords: Vec::new(),
    })
}

fn expr_mutations(expr: &Expr) -> Vec<Candidate> {
    let mut out = Vec::new();
    let with_kind = |kind: ExprKind| {
        Node::Expr(Expr {
            id: expr.id,
            kind,
        })
    };

    match &expr.kind {
        ExprKind::BinOp { left, op, right } => {
            for replacement in ARITHMETIC_OPERATORS {
                if replacement != *op {
                    out.push(Candidate::new(
                        Operator::Aor,
                        with_kind(ExprKind::BinOp {
                            left: left.clone(),
                            op: replacement,
                            right: right.clone(),
                        }),
                    ));
                }
            }
            out.push(Candidate::new(Operator::Aod, Node::Expr((**left).clone())));
            out.push(Candidate::new(Operator::Aod, Node::Expr((**right).clone())));
        }
        ExprKind::BoolOp { op, values } => {
            let swapped = match op {
                BoolOperator::And => BoolOperator::Or,
                BoolOperator::Or => BoolOperator::And,
            };
            out.push(Candidate::new(
                Operator::Lcr,
                with_kind(ExprKind::BoolOp {
                    op: swapped,
                    values: values.clone(),
                }),
            ));
            for value in values {
                out.push(Candidate::new(Operator::Lod, Node::Expr(value.clone())));
            }
        }
        ExprKind::Constant(constant) => {
            for replacement in constant_replacements(constant) {
                out.push(Candidate::new(
                    Operator::Crp,
                    Node::Expr(Expr::constant(replacement)),
                ));
            }
        }
        ExprKind::UnaryOp { op, operand } => {
            if *op == UnaryOperator::Not {
                out.push(Candidate::new(Operator::Lor, Node::Expr((**operand).clone())));
            } else {
                out.push(Candidate::new(
                    Operator::Lor,
                    with_kind(ExprKind::UnaryOp {
                        op: UnaryOperator::Not,
                        operand: operand.clone(),
                    }),
                ));
            }
        }
        ExprKind::Compare {
            left,
            ops,
            comparators,
        } => {
            // Only the first link of a chain is swapped.
            let Some(first) = ops.first() else {
                return out;
            };
            for replacement in RELATIONAL_OPERATORS {
                if replacement == *first {
                    continue;
                }
                let mut new_ops = ops.clone();
                new_ops[0] = replacement;
                out.push(Candidate::new(
                    Operator::Ror,
                    with_kind(ExprKind::Compare {
                        left: left.clone(),
                        ops: new_ops,
                        comparators: comparators.clone(),
                    }),
                ));
            }
        }
        ExprKind::Call { func, .. } => {
            if matches!(&func.kind, ExprKind::Name(name) if name == "super") {
                out.push(Candidate::new(
                    Operator::Scd,
                    Node::Expr(Expr::constant(Constant::None)),
                ));
            }
        }
        ExprKind::Subscript { value, slice } => {
            if matches!(slice.kind, ExprKind::Slice { .. }) {
                out.push(Candidate::new(
                    Operator::Sir,
                    with_kind(ExprKind::Subscript {
                        value: value.clone(),
                        slice: Box::new(Expr::constant(Constant::int(0))),
                    }),
                ));
            }
        }
        _ => {}
    }
    out
}

fn handler_mutations(handler: &ExceptHandler) -> Vec<Candidate> {
    let already_swallowed =
        handler.body.len() == 1 && matches!(handler.body[0].kind, StmtKind::Pass);
    if already_swallowed {
        return Vec::new();
    }
    let mut mutated = handler.clone();
    mutated.body = vec![Stmt::pass()];
    vec![Candidate::new(Operator::Exs, Node::Handler(mutated))]
}

/// CRP values for a literal: numbers get {0, 1, -1, v+1, v-1}, strings get
/// {'', 'mutated', v + '_mutated'}, each minus the original value.
fn constant_replacements(constant: &Constant) -> Vec<Constant> {
    let mut values: Vec<Constant> = Vec::new();
    let mut push = |candidate: Constant| {
        if !values.contains(&candidate) {
            values.push(candidate);
        }
    };

    match constant {
        Constant::Int(v) => {
            let candidates = [
                BigInt::from(0),
                BigInt::from(1),
                BigInt::from(-1),
                v + BigInt::from(1),
                v - BigInt::from(1),
            ];
            for c in candidates {
                if c != *v {
                    push(Constant::Int(c));
                }
            }
        }
        Constant::Float(v) => {
            let v = *v;
            for c in [0i64, 1, -1] {
                if c as f64 != v {
                    push(Constant::int(c));
                }
            }
            for c in [v + 1.0, v - 1.0] {
                if c != v {
                    push(Constant::Float(c));
                }
            }
        }
        Constant::Str(v) => {
            for c in [String::new(), "mutated".to_string(), format!("{}_mutated", v)] {
                if c != *v {
                    push(Constant::Str(c));
                }
            }
        }
        _ => {}
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_function;
    use crate::render::{render_expr, render_stmt};

    fn first_body_stmt(src: &str) -> Stmt {
        match parse_function(src).unwrap().kind {
            StmtKind::FunctionDef { mut body, .. } => body.remove(0),
            other => panic!("unexpected {:?}", other),
        }
    }

    fn expr_of(src: &str) -> Expr {
        let source = format!("def f():\n    {}\n", src);
        match first_body_stmt(&source).kind {
            StmtKind::Expr(expr) => expr,
            other => panic!("unexpected {:?}", other),
        }
    }

    fn rendered(candidates: &[Candidate]) -> Vec<String> {
        candidates
            .iter()
            .map(|c| match &c.node {
                Node::Expr(expr) => render_expr(expr).unwrap(),
                Node::Stmt(stmt) => render_stmt(stmt).unwrap(),
                Node::Handler(handler) => format!("{:?}", handler.body),
            })
            .collect()
    }

    #[test]
    fn test_operator_codes_roundtrip() {
        for op in Operator::ALL {
            assert_eq!(op.code().parse::<Operator>().unwrap(), op);
        }
        assert_eq!("ror".parse::<Operator>().unwrap(), Operator::Ror);
        assert!("XYZ".parse::<Operator>().is_err());
        assert_eq!(serde_json::to_string(&Operator::Crp).unwrap(), "\"CRP\"");
    }

    #[test]
    fn test_binop_mutations() {
        let expr = expr_of("a + b");
        let candidates = generate_mutations(NodeRef::Expr(&expr));
        assert_eq!(
            rendered(&candidates),
            vec!["a - b", "a * b", "a / b", "a % b", "a ** b", "a // b", "a", "b"]
        );
        assert_eq!(
            candidates.iter().filter(|c| c.operator == Operator::Aod).count(),
            2
        );
    }

    #[test]
    fn test_bitwise_binop_gets_all_arithmetic_operators() {
        let expr = expr_of("a | b");
        let candidates = generate_mutations(NodeRef::Expr(&expr));
        assert_eq!(
            candidates.iter().filter(|c| c.operator == Operator::Aor).count(),
            7
        );
    }

    #[test]
    fn test_boolop_mutations() {
        let expr = expr_of("a and b");
        assert_eq!(
            rendered(&generate_mutations(NodeRef::Expr(&expr))),
            vec!["a or b", "a", "b"]
        );
    }

    #[test]
    fn test_duplicate_operands_are_collapsed() {
        let expr = expr_of("a and a");
        assert_eq!(
            rendered(&generate_mutations(NodeRef::Expr(&expr))),
            vec!["a or a", "a"]
        );
    }

    #[test]
    fn test_constant_replacements() {
        assert_eq!(
            constant_replacements(&Constant::int(0)),
            vec![Constant::int(1), Constant::int(-1)]
        );
        assert_eq!(
            constant_replacements(&Constant::int(5)),
            vec![
                Constant::int(0),
                Constant::int(1),
                Constant::int(-1),
                Constant::int(6),
                Constant::int(4)
            ]
        );
        let mask = BigInt::from(u64::MAX);
        assert_eq!(
            constant_replacements(&Constant::Int(mask.clone())),
            vec![
                Constant::int(0),
                Constant::int(1),
                Constant::int(-1),
                Constant::Int(&mask + BigInt::from(1)),
                Constant::Int(&mask - BigInt::from(1))
            ]
        );
        assert_eq!(
            constant_replacements(&Constant::Float(1.0)),
            vec![
                Constant::int(0),
                Constant::int(-1),
                Constant::Float(2.0),
                Constant::Float(0.0)
            ]
        );
        assert_eq!(
            constant_replacements(&Constant::Str("mutated".into())),
            vec![Constant::Str(String::new()), Constant::Str("mutated_mutated".into())]
        );
        assert!(constant_replacements(&Constant::Bool(true)).is_empty());
        assert!(constant_replacements(&Constant::None).is_empty());
    }

    #[test]
    fn test_compare_swaps_only_first_operator() {
        let expr = expr_of("a < b < c");
        let out = rendered(&generate_mutations(NodeRef::Expr(&expr)));
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], "a == b < c");
        assert!(out.iter().all(|s| s.ends_with("b < c")));

        let expr = expr_of("a in b");
        assert_eq!(generate_mutations(NodeRef::Expr(&expr)).len(), 6);
    }

    #[test]
    fn test_unary_mutations() {
        let expr = expr_of("not a");
        assert_eq!(rendered(&generate_mutations(NodeRef::Expr(&expr))), vec!["a"]);
        let expr = expr_of("-a");
        assert_eq!(
            rendered(&generate_mutations(NodeRef::Expr(&expr))),
            vec!["not a"]
        );
    }

    #[test]
    fn test_super_and_slice_mutations() {
        let expr = expr_of("super()");
        assert_eq!(
            rendered(&generate_mutations(NodeRef::Expr(&expr))),
            vec!["None"]
        );
        let expr = expr_of("x[1:]");
        assert_eq!(
            rendered(&generate_mutations(NodeRef::Expr(&expr))),
            vec!["x[0]"]
        );
        let expr = expr_of("x[1]");
        assert!(generate_mutations(NodeRef::Expr(&expr)).is_empty());
    }

    #[test]
    fn test_if_mutations() {
        let stmt = first_body_stmt("def f(x):\n    if x:\n        y()\n");
        let out = rendered(&generate_mutations(NodeRef::Stmt(&stmt)));
        assert_eq!(
            out,
            vec![
                "if x and True:\n    y()\n",
                "if x or False:\n    y()\n",
                "pass\n"
            ]
        );
    }

    #[test]
    fn test_function_mutations() {
        let stmt = parse_function("@staticmethod\ndef run(self, a, b):\n    return a\n").unwrap();
        let candidates = generate_mutations(NodeRef::Stmt(&stmt));
        let ops: Vec<Operator> = candidates.iter().map(|c| c.operator).collect();
        assert_eq!(ops, vec![Operator::Ddl, Operator::Sci]);
        let out = rendered(&candidates);
        assert_eq!(out[0], "def run(self, a, b):\n    return a\n");
        assert_eq!(
            out[1],
            "@staticmethod\ndef run(self, a, b):\n    super().run(a, b)\n    return a\n"
        );

        let stmt = parse_function("def run(cls):\n    return 1\n").unwrap();
        assert!(generate_mutations(NodeRef::Stmt(&stmt)).is_empty());
    }

    #[test]
    fn test_try_handler_deletion_keeps_valid_syntax() {
        let stmt = first_body_stmt(
            "def f():\n    try:\n        a()\n    except E:\n        b()\n    else:\n        c()\n",
        );
        let out = rendered(&generate_mutations(NodeRef::Stmt(&stmt)));
        assert_eq!(out, vec!["try:\n    a()\n    c()\nfinally:\n    pass\n"]);
    }

    #[test]
    fn test_exception_swallowing() {
        let stmt = first_body_stmt(
            "def f():\n    try:\n        a()\n    except E:\n        b()\n    except F:\n        pass\n",
        );
        let StmtKind::Try { handlers, .. } = &stmt.kind else {
            panic!("expected try");
        };
        let candidates = generate_mutations(NodeRef::Handler(&handlers[0]));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].operator, Operator::Exs);
        assert!(generate_mutations(NodeRef::Handler(&handlers[1])).is_empty());
    }

    #[test]
    fn test_statement_mutations() {
        let stmt = first_body_stmt("def f():\n    x = 1\n");
        assert_eq!(
            rendered(&generate_mutations(NodeRef::Stmt(&stmt))),
            vec!["x = None\n"]
        );
        let stmt = first_body_stmt("def f():\n    x = None\n");
        assert!(generate_mutations(NodeRef::Stmt(&stmt)).is_empty());

        let stmt = first_body_stmt("def f():\n    x += 1\n");
        assert_eq!(generate_mutations(NodeRef::Stmt(&stmt)).len(), 6);

        let stmt = first_body_stmt("def f():\n    return\n");
        assert_eq!(
            rendered(&generate_mutations(NodeRef::Stmt(&stmt))),
            vec!["pass\n"]
        );

        let stmt = first_body_stmt("def f():\n    for i in x:\n        break\n");
        let StmtKind::For { body, .. } = &stmt.kind else {
            panic!("expected for");
        };
        assert_eq!(
            rendered(&generate_mutations(NodeRef::Stmt(&body[0]))),
            vec!["continue\n"]
        );
    }

    #[test]
    fn test_names_have_no_mutations() {
        let expr = Expr::name("x");
        assert!(generate_mutations(NodeRef::Expr(&expr)).is_empty());
    }
}
