//! Recursive-descent parser producing [`crate::ast`] trees.
//!
//! Covers the statement and expression forms listed in the crate docs;
//! `match` statements and parenthesised with-items are rejected.

use crate::ast::*;
use crate::error::{MutationError, Result};
use crate::lexer::{tokenize, Tok, Token};
use crate::render::quote_str;

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

const AUGMENTED_OPERATORS: &[&str] = &[
    "+=", "-=", "*=", "@=", "/=", "%=", "**=", "<<=", ">>=", "|=", "^=", "&=", "//=",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// Parse a whole source file.
pub fn parse_module(src: &str) -> Result<Module> {
    Parser::new(src)?.parse_module()
}

/// Parse `src` and return its first top-level function definition.
pub fn parse_function(src: &str) -> Result<Stmt> {
    parse_module(src)?
        .body
        .into_iter()
        .find(|stmt| matches!(stmt.kind, StmtKind::FunctionDef { .. }))
        .ok_or_else(|| MutationError::InvalidInput("no function definition found".to_string()))
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(src: &str) -> Result<Self> {
        Ok(Self {
            tokens: tokenize(src)?,
            pos: 0,
        })
    }

    // ---------- token helpers ----------

    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].kind
    }

    fn peek_at(&self, n: usize) -> &Tok {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn advance(&mut self) -> Tok {
        let tok = self.tokens[self.pos].kind.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, message: impl Into<String>) -> MutationError {
        let token = &self.tokens[self.pos];
        MutationError::Parse {
            line: token.line,
            column: token.column,
            message: message.into(),
        }
    }

    fn unexpected(&self, expected: &str) -> MutationError {
        self.error(format!("expected {}, found {:?}", expected, self.peek()))
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(self.peek(), Tok::Op(o) if *o == op)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Tok::Name(name) if name == keyword)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.at_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", op)))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", keyword)))
        }
    }

    fn expect_name(&mut self) -> Result<String> {
        match self.peek() {
            Tok::Name(name) if !is_keyword(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("a name")),
        }
    }

    fn at_statement_end(&self) -> bool {
        matches!(self.peek(), Tok::Newline | Tok::EndOfFile) || self.at_op(";")
    }

    fn starts_expression(&self) -> bool {
        match self.peek() {
            Tok::Name(name) => {
                !is_keyword(name)
                    || matches!(
                        name.as_str(),
                        "None" | "True" | "False" | "not" | "lambda" | "await" | "yield"
                    )
            }
            Tok::Int(_)
            | Tok::Float(_)
            | Tok::Imaginary(_)
            | Tok::Str(_)
            | Tok::Bytes(_)
            | Tok::FString(_) => true,
            Tok::Op(op) => matches!(*op, "(" | "[" | "{" | "-" | "+" | "~" | "*" | "..."),
            _ => false,
        }
    }

    // ---------- statements ----------

    pub fn parse_module(&mut self) -> Result<Module> {
        let mut body = Vec::new();
        loop {
            match self.peek() {
                Tok::EndOfFile => break,
                Tok::Newline => {
                    self.advance();
                }
                _ => body.extend(self.parse_statement()?),
            }
        }
        Ok(Module { body })
    }

    fn parse_statement(&mut self) -> Result<Vec<Stmt>> {
        let compound = match self.peek() {
            Tok::Op("@") => Some(self.parse_decorated()?),
            Tok::Name(word) => match word.as_str() {
                "def" => Some(self.parse_function_def(Vec::new(), false)?),
                "class" => Some(self.parse_class_def(Vec::new())?),
                "if" => {
                    self.advance();
                    Some(self.parse_if_rest()?)
                }
                "while" => Some(self.parse_while()?),
                "for" => Some(self.parse_for(false)?),
                "try" => Some(self.parse_try()?),
                "with" => Some(self.parse_with(false)?),
                "async" => Some(self.parse_async(Vec::new())?),
                _ => None,
            },
            _ => None,
        };
        match compound {
            Some(stmt) => Ok(vec![stmt]),
            None => self.parse_simple_statements(),
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.expect_op(":")?;
        if !matches!(self.peek(), Tok::Newline) {
            return self.parse_simple_statements();
        }
        self.advance();
        if !matches!(self.peek(), Tok::Indent) {
            return Err(self.unexpected("an indented block"));
        }
        self.advance();
        let mut body = Vec::new();
        loop {
            match self.peek() {
                Tok::Dedent => {
                    self.advance();
                    break;
                }
                Tok::EndOfFile => break,
                _ => body.extend(self.parse_statement()?),
            }
        }
        Ok(body)
    }

    fn parse_simple_statements(&mut self) -> Result<Vec<Stmt>> {
        let mut stmts = vec![self.parse_small_statement()?];
        while self.eat_op(";") {
            if matches!(self.peek(), Tok::Newline | Tok::EndOfFile) {
                break;
            }
            stmts.push(self.parse_small_statement()?);
        }
        match self.peek() {
            Tok::Newline => {
                self.advance();
            }
            Tok::EndOfFile => {}
            _ => return Err(self.unexpected("end of statement")),
        }
        Ok(stmts)
    }

    fn parse_small_statement(&mut self) -> Result<Stmt> {
        let keyword = match self.peek() {
            Tok::Name(word) if is_keyword(word) => Some(word.clone()),
            _ => None,
        };
        let kind = match keyword.as_deref() {
            Some("pass") => {
                self.advance();
                StmtKind::Pass
            }
            Some("break") => {
                self.advance();
                StmtKind::Break
            }
            Some("continue") => {
                self.advance();
                StmtKind::Continue
            }
            Some("return") => {
                self.advance();
                if self.at_statement_end() {
                    StmtKind::Return(None)
                } else {
                    StmtKind::Return(Some(self.parse_star_expressions()?))
                }
            }
            Some("raise") => {
                self.advance();
                let exc = if self.at_statement_end() {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                let cause = if exc.is_some() && self.eat_keyword("from") {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                StmtKind::Raise { exc, cause }
            }
            Some("global") | Some("nonlocal") => {
                self.advance();
                let mut names = vec![self.expect_name()?];
                while self.eat_op(",") {
                    names.push(self.expect_name()?);
                }
                if keyword.as_deref() == Some("global") {
                    StmtKind::Global(names)
                } else {
                    StmtKind::Nonlocal(names)
                }
            }
            Some("del") => {
                self.advance();
                let mut targets = vec![self.parse_bitwise_or()?];
                while self.eat_op(",") {
                    if self.at_statement_end() {
                        break;
                    }
                    targets.push(self.parse_bitwise_or()?);
                }
                StmtKind::Delete(targets)
            }
            Some("assert") => {
                self.advance();
                let test = self.parse_expression()?;
                let msg = if self.eat_op(",") {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                StmtKind::Assert { test, msg }
            }
            Some("import") => {
                self.advance();
                let mut names = vec![self.parse_alias(true)?];
                while self.eat_op(",") {
                    names.push(self.parse_alias(true)?);
                }
                StmtKind::Import(names)
            }
            Some("from") => self.parse_import_from()?,
            _ => return self.parse_expression_statement(),
        };
        Ok(Stmt::new(kind))
    }

    fn parse_dotted_name(&mut self) -> Result<String> {
        let mut name = self.expect_name()?;
        while self.eat_op(".") {
            name.push('.');
            name.push_str(&self.expect_name()?);
        }
        Ok(name)
    }

    fn parse_alias(&mut self, dotted: bool) -> Result<Alias> {
        let name = if dotted {
            self.parse_dotted_name()?
        } else {
            self.expect_name()?
        };
        let asname = if self.eat_keyword("as") {
            Some(self.expect_name()?)
        } else {
            None
        };
        Ok(Alias { name, asname })
    }

    fn parse_import_from(&mut self) -> Result<StmtKind> {
        self.expect_keyword("from")?;
        let mut level = 0;
        loop {
            if self.eat_op(".") {
                level += 1;
            } else if self.eat_op("...") {
                level += 3;
            } else {
                break;
            }
        }
        let module = if self.at_keyword("import") {
            None
        } else {
            Some(self.parse_dotted_name()?)
        };
        self.expect_keyword("import")?;

        let names = if self.eat_op("*") {
            vec![Alias {
                name: "*".to_string(),
                asname: None,
            }]
        } else {
            let parenthesized = self.eat_op("(");
            let mut names = vec![self.parse_alias(false)?];
            while self.eat_op(",") {
                if parenthesized && self.at_op(")") {
                    break;
                }
                names.push(self.parse_alias(false)?);
            }
            if parenthesized {
                self.expect_op(")")?;
            }
            names
        };
        Ok(StmtKind::ImportFrom {
            module,
            names,
            level,
        })
    }

    fn parse_assignment_value(&mut self) -> Result<Expr> {
        if self.at_keyword("yield") {
            self.parse_yield()
        } else {
            self.parse_star_expressions()
        }
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt> {
        let first = self.parse_assignment_value()?;

        if self.eat_op(":") {
            let annotation = self.parse_expression()?;
            let value = if self.eat_op("=") {
                Some(self.parse_assignment_value()?)
            } else {
                None
            };
            return Ok(Stmt::new(StmtKind::AnnAssign {
                target: first,
                annotation,
                value,
            }));
        }

        if let Tok::Op(op) = *self.peek() {
            if AUGMENTED_OPERATORS.contains(&op) {
                let symbol = op.trim_end_matches('=');
                let op = BinOperator::from_symbol(symbol)
                    .ok_or_else(|| self.error(format!("unknown operator {}", symbol)))?;
                self.advance();
                let value = self.parse_assignment_value()?;
                return Ok(Stmt::new(StmtKind::AugAssign {
                    target: first,
                    op,
                    value,
                }));
            }
        }

        if self.at_op("=") {
            let mut targets = vec![first];
            while self.eat_op("=") {
                targets.push(self.parse_assignment_value()?);
            }
            let value = targets.pop().ok_or_else(|| self.unexpected("a value"))?;
            return Ok(Stmt::new(StmtKind::Assign { targets, value }));
        }

        Ok(Stmt::new(StmtKind::Expr(first)))
    }

    fn parse_decorated(&mut self) -> Result<Stmt> {
        let mut decorators = Vec::new();
        while self.eat_op("@") {
            decorators.push(self.parse_named_expression()?);
            if !matches!(self.peek(), Tok::Newline) {
                return Err(self.unexpected("newline after decorator"));
            }
            self.advance();
        }
        if self.at_keyword("def") {
            self.parse_function_def(decorators, false)
        } else if self.at_keyword("class") {
            self.parse_class_def(decorators)
        } else if self.at_keyword("async") {
            self.parse_async(decorators)
        } else {
            Err(self.unexpected("'def' or 'class' after decorators"))
        }
    }

    fn parse_async(&mut self, decorators: Vec<Expr>) -> Result<Stmt> {
        self.expect_keyword("async")?;
        if self.at_keyword("def") {
            self.parse_function_def(decorators, true)
        } else if !decorators.is_empty() {
            Err(self.unexpected("'def' after decorators"))
        } else if self.at_keyword("for") {
            self.parse_for(true)
        } else if self.at_keyword("with") {
            self.parse_with(true)
        } else {
            Err(self.unexpected("'def', 'for' or 'with' after 'async'"))
        }
    }

    fn parse_function_def(&mut self, decorators: Vec<Expr>, is_async: bool) -> Result<Stmt> {
        self.expect_keyword("def")?;
        let name = self.expect_name()?;
        self.expect_op("(")?;
        let params = self.parse_parameters(")", true)?;
        self.expect_op(")")?;
        let returns = if self.eat_op("->") {
            Some(self.parse_expression()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        Ok(Stmt::new(StmtKind::FunctionDef {
            name,
            params,
            body,
            decorators,
            returns,
            is_async,
        }))
    }

    fn parse_param(&mut self, annotated: bool, with_default: bool) -> Result<Param> {
        let mut param = Param::new(self.expect_name()?);
        if annotated && self.eat_op(":") {
            param.annotation = Some(self.parse_expression()?);
        }
        if with_default && self.eat_op("=") {
            param.default = Some(self.parse_expression()?);
        }
        Ok(param)
    }

    fn parse_parameters(&mut self, closing: &str, annotated: bool) -> Result<Parameters> {
        let mut params = Parameters::default();
        let mut keyword_only = false;
        while !self.at_op(closing) {
            if self.eat_op("/") {
                params.posonly = std::mem::take(&mut params.args);
            } else if self.eat_op("**") {
                params.kwarg = Some(self.parse_param(annotated, false)?);
            } else if self.eat_op("*") {
                keyword_only = true;
                if matches!(self.peek(), Tok::Name(_)) {
                    params.vararg = Some(self.parse_param(annotated, false)?);
                }
            } else {
                let param = self.parse_param(annotated, true)?;
                if keyword_only {
                    params.kwonly.push(param);
                } else {
                    params.args.push(param);
                }
            }
            if !self.eat_op(",") {
                break;
            }
        }
        Ok(params)
    }

    fn parse_class_def(&mut self, decorators: Vec<Expr>) -> Result<Stmt> {
        self.expect_keyword("class")?;
        let name = self.expect_name()?;
        let (bases, keywords) = if self.eat_op("(") {
            self.parse_call_arguments()?
        } else {
            (Vec::new(), Vec::new())
        };
        let body = self.parse_block()?;
        Ok(Stmt::new(StmtKind::ClassDef {
            name,
            bases,
            keywords,
            body,
            decorators,
        }))
    }

    /// Parse the rest of an `if`/`elif` whose keyword was already consumed.
    fn parse_if_rest(&mut self) -> Result<Stmt> {
        let test = self.parse_named_expression()?;
        let body = self.parse_block()?;
        let orelse = if self.eat_keyword("elif") {
            vec![self.parse_if_rest()?]
        } else if self.eat_keyword("else") {
            self.parse_block()?
        } else {
            Vec::new()
        };
        Ok(Stmt::new(StmtKind::If { test, body, orelse }))
    }

    fn parse_while(&mut self) -> Result<Stmt> {
        self.expect_keyword("while")?;
        let test = self.parse_named_expression()?;
        let body = self.parse_block()?;
        let orelse = if self.eat_keyword("else") {
            self.parse_block()?
        } else {
            Vec::new()
        };
        Ok(Stmt::new(StmtKind::While { test, body, orelse }))
    }

    fn parse_for(&mut self, is_async: bool) -> Result<Stmt> {
        self.expect_keyword("for")?;
        let target = self.parse_target_list()?;
        self.expect_keyword("in")?;
        let iter = self.parse_star_expressions()?;
        let body = self.parse_block()?;
        let orelse = if self.eat_keyword("else") {
            self.parse_block()?
        } else {
            Vec::new()
        };
        Ok(Stmt::new(StmtKind::For {
            target,
            iter,
            body,
            orelse,
            is_async,
        }))
    }

    fn parse_try(&mut self) -> Result<Stmt> {
        self.expect_keyword("try")?;
        let body = self.parse_block()?;
        let mut handlers = Vec::new();
        while self.eat_keyword("except") {
            let type_ = if self.at_op(":") {
                None
            } else {
                Some(self.parse_expression()?)
            };
            let name = if type_.is_some() && self.eat_keyword("as") {
                Some(self.expect_name()?)
            } else {
                None
            };
            let body = self.parse_block()?;
            handlers.push(ExceptHandler {
                id: None,
                type_,
                name,
                body,
            });
        }
        let orelse = if !handlers.is_empty() && self.eat_keyword("else") {
            self.parse_block()?
        } else {
            Vec::new()
        };
        let finalbody = if self.eat_keyword("finally") {
            self.parse_block()?
        } else {
            Vec::new()
        };
        if handlers.is_empty() && finalbody.is_empty() {
            return Err(self.unexpected("'except' or 'finally'"));
        }
        Ok(Stmt::new(StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        }))
    }

    fn parse_with(&mut self, is_async: bool) -> Result<Stmt> {
        self.expect_keyword("with")?;
        let mut items = Vec::new();
        loop {
            let context_expr = self.parse_expression()?;
            let optional_vars = if self.eat_keyword("as") {
                Some(self.parse_star_target()?)
            } else {
                None
            };
            items.push(WithItem {
                context_expr,
                optional_vars,
            });
            if !self.eat_op(",") {
                break;
            }
        }
        let body = self.parse_block()?;
        Ok(Stmt::new(StmtKind::With {
            items,
            body,
            is_async,
        }))
    }

    // ---------- expressions ----------

    fn parse_star_expressions(&mut self) -> Result<Expr> {
        let first = self.parse_star_expression()?;
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if !self.starts_expression() {
                break;
            }
            elts.push(self.parse_star_expression()?);
        }
        Ok(Expr::new(ExprKind::Tuple(elts)))
    }

    fn parse_star_expression(&mut self) -> Result<Expr> {
        if self.eat_op("*") {
            let value = self.parse_bitwise_or()?;
            return Ok(Expr::new(ExprKind::Starred(Box::new(value))));
        }
        self.parse_named_expression()
    }

    fn parse_named_expression(&mut self) -> Result<Expr> {
        let is_walrus = matches!(self.peek(), Tok::Name(name) if !is_keyword(name))
            && matches!(self.peek_at(1), Tok::Op(":="));
        if is_walrus {
            let target = Expr::name(self.expect_name()?);
            self.expect_op(":=")?;
            let value = self.parse_expression()?;
            return Ok(Expr::new(ExprKind::NamedExpr {
                target: Box::new(target),
                value: Box::new(value),
            }));
        }
        self.parse_expression()
    }

    fn parse_expression(&mut self) -> Result<Expr> {
        if self.at_keyword("lambda") {
            return self.parse_lambda();
        }
        let body = self.parse_disjunction()?;
        if !self.eat_keyword("if") {
            return Ok(body);
        }
        let test = self.parse_disjunction()?;
        self.expect_keyword("else")?;
        let orelse = self.parse_expression()?;
        Ok(Expr::new(ExprKind::IfExp {
            test: Box::new(test),
            body: Box::new(body),
            orelse: Box::new(orelse),
        }))
    }

    fn parse_lambda(&mut self) -> Result<Expr> {
        self.expect_keyword("lambda")?;
        let params = self.parse_parameters(":", false)?;
        self.expect_op(":")?;
        let body = self.parse_expression()?;
        Ok(Expr::new(ExprKind::Lambda {
            params: Box::new(params),
            body: Box::new(body),
        }))
    }

    fn parse_bool_chain(
        &mut self,
        keyword: &str,
        op: BoolOperator,
        next: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let first = next(self)?;
        if !self.at_keyword(keyword) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat_keyword(keyword) {
            values.push(next(self)?);
        }
        Ok(Expr::new(ExprKind::BoolOp { op, values }))
    }

    fn parse_disjunction(&mut self) -> Result<Expr> {
        self.parse_bool_chain("or", BoolOperator::Or, Self::parse_conjunction)
    }

    fn parse_conjunction(&mut self) -> Result<Expr> {
        self.parse_bool_chain("and", BoolOperator::And, Self::parse_inversion)
    }

    fn parse_inversion(&mut self) -> Result<Expr> {
        if self.eat_keyword("not") {
            let operand = self.parse_inversion()?;
            return Ok(Expr::new(ExprKind::UnaryOp {
                op: UnaryOperator::Not,
                operand: Box::new(operand),
            }));
        }
        self.parse_comparison()
    }

    fn comparison_operator(&mut self) -> Option<CmpOperator> {
        let op = match self.peek() {
            Tok::Op("==") => CmpOperator::Eq,
            Tok::Op("!=") => CmpOperator::NotEq,
            Tok::Op("<") => CmpOperator::Lt,
            Tok::Op("<=") => CmpOperator::LtE,
            Tok::Op(">") => CmpOperator::Gt,
            Tok::Op(">=") => CmpOperator::GtE,
            Tok::Name(word) if word == "in" => CmpOperator::In,
            Tok::Name(word) if word == "is" => {
                self.advance();
                return Some(if self.eat_keyword("not") {
                    CmpOperator::IsNot
                } else {
                    CmpOperator::Is
                });
            }
            Tok::Name(word)
                if word == "not" && matches!(self.peek_at(1), Tok::Name(next) if next == "in") =>
            {
                self.advance();
                self.advance();
                return Some(CmpOperator::NotIn);
            }
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_bitwise_or()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        while let Some(op) = self.comparison_operator() {
            ops.push(op);
            comparators.push(self.parse_bitwise_or()?);
        }
        if ops.is_empty() {
            return Ok(left);
        }
        Ok(Expr::new(ExprKind::Compare {
            left: Box::new(left),
            ops,
            comparators,
        }))
    }

    fn parse_binary_level(
        &mut self,
        symbols: &[&str],
        next: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut left = next(self)?;
        loop {
            let op = match self.peek() {
                Tok::Op(symbol) if symbols.contains(symbol) => BinOperator::from_symbol(symbol),
                _ => None,
            };
            let Some(op) = op else { break };
            self.advance();
            let right = next(self)?;
            left = Expr::new(ExprKind::BinOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_bitwise_or(&mut self) -> Result<Expr> {
        self.parse_binary_level(&["|"], Self::parse_bitwise_xor)
    }

    fn parse_bitwise_xor(&mut self) -> Result<Expr> {
        self.parse_binary_level(&["^"], Self::parse_bitwise_and)
    }

    fn parse_bitwise_and(&mut self) -> Result<Expr> {
        self.parse_binary_level(&["&"], Self::parse_shift)
    }

    fn parse_shift(&mut self) -> Result<Expr> {
        self.parse_binary_level(&["<<", ">>"], Self::parse_arith)
    }

    fn parse_arith(&mut self) -> Result<Expr> {
        self.parse_binary_level(&["+", "-"], Self::parse_term)
    }

    fn parse_term(&mut self) -> Result<Expr> {
        self.parse_binary_level(&["*", "/", "//", "%", "@"], Self::parse_factor)
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Tok::Op("+") => Some(UnaryOperator::UAdd),
            Tok::Op("-") => Some(UnaryOperator::USub),
            Tok::Op("~") => Some(UnaryOperator::Invert),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_factor()?;
            return Ok(Expr::new(ExprKind::UnaryOp {
                op,
                operand: Box::new(operand),
            }));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let base = if self.eat_keyword("await") {
            let value = self.parse_primary()?;
            Expr::new(ExprKind::Await(Box::new(value)))
        } else {
            self.parse_primary()?
        };
        if !self.eat_op("**") {
            return Ok(base);
        }
        let exponent = self.parse_factor()?;
        Ok(Expr::new(ExprKind::BinOp {
            left: Box::new(base),
            op: BinOperator::Pow,
            right: Box::new(exponent),
        }))
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let mut expr = self.parse_atom()?;
        loop {
            if self.eat_op(".") {
                let attr = self.expect_name()?;
                expr = Expr::new(ExprKind::Attribute {
                    value: Box::new(expr),
                    attr,
                });
            } else if self.eat_op("(") {
                let (args, keywords) = self.parse_call_arguments()?;
                expr = Expr::new(ExprKind::Call {
                    func: Box::new(expr),
                    args,
                    keywords,
                });
            } else if self.eat_op("[") {
                let slice = self.parse_slices()?;
                expr = Expr::new(ExprKind::Subscript {
                    value: Box::new(expr),
                    slice: Box::new(slice),
                });
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Arguments after an opening `(`, consuming the closing `)`.
    fn parse_call_arguments(&mut self) -> Result<(Vec<Expr>, Vec<Keyword>)> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        while !self.at_op(")") {
            if self.eat_op("*") {
                let value = self.parse_expression()?;
                args.push(Expr::new(ExprKind::Starred(Box::new(value))));
            } else if self.eat_op("**") {
                keywords.push(Keyword {
                    arg: None,
                    value: self.parse_expression()?,
                });
            } else if matches!(self.peek(), Tok::Name(name) if !is_keyword(name))
                && matches!(self.peek_at(1), Tok::Op("="))
            {
                let arg = self.expect_name()?;
                self.expect_op("=")?;
                keywords.push(Keyword {
                    arg: Some(arg),
                    value: self.parse_expression()?,
                });
            } else {
                let value = self.parse_named_expression()?;
                if self.at_comprehension() {
                    let generators = self.parse_comprehensions()?;
                    args.push(Expr::new(ExprKind::GeneratorExp {
                        elt: Box::new(value),
                        generators,
                    }));
                } else {
                    args.push(value);
                }
            }
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op(")")?;
        Ok((args, keywords))
    }

    /// Subscript contents after an opening `[`, consuming the closing `]`.
    fn parse_slices(&mut self) -> Result<Expr> {
        let first = self.parse_slice()?;
        if !self.at_op(",") {
            self.expect_op("]")?;
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if self.at_op("]") {
                break;
            }
            elts.push(self.parse_slice()?);
        }
        self.expect_op("]")?;
        Ok(Expr::new(ExprKind::Tuple(elts)))
    }

    fn parse_slice(&mut self) -> Result<Expr> {
        let lower = if self.at_op(":") {
            None
        } else {
            let value = self.parse_star_expression()?;
            if !self.at_op(":") {
                return Ok(value);
            }
            Some(Box::new(value))
        };
        self.expect_op(":")?;
        let bound_follows = |parser: &Self| !(parser.at_op(":") || parser.at_op("]") || parser.at_op(","));
        let upper = if bound_follows(self) {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        let step = if self.eat_op(":") && bound_follows(self) {
            Some(Box::new(self.parse_expression()?))
        } else {
            None
        };
        Ok(Expr::new(ExprKind::Slice { lower, upper, step }))
    }

    fn at_comprehension(&self) -> bool {
        self.at_keyword("for")
            || (self.at_keyword("async") && matches!(self.peek_at(1), Tok::Name(n) if n == "for"))
    }

    fn parse_comprehensions(&mut self) -> Result<Vec<Comprehension>> {
        let mut generators = Vec::new();
        while self.at_comprehension() {
            let is_async = self.eat_keyword("async");
            self.expect_keyword("for")?;
            let target = self.parse_target_list()?;
            self.expect_keyword("in")?;
            let iter = self.parse_disjunction()?;
            let mut ifs = Vec::new();
            while self.eat_keyword("if") {
                ifs.push(self.parse_disjunction()?);
            }
            generators.push(Comprehension {
                target,
                iter,
                ifs,
                is_async,
            });
        }
        Ok(generators)
    }

    fn parse_star_target(&mut self) -> Result<Expr> {
        if self.eat_op("*") {
            let value = self.parse_bitwise_or()?;
            return Ok(Expr::new(ExprKind::Starred(Box::new(value))));
        }
        self.parse_bitwise_or()
    }

    fn parse_target_list(&mut self) -> Result<Expr> {
        let first = self.parse_star_target()?;
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if self.at_keyword("in") || self.at_op("=") {
                break;
            }
            elts.push(self.parse_star_target()?);
        }
        Ok(Expr::new(ExprKind::Tuple(elts)))
    }

    fn parse_yield(&mut self) -> Result<Expr> {
        self.expect_keyword("yield")?;
        if self.eat_keyword("from") {
            let value = self.parse_expression()?;
            return Ok(Expr::new(ExprKind::YieldFrom(Box::new(value))));
        }
        let value = if self.starts_expression() {
            Some(Box::new(self.parse_star_expressions()?))
        } else {
            None
        };
        Ok(Expr::new(ExprKind::Yield(value)))
    }

    fn parse_strings(&mut self) -> Result<Expr> {
        let mut text = String::new();
        let mut bytes: Vec<u8> = Vec::new();
        let mut pieces: Vec<String> = Vec::new();
        let mut saw_bytes = false;
        let mut saw_text = false;
        let mut formatted = false;

        loop {
            match self.peek().clone() {
                Tok::Str(value) => {
                    saw_text = true;
                    pieces.push(quote_str(&value));
                    text.push_str(&value);
                }
                Tok::FString(raw) => {
                    saw_text = true;
                    formatted = true;
                    pieces.push(raw);
                }
                Tok::Bytes(value) => {
                    saw_bytes = true;
                    bytes.extend(value);
                }
                _ => break,
            }
            self.advance();
        }

        if saw_bytes && saw_text {
            return Err(self.error("cannot mix bytes and nonbytes literals"));
        }
        let kind = if formatted {
            ExprKind::FormattedString(pieces.join(" "))
        } else if saw_bytes {
            ExprKind::Constant(Constant::Bytes(bytes))
        } else {
            ExprKind::Constant(Constant::Str(text))
        };
        Ok(Expr::new(kind))
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        match self.peek().clone() {
            Tok::Name(word) => {
                let constant = match word.as_str() {
                    "None" => Some(Constant::None),
                    "True" => Some(Constant::Bool(true)),
                    "False" => Some(Constant::Bool(false)),
                    _ => None,
                };
                if let Some(constant) = constant {
                    self.advance();
                    return Ok(Expr::constant(constant));
                }
                if is_keyword(&word) {
                    return Err(self.unexpected("an expression"));
                }
                self.advance();
                Ok(Expr::name(word))
            }
            Tok::Int(value) => {
                self.advance();
                Ok(Expr::constant(Constant::Int(value)))
            }
            Tok::Float(value) => {
                self.advance();
                Ok(Expr::constant(Constant::Float(value)))
            }
            Tok::Imaginary(value) => {
                self.advance();
                Ok(Expr::constant(Constant::Complex(value)))
            }
            Tok::Str(_) | Tok::Bytes(_) | Tok::FString(_) => self.parse_strings(),
            Tok::Op("...") => {
                self.advance();
                Ok(Expr::constant(Constant::Ellipsis))
            }
            Tok::Op("(") => {
                self.advance();
                self.parse_parenthesized()
            }
            Tok::Op("[") => {
                self.advance();
                self.parse_list()
            }
            Tok::Op("{") => {
                self.advance();
                self.parse_braces()
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_parenthesized(&mut self) -> Result<Expr> {
        if self.eat_op(")") {
            return Ok(Expr::new(ExprKind::Tuple(Vec::new())));
        }
        if self.at_keyword("yield") {
            let value = self.parse_yield()?;
            self.expect_op(")")?;
            return Ok(value);
        }
        let first = self.parse_star_expression()?;
        if self.at_comprehension() {
            let generators = self.parse_comprehensions()?;
            self.expect_op(")")?;
            return Ok(Expr::new(ExprKind::GeneratorExp {
                elt: Box::new(first),
                generators,
            }));
        }
        if self.eat_op(")") {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if self.at_op(")") {
                break;
            }
            elts.push(self.parse_star_expression()?);
        }
        self.expect_op(")")?;
        Ok(Expr::new(ExprKind::Tuple(elts)))
    }

    fn parse_list(&mut self) -> Result<Expr> {
        if self.eat_op("]") {
            return Ok(Expr::new(ExprKind::List(Vec::new())));
        }
        let first = self.parse_star_expression()?;
        if self.at_comprehension() {
            let generators = self.parse_comprehensions()?;
            self.expect_op("]")?;
            return Ok(Expr::new(ExprKind::ListComp {
                elt: Box::new(first),
                generators,
            }));
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if self.at_op("]") {
                break;
            }
            elts.push(self.parse_star_expression()?);
        }
        self.expect_op("]")?;
        Ok(Expr::new(ExprKind::List(elts)))
    }

    fn parse_braces(&mut self) -> Result<Expr> {
        if self.eat_op("}") {
            return Ok(Expr::new(ExprKind::Dict {
                keys: Vec::new(),
                values: Vec::new(),
            }));
        }

        let first_key = if self.eat_op("**") {
            None
        } else {
            let key = self.parse_star_expression()?;
            if !self.at_op(":") {
                return self.parse_set_rest(key);
            }
            self.advance();
            Some(key)
        };
        let first_value = if first_key.is_some() {
            self.parse_expression()?
        } else {
            self.parse_bitwise_or()?
        };

        if let Some(key) = &first_key {
            if self.at_comprehension() {
                let generators = self.parse_comprehensions()?;
                self.expect_op("}")?;
                return Ok(Expr::new(ExprKind::DictComp {
                    key: Box::new(key.clone()),
                    value: Box::new(first_value),
                    generators,
                }));
            }
        }

        let mut keys = vec![first_key];
        let mut values = vec![first_value];
        while self.eat_op(",") {
            if self.at_op("}") {
                break;
            }
            if self.eat_op("**") {
                keys.push(None);
                values.push(self.parse_bitwise_or()?);
            } else {
                keys.push(Some(self.parse_expression()?));
                self.expect_op(":")?;
                values.push(self.parse_expression()?);
            }
        }
        self.expect_op("}")?;
        Ok(Expr::new(ExprKind::Dict { keys, values }))
    }

    fn parse_set_rest(&mut self, first: Expr) -> Result<Expr> {
        if self.at_comprehension() {
            let generators = self.parse_comprehensions()?;
            self.expect_op("}")?;
            return Ok(Expr::new(ExprKind::SetComp {
                elt: Box::new(first),
                generators,
            }));
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if self.at_op("}") {
                break;
            }
            elts.push(self.parse_star_expression()?);
        }
        self.expect_op("}")?;
        Ok(Expr::new(ExprKind::Set(elts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(src: &str) -> Vec<Stmt> {
        match parse_function(src).unwrap().kind {
            StmtKind::FunctionDef { body, .. } => body,
            other => panic!("expected function, got {:?}", other),
        }
    }

    fn expr_of(src: &str) -> Expr {
        let module = parse_module(src).unwrap();
        match module.body.into_iter().next().map(|s| s.kind) {
            Some(StmtKind::Expr(expr)) => expr,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_function() {
        let stmt = parse_function("def add(a, b=1, *rest, key, **kw) -> int:\n    return a + b\n")
            .unwrap();
        match stmt.kind {
            StmtKind::FunctionDef {
                name,
                params,
                body,
                returns,
                ..
            } => {
                assert_eq!(name, "add");
                assert_eq!(params.args.len(), 2);
                assert!(params.args[1].default.is_some());
                assert_eq!(params.vararg.unwrap().name, "rest");
                assert_eq!(params.kwonly[0].name, "key");
                assert_eq!(params.kwarg.unwrap().name, "kw");
                assert_eq!(returns, Some(Expr::name("int")));
                assert_eq!(body.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_operator_precedence() {
        let expr = expr_of("a + b * c ** -d\n");
        match expr.kind {
            ExprKind::BinOp {
                op: BinOperator::Add,
                right,
                ..
            } => match right.kind {
                ExprKind::BinOp {
                    op: BinOperator::Mult,
                    right,
                    ..
                } => assert!(matches!(
                    right.kind,
                    ExprKind::BinOp {
                        op: BinOperator::Pow,
                        ..
                    }
                )),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_chained_comparison_and_membership() {
        let expr = expr_of("a < b <= c not in d is not e\n");
        match expr.kind {
            ExprKind::Compare { ops, comparators, .. } => {
                assert_eq!(
                    ops,
                    vec![
                        CmpOperator::Lt,
                        CmpOperator::LtE,
                        CmpOperator::NotIn,
                        CmpOperator::IsNot
                    ]
                );
                assert_eq!(comparators.len(), 4);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_elif_nests_if() {
        let body = body_of("def f(x):\n    if x:\n        a\n    elif y:\n        b\n    else:\n        c\n");
        match &body[0].kind {
            StmtKind::If { orelse, .. } => {
                assert_eq!(orelse.len(), 1);
                match &orelse[0].kind {
                    StmtKind::If { orelse, .. } => assert_eq!(orelse.len(), 1),
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_try_statement() {
        let body = body_of(
            "def f():\n    try:\n        g()\n    except (A, B) as e:\n        h(e)\n    except:\n        pass\n    else:\n        i()\n    finally:\n        j()\n",
        );
        match &body[0].kind {
            StmtKind::Try {
                handlers,
                orelse,
                finalbody,
                ..
            } => {
                assert_eq!(handlers.len(), 2);
                assert_eq!(handlers[0].name.as_deref(), Some("e"));
                assert!(handlers[1].type_.is_none());
                assert_eq!(orelse.len(), 1);
                assert_eq!(finalbody.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_assignment_forms() {
        let body = body_of("def f():\n    a = b = 1\n    x += 2\n    y: int = 3\n    p, q = q, p\n");
        assert!(matches!(&body[0].kind, StmtKind::Assign { targets, .. } if targets.len() == 2));
        assert!(matches!(
            &body[1].kind,
            StmtKind::AugAssign {
                op: BinOperator::Add,
                ..
            }
        ));
        assert!(matches!(&body[2].kind, StmtKind::AnnAssign { value: Some(_), .. }));
        assert!(matches!(
            &body[3].kind,
            StmtKind::Assign { targets, value: Expr { kind: ExprKind::Tuple(_), .. } }
                if matches!(targets[0].kind, ExprKind::Tuple(_))
        ));
    }

    #[test]
    fn test_slices_and_calls() {
        let expr = expr_of("f(x[1:2], y[::2], *args, key=v, **kw)\n");
        match expr.kind {
            ExprKind::Call { args, keywords, .. } => {
                assert_eq!(args.len(), 3);
                assert_eq!(keywords.len(), 2);
                match &args[0].kind {
                    ExprKind::Subscript { slice, .. } => {
                        assert!(matches!(slice.kind, ExprKind::Slice { .. }))
                    }
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_comprehensions_and_displays() {
        assert!(matches!(expr_of("[x for x in y if x]\n").kind, ExprKind::ListComp { .. }));
        assert!(matches!(expr_of("{k: v for k, v in items}\n").kind, ExprKind::DictComp { .. }));
        assert!(matches!(expr_of("{a, b}\n").kind, ExprKind::Set(_)));
        assert!(matches!(expr_of("{**a, 'b': 1}\n").kind, ExprKind::Dict { .. }));
        assert!(matches!(expr_of("sum(x for x in y)\n").kind, ExprKind::Call { .. }));
        assert!(matches!(expr_of("(1,)\n").kind, ExprKind::Tuple(ref e) if e.len() == 1));
    }

    #[test]
    fn test_implicit_string_concatenation() {
        assert_eq!(
            expr_of("'a' \"b\"\n").kind,
            ExprKind::Constant(Constant::Str("ab".into()))
        );
        assert_eq!(
            expr_of("'a' f'{b}'\n").kind,
            ExprKind::FormattedString("'a' f'{b}'".into())
        );
        assert!(parse_module("b'a' 'b'\n").is_err());
    }

    #[test]
    fn test_class_with_methods_and_decorators() {
        let module = parse_module(
            "@dataclass\nclass A(Base, metaclass=M):\n    @property\n    def x(self):\n        return self._x\n",
        )
        .unwrap();
        match &module.body[0].kind {
            StmtKind::ClassDef {
                bases,
                keywords,
                decorators,
                body,
                ..
            } => {
                assert_eq!(bases.len(), 1);
                assert_eq!(keywords.len(), 1);
                assert_eq!(decorators.len(), 1);
                assert!(matches!(
                    &body[0].kind,
                    StmtKind::FunctionDef { decorators, .. } if decorators.len() == 1
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_real_world_literals() {
        let function = parse_function(
            "\u{feff}def mask(h):\n    return h & 0xFFFFFFFFFFFFFFFF, '\\N{BULLET}'\n",
        )
        .unwrap();
        assert_eq!(function.function_name(), Some("mask"));
        match &expr_of("0xFFFFFFFFFFFFFFFF\n").kind {
            ExprKind::Constant(Constant::Int(value)) => {
                assert_eq!(value.to_string(), "18446744073709551615")
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            expr_of("'\\N{BULLET}'\n").kind,
            ExprKind::Constant(Constant::Str("\u{2022}".into()))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_module("def f(:\n    pass\n").is_err());
        assert!(parse_module("try:\n    pass\n").is_err());
        assert!(parse_module("x = = 1\n").is_err());
        assert!(matches!(
            parse_function("x = 1\n"),
            Err(MutationError::InvalidInput(_))
        ));
    }
}
