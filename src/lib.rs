//! # py-mutation
//!
//! A single-order mutation engine for Python functions written in Rust.
//!
//! This library provides functionality to:
//! - Parse Python source into a syntax tree and pick the functions to mutate
//! - Stamp every statement, expression and exception handler with a stable ID
//! - Generate every mutant that differs from the original in exactly one node
//! - Regenerate Python source for each mutant and report or store the results
//!
//! ## Example
//!
//! ```rust
//! use py_mutation::mutation::{render_mutants, Mutator};
//! use py_mutation::parser::parse_function;
//!
//! fn main() -> py_mutation::Result<()> {
//!     let function = parse_function("def add(a, b):\n    return a + b\n")?;
//!     let mutants = Mutator::default().mutate(&function)?;
//!     assert_eq!(mutants.len(), 9);
//!
//!     for mutant in render_mutants(&mutants).codes {
//!         println!("# [{}]\n{}", mutant.operator, mutant.code);
//!     }
//!     Ok(())
//! }
//! ```

pub mod ast;
pub mod error;
pub mod extract;
pub mod ids;
pub mod lexer;
pub mod mutation;
pub mod operators;
pub mod parser;
pub mod render;
pub mod replace;
pub mod report;
pub mod sqlite;

pub use error::{MutationError, RenderError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ast::{Node, NodeId, NodeRef, Stmt};
    pub use crate::error::{MutationError, RenderError, Result};
    pub use crate::extract::{extract_functions, FunctionFilter, FunctionUnit};
    pub use crate::ids::{assign_node_ids, find_node_by_id};
    pub use crate::mutation::{
        generate_mutant_codes, render_mutants, Mutant, MutantCode, MutationConfig, Mutator,
    };
    pub use crate::operators::{generate_mutations, Candidate, Operator};
    pub use crate::parser::{parse_function, parse_module};
    pub use crate::render::render_stmt;
    pub use crate::replace::replace_node;
}
