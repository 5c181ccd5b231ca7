//! Picks the functions of a module that should be mutated.

use crate::ast::{Module, Stmt, StmtKind};
use regex::Regex;

#[derive(Debug, Clone, Default)]
pub struct FunctionFilter {
    /// Only this function (bare or qualified name).
    pub only: Option<String>,
    /// Skip functions whose qualified name matches.
    pub skip: Option<Regex>,
    /// Also mutate `test_*` functions.
    pub include_tests: bool,
}

impl FunctionFilter {
    pub fn accepts(&self, unit: &FunctionUnit) -> bool {
        if let Some(only) = &self.only {
            if unit.name != *only && unit.qualified_name != *only {
                return false;
            }
        }
        if let Some(skip) = &self.skip {
            if skip.is_match(&unit.qualified_name) {
                return false;
            }
        }
        self.include_tests || !unit.name.starts_with("test_")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionUnit {
    /// `Class.method` for methods, the bare name otherwise.
    pub qualified_name: String,
    pub name: String,
    pub stmt: Stmt,
}

/// Top-level functions and methods of (possibly nested) classes, in source
/// order. Functions nested inside functions stay part of their parent.
pub fn extract_functions(module: &Module, filter: &FunctionFilter) -> Vec<FunctionUnit> {
    let mut units = Vec::new();
    collect(&module.body, None, &mut units);
    units.retain(|unit| filter.accepts(unit));
    units
}

fn collect(body: &[Stmt], class: Option<&str>, units: &mut Vec<FunctionUnit>) {
    for stmt in body {
        match &stmt.kind {
            StmtKind::FunctionDef { name, .. } => {
                let qualified_name = match class {
                    Some(class) => format!("{}.{}", class, name),
                    None => name.clone(),
                };
                units.push(FunctionUnit {
                    qualified_name,
                    name: name.clone(),
                    stmt: stmt.clone(),
                });
            }
            StmtKind::ClassDef { name, body, .. } => {
                let nested = match class {
                    Some(outer) => format!("{}.{}", outer, name),
                    None => name.clone(),
                };
                collect(body, Some(&nested), units);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;

    const SOURCE: &str = "\
import os

def helper(x):
    def inner():
        return x
    return inner

class Account(Base):
    def deposit(self, amount):
        self.balance += amount

    class Meta:
        def describe(self):
            return 'meta'

def test_helper():
    assert helper(1)
";

    fn names(units: &[FunctionUnit]) -> Vec<&str> {
        units.iter().map(|u| u.qualified_name.as_str()).collect()
    }

    #[test]
    fn test_extracts_functions_and_methods() {
        let module = parse_module(SOURCE).unwrap();
        let units = extract_functions(&module, &FunctionFilter::default());
        assert_eq!(
            names(&units),
            vec!["helper", "Account.deposit", "Account.Meta.describe"]
        );
        assert_eq!(units[1].name, "deposit");
    }

    #[test]
    fn test_include_tests() {
        let module = parse_module(SOURCE).unwrap();
        let filter = FunctionFilter {
            include_tests: true,
            ..Default::default()
        };
        assert_eq!(extract_functions(&module, &filter).len(), 4);
    }

    #[test]
    fn test_only_and_skip() {
        let module = parse_module(SOURCE).unwrap();
        let only = FunctionFilter {
            only: Some("deposit".into()),
            ..Default::default()
        };
        assert_eq!(names(&extract_functions(&module, &only)), vec!["Account.deposit"]);

        let skip = FunctionFilter {
            skip: Some(Regex::new(r"^Account\.").unwrap()),
            ..Default::default()
        };
        assert_eq!(names(&extract_functions(&module, &skip)), vec!["helper"]);
    }
}
