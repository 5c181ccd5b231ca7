use crate::ast::{NodeId, Stmt};
use crate::error::{MutationError, Result};
use crate::ids::{assign_node_ids, collect_nodes, find_node_by_id};
use crate::operators::{generate_mutations, Operator};
use crate::parser::parse_function;
use crate::render::render_stmt;
use crate::replace::replace_node;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Which candidates the engine keeps.
#[derive(Debug, Clone, Default)]
pub struct MutationConfig {
    /// Restrict to these operators; `None` keeps every operator.
    pub operators: Option<Vec<Operator>>,
    /// Keep only the first surviving candidate of each node.
    pub one_per_node: bool,
}

impl MutationConfig {
    pub fn allows(&self, operator: Operator) -> bool {
        self.operators
            .as_ref()
            .map_or(true, |allowed| allowed.contains(&operator))
    }
}

/// A full copy of the function with exactly one node replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutant {
    pub node_id: NodeId,
    pub operator: Operator,
    pub tree: Stmt,
}

/// Regenerated source of one mutant. `index` is the mutant's position in the
/// engine output, so it stays stable when other mutants fail to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutantCode {
    pub index: usize,
    pub node_id: NodeId,
    pub operator: Operator,
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedMutants {
    pub codes: Vec<MutantCode>,
    pub dropped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Mutator {
    config: MutationConfig,
}

impl Mutator {
    pub fn new(config: MutationConfig) -> Self {
        Self { config }
    }

    /// Every single-edit mutant of `function`, ordered by node (pre-order)
    /// and then by catalog order. The input is never modified.
    pub fn mutate(&self, function: &Stmt) -> Result<Vec<Mutant>> {
        let mut original = function.clone();
        let stamped = assign_node_ids(&mut original);
        debug!(
            function = original.function_name().unwrap_or("<statement>"),
            nodes = stamped,
            "assigned node ids"
        );

        let mut mutants = Vec::new();
        for node in collect_nodes(&original) {
            let Some(node_id) = node.id() else {
                continue;
            };
            let mut candidates = generate_mutations(node);
            candidates.retain(|candidate| self.config.allows(candidate.operator));
            if self.config.one_per_node {
                candidates.truncate(1);
            }
            if !candidates.is_empty() {
                debug!(
                    node = %node_id,
                    kind = node.family(),
                    candidates = candidates.len(),
                    "mutating node"
                );
            }

            for candidate in candidates {
                let mut tree = original.clone();
                if find_node_by_id(&tree, node_id).is_none() {
                    return Err(MutationError::CloneIntegrity { node_id });
                }
                replace_node(&mut tree, node_id, candidate.node)?;
                mutants.push(Mutant {
                    node_id,
                    operator: candidate.operator,
                    tree,
                });
            }
        }

        debug!(mutants = mutants.len(), "generated mutants");
        Ok(mutants)
    }
}

/// Regenerate source for each mutant. Mutants that cannot be rendered are
/// logged and dropped; the rest are kept.
pub fn render_mutants(mutants: &[Mutant]) -> RenderedMutants {
    let mut rendered = RenderedMutants::default();
    for (index, mutant) in mutants.iter().enumerate() {
        match render_stmt(&mutant.tree) {
            Ok(code) => rendered.codes.push(MutantCode {
                index,
                node_id: mutant.node_id,
                operator: mutant.operator,
                code,
            }),
            Err(err) => {
                warn!(
                    node = %mutant.node_id,
                    operator = mutant.operator.code(),
                    error = %err,
                    "dropping mutant that cannot be rendered"
                );
                rendered.dropped += 1;
            }
        }
    }
    rendered
}

/// Parse the first function in `source`, mutate it with the default
/// configuration and return the source of every mutant.
pub fn generate_mutant_codes(source: &str) -> Result<Vec<String>> {
    let function = parse_function(source)?;
    let mutants = Mutator::default().mutate(&function)?;
    Ok(render_mutants(&mutants)
        .codes
        .into_iter()
        .map(|mutant| mutant.code)
        .collect())
}

/// Folder holding the mutant files of one function of one source file.
pub fn mutation_folder(out_dir: &Path, source_file: &str, qualified_name: &str) -> Result<PathBuf> {
    let file_name = Path::new(source_file)
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| MutationError::InvalidInput("Invalid file path".to_string()))?;
    Ok(out_dir.join(format!("muts-{}-{}", file_name, qualified_name)))
}

/// Write each mutant to `<folder>/<function>.mutant.<index>.py`, next to an
/// `original_file.txt` naming the source file. Returns the number written.
pub fn write_mutants(
    folder: &Path,
    source_file: &str,
    qualified_name: &str,
    codes: &[MutantCode],
) -> Result<usize> {
    create_mutation_folder(folder, source_file)?;
    for mutant in codes {
        let mutant_file = folder.join(format!("{}.mutant.{}.py", qualified_name, mutant.index));
        fs::write(mutant_file, &mutant.code)?;
    }
    Ok(codes.len())
}

fn create_mutation_folder(folder_path: &Path, source_file: &str) -> Result<()> {
    if !folder_path.exists() {
        fs::create_dir_all(folder_path)?;

        let original_file_path = folder_path.join("original_file.txt");
        fs::write(original_file_path, source_file)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Node, StmtKind};
    use crate::ids::{find_node_by_id, same_structure};
    use tempfile::tempdir;

    const ADD: &str = "def add(a, b):\n    return a + b\n";

    #[test]
    fn test_mutate_add_function() {
        let function = parse_function(ADD).unwrap();
        let mutants = Mutator::default().mutate(&function).unwrap();
        assert_eq!(mutants.len(), 9);

        let ops: Vec<&str> = mutants.iter().map(|m| m.operator.code()).collect();
        assert_eq!(
            ops,
            vec!["RSD", "AOR", "AOR", "AOR", "AOR", "AOR", "AOR", "AOD", "AOD"]
        );
        assert_eq!(mutants[0].node_id, NodeId(1));
        assert!(mutants[1..].iter().all(|m| m.node_id == NodeId(2)));
    }

    #[test]
    fn test_input_is_untouched() {
        let function = parse_function(ADD).unwrap();
        let before = function.clone();
        Mutator::default().mutate(&function).unwrap();
        assert_eq!(function, before);
        assert!(function.id.is_none());
    }

    #[test]
    fn test_operator_filter_and_one_per_node() {
        let function = parse_function(ADD).unwrap();
        let only_aod = Mutator::new(MutationConfig {
            operators: Some(vec![Operator::Aod]),
            one_per_node: false,
        });
        let mutants = only_aod.mutate(&function).unwrap();
        assert_eq!(mutants.len(), 2);
        assert!(mutants.iter().all(|m| m.operator == Operator::Aod));

        let one = Mutator::new(MutationConfig {
            operators: None,
            one_per_node: true,
        });
        let mutants = one.mutate(&function).unwrap();
        assert_eq!(mutants.len(), 2);
        assert_eq!(mutants[1].operator, Operator::Aor);
    }

    #[test]
    fn test_each_mutant_differs_in_one_place() {
        let function = parse_function(ADD).unwrap();
        let mut stamped = function.clone();
        assign_node_ids(&mut stamped);
        for mutant in Mutator::default().mutate(&function).unwrap() {
            let original = find_node_by_id(&stamped, mutant.node_id)
                .unwrap()
                .to_owned_node();
            let mut restored = mutant.tree.clone();
            replace_node(&mut restored, mutant.node_id, original).unwrap();
            assert_eq!(restored, stamped);
            assert!(!same_structure(
                &Node::Stmt(mutant.tree.clone()),
                &Node::Stmt(stamped.clone())
            ));
        }
    }

    #[test]
    fn test_render_mutants_drops_unrenderable() {
        let function = parse_function(ADD).unwrap();
        let mut mutants = Mutator::default().mutate(&function).unwrap();
        if let StmtKind::FunctionDef { body, .. } = &mut mutants[0].tree.kind {
            body.clear();
        }
        let rendered = render_mutants(&mutants);
        assert_eq!(rendered.dropped, 1);
        assert_eq!(rendered.codes.len(), 8);
        assert_eq!(rendered.codes[0].index, 1);
        assert_eq!(rendered.codes[0].code, "def add(a, b):\n    return a - b\n");
    }

    #[test]
    fn test_generate_mutant_codes() {
        let codes = generate_mutant_codes(ADD).unwrap();
        assert_eq!(codes.len(), 9);
        assert_eq!(codes[0], "def add(a, b):\n    pass\n");
        assert_eq!(codes[8], "def add(a, b):\n    return b\n");
        assert!(generate_mutant_codes("x = 1\n").is_err());
    }

    #[test]
    fn test_create_mutation_folder() {
        let temp_dir = tempdir().unwrap();
        let folder_path = temp_dir.path().join("test_muts");

        create_mutation_folder(&folder_path, "pkg/calc.py").unwrap();

        assert!(folder_path.exists());
        let content = fs::read_to_string(folder_path.join("original_file.txt")).unwrap();
        assert_eq!(content, "pkg/calc.py");
    }

    #[test]
    fn test_write_mutants() {
        let temp_dir = tempdir().unwrap();
        let folder = mutation_folder(temp_dir.path(), "pkg/calc.py", "add").unwrap();
        assert!(folder.ends_with("muts-calc-add"));

        let function = parse_function(ADD).unwrap();
        let mutants = Mutator::default().mutate(&function).unwrap();
        let rendered = render_mutants(&mutants);
        let written = write_mutants(&folder, "pkg/calc.py", "add", &rendered.codes).unwrap();
        assert_eq!(written, 9);

        let content = fs::read_to_string(folder.join("add.mutant.0.py")).unwrap();
        assert_eq!(content, "def add(a, b):\n    pass\n");
        assert!(folder.join("add.mutant.8.py").exists());
    }
}
