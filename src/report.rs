use crate::error::Result;
use crate::mutation::RenderedMutants;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutantRecord {
    pub index: usize,
    pub node_id: u32,
    pub operator: String,
    pub patch_hash: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionReport {
    pub file: String,
    pub function: String,
    pub original_code: String,
    pub dropped: usize,
    pub mutants: Vec<MutantRecord>,
}

/// A source file left out of the run because it failed to parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationReport {
    pub tool_version: String,
    pub date: String,
    pub total_mutants: usize,
    pub functions: Vec<FunctionReport>,
    pub skipped_files: Vec<SkippedFile>,
}

/// One (original, mutant) pair, the line format of `--format jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPair {
    pub function_name: String,
    pub function_code: String,
    pub mutant_code: String,
    pub operator: String,
}

/// Hex SHA-256 of a mutant's source, used to deduplicate across runs.
pub fn patch_hash(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl FunctionReport {
    pub fn new(file: &str, function: &str, original_code: &str, rendered: &RenderedMutants) -> Self {
        let mutants = rendered
            .codes
            .iter()
            .map(|mutant| MutantRecord {
                index: mutant.index,
                node_id: mutant.node_id.0,
                operator: mutant.operator.code().to_string(),
                patch_hash: patch_hash(&mutant.code),
                code: mutant.code.clone(),
            })
            .collect();
        Self {
            file: file.to_string(),
            function: function.to_string(),
            original_code: original_code.to_string(),
            dropped: rendered.dropped,
            mutants,
        }
    }
}

impl MutationReport {
    pub fn new(functions: Vec<FunctionReport>) -> Self {
        let now: DateTime<Local> = Local::now();
        Self {
            tool_version: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            date: now.format("%d/%m/%Y %H:%M:%S").to_string(),
            total_mutants: functions.iter().map(|f| f.mutants.len()).sum(),
            functions,
            skipped_files: Vec::new(),
        }
    }

    pub fn dropped(&self) -> usize {
        self.functions.iter().map(|f| f.dropped).sum()
    }

    pub fn training_pairs(&self) -> Vec<TrainingPair> {
        self.functions
            .iter()
            .flat_map(|function| {
                function.mutants.iter().map(move |mutant| TrainingPair {
                    function_name: function.function.clone(),
                    function_code: function.original_code.clone(),
                    mutant_code: mutant.code.clone(),
                    operator: mutant.operator.clone(),
                })
            })
            .collect()
    }
}

/// `# mutant <i> [<OP>] <function>` headers, each followed by the code.
pub fn write_text<W: Write>(report: &MutationReport, out: &mut W) -> Result<()> {
    for function in &report.functions {
        for mutant in &function.mutants {
            writeln!(
                out,
                "# mutant {} [{}] {}",
                mutant.index, mutant.operator, function.function
            )?;
            write!(out, "{}", mutant.code)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

pub fn write_json<W: Write>(report: &MutationReport, out: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;
    Ok(())
}

pub fn write_jsonl<W: Write>(report: &MutationReport, out: &mut W) -> Result<()> {
    for pair in report.training_pairs() {
        serde_json::to_writer(&mut *out, &pair)?;
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeId;
    use crate::mutation::MutantCode;
    use crate::operators::Operator;

    fn sample_report() -> MutationReport {
        let rendered = RenderedMutants {
            codes: vec![
                MutantCode {
                    index: 0,
                    node_id: NodeId(1),
                    operator: Operator::Rsd,
                    code: "def add(a, b):\n    pass\n".to_string(),
                },
                MutantCode {
                    index: 2,
                    node_id: NodeId(2),
                    operator: Operator::Aor,
                    code: "def add(a, b):\n    return a * b\n".to_string(),
                },
            ],
            dropped: 1,
        };
        MutationReport::new(vec![FunctionReport::new(
            "calc.py",
            "add",
            "def add(a, b):\n    return a + b\n",
            &rendered,
        )])
    }

    #[test]
    fn test_patch_hash() {
        assert_eq!(
            patch_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(patch_hash("a"), patch_hash("b"));
    }

    #[test]
    fn test_report_totals() {
        let report = sample_report();
        assert_eq!(report.total_mutants, 2);
        assert_eq!(report.dropped(), 1);
        assert_eq!(report.functions[0].mutants[1].operator, "AOR");
    }

    #[test]
    fn test_report_data_serialization() {
        let report = sample_report();
        let json = serde_json::to_string(&report).unwrap();
        let deserialized: MutationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, report);
    }

    #[test]
    fn test_skipped_files_are_serialized() {
        let mut report = sample_report();
        report.skipped_files.push(SkippedFile {
            file: "broken.py".into(),
            line: 3,
            column: 7,
            message: "expected ':'".into(),
        });
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["skipped_files"][0]["file"], "broken.py");
        assert_eq!(value["skipped_files"][0]["line"], 3);

        let loaded: MutationReport = serde_json::from_value(value).unwrap();
        assert_eq!(loaded, report);
    }

    #[test]
    fn test_write_text() {
        let mut out = Vec::new();
        write_text(&sample_report(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("# mutant 0 [RSD] add\ndef add(a, b):\n    pass\n\n"));
        assert!(text.contains("# mutant 2 [AOR] add\n"));
    }

    #[test]
    fn test_write_jsonl() {
        let mut out = Vec::new();
        write_jsonl(&sample_report(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let pair: TrainingPair = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(pair.function_name, "add");
        assert_eq!(pair.operator, "AOR");
        assert_eq!(pair.function_code, "def add(a, b):\n    return a + b\n");
    }
}
