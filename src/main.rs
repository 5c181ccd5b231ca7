use clap::{Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use py_mutation::error::{MutationError, Result};
use py_mutation::extract::{extract_functions, FunctionFilter, FunctionUnit};
use py_mutation::mutation::{mutation_folder, render_mutants, write_mutants, MutationConfig, Mutator};
use py_mutation::operators::Operator;
use py_mutation::parser::parse_module;
use py_mutation::render::render_stmt;
use py_mutation::report::{self, FunctionReport, MutationReport, SkippedFile};
use py_mutation::sqlite;

#[derive(Parser)]
#[command(name = "py-mutation")]
#[command(about = "Single-order mutation engine for Python functions")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Jsonl,
}

#[derive(Subcommand)]
enum Commands {
    /// Create mutants for the functions of a Python file or directory
    Mutate {
        /// Python file to mutate
        #[arg(short, long, conflicts_with = "dir")]
        file: Option<PathBuf>,

        /// Directory to scan for *.py files
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Only mutate this function (bare or Class.method name)
        #[arg(long)]
        function: Option<String>,

        /// Skip functions whose qualified name matches this regex
        #[arg(long, value_name = "REGEX")]
        skip: Option<String>,

        /// Also mutate test_* functions
        #[arg(long)]
        include_tests: bool,

        /// Comma separated operator codes to apply (default: all)
        #[arg(long, value_delimiter = ',', value_name = "CODES")]
        operators: Option<Vec<String>>,

        /// Create only one mutant per node
        #[arg(long)]
        one_mutant: bool,

        /// Number of worker threads (0 = one per core)
        #[arg(short, long, default_value = "0")]
        jobs: usize,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Write the output here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write every mutant to muts-<file>-<function>/ folders here
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Optional path to SQLite database file (default: db/mutants.db)
        #[arg(long, value_name = "PATH")]
        sqlite: Option<Option<PathBuf>>,
    },
    /// List the mutation operators
    Operators,
}

struct MutateJob<'a> {
    mutator: &'a Mutator,
    out_dir: Option<&'a Path>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Mutate {
            file,
            dir,
            function,
            skip,
            include_tests,
            operators,
            one_mutant,
            jobs,
            format,
            output,
            out_dir,
            sqlite,
        } => {
            let scanning_dir = dir.is_some();
            let sources = match (file, dir) {
                (Some(file), None) => vec![file],
                (None, Some(dir)) => python_files(&dir)?,
                _ => {
                    return Err(MutationError::InvalidInput(
                        "You should provide either --file or --dir".to_string(),
                    ))
                }
            };

            let operators = operators
                .map(|codes| {
                    codes
                        .iter()
                        .map(|code| code.parse::<Operator>())
                        .collect::<Result<Vec<_>>>()
                })
                .transpose()?;

            let filter = FunctionFilter {
                only: function,
                skip: skip.as_deref().map(regex::Regex::new).transpose()?,
                include_tests,
            };
            let mutator = Mutator::new(MutationConfig {
                operators,
                one_per_node: one_mutant,
            });

            let db_path = match sqlite {
                Some(Some(path)) => Some(PathBuf::from("db").join(path)),
                Some(None) => Some(sqlite::default_db_path()),
                None => None,
            };

            if jobs > 0 {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(jobs)
                    .build_global()
                    .map_err(anyhow::Error::from)?;
            }

            let job = MutateJob {
                mutator: &mutator,
                out_dir: out_dir.as_deref(),
            };
            let mut functions = Vec::new();
            let mut skipped_files = Vec::new();
            for source in &sources {
                match mutate_file(source, &filter, &job) {
                    Ok(reports) => functions.extend(reports),
                    // a directory run keeps going past files it cannot parse
                    Err(MutationError::Parse {
                        line,
                        column,
                        message,
                    }) if scanning_dir => {
                        let file = source.display().to_string();
                        warn!(
                            file = %file,
                            line,
                            column,
                            error = %message,
                            "skipping file that failed to parse"
                        );
                        skipped_files.push(SkippedFile {
                            file,
                            line,
                            column,
                            message,
                        });
                    }
                    Err(err) => return Err(err),
                }
            }
            let mut report = MutationReport::new(functions);
            report.skipped_files = skipped_files;

            match &output {
                Some(path) => {
                    let mut out = BufWriter::new(File::create(path)?);
                    write_report(&report, format, &mut out)?;
                    out.flush()?;
                    println!(
                        "Generated {} mutants for {} functions, written to {}",
                        report.total_mutants,
                        report.functions.len(),
                        path.display()
                    );
                    if !report.skipped_files.is_empty() {
                        println!(
                            "Skipped {} files that failed to parse",
                            report.skipped_files.len()
                        );
                    }
                }
                None => {
                    let stdout = io::stdout();
                    let mut out = stdout.lock();
                    write_report(&report, format, &mut out)?;
                    out.flush()?;
                }
            }
            info!(
                mutants = report.total_mutants,
                dropped = report.dropped(),
                functions = report.functions.len(),
                skipped_files = report.skipped_files.len(),
                "mutation finished"
            );

            if let Some(ref path) = db_path {
                sqlite::check_db(path)?;
                let source = sources
                    .iter()
                    .map(|s| s.display().to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                let run_id = sqlite::store_run(path, &source)?;
                sqlite::store_mutants(path, run_id, &report)?;
            }
        }
        Commands::Operators => {
            for operator in Operator::ALL {
                println!("{}  {}", operator.code(), operator.description());
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn python_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "py") {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn mutate_file(path: &Path, filter: &FunctionFilter, job: &MutateJob<'_>) -> Result<Vec<FunctionReport>> {
    let source = fs::read_to_string(path)?;
    let module = parse_module(&source)?;
    let units = extract_functions(&module, filter);
    let file = path.display().to_string();
    info!(file = %file, functions = units.len(), "mutating file");

    units
        .par_iter()
        .map(|unit| mutate_function(&file, unit, job))
        .collect()
}

fn mutate_function(file: &str, unit: &FunctionUnit, job: &MutateJob<'_>) -> Result<FunctionReport> {
    let original_code = render_stmt(&unit.stmt)?;
    let mutants = job.mutator.mutate(&unit.stmt)?;
    let rendered = render_mutants(&mutants);
    debug!(
        function = %unit.qualified_name,
        mutants = rendered.codes.len(),
        dropped = rendered.dropped,
        "mutated function"
    );

    if let Some(out_dir) = job.out_dir {
        let folder = mutation_folder(out_dir, file, &unit.qualified_name)?;
        write_mutants(&folder, file, &unit.qualified_name, &rendered.codes)?;
    }

    Ok(FunctionReport::new(
        file,
        &unit.qualified_name,
        &original_code,
        &rendered,
    ))
}

fn write_report<W: Write>(report: &MutationReport, format: OutputFormat, out: &mut W) -> Result<()> {
    match format {
        OutputFormat::Text => report::write_text(report, out),
        OutputFormat::Json => report::write_json(report, out),
        OutputFormat::Jsonl => report::write_jsonl(report, out),
    }
}
