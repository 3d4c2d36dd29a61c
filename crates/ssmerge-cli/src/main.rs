use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{ArgAction, Parser};
use ssmerge_core::files;
use ssmerge_core::{MergeConfig, RenamingStrategy, ScenarioReport};

mod logging;

#[derive(Parser)]
#[command(
    name = "ssmerge",
    about = "Semistructured three-way merge for class-based source files",
    group(clap::ArgGroup::new("input").required(true).args(["files", "directories", "revisions"]))
)]
struct Cli {
    /// Files to be merged (mine, base, yours)
    #[arg(short = 'f', long = "files", num_args = 3, value_names = ["MINE", "BASE", "YOURS"])]
    files: Vec<PathBuf>,

    /// Directories to be merged (mine, base, yours)
    #[arg(short = 'd', long = "directories", num_args = 3, value_names = ["MINE", "BASE", "YOURS"])]
    directories: Vec<PathBuf>,

    /// Revisions file listing the left, base and right revision
    /// directories, one per line
    #[arg(long = "revisions")]
    revisions: Option<PathBuf>,

    /// Destination of the merged content (a file for -f, a directory for
    /// -d). When omitted, file merges print to stdout only.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Strategy on renaming conflicts: safe, keep-both, merge or
    /// unstructured-merge
    #[arg(short = 'r', long = "renaming", default_value = "safe", value_parser = parse_strategy)]
    renaming: RenamingStrategy,

    /// Treat whitespace-only line changes as unchanged
    #[arg(long = "ignore-space-change", default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    ignore_space_change: bool,

    /// Detect declarations with the same signature added to different
    /// areas of the same class
    #[arg(long = "handle-duplicate-declarations", default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    handle_duplicate_declarations: bool,

    /// Match initialization blocks by textual similarity
    #[arg(long = "handle-initialization-blocks", default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    handle_initialization_blocks: bool,

    /// Detect added elements that reference an element edited by the
    /// other contribution
    #[arg(long = "handle-new-element-referencing-edited-one", default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    handle_new_element_referencing_edited_one: bool,

    /// Detect and solve conflicts caused by method or constructor
    /// renaming or deletion
    #[arg(long = "handle-method-constructor-renaming-deletion", default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    handle_method_constructor_renaming_deletion: bool,

    /// Detect import statements that bring in distinct types with the
    /// same simple name
    #[arg(long = "handle-type-ambiguity-error", default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    handle_type_ambiguity_error: bool,

    /// Run as a git merge driver: no merged code on stdout
    #[arg(short = 'g', long = "git")]
    git: bool,

    /// Write a JSON merge report to the given path
    #[arg(long = "report")]
    report: Option<PathBuf>,

    /// Directory for the log file
    #[arg(long = "log-dir")]
    log_dir: Option<PathBuf>,
}

fn parse_strategy(s: &str) -> Result<RenamingStrategy, String> {
    s.parse()
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(Outcome::Clean) => ExitCode::from(0),
        Ok(Outcome::Conflicts) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {:#}", e);
            // Fatal failures exit with -1, reported as 255 by the shell.
            ExitCode::from(255)
        }
    }
}

enum Outcome {
    Clean,
    Conflicts,
}

fn run(cli: &Cli) -> anyhow::Result<Outcome> {
    let _guard = logging::init(cli.log_dir.as_deref(), cli.git)?;
    let config = build_config(cli);

    if !cli.files.is_empty() {
        let context = files::merge_files(
            Some(&cli.files[0]),
            Some(&cli.files[1]),
            Some(&cli.files[2]),
            cli.output.as_deref(),
            &config,
        )?;
        if !cli.git {
            print!("{}", context.output);
        }
        if let Some(report_path) = &cli.report {
            let mut report = ScenarioReport::default();
            report.push(ssmerge_core::FileReport {
                path: cli.files[0].display().to_string(),
                has_conflict: context.has_conflict,
                structured_fallback: context.structured_fallback,
                stats: context.stats.clone(),
            });
            write_report(report_path, &report)?;
        }
        return Ok(if context.has_conflict {
            Outcome::Conflicts
        } else {
            Outcome::Clean
        });
    }

    let outcomes = if let Some(revisions) = &cli.revisions {
        files::merge_revisions(revisions, &config)?.outcomes
    } else {
        files::merge_directories(
            &cli.directories[0],
            &cli.directories[1],
            &cli.directories[2],
            cli.output.as_deref(),
            &config,
        )?
    };

    let report = files::report(&outcomes);
    for failed in &report.failed_files {
        tracing::error!(file = %failed, "merge failed");
    }
    if let Some(report_path) = &cli.report {
        write_report(report_path, &report)?;
    }
    if !cli.git {
        eprintln!(
            "merged {} files, {} with conflicts, {} failed",
            report.files.len(),
            report.files_with_conflicts,
            report.failed_files.len()
        );
    }
    if !report.failed_files.is_empty() {
        anyhow::bail!("{} files failed to merge", report.failed_files.len());
    }
    Ok(outcome_of(&report))
}

fn outcome_of(report: &ScenarioReport) -> Outcome {
    if report.has_conflicts() {
        Outcome::Conflicts
    } else {
        Outcome::Clean
    }
}

fn build_config(cli: &Cli) -> MergeConfig {
    MergeConfig {
        renaming_strategy: cli.renaming,
        handle_duplicate_declarations: cli.handle_duplicate_declarations,
        handle_initialization_blocks: cli.handle_initialization_blocks,
        handle_new_element_referencing_edited_one: cli.handle_new_element_referencing_edited_one,
        handle_method_and_constructor_renaming_deletion: cli
            .handle_method_constructor_renaming_deletion,
        handle_type_ambiguity: cli.handle_type_ambiguity_error,
        ignore_whitespace_change: cli.ignore_space_change,
    }
}

fn write_report(path: &PathBuf, report: &ScenarioReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("writing report to {}", path.display()))?;
    Ok(())
}
