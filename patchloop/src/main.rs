//! `patchloop` CLI: the process boundary for an agent collaborator.
//!
//! Reads change batches and requirements as JSON files, applies/verifies them
//! against the working tree at `--root`, and prints JSON results on stdout.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use patchloop::apply::{ApplyOptions, apply_batch};
use patchloop::exit_codes;
use patchloop::io::config::{CONFIG_FILE_NAME, PatchloopConfig, init_config, load_config};
use patchloop::io::repo::Repo;
use patchloop::io::wire::{Document, load_change_batch, load_requirement};
use patchloop::logging;
use patchloop::round::{Round, RoundOptions, run_round};
use patchloop::verify::{VerifyOptions, verify};

#[derive(Parser)]
#[command(
    name = "patchloop",
    version,
    about = "Apply structured change-sets to a git working tree and verify requirements"
)]
struct Cli {
    /// Working-tree root.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Config file (defaults to `<root>/.patchloop.toml` when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize git in the root (creating it if needed) and write a
    /// default config file unless one exists.
    Init {
        /// Overwrite an existing config file with defaults.
        #[arg(long)]
        force: bool,
    },
    /// Apply a change batch (JSON) and print the per-entry report.
    Apply {
        batch: PathBuf,
        /// Commit staged changes with this message afterwards.
        #[arg(long)]
        commit: Option<String>,
    },
    /// Check a requirement (JSON) and print the verdict.
    Verify { requirement: PathBuf },
    /// Apply a batch, commit it, and verify a requirement in one go.
    Round {
        batch: PathBuf,
        requirement: PathBuf,
        /// Commit message for this round.
        #[arg(long, short)]
        message: String,
    },
    /// Print the committed path -> blob hash manifest.
    Manifest,
    /// Print the JSON Schema for a wire document.
    Schema {
        #[arg(value_enum)]
        document: SchemaKind,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SchemaKind {
    ChangeBatch,
    Requirement,
}

#[derive(Serialize)]
struct ApplyOutput<'a> {
    #[serde(flatten)]
    report: &'a patchloop::apply::BatchReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit: Option<patchloop::io::shell::CommandResult>,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    if let Command::Schema { document } = cli.command {
        let doc = match document {
            SchemaKind::ChangeBatch => Document::ChangeBatch,
            SchemaKind::Requirement => Document::Requirement,
        };
        print!("{}", doc.schema());
        return Ok(exit_codes::OK);
    }
    if let Command::Init { force } = cli.command {
        return cmd_init(&cli.root, cli.config.as_deref(), force);
    }

    let cfg = resolve_config(&cli.root, cli.config.as_deref())?;
    let repo = Repo::from_config(&cli.root, &cfg);

    match cli.command {
        Command::Apply { batch, commit } => cmd_apply(&repo, &cfg, &batch, commit.as_deref()),
        Command::Verify { requirement } => cmd_verify(&repo, &cfg, &requirement),
        Command::Round {
            batch,
            requirement,
            message,
        } => cmd_round(&repo, &cfg, &batch, &requirement, &message),
        Command::Manifest => {
            print_json(&repo.blob_hash_manifest())?;
            Ok(exit_codes::OK)
        }
        Command::Init { .. } | Command::Schema { .. } => Ok(exit_codes::OK),
    }
}

fn resolve_config(root: &Path, explicit: Option<&Path>) -> Result<PatchloopConfig> {
    match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(anyhow!("config file {} does not exist", path.display()));
            }
            load_config(path)
        }
        None => load_config(&root.join(CONFIG_FILE_NAME)),
    }
}

fn cmd_init(root: &Path, explicit: Option<&Path>, force: bool) -> Result<i32> {
    let repo = Repo::new(root);
    let result = repo.init();
    if !result.success {
        return Err(anyhow!("git init failed: {}", result.output.trim()));
    }
    println!("{}", result.output);

    let config_path = explicit.map_or_else(|| root.join(CONFIG_FILE_NAME), Path::to_path_buf);
    if init_config(&config_path, force)? {
        println!("Wrote {}", config_path.display());
    } else {
        println!("Kept existing {}", config_path.display());
    }
    // An existing file must still be loadable.
    load_config(&config_path)?;
    Ok(exit_codes::OK)
}

fn cmd_apply(
    repo: &Repo,
    cfg: &PatchloopConfig,
    batch_path: &Path,
    commit_message: Option<&str>,
) -> Result<i32> {
    let batch = load_change_batch(batch_path)?;
    let report = apply_batch(repo, &batch, &ApplyOptions::from(cfg));
    let commit = match commit_message {
        Some(message) if repo.has_staged_changes() => Some(repo.commit(message)),
        _ => None,
    };
    print_json(&ApplyOutput {
        report: &report,
        commit: commit.clone(),
    })?;
    if commit.is_some_and(|result| !result.success) {
        return Ok(exit_codes::INVALID);
    }
    if report.all_applied() {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::PARTIAL)
    }
}

fn cmd_verify(repo: &Repo, cfg: &PatchloopConfig, requirement_path: &Path) -> Result<i32> {
    let requirement = load_requirement(requirement_path)?;
    let verdict = verify(repo, &requirement, &VerifyOptions::from(cfg));
    print_json(&verdict)?;
    Ok(verdict_code(verdict.fulfilled))
}

fn cmd_round(
    repo: &Repo,
    cfg: &PatchloopConfig,
    batch_path: &Path,
    requirement_path: &Path,
    message: &str,
) -> Result<i32> {
    let batch = load_change_batch(batch_path)?;
    let requirement = load_requirement(requirement_path)?;
    let outcome = run_round(
        repo,
        &Round {
            batch: &batch,
            requirement: &requirement,
            commit_message: message,
        },
        &RoundOptions::from(cfg),
    );
    print_json(&outcome)?;
    Ok(verdict_code(outcome.verdict.fulfilled))
}

fn verdict_code(fulfilled: bool) -> i32 {
    if fulfilled {
        exit_codes::OK
    } else {
        exit_codes::UNFULFILLED
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{payload}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_apply_with_commit() {
        let cli = Cli::parse_from([
            "patchloop",
            "--root",
            "work",
            "apply",
            "batch.json",
            "--commit",
            "round 1",
        ]);
        assert_eq!(cli.root, PathBuf::from("work"));
        match cli.command {
            Command::Apply { batch, commit } => {
                assert_eq!(batch, PathBuf::from("batch.json"));
                assert_eq!(commit.as_deref(), Some("round 1"));
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn parse_round_requires_message() {
        assert!(Cli::try_parse_from(["patchloop", "round", "b.json", "r.json"]).is_err());
        let cli = Cli::parse_from(["patchloop", "round", "b.json", "r.json", "-m", "commit #1"]);
        assert!(matches!(cli.command, Command::Round { .. }));
    }

    #[test]
    fn parse_schema_kind() {
        let cli = Cli::parse_from(["patchloop", "schema", "change-batch"]);
        assert!(matches!(
            cli.command,
            Command::Schema {
                document: SchemaKind::ChangeBatch
            }
        ));
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["patchloop", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
        let cli = Cli::parse_from(["patchloop", "init"]);
        assert!(matches!(cli.command, Command::Init { force: false }));
    }

    #[test]
    fn root_defaults_to_current_dir() {
        let cli = Cli::parse_from(["patchloop", "manifest"]);
        assert_eq!(cli.root, PathBuf::from("."));
        assert!(cli.config.is_none());
    }
}
