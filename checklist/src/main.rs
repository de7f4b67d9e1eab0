//! Checklist CLI: disciplined stepwise execution over a checklist tree.

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use checklist::advance::{AdvanceOutcome, IncompleteStepError, run_advance};
use checklist::core::outcome::Validation;
use checklist::exec::run_exec;
use checklist::exit_codes;
use checklist::io::git::Git;
use checklist::io::ledger::TamperError;
use checklist::io::lockfile::{HaltedError, LockViolationError, halt, resume};
use checklist::io::paths::{InitOptions, WorkspacePaths, init_workspace};
use checklist::io::scratchpad::append_thought;
use checklist::push::{PushOutcome, run_push};
use checklist::report::status_report;
use checklist::shell::run_shell;
use checklist::verify::{ValidationMismatchError, VerifyOutcome, ensure_untampered, run_verify};

#[derive(Parser)]
#[command(
    name = "checklist",
    version,
    about = "Stepwise execution discipline over a hierarchical checklist tree"
)]
struct Cli {
    /// Workspace root.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the workspace layout and seed documents.
    Init {
        /// Overwrite existing workspace-owned files.
        #[arg(short, long)]
        force: bool,
    },
    /// Run the interactive command loop on stdin/stdout.
    Shell,
    /// Print the execution tree, lock state, and halt reason.
    Status,
    /// Advance to the next unverified step.
    Next,
    /// Verify the current step and record its digest in the ledger.
    Verify,
    /// Commit and push when the lock derives clean.
    Push,
    /// Run a shell command in the workspace root.
    Exec {
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
    /// Record a pending question in the thought log.
    Log {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Freeze next/push until resume.
    Halt {
        #[arg(required = true)]
        reason: Vec<String>,
    },
    /// Clear a halt or derived lock.
    Resume,
}

fn main() {
    checklist::logging::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            classify(&err)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let root = cli.root;
    let paths = WorkspacePaths::new(&root);

    match cli.command {
        Command::Init { force } => {
            init_workspace(&paths, &InitOptions { force })?;
            println!("Initialized checklist workspace at {}", root.display());
            Ok(exit_codes::OK)
        }
        Command::Shell => {
            let stdin = io::stdin();
            run_shell(&root, stdin.lock(), io::stdout())
        }
        Command::Status => {
            let report = status_report(&root)?;
            print!("{}", report.render());
            Ok(exit_codes::OK)
        }
        Command::Next => match run_advance(&root)? {
            AdvanceOutcome::Advanced { id, .. } => {
                println!("Current step: {id}");
                Ok(exit_codes::OK)
            }
            AdvanceOutcome::Complete => {
                println!("All steps verified. Nothing left to do.");
                Ok(exit_codes::OK)
            }
        },
        Command::Verify => match run_verify(&root)? {
            VerifyOutcome::Verified { id } => {
                println!("Verified: {id}");
                Ok(exit_codes::OK)
            }
            VerifyOutcome::Blocked { id, reasons } => {
                println!("Blocked: {id}");
                for reason in reasons {
                    println!("  - {reason}");
                }
                Ok(exit_codes::BLOCKED)
            }
        },
        Command::Push => match run_push(&root, &Git::new(&root))? {
            PushOutcome::Pushed { committed } => {
                if committed {
                    println!("Committed and pushed.");
                } else {
                    println!("Nothing to commit; pushed.");
                }
                Ok(exit_codes::OK)
            }
            PushOutcome::Blocked { reasons } => {
                println!("Push blocked:");
                for reason in reasons {
                    println!("  - {reason}");
                }
                Ok(exit_codes::BLOCKED)
            }
        },
        Command::Exec { command } => {
            let outcome = run_exec(&root, &command.join(" "))?;
            io::Write::write_all(&mut io::stdout(), &outcome.output.stdout)?;
            io::Write::write_all(&mut io::stderr(), &outcome.output.stderr)?;
            if let Some(Validation::Mismatch { diff }) = outcome.validation {
                eprintln!("Expected outcome: MISMATCH");
                for line in diff {
                    eprintln!("  - {line}");
                }
            }
            Ok(exit_codes::OK)
        }
        Command::Log { text } => {
            ensure_untampered(&paths)?;
            append_thought(&paths.thoughts_path, &text.join(" "))?;
            println!("Logged.");
            Ok(exit_codes::OK)
        }
        Command::Halt { reason } => {
            let reason = reason.join(" ");
            halt(&paths, &reason)?;
            println!("Halted: {reason}");
            Ok(exit_codes::HALTED)
        }
        Command::Resume => {
            resume(&paths)?;
            println!("Resumed.");
            Ok(exit_codes::OK)
        }
    }
}

/// Stable exit codes for scripted callers, derived from the error kind.
fn classify(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<HaltedError>().is_some() {
        return exit_codes::HALTED;
    }
    if err.downcast_ref::<IncompleteStepError>().is_some()
        || err.downcast_ref::<ValidationMismatchError>().is_some()
        || err.downcast_ref::<TamperError>().is_some()
        || err.downcast_ref::<LockViolationError>().is_some()
    {
        return exit_codes::BLOCKED;
    }
    exit_codes::INVALID
}
