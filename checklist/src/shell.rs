//! Interactive command loop.
//!
//! Reads one command per line and dispatches to the orchestration modules.
//! Domain refusals (blocked verify, halted advance, tampering) are printed
//! and the loop continues; only I/O failures on the terminal itself abort.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::Result;
use tracing::debug;

use crate::advance::{AdvanceOutcome, run_advance};
use crate::core::outcome::Validation;
use crate::exec::run_exec;
use crate::exit_codes;
use crate::io::git::Git;
use crate::io::lockfile::{halt, halt_reason, resume};
use crate::io::paths::WorkspacePaths;
use crate::io::scratchpad::append_thought;
use crate::push::{PushOutcome, run_push};
use crate::report::status_report;
use crate::verify::{VerifyOutcome, ensure_untampered, run_verify};

const HELP: &str = "\
Commands:
  next           advance to the next unverified step
  verify         verify the current step and record its digest
  status         print the execution tree, lock state, and halt reason
  exec <cmd>     run a shell command in the workspace root
  log <text>     record a pending question in the thought log
  halt <reason>  freeze next/push until resume
  resume         clear a halt or derived lock
  push           commit and push when the lock derives clean
  help           show this message
  exit           leave the loop
";

/// Run the command loop until `exit` or end of input.
///
/// Returns the process exit code: halted workspaces exit with
/// [`exit_codes::HALTED`].
pub fn run_shell(root: &Path, input: impl BufRead, mut output: impl Write) -> Result<i32> {
    let paths = WorkspacePaths::new(root);

    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let (command, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (trimmed, ""),
        };
        debug!(command, "dispatching shell command");

        match command {
            "exit" => break,
            "help" => write!(output, "{HELP}")?,
            "status" => match status_report(root) {
                Ok(report) => write!(output, "{}", report.render())?,
                Err(err) => writeln!(output, "error: {err:#}")?,
            },
            "next" => match run_advance(root) {
                Ok(AdvanceOutcome::Advanced { id, .. }) => {
                    writeln!(output, "Current step: {id}")?;
                }
                Ok(AdvanceOutcome::Complete) => {
                    writeln!(output, "All steps verified. Nothing left to do.")?;
                }
                Err(err) => writeln!(output, "error: {err:#}")?,
            },
            "verify" => match run_verify(root) {
                Ok(VerifyOutcome::Verified { id }) => {
                    writeln!(output, "Verified: {id}")?;
                }
                Ok(VerifyOutcome::Blocked { id, reasons }) => {
                    writeln!(output, "Blocked: {id}")?;
                    for reason in reasons {
                        writeln!(output, "  - {reason}")?;
                    }
                }
                Err(err) => writeln!(output, "error: {err:#}")?,
            },
            "exec" => {
                if rest.is_empty() {
                    writeln!(output, "usage: exec <command>")?;
                    continue;
                }
                match run_exec(root, rest) {
                    Ok(outcome) => {
                        output.write_all(&outcome.output.stdout)?;
                        output.write_all(&outcome.output.stderr)?;
                        let last = outcome
                            .output
                            .stderr
                            .last()
                            .or(outcome.output.stdout.last());
                        if last.is_some_and(|byte| *byte != b'\n') {
                            writeln!(output)?;
                        }
                        writeln!(output, "(exit: {})", exit_label(outcome.output.exit_code))?;
                        match outcome.validation {
                            Some(Validation::Match) => {
                                writeln!(output, "Expected outcome: matched")?;
                            }
                            Some(Validation::Mismatch { diff }) => {
                                writeln!(output, "Expected outcome: MISMATCH")?;
                                for line in diff {
                                    writeln!(output, "  - {line}")?;
                                }
                            }
                            None => {}
                        }
                    }
                    Err(err) => writeln!(output, "error: {err:#}")?,
                }
            }
            "log" => {
                if rest.is_empty() {
                    writeln!(output, "usage: log <text>")?;
                    continue;
                }
                match ensure_untampered(&paths)
                    .and_then(|()| append_thought(&paths.thoughts_path, rest))
                {
                    Ok(()) => writeln!(output, "Logged.")?,
                    Err(err) => writeln!(output, "error: {err:#}")?,
                }
            }
            "halt" => {
                if rest.is_empty() {
                    writeln!(output, "usage: halt <reason>")?;
                    continue;
                }
                match halt(&paths, rest) {
                    Ok(()) => writeln!(output, "Halted: {rest}")?,
                    Err(err) => writeln!(output, "error: {err:#}")?,
                }
            }
            "resume" => match resume(&paths) {
                Ok(()) => writeln!(output, "Resumed.")?,
                Err(err) => writeln!(output, "error: {err:#}")?,
            },
            "push" => match run_push(root, &Git::new(root)) {
                Ok(PushOutcome::Pushed { committed }) => {
                    if committed {
                        writeln!(output, "Committed and pushed.")?;
                    } else {
                        writeln!(output, "Nothing to commit; pushed.")?;
                    }
                }
                Ok(PushOutcome::Blocked { reasons }) => {
                    writeln!(output, "Push blocked:")?;
                    for reason in reasons {
                        writeln!(output, "  - {reason}")?;
                    }
                }
                Err(err) => writeln!(output, "error: {err:#}")?,
            },
            other => writeln!(output, "unknown command '{other}', try `help`")?,
        }
    }

    if halt_reason(&paths)?.is_some() {
        return Ok(exit_codes::HALTED);
    }
    Ok(exit_codes::OK)
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "killed".to_string(),
    }
}
