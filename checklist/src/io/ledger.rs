//! Tamper-evident hash ledger for checklist documents.
//!
//! One entry per line: RFC 3339 timestamp, path, and hex SHA-256 digest,
//! tab-separated. The digest is content-only and whitespace-sensitive; no
//! normalization is applied, so even trivial formatting edits are detected.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::core::lock::{LedgerReport, LedgerStatus};

/// Path -> recorded digest and timestamp of recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub digest: String,
    pub recorded_at: String,
}

/// In-memory snapshot of the persisted ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    entries: BTreeMap<String, LedgerEntry>,
}

/// Ledger digest mismatch: the document changed out-of-band since it was
/// recorded. Always surfaced, always forces the push lock, never
/// auto-resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TamperError {
    pub path: String,
    pub recorded: String,
    pub current: String,
}

impl fmt::Display for TamperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tampering detected in {}: recorded digest {}, current digest {}",
            self.path, self.recorded, self.current
        )
    }
}

impl std::error::Error for TamperError {}

/// Hex-encoded SHA-256 of document content.
pub fn digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

impl Ledger {
    /// Check current content against the recorded digest for `path`.
    pub fn check(&self, path: &str, content: &str) -> LedgerStatus {
        match self.entries.get(path) {
            None => LedgerStatus::Unrecorded,
            Some(entry) => {
                let current = digest(content);
                if current == entry.digest {
                    LedgerStatus::Match
                } else {
                    LedgerStatus::TamperDetected {
                        recorded: entry.digest.clone(),
                        current,
                    }
                }
            }
        }
    }

    /// Record the digest for `path`, overwriting any prior entry.
    ///
    /// Only called as part of a successful verify.
    pub fn record(&mut self, path: &str, content: &str) {
        let entry = LedgerEntry {
            digest: digest(content),
            recorded_at: Utc::now().to_rfc3339(),
        };
        debug!(path, digest = %entry.digest, "recording ledger entry");
        self.entries.insert(path.to_string(), entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Paths with a recorded entry, in deterministic (lexicographic) order.
    pub fn recorded_paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Check every recorded path against current disk content.
///
/// A recorded document that no longer exists counts as tampered (its content
/// changed to nothing). Returns one report per recorded path.
pub fn check_recorded(ledger: &Ledger, root: &Path) -> Result<Vec<LedgerReport>> {
    let mut reports = Vec::new();
    for path in ledger.recorded_paths() {
        let absolute = root.join(path);
        let status = match fs::read_to_string(&absolute) {
            Ok(content) => ledger.check(path, &content),
            Err(_) => LedgerStatus::TamperDetected {
                recorded: ledger.entries[path].digest.clone(),
                current: "<missing>".to_string(),
            },
        };
        reports.push(LedgerReport {
            path: path.to_string(),
            status,
        });
    }
    Ok(reports)
}

/// First tamper report, converted to a [`TamperError`], if any.
pub fn first_tamper(reports: &[LedgerReport]) -> Option<TamperError> {
    reports.iter().find_map(|report| match &report.status {
        LedgerStatus::TamperDetected { recorded, current } => Some(TamperError {
            path: report.path.clone(),
            recorded: recorded.clone(),
            current: current.clone(),
        }),
        _ => None,
    })
}

/// Load the ledger from disk. A missing file yields an empty ledger.
pub fn load_ledger(path: &Path) -> Result<Ledger> {
    if !path.exists() {
        return Ok(Ledger::default());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read ledger {}", path.display()))?;
    let mut entries = BTreeMap::new();
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.splitn(3, '\t');
        let (recorded_at, entry_path, entry_digest) =
            match (fields.next(), fields.next(), fields.next()) {
                (Some(at), Some(entry_path), Some(digest)) => (at, entry_path, digest),
                _ => {
                    return Err(anyhow!(
                        "malformed ledger line {} in {}",
                        index + 1,
                        path.display()
                    ));
                }
            };
        entries.insert(
            entry_path.to_string(),
            LedgerEntry {
                digest: entry_digest.trim().to_string(),
                recorded_at: recorded_at.to_string(),
            },
        );
    }
    Ok(Ledger { entries })
}

/// Atomically write the ledger to disk (temp file + rename).
pub fn write_ledger(path: &Path, ledger: &Ledger) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("ledger path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut buf = String::new();
    for (entry_path, entry) in &ledger.entries {
        buf.push_str(&format!(
            "{}\t{}\t{}\n",
            entry.recorded_at, entry_path, entry.digest
        ));
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, &buf)
        .with_context(|| format!("write temp ledger {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace ledger {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecorded_path_is_not_an_error() {
        let ledger = Ledger::default();
        assert_eq!(ledger.check("steps/S.md", "content"), LedgerStatus::Unrecorded);
    }

    #[test]
    fn matching_content_reports_match() {
        let mut ledger = Ledger::default();
        ledger.record("steps/S.md", "content");
        assert_eq!(ledger.check("steps/S.md", "content"), LedgerStatus::Match);
    }

    /// Record a digest, change the content, and the check reports tampering
    /// with both digests.
    #[test]
    fn changed_content_reports_tamper_with_both_digests() {
        let mut ledger = Ledger::default();
        ledger.record("steps/S.md", "- [x] all done\n");
        match ledger.check("steps/S.md", "- [x] all done \n") {
            LedgerStatus::TamperDetected { recorded, current } => {
                assert_eq!(recorded, digest("- [x] all done\n"));
                assert_eq!(current, digest("- [x] all done \n"));
                assert_ne!(recorded, current);
            }
            other => panic!("expected tamper, got {other:?}"),
        }
    }

    #[test]
    fn digest_is_whitespace_sensitive() {
        assert_ne!(digest("a b"), digest("a  b"));
        assert_ne!(digest("a\n"), digest("a"));
    }

    #[test]
    fn record_overwrites_prior_entry() {
        let mut ledger = Ledger::default();
        ledger.record("steps/S.md", "v1");
        ledger.record("steps/S.md", "v2");
        assert_eq!(ledger.check("steps/S.md", "v2"), LedgerStatus::Match);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("hash_ledger");
        let mut ledger = Ledger::default();
        ledger.record("steps/A.md", "alpha");
        ledger.record("steps/B.md", "beta");

        write_ledger(&path, &ledger).expect("write");
        let loaded = load_ledger(&path).expect("load");
        assert_eq!(loaded, ledger);
    }

    #[test]
    fn load_missing_file_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ledger = load_ledger(&temp.path().join("absent")).expect("load");
        assert!(ledger.is_empty());
    }

    #[test]
    fn check_recorded_flags_edited_file_on_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("steps")).expect("mkdir");
        fs::write(root.join("steps/S.md"), "original").expect("write");

        let mut ledger = Ledger::default();
        ledger.record("steps/S.md", "original");
        fs::write(root.join("steps/S.md"), "edited").expect("edit");

        let reports = check_recorded(&ledger, root).expect("check");
        let tamper = first_tamper(&reports).expect("tamper");
        assert_eq!(tamper.path, "steps/S.md");
    }
}
