// ro-core/src/core/path.rs
// ============================================================================
// Module: Path Safety (C4)
// Description: Resolves caller-supplied paths strictly inside a run root.
// Purpose: Guarantee no artifact write or read can escape the run root, even
//          through a symlink planted by an earlier (compromised) tick.
// Dependencies: std::fs, std::path
// ============================================================================

//! ## Overview
//! [`resolve_contained_path`] implements `resolveContainedPath` from the
//! spec: a relative `input` is resolved under `run_root`; the result must
//! lie lexically inside `run_root`; and walking up from the result to the
//! first *existing* ancestor, that ancestor's symlink-resolved real path
//! must also lie inside the run root's real path. Any violation fails with
//! [`OrchErrorCode::PathTraversal`].

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use super::error::OrchError;
use super::error::OrchErrorCode;

/// Resolves `input` to an absolute path strictly contained within
/// `run_root`, rejecting traversal via `..` components or symlinks.
///
/// `field` names the logical field being validated, for error messages.
///
/// # Errors
/// Returns [`OrchErrorCode::PathTraversal`] if the resolved path would lie
/// outside `run_root`, or [`OrchErrorCode::InvalidArgs`] if `run_root`
/// itself cannot be canonicalized.
pub fn resolve_contained_path(
    run_root: &Path,
    input: &Path,
    field: &str,
) -> Result<PathBuf, OrchError> {
    let root_real = real_or_lexical(run_root).map_err(|err| {
        OrchError::new(
            OrchErrorCode::InvalidArgs,
            format!("run root is not resolvable: {err}"),
        )
    })?;

    let candidate = if input.is_absolute() {
        input.to_path_buf()
    } else {
        run_root.join(input)
    };

    let candidate = lexical_normalize(&candidate);

    if !candidate.starts_with(&lexical_normalize(run_root)) {
        return Err(traversal_error(field, &candidate));
    }

    // Walk up from the candidate to the first existing ancestor and verify
    // its real (symlink-resolved) path is still inside the run root's real
    // path. This catches a symlink planted partway up the tree that would
    // otherwise redirect a lexically-contained path outside the root.
    let mut probe = candidate.clone();
    loop {
        if probe.exists() {
            let probe_real = probe.canonicalize().map_err(|err| {
                OrchError::new(
                    OrchErrorCode::PathTraversal,
                    format!("failed to resolve real path for {field}: {err}"),
                )
            })?;
            if !probe_real.starts_with(&root_real) {
                return Err(traversal_error(field, &candidate));
            }
            break;
        }
        match probe.parent() {
            Some(parent) if parent != probe => probe = parent.to_path_buf(),
            _ => break,
        }
    }

    Ok(candidate)
}

fn traversal_error(field: &str, candidate: &Path) -> OrchError {
    OrchError::with_details(
        OrchErrorCode::PathTraversal,
        format!("{field} resolves outside the run root"),
        serde_json::json!({ "field": field, "resolved": candidate.to_string_lossy() }),
    )
}

/// Canonicalizes `path` if it exists, otherwise falls back to a lexical
/// normalization (used for the run root itself, which always exists by the
/// time a tick runs, but is defensively handled here too).
fn real_or_lexical(path: &Path) -> std::io::Result<PathBuf> {
    path.canonicalize()
}

/// Removes `.` and `..` components lexically, without touching the
/// filesystem. A leading `..` that would escape the root is preserved so
/// the `starts_with` containment check below correctly rejects it.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions and debug output.
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )]
    use super::*;

    #[test]
    fn accepts_relative_path_inside_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let resolved =
            resolve_contained_path(dir.path(), Path::new("manifest.json"), "artifacts.manifest")
                .expect("resolves");
        assert!(resolved.starts_with(dir.path()));
    }

    #[test]
    fn rejects_parent_traversal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = resolve_contained_path(dir.path(), Path::new("../escape.json"), "field")
            .expect_err("must reject traversal");
        assert_eq!(err.code, OrchErrorCode::PathTraversal);
    }

    #[test]
    fn rejects_symlink_escape() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outside = tempfile::tempdir().expect("outside tempdir");
        let link = dir.path().join("escape_link");
        #[cfg(unix)]
        std::os::unix::fs::symlink(outside.path(), &link).expect("symlink");
        #[cfg(unix)]
        {
            let err = resolve_contained_path(dir.path(), Path::new("escape_link/x.json"), "field")
                .expect_err("must reject symlink escape");
            assert_eq!(err.code, OrchErrorCode::PathTraversal);
        }
    }
}
