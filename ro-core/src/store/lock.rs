// ro-core/src/store/lock.rs
// ============================================================================
// Module: Run Lock (C5)
// Description: Exclusive, leased, heartbeat-renewed lock on a run root.
// Purpose: Serialize mutation of a run root across processes; the sole
//          admission point for any tick.
// Dependencies: std::fs, std::time, rand, time, crate::core
// ============================================================================

//! ## Overview
//! [`RunLock::acquire`] is the only way to obtain permission to mutate a run
//! root. The lock file holds `{holder_id, acquired_at, lease_expires_at,
//! last_heartbeat_at, reason}`; acquisition succeeds if the file is absent,
//! empty, or stale (`now >= lease_expires_at`). [`RunLock::heartbeat`]
//! extends the lease; callers are expected to call it roughly every
//! `lease_seconds / 4`, matching the spec's heartbeat cadence. Dropping a
//! `RunLock` releases it best-effort.

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use rand::RngCore;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::artifacts::RunLockPayload;
use crate::core::error::OrchError;
use crate::core::error::OrchErrorCode;

use super::atomic::write_bytes_atomic;

const LOCK_FILE_NAME: &str = ".run.lock";

/// Returns the lock file path for a given run root.
#[must_use]
pub fn lock_path(run_root: &Path) -> PathBuf {
    run_root.join(LOCK_FILE_NAME)
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

fn format_ts(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_default()
}

fn parse_ts(text: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(text, &Rfc3339).ok()
}

fn random_holder_id() -> String {
    let mut bytes = [0_u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// An acquired, exclusive lease on a run root.
///
/// Dropping this value releases the lease best-effort; callers that need a
/// guaranteed release should call [`RunLock::release`] explicitly and
/// handle its error.
pub struct RunLock {
    path: PathBuf,
    holder_id: String,
    lease_seconds: u64,
    reason: String,
}

impl RunLock {
    /// Attempts to acquire the run lock for `run_root`.
    ///
    /// Succeeds immediately if no lock file exists, the file is empty, or
    /// the existing lease has expired (stale-holder eviction). Otherwise
    /// returns [`OrchErrorCode::RunLocked`] with the current holder's
    /// details in `details`.
    ///
    /// # Errors
    /// Returns [`OrchErrorCode::RunLocked`] on contention, or
    /// [`OrchErrorCode::WriteFailed`] if the lock file cannot be written.
    pub fn acquire(
        run_root: &Path,
        lease_seconds: u64,
        reason: impl Into<String>,
    ) -> Result<Self, OrchError> {
        let path = lock_path(run_root);
        if let Some(existing) = read_lock_payload(&path)? {
            let expires = parse_ts(&existing.lease_expires_at);
            let stale = expires.is_none_or(|e| now() >= e);
            if !stale {
                return Err(OrchError::with_details(
                    OrchErrorCode::RunLocked,
                    "run root is held by another lease",
                    serde_json::json!({
                        "holder_id": existing.holder_id,
                        "lease_expires_at": existing.lease_expires_at,
                        "reason": existing.reason,
                    }),
                ));
            }
        }

        let reason = reason.into();
        let holder_id = random_holder_id();
        let acquired_at = now();
        let lease_expires_at = acquired_at + Duration::from_secs(lease_seconds);
        let payload = RunLockPayload {
            holder_id: holder_id.clone(),
            acquired_at: format_ts(acquired_at),
            lease_expires_at: format_ts(lease_expires_at),
            last_heartbeat_at: format_ts(acquired_at),
            reason: reason.clone(),
        };
        write_payload(&path, &payload)?;

        Ok(Self {
            path,
            holder_id,
            lease_seconds,
            reason,
        })
    }

    /// Extends the lease, writing a fresh `last_heartbeat_at` and
    /// `lease_expires_at`. Callers should invoke this roughly every
    /// `lease_seconds / 4` while work is in progress.
    ///
    /// # Errors
    /// Returns [`OrchErrorCode::InvalidState`] if the lock file was lost or
    /// taken over by another holder, or [`OrchErrorCode::WriteFailed`] if
    /// the renewal write fails.
    pub fn heartbeat(&self) -> Result<(), OrchError> {
        let existing = read_lock_payload(&self.path)?.ok_or_else(|| {
            OrchError::new(
                OrchErrorCode::InvalidState,
                "run lock file disappeared before heartbeat",
            )
        })?;
        if existing.holder_id != self.holder_id {
            return Err(OrchError::new(
                OrchErrorCode::InvalidState,
                "run lock was taken over by another holder",
            ));
        }
        let heartbeat_at = now();
        let lease_expires_at = heartbeat_at + Duration::from_secs(self.lease_seconds);
        let payload = RunLockPayload {
            holder_id: self.holder_id.clone(),
            acquired_at: existing.acquired_at,
            lease_expires_at: format_ts(lease_expires_at),
            last_heartbeat_at: format_ts(heartbeat_at),
            reason: self.reason.clone(),
        };
        write_payload(&self.path, &payload)
    }

    /// Releases the lease by deleting the lock file, if this holder still
    /// owns it.
    ///
    /// # Errors
    /// Returns [`OrchErrorCode::WriteFailed`] if the file exists but cannot
    /// be removed.
    pub fn release(&self) -> Result<(), OrchError> {
        if let Some(existing) = read_lock_payload(&self.path)? {
            if existing.holder_id != self.holder_id {
                return Ok(());
            }
        }
        match fs::remove_file(&self.path) {
            Ok(()) | Err(_) if !self.path.exists() => Ok(()),
            Err(err) => Err(OrchError::new(
                OrchErrorCode::WriteFailed,
                format!("failed to release run lock: {err}"),
            )),
        }
    }

    /// Returns this holder's random id.
    #[must_use]
    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

fn write_payload(path: &Path, payload: &RunLockPayload) -> Result<(), OrchError> {
    let bytes = serde_json::to_vec_pretty(payload).map_err(|err| {
        OrchError::new(
            OrchErrorCode::InvalidJson,
            format!("failed to serialize run lock payload: {err}"),
        )
    })?;
    write_bytes_atomic(path, &bytes)
}

fn read_lock_payload(path: &Path) -> Result<Option<RunLockPayload>, OrchError> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path).map_err(|err| {
        OrchError::new(
            OrchErrorCode::WriteFailed,
            format!("failed to read run lock file: {err}"),
        )
    })?;
    if bytes.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(&bytes).map_err(|err| {
        OrchError::new(
            OrchErrorCode::InvalidJson,
            format!("run lock file is corrupt: {err}"),
        )
    })
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
    fn acquire_then_contend_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = RunLock::acquire(dir.path(), 60, "tick").expect("first acquire");
        let second = RunLock::acquire(dir.path(), 60, "tick");
        let err = second.expect_err("second acquire must fail");
        assert_eq!(err.code, OrchErrorCode::RunLocked);
        drop(first);
    }

    #[test]
    fn release_allows_reacquire() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = RunLock::acquire(dir.path(), 60, "tick").expect("first acquire");
        first.release().expect("release");
        let second = RunLock::acquire(dir.path(), 60, "tick");
        assert!(second.is_ok());
    }

    #[test]
    fn stale_lease_is_evicted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let _first = RunLock::acquire(dir.path(), 0, "tick").expect("first acquire");
        std::thread::sleep(Duration::from_millis(10));
        let second = RunLock::acquire(dir.path(), 60, "tick");
        assert!(second.is_ok());
    }

    #[test]
    fn heartbeat_extends_lease() {
        let dir = tempfile::tempdir().expect("tempdir");
        let lock = RunLock::acquire(dir.path(), 60, "tick").expect("acquire");
        let before = read_lock_payload(&lock_path(dir.path()))
            .expect("read")
            .expect("payload");
        lock.heartbeat().expect("heartbeat");
        let after = read_lock_payload(&lock_path(dir.path()))
            .expect("read")
            .expect("payload");
        assert_ne!(before.last_heartbeat_at, after.last_heartbeat_at);
    }

    #[test]
    fn drop_releases_lock() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let _lock = RunLock::acquire(dir.path(), 60, "tick").expect("acquire");
        }
        assert!(!lock_path(dir.path()).exists());
    }
}
