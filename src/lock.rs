//! Exclusion Lock (C4, spec.md §4.4): decides which role — `Preview` or
//! `Record` — may own the cameras right now, and survives this process
//! crashing and restarting while a stale lock file is left behind.
//!
//! Grounded in `cosmic-utils-camera`'s direct `libc` dependency (the only
//! OS-interop precedent in the corpus) — there is no file-locking crate
//! anywhere in the pack, so the advisory lock itself is `libc::flock`
//! against a well-known path, with the ownership payload written through
//! [`crate::atomic_file`]'s sibling in-place writer (not rename: renaming
//! over a flocked path would leave the lock attached to the old, now
//! detached inode while a reader opening the new path would see no lock
//! at all).
//!
//! Record and Preview live in the same process, so the common case —
//! record forcing out a running preview, or either role re-entering its
//! own lock — never touches the filesystem at all; only the first
//! acquisition by this process, and `release`, do.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Preview,
    Record,
}

impl Role {
    fn precedence(self) -> u8 {
        match self {
            Role::Preview => 0,
            Role::Record => 1,
        }
    }

    /// Record outranks preview; preview never outranks anything (spec.md
    /// §4.4 invariant: "Preview acquisition never evicts a recording").
    fn outranks(self, other: Role) -> bool {
        self.precedence() > other.precedence()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired,
    Busy(Role),
    /// Acquired by reclaiming a payload left by a process that is no
    /// longer alive, or whose heartbeat is older than
    /// [`constants::LOCK_STALE_AFTER_SECONDS`].
    Stale(Role),
}

#[derive(Debug, Serialize, Deserialize)]
struct LockPayload {
    role: Role,
    pid: u32,
    started_at_unix: f64,
    nonce: u64,
    heartbeat_unix: f64,
}

struct Held {
    file: File,
    role: Role,
}

pub struct ExclusionLock {
    path: PathBuf,
    held: Mutex<Option<Held>>,
}

fn unix_now() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

fn pid_alive(pid: u32) -> bool {
    // kill(pid, 0) performs no signal delivery, just existence/permission
    // checks: 0 or EPERM means the process exists, ESRCH means it doesn't.
    let ret = unsafe { libc::kill(pid as libc::pid_t, 0) };
    ret == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

impl ExclusionLock {
    pub fn new() -> Self {
        Self::at(PathBuf::from(constants::LOCK_DIR).join("cameras.lock"))
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path, held: Mutex::new(None) }
    }

    fn write_payload(file: &mut File, payload: &LockPayload) -> std::io::Result<()> {
        let bytes = serde_json::to_vec(payload).expect("LockPayload always serializes");
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        Ok(())
    }

    fn read_payload(file: &mut File) -> Option<LockPayload> {
        let mut buf = String::new();
        file.seek(SeekFrom::Start(0)).ok()?;
        file.read_to_string(&mut buf).ok()?;
        if buf.trim().is_empty() {
            return None;
        }
        serde_json::from_str(&buf).ok()
    }

    fn open_lock_file(&self) -> std::io::Result<File> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        OpenOptions::new().create(true).read(true).write(true).open(&self.path)
    }

    fn new_payload(role: Role) -> LockPayload {
        let now = unix_now();
        LockPayload {
            role,
            pid: std::process::id(),
            started_at_unix: now,
            nonce: rand::thread_rng().gen(),
            heartbeat_unix: now,
        }
    }

    /// Acquires the lock for `role`. `force=true` lets a higher-precedence
    /// role (record) evict a lower-precedence one (preview) that is
    /// currently held *by this process*; it never breaks another live
    /// process's OS-level flock (spec.md §4.4's "no silent stealing from a
    /// live process").
    pub fn acquire(&self, role: Role, force: bool) -> std::io::Result<AcquireOutcome> {
        let mut held = self.held.lock().unwrap();

        if let Some(h) = held.as_mut() {
            if h.role == role {
                return Ok(AcquireOutcome::Acquired);
            }
            if !force || !role.outranks(h.role) {
                return Ok(AcquireOutcome::Busy(h.role));
            }
            h.role = role;
            Self::write_payload(&mut h.file, &Self::new_payload(role))?;
            return Ok(AcquireOutcome::Acquired);
        }

        let mut file = self.open_lock_file()?;
        let fd = file.as_raw_fd();
        let flock_result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };

        if flock_result == 0 {
            let existing = Self::read_payload(&mut file);
            Self::write_payload(&mut file, &Self::new_payload(role))?;
            *held = Some(Held { file, role });

            // We would not have won a non-blocking flock if another live
            // process still held it, so any leftover payload here is, by
            // construction, from a crash: a dead pid or a stalled
            // heartbeat. Surface which role it was for diagnostics
            // (spec.md §4.4; `LockStolen` is logged, never returned to
            // the caller as a hard error).
            return Ok(match existing {
                Some(p) if !pid_alive(p.pid) || (unix_now() - p.heartbeat_unix) > constants::LOCK_STALE_AFTER_SECONDS => {
                    AcquireOutcome::Stale(p.role)
                }
                _ => AcquireOutcome::Acquired,
            });
        }

        // Someone else holds the OS lock; only report who, we cannot
        // evict a live process's flock regardless of `force`.
        let existing_role = Self::read_payload(&mut file).map(|p| p.role).unwrap_or(Role::Preview);
        Ok(AcquireOutcome::Busy(existing_role))
    }

    /// Refreshes the heartbeat timestamp in the lock payload in place.
    /// Called periodically by whichever service currently holds the lock
    /// (spec.md §4.5 "updates `last_heartbeat_unix` at <= 5s intervals").
    pub fn heartbeat(&self) -> std::io::Result<()> {
        let mut held = self.held.lock().unwrap();
        let Some(h) = held.as_mut() else { return Ok(()) };
        if let Some(mut payload) = Self::read_payload(&mut h.file) {
            payload.heartbeat_unix = unix_now();
            Self::write_payload(&mut h.file, &payload)?;
        }
        Ok(())
    }

    pub fn held_role(&self) -> Option<Role> {
        self.held.lock().unwrap().as_ref().map(|h| h.role)
    }

    /// Clears the payload and releases the OS lock. Idempotent.
    pub fn release(&self) -> std::io::Result<()> {
        let mut held = self.held.lock().unwrap();
        let Some(mut h) = held.take() else { return Ok(()) };
        h.file.set_len(0)?;
        let fd = h.file.as_raw_fd();
        unsafe { libc::flock(fd, libc::LOCK_UN) };
        Ok(())
    }
}

impl Default for ExclusionLock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lock_in(dir: &TempDir) -> ExclusionLock {
        ExclusionLock::at(dir.path().join("cameras.lock"))
    }

    #[test]
    fn fresh_acquire_succeeds() {
        let dir = TempDir::new().unwrap();
        let lock = lock_in(&dir);
        assert_eq!(lock.acquire(Role::Preview, false).unwrap(), AcquireOutcome::Acquired);
    }

    #[test]
    fn same_role_reacquire_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let lock = lock_in(&dir);
        lock.acquire(Role::Preview, false).unwrap();
        assert_eq!(lock.acquire(Role::Preview, false).unwrap(), AcquireOutcome::Acquired);
    }

    #[test]
    fn record_without_force_is_busy_against_preview() {
        let dir = TempDir::new().unwrap();
        let lock = lock_in(&dir);
        lock.acquire(Role::Preview, false).unwrap();
        assert_eq!(lock.acquire(Role::Record, false).unwrap(), AcquireOutcome::Busy(Role::Preview));
    }

    #[test]
    fn record_with_force_evicts_preview() {
        let dir = TempDir::new().unwrap();
        let lock = lock_in(&dir);
        lock.acquire(Role::Preview, false).unwrap();
        assert_eq!(lock.acquire(Role::Record, true).unwrap(), AcquireOutcome::Acquired);
        assert_eq!(lock.held_role(), Some(Role::Record));
    }

    #[test]
    fn preview_can_never_force_evict_record() {
        let dir = TempDir::new().unwrap();
        let lock = lock_in(&dir);
        lock.acquire(Role::Record, false).unwrap();
        assert_eq!(lock.acquire(Role::Preview, true).unwrap(), AcquireOutcome::Busy(Role::Record));
    }

    #[test]
    fn release_then_reacquire_by_other_role_succeeds() {
        let dir = TempDir::new().unwrap();
        let lock = lock_in(&dir);
        lock.acquire(Role::Preview, false).unwrap();
        lock.release().unwrap();
        assert_eq!(lock.acquire(Role::Record, false).unwrap(), AcquireOutcome::Acquired);
    }

    #[test]
    fn leftover_payload_from_a_dead_process_reports_stale() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cameras.lock");
        // Simulate a payload left behind by a crashed prior run: a pid
        // that is certainly not alive, and no OS lock held (we never
        // flock'd it in this test process).
        let payload = LockPayload {
            role: Role::Record,
            pid: 999_999,
            started_at_unix: 0.0,
            nonce: 1,
            heartbeat_unix: 0.0,
        };
        std::fs::write(&path, serde_json::to_vec(&payload).unwrap()).unwrap();

        let lock = ExclusionLock::at(path);
        assert_eq!(lock.acquire(Role::Preview, false).unwrap(), AcquireOutcome::Stale(Role::Record));
    }
}
