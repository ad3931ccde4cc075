//! In-process advisory file locking with waits-for-graph deadlock detection.
//!
//! Agents don't actually flock() the filesystem — two agents editing the
//! same logical resource need to serialize against *each other*, not against
//! a kernel-level file descriptor lock, so this is a plain in-memory table
//! of resource path -> holders, guarded by a `Mutex` + `Condvar` the way a
//! blocking-with-timeout queue is built without pulling in an async runtime
//! dependency at this layer.
//!
//! Three lock kinds, per spec: [`LockKind::Read`] locks may coexist with
//! each other; [`LockKind::Write`] is exclusive with respect to writers but
//! (deliberately) still checked against readers below; [`LockKind::Exclusive`]
//! is compatible with nothing. Before blocking, [`FileLockManager::acquire`]
//! walks the waits-for graph implied by current holders and pending waiters:
//! if granting this request would create a cycle, it fails fast with
//! [`LockError::WouldDeadlock`] instead of blocking forever — deadlock
//! detection takes precedence over a plain timeout when both would apply.
//! [`FileLockManager::acquire_batch`] sorts its paths lexicographically
//! before acquiring them one at a time, imposing a global acquisition order
//! so two batch callers contending on the same path set never deadlock each
//! other; any failure mid-batch releases everything already acquired in
//! that batch before returning.

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// The three lock kinds from spec.md §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    /// Shared: any number of readers may hold a lock on the same path.
    Read,
    /// Exclusive with respect to other writers; compatible with no readers.
    Write,
    /// Exclusive with respect to everything, including readers.
    Exclusive,
}

impl LockKind {
    /// Whether a lock of `self` can be granted alongside `other`, both
    /// already held on the same path.
    fn compatible_with(self, other: LockKind) -> bool {
        matches!((self, other), (LockKind::Read, LockKind::Read))
    }
}

#[derive(Debug)]
pub enum LockError {
    /// A non-blocking (`timeout == 0`) acquire found the path already held
    /// incompatibly.
    Busy { resource: String },
    /// Acquiring would complete a cycle in the waits-for graph. Checked
    /// before blocking, so this never fires after a caller has started
    /// waiting — it always wins over a later [`LockError::Timeout`].
    WouldDeadlock { resource: String, holder: String },
    /// The blocking wait exceeded the caller's timeout.
    Timeout { resource: String },
    /// The requested transition (upgrade/downgrade) isn't valid from the
    /// caller's current hold on the resource.
    Invalid { resource: String, reason: String },
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockError::Busy { resource } => write!(f, "'{}' is busy", resource),
            LockError::WouldDeadlock { resource, holder } => {
                write!(f, "acquiring '{}' would deadlock with holder '{}'", resource, holder)
            }
            LockError::Timeout { resource } => write!(f, "timed out waiting for lock on '{}'", resource),
            LockError::Invalid { resource, reason } => write!(f, "invalid lock transition on '{}': {}", resource, reason),
        }
    }
}

impl Error for LockError {}

#[derive(Debug, Clone)]
struct Holder {
    owner: String,
    kind: LockKind,
    acquired_at: Instant,
    expires_at: Option<Instant>,
}

struct LockState {
    /// resource path -> current holders (len > 1 only possible for Read).
    holders: HashMap<String, Vec<Holder>>,
    /// agent id -> resource path it is currently blocked waiting on.
    waiting_for: HashMap<String, String>,
}

impl LockState {
    fn is_expired(holder: &Holder, now: Instant) -> bool {
        holder.expires_at.map(|at| at <= now).unwrap_or(false)
    }

    /// Drop any holders of `resource` whose expiry has passed. Returns
    /// whether anything was reaped (callers use this to decide whether to
    /// wake waiters).
    fn reap_path(&mut self, resource: &str, now: Instant) -> bool {
        let Some(holders) = self.holders.get_mut(resource) else { return false };
        let before = holders.len();
        holders.retain(|h| !Self::is_expired(h, now));
        if holders.is_empty() {
            self.holders.remove(resource);
        }
        holders.len() != before
    }

    fn can_grant(&self, resource: &str, kind: LockKind, owner: &str) -> bool {
        match self.holders.get(resource) {
            None => true,
            Some(holders) => holders
                .iter()
                .all(|h| h.owner == owner || kind.compatible_with(h.kind)),
        }
    }

    fn holder_blocking(&self, resource: &str, owner: &str) -> Option<String> {
        self.holders
            .get(resource)
            .and_then(|holders| holders.iter().find(|h| h.owner != owner))
            .map(|h| h.owner.clone())
    }
}

/// Process-wide advisory lock table over logical resource paths.
pub struct FileLockManager {
    state: Mutex<LockState>,
    released: Condvar,
}

impl Default for FileLockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FileLockManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LockState { holders: HashMap::new(), waiting_for: HashMap::new() }),
            released: Condvar::new(),
        }
    }

    /// Attempt to acquire `resource` for `owner` without blocking. `true` if
    /// granted (newly, or because the owner already compatibly holds it).
    pub fn try_acquire(&self, resource: &str, kind: LockKind, owner: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        state.reap_path(resource, Instant::now());
        if !state.can_grant(resource, kind, owner) {
            return false;
        }
        self.grant(&mut state, resource, kind, owner, None);
        true
    }

    fn grant(&self, state: &mut LockState, resource: &str, kind: LockKind, owner: &str, expires_at: Option<Instant>) {
        let holders = state.holders.entry(resource.to_string()).or_default();
        if let Some(existing) = holders.iter_mut().find(|h| h.owner == owner) {
            existing.kind = kind;
            existing.expires_at = expires_at;
        } else {
            holders.push(Holder { owner: owner.to_string(), kind, acquired_at: Instant::now(), expires_at });
        }
        state.waiting_for.remove(owner);
    }

    /// Acquire `resource` for `owner`, blocking up to `timeout` if it is
    /// currently held incompatibly. `timeout == Duration::ZERO` behaves like
    /// [`Self::try_acquire`] (fails with [`LockError::Busy`] instead of
    /// blocking); pass a very large `timeout` to wait indefinitely.
    pub fn acquire(&self, resource: &str, kind: LockKind, owner: &str, timeout: Duration) -> Result<(), LockError> {
        self.acquire_timed(resource, kind, owner, timeout, None)
    }

    /// As [`Self::acquire`], additionally marking the grant to expire after
    /// `expires_after` (from the moment it is granted) so a stuck owner
    /// can't strand other waiters forever; `None` never expires.
    pub fn acquire_timed(
        &self,
        resource: &str,
        kind: LockKind,
        owner: &str,
        timeout: Duration,
        expires_after: Option<Duration>,
    ) -> Result<(), LockError> {
        let mut state = self.state.lock().unwrap();
        state.reap_path(resource, Instant::now());

        loop {
            if state.can_grant(resource, kind, owner) {
                let expires_at = expires_after.map(|d| Instant::now() + d);
                self.grant(&mut state, resource, kind, owner, expires_at);
                return Ok(());
            }

            let Some(blocking_owner) = state.holder_blocking(resource, owner) else {
                // Shouldn't happen: can_grant said no but no incompatible
                // holder found. Treat conservatively as transient busy.
                return Err(LockError::Busy { resource: resource.to_string() });
            };

            if Self::would_deadlock(&state, owner, &blocking_owner) {
                return Err(LockError::WouldDeadlock { resource: resource.to_string(), holder: blocking_owner });
            }

            if timeout.is_zero() {
                return Err(LockError::Busy { resource: resource.to_string() });
            }

            state.waiting_for.insert(owner.to_string(), resource.to_string());
            let deadline = Instant::now() + timeout;
            let now = Instant::now();
            if now >= deadline {
                state.waiting_for.remove(owner);
                return Err(LockError::Timeout { resource: resource.to_string() });
            }
            let (guard, result) = self.released.wait_timeout(state, deadline - now).unwrap();
            state = guard;
            state.reap_path(resource, Instant::now());
            if result.timed_out() && !state.can_grant(resource, kind, owner) {
                state.waiting_for.remove(owner);
                return Err(LockError::Timeout { resource: resource.to_string() });
            }
        }
    }

    /// All-or-nothing batch acquire. Paths are sorted lexicographically
    /// before acquiring, imposing a global order so two batch callers
    /// contending on an overlapping path set never deadlock each other. If
    /// any path fails, every lock already acquired in this call is released
    /// before the error is returned — the inventory is left exactly as it
    /// was found.
    pub fn acquire_batch(
        &self,
        paths: &[String],
        kind: LockKind,
        owner: &str,
        timeout: Duration,
    ) -> Result<(), LockError> {
        let mut sorted = paths.to_vec();
        sorted.sort();
        let mut acquired = Vec::with_capacity(sorted.len());
        for path in &sorted {
            match self.acquire(path, kind, owner, timeout) {
                Ok(()) => acquired.push(path.clone()),
                Err(e) => {
                    for held in &acquired {
                        self.release(held, owner);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Upgrade a held `Read` lock to `Write`, atomically with respect to
    /// other lock operations on this path. Fails with
    /// [`LockError::Invalid`] if the caller doesn't currently hold `Read`;
    /// may otherwise block (and can deadlock) exactly like a fresh
    /// `Write` acquire.
    pub fn upgrade(&self, resource: &str, owner: &str, timeout: Duration) -> Result<(), LockError> {
        {
            let state = self.state.lock().unwrap();
            let holds_read = state
                .holders
                .get(resource)
                .map(|hs| hs.iter().any(|h| h.owner == owner && h.kind == LockKind::Read))
                .unwrap_or(false);
            if !holds_read {
                return Err(LockError::Invalid {
                    resource: resource.to_string(),
                    reason: "caller does not hold a read lock to upgrade".to_string(),
                });
            }
        }
        self.acquire(resource, LockKind::Write, owner, timeout)
    }

    /// Downgrade a held `Write` lock to `Read`. Always succeeds immediately
    /// (releasing a write lock can only ever unblock other waiters, never
    /// create contention) and wakes any blocked readers.
    pub fn downgrade(&self, resource: &str, owner: &str) -> Result<(), LockError> {
        let mut state = self.state.lock().unwrap();
        let holds_write = state
            .holders
            .get(resource)
            .map(|hs| hs.iter().any(|h| h.owner == owner && h.kind == LockKind::Write))
            .unwrap_or(false);
        if !holds_write {
            return Err(LockError::Invalid {
                resource: resource.to_string(),
                reason: "caller does not hold a write lock to downgrade".to_string(),
            });
        }
        self.grant(&mut state, resource, LockKind::Read, owner, None);
        self.released.notify_all();
        Ok(())
    }

    /// Release `resource`, waking any blocked waiters. No-op if `owner`
    /// does not currently hold it.
    pub fn release(&self, resource: &str, owner: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(holders) = state.holders.get_mut(resource) {
            let before = holders.len();
            holders.retain(|h| h.owner != owner);
            if holders.is_empty() {
                state.holders.remove(resource);
            }
            if holders.len() != before {
                self.released.notify_all();
            }
        }
    }

    pub fn is_locked(&self, resource: &str) -> bool {
        self.state.lock().unwrap().holders.contains_key(resource)
    }

    /// All current holders of `resource` (owner, kind) pairs, for
    /// diagnostics and `get_by_owner`-style queries.
    pub fn holders_of(&self, resource: &str) -> Vec<(String, LockKind)> {
        self.state
            .lock()
            .unwrap()
            .holders
            .get(resource)
            .map(|hs| hs.iter().map(|h| (h.owner.clone(), h.kind)).collect())
            .unwrap_or_default()
    }

    /// The first holder of `resource`, for callers that know it can only be
    /// exclusively held (kept for call sites that only ever use `Write`).
    pub fn holder_of(&self, resource: &str) -> Option<String> {
        self.state.lock().unwrap().holders.get(resource).and_then(|hs| hs.first()).map(|h| h.owner.clone())
    }

    /// Every resource path `owner` currently holds a lock on.
    pub fn resources_held_by(&self, owner: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .holders
            .iter()
            .filter(|(_, hs)| hs.iter().any(|h| h.owner == owner))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Release every resource held by `owner` (used when an agent is torn
    /// down mid-task so its locks don't strand other waiters).
    pub fn release_all(&self, owner: &str) {
        let mut state = self.state.lock().unwrap();
        let held: Vec<String> = state
            .holders
            .iter()
            .filter(|(_, hs)| hs.iter().any(|h| h.owner == owner))
            .map(|(path, _)| path.clone())
            .collect();
        for path in &held {
            if let Some(holders) = state.holders.get_mut(path) {
                holders.retain(|h| h.owner != owner);
                if holders.is_empty() {
                    state.holders.remove(path);
                }
            }
        }
        state.waiting_for.remove(owner);
        if !held.is_empty() {
            self.released.notify_all();
        }
    }

    /// Release every holder anywhere whose expiry has passed. Intended to be
    /// called periodically (or on demand before an acquire) by a background
    /// reaper task; returns the number of holders reaped.
    pub fn reap_expired(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        let mut reaped = 0usize;
        let paths: Vec<String> = state.holders.keys().cloned().collect();
        for path in paths {
            let before = state.holders.get(&path).map(|h| h.len()).unwrap_or(0);
            state.reap_path(&path, now);
            let after = state.holders.get(&path).map(|h| h.len()).unwrap_or(0);
            reaped += before - after;
        }
        if reaped > 0 {
            self.released.notify_all();
        }
        reaped
    }

    /// Would `owner` blocking on `holder` close a cycle, following the chain
    /// of existing waits-for edges from `holder` onward? E.g. if `b` already
    /// waits on a resource held by `owner`, then `owner` waiting on `b`'s
    /// resource would deadlock both.
    fn would_deadlock(state: &LockState, owner: &str, holder: &str) -> bool {
        Self::deadlock_cycle(state, owner, holder).is_some()
    }

    /// As [`Self::would_deadlock`], but returns the full cycle of owner ids
    /// (starting at `holder`, ending just before `owner`) for diagnostics —
    /// the "get_deadlock_cycle" surface from spec.md §4.5.
    fn deadlock_cycle(state: &LockState, owner: &str, holder: &str) -> Option<Vec<String>> {
        let mut seen = HashSet::new();
        let mut path = Vec::new();
        let mut current = holder.to_string();
        loop {
            if current == owner {
                return Some(path);
            }
            if !seen.insert(current.clone()) {
                return None;
            }
            path.push(current.clone());
            let blocking_resource = state.waiting_for.get(&current)?;
            let next_holder = state.holders.get(blocking_resource)?.first()?;
            current = next_holder.owner.clone();
        }
    }

    /// Diagnostic surface: the cycle of owners that would deadlock if
    /// `owner` tried to acquire a resource held by `holder` right now, or
    /// `None` if no such cycle currently exists.
    pub fn get_deadlock_cycle(&self, owner: &str, holder: &str) -> Option<Vec<String>> {
        let state = self.state.lock().unwrap();
        Self::deadlock_cycle(&state, owner, holder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn try_acquire_is_exclusive_for_write() {
        let mgr = FileLockManager::new();
        assert!(mgr.try_acquire("plan.md", LockKind::Write, "alice"));
        assert!(!mgr.try_acquire("plan.md", LockKind::Write, "bob"));
        assert!(mgr.try_acquire("plan.md", LockKind::Write, "alice")); // re-entrant
    }

    #[test]
    fn read_locks_coexist() {
        let mgr = FileLockManager::new();
        assert!(mgr.try_acquire("data.csv", LockKind::Read, "alice"));
        assert!(mgr.try_acquire("data.csv", LockKind::Read, "bob"));
        assert_eq!(mgr.holders_of("data.csv").len(), 2);
        assert!(!mgr.try_acquire("data.csv", LockKind::Write, "carol"));
    }

    #[test]
    fn exclusive_rejects_even_readers() {
        let mgr = FileLockManager::new();
        assert!(mgr.try_acquire("config.toml", LockKind::Exclusive, "alice"));
        assert!(!mgr.try_acquire("config.toml", LockKind::Read, "bob"));
    }

    #[test]
    fn release_wakes_blocked_waiter() {
        let mgr = Arc::new(FileLockManager::new());
        assert!(mgr.try_acquire("shared.txt", LockKind::Write, "alice"));

        let mgr2 = Arc::clone(&mgr);
        let handle = thread::spawn(move || {
            mgr2.acquire("shared.txt", LockKind::Write, "bob", Duration::from_secs(5))
        });

        thread::sleep(Duration::from_millis(50));
        mgr.release("shared.txt", "alice");

        assert!(handle.join().unwrap().is_ok());
        assert_eq!(mgr.holder_of("shared.txt"), Some("bob".to_string()));
    }

    #[test]
    fn acquire_times_out_when_never_released() {
        let mgr = FileLockManager::new();
        assert!(mgr.try_acquire("locked.txt", LockKind::Write, "alice"));
        let result = mgr.acquire("locked.txt", LockKind::Write, "bob", Duration::from_millis(50));
        assert!(matches!(result, Err(LockError::Timeout { .. })));
    }

    #[test]
    fn zero_timeout_acquire_behaves_like_try_acquire() {
        let mgr = FileLockManager::new();
        assert!(mgr.try_acquire("locked.txt", LockKind::Write, "alice"));
        let result = mgr.acquire("locked.txt", LockKind::Write, "bob", Duration::ZERO);
        assert!(matches!(result, Err(LockError::Busy { .. })));
    }

    #[test]
    fn detects_two_party_deadlock_without_blocking() {
        let mgr = Arc::new(FileLockManager::new());
        assert!(mgr.try_acquire("a.txt", LockKind::Write, "alice"));
        assert!(mgr.try_acquire("b.txt", LockKind::Write, "bob"));

        let mgr2 = Arc::clone(&mgr);
        let handle =
            thread::spawn(move || mgr2.acquire("a.txt", LockKind::Write, "bob", Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(50));

        let result = mgr.acquire("b.txt", LockKind::Write, "alice", Duration::from_secs(5));
        assert!(matches!(result, Err(LockError::WouldDeadlock { .. })));
        assert_eq!(
            mgr.get_deadlock_cycle("alice", "bob"),
            Some(vec!["bob".to_string()])
        );

        mgr.release("a.txt", "alice");
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn disjoint_canonical_order_never_deadlocks() {
        // Two agents contending on disjoint resources in the same
        // (lexicographic) order never deadlock each other.
        let mgr = Arc::new(FileLockManager::new());
        let mgr2 = Arc::clone(&mgr);
        let t1 = thread::spawn(move || {
            mgr2.acquire_batch(
                &["a.txt".to_string(), "b.txt".to_string()],
                LockKind::Write,
                "alice",
                Duration::from_secs(2),
            )
        });
        let mgr3 = Arc::clone(&mgr);
        let t2 = thread::spawn(move || {
            mgr3.acquire_batch(
                &["c.txt".to_string(), "d.txt".to_string()],
                LockKind::Write,
                "bob",
                Duration::from_secs(2),
            )
        });
        assert!(t1.join().unwrap().is_ok());
        assert!(t2.join().unwrap().is_ok());
    }

    #[test]
    fn batch_acquire_is_all_or_nothing() {
        let mgr = FileLockManager::new();
        assert!(mgr.try_acquire("b.txt", LockKind::Write, "bob"));

        let result = mgr.acquire_batch(
            &["a.txt".to_string(), "b.txt".to_string()],
            LockKind::Write,
            "alice",
            Duration::ZERO,
        );
        assert!(result.is_err());
        // a.txt must have been released again since the batch failed on b.txt.
        assert!(!mgr.is_locked("a.txt"));
        assert!(mgr.holder_of("b.txt") == Some("bob".to_string()));
    }

    #[test]
    fn upgrade_requires_existing_read_hold() {
        let mgr = FileLockManager::new();
        let err = mgr.upgrade("f.txt", "alice", Duration::from_millis(10));
        assert!(matches!(err, Err(LockError::Invalid { .. })));

        assert!(mgr.try_acquire("f.txt", LockKind::Read, "alice"));
        assert!(mgr.upgrade("f.txt", "alice", Duration::from_millis(10)).is_ok());
        assert_eq!(mgr.holders_of("f.txt"), vec![("alice".to_string(), LockKind::Write)]);
    }

    #[test]
    fn downgrade_requires_existing_write_hold_and_admits_readers() {
        let mgr = FileLockManager::new();
        assert!(mgr.try_acquire("f.txt", LockKind::Write, "alice"));
        assert!(mgr.downgrade("f.txt", "alice").is_ok());
        assert!(mgr.try_acquire("f.txt", LockKind::Read, "bob"));
    }

    #[test]
    fn release_all_frees_every_resource_for_an_agent() {
        let mgr = FileLockManager::new();
        assert!(mgr.try_acquire("a.txt", LockKind::Write, "alice"));
        assert!(mgr.try_acquire("b.txt", LockKind::Write, "alice"));
        mgr.release_all("alice");
        assert!(!mgr.is_locked("a.txt"));
        assert!(!mgr.is_locked("b.txt"));
    }

    #[test]
    fn expired_lock_is_reclaimed() {
        let mgr = FileLockManager::new();
        mgr.acquire_timed(
            "stuck.txt",
            LockKind::Write,
            "alice",
            Duration::ZERO,
            Some(Duration::from_millis(10)),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(30));
        assert!(mgr.try_acquire("stuck.txt", LockKind::Write, "bob"));
    }
}
