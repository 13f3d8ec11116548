//! Owner-stamped distributed lock over the KV store.
//!
//! Acquisition is an atomic set-if-absent of a per-lock owner token with a
//! TTL. Release and lease renewal are compare-and-swap operations keyed by
//! that token, so a holder can never delete or extend a lock it lost. The
//! lock is not re-entrant: a second acquire under the same key fails even
//! for the same logical owner, because each `DistLock` carries its own token.

use std::time::Duration;

use store::{Kv as _, SharedKv};
use tokio::sync::watch;
use uuid::Uuid;

/// Canonical namespace for every lock key. Acquire, renew, and release all
/// operate on the prefixed form; callers pass the bare name.
const KEY_PREFIX: &str = "redisLock:";

const DEFAULT_TTL_SECS: u64 = 3;
const DEFAULT_BLOCK_WAIT_SECS: u64 = 5;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("lock is acquired by others")]
    AcquiredByOthers,
    /// Release found the key missing or stamped with a different token. The
    /// caller's critical section may have been interrupted.
    #[error("unlock failed: lock is no longer owned")]
    NotOwner,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl LockError {
    fn is_retryable(&self) -> bool {
        matches!(self, LockError::AcquiredByOthers)
    }
}

#[derive(Clone, Debug)]
struct LockOptions {
    ttl_secs: u64,
    blocking: bool,
    max_wait_secs: u64,
    watchdog: bool,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
            blocking: false,
            max_wait_secs: 0,
            watchdog: false,
        }
    }
}

pub struct DistLock {
    kv: SharedKv,
    key: String,
    token: String,
    opts: LockOptions,
    dog: Option<watch::Sender<bool>>,
}

impl DistLock {
    pub fn new(kv: SharedKv, name: &str) -> Self {
        Self {
            kv,
            key: format!("{KEY_PREFIX}{name}"),
            token: Uuid::new_v4().to_string(),
            opts: LockOptions::default(),
            dog: None,
        }
    }

    /// Lease duration in seconds. Zero means the key never expires, which
    /// also disables the watchdog.
    pub fn with_ttl_secs(mut self, secs: u64) -> Self {
        self.opts.ttl_secs = secs;
        self
    }

    /// Poll for the lock instead of failing on contention.
    pub fn blocking(mut self) -> Self {
        self.opts.blocking = true;
        self
    }

    pub fn with_max_wait_secs(mut self, secs: u64) -> Self {
        self.opts.max_wait_secs = secs;
        self
    }

    /// Spawn a renewer on acquisition that extends the lease every `ttl/3`
    /// until release.
    pub fn with_watchdog(mut self) -> Self {
        self.opts.watchdog = true;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn acquire(&mut self) -> Result<(), LockError> {
        self.repair_options();

        match self.try_acquire().await {
            Ok(()) => {
                self.start_watchdog();
                return Ok(());
            }
            Err(e) if self.opts.blocking && e.is_retryable() => {}
            Err(e) => return Err(e),
        }

        self.blocking_acquire().await?;
        self.start_watchdog();
        Ok(())
    }

    pub async fn release(&mut self) -> Result<(), LockError> {
        self.stop_watchdog();

        let owned = self.kv.compare_and_delete(&self.key, &self.token).await?;
        if !owned {
            return Err(LockError::NotOwner);
        }
        Ok(())
    }

    fn repair_options(&mut self) {
        if self.opts.blocking && self.opts.max_wait_secs == 0 {
            self.opts.max_wait_secs = DEFAULT_BLOCK_WAIT_SECS;
        }
        if self.opts.ttl_secs == 0 {
            // Without a lease there is nothing to renew.
            self.opts.watchdog = false;
        }
    }

    async fn try_acquire(&self) -> Result<(), LockError> {
        let ttl = match self.opts.ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let set = self.kv.set_nx(&self.key, &self.token, ttl).await?;
        if !set {
            return Err(LockError::AcquiredByOthers);
        }
        Ok(())
    }

    async fn blocking_acquire(&self) -> Result<(), LockError> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(self.opts.max_wait_secs);
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if tokio::time::Instant::now() >= deadline {
                return Err(LockError::AcquiredByOthers);
            }

            match self.try_acquire().await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn start_watchdog(&mut self) {
        if !self.opts.watchdog {
            return;
        }

        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let kv = self.kv.clone();
        let key = self.key.clone();
        let token = self.token.clone();
        let ttl = Duration::from_secs(self.opts.ttl_secs);
        let step = ttl / 3;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(step);
            // The immediate first tick is a harmless extra renewal.
            loop {
                tokio::select! {
                    _ = cancel_rx.changed() => return,
                    _ = ticker.tick() => {
                        // Renewal failures are swallowed: the lease lapses
                        // naturally and the next holder takes over.
                        match kv.compare_and_expire(&key, &token, ttl).await {
                            Ok(true) => {}
                            Ok(false) => {
                                tracing::debug!(key = %key, "lease renewal skipped, lock not owned");
                            }
                            Err(e) => {
                                tracing::debug!(key = %key, error = %e, "lease renewal failed");
                            }
                        }
                    }
                }
            }
        });

        self.dog = Some(cancel_tx);
    }

    fn stop_watchdog(&mut self) {
        if let Some(cancel) = self.dog.take() {
            let _ = cancel.send(true);
        }
    }
}

impl Drop for DistLock {
    fn drop(&mut self) {
        // If release was skipped, stop renewing so the lease lapses.
        self.stop_watchdog();
    }
}
