pub mod memory;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub type SharedKv = Arc<dyn Kv>;

/// Typed façade over the key–value store.
///
/// The surface is restricted to the commands this service actually issues:
/// strings with TTL, hashes with atomic `HINCRBY`, sets with atomic `SPOP`,
/// `RENAME`, and the two owner-token compare-and-swap operations. On a
/// networked backend the compare operations are EVAL scripts:
///
///   compare_and_delete: `get(key)==token ? del(key) : 0`
///   compare_and_expire: `get(key)==token ? expire(key, ttl) : 0`
///
/// Both must execute atomically on the store.
#[async_trait::async_trait]
pub trait Kv: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<()>;
    /// Set if absent, with optional TTL. Returns true when the key was set.
    async fn set_nx(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<bool>;
    async fn del(&self, key: &str) -> anyhow::Result<bool>;
    async fn expire(&self, key: &str, ttl: Duration) -> anyhow::Result<bool>;
    /// Remaining TTL, or None when the key is missing or has no expiry.
    async fn ttl(&self, key: &str) -> anyhow::Result<Option<Duration>>;

    async fn hget(&self, key: &str, field: &str) -> anyhow::Result<Option<String>>;
    async fn hset(&self, key: &str, field: &str, value: &str) -> anyhow::Result<()>;
    async fn hset_multi(&self, key: &str, entries: &[(String, String)]) -> anyhow::Result<()>;
    async fn hgetall(&self, key: &str) -> anyhow::Result<HashMap<String, String>>;
    /// Atomic field increment; returns the post-value.
    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> anyhow::Result<i64>;

    /// Returns 1 when the member was added, 0 when it was already present.
    async fn sadd(&self, key: &str, member: &str) -> anyhow::Result<u64>;
    /// Atomic removal of one arbitrary member.
    async fn spop(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn scard(&self, key: &str) -> anyhow::Result<u64>;
    async fn smembers(&self, key: &str) -> anyhow::Result<Vec<String>>;

    /// Atomically replace `dst` with `src`. Errors when `src` does not exist.
    async fn rename(&self, src: &str, dst: &str) -> anyhow::Result<()>;

    async fn compare_and_delete(&self, key: &str, token: &str) -> anyhow::Result<bool>;
    async fn compare_and_expire(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> anyhow::Result<bool>;
}
