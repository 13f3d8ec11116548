use std::collections::{HashMap, HashSet};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::Kv;

struct StringEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl StringEntry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

#[derive(Default)]
struct Inner {
    strings: HashMap<String, StringEntry>,
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, HashSet<String>>,
}

impl Inner {
    /// Drop an expired string entry so readers never observe it.
    fn purge(&mut self, key: &str, now: Instant) {
        if let Some(e) = self.strings.get(key) {
            if e.is_expired(now) {
                self.strings.remove(key);
            }
        }
    }
}

/// Single-process KV substrate. Every command runs under one mutex, which
/// gives the same atomicity the scripted operations have on a networked
/// backend. Expiry uses the tokio clock so paused-time tests cover leases.
#[derive(Default)]
pub struct MemoryKv {
    inner: Mutex<Inner>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Kv for MemoryKv {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.purge(key, now);
        Ok(inner.strings.get(key).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<()> {
        let entry = StringEntry {
            value: value.to_string(),
            expires_at: ttl.map(|d| Instant::now() + d),
        };
        self.inner.lock().strings.insert(key.to_string(), entry);
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<bool> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.purge(key, now);
        if inner.strings.contains_key(key) {
            return Ok(false);
        }
        inner.strings.insert(
            key.to_string(),
            StringEntry {
                value: value.to_string(),
                expires_at: ttl.map(|d| now + d),
            },
        );
        Ok(true)
    }

    async fn del(&self, key: &str) -> anyhow::Result<bool> {
        let mut inner = self.inner.lock();
        let hit = inner.strings.remove(key).is_some()
            | inner.hashes.remove(key).is_some()
            | inner.sets.remove(key).is_some();
        Ok(hit)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> anyhow::Result<bool> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.purge(key, now);
        match inner.strings.get_mut(key) {
            Some(e) => {
                e.expires_at = Some(now + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> anyhow::Result<Option<Duration>> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.purge(key, now);
        Ok(inner
            .strings
            .get(key)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn hget(&self, key: &str, field: &str) -> anyhow::Result<Option<String>> {
        let inner = self.inner.lock();
        Ok(inner.hashes.get(key).and_then(|h| h.get(field).cloned()))
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> anyhow::Result<()> {
        let mut inner = self.inner.lock();
        inner
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hset_multi(&self, key: &str, entries: &[(String, String)]) -> anyhow::Result<()> {
        let mut inner = self.inner.lock();
        let hash = inner.hashes.entry(key.to_string()).or_default();
        for (field, value) in entries {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> anyhow::Result<HashMap<String, String>> {
        let inner = self.inner.lock();
        Ok(inner.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> anyhow::Result<i64> {
        let mut inner = self.inner.lock();
        let hash = inner.hashes.entry(key.to_string()).or_default();
        let slot = hash.entry(field.to_string()).or_insert_with(|| "0".into());
        let current: i64 = slot
            .parse()
            .map_err(|_| anyhow::anyhow!("hash value at {key}/{field} is not an integer"))?;
        let next = current + delta;
        *slot = next.to_string();
        Ok(next)
    }

    async fn sadd(&self, key: &str, member: &str) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock();
        let added = inner
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(added as u64)
    }

    async fn spop(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut inner = self.inner.lock();
        let Some(set) = inner.sets.get_mut(key) else {
            return Ok(None);
        };
        let member = match set.iter().next() {
            Some(m) => m.clone(),
            None => return Ok(None),
        };
        set.remove(&member);
        Ok(Some(member))
    }

    async fn scard(&self, key: &str) -> anyhow::Result<u64> {
        let inner = self.inner.lock();
        Ok(inner.sets.get(key).map(|s| s.len() as u64).unwrap_or(0))
    }

    async fn smembers(&self, key: &str) -> anyhow::Result<Vec<String>> {
        let inner = self.inner.lock();
        Ok(inner
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn rename(&self, src: &str, dst: &str) -> anyhow::Result<()> {
        let mut inner = self.inner.lock();
        if let Some(e) = inner.strings.remove(src) {
            inner.strings.insert(dst.to_string(), e);
        } else if let Some(h) = inner.hashes.remove(src) {
            inner.hashes.insert(dst.to_string(), h);
        } else if let Some(s) = inner.sets.remove(src) {
            inner.sets.insert(dst.to_string(), s);
        } else {
            anyhow::bail!("rename: no such key {src}");
        }
        Ok(())
    }

    async fn compare_and_delete(&self, key: &str, token: &str) -> anyhow::Result<bool> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.purge(key, now);
        match inner.strings.get(key) {
            Some(e) if e.value == token => {
                inner.strings.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn compare_and_expire(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> anyhow::Result<bool> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.purge(key, now);
        match inner.strings.get_mut(key) {
            Some(e) if e.value == token => {
                e.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn set_nx_respects_expiry() {
        let kv = MemoryKv::new();

        let ttl = Some(Duration::from_secs(1));
        assert!(kv.set_nx("k", "a", ttl).await.unwrap());
        assert!(!kv.set_nx("k", "b", ttl).await.unwrap());

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!(kv.set_nx("k", "b", ttl).await.unwrap());
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn expire_and_ttl_roundtrip() {
        let kv = MemoryKv::new();

        kv.set("k", "v", None).await.unwrap();
        assert_eq!(kv.ttl("k").await.unwrap(), None);

        assert!(kv.expire("k", Duration::from_secs(2)).await.unwrap());
        let left = kv.ttl("k").await.unwrap().unwrap();
        assert!(left <= Duration::from_secs(2));

        tokio::time::sleep(Duration::from_millis(2_100)).await;
        assert!(kv.get("k").await.unwrap().is_none());
        assert!(!kv.expire("k", Duration::from_secs(2)).await.unwrap());
    }

    #[tokio::test]
    async fn hincrby_tracks_post_value() {
        let kv = MemoryKv::new();
        assert_eq!(kv.hincrby("h", "f", 3).await.unwrap(), 3);
        assert_eq!(kv.hincrby("h", "f", -5).await.unwrap(), -2);
        assert_eq!(kv.hget("h", "f").await.unwrap().as_deref(), Some("-2"));
    }

    #[tokio::test]
    async fn spop_drains_set() {
        let kv = MemoryKv::new();
        kv.sadd("s", "a").await.unwrap();
        kv.sadd("s", "b").await.unwrap();
        assert_eq!(kv.sadd("s", "a").await.unwrap(), 0);

        let mut popped = vec![
            kv.spop("s").await.unwrap().unwrap(),
            kv.spop("s").await.unwrap().unwrap(),
        ];
        popped.sort();
        assert_eq!(popped, ["a", "b"]);
        assert!(kv.spop("s").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rename_replaces_destination() {
        let kv = MemoryKv::new();
        kv.sadd("tmp", "x").await.unwrap();
        kv.sadd("live", "stale").await.unwrap();

        kv.rename("tmp", "live").await.unwrap();
        assert_eq!(kv.smembers("live").await.unwrap(), ["x"]);
        assert!(kv.rename("tmp", "live").await.is_err());
    }

    #[tokio::test]
    async fn compare_ops_check_owner_token() {
        let kv = MemoryKv::new();
        kv.set_nx("lk", "tok", Some(Duration::from_secs(5)))
            .await
            .unwrap();

        assert!(
            !kv.compare_and_expire("lk", "other", Duration::from_secs(9))
                .await
                .unwrap()
        );
        assert!(
            kv.compare_and_expire("lk", "tok", Duration::from_secs(9))
                .await
                .unwrap()
        );

        assert!(!kv.compare_and_delete("lk", "other").await.unwrap());
        assert!(kv.compare_and_delete("lk", "tok").await.unwrap());
        assert!(kv.get("lk").await.unwrap().is_none());
    }
}
