use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Mappings older than this are dropped the next time the store is written.
pub const RETENTION_DAYS: i64 = 30;

/// Where a session's notifications go, per channel.
pub trait ThreadStore {
    fn get_thread_id(&self, session_id: &str, channel_id: &str) -> Result<Option<String>>;
    fn put_thread_id(
        &self,
        session_id: &str,
        channel_id: &str,
        thread_id: &str,
        name: &str,
    ) -> Result<()>;
    fn remove_thread_id(&self, session_id: &str, channel_id: &str) -> Result<()>;

    /// Return the session's thread for `channel_id`, or run `create` and
    /// record the thread it made. The lookup, `create`, and the write happen
    /// under one exclusive lock, so concurrent hooks for a new session end
    /// up sharing a single thread. A mapping to `stale` counts as missing.
    /// Store problems are logged and never stop `create` from running.
    fn claim_thread<T, E, F>(
        &self,
        session_id: &str,
        channel_id: &str,
        stale: Option<&str>,
        create: F,
    ) -> Result<Claim<T>, E>
    where
        F: FnOnce() -> Result<NewThread<T>, E>;
}

/// A thread made by the `create` callback of [`ThreadStore::claim_thread`].
pub struct NewThread<T> {
    pub thread_id: String,
    pub name: String,
    pub value: T,
}

#[derive(Debug, PartialEq)]
pub enum Claim<T> {
    /// Another invocation mapped a thread first.
    Existing(String),
    Created(T),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub thread_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// session id -> channel id -> record
type ThreadMap = BTreeMap<String, BTreeMap<String, ThreadRecord>>;

/// Thread mappings in a single JSON file, shared by every hook process.
///
/// Concurrent invocations are serialized through an advisory lock on a
/// sidecar `.lock` file: shared while reading, exclusive for the whole
/// read-modify-write of an update. The data file itself is replaced by
/// rename, so readers never see a partial write.
pub struct JsonThreadStore {
    path: PathBuf,
}

impl JsonThreadStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn open_lock(&self) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let lock_path = self.lock_path();
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("opening {}", lock_path.display()))
    }

    /// Read the map. A missing file is empty; a corrupt one is logged and
    /// treated as empty so the next write replaces it.
    fn load(&self) -> Result<ThreadMap> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ThreadMap::new()),
            Err(e) => return Err(e).with_context(|| format!("reading {}", self.path.display())),
        };
        match serde_json::from_str(&contents) {
            Ok(map) => Ok(map),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "thread store is corrupt, starting fresh");
                Ok(ThreadMap::new())
            }
        }
    }

    fn save(&self, map: &ThreadMap) -> Result<()> {
        let json = serde_json::to_string_pretty(map).context("serializing thread store")?;
        let tmp = self.path.with_extension(format!("tmp.{}", std::process::id()));
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))
    }

    /// Run `f` against the map under an exclusive lock, prune, and save.
    fn update<F>(&self, now: DateTime<Utc>, f: F) -> Result<()>
    where
        F: FnOnce(&mut ThreadMap),
    {
        let lock = self.open_lock()?;
        lock.lock_exclusive().context("locking thread store")?;
        let result = self.load().and_then(|mut map| {
            f(&mut map);
            prune(&mut map, now);
            self.save(&map)
        });
        let _ = lock.unlock();
        result
    }

    pub(crate) fn put_at(
        &self,
        session_id: &str,
        channel_id: &str,
        record: ThreadRecord,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.update(now, |map| {
            map.entry(session_id.to_string())
                .or_default()
                .insert(channel_id.to_string(), record);
        })
    }

    fn claim_at<T, E, F>(
        &self,
        session_id: &str,
        channel_id: &str,
        stale: Option<&str>,
        create: F,
        now: DateTime<Utc>,
    ) -> Result<Claim<T>, E>
    where
        F: FnOnce() -> Result<NewThread<T>, E>,
    {
        let lock = self.open_lock().and_then(|lock| {
            lock.lock_exclusive().context("locking thread store")?;
            Ok(lock)
        });
        let lock = match lock {
            Ok(lock) => Some(lock),
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "thread store unavailable, claiming thread unlocked");
                None
            }
        };

        // Only write back a map that was actually read.
        let loaded = if lock.is_some() {
            self.load().map_err(|e| {
                tracing::warn!(error = %format!("{e:#}"), "reading thread store");
            })
        } else {
            Err(())
        };

        let existing = loaded.as_ref().ok().and_then(|map| {
            map.get(session_id)
                .and_then(|channels| channels.get(channel_id))
                .map(|record| record.thread_id.clone())
                .filter(|thread_id| Some(thread_id.as_str()) != stale)
        });
        let result = match existing {
            Some(thread_id) => Ok(Claim::Existing(thread_id)),
            None => create().map(|created| {
                if let Ok(mut map) = loaded {
                    let record = ThreadRecord {
                        thread_id: created.thread_id,
                        name: created.name,
                        created_at: now,
                    };
                    map.entry(session_id.to_string())
                        .or_default()
                        .insert(channel_id.to_string(), record);
                    prune(&mut map, now);
                    if let Err(e) = self.save(&map) {
                        tracing::warn!(error = %format!("{e:#}"), "saving thread mapping");
                    }
                }
                Claim::Created(created.value)
            }),
        };

        if let Some(lock) = lock {
            let _ = lock.unlock();
        }
        result
    }

    pub fn get_record(&self, session_id: &str, channel_id: &str) -> Result<Option<ThreadRecord>> {
        let lock = self.open_lock()?;
        lock.lock_shared().context("locking thread store")?;
        let result = self.load().map(|mut map| {
            map.get_mut(session_id)
                .and_then(|channels| channels.remove(channel_id))
        });
        let _ = lock.unlock();
        result
    }
}

/// Drop records older than [`RETENTION_DAYS`] and sessions left empty.
fn prune(map: &mut ThreadMap, now: DateTime<Utc>) {
    let cutoff = now - Duration::days(RETENTION_DAYS);
    for channels in map.values_mut() {
        channels.retain(|_, record| record.created_at >= cutoff);
    }
    map.retain(|_, channels| !channels.is_empty());
}

impl ThreadStore for JsonThreadStore {
    fn get_thread_id(&self, session_id: &str, channel_id: &str) -> Result<Option<String>> {
        Ok(self
            .get_record(session_id, channel_id)?
            .map(|record| record.thread_id))
    }

    fn put_thread_id(
        &self,
        session_id: &str,
        channel_id: &str,
        thread_id: &str,
        name: &str,
    ) -> Result<()> {
        let now = Utc::now();
        let record = ThreadRecord {
            thread_id: thread_id.to_string(),
            name: name.to_string(),
            created_at: now,
        };
        self.put_at(session_id, channel_id, record, now)
    }

    fn remove_thread_id(&self, session_id: &str, channel_id: &str) -> Result<()> {
        self.update(Utc::now(), |map| {
            if let Some(channels) = map.get_mut(session_id) {
                channels.remove(channel_id);
            }
        })
    }

    fn claim_thread<T, E, F>(
        &self,
        session_id: &str,
        channel_id: &str,
        stale: Option<&str>,
        create: F,
    ) -> Result<Claim<T>, E>
    where
        F: FnOnce() -> Result<NewThread<T>, E>,
    {
        self.claim_at(session_id, channel_id, stale, create, Utc::now())
    }
}
