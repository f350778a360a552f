//! An instrumented in-memory archive host.
//!
//! Implements [`ArchiveFetcher`] over scripted content so tests can observe
//! the transfer engine's retry and concurrency behavior: per-URL disconnect
//! scripts, whole-URL timeouts, and a high-water mark of simultaneous
//! in-flight fetches.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use mirror::{ArchiveFetcher, FetchError, FetchedArchive, ProbeInfo};

/// Fake archive host serving bytes from memory.
pub struct FakeArchiveHost {
    archives: Mutex<HashMap<String, Vec<u8>>>,
    directories: Mutex<HashSet<String>>,
    /// Remaining scripted disconnects per URL.
    disconnects: Mutex<HashMap<String, u32>>,
    timeouts: Mutex<HashSet<String>>,
    fetch_attempts: Mutex<HashMap<String, u32>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    next_file_id: AtomicU64,
    fetch_delay: Duration,
    temp: TempDir,
}

impl FakeArchiveHost {
    pub fn new() -> Self {
        Self::with_fetch_delay(Duration::from_millis(0))
    }

    /// A per-fetch delay keeps several fetches overlapping long enough for
    /// the concurrency high-water mark to be meaningful.
    pub fn with_fetch_delay(fetch_delay: Duration) -> Self {
        Self {
            archives: Mutex::new(HashMap::new()),
            directories: Mutex::new(HashSet::new()),
            disconnects: Mutex::new(HashMap::new()),
            timeouts: Mutex::new(HashSet::new()),
            fetch_attempts: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            next_file_id: AtomicU64::new(0),
            fetch_delay,
            temp: TempDir::new().expect("temp dir for fake host"),
        }
    }

    /// Register a directory URL so layout probes succeed.
    pub fn add_directory(&self, url: &str) {
        self.directories.lock().unwrap().insert(url.to_string());
    }

    /// Register an archive body at a URL.
    pub fn add_archive(&self, url: &str, body: Vec<u8>) {
        self.archives.lock().unwrap().insert(url.to_string(), body);
    }

    /// Make the next `count` fetches of `url` fail with a disconnect.
    pub fn script_disconnects(&self, url: &str, count: u32) {
        self.disconnects
            .lock()
            .unwrap()
            .insert(url.to_string(), count);
    }

    /// Make every fetch of `url` time out.
    pub fn script_timeout(&self, url: &str) {
        self.timeouts.lock().unwrap().insert(url.to_string());
    }

    /// Highest number of simultaneous in-flight fetches observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Number of fetch attempts seen for a URL (including failed ones).
    pub fn fetch_attempts(&self, url: &str) -> u32 {
        self.fetch_attempts
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    fn enter(&self) -> InFlightGuard<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlightGuard { host: self }
    }
}

impl Default for FakeArchiveHost {
    fn default() -> Self {
        Self::new()
    }
}

struct InFlightGuard<'a> {
    host: &'a FakeArchiveHost,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.host.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ArchiveFetcher for FakeArchiveHost {
    async fn probe(&self, url: &str) -> Result<ProbeInfo, FetchError> {
        let known = self.directories.lock().unwrap().contains(url)
            || self.archives.lock().unwrap().contains_key(url);
        if known {
            Ok(ProbeInfo::default())
        } else {
            Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    async fn fetch(&self, url: &str) -> Result<FetchedArchive, FetchError> {
        let _guard = self.enter();
        *self
            .fetch_attempts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;

        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }

        if self.timeouts.lock().unwrap().contains(url) {
            return Err(FetchError::Timeout {
                url: url.to_string(),
            });
        }

        {
            let mut disconnects = self.disconnects.lock().unwrap();
            if let Some(remaining) = disconnects.get_mut(url) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(FetchError::Disconnected {
                        url: url.to_string(),
                        message: "scripted disconnect".to_string(),
                    });
                }
            }
        }

        let body = {
            let archives = self.archives.lock().unwrap();
            match archives.get(url) {
                Some(body) => body.clone(),
                None => {
                    return Err(FetchError::Status {
                        url: url.to_string(),
                        status: 404,
                    })
                }
            }
        };

        let file_id = self.next_file_id.fetch_add(1, Ordering::SeqCst);
        let path = self.temp.path().join(format!("fetch-{}.partial", file_id));
        let io_err = |source| FetchError::Io {
            url: url.to_string(),
            source,
        };
        let mut file = std::fs::File::create(&path).map_err(io_err)?;
        file.write_all(&body).map_err(io_err)?;

        Ok(FetchedArchive {
            path,
            bytes: body.len() as u64,
            last_modified: Some(Utc.with_ymd_and_hms(1979, 3, 1, 0, 0, 0).unwrap()),
            content_length: Some(body.len() as u64),
        })
    }
}
