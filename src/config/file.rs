// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! JSON file configuration provider.
//!
//! All owners share one JSON document (`{ "<owner>": <instance>, ... }`).
//! Writes go to a temp file that is renamed over the document while an
//! exclusive lock is held on a sibling `.lock` file; reads take a shared
//! lock on the same file, so a reader never sees a half-written document.

use anyhow::{bail, Context, Result};
use fs2::FileExt;
use serde_json::{Map, Value};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use super::provider::ConfigurationProvider;
use crate::outcome::Outcome;

/// Default timeout for acquiring file locks (5 seconds)
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Retry interval when waiting for lock acquisition
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Configuration provider backed by a JSON document on disk.
#[derive(Debug, Clone)]
pub struct FileConfigurationProvider {
    path: PathBuf,
    lock_timeout: Duration,
}

impl FileConfigurationProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: LOCK_TIMEOUT,
        }
    }

    /// Provider at the default location, `~/.secmgr/configuration.json`.
    pub fn at_default_location() -> Self {
        Self::new(Self::default_path())
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".secmgr").join("configuration.json"))
            .unwrap_or_else(|| PathBuf::from(".secmgr/configuration.json"))
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn open_lock_file(&self) -> Result<File> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {:?}", parent))?;
            }
        }

        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {:?}", lock_path))
    }

    /// Retry `try_lock` until it succeeds or the timeout expires.
    fn acquire_with_timeout(
        &self,
        file: &File,
        exclusive: bool,
    ) -> Result<()> {
        let start = Instant::now();

        loop {
            let attempt = if exclusive {
                FileExt::try_lock_exclusive(file)
            } else {
                FileExt::try_lock_shared(file)
            };

            match attempt {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() >= self.lock_timeout {
                        bail!(
                            "Timed out waiting for {} lock on {:?} after {:?}. \
                             Another process may be writing the configuration.",
                            if exclusive { "exclusive" } else { "shared" },
                            self.lock_path(),
                            self.lock_timeout
                        );
                    }
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to lock {:?}", self.lock_path()));
                }
            }
        }
    }

    /// Read the document without taking a lock. A missing file is an empty document.
    fn read_unlocked(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read configuration file: {:?}", self.path))?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {:?}", self.path))?
        {
            Value::Object(map) => Ok(map),
            _ => bail!("Configuration file {:?} is not a JSON object", self.path),
        }
    }

    /// Load the whole document under a shared lock.
    pub fn load_document(&self) -> Result<Map<String, Value>> {
        let lock_file = self.open_lock_file()?;
        self.acquire_with_timeout(&lock_file, false)?;
        self.read_unlocked()
        // Lock is released when lock_file is dropped
    }

    /// Read, modify and atomically rewrite the document under an exclusive lock.
    fn modify<T>(&self, f: impl FnOnce(&mut Map<String, Value>) -> Result<T>) -> Result<T> {
        let lock_file = self.open_lock_file()?;
        self.acquire_with_timeout(&lock_file, true)?;

        let mut document = self.read_unlocked()?;
        let result = f(&mut document)?;

        let temp_path = self.path.with_extension("tmp");
        let content = serde_json::to_string_pretty(&Value::Object(document))
            .with_context(|| "Failed to serialize configuration to JSON")?;

        {
            let mut temp_file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;
            temp_file
                .write_all(content.as_bytes())
                .with_context(|| "Failed to write to temp file")?;
            temp_file
                .sync_all()
                .with_context(|| "Failed to sync temp file to disk")?;
        }

        fs::rename(&temp_path, &self.path).with_context(|| {
            format!("Failed to rename {:?} -> {:?}", temp_path, self.path)
        })?;

        Ok(result)
    }
}

impl ConfigurationProvider for FileConfigurationProvider {
    fn get_instance(&self, owner: &str) -> Outcome<Value> {
        match self.load_document() {
            Ok(mut document) => match document.remove(owner) {
                Some(value) => Outcome::success(value),
                None => Outcome::failure(format!("no configuration stored for '{}'", owner)),
            },
            Err(e) => Outcome::failure(format!("{:#}", e)),
        }
    }

    fn add_instance(&self, owner: &str, value: Value) -> Outcome<Value> {
        let result = self.modify(|document| {
            if document.contains_key(owner) {
                bail!("configuration for '{}' already exists", owner);
            }
            document.insert(owner.to_string(), value.clone());
            Ok(())
        });

        match result {
            Ok(()) => Outcome::success(value),
            Err(e) => Outcome::failure(format!("{:#}", e)),
        }
    }

    fn update_instance(&self, owner: &str, value: Value) -> Outcome<()> {
        let result = self.modify(|document| {
            document.insert(owner.to_string(), value);
            Ok(())
        });

        match result {
            Ok(()) => Outcome::success(()),
            Err(e) => {
                tracing::error!(
                    target: "security::config",
                    path = %self.path.display(),
                    "Failed to persist configuration: {:#}",
                    e
                );
                Outcome::failure(format!("{:#}", e))
            }
        }
    }
}
