//! Test doubles shared by the unit tests.

use crate::{Error, Result, Store};
use std::{
    io,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

/// A scratch directory under the system temp dir, removed on drop.
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new(label: &str) -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let path = std::env::temp_dir().join(format!(
            "uidpool-{label}-{}-{}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = std::fs::remove_dir_all(&path);
        std::fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

#[derive(Default)]
struct MemoryState {
    value: Option<u64>,
    failures: usize,
    writes: Vec<u64>,
}

/// An in-memory [`Store`] with injectable persist failures.
///
/// Clones share state, so a test can keep a handle after moving the store
/// into an allocator.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn with_value(value: u64) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().value = Some(value);
        store
    }

    /// Makes the next `n` persists fail.
    pub fn fail_next(&self, n: usize) {
        self.state.lock().unwrap().failures = n;
    }

    pub fn value(&self) -> Option<u64> {
        self.state.lock().unwrap().value
    }

    pub fn writes(&self) -> Vec<u64> {
        self.state.lock().unwrap().writes.clone()
    }
}

impl Store for MemoryStore {
    fn initialize(&mut self) -> Result<Option<u64>> {
        Ok(self.state.lock().unwrap().value)
    }

    fn persist(&mut self, id: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.failures > 0 {
            state.failures -= 1;
            return Err(Error::Persist {
                id,
                source: io::Error::other("injected failure"),
            });
        }
        state.value = Some(id);
        state.writes.push(id);
        Ok(())
    }
}
