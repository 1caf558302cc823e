// Read-only environment threaded through a run
//
// Values are stored type-erased and shared behind `Arc`, so cloning an `Env`
// to hand it to concurrently spawned units is a reference-count bump.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Entry = Arc<dyn Any + Send + Sync>;

/// Immutable key/value environment supplied at run time.
#[derive(Clone, Default)]
pub struct Env {
    entries: Arc<HashMap<String, Entry>>,
}

impl Env {
    /// An empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// A new environment with `key` bound to `value`.
    ///
    /// Other holders of the original environment keep seeing the old bindings.
    pub fn with<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        Arc::make_mut(&mut self.entries).insert(key.into(), Arc::new(value));
        self
    }

    /// Look up `key` as a `T`. Missing keys and type mismatches both give `None`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.entries.get(key).and_then(|entry| entry.downcast_ref::<T>())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bound keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("Env").field("keys", &keys).finish()
    }
}
