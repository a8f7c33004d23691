//! Compiled code cache.
//!
//! Compiled functions hold no heap handles, so one cache can serve any
//! number of engines, including engines on other threads.

use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHasher};
use tracing::trace;

use crate::compiler::{CompiledFunction, compile};
use crate::error::CompileError;
use crate::options::CompileOptions;

struct Entry {
    source: Arc<str>,
    options: CompileOptions,
    code: Arc<CompiledFunction>,
}

/// Cache hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that compiled
    pub misses: u64,
    /// Cached scripts
    pub entries: usize,
}

/// Script cache keyed by a hash of the source text and compile options.
///
/// Entries also keep their source, so a hash collision is a miss rather
/// than the wrong code.
#[derive(Default)]
pub struct CodeCache {
    entries: RwLock<FxHashMap<u64, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CodeCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up `source`, compiling and caching it on a miss. Compile
    /// errors are not cached.
    pub fn get_or_compile(&self, source: &str, options: &CompileOptions) -> Result<Arc<CompiledFunction>, CompileError> {
        let key = source_hash(source, options);
        if let Some(code) = self.lookup(key, source, options) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key, "code cache hit");
            return Ok(code);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let code = compile(source, options)?;
        self.entries.write().insert(
            key,
            Entry {
                source: Arc::from(source),
                options: options.clone(),
                code: Arc::clone(&code),
            },
        );
        Ok(code)
    }

    /// The cached code for `source`, if any.
    pub fn get(&self, source: &str, options: &CompileOptions) -> Option<Arc<CompiledFunction>> {
        self.lookup(source_hash(source, options), source, options)
    }

    /// Stores already compiled code.
    pub fn insert(&self, source: &str, options: &CompileOptions, code: Arc<CompiledFunction>) {
        let key = source_hash(source, options);
        let entry = Entry {
            source: Arc::from(source),
            options: options.clone(),
            code,
        };
        self.entries.write().insert(key, entry);
    }

    fn lookup(&self, key: u64, source: &str, options: &CompileOptions) -> Option<Arc<CompiledFunction>> {
        let entries = self.entries.read();
        let entry = entries.get(&key)?;
        (&*entry.source == source && entry.options == *options).then(|| Arc::clone(&entry.code))
    }

    /// Number of cached scripts.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Hit and miss counters since creation.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl std::fmt::Debug for CodeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeCache").field("stats", &self.stats()).finish()
    }
}

/// Hash of a script and the options it is compiled with.
pub fn source_hash(source: &str, options: &CompileOptions) -> u64 {
    let mut hasher = FxHasher::default();
    source.hash(&mut hasher);
    options.strict_mode.hash(&mut hasher);
    options.source_url.hash(&mut hasher);
    hasher.finish()
}
