//! Parallel compilation with rayon.
//!
//! Compilation touches no engine state, so independent scripts compile on
//! a thread pool and the results run on any engine afterwards.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::cache::CodeCache;
use crate::compiler::{CompiledFunction, compile};
use crate::error::{CompileError, Error, Result};
use crate::options::CompileOptions;

/// One script to compile.
#[derive(Debug, Clone)]
pub struct CompileJob {
    /// Source text
    pub source: String,
    /// Options it compiles with
    pub options: CompileOptions,
}

impl CompileJob {
    /// A job with default options and the given source URL.
    pub fn new(source_url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            options: CompileOptions::with_source_url(source_url),
        }
    }
}

/// Compiles batches of scripts on a dedicated rayon pool.
pub struct ParallelExecutor {
    pool: rayon::ThreadPool,
    num_workers: usize,
}

impl ParallelExecutor {
    /// Creates an executor with `num_workers` threads (at least one).
    pub fn new(num_workers: usize) -> Result<Self> {
        let num_workers = num_workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .thread_name(|index| format!("spacey-compile-{index}"))
            .build()
            .map_err(|e| Error::InternalError(e.to_string()))?;
        Ok(Self { pool, num_workers })
    }

    /// Number of worker threads.
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Compiles every job, returning results in job order.
    pub fn compile_all(&self, jobs: &[CompileJob]) -> Vec<std::result::Result<Arc<CompiledFunction>, CompileError>> {
        info!("Compiling {} scripts using {} threads", jobs.len(), self.num_workers);
        self.pool.install(|| {
            jobs.par_iter()
                .map(|job| compile(&job.source, &job.options))
                .collect()
        })
    }

    /// Compiles every job into `cache`. Returns how many compiled; the
    /// failures are logged and skipped.
    pub fn warm(&self, cache: &CodeCache, jobs: &[CompileJob]) -> usize {
        self.pool.install(|| {
            jobs.par_iter()
                .filter(|job| match cache.get_or_compile(&job.source, &job.options) {
                    Ok(_) => true,
                    Err(e) => {
                        debug!("Skipping script that failed to compile: {}", e);
                        false
                    }
                })
                .count()
        })
    }
}

impl std::fmt::Debug for ParallelExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelExecutor").field("num_workers", &self.num_workers).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jobs() -> Vec<CompileJob> {
        vec![
            CompileJob::new("a.js", "var a = 1;"),
            CompileJob::new("b.js", "function f( {"),
            CompileJob::new("c.js", "function* g() { yield 1; }"),
        ]
    }

    #[test]
    fn test_compile_all_keeps_order() {
        let executor = ParallelExecutor::new(2).unwrap();
        let results = executor.compile_all(&jobs());
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        let error = results[1].as_ref().unwrap_err();
        assert_eq!(error.source_url.as_deref(), Some("b.js"));
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_warm_fills_cache() {
        let executor = ParallelExecutor::new(0).unwrap();
        assert_eq!(executor.num_workers(), 1);
        let cache = CodeCache::new();
        assert_eq!(executor.warm(&cache, &jobs()), 2);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("var a = 1;", &CompileOptions::with_source_url("a.js")).is_some());
    }
}
