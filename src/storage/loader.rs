//! Memoized dataset loading
//!
//! [`DatasetLoader::ensure_ready`] fetches and normalizes the dataset once.
//! Callers arriving while a load is in flight block on the same lock and
//! receive the shared result instead of fetching again. A failed load
//! leaves nothing cached, so the next caller retries.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::{debug, error};

use super::source::{load_raw, DatasetFiles, DatasetSource, LoadError};
use crate::ingest::{normalize, Normalized};

pub struct DatasetLoader<S> {
    source: S,
    files: DatasetFiles,
    state: Mutex<Option<Arc<Normalized>>>,
}

impl<S: DatasetSource> DatasetLoader<S> {
    pub fn new(source: S, files: DatasetFiles) -> Self {
        Self {
            source,
            files,
            state: Mutex::new(None),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns the loaded dataset, loading it on first use
    pub fn ensure_ready(&self) -> Result<Arc<Normalized>, LoadError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(loaded) = state.as_ref() {
            debug!("Dataset already loaded");
            return Ok(Arc::clone(loaded));
        }

        let raw = load_raw(&self.source, &self.files).inspect_err(|e| {
            error!(source = %self.source.describe(), error = %e, "Dataset load failed");
        })?;

        let loaded = Arc::new(normalize(&raw, Utc::now()));
        *state = Some(Arc::clone(&loaded));
        Ok(loaded)
    }

    pub fn is_loaded(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Drops the cached result; the next `ensure_ready` fetches again
    pub fn invalidate(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    const COMBINED: &str = r#"{"subjects": ["Math"], "topics": [{"text": "Algebra", "subject": "Math"}]}"#;

    struct CountingSource {
        fetches: AtomicUsize,
        fail: bool,
    }

    impl CountingSource {
        fn new(fail: bool) -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl DatasetSource for CountingSource {
        fn fetch(&self, name: &str) -> anyhow::Result<Option<String>> {
            if name != "curriculum.json" {
                return Ok(None);
            }
            self.fetches.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            if self.fail {
                anyhow::bail!("network unreachable");
            }
            Ok(Some(COMBINED.to_string()))
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    #[test]
    fn concurrent_callers_share_one_load() {
        let loader = Arc::new(DatasetLoader::new(CountingSource::new(false), DatasetFiles::default()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let loader = Arc::clone(&loader);
                thread::spawn(move || loader.ensure_ready().map(|n| n.dataset.counts().topics))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), 1);
        }
        assert_eq!(loader.source().fetches.load(Ordering::SeqCst), 1);
        assert!(loader.is_loaded());
    }

    #[test]
    fn failed_load_is_retried_and_invalidate_refetches() {
        let loader = DatasetLoader::new(CountingSource::new(true), DatasetFiles::default());

        assert!(matches!(loader.ensure_ready(), Err(LoadError::Fetch { .. })));
        assert!(loader.ensure_ready().is_err());
        assert_eq!(loader.source().fetches.load(Ordering::SeqCst), 2);
        assert!(!loader.is_loaded());

        let loader = DatasetLoader::new(CountingSource::new(false), DatasetFiles::default());
        let first = loader.ensure_ready().unwrap();
        let second = loader.ensure_ready().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        loader.invalidate();
        loader.ensure_ready().unwrap();
        assert_eq!(loader.source().fetches.load(Ordering::SeqCst), 2);
    }
}
