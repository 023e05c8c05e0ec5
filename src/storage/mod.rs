//! # Storage Layer
//!
//! Everything that touches the filesystem: reading raw datasets, persisting
//! the canonical snapshot, configuration and the search index.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Raw dataset | JSON, split or combined | `data/` (configurable) |
//! | Snapshot | JSON (dataset + reset baseline) | `.curriculum/snapshot.json` |
//! | Config | TOML | `.curriculum/config.toml` |
//! | Search index | SQLite FTS5 (auto-regenerated) | `.curriculum/.cache/index.db` |
//!
//! ## Concurrency Safety
//!
//! - [`FileSnapshotStore`] uses file locking (`fs2`) and atomic writes
//!   (temp file + rename)
//! - [`DatasetLoader`] memoizes the load so concurrent callers share one fetch
//! - [`SearchIndex`] records a fingerprint of the dataset it mirrors
//!
//! ## Project Structure
//!
//! ```text
//! data/                     # Raw dataset (split files or curriculum.json)
//! .curriculum/
//! ├── config.toml           # Project configuration
//! ├── snapshot.json         # Canonical dataset and reset baseline
//! ├── .cache/index.db       # Search index (regenerated)
//! └── .gitignore            # Ignores the cache
//! ```

mod config;
mod index;
mod loader;
mod project;
mod snapshot;
mod source;

pub use config::{Config, ConfigError, DatasetConfig, GlobalConfig, OutputFormat, ProjectConfig, StoreConfig};
pub use index::{IndexError, SearchHit, SearchIndex};
pub use loader::DatasetLoader;
pub use project::{Project, ProjectError};
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, Snapshot, SnapshotSink, SNAPSHOT_VERSION};
pub use source::{load_raw, DatasetFiles, DatasetSource, DirectorySource, LoadError};
