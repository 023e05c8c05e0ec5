//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Project and dataset lifecycle | `init`, `load`, `import`, `reset`, `status` |
//! | Subject | Subject management | `subject add`, `subject list`, `subject rm` |
//! | Topic | Topic hierarchy | `topic add`, `topic tree`, `topic edit --parent` |
//! | Outcome | Learning outcomes and relations | `outcome add`, `outcome relations` |
//! | Skill | Ordered skill-bits | `skill add`, `skill up`, `skill down` |
//! | Search | Full-text lookup | `search "linear"` |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! The default comes from the global config when the flag is absent.
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output:
//! ```bash
//! curriculum --verbose status
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod dataset;
mod subject;
mod topic;
mod outcome;
mod skill;

pub use app::{Cli, Commands, run};
pub use output::{Output, OutputFormat};
