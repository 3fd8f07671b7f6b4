//! dropsort - keeps a downloads folder tidy
//!
//! This library classifies files by filename keyword and extension, routes
//! them into a `Category/Type` folder tree without ever overwriting anything,
//! watches a directory for new arrivals, records every move and can undo the
//! last run. Behavior is configured through a TOML file.

pub mod cli;
pub mod config;
pub mod file_type;
pub mod history;
pub mod output;
pub mod router;
pub mod rules;
pub mod undo;
pub mod watcher;

pub use config::{CompiledFilters, Config, ConfigError};
pub use file_type::{FileType, TypeTable};
pub use history::{Operation, OperationLog};
pub use router::{Destination, RouteError, Router, RoutingOutcome, SkipReason};
pub use rules::{CategoryRule, Layout, RuleError, RuleSet};
pub use undo::{UndoManager, UndoReport};
pub use watcher::DirectoryWatcher;

pub use cli::{Cli, Command, run_cli};
