//! # keyshell
//!
//! Per-project palettes of persistent shell sessions bound to short keys.
//!
//! Pressing a key (say `1`) while working in a project focuses that
//! project's session for the key, creating it on first use. Every session
//! gets its own directory under the session root and its own history file,
//! so `1` in one project never sees the commands typed into `1` elsewhere.
//!
//! ## Features
//!
//! - **Stable identity**: sessions are named `KEY.SHELL.PROJECT` and reused
//!   for as long as they live
//! - **Per-session history**: the history variable is pointed at the
//!   session directory only while the session is being created
//! - **Pluggable backends**: tmux sessions or in-process PTYs
//! - **Configurable**: per-project, per-key names, directories, kinds, and
//!   init commands
//!
//! ## Quick Start
//!
//! ```no_run
//! use keyshell::{ActivationEngine, EngineSettings, MarkerProvider, ProjectConfig, PtyBackend};
//!
//! fn main() -> keyshell::Result<()> {
//!     keyshell::logging::try_init("info").ok();
//!
//!     let mut engine = ActivationEngine::new(
//!         PtyBackend::new(),
//!         MarkerProvider::new(),
//!         ProjectConfig::new(),
//!         EngineSettings::default(),
//!     );
//!
//!     let activation = engine.activate_for_key("1", None, None)?;
//!     println!("{} {}", activation.outcome, activation.name);
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod bindings;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod logging;
pub mod project;
pub mod quote;
pub mod session;
pub mod shellspec;

// Re-export commonly used types
pub use backend::{HandleId, LineSink, PtyBackend, SessionBackend, SessionRequest, TmuxBackend};
pub use bindings::{BindingTarget, KeyBinding, KeyTable, Scope, TmuxBindings};
pub use engine::{
    Activation, ActivationEngine, ActivationOutcome, EngineSettings, Lookup, LookupMiss,
    SessionSummary,
};
pub use error::{KeyshellError, Result};
pub use history::{with_history_file, HistoryScope};
pub use project::{FixedProvider, MarkerProvider, ProjectProvider, GLOBAL_PROJECT};
pub use session::{ProjectTag, Registry, Session, SessionName, SessionOrigin};
pub use shellspec::{InitContext, KeySpec, ProjectConfig, ShellKind, ShellSpec};
