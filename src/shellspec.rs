//! Shell specs and their resolution from per-project configuration.
//!
//! A [`ShellSpec`] says how the session behind one (project, key) pair is
//! started: its display name, working directory, kind, and an optional
//! hook run once the session is up. Missing configuration is normal; every
//! field has a default.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::LineSink;
use crate::session::sanitize_key;
use crate::Result;

/// How a session is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellKind {
    /// Run the preferred shell binary directly.
    #[default]
    Shell,
    /// Start a raw terminal, then re-exec into the preferred shell.
    Terminal,
}

/// What an init hook can do with the session being set up.
pub struct InitContext<'a> {
    session_dir: &'a Path,
    sink: &'a mut dyn LineSink,
}

impl<'a> InitContext<'a> {
    pub fn new(session_dir: &'a Path, sink: &'a mut dyn LineSink) -> Self {
        Self { session_dir, sink }
    }

    /// Directory holding the session's history file.
    pub fn session_dir(&self) -> &Path {
        self.session_dir
    }

    /// Type a command line into the session.
    pub fn send_shell_command(&mut self, cmdline: &str) -> Result<()> {
        self.sink.send_line(cmdline)
    }
}

/// Callback run once a new session is interactive.
pub type InitHook = Arc<dyn Fn(&mut InitContext<'_>) -> Result<()> + Send + Sync>;

/// Build a hook that types each command, substituting `{session_dir}`.
pub fn command_hook(commands: Vec<String>) -> InitHook {
    Arc::new(move |ctx: &mut InitContext<'_>| {
        let dir = ctx.session_dir().to_string_lossy().into_owned();
        for command in &commands {
            ctx.send_shell_command(&command.replace("{session_dir}", &dir))?;
        }
        Ok(())
    })
}

/// Fully resolved description of one session.
#[derive(Clone)]
pub struct ShellSpec {
    pub name: String,
    pub directory: PathBuf,
    pub kind: ShellKind,
    pub init_hook: Option<InitHook>,
}

impl fmt::Debug for ShellSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellSpec")
            .field("name", &self.name)
            .field("directory", &self.directory)
            .field("kind", &self.kind)
            .field("init_hook", &self.init_hook.is_some())
            .finish()
    }
}

/// Configured values for one key. Unset fields take defaults.
#[derive(Clone, Default)]
pub struct KeySpec {
    pub name: Option<String>,
    pub directory: Option<String>,
    pub kind: Option<ShellKind>,
    pub init_hook: Option<InitHook>,
}

impl KeySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Working directory; `~` is expanded, relative paths are taken from
    /// the project root.
    pub fn directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn kind(mut self, kind: ShellKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn init_hook(mut self, hook: InitHook) -> Self {
        self.init_hook = Some(hook);
        self
    }
}

impl fmt::Debug for KeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySpec")
            .field("name", &self.name)
            .field("directory", &self.directory)
            .field("kind", &self.kind)
            .field("init_hook", &self.init_hook.is_some())
            .finish()
    }
}

/// Serialized form of a [`KeySpec`], as found in the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ShellKind>,
    /// Command lines typed into the session after it starts.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub init: Vec<String>,
}

impl From<&ShellEntry> for KeySpec {
    fn from(entry: &ShellEntry) -> Self {
        Self {
            name: entry.name.clone(),
            directory: entry.directory.clone(),
            kind: entry.kind,
            init_hook: (!entry.init.is_empty()).then(|| command_hook(entry.init.clone())),
        }
    }
}

/// Project → key → [`KeySpec`]. Keys are stored sanitized.
#[derive(Debug, Clone, Default)]
pub struct ProjectConfig {
    projects: HashMap<String, HashMap<String, KeySpec>>,
}

impl ProjectConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the spec for (project, key).
    pub fn with(mut self, project: impl Into<String>, key: &str, spec: KeySpec) -> Self {
        self.projects
            .entry(project.into())
            .or_default()
            .insert(sanitize_key(key), spec);
        self
    }

    /// Build from the settings-file representation.
    pub fn from_entries(entries: &HashMap<String, HashMap<String, ShellEntry>>) -> Self {
        entries
            .iter()
            .flat_map(|(project, keys)| {
                keys.iter()
                    .map(move |(key, entry)| (project.clone(), key.as_str(), KeySpec::from(entry)))
            })
            .fold(Self::new(), |config, (project, key, spec)| {
                config.with(project, key, spec)
            })
    }

    /// Configured spec for (project, key), if any.
    pub fn get(&self, project: &str, key: &str) -> Option<&KeySpec> {
        self.projects.get(project)?.get(&sanitize_key(key))
    }

    /// Number of configured (project, key) pairs.
    pub fn len(&self) -> usize {
        self.projects.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve the spec for (project, key), filling gaps with defaults.
    ///
    /// `default_root` is the project root; `term_keys` lists the keys whose
    /// sessions default to [`ShellKind::Terminal`].
    pub fn resolve<S: AsRef<str>>(
        &self,
        project: &str,
        key: &str,
        default_shell_name: &str,
        default_root: &Path,
        term_keys: &[S],
    ) -> ShellSpec {
        let key = sanitize_key(key);
        let configured = self.get(project, &key);

        let name = configured
            .and_then(|c| c.name.clone())
            .unwrap_or_else(|| default_shell_name.to_string());

        let directory = configured
            .and_then(|c| c.directory.as_deref())
            .map(|dir| expand_directory(dir, default_root))
            .unwrap_or_else(|| default_root.to_path_buf());

        let kind = configured.and_then(|c| c.kind).unwrap_or_else(|| {
            if term_keys.iter().any(|k| sanitize_key(k.as_ref()) == key) {
                ShellKind::Terminal
            } else {
                ShellKind::Shell
            }
        });

        ShellSpec {
            name,
            directory,
            kind,
            init_hook: configured.and_then(|c| c.init_hook.clone()),
        }
    }
}

/// Expand `~` and anchor relative paths at `root`.
fn expand_directory(dir: &str, root: &Path) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(dir).into_owned());
    if expanded.is_absolute() {
        expanded
    } else {
        root.join(expanded)
    }
}
