//! Key bindings.
//!
//! Every configured key is bound twice: once in project scope (activate in
//! the current project) and once in global scope (activate among the
//! global sessions). Where a binding ends up is up to the
//! [`BindingTarget`]: an in-process [`KeyTable`], or tmux key-table lines
//! rendered by [`TmuxBindings`].

use tracing::debug;

use crate::project::GLOBAL_PROJECT;
use crate::quote::quote_shell_args;
use crate::Result;

/// Where an activation looks for its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The current project.
    Project,
    /// The global sessions.
    Global,
}

/// A key and the scope it activates in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyBinding {
    pub key: String,
    pub scope: Scope,
}

impl KeyBinding {
    pub fn new(key: impl Into<String>, scope: Scope) -> Self {
        Self {
            key: key.into(),
            scope,
        }
    }

    /// Project override carried by this binding, if any.
    pub fn project(&self) -> Option<&'static str> {
        match self.scope {
            Scope::Project => None,
            Scope::Global => Some(GLOBAL_PROJECT),
        }
    }
}

/// Receives bindings.
pub trait BindingTarget {
    fn bind(&mut self, binding: KeyBinding) -> Result<()>;
}

/// Bind each key in project and global scope. Returns the number of
/// bindings made.
pub fn bind_keys<T>(target: &mut T, keys: &[String]) -> Result<usize>
where
    T: BindingTarget + ?Sized,
{
    let mut bound = 0;
    for key in keys {
        for scope in [Scope::Project, Scope::Global] {
            target.bind(KeyBinding::new(key.as_str(), scope))?;
            bound += 1;
        }
    }
    debug!(keys = keys.len(), bound, "keys bound");
    Ok(bound)
}

/// In-process binding table.
#[derive(Debug, Clone, Default)]
pub struct KeyTable {
    bindings: Vec<KeyBinding>,
}

impl KeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binding for `key` in `scope`, if bound.
    pub fn dispatch(&self, key: &str, scope: Scope) -> Option<&KeyBinding> {
        self.bindings
            .iter()
            .find(|b| b.key == key && b.scope == scope)
    }

    pub fn bindings(&self) -> &[KeyBinding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl BindingTarget for KeyTable {
    fn bind(&mut self, binding: KeyBinding) -> Result<()> {
        self.bindings
            .retain(|b| !(b.key == binding.key && b.scope == binding.scope));
        self.bindings.push(binding);
        Ok(())
    }
}

/// Name of the tmux key table holding keyshell bindings.
pub const TMUX_KEY_TABLE: &str = "keyshell";

/// Renders bindings as tmux configuration lines.
///
/// The prefix key enters the `keyshell` key table; a bare key then
/// activates in the project of the current pane's directory, `M-<key>`
/// activates globally, and `Tab` returns to the last session.
///
/// Commands are wrapped in single quotes, so program paths containing a
/// single quote are not supported.
#[derive(Debug, Clone)]
pub struct TmuxBindings {
    program: String,
    lines: Vec<String>,
}

impl TmuxBindings {
    pub fn new(program: impl Into<String>, prefix_key: &str) -> Self {
        let program = program.into();
        let lines = vec![
            format!("bind-key {} switch-client -T {}", prefix_key, TMUX_KEY_TABLE),
            format!(
                "bind-key -T {} Tab run-shell -b '{}'",
                TMUX_KEY_TABLE,
                quote_shell_args([program.as_str(), "last"])
            ),
        ];
        Self { program, lines }
    }

    /// Configuration text, one command per line.
    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl BindingTarget for TmuxBindings {
    fn bind(&mut self, binding: KeyBinding) -> Result<()> {
        let line = match binding.scope {
            Scope::Project => format!(
                "bind-key -T {} {} run-shell -b -c '#{{pane_current_path}}' '{}'",
                TMUX_KEY_TABLE,
                binding.key,
                quote_shell_args([
                    self.program.as_str(),
                    "activate",
                    "--",
                    binding.key.as_str()
                ])
            ),
            Scope::Global => format!(
                "bind-key -T {} M-{} run-shell -b '{}'",
                TMUX_KEY_TABLE,
                binding.key,
                quote_shell_args([
                    self.program.as_str(),
                    "activate",
                    "--global",
                    "--",
                    binding.key.as_str()
                ])
            ),
        };
        self.lines.push(line);
        Ok(())
    }
}
