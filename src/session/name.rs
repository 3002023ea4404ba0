//! Canonical session names and key sanitization.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::KeyshellError;

/// Token substituted for path separators in keys.
pub const SEPARATOR_TOKEN: &str = "%2F";

/// Replace every path separator in `component` with [`SEPARATOR_TOKEN`].
///
/// Both `/` and `\` are replaced on every platform, so a key never spans
/// more than one directory level.
pub fn sanitize_key(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for c in component.chars() {
        if c == '/' || c == '\\' {
            out.push_str(SEPARATOR_TOKEN);
        } else {
            out.push(c);
        }
    }
    out
}

/// Canonical identity of a session: `{key}.{shell}.{project}`.
///
/// The key is stored sanitized. Equality and hashing use the rendered
/// name only, so a parsed name matches the one it was printed from even
/// when a shell name contains dots.
#[derive(Debug, Clone)]
pub struct SessionName {
    canonical: String,
    key: String,
    shell: String,
    project: String,
}

impl SessionName {
    /// Build a name, sanitizing `key`.
    pub fn new(key: &str, shell: impl Into<String>, project: impl Into<String>) -> Self {
        let key = sanitize_key(key);
        let shell = shell.into();
        let project = project.into();
        Self {
            canonical: format!("{}.{}.{}", key, shell, project),
            key,
            shell,
            project,
        }
    }

    /// The sanitized key.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }
}

impl PartialEq for SessionName {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for SessionName {}

impl Hash for SessionName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl FromStr for SessionName {
    type Err = KeyshellError;

    /// Parse `{key}.{shell}.{project}`.
    ///
    /// The split is on the first two dots, so with a dotted shell name the
    /// components come out shifted. Identity is unaffected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(shell), Some(project))
                if !key.is_empty() && !shell.is_empty() && !project.is_empty() =>
            {
                Ok(Self::new(key, shell, project))
            }
            _ => Err(KeyshellError::InvalidSessionName(s.into())),
        }
    }
}
