//! Session backends.
//!
//! A backend is whatever actually runs shells: in-process pseudo-terminals
//! ([`PtyBackend`]) or a tmux server ([`TmuxBackend`]). The engine only
//! talks to backends through [`SessionBackend`], so hosts can plug in their
//! own.

mod pty;
mod tmux;

pub use pty::{HandleId, PtyBackend, PtySize};
pub use tmux::{tmux_session_name, TmuxBackend};

use std::fmt;
use std::path::Path;

use crate::shellspec::ShellKind;
use crate::Result;

/// Something text can be typed into.
pub trait LineSink {
    /// Send `text` exactly as given.
    fn send_text(&mut self, text: &str) -> Result<()>;

    /// Send `line` followed by a newline.
    fn send_line(&mut self, line: &str) -> Result<()> {
        self.send_text(&format!("{}\n", line))
    }
}

/// Everything a backend needs to start one session.
#[derive(Debug, Clone, Copy)]
pub struct SessionRequest<'a> {
    /// Canonical session name.
    pub name: &'a str,
    /// Working directory of the new session.
    pub directory: &'a Path,
    /// Shell or raw terminal.
    pub kind: ShellKind,
    /// Preferred shell binary, run directly by [`ShellKind::Shell`] sessions.
    pub shell: &'a str,
    /// Name of the environment variable holding the history file path.
    ///
    /// The variable is set for the duration of `create_session`.
    pub history_env: &'a str,
}

/// Callback invoked once a new session accepts input.
pub type ReadyCallback<'a> = dyn FnMut(&mut dyn LineSink) -> Result<()> + 'a;

/// Runs and tracks the processes behind sessions.
pub trait SessionBackend {
    /// Opaque reference to one running session.
    type Handle: Clone + PartialEq + fmt::Debug;

    /// Spawn a session and call `on_ready` once it is interactive.
    ///
    /// If `on_ready` fails the session is torn down and the error returned.
    fn create_session(
        &mut self,
        request: &SessionRequest<'_>,
        on_ready: &mut ReadyCallback<'_>,
    ) -> Result<Self::Handle>;

    /// Type `text` plus a newline into a live session.
    fn send_line(&mut self, handle: &Self::Handle, text: &str) -> Result<()>;

    /// Whether the session can still be focused.
    fn is_live(&mut self, handle: &Self::Handle) -> bool;

    /// Bring the session into view.
    fn focus_handle(&mut self, handle: &Self::Handle) -> Result<()>;

    /// The session currently in view, if the backend can tell.
    fn current_handle(&mut self) -> Option<Self::Handle> {
        None
    }

    /// Text currently shown by the session, if the backend keeps it.
    fn screen_text(&mut self, _handle: &Self::Handle) -> Option<String> {
        None
    }

    /// Sessions that outlived a previous keyshell process, with their
    /// canonical names.
    fn discover(&mut self) -> Result<Vec<(String, Self::Handle)>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder(String);

    impl LineSink for Recorder {
        fn send_text(&mut self, text: &str) -> Result<()> {
            self.0.push_str(text);
            Ok(())
        }
    }

    #[test]
    fn test_send_line_appends_newline() {
        let mut sink = Recorder(String::new());
        sink.send_line("make -j8").unwrap();
        sink.send_text("exec \"zsh\"\n").unwrap();
        assert_eq!(sink.0, "make -j8\nexec \"zsh\"\n");
    }
}
