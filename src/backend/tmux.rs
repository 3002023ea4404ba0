//! Sessions hosted by a tmux server.
//!
//! tmux sessions outlive the keyshell process, so this backend also
//! supports [`SessionBackend::discover`]: the canonical name is stored in a
//! user option on each session and read back on startup.

use std::process::{Command, Output, Stdio};

use tracing::debug;

use super::{LineSink, ReadyCallback, SessionBackend, SessionRequest};
use crate::error::KeyshellError;
use crate::shellspec::ShellKind;
use crate::Result;

/// Session option holding the canonical keyshell name.
const NAME_OPTION: &str = "@keyshell_name";

/// tmux's session name for a canonical name.
///
/// tmux does not allow `.` or `:` in session names. `_` is the escape
/// character (`__`, `_d`, `_c`), so distinct names stay distinct.
pub fn tmux_session_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '_' => out.push_str("__"),
            '.' => out.push_str("_d"),
            ':' => out.push_str("_c"),
            _ => out.push(c),
        }
    }
    out
}

/// Exact-match target for a session.
fn session_target(tmux_name: &str) -> String {
    format!("={}", tmux_name)
}

/// Target for the active pane of a session.
fn pane_target(tmux_name: &str) -> String {
    format!("={}:", tmux_name)
}

#[derive(Debug, PartialEq, Eq)]
enum KeyInput<'a> {
    Literal(&'a str),
    Enter,
}

/// Split text into literal chunks and Enter presses.
fn key_inputs(text: &str) -> Vec<KeyInput<'_>> {
    let mut inputs = Vec::new();
    for (i, segment) in text.split('\n').enumerate() {
        if i > 0 {
            inputs.push(KeyInput::Enter);
        }
        if !segment.is_empty() {
            inputs.push(KeyInput::Literal(segment));
        }
    }
    inputs
}

/// Parse `list-sessions -F '#{session_name}\t#{@keyshell_name}'` output.
///
/// Sessions without the option were not created by keyshell and are skipped.
fn parse_session_list(stdout: &str) -> Vec<(String, String)> {
    stdout
        .lines()
        .filter_map(|line| {
            let (tmux_name, name) = line.split_once('\t')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), tmux_name.to_string()))
        })
        .collect()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Backend driving the `tmux` command line.
#[derive(Debug, Clone)]
pub struct TmuxBackend {
    program: String,
    socket: Option<String>,
}

impl TmuxBackend {
    /// Use `tmux` from `PATH` and the default server.
    pub fn new() -> Self {
        Self {
            program: "tmux".to_string(),
            socket: None,
        }
    }

    /// Use a named server socket (`tmux -L <name>`).
    pub fn with_socket(mut self, socket: impl Into<String>) -> Self {
        self.socket = Some(socket.into());
        self
    }

    /// Use a different tmux binary.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(socket) = &self.socket {
            cmd.args(["-L", socket.as_str()]);
        }
        cmd
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        debug!(args = ?args, "tmux");
        self.command()
            .args(args)
            .output()
            .map_err(|e| KeyshellError::Backend(format!("{}: {}", self.program, e)))
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(KeyshellError::Backend(format!(
                "tmux {}: {}",
                args.first().copied().unwrap_or_default(),
                stderr_of(&output)
            )))
        }
    }

    fn send_keys(&self, tmux_name: &str, text: &str) -> Result<()> {
        let target = pane_target(tmux_name);
        for input in key_inputs(text) {
            match input {
                KeyInput::Literal(chunk) => {
                    self.run_checked(&["send-keys", "-t", &target, "-l", "--", chunk])?
                }
                KeyInput::Enter => self.run_checked(&["send-keys", "-t", &target, "Enter"])?,
            };
        }
        Ok(())
    }

    fn kill(&self, tmux_name: &str) {
        let _ = self.run(&["kill-session", "-t", &session_target(tmux_name)]);
    }

    fn inside_tmux() -> bool {
        std::env::var_os("TMUX").is_some_and(|v| !v.is_empty())
    }
}

impl Default for TmuxBackend {
    fn default() -> Self {
        Self::new()
    }
}

struct TmuxSink<'a> {
    backend: &'a TmuxBackend,
    tmux_name: &'a str,
}

impl LineSink for TmuxSink<'_> {
    fn send_text(&mut self, text: &str) -> Result<()> {
        self.backend.send_keys(self.tmux_name, text)
    }
}

impl SessionBackend for TmuxBackend {
    type Handle = String;

    fn create_session(
        &mut self,
        request: &SessionRequest<'_>,
        on_ready: &mut ReadyCallback<'_>,
    ) -> Result<String> {
        let tmux_name = tmux_session_name(request.name);
        let directory = request.directory.to_string_lossy().into_owned();

        let mut args: Vec<&str> = vec![
            "new-session",
            "-d",
            "-s",
            tmux_name.as_str(),
            "-c",
            directory.as_str(),
        ];

        // The server, not this process, starts the shell, so the history
        // variable has to be forwarded explicitly.
        let history = std::env::var(request.history_env)
            .ok()
            .map(|value| format!("{}={}", request.history_env, value));
        if let Some(assignment) = &history {
            args.push("-e");
            args.push(assignment.as_str());
        }
        if request.kind == ShellKind::Shell {
            args.push(request.shell);
        }

        let output = self.run(&args)?;
        if !output.status.success() {
            return Err(KeyshellError::SessionCreation(stderr_of(&output)));
        }

        let setup = self
            .run_checked(&[
                "set-option",
                "-t",
                &session_target(&tmux_name),
                NAME_OPTION,
                request.name,
            ])
            .and_then(|_| {
                on_ready(&mut TmuxSink {
                    backend: self,
                    tmux_name: &tmux_name,
                })
            });

        if let Err(e) = setup {
            self.kill(&tmux_name);
            return Err(e);
        }

        debug!(session = %request.name, tmux = %tmux_name, "tmux session created");
        Ok(tmux_name)
    }

    fn send_line(&mut self, handle: &String, text: &str) -> Result<()> {
        if !self.is_live(handle) {
            return Err(KeyshellError::DeadSession(handle.clone()));
        }
        TmuxSink {
            backend: self,
            tmux_name: handle,
        }
        .send_line(text)
    }

    fn is_live(&mut self, handle: &String) -> bool {
        self.run(&["has-session", "-t", &session_target(handle)])
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn focus_handle(&mut self, handle: &String) -> Result<()> {
        let target = session_target(handle);

        if Self::inside_tmux() {
            self.run_checked(&["switch-client", "-t", &target])?;
            return Ok(());
        }

        let status = self
            .command()
            .args(["attach-session", "-t", &target])
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| KeyshellError::Backend(format!("{}: {}", self.program, e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(KeyshellError::DeadSession(handle.clone()))
        }
    }

    fn current_handle(&mut self) -> Option<String> {
        if !Self::inside_tmux() {
            return None;
        }
        let output = self
            .run(&["display-message", "-p", "#{session_name}"])
            .ok()?;
        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (output.status.success() && !name.is_empty()).then_some(name)
    }

    fn screen_text(&mut self, handle: &String) -> Option<String> {
        let output = self
            .run_checked(&["capture-pane", "-p", "-t", &pane_target(handle)])
            .ok()?;
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn discover(&mut self) -> Result<Vec<(String, String)>> {
        let format = format!("#{{session_name}}\t#{{{}}}", NAME_OPTION);
        let output = self.run(&["list-sessions", "-F", &format])?;

        // tmux fails when no server is running; that just means no sessions.
        if !output.status.success() {
            return Ok(Vec::new());
        }

        Ok(parse_session_list(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tmux_session_name() {
        assert_eq!(tmux_session_name("1.build.kernel"), "1_dbuild_dkernel");
        assert_eq!(tmux_session_name("a:b.c"), "a_cb_dc");
        assert!(!tmux_session_name("1.shell.a:b").contains(['.', ':']));
    }

    #[test]
    fn test_tmux_session_name_is_injective() {
        let dotted = tmux_session_name("1.shell.foo.bar");
        let underscored = tmux_session_name("1.shell.foo_bar");
        assert_ne!(dotted, underscored);

        assert_ne!(tmux_session_name("a_d"), tmux_session_name("a."));
        assert_ne!(tmux_session_name("a_c"), tmux_session_name("a:"));
    }

    #[test]
    fn test_targets() {
        assert_eq!(session_target("1_dbuild_dkernel"), "=1_dbuild_dkernel");
        assert_eq!(pane_target("1_dbuild_dkernel"), "=1_dbuild_dkernel:");
    }

    #[test]
    fn test_key_inputs() {
        assert_eq!(
            key_inputs("exec \"zsh\"\n"),
            vec![KeyInput::Literal("exec \"zsh\""), KeyInput::Enter]
        );
        assert_eq!(
            key_inputs("a\n\nb"),
            vec![
                KeyInput::Literal("a"),
                KeyInput::Enter,
                KeyInput::Enter,
                KeyInput::Literal("b")
            ]
        );
        assert!(key_inputs("").is_empty());
    }

    #[test]
    fn test_parse_session_list() {
        let stdout = "1_dbuild_dkernel\t1.build.kernel\nscratch\t\n2_dgit_d-\t2.git.-\n";
        let sessions = parse_session_list(stdout);
        assert_eq!(
            sessions,
            vec![
                ("1.build.kernel".to_string(), "1_dbuild_dkernel".to_string()),
                ("2.git.-".to_string(), "2_dgit_d-".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_binary_is_backend_error() {
        let mut backend = TmuxBackend::new().with_program("/nonexistent/tmux-binary");
        assert!(!backend.is_live(&"anything".to_string()));
        assert!(matches!(backend.discover(), Err(KeyshellError::Backend(_))));
    }

    // Needs a tmux binary; run with: cargo test -- --ignored
    #[test]
    #[ignore]
    fn test_tmux_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut backend = TmuxBackend::new().with_socket("keyshell-test");
        let request = SessionRequest {
            name: "1.shell.test",
            directory: dir.path(),
            kind: ShellKind::Shell,
            shell: "/bin/sh",
            history_env: "KEYSHELL_TEST_TMUX_HISTFILE",
        };

        let handle = backend
            .create_session(&request, &mut |sink| sink.send_line("echo ready"))
            .unwrap();
        assert!(backend.is_live(&handle));

        let found = backend.discover().unwrap();
        assert!(found.iter().any(|(name, h)| name == "1.shell.test" && h == &handle));

        backend.kill(&handle);
        assert!(!backend.is_live(&handle));
    }
}
