//! In-process sessions on pseudo-terminals, using portable-pty.

use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use portable_pty::{native_pty_system, CommandBuilder, PtySize as NativePtySize};
use tracing::{debug, warn};

use super::{LineSink, ReadyCallback, SessionBackend, SessionRequest};
use crate::error::KeyshellError;
use crate::shellspec::ShellKind;
use crate::Result;

/// Program started for [`ShellKind::Terminal`] sessions before the re-exec.
#[cfg(unix)]
const TERMINAL_PROGRAM: &str = "/bin/sh";

#[cfg(windows)]
const TERMINAL_PROGRAM: &str = "cmd.exe";

/// Handle of a PTY session, unique within one [`PtyBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pty-{}", self.0)
    }
}

/// Size of a PTY in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtySize {
    /// Number of rows (height).
    pub rows: u16,
    /// Number of columns (width).
    pub cols: u16,
}

impl PtySize {
    /// Create a new PtySize with the given dimensions.
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    fn to_native(self) -> NativePtySize {
        NativePtySize {
            rows: self.rows,
            cols: self.cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }
}

impl Default for PtySize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

/// One running shell and the terminal it draws on.
struct PtyShell {
    name: String,
    child: Box<dyn portable_pty::Child + Send + Sync>,
    writer: Box<dyn Write + Send>,
    screen: Arc<Mutex<vt100::Parser>>,
    // Kept alive so the reader side of the PTY stays open.
    _master: Box<dyn portable_pty::MasterPty + Send>,
    _drain: JoinHandle<()>,
}

impl PtyShell {
    fn is_live(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn kill(&mut self) {
        if let Err(e) = self.child.kill() {
            debug!(session = %self.name, error = %e, "kill failed");
        }
        let _ = self.child.wait();
    }
}

impl LineSink for PtyShell {
    fn send_text(&mut self, text: &str) -> Result<()> {
        self.writer.write_all(text.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Backend that runs every session on its own pseudo-terminal inside this
/// process.
///
/// Output is fed into a vt100 screen per session, so hosts can draw it with
/// [`PtyBackend::screen_text`]. "Focus" is a foreground pointer: the host
/// decides what to show.
pub struct PtyBackend {
    pty_system: Box<dyn portable_pty::PtySystem + Send>,
    size: PtySize,
    terminal_program: String,
    shells: HashMap<HandleId, PtyShell>,
    foreground: Option<HandleId>,
    next_handle: u64,
}

impl PtyBackend {
    /// Create a backend with the default terminal size.
    pub fn new() -> Self {
        Self::with_size(PtySize::default())
    }

    /// Create a backend whose terminals have the given size.
    pub fn with_size(size: PtySize) -> Self {
        Self {
            pty_system: native_pty_system(),
            size,
            terminal_program: TERMINAL_PROGRAM.to_string(),
            shells: HashMap::new(),
            foreground: None,
            next_handle: 1,
        }
    }

    /// Override the program started for terminal sessions.
    pub fn with_terminal_program(mut self, program: impl Into<String>) -> Self {
        self.terminal_program = program.into();
        self
    }

    /// Kill a session from the host side, as if its window was closed.
    ///
    /// The registry notices on its next liveness poll.
    pub fn terminate(&mut self, handle: &HandleId) -> bool {
        match self.shells.remove(handle) {
            Some(mut shell) => {
                shell.kill();
                if self.foreground == Some(*handle) {
                    self.foreground = None;
                }
                true
            }
            None => false,
        }
    }

    fn spawn(&self, request: &SessionRequest<'_>) -> Result<PtyShell> {
        if !request.directory.is_dir() {
            return Err(KeyshellError::SessionCreation(format!(
                "not a directory: {}",
                request.directory.display()
            )));
        }

        let pair = self
            .pty_system
            .openpty(self.size.to_native())
            .map_err(|e| KeyshellError::SessionCreation(e.to_string()))?;

        let program = match request.kind {
            ShellKind::Shell => request.shell,
            ShellKind::Terminal => self.terminal_program.as_str(),
        };

        let mut cmd = CommandBuilder::new(program);
        cmd.cwd(request.directory);
        if let Some(history) = std::env::var_os(request.history_env) {
            cmd.env(request.history_env, history);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| KeyshellError::SessionCreation(e.to_string()))?;
        drop(pair.slave);

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| KeyshellError::SessionCreation(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| KeyshellError::SessionCreation(e.to_string()))?;

        let screen = Arc::new(Mutex::new(vt100::Parser::new(
            self.size.rows,
            self.size.cols,
            0,
        )));
        let drain_screen = Arc::clone(&screen);
        let drain = std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if let Ok(mut parser) = drain_screen.lock() {
                            parser.process(&buf[..n]);
                        }
                    }
                }
            }
        });

        Ok(PtyShell {
            name: request.name.to_string(),
            child,
            writer,
            screen,
            _master: pair.master,
            _drain: drain,
        })
    }
}

impl Default for PtyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBackend for PtyBackend {
    type Handle = HandleId;

    fn create_session(
        &mut self,
        request: &SessionRequest<'_>,
        on_ready: &mut ReadyCallback<'_>,
    ) -> Result<HandleId> {
        let mut shell = self.spawn(request)?;

        if let Err(e) = on_ready(&mut shell) {
            warn!(session = %request.name, error = %e, "init failed, discarding session");
            shell.kill();
            return Err(e);
        }

        let id = HandleId(self.next_handle);
        self.next_handle += 1;
        debug!(session = %request.name, handle = %id, "pty session spawned");
        self.shells.insert(id, shell);
        Ok(id)
    }

    fn send_line(&mut self, handle: &HandleId, text: &str) -> Result<()> {
        if !self.is_live(handle) {
            return Err(KeyshellError::DeadSession(handle.to_string()));
        }
        match self.shells.get_mut(handle) {
            Some(shell) => shell.send_line(text),
            None => Err(KeyshellError::DeadSession(handle.to_string())),
        }
    }

    /// Shells found dead are dropped here.
    fn is_live(&mut self, handle: &HandleId) -> bool {
        let Some(shell) = self.shells.get_mut(handle) else {
            return false;
        };
        if shell.is_live() {
            return true;
        }
        debug!(session = %shell.name, handle = %handle, "pty session exited");
        self.shells.remove(handle);
        if self.foreground == Some(*handle) {
            self.foreground = None;
        }
        false
    }

    fn focus_handle(&mut self, handle: &HandleId) -> Result<()> {
        if !self.is_live(handle) {
            return Err(KeyshellError::DeadSession(handle.to_string()));
        }
        self.foreground = Some(*handle);
        Ok(())
    }

    fn current_handle(&mut self) -> Option<HandleId> {
        let current = self.foreground?;
        self.is_live(&current).then_some(current)
    }

    fn screen_text(&mut self, handle: &HandleId) -> Option<String> {
        let shell = self.shells.get(handle)?;
        let parser = shell.screen.lock().ok()?;
        Some(parser.screen().contents())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn request<'a>(dir: &'a Path, kind: ShellKind) -> SessionRequest<'a> {
        SessionRequest {
            name: "1.shell.test",
            directory: dir,
            kind,
            shell: "/bin/sh",
            history_env: "KEYSHELL_TEST_PTY_HISTFILE",
        }
    }

    #[test]
    fn test_pty_size_default() {
        let size = PtySize::default();
        assert_eq!(size.rows, 24);
        assert_eq!(size.cols, 80);
        assert_eq!(PtySize::new(24, 80), size);
    }

    #[test]
    fn test_missing_directory_fails() {
        let mut backend = PtyBackend::new();
        let dir = Path::new("/definitely/not/here");
        let result = backend.create_session(&request(dir, ShellKind::Shell), &mut |_| Ok(()));
        assert!(matches!(result, Err(KeyshellError::SessionCreation(_))));
    }

    #[test]
    fn test_unknown_handle_is_dead() {
        let mut backend = PtyBackend::new();
        let ghost = HandleId(u64::MAX);
        assert!(!backend.is_live(&ghost));
        assert!(matches!(
            backend.send_line(&ghost, "echo hi"),
            Err(KeyshellError::DeadSession(_))
        ));
        assert!(backend.focus_handle(&ghost).is_err());
    }

    #[test]
    #[cfg(unix)]
    fn test_spawn_focus_and_terminate() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut backend = PtyBackend::new();

        let mut ready_called = false;
        let handle = backend
            .create_session(&request(dir.path(), ShellKind::Shell), &mut |sink| {
                ready_called = true;
                sink.send_line("echo ready")
            })
            .unwrap();

        assert!(ready_called);
        assert!(backend.is_live(&handle));
        assert!(backend.current_handle().is_none());

        backend.focus_handle(&handle).unwrap();
        assert_eq!(backend.current_handle(), Some(handle));

        assert!(backend.terminate(&handle));
        assert!(backend.shells.is_empty());
        assert!(!backend.terminate(&handle));
        assert!(!backend.is_live(&handle));
        assert!(backend.current_handle().is_none());
        assert!(matches!(
            backend.send_line(&handle, "echo late"),
            Err(KeyshellError::DeadSession(_))
        ));
    }

    #[test]
    #[cfg(unix)]
    fn test_screen_shows_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut backend = PtyBackend::new();
        let handle = backend
            .create_session(&request(dir.path(), ShellKind::Shell), &mut |_| Ok(()))
            .unwrap();

        backend.send_line(&handle, "echo keyshell-marker").unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        let mut seen = false;
        while std::time::Instant::now() < deadline {
            let text = backend.screen_text(&handle).unwrap_or_default();
            if text.matches("keyshell-marker").count() >= 2 {
                seen = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(50));
        }

        backend.terminate(&handle);
        assert!(seen, "command output never reached the screen");
    }

    #[test]
    #[cfg(unix)]
    fn test_failed_init_discards_session() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut backend = PtyBackend::new();

        let result = backend.create_session(&request(dir.path(), ShellKind::Terminal), &mut |_| {
            Err(KeyshellError::Backend("hook failed".into()))
        });

        assert!(result.is_err());
        assert!(backend.shells.is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_exited_shell_is_pruned() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut backend = PtyBackend::new();
        let handle = backend
            .create_session(&request(dir.path(), ShellKind::Shell), &mut |_| Ok(()))
            .unwrap();
        backend.focus_handle(&handle).unwrap();

        backend.send_line(&handle, "exit").unwrap();

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while backend.is_live(&handle) && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(50));
        }

        assert!(!backend.is_live(&handle));
        assert!(backend.shells.is_empty());
        assert!(backend.current_handle().is_none());
    }

    #[test]
    fn test_handles_are_distinct_per_backend() {
        let a = HandleId(1);
        let b = HandleId(2);
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "pty-1");
    }
}
