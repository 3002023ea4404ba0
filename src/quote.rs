//! Shell quoting and shell-binary selection.
//!
//! Terminal sessions start under a fixed terminal program and are then
//! switched to the user's preferred shell by typing an `exec` line into
//! them. This module builds that line.

/// Fallback shell when neither an override nor `$SHELL` is available.
#[cfg(unix)]
const FALLBACK_SHELL: &str = "/bin/sh";

#[cfg(windows)]
const FALLBACK_SHELL: &str = "powershell.exe";

/// Get the host's configured default shell.
pub fn default_shell() -> String {
    #[cfg(unix)]
    {
        std::env::var("SHELL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| FALLBACK_SHELL.to_string())
    }
    #[cfg(windows)]
    {
        FALLBACK_SHELL.to_string()
    }
}

/// Choose the shell binary for new sessions.
///
/// Precedence: `explicit`, then a non-empty value of the environment
/// variable `env_var`, then [`default_shell`].
pub fn resolve_shell_binary(explicit: Option<&str>, env_var: &str) -> String {
    if let Some(shell) = explicit.filter(|s| !s.is_empty()) {
        return shell.to_string();
    }

    std::env::var(env_var)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default_shell)
}

/// Quote a single argument in double quotes.
///
/// Backslashes are escaped before quotes, otherwise the backslashes added
/// for the quotes would be doubled.
fn quote_arg(arg: &str) -> String {
    let escaped = arg.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// Quote every argument and join them with single spaces.
pub fn quote_shell_args<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .map(|arg| quote_arg(arg.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build the line that replaces a session's process with `shell`.
///
/// The result is newline-terminated and ready to be typed into a session.
pub fn reexec_command_line<S: AsRef<str>>(shell: &str, extra_args: &[S]) -> String {
    let args = std::iter::once(shell).chain(extra_args.iter().map(|a| a.as_ref()));
    format!("exec {}\n", quote_shell_args(args))
}
