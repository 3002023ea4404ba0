//! Scoped control of the history-file environment variable.
//!
//! Shells pick their history file from an environment variable at startup
//! (`HISTFILE` for bash and zsh). Session creation sets that variable for
//! exactly as long as the backend needs it, then puts the old value back.
//!
//! The variable is process-wide. This is sound only while activations are
//! serialized, which the engine guarantees by taking `&mut self`.

use std::ffi::OsString;
use std::path::Path;

use tracing::trace;

/// Guard that restores an environment variable when dropped.
#[derive(Debug)]
pub struct HistoryScope {
    var: String,
    previous: Option<OsString>,
}

impl HistoryScope {
    /// Set `var` to `file` until the returned guard is dropped.
    pub fn enter(var: &str, file: &Path) -> Self {
        let previous = std::env::var_os(var);
        trace!(var, file = %file.display(), "setting history file");
        std::env::set_var(var, file);
        Self {
            var: var.to_string(),
            previous,
        }
    }
}

impl Drop for HistoryScope {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => std::env::set_var(&self.var, value),
            None => std::env::remove_var(&self.var),
        }
        trace!(var = %self.var, "history file restored");
    }
}

/// Run `body` with `var` pointing at `file`.
///
/// The prior value (or its absence) is restored when `body` returns, fails,
/// or panics.
pub fn with_history_file<T, F>(var: &str, file: &Path, body: F) -> T
where
    F: FnOnce() -> T,
{
    let _scope = HistoryScope::enter(var, file);
    body()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_sets_during_body_and_unsets_after() {
        let var = "KEYSHELL_TEST_HIST_UNSET";
        std::env::remove_var(var);

        let file = PathBuf::from("/tmp/sessions/kernel/1/history");
        let seen = with_history_file(var, &file, || std::env::var(var).ok());

        assert_eq!(seen.as_deref(), Some("/tmp/sessions/kernel/1/history"));
        assert!(std::env::var_os(var).is_none());
    }

    #[test]
    fn test_restores_previous_value() {
        let var = "KEYSHELL_TEST_HIST_PREV";
        std::env::set_var(var, "/home/user/.bash_history");

        with_history_file(var, Path::new("/tmp/other"), || ());

        assert_eq!(std::env::var(var).unwrap(), "/home/user/.bash_history");
        std::env::remove_var(var);
    }

    #[test]
    fn test_restores_after_error() {
        let var = "KEYSHELL_TEST_HIST_ERR";
        std::env::set_var(var, "before");

        let result: Result<(), &str> =
            with_history_file(var, Path::new("/tmp/during"), || Err("spawn failed"));

        assert!(result.is_err());
        assert_eq!(std::env::var(var).unwrap(), "before");
        std::env::remove_var(var);
    }

    #[test]
    fn test_restores_after_panic() {
        let var = "KEYSHELL_TEST_HIST_PANIC";
        std::env::remove_var(var);

        let outcome = std::panic::catch_unwind(|| {
            with_history_file(var, Path::new("/tmp/panic"), || panic!("boom"))
        });

        assert!(outcome.is_err());
        assert!(std::env::var_os(var).is_none());
    }

    #[test]
    fn test_nested_scopes_unwind_in_order() {
        let var = "KEYSHELL_TEST_HIST_NESTED";
        std::env::remove_var(var);

        {
            let _outer = HistoryScope::enter(var, Path::new("/outer"));
            {
                let _inner = HistoryScope::enter(var, Path::new("/inner"));
                assert_eq!(std::env::var(var).unwrap(), "/inner");
            }
            assert_eq!(std::env::var(var).unwrap(), "/outer");
        }
        assert!(std::env::var_os(var).is_none());
    }
}
