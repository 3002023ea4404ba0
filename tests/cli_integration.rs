//! CLI integration tests.
//!
//! These tests verify the CLI argument parsing and configuration loading.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;

use keyshell::cli::{parse_args_from, Args, CliCommand};
use keyshell::config::{BackendKind, Config};
use keyshell::ShellKind;

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("keyshell")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&[])).unwrap();

    assert!(result.config.is_none());
    assert!(result.backend.is_none());
    assert!(result.session_root.is_none());
    assert!(result.log_level.is_none());
    assert!(result.command.is_none());
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "--config",
        "/etc/keyshell.json",
        "--backend",
        "tmux",
        "--session-root",
        "/var/lib/keyshell",
        "--log-level",
        "trace",
        "activate",
        "--project",
        "kernel",
        "3",
    ]))
    .unwrap();

    assert_eq!(result.config, Some(PathBuf::from("/etc/keyshell.json")));
    assert_eq!(result.backend, Some(BackendKind::Tmux));
    assert_eq!(result.session_root, Some(PathBuf::from("/var/lib/keyshell")));
    assert_eq!(result.log_level, Some("trace".to_string()));
    assert_eq!(
        result.command,
        Some(CliCommand::Activate {
            key: "3".into(),
            global: false,
            project: Some("kernel".into()),
            root: None,
        })
    );
}

#[test]
fn test_cli_every_command_parses() {
    for (argv, expected) in [
        (vec!["last"], CliCommand::Last),
        (vec!["list"], CliCommand::List),
        (vec!["interactive"], CliCommand::Interactive),
        (
            vec!["switch", "2.shell.-"],
            CliCommand::Switch {
                name: "2.shell.-".into(),
                create: false,
            },
        ),
    ] {
        let result = parse_args_from(args(&argv)).unwrap();
        assert_eq!(result.command, Some(expected));
    }
}

#[test]
fn test_cli_invalid_backend() {
    let result = parse_args_from(args(&["-b", "screen"]));
    assert!(result.is_err());
}

#[test]
fn test_cli_send_requires_name() {
    let result = parse_args_from(args(&["send"]));
    assert!(result.is_err());
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

#[test]
fn test_config_from_json_file() {
    let json = r#"{
        "sessions": {
            "root": "/srv/keyshell",
            "history_file": ".history",
            "history_env": "HISTFILE",
            "default_shell_name": "sh"
        },
        "shell": {
            "binary": "/usr/bin/fish",
            "args": ["-l"]
        },
        "keys": {
            "keys": ["1", "2", "9"],
            "term_keys": ["9"]
        },
        "backend": "pty",
        "projects": {
            "kernel": {
                "1": { "name": "build", "directory": "out", "kind": "shell" },
                "9": { "kind": "terminal", "init": ["cd {session_dir}"] }
            }
        },
        "logging": {
            "level": "debug"
        }
    }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.sessions.root, PathBuf::from("/srv/keyshell"));
    assert_eq!(config.sessions.history_file, ".history");
    assert_eq!(config.sessions.default_shell_name, "sh");
    assert_eq!(config.shell.binary.as_deref(), Some("/usr/bin/fish"));
    assert_eq!(config.shell.args, vec!["-l"]);
    assert_eq!(config.keys.keys, vec!["1", "2", "9"]);
    assert_eq!(config.backend, BackendKind::Pty);
    assert_eq!(config.logging.level, "debug");

    let projects = config.project_config();
    let build = projects.resolve(
        "kernel",
        "1",
        &config.sessions.default_shell_name,
        std::path::Path::new("/src/kernel"),
        &config.keys.term_keys,
    );
    assert_eq!(build.name, "build");
    assert_eq!(build.directory, PathBuf::from("/src/kernel/out"));
    assert_eq!(build.kind, ShellKind::Shell);

    let term = projects.resolve(
        "kernel",
        "9",
        &config.sessions.default_shell_name,
        std::path::Path::new("/src/kernel"),
        &config.keys.term_keys,
    );
    assert_eq!(term.name, "sh");
    assert_eq!(term.kind, ShellKind::Terminal);
    assert!(term.init_hook.is_some());
}

#[test]
fn test_config_priority_cli_over_file() {
    let json = r#"{
        "sessions": { "root": "/from/file" },
        "backend": "tmux",
        "logging": { "level": "warn" }
    }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let args = Args {
        config: Some(file.path().to_path_buf()),
        backend: Some(BackendKind::Pty),
        session_root: Some(PathBuf::from("/from/cli")),
        log_level: Some("trace".to_string()),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();

    // CLI values should win
    assert_eq!(config.backend, BackendKind::Pty);
    assert_eq!(config.sessions.root, PathBuf::from("/from/cli"));
    assert_eq!(config.log_filter(), "trace");
}

#[test]
fn test_config_missing_explicit_file_is_error() {
    let args = Args {
        config: Some(PathBuf::from("/nonexistent/keyshell/config.json")),
        ..Args::default()
    };

    let err = Config::load(&args).unwrap_err();
    assert!(err.to_string().starts_with("failed to read config file"));
}

#[test]
fn test_config_engine_settings_expand_tilde() {
    let json = r#"{ "sessions": { "root": "~/keyshell-sessions" } }"#;
    let config: Config = serde_json::from_str(json).unwrap();

    let settings = config.engine_settings();
    if let Some(home) = dirs::home_dir() {
        assert_eq!(settings.session_root, home.join("keyshell-sessions"));
    }
}

// ============================================================================
// Configuration Serialization Tests
// ============================================================================

#[test]
fn test_config_roundtrip() {
    let original = Config::default();
    let json = serde_json::to_string(&original).unwrap();
    let loaded: Config = serde_json::from_str(&json).unwrap();

    assert_eq!(original.sessions.root, loaded.sessions.root);
    assert_eq!(original.backend, loaded.backend);
    assert_eq!(original.keys.keys, loaded.keys.keys);
}

#[test]
fn test_config_partial_deserialization() {
    // Only specify some fields, others should use defaults
    let json = r#"{"keys": {"term_keys": []}}"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert!(config.keys.term_keys.is_empty());
    assert_eq!(config.keys.keys.len(), 10); // Default
    assert_eq!(config.sessions.history_env, "HISTFILE"); // Default
    assert_eq!(config.backend, BackendKind::Tmux); // Default
}
