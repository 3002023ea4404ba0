//! Command-line interface for keyshell.
//!
//! Uses lexopt for minimal binary size overhead (~34KB).

use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::BackendKind;

/// Default tmux prefix key for the keyshell key table.
pub const DEFAULT_PREFIX_KEY: &str = "S";

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Session backend (overrides config file).
    pub backend: Option<BackendKind>,
    /// Session directory root (overrides config file).
    pub session_root: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
    /// Subcommand to run.
    pub command: Option<CliCommand>,
}

/// Subcommands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Focus or create the session for a key.
    Activate {
        key: String,
        global: bool,
        project: Option<String>,
        root: Option<PathBuf>,
    },
    /// Return to the last-focused session.
    Last,
    /// Focus a session by canonical name.
    Switch { name: String, create: bool },
    /// Type a line into a session.
    Send { name: String, text: String },
    /// List live sessions.
    List,
    /// Print tmux bindings for the configured keys.
    Bindings { prefix: String },
    /// Read events from stdin, one per line.
    Interactive,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('b') | Long("backend") => {
                let value: String = parser.value()?.parse()?;
                result.backend = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("backend", value))?,
                );
            }
            Short('r') | Long("session-root") => {
                result.session_root = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                let name = val.string()?;
                result.command = Some(parse_command(&name, &mut parser)?);
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Parse the rest of the command line as arguments to `name`.
fn parse_command(name: &str, parser: &mut lexopt::Parser) -> Result<CliCommand, ArgsError> {
    use lexopt::prelude::*;

    match name {
        "activate" => {
            let mut key = None;
            let mut global = false;
            let mut project = None;
            let mut root = None;

            while let Some(arg) = parser.next()? {
                match arg {
                    Short('g') | Long("global") => global = true,
                    Short('p') | Long("project") => project = Some(parser.value()?.parse()?),
                    Long("root") => root = Some(parser.value()?.parse()?),
                    Value(val) if key.is_none() => key = Some(val.string()?),
                    Value(val) => {
                        return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()))
                    }
                    _ => return Err(arg.unexpected().into()),
                }
            }

            Ok(CliCommand::Activate {
                key: key.ok_or(ArgsError::MissingArgument("KEY"))?,
                global,
                project,
                root,
            })
        }
        "last" => {
            no_more_args(parser)?;
            Ok(CliCommand::Last)
        }
        "switch" => {
            let mut name = None;
            let mut create = false;

            while let Some(arg) = parser.next()? {
                match arg {
                    Long("create") => create = true,
                    Value(val) if name.is_none() => name = Some(val.string()?),
                    Value(val) => {
                        return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()))
                    }
                    _ => return Err(arg.unexpected().into()),
                }
            }

            Ok(CliCommand::Switch {
                name: name.ok_or(ArgsError::MissingArgument("NAME"))?,
                create,
            })
        }
        "send" => {
            let name = match parser.next()? {
                Some(Value(val)) => val.string()?,
                Some(arg) => return Err(arg.unexpected().into()),
                None => return Err(ArgsError::MissingArgument("NAME")),
            };

            // Everything after NAME is the text, options included.
            let mut words = parser
                .raw_args()?
                .map(|word| word.into_string().map_err(lexopt::Error::NonUnicodeValue))
                .collect::<Result<Vec<_>, _>>()?;
            if words.first().map(String::as_str) == Some("--") {
                words.remove(0);
            }
            Ok(CliCommand::Send {
                name,
                text: words.join(" "),
            })
        }
        "list" | "ls" => {
            no_more_args(parser)?;
            Ok(CliCommand::List)
        }
        "bindings" => {
            let mut prefix = DEFAULT_PREFIX_KEY.to_string();
            while let Some(arg) = parser.next()? {
                match arg {
                    Long("prefix") => prefix = parser.value()?.parse()?,
                    _ => return Err(arg.unexpected().into()),
                }
            }
            Ok(CliCommand::Bindings { prefix })
        }
        "interactive" => {
            no_more_args(parser)?;
            Ok(CliCommand::Interactive)
        }
        other => Err(ArgsError::UnknownCommand(other.to_string())),
    }
}

fn no_more_args(parser: &mut lexopt::Parser) -> Result<(), ArgsError> {
    match parser.next()? {
        Some(lexopt::Arg::Value(val)) => Err(ArgsError::UnexpectedArgument(
            val.to_string_lossy().into(),
        )),
        Some(arg) => Err(arg.unexpected().into()),
        None => Ok(()),
    }
}

/// One event read in interactive mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractiveCommand {
    /// `<key>` or `g <key>`.
    Activate { key: String, global: bool },
    /// `last`
    Last,
    /// `switch [--create] <name>`
    Switch { name: String, create: bool },
    /// `send <name> <text...>`
    Send { name: String, text: String },
    /// `list`
    List,
    /// `show [name]`
    Show(Option<String>),
    /// `quit`
    Quit,
}

/// Parse one line of interactive input. Blank lines yield `None`.
pub fn parse_interactive_line(line: &str) -> Result<Option<InteractiveCommand>, ArgsError> {
    let mut words = line.split_whitespace();
    let Some(first) = words.next() else {
        return Ok(None);
    };

    let command = match first {
        "quit" | "exit" => InteractiveCommand::Quit,
        "last" => InteractiveCommand::Last,
        "list" | "ls" => InteractiveCommand::List,
        "show" => InteractiveCommand::Show(words.next().map(str::to_string)),
        "g" => InteractiveCommand::Activate {
            key: words
                .next()
                .ok_or(ArgsError::MissingArgument("KEY"))?
                .to_string(),
            global: true,
        },
        "switch" => {
            let mut create = false;
            let mut name = None;
            for word in words.by_ref() {
                match word {
                    "--create" => create = true,
                    _ if name.is_none() => name = Some(word.to_string()),
                    _ => return Err(ArgsError::UnexpectedArgument(word.to_string())),
                }
            }
            InteractiveCommand::Switch {
                name: name.ok_or(ArgsError::MissingArgument("NAME"))?,
                create,
            }
        }
        "send" => {
            // The text is taken verbatim, spacing included.
            let rest = line.trim_start().strip_prefix("send").unwrap_or_default();
            let rest = rest.trim_start();
            let (name, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            if name.is_empty() {
                return Err(ArgsError::MissingArgument("NAME"));
            }
            return Ok(Some(InteractiveCommand::Send {
                name: name.to_string(),
                text: text.to_string(),
            }));
        }
        key => InteractiveCommand::Activate {
            key: key.to_string(),
            global: false,
        },
    };

    match words.next() {
        Some(extra) => Err(ArgsError::UnexpectedArgument(extra.to_string())),
        None => Ok(Some(command)),
    }
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"keyshell {version}
Per-project palettes of persistent shell sessions bound to short keys

USAGE:
    keyshell [OPTIONS] <COMMAND>

COMMANDS:
    activate [-g|--global] [-p|--project <P>] [--root <DIR>] <KEY>
                            Focus the session for KEY, creating it if needed
    last                    Return to the last-focused session
    switch [--create] <NAME>
                            Focus a session by name (KEY.SHELL.PROJECT)
    send <NAME> <TEXT>...   Type a line into a session
    list                    List live sessions
    bindings [--prefix <K>] Print tmux key bindings for the configured keys
    interactive             Read key events from stdin

OPTIONS:
    -c, --config <FILE>         Path to configuration file (JSON)
    -b, --backend <NAME>        Session backend: tmux or pty [default: tmux]
    -r, --session-root <DIR>    Root of the session directories
    -l, --log-level <LVL>       Log level (error, warn, info, debug, trace)
    -h, --help                  Print help
    -V, --version               Print version

ENVIRONMENT VARIABLES:
    KEYSHELL_SESSION_ROOT   Session directory root (overrides config)
    KEYSHELL_BACKEND        Session backend (overrides config)
    KEYSHELL_LOG_LEVEL      Log level (overrides config)
    KEYSHELL_SHELL          Shell binary for new sessions
    RUST_LOG                Alternative log level setting

EXAMPLES:
    # Open (or return to) shell 1 of the project in the current directory
    keyshell activate 1

    # Global scratch shell
    keyshell activate --global 1

    # Install the tmux bindings
    keyshell bindings > ~/.config/keyshell/tmux.conf
    tmux source-file ~/.config/keyshell/tmux.conf
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("keyshell {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
    /// Required positional argument is missing.
    MissingArgument(&'static str),
    /// Unknown subcommand.
    UnknownCommand(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
            Self::MissingArgument(name) => write!(f, "missing argument: <{}>", name),
            Self::UnknownCommand(name) => write!(f, "unknown command: '{}'", name),
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
