//! keyshell binary entry point.

use std::io::BufRead;
use std::process::ExitCode;

use keyshell::backend::{PtyBackend, SessionBackend, TmuxBackend};
use keyshell::bindings::{KeyTable, Scope, TmuxBindings};
use keyshell::cli::{self, CliCommand, InteractiveCommand};
use keyshell::config::{BackendKind, Config};
use keyshell::engine::{Activation, ActivationEngine, Lookup};
use keyshell::logging;
use keyshell::project::{MarkerProvider, GLOBAL_PROJECT};
use tracing::debug;

type Engine<B> = ActivationEngine<B, MarkerProvider>;

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("keyshell: {}", e);
            eprintln!("Try 'keyshell --help' for more information.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }

    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("keyshell: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(config.log_filter());
    debug!(backend = %config.backend, root = %config.sessions.root.display(), "configuration loaded");

    let Some(command) = args.command else {
        cli::print_help();
        return ExitCode::from(2);
    };

    let result = match config.backend {
        BackendKind::Tmux => run(TmuxBackend::new(), &config, command),
        BackendKind::Pty => run(PtyBackend::new(), &config, command),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("keyshell: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run<B: SessionBackend>(
    backend: B,
    config: &Config,
    command: CliCommand,
) -> keyshell::Result<()> {
    let mut engine = ActivationEngine::new(
        backend,
        MarkerProvider::new(),
        config.project_config(),
        config.engine_settings(),
    );

    if let CliCommand::Bindings { prefix } = &command {
        let mut bindings = TmuxBindings::new(program_path(), prefix);
        engine.setup(
            &mut bindings,
            &config.keys.keys,
            &config.keys.term_keys,
            config.project_config(),
        )?;
        print!("{}", bindings.render());
        return Ok(());
    }

    engine.rediscover()?;

    match command {
        CliCommand::Activate {
            key,
            global,
            project,
            root,
        } => {
            let project = if global {
                Some(GLOBAL_PROJECT)
            } else {
                project.as_deref()
            };
            let activation = engine.activate_for_key(&key, project, root.as_deref())?;
            debug!(session = %activation.name, outcome = %activation.outcome, "activated");
        }
        CliCommand::Last => report(engine.switch_to_last()?),
        CliCommand::Switch { name, create } => report(engine.switch_to_name(&name, create)?),
        CliCommand::Send { name, text } => engine.send_line(&name, &text)?,
        CliCommand::List => list(&mut engine),
        CliCommand::Interactive => interactive(&mut engine, config)?,
        CliCommand::Bindings { .. } => {}
    }

    Ok(())
}

/// Lookup misses are not failures: tell the user and move on.
fn report(lookup: Lookup) {
    match lookup {
        Lookup::Focused(name) => debug!(session = %name, "focused"),
        Lookup::Miss(miss) => eprintln!("{}", miss),
    }
}

fn announce(activation: &Activation) {
    match &activation.session_dir {
        Some(dir) => println!("{} {} ({})", activation.outcome, activation.name, dir.display()),
        None => println!("{} {}", activation.outcome, activation.name),
    }
}

fn list<B: SessionBackend>(engine: &mut Engine<B>) {
    for session in engine.sessions() {
        let marker = if session.last_focused { "*" } else { " " };
        let project = session
            .project
            .map(|tag| tag.to_string())
            .unwrap_or_else(|| session.name.project().to_string());
        println!("{} {}\t{}\t{}", marker, session.name, project, session.handle);
    }
}

fn interactive<B: SessionBackend>(
    engine: &mut Engine<B>,
    config: &Config,
) -> keyshell::Result<()> {
    let mut table = KeyTable::new();
    engine.setup(
        &mut table,
        &config.keys.keys,
        &config.keys.term_keys,
        config.project_config(),
    )?;

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let command = match cli::parse_interactive_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("keyshell: {}", e);
                continue;
            }
        };

        let outcome = match command {
            InteractiveCommand::Quit => break,
            InteractiveCommand::Activate { key, global } => {
                let scope = if global { Scope::Global } else { Scope::Project };
                match table.dispatch(&key, scope).cloned() {
                    Some(binding) => engine.activate_binding(&binding).map(|a| announce(&a)),
                    None => {
                        eprintln!("key not bound: {}", key);
                        Ok(())
                    }
                }
            }
            InteractiveCommand::Last => engine.switch_to_last().map(report),
            InteractiveCommand::Switch { name, create } => {
                engine.switch_to_name(&name, create).map(report)
            }
            InteractiveCommand::Send { name, text } => engine.send_line(&name, &text),
            InteractiveCommand::List => {
                list(engine);
                Ok(())
            }
            InteractiveCommand::Show(name) => {
                engine.screen_text(name.as_deref()).map(|text| match text {
                    Some(text) => print!("{}", text),
                    None => eprintln!("no screen to show"),
                })
            }
        };

        if let Err(e) = outcome {
            eprintln!("keyshell: {}", e);
        }
    }

    Ok(())
}

/// Path used by generated bindings to call back into this binary.
fn program_path() -> String {
    std::env::current_exe()
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "keyshell".to_string())
}
