//! The activation engine.
//!
//! Turns "key K was pressed (in project P)" into a focused session: either
//! an existing live one with the same canonical name, or a freshly created
//! one with its own session directory and history file.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::backend::{LineSink, SessionBackend, SessionRequest};
use crate::bindings::{bind_keys, BindingTarget, KeyBinding};
use crate::error::KeyshellError;
use crate::history::with_history_file;
use crate::project::{ProjectProvider, GLOBAL_PROJECT};
use crate::quote::{reexec_command_line, resolve_shell_binary};
use crate::session::{
    ensure_directory, sanitize_key, ProjectTag, Registry, Session, SessionName, SessionOrigin,
};
use crate::shellspec::{InitContext, ProjectConfig, ShellKind, ShellSpec};
use crate::Result;

/// Settings the engine needs beyond the per-project shell specs.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Root under which session directories are created.
    pub session_root: PathBuf,
    /// History file name inside each session directory.
    pub history_file: String,
    /// Environment variable through which shells learn their history file.
    pub history_env: String,
    /// Shell name used in canonical names when none is configured.
    pub default_shell_name: String,
    /// Explicit shell binary; wins over everything else.
    pub shell_binary: Option<String>,
    /// Environment variable consulted for the shell binary.
    pub shell_binary_env: String,
    /// Extra arguments for the re-exec line of terminal sessions.
    pub shell_args: Vec<String>,
    /// Keys whose sessions default to terminals.
    pub term_keys: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            session_root: crate::config::default_session_root(),
            history_file: "history".to_string(),
            history_env: "HISTFILE".to_string(),
            default_shell_name: "shell".to_string(),
            shell_binary: None,
            shell_binary_env: "KEYSHELL_SHELL".to_string(),
            shell_args: Vec::new(),
            term_keys: Vec::new(),
        }
    }
}

/// Whether an activation reused or created its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    Switched,
    Created,
}

impl fmt::Display for ActivationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Switched => write!(f, "switched"),
            Self::Created => write!(f, "created"),
        }
    }
}

/// Result of a successful activation.
#[derive(Debug, Clone)]
pub struct Activation {
    pub name: SessionName,
    pub outcome: ActivationOutcome,
    pub project: ProjectTag,
    /// Session directory, set only when the session was created.
    pub session_dir: Option<PathBuf>,
}

/// Why a lookup found nothing to focus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupMiss {
    NoSessions,
    NoSuchSession(String),
}

impl fmt::Display for LookupMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSessions => write!(f, "no sessions available"),
            Self::NoSuchSession(name) => write!(f, "no such session: {}", name),
        }
    }
}

/// Result of a focus-by-lookup operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Focused(SessionName),
    Miss(LookupMiss),
}

/// One row of [`ActivationEngine::sessions`].
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub name: SessionName,
    pub handle: String,
    pub origin: SessionOrigin,
    pub project: Option<ProjectTag>,
    pub last_focused: bool,
}

/// Resolves activations against a registry of live sessions.
///
/// All operations take `&mut self`: activations are serialized, which the
/// scoped history variable relies on.
pub struct ActivationEngine<B: SessionBackend, P: ProjectProvider> {
    backend: B,
    provider: P,
    registry: Registry<B::Handle>,
    projects: ProjectConfig,
    settings: EngineSettings,
    current_project: Option<ProjectTag>,
}

impl<B: SessionBackend, P: ProjectProvider> ActivationEngine<B, P> {
    pub fn new(backend: B, provider: P, projects: ProjectConfig, settings: EngineSettings) -> Self {
        Self {
            backend,
            provider,
            registry: Registry::new(),
            projects,
            settings,
            current_project: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn registry(&self) -> &Registry<B::Handle> {
        &self.registry
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Project of the most recent activation or switch.
    pub fn current_project(&self) -> Option<&ProjectTag> {
        self.current_project.as_ref()
    }

    /// Replace the per-project configuration wholesale.
    pub fn set_projects(&mut self, projects: ProjectConfig) {
        self.projects = projects;
    }

    /// Install `projects`, record `term_keys`, and bind every key on
    /// `target` in both project and global scope.
    ///
    /// Terminal keys that are not in `keys` are ignored.
    pub fn setup<T>(
        &mut self,
        target: &mut T,
        keys: &[String],
        term_keys: &[String],
        projects: ProjectConfig,
    ) -> Result<usize>
    where
        T: BindingTarget + ?Sized,
    {
        self.projects = projects;
        self.settings.term_keys = term_keys
            .iter()
            .filter(|key| {
                let bound = keys.contains(*key);
                if !bound {
                    warn!(key = %key, "terminal key is not bound, ignoring");
                }
                bound
            })
            .cloned()
            .collect();

        bind_keys(target, keys)
    }

    /// Activate whatever `binding` stands for.
    pub fn activate_binding(&mut self, binding: &KeyBinding) -> Result<Activation> {
        self.activate_for_key(&binding.key, binding.project(), None)
    }

    /// Activate `key` among the global sessions.
    pub fn activate_global(&mut self, key: &str) -> Result<Activation> {
        self.activate_for_key(key, Some(GLOBAL_PROJECT), None)
    }

    /// Focus the session for (key, project), creating it if needed.
    ///
    /// Without `project`, the project of the focused session is used, then
    /// the provider's. The global project is always rooted at the home
    /// directory, whatever `root_override` says.
    pub fn activate_for_key(
        &mut self,
        key: &str,
        project: Option<&str>,
        root_override: Option<&Path>,
    ) -> Result<Activation> {
        let key = sanitize_key(key);
        let tag = self.resolve_project(project, root_override)?;
        let spec = self.projects.resolve(
            &tag.project,
            &key,
            &self.settings.default_shell_name,
            &tag.root,
            &self.settings.term_keys,
        );
        let name = SessionName::new(&key, spec.name.clone(), tag.project.clone());

        if let Some(session) = self.registry.find_by_name(&mut self.backend, &name) {
            debug!(session = %name, "switching to live session");
            self.registry.focus(&mut self.backend, &session)?;
            self.registry.tag_project(&name, tag.clone());
            self.current_project = Some(tag.clone());
            return Ok(Activation {
                name,
                outcome: ActivationOutcome::Switched,
                project: tag,
                session_dir: None,
            });
        }

        let session_dir = self.create(&name, &key, &spec, &tag)?;
        Ok(Activation {
            name,
            outcome: ActivationOutcome::Created,
            project: tag,
            session_dir: Some(session_dir),
        })
    }

    /// Focus the last-focused session, or the first live one.
    pub fn switch_to_last(&mut self) -> Result<Lookup> {
        match self.registry.last_focused(&mut self.backend) {
            Some(session) => {
                self.registry.focus(&mut self.backend, &session)?;
                self.note_project(&session.name);
                Ok(Lookup::Focused(session.name))
            }
            None => {
                info!("no sessions available");
                Ok(Lookup::Miss(LookupMiss::NoSessions))
            }
        }
    }

    /// Focus a session by canonical name.
    ///
    /// With `create`, a missing session is activated from the key and
    /// project encoded in `name`; its shell name then comes from the
    /// configuration.
    pub fn switch_to_name(&mut self, name: &str, create: bool) -> Result<Lookup> {
        let found = match name.parse::<SessionName>() {
            Ok(parsed) => self.registry.find_by_name(&mut self.backend, &parsed),
            Err(_) => None,
        };

        if let Some(session) = found {
            self.registry.focus(&mut self.backend, &session)?;
            self.note_project(&session.name);
            return Ok(Lookup::Focused(session.name));
        }

        if !create {
            info!(session = %name, "no such session");
            return Ok(Lookup::Miss(LookupMiss::NoSuchSession(name.to_string())));
        }

        let parsed: SessionName = name.parse()?;
        let activation = self.activate_for_key(parsed.key(), Some(parsed.project()), None)?;
        Ok(Lookup::Focused(activation.name))
    }

    /// Type `text` and a newline into a tracked session.
    pub fn send_line(&mut self, name: &str, text: &str) -> Result<()> {
        let parsed: SessionName = name.parse()?;
        let handle = self
            .registry
            .get(&parsed)
            .map(|s| s.handle.clone())
            .ok_or_else(|| KeyshellError::SessionNotFound(name.to_string()))?;

        self.backend.send_line(&handle, text).map_err(|e| match e {
            KeyshellError::DeadSession(_) => KeyshellError::DeadSession(name.to_string()),
            other => other,
        })
    }

    /// Screen contents of the named session, or of the one in view.
    pub fn screen_text(&mut self, name: Option<&str>) -> Result<Option<String>> {
        let handle = match name {
            Some(name) => {
                let parsed: SessionName = name.parse()?;
                self.registry
                    .get(&parsed)
                    .map(|s| s.handle.clone())
                    .ok_or_else(|| KeyshellError::SessionNotFound(name.to_string()))?
            }
            None => match self.backend.current_handle() {
                Some(handle) => handle,
                None => return Ok(None),
            },
        };
        Ok(self.backend.screen_text(&handle))
    }

    /// Live sessions, in registration order.
    pub fn sessions(&mut self) -> Vec<SessionSummary> {
        let last = self.registry.last_focused_name().cloned();
        self.registry
            .list_live(&mut self.backend)
            .into_iter()
            .map(|s| SessionSummary {
                project: self.registry.project_of(&s.name).cloned(),
                last_focused: last.as_ref() == Some(&s.name),
                handle: format!("{:?}", s.handle),
                origin: s.origin,
                name: s.name,
            })
            .collect()
    }

    /// Adopt sessions the backend reports from an earlier process.
    ///
    /// Returns how many were adopted.
    pub fn rediscover(&mut self) -> Result<usize> {
        let mut adopted = 0;
        for (raw_name, handle) in self.backend.discover()? {
            let name = match raw_name.parse::<SessionName>() {
                Ok(name) => name,
                Err(_) => {
                    debug!(name = %raw_name, "skipping session with foreign name");
                    continue;
                }
            };
            if self.registry.find_by_name(&mut self.backend, &name).is_some() {
                continue;
            }
            self.registry.register(Session::discovered(name, handle));
            adopted += 1;
        }

        if adopted > 0 {
            info!(count = adopted, "rediscovered sessions");
        }
        Ok(adopted)
    }

    fn resolve_project(
        &mut self,
        project: Option<&str>,
        root_override: Option<&Path>,
    ) -> Result<ProjectTag> {
        let context = self.context_project();

        let project = match project {
            Some(project) => project.to_string(),
            None => match &context {
                Some(tag) => tag.project.clone(),
                None => self.provider.project_name(),
            },
        };

        if project == GLOBAL_PROJECT {
            let home = dirs::home_dir().ok_or(KeyshellError::NoHomeDirectory)?;
            return Ok(ProjectTag::new(project, home));
        }

        let root = match (root_override, context) {
            (Some(root), _) => root.to_path_buf(),
            (None, Some(tag)) if tag.project == project => tag.root,
            (None, _) => self.provider.project_root(),
        };

        Ok(ProjectTag::new(project, root))
    }

    /// Project tag of the session currently in view, if it is ours.
    fn context_project(&mut self) -> Option<ProjectTag> {
        let handle = self.backend.current_handle()?;
        let name = self.registry.name_of(&handle)?;
        self.registry.project_of(name).cloned()
    }

    fn note_project(&mut self, name: &SessionName) {
        if let Some(tag) = self.registry.project_of(name) {
            self.current_project = Some(tag.clone());
        }
    }

    fn create(
        &mut self,
        name: &SessionName,
        key: &str,
        spec: &ShellSpec,
        tag: &ProjectTag,
    ) -> Result<PathBuf> {
        let session_dir = ensure_directory(&self.settings.session_root, &tag.project, key)?;
        let history_file = session_dir.join(&self.settings.history_file);

        let shell = resolve_shell_binary(
            self.settings.shell_binary.as_deref(),
            &self.settings.shell_binary_env,
        );
        let reexec = (spec.kind == ShellKind::Terminal)
            .then(|| reexec_command_line(&shell, &self.settings.shell_args));

        let display_name = name.to_string();
        let request = SessionRequest {
            name: &display_name,
            directory: &spec.directory,
            kind: spec.kind,
            shell: &shell,
            history_env: &self.settings.history_env,
        };

        debug!(
            session = %name,
            dir = %spec.directory.display(),
            kind = ?spec.kind,
            "creating session"
        );

        let backend = &mut self.backend;
        let handle = with_history_file(&self.settings.history_env, &history_file, || {
            backend.create_session(&request, &mut |sink: &mut dyn LineSink| {
                if let Some(hook) = &spec.init_hook {
                    hook(&mut InitContext::new(&session_dir, &mut *sink))?;
                }
                if let Some(line) = &reexec {
                    sink.send_text(line)?;
                }
                Ok(())
            })
        })?;

        let session = Session::new(name.clone(), handle);
        self.registry.register(session.clone());
        self.registry.tag_project(name, tag.clone());
        self.current_project = Some(tag.clone());

        if let Err(e) = self.backend.focus_handle(&session.handle) {
            warn!(session = %name, error = %e, "created session could not be shown");
        }

        info!(session = %name, dir = %session_dir.display(), "session created");
        Ok(session_dir)
    }
}
