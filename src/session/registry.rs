//! The live-session registry.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use tracing::debug;

use super::SessionName;
use crate::backend::SessionBackend;
use crate::Result;

/// How a session came to be tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    /// Created by this process.
    Created,
    /// Found running through [`SessionBackend::discover`].
    Discovered,
}

/// A tracked session.
#[derive(Debug, Clone)]
pub struct Session<H> {
    /// Canonical name; unique among live sessions.
    pub name: SessionName,
    /// Backend handle.
    pub handle: H,
    pub origin: SessionOrigin,
    /// Time the session started being tracked.
    pub tracked_at: Instant,
}

impl<H> Session<H> {
    pub fn new(name: SessionName, handle: H) -> Self {
        Self {
            name,
            handle,
            origin: SessionOrigin::Created,
            tracked_at: Instant::now(),
        }
    }

    pub fn discovered(name: SessionName, handle: H) -> Self {
        Self {
            origin: SessionOrigin::Discovered,
            ..Self::new(name, handle)
        }
    }
}

/// Project a session belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectTag {
    pub project: String,
    pub root: PathBuf,
}

impl ProjectTag {
    pub fn new(project: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            project: project.into(),
            root: root.into(),
        }
    }
}

impl fmt::Display for ProjectTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.project, self.root.display())
    }
}

/// Set of live sessions plus the last-focused pointer.
///
/// Liveness is polled through the backend. Dead sessions are dropped the
/// next time the live set is listed, after which their names are free.
#[derive(Debug)]
pub struct Registry<H> {
    sessions: Vec<Session<H>>,
    last_focused: Option<SessionName>,
    projects: HashMap<SessionName, ProjectTag>,
}

impl<H> Registry<H>
where
    H: Clone + PartialEq + fmt::Debug,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: Vec::new(),
            last_focused: None,
            projects: HashMap::new(),
        }
    }

    /// Live sessions in registration order. Prunes dead ones.
    pub fn list_live<B>(&mut self, backend: &mut B) -> Vec<Session<H>>
    where
        B: SessionBackend<Handle = H>,
    {
        let before = self.sessions.len();
        self.sessions.retain(|s| backend.is_live(&s.handle));

        if self.sessions.len() != before {
            debug!(pruned = before - self.sessions.len(), "dropped dead sessions");
            let sessions = &self.sessions;
            self.projects
                .retain(|name, _| sessions.iter().any(|s| &s.name == name));
        }

        self.sessions.clone()
    }

    /// Live session with the given name.
    pub fn find_by_name<B>(&mut self, backend: &mut B, name: &SessionName) -> Option<Session<H>>
    where
        B: SessionBackend<Handle = H>,
    {
        self.list_live(backend).into_iter().find(|s| &s.name == name)
    }

    /// Start tracking a session.
    ///
    /// A stale entry under the same name (one whose death has not been
    /// observed yet) is replaced.
    pub fn register(&mut self, session: Session<H>) {
        self.sessions.retain(|s| s.name != session.name);
        debug!(session = %session.name, handle = ?session.handle, "registered");
        self.sessions.push(session);
    }

    /// Bring `session` to the front.
    ///
    /// The session becomes the last-focused one only when the focus change
    /// starts from another tracked live session.
    pub fn focus<B>(&mut self, backend: &mut B, session: &Session<H>) -> Result<()>
    where
        B: SessionBackend<Handle = H>,
    {
        let prior_tracked = match backend.current_handle() {
            Some(current) => self
                .list_live(backend)
                .iter()
                .any(|s| s.handle == current),
            None => false,
        };

        backend.focus_handle(&session.handle)?;

        if prior_tracked {
            self.last_focused = Some(session.name.clone());
        }
        Ok(())
    }

    /// The last-focused session if still live, else the first live one.
    pub fn last_focused<B>(&mut self, backend: &mut B) -> Option<Session<H>>
    where
        B: SessionBackend<Handle = H>,
    {
        let live = self.list_live(backend);
        let remembered = self
            .last_focused
            .as_ref()
            .and_then(|name| live.iter().find(|s| &s.name == name));

        remembered.or_else(|| live.first()).cloned()
    }

    /// Name recorded as last focused, whether or not it is still live.
    pub fn last_focused_name(&self) -> Option<&SessionName> {
        self.last_focused.as_ref()
    }

    /// Tracked session by name, without polling liveness.
    pub fn get(&self, name: &SessionName) -> Option<&Session<H>> {
        self.sessions.iter().find(|s| &s.name == name)
    }

    /// Name of the tracked session owning `handle`.
    pub fn name_of(&self, handle: &H) -> Option<&SessionName> {
        self.sessions
            .iter()
            .find(|s| &s.handle == handle)
            .map(|s| &s.name)
    }

    /// Remember which project a session belongs to.
    pub fn tag_project(&mut self, name: &SessionName, tag: ProjectTag) {
        self.projects.insert(name.clone(), tag);
    }

    /// Project a session was tagged with.
    pub fn project_of(&self, name: &SessionName) -> Option<&ProjectTag> {
        self.projects.get(name)
    }

    /// Number of tracked sessions, dead or alive.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl<H> Default for Registry<H>
where
    H: Clone + PartialEq + fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}
