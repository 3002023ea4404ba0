//! Session identity, on-disk directories, and the live-session registry.

mod directory;
mod name;
mod registry;

pub use directory::{ensure_directory, session_dir_path};
pub use name::{sanitize_key, SessionName, SEPARATOR_TOKEN};
pub use registry::{ProjectTag, Registry, Session, SessionOrigin};
