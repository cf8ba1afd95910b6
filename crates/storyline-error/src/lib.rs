//! Error types for storyline.
//!
//! Two families:
//! - [`StoryError`]: misuse while a test is running. Surfaces as that test's
//!   failure.
//! - [`RenderError`]: problems while producing reports. Fatal to the
//!   reporting phase only, never to test verdicts.

use std::fmt;
use std::panic::Location;
use std::path::PathBuf;

/// Error category, used for log fields and exit summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Lifecycle,
    Context,
    Render,
    Io,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Lifecycle => write!(f, "lifecycle"),
            ErrorCategory::Context => write!(f, "context"),
            ErrorCategory::Render => write!(f, "render"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Source position of the call that triggered an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl From<&'static Location<'static>> for CallSite {
    fn from(loc: &'static Location<'static>) -> Self {
        Self {
            file: loc.file(),
            line: loc.line(),
            column: loc.column(),
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoryError {
    #[error(
        "story not initialized at {location}: call `story::init(..)` before recording steps or docs"
    )]
    NotInitialized { location: CallSite },

    #[error("story `{title}` is already finalized; no further steps or docs can be recorded")]
    AlreadyFinalized { title: String },

    #[error("no active story in this thread or task")]
    NoActiveStory,

    #[error("run already finalized; story `{title}` arrived too late")]
    RunClosed { title: String },

    #[error("step {index} does not exist in this story")]
    UnknownStep { index: usize },
}

impl StoryError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            StoryError::NotInitialized { .. } | StoryError::NoActiveStory => ErrorCategory::Context,
            StoryError::AlreadyFinalized { .. }
            | StoryError::RunClosed { .. }
            | StoryError::UnknownStep { .. } => ErrorCategory::Lifecycle,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("table `{label}`: row {row} has {found} cells but the header has {expected}")]
    TableShape {
        label: String,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("invalid output rule `{include}`: {reason}")]
    InvalidRule { include: String, reason: String },

    #[error("serialize {path:?}: {reason}")]
    Serialize { path: PathBuf, reason: String },

    #[error("write {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RenderError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RenderError::Io { .. } => ErrorCategory::Io,
            _ => ErrorCategory::Render,
        }
    }
}
