// Domain value objects representing core business concepts

use std::fmt;
use std::path::Path;

/// Solution quality reported by the solve service for a processed job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolveStatus {
    /// The algorithm has no information about the solution
    #[default]
    Unknown,
    /// Found feasible solution (may not be optimal)
    Feasible,
    /// Found optimal solution
    Optimal,
    /// Problem has no feasible solution
    Infeasible,
    /// Objective can be improved infinitely
    Unbounded,
    /// Model proved infeasible or unbounded, without telling which
    InfeasibleOrUnbounded,
}

impl SolveStatus {
    pub fn is_feasible(&self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Unknown => write!(f, "Unknown"),
            SolveStatus::Feasible => write!(f, "Feasible"),
            SolveStatus::Optimal => write!(f, "Optimal"),
            SolveStatus::Infeasible => write!(f, "Infeasible"),
            SolveStatus::Unbounded => write!(f, "Unbounded"),
            SolveStatus::InfeasibleOrUnbounded => write!(f, "Infeasible or Unbounded"),
        }
    }
}

/// Lifecycle state of a job on the solve service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStatus {
    #[default]
    Unknown,
    Created,
    NotStarted,
    Running,
    Interrupting,
    Interrupted,
    /// Job ran and failed; the service may attach a failure message
    Failed,
    /// Job ran to completion and its solution can be downloaded
    Processed,
}

impl ExecutionStatus {
    /// Whether the job will not change state anymore
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Processed | ExecutionStatus::Failed | ExecutionStatus::Interrupted
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Unknown => write!(f, "Unknown"),
            ExecutionStatus::Created => write!(f, "Created"),
            ExecutionStatus::NotStarted => write!(f, "Not Started"),
            ExecutionStatus::Running => write!(f, "Running"),
            ExecutionStatus::Interrupting => write!(f, "Interrupting"),
            ExecutionStatus::Interrupted => write!(f, "Interrupted"),
            ExecutionStatus::Failed => write!(f, "Failed"),
            ExecutionStatus::Processed => write!(f, "Processed"),
        }
    }
}

/// External location of a model fragment or data file: a filesystem path,
/// a `file://` URL or an `http(s)://` URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location(String);

impl Location {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Scheme of a URL location, `None` for plain paths
    pub fn scheme(&self) -> Option<&str> {
        self.0.split_once("://").map(|(scheme, _)| scheme)
    }

    /// Path component of the location.
    ///
    /// Plain paths and `file://` URLs are taken verbatim, so `#` and `?` are
    /// part of the file name. Other URLs are parsed and lose their
    /// authority, query and fragment.
    pub fn path(&self) -> String {
        match self.0.split_once("://") {
            None => self.0.clone(),
            Some(("file", rest)) => rest.to_string(),
            Some(_) => reqwest::Url::parse(&self.0)
                .map(|url| url.path().to_string())
                .unwrap_or_default(),
        }
    }

    /// File name without directories and without its last extension.
    ///
    /// `https://host/data/diet.dat?v=2` yields `diet`.
    pub fn stem(&self) -> String {
        Path::new(&self.path())
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Location {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Location {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&Path> for Location {
    fn from(value: &Path) -> Self {
        Self(value.to_string_lossy().into_owned())
    }
}
