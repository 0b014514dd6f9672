use std::fmt;

/// Operator answer to an interactive prompt.
///
/// Not every variant is valid at every prompt; callers reject the ones
/// that make no sense where they asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Candidate index, 0-based.
    Pick(usize),
    Skip,
    ManualPath(String),
    MarkInstrumental,
    UseExternal,
    UseLocal,
    /// Stop the whole run.
    Abort,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Pick(_) => "pick",
            Decision::Skip => "skip",
            Decision::ManualPath(_) => "manual_path",
            Decision::MarkInstrumental => "instrumental",
            Decision::UseExternal => "use_external",
            Decision::UseLocal => "use_local",
            Decision::Abort => "abort",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Pick(index) => write!(f, "pick #{}", index + 1),
            Decision::ManualPath(path) => write!(f, "manual path {}", path),
            other => f.write_str(other.as_str()),
        }
    }
}
