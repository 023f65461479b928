use std::fmt;
use std::io;

pub const SEPARATOR_WIDTH: usize = 80;
pub const SUCCESS_STATUS: &str = "Command completed successfully";
pub const SPAWN_ERROR_STATUS: &str = "Error executing command";

/// Terminal result of one external command. Delivered as data, never raised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Success,
    Failure { exit_code: i32 },
    SpawnError { message: String },
}

impl ExecutionOutcome {
    pub fn from_exit_code(exit_code: i32) -> Self {
        if exit_code == 0 {
            ExecutionOutcome::Success
        } else {
            ExecutionOutcome::Failure { exit_code }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success)
    }

    /// Line appended to the persistent log when the request ends.
    pub fn marker(&self) -> String {
        match self {
            ExecutionOutcome::Success => {
                "\n[SUCCESS] Command completed with exit code: 0\n".to_string()
            }
            ExecutionOutcome::Failure { exit_code } => {
                format!("\n[ERROR] Command failed with exit code: {exit_code}\n")
            }
            ExecutionOutcome::SpawnError { message } => format!("\n[EXCEPTION] {message}\n"),
        }
    }

    pub fn status_text(&self) -> String {
        match self {
            ExecutionOutcome::Success => SUCCESS_STATUS.to_string(),
            ExecutionOutcome::Failure { exit_code } => {
                format!("Command failed with exit code: {exit_code}")
            }
            ExecutionOutcome::SpawnError { .. } => SPAWN_ERROR_STATUS.to_string(),
        }
    }

    /// Failure markers are mirrored into the request's sink; success is not.
    pub fn forwards_to_sink(&self) -> bool {
        !self.is_success()
    }

    /// Process exit status a CLI front end should mirror.
    pub fn exit_status(&self) -> i32 {
        match self {
            ExecutionOutcome::Success => 0,
            ExecutionOutcome::Failure { exit_code } => *exit_code,
            ExecutionOutcome::SpawnError { .. } => 1,
        }
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionOutcome::Success => write!(f, "success"),
            ExecutionOutcome::Failure { exit_code } => write!(f, "failed (exit {exit_code})"),
            ExecutionOutcome::SpawnError { message } => write!(f, "spawn error: {message}"),
        }
    }
}

pub fn separator() -> String {
    format!("{}\n\n", "=".repeat(SEPARATOR_WIDTH))
}

/// Why a request never produced an exit code.
#[derive(Debug)]
pub(crate) enum SpawnFailure {
    EmptyCommand,
    NotFound(String),
    Io(String),
}

impl SpawnFailure {
    pub(crate) fn from_spawn(program: &str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            SpawnFailure::NotFound(program.to_string())
        } else {
            SpawnFailure::Io(err.to_string())
        }
    }
}

impl fmt::Display for SpawnFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnFailure::EmptyCommand => write!(f, "empty command"),
            SpawnFailure::NotFound(program) => write!(f, "executable not found: {program}"),
            SpawnFailure::Io(msg) => write!(f, "{msg}"),
        }
    }
}

pub(crate) fn normalize_exit(status: std::process::ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(code) = status.code() {
            code
        } else if let Some(sig) = status.signal() {
            128 + sig
        } else {
            1
        }
    }
    #[cfg(not(unix))]
    {
        status.code().unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_marker_embeds_exit_code() {
        let outcome = ExecutionOutcome::from_exit_code(42);
        assert_eq!(outcome, ExecutionOutcome::Failure { exit_code: 42 });
        assert!(outcome.marker().contains("42"));
        assert_eq!(outcome.status_text(), "Command failed with exit code: 42");
        assert!(outcome.forwards_to_sink());
        assert_eq!(outcome.exit_status(), 42);
    }

    #[test]
    fn success_is_not_forwarded_to_sink() {
        let outcome = ExecutionOutcome::from_exit_code(0);
        assert!(outcome.is_success());
        assert!(!outcome.forwards_to_sink());
        assert!(outcome.marker().starts_with("\n[SUCCESS]"));
    }

    #[test]
    fn separator_is_fixed_width() {
        let line = separator();
        assert_eq!(line.trim_end().len(), SEPARATOR_WIDTH);
        assert!(line.ends_with("\n\n"));
    }

    #[test]
    fn missing_executable_names_the_program() {
        let err = io::Error::new(io::ErrorKind::NotFound, "No such file");
        let failure = SpawnFailure::from_spawn("apktool", err);
        assert_eq!(failure.to_string(), "executable not found: apktool");
    }
}
