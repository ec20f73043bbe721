use std::path::PathBuf;

use crate::invocation::Stage;

/// Exit code used when a tool could not be launched at all.
///
/// Matches what a POSIX shell reports for a command it cannot find.
pub const EXIT_SPAWN_FAILED: i32 = 127;

/// Exit code used when the run was aborted by SIGINT or SIGTERM.
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, thiserror::Error)]
pub enum FlashError {
    #[error("Failed to create a temporary workspace.")]
    Workspace(#[source] std::io::Error),

    #[error("Failed to launch '{program}' for the {stage} step.")]
    Spawn {
        stage: Stage,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' failed to convert '{artifact}' (exit code {code}).")]
    ConversionFailed {
        program: String,
        artifact: PathBuf,
        code: i32,
    },

    #[error("The converted image '{path}' was not created.")]
    MissingImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("The converted image '{path}' is empty.")]
    EmptyImage { path: PathBuf },

    #[error("'{program}' failed to program the target (exit code {code}).")]
    ProgrammingFailed { program: String, code: i32 },

    #[error("Flashing was interrupted.")]
    Interrupted,
}

impl FlashError {
    /// The process exit code this error should terminate the program with.
    ///
    /// Tool failures propagate the code of the failing child process.
    pub fn exit_code(&self) -> i32 {
        match self {
            FlashError::Workspace(_) => 1,
            FlashError::Spawn { .. } => EXIT_SPAWN_FAILED,
            FlashError::ConversionFailed { code, .. } => *code,
            FlashError::MissingImage { .. } | FlashError::EmptyImage { .. } => 1,
            FlashError::ProgrammingFailed { code, .. } => *code,
            FlashError::Interrupted => EXIT_INTERRUPTED,
        }
    }

    /// The pipeline step that failed, if the failure belongs to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            FlashError::Workspace(_) | FlashError::Interrupted => None,
            FlashError::Spawn { stage, .. } => Some(*stage),
            FlashError::ConversionFailed { .. }
            | FlashError::MissingImage { .. }
            | FlashError::EmptyImage { .. } => Some(Stage::Convert),
            FlashError::ProgrammingFailed { .. } => Some(Stage::Program),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failures_propagate_child_code() {
        let error = FlashError::ConversionFailed {
            program: "objcopy".into(),
            artifact: "fw.elf".into(),
            code: 2,
        };
        assert_eq!(error.exit_code(), 2);
        assert_eq!(error.stage(), Some(Stage::Convert));

        let error = FlashError::ProgrammingFailed {
            program: "openocd".into(),
            code: 3,
        };
        assert_eq!(error.exit_code(), 3);
        assert_eq!(error.stage(), Some(Stage::Program));
    }

    #[test]
    fn spawn_failure_looks_like_missing_command() {
        let error = FlashError::Spawn {
            stage: Stage::Program,
            program: "openocd".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(error.exit_code(), EXIT_SPAWN_FAILED);
        assert_eq!(
            error.to_string(),
            "Failed to launch 'openocd' for the programming step."
        );
    }
}
