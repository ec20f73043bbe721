use std::process::{ExitStatus, Stdio};

use crate::invocation::Invocation;

/// How an external tool finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Success,
    Failed { code: i32 },
}

impl ToolStatus {
    pub fn is_success(self) -> bool {
        matches!(self, ToolStatus::Success)
    }
}

impl From<ExitStatus> for ToolStatus {
    fn from(status: ExitStatus) -> Self {
        if status.success() {
            ToolStatus::Success
        } else {
            ToolStatus::Failed {
                code: failure_code(status),
            }
        }
    }
}

#[cfg(unix)]
fn failure_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.code().or_else(|| status.signal()).unwrap_or(1)
}

#[cfg(not(unix))]
fn failure_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

/// Runs external tools to completion.
pub trait ToolRunner {
    /// Runs `invocation` and blocks until it exits.
    ///
    /// An `Err` means the tool could not be started at all.
    fn run(&mut self, invocation: &Invocation) -> std::io::Result<ToolStatus>;
}

impl<R: ToolRunner + ?Sized> ToolRunner for &mut R {
    fn run(&mut self, invocation: &Invocation) -> std::io::Result<ToolStatus> {
        (**self).run(invocation)
    }
}

/// Spawns real child processes that share this process' terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&mut self, invocation: &Invocation) -> std::io::Result<ToolStatus> {
        tracing::debug!("Running {}", invocation);

        let status = invocation
            .to_command()
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;

        tracing::debug!("{} exited with {}", invocation.program_name(), status);

        Ok(status.into())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::invocation::Stage;

    #[test]
    fn exit_codes_are_kept() {
        let ok = Invocation::new(Stage::Convert, "sh").arg("-c").arg("exit 0");
        assert_eq!(SystemRunner.run(&ok).unwrap(), ToolStatus::Success);

        let failed = Invocation::new(Stage::Convert, "sh").arg("-c").arg("exit 42");
        assert_eq!(
            SystemRunner.run(&failed).unwrap(),
            ToolStatus::Failed { code: 42 }
        );
    }

    #[test]
    fn killed_child_reports_signal() {
        let killed = Invocation::new(Stage::Program, "sh")
            .arg("-c")
            .arg("kill -9 $$");
        assert_eq!(
            SystemRunner.run(&killed).unwrap(),
            ToolStatus::Failed { code: 9 }
        );
    }

    #[test]
    fn missing_program_is_an_error() {
        let missing = Invocation::new(Stage::Convert, "ocd-flash-no-such-tool");
        let error = SystemRunner.run(&missing).unwrap_err();
        assert_eq!(error.kind(), std::io::ErrorKind::NotFound);
    }
}
