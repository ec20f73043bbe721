use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::error::FlashError;
use crate::invocation::{self, Invocation, Programmer, Stage};
use crate::runner::{ToolRunner, ToolStatus};
use crate::toolchain::ToolchainPrefix;
use crate::workspace::Workspace;

/// Everything needed to flash one artifact, with all names already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashPlan {
    /// Full name of the objcopy executable, including the toolchain prefix.
    pub objcopy: String,
    pub programmer: Programmer,
    /// Start of the target's internal flash. The image is written and started here.
    pub base_address: u32,
}

impl FlashPlan {
    pub fn new(config: &Config, prefix: &ToolchainPrefix) -> Self {
        Self {
            objcopy: prefix.tool(&config.toolchain.objcopy),
            programmer: Programmer {
                program: config.programmer.openocd.clone(),
                interface: config.programmer.interface.clone(),
                target: config.programmer.target.clone(),
            },
            base_address: config.flashing.base_address,
        }
    }
}

/// Drives the convert-then-program pipeline for a single artifact.
pub struct Orchestrator<R> {
    plan: FlashPlan,
    runner: R,
    interrupted: Option<Arc<AtomicBool>>,
}

impl<R: ToolRunner> Orchestrator<R> {
    pub fn new(plan: FlashPlan, runner: R) -> Self {
        Self {
            plan,
            runner,
            interrupted: None,
        }
    }

    /// Stops the pipeline once `flag` is set: no further tool is started, and a
    /// running tool is waited for before the workspace is removed.
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(flag);
        self
    }

    /// Converts `artifact` to a flat binary and programs it onto the target.
    ///
    /// Conversion and programming run at most once each, strictly in that order, and
    /// programming only starts after a successful conversion. The temporary workspace
    /// is gone when this returns.
    pub fn flash(&mut self, artifact: &Path) -> Result<(), FlashError> {
        Workspace::scoped(|workspace| {
            let image = workspace.file(&invocation::image_file_name(self.plan.base_address));

            self.convert(artifact, &image)?;
            self.program(&image)
        })
    }

    fn convert(&mut self, artifact: &Path, image: &Path) -> Result<(), FlashError> {
        let _span = tracing::info_span!("convert", artifact = %artifact.display()).entered();
        tracing::info!("Converting {} to a flat binary", artifact.display());

        let invocation = invocation::convert(&self.plan.objcopy, artifact, image);
        match self.run(&invocation)? {
            ToolStatus::Success => {}
            ToolStatus::Failed { code } => {
                return Err(FlashError::ConversionFailed {
                    program: invocation.program_name(),
                    artifact: artifact.to_path_buf(),
                    code,
                })
            }
        }

        let metadata = std::fs::metadata(image).map_err(|source| FlashError::MissingImage {
            path: image.to_path_buf(),
            source,
        })?;
        if metadata.len() == 0 {
            return Err(FlashError::EmptyImage {
                path: image.to_path_buf(),
            });
        }

        tracing::debug!("Converted image is {} bytes", metadata.len());

        Ok(())
    }

    fn program(&mut self, image: &Path) -> Result<(), FlashError> {
        let _span = tracing::info_span!("program", image = %image.display()).entered();
        tracing::info!(
            "Programming {} at {:#010x}",
            image.display(),
            self.plan.base_address
        );

        let invocation = self.plan.programmer.program(image, self.plan.base_address);
        match self.run(&invocation)? {
            ToolStatus::Success => Ok(()),
            ToolStatus::Failed { code } => Err(FlashError::ProgrammingFailed {
                program: invocation.program_name(),
                code,
            }),
        }
    }

    /// Runs one tool, unless an interrupt is already pending. An interrupt that arrives
    /// while the tool runs wins over whatever the tool reported, since the tool most
    /// likely died from the same signal.
    fn run(&mut self, invocation: &Invocation) -> Result<ToolStatus, FlashError> {
        self.check_interrupted()?;

        let status = self
            .runner
            .run(invocation)
            .map_err(|source| FlashError::Spawn {
                stage: invocation.stage,
                program: invocation.program_name(),
                source,
            });

        self.check_interrupted()?;
        status
    }

    fn check_interrupted(&self) -> Result<(), FlashError> {
        match &self.interrupted {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(FlashError::Interrupted),
            _ => Ok(()),
        }
    }
}

/// Picks the artifact to flash: the one given on the command line, or the configured default.
pub fn resolve_artifact(given: Option<PathBuf>, config: &Config) -> PathBuf {
    given.unwrap_or_else(|| config.flashing.default_artifact.clone())
}
