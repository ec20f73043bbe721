//! Error rendering for the command line.
use colored::{ColoredString, Colorize};
use std::io::Write;

use ocd_flash::toolchain::CROSS_PREFIX;
use ocd_flash::{FlashError, Stage};

/// The exit code for `error`: the failing tool's own code where there is one.
pub(crate) fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<FlashError>()
        .map(FlashError::exit_code)
        .unwrap_or(1)
}

pub(crate) fn render_diagnostics(error: &anyhow::Error) {
    let hints = error
        .downcast_ref::<FlashError>()
        .map(hints_for)
        .unwrap_or_default();

    let mut stderr = std::io::stderr().lock();

    write_with_offset(&mut stderr, "Error".red().bold(), &format!("{error:#}"));

    let _ = writeln!(stderr);

    for hint in &hints {
        write_with_offset(&mut stderr, "Hint".blue().bold(), hint);
    }

    let _ = stderr.flush();
}

fn hints_for(error: &FlashError) -> Vec<String> {
    match error {
        FlashError::Spawn { stage: Stage::Convert, program, .. } => {
            let mut hints = vec![format!(
                "Make sure '{program}' is installed and can be found on your PATH."
            )];
            if program.starts_with(CROSS_PREFIX) {
                hints.push(
                    "The GNU Arm Embedded toolchain provides it. If the native objcopy supports ARM, set `prefix = \"\"` in the [toolchain] section of .ocd-flash.toml.".into(),
                );
            }
            hints
        }
        FlashError::Spawn { stage: Stage::Program, program, .. } => vec![format!(
            "Make sure '{program}' is installed, or point `programmer.openocd` in .ocd-flash.toml at it."
        )],
        FlashError::ConversionFailed { artifact, .. } => vec![format!(
            "Make sure '{}' exists and is an ELF file. Build the firmware first if it does not.",
            artifact.display()
        )],
        FlashError::MissingImage { .. } | FlashError::EmptyImage { .. } => vec![
            "The artifact has no loadable sections. Check the linker script of the firmware.".into(),
        ],
        FlashError::ProgrammingFailed { .. } => vec![
            "Check that the debug probe is connected and the target is powered. The OpenOCD output above has the details.".into(),
        ],
        FlashError::Workspace(_) | FlashError::Interrupted => vec![],
    }
}

fn write_with_offset(mut output: impl Write, header: ColoredString, msg: &str) {
    let _ = write!(output, "       {} ", header);

    let mut lines = msg.lines();

    if let Some(first_line) = lines.next() {
        let _ = writeln!(output, "{}", first_line);
    }

    for line in lines {
        let _ = writeln!(output, "            {}", line);
    }
}
