//! Argument lists for the two external tools.
//!
//! Every command is built as a program plus a list of arguments and never
//! passes through a shell, so paths are handed over exactly as given.

use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::Path;
use std::process::Command;

/// The two steps of the flashing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// ELF to flat binary through objcopy.
    Convert,
    /// Flat binary to target flash through OpenOCD.
    Program,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Convert => f.write_str("conversion"),
            Stage::Program => f.write_str("programming"),
        }
    }
}

/// A single external tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub stage: Stage,
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl Invocation {
    pub fn new(stage: Stage, program: impl Into<OsString>) -> Self {
        Self {
            stage,
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// The program name as it should appear in messages.
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {:?}", arg)?;
        }
        Ok(())
    }
}

/// Name of the intermediate image, which encodes the flash base address.
pub fn image_file_name(base_address: u32) -> String {
    format!("out.{base_address:08x}.bin")
}

/// `<objcopy> -Obinary <artifact> <image>`
pub fn convert(objcopy: &str, artifact: &Path, image: &Path) -> Invocation {
    Invocation::new(Stage::Convert, objcopy)
        .arg("-Obinary")
        .arg(artifact)
        .arg(image)
}

/// The OpenOCD executable together with the adapter and chip configuration it is started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Programmer {
    pub program: String,
    pub interface: String,
    pub target: String,
}

impl Programmer {
    /// Writes `image` at `base_address`, verifies it, resets the target and leaves
    /// it running from `base_address`.
    pub fn program(&self, image: &Path, base_address: u32) -> Invocation {
        Invocation::new(Stage::Program, &self.program)
            .arg("-f")
            .arg(&self.interface)
            .arg("-f")
            .arg(&self.target)
            .arg("-c")
            .arg("init")
            .arg("-c")
            .arg(program_script(image, base_address))
    }
}

/// The OpenOCD command sequence run after `init`.
///
/// `reset_config none separate` leaves SRST alone, since the ST-Link resets the
/// core over SWD.
pub fn program_script(image: &Path, base_address: u32) -> String {
    let image = image.to_string_lossy();
    format!(
        "reset_config none separate; program {} verify {base_address:#x} reset exit {base_address:#010x}",
        tcl_word(&image)
    )
}

fn is_tcl_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "/._-+:~,=@%".contains(c)
}

/// Quotes `word` so the Tcl interpreter inside OpenOCD reads it back unchanged.
fn tcl_word(word: &str) -> Cow<'_, str> {
    if !word.is_empty() && word.chars().all(is_tcl_safe) {
        return Cow::Borrowed(word);
    }

    // Braces suppress every substitution, but only work if the word has no
    // braces of its own and does not end in a backslash.
    if !word.contains(['{', '}']) && !word.ends_with('\\') {
        return Cow::Owned(format!("{{{word}}}"));
    }

    let mut escaped = String::with_capacity(word.len() * 2);
    for c in word.chars() {
        if !is_tcl_safe(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use test_case::test_case;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn image_name_encodes_base_address() {
        assert_eq!(image_file_name(0x0800_0000), "out.08000000.bin");
        assert_eq!(image_file_name(0x1000), "out.00001000.bin");
    }

    #[test]
    fn convert_arguments() {
        let invocation = convert(
            "arm-none-eabi-objcopy",
            Path::new("bazel-out/fw.elf"),
            Path::new("/tmp/ws/out.08000000.bin"),
        );

        assert_eq!(invocation.stage, Stage::Convert);
        assert_eq!(invocation.program, OsString::from("arm-none-eabi-objcopy"));
        assert_eq!(
            invocation.args,
            os(&["-Obinary", "bazel-out/fw.elf", "/tmp/ws/out.08000000.bin"])
        );
    }

    #[test]
    fn artifact_path_is_a_single_argument() {
        let invocation = convert(
            "objcopy",
            Path::new("my fw; rm -rf x.elf"),
            Path::new("/tmp/out.bin"),
        );

        assert_eq!(invocation.args[1], OsString::from("my fw; rm -rf x.elf"));
        assert_eq!(invocation.args.len(), 3);
    }

    #[test]
    fn program_arguments() {
        let programmer = Programmer {
            program: "openocd".into(),
            interface: "interface/stlink.cfg".into(),
            target: "target/stm32g4x.cfg".into(),
        };

        let invocation = programmer.program(Path::new("/tmp/ws/out.08000000.bin"), 0x0800_0000);

        assert_eq!(invocation.stage, Stage::Program);
        assert_eq!(
            invocation.args,
            os(&[
                "-f",
                "interface/stlink.cfg",
                "-f",
                "target/stm32g4x.cfg",
                "-c",
                "init",
                "-c",
                "reset_config none separate; program /tmp/ws/out.08000000.bin verify 0x8000000 reset exit 0x08000000",
            ])
        );
    }

    #[test_case("/tmp/ws/out.bin", "/tmp/ws/out.bin"; "plain path")]
    #[test_case("/tmp/my ws/out.bin", "{/tmp/my ws/out.bin}"; "whitespace")]
    #[test_case(r"C:\Temp\out.bin", r"{C:\Temp\out.bin}"; "windows separators")]
    #[test_case("/tmp/a{b/out.bin", r"/tmp/a\{b/out.bin"; "brace")]
    #[test_case("/tmp/$x/out.bin", "{/tmp/$x/out.bin}"; "dollar")]
    fn image_path_quoting(path: &str, expected: &str) {
        let script = program_script(&PathBuf::from(path), 0x0800_0000);
        assert_eq!(
            script,
            format!(
                "reset_config none separate; program {expected} verify 0x8000000 reset exit 0x08000000"
            )
        );
    }

    #[test]
    fn display_shows_quoted_arguments() {
        let invocation = convert("objcopy", Path::new("a.elf"), Path::new("b.bin"));
        assert_eq!(
            invocation.to_string(),
            r#"objcopy "-Obinary" "a.elf" "b.bin""#
        );
    }
}
