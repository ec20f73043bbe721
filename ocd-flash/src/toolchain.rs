use std::fmt;

/// Prefix of the GNU cross toolchain for bare-metal ARM.
pub const CROSS_PREFIX: &str = "arm-none-eabi-";

/// Prefix put in front of binutils names, e.g. `arm-none-eabi-` for `arm-none-eabi-objcopy`.
///
/// Resolved once at startup and handed to whoever builds tool invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainPrefix(String);

impl ToolchainPrefix {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    /// The native toolchain, used on hosts that already are ARM.
    pub fn native() -> Self {
        Self(String::new())
    }

    pub fn cross() -> Self {
        Self(CROSS_PREFIX.to_owned())
    }

    /// Picks the prefix for a host reporting `arch` as its architecture.
    ///
    /// 32-bit ARM hosts (`arm`, `armv7l`, ...) can run the native binutils, everything
    /// else needs the cross toolchain.
    pub fn for_host_arch(arch: &str) -> Self {
        if arch.starts_with("arm") {
            Self::native()
        } else {
            Self::cross()
        }
    }

    /// Uses `configured` when set, otherwise detects the prefix for the architecture
    /// this binary was built for.
    pub fn resolve(configured: Option<&str>) -> Self {
        match configured {
            Some(prefix) => Self::new(prefix),
            None => Self::for_host_arch(std::env::consts::ARCH),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full name of `tool` in this toolchain.
    pub fn tool(&self, tool: &str) -> String {
        format!("{}{tool}", self.0)
    }
}

impl fmt::Display for ToolchainPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("arm", ""; "arm")]
    #[test_case("armv7l", ""; "armv7l")]
    #[test_case("x86_64", "arm-none-eabi-"; "x86_64")]
    #[test_case("aarch64", "arm-none-eabi-"; "aarch64")]
    #[test_case("riscv64", "arm-none-eabi-"; "riscv64")]
    fn host_detection(arch: &str, expected: &str) {
        assert_eq!(ToolchainPrefix::for_host_arch(arch).as_str(), expected);
    }

    #[test]
    fn configured_prefix_wins() {
        assert_eq!(ToolchainPrefix::resolve(Some("")).tool("objcopy"), "objcopy");
        assert_eq!(
            ToolchainPrefix::resolve(Some("llvm-")).tool("objcopy"),
            "llvm-objcopy"
        );
    }

    #[test]
    fn unconfigured_prefix_follows_build_arch() {
        assert_eq!(
            ToolchainPrefix::resolve(None),
            ToolchainPrefix::for_host_arch(std::env::consts::ARCH)
        );
    }
}
