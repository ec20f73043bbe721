use std::path::{Path, PathBuf};

use anyhow::Context;
use figment::{
    providers::{Format, Json, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::logging::LevelFilter;

/// Base name of the configuration files, without extension.
pub const CONFIG_FILE: &str = ".ocd-flash";

/// Built-in defaults, which every configuration file is merged on top of.
const DEFAULT_CONFIG: &str = include_str!("default.toml");

/// Start of the internal flash on STM32 parts.
pub const DEFAULT_BASE_ADDRESS: u32 = 0x0800_0000;

/// Where the firmware build puts the default target.
pub const DEFAULT_ARTIFACT: &str = "bazel-out/stm32g4-opt/bin/fw/power_dist.elf";

/// The layered configuration sources, not yet extracted.
#[derive(Debug, Clone)]
pub struct Configs {
    figment: Figment,
}

/// The main struct holding all the possible config options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub general: General,
    pub toolchain: Toolchain,
    pub programmer: Programmer,
    pub flashing: Flashing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct General {
    pub log_level: Option<LevelFilter>,
    pub log_file: Option<PathBuf>,
}

/// Which binutils are used for the conversion step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Toolchain {
    /// Overrides the host based prefix detection. An empty string selects the native tools.
    pub prefix: Option<String>,
    pub objcopy: String,
}

/// How OpenOCD is started.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Programmer {
    pub openocd: String,
    /// OpenOCD config script selecting the debug probe.
    pub interface: String,
    /// OpenOCD config script selecting the chip family.
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Flashing {
    #[serde(with = "address")]
    pub base_address: u32,
    pub default_artifact: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: General::default(),
            toolchain: Toolchain {
                prefix: None,
                objcopy: "objcopy".to_owned(),
            },
            programmer: Programmer {
                openocd: "openocd".to_owned(),
                interface: "interface/stlink.cfg".to_owned(),
                target: "target/stm32g4x.cfg".to_owned(),
            },
            flashing: Flashing {
                base_address: DEFAULT_BASE_ADDRESS,
                default_artifact: PathBuf::from(DEFAULT_ARTIFACT),
            },
        }
    }
}

/// Addresses may be written as plain integers or as strings like `"0x08000000"`.
mod address {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    pub fn serialize<S>(address: &u32, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{address:#010x}"))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Number(address) => Ok(address),
            Raw::Text(text) => parse_int::parse::<u32>(text.trim()).map_err(|e| {
                D::Error::custom(format!("invalid address '{text}': {e}"))
            }),
        }
    }
}

impl Configs {
    /// Merges the built-in defaults with the config files found in `dirs`.
    ///
    /// Directories later in the list take precedence. In every directory, the
    /// `.toml`, `.json`, `.yaml` and `.yml` variants are read in that order.
    pub fn new<P: AsRef<Path>>(dirs: impl IntoIterator<Item = P>) -> Configs {
        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));

        for dir in dirs {
            let dir = dir.as_ref();
            figment = figment
                .merge(Toml::file(dir.join(format!("{CONFIG_FILE}.toml"))))
                .merge(Json::file(dir.join(format!("{CONFIG_FILE}.json"))))
                .merge(Yaml::file(dir.join(format!("{CONFIG_FILE}.yaml"))))
                .merge(Yaml::file(dir.join(format!("{CONFIG_FILE}.yml"))));
        }

        Configs { figment }
    }

    /// Personal settings from the home directory, overridden by the project's
    /// settings in the working directory.
    pub fn from_default_locations() -> anyhow::Result<Configs> {
        let mut dirs = Vec::new();
        if let Some(home) = directories::UserDirs::new().map(|user| user.home_dir().to_path_buf())
        {
            dirs.push(home);
        }
        dirs.push(std::env::current_dir().context("Unable to determine the working directory.")?);

        Ok(Configs::new(dirs))
    }

    pub fn config(&self) -> anyhow::Result<Config> {
        self.figment
            .extract::<Config>()
            .context("Failed to parse the configuration.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn default_file_matches_default_struct() {
        let config = Configs::new(Vec::<PathBuf>::new()).config().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn project_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            ".ocd-flash.toml",
            r#"
            [toolchain]
            prefix = ""

            [programmer]
            target = "target/stm32f4x.cfg"

            [flashing]
            base_address = 0x08004000
            "#,
        );

        let config = Configs::new([dir.path()]).config().unwrap();

        assert_eq!(config.toolchain.prefix.as_deref(), Some(""));
        assert_eq!(config.toolchain.objcopy, "objcopy");
        assert_eq!(config.programmer.target, "target/stm32f4x.cfg");
        assert_eq!(config.programmer.interface, "interface/stlink.cfg");
        assert_eq!(config.flashing.base_address, 0x0800_4000);
    }

    #[test]
    fn later_directories_take_precedence() {
        let home = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        write(
            home.path(),
            ".ocd-flash.toml",
            "[general]\nlog_level = \"DEBUG\"\n[programmer]\nopenocd = \"/opt/openocd/bin/openocd\"\n",
        );
        write(
            project.path(),
            ".ocd-flash.yaml",
            "programmer:\n  openocd: ./tools/openocd\n",
        );

        let config = Configs::new([home.path(), project.path()]).config().unwrap();

        assert_eq!(config.programmer.openocd, "./tools/openocd");
        assert_eq!(config.general.log_level, Some(LevelFilter::Debug));
    }

    #[test]
    fn hex_string_addresses() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            ".ocd-flash.json",
            r#"{ "flashing": { "base_address": "0x08008000" } }"#,
        );

        let config = Configs::new([dir.path()]).config().unwrap();
        assert_eq!(config.flashing.base_address, 0x0800_8000);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".ocd-flash.toml", "[programmer]\nspeed = 4000\n");

        assert!(Configs::new([dir.path()]).config().is_err());
    }

    #[test]
    fn bad_address_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            ".ocd-flash.toml",
            "[flashing]\nbase_address = \"flash\"\n",
        );

        assert!(Configs::new([dir.path()]).config().is_err());
    }
}
