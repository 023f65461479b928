use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const SETTINGS_FILE: &str = "tool-settings.json";
const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Every configurable path, keyed the way the CLI and env overrides name it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tool {
    Apktool,
    ApkEditor,
    Adb,
    Zipalign,
    Apksigner,
    Aapt,
    Aapt2,
    Java,
    Keytool,
    InjectDoc,
    FrameworkDir,
    WorkingDir,
}

impl Tool {
    pub const ALL: [Tool; 12] = [
        Tool::Apktool,
        Tool::ApkEditor,
        Tool::Adb,
        Tool::Zipalign,
        Tool::Apksigner,
        Tool::Aapt,
        Tool::Aapt2,
        Tool::Java,
        Tool::Keytool,
        Tool::InjectDoc,
        Tool::FrameworkDir,
        Tool::WorkingDir,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Tool::Apktool => "apktool",
            Tool::ApkEditor => "apkeditor",
            Tool::Adb => "adb",
            Tool::Zipalign => "zipalign",
            Tool::Apksigner => "apksigner",
            Tool::Aapt => "aapt",
            Tool::Aapt2 => "aapt2",
            Tool::Java => "java",
            Tool::Keytool => "keytool",
            Tool::InjectDoc => "injectdoc",
            Tool::FrameworkDir => "framework",
            Tool::WorkingDir => "workdir",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim().to_ascii_lowercase();
        Tool::ALL.into_iter().find(|tool| tool.key() == key)
    }

    pub fn env_var(self) -> String {
        format!("APKU_{}_PATH", self.key().to_ascii_uppercase())
    }

    pub fn default_value(self) -> String {
        let os = os_dir_name();
        let exe = std::env::consts::EXE_SUFFIX;
        match self {
            Tool::Apktool => "resources/apktool.jar".into(),
            Tool::ApkEditor => "resources/APKEditor.jar".into(),
            Tool::Adb => format!("resources/bin/{os}/platform-tools/adb{exe}"),
            Tool::Zipalign => format!("resources/bin/{os}/zipalign{exe}"),
            Tool::Apksigner => "resources/apksigner.jar".into(),
            Tool::Aapt => format!("resources/bin/{os}/aapt{exe}"),
            Tool::Aapt2 => format!("resources/bin/{os}/aapt2{exe}"),
            Tool::Java => "java".into(),
            Tool::Keytool => "keytool".into(),
            Tool::InjectDoc => "resources/InjectDocumentProvider.jar".into(),
            Tool::FrameworkDir => home_path(".apktool/framework"),
            Tool::WorkingDir => home_path("apktool-workspace"),
        }
    }

    fn is_dir(self) -> bool {
        matches!(self, Tool::FrameworkDir | Tool::WorkingDir)
    }

    /// Launched by name, so a bare program name is looked up on `PATH`.
    fn is_program(self) -> bool {
        matches!(self, Tool::Java | Tool::Keytool | Tool::Adb)
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

pub fn os_dir_name() -> &'static str {
    if cfg!(windows) {
        "windows"
    } else if cfg!(target_os = "macos") {
        "mac"
    } else {
        "linux"
    }
}

fn home_path(rest: &str) -> String {
    apku_util::home_dir().join(rest).display().to_string()
}

#[derive(Debug)]
pub enum SettingsError {
    UnknownKey(String),
    InvalidValue { key: String, value: String },
    Io(io::Error),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::UnknownKey(key) => write!(f, "unknown setting: {key}"),
            SettingsError::InvalidValue { key, value } => {
                write!(f, "invalid value for {key}: {value}")
            }
            SettingsError::Io(err) => write!(f, "settings io error: {err}"),
        }
    }
}

impl std::error::Error for SettingsError {}

impl From<io::Error> for SettingsError {
    fn from(err: io::Error) -> Self {
        SettingsError::Io(err)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub apktool_path: String,
    pub apkeditor_path: String,
    pub adb_path: String,
    pub zipalign_path: String,
    pub apksigner_path: String,
    pub aapt_path: String,
    pub aapt2_path: String,
    pub java_path: String,
    pub keytool_path: String,
    pub injectdoc_path: String,
    pub framework_dir: String,
    pub working_dir: String,
    pub debounce_ms: u64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            apktool_path: Tool::Apktool.default_value(),
            apkeditor_path: Tool::ApkEditor.default_value(),
            adb_path: Tool::Adb.default_value(),
            zipalign_path: Tool::Zipalign.default_value(),
            apksigner_path: Tool::Apksigner.default_value(),
            aapt_path: Tool::Aapt.default_value(),
            aapt2_path: Tool::Aapt2.default_value(),
            java_path: Tool::Java.default_value(),
            keytool_path: Tool::Keytool.default_value(),
            injectdoc_path: Tool::InjectDoc.default_value(),
            framework_dir: Tool::FrameworkDir.default_value(),
            working_dir: Tool::WorkingDir.default_value(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathCheck {
    pub tool: Tool,
    pub path: String,
    pub ok: bool,
}

pub fn settings_path() -> PathBuf {
    apku_util::state_file_path(SETTINGS_FILE)
}

impl ToolSettings {
    /// Settings file merged under `APKU_*_PATH` overrides. A missing or broken
    /// file leaves the defaults in place.
    pub fn load() -> Self {
        let mut settings = Self::load_from(&settings_path());
        settings.apply_overrides(|name| std::env::var(name).ok());
        settings
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(data) => match serde_json::from_str::<ToolSettings>(&data) {
                Ok(settings) => {
                    debug!("loaded tool settings from {}", path.display());
                    settings
                }
                Err(err) => {
                    warn!("failed to parse {}: {err}", path.display());
                    Self::default()
                }
            },
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!("failed to read {}: {err}", path.display());
                }
                Self::default()
            }
        }
    }

    pub fn save(&self) -> io::Result<()> {
        self.save_to(&settings_path())
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        apku_util::write_json_atomic(path, self)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for tool in Tool::ALL {
            if let Some(value) = lookup(&tool.env_var()) {
                if !value.trim().is_empty() {
                    debug!(%tool, "path overridden from environment");
                    *self.slot_mut(tool) = value;
                }
            }
        }
    }

    fn slot(&self, tool: Tool) -> &String {
        match tool {
            Tool::Apktool => &self.apktool_path,
            Tool::ApkEditor => &self.apkeditor_path,
            Tool::Adb => &self.adb_path,
            Tool::Zipalign => &self.zipalign_path,
            Tool::Apksigner => &self.apksigner_path,
            Tool::Aapt => &self.aapt_path,
            Tool::Aapt2 => &self.aapt2_path,
            Tool::Java => &self.java_path,
            Tool::Keytool => &self.keytool_path,
            Tool::InjectDoc => &self.injectdoc_path,
            Tool::FrameworkDir => &self.framework_dir,
            Tool::WorkingDir => &self.working_dir,
        }
    }

    fn slot_mut(&mut self, tool: Tool) -> &mut String {
        match tool {
            Tool::Apktool => &mut self.apktool_path,
            Tool::ApkEditor => &mut self.apkeditor_path,
            Tool::Adb => &mut self.adb_path,
            Tool::Zipalign => &mut self.zipalign_path,
            Tool::Apksigner => &mut self.apksigner_path,
            Tool::Aapt => &mut self.aapt_path,
            Tool::Aapt2 => &mut self.aapt2_path,
            Tool::Java => &mut self.java_path,
            Tool::Keytool => &mut self.keytool_path,
            Tool::InjectDoc => &mut self.injectdoc_path,
            Tool::FrameworkDir => &mut self.framework_dir,
            Tool::WorkingDir => &mut self.working_dir,
        }
    }

    /// Configured value, or the default when the stored one is blank.
    pub fn path(&self, tool: Tool) -> String {
        let value = self.slot(tool).trim();
        if value.is_empty() {
            tool.default_value()
        } else {
            apku_util::expand_user(value).display().to_string()
        }
    }

    pub fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_ms)
    }

    /// Updates one setting by its CLI key. `debounce_ms` is the only
    /// non-path key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        if key.trim() == "debounce_ms" {
            self.debounce_ms = value.trim().parse().map_err(|_| SettingsError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
            })?;
            return Ok(());
        }
        let tool = Tool::from_key(key).ok_or_else(|| SettingsError::UnknownKey(key.to_string()))?;
        *self.slot_mut(tool) = value.trim().to_string();
        Ok(())
    }

    pub fn entries(&self) -> Vec<(Tool, String)> {
        Tool::ALL
            .into_iter()
            .map(|tool| (tool, self.path(tool)))
            .collect()
    }

    /// Reports which configured paths resolve to something usable.
    pub fn validate(&self) -> Vec<PathCheck> {
        Tool::ALL
            .into_iter()
            .filter(|tool| *tool != Tool::WorkingDir)
            .map(|tool| {
                let path = self.path(tool);
                let ok = if tool.is_dir() {
                    Path::new(&path).is_dir()
                } else if tool.is_program() {
                    program_exists(&path)
                } else {
                    Path::new(&path).exists()
                };
                PathCheck { tool, path, ok }
            })
            .collect()
    }
}

fn program_exists(program: &str) -> bool {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return candidate.is_file();
    }
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| {
        let path = dir.join(program);
        path.is_file() || path.with_extension(std::env::consts::EXE_EXTENSION).is_file()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_follow_resources_layout() {
        let settings = ToolSettings::default();
        assert_eq!(settings.path(Tool::Apktool), "resources/apktool.jar");
        assert_eq!(settings.path(Tool::ApkEditor), "resources/APKEditor.jar");
        assert!(settings
            .path(Tool::Adb)
            .starts_with(&format!("resources/bin/{}/platform-tools/adb", os_dir_name())));
        assert_eq!(settings.path(Tool::Java), "java");
        assert_eq!(settings.path(Tool::Keytool), "keytool");
        assert_eq!(
            settings.path(Tool::InjectDoc),
            "resources/InjectDocumentProvider.jar"
        );
        assert_eq!(settings.debounce_ms, 500);
    }

    #[test]
    fn blank_values_resolve_to_defaults() {
        let mut settings = ToolSettings::default();
        settings.apktool_path = "   ".into();
        assert_eq!(settings.path(Tool::Apktool), Tool::Apktool.default_value());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join(SETTINGS_FILE);
        let mut settings = ToolSettings::default();
        settings.set("apktool", "/opt/apktool/apktool.jar").unwrap();
        settings.set("debounce_ms", "250").unwrap();

        settings.save_to(&path).unwrap();
        assert_eq!(ToolSettings::load_from(&path), settings);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{ "adb_path": "/usr/bin/adb" }"#).unwrap();

        let settings = ToolSettings::load_from(&path);
        assert_eq!(settings.path(Tool::Adb), "/usr/bin/adb");
        assert_eq!(settings.path(Tool::Apktool), "resources/apktool.jar");
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(ToolSettings::load_from(&path), ToolSettings::default());
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let mut settings = ToolSettings::default();
        settings.set("zipalign", "/from/file/zipalign").unwrap();
        settings.apply_overrides(|name| match name {
            "APKU_ZIPALIGN_PATH" => Some("/from/env/zipalign".into()),
            "APKU_AAPT_PATH" => Some("  ".into()),
            _ => None,
        });
        assert_eq!(settings.path(Tool::Zipalign), "/from/env/zipalign");
        assert_eq!(settings.path(Tool::Aapt), Tool::Aapt.default_value());
    }

    #[test]
    fn set_rejects_unknown_keys_and_bad_numbers() {
        let mut settings = ToolSettings::default();
        assert!(matches!(
            settings.set("nope", "x"),
            Err(SettingsError::UnknownKey(_))
        ));
        assert!(matches!(
            settings.set("debounce_ms", "soon"),
            Err(SettingsError::InvalidValue { .. })
        ));
    }

    #[test]
    fn validate_checks_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("apktool.jar");
        fs::write(&jar, b"jar").unwrap();

        let mut settings = ToolSettings::default();
        settings.set("apktool", &jar.display().to_string()).unwrap();
        settings.set("framework", &dir.path().display().to_string()).unwrap();
        settings.set("apkeditor", "/definitely/missing/APKEditor.jar").unwrap();

        let checks = settings.validate();
        let ok = |tool: Tool| checks.iter().find(|c| c.tool == tool).map(|c| c.ok);
        assert_eq!(ok(Tool::Apktool), Some(true));
        assert_eq!(ok(Tool::FrameworkDir), Some(true));
        assert_eq!(ok(Tool::ApkEditor), Some(false));
        assert_eq!(ok(Tool::WorkingDir), None);
    }

    #[test]
    fn tool_keys_round_trip() {
        for tool in Tool::ALL {
            assert_eq!(Tool::from_key(tool.key()), Some(tool));
        }
        assert_eq!(Tool::Aapt2.env_var(), "APKU_AAPT2_PATH");
    }
}
