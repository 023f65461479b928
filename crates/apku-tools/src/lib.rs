//! Command builders for the Android packaging tools, and where to find them.

pub mod aapt;
pub mod adb;
pub mod apkeditor;
pub mod apktool;
mod command;
pub mod injectdoc;
pub mod settings;
pub mod signer;

pub use command::{ToolCommand, ToolError};
pub use settings::{settings_path, PathCheck, SettingsError, Tool, ToolSettings};
