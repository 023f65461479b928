//! aapt and aapt2 inspection commands.

use std::fmt;

use crate::command::{require, ToolCommand, ToolError};
use crate::settings::{Tool, ToolSettings};

const DEFAULT_XML_ASSET: &str = "AndroidManifest.xml";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aapt {
    V1,
    V2,
}

impl Aapt {
    fn tool(self) -> Tool {
        match self {
            Aapt::V1 => Tool::Aapt,
            Aapt::V2 => Tool::Aapt2,
        }
    }

    fn label_prefix(self) -> &'static str {
        match self {
            Aapt::V1 => "",
            Aapt::V2 => "AAPT2: ",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DumpKind {
    Badging,
    Permissions,
    Resources,
    Configurations,
    Strings,
    XmlTree,
}

impl DumpKind {
    pub const ALL: [DumpKind; 6] = [
        DumpKind::Badging,
        DumpKind::Permissions,
        DumpKind::Resources,
        DumpKind::Configurations,
        DumpKind::Strings,
        DumpKind::XmlTree,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DumpKind::Badging => "badging",
            DumpKind::Permissions => "permissions",
            DumpKind::Resources => "resources",
            DumpKind::Configurations => "configurations",
            DumpKind::Strings => "strings",
            DumpKind::XmlTree => "xmltree",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        DumpKind::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

impl fmt::Display for DumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `xml_asset` only applies to `xmltree` and defaults to the manifest.
pub fn dump(
    settings: &ToolSettings,
    aapt: Aapt,
    kind: DumpKind,
    apk: &str,
    xml_asset: Option<&str>,
) -> Result<ToolCommand, ToolError> {
    let apk = require(apk, "an APK file")?;
    let label = match kind {
        DumpKind::XmlTree => format!("{}Dumping XML tree...", aapt.label_prefix()),
        other => format!("{}Dumping APK {other}...", aapt.label_prefix()),
    };
    let mut cmd = ToolCommand::new(settings.path(aapt.tool()), label);
    cmd.extend(["dump", kind.as_str()]);
    if kind == DumpKind::XmlTree {
        let asset = xml_asset
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(DEFAULT_XML_ASSET);
        match aapt {
            Aapt::V1 => cmd.extend([apk, asset]),
            Aapt::V2 => cmd.extend(["--file", asset, apk]),
        }
    } else {
        cmd.push(apk);
    }
    Ok(cmd)
}

pub fn list(settings: &ToolSettings, apk: &str, verbose: bool) -> Result<ToolCommand, ToolError> {
    let apk = require(apk, "an APK file")?;
    let mut cmd = ToolCommand::new(settings.path(Tool::Aapt), "Listing APK contents...");
    cmd.push("list");
    cmd.flag(verbose, "-v");
    cmd.push(apk);
    Ok(cmd)
}

pub fn version(settings: &ToolSettings, aapt: Aapt) -> ToolCommand {
    let name = match aapt {
        Aapt::V1 => "AAPT",
        Aapt::V2 => "AAPT2",
    };
    let mut cmd = ToolCommand::new(settings.path(aapt.tool()), format!("Getting {name} version..."));
    cmd.push("version");
    cmd
}
