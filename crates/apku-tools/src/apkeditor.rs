//! APKEditor invocations (`java -jar APKEditor.jar ...`).

use crate::command::{require, ToolCommand, ToolError};
use crate::settings::{Tool, ToolSettings};

#[derive(Clone, Debug, Default)]
pub struct DecompileOptions {
    pub output: Option<String>,
    pub to_xml: bool,
    pub load_dex: bool,
    pub dex_lib: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct BuildOptions {
    pub output: Option<String>,
    pub from_xml: bool,
    pub dex_lib: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct MergeOptions {
    pub output: Option<String>,
    pub res_dir: Option<String>,
    pub extract_native_libs: Option<String>,
    pub clean_meta: bool,
    pub force: bool,
    pub validate_modules: bool,
    pub vrd: bool,
}

#[derive(Clone, Debug, Default)]
pub struct RefactorOptions {
    pub output: Option<String>,
    pub public_xml: Option<String>,
    pub clean_meta: bool,
    pub force: bool,
    pub fix_types: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ProtectOptions {
    pub output: Option<String>,
    pub keep_type: Option<String>,
    pub dic_dir_names: Option<String>,
    pub dic_file_names: Option<String>,
    pub confuse_zip: bool,
    pub force: bool,
    pub skip_manifest: bool,
}

/// Report sections `info` can be asked to print.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InfoSection {
    Activities,
    AppClass,
    AppIcon,
    AppName,
    AppRoundIcon,
    Configurations,
    Dex,
    Languages,
    ListFiles,
    ListXmlFiles,
    Locales,
    MinSdkVersion,
    Package,
    Permissions,
    Resources,
    Signatures,
    SignaturesBase64,
    TargetSdkVersion,
    VersionCode,
    VersionName,
}

impl InfoSection {
    pub const ALL: [InfoSection; 20] = [
        InfoSection::Activities,
        InfoSection::AppClass,
        InfoSection::AppIcon,
        InfoSection::AppName,
        InfoSection::AppRoundIcon,
        InfoSection::Configurations,
        InfoSection::Dex,
        InfoSection::Languages,
        InfoSection::ListFiles,
        InfoSection::ListXmlFiles,
        InfoSection::Locales,
        InfoSection::MinSdkVersion,
        InfoSection::Package,
        InfoSection::Permissions,
        InfoSection::Resources,
        InfoSection::Signatures,
        InfoSection::SignaturesBase64,
        InfoSection::TargetSdkVersion,
        InfoSection::VersionCode,
        InfoSection::VersionName,
    ];

    pub fn flag(self) -> &'static str {
        match self {
            InfoSection::Activities => "-activities",
            InfoSection::AppClass => "-app-class",
            InfoSection::AppIcon => "-app-icon",
            InfoSection::AppName => "-app-name",
            InfoSection::AppRoundIcon => "-app-round-icon",
            InfoSection::Configurations => "-configurations",
            InfoSection::Dex => "-dex",
            InfoSection::Languages => "-languages",
            InfoSection::ListFiles => "-list-files",
            InfoSection::ListXmlFiles => "-list-xml-files",
            InfoSection::Locales => "-locales",
            InfoSection::MinSdkVersion => "-min-sdk-version",
            InfoSection::Package => "-package",
            InfoSection::Permissions => "-permissions",
            InfoSection::Resources => "-resources",
            InfoSection::Signatures => "-signatures",
            InfoSection::SignaturesBase64 => "-signatures-base64",
            InfoSection::TargetSdkVersion => "-target-sdk-version",
            InfoSection::VersionCode => "-version-code",
            InfoSection::VersionName => "-version-name",
        }
    }

    /// Accepts the flag with or without its leading dash.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().trim_start_matches('-');
        InfoSection::ALL
            .into_iter()
            .find(|section| &section.flag()[1..] == name)
    }
}

#[derive(Clone, Debug, Default)]
pub struct InfoOptions {
    pub output_file: Option<String>,
    pub filter_type: Option<String>,
    pub framework: Option<String>,
    pub framework_version: Option<String>,
    pub resource_id: Option<String>,
    pub xml_strings: Option<String>,
    pub xml_tree: Option<String>,
    pub output_type: Option<String>,
    pub verbose: bool,
    pub force: bool,
    pub sections: Vec<InfoSection>,
}

fn editor(settings: &ToolSettings, label: &str, action: &str, input: &str) -> ToolCommand {
    let mut cmd = ToolCommand::java_jar(
        settings.path(Tool::Java),
        settings.path(Tool::ApkEditor),
        label,
    );
    cmd.extend([action, "-i", input]);
    cmd
}

pub fn decompile(
    settings: &ToolSettings,
    apk: &str,
    opts: &DecompileOptions,
) -> Result<ToolCommand, ToolError> {
    let apk = require(apk, "an APK file to decompile")?;
    let mut cmd = editor(settings, "Decompiling APK...", "d", apk);
    cmd.opt("-o", opts.output.as_deref());
    if opts.to_xml {
        cmd.extend(["-t", "xml"]);
    }
    if opts.load_dex {
        cmd.extend(["-load-dex", "3"]);
    }
    cmd.opt("-dex-lib", opts.dex_lib.as_deref());
    Ok(cmd)
}

pub fn build(
    settings: &ToolSettings,
    input_dir: &str,
    opts: &BuildOptions,
) -> Result<ToolCommand, ToolError> {
    let input_dir = require(input_dir, "a decompiled directory to build")?;
    let mut cmd = editor(settings, "Building APK...", "b", input_dir);
    cmd.opt("-o", opts.output.as_deref());
    if opts.from_xml {
        cmd.extend(["-t", "xml"]);
    }
    cmd.opt("-dex-lib", opts.dex_lib.as_deref());
    Ok(cmd)
}

pub fn merge(
    settings: &ToolSettings,
    input: &str,
    opts: &MergeOptions,
) -> Result<ToolCommand, ToolError> {
    let input = require(input, "input for merging")?;
    let mut cmd = editor(settings, "Merging APKs...", "m", input);
    cmd.opt("-o", opts.output.as_deref());
    cmd.opt("-res-dir", opts.res_dir.as_deref());
    cmd.opt("-extractNativeLibs", opts.extract_native_libs.as_deref());
    cmd.flag(opts.clean_meta, "-clean-meta");
    cmd.flag(opts.force, "-f");
    cmd.flag(opts.validate_modules, "-validate-modules");
    cmd.flag(opts.vrd, "-vrd");
    Ok(cmd)
}

pub fn refactor(
    settings: &ToolSettings,
    apk: &str,
    opts: &RefactorOptions,
) -> Result<ToolCommand, ToolError> {
    let apk = require(apk, "an APK file to refactor")?;
    let mut cmd = editor(settings, "Refactoring APK...", "x", apk);
    cmd.opt("-o", opts.output.as_deref());
    cmd.opt("-public-xml", opts.public_xml.as_deref());
    cmd.flag(opts.clean_meta, "-clean-meta");
    cmd.flag(opts.force, "-f");
    cmd.flag(opts.fix_types, "-fix-types");
    Ok(cmd)
}

pub fn protect(
    settings: &ToolSettings,
    apk: &str,
    opts: &ProtectOptions,
) -> Result<ToolCommand, ToolError> {
    let apk = require(apk, "an APK file to protect")?;
    let mut cmd = editor(settings, "Protecting APK...", "p", apk);
    cmd.opt("-o", opts.output.as_deref());
    cmd.opt("-keep-type", opts.keep_type.as_deref());
    cmd.opt("-dic-dir-names", opts.dic_dir_names.as_deref());
    cmd.opt("-dic-file-names", opts.dic_file_names.as_deref());
    cmd.flag(opts.confuse_zip, "-confuse-zip");
    cmd.flag(opts.force, "-f");
    cmd.flag(opts.skip_manifest, "-skip-manifest");
    Ok(cmd)
}

/// Section flags are emitted once each, in a fixed order.
pub fn info(
    settings: &ToolSettings,
    apk: &str,
    opts: &InfoOptions,
) -> Result<ToolCommand, ToolError> {
    let apk = require(apk, "an APK file to get information")?;
    let mut cmd = editor(settings, "Getting APK information...", "info", apk);
    cmd.opt("-o", opts.output_file.as_deref());
    cmd.opt("-filter-type", opts.filter_type.as_deref());
    cmd.opt("-framework", opts.framework.as_deref());
    cmd.opt("-framework-version", opts.framework_version.as_deref());
    cmd.opt("-res", opts.resource_id.as_deref());
    cmd.opt("-xmlstrings", opts.xml_strings.as_deref());
    cmd.opt("-xmltree", opts.xml_tree.as_deref());
    cmd.opt("-t", opts.output_type.as_deref());
    cmd.flag(opts.verbose, "-v");
    cmd.flag(opts.force, "-f");
    for section in InfoSection::ALL {
        cmd.flag(opts.sections.contains(&section), section.flag());
    }
    Ok(cmd)
}
