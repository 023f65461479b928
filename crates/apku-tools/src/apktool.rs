//! apktool invocations (`java -jar apktool.jar ...`).

use crate::command::{require, ToolCommand, ToolError};
use crate::settings::{Tool, ToolSettings};

#[derive(Clone, Debug, Default)]
pub struct DecodeOptions {
    pub output: Option<String>,
    pub framework: Option<String>,
    pub api_level: Option<String>,
    pub jobs: Option<String>,
    pub force: bool,
    pub no_resources: bool,
    pub no_sources: bool,
    pub no_assets: bool,
    pub only_manifest: bool,
    pub no_debug_info: bool,
    pub match_original: bool,
    pub keep_broken_resources: bool,
    pub only_main_classes: bool,
}

#[derive(Clone, Debug, Default)]
pub struct BuildOptions {
    pub output: Option<String>,
    pub aapt: Option<String>,
    pub framework: Option<String>,
    pub debug: bool,
    pub copy_original: bool,
    pub force: bool,
    pub no_apk: bool,
    pub no_crunch: bool,
    pub use_aapt1: bool,
    pub net_sec_conf: bool,
}

fn apktool(settings: &ToolSettings, label: &str) -> ToolCommand {
    ToolCommand::java_jar(
        settings.path(Tool::Java),
        settings.path(Tool::Apktool),
        label,
    )
}

pub fn decode(
    settings: &ToolSettings,
    apk: &str,
    opts: &DecodeOptions,
) -> Result<ToolCommand, ToolError> {
    let apk = require(apk, "an APK file to decode")?;
    let mut cmd = apktool(settings, "Decoding APK...");
    cmd.push("d");
    cmd.opt("-o", opts.output.as_deref());
    cmd.opt("-p", opts.framework.as_deref());
    cmd.opt("--api-level", opts.api_level.as_deref());
    cmd.opt("-j", opts.jobs.as_deref());
    cmd.flag(opts.force, "-f");
    cmd.flag(opts.no_resources, "-r");
    cmd.flag(opts.no_sources, "-s");
    cmd.flag(opts.no_assets, "--no-assets");
    cmd.flag(opts.only_manifest, "--only-manifest");
    cmd.flag(opts.no_debug_info, "-b");
    cmd.flag(opts.match_original, "-m");
    cmd.flag(opts.keep_broken_resources, "-k");
    cmd.flag(opts.only_main_classes, "--only-main-classes");
    cmd.push(apk);
    Ok(cmd)
}

pub fn build(
    settings: &ToolSettings,
    project_dir: &str,
    opts: &BuildOptions,
) -> Result<ToolCommand, ToolError> {
    let project_dir = require(project_dir, "a project directory to build")?;
    let mut cmd = apktool(settings, "Building APK...");
    cmd.push("b");
    cmd.opt("-o", opts.output.as_deref());
    cmd.opt("-a", opts.aapt.as_deref());
    cmd.opt("-p", opts.framework.as_deref());
    cmd.flag(opts.debug, "-d");
    cmd.flag(opts.copy_original, "-c");
    cmd.flag(opts.force, "-f");
    cmd.flag(opts.no_apk, "-na");
    cmd.flag(opts.no_crunch, "-nc");
    cmd.flag(opts.use_aapt1, "--use-aapt1");
    cmd.flag(opts.net_sec_conf, "-n");
    cmd.push(project_dir);
    Ok(cmd)
}

pub fn install_framework(
    settings: &ToolSettings,
    framework_apk: &str,
    tag: Option<&str>,
) -> Result<ToolCommand, ToolError> {
    let framework_apk = require(framework_apk, "a framework APK file")?;
    let mut cmd = apktool(settings, "Installing framework...");
    cmd.push("if");
    cmd.opt("-t", tag);
    cmd.push(framework_apk);
    Ok(cmd)
}

pub fn list_frameworks(settings: &ToolSettings) -> ToolCommand {
    let mut cmd = apktool(settings, "Listing frameworks...");
    cmd.push("lf");
    cmd
}

/// Deletes every installed framework file.
pub fn empty_framework_dir(settings: &ToolSettings) -> ToolCommand {
    let mut cmd = apktool(settings, "Emptying framework directory...");
    cmd.extend(["efd", "-f"]);
    cmd
}

pub fn publicize_resources(settings: &ToolSettings, arsc: &str) -> Result<ToolCommand, ToolError> {
    let arsc = require(arsc, "an ARSC file")?;
    let mut cmd = apktool(settings, "Publicizing resources...");
    cmd.extend(["pr", arsc]);
    Ok(cmd)
}

pub fn version(settings: &ToolSettings) -> ToolCommand {
    let mut cmd = apktool(settings, "Checking version...");
    cmd.push("v");
    cmd
}
