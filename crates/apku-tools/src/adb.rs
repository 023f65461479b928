//! adb invocations and parsing of the adb output the CLI acts on.

use crate::command::{require, ToolCommand, ToolError};
use crate::settings::{Tool, ToolSettings};

fn adb(settings: &ToolSettings, label: impl Into<String>) -> ToolCommand {
    ToolCommand::new(settings.path(Tool::Adb), label)
}

fn adb_device(
    settings: &ToolSettings,
    serial: &str,
    label: impl Into<String>,
) -> Result<ToolCommand, ToolError> {
    let serial = require(serial, "a device serial")?;
    let mut cmd = adb(settings, label);
    cmd.extend(["-s", serial]);
    Ok(cmd)
}

pub fn devices(settings: &ToolSettings) -> ToolCommand {
    let mut cmd = adb(settings, "Listing devices...");
    cmd.push("devices");
    cmd
}

/// Reinstalls over an existing package (`install -r`).
pub fn install(settings: &ToolSettings, serial: &str, apk: &str) -> Result<ToolCommand, ToolError> {
    let apk = require(apk, "an APK file to install")?;
    let mut cmd = adb_device(settings, serial, format!("Installing APK on {}...", serial.trim()))?;
    cmd.extend(["install", "-r", apk]);
    Ok(cmd)
}

pub fn uninstall(
    settings: &ToolSettings,
    serial: &str,
    package: &str,
) -> Result<ToolCommand, ToolError> {
    let package = require(package, "a package name")?;
    let mut cmd = adb_device(
        settings,
        serial,
        format!("Uninstalling {package} from {}...", serial.trim()),
    )?;
    cmd.extend(["uninstall", package]);
    Ok(cmd)
}

fn endpoint(host: &str, port: &str) -> Result<String, ToolError> {
    let host = require(host, "a device IP")?;
    let port = require(port, "a port")?;
    Ok(format!("{host}:{port}"))
}

pub fn connect(settings: &ToolSettings, host: &str, port: &str) -> Result<ToolCommand, ToolError> {
    let addr = endpoint(host, port)?;
    let mut cmd = adb(settings, format!("Connecting to {addr}..."));
    cmd.extend(["connect", addr.as_str()]);
    Ok(cmd)
}

pub fn pair(
    settings: &ToolSettings,
    host: &str,
    port: &str,
    code: &str,
) -> Result<ToolCommand, ToolError> {
    let addr = endpoint(host, port)?;
    let code = require(code, "a pairing code")?;
    let mut cmd = adb(settings, format!("Pairing with {addr}..."));
    cmd.extend(["pair", addr.as_str(), code]);
    Ok(cmd)
}

/// The shell line is split on whitespace; no quoting is interpreted.
pub fn shell(
    settings: &ToolSettings,
    serial: &str,
    command_line: &str,
) -> Result<ToolCommand, ToolError> {
    let command_line = require(command_line, "a shell command")?;
    let mut cmd = adb_device(settings, serial, format!("Executing: {command_line}"))?;
    cmd.push("shell");
    cmd.extend(command_line.split_whitespace());
    Ok(cmd)
}

pub fn package_path(
    settings: &ToolSettings,
    serial: &str,
    package: &str,
) -> Result<ToolCommand, ToolError> {
    let package = require(package, "a package name")?;
    let mut cmd = adb_device(settings, serial, format!("Finding APK path for {package}..."))?;
    cmd.extend(["shell", "pm", "path", package]);
    Ok(cmd)
}

pub fn pull(
    settings: &ToolSettings,
    serial: &str,
    remote: &str,
    local: &str,
) -> Result<ToolCommand, ToolError> {
    let remote = require(remote, "a remote path")?;
    let local = require(local, "a destination path")?;
    let name = remote.rsplit('/').next().unwrap_or(remote);
    let mut cmd = adb_device(settings, serial, format!("Pulling {name}..."))?;
    cmd.extend(["pull", remote, local]);
    Ok(cmd)
}

pub fn dumpsys_package(
    settings: &ToolSettings,
    serial: &str,
    package: &str,
) -> Result<ToolCommand, ToolError> {
    let package = require(package, "a package name")?;
    let mut cmd = adb_device(settings, serial, "Dumping package info...")?;
    cmd.extend(["shell", "dumpsys", "package", package]);
    Ok(cmd)
}

/// Serials of devices in the `device` state from `adb devices` output.
pub fn parse_adb_devices(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of devices"))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            (parts.next()? == "device").then(|| serial.to_string())
        })
        .collect()
}

/// First `package:<path>` line of `pm path` output.
pub fn parse_package_path(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        line.trim()
            .strip_prefix("package:")
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(str::to_string)
    })
}
