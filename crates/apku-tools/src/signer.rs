//! apksigner and zipalign, the last two steps before an APK ships.

use std::path::{Path, PathBuf};

use crate::command::{require, ToolCommand, ToolError};
use crate::settings::{Tool, ToolSettings};

pub const TEST_KEY_ALIAS: &str = "androiddebugkey";
pub const TEST_KEY_PASSWORD: &str = "android";
const TEST_KEYSTORE_FILE: &str = "debug.keystore";
const TEST_KEY_DNAME: &str = "CN=Android Debug,O=Android,C=US";

#[derive(Clone, Debug)]
pub struct SignOptions {
    pub output: Option<String>,
    pub keystore: String,
    pub keystore_password: String,
    pub key_alias: String,
    pub key_password: Option<String>,
    pub v1: bool,
    pub v2: bool,
    pub v3: bool,
    pub v4: bool,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            output: None,
            keystore: String::new(),
            keystore_password: String::new(),
            key_alias: String::new(),
            key_password: None,
            v1: true,
            v2: true,
            v3: true,
            v4: false,
        }
    }
}

impl SignOptions {
    /// Points the options at the debug key in `keystore`, replacing any
    /// keystore, alias and passwords given before.
    pub fn use_test_key(&mut self, keystore: &Path) {
        self.keystore = keystore.display().to_string();
        self.keystore_password = TEST_KEY_PASSWORD.to_string();
        self.key_alias = TEST_KEY_ALIAS.to_string();
        self.key_password = Some(TEST_KEY_PASSWORD.to_string());
    }
}

/// Shared debug keystore, created on first use of a test-key signing.
pub fn test_keystore_path() -> PathBuf {
    apku_util::data_dir().join("keys").join(TEST_KEYSTORE_FILE)
}

/// keytool invocation that writes a self-signed RSA debug key to `keystore`.
pub fn generate_test_keystore(settings: &ToolSettings, keystore: &Path) -> ToolCommand {
    let mut cmd = ToolCommand::new(settings.path(Tool::Keytool), "Generating test keystore...");
    cmd.extend(["-genkeypair", "-v", "-keystore"]);
    cmd.push(keystore.display().to_string());
    cmd.extend([
        "-storepass",
        TEST_KEY_PASSWORD,
        "-alias",
        TEST_KEY_ALIAS,
        "-keypass",
        TEST_KEY_PASSWORD,
        "-keyalg",
        "RSA",
        "-keysize",
        "2048",
        "-validity",
        "10000",
        "-dname",
        TEST_KEY_DNAME,
    ]);
    cmd
}

/// `app.apk` becomes `app_signed.apk`; other names get the suffix appended.
pub fn default_signed_path(input: &str) -> String {
    match input.strip_suffix(".apk") {
        Some(stem) => format!("{stem}_signed.apk"),
        None => format!("{input}_signed.apk"),
    }
}

fn apksigner(settings: &ToolSettings, label: &str) -> ToolCommand {
    ToolCommand::java_jar(
        settings.path(Tool::Java),
        settings.path(Tool::Apksigner),
        label,
    )
}

/// Passwords are passed as `pass:<value>`; the key password falls back to
/// the keystore password.
pub fn sign(
    settings: &ToolSettings,
    input: &str,
    opts: &SignOptions,
) -> Result<ToolCommand, ToolError> {
    let input = require(input, "an APK file to sign")?;
    let keystore = require(&opts.keystore, "a keystore")?;
    let key_alias = require(&opts.key_alias, "a key alias")?;
    let ks_pass = opts.keystore_password.as_str();
    let key_pass = opts
        .key_password
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or(ks_pass);
    let output = opts
        .output
        .as_deref()
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_signed_path(input));

    let mut cmd = apksigner(settings, "Signing APK...");
    cmd.push("sign");
    for (flag, enabled) in [
        ("--v1-signing-enabled", opts.v1),
        ("--v2-signing-enabled", opts.v2),
        ("--v3-signing-enabled", opts.v3),
        ("--v4-signing-enabled", opts.v4),
    ] {
        cmd.extend([flag, if enabled { "true" } else { "false" }]);
    }
    cmd.extend(["--ks", keystore]);
    cmd.extend(["--ks-pass".to_string(), format!("pass:{ks_pass}")]);
    cmd.extend(["--ks-key-alias", key_alias]);
    cmd.extend(["--key-pass".to_string(), format!("pass:{key_pass}")]);
    cmd.extend(["--out".to_string(), output]);
    cmd.push(input);
    Ok(cmd)
}

pub fn verify(
    settings: &ToolSettings,
    apk: &str,
    verbose: bool,
    print_certs: bool,
) -> Result<ToolCommand, ToolError> {
    let apk = require(apk, "an APK file to verify")?;
    let mut cmd = apksigner(settings, "Verifying APK signature...");
    cmd.push("verify");
    cmd.flag(verbose, "-v");
    cmd.flag(print_certs, "--print-certs");
    cmd.push(apk);
    Ok(cmd)
}

/// 4-byte alignment, verbose.
pub fn zipalign(
    settings: &ToolSettings,
    input: &str,
    output: &str,
) -> Result<ToolCommand, ToolError> {
    let input = require(input, "an APK file to align")?;
    let output = require(output, "an output path")?;
    let mut cmd = ToolCommand::new(settings.path(Tool::Zipalign), "Aligning APK...");
    cmd.extend(["-v", "4", input, output]);
    Ok(cmd)
}
