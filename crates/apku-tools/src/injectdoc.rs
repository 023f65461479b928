//! InjectDocumentProvider, which patches a DocumentsProvider into an APK so
//! its private data becomes browsable from the system file picker.

use crate::command::{require, ToolCommand, ToolError};
use crate::settings::{Tool, ToolSettings};

pub fn inject(settings: &ToolSettings, apk: &str) -> Result<ToolCommand, ToolError> {
    let apk = require(apk, "an APK file to inject document provider into")?;
    let mut cmd = ToolCommand::java_jar(
        settings.path(Tool::Java),
        settings.path(Tool::InjectDoc),
        "Injecting document provider...",
    );
    cmd.push(apk);
    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn runs_the_jar_against_the_apk() {
        let mut settings = ToolSettings::default();
        settings.set("injectdoc", "/opt/InjectDocumentProvider.jar").unwrap();
        let cmd = inject(&settings, "app.apk").unwrap();
        assert_eq!(
            cmd.tokens,
            vec!["java", "-jar", "/opt/InjectDocumentProvider.jar", "app.apk"]
        );
        assert_eq!(
            inject(&settings, " ").unwrap_err(),
            ToolError::MissingInput("an APK file to inject document provider into")
        );
    }
}
