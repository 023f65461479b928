use std::fmt;

use apku_runner::ExecutionRequest;

/// A fully assembled tool invocation plus the status text shown while it runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCommand {
    pub tokens: Vec<String>,
    pub label: String,
}

impl ToolCommand {
    pub(crate) fn new(program: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            tokens: vec![program.into()],
            label: label.into(),
        }
    }

    /// `java -jar <jar>` prefix used by every jar-packaged tool.
    pub(crate) fn java_jar(java: String, jar: String, label: impl Into<String>) -> Self {
        let mut cmd = Self::new(java, label);
        cmd.push("-jar");
        cmd.push(jar);
        cmd
    }

    pub(crate) fn push(&mut self, token: impl Into<String>) {
        self.tokens.push(token.into());
    }

    pub(crate) fn extend<I, S>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens.extend(tokens.into_iter().map(Into::into));
    }

    /// Adds `flag value` only when a non-blank value was given.
    pub(crate) fn opt(&mut self, flag: &str, value: Option<&str>) {
        if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.push(flag);
            self.push(value);
        }
    }

    pub(crate) fn flag(&mut self, enabled: bool, flag: &str) {
        if enabled {
            self.push(flag);
        }
    }

    pub fn program(&self) -> &str {
        self.tokens.first().map(String::as_str).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        self.tokens.get(1..).unwrap_or_default()
    }

    pub fn command_line(&self) -> String {
        self.tokens.join(" ")
    }

    pub fn into_request(self) -> ExecutionRequest {
        ExecutionRequest::new(self.tokens, self.label)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolError {
    /// A required input was blank.
    MissingInput(&'static str),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::MissingInput(what) => write!(f, "please provide {what}"),
        }
    }
}

impl std::error::Error for ToolError {}

pub(crate) fn require<'a>(value: &'a str, what: &'static str) -> Result<&'a str, ToolError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ToolError::MissingInput(what))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn optional_values_skip_blanks() {
        let mut cmd = ToolCommand::new("tool", "Working...");
        cmd.opt("-o", Some("out"));
        cmd.opt("-p", Some("  "));
        cmd.opt("-j", None);
        cmd.flag(true, "-f");
        cmd.flag(false, "-r");
        assert_eq!(cmd.tokens, vec!["tool", "-o", "out", "-f"]);
        assert_eq!(cmd.program(), "tool");
        assert_eq!(cmd.args(), ["-o", "out", "-f"]);
    }

    #[test]
    fn into_request_keeps_tokens_and_label() {
        let cmd = ToolCommand::java_jar("java".into(), "a.jar".into(), "Running jar...");
        let request = cmd.into_request();
        assert_eq!(request.command, vec!["java", "-jar", "a.jar"]);
        assert_eq!(request.label, "Running jar...");
    }

    #[test]
    fn require_rejects_blank_input() {
        assert_eq!(require("  ", "an APK file"), Err(ToolError::MissingInput("an APK file")));
        assert_eq!(require(" app.apk ", "an APK file"), Ok("app.apk"));
    }
}
