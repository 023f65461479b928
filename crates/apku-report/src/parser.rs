use std::sync::OnceLock;

use regex::Regex;

use crate::report::{ParsedReport, CONFIGURATIONS, LANGUAGES, LOCALES, PERMISSIONS};

fn key_value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^([^=\s]+)="([^"]*)"$"#).expect("key/value regex"))
}

fn dex_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^Name="(.+\.dex)"$"#).expect("dex regex"))
}

fn certificate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^Certificates="(\d+)"$"#).expect("certificate regex"))
}

fn list_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(.+)\s+\[\s*count\s+(\d+)\s*\]$").expect("list header regex")
    })
}

fn list_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s+\d+\)\s+(.+)$").expect("list item regex"))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BlockKind {
    Dex,
    Certificate,
}

enum Mode {
    Default,
    /// Target list name, or `None` when the section is consumed and dropped.
    InList(Option<&'static str>),
    InBlock(BlockKind, String),
}

fn list_target(label: &str) -> Option<&'static str> {
    match label {
        "uses-permission" => Some(PERMISSIONS),
        "configurations" => Some(CONFIGURATIONS),
        "languages" => Some(LANGUAGES),
        "locales" => Some(LOCALES),
        _ => None,
    }
}

fn flush(report: &mut ParsedReport, mode: Mode) {
    match mode {
        Mode::InBlock(BlockKind::Dex, text) => report.blocks.dex.push(text),
        Mode::InBlock(BlockKind::Certificate, text) => report.blocks.certificate = Some(text),
        Mode::Default | Mode::InList(_) => {}
    }
}

fn open_block(line: &str) -> String {
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    buf
}

/// Parses the text report printed by APKEditor `info`. Unrecognized lines
/// are dropped, so every input yields a report.
pub fn parse(text: &str) -> ParsedReport {
    let mut report = ParsedReport::default();
    let mut mode = Mode::Default;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if dex_re().is_match(line) {
            flush(&mut report, std::mem::replace(&mut mode, Mode::Default));
            mode = Mode::InBlock(BlockKind::Dex, open_block(raw));
            continue;
        }
        if certificate_re().is_match(line) {
            flush(&mut report, std::mem::replace(&mut mode, Mode::Default));
            mode = Mode::InBlock(BlockKind::Certificate, open_block(raw));
            continue;
        }
        if let Some(caps) = list_header_re().captures(line) {
            flush(&mut report, std::mem::replace(&mut mode, Mode::Default));
            mode = Mode::InList(list_target(caps[1].trim()));
            continue;
        }

        match &mut mode {
            Mode::Default => {
                if let Some(caps) = key_value_re().captures(line) {
                    report.fields.insert(&caps[1], &caps[2]);
                }
            }
            Mode::InList(target) => {
                let Some(caps) = list_item_re().captures(raw) else {
                    continue;
                };
                if let Some(name) = target {
                    report
                        .lists
                        .entry((*name).to_string())
                        .or_default()
                        .push(caps[1].trim().to_string());
                }
            }
            Mode::InBlock(_, buf) => {
                buf.push_str(raw);
                buf.push('\n');
            }
        }
    }

    flush(&mut report, mode);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::NAMED_LISTS;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"package="com.example.app"
VersionCode="42"
VersionName="1.4.2"
AppName="Example"
uses-permission [ count 2 ]
  1) android.permission.INTERNET
  2) android.permission.CAMERA
locales [ count 3 ]
  1) en
  2) fr
  3) de-rDE
Name="classes.dex"
 version=035
 classes=120
Name="classes2.dex"
 version=035
 classes=8
Certificates="1"
 Subject: CN=Example
 SHA-256: 00:11:22
"#;

    #[test]
    fn empty_input_yields_empty_report_with_all_lists() {
        let report = parse("");
        assert!(report.fields.is_empty());
        assert!(report.blocks.is_empty());
        assert_eq!(report.lists.len(), 4);
        for items in report.lists.values() {
            assert!(items.is_empty());
        }
    }

    #[test]
    fn whitespace_only_input_is_an_empty_report() {
        let report = parse("   \n\t\n\r\n");
        assert!(report.is_empty());
        assert_eq!(report.lists.len(), 4);
        assert!(NAMED_LISTS.iter().all(|name| report.list(name).is_empty()));
        assert_eq!(report, ParsedReport::default());
    }

    #[test]
    fn permissions_list_round_trip() {
        let report = parse(
            "uses-permission [ count 3 ]\n  1) android.permission.INTERNET\n  2) android.permission.CAMERA\n  3) android.permission.VIBRATE\n",
        );
        assert_eq!(
            report.lists["permissions"],
            vec![
                "android.permission.INTERNET".to_string(),
                "android.permission.CAMERA".to_string(),
                "android.permission.VIBRATE".to_string(),
            ]
        );
    }

    #[test]
    fn manifest_fields_keep_insertion_order() {
        let report = parse("package=\"com.example.app\"\nVersionName=\"1.2.3\"\nVersionCode=\"7\"\n");
        let pairs: Vec<(&str, &str)> = report.fields.iter().collect();
        assert_eq!(
            pairs,
            vec![
                ("package", "com.example.app"),
                ("VersionName", "1.2.3"),
                ("VersionCode", "7"),
            ]
        );
    }

    #[test]
    fn fields_keep_first_seen_order_and_update_in_place() {
        let report = parse("a=\"1\"\nb=\"2\"\na=\"3\"\n");
        let pairs: Vec<(&str, &str)> = report.fields.iter().collect();
        assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn full_sample_is_split_into_fields_lists_and_blocks() {
        let report = parse(SAMPLE);

        assert_eq!(report.fields.get("package"), Some("com.example.app"));
        assert_eq!(report.fields.get("VersionName"), Some("1.4.2"));
        assert_eq!(report.fields.len(), 4);
        assert_eq!(report.list(PERMISSIONS).len(), 2);
        assert_eq!(report.list(LOCALES), ["en", "fr", "de-rDE"]);
        assert!(report.list(CONFIGURATIONS).is_empty());

        assert_eq!(
            report.blocks.dex,
            vec![
                "Name=\"classes.dex\"\n version=035\n classes=120\n".to_string(),
                "Name=\"classes2.dex\"\n version=035\n classes=8\n".to_string(),
            ]
        );
        assert_eq!(
            report.blocks.certificate.as_deref(),
            Some("Certificates=\"1\"\n Subject: CN=Example\n SHA-256: 00:11:22\n")
        );
    }

    #[test]
    fn later_certificate_block_replaces_earlier_one() {
        let report = parse("Certificates=\"1\"\n first\nCertificates=\"2\"\n second\n");
        assert_eq!(
            report.blocks.certificate.as_deref(),
            Some("Certificates=\"2\"\n second\n")
        );
    }

    #[test]
    fn unknown_list_items_are_consumed_not_leaked() {
        let report = parse("densities [ count 2 ]\n  1) 160\n  2) 240\nlanguages [ count 1 ]\n  1) en\n");
        assert_eq!(report.list(LANGUAGES), ["en"]);
        assert!(report.fields.is_empty());
        assert!(report.lists.values().flatten().all(|v| v != "160"));
    }

    #[test]
    fn key_values_after_a_list_header_are_not_fields() {
        let report = parse("configurations [ count 1 ]\n  1) hdpi\nlate=\"value\"\n");
        assert_eq!(report.list(CONFIGURATIONS), ["hdpi"]);
        assert_eq!(report.fields.get("late"), None);
    }

    #[test]
    fn list_items_need_leading_whitespace() {
        let report = parse("locales [ count 2 ]\n1) en\n  2) fr\n");
        assert_eq!(report.list(LOCALES), ["fr"]);
    }

    #[test]
    fn crlf_and_blank_lines_are_tolerated() {
        let report = parse("package=\"p\"\r\n\r\nName=\"classes.dex\"\r\n\r\n size=1\r\n");
        assert_eq!(report.fields.get("package"), Some("p"));
        assert_eq!(report.blocks.dex, vec!["Name=\"classes.dex\"\n size=1\n".to_string()]);
    }

    #[test]
    fn garbage_lines_are_dropped() {
        let report = parse("I: Using APKEditor\nnot a field\nkey=\"has \"quote\"\"\n");
        assert!(report.is_empty());
    }

    #[test]
    fn parsing_is_deterministic() {
        assert_eq!(parse(SAMPLE), parse(SAMPLE));
    }
}
