use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::ser::{Serialize, SerializeMap, Serializer};

pub const PERMISSIONS: &str = "permissions";
pub const CONFIGURATIONS: &str = "configurations";
pub const LANGUAGES: &str = "languages";
pub const LOCALES: &str = "locales";

pub const NAMED_LISTS: [&str; 4] = [PERMISSIONS, CONFIGURATIONS, LANGUAGES, LOCALES];

/// String fields in first-seen order. Re-inserting a key updates the value
/// where it already sits.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fields(Vec<(String, String)>);

impl Fields {
    pub fn insert(&mut self, key: &str, value: &str) {
        if let Some(item) = self.0.iter_mut().find(|(k, _)| k == key) {
            item.1 = value.to_string();
        } else {
            self.0.push((key.to_string(), value.to_string()));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Blocks {
    /// Only the last certificate section of a report survives.
    pub certificate: Option<String>,
    pub dex: Vec<String>,
}

impl Blocks {
    pub fn is_empty(&self) -> bool {
        self.certificate.is_none() && self.dex.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ParsedReport {
    pub fields: Fields,
    pub lists: BTreeMap<String, Vec<String>>,
    pub blocks: Blocks,
}

impl Default for ParsedReport {
    fn default() -> Self {
        Self {
            fields: Fields::default(),
            lists: NAMED_LISTS
                .iter()
                .map(|name| (name.to_string(), Vec::new()))
                .collect(),
            blocks: Blocks::default(),
        }
    }
}

impl ParsedReport {
    pub fn list(&self, name: &str) -> &[String] {
        self.lists.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
            && self.lists.values().all(Vec::is_empty)
            && self.blocks.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Formatted view of the report; sections with nothing in them are left out.
    pub fn render(&self) -> String {
        let mut out = String::new();

        if let Some(title) = self.title() {
            let _ = writeln!(out, "{title}");
            let _ = writeln!(out, "{}", "-".repeat(title.chars().count()));
            out.push('\n');
        }

        if !self.fields.is_empty() {
            section(&mut out, "General Information");
            let width = self.fields.keys().map(str::len).max().unwrap_or(0);
            for (key, value) in self.fields.iter() {
                let _ = writeln!(out, "  {key:<width$}  {value}");
            }
            out.push('\n');
        }

        for (name, title) in [
            (PERMISSIONS, "Permissions"),
            (CONFIGURATIONS, "Configurations"),
            (LANGUAGES, "Languages"),
            (LOCALES, "Locales"),
        ] {
            let items = self.list(name);
            if items.is_empty() {
                continue;
            }
            section(&mut out, &format!("{title} ({})", items.len()));
            for item in items {
                let _ = writeln!(out, "  - {item}");
            }
            out.push('\n');
        }

        if let Some(cert) = &self.blocks.certificate {
            section(&mut out, "Signing Certificate");
            code_block(&mut out, cert);
        }

        if !self.blocks.dex.is_empty() {
            section(&mut out, &format!("DEX Files ({})", self.blocks.dex.len()));
            for dex in &self.blocks.dex {
                code_block(&mut out, dex);
            }
        }

        if out.is_empty() {
            out.push_str("No report data.\n");
        }
        out
    }

    fn title(&self) -> Option<String> {
        let name = self
            .fields
            .get("AppName")
            .or_else(|| self.fields.get("application-label"))
            .or_else(|| self.fields.get("package"))?;
        let version = self
            .fields
            .get("VersionName")
            .or_else(|| self.fields.get("versionName"));
        Some(match version {
            Some(version) => format!("{name} {version}"),
            None => name.to_string(),
        })
    }
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "== {title} ==");
}

fn code_block(out: &mut String, text: &str) {
    for line in text.lines() {
        let _ = writeln!(out, "    {line}");
    }
    out.push('\n');
}
