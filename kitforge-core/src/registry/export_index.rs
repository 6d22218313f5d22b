//! The shared export index (`index.ts`)
//!
//! One `export { Name } from "./slug";` statement per live component. A fresh
//! index holds only the `export {};` placeholder, which keeps the file a valid
//! module while it has no real exports. Lines the index does not recognise
//! are kept verbatim.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::error::{KitforgeError, Result};

/// Placeholder statement for an index with no real exports
pub const PLACEHOLDER: &str = "export {};";

static EXPORT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^export\s*\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\s*from\s*["']\./([a-z0-9-]+)["']\s*;?\s*$"#)
        .expect("export line regex is valid")
});

/// Render the canonical export statement for a component
pub fn export_line(name: &str, slug: &str) -> String {
    format!("export {{ {name} }} from \"./{slug}\";")
}

/// Parsed export index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportIndex {
    lines: Vec<String>,
}

impl ExportIndex {
    /// A fresh index holding only the placeholder
    pub fn new() -> Self {
        Self {
            lines: vec![PLACEHOLDER.to_string()],
        }
    }

    pub fn parse(content: &str) -> Self {
        Self {
            lines: content
                .lines()
                .map(|l| l.trim_end().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
        }
    }

    /// Load the index, or an empty one if the file does not exist yet
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                Err(KitforgeError::parse(path, "export index is not valid UTF-8"))
            }
            Err(e) => Err(KitforgeError::io(path, e)),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| KitforgeError::io(parent, e))?;
        }
        std::fs::write(path, self.render()).map_err(|e| KitforgeError::io(path, e))
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }

    /// Slug each recognised export statement points at
    pub fn slugs(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter_map(|l| parse_export(l))
            .map(|(_, slug)| slug.to_string())
            .collect()
    }

    /// Whether the exact statement for (name, slug) is present
    pub fn contains(&self, name: &str, slug: &str) -> bool {
        let line = export_line(name, slug);
        self.lines.iter().any(|l| *l == line)
    }

    pub fn has_placeholder(&self) -> bool {
        self.lines.iter().any(|l| l == PLACEHOLDER)
    }

    /// Ensure exactly one export statement for (name, slug)
    ///
    /// Returns `false` when the statement was already present. Any other
    /// statement pointing at the same slug is replaced, and the placeholder is
    /// dropped on the first real insertion.
    pub fn insert(&mut self, name: &str, slug: &str) -> bool {
        let line = export_line(name, slug);
        let matching = self
            .lines
            .iter()
            .filter(|l| parse_export(l).is_some_and(|(_, s)| s == slug))
            .count();
        if matching == 1 && self.contains(name, slug) {
            return false;
        }

        self.lines
            .retain(|l| l != PLACEHOLDER && !parse_export(l).is_some_and(|(_, s)| s == slug));
        self.lines.push(line);
        true
    }

    /// Remove every export statement whose target is exactly `./{slug}`
    ///
    /// Matching is on the parsed statement, so removing `card` never touches
    /// `card-header`. The placeholder comes back once no real export remains.
    pub fn remove(&mut self, slug: &str) -> bool {
        let before = self.lines.len();
        self.lines
            .retain(|l| !parse_export(l).is_some_and(|(_, s)| s == slug));
        let removed = self.lines.len() != before;

        if removed && self.slugs().is_empty() && !self.has_placeholder() {
            self.lines.push(PLACEHOLDER.to_string());
        }
        removed
    }
}

fn parse_export(line: &str) -> Option<(&str, &str)> {
    let caps = EXPORT_LINE.captures(line)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}
