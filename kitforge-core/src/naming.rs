//! Slug and export-name derivation
//!
//! A component is addressed externally by its slug (`my-card`) and exported
//! from source under a PascalCase name (`MyCard`). The two are derived from
//! each other by pure functions; nothing here touches the filesystem.
//!
//! Digit-adjacent slugs are ambiguous: `button2` and `button-2` both map to
//! `Button2`, and `Button2` maps back to `button-2`. This module does not pick
//! a winner. [`naming_warnings`] reports the ambiguity instead.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::{KitforgeError, Result};

static EXPORT_CONST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"export\s+const\s+([A-Za-z_][A-Za-z0-9_]*)")
        .expect("export const regex is valid")
});

static EXPORT_FUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"export\s+(?:default\s+)?function\s+([A-Za-z_][A-Za-z0-9_]*)")
        .expect("export function regex is valid")
});

static EXPORT_NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"export\s*\{\s*([A-Za-z_][A-Za-z0-9_]*)").expect("named export regex is valid")
});

/// Convert a slug to its PascalCase export name
///
/// `my-card` becomes `MyCard`. Empty segments are skipped.
pub fn slug_to_name(slug: &str) -> String {
    slug.split('-')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Convert a PascalCase name back to a slug
///
/// A hyphen goes before every uppercase letter that follows a lowercase
/// letter or digit, and before every digit that follows a letter.
pub fn name_to_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;

    for c in name.chars() {
        if let Some(p) = prev {
            let upper_after_lower =
                c.is_ascii_uppercase() && (p.is_ascii_lowercase() || p.is_ascii_digit());
            let digit_after_letter = c.is_ascii_digit() && p.is_ascii_alphabetic();
            if upper_after_lower || digit_after_letter {
                slug.push('-');
            }
        }
        slug.push(c.to_ascii_lowercase());
        prev = Some(c);
    }

    slug
}

/// Whether `name` is a valid export identifier (`^[A-Z][A-Za-z0-9]*$`)
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => chars.all(|c| c.is_ascii_alphanumeric()),
        _ => false,
    }
}

/// Whether `slug` matches the slug grammar (`^[a-z0-9-]+$`)
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Validate a slug, returning a validation error naming the offending value
pub fn validate_slug(slug: &str) -> Result<()> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(KitforgeError::Validation(format!(
            "slug '{slug}' must be non-empty lowercase alphanumeric with hyphens"
        )))
    }
}

/// Validate an export name
pub fn validate_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(KitforgeError::Validation(format!(
            "name '{name}' must start with an uppercase letter and contain only letters and digits"
        )))
    }
}

/// Find the component name exported by a piece of source text
///
/// Patterns are tried in priority order: `export const X`, then
/// `export function X`, then `export { X }`. The first pattern that matches
/// anywhere in the text wins.
pub fn extract_name_from_source(code: &str) -> Option<String> {
    [&*EXPORT_CONST, &*EXPORT_FUNCTION, &*EXPORT_NAMED]
        .iter()
        .find_map(|pattern| pattern.captures(code))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Non-fatal naming issue attached to a write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NamingWarning {
    /// A digit sits next to a letter, so the slug and a hyphenated sibling
    /// share the same export name
    DigitAdjacency { slug: String, canonical: String },
    /// The name does not map back to the same slug for another reason
    /// (single-letter or empty segments)
    RoundTripMismatch { slug: String, canonical: String },
}

impl std::fmt::Display for NamingWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NamingWarning::DigitAdjacency { slug, canonical } => write!(
                f,
                "slug '{slug}' is digit-adjacent; its name maps back to '{canonical}'"
            ),
            NamingWarning::RoundTripMismatch { slug, canonical } => write!(
                f,
                "slug '{slug}' does not round-trip; its name maps back to '{canonical}'"
            ),
        }
    }
}

/// Report slug/name ambiguities for a slug that already passed validation
pub fn naming_warnings(slug: &str) -> Vec<NamingWarning> {
    let canonical = name_to_slug(&slug_to_name(slug));
    if canonical == slug {
        return Vec::new();
    }

    let slug = slug.to_string();
    if slug.chars().any(|c| c.is_ascii_digit()) {
        vec![NamingWarning::DigitAdjacency { slug, canonical }]
    } else {
        vec![NamingWarning::RoundTripMismatch { slug, canonical }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_to_name() {
        assert_eq!(slug_to_name("my-card"), "MyCard");
        assert_eq!(slug_to_name("button"), "Button");
        assert_eq!(slug_to_name("pricing-table-v2"), "PricingTableV2");
        assert_eq!(slug_to_name("card-2"), "Card2");
    }

    #[test]
    fn test_name_to_slug() {
        assert_eq!(name_to_slug("MyCard"), "my-card");
        assert_eq!(name_to_slug("Button"), "button");
        assert_eq!(name_to_slug("Button2"), "button-2");
        assert_eq!(name_to_slug("HeroSection"), "hero-section");
    }

    #[test]
    fn test_round_trip_is_fixed_point() {
        for slug in ["my-card", "hero-section", "button", "data-table-row", "nav-bar"] {
            let name = slug_to_name(slug);
            assert_eq!(slug_to_name(&name_to_slug(&name)), name, "slug {slug}");
            assert_eq!(name_to_slug(&name), slug);
        }
    }

    #[test]
    fn test_digit_adjacency_is_reported_not_resolved() {
        assert_eq!(slug_to_name("button2"), slug_to_name("button-2"));

        let warnings = naming_warnings("button2");
        assert_eq!(
            warnings,
            vec![NamingWarning::DigitAdjacency {
                slug: "button2".into(),
                canonical: "button-2".into()
            }]
        );
        assert!(naming_warnings("button-2").is_empty());
        assert!(naming_warnings("my-card").is_empty());
    }

    #[test]
    fn test_single_letter_segments_warn() {
        let warnings = naming_warnings("a-b");
        assert!(matches!(
            warnings.as_slice(),
            [NamingWarning::RoundTripMismatch { .. }]
        ));
    }

    #[test]
    fn test_is_valid_name() {
        assert!(is_valid_name("MyCard"));
        assert!(is_valid_name("Card2"));
        assert!(!is_valid_name("myCard"));
        assert!(!is_valid_name("My-Card"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("2Card"));
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("my-card"));
        assert!(is_valid_slug("card-2"));
        assert!(!is_valid_slug("My-Card"));
        assert!(!is_valid_slug("my_card"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("../etc"));
    }

    #[test]
    fn test_extract_name_priority() {
        let code = r#"
export function Helper() {}
export const MyCard = () => <div />;
"#;
        // const wins over function regardless of position
        assert_eq!(extract_name_from_source(code).as_deref(), Some("MyCard"));

        let code = "export default function PricingTable() { return null }";
        assert_eq!(extract_name_from_source(code).as_deref(), Some("PricingTable"));

        let code = "const Hero = () => null;\nexport { Hero };";
        assert_eq!(extract_name_from_source(code).as_deref(), Some("Hero"));

        assert_eq!(extract_name_from_source("const x = 1;"), None);
    }
}
