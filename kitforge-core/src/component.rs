//! Component records and their typed metadata
//!
//! Variant and prop metadata arrive from the generator as loose JSON. They are
//! parsed into closed types here so malformed metadata is rejected at the
//! boundary instead of deep inside the registry or the catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{KitforgeError, Result};
use crate::naming;

/// Variant axes: axis name → ordered, duplicate-free value list
///
/// `{"size": ["sm", "lg"], "tone": ["neutral", "danger"]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Vec<String>>", into = "BTreeMap<String, Vec<String>>")]
pub struct Variants(BTreeMap<String, Vec<String>>);

impl Variants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse untrusted JSON metadata into variants
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| KitforgeError::Validation(format!("invalid variants: {e}")))
    }

    /// Add an axis, validating it like any parsed input
    pub fn with_axis<I, S>(mut self, axis: &str, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        validate_axis(axis, &values)?;
        self.0.insert(axis.to_string(), values);
        Ok(self)
    }

    pub fn axes(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn get(&self, axis: &str) -> Option<&[String]> {
        self.0.get(axis).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

fn validate_axis(axis: &str, values: &[String]) -> Result<()> {
    if axis.trim().is_empty() {
        return Err(KitforgeError::Validation(
            "variant axis name cannot be empty".to_string(),
        ));
    }
    for (i, value) in values.iter().enumerate() {
        if value.trim().is_empty() {
            return Err(KitforgeError::Validation(format!(
                "variant axis '{axis}' has an empty value"
            )));
        }
        if values[..i].contains(value) {
            return Err(KitforgeError::Validation(format!(
                "variant axis '{axis}' lists '{value}' more than once"
            )));
        }
    }
    Ok(())
}

impl TryFrom<BTreeMap<String, Vec<String>>> for Variants {
    type Error = KitforgeError;

    fn try_from(map: BTreeMap<String, Vec<String>>) -> Result<Self> {
        for (axis, values) in &map {
            validate_axis(axis, values)?;
        }
        Ok(Variants(map))
    }
}

impl From<Variants> for BTreeMap<String, Vec<String>> {
    fn from(variants: Variants) -> Self {
        variants.0
    }
}

/// Type of a component prop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PropType {
    String,
    Number,
    Boolean,
    Enum { values: Vec<String> },
    Node,
    Function,
}

/// A single prop: its type plus optional documentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropDescriptor {
    #[serde(flatten)]
    pub kind: PropType,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Prop metadata keyed by prop name
pub type Props = BTreeMap<String, PropDescriptor>;

/// Parse untrusted JSON prop metadata
pub fn props_from_json(value: &serde_json::Value) -> Result<Props> {
    serde_json::from_value(value.clone())
        .map_err(|e| KitforgeError::Validation(format!("invalid props: {e}")))
}

/// How a consumer installs the component
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installation {
    /// npm packages the component imports
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Other registry components this one renders
    #[serde(default)]
    pub registry_dependencies: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Authoritative catalog record for one component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    pub id: String,
    pub slug: String,
    /// Export identifier, always `slug_to_name(slug)`. Also shown as the
    /// display name; there is no separate free-form title.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub code: String,
    #[serde(default)]
    pub variants: Variants,
    #[serde(default)]
    pub props: Props,
    #[serde(default)]
    pub installation: Installation,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a component
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDraft {
    pub slug: String,
    /// Export name; extracted from `code` when absent
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub code: String,
    #[serde(default)]
    pub variants: Variants,
    #[serde(default)]
    pub props: Props,
    #[serde(default)]
    pub installation: Installation,
}

impl ComponentDraft {
    pub fn new(slug: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            code: code.into(),
            ..Self::default()
        }
    }

    /// Resolve and check the export name for this draft
    ///
    /// The name is taken from the draft, else extracted from the source. It
    /// must equal the PascalCase form of the slug.
    pub fn resolve_name(&self) -> Result<String> {
        naming::validate_slug(&self.slug)?;

        let name = match &self.name {
            Some(name) => name.clone(),
            None => naming::extract_name_from_source(&self.code).ok_or_else(|| {
                KitforgeError::Validation(format!(
                    "no name given for '{}' and none found in its source",
                    self.slug
                ))
            })?,
        };

        naming::validate_name(&name)?;
        ensure_name_matches_slug(&self.slug, &name)?;
        Ok(name)
    }

    /// Turn a validated draft into a fresh record
    pub fn into_record(self, name: String) -> ComponentRecord {
        let now = Utc::now();
        ComponentRecord {
            id: uuid::Uuid::now_v7().to_string(),
            slug: self.slug,
            name,
            description: self.description,
            category: self.category,
            code: self.code,
            variants: self.variants,
            props: self.props,
            installation: self.installation,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentPatch {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub variants: Option<Variants>,
    #[serde(default)]
    pub props: Option<Props>,
    #[serde(default)]
    pub installation: Option<Installation>,
}

impl ComponentPatch {
    /// Apply the patch to a copy of `record` and validate the result
    ///
    /// A slug change without an explicit name re-derives the name.
    pub fn apply(&self, record: &ComponentRecord) -> Result<ComponentRecord> {
        let mut next = record.clone();

        if let Some(slug) = &self.slug {
            naming::validate_slug(slug)?;
            next.slug = slug.clone();
        }
        match (&self.name, &self.slug) {
            (Some(name), _) => next.name = name.clone(),
            (None, Some(slug)) => next.name = naming::slug_to_name(slug),
            (None, None) => {}
        }
        if let Some(description) = &self.description {
            next.description = description.clone();
        }
        if let Some(category) = &self.category {
            next.category = category.clone();
        }
        if let Some(code) = &self.code {
            next.code = code.clone();
        }
        if let Some(variants) = &self.variants {
            next.variants = variants.clone();
        }
        if let Some(props) = &self.props {
            next.props = props.clone();
        }
        if let Some(installation) = &self.installation {
            next.installation = installation.clone();
        }

        naming::validate_name(&next.name)?;
        ensure_name_matches_slug(&next.slug, &next.name)?;
        if next.code.trim().is_empty() {
            return Err(KitforgeError::Validation(
                "component code cannot be empty".to_string(),
            ));
        }

        next.updated_at = Utc::now();
        Ok(next)
    }
}

fn ensure_name_matches_slug(slug: &str, name: &str) -> Result<()> {
    let expected = naming::slug_to_name(slug);
    if name != expected {
        return Err(KitforgeError::Validation(format!(
            "name '{name}' does not match slug '{slug}' (expected '{expected}')"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_variants_preserve_value_order() {
        let variants = Variants::from_json(&json!({"size": ["sm", "lg", "md"]})).unwrap();
        assert_eq!(variants.get("size").unwrap(), &["sm", "lg", "md"]);
        assert_eq!(
            serde_json::to_value(&variants).unwrap(),
            json!({"size": ["sm", "lg", "md"]})
        );
    }

    #[test]
    fn test_variants_reject_malformed_metadata() {
        assert!(Variants::from_json(&json!({"size": "sm"})).is_err());
        assert!(Variants::from_json(&json!({"size": [1, 2]})).is_err());
        assert!(Variants::from_json(&json!({"size": ["sm", "sm"]})).is_err());
        assert!(Variants::from_json(&json!({"": ["sm"]})).is_err());
        assert!(Variants::from_json(&json!(["sm"])).is_err());
    }

    #[test]
    fn test_props_parse_tagged_types() {
        let props = props_from_json(&json!({
            "variant": {"type": "enum", "values": ["primary", "ghost"], "required": true},
            "onClick": {"type": "function"},
            "label": {"type": "string", "default": "Click"}
        }))
        .unwrap();

        assert_eq!(
            props["variant"].kind,
            PropType::Enum {
                values: vec!["primary".into(), "ghost".into()]
            }
        );
        assert!(props["variant"].required);
        assert_eq!(props["onClick"].kind, PropType::Function);
        assert_eq!(props["label"].default, Some(json!("Click")));

        assert!(props_from_json(&json!({"x": {"type": "date"}})).is_err());
    }

    #[test]
    fn test_draft_name_from_source() {
        let draft = ComponentDraft::new("my-card", "export const MyCard = () => null;");
        assert_eq!(draft.resolve_name().unwrap(), "MyCard");
    }

    #[test]
    fn test_draft_name_must_match_slug() {
        let mut draft = ComponentDraft::new("my-card", "export const Other = () => null;");
        assert!(matches!(
            draft.resolve_name(),
            Err(KitforgeError::Validation(_))
        ));

        draft.name = Some("MyCard".into());
        assert_eq!(draft.resolve_name().unwrap(), "MyCard");
    }

    #[test]
    fn test_patch_slug_change_rederives_name() {
        let record = ComponentDraft::new("my-card", "export const MyCard = 1;")
            .into_record("MyCard".into());
        let patch = ComponentPatch {
            slug: Some("hero-card".into()),
            code: Some("export const HeroCard = 1;".into()),
            ..Default::default()
        };

        let next = patch.apply(&record).unwrap();
        assert_eq!(next.slug, "hero-card");
        assert_eq!(next.name, "HeroCard");
        assert_eq!(next.id, record.id);
        assert_eq!(next.created_at, record.created_at);
    }

    #[test]
    fn test_patch_rejects_free_form_name() {
        let record = ComponentDraft::new("my-card", "export const MyCard = 1;")
            .into_record("MyCard".into());
        let patch = ComponentPatch {
            name: Some("Fancy Card".into()),
            ..Default::default()
        };
        assert!(matches!(
            patch.apply(&record),
            Err(KitforgeError::Validation(_))
        ));

        let patch = ComponentPatch {
            name: Some("MyCard".into()),
            ..Default::default()
        };
        let next = patch.apply(&record).unwrap();
        assert_eq!(next.name, naming::slug_to_name(&next.slug));
    }

    #[test]
    fn test_patch_rejects_empty_code() {
        let record = ComponentDraft::new("my-card", "x").into_record("MyCard".into());
        let patch = ComponentPatch {
            code: Some("  ".into()),
            ..Default::default()
        };
        assert!(patch.apply(&record).is_err());
    }
}
