//! Backend analysis result
//!
//! The result is persisted verbatim and read back by several consumers. The
//! typed views below are lenient: missing or mistyped fields become defaults
//! instead of failing the whole read.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Analysis response, kept both as the exact body text and as parsed JSON
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    raw: String,
    value: Value,
}

impl AnalysisResult {
    /// Parse a response body
    ///
    /// Returns `None` unless the body is a JSON object carrying
    /// `identity_snapshot_v1`.
    pub fn parse(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        if !value.as_object()?.contains_key("identity_snapshot_v1") {
            return None;
        }
        Some(Self {
            raw: raw.to_string(),
            value,
        })
    }

    /// Exact body text as received
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn identity(&self) -> IdentitySnapshot {
        self.section("identity_snapshot_v1").unwrap_or_default()
    }

    pub fn outfit_catalog(&self) -> OutfitCatalog {
        self.section("outfit_catalog_v1").unwrap_or_default()
    }

    pub fn barber_section(&self) -> Option<BarberSection> {
        self.section("barber_section")
    }

    pub fn beard_section(&self) -> Option<BeardSection> {
        self.section("beard_section")
    }

    fn section<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.value
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySnapshot {
    pub face_shape: Option<String>,
    pub face_confidence: Option<f64>,
    pub body_type: Option<String>,
    pub body_confidence: Option<f64>,
    pub skin_tone: Option<String>,
    pub skin_undertone: Option<String>,
    pub skin_confidence: Option<f64>,
    pub seasonal_palette: Option<String>,
    pub best_colors: Vec<String>,
    pub avoid_colors: Vec<String>,
    pub overall_archetype: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutfitCatalog {
    pub contexts: Vec<OutfitContext>,
    pub total_outfits: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutfitContext {
    pub context_name: String,
    pub outfits: Vec<OutfitItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutfitItem {
    pub title: String,
    pub head_to_toe: Vec<String>,
    pub why_it_works: String,
    pub visual_spec: String,
    pub outfit_id: Option<String>,
}

/// Hairstyle or beard style recommendation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleItem {
    pub name: String,
    pub description: String,
    pub why_it_works: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarberSection {
    pub face_shape: Option<String>,
    pub hairstyles: Vec<StyleItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeardSection {
    pub beard_styles: Vec<StyleItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_requires_identity_snapshot() {
        assert!(AnalysisResult::parse(r#"{"outfit_catalog_v1": {}}"#).is_none());
        assert!(AnalysisResult::parse(r#"[1, 2]"#).is_none());
        assert!(AnalysisResult::parse("not json").is_none());
        assert!(AnalysisResult::parse(r#"{"identity_snapshot_v1": {}}"#).is_some());
    }

    #[test]
    fn test_raw_is_kept_verbatim() {
        let body = r#"{ "identity_snapshot_v1" : {"face_shape":"Oval"} ,"x":1}"#;
        let result = AnalysisResult::parse(body).unwrap();
        assert_eq!(result.raw(), body);
        assert_eq!(result.identity().face_shape.as_deref(), Some("Oval"));
    }

    #[test]
    fn test_lenient_sections() {
        let body = r#"{
            "identity_snapshot_v1": {"face_shape": "Oval", "face_confidence": "high"},
            "outfit_catalog_v1": {"contexts": [{"context_name": "Office", "outfits": [{"title": "Navy suit"}]}]},
            "beard_section": {"beard_styles": [{"name": "Stubble"}]}
        }"#;
        let result = AnalysisResult::parse(body).unwrap();

        // Mistyped confidence makes the whole snapshot fall back to default
        assert_eq!(result.identity(), IdentitySnapshot::default());

        let catalog = result.outfit_catalog();
        assert_eq!(catalog.contexts[0].context_name, "Office");
        assert_eq!(catalog.contexts[0].outfits[0].title, "Navy suit");
        assert!(result.barber_section().is_none());
        assert_eq!(result.beard_section().unwrap().beard_styles[0].name, "Stubble");
    }
}
