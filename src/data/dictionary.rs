// ============================================================
// Layer 4 - Abbreviation Dictionary
// ============================================================
// Loaded once from a JSON object:
//
//   { "pt": ["patient", "physical therapy"], "bp": ["blood pressure"] }
//
// Keys are lowercased on load and on lookup. The map is never
// mutated after load, so one instance is shared by reference.
//
// serde's default map handling keeps the last of two duplicate
// keys without telling anyone, so the Deserialize impl below
// walks the object itself and rejects:
//   - empty keys
//   - duplicate keys, including ones that only collide after
//     lowercasing ("PT" and "pt")
//   - non-string keys or values (serde's own type errors)

use serde::de::{self, Deserialize, Deserializer, MapAccess, Visitor};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::domain::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbbreviationDictionary {
    entries: HashMap<String, Vec<String>>,
}

impl AbbreviationDictionary {
    /// Read and validate a dictionary file.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::config(format!("cannot read dictionary '{}': {e}", path.display()))
        })?;
        let dict = Self::from_json(&text).map_err(|e| match e {
            PipelineError::Config(msg) => {
                PipelineError::config(format!("dictionary '{}': {msg}", path.display()))
            }
            other => other,
        })?;
        if dict.is_empty() {
            tracing::warn!("Dictionary '{}' is empty; no line will match", path.display());
        }
        tracing::info!("Loaded {} abbreviations from '{}'", dict.len(), path.display());
        Ok(dict)
    }

    pub fn from_json(text: &str) -> PipelineResult<Self> {
        serde_json::from_str(text).map_err(|e| PipelineError::config(e.to_string()))
    }

    /// Expansions for `word` in dictionary order, empty if unknown.
    pub fn lookup(&self, word: &str) -> &[String] {
        self.entries
            .get(&normalize(word))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, word: &str) -> bool {
        self.entries.contains_key(&normalize(word))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every key and expansion, for building a vocabulary.
    pub fn surface_texts(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .flat_map(|(k, v)| std::iter::once(k.as_str()).chain(v.iter().map(String::as_str)))
    }
}

/// Case normalisation shared by load, lookup and candidate generation.
pub fn normalize(word: &str) -> String {
    word.to_lowercase()
}

impl<'de> Deserialize<'de> for AbbreviationDictionary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(DictionaryVisitor)
    }
}

struct DictionaryVisitor;

impl<'de> Visitor<'de> for DictionaryVisitor {
    type Value = AbbreviationDictionary;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object mapping abbreviations to lists of expansion strings")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries = HashMap::new();
        while let Some((key, expansions)) = map.next_entry::<String, Vec<String>>()? {
            if key.is_empty() {
                return Err(de::Error::custom("empty abbreviation key"));
            }
            let normalized = normalize(&key);
            if entries.insert(normalized, expansions).is_some() {
                return Err(de::Error::custom(format!("duplicate abbreviation key '{key}'")));
            }
        }
        Ok(AbbreviationDictionary { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_keeps_expansion_order() {
        let d = AbbreviationDictionary::from_json(
            r#"{"pt": ["patient", "physical therapy"]}"#,
        ).unwrap();
        assert_eq!(d.lookup("pt"), &["patient".to_string(), "physical therapy".to_string()]);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let d = AbbreviationDictionary::from_json(r#"{"PT": ["patient"]}"#).unwrap();
        assert!(d.contains("pt"));
        assert!(d.contains("Pt"));
        assert_eq!(d.lookup("pT").len(), 1);
    }

    #[test]
    fn test_unknown_word_gives_empty_slice() {
        let d = AbbreviationDictionary::from_json(r#"{"pt": ["patient"]}"#).unwrap();
        assert!(d.lookup("bp").is_empty());
    }

    #[test]
    fn test_rejects_non_object() {
        let err = AbbreviationDictionary::from_json(r#"["pt"]"#).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_rejects_non_string_values() {
        let err = AbbreviationDictionary::from_json(r#"{"pt": [1, 2]}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        let err = AbbreviationDictionary::from_json(r#"{"pt": "patient"}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_rejects_empty_key() {
        let err = AbbreviationDictionary::from_json(r#"{"": ["x"]}"#).unwrap_err();
        assert!(err.to_string().contains("empty abbreviation key"));
    }

    #[test]
    fn test_rejects_duplicate_keys_after_lowercasing() {
        let err = AbbreviationDictionary::from_json(
            r#"{"pt": ["patient"], "PT": ["physical therapy"]}"#,
        ).unwrap_err();
        assert!(err.to_string().contains("duplicate abbreviation key 'PT'"));
    }

    #[test]
    fn test_rejects_literal_duplicate_keys() {
        let err = AbbreviationDictionary::from_json(
            r#"{"pt": ["patient"], "pt": ["physical therapy"]}"#,
        ).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = AbbreviationDictionary::load(Path::new("/nonexistent/abbr.json")).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
