//! Soup and index specifications.
//!
//! A soup is a named collection of JSON documents. Each soup declares an
//! ordered list of [`IndexSpec`]s; the order is significant and two spec
//! lists are only equal when they match position by position.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SpecError};

/// Supported index value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexType {
    String,
    Integer,
    Floating,
    FullText,
    Json1,
}

impl IndexType {
    /// All supported index types.
    pub const ALL: [IndexType; 5] = [
        IndexType::String,
        IndexType::Integer,
        IndexType::Floating,
        IndexType::FullText,
        IndexType::Json1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexType::String => "string",
            IndexType::Integer => "integer",
            IndexType::Floating => "floating",
            IndexType::FullText => "full_text",
            IndexType::Json1 => "json1",
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexType {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self> {
        IndexType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SpecError::UnknownIndexType(s.to_string()))
    }
}

/// Declaration of an indexed field path and its value type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IndexSpec {
    path: String,
    #[serde(rename = "type")]
    index_type: IndexType,
}

impl IndexSpec {
    /// Create an index spec. The path must be non-empty.
    pub fn new(path: impl Into<String>, index_type: IndexType) -> Result<Self> {
        let path = path.into();
        if path.trim().is_empty() {
            return Err(SpecError::EmptyIndexPath);
        }
        Ok(Self { path, index_type })
    }

    /// Create an index spec from an untyped `type` string.
    pub fn parse(path: impl Into<String>, index_type: &str) -> Result<Self> {
        Self::new(path, index_type.parse()?)
    }

    /// Shorthand for a string index.
    pub fn string(path: impl Into<String>) -> Result<Self> {
        Self::new(path, IndexType::String)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    /// Parse one `{"path": ..., "type": ...}` dictionary.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| SpecError::MalformedIndexSpec(format!("expected object, got {value}")))?;

        let path = obj
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| SpecError::MalformedIndexSpec(format!("missing \"path\" in {value}")))?;
        let index_type = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| SpecError::MalformedIndexSpec(format!("missing \"type\" in {value}")))?;

        Self::parse(path, index_type)
    }

    /// Parse a JSON array of index spec dictionaries.
    ///
    /// Fails on the first malformed entry and on an empty list.
    pub fn list_from_json(value: &Value) -> Result<Vec<Self>> {
        let items = value
            .as_array()
            .ok_or_else(|| SpecError::MalformedIndexSpec(format!("expected array, got {value}")))?;
        let specs = items.iter().map(Self::from_json).collect::<Result<Vec<_>>>()?;
        validate_index_specs(&specs)?;
        Ok(specs)
    }
}

impl<'de> Deserialize<'de> for IndexSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            path: String,
            #[serde(rename = "type")]
            index_type: String,
        }

        let raw = Raw::deserialize(deserializer)?;
        IndexSpec::parse(raw.path, &raw.index_type).map_err(serde::de::Error::custom)
    }
}

/// Check a list of index specs for a soup registration.
pub fn validate_index_specs(specs: &[IndexSpec]) -> Result<()> {
    if specs.is_empty() {
        return Err(SpecError::NoIndexSpecs);
    }
    Ok(())
}

/// Optional soup features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SoupFeature {
    /// Entries are kept outside the main database file.
    #[serde(rename = "externalStorage")]
    ExternalStorage,
}

impl SoupFeature {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoupFeature::ExternalStorage => "externalStorage",
        }
    }
}

impl FromStr for SoupFeature {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "externalStorage" => Ok(SoupFeature::ExternalStorage),
            other => Err(SpecError::UnknownFeature(other.to_string())),
        }
    }
}

/// Soup attributes: its name and enabled features.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoupSpec {
    name: String,
    features: Vec<SoupFeature>,
}

impl SoupSpec {
    /// A plain soup with no extra features.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Self::with_features(name, Vec::new())
    }

    /// A soup with the given features. Duplicate features are collapsed.
    pub fn with_features(name: impl Into<String>, mut features: Vec<SoupFeature>) -> Result<Self> {
        let name = name.into();
        validate_soup_name(&name)?;
        features.sort();
        features.dedup();
        Ok(Self { name, features })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn features(&self) -> &[SoupFeature] {
        &self.features
    }

    pub fn has_feature(&self, feature: SoupFeature) -> bool {
        self.features.contains(&feature)
    }
}

impl<'de> Deserialize<'de> for SoupSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            name: String,
            #[serde(default)]
            features: Vec<SoupFeature>,
        }

        let raw = Raw::deserialize(deserializer)?;
        SoupSpec::with_features(raw.name, raw.features).map_err(serde::de::Error::custom)
    }
}

/// Soup names must be non-empty.
pub fn validate_soup_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(SpecError::EmptySoupName);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_index_type_parse() {
        for t in IndexType::ALL {
            assert_eq!(t.as_str().parse::<IndexType>().unwrap(), t);
        }
        assert_eq!(
            "text".parse::<IndexType>().unwrap_err(),
            SpecError::UnknownIndexType("text".into())
        );
    }

    #[test]
    fn test_index_spec_rejects_empty_path() {
        assert_eq!(IndexSpec::string("").unwrap_err(), SpecError::EmptyIndexPath);
        assert_eq!(IndexSpec::string("   ").unwrap_err(), SpecError::EmptyIndexPath);
    }

    #[test]
    fn test_index_spec_from_json() {
        let specs = IndexSpec::list_from_json(&json!([
            {"path": "key", "type": "string"},
            {"path": "Id", "type": "integer"},
        ]))
        .unwrap();

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].path(), "key");
        assert_eq!(specs[0].index_type(), IndexType::String);
        assert_eq!(specs[1].index_type(), IndexType::Integer);
    }

    #[test]
    fn test_index_spec_from_json_split_dictionaries() {
        // path and type in separate dictionaries is not a valid spec
        let err = IndexSpec::list_from_json(&json!([{"path": "key"}, {"type": "string"}])).unwrap_err();
        assert!(matches!(err, SpecError::MalformedIndexSpec(_)));
    }

    #[test]
    fn test_index_spec_from_json_unknown_type() {
        let err = IndexSpec::list_from_json(&json!([{"path": "key", "type": "blob"}])).unwrap_err();
        assert_eq!(err, SpecError::UnknownIndexType("blob".into()));
    }

    #[test]
    fn test_index_spec_list_must_not_be_empty() {
        assert_eq!(
            IndexSpec::list_from_json(&json!([])).unwrap_err(),
            SpecError::NoIndexSpecs
        );
    }

    #[test]
    fn test_index_spec_serde() {
        let spec = IndexSpec::new("a.b", IndexType::FullText).unwrap();
        let encoded = serde_json::to_value(&spec).unwrap();
        assert_eq!(encoded, json!({"path": "a.b", "type": "full_text"}));

        let decoded: IndexSpec = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, spec);

        assert!(serde_json::from_value::<IndexSpec>(json!({"path": "", "type": "string"})).is_err());
    }

    #[test]
    fn test_soup_spec_features_dedup() {
        let spec = SoupSpec::with_features(
            "WONTONSOUP",
            vec![SoupFeature::ExternalStorage, SoupFeature::ExternalStorage],
        )
        .unwrap();
        assert_eq!(spec.features(), &[SoupFeature::ExternalStorage]);
        assert!(spec.has_feature(SoupFeature::ExternalStorage));
        assert_eq!(SoupSpec::new("").unwrap_err(), SpecError::EmptySoupName);
    }

    #[test]
    fn test_soup_spec_deserialize_normalizes() {
        let spec: SoupSpec = serde_json::from_value(json!({
            "name": "S",
            "features": ["externalStorage", "externalStorage"],
        }))
        .unwrap();
        assert_eq!(
            spec,
            SoupSpec::with_features("S", vec![SoupFeature::ExternalStorage]).unwrap()
        );

        let plain: SoupSpec = serde_json::from_value(json!({"name": "S"})).unwrap();
        assert_eq!(plain, SoupSpec::new("S").unwrap());

        assert!(serde_json::from_value::<SoupSpec>(json!({"name": ""})).is_err());
        assert!(serde_json::from_value::<SoupSpec>(json!({"name": "  "})).is_err());
    }
}
