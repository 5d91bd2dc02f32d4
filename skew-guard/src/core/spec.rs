//! Feature specifications: keys, null policy and per-feature rules.
//!
//! A [`FeatureSpec`] is validated once when it is built or loaded and is
//! immutable afterwards. Specs are plain serde documents, so they can be
//! stored as JSON or TOML next to the pipelines they describe:
//!
//! ```json
//! {
//!   "version": 1,
//!   "keys": ["user_id"],
//!   "null_policy": "same",
//!   "features": [
//!     { "name": "spend_7d", "kind": "numeric", "abs": 0.01, "rel": 0.001 },
//!     { "name": "country", "kind": "categorical", "allowed": ["UK", "US"], "nullable": false },
//!     { "name": "age", "kind": "exact", "range": { "min": 0, "max": 120 } }
//!   ]
//! }
//! ```

use crate::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// How null observations interact between the two sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullPolicy {
    /// Both sides must agree on null versus non-null.
    #[default]
    Same,
    /// A pair where both sides are null always matches, even for
    /// non-nullable features. A single-sided null is still a violation.
    AllowBothNull,
}

impl fmt::Display for NullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NullPolicy::Same => write!(f, "same"),
            NullPolicy::AllowBothNull => write!(f, "allow_both_null"),
        }
    }
}

/// Inclusive numeric bounds for the advisory range check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    /// Lower bound (inclusive)
    pub min: f64,
    /// Upper bound (inclusive)
    pub max: f64,
}

impl ValueRange {
    /// Returns true if `value` lies within `[min, max]`.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// The comparison rule applied to one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureKind {
    /// Numeric comparison with optional absolute and relative tolerances.
    ///
    /// A pair matches when *either* tolerance is satisfied. With neither set
    /// the values must be exactly equal.
    Numeric {
        /// Absolute tolerance
        #[serde(default, skip_serializing_if = "Option::is_none")]
        abs: Option<f64>,
        /// Relative tolerance, scaled by the larger magnitude of the pair
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rel: Option<f64>,
    },
    /// Case-sensitive string equality, with optional unknown-value detection.
    Categorical {
        /// The known-value universe
        #[serde(default, skip_serializing_if = "Option::is_none")]
        allowed: Option<Vec<String>>,
    },
    /// Advisory bounds check; values are compared with exact numeric equality.
    Range {
        /// Lower bound (inclusive)
        min: f64,
        /// Upper bound (inclusive)
        max: f64,
    },
    /// Natural equality for strings, booleans and timestamps.
    Exact,
}

impl FeatureKind {
    /// Short name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::Numeric { .. } => "numeric",
            FeatureKind::Categorical { .. } => "categorical",
            FeatureKind::Range { .. } => "range",
            FeatureKind::Exact => "exact",
        }
    }

    /// Returns true for kinds that produce an absolute difference.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FeatureKind::Numeric { .. } | FeatureKind::Range { .. })
    }
}

fn default_nullable() -> bool {
    true
}

/// One declared feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRule {
    /// Column name, unique within the spec
    pub name: String,
    /// Comparison rule
    #[serde(flatten)]
    pub kind: FeatureKind,
    /// When false, any null observation is a violation
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Optional advisory bounds, usable alongside any kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<ValueRange>,
}

impl FeatureRule {
    fn with_kind(name: impl Into<String>, kind: FeatureKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
            range: None,
        }
    }

    /// A numeric feature with no tolerance (exact equality).
    pub fn numeric(name: impl Into<String>) -> Self {
        Self::with_kind(name, FeatureKind::Numeric { abs: None, rel: None })
    }

    /// A categorical feature with no declared universe.
    pub fn categorical(name: impl Into<String>) -> Self {
        Self::with_kind(name, FeatureKind::Categorical { allowed: None })
    }

    /// An exact-equality feature.
    pub fn exact(name: impl Into<String>) -> Self {
        Self::with_kind(name, FeatureKind::Exact)
    }

    /// A range-only feature.
    pub fn range(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self::with_kind(name, FeatureKind::Range { min, max })
    }

    /// Sets the absolute tolerance, turning the rule numeric if needed.
    pub fn with_abs(mut self, tolerance: f64) -> Self {
        let rel = match self.kind {
            FeatureKind::Numeric { rel, .. } => rel,
            _ => None,
        };
        self.kind = FeatureKind::Numeric {
            abs: Some(tolerance),
            rel,
        };
        self
    }

    /// Sets the relative tolerance, turning the rule numeric if needed.
    pub fn with_rel(mut self, tolerance: f64) -> Self {
        let abs = match self.kind {
            FeatureKind::Numeric { abs, .. } => abs,
            _ => None,
        };
        self.kind = FeatureKind::Numeric {
            abs,
            rel: Some(tolerance),
        };
        self
    }

    /// Declares the known-value universe, turning the rule categorical if needed.
    pub fn with_allowed<I, S>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kind = FeatureKind::Categorical {
            allowed: Some(allowed.into_iter().map(Into::into).collect()),
        };
        self
    }

    /// Attaches advisory bounds.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.range = Some(ValueRange { min, max });
        self
    }

    /// Sets whether nulls are acceptable.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// The effective advisory bounds: the `range` attribute, or the bounds
    /// of a `Range` kind.
    pub fn effective_range(&self) -> Option<ValueRange> {
        match (&self.range, &self.kind) {
            (Some(range), _) => Some(*range),
            (None, FeatureKind::Range { min, max }) => Some(ValueRange {
                min: *min,
                max: *max,
            }),
            _ => None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SkewError::schema("feature name must not be empty"));
        }
        match &self.kind {
            FeatureKind::Numeric { abs, rel } => {
                for (label, tolerance) in [("abs", abs), ("rel", rel)] {
                    if let Some(t) = tolerance {
                        if !t.is_finite() || *t < 0.0 {
                            return Err(SkewError::schema(format!(
                                "feature '{}': {label} tolerance must be a finite value >= 0, \
                                 got {t}",
                                self.name
                            )));
                        }
                    }
                }
            }
            FeatureKind::Categorical {
                allowed: Some(allowed),
            } => {
                let mut seen = HashSet::with_capacity(allowed.len());
                for value in allowed {
                    if !seen.insert(value.as_str()) {
                        return Err(SkewError::schema(format!(
                            "feature '{}': category '{value}' is listed more than once",
                            self.name
                        )));
                    }
                }
            }
            FeatureKind::Range { min, max } => validate_bounds(&self.name, *min, *max)?,
            FeatureKind::Categorical { allowed: None } | FeatureKind::Exact => {}
        }
        if let Some(range) = &self.range {
            validate_bounds(&self.name, range.min, range.max)?;
        }
        Ok(())
    }
}

fn validate_bounds(feature: &str, min: f64, max: f64) -> Result<()> {
    if !min.is_finite() || !max.is_finite() || min > max {
        return Err(SkewError::schema(format!(
            "feature '{feature}': range [{min}, {max}] is invalid"
        )));
    }
    Ok(())
}

fn default_version() -> u32 {
    1
}

/// A validated, immutable description of what to compare and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    #[serde(default = "default_version")]
    version: u32,
    keys: Vec<String>,
    #[serde(default)]
    null_policy: NullPolicy,
    #[serde(default)]
    features: Vec<FeatureRule>,
}

impl FeatureSpec {
    /// Starts building a spec.
    pub fn builder() -> FeatureSpecBuilder {
        FeatureSpecBuilder::default()
    }

    /// Parses and validates a JSON spec.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let spec: FeatureSpec = serde_json::from_str(text)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parses and validates a TOML spec.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let spec: FeatureSpec = toml::from_str(text)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Loads a spec file, choosing the format from the extension
    /// (`.toml`, otherwise JSON).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let spec = if is_toml {
            Self::from_toml_str(&text)
        } else {
            Self::from_json_str(&text)
        };
        spec.with_context(|| format!("Failed to load feature spec {}", path.display()))
    }

    /// Serializes the spec back to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.keys.is_empty() {
            return Err(SkewError::schema("at least one key column is required"));
        }
        let mut keys = HashSet::with_capacity(self.keys.len());
        for key in &self.keys {
            if key.trim().is_empty() {
                return Err(SkewError::schema("key column names must not be empty"));
            }
            if !keys.insert(key.as_str()) {
                return Err(SkewError::schema(format!("key '{key}' is declared more than once")));
            }
        }

        let mut names = HashSet::with_capacity(self.features.len());
        for feature in &self.features {
            feature.validate()?;
            if keys.contains(feature.name.as_str()) {
                return Err(SkewError::schema(format!(
                    "feature '{}' is also declared as a key",
                    feature.name
                )));
            }
            if !names.insert(feature.name.as_str()) {
                return Err(SkewError::schema(format!(
                    "feature '{}' is declared more than once",
                    feature.name
                )));
            }
        }
        Ok(())
    }

    /// Spec format version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Key columns, in order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// The null policy.
    pub fn null_policy(&self) -> NullPolicy {
        self.null_policy
    }

    /// Declared features, in order.
    pub fn features(&self) -> &[FeatureRule] {
        &self.features
    }

    /// Looks up a feature by name.
    pub fn feature(&self, name: &str) -> Option<&FeatureRule> {
        self.features.iter().find(|f| f.name == name)
    }
}

/// Builder for [`FeatureSpec`].
#[derive(Debug, Clone)]
pub struct FeatureSpecBuilder {
    version: u32,
    keys: Vec<String>,
    null_policy: NullPolicy,
    features: Vec<FeatureRule>,
}

impl Default for FeatureSpecBuilder {
    fn default() -> Self {
        Self {
            version: default_version(),
            keys: Vec::new(),
            null_policy: NullPolicy::default(),
            features: Vec::new(),
        }
    }
}

impl FeatureSpecBuilder {
    /// Sets the spec version.
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Appends a key column.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.keys.push(key.into());
        self
    }

    /// Appends several key columns.
    pub fn keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Sets the null policy.
    pub fn null_policy(mut self, policy: NullPolicy) -> Self {
        self.null_policy = policy;
        self
    }

    /// Appends a feature rule.
    pub fn feature(mut self, rule: FeatureRule) -> Self {
        self.features.push(rule);
        self
    }

    /// Validates and builds the spec.
    pub fn build(self) -> Result<FeatureSpec> {
        let spec = FeatureSpec {
            version: self.version,
            keys: self.keys,
            null_policy: self.null_policy,
            features: self.features,
        };
        spec.validate()?;
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC_JSON: &str = r#"{
        "version": 1,
        "keys": ["user_id", "ts"],
        "null_policy": "same",
        "features": [
            { "name": "spend_7d", "kind": "numeric", "abs": 0.01, "rel": 0.001 },
            {
                "name": "country",
                "kind": "categorical",
                "allowed": ["UK", "US", "DE"],
                "nullable": false
            },
            { "name": "age", "kind": "exact", "nullable": false, "range": { "min": 0, "max": 120 } }
        ]
    }"#;

    #[test]
    fn test_parse_json_spec() {
        let spec = FeatureSpec::from_json_str(SPEC_JSON).unwrap();
        assert_eq!(spec.version(), 1);
        assert_eq!(spec.keys(), &["user_id".to_string(), "ts".to_string()]);
        assert_eq!(spec.null_policy(), NullPolicy::Same);
        assert_eq!(spec.features().len(), 3);
        assert_eq!(
            spec.feature("spend_7d").unwrap().kind,
            FeatureKind::Numeric {
                abs: Some(0.01),
                rel: Some(0.001)
            }
        );
        assert!(!spec.feature("country").unwrap().nullable);
        assert!(spec.feature("spend_7d").unwrap().nullable);
        assert_eq!(
            spec.feature("age").unwrap().effective_range(),
            Some(ValueRange { min: 0.0, max: 120.0 })
        );
    }

    #[test]
    fn test_json_round_trip() {
        let spec = FeatureSpec::from_json_str(SPEC_JSON).unwrap();
        let again = FeatureSpec::from_json_str(&spec.to_json_pretty().unwrap()).unwrap();
        assert_eq!(spec, again);
    }

    #[test]
    fn test_parse_toml_spec() {
        let text = r#"
keys = ["id"]
null_policy = "allow_both_null"

[[features]]
name = "x"
kind = "numeric"
rel = 0.05

[[features]]
name = "label"
kind = "exact"
"#;
        let spec = FeatureSpec::from_toml_str(text).unwrap();
        assert_eq!(spec.version(), 1);
        assert_eq!(spec.null_policy(), NullPolicy::AllowBothNull);
        assert_eq!(spec.features()[1].kind, FeatureKind::Exact);
    }

    #[test]
    fn test_duplicate_feature_names_rejected() {
        let err = FeatureSpec::builder()
            .key("id")
            .feature(FeatureRule::numeric("f"))
            .feature(FeatureRule::numeric("f"))
            .build()
            .unwrap_err();
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_feature_overlapping_key_rejected() {
        let err = FeatureSpec::builder()
            .key("id")
            .feature(FeatureRule::exact("id"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("also declared as a key"));
    }

    #[test]
    fn test_keys_required_and_unique() {
        assert!(FeatureSpec::builder().build().is_err());
        assert!(FeatureSpec::builder().keys(["id", "id"]).build().is_err());
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let err = FeatureSpec::builder()
            .key("id")
            .feature(FeatureRule::numeric("f").with_abs(-0.1))
            .build()
            .unwrap_err();
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_invalid_range_order_rejected() {
        assert!(FeatureSpec::builder()
            .key("id")
            .feature(FeatureRule::numeric("age").with_range(10.0, 0.0))
            .build()
            .is_err());
        assert!(FeatureSpec::builder()
            .key("id")
            .feature(FeatureRule::range("age", 10.0, 0.0))
            .build()
            .is_err());
    }

    #[test]
    fn test_duplicate_categories_rejected() {
        let err = FeatureSpec::builder()
            .key("id")
            .feature(FeatureRule::categorical("c").with_allowed(["A", "A"]))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_tolerance_builders_compose() {
        let rule = FeatureRule::numeric("x").with_abs(0.01).with_rel(0.02);
        assert_eq!(
            rule.kind,
            FeatureKind::Numeric {
                abs: Some(0.01),
                rel: Some(0.02)
            }
        );
    }

    #[test]
    fn test_unknown_kind_is_a_serialization_error() {
        let err = FeatureSpec::from_json_str(
            r#"{"keys": ["id"], "features": [{"name": "x", "kind": "fuzzy"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SkewError::Serialization(_)));
    }
}
