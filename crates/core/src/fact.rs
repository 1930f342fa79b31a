//! Fact domain types.
//!
//! A [`Fact`] is the only persisted entity: a scoped, categorised key/value
//! pair with a confidence estimate and provenance. Facts are created from a
//! [`FactDraft`], changed only through an explicit [`FactUpdate`], and read
//! back through a [`FactFilter`].

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use uuid::Uuid;

/// Maximum length of a fact key, in bytes.
pub const MAX_KEY_LEN: usize = 256;

/// Unique identifier for a stored fact. Assigned by the store, never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactId(pub String);

impl FactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FactId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authority tier of a fact.
///
/// Declaration order is the default priority: Session > Project > User > Org.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Session,
    Project,
    User,
    Org,
}

impl Scope {
    /// All scopes in default priority order.
    pub const ALL: [Scope; 4] = [Scope::Session, Scope::Project, Scope::User, Scope::Org];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Project => "project",
            Self::User => "user",
            Self::Org => "org",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known scope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scope '{0}' (expected session, project, user or org)")]
pub struct ParseScopeError(pub String);

impl FromStr for Scope {
    type Err = ParseScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "session" => Ok(Self::Session),
            "project" => Ok(Self::Project),
            "user" => Ok(Self::User),
            "org" | "organization" => Ok(Self::Org),
            _ => Err(ParseScopeError(s.to_string())),
        }
    }
}

/// The value held by a fact.
///
/// An explicit tagged variant. Serialized as `{"type": ..., "value": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FactValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Map(BTreeMap<String, FactValue>),
}

impl FactValue {
    /// Check that the value can be stored and rendered faithfully.
    ///
    /// Non-finite numbers have no JSON representation and are rejected.
    pub fn validate(&self) -> Result<(), StoreError> {
        match self {
            Self::Number(n) if !n.is_finite() => Err(StoreError::Serialization(format!(
                "number value must be finite, got {n}"
            ))),
            Self::Map(map) => map.values().try_for_each(FactValue::validate),
            _ => Ok(()),
        }
    }

    /// Serialize to the stored JSON representation.
    pub fn to_json(&self) -> Result<String, StoreError> {
        self.validate()?;
        serde_json::to_string(self)
            .map_err(|e| StoreError::Serialization(format!("value encode: {e}")))
    }

    /// Parse the stored JSON representation.
    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        let value: Self = serde_json::from_str(raw)
            .map_err(|e| StoreError::Serialization(format!("value decode: {e}")))?;
        value.validate()?;
        Ok(value)
    }

    /// Render as a single deterministic line.
    ///
    /// Text is JSON-quoted so embedded newlines and quotes are escaped; map
    /// keys are emitted in sorted order.
    pub fn render(&self) -> String {
        match self {
            Self::Text(s) => quote(s),
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Map(map) => {
                let fields: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", quote(k), v.render()))
                    .collect();
                format!("{{{}}}", fields.join(", "))
            }
        }
    }

    /// Short type label (`text`, `number`, `bool`, `map`).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Number(_) => "number",
            Self::Bool(_) => "bool",
            Self::Map(_) => "map",
        }
    }
}

fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

impl From<&str> for FactValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FactValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for FactValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for FactValue {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for FactValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<BTreeMap<String, FactValue>> for FactValue {
    fn from(map: BTreeMap<String, FactValue>) -> Self {
        Self::Map(map)
    }
}

/// A stored fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Store-assigned identifier
    pub id: FactId,

    /// Authority tier
    pub scope: Scope,

    /// Category tag (validated against the configured [`CategorySet`])
    pub category: String,

    /// Key, unique within `scope`
    pub key: String,

    /// The fact's value
    pub value: FactValue,

    /// Certainty estimate in [0.0, 1.0]
    pub confidence: f64,

    /// Who or what wrote this fact
    pub source: String,

    /// When this version of the fact was written
    pub created_at: DateTime<Utc>,
}

/// Input for [`FactStore::add`](crate::store::FactStore::add).
///
/// Everything except `id` and `created_at`, which the store assigns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactDraft {
    pub scope: Scope,
    pub category: String,
    pub key: String,
    pub value: FactValue,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_confidence() -> f64 {
    1.0
}

fn default_source() -> String {
    "manual".into()
}

impl FactDraft {
    /// Create a draft with full confidence and a `manual` source.
    pub fn new(
        scope: Scope,
        category: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<FactValue>,
    ) -> Self {
        Self {
            scope,
            category: category.into(),
            key: key.into(),
            value: value.into(),
            confidence: default_confidence(),
            source: default_source(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Validate the draft against the configured categories.
    pub fn validate(&self, categories: &CategorySet) -> Result<(), StoreError> {
        validate_key(&self.key)?;
        if !categories.contains(&self.category) {
            return Err(StoreError::InvalidFact(format!(
                "category '{}' is not one of [{}]",
                self.category,
                categories.names().join(", ")
            )));
        }
        validate_confidence(self.confidence)?;
        validate_source(&self.source)?;
        self.value.validate()
    }

    /// Turn the draft into a fact with a fresh id and timestamp.
    pub fn into_fact(self) -> Fact {
        Fact {
            id: FactId::new(),
            scope: self.scope,
            category: self.category,
            key: self.key,
            value: self.value,
            confidence: self.confidence,
            source: self.source,
            created_at: Utc::now(),
        }
    }
}

/// Replacement for the mutable fields of an existing fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactUpdate {
    pub value: FactValue,
    pub confidence: f64,
    pub source: String,
}

impl FactUpdate {
    pub fn new(value: impl Into<FactValue>, confidence: f64, source: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            confidence,
            source: source.into(),
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        validate_confidence(self.confidence)?;
        validate_source(&self.source)?;
        self.value.validate()
    }

    /// Apply to an existing fact, producing its next version. Keeps `id`,
    /// `scope`, `category` and `key`; stamps a new `created_at`.
    pub fn apply(self, fact: &Fact) -> Fact {
        Fact {
            id: fact.id.clone(),
            scope: fact.scope,
            category: fact.category.clone(),
            key: fact.key.clone(),
            value: self.value,
            confidence: self.confidence,
            source: self.source,
            created_at: Utc::now(),
        }
    }
}

/// Filter for [`FactStore::query`](crate::store::FactStore::query).
/// Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,
}

impl FactFilter {
    /// A filter that matches every fact.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn min_confidence(mut self, min: f64) -> Self {
        self.min_confidence = Some(min);
        self
    }

    pub fn matches(&self, fact: &Fact) -> bool {
        self.scope.is_none_or(|s| fact.scope == s)
            && self
                .category
                .as_deref()
                .is_none_or(|c| fact.category == c)
            && self.min_confidence.is_none_or(|m| fact.confidence >= m)
    }
}

/// The set of categories a store accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategorySet(BTreeSet<String>);

impl CategorySet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for CategorySet {
    fn default() -> Self {
        Self::new(["fact", "preference", "decision", "constraint"])
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.trim().is_empty() {
        return Err(StoreError::InvalidFact("key must not be empty".into()));
    }
    if key.trim() != key {
        return Err(StoreError::InvalidFact(format!(
            "key '{key}' has leading or trailing whitespace"
        )));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(StoreError::InvalidFact(format!(
            "key is {} bytes, limit is {MAX_KEY_LEN}",
            key.len()
        )));
    }
    if key.chars().any(char::is_control) {
        return Err(StoreError::InvalidFact(
            "key must not contain control characters".into(),
        ));
    }
    Ok(())
}

fn validate_confidence(confidence: f64) -> Result<(), StoreError> {
    if !(0.0..=1.0).contains(&confidence) {
        return Err(StoreError::InvalidFact(format!(
            "confidence must be within [0.0, 1.0], got {confidence}"
        )));
    }
    Ok(())
}

fn validate_source(source: &str) -> Result<(), StoreError> {
    if source.trim().is_empty() {
        return Err(StoreError::InvalidFact("source must not be empty".into()));
    }
    if source.chars().any(char::is_control) {
        return Err(StoreError::InvalidFact(
            "source must not contain control characters".into(),
        ));
    }
    Ok(())
}
