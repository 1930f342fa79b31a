//! Contextual fact selection.
//!
//! Picks the facts that belong in a prompt for one request:
//!
//! 1. **Relevance**: keep facts whose category is admitted for the
//!    request type (unknown types get `default_categories`, empty unless
//!    configured).
//! 2. **Confidence**: drop facts below `min_confidence`.
//! 3. **Conflicts**: group by key across scopes; a group holding more than
//!    one distinct value is reported, whatever the resolution policy.
//! 4. **Resolution**: with `allow_conflicts = false` only the
//!    highest-priority fact per key survives.
//! 5. **Ordering**: scope rank ascending, confidence descending, then
//!    earliest `created_at`.
//! 6. **Bounding**: at most `max_facts` facts are returned.
//!
//! Selection is pure: it reads a snapshot and never touches the store.

use factctx_config::SelectionConfig;
use factctx_core::error::{Error, Result};
use factctx_core::fact::{Fact, FactId, FactValue, Scope};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

// ── Types ─────────────────────────────────────────────────────────────────

/// What the caller is asking for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Looked up in the relevance map.
    pub request_type: String,
}

impl RequestContext {
    pub fn new(request_type: impl Into<String>) -> Self {
        Self {
            request_type: request_type.into(),
        }
    }
}

/// Selection options.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionOptions {
    pub min_confidence: f64,
    pub max_facts: usize,
    pub allow_conflicts: bool,
    /// Highest authority first.
    pub scope_priority_order: Vec<Scope>,
    /// Request type → admissible categories.
    pub relevance_map: BTreeMap<String, BTreeSet<String>>,
    /// Admissible categories for request types absent from the map.
    pub default_categories: BTreeSet<String>,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            min_confidence: 0.7,
            max_facts: 3,
            allow_conflicts: true,
            scope_priority_order: Scope::ALL.to_vec(),
            relevance_map: BTreeMap::new(),
            default_categories: BTreeSet::new(),
        }
    }
}

impl SelectionOptions {
    /// Build typed options from the `[selection]` config section.
    pub fn from_config(config: &SelectionConfig) -> Result<Self> {
        let options = Self {
            min_confidence: config.min_confidence,
            max_facts: config.max_facts,
            allow_conflicts: config.allow_conflicts,
            scope_priority_order: config.scope_order()?,
            relevance_map: config
                .relevance_map
                .iter()
                .map(|(kind, cats)| (kind.clone(), cats.iter().cloned().collect()))
                .collect(),
            default_categories: config.default_categories.iter().cloned().collect(),
        };
        options.validate()?;
        Ok(options)
    }

    /// Admit `categories` for `request_type`.
    pub fn with_relevance<I, S>(mut self, request_type: impl Into<String>, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relevance_map.insert(
            request_type.into(),
            categories.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_facts == 0 {
            return Err(Error::config("max_facts must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(Error::config(format!(
                "min_confidence must be within [0.0, 1.0], got {}",
                self.min_confidence
            )));
        }
        let distinct: HashSet<Scope> = self.scope_priority_order.iter().copied().collect();
        if self.scope_priority_order.len() != Scope::ALL.len() || distinct.len() != Scope::ALL.len()
        {
            return Err(Error::config(
                "scope_priority_order must list session, project, user and org exactly once",
            ));
        }
        Ok(())
    }

    /// Position of `scope` in the priority order (0 = highest authority).
    pub fn rank(&self, scope: Scope) -> usize {
        self.scope_priority_order
            .iter()
            .position(|s| *s == scope)
            .unwrap_or(usize::MAX)
    }

    /// Categories admitted for `request_type`.
    pub fn categories_for(&self, request_type: &str) -> &BTreeSet<String> {
        self.relevance_map
            .get(request_type)
            .unwrap_or(&self.default_categories)
    }

    /// Total priority order over facts.
    ///
    /// Scope rank, then confidence (higher first), then `created_at`
    /// (earlier first). Key and id break any remaining tie.
    pub fn priority(&self, a: &Fact, b: &Fact) -> Ordering {
        self.rank(a.scope)
            .cmp(&self.rank(b.scope))
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.key.cmp(&b.key))
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// One member of a conflicting group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    pub id: FactId,
    pub scope: Scope,
    pub value: FactValue,
    pub confidence: f64,
}

impl From<&Fact> for Competitor {
    fn from(fact: &Fact) -> Self {
        Self {
            id: fact.id.clone(),
            scope: fact.scope,
            value: fact.value.clone(),
            confidence: fact.confidence,
        }
    }
}

/// Facts sharing a key with differing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub key: String,
    /// Every fact in the group, highest priority first.
    pub competing: Vec<Competitor>,
    /// The highest-priority fact.
    pub winner: Competitor,
    /// True when the other competitors were dropped from the selection.
    pub resolved: bool,
}

impl Conflict {
    /// Competitors other than the winner.
    pub fn losers(&self) -> impl Iterator<Item = &Competitor> {
        self.competing.iter().filter(|c| c.id != self.winner.id)
    }
}

/// The outcome of one selection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectionResult {
    /// Selected facts, in output order.
    pub facts: Vec<Fact>,
    /// Conflicts among the relevant, confident facts.
    pub conflicts: Vec<Conflict>,
    /// Facts that passed the relevance and confidence filters.
    pub considered: usize,
}

impl SelectionResult {
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

// ── Selector ──────────────────────────────────────────────────────────────

/// The selector. Holds validated options; stateless otherwise.
#[derive(Debug, Clone)]
pub struct Selector {
    options: SelectionOptions,
}

impl Selector {
    /// Create a selector, rejecting malformed options.
    pub fn new(options: SelectionOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &SelectionOptions {
        &self.options
    }

    /// Select facts from `snapshot` for `request`.
    pub fn select(&self, snapshot: &[Fact], request: &RequestContext) -> SelectionResult {
        let options = &self.options;
        let admitted = options.categories_for(&request.request_type);

        let mut candidates: Vec<&Fact> = snapshot
            .iter()
            .filter(|f| admitted.contains(&f.category))
            .filter(|f| f.confidence >= options.min_confidence)
            .collect();
        let considered = candidates.len();
        candidates.sort_by(|a, b| options.priority(a, b));

        // Groups keep priority order because candidates are already sorted
        let mut groups: BTreeMap<&str, Vec<&Fact>> = BTreeMap::new();
        for fact in &candidates {
            groups.entry(fact.key.as_str()).or_default().push(fact);
        }

        let conflicts: Vec<Conflict> = groups
            .iter()
            .filter(|(_, group)| group.iter().any(|f| f.value != group[0].value))
            .map(|(key, group)| Conflict {
                key: (*key).to_string(),
                competing: group.iter().map(|f| Competitor::from(*f)).collect(),
                winner: Competitor::from(group[0]),
                resolved: !options.allow_conflicts,
            })
            .collect();

        if !options.allow_conflicts {
            let mut seen = HashSet::new();
            candidates.retain(|f| seen.insert(f.key.as_str()));
        }

        candidates.truncate(options.max_facts);

        SelectionResult {
            facts: candidates.into_iter().cloned().collect(),
            conflicts,
            considered,
        }
    }
}

/// Validate `options` and select in one call.
pub fn select(
    snapshot: &[Fact],
    request: &RequestContext,
    options: &SelectionOptions,
) -> Result<SelectionResult> {
    Ok(Selector::new(options.clone())?.select(snapshot, request))
}
