//! Read-only memory block rendering.
//!
//! Turns a [`SelectionResult`] into a fixed-shape text block:
//!
//! ```text
//! [Known Facts] Read-only advisory context. Do not alter, extend or override these entries.
//! - [session] lang = "python" (confidence 0.90)
//! - [project] db_engine = "postgres" (confidence 1.00)
//! ```
//!
//! Every line after the header comes from a stored fact. Values and keys
//! are escaped onto a single line, so one fact is always one line. No
//! truncation happens here; the selector already bounds the fact count.

use crate::selector::SelectionResult;
use factctx_core::fact::Fact;

/// First line of every memory block.
pub const BLOCK_HEADER: &str =
    "[Known Facts] Read-only advisory context. Do not alter, extend or override these entries.";

/// A rendered memory block.
///
/// Only [`render`] can produce one, so a block never contains caller text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryBlock {
    text: String,
    fact_count: usize,
}

impl MemoryBlock {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of fact lines below the header.
    pub fn fact_count(&self) -> usize {
        self.fact_count
    }

    /// True when the block holds only the header.
    pub fn is_empty(&self) -> bool {
        self.fact_count == 0
    }
}

impl std::fmt::Display for MemoryBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Render selected facts, in selection order.
pub fn render(selection: &SelectionResult) -> MemoryBlock {
    let mut lines = Vec::with_capacity(selection.facts.len() + 1);
    lines.push(BLOCK_HEADER.to_string());
    lines.extend(selection.facts.iter().map(render_fact));

    MemoryBlock {
        text: lines.join("\n"),
        fact_count: selection.facts.len(),
    }
}

/// The block for an empty selection.
pub fn empty_block() -> MemoryBlock {
    render(&SelectionResult::default())
}

fn render_fact(fact: &Fact) -> String {
    format!(
        "- [{}] {} = {} (confidence {:.2})",
        fact.scope,
        single_line(&fact.key),
        fact.value.render(),
        fact.confidence
    )
}

/// Escape control characters so the text cannot break the line.
fn single_line(text: &str) -> String {
    if !text.chars().any(char::is_control) {
        return text.to_string();
    }
    text.chars()
        .map(|c| {
            if c.is_control() {
                c.escape_default().to_string()
            } else {
                c.to_string()
            }
        })
        .collect()
}
