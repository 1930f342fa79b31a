//! # factctx context
//!
//! Turns stored facts into a prompt:
//!
//! 1. **Select** relevant, confident facts for a request and detect
//!    conflicting values for the same key ([`selector`]).
//! 2. **Render** the selection as a read-only memory block ([`formatter`]).
//! 3. **Assemble** the block, a fixed delimiter and the caller input into
//!    the final prompt ([`prompt`]).
//!
//! [`pipeline`] wires the three together behind a single store query.
//! Nothing in this crate writes to a store.

pub mod formatter;
pub mod pipeline;
pub mod prompt;
pub mod selector;
pub mod token;

pub use formatter::{BLOCK_HEADER, MemoryBlock, render};
pub use pipeline::{ContextMetadata, ContextOutput, ContextPipeline, select_and_build};
pub use prompt::{DELIMITER, PromptAssembler};
pub use selector::{
    Competitor, Conflict, RequestContext, SelectionOptions, SelectionResult, Selector, select,
};
pub use token::estimate_tokens;
