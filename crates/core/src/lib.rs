//! # factctx core
//!
//! Domain types, traits, and error definitions for the factctx fact store
//! and prompt-injection pipeline. This crate has **no storage or framework
//! dependencies**: it defines the model that every other crate builds on.
//!
//! ## Design Philosophy
//!
//! Persistence is defined as a trait ([`FactStore`]) here and implemented in
//! `factctx-store`. Selection, formatting and prompt assembly live in
//! `factctx-context` and only ever read from a store.

pub mod error;
pub mod fact;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result, StoreError};
pub use fact::{
    CategorySet, Fact, FactDraft, FactFilter, FactId, FactUpdate, FactValue, ParseScopeError,
    Scope,
};
pub use store::FactStore;
