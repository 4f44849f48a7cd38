//! Listing search query engine.
//!
//! This module provides:
//! - QueryAssembler: turns search parameters into a [`QueryPlan`]
//! - Plan stages: location, toggles, field filters, geo radius, events
//! - Sort resolution: catalog sort options, aliases, custom orderings
//! - Scoring: keyword relevance flags and the haversine distance column
//! - Types: SearchParameters, QueryPlan, OrderTerm, etc.

mod assembler;
mod location;
mod predicate;
mod scoring;
mod sort;
mod stage;
pub mod types;

pub use assembler::QueryAssembler;
pub use scoring::significant_keywords;
pub use sort::{SortKey, SortOptions, resolve_sort_options};
pub use types::{
    EventWindow, ListingHit, OrderTerm, ParamValue, Predicate, QueryPlan, SearchParameters,
    SearchResults,
};
