//! Placedir listing search engine.
//!
//! Turns typed search parameters (ranges, dates, set-valued filters, free
//! text, geo radius, location hierarchy) into a parameterized SQL query
//! plan over a per-listing-type detail table, optionally joined to an
//! event-schedule table.
//!
//! The engine performs no I/O while planning: the [`catalog`] is loaded
//! once at startup and frozen, [`query`] assembles a [`query::QueryPlan`]
//! as pure computation, and the [`executor`] hands the rendered SQL to the
//! database.

pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod query;

pub use catalog::FieldCatalog;
pub use config::SearchSettings;
pub use error::{EngineError, EngineResult};
pub use executor::{ListingSearchService, MySqlExecutor, QueryExecutor};
pub use query::{QueryAssembler, QueryPlan, SearchParameters, SearchResults};
