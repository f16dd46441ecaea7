//! Open Astronomy Catalog query protocol
//!
//! This crate resolves catalog queries of the form
//! `EVENTS/QUANTITIES/ATTRIBUTES?arguments` against an immutable snapshot
//! of per-event records and renders the surviving observations as JSON or
//! as a CSV/TSV table.
//!
//! # Pipeline
//!
//! 1. [`ParsedPath`] splits the path into events, quantities and attributes.
//! 2. [`resolve_arguments`] separates directives from presence and equality
//!    filters.
//! 3. [`SearchRegion`] turns `ra`/`dec` plus `radius`/`width`/`height` into
//!    a cone or box constraint.
//! 4. [`filter::filter_event`] applies filters and projections per event,
//!    [`Selection`] narrows rows with `closest`/`item`/`first`.
//! 5. [`format::render`] produces the response body.
//!
//! # Example
//!
//! ```rust
//! use oac_protocol::{
//!     parse_query_string, Catalog, CatalogSnapshot, EngineOptions, Event, NoDetailStore,
//!     Observation, QueryEngine, QueryRequest,
//! };
//!
//! let event = Event::new("SN2014J", "sne")
//!     .with_quantity("redshift", vec![Observation::new().with("value", "0.000677")]);
//! let snapshot = CatalogSnapshot::builder()
//!     .catalog(Catalog::new("sne", vec![event]))
//!     .build();
//!
//! let options = EngineOptions::default();
//! let request = QueryRequest::parse(
//!     "sne",
//!     "SN2014J/redshift",
//!     &parse_query_string(""),
//!     &options.limits,
//! )
//! .unwrap();
//! let result = QueryEngine::new(&snapshot, &NoDetailStore, &options)
//!     .execute(&request)
//!     .unwrap();
//! assert_eq!(result.rows.len(), 1);
//! ```

pub mod aggregate;
pub mod arguments;
pub mod coordinates;
pub mod engine;
pub mod errors;
pub mod filter;
pub mod format;
pub mod limits;
pub mod path;
pub mod responses;
pub mod select;
pub mod snapshot;
pub mod types;

// Re-export commonly used types
pub use arguments::{
    args_from_json, parse_query_string, resolve_arguments, Directives, FilterKind, Filters,
    QueryArg, ResolvedArguments,
};
pub use coordinates::{CoordinateParseError, SearchRegion, SkyPosition};
pub use engine::{EngineOptions, QueryEngine, QueryRequest, QueryResult, ResultRow};
pub use errors::QueryError;
pub use format::{render, OutputFormat};
pub use limits::{ResourceLimitExceeded, ResourceLimits};
pub use path::{EventScope, ParsedPath};
pub use responses::{CatalogList, CatalogSummary, ExceptionResponse};
pub use select::Selection;
pub use snapshot::{
    Catalog, CatalogSnapshot, DetailStore, EventRef, MemoryDetailStore, NoDetailStore,
};
pub use types::{AttrValue, Event, Observation, Quantity};

/// Media types used in query responses
pub mod media_types {
    /// JSON media type
    pub const JSON: &str = "application/json";
    /// CSV media type
    pub const CSV: &str = "text/csv";
    /// TSV media type
    pub const TSV: &str = "text/tab-separated-values";
    /// Plain text media type (error bodies for tabular requests)
    pub const TEXT: &str = "text/plain";
}
