//! Markdown display for plans, tasks and their history.
//!
//! Domain models implement `Display` directly (see [`models`]); collections
//! are wrapped in newtypes so that an empty result still renders a sentence
//! instead of nothing. Every formatter produces markdown, which front ends
//! either render (e.g. with termimad) or print as-is.
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │  Domain Models  │    │   Newtypes &    │    │    Markdown     │
//! │ (Plan, Task...) │───▶│ status wrappers │───▶│     output      │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//! ```
//!
//! ```rust
//! use cadence_core::{display::Plans, models::Plan};
//!
//! assert_eq!(Plans(vec![]).to_string(), "No plans found.\n");
//!
//! let output = Plans(vec![Plan::new("build widget")]).to_string();
//! assert!(output.contains("build widget"));
//! ```

pub mod collections;
pub mod datetime;
pub mod models;
pub mod status;

pub use collections::{HistoryEntries, PlanSummaries, Plans, Tasks};
pub use datetime::{Elapsed, LocalDateTime};
pub use status::OperationStatus;
