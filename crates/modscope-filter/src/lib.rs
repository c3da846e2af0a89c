//! Filtering for modscope.
//!
//! This crate decides which observed modules are visible:
//!
//! - **Predicate evaluation** - [`PredicateEvaluator`] checks a record
//!   against [`FilterCriteria`] clause by clause
//! - **Generations** - [`CriteriaPublisher`] stamps every accepted criteria
//!   change with a new generation and hands out [`GenerationToken`]s
//! - **Filter passes** - [`FilterCoordinator`] owns the visible set and
//!   re-sweeps the listing whenever a new generation is adopted, abandoning
//!   stale passes before they write
//!
//! ```rust,ignore
//! use modscope_filter::{CriteriaPublisher, FilterCoordinator, PredicateEvaluator};
//!
//! let publisher = CriteriaPublisher::new(FilterCriteria::default());
//! let mut filter = FilterCoordinator::new(PredicateEvaluator::default(), publisher.current());
//!
//! let generation = publisher.publish_settings(&settings)?;
//! filter.begin(publisher.current(), publisher.token(generation), &listing);
//! while !matches!(filter.step(&listing), FilterStep::Completed(_) | FilterStep::Superseded(_)) {}
//! ```

mod coordinator;
mod error;
mod evaluator;
mod publisher;
mod token;

pub use coordinator::{FilterCoordinator, FilterState, FilterStep};
pub use error::{Clause, EvaluationError};
pub use evaluator::PredicateEvaluator;
pub use publisher::CriteriaPublisher;
pub use token::GenerationToken;

// Re-export core types
pub use modscope_core::{ActiveCriteria, FilterCriteria, Generation};
