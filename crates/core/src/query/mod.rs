//! Query parameters, the field catalogue and filter predicates.

pub mod field;
pub mod filter;
pub mod params;

pub use field::{Field, Scalar};
pub use filter::{FieldFilter, FilterBuilder, Predicate};
pub use params::Params;
