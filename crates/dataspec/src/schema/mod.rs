//! Dataset types, size statistics and the facets derived from them.

mod facet;
mod path;
mod statistics;
mod types;

pub use facet::{Schema, Size};
pub use path::Path;
pub use statistics::{FieldStatistics, Statistics};
pub use types::{EnumValue, Field, IdBase, TableRef, Type};
