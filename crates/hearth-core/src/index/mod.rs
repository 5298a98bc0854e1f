//! Exact multi-key structural index over devices.

mod fuzzy;
mod structural;

pub use fuzzy::{levenshtein, normalized_similarity};
pub use structural::StructuralIndex;
