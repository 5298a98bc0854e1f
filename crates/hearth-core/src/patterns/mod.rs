//! Algorithmic pattern detection over device event histories.

mod detector;

pub use detector::detect;
