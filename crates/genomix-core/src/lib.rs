pub mod codon;
pub mod feature;
pub mod operations;
pub mod rounding;
pub mod sequence;

pub use feature::*;
pub use sequence::*;
