mod isoform;
mod molecule;
mod structure;

pub use isoform::*;
pub use molecule::*;
pub use structure::*;
