//! Contribution kernels, one per region kind.

mod boundary_value;
mod interior;
mod wall;

pub use boundary_value::BoundaryValueNodalGradAlgorithm;
pub use interior::InteriorNodalGradAlgorithm;
pub use wall::{NormalConstraint, WallNodalGradAlgorithm};
