//! Boundary kinds and the data bundles passed to boundary registration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Every boundary kind an equation system may be asked to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    Wall,
    Inflow,
    Open,
    Symmetry,
    /// Interpolation across non-matching meshes
    NonConformal,
    /// Overlapping-mesh transfer
    Overset,
}

impl BoundaryKind {
    pub const ALL: [BoundaryKind; 6] = [
        BoundaryKind::Wall,
        BoundaryKind::Inflow,
        BoundaryKind::Open,
        BoundaryKind::Symmetry,
        BoundaryKind::NonConformal,
        BoundaryKind::Overset,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BoundaryKind::Wall => "wall",
            BoundaryKind::Inflow => "inflow",
            BoundaryKind::Open => "open",
            BoundaryKind::Symmetry => "symmetry",
            BoundaryKind::NonConformal => "non_conformal",
            BoundaryKind::Overset => "overset",
        }
    }
}

impl fmt::Display for BoundaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an equation system contributes anything for a boundary kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContributionSupport {
    Supported,
    /// Registration fails immediately with a configuration error.
    Unsupported,
}

/// Parameters of a wall boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallBoundaryConditionData {
    /// Nodal field holding the prescribed normal gradient.
    pub source: String,
    /// Used where `source` is not a declared field.
    #[serde(default)]
    pub normal_gradient: f64,
}

impl WallBoundaryConditionData {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            normal_gradient: 0.0,
        }
    }

    pub fn with_normal_gradient(mut self, g: f64) -> Self {
        self.normal_gradient = g;
        self
    }
}

/// Parameters of an inflow boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InflowBoundaryConditionData {
    /// Nodal field holding the boundary value of the independent field.
    pub source: String,
}

/// Parameters of an open boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenBoundaryConditionData {
    /// Nodal field holding the boundary value of the independent field.
    pub source: String,
}

/// Parameters of a symmetry boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymmetryBoundaryConditionData {
    pub source: String,
}

macro_rules! impl_new_with_source {
    ($($t:ty),*) => {$(
        impl $t {
            pub fn new(source: impl Into<String>) -> Self {
                Self { source: source.into() }
            }
        }
    )*};
}

impl_new_with_source!(
    InflowBoundaryConditionData,
    OpenBoundaryConditionData,
    SymmetryBoundaryConditionData
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_unique() {
        let mut names: Vec<_> = BoundaryKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), BoundaryKind::ALL.len());
    }

    #[test]
    fn wall_data_defaults_normal_gradient() {
        let w: WallBoundaryConditionData = serde_yaml::from_str("source: dqdn_wall").unwrap();
        assert_eq!(w, WallBoundaryConditionData::new("dqdn_wall"));
        assert_eq!(w.with_normal_gradient(2.0).normal_gradient, 2.0);
    }
}
