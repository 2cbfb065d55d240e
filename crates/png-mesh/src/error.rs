//! Mesh-specific error types.

use png_core::{ElemId, FaceId, NodeId, PartId};

use crate::mesh::PartKind;
use crate::topology::Topology;

pub type MeshResult<T> = Result<T, MeshError>;

/// Mesh construction, field and parallel-synchronization errors.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshError {
    /// Spatial dimension other than 2 or 3.
    InvalidSpatialDim { dim: usize },

    /// Invalid argument to a mesh constructor.
    InvalidArg { what: &'static str },

    /// An element or face refers to a node that doesn't exist.
    InvalidNodeRef {
        entity: &'static str,
        index: usize,
        node: NodeId,
    },

    /// Connectivity length doesn't match the topology.
    NodeCount {
        topology: Topology,
        expected: usize,
        actual: usize,
    },

    /// Element topology is not a volume element in this spatial dimension.
    TopologyDimension { topology: Topology, spatial_dim: usize },

    /// A face topology is not a face of its parent element.
    FaceTopologyMismatch {
        face: FaceId,
        parent: Topology,
        face_topology: Topology,
    },

    /// A face has a node that its parent element doesn't.
    FaceNotOnParent { face: FaceId, parent: ElemId },

    /// A face refers to a parent element that doesn't exist.
    InvalidParentRef { face: FaceId, parent: ElemId },

    /// An entity was added to a part of the wrong kind.
    PartKindMismatch { part: String, expected: PartKind },

    /// Two parts share a name.
    DuplicatePart { name: String },

    /// Part lookup by name failed.
    UnknownPart { name: String },

    /// Part lookup by id failed.
    InvalidPartRef { part: PartId },

    /// Zero or negative Jacobian determinant.
    DegenerateGeometry { topology: Topology, det: f64 },

    /// A field was re-declared with a different component count.
    FieldMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Field lookup by name failed.
    UnknownField { name: String },

    /// Ranks disagree during a collective operation.
    Parallel { what: String },

    /// ID not found in an index map.
    IdNotFound { what: &'static str },
}

impl std::fmt::Display for MeshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeshError::InvalidSpatialDim { dim } => {
                write!(f, "Spatial dimension {} is not supported (expected 2 or 3)", dim)
            }
            MeshError::InvalidArg { what } => write!(f, "Invalid argument: {}", what),
            MeshError::InvalidNodeRef {
                entity,
                index,
                node,
            } => {
                write!(f, "{} {} refers to non-existent node {}", entity, index, node)
            }
            MeshError::NodeCount {
                topology,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "{} connectivity has {} nodes (expected {})",
                    topology, actual, expected
                )
            }
            MeshError::TopologyDimension {
                topology,
                spatial_dim,
            } => {
                write!(
                    f,
                    "{} is not a volume element in {} dimensions",
                    topology, spatial_dim
                )
            }
            MeshError::FaceTopologyMismatch {
                face,
                parent,
                face_topology,
            } => {
                write!(
                    f,
                    "Face {} has topology {} which is not a face of {}",
                    face, face_topology, parent
                )
            }
            MeshError::FaceNotOnParent { face, parent } => {
                write!(f, "Face {} has nodes not on parent element {}", face, parent)
            }
            MeshError::InvalidParentRef { face, parent } => {
                write!(f, "Face {} refers to non-existent element {}", face, parent)
            }
            MeshError::PartKindMismatch { part, expected } => {
                write!(f, "Part '{}' is not a {:?} part", part, expected)
            }
            MeshError::DuplicatePart { name } => write!(f, "Part '{}' declared twice", name),
            MeshError::UnknownPart { name } => write!(f, "Part '{}' not found", name),
            MeshError::InvalidPartRef { part } => write!(f, "Part id {} not found", part),
            MeshError::DegenerateGeometry { topology, det } => {
                write!(f, "Degenerate {} geometry (Jacobian determinant {})", topology, det)
            }
            MeshError::FieldMismatch {
                name,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Field '{}' already declared with {} components (requested {})",
                    name, expected, actual
                )
            }
            MeshError::UnknownField { name } => write!(f, "Field '{}' not declared", name),
            MeshError::Parallel { what } => write!(f, "Parallel inconsistency: {}", what),
            MeshError::IdNotFound { what } => write!(f, "{} not found in index map", what),
        }
    }
}

impl std::error::Error for MeshError {}
