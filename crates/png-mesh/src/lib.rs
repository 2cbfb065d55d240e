//! png-mesh: the mesh side of the nodal-gradient workspace.
//!
//! Provides:
//! - Reference topologies, shape functions and quadrature
//! - Mesh data structures with named parts, an incremental builder and validation
//! - Element/face kinematics (gradients, outward normals, weights)
//! - Nodal field registry
//! - Communicators, element-based decomposition and shared-node synchronization
//! - Row indexing for linear systems
//!
//! # Example
//!
//! ```
//! use png_mesh::{box_mesh_3d, Realm};
//!
//! let mesh = box_mesh_3d([2, 2, 2], [1.0, 1.0, 1.0]).unwrap();
//! let mut realm = Realm::serial(mesh);
//! let block = realm.part_ids(&["block_1"]).unwrap();
//! let dqdx = realm.fields_mut().declare("dqdx", 3, &block).unwrap();
//!
//! assert_eq!(realm.fields().values(dqdx).len(), 27 * 3);
//! ```

pub mod builder;
pub mod error;
pub mod field;
pub mod generate;
pub mod geometry;
pub mod indexing;
pub mod mesh;
pub mod parallel;
pub mod partition;
pub mod realm;
pub mod topology;
pub(crate) mod validate;

// Re-exports for ergonomics
pub use builder::MeshBuilder;
pub use error::{MeshError, MeshResult};
pub use field::{FieldHandle, FieldRegistry};
pub use generate::{BLOCK_PART, box_mesh_2d, box_mesh_3d};
pub use geometry::{ElementPoint, FacePoint, element_measure, element_points, face_points};
pub use indexing::DofMap;
pub use mesh::{Element, Face, Mesh, Node, Part, PartKind};
pub use parallel::{Communicator, SerialComm, ThreadComm, run_ranks};
pub use partition::{decompose, partition_by_axis};
pub use realm::Realm;
pub use topology::{QuadPoint, Topology};
