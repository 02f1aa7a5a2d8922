//! # STRATA Meshing
//!
//! Turns a resolved chunk into renderable geometry.
//!
//! ## Core Components
//!
//! - `GreedyMesher`: merges coplanar faces of equal material and colour into
//!   rectangular quads, per direction
//! - `MeshBuffers`: positions, normals, colours and UVs, six vertices per quad
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_meshing::{Direction, GreedyMesher, MeshBuffers};
//!
//! let mut mesher = GreedyMesher::new();
//! let buffers = mesher.mesh_buffers(&voxels);
//! upload(buffers.position_bytes());
//!
//! // Or per direction, for custom streams:
//! let tops = mesher.quads(&voxels, Direction::PosY);
//! let top_buffers = MeshBuffers::from_quads(&tops);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod buffers;
pub mod greedy_mesh;

pub use buffers::MeshBuffers;
pub use greedy_mesh::{Direction, GreedyMesher, MeshQuad};
