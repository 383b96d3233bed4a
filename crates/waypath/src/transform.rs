//! Mapping between world space and mesh space
//!
//! The game world and the navigation engine disagree on axis conventions.
//! Mesh space is a permutation of world space with two axes negated:
//!
//! ```text
//! mesh.x = -world.y
//! mesh.y =  world.z
//! mesh.z = -world.x
//! ```
//!
//! Only negation and reordering are involved, so a round trip through both
//! functions reproduces the input bit for bit (signed zeros and NaN payloads
//! included).

use glam::Vec3;

/// A point in world coordinates
pub type WorldPoint = Vec3;

/// Converts a world-space point to mesh space
#[inline]
pub fn to_mesh_space(world: WorldPoint) -> [f32; 3] {
    [-world.y, world.z, -world.x]
}

/// Converts a mesh-space point back to world space
#[inline]
pub fn to_world_space(mesh: [f32; 3]) -> WorldPoint {
    Vec3::new(-mesh[2], -mesh[0], mesh[1])
}
