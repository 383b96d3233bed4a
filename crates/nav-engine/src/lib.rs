//! Tiled navigation mesh engine
//!
//! This crate holds a multi-tile polygon navigation mesh and answers the
//! queries a path-following agent needs: nearest polygon under a point,
//! polygon corridor between two polygons, and the string-pulled straight
//! path through that corridor. Tiles are registered from the Detour tile
//! binary layout and the mesh takes ownership of the registered buffers.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use nav_engine::{NavMesh, NavMeshQuery, QueryFilter};
//!
//! # fn example(tile_bytes: Vec<u8>) -> nav_engine::Result<()> {
//! let nav_mesh = Arc::new(NavMesh::from_single_tile(tile_bytes)?);
//!
//! let mut query = NavMeshQuery::new();
//! query.init(Arc::clone(&nav_mesh), 2048)?;
//!
//! let filter = QueryFilter::default();
//! let extents = [2.0, 4.0, 2.0];
//! let start = [1.0, 0.0, 1.0];
//! let end = [9.0, 0.0, 9.0];
//!
//! let (start_ref, _) = query.find_nearest_poly(&start, &extents, &filter)?;
//! let (end_ref, _) = query.find_nearest_poly(&end, &extents, &filter)?;
//!
//! let corridor = query.find_path(start_ref, end_ref, &start, &end, &filter, 256)?;
//! let straight = query.find_straight_path(&start, &end, &corridor.polys, 256)?;
//! println!("{} waypoints", straight.len());
//! # Ok(())
//! # }
//! ```

pub mod binary_format;
pub mod geometry;
pub mod nav_mesh;
pub mod nav_mesh_query;
pub mod node_pool;
pub mod status;
pub mod test_mesh_helpers;
pub mod tile_builder;

pub use nav_mesh::{Link, MeshTile, NavMesh, Poly, PolyDetail, RejectedTile, TileHeader};
pub use nav_mesh_query::{NavMeshQuery, PolyCorridor, StraightPath, StraightPathFlags};
pub use status::{Result, Status};
pub use tile_builder::{TileBuildParams, TileBuilder};

/// Maximum number of vertices per polygon
pub const MAX_VERTS_PER_POLY: usize = 6;

/// Neighbour marker for polygon edges that continue into an adjacent tile.
/// The low bits carry the side (0: +x, 2: +z, 4: -x, 6: -z).
pub const EXT_LINK: u16 = 0x8000;

/// Number of area ids a query filter can weight
pub const MAX_AREAS: usize = 64;

/// Reference to a polygon (or, with polygon id 0, to a tile)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct PolyRef(u32);

impl PolyRef {
    /// The null reference
    pub const NULL: PolyRef = PolyRef(0);

    /// Creates a reference from its raw id
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw id of the reference
    pub fn id(&self) -> u32 {
        self.0
    }

    /// Whether the reference is non-null
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for PolyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Tile references share the polygon reference encoding with polygon id 0
pub type TileRef = PolyRef;

bitflags::bitflags! {
    /// Traversal flags attached to each polygon
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PolyFlags: u16 {
        /// Ground that can be walked on
        const WALK = 0x01;
        /// Water that can be swum through
        const SWIM = 0x02;
        /// Passable door
        const DOOR = 0x04;
        /// Requires a jump
        const JUMP = 0x08;
        /// Temporarily disabled polygon
        const DISABLED = 0x10;
        /// Every flag bit
        const ALL = 0xffff;
    }
}

/// Kind of polygon stored in a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PolyType {
    /// Regular walkable surface polygon
    Ground = 0,
    /// Two-vertex off-mesh connection (parsed, never traversed)
    OffMeshConnection = 1,
}

/// Build parameters shared by every tile of a navigation mesh
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct NavMeshParams {
    /// World-space origin of the tile grid
    pub origin: [f32; 3],
    /// Width of a tile along x
    pub tile_width: f32,
    /// Height of a tile along z
    pub tile_height: f32,
    /// Maximum number of tiles the mesh can hold
    pub max_tiles: i32,
    /// Maximum number of polygons per tile
    pub max_polys_per_tile: i32,
}

/// Polygon filter used by queries
#[derive(Debug, Clone)]
pub struct QueryFilter {
    /// A polygon passes if it has at least one of these flags
    pub include_flags: PolyFlags,
    /// A polygon fails if it has any of these flags
    pub exclude_flags: PolyFlags,
    /// Traversal cost multiplier per area id
    pub area_cost: [f32; MAX_AREAS],
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self::new(PolyFlags::ALL, PolyFlags::empty())
    }
}

impl QueryFilter {
    /// Creates a filter with unit area costs
    pub fn new(include_flags: PolyFlags, exclude_flags: PolyFlags) -> Self {
        Self {
            include_flags,
            exclude_flags,
            area_cost: [1.0; MAX_AREAS],
        }
    }

    /// Returns true if polygons with these flags may be visited
    pub fn pass_filter(&self, flags: PolyFlags) -> bool {
        flags.intersects(self.include_flags) && !flags.intersects(self.exclude_flags)
    }

    /// Cost multiplier for an area id
    pub fn area_cost(&self, area: u8) -> f32 {
        self.area_cost[(area as usize).min(MAX_AREAS - 1)]
    }

    /// Sets the cost multiplier for an area id
    pub fn set_area_cost(&mut self, area: u8, cost: f32) {
        if (area as usize) < MAX_AREAS {
            self.area_cost[area as usize] = cost;
        }
    }
}
