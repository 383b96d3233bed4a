//! World-space path queries over tiled navigation meshes
//!
//! `waypath` sits between a game server and the `nav-engine` crate. It reads
//! tile-set containers, keeps the loaded mesh in an explicit
//! [`NavContext`], and answers path requests given in world coordinates with
//! world-space waypoints that always end on the requested destination.
//!
//! # Example
//!
//! ```rust,no_run
//! use glam::Vec3;
//! use waypath::{NavConfig, NavContext, PathRequest};
//!
//! # fn example() -> waypath::Result<()> {
//! let mut context = NavContext::new(NavConfig::default())?;
//! let report = context.load_tile_set("zone.mset")?;
//! if !report.is_complete() {
//!     eprintln!("tile set only partially loaded: {report:?}");
//! }
//!
//! let request = PathRequest::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::new(-9.0, -9.0, 0.0), 64);
//! let path = context.find_path(&request)?;
//! for waypoint in &path.waypoints {
//!     println!("{waypoint}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Concurrent callers either wrap the context in a `Mutex` or take a
//! [`PathQuery`] each through [`NavContext::fork_query`].

pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod tile_set;
pub mod transform;

pub use config::{LoaderConfig, NavConfig, QueryConfig, TruncationPolicy};
pub use context::NavContext;
pub use error::{AllocationTarget, EngineStage, FormatProblem, NavError, Result};
pub use pipeline::{PathQuery, PathRequest, PathResult};
pub use tile_set::{
    load_tile_set, read_tile_file, read_tile_set, read_tile_set_header, save_tile_set,
    write_tile_set, LoadReport, LoadStatus, StopReason, TileBlob, TileRecordHeader, TileSetHeader,
    TileSetLoad,
};
pub use transform::{to_mesh_space, to_world_space, WorldPoint};
