//! Navigation context: the mesh currently in use and its query context
//!
//! A [`NavContext`] owns at most one mesh at a time. Loading a new tile set
//! releases the previous mesh first. The mesh is shared through an `Arc` so
//! that [`PathQuery`] forks can search it from other threads; tile
//! ingestion and removal need the context to be the only holder.

use std::path::Path;
use std::sync::Arc;

use nav_engine::{NavMesh, NavMeshParams, NavMeshQuery, TileRef};

use crate::config::NavConfig;
use crate::error::{AllocationTarget, EngineStage, NavError, Result};
use crate::pipeline::{self, PathQuery, PathRequest, PathResult};
use crate::tile_set::{self, LoadReport};
use crate::transform::WorldPoint;

/// Explicitly managed navigation state
#[derive(Debug)]
pub struct NavContext {
    config: NavConfig,
    mesh: Option<Arc<NavMesh>>,
    query: Option<NavMeshQuery>,
}

impl NavContext {
    /// Creates an empty context
    pub fn new(config: NavConfig) -> Result<Self> {
        config.validate().map_err(NavError::InvalidConfig)?;
        Ok(Self {
            config,
            mesh: None,
            query: None,
        })
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    /// Whether a mesh and its query context are in place
    pub fn is_initialized(&self) -> bool {
        self.mesh.is_some() && self.query.is_some()
    }

    pub fn mesh(&self) -> Option<&Arc<NavMesh>> {
        self.mesh.as_ref()
    }

    /// Allocates an empty mesh for `params` and a query context for it,
    /// replacing any current mesh
    pub fn initialize(&mut self, params: NavMeshParams) -> Result<()> {
        self.teardown();
        let mesh = NavMesh::new(params).map_err(|status| {
            NavError::from_engine_init(EngineStage::MeshInit, AllocationTarget::Mesh, status)
        })?;
        self.install(mesh)
    }

    /// Releases the mesh and the query context
    ///
    /// Safe to call on a context that was never or only partly initialized.
    pub fn teardown(&mut self) {
        if self.mesh.take().is_some() {
            log::debug!("Released navigation mesh");
        }
        self.query = None;
    }

    fn install(&mut self, mesh: NavMesh) -> Result<()> {
        let mesh = Arc::new(mesh);
        let query = pipeline::new_query_context(&mesh, &self.config.query)?;
        self.mesh = Some(mesh);
        self.query = Some(query);
        Ok(())
    }

    /// Replaces the current mesh with the contents of a tile-set container
    ///
    /// The previous mesh is released before the file is read. A partially
    /// loaded mesh is installed; check the returned report.
    pub fn load_tile_set<P: AsRef<Path>>(&mut self, path: P) -> Result<LoadReport> {
        self.teardown();
        let load = tile_set::load_tile_set(path, &self.config.loader)?;
        self.install(load.mesh)?;
        Ok(load.report)
    }

    /// Reads a single unframed tile file and adds it to the current mesh
    ///
    /// Without a current mesh the tile initializes a single-tile mesh whose
    /// parameters come from the tile header.
    pub fn add_tile_file<P: AsRef<Path>>(&mut self, path: P) -> Result<TileRef> {
        let path = path.as_ref();
        log::debug!("Adding tile from {}", path.display());
        let blob = tile_set::read_tile_file(path)?;

        if self.mesh.is_none() {
            let mesh = NavMesh::from_single_tile(blob.into_inner()).map_err(|rejected| {
                log::warn!("Could not init navmesh from {}: {}", path.display(), rejected);
                NavError::EngineInitFailure {
                    stage: EngineStage::TileIngest,
                    status: rejected.status,
                }
            })?;
            let tile_ref = mesh.tiles().next().map(|tile| tile.tile_ref()).unwrap_or_default();
            self.install(mesh)?;
            return Ok(tile_ref);
        }

        let mesh = self.mesh_mut()?;
        blob.register(mesh, None).map_err(|rejected| {
            log::warn!("Could not add tile from {}: {}", path.display(), rejected);
            NavError::EngineInitFailure {
                stage: EngineStage::TileIngest,
                status: rejected.status,
            }
        })
    }

    /// Unregisters a tile and returns its buffer
    pub fn remove_tile(&mut self, tile_ref: TileRef) -> Result<Vec<u8>> {
        self.mesh_mut()?
            .remove_tile(tile_ref)
            .map_err(NavError::Engine)
    }

    /// Writes the current mesh to a tile-set container
    pub fn save_tile_set<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let mesh = self.mesh.as_ref().ok_or(NavError::NotInitialized)?;
        tile_set::save_tile_set(path, mesh)
    }

    fn mesh_mut(&mut self) -> Result<&mut NavMesh> {
        let mesh = self.mesh.as_mut().ok_or(NavError::NotInitialized)?;
        let holders = Arc::strong_count(mesh) - 1;
        Arc::get_mut(mesh).ok_or(NavError::MeshInUse(holders))
    }

    /// Creates an independent query context over the current mesh
    pub fn fork_query(&self) -> Result<PathQuery> {
        let mesh = self.mesh.as_ref().ok_or(NavError::NotInitialized)?;
        PathQuery::new(Arc::clone(mesh), self.config.query.clone())
    }

    /// Runs a path query with the context's own query context
    pub fn find_path(&mut self, request: &PathRequest) -> Result<PathResult> {
        match (self.mesh.as_ref(), self.query.as_mut()) {
            (Some(mesh), Some(query)) => pipeline::run(query, mesh, &self.config.query, request),
            _ => Err(NavError::NotInitialized),
        }
    }

    /// Writes the path from `start` to `end` into `out`
    ///
    /// Returns the waypoint count, or a non-positive [`NavError::code`].
    pub fn find_path_into(
        &mut self,
        start: WorldPoint,
        end: WorldPoint,
        out: &mut [WorldPoint],
    ) -> i32 {
        let request = PathRequest::new(start, end, out.len());
        pipeline::write_into(self.find_path(&request), out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::to_world_space;
    use nav_engine::test_mesh_helpers::{create_single_quad_tile, grid_params};
    use nav_engine::{binary_format::save_tile_to_binary, Status};

    #[test]
    fn test_teardown_is_idempotent() {
        let mut context = NavContext::new(NavConfig::default()).unwrap();
        context.teardown();
        assert!(!context.is_initialized());

        context.initialize(grid_params(4)).unwrap();
        assert!(context.is_initialized());
        context.teardown();
        context.teardown();
        assert!(context.mesh().is_none());
    }

    #[test]
    fn test_queries_need_a_mesh() {
        let mut context = NavContext::new(NavConfig::default()).unwrap();
        let request = PathRequest::new(WorldPoint::ZERO, WorldPoint::ONE, 8);
        assert!(matches!(context.find_path(&request), Err(NavError::NotInitialized)));
        assert_eq!(
            context.find_path_into(WorldPoint::ZERO, WorldPoint::ONE, &mut [WorldPoint::ZERO; 4]),
            NavError::NotInitialized.code()
        );
        assert!(matches!(context.fork_query(), Err(NavError::NotInitialized)));
        assert!(matches!(
            context.remove_tile(TileRef::NULL),
            Err(NavError::NotInitialized)
        ));
    }

    #[test]
    fn test_initialize_rejects_bad_params() {
        let mut context = NavContext::new(NavConfig::default()).unwrap();
        let mut params = grid_params(4);
        params.tile_width = 0.0;
        assert!(matches!(
            context.initialize(params),
            Err(NavError::EngineInitFailure {
                stage: EngineStage::MeshInit,
                status: Status::InvalidParam
            })
        ));
        assert!(!context.is_initialized());
    }

    #[test]
    fn test_invalid_config_is_refused() {
        let mut config = NavConfig::default();
        config.query.max_nodes = 0;
        assert!(matches!(
            NavContext::new(config),
            Err(NavError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_forks_block_mesh_mutation() {
        let mut context = NavContext::new(NavConfig::default()).unwrap();
        context.initialize(grid_params(4)).unwrap();
        let fork = context.fork_query().unwrap();
        assert!(matches!(
            context.remove_tile(TileRef::NULL),
            Err(NavError::MeshInUse(1))
        ));
        drop(fork);
        assert!(matches!(
            context.remove_tile(TileRef::NULL),
            Err(NavError::Engine(Status::InvalidRef))
        ));
    }

    #[test]
    fn test_remove_tile_returns_buffer() {
        let tile = save_tile_to_binary(&create_single_quad_tile(0, 0).unwrap()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0_0.tile");
        std::fs::write(&path, &tile).unwrap();

        let mut context = NavContext::new(NavConfig::default()).unwrap();
        context.initialize(grid_params(4)).unwrap();
        let tile_ref = context.add_tile_file(&path).unwrap();

        let request = PathRequest::new(
            to_world_space([1.0, 0.0, 1.0]),
            to_world_space([9.0, 0.0, 9.0]),
            8,
        );
        assert!(context.find_path(&request).is_ok());

        assert_eq!(context.remove_tile(tile_ref).unwrap(), tile);
        assert!(matches!(
            context.find_path(&request),
            Err(NavError::NoNearestPolygon { .. })
        ));
    }
}
