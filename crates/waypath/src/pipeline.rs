//! World-space path queries
//!
//! A query snaps both endpoints onto the mesh, searches a polygon corridor
//! between them, string-pulls the corridor into straight segments and hands
//! the waypoints back in world space, finishing on the exact requested end
//! point.

use std::sync::Arc;

use nav_engine::{NavMesh, NavMeshQuery};

use crate::config::{QueryConfig, TruncationPolicy};
use crate::error::{AllocationTarget, EngineStage, NavError, Result};
use crate::transform::{to_mesh_space, to_world_space, WorldPoint};

/// Endpoints of a path query and the number of waypoints the caller accepts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathRequest {
    pub start: WorldPoint,
    pub end: WorldPoint,
    pub capacity: usize,
}

impl PathRequest {
    pub fn new(start: WorldPoint, end: WorldPoint, capacity: usize) -> Self {
        Self {
            start,
            end,
            capacity,
        }
    }
}

/// Waypoints produced by a path query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathResult {
    /// World-space waypoints; unless truncated, the last one is the
    /// requested end point
    pub waypoints: Vec<WorldPoint>,
    /// The end polygon was unreachable; the waypoints lead as close as the
    /// mesh allows before jumping to the end point
    pub partial: bool,
    /// Waypoints were dropped, either past the caller's capacity or past
    /// the configured corridor and straight-path limits
    pub truncated: bool,
}

impl PathResult {
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

/// Query context bound to a shared mesh
///
/// Each `PathQuery` owns its search memory, so several of them can run on
/// different threads over the same mesh.
#[derive(Debug)]
pub struct PathQuery {
    mesh: Arc<NavMesh>,
    query: NavMeshQuery,
    config: QueryConfig,
}

impl PathQuery {
    /// Creates a query context and allocates its node pool
    pub fn new(mesh: Arc<NavMesh>, config: QueryConfig) -> Result<Self> {
        let query = new_query_context(&mesh, &config)?;
        Ok(Self {
            mesh,
            query,
            config,
        })
    }

    pub fn mesh(&self) -> &Arc<NavMesh> {
        &self.mesh
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Runs the full pipeline for `request`
    pub fn find_path(&mut self, request: &PathRequest) -> Result<PathResult> {
        run(&mut self.query, &self.mesh, &self.config, request)
    }

    /// Writes the path from `start` to `end` into `out`
    ///
    /// Returns the number of waypoints written, or the [`NavError::code`] of
    /// the failure. Nothing is written on failure.
    pub fn find_path_into(
        &mut self,
        start: WorldPoint,
        end: WorldPoint,
        out: &mut [WorldPoint],
    ) -> i32 {
        let request = PathRequest::new(start, end, out.len());
        write_into(self.find_path(&request), out)
    }
}

/// Allocates a query context's node pool against `mesh`, leaving it unbound
pub(crate) fn new_query_context(mesh: &Arc<NavMesh>, config: &QueryConfig) -> Result<NavMeshQuery> {
    let mut query = NavMeshQuery::new();
    query
        .init(Arc::clone(mesh), config.max_nodes)
        .map_err(|status| {
            NavError::from_engine_init(
                EngineStage::QueryInit,
                AllocationTarget::QueryContext,
                status,
            )
        })?;
    query.release();
    Ok(query)
}

/// Runs a request with `query` bound to `mesh` for the duration of the call
pub(crate) fn run(
    query: &mut NavMeshQuery,
    mesh: &Arc<NavMesh>,
    config: &QueryConfig,
    request: &PathRequest,
) -> Result<PathResult> {
    query
        .init(Arc::clone(mesh), config.max_nodes)
        .map_err(|status| {
            NavError::from_engine_init(
                EngineStage::QueryInit,
                AllocationTarget::QueryContext,
                status,
            )
        })?;
    let result = search(query, config, request);
    query.release();
    result
}

fn search(
    query: &mut NavMeshQuery,
    config: &QueryConfig,
    request: &PathRequest,
) -> Result<PathResult> {
    let start = to_mesh_space(request.start);
    let end = to_mesh_space(request.end);
    let filter = config.filter();

    let (start_ref, _) = query
        .find_nearest_poly(&start, &config.half_extents, &filter)
        .map_err(NavError::Engine)?;
    let (end_ref, _) = query
        .find_nearest_poly(&end, &config.half_extents, &filter)
        .map_err(NavError::Engine)?;
    if !start_ref.is_valid() || !end_ref.is_valid() {
        log::warn!("Could not find any nearby polygons ({start_ref}, {end_ref})");
        return Err(NavError::NoNearestPolygon { start_ref, end_ref });
    }

    let corridor = query
        .find_path(start_ref, end_ref, &start, &end, &filter, config.max_path_polys)
        .map_err(NavError::Engine)?;
    if corridor.polys.is_empty() {
        return Err(NavError::NoPathFound);
    }
    if corridor.partial {
        log::debug!(
            "Corridor from {start_ref} stops short of {end_ref} ({} polygons, out of nodes: {})",
            corridor.polys.len(),
            corridor.out_of_nodes
        );
    }
    if corridor.truncated {
        log::debug!("Corridor cut to {} polygons", config.max_path_polys);
    }

    let straight = query
        .find_straight_path(&start, &end, &corridor.polys, config.max_straight_path)
        .map_err(NavError::Engine)?;
    if straight.truncated {
        log::debug!("Straight path cut to {} vertices", config.max_straight_path);
    }

    let required = straight.len() + 1;
    let mut result = PathResult {
        waypoints: Vec::new(),
        partial: corridor.partial || straight.partial,
        truncated: corridor.truncated || straight.truncated,
    };

    if required > request.capacity {
        match config.truncation {
            TruncationPolicy::Error => {
                log::debug!(
                    "Path needs {required} waypoints, caller accepts {}",
                    request.capacity
                );
                return Err(NavError::CapacityExceeded {
                    required,
                    capacity: request.capacity,
                });
            }
            TruncationPolicy::Truncate => {
                log::debug!("Truncating path from {required} to {} waypoints", request.capacity);
                result.truncated = true;
            }
        }
    }

    let keep = required.min(request.capacity);
    result.waypoints.reserve_exact(keep);
    result.waypoints.extend(
        straight
            .points
            .iter()
            .map(|&p| to_world_space(p))
            .take(keep),
    );
    if result.waypoints.len() < keep {
        result.waypoints.push(request.end);
    }

    Ok(result)
}

/// Copies a pipeline outcome into a flat output buffer
pub(crate) fn write_into(result: Result<PathResult>, out: &mut [WorldPoint]) -> i32 {
    match result {
        Ok(result) => {
            let n = result.waypoints.len().min(out.len());
            out[..n].copy_from_slice(&result.waypoints[..n]);
            i32::try_from(n).unwrap_or(i32::MAX)
        }
        Err(err) => err.code(),
    }
}
