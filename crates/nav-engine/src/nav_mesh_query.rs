//! Queries over a shared navigation mesh
//!
//! A [`NavMeshQuery`] holds the working memory of a search (node pool and
//! open list) and a shared handle to the mesh it searches. The mesh is
//! never modified by a query, so any number of query objects can search the
//! same `Arc<NavMesh>` from different threads.

use std::sync::Arc;

use super::geometry::{dist_pt_seg_sqr_2d, point_in_polygon_2d, tri_area_2d, v_equal, vdist, vlerp};
use super::nav_mesh::{MeshTile, Poly};
use super::node_pool::{NodeFlags, NodeIndex, NodePool, NodeQueue, NULL_IDX};
use super::{NavMesh, PolyRef, QueryFilter, Result, Status};

/// Heuristic scale, slightly below one to keep the search admissible
const H_SCALE: f32 = 0.999;

bitflags::bitflags! {
    /// Role of a straight path vertex
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StraightPathFlags: u8 {
        /// First vertex of the path
        const START = 0x01;
        /// Last vertex of the path
        const END = 0x02;
        /// Vertex starts an off-mesh connection
        const OFFMESH_CONNECTION = 0x04;
    }
}

/// Polygon corridor produced by [`NavMeshQuery::find_path`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolyCorridor {
    /// Polygons from the start polygon onwards
    pub polys: Vec<PolyRef>,
    /// The end polygon was not reached; the corridor leads to the polygon
    /// closest to the end position instead
    pub partial: bool,
    /// The node budget ran out during the search
    pub out_of_nodes: bool,
    /// The corridor was cut to the requested maximum length
    pub truncated: bool,
}

/// String-pulled path through a corridor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StraightPath {
    /// Path vertices in mesh space
    pub points: Vec<[f32; 3]>,
    /// Flags per vertex
    pub flags: Vec<StraightPathFlags>,
    /// Polygon entered at each vertex (null for the end vertex)
    pub refs: Vec<PolyRef>,
    /// The corridor was broken and the path stops early
    pub partial: bool,
    /// The vertex budget was exhausted before the end was reached
    pub truncated: bool,
}

impl StraightPath {
    /// Number of vertices
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Appends a vertex, merging it into the previous one if they coincide.
    /// Returns false once no more vertices should be added.
    fn append(
        &mut self,
        pos: [f32; 3],
        flags: StraightPathFlags,
        reference: PolyRef,
        max_points: usize,
    ) -> bool {
        if let Some(last) = self.points.last() {
            if v_equal(last, &pos) {
                if let (Some(f), Some(r)) = (self.flags.last_mut(), self.refs.last_mut()) {
                    *f = flags;
                    *r = reference;
                }
                return true;
            }
        }

        self.points.push(pos);
        self.flags.push(flags);
        self.refs.push(reference);

        if self.points.len() >= max_points {
            if !flags.contains(StraightPathFlags::END) {
                self.truncated = true;
            }
            return false;
        }
        !flags.contains(StraightPathFlags::END)
    }
}

/// Search context bound to one navigation mesh
#[derive(Debug, Default)]
pub struct NavMeshQuery {
    nav_mesh: Option<Arc<NavMesh>>,
    node_pool: Option<NodePool>,
    open_list: NodeQueue,
}

impl NavMeshQuery {
    /// Creates an unbound query
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the query to a mesh with a node budget of `max_nodes`
    ///
    /// Re-initializing with the same budget reuses the node pool.
    pub fn init(&mut self, nav_mesh: Arc<NavMesh>, max_nodes: usize) -> Result<()> {
        match self.node_pool.as_mut() {
            Some(pool) if pool.max_nodes() == max_nodes => pool.clear(),
            _ => self.node_pool = Some(NodePool::new(max_nodes)?),
        }
        self.open_list.clear();
        self.nav_mesh = Some(nav_mesh);
        Ok(())
    }

    /// Drops the query's handle to its mesh
    pub fn release(&mut self) -> Option<Arc<NavMesh>> {
        self.open_list.clear();
        self.nav_mesh.take()
    }

    /// The mesh the query is bound to
    pub fn nav_mesh(&self) -> Option<&Arc<NavMesh>> {
        self.nav_mesh.as_ref()
    }

    /// Node budget of the bound pool, 0 when unbound
    pub fn max_nodes(&self) -> usize {
        self.node_pool.as_ref().map_or(0, NodePool::max_nodes)
    }

    fn mesh(&self) -> Result<&NavMesh> {
        self.nav_mesh.as_deref().ok_or(Status::InvalidParam)
    }

    /// Finds the polygon nearest to `center` within the search box
    ///
    /// Returns the null reference (and `center` itself) when no polygon
    /// passing `filter` overlaps the box.
    pub fn find_nearest_poly(
        &self,
        center: &[f32; 3],
        half_extents: &[f32; 3],
        filter: &QueryFilter,
    ) -> Result<(PolyRef, [f32; 3])> {
        let mesh = self.mesh()?;
        let bmin = [
            center[0] - half_extents[0],
            center[1] - half_extents[1],
            center[2] - half_extents[2],
        ];
        let bmax = [
            center[0] + half_extents[0],
            center[1] + half_extents[1],
            center[2] + half_extents[2],
        ];

        let mut nearest_ref = PolyRef::NULL;
        let mut nearest_point = *center;
        let mut nearest_distance_sqr = f32::MAX;

        for poly_ref in mesh.query_polygons(&bmin, &bmax, filter) {
            let (tile, poly_index) = resolve(mesh, poly_ref)?;
            let (closest, over_poly) = tile.closest_point_on_poly(poly_index, center);

            let diff = [
                center[0] - closest[0],
                center[1] - closest[1],
                center[2] - closest[2],
            ];
            // Standing over a polygon within climb height counts as on it.
            let d = if over_poly {
                let h = diff[1].abs() - tile.header.walkable_climb;
                if h > 0.0 {
                    h * h
                } else {
                    0.0
                }
            } else {
                diff[0] * diff[0] + diff[1] * diff[1] + diff[2] * diff[2]
            };

            if d < nearest_distance_sqr {
                nearest_distance_sqr = d;
                nearest_point = closest;
                nearest_ref = poly_ref;
            }
        }

        Ok((nearest_ref, nearest_point))
    }

    /// Closest point on a polygon and whether `pos` lies over it
    pub fn closest_point_on_poly(
        &self,
        poly_ref: PolyRef,
        pos: &[f32; 3],
    ) -> Result<([f32; 3], bool)> {
        let (tile, poly_index) = resolve(self.mesh()?, poly_ref)?;
        Ok(tile.closest_point_on_poly(poly_index, pos))
    }

    /// `pos` if it lies inside the polygon on the xz-plane, otherwise the
    /// closest point on the polygon boundary
    pub fn closest_point_on_poly_boundary(
        &self,
        poly_ref: PolyRef,
        pos: &[f32; 3],
    ) -> Result<[f32; 3]> {
        let (tile, poly) = self.mesh()?.get_tile_and_poly_by_ref(poly_ref)?;
        let (verts, nv) = tile.poly_vertices(poly);
        let verts = &verts[..nv];
        if point_in_polygon_2d(pos, verts) {
            return Ok(*pos);
        }

        let mut best = (f32::MAX, 0usize, 0.0f32);
        for j in 0..nv {
            let (d, t) = dist_pt_seg_sqr_2d(pos, &verts[j], &verts[(j + 1) % nv]);
            if d < best.0 {
                best = (d, j, t);
            }
        }
        let (_, edge, t) = best;
        Ok(vlerp(&verts[edge], &verts[(edge + 1) % nv], t))
    }

    /// Left and right end points of the portal between two linked polygons
    pub fn get_portal_points(&self, from: PolyRef, to: PolyRef) -> Result<([f32; 3], [f32; 3])> {
        let mesh = self.mesh()?;
        let (from_tile, from_poly) = mesh.get_tile_and_poly_by_ref(from)?;
        mesh.get_tile_and_poly_by_ref(to)?;
        portal_points(from_tile, from_poly, to)
    }

    /// Finds a polygon corridor from `start_ref` to `end_ref`
    ///
    /// The search visits at most the node budget given to [`init`]. When
    /// the end polygon cannot be reached, the corridor leads to the
    /// visited polygon closest to `end_pos` and is flagged `partial`. A
    /// corridor longer than `max_path` keeps its first `max_path` polygons.
    ///
    /// [`init`]: NavMeshQuery::init
    pub fn find_path(
        &mut self,
        start_ref: PolyRef,
        end_ref: PolyRef,
        start_pos: &[f32; 3],
        end_pos: &[f32; 3],
        filter: &QueryFilter,
        max_path: usize,
    ) -> Result<PolyCorridor> {
        let mesh = self.nav_mesh.clone().ok_or(Status::InvalidParam)?;
        let pool = self.node_pool.as_mut().ok_or(Status::InvalidParam)?;
        if max_path == 0 || !mesh.is_valid_poly_ref(start_ref) || !mesh.is_valid_poly_ref(end_ref) {
            return Err(Status::InvalidParam);
        }

        if start_ref == end_ref {
            return Ok(PolyCorridor {
                polys: vec![start_ref],
                ..Default::default()
            });
        }

        pool.clear();
        self.open_list.clear();

        let start = pool.get_node(start_ref).ok_or(Status::OutOfMemory)?;
        {
            let node = pool.node_mut(start);
            node.pos = *start_pos;
            node.parent = NULL_IDX;
            node.cost = 0.0;
            node.total = vdist(start_pos, end_pos) * H_SCALE;
            node.flags = NodeFlags::OPEN;
            self.open_list.push(start, node.total);
        }

        let mut last_best = start;
        let mut last_best_cost = pool.node(start).total;
        let mut out_of_nodes = false;

        while let Some((best, queued_total)) = self.open_list.pop() {
            {
                let node = pool.node_mut(best);
                if node.total != queued_total || !node.flags.contains(NodeFlags::OPEN) {
                    continue;
                }
                node.flags.remove(NodeFlags::OPEN);
                node.flags.insert(NodeFlags::CLOSED);
            }

            let best_node = pool.node(best).clone();
            if best_node.id == end_ref {
                last_best = best;
                break;
            }

            let (best_tile, best_poly) = mesh.get_tile_and_poly_by_ref(best_node.id)?;
            let parent_ref = if best_node.parent != NULL_IDX {
                pool.node(best_node.parent).id
            } else {
                PolyRef::NULL
            };

            for link in &best_poly.links {
                let neighbour_ref = link.reference;
                if !neighbour_ref.is_valid() || neighbour_ref == parent_ref {
                    continue;
                }
                let Ok((_, neighbour_poly)) = mesh.get_tile_and_poly_by_ref(neighbour_ref) else {
                    continue;
                };
                if !filter.pass_filter(neighbour_poly.flags) {
                    continue;
                }

                let Some(neighbour) = pool.get_node(neighbour_ref) else {
                    out_of_nodes = true;
                    continue;
                };

                if pool.node(neighbour).flags.is_empty() {
                    let (left, right) = portal_points(best_tile, best_poly, neighbour_ref)?;
                    pool.node_mut(neighbour).pos = vlerp(&left, &right, 0.5);
                }
                let neighbour_pos = pool.node(neighbour).pos;

                let cur_cost =
                    vdist(&best_node.pos, &neighbour_pos) * filter.area_cost(best_poly.area);
                let (cost, heuristic) = if neighbour_ref == end_ref {
                    let end_cost =
                        vdist(&neighbour_pos, end_pos) * filter.area_cost(neighbour_poly.area);
                    (best_node.cost + cur_cost + end_cost, 0.0)
                } else {
                    (best_node.cost + cur_cost, vdist(&neighbour_pos, end_pos) * H_SCALE)
                };
                let total = cost + heuristic;

                let node = pool.node_mut(neighbour);
                let visited = node.flags.intersects(NodeFlags::OPEN | NodeFlags::CLOSED);
                if visited && total >= node.total {
                    continue;
                }

                node.parent = best;
                node.cost = cost;
                node.total = total;
                node.flags.remove(NodeFlags::CLOSED);
                node.flags.insert(NodeFlags::OPEN);
                self.open_list.push(neighbour, total);

                if heuristic < last_best_cost {
                    last_best_cost = heuristic;
                    last_best = neighbour;
                }
            }
        }

        let mut corridor = path_to_node(pool, last_best, max_path);
        corridor.partial = pool.node(last_best).id != end_ref;
        corridor.out_of_nodes = out_of_nodes;

        if corridor.partial {
            log::debug!(
                "Corridor {start_ref} -> {end_ref} is partial ({} polys, out of nodes: {})",
                corridor.polys.len(),
                out_of_nodes
            );
        }
        Ok(corridor)
    }

    /// String-pulls `start_pos` to `end_pos` through `path`
    ///
    /// The end points are first clamped onto the first and last corridor
    /// polygons. At most `max_points` vertices are produced.
    pub fn find_straight_path(
        &self,
        start_pos: &[f32; 3],
        end_pos: &[f32; 3],
        path: &[PolyRef],
        max_points: usize,
    ) -> Result<StraightPath> {
        let mesh = self.mesh()?;
        let (Some(&first), Some(&last)) = (path.first(), path.last()) else {
            return Err(Status::InvalidParam);
        };
        if max_points == 0 {
            return Err(Status::InvalidParam);
        }

        let closest_start = self.closest_point_on_poly_boundary(first, start_pos)?;
        let mut closest_end = self.closest_point_on_poly_boundary(last, end_pos)?;

        let mut result = StraightPath::default();
        if !result.append(closest_start, StraightPathFlags::START, first, max_points) {
            return Ok(result);
        }

        if path.len() > 1 {
            let mut apex = closest_start;
            let mut portal_left = apex;
            let mut portal_right = apex;
            let mut left_index = 0;
            let mut right_index = 0;
            let mut left_ref = first;
            let mut right_ref = first;

            // Each corner restarts the scan at most once per corridor polygon.
            let iteration_limit = path.len().saturating_mul(max_points.saturating_add(1));
            let mut iterations = 0;

            let mut i = 0;
            while i < path.len() {
                iterations += 1;
                if iterations > iteration_limit {
                    log::warn!("String-pulling made no progress after {iteration_limit} steps");
                    result.partial = true;
                    return Ok(result);
                }

                let (left, right) = if i + 1 < path.len() {
                    let portal = mesh
                        .get_tile_and_poly_by_ref(path[i])
                        .and_then(|(tile, poly)| portal_points(tile, poly, path[i + 1]));
                    match portal {
                        Ok(points) => points,
                        Err(_) => {
                            // Broken corridor: stop at the last reachable polygon.
                            closest_end = self.closest_point_on_poly_boundary(path[i], end_pos)?;
                            result.append(
                                closest_end,
                                StraightPathFlags::empty(),
                                path[i],
                                max_points,
                            );
                            result.partial = true;
                            return Ok(result);
                        }
                    }
                } else {
                    (closest_end, closest_end)
                };

                // Skip portals the start point already touches.
                if i == 0 {
                    let (d, _) = dist_pt_seg_sqr_2d(&apex, &left, &right);
                    if d < 0.001 * 0.001 {
                        i += 1;
                        continue;
                    }
                }

                let next_ref = path.get(i + 1).copied().unwrap_or(PolyRef::NULL);

                if tri_area_2d(&apex, &portal_right, &right) <= 0.0 {
                    if v_equal(&apex, &portal_right)
                        || tri_area_2d(&apex, &portal_left, &right) > 0.0
                    {
                        portal_right = right;
                        right_ref = next_ref;
                        right_index = i;
                    } else {
                        apex = portal_left;
                        let apex_index = left_index;
                        let flags = corner_flags(left_ref);
                        if !result.append(apex, flags, left_ref, max_points) {
                            return Ok(result);
                        }
                        portal_left = apex;
                        portal_right = apex;
                        left_index = apex_index;
                        right_index = apex_index;
                        i = apex_index + 1;
                        continue;
                    }
                }

                if tri_area_2d(&apex, &portal_left, &left) >= 0.0 {
                    if v_equal(&apex, &portal_left)
                        || tri_area_2d(&apex, &portal_right, &left) < 0.0
                    {
                        portal_left = left;
                        left_ref = next_ref;
                        left_index = i;
                    } else {
                        apex = portal_right;
                        let apex_index = right_index;
                        let flags = corner_flags(right_ref);
                        if !result.append(apex, flags, right_ref, max_points) {
                            return Ok(result);
                        }
                        portal_left = apex;
                        portal_right = apex;
                        left_index = apex_index;
                        right_index = apex_index;
                        i = apex_index + 1;
                        continue;
                    }
                }

                i += 1;
            }
        }

        result.append(closest_end, StraightPathFlags::END, PolyRef::NULL, max_points);
        Ok(result)
    }
}

fn corner_flags(reference: PolyRef) -> StraightPathFlags {
    if reference.is_valid() {
        StraightPathFlags::empty()
    } else {
        StraightPathFlags::END
    }
}

fn resolve(mesh: &NavMesh, poly_ref: PolyRef) -> Result<(&MeshTile, usize)> {
    let (tile, _) = mesh.get_tile_and_poly_by_ref(poly_ref)?;
    let (_, _, poly_id) = super::nav_mesh::decode_poly_ref(poly_ref);
    Ok((tile, poly_id as usize))
}

fn portal_points(
    from_tile: &MeshTile,
    from_poly: &Poly,
    to: PolyRef,
) -> Result<([f32; 3], [f32; 3])> {
    let link = from_poly
        .links
        .iter()
        .find(|link| link.reference == to)
        .ok_or(Status::InvalidParam)?;

    let nv = from_poly.vert_count as usize;
    let edge = link.edge as usize;
    let v0 = from_tile.verts[from_poly.verts[edge] as usize];
    let v1 = from_tile.verts[from_poly.verts[(edge + 1) % nv] as usize];

    // Only part of the edge is shared with a polygon in the next tile.
    if link.is_external() && (link.bmin != 0 || link.bmax != 255) {
        let s = 1.0 / 255.0;
        return Ok((
            vlerp(&v0, &v1, link.bmin as f32 * s),
            vlerp(&v0, &v1, link.bmax as f32 * s),
        ));
    }
    Ok((v0, v1))
}

fn path_to_node(pool: &NodePool, end: NodeIndex, max_path: usize) -> PolyCorridor {
    let mut polys = Vec::new();
    let mut cur = end;
    while cur != NULL_IDX {
        let node = pool.node(cur);
        polys.push(node.id);
        cur = node.parent;
    }
    polys.reverse();

    let truncated = polys.len() > max_path;
    polys.truncate(max_path);
    PolyCorridor {
        polys,
        truncated,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_mesh_helpers::{
        adjacent_tiles_nav_mesh, single_quad_nav_mesh, wall_tile_nav_mesh, WALL_TILE_ISLAND,
    };

    const EXTENTS: [f32; 3] = [2.0, 4.0, 2.0];

    fn query_for(mesh: NavMesh, max_nodes: usize) -> NavMeshQuery {
        let mut query = NavMeshQuery::new();
        query.init(Arc::new(mesh), max_nodes).unwrap();
        query
    }

    fn snap(query: &NavMeshQuery, pos: [f32; 3]) -> PolyRef {
        let (r, _) = query
            .find_nearest_poly(&pos, &EXTENTS, &QueryFilter::default())
            .unwrap();
        r
    }

    fn assert_near(a: [f32; 3], b: [f32; 3]) {
        for k in 0..3 {
            assert!((a[k] - b[k]).abs() < 1e-4, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn test_init_rejects_zero_nodes() {
        let mut query = NavMeshQuery::new();
        let mesh = Arc::new(single_quad_nav_mesh().unwrap());
        assert_eq!(query.init(mesh, 0), Err(Status::InvalidParam));
        assert!(query.nav_mesh().is_none());
    }

    #[test]
    fn test_unbound_query_fails() {
        let query = NavMeshQuery::new();
        let filter = QueryFilter::default();
        assert_eq!(
            query.find_nearest_poly(&[1.0, 0.0, 1.0], &EXTENTS, &filter).err(),
            Some(Status::InvalidParam)
        );
    }

    #[test]
    fn test_release_drops_mesh_handle() {
        let mesh = Arc::new(single_quad_nav_mesh().unwrap());
        let mut query = NavMeshQuery::new();
        query.init(Arc::clone(&mesh), 64).unwrap();
        assert_eq!(Arc::strong_count(&mesh), 2);
        assert!(query.release().is_some());
        assert_eq!(Arc::strong_count(&mesh), 1);
    }

    #[test]
    fn test_find_nearest_poly() {
        let query = query_for(single_quad_nav_mesh().unwrap(), 64);
        let filter = QueryFilter::default();

        let (r, p) = query
            .find_nearest_poly(&[1.0, 0.5, 1.0], &EXTENTS, &filter)
            .unwrap();
        assert!(r.is_valid());
        assert_near(p, [1.0, 0.0, 1.0]);

        // Just outside the tile, still within the search box.
        let (r, p) = query
            .find_nearest_poly(&[11.0, 0.0, 5.0], &EXTENTS, &filter)
            .unwrap();
        assert!(r.is_valid());
        assert_near(p, [10.0, 0.0, 5.0]);

        let (r, _) = query
            .find_nearest_poly(&[100.0, 0.0, 100.0], &EXTENTS, &filter)
            .unwrap();
        assert_eq!(r, PolyRef::NULL);
    }

    #[test]
    fn test_filter_excludes_polys() {
        let query = query_for(single_quad_nav_mesh().unwrap(), 64);
        let filter = QueryFilter::new(crate::PolyFlags::ALL, crate::PolyFlags::WALK);
        let (r, _) = query
            .find_nearest_poly(&[1.0, 0.0, 1.0], &EXTENTS, &filter)
            .unwrap();
        assert_eq!(r, PolyRef::NULL);
    }

    #[test]
    fn test_path_within_one_poly() {
        let mut query = query_for(single_quad_nav_mesh().unwrap(), 64);
        let start = [1.0, 0.0, 1.0];
        let end = [9.0, 0.0, 9.0];
        let r = snap(&query, start);

        let corridor = query
            .find_path(r, r, &start, &end, &QueryFilter::default(), 256)
            .unwrap();
        assert_eq!(corridor.polys, vec![r]);
        assert!(!corridor.partial);

        let straight = query.find_straight_path(&start, &end, &corridor.polys, 256).unwrap();
        assert_eq!(straight.points, vec![start, end]);
        assert_eq!(straight.flags[0], StraightPathFlags::START);
        assert_eq!(straight.flags[1], StraightPathFlags::END);
    }

    #[test]
    fn test_path_around_wall() {
        let mut query = query_for(wall_tile_nav_mesh().unwrap(), 256);
        let start = [1.0, 0.0, 1.0];
        let end = [9.0, 0.0, 1.0];
        let start_ref = snap(&query, start);
        let end_ref = snap(&query, end);

        let corridor = query
            .find_path(start_ref, end_ref, &start, &end, &QueryFilter::default(), 256)
            .unwrap();
        assert_eq!(corridor.polys.len(), 5);
        assert_eq!(corridor.polys.first(), Some(&start_ref));
        assert_eq!(corridor.polys.last(), Some(&end_ref));
        assert!(!corridor.partial && !corridor.out_of_nodes && !corridor.truncated);

        let straight = query.find_straight_path(&start, &end, &corridor.polys, 256).unwrap();
        assert_eq!(straight.len(), 4);
        assert_near(straight.points[0], start);
        assert_near(straight.points[1], [4.0, 0.0, 8.0]);
        assert_near(straight.points[2], [6.0, 0.0, 8.0]);
        assert_near(straight.points[3], end);
        assert!(!straight.truncated);
    }

    #[test]
    fn test_unreachable_end_gives_partial_corridor() {
        let mut query = query_for(wall_tile_nav_mesh().unwrap(), 256);
        let start = [1.0, 0.0, 1.0];
        let end = WALL_TILE_ISLAND;
        let start_ref = snap(&query, start);
        let end_ref = snap(&query, end);
        assert!(end_ref.is_valid());

        let corridor = query
            .find_path(start_ref, end_ref, &start, &end, &QueryFilter::default(), 256)
            .unwrap();
        assert!(corridor.partial);
        assert_eq!(corridor.polys, vec![start_ref]);
    }

    #[test]
    fn test_node_budget_bounds_search() {
        let mut query = query_for(wall_tile_nav_mesh().unwrap(), 2);
        let start = [1.0, 0.0, 1.0];
        let end = [9.0, 0.0, 1.0];
        let start_ref = snap(&query, start);
        let end_ref = snap(&query, end);

        let corridor = query
            .find_path(start_ref, end_ref, &start, &end, &QueryFilter::default(), 256)
            .unwrap();
        assert!(corridor.out_of_nodes);
        assert!(corridor.partial);
    }

    #[test]
    fn test_long_corridor_is_truncated() {
        let mut query = query_for(wall_tile_nav_mesh().unwrap(), 256);
        let start = [1.0, 0.0, 1.0];
        let end = [9.0, 0.0, 1.0];
        let start_ref = snap(&query, start);
        let end_ref = snap(&query, end);

        let corridor = query
            .find_path(start_ref, end_ref, &start, &end, &QueryFilter::default(), 3)
            .unwrap();
        assert_eq!(corridor.polys.len(), 3);
        assert_eq!(corridor.polys[0], start_ref);
        assert!(corridor.truncated);
        assert!(!corridor.partial);
    }

    #[test]
    fn test_straight_path_respects_budget() {
        let mut query = query_for(wall_tile_nav_mesh().unwrap(), 256);
        let start = [1.0, 0.0, 1.0];
        let end = [9.0, 0.0, 1.0];
        let start_ref = snap(&query, start);
        let end_ref = snap(&query, end);
        let corridor = query
            .find_path(start_ref, end_ref, &start, &end, &QueryFilter::default(), 256)
            .unwrap();

        let straight = query.find_straight_path(&start, &end, &corridor.polys, 2).unwrap();
        assert_eq!(straight.len(), 2);
        assert!(straight.truncated);
        assert_near(straight.points[1], [4.0, 0.0, 8.0]);
    }

    #[test]
    fn test_path_crosses_tile_border() {
        let mut query = query_for(adjacent_tiles_nav_mesh().unwrap(), 64);
        let start = [1.0, 0.0, 5.0];
        let end = [19.0, 0.0, 5.0];
        let start_ref = snap(&query, start);
        let end_ref = snap(&query, end);
        assert_ne!(start_ref, end_ref);

        let corridor = query
            .find_path(start_ref, end_ref, &start, &end, &QueryFilter::default(), 256)
            .unwrap();
        assert_eq!(corridor.polys, vec![start_ref, end_ref]);

        let (left, right) = query.get_portal_points(start_ref, end_ref).unwrap();
        assert_near(left, [10.0, 0.0, 10.0]);
        assert_near(right, [10.0, 0.0, 0.0]);

        let straight = query.find_straight_path(&start, &end, &corridor.polys, 256).unwrap();
        assert_eq!(straight.points, vec![start, end]);
    }

    #[test]
    fn test_straight_path_requires_corridor() {
        let query = query_for(single_quad_nav_mesh().unwrap(), 64);
        assert_eq!(
            query
                .find_straight_path(&[0.0; 3], &[1.0, 0.0, 1.0], &[], 8)
                .err(),
            Some(Status::InvalidParam)
        );
    }
}
