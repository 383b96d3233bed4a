//! Tiled navigation mesh
//!
//! The mesh owns a fixed table of tile slots. A tile enters the mesh as a
//! serialized blob which the mesh parses, links to its neighbours and then
//! keeps for as long as the tile is registered.

use std::collections::HashMap;
use std::fmt;

use super::binary_format::{load_tile_from_binary, read_tile_header};
use super::geometry::{
    closest_height_point_triangle, dist_pt_seg_sqr_2d, opposite_tile, overlap_bounds,
    point_in_polygon_2d, vlerp,
};
use super::{
    NavMeshParams, PolyFlags, PolyRef, PolyType, QueryFilter, Result, Status, TileRef, EXT_LINK,
    MAX_VERTS_PER_POLY,
};

/// Number of bits for polygon id
const POLY_BITS: u32 = 16;
/// Number of bits for tile id
const TILE_BITS: u32 = 10;
/// Number of bits for salt
const SALT_BITS: u32 = 6;

const POLY_MASK: u32 = (1 << POLY_BITS) - 1;
const TILE_MASK: u32 = (1 << TILE_BITS) - 1;
const SALT_MASK: u32 = (1 << SALT_BITS) - 1;

/// Link side marking a connection inside the same tile
pub const INTERNAL_LINK: u8 = 0xff;

/// Maximum number of polygons an edge can connect to across a tile border
const MAX_EDGE_CONNECTIONS: usize = 4;

/// Creates a PolyRef from salt, tile and polygon ids
///
/// Tile ids are 1-based so that no valid reference equals [`PolyRef::NULL`].
#[inline]
pub fn encode_poly_ref(salt: u32, tile_id: u32, poly_id: u32) -> PolyRef {
    PolyRef::new(
        ((salt & SALT_MASK) << (POLY_BITS + TILE_BITS))
            | ((tile_id & TILE_MASK) << POLY_BITS)
            | (poly_id & POLY_MASK),
    )
}

/// Decodes a PolyRef into salt, tile and polygon ids
#[inline]
pub fn decode_poly_ref(reference: PolyRef) -> (u32, u32, u32) {
    let id = reference.id();
    (
        (id >> (POLY_BITS + TILE_BITS)) & SALT_MASK,
        (id >> POLY_BITS) & TILE_MASK,
        id & POLY_MASK,
    )
}

/// Connection from one polygon edge to another polygon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    /// Polygon on the other side of the edge
    pub reference: PolyRef,
    /// Edge index on the owning polygon
    pub edge: u8,
    /// Tile side for cross-tile links, [`INTERNAL_LINK`] otherwise
    pub side: u8,
    /// Start of the shared portal section along the edge (0..=255)
    pub bmin: u8,
    /// End of the shared portal section along the edge (0..=255)
    pub bmax: u8,
}

impl Link {
    /// Whether the link crosses a tile border
    pub fn is_external(&self) -> bool {
        self.side != INTERNAL_LINK
    }
}

/// Polygon stored in a tile
#[derive(Debug, Clone)]
pub struct Poly {
    /// Indices into the tile vertex array
    pub verts: [u16; MAX_VERTS_PER_POLY],
    /// Per-edge neighbour: 0 for a wall, `index + 1` for an internal
    /// neighbour, `EXT_LINK | side` for a tile portal
    pub neis: [u16; MAX_VERTS_PER_POLY],
    /// Traversal flags
    pub flags: PolyFlags,
    /// Number of vertices in use
    pub vert_count: u8,
    /// Area id (0..64)
    pub area: u8,
    /// Polygon kind
    pub poly_type: PolyType,
    /// Links built when the tile is registered
    pub links: Vec<Link>,
}

/// Detail sub-mesh of a polygon
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PolyDetail {
    pub vert_base: u32,
    pub tri_base: u32,
    pub vert_count: u8,
    pub tri_count: u8,
}

/// Node of a tile's quantized bounding-volume tree
///
/// Leaves carry a polygon index in `i`; inner nodes carry the negated
/// escape offset to the next sibling subtree.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BVNode {
    pub bmin: [u16; 3],
    pub bmax: [u16; 3],
    pub i: i32,
}

/// Off-mesh connection record
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OffMeshConnection {
    /// Start and end positions
    pub pos: [f32; 6],
    pub radius: f32,
    /// Polygon index of the connection inside the tile
    pub poly: u16,
    pub flags: u8,
    pub side: u8,
    pub user_id: u32,
}

/// Tile header as stored in the blob
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileHeader {
    pub x: i32,
    pub y: i32,
    pub layer: i32,
    pub user_id: u32,
    pub poly_count: i32,
    pub vert_count: i32,
    pub max_link_count: i32,
    pub detail_mesh_count: i32,
    pub detail_vert_count: i32,
    pub detail_tri_count: i32,
    pub bv_node_count: i32,
    pub off_mesh_con_count: i32,
    pub off_mesh_base: i32,
    pub walkable_height: f32,
    pub walkable_radius: f32,
    pub walkable_climb: f32,
    pub bmin: [f32; 3],
    pub bmax: [f32; 3],
    pub bv_quant_factor: f32,
}

/// A parsed tile
#[derive(Debug, Clone)]
pub struct MeshTile {
    /// Salt of the slot the tile was registered in
    pub salt: u32,
    pub header: TileHeader,
    pub verts: Vec<[f32; 3]>,
    pub polys: Vec<Poly>,
    pub detail_meshes: Vec<PolyDetail>,
    pub detail_verts: Vec<[f32; 3]>,
    pub detail_tris: Vec<[u8; 4]>,
    pub bv_nodes: Vec<BVNode>,
    pub off_mesh_connections: Vec<OffMeshConnection>,
    base: PolyRef,
    data: Vec<u8>,
}

impl MeshTile {
    /// Creates an empty, unregistered tile
    pub fn new(header: TileHeader) -> Self {
        Self {
            salt: 0,
            header,
            verts: Vec::new(),
            polys: Vec::new(),
            detail_meshes: Vec::new(),
            detail_verts: Vec::new(),
            detail_tris: Vec::new(),
            bv_nodes: Vec::new(),
            off_mesh_connections: Vec::new(),
            base: PolyRef::NULL,
            data: Vec::new(),
        }
    }

    /// Reference of the tile, null while unregistered
    pub fn tile_ref(&self) -> TileRef {
        self.base
    }

    /// Reference of the polygon at `index`
    pub fn poly_ref(&self, index: usize) -> PolyRef {
        PolyRef::new(self.base.id() | (index as u32 & POLY_MASK))
    }

    /// The blob the tile was registered from
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Vertex positions of a polygon, in polygon order
    pub fn poly_vertices(&self, poly: &Poly) -> ([[f32; 3]; MAX_VERTS_PER_POLY], usize) {
        let mut out = [[0.0; 3]; MAX_VERTS_PER_POLY];
        let n = poly.vert_count as usize;
        for (dst, &vi) in out.iter_mut().zip(&poly.verts[..n]) {
            *dst = self.verts[vi as usize];
        }
        (out, n)
    }

    /// Axis-aligned bounds of a polygon
    pub fn poly_bounds(&self, poly: &Poly) -> ([f32; 3], [f32; 3]) {
        let (verts, n) = self.poly_vertices(poly);
        let mut bmin = verts[0];
        let mut bmax = verts[0];
        for v in &verts[1..n] {
            for k in 0..3 {
                bmin[k] = bmin[k].min(v[k]);
                bmax[k] = bmax[k].max(v[k]);
            }
        }
        (bmin, bmax)
    }

    /// Height of the polygon surface under `pos`, if `pos` lies inside the
    /// polygon on the xz-plane
    pub fn poly_height(&self, poly_index: usize, pos: &[f32; 3]) -> Option<f32> {
        let poly = self.polys.get(poly_index)?;
        if poly.poly_type == PolyType::OffMeshConnection {
            return None;
        }
        let (verts, nv) = self.poly_vertices(poly);
        if !point_in_polygon_2d(pos, &verts[..nv]) {
            return None;
        }

        if let Some(detail) = self.detail_meshes.get(poly_index) {
            let vertex = |i: u8| -> [f32; 3] {
                let i = i as usize;
                if i < nv {
                    verts[i]
                } else {
                    self.detail_verts[detail.vert_base as usize + i - nv]
                }
            };
            let start = detail.tri_base as usize;
            for tri in &self.detail_tris[start..start + detail.tri_count as usize] {
                let (a, b, c) = (vertex(tri[0]), vertex(tri[1]), vertex(tri[2]));
                if let Some(h) = closest_height_point_triangle(pos, &a, &b, &c) {
                    return Some(h);
                }
            }
        }

        // No detail mesh: fan-triangulate the polygon itself.
        for j in 2..nv {
            if let Some(h) = closest_height_point_triangle(pos, &verts[0], &verts[j - 1], &verts[j])
            {
                return Some(h);
            }
        }
        None
    }

    /// Closest point on the polygon to `pos` and whether `pos` lies over
    /// the polygon
    pub fn closest_point_on_poly(&self, poly_index: usize, pos: &[f32; 3]) -> ([f32; 3], bool) {
        if let Some(h) = self.poly_height(poly_index, pos) {
            return ([pos[0], h, pos[2]], true);
        }
        let Some(poly) = self.polys.get(poly_index) else {
            return (*pos, false);
        };
        let (verts, nv) = self.poly_vertices(poly);

        let mut best = (f32::MAX, 0usize, 0.0f32);
        for j in 0..nv {
            let (d, t) = dist_pt_seg_sqr_2d(pos, &verts[j], &verts[(j + 1) % nv]);
            if d < best.0 {
                best = (d, j, t);
            }
        }
        let (_, edge, t) = best;
        let mut closest = vlerp(&verts[edge], &verts[(edge + 1) % nv], t);
        if let Some(h) = self.poly_height(poly_index, &closest) {
            closest[1] = h;
        }
        (closest, false)
    }
}

/// Tile buffer refused by [`NavMesh::add_tile`]
///
/// The buffer is returned so the caller decides how to dispose of it.
pub struct RejectedTile {
    pub data: Vec<u8>,
    pub status: Status,
}

impl fmt::Debug for RejectedTile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RejectedTile")
            .field("len", &self.data.len())
            .field("status", &self.status)
            .finish()
    }
}

impl fmt::Display for RejectedTile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tile of {} bytes rejected: {}", self.data.len(), self.status)
    }
}

impl std::error::Error for RejectedTile {}

impl From<RejectedTile> for Status {
    fn from(rejected: RejectedTile) -> Self {
        rejected.status
    }
}

#[derive(Debug)]
struct TileSlot {
    salt: u32,
    next_free: Option<usize>,
    tile: Option<MeshTile>,
}

/// Navigation mesh made of up to `max_tiles` tiles
#[derive(Debug)]
pub struct NavMesh {
    params: NavMeshParams,
    slots: Vec<TileSlot>,
    next_free: Option<usize>,
    pos_lookup: HashMap<(i32, i32, i32), usize>,
}

impl NavMesh {
    /// Creates an empty navigation mesh
    pub fn new(params: NavMeshParams) -> Result<Self> {
        if params.origin.iter().any(|v| !v.is_finite()) {
            return Err(Status::InvalidParam);
        }
        if !(params.tile_width > 0.0 && params.tile_height > 0.0) {
            return Err(Status::InvalidParam);
        }
        if params.max_tiles <= 0 || params.max_polys_per_tile <= 0 {
            return Err(Status::InvalidParam);
        }
        if params.max_tiles >= (1 << TILE_BITS) || params.max_polys_per_tile >= (1 << POLY_BITS) {
            return Err(Status::InvalidParam);
        }

        let max_tiles = params.max_tiles as usize;
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(max_tiles)
            .map_err(|_| Status::OutOfMemory)?;
        for i in 0..max_tiles {
            slots.push(TileSlot {
                salt: 1,
                next_free: (i + 1 < max_tiles).then_some(i + 1),
                tile: None,
            });
        }

        log::debug!(
            "Created nav mesh: {} tile slots, {} polys per tile",
            params.max_tiles,
            params.max_polys_per_tile
        );

        Ok(Self {
            params,
            slots,
            next_free: Some(0),
            pos_lookup: HashMap::new(),
        })
    }

    /// Creates a mesh holding exactly one tile, deriving the mesh
    /// parameters from the tile header
    pub fn from_single_tile(data: Vec<u8>) -> std::result::Result<Self, RejectedTile> {
        let header = match read_tile_header(&data) {
            Ok(header) => header,
            Err(status) => return Err(RejectedTile { data, status }),
        };
        let params = NavMeshParams {
            origin: header.bmin,
            tile_width: header.bmax[0] - header.bmin[0],
            tile_height: header.bmax[2] - header.bmin[2],
            max_tiles: 1,
            max_polys_per_tile: header.poly_count.max(1),
        };
        let mut mesh = match Self::new(params) {
            Ok(mesh) => mesh,
            Err(status) => return Err(RejectedTile { data, status }),
        };
        mesh.add_tile(data, None)?;
        Ok(mesh)
    }

    /// Build parameters of the mesh
    pub fn params(&self) -> &NavMeshParams {
        &self.params
    }

    /// Maximum number of tiles
    pub fn max_tiles(&self) -> usize {
        self.slots.len()
    }

    /// Number of registered tiles
    pub fn tile_count(&self) -> usize {
        self.pos_lookup.len()
    }

    /// Registered tiles in slot order
    pub fn tiles(&self) -> impl Iterator<Item = &MeshTile> {
        self.slots.iter().filter_map(|slot| slot.tile.as_ref())
    }

    /// Tile registered at the given grid location
    pub fn tile_at(&self, x: i32, y: i32, layer: i32) -> Option<&MeshTile> {
        let index = *self.pos_lookup.get(&(x, y, layer))?;
        self.slots[index].tile.as_ref()
    }

    /// Grid location containing a mesh-space position
    pub fn calc_tile_loc(&self, pos: &[f32; 3]) -> (i32, i32) {
        let tx = ((pos[0] - self.params.origin[0]) / self.params.tile_width).floor() as i32;
        let ty = ((pos[2] - self.params.origin[2]) / self.params.tile_height).floor() as i32;
        (tx, ty)
    }

    /// Registers a tile blob
    ///
    /// On success the mesh owns `data` until the tile is removed. On
    /// failure the blob is handed back untouched. `last_ref` requests the
    /// slot (and salt) a previously saved tile occupied.
    pub fn add_tile(
        &mut self,
        data: Vec<u8>,
        last_ref: Option<TileRef>,
    ) -> std::result::Result<TileRef, RejectedTile> {
        match self.prepare_tile(&data, last_ref) {
            Ok((mut tile, index)) => {
                tile.data = data;
                Ok(self.insert_tile(tile, index))
            }
            Err(status) => Err(RejectedTile { data, status }),
        }
    }

    fn prepare_tile(
        &mut self,
        data: &[u8],
        last_ref: Option<TileRef>,
    ) -> Result<(MeshTile, usize)> {
        let mut tile = load_tile_from_binary(data)?;
        let header = &tile.header;

        if header.poly_count > self.params.max_polys_per_tile {
            return Err(Status::InvalidParam);
        }
        if self
            .pos_lookup
            .contains_key(&(header.x, header.y, header.layer))
        {
            return Err(Status::AlreadyExists);
        }

        let index = match last_ref.filter(|r| r.is_valid()) {
            Some(reference) => {
                let (salt, tile_id, _) = decode_poly_ref(reference);
                let index = (tile_id as usize)
                    .checked_sub(1)
                    .filter(|&i| i < self.slots.len())
                    .ok_or(Status::InvalidParam)?;
                if self.slots[index].tile.is_some() {
                    return Err(Status::AlreadyExists);
                }
                self.unlink_free_slot(index);
                if salt != 0 {
                    self.slots[index].salt = salt;
                }
                index
            }
            None => {
                let index = self.next_free.ok_or(Status::OutOfMemory)?;
                self.next_free = self.slots[index].next_free.take();
                index
            }
        };

        tile.salt = self.slots[index].salt;
        tile.base = encode_poly_ref(tile.salt, index as u32 + 1, 0);
        Ok((tile, index))
    }

    fn unlink_free_slot(&mut self, index: usize) {
        if self.next_free == Some(index) {
            self.next_free = self.slots[index].next_free.take();
            return;
        }
        let mut cursor = self.next_free;
        while let Some(i) = cursor {
            if self.slots[i].next_free == Some(index) {
                self.slots[i].next_free = self.slots[index].next_free.take();
                return;
            }
            cursor = self.slots[i].next_free;
        }
    }

    fn insert_tile(&mut self, mut tile: MeshTile, index: usize) -> TileRef {
        connect_int_links(&mut tile);

        let (x, y, layer) = (tile.header.x, tile.header.y, tile.header.layer);
        let tile_ref = tile.base;
        self.slots[index].tile = Some(tile);
        self.pos_lookup.insert((x, y, layer), index);

        for side in [0u8, 2, 4, 6] {
            let (nx, ny) = neighbour_location(x, y, side);
            for nei in self.tiles_at(nx, ny) {
                self.connect_ext_links(index, nei, side);
                self.connect_ext_links(nei, index, opposite_tile(side));
            }
        }

        log::debug!("Registered tile ({x}, {y}, {layer}) as {tile_ref}");
        tile_ref
    }

    fn tiles_at(&self, x: i32, y: i32) -> Vec<usize> {
        self.pos_lookup
            .iter()
            .filter(|((tx, ty, _), _)| *tx == x && *ty == y)
            .map(|(_, &index)| index)
            .collect()
    }

    /// Links the portal edges of tile `index` on `side` to tile `nei`
    fn connect_ext_links(&mut self, index: usize, nei: usize, side: u8) {
        let (Some(tile), Some(target)) = (&self.slots[index].tile, &self.slots[nei].tile) else {
            return;
        };

        let mut new_links = Vec::new();
        for (pi, poly) in tile.polys.iter().enumerate() {
            if poly.poly_type != PolyType::Ground {
                continue;
            }
            let nv = poly.vert_count as usize;
            for j in 0..nv {
                let n = poly.neis[j];
                if n & EXT_LINK == 0 || (n & 0xff) as u8 != side {
                    continue;
                }
                let va = tile.verts[poly.verts[j] as usize];
                let vb = tile.verts[poly.verts[(j + 1) % nv] as usize];
                for (reference, cmin, cmax) in
                    find_connecting_polys(&va, &vb, target, opposite_tile(side))
                {
                    let axis = if side == 0 || side == 4 { 2 } else { 0 };
                    let span = vb[axis] - va[axis];
                    let mut tmin = (cmin - va[axis]) / span;
                    let mut tmax = (cmax - va[axis]) / span;
                    if tmin > tmax {
                        std::mem::swap(&mut tmin, &mut tmax);
                    }
                    new_links.push((
                        pi,
                        Link {
                            reference,
                            edge: j as u8,
                            side,
                            bmin: (tmin.clamp(0.0, 1.0) * 255.0).round() as u8,
                            bmax: (tmax.clamp(0.0, 1.0) * 255.0).round() as u8,
                        },
                    ));
                }
            }
        }

        if let Some(tile) = self.slots[index].tile.as_mut() {
            for (pi, link) in new_links {
                tile.polys[pi].links.push(link);
            }
        }
    }

    /// Unregisters a tile and hands its blob back
    ///
    /// References into the removed tile become invalid: the slot salt is
    /// advanced before the slot is reused.
    pub fn remove_tile(&mut self, tile_ref: TileRef) -> Result<Vec<u8>> {
        let (salt, tile_id, _) = decode_poly_ref(tile_ref);
        let index = (tile_id as usize)
            .checked_sub(1)
            .filter(|&i| i < self.slots.len())
            .ok_or(Status::InvalidRef)?;
        let slot = &mut self.slots[index];
        if slot.salt != salt || slot.tile.is_none() {
            return Err(Status::InvalidRef);
        }
        let tile = slot.tile.take().ok_or(Status::InvalidRef)?;

        slot.salt = (slot.salt + 1) & SALT_MASK;
        if slot.salt == 0 {
            slot.salt = 1;
        }
        slot.next_free = self.next_free;
        self.next_free = Some(index);

        self.pos_lookup
            .remove(&(tile.header.x, tile.header.y, tile.header.layer));

        let removed_id = tile_id;
        for other in self.slots.iter_mut().filter_map(|s| s.tile.as_mut()) {
            for poly in &mut other.polys {
                poly.links
                    .retain(|link| decode_poly_ref(link.reference).1 != removed_id);
            }
        }

        log::debug!(
            "Removed tile ({}, {}, {}) {tile_ref}",
            tile.header.x,
            tile.header.y,
            tile.header.layer
        );
        Ok(tile.data)
    }

    /// Resolves a polygon reference
    pub fn get_tile_and_poly_by_ref(&self, reference: PolyRef) -> Result<(&MeshTile, &Poly)> {
        let (salt, tile_id, poly_id) = decode_poly_ref(reference);
        let index = (tile_id as usize).checked_sub(1).ok_or(Status::InvalidRef)?;
        let slot = self.slots.get(index).ok_or(Status::InvalidRef)?;
        if slot.salt != salt {
            return Err(Status::InvalidRef);
        }
        let tile = slot.tile.as_ref().ok_or(Status::InvalidRef)?;
        let poly = tile
            .polys
            .get(poly_id as usize)
            .ok_or(Status::InvalidRef)?;
        Ok((tile, poly))
    }

    /// Whether the reference resolves to a live polygon
    pub fn is_valid_poly_ref(&self, reference: PolyRef) -> bool {
        self.get_tile_and_poly_by_ref(reference).is_ok()
    }

    /// Ground polygons passing `filter` whose bounds overlap the box
    pub fn query_polygons(
        &self,
        bmin: &[f32; 3],
        bmax: &[f32; 3],
        filter: &QueryFilter,
    ) -> Vec<PolyRef> {
        let mut polys = Vec::new();
        for tile in self.tiles() {
            if overlap_bounds(bmin, bmax, &tile.header.bmin, &tile.header.bmax) {
                query_polygons_in_tile(tile, bmin, bmax, filter, &mut polys);
            }
        }
        polys
    }
}

fn neighbour_location(x: i32, y: i32, side: u8) -> (i32, i32) {
    match side {
        0 => (x + 1, y),
        2 => (x, y + 1),
        4 => (x - 1, y),
        _ => (x, y - 1),
    }
}

fn connect_int_links(tile: &mut MeshTile) {
    let base = tile.base;
    for poly in &mut tile.polys {
        poly.links.clear();
        if poly.poly_type != PolyType::Ground {
            continue;
        }
        for j in 0..poly.vert_count as usize {
            let n = poly.neis[j];
            if n == 0 || n & EXT_LINK != 0 {
                continue;
            }
            poly.links.push(Link {
                reference: PolyRef::new(base.id() | (n as u32 - 1)),
                edge: j as u8,
                side: INTERNAL_LINK,
                bmin: 0,
                bmax: 255,
            });
        }
    }
}

fn slab_coord(v: &[f32; 3], side: u8) -> f32 {
    if side == 0 || side == 4 {
        v[0]
    } else {
        v[2]
    }
}

/// Edge end points projected onto the border plane as (along, height)
fn slab_end_points(va: &[f32; 3], vb: &[f32; 3], side: u8) -> ([f32; 2], [f32; 2]) {
    let axis = if side == 0 || side == 4 { 2 } else { 0 };
    if va[axis] < vb[axis] {
        ([va[axis], va[1]], [vb[axis], vb[1]])
    } else {
        ([vb[axis], vb[1]], [va[axis], va[1]])
    }
}

fn overlap_slabs(
    amin: &[f32; 2],
    amax: &[f32; 2],
    bmin: &[f32; 2],
    bmax: &[f32; 2],
    px: f32,
    py: f32,
) -> bool {
    let minx = (amin[0] + px).max(bmin[0] + px);
    let maxx = (amax[0] - px).min(bmax[0] - px);
    if minx > maxx {
        return false;
    }

    // Compare the edge heights at both ends of the shared section.
    let ad = (amax[1] - amin[1]) / (amax[0] - amin[0]);
    let ak = amin[1] - ad * amin[0];
    let bd = (bmax[1] - bmin[1]) / (bmax[0] - bmin[0]);
    let bk = bmin[1] - bd * bmin[0];
    let dmin = (bd * minx + bk) - (ad * minx + ak);
    let dmax = (bd * maxx + bk) - (ad * maxx + ak);

    if dmin * dmax < 0.0 {
        return true;
    }
    let thr = (py * 2.0) * (py * 2.0);
    dmin * dmin <= thr || dmax * dmax <= thr
}

/// Polygons of `tile` whose `side` portal edges overlap edge va-vb,
/// with the overlapping section along the border
fn find_connecting_polys(
    va: &[f32; 3],
    vb: &[f32; 3],
    tile: &MeshTile,
    side: u8,
) -> Vec<(PolyRef, f32, f32)> {
    let (amin, amax) = slab_end_points(va, vb, side);
    let apos = slab_coord(va, side);
    let marker = EXT_LINK | side as u16;

    let mut out = Vec::new();
    for (i, poly) in tile.polys.iter().enumerate() {
        let nv = poly.vert_count as usize;
        for j in 0..nv {
            if poly.neis[j] != marker {
                continue;
            }
            let vc = &tile.verts[poly.verts[j] as usize];
            let vd = &tile.verts[poly.verts[(j + 1) % nv] as usize];
            if (apos - slab_coord(vc, side)).abs() > 0.01 {
                continue;
            }
            let (bmin, bmax) = slab_end_points(vc, vd, side);
            if !overlap_slabs(&amin, &amax, &bmin, &bmax, 0.01, tile.header.walkable_climb) {
                continue;
            }
            if out.len() < MAX_EDGE_CONNECTIONS {
                out.push((tile.poly_ref(i), amin[0].max(bmin[0]), amax[0].min(bmax[0])));
            }
            break;
        }
    }
    out
}

fn overlap_quant_bounds(
    amin: &[u16; 3],
    amax: &[u16; 3],
    bmin: &[u16; 3],
    bmax: &[u16; 3],
) -> bool {
    (0..3).all(|k| amin[k] <= bmax[k] && amax[k] >= bmin[k])
}

fn query_polygons_in_tile(
    tile: &MeshTile,
    qmin: &[f32; 3],
    qmax: &[f32; 3],
    filter: &QueryFilter,
    out: &mut Vec<PolyRef>,
) {
    let accept = |index: usize| {
        let poly = &tile.polys[index];
        poly.poly_type == PolyType::Ground && filter.pass_filter(poly.flags)
    };

    if tile.bv_nodes.is_empty() {
        for (i, poly) in tile.polys.iter().enumerate() {
            if !accept(i) {
                continue;
            }
            let (pmin, pmax) = tile.poly_bounds(poly);
            if overlap_bounds(qmin, qmax, &pmin, &pmax) {
                out.push(tile.poly_ref(i));
            }
        }
        return;
    }

    let tbmin = &tile.header.bmin;
    let tbmax = &tile.header.bmax;
    let qfac = tile.header.bv_quant_factor;
    let mut bmin = [0u16; 3];
    let mut bmax = [0u16; 3];
    for k in 0..3 {
        let lo = qmin[k].max(tbmin[k]).min(tbmax[k]) - tbmin[k];
        let hi = qmax[k].max(tbmin[k]).min(tbmax[k]) - tbmin[k];
        bmin[k] = ((qfac * lo) as u16) & 0xfffe;
        bmax[k] = ((qfac * hi + 1.0) as u16) | 1;
    }

    let mut node = 0;
    while node < tile.bv_nodes.len() {
        let n = &tile.bv_nodes[node];
        let overlap = overlap_quant_bounds(&bmin, &bmax, &n.bmin, &n.bmax);
        let is_leaf = n.i >= 0;
        if is_leaf && overlap && accept(n.i as usize) {
            out.push(tile.poly_ref(n.i as usize));
        }
        if overlap || is_leaf {
            node += 1;
        } else {
            node += (n.i.unsigned_abs() as usize).max(1);
        }
    }
}
