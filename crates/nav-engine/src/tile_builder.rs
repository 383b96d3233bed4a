//! Tile assembly from already polygonised geometry
//!
//! The builder takes vertices and convex polygons (in the tile's winding
//! order) and produces a [`MeshTile`] with internal adjacency, tile border
//! portals, a fan-triangulated detail mesh and optionally a BV tree. It
//! does not voxelize or simplify anything.

use std::collections::HashMap;

use super::binary_format::save_tile_to_binary;
use super::nav_mesh::{BVNode, MeshTile, Poly, PolyDetail, TileHeader};
use super::{PolyFlags, PolyType, Result, Status, EXT_LINK, MAX_AREAS, MAX_VERTS_PER_POLY};

/// Quantized range used for BV tree bounds
const BV_QUANT_RANGE: f32 = 32767.0;

/// Input for [`TileBuilder`]
#[derive(Debug, Clone)]
pub struct TileBuildParams {
    pub tile_x: i32,
    pub tile_y: i32,
    pub layer: i32,
    pub user_id: u32,
    /// Tile bounds; portal edges are detected on the x/z faces
    pub bmin: [f32; 3],
    pub bmax: [f32; 3],
    pub verts: Vec<[f32; 3]>,
    /// Vertex indices per polygon
    pub polys: Vec<Vec<u16>>,
    pub poly_flags: Vec<PolyFlags>,
    pub poly_areas: Vec<u8>,
    pub walkable_height: f32,
    pub walkable_radius: f32,
    pub walkable_climb: f32,
    pub build_bv_tree: bool,
}

impl TileBuildParams {
    /// Empty tile at grid location `(tile_x, tile_y)` with the given bounds
    pub fn new(tile_x: i32, tile_y: i32, bmin: [f32; 3], bmax: [f32; 3]) -> Self {
        Self {
            tile_x,
            tile_y,
            layer: 0,
            user_id: 0,
            bmin,
            bmax,
            verts: Vec::new(),
            polys: Vec::new(),
            poly_flags: Vec::new(),
            poly_areas: Vec::new(),
            walkable_height: 2.0,
            walkable_radius: 0.6,
            walkable_climb: 0.9,
            build_bv_tree: true,
        }
    }

    pub fn with_layer(mut self, layer: i32) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_walkable(mut self, height: f32, radius: f32, climb: f32) -> Self {
        self.walkable_height = height;
        self.walkable_radius = radius;
        self.walkable_climb = climb;
        self
    }

    pub fn with_bv_tree(mut self, build: bool) -> Self {
        self.build_bv_tree = build;
        self
    }

    pub fn with_verts(mut self, verts: Vec<[f32; 3]>) -> Self {
        self.verts = verts;
        self
    }

    /// Adds a polygon over existing vertex indices
    pub fn push_poly(&mut self, verts: &[u16], flags: PolyFlags, area: u8) -> &mut Self {
        self.polys.push(verts.to_vec());
        self.poly_flags.push(flags);
        self.poly_areas.push(area);
        self
    }
}

/// Builds tiles from [`TileBuildParams`]
pub struct TileBuilder;

impl TileBuilder {
    /// Assembles an unregistered tile
    pub fn build(params: &TileBuildParams) -> Result<MeshTile> {
        validate(params)?;

        let mut polys: Vec<Poly> = params
            .polys
            .iter()
            .zip(&params.poly_flags)
            .zip(&params.poly_areas)
            .map(|((indices, &flags), &area)| {
                let mut verts = [0u16; MAX_VERTS_PER_POLY];
                verts[..indices.len()].copy_from_slice(indices);
                Poly {
                    verts,
                    neis: [0; MAX_VERTS_PER_POLY],
                    flags,
                    vert_count: indices.len() as u8,
                    area,
                    poly_type: PolyType::Ground,
                    links: Vec::new(),
                }
            })
            .collect();

        let (edge_count, portal_count) = build_adjacency(&mut polys, params);

        let mut detail_meshes = Vec::with_capacity(polys.len());
        let mut detail_tris = Vec::new();
        for poly in &polys {
            let nv = poly.vert_count;
            detail_meshes.push(PolyDetail {
                vert_base: 0,
                tri_base: detail_tris.len() as u32,
                vert_count: 0,
                tri_count: nv - 2,
            });
            for j in 2..nv {
                detail_tris.push([0, j - 1, j, 0]);
            }
        }

        let quant_factor = bv_quant_factor(&params.bmin, &params.bmax);
        let header = TileHeader {
            x: params.tile_x,
            y: params.tile_y,
            layer: params.layer,
            user_id: params.user_id,
            poly_count: polys.len() as i32,
            vert_count: params.verts.len() as i32,
            max_link_count: (edge_count + portal_count * 2) as i32,
            detail_mesh_count: detail_meshes.len() as i32,
            detail_vert_count: 0,
            detail_tri_count: detail_tris.len() as i32,
            bv_node_count: 0,
            off_mesh_con_count: 0,
            off_mesh_base: polys.len() as i32,
            walkable_height: params.walkable_height,
            walkable_radius: params.walkable_radius,
            walkable_climb: params.walkable_climb,
            bmin: params.bmin,
            bmax: params.bmax,
            bv_quant_factor: quant_factor,
        };

        let mut tile = MeshTile::new(header);
        tile.verts = params.verts.clone();
        tile.polys = polys;
        tile.detail_meshes = detail_meshes;
        tile.detail_tris = detail_tris;
        if params.build_bv_tree {
            tile.bv_nodes = build_bv_tree(&tile, quant_factor);
            tile.header.bv_node_count = tile.bv_nodes.len() as i32;
        }

        log::debug!(
            "Built tile ({}, {}): {} polys, {} portal edges, {} BV nodes",
            params.tile_x,
            params.tile_y,
            tile.polys.len(),
            portal_count,
            tile.bv_nodes.len()
        );
        Ok(tile)
    }

    /// Assembles a tile and serializes it
    pub fn build_bytes(params: &TileBuildParams) -> Result<Vec<u8>> {
        save_tile_to_binary(&Self::build(params)?)
    }
}

fn validate(params: &TileBuildParams) -> Result<()> {
    if params.polys.is_empty()
        || params.polys.len() != params.poly_flags.len()
        || params.polys.len() != params.poly_areas.len()
        || params.polys.len() > u16::MAX as usize
        || params.verts.len() > u16::MAX as usize
    {
        return Err(Status::InvalidParam);
    }
    for (indices, &area) in params.polys.iter().zip(&params.poly_areas) {
        if indices.len() < 3 || indices.len() > MAX_VERTS_PER_POLY || area as usize >= MAX_AREAS {
            return Err(Status::InvalidParam);
        }
        if indices.iter().any(|&i| i as usize >= params.verts.len()) {
            return Err(Status::InvalidParam);
        }
    }
    Ok(())
}

/// Fills in polygon neighbours and returns (shared edges, portal edges)
fn build_adjacency(polys: &mut [Poly], params: &TileBuildParams) -> (usize, usize) {
    let mut edges: HashMap<(u16, u16), (usize, usize)> = HashMap::new();
    let mut edge_count = 0;
    let mut portal_count = 0;

    for pi in 0..polys.len() {
        let nv = polys[pi].vert_count as usize;
        for j in 0..nv {
            let a = polys[pi].verts[j];
            let b = polys[pi].verts[(j + 1) % nv];
            let key = (a.min(b), a.max(b));
            match edges.remove(&key) {
                Some((other, other_edge)) => {
                    polys[pi].neis[j] = other as u16 + 1;
                    polys[other].neis[other_edge] = pi as u16 + 1;
                    edge_count += 2;
                }
                None => {
                    edges.insert(key, (pi, j));
                }
            }
        }
    }

    // Unshared edges lying on the tile border become portals.
    for (pi, j) in edges.into_values() {
        let poly = &mut polys[pi];
        let nv = poly.vert_count as usize;
        let va = &params.verts[poly.verts[j] as usize];
        let vb = &params.verts[poly.verts[(j + 1) % nv] as usize];
        if let Some(side) = border_side(va, vb, &params.bmin, &params.bmax) {
            poly.neis[j] = EXT_LINK | side as u16;
            portal_count += 1;
        }
    }

    (edge_count, portal_count)
}

fn border_side(va: &[f32; 3], vb: &[f32; 3], bmin: &[f32; 3], bmax: &[f32; 3]) -> Option<u8> {
    let on = |a: f32, b: f32, plane: f32| (a - plane).abs() < 1e-4 && (b - plane).abs() < 1e-4;
    if on(va[0], vb[0], bmax[0]) {
        Some(0)
    } else if on(va[2], vb[2], bmax[2]) {
        Some(2)
    } else if on(va[0], vb[0], bmin[0]) {
        Some(4)
    } else if on(va[2], vb[2], bmin[2]) {
        Some(6)
    } else {
        None
    }
}

fn bv_quant_factor(bmin: &[f32; 3], bmax: &[f32; 3]) -> f32 {
    let extent = (0..3).map(|k| bmax[k] - bmin[k]).fold(0.0f32, f32::max);
    if extent > 0.0 {
        BV_QUANT_RANGE / extent
    } else {
        1.0
    }
}

fn build_bv_tree(tile: &MeshTile, quant_factor: f32) -> Vec<BVNode> {
    let tbmin = tile.header.bmin;
    let quantize = |v: f32, k: usize, round_up: bool| -> u16 {
        let q = (v - tbmin[k]) * quant_factor;
        let q = if round_up { q.ceil() } else { q.floor() };
        q.clamp(0.0, u16::MAX as f32) as u16
    };

    let mut items: Vec<BVNode> = tile
        .polys
        .iter()
        .enumerate()
        .map(|(i, poly)| {
            let (pmin, pmax) = tile.poly_bounds(poly);
            let mut node = BVNode {
                i: i as i32,
                ..Default::default()
            };
            for k in 0..3 {
                node.bmin[k] = quantize(pmin[k], k, false);
                node.bmax[k] = quantize(pmax[k], k, true);
            }
            node
        })
        .collect();

    let mut nodes = Vec::with_capacity(items.len() * 2);
    subdivide(&mut items, &mut nodes);
    nodes
}

fn subdivide(items: &mut [BVNode], nodes: &mut Vec<BVNode>) {
    let current = nodes.len();
    if items.len() == 1 {
        nodes.push(items[0]);
        return;
    }

    let mut node = BVNode {
        bmin: items[0].bmin,
        bmax: items[0].bmax,
        i: 0,
    };
    for item in &items[1..] {
        for k in 0..3 {
            node.bmin[k] = node.bmin[k].min(item.bmin[k]);
            node.bmax[k] = node.bmax[k].max(item.bmax[k]);
        }
    }
    nodes.push(node);

    let axis = (0..3)
        .max_by_key(|&k| node.bmax[k] - node.bmin[k])
        .unwrap_or(0);
    items.sort_by_key(|item| item.bmin[axis]);

    let split = items.len() / 2;
    let (left, right) = items.split_at_mut(split);
    subdivide(left, nodes);
    subdivide(right, nodes);

    let escape = (nodes.len() - current) as i32;
    nodes[current].i = -escape;
}
