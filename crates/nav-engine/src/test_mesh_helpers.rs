//! Small hand-made tiles for tests
//!
//! Every tile is 10 x 10 mesh units on a grid anchored at the origin, so tile
//! `(x, y)` covers mesh-space x in `[10x, 10x + 10]` and z in `[10y, 10y + 10]`.
//! Surfaces are flat at height 0.

use crate::binary_format::save_tile_to_binary;
use crate::{MeshTile, NavMesh, NavMeshParams, PolyFlags, Result, TileBuildParams, TileBuilder};

/// Edge length of every helper tile
pub const TILE_SIZE: f32 = 10.0;

/// A point (in tile (0, 0)) on the wall tile's unreachable island
pub const WALL_TILE_ISLAND: [f32; 3] = [5.0, 0.0, 2.5];

/// Mesh parameters matching the helper tile grid
pub fn grid_params(max_tiles: i32) -> NavMeshParams {
    NavMeshParams {
        origin: [0.0, 0.0, 0.0],
        tile_width: TILE_SIZE,
        tile_height: TILE_SIZE,
        max_tiles,
        max_polys_per_tile: 64,
    }
}

fn tile_params(x: i32, y: i32, local_verts: &[[f32; 2]]) -> TileBuildParams {
    let ox = x as f32 * TILE_SIZE;
    let oz = y as f32 * TILE_SIZE;
    TileBuildParams::new(x, y, [ox, 0.0, oz], [ox + TILE_SIZE, 1.0, oz + TILE_SIZE])
        .with_walkable(2.0, 0.6, 0.9)
        .with_verts(
            local_verts
                .iter()
                .map(|[vx, vz]| [ox + vx, 0.0, oz + vz])
                .collect(),
        )
}

/// One walkable quad covering the whole tile
pub fn create_single_quad_tile(x: i32, y: i32) -> Result<MeshTile> {
    let mut params = tile_params(
        x,
        y,
        &[[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0]],
    );
    params.push_poly(&[0, 1, 2, 3], PolyFlags::WALK, 0);
    TileBuilder::build(&params)
}

/// A tile split by a wall
///
/// The wall occupies x in `[4, 6]`, z in `[0, 8]`; the only way from the left
/// half to the right half is the gap along the top edge (z in `[8, 10]`).
/// Inside the wall sits a small island polygon connected to nothing,
/// containing [`WALL_TILE_ISLAND`].
pub fn create_wall_tile(x: i32, y: i32) -> Result<MeshTile> {
    let mut params = tile_params(
        x,
        y,
        &[
            [0.0, 0.0],
            [0.0, 8.0],
            [4.0, 8.0],
            [4.0, 0.0],
            [0.0, 10.0],
            [4.0, 10.0],
            [6.0, 10.0],
            [6.0, 8.0],
            [10.0, 10.0],
            [10.0, 8.0],
            [10.0, 0.0],
            [6.0, 0.0],
            [4.5, 2.0],
            [4.5, 3.0],
            [5.5, 3.0],
            [5.5, 2.0],
        ],
    );
    params
        .push_poly(&[0, 1, 2, 3], PolyFlags::WALK, 0)
        .push_poly(&[1, 4, 5, 2], PolyFlags::WALK, 0)
        .push_poly(&[2, 5, 6, 7], PolyFlags::WALK, 0)
        .push_poly(&[7, 6, 8, 9], PolyFlags::WALK, 0)
        .push_poly(&[11, 7, 9, 10], PolyFlags::WALK, 0)
        .push_poly(&[12, 13, 14, 15], PolyFlags::WALK, 0);
    TileBuilder::build(&params)
}

/// Two single-quad tiles side by side along x, at (0, 0) and (1, 0)
pub fn create_adjacent_tiles() -> Result<(MeshTile, MeshTile)> {
    Ok((create_single_quad_tile(0, 0)?, create_single_quad_tile(1, 0)?))
}

fn mesh_from_tiles(tiles: &[MeshTile]) -> Result<NavMesh> {
    let mut mesh = NavMesh::new(grid_params(tiles.len().max(1) as i32))?;
    for tile in tiles {
        mesh.add_tile(save_tile_to_binary(tile)?, None)?;
    }
    Ok(mesh)
}

/// Mesh made of [`create_single_quad_tile`] at (0, 0)
pub fn single_quad_nav_mesh() -> Result<NavMesh> {
    mesh_from_tiles(&[create_single_quad_tile(0, 0)?])
}

/// Mesh made of [`create_wall_tile`] at (0, 0)
pub fn wall_tile_nav_mesh() -> Result<NavMesh> {
    mesh_from_tiles(&[create_wall_tile(0, 0)?])
}

/// Mesh made of [`create_adjacent_tiles`]
pub fn adjacent_tiles_nav_mesh() -> Result<NavMesh> {
    let (left, right) = create_adjacent_tiles()?;
    mesh_from_tiles(&[left, right])
}
