//! Fixtures shared by the integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use nav_engine::binary_format::save_tile_to_binary;
use nav_engine::nav_mesh::encode_poly_ref;
use nav_engine::test_mesh_helpers::{create_single_quad_tile, create_wall_tile, grid_params};
use nav_engine::NavMesh;
use waypath::{to_world_space, WorldPoint};

/// World-space point whose mesh-space image is `mesh`
pub fn world(mesh: [f32; 3]) -> WorldPoint {
    to_world_space(mesh)
}

pub fn bits(p: WorldPoint) -> [u32; 3] {
    p.to_array().map(f32::to_bits)
}

/// Serialized single-quad tile at grid location (x, y)
pub fn quad_tile_bytes(x: i32, y: i32) -> Vec<u8> {
    save_tile_to_binary(&create_single_quad_tile(x, y).unwrap()).unwrap()
}

pub fn wall_tile_bytes() -> Vec<u8> {
    save_tile_to_binary(&create_wall_tile(0, 0).unwrap()).unwrap()
}

/// Container reference of the first tile placed in `slot`
pub fn slot_ref(slot: u32) -> u64 {
    u64::from(encode_poly_ref(1, slot + 1, 0).id())
}

/// L-shaped mesh of single-quad tiles at (0, 0), (1, 0) and (0, 1)
pub fn l_shaped_mesh() -> NavMesh {
    let mut mesh = NavMesh::new(grid_params(4)).unwrap();
    for (x, y) in [(0, 0), (1, 0), (0, 1)] {
        mesh.add_tile(quad_tile_bytes(x, y), None).unwrap();
    }
    mesh
}

/// One flat tile spanning mesh-space x and z in [0, 10]
pub fn single_tile_mesh() -> NavMesh {
    let mut mesh = NavMesh::new(grid_params(1)).unwrap();
    mesh.add_tile(quad_tile_bytes(0, 0), None).unwrap();
    mesh
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}
