//! Detour tile binary layout
//!
//! Tiles are stored as a single little-endian blob: a fixed header followed
//! by the vertex, polygon, link, detail mesh, detail vertex, detail
//! triangle, BV-tree and off-mesh connection sections, each padded to four
//! bytes. Link storage is reserved in the blob but its content is runtime
//! state, so it is skipped on read and zero-filled on write.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

use super::nav_mesh::{BVNode, MeshTile, OffMeshConnection, Poly, PolyDetail, TileHeader};
use super::{PolyFlags, PolyType, Result, Status, EXT_LINK, MAX_VERTS_PER_POLY};

/// Magic number for tile blobs ('DNAV')
pub const NAVMESH_MAGIC: u32 =
    ((b'D' as u32) << 24) | ((b'N' as u32) << 16) | ((b'A' as u32) << 8) | (b'V' as u32);

/// Supported tile layout version
pub const NAVMESH_VERSION: u32 = 7;

/// Polygon link slot marker meaning "no link"
const NULL_LINK: u32 = 0xffff_ffff;

/// Serialized section sizes
pub const MESH_HEADER_SIZE: usize = 100;
const VERT_SIZE: usize = 12;
const POLY_SIZE: usize = 32;
const LINK_SIZE: usize = 12;
const DETAIL_MESH_SIZE: usize = 12;
const DETAIL_TRI_SIZE: usize = 4;
const BV_NODE_SIZE: usize = 16;
const OFF_MESH_CON_SIZE: usize = 36;

fn align4(value: usize) -> usize {
    (value + 3) & !3
}

fn count(value: i32) -> Result<usize> {
    usize::try_from(value).map_err(|_| Status::DataCorrupted)
}

/// Polygon record as stored in the blob
#[derive(Debug, Clone)]
struct PolyData {
    first_link: u32,
    verts: [u16; MAX_VERTS_PER_POLY],
    neis: [u16; MAX_VERTS_PER_POLY],
    flags: u16,
    vert_count: u8,
    area_and_type: u8,
}

impl PolyData {
    fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let first_link = reader.read_u32::<LittleEndian>()?;

        let mut verts = [0u16; MAX_VERTS_PER_POLY];
        for v in &mut verts {
            *v = reader.read_u16::<LittleEndian>()?;
        }

        let mut neis = [0u16; MAX_VERTS_PER_POLY];
        for n in &mut neis {
            *n = reader.read_u16::<LittleEndian>()?;
        }

        Ok(Self {
            first_link,
            verts,
            neis,
            flags: reader.read_u16::<LittleEndian>()?,
            vert_count: reader.read_u8()?,
            area_and_type: reader.read_u8()?,
        })
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.first_link)?;
        for &v in &self.verts {
            writer.write_u16::<LittleEndian>(v)?;
        }
        for &n in &self.neis {
            writer.write_u16::<LittleEndian>(n)?;
        }
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u8(self.vert_count)?;
        writer.write_u8(self.area_and_type)?;
        Ok(())
    }

    fn to_poly(&self) -> Poly {
        let poly_type = if (self.area_and_type >> 6) == PolyType::OffMeshConnection as u8 {
            PolyType::OffMeshConnection
        } else {
            PolyType::Ground
        };
        Poly {
            verts: self.verts,
            neis: self.neis,
            flags: PolyFlags::from_bits_retain(self.flags),
            vert_count: self.vert_count,
            area: self.area_and_type & 0x3f,
            poly_type,
            links: Vec::new(),
        }
    }

    fn from_poly(poly: &Poly) -> Self {
        Self {
            first_link: NULL_LINK,
            verts: poly.verts,
            neis: poly.neis,
            flags: poly.flags.bits(),
            vert_count: poly.vert_count,
            area_and_type: (poly.area & 0x3f) | ((poly.poly_type as u8) << 6),
        }
    }
}

fn read_header<R: Read>(reader: &mut R) -> Result<TileHeader> {
    let magic = reader.read_u32::<LittleEndian>()?;
    if magic != NAVMESH_MAGIC {
        return Err(Status::WrongMagic);
    }
    let version = reader.read_u32::<LittleEndian>()?;
    if version != NAVMESH_VERSION {
        return Err(Status::WrongVersion);
    }

    Ok(TileHeader {
        x: reader.read_i32::<LittleEndian>()?,
        y: reader.read_i32::<LittleEndian>()?,
        layer: reader.read_i32::<LittleEndian>()?,
        user_id: reader.read_u32::<LittleEndian>()?,
        poly_count: reader.read_i32::<LittleEndian>()?,
        vert_count: reader.read_i32::<LittleEndian>()?,
        max_link_count: reader.read_i32::<LittleEndian>()?,
        detail_mesh_count: reader.read_i32::<LittleEndian>()?,
        detail_vert_count: reader.read_i32::<LittleEndian>()?,
        detail_tri_count: reader.read_i32::<LittleEndian>()?,
        bv_node_count: reader.read_i32::<LittleEndian>()?,
        off_mesh_con_count: reader.read_i32::<LittleEndian>()?,
        off_mesh_base: reader.read_i32::<LittleEndian>()?,
        walkable_height: reader.read_f32::<LittleEndian>()?,
        walkable_radius: reader.read_f32::<LittleEndian>()?,
        walkable_climb: reader.read_f32::<LittleEndian>()?,
        bmin: read_vert(reader)?,
        bmax: read_vert(reader)?,
        bv_quant_factor: reader.read_f32::<LittleEndian>()?,
    })
}

fn write_header<W: Write>(header: &TileHeader, writer: &mut W) -> Result<()> {
    writer.write_u32::<LittleEndian>(NAVMESH_MAGIC)?;
    writer.write_u32::<LittleEndian>(NAVMESH_VERSION)?;
    writer.write_i32::<LittleEndian>(header.x)?;
    writer.write_i32::<LittleEndian>(header.y)?;
    writer.write_i32::<LittleEndian>(header.layer)?;
    writer.write_u32::<LittleEndian>(header.user_id)?;
    writer.write_i32::<LittleEndian>(header.poly_count)?;
    writer.write_i32::<LittleEndian>(header.vert_count)?;
    writer.write_i32::<LittleEndian>(header.max_link_count)?;
    writer.write_i32::<LittleEndian>(header.detail_mesh_count)?;
    writer.write_i32::<LittleEndian>(header.detail_vert_count)?;
    writer.write_i32::<LittleEndian>(header.detail_tri_count)?;
    writer.write_i32::<LittleEndian>(header.bv_node_count)?;
    writer.write_i32::<LittleEndian>(header.off_mesh_con_count)?;
    writer.write_i32::<LittleEndian>(header.off_mesh_base)?;
    writer.write_f32::<LittleEndian>(header.walkable_height)?;
    writer.write_f32::<LittleEndian>(header.walkable_radius)?;
    writer.write_f32::<LittleEndian>(header.walkable_climb)?;
    for v in header.bmin.iter().chain(header.bmax.iter()) {
        writer.write_f32::<LittleEndian>(*v)?;
    }
    writer.write_f32::<LittleEndian>(header.bv_quant_factor)?;
    Ok(())
}

fn read_vert<R: Read>(reader: &mut R) -> Result<[f32; 3]> {
    Ok([
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
    ])
}

fn write_vert<W: Write>(writer: &mut W, v: &[f32; 3]) -> Result<()> {
    for c in v {
        writer.write_f32::<LittleEndian>(*c)?;
    }
    Ok(())
}

/// Number of bytes a tile with this header occupies
pub fn tile_data_size(header: &TileHeader) -> Result<usize> {
    let size = align4(MESH_HEADER_SIZE)
        + align4(VERT_SIZE * count(header.vert_count)?)
        + align4(POLY_SIZE * count(header.poly_count)?)
        + align4(LINK_SIZE * count(header.max_link_count)?)
        + align4(DETAIL_MESH_SIZE * count(header.detail_mesh_count)?)
        + align4(VERT_SIZE * count(header.detail_vert_count)?)
        + align4(DETAIL_TRI_SIZE * count(header.detail_tri_count)?)
        + align4(BV_NODE_SIZE * count(header.bv_node_count)?)
        + align4(OFF_MESH_CON_SIZE * count(header.off_mesh_con_count)?);
    Ok(size)
}

/// Reads and validates only the header of a tile blob
pub fn read_tile_header(data: &[u8]) -> Result<TileHeader> {
    if data.len() < MESH_HEADER_SIZE {
        return Err(Status::DataCorrupted);
    }
    read_header(&mut Cursor::new(data))
}

/// Parses a tile blob
///
/// The returned tile does not own `data`; registering it with a
/// [`NavMesh`](crate::NavMesh) moves the blob into the tile.
pub fn load_tile_from_binary(data: &[u8]) -> Result<MeshTile> {
    let header = read_tile_header(data)?;
    if tile_data_size(&header)? > data.len() {
        return Err(Status::DataCorrupted);
    }
    validate_bounds(&header)?;

    let mut cursor = Cursor::new(data);
    cursor.set_position(align4(MESH_HEADER_SIZE) as u64);

    let vert_count = count(header.vert_count)?;
    let poly_count = count(header.poly_count)?;

    let mut tile = MeshTile::new(header);

    tile.verts.reserve(vert_count);
    for _ in 0..vert_count {
        tile.verts.push(read_vert(&mut cursor)?);
    }

    tile.polys.reserve(poly_count);
    for _ in 0..poly_count {
        let poly = PolyData::read_from(&mut cursor)?.to_poly();
        validate_poly(&poly, vert_count, poly_count)?;
        tile.polys.push(poly);
    }

    // Link storage is rebuilt when the tile is registered.
    let link_bytes = align4(LINK_SIZE * count(tile.header.max_link_count)?);
    cursor.set_position(cursor.position() + link_bytes as u64);

    for _ in 0..count(tile.header.detail_mesh_count)? {
        tile.detail_meshes.push(PolyDetail {
            vert_base: cursor.read_u32::<LittleEndian>()?,
            tri_base: cursor.read_u32::<LittleEndian>()?,
            vert_count: cursor.read_u8()?,
            tri_count: cursor.read_u8()?,
        });
        // struct padding
        cursor.read_u16::<LittleEndian>()?;
    }

    for _ in 0..count(tile.header.detail_vert_count)? {
        tile.detail_verts.push(read_vert(&mut cursor)?);
    }

    for _ in 0..count(tile.header.detail_tri_count)? {
        let mut tri = [0u8; 4];
        cursor.read_exact(&mut tri)?;
        tile.detail_tris.push(tri);
    }

    for _ in 0..count(tile.header.bv_node_count)? {
        let mut node = BVNode::default();
        for v in node.bmin.iter_mut().chain(node.bmax.iter_mut()) {
            *v = cursor.read_u16::<LittleEndian>()?;
        }
        node.i = cursor.read_i32::<LittleEndian>()?;
        if node.i >= 0 && node.i as usize >= poly_count {
            return Err(Status::DataCorrupted);
        }
        tile.bv_nodes.push(node);
    }

    for _ in 0..count(tile.header.off_mesh_con_count)? {
        let mut pos = [0.0; 6];
        for p in &mut pos {
            *p = cursor.read_f32::<LittleEndian>()?;
        }
        tile.off_mesh_connections.push(OffMeshConnection {
            pos,
            radius: cursor.read_f32::<LittleEndian>()?,
            poly: cursor.read_u16::<LittleEndian>()?,
            flags: cursor.read_u8()?,
            side: cursor.read_u8()?,
            user_id: cursor.read_u32::<LittleEndian>()?,
        });
    }

    validate_detail(&tile)?;
    if !tile.verts.iter().chain(&tile.detail_verts).all(is_finite_vert) {
        return Err(Status::DataCorrupted);
    }

    Ok(tile)
}

fn is_finite_vert(v: &[f32; 3]) -> bool {
    v.iter().all(|c| c.is_finite())
}

fn validate_bounds(header: &TileHeader) -> Result<()> {
    let ordered = (0..3).all(|k| header.bmin[k] <= header.bmax[k]);
    if !is_finite_vert(&header.bmin)
        || !is_finite_vert(&header.bmax)
        || !ordered
        || !header.bv_quant_factor.is_finite()
        || header.bv_quant_factor < 0.0
    {
        return Err(Status::DataCorrupted);
    }
    Ok(())
}

fn validate_poly(poly: &Poly, vert_count: usize, poly_count: usize) -> Result<()> {
    let nv = poly.vert_count as usize;
    let min_verts = match poly.poly_type {
        PolyType::Ground => 3,
        PolyType::OffMeshConnection => 2,
    };
    if nv < min_verts || nv > MAX_VERTS_PER_POLY {
        return Err(Status::DataCorrupted);
    }
    if poly.verts[..nv].iter().any(|&v| v as usize >= vert_count) {
        return Err(Status::DataCorrupted);
    }
    let bad_neighbour = poly.neis[..nv]
        .iter()
        .any(|&n| n & EXT_LINK == 0 && n as usize > poly_count);
    if bad_neighbour {
        return Err(Status::DataCorrupted);
    }
    Ok(())
}

fn validate_detail(tile: &MeshTile) -> Result<()> {
    for (poly, detail) in tile.polys.iter().zip(&tile.detail_meshes) {
        let vert_end = detail.vert_base as usize + detail.vert_count as usize;
        let tri_end = detail.tri_base as usize + detail.tri_count as usize;
        if vert_end > tile.detail_verts.len() || tri_end > tile.detail_tris.len() {
            return Err(Status::DataCorrupted);
        }
        let limit = poly.vert_count as usize + detail.vert_count as usize;
        let tris = &tile.detail_tris[detail.tri_base as usize..tri_end];
        if tris.iter().any(|t| t[..3].iter().any(|&i| i as usize >= limit)) {
            return Err(Status::DataCorrupted);
        }
    }
    Ok(())
}

/// Serializes a tile's geometry into a blob
///
/// Link storage is reserved according to `header.max_link_count` and left
/// empty, matching what a freshly built tile contains.
pub fn save_tile_to_binary(tile: &MeshTile) -> Result<Vec<u8>> {
    let mut header = tile.header.clone();
    header.poly_count = i32::try_from(tile.polys.len()).map_err(|_| Status::InvalidParam)?;
    header.vert_count = i32::try_from(tile.verts.len()).map_err(|_| Status::InvalidParam)?;
    header.detail_mesh_count = tile.detail_meshes.len() as i32;
    header.detail_vert_count = tile.detail_verts.len() as i32;
    header.detail_tri_count = tile.detail_tris.len() as i32;
    header.bv_node_count = tile.bv_nodes.len() as i32;
    header.off_mesh_con_count = tile.off_mesh_connections.len() as i32;

    let size = tile_data_size(&header)?;
    let mut buffer = Vec::with_capacity(size);

    write_header(&header, &mut buffer)?;
    pad4(&mut buffer);

    for v in &tile.verts {
        write_vert(&mut buffer, v)?;
    }
    pad4(&mut buffer);

    for poly in &tile.polys {
        PolyData::from_poly(poly).write_to(&mut buffer)?;
    }
    pad4(&mut buffer);

    let link_bytes = LINK_SIZE * count(header.max_link_count)?;
    buffer.resize(buffer.len() + link_bytes, 0);
    pad4(&mut buffer);

    for detail in &tile.detail_meshes {
        buffer.write_u32::<LittleEndian>(detail.vert_base)?;
        buffer.write_u32::<LittleEndian>(detail.tri_base)?;
        buffer.write_u8(detail.vert_count)?;
        buffer.write_u8(detail.tri_count)?;
        buffer.write_u16::<LittleEndian>(0)?;
    }
    pad4(&mut buffer);

    for v in &tile.detail_verts {
        write_vert(&mut buffer, v)?;
    }
    pad4(&mut buffer);

    for tri in &tile.detail_tris {
        buffer.write_all(tri)?;
    }
    pad4(&mut buffer);

    for node in &tile.bv_nodes {
        for v in node.bmin.iter().chain(node.bmax.iter()) {
            buffer.write_u16::<LittleEndian>(*v)?;
        }
        buffer.write_i32::<LittleEndian>(node.i)?;
    }
    pad4(&mut buffer);

    for con in &tile.off_mesh_connections {
        for p in &con.pos {
            buffer.write_f32::<LittleEndian>(*p)?;
        }
        buffer.write_f32::<LittleEndian>(con.radius)?;
        buffer.write_u16::<LittleEndian>(con.poly)?;
        buffer.write_u8(con.flags)?;
        buffer.write_u8(con.side)?;
        buffer.write_u32::<LittleEndian>(con.user_id)?;
    }
    pad4(&mut buffer);

    debug_assert_eq!(buffer.len(), size);
    Ok(buffer)
}

fn pad4(buffer: &mut Vec<u8>) {
    let padded = align4(buffer.len());
    buffer.resize(padded, 0);
}
