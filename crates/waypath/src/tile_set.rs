//! Tile-set container reading and writing
//!
//! A container holds every tile of one navigation mesh together with the
//! mesh build parameters. All fields are little-endian.
//!
//! ```text
//! header   magic:i32 version:i32 tile_count:i32
//!          origin:f32[3] tile_width:f32 tile_height:f32
//!          max_tiles:i32 max_polys_per_tile:i32            (40 bytes)
//! record   tile_ref:u64 data_size:i32                      (12 bytes)
//!          data:u8[data_size]
//! ...      one record per tile
//! ```
//!
//! A record with a zero reference or a zero size marks the end of the tile
//! stream even when fewer than `tile_count` records were read.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use nav_engine::{NavMesh, NavMeshParams, PolyRef, RejectedTile, TileRef};

use crate::config::LoaderConfig;
use crate::error::{AllocationTarget, EngineStage, FormatProblem, NavError, Result};

/// Container magic, `'MSET'`
pub const TILE_SET_MAGIC: i32 =
    (b'M' as i32) << 24 | (b'S' as i32) << 16 | (b'E' as i32) << 8 | (b'T' as i32);
/// Supported container version
pub const TILE_SET_VERSION: i32 = 1;
/// Size of the container header in bytes
pub const TILE_SET_HEADER_SIZE: usize = 40;
/// Size of a tile record header in bytes
pub const TILE_RECORD_HEADER_SIZE: usize = 12;

/// Container header
#[derive(Debug, Clone, PartialEq)]
pub struct TileSetHeader {
    pub magic: i32,
    pub version: i32,
    pub tile_count: i32,
    pub params: NavMeshParams,
}

impl TileSetHeader {
    /// Header for a container of the current version
    pub fn new(tile_count: i32, params: NavMeshParams) -> Self {
        Self {
            magic: TILE_SET_MAGIC,
            version: TILE_SET_VERSION,
            tile_count,
            params,
        }
    }

    /// Reads and validates a header
    ///
    /// Magic and version are checked before anything else is trusted.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; TILE_SET_HEADER_SIZE];
        reader.read_exact(&mut buf).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => NavError::FormatError(FormatProblem::TruncatedHeader),
            _ => NavError::Io(err),
        })?;

        let mut cursor = &buf[..];
        let magic = cursor.read_i32::<LittleEndian>()?;
        if magic != TILE_SET_MAGIC {
            return Err(FormatProblem::BadMagic(magic).into());
        }
        let version = cursor.read_i32::<LittleEndian>()?;
        if version != TILE_SET_VERSION {
            return Err(FormatProblem::BadVersion(version).into());
        }
        let tile_count = cursor.read_i32::<LittleEndian>()?;
        if tile_count < 0 {
            return Err(FormatProblem::BadTileCount(tile_count).into());
        }

        let mut origin = [0.0; 3];
        for v in &mut origin {
            *v = cursor.read_f32::<LittleEndian>()?;
        }
        let params = NavMeshParams {
            origin,
            tile_width: cursor.read_f32::<LittleEndian>()?,
            tile_height: cursor.read_f32::<LittleEndian>()?,
            max_tiles: cursor.read_i32::<LittleEndian>()?,
            max_polys_per_tile: cursor.read_i32::<LittleEndian>()?,
        };

        Ok(Self {
            magic,
            version,
            tile_count,
            params,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_i32::<LittleEndian>(self.magic)?;
        writer.write_i32::<LittleEndian>(self.version)?;
        writer.write_i32::<LittleEndian>(self.tile_count)?;
        for v in self.params.origin {
            writer.write_f32::<LittleEndian>(v)?;
        }
        writer.write_f32::<LittleEndian>(self.params.tile_width)?;
        writer.write_f32::<LittleEndian>(self.params.tile_height)?;
        writer.write_i32::<LittleEndian>(self.params.max_tiles)?;
        writer.write_i32::<LittleEndian>(self.params.max_polys_per_tile)?;
        Ok(())
    }
}

/// Header preceding each tile payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRecordHeader {
    pub tile_ref: u64,
    pub data_size: i32,
}

impl TileRecordHeader {
    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            tile_ref: reader.read_u64::<LittleEndian>()?,
            data_size: reader.read_i32::<LittleEndian>()?,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u64::<LittleEndian>(self.tile_ref)?;
        writer.write_i32::<LittleEndian>(self.data_size)
    }

    /// Whether the record terminates the tile stream
    pub fn is_end_marker(&self) -> bool {
        self.tile_ref == 0 || self.data_size == 0
    }

    /// The stored reference as an engine tile reference
    ///
    /// References outside the engine's 32-bit space are dropped and the
    /// engine picks a free slot instead.
    pub fn engine_ref(&self) -> Option<TileRef> {
        u32::try_from(self.tile_ref).ok().map(PolyRef::new)
    }
}

/// Owned serialized tile
///
/// Registering a blob moves its buffer into the mesh. If the mesh refuses
/// the tile the buffer comes back inside the [`RejectedTile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileBlob {
    data: Vec<u8>,
}

impl TileBlob {
    /// Allocates a zero-filled blob of `size` bytes
    pub fn zeroed(size: usize) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| NavError::AllocationFailure(AllocationTarget::TileBuffer))?;
        data.resize(size, 0);
        Ok(Self { data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Hands the blob to the mesh
    pub fn register(
        self,
        mesh: &mut NavMesh,
        last_ref: Option<TileRef>,
    ) -> std::result::Result<TileRef, RejectedTile> {
        mesh.add_tile(self.data, last_ref)
    }
}

impl From<Vec<u8>> for TileBlob {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

/// Why tile ingestion stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every declared record was read
    Completed,
    /// A zero reference or zero size record was found at `index`
    EndMarker { index: usize },
    /// The payload of record `index` could not be allocated
    AllocationFailed { index: usize, size: i64 },
    /// The stream ended inside record `index`
    Truncated { index: usize },
}

/// Overall outcome of a bulk load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// Every tile the container provides was registered
    Complete,
    /// The mesh is usable but some tiles are missing
    Partial,
}

/// Counts collected while loading a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Tile count declared by the header
    pub declared: usize,
    /// Tiles registered with the mesh
    pub loaded: usize,
    /// Tiles the mesh refused
    pub rejected: usize,
    pub stop: StopReason,
}

impl LoadReport {
    pub fn status(&self) -> LoadStatus {
        match self.stop {
            StopReason::Completed | StopReason::EndMarker { .. } if self.rejected == 0 => {
                LoadStatus::Complete
            }
            _ => LoadStatus::Partial,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status() == LoadStatus::Complete
    }
}

/// A mesh built from a container and the report describing how it went
#[derive(Debug)]
pub struct TileSetLoad {
    pub mesh: NavMesh,
    pub report: LoadReport,
}

/// Reads a container from a stream and builds its mesh
///
/// Header problems fail the whole load. Once the mesh exists, problems with
/// individual records end or skip ingestion and are recorded in the report
/// instead; the tiles registered so far stay valid.
pub fn read_tile_set<R: Read>(reader: &mut R, config: &LoaderConfig) -> Result<TileSetLoad> {
    let header = TileSetHeader::read_from(reader)?;
    let mut mesh = NavMesh::new(header.params.clone()).map_err(|status| {
        NavError::from_engine_init(EngineStage::MeshInit, AllocationTarget::Mesh, status)
    })?;

    let mut report = LoadReport {
        declared: header.tile_count as usize,
        loaded: 0,
        rejected: 0,
        stop: StopReason::Completed,
    };

    for index in 0..report.declared {
        let record = match TileRecordHeader::read_from(reader) {
            Ok(record) => record,
            Err(err) => {
                log::warn!("Tile record {index} header unreadable: {err}");
                report.stop = StopReason::Truncated { index };
                break;
            }
        };
        if record.is_end_marker() {
            log::debug!("End of tile stream at record {index}");
            report.stop = StopReason::EndMarker { index };
            break;
        }

        let size = match usize::try_from(record.data_size) {
            Ok(size) if size <= config.max_tile_bytes => size,
            _ => {
                log::warn!(
                    "Tile record {index} declares {} bytes, limit is {}",
                    record.data_size,
                    config.max_tile_bytes
                );
                report.stop = StopReason::AllocationFailed {
                    index,
                    size: record.data_size.into(),
                };
                break;
            }
        };
        let mut blob = match TileBlob::zeroed(size) {
            Ok(blob) => blob,
            Err(err) => {
                log::warn!("Tile record {index}: {err}");
                report.stop = StopReason::AllocationFailed {
                    index,
                    size: record.data_size.into(),
                };
                break;
            }
        };
        if let Err(err) = reader.read_exact(blob.as_bytes_mut()) {
            log::warn!("Tile record {index} payload unreadable: {err}");
            report.stop = StopReason::Truncated { index };
            break;
        }

        match blob.register(&mut mesh, record.engine_ref()) {
            Ok(tile_ref) => {
                log::debug!("Registered tile record {index} as {tile_ref}");
                report.loaded += 1;
            }
            Err(rejected) => {
                log::warn!("Tile record {index} rejected: {}", rejected.status);
                report.rejected += 1;
            }
        }
    }

    if report.is_complete() {
        log::info!("Loaded {} tiles", report.loaded);
    } else {
        log::warn!(
            "Partially loaded tile set: {} of {} tiles ({} rejected, stop: {:?})",
            report.loaded,
            report.declared,
            report.rejected,
            report.stop
        );
    }

    Ok(TileSetLoad { mesh, report })
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| NavError::OpenFailure {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads a container file
pub fn load_tile_set<P: AsRef<Path>>(path: P, config: &LoaderConfig) -> Result<TileSetLoad> {
    let path = path.as_ref();
    log::info!("Loading tile set from {}", path.display());
    let mut reader = BufReader::new(open(path)?);
    read_tile_set(&mut reader, config)
}

/// Reads and validates only the header of a container file
pub fn read_tile_set_header<P: AsRef<Path>>(path: P) -> Result<TileSetHeader> {
    let mut reader = BufReader::new(open(path.as_ref())?);
    TileSetHeader::read_from(&mut reader)
}

/// Reads an unframed single-tile file into a blob
pub fn read_tile_file<P: AsRef<Path>>(path: P) -> Result<TileBlob> {
    let path = path.as_ref();
    let mut file = open(path)?;
    let len = file
        .metadata()
        .map_err(|source| NavError::OpenFailure {
            path: path.to_path_buf(),
            source,
        })?
        .len();
    let len = usize::try_from(len)
        .map_err(|_| NavError::AllocationFailure(AllocationTarget::TileBuffer))?;

    let mut blob = TileBlob::zeroed(len)?;
    file.read_exact(blob.as_bytes_mut())?;
    log::debug!("Read {} byte tile from {}", len, path.display());
    Ok(blob)
}

/// Writes every registered tile of `mesh` as a container
///
/// Returns the number of tiles written.
pub fn write_tile_set<W: Write>(writer: &mut W, mesh: &NavMesh) -> io::Result<usize> {
    let tile_count = i32::try_from(mesh.tile_count())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many tiles"))?;
    TileSetHeader::new(tile_count, mesh.params().clone()).write_to(writer)?;

    let mut written = 0;
    for tile in mesh.tiles() {
        let data = tile.data();
        let data_size = i32::try_from(data.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "tile too large"))?;
        TileRecordHeader {
            tile_ref: u64::from(tile.tile_ref().id()),
            data_size,
        }
        .write_to(writer)?;
        writer.write_all(data)?;
        written += 1;
    }
    Ok(written)
}

/// Saves every registered tile of `mesh` to a container file
pub fn save_tile_set<P: AsRef<Path>>(path: P, mesh: &NavMesh) -> Result<usize> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| NavError::OpenFailure {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    let written = write_tile_set(&mut writer, mesh)?;
    writer.flush()?;
    log::info!("Saved {} tiles to {}", written, path.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nav_engine::test_mesh_helpers::{adjacent_tiles_nav_mesh, grid_params};

    #[test]
    fn test_magic_spells_mset() {
        assert_eq!(TILE_SET_MAGIC, 0x4D53_4554);
    }

    #[test]
    fn test_header_layout() {
        let header = TileSetHeader::new(3, grid_params(4));
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), TILE_SET_HEADER_SIZE);
        assert_eq!(&bytes[0..4], &TILE_SET_MAGIC.to_le_bytes());
        assert_eq!(&bytes[8..12], &3i32.to_le_bytes());

        let parsed = TileSetHeader::read_from(&mut &bytes[..]).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_header_rejections() {
        let mut bytes = Vec::new();
        TileSetHeader::new(1, grid_params(4)).write_to(&mut bytes).unwrap();

        let mut bad_magic = bytes.clone();
        bad_magic[0] ^= 0xff;
        assert!(matches!(
            TileSetHeader::read_from(&mut &bad_magic[..]),
            Err(NavError::FormatError(FormatProblem::BadMagic(_)))
        ));

        let mut bad_version = bytes.clone();
        bad_version[4..8].copy_from_slice(&2i32.to_le_bytes());
        assert!(matches!(
            TileSetHeader::read_from(&mut &bad_version[..]),
            Err(NavError::FormatError(FormatProblem::BadVersion(2)))
        ));

        let mut bad_count = bytes.clone();
        bad_count[8..12].copy_from_slice(&(-1i32).to_le_bytes());
        assert!(matches!(
            TileSetHeader::read_from(&mut &bad_count[..]),
            Err(NavError::FormatError(FormatProblem::BadTileCount(-1)))
        ));

        assert!(matches!(
            TileSetHeader::read_from(&mut &bytes[..20]),
            Err(NavError::FormatError(FormatProblem::TruncatedHeader))
        ));
    }

    #[test]
    fn test_record_header() {
        let record = TileRecordHeader {
            tile_ref: 0x0001_0000,
            data_size: 400,
        };
        let mut bytes = Vec::new();
        record.write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), TILE_RECORD_HEADER_SIZE);
        assert_eq!(TileRecordHeader::read_from(&mut &bytes[..]).unwrap(), record);
        assert_eq!(record.engine_ref(), Some(PolyRef::new(0x0001_0000)));
        assert!(!record.is_end_marker());

        let wide = TileRecordHeader {
            tile_ref: u64::from(u32::MAX) + 1,
            data_size: 4,
        };
        assert_eq!(wide.engine_ref(), None);
        assert!(TileRecordHeader { tile_ref: 0, data_size: 4 }.is_end_marker());
        assert!(TileRecordHeader { tile_ref: 9, data_size: 0 }.is_end_marker());
    }

    #[test]
    fn test_stream_round_trip() {
        let mesh = adjacent_tiles_nav_mesh().unwrap();
        let mut bytes = Vec::new();
        assert_eq!(write_tile_set(&mut bytes, &mesh).unwrap(), 2);

        let load = read_tile_set(&mut &bytes[..], &LoaderConfig::default()).unwrap();
        assert_eq!(load.report.declared, 2);
        assert_eq!(load.report.loaded, 2);
        assert_eq!(load.report.stop, StopReason::Completed);
        assert!(load.report.is_complete());
        assert_eq!(load.mesh.params(), mesh.params());

        let original: Vec<_> = mesh.tiles().map(|t| (t.tile_ref(), t.data().to_vec())).collect();
        let loaded: Vec<_> = load.mesh.tiles().map(|t| (t.tile_ref(), t.data().to_vec())).collect();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_report_status() {
        let mut report = LoadReport {
            declared: 3,
            loaded: 3,
            rejected: 0,
            stop: StopReason::Completed,
        };
        assert_eq!(report.status(), LoadStatus::Complete);
        report.stop = StopReason::EndMarker { index: 2 };
        assert_eq!(report.status(), LoadStatus::Complete);
        report.rejected = 1;
        assert_eq!(report.status(), LoadStatus::Partial);
        report.rejected = 0;
        report.stop = StopReason::Truncated { index: 1 };
        assert_eq!(report.status(), LoadStatus::Partial);
        report.stop = StopReason::AllocationFailed { index: 1, size: -5 };
        assert_eq!(report.status(), LoadStatus::Partial);
    }
}
