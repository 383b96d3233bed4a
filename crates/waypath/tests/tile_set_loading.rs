//! Bulk and single-tile loading from files

mod common;

use nav_engine::test_mesh_helpers::grid_params;
use nav_engine::Status;
use waypath::{
    read_tile_set_header, write_tile_set, AllocationTarget, EngineStage, FormatProblem,
    LoadStatus, LoaderConfig, NavConfig, NavContext, NavError, StopReason, TileRecordHeader,
    TileSetHeader,
};
use waypath::tile_set::TILE_SET_HEADER_SIZE;

use common::*;

fn container(records: &[(u64, Vec<u8>)], declared: i32) -> Vec<u8> {
    let mut bytes = Vec::new();
    TileSetHeader::new(declared, grid_params(4))
        .write_to(&mut bytes)
        .unwrap();
    for (tile_ref, data) in records {
        TileRecordHeader {
            tile_ref: *tile_ref,
            data_size: data.len() as i32,
        }
        .write_to(&mut bytes)
        .unwrap();
        bytes.extend_from_slice(data);
    }
    bytes
}

#[test]
fn test_well_formed_container_loads_every_tile() -> waypath::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("zone.mset");
    assert_eq!(waypath::save_tile_set(&path, &l_shaped_mesh())?, 3);

    let load = waypath::load_tile_set(&path, &LoaderConfig::default())?;
    assert_eq!(load.report.declared, 3);
    assert_eq!(load.report.loaded, 3);
    assert_eq!(load.report.rejected, 0);
    assert_eq!(load.report.stop, StopReason::Completed);
    assert_eq!(load.report.status(), LoadStatus::Complete);
    assert_eq!(load.mesh.tile_count(), 3);
    for (x, y) in [(0, 0), (1, 0), (0, 1)] {
        assert!(load.mesh.tile_at(x, y, 0).is_some());
    }

    let header = read_tile_set_header(&path)?;
    assert_eq!(header.tile_count, 3);
    assert_eq!(header.params, grid_params(4));
    Ok(())
}

#[test]
fn test_bad_magic_or_version_fails_before_tiles() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = container(&[(slot_ref(0), quad_tile_bytes(0, 0))], 1);

    bytes[0] ^= 0xff;
    let path = write_file(dir.path(), "magic.mset", &bytes);
    assert!(matches!(
        waypath::load_tile_set(&path, &LoaderConfig::default()),
        Err(NavError::FormatError(FormatProblem::BadMagic(_)))
    ));

    let mut bytes = container(&[(slot_ref(0), quad_tile_bytes(0, 0))], 1);
    bytes[4..8].copy_from_slice(&7i32.to_le_bytes());
    let path = write_file(dir.path(), "version.mset", &bytes);
    let err = waypath::load_tile_set(&path, &LoaderConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        NavError::FormatError(FormatProblem::BadVersion(7))
    ));
    assert_eq!(err.code(), -2);
}

#[test]
fn test_short_header_is_a_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = container(&[], 0);
    let path = write_file(dir.path(), "short.mset", &bytes[..TILE_SET_HEADER_SIZE - 1]);
    assert!(matches!(
        waypath::load_tile_set(&path, &LoaderConfig::default()),
        Err(NavError::FormatError(FormatProblem::TruncatedHeader))
    ));
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = waypath::load_tile_set(dir.path().join("absent.mset"), &LoaderConfig::default())
        .unwrap_err();
    assert!(matches!(err, NavError::OpenFailure { .. }));
    assert_eq!(err.code(), -1);
}

#[test]
fn test_invalid_params_fail_mesh_init() {
    let mut bytes = Vec::new();
    let mut params = grid_params(4);
    params.max_tiles = 0;
    TileSetHeader::new(0, params).write_to(&mut bytes).unwrap();
    assert!(matches!(
        waypath::read_tile_set(&mut &bytes[..], &LoaderConfig::default()),
        Err(NavError::EngineInitFailure {
            stage: EngineStage::MeshInit,
            status: Status::InvalidParam
        })
    ));
}

#[test]
fn test_zero_record_ends_the_stream() {
    let records = [
        (slot_ref(0), quad_tile_bytes(0, 0)),
        (0, quad_tile_bytes(1, 0)),
        (slot_ref(2), quad_tile_bytes(0, 1)),
    ];
    let bytes = container(&records, 3);
    let load = waypath::read_tile_set(&mut &bytes[..], &LoaderConfig::default()).unwrap();
    assert_eq!(load.report.loaded, 1);
    assert_eq!(load.report.stop, StopReason::EndMarker { index: 1 });
    assert!(load.report.is_complete());
    assert_eq!(load.mesh.tile_count(), 1);
    assert!(load.mesh.tile_at(0, 0, 0).is_some());

    let records = [
        (slot_ref(0), quad_tile_bytes(0, 0)),
        (slot_ref(1), Vec::new()),
    ];
    let bytes = container(&records, 2);
    let load = waypath::read_tile_set(&mut &bytes[..], &LoaderConfig::default()).unwrap();
    assert_eq!(load.report.loaded, 1);
    assert_eq!(load.report.stop, StopReason::EndMarker { index: 1 });
}

#[test]
fn test_truncated_payload_keeps_earlier_tiles() {
    let mut bytes = Vec::new();
    write_tile_set(&mut bytes, &l_shaped_mesh()).unwrap();
    bytes.truncate(bytes.len() - 10);

    let load = waypath::read_tile_set(&mut &bytes[..], &LoaderConfig::default()).unwrap();
    assert_eq!(load.report.loaded, 2);
    assert_eq!(load.report.stop, StopReason::Truncated { index: 2 });
    assert_eq!(load.report.status(), LoadStatus::Partial);
    assert_eq!(load.mesh.tile_count(), 2);
}

#[test]
fn test_declared_count_beyond_stream_is_truncation() {
    let bytes = container(&[(slot_ref(0), quad_tile_bytes(0, 0))], 2);
    let load = waypath::read_tile_set(&mut &bytes[..], &LoaderConfig::default()).unwrap();
    assert_eq!(load.report.loaded, 1);
    assert_eq!(load.report.stop, StopReason::Truncated { index: 1 });
    assert!(!load.report.is_complete());
}

#[test]
fn test_oversized_tile_stops_with_allocation_failure() {
    let records = [
        (slot_ref(0), quad_tile_bytes(0, 0)),
        (slot_ref(1), quad_tile_bytes(1, 0)),
    ];
    let bytes = container(&records, 2);
    let limit = records[0].1.len() - 1;
    let config = LoaderConfig::default().with_max_tile_bytes(limit);

    let load = waypath::read_tile_set(&mut &bytes[..], &config).unwrap();
    assert_eq!(load.report.loaded, 0);
    assert!(matches!(
        load.report.stop,
        StopReason::AllocationFailed { index: 0, .. }
    ));
    assert_eq!(load.report.status(), LoadStatus::Partial);
    assert_eq!(load.mesh.tile_count(), 0);
}

#[test]
fn test_negative_size_stops_with_allocation_failure() {
    let mut bytes = container(&[(slot_ref(0), quad_tile_bytes(0, 0))], 2);
    TileRecordHeader {
        tile_ref: slot_ref(1),
        data_size: -4,
    }
    .write_to(&mut bytes)
    .unwrap();

    let load = waypath::read_tile_set(&mut &bytes[..], &LoaderConfig::default()).unwrap();
    assert_eq!(load.report.loaded, 1);
    assert_eq!(
        load.report.stop,
        StopReason::AllocationFailed { index: 1, size: -4 }
    );
}

#[test]
fn test_rejected_tile_is_counted_and_skipped() {
    let records = [
        (slot_ref(0), vec![0xab; 256]),
        (slot_ref(1), quad_tile_bytes(1, 0)),
        (slot_ref(2), quad_tile_bytes(1, 0)),
    ];
    let bytes = container(&records, 3);
    let load = waypath::read_tile_set(&mut &bytes[..], &LoaderConfig::default()).unwrap();
    assert_eq!(load.report.loaded, 1);
    assert_eq!(load.report.rejected, 2);
    assert_eq!(load.report.stop, StopReason::Completed);
    assert_eq!(load.report.status(), LoadStatus::Partial);
    assert!(load.mesh.tile_at(1, 0, 0).is_some());
}

#[test]
fn test_wide_tile_ref_lets_the_engine_pick_a_slot() {
    let records = [(u64::from(u32::MAX) + 7, quad_tile_bytes(0, 0))];
    let bytes = container(&records, 1);
    let load = waypath::read_tile_set(&mut &bytes[..], &LoaderConfig::default()).unwrap();
    assert_eq!(load.report.loaded, 1);
    assert!(load.report.is_complete());
}

#[test]
fn test_context_reload_replaces_mesh() -> waypath::Result<()> {
    let dir = tempfile::tempdir()?;
    let three = dir.path().join("three.mset");
    waypath::save_tile_set(&three, &l_shaped_mesh())?;
    let one = dir.path().join("one.mset");
    waypath::save_tile_set(&one, &single_tile_mesh())?;

    let mut context = NavContext::new(NavConfig::default())?;
    let report = context.load_tile_set(&three)?;
    assert_eq!(report.loaded, 3);
    let first = context.mesh().map(std::sync::Arc::clone);

    let report = context.load_tile_set(&one)?;
    assert_eq!(report.loaded, 1);
    assert_eq!(context.mesh().map(|m| m.tile_count()), Some(1));
    // The old mesh is no longer referenced by the context.
    assert_eq!(first.as_ref().map(std::sync::Arc::strong_count), Some(1));

    let bad = write_file(dir.path(), "bad.mset", &[0u8; 64]);
    assert!(context.load_tile_set(&bad).is_err());
    assert!(!context.is_initialized());
    Ok(())
}

#[test]
fn test_single_tile_file_initializes_mesh() -> waypath::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "0_0.tile", &quad_tile_bytes(0, 0));

    let mut context = NavContext::new(NavConfig::default())?;
    let tile_ref = context.add_tile_file(&path)?;
    assert!(tile_ref.is_valid());
    assert!(context.is_initialized());
    assert_eq!(context.mesh().map(|m| m.tile_count()), Some(1));
    Ok(())
}

#[test]
fn test_tile_file_joins_current_mesh() -> waypath::Result<()> {
    let dir = tempfile::tempdir()?;
    let left = write_file(dir.path(), "0_0.tile", &quad_tile_bytes(0, 0));
    let right = write_file(dir.path(), "1_0.tile", &quad_tile_bytes(1, 0));

    let mut context = NavContext::new(NavConfig::default())?;
    context.initialize(grid_params(4))?;
    context.add_tile_file(&left)?;
    context.add_tile_file(&right)?;
    assert_eq!(context.mesh().map(|m| m.tile_count()), Some(2));

    let err = context.add_tile_file(&right).unwrap_err();
    assert!(matches!(
        err,
        NavError::EngineInitFailure {
            stage: EngineStage::TileIngest,
            status: Status::AlreadyExists
        }
    ));
    assert_eq!(err.code(), -4);
    Ok(())
}

#[test]
fn test_bad_tile_file_is_an_ingestion_failure() {
    let dir = tempfile::tempdir().unwrap();
    let garbage = write_file(dir.path(), "garbage.tile", &[7u8; 120]);

    let mut context = NavContext::new(NavConfig::default()).unwrap();
    assert!(matches!(
        context.add_tile_file(&garbage),
        Err(NavError::EngineInitFailure {
            stage: EngineStage::TileIngest,
            status: Status::WrongMagic
        })
    ));
    assert!(!context.is_initialized());

    assert!(matches!(
        context.add_tile_file(dir.path().join("missing.tile")),
        Err(NavError::OpenFailure { .. })
    ));
}

/// Wall tile with four bytes at `offset` replaced by `value`
fn damaged_wall_tile(offset: usize, value: f32) -> Vec<u8> {
    let mut bytes = wall_tile_bytes();
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    bytes
}

#[test]
fn test_tile_with_bad_geometry_is_refused() -> waypath::Result<()> {
    let dir = tempfile::tempdir()?;
    // bmax.y below bmin.y, then an infinite x on the third vertex
    let inverted = write_file(dir.path(), "inverted.tile", &damaged_wall_tile(88, -1.0));
    let infinite = write_file(
        dir.path(),
        "infinite.tile",
        &damaged_wall_tile(100 + 2 * 12, f32::NEG_INFINITY),
    );

    let mut context = NavContext::new(NavConfig::default())?;
    for path in [&inverted, &infinite] {
        assert!(matches!(
            context.add_tile_file(path),
            Err(NavError::EngineInitFailure {
                stage: EngineStage::TileIngest,
                status: Status::DataCorrupted
            })
        ));
    }
    assert!(!context.is_initialized());

    let bytes = container(
        &[
            (slot_ref(0), damaged_wall_tile(88, -1.0)),
            (slot_ref(1), quad_tile_bytes(1, 0)),
        ],
        2,
    );
    let path = write_file(dir.path(), "damaged.mset", &bytes);
    let report = context.load_tile_set(&path)?;
    assert_eq!(report.loaded, 1);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.status(), LoadStatus::Partial);

    let request = waypath::PathRequest::new(world([11.0, 0.0, 1.0]), world([19.0, 0.0, 9.0]), 16);
    let path = context.find_path(&request)?;
    assert_eq!(path.waypoints.last(), Some(&request.end));
    Ok(())
}

#[test]
fn test_forked_query_blocks_tile_ingestion() -> waypath::Result<()> {
    let dir = tempfile::tempdir()?;
    let right = write_file(dir.path(), "1_0.tile", &quad_tile_bytes(1, 0));

    let mut context = NavContext::new(NavConfig::default())?;
    context.initialize(grid_params(4))?;
    let fork = context.fork_query()?;
    assert!(matches!(
        context.add_tile_file(&right),
        Err(NavError::MeshInUse(1))
    ));
    drop(fork);
    context.add_tile_file(&right)?;
    Ok(())
}

#[test]
fn test_allocation_target_display() {
    assert_eq!(
        NavError::AllocationFailure(AllocationTarget::TileBuffer).to_string(),
        "could not allocate tile buffer"
    );
}
