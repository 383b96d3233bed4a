//! Error taxonomy shared by the loader, the context and the query pipeline

use std::fmt;
use std::io;
use std::path::PathBuf;

use nav_engine::{PolyRef, Status};

/// Why a tile-set container header was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatProblem {
    /// The file ends before the fixed-size header does
    TruncatedHeader,
    /// Magic constant mismatch
    BadMagic(i32),
    /// Unsupported format version
    BadVersion(i32),
    /// Negative declared tile count
    BadTileCount(i32),
}

impl fmt::Display for FormatProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatProblem::TruncatedHeader => write!(f, "header is truncated"),
            FormatProblem::BadMagic(found) => write!(f, "bad magic {found:#010x}"),
            FormatProblem::BadVersion(found) => write!(f, "unsupported version {found}"),
            FormatProblem::BadTileCount(found) => write!(f, "invalid tile count {found}"),
        }
    }
}

/// Resource an allocation was attempted for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationTarget {
    Mesh,
    QueryContext,
    TileBuffer,
}

impl fmt::Display for AllocationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationTarget::Mesh => write!(f, "navigation mesh"),
            AllocationTarget::QueryContext => write!(f, "query context"),
            AllocationTarget::TileBuffer => write!(f, "tile buffer"),
        }
    }
}

/// Engine step that refused its input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStage {
    MeshInit,
    QueryInit,
    TileIngest,
}

impl fmt::Display for EngineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStage::MeshInit => write!(f, "mesh initialization"),
            EngineStage::QueryInit => write!(f, "query initialization"),
            EngineStage::TileIngest => write!(f, "tile ingestion"),
        }
    }
}

/// Errors reported by navigation operations
#[derive(thiserror::Error, Debug)]
pub enum NavError {
    #[error("cannot open {}: {source}", .path.display())]
    OpenFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid tile set: {0}")]
    FormatError(#[from] FormatProblem),

    #[error("could not allocate {0}")]
    AllocationFailure(AllocationTarget),

    #[error("{stage} failed: {status}")]
    EngineInitFailure { stage: EngineStage, status: Status },

    #[error("no polygon near the endpoints (start {start_ref}, end {end_ref})")]
    NoNearestPolygon { start_ref: PolyRef, end_ref: PolyRef },

    #[error("no path found")]
    NoPathFound,

    #[error("path needs {required} waypoints but only {capacity} fit")]
    CapacityExceeded { required: usize, capacity: usize },

    #[error("navigation context has no mesh")]
    NotInitialized,

    #[error("mesh is still shared by {0} query contexts")]
    MeshInUse(usize),

    #[error("navigation engine error: {0}")]
    Engine(Status),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl std::error::Error for FormatProblem {}

impl NavError {
    /// Stable integer code for hosts that take a flat status
    ///
    /// `NoPathFound` is 0 (an empty waypoint count); every other error is
    /// negative.
    pub fn code(&self) -> i32 {
        match self {
            NavError::NoPathFound => 0,
            NavError::OpenFailure { .. } => -1,
            NavError::FormatError(_) => -2,
            NavError::AllocationFailure(_) => -3,
            NavError::EngineInitFailure { .. } => -4,
            NavError::NoNearestPolygon { .. } => -5,
            NavError::CapacityExceeded { .. } => -6,
            NavError::NotInitialized => -7,
            NavError::MeshInUse(_) => -8,
            NavError::Engine(_) => -9,
            NavError::Io(_) => -10,
            NavError::InvalidConfig(_) => -11,
        }
    }

    /// Maps an engine construction status, splitting allocation failures
    /// from refused input
    pub(crate) fn from_engine_init(
        stage: EngineStage,
        target: AllocationTarget,
        status: Status,
    ) -> Self {
        match status {
            Status::OutOfMemory => NavError::AllocationFailure(target),
            status => NavError::EngineInitFailure { stage, status },
        }
    }
}

/// Result type for navigation operations
pub type Result<T> = std::result::Result<T, NavError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            NavError::OpenFailure {
                path: PathBuf::from("missing.bin"),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
            NavError::FormatError(FormatProblem::BadMagic(0)),
            NavError::AllocationFailure(AllocationTarget::Mesh),
            NavError::EngineInitFailure {
                stage: EngineStage::TileIngest,
                status: Status::WrongMagic,
            },
            NavError::NoNearestPolygon {
                start_ref: PolyRef::NULL,
                end_ref: PolyRef::NULL,
            },
            NavError::NoPathFound,
            NavError::CapacityExceeded {
                required: 3,
                capacity: 2,
            },
            NavError::NotInitialized,
            NavError::MeshInUse(1),
            NavError::Engine(Status::InvalidRef),
            NavError::Io(io::Error::from(io::ErrorKind::WriteZero)),
            NavError::InvalidConfig("max_nodes".to_string()),
        ];

        let mut codes: Vec<i32> = errors.iter().map(NavError::code).collect();
        assert_eq!(NavError::NoPathFound.code(), 0);
        assert!(codes.iter().filter(|&&c| c != 0).all(|&c| c < 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_engine_init_mapping() {
        assert!(matches!(
            NavError::from_engine_init(
                EngineStage::MeshInit,
                AllocationTarget::Mesh,
                Status::OutOfMemory
            ),
            NavError::AllocationFailure(AllocationTarget::Mesh)
        ));
        assert!(matches!(
            NavError::from_engine_init(
                EngineStage::MeshInit,
                AllocationTarget::Mesh,
                Status::InvalidParam
            ),
            NavError::EngineInitFailure {
                stage: EngineStage::MeshInit,
                status: Status::InvalidParam
            }
        ));
    }

    #[test]
    fn test_messages() {
        let err = NavError::from(FormatProblem::BadVersion(3));
        assert_eq!(err.to_string(), "invalid tile set: unsupported version 3");
        let err = NavError::NoNearestPolygon {
            start_ref: PolyRef::new(0x10000),
            end_ref: PolyRef::NULL,
        };
        assert_eq!(
            err.to_string(),
            "no polygon near the endpoints (start 0x10000, end 0x0)"
        );
    }
}
