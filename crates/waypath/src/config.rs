use nav_engine::{PolyFlags, QueryFilter};

/// Default half-extents of the box used to snap endpoints onto the mesh
pub const DEFAULT_HALF_EXTENTS: [f32; 3] = [2.0, 4.0, 2.0];
/// Default node budget of a query context
pub const DEFAULT_MAX_NODES: usize = 2048;
/// Default maximum corridor length in polygons
pub const DEFAULT_MAX_PATH_POLYS: usize = 256;
/// Default maximum number of straight-path vertices
pub const DEFAULT_MAX_STRAIGHT_PATH: usize = 256;
/// Default upper bound on a single declared tile payload
pub const DEFAULT_MAX_TILE_BYTES: usize = 64 * 1024 * 1024;

/// What to do when a path has more waypoints than the caller can take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum TruncationPolicy {
    /// Fail with `CapacityExceeded` and return no waypoints
    #[default]
    Error,
    /// Keep the leading waypoints that fit and flag the result as truncated
    Truncate,
}

/// Bounds and filter settings of the path query pipeline
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct QueryConfig {
    pub half_extents: [f32; 3],
    pub max_nodes: usize,
    pub max_path_polys: usize,
    pub max_straight_path: usize,
    pub include_flags: u16,
    pub exclude_flags: u16,
    pub truncation: TruncationPolicy,
}

impl QueryConfig {
    pub fn new() -> Self {
        QueryConfig {
            half_extents: DEFAULT_HALF_EXTENTS,
            max_nodes: DEFAULT_MAX_NODES,
            max_path_polys: DEFAULT_MAX_PATH_POLYS,
            max_straight_path: DEFAULT_MAX_STRAIGHT_PATH,
            include_flags: 0xffff,
            exclude_flags: 0,
            truncation: TruncationPolicy::Error,
        }
    }

    pub fn with_half_extents(mut self, half_extents: [f32; 3]) -> Self {
        self.half_extents = half_extents;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    pub fn with_max_path_polys(mut self, max_path_polys: usize) -> Self {
        self.max_path_polys = max_path_polys;
        self
    }

    pub fn with_max_straight_path(mut self, max_straight_path: usize) -> Self {
        self.max_straight_path = max_straight_path;
        self
    }

    pub fn with_flags(mut self, include_flags: u16, exclude_flags: u16) -> Self {
        self.include_flags = include_flags;
        self.exclude_flags = exclude_flags;
        self
    }

    pub fn with_truncation(mut self, truncation: TruncationPolicy) -> Self {
        self.truncation = truncation;
        self
    }

    /// Polygon filter built from the configured flags
    pub fn filter(&self) -> QueryFilter {
        QueryFilter::new(
            PolyFlags::from_bits_retain(self.include_flags),
            PolyFlags::from_bits_retain(self.exclude_flags),
        )
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.half_extents.iter().any(|e| !(e.is_finite() && *e > 0.0)) {
            return Err("Search half-extents must be positive and finite".to_string());
        }
        if self.max_nodes == 0 || self.max_nodes > nav_engine::node_pool::MAX_POOL_NODES {
            return Err(format!(
                "Node budget must be between 1 and {}",
                nav_engine::node_pool::MAX_POOL_NODES
            ));
        }
        if self.max_path_polys == 0 {
            return Err("Maximum corridor length must be positive".to_string());
        }
        if self.max_straight_path < 2 {
            return Err("Straight path must hold at least two vertices".to_string());
        }
        if self.include_flags == 0 {
            return Err("Include flags must not be empty".to_string());
        }
        Ok(())
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Limits applied while reading tile-set containers
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct LoaderConfig {
    /// Declared tile payloads above this size are treated as allocation
    /// failures
    pub max_tile_bytes: usize,
}

impl LoaderConfig {
    pub fn new() -> Self {
        LoaderConfig {
            max_tile_bytes: DEFAULT_MAX_TILE_BYTES,
        }
    }

    pub fn with_max_tile_bytes(mut self, max_tile_bytes: usize) -> Self {
        self.max_tile_bytes = max_tile_bytes;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_tile_bytes == 0 {
            return Err("Maximum tile size must be positive".to_string());
        }
        Ok(())
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Complete configuration of a navigation context
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct NavConfig {
    pub query: QueryConfig,
    pub loader: LoaderConfig,
}

impl NavConfig {
    pub fn with_query(mut self, query: QueryConfig) -> Self {
        self.query = query;
        self
    }

    pub fn with_loader(mut self, loader: LoaderConfig) -> Self {
        self.loader = loader;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        self.query.validate()?;
        self.loader.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NavConfig::default();
        assert_eq!(config.query.half_extents, [2.0, 4.0, 2.0]);
        assert_eq!(config.query.max_nodes, 2048);
        assert_eq!(config.query.max_path_polys, 256);
        assert_eq!(config.query.max_straight_path, 256);
        assert_eq!(config.query.truncation, TruncationPolicy::Error);
        assert_eq!(config.loader.max_tile_bytes, 64 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_filter_is_permissive() {
        let filter = QueryConfig::default().filter();
        assert!(filter.pass_filter(PolyFlags::WALK));
        assert!(filter.pass_filter(PolyFlags::DISABLED));

        let filter = QueryConfig::default()
            .with_flags(0xffff, PolyFlags::DISABLED.bits())
            .filter();
        assert!(!filter.pass_filter(PolyFlags::WALK | PolyFlags::DISABLED));
    }

    #[test]
    fn test_validation() {
        assert!(QueryConfig::default().with_max_nodes(0).validate().is_err());
        assert!(QueryConfig::default().with_max_nodes(70_000).validate().is_err());
        assert!(QueryConfig::default()
            .with_half_extents([2.0, -1.0, 2.0])
            .validate()
            .is_err());
        assert!(QueryConfig::default().with_max_straight_path(1).validate().is_err());
        assert!(QueryConfig::default().with_flags(0, 0).validate().is_err());
        assert!(LoaderConfig::default().with_max_tile_bytes(0).validate().is_err());
    }

    #[cfg(feature = "serialization")]
    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: NavConfig =
            serde_json::from_str(r#"{"query": {"max_nodes": 512, "truncation": "truncate"}}"#)
                .unwrap();
        assert_eq!(config.query.max_nodes, 512);
        assert_eq!(config.query.truncation, TruncationPolicy::Truncate);
        assert_eq!(config.query.half_extents, DEFAULT_HALF_EXTENTS);
        assert_eq!(config.loader, LoaderConfig::default());
    }
}
