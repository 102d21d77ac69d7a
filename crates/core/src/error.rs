//! Error types for the geofabric engine

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for geofabric operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing DEM, pour point or required configuration. Raised before any
    /// external process starts.
    #[error("Input validation failed: {0}")]
    InputValidation(String),

    /// An external flow-routing step kept failing after retries and launcher fallback.
    #[error("External tool `{stage}` failed after {attempts} attempt(s): {detail}")]
    ExternalToolFailure {
        stage: String,
        attempts: u32,
        detail: String,
    },

    /// Both the in-process and the command-line polygonization failed.
    #[error("Polygonization of {path} failed: {reason}")]
    PolygonizationFailure { path: PathBuf, reason: String },

    /// The pour point does not fall inside any basin.
    #[error("Topology error: {0}")]
    Topology(String),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("GeoJSON error: {0}")]
    GeoJson(String),

    #[error("Missing attribute `{field}` on feature {feature}")]
    MissingAttribute { field: String, feature: usize },

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("GDAL error: {0}")]
    #[cfg(feature = "gdal")]
    Gdal(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "gdal")]
impl From<gdal::errors::GdalError> for Error {
    fn from(e: gdal::errors::GdalError) -> Self {
        Error::Gdal(e.to_string())
    }
}

impl From<geojson::Error> for Error {
    fn from(e: geojson::Error) -> Self {
        Error::GeoJson(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::GeoJson(e.to_string())
    }
}

/// Result type alias for geofabric operations
pub type Result<T> = std::result::Result<T, Error>;
