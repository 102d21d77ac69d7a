//! Reading and writing rasters and vector layers

#[cfg(feature = "gdal")]
mod gdal_io;
mod geojson_io;
mod native;

#[cfg(feature = "gdal")]
pub use gdal_io::{read_geotiff, write_geotiff};

#[cfg(not(feature = "gdal"))]
pub use native::{read_geotiff, write_geotiff};

pub use geojson_io::{read_layer, write_layer};
