//! GeoTIFF reading and writing on top of the `tiff` crate
//!
//! Georeferencing comes from ModelPixelScale (33550) + ModelTiepoint (33922),
//! the CRS from the GeoKeyDirectory (34735) and nodata from GDAL_NODATA
//! (42113). That is all the flow-routing toolchain writes for its grids.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

fn tiff_err(what: &str) -> impl Fn(tiff::TiffError) -> Error + '_ {
    move |e| Error::Other(format!("{what}: {e}"))
}

/// Read the first band of a GeoTIFF file.
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(BufReader::new(file))
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader).map_err(tiff_err("TIFF decode error"))?;
    let (width, height) = decoder
        .dimensions()
        .map_err(tiff_err("Cannot read dimensions"))?;
    let (rows, cols) = (height as usize, width as usize);

    let image = decoder
        .read_image()
        .map_err(tiff_err("Cannot read image data"))?;

    let data: Vec<T> = match image {
        DecodingResult::F32(buf) => cast_all(&buf),
        DecodingResult::F64(buf) => cast_all(&buf),
        DecodingResult::U8(buf) => cast_all(&buf),
        DecodingResult::U16(buf) => cast_all(&buf),
        DecodingResult::U32(buf) => cast_all(&buf),
        DecodingResult::I8(buf) => cast_all(&buf),
        DecodingResult::I16(buf) => cast_all(&buf),
        DecodingResult::I32(buf) => cast_all(&buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    let mut raster = Raster::from_vec(data, rows, cols)?;
    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));
    if let Some(nd) = read_nodata(&mut decoder) {
        raster.set_nodata(num_traits::cast(nd));
    }
    Ok(raster)
}

fn cast_all<S: Copy + num_traits::NumCast, T: RasterElement>(buf: &[S]) -> Vec<T> {
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok()?;
    let tie = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok()?;
    if scale.len() < 2 || tie.len() < 6 {
        return None;
    }
    // tiepoint: [I, J, K, X, Y, Z]
    Some(GeoTransform::new(
        tie[3] - tie[0] * scale[0],
        tie[4] + tie[1] * scale[1],
        scale[0],
        -scale[1],
    ))
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    if keys.len() < 4 {
        return None;
    }
    let count = keys[3] as usize;
    let mut geographic = None;
    for entry in keys[4..].chunks_exact(4).take(count) {
        // [key_id, tag_location, count, value]; location 0 means inline value
        if entry[1] != 0 || entry[3] == 0 || entry[3] == 32767 {
            continue;
        }
        match entry[0] {
            PROJECTED_CS_TYPE_KEY => return Some(CRS::from_epsg(entry[3] as u32)),
            GEOGRAPHIC_TYPE_KEY => geographic = Some(CRS::from_epsg(entry[3] as u32)),
            _ => {}
        }
    }
    geographic
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(Tag::GdalNodata).ok()?;
    text.trim_end_matches('\0').trim().parse().ok()
}

/// Write a raster as a single-band 32-bit float GeoTIFF.
///
/// Label grids survive the float conversion exactly up to 2^24.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(raster, file)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer).map_err(tiff_err("TIFF encoder error"))?;
    let (rows, cols) = raster.shape();
    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(tiff_err("Cannot create TIFF image"))?;

    let gt = raster.transform();
    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])
        .map_err(tiff_err("Cannot write scale tag"))?;
    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
        .map_err(tiff_err("Cannot write tiepoint tag"))?;

    let geokeys = geokey_directory(raster.crs());
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, geokeys.as_slice())
        .map_err(tiff_err("Cannot write geokey tag"))?;

    if let Some(nd) = raster.nodata().and_then(|v| v.to_f64()) {
        image
            .encoder()
            .write_tag(Tag::GdalNodata, nd.to_string().as_str())
            .map_err(tiff_err("Cannot write nodata tag"))?;
    }

    image
        .write_data(&data)
        .map_err(tiff_err("Cannot write image data"))?;
    Ok(())
}

/// GeoKeyDirectory with model type, raster type and, when known, the EPSG code.
fn geokey_directory(crs: Option<&CRS>) -> Vec<u16> {
    let code = crs.and_then(|c| c.epsg()).and_then(|c| u16::try_from(c).ok());
    let geographic = crs.map(|c| c.is_wgs84()).unwrap_or(false);
    let mut keys: Vec<u16> = vec![
        1024, 0, 1, if geographic { 2 } else { 1 }, // GTModelTypeGeoKey
        1025, 0, 1, 1, // GTRasterTypeGeoKey = PixelIsArea
    ];
    if let Some(code) = code {
        let key = if geographic {
            GEOGRAPHIC_TYPE_KEY
        } else {
            PROJECTED_CS_TYPE_KEY
        };
        keys.extend_from_slice(&[key, 0, 1, code]);
    }
    let mut directory = vec![1, 1, 0, (keys.len() / 4) as u16];
    directory.extend(keys);
    directory
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_grid_keeps_georeferencing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watersheds.tif");

        let mut raster = Raster::from_vec(vec![1i32, 1, 2, 0, 2, 2], 2, 3).unwrap();
        raster.set_transform(GeoTransform::new(400_000.0, 5_000_000.0, 90.0, -90.0));
        raster.set_crs(Some(CRS::from_epsg(32611)));
        write_geotiff(&raster, &path).unwrap();

        let loaded: Raster<i32> = read_geotiff(&path).unwrap();
        assert_eq!(loaded.shape(), (2, 3));
        assert_eq!(loaded.get(1, 1).unwrap(), 2);
        assert_eq!(loaded.transform(), raster.transform());
        assert_eq!(loaded.crs().and_then(|c| c.epsg()), Some(32611));
    }

    #[test]
    fn float_grid_keeps_origin_and_nodata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watershed.tif");

        let mut raster = Raster::from_vec(vec![1.0f64, -9999.0, 3.0, 1.0], 2, 2).unwrap();
        raster.set_transform(GeoTransform::new(502_000.5, 5_004_000.25, 30.0, -30.0));
        raster.set_nodata(Some(-9999.0));
        write_geotiff(&raster, &path).unwrap();

        let loaded: Raster<f64> = read_geotiff(&path).unwrap();
        let gt = loaded.transform();
        assert_eq!((gt.origin_x, gt.origin_y), (502_000.5, 5_004_000.25));
        assert_eq!((gt.pixel_width, gt.pixel_height), (30.0, -30.0));
        assert_eq!(loaded.nodata(), Some(-9999.0));
        assert_eq!(loaded.label(loaded.get(0, 1).unwrap()), None);
    }

    #[test]
    fn geographic_crs_uses_geographic_key() {
        let keys = geokey_directory(Some(&CRS::wgs84()));
        assert_eq!(keys[3], 3);
        assert_eq!(&keys[12..], &[GEOGRAPHIC_TYPE_KEY, 0, 1, 4326]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let result: Result<Raster<f32>> = read_geotiff("/nonexistent/dem.tif");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
