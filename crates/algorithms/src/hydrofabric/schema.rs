//! Drainage-network conventions
//!
//! Each published hydrofabric names its identifier and link columns
//! differently, marks "no link" with its own sentinel and may point links
//! either upstream or downstream. A convention is a plain record; supporting a
//! new one means adding a constant here.

use geofabric_core::{Error, Feature, Result};

/// Which way a schema's link columns point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    /// Link columns list the segments draining *into* this one.
    Upstream,
    /// The link column names the segment this one drains *to*.
    Downstream,
}

/// Column layout and link semantics of one drainage-network convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydrofabricSchema {
    pub name: &'static str,
    /// Identifier column of the basin (catchment) layer
    pub basin_id_field: &'static str,
    /// Identifier column of the river (segment) layer
    pub river_id_field: &'static str,
    pub link_fields: &'static [&'static str],
    /// Link value meaning "no connected segment"
    pub no_link: i64,
    pub direction: EdgeDirection,
}

pub const MERIT: HydrofabricSchema = HydrofabricSchema {
    name: "MERIT",
    basin_id_field: "COMID",
    river_id_field: "COMID",
    link_fields: &["up1", "up2", "up3"],
    no_link: -9999,
    direction: EdgeDirection::Upstream,
};

pub const TDX: HydrofabricSchema = HydrofabricSchema {
    name: "TDX",
    basin_id_field: "streamID",
    river_id_field: "LINKNO",
    link_fields: &["USLINKNO1", "USLINKNO2"],
    no_link: -9999,
    direction: EdgeDirection::Upstream,
};

pub const NWS: HydrofabricSchema = HydrofabricSchema {
    name: "NWS",
    basin_id_field: "COMID",
    river_id_field: "COMID",
    link_fields: &["toCOMID"],
    no_link: 0,
    direction: EdgeDirection::Downstream,
};

/// Stream network written by the flow-routing toolchain, with basins taken
/// from the polygonized watershed grid.
pub const TAUDEM: HydrofabricSchema = HydrofabricSchema {
    name: "TAUDEM",
    basin_id_field: "DN",
    river_id_field: "LINKNO",
    link_fields: &["USLINKNO1", "USLINKNO2"],
    no_link: -1,
    direction: EdgeDirection::Upstream,
};

const REGISTRY: [&HydrofabricSchema; 4] = [&MERIT, &TDX, &NWS, &TAUDEM];

/// Look up a schema by name, ignoring case.
pub fn lookup(name: &str) -> Option<&'static HydrofabricSchema> {
    REGISTRY
        .iter()
        .copied()
        .find(|s| s.name.eq_ignore_ascii_case(name.trim()))
}

/// Like [`lookup`], but unknown names are an input error.
pub fn require(name: &str) -> Result<&'static HydrofabricSchema> {
    lookup(name).ok_or_else(|| {
        let known: Vec<&str> = REGISTRY.iter().map(|s| s.name).collect();
        Error::InputValidation(format!(
            "unknown hydrofabric type `{}` (expected one of {})",
            name,
            known.join(", ")
        ))
    })
}

impl HydrofabricSchema {
    /// Identifier of a river segment feature.
    pub fn river_id(&self, feature: &Feature, index: usize) -> Result<i64> {
        feature
            .get_i64(self.river_id_field)
            .ok_or_else(|| Error::MissingAttribute {
                field: self.river_id_field.to_string(),
                feature: index,
            })
    }

    /// Identifier of a basin feature.
    pub fn basin_id(&self, feature: &Feature, index: usize) -> Result<i64> {
        feature
            .get_i64(self.basin_id_field)
            .ok_or_else(|| Error::MissingAttribute {
                field: self.basin_id_field.to_string(),
                feature: index,
            })
    }

    /// Linked segment ids of a feature, sentinels and empty cells skipped.
    pub fn links(&self, feature: &Feature) -> Vec<i64> {
        self.link_fields
            .iter()
            .filter_map(|field| feature.get_i64(field))
            .filter(|&id| id != self.no_link)
            .collect()
    }

    /// Directed `(upstream, downstream)` edges contributed by one segment.
    pub fn edges(&self, segment_id: i64, feature: &Feature) -> Vec<(i64, i64)> {
        self.links(feature)
            .into_iter()
            .map(|link| match self.direction {
                EdgeDirection::Upstream => (link, segment_id),
                EdgeDirection::Downstream => (segment_id, link),
            })
            .collect()
    }
}
