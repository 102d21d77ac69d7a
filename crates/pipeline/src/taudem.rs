//! Flow-routing step lists
//!
//! File names follow the toolchain's conventional `elv-*` layout so interim
//! directories are recognizable to anyone who has run it by hand.

use crate::stage::CommandStage;
use std::path::{Path, PathBuf};

/// Watershed label grid written by `streamnet`
pub const WATERSHEDS: &str = "elv-watersheds.tif";
/// Stream network written by `streamnet`
pub const STREAMS: &str = "basin-streams.geojson";
/// Polygonized watersheds
pub const BASINS: &str = "basin-watersheds.geojson";
/// Watershed grid written by `gagewatershed`
pub const LUMPED_WATERSHED: &str = "watershed.tif";

/// Options of the DEM-to-network step list
#[derive(Debug, Clone)]
pub struct DelineationSteps {
    pub dem: PathBuf,
    pub pour_point: PathBuf,
    pub interim: PathBuf,
    /// Contributing-cell count that starts a stream
    pub threshold: f64,
    /// Largest outlet snapping distance, in cells
    pub max_distance: f64,
}

impl DelineationSteps {
    pub fn file(&self, name: &str) -> PathBuf {
        self.interim.join(name)
    }

    /// `pitremove` through `streamnet`, in execution order.
    pub fn stages(&self) -> Vec<CommandStage> {
        let f = |name: &str| self.file(name);
        vec![
            CommandStage::new("pitremove")
                .arg("-z", &self.dem)
                .output("-fel", f("elv-fel.tif"))
                .switch("-v"),
            CommandStage::new("d8flowdir")
                .arg("-fel", f("elv-fel.tif"))
                .output("-sd8", f("elv-sd8.tif"))
                .output("-p", f("elv-fdir.tif")),
            CommandStage::new("aread8")
                .arg("-p", f("elv-fdir.tif"))
                .output("-ad8", f("elv-ad8.tif"))
                .switch("-nc"),
            CommandStage::new("gridnet")
                .arg("-p", f("elv-fdir.tif"))
                .output("-plen", f("elv-plen.tif"))
                .output("-tlen", f("elv-tlen.tif"))
                .output("-gord", f("elv-gord.tif")),
            CommandStage::new("threshold")
                .arg("-ssa", f("elv-ad8.tif"))
                .output("-src", f("elv-src.tif"))
                .arg("-thresh", self.threshold.to_string()),
            CommandStage::new("moveoutletstostrm")
                .arg("-p", f("elv-fdir.tif"))
                .arg("-src", f("elv-src.tif"))
                .arg("-o", &self.pour_point)
                .output("-om", f("gauges.geojson"))
                .arg("-md", self.max_distance.to_string()),
            CommandStage::new("streamnet")
                .arg("-fel", f("elv-fel.tif"))
                .arg("-p", f("elv-fdir.tif"))
                .arg("-ad8", f("elv-ad8.tif"))
                .arg("-src", f("elv-src.tif"))
                .output("-ord", f("elv-ord.tif"))
                .output("-tree", f("basin-tree.dat"))
                .output("-coord", f("basin-coord.dat"))
                .output("-net", f(STREAMS))
                .arg("-o", f("gauges.geojson"))
                .output("-w", f(WATERSHEDS)),
        ]
    }
}

/// `pitremove` through `gagewatershed` for a single lumped watershed.
pub fn lumped_stages(dem: &Path, pour_point: &Path, interim: &Path, threshold: f64) -> Vec<CommandStage> {
    let f = |name: &str| interim.join(name);
    vec![
        CommandStage::new("pitremove").arg("-z", dem).output("-fel", f("fel.tif")),
        CommandStage::new("d8flowdir")
            .arg("-fel", f("fel.tif"))
            .output("-p", f("p.tif"))
            .output("-sd8", f("sd8.tif")),
        CommandStage::new("aread8").arg("-p", f("p.tif")).output("-ad8", f("ad8.tif")),
        CommandStage::new("threshold")
            .arg("-ssa", f("ad8.tif"))
            .output("-src", f("src.tif"))
            .arg("-thresh", threshold.to_string()),
        CommandStage::new("moveoutletstostrm")
            .arg("-p", f("p.tif"))
            .arg("-src", f("src.tif"))
            .arg("-o", pour_point)
            .output("-om", f("om.geojson")),
        CommandStage::new("gagewatershed")
            .arg("-p", f("p.tif"))
            .arg("-o", f("om.geojson"))
            .output("-gw", f(LUMPED_WATERSHED))
            .output("-id", f("watershed_id.txt")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{Stage, StageContext};

    fn ctx() -> StageContext {
        StageContext {
            workers: 2,
            launcher: None,
            tool_dir: None,
        }
    }

    #[test]
    fn delineation_steps_in_order() {
        let steps = DelineationSteps {
            dem: "/p/dem.tif".into(),
            pour_point: "/p/pp.geojson".into(),
            interim: "/p/i".into(),
            threshold: 5000.0,
            max_distance: 200.0,
        };
        let stages = steps.stages();
        let names: Vec<&str> = stages.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            ["pitremove", "d8flowdir", "aread8", "gridnet", "threshold", "moveoutletstostrm", "streamnet"]
        );
        assert_eq!(
            stages[4].command_line(&ctx()),
            "threshold -ssa /p/i/elv-ad8.tif -src /p/i/elv-src.tif -thresh 5000"
        );
        assert!(stages[6].outputs().contains(&PathBuf::from("/p/i/elv-watersheds.tif")));
    }

    #[test]
    fn lumped_steps_end_with_gage_watershed() {
        let stages = lumped_stages(Path::new("/d.tif"), Path::new("/pp.geojson"), Path::new("/t"), 100.0);
        assert_eq!(stages.len(), 6);
        assert_eq!(
            stages[5].command_line(&ctx()),
            "gagewatershed -p /t/p.tif -o /t/om.geojson -gw /t/watershed.tif -id /t/watershed_id.txt"
        );
    }
}
