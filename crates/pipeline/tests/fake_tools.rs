//! Pipeline tests driven by fake flow-routing programs (small shell scripts).

#![cfg(unix)]

use geo::{line_string, point, Geometry};
use geofabric_core::io::{read_layer, write_geotiff, write_layer};
use geofabric_core::{Error, Feature, FeatureCollection, GeoTransform, Raster, CRS};
use geofabric_pipeline::{
    CommandStage, Converter, GeofabricConfig, GeofabricDelineator, Launcher, LumpedDelineator, RetryPolicy,
    StageRunner,
};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DELINEATION_TOOLS: [&str; 7] = [
    "pitremove",
    "d8flowdir",
    "aread8",
    "gridnet",
    "threshold",
    "moveoutletstostrm",
    "streamnet",
];

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Touches every path-like argument; `-w`/`-net`/`-gw` copy fixtures.
fn generic_tool(fixtures: &Path, log: &Path) -> String {
    format!(
        r#"echo "$(basename "$0") $*" >> "{log}"
while [ $# -gt 0 ]; do
  flag="$1"; shift
  [ $# -gt 0 ] || break
  value="$1"
  case "$value" in -*) continue ;; esac
  shift
  case "$flag" in
    -w|-gw) cp "{fixtures}/watersheds.tif" "$value" ;;
    -net) cp "{fixtures}/streams.geojson" "$value" ;;
    *) case "$value" in */*) [ -e "$value" ] || : > "$value" ;; esac ;;
  esac
done"#,
        log = log.display(),
        fixtures = fixtures.display()
    )
}

/// Labels 2 | 3 over a bottom row of 1; 2 and 3 drain into 1.
fn write_fixtures(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    #[rustfmt::skip]
    let labels = vec![
        2.0, 2.0, 3.0, 3.0,
        2.0, 2.0, 3.0, 3.0,
        1.0, 1.0, 1.0, 1.0,
        1.0, 1.0, 1.0, 1.0,
    ];
    let mut grid = Raster::from_vec(labels, 4, 4).unwrap();
    grid.set_transform(GeoTransform::new(500_000.0, 5_004_000.0, 1000.0, -1000.0));
    grid.set_crs(Some(CRS::from_epsg(32633)));
    write_geotiff(&grid, dir.join("watersheds.tif")).unwrap();

    let link = |id: i64, up1: i64, up2: i64, geom: Geometry<f64>| {
        Feature::new(geom)
            .with_property("LINKNO", id)
            .with_property("DSLINKNO", -1i64)
            .with_property("USLINKNO1", up1)
            .with_property("USLINKNO2", up2)
    };
    let streams = FeatureCollection::with_crs(
        vec![
            link(1, 2, 3, line_string![(x: 502_000.0, y: 5_001_500.0), (x: 502_000.0, y: 5_000_000.0)].into()),
            link(2, -1, -1, line_string![(x: 501_000.0, y: 5_003_500.0), (x: 501_000.0, y: 5_002_000.0)].into()),
            link(3, -1, -1, line_string![(x: 503_000.0, y: 5_003_500.0), (x: 503_000.0, y: 5_002_000.0)].into()),
        ],
        Some(CRS::from_epsg(32633)),
    );
    write_layer(&streams, dir.join("streams.geojson")).unwrap();
}

struct Project {
    _root: tempfile::TempDir,
    config: GeofabricConfig,
    tools: PathBuf,
    log: PathBuf,
}

impl Project {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let data = root.path().join("data");
        let tools = root.path().join("tools");
        let fixtures = root.path().join("fixtures");
        fs::create_dir_all(&tools).unwrap();
        write_fixtures(&fixtures);
        let log = root.path().join("calls.log");
        for tool in DELINEATION_TOOLS.iter().chain(["gagewatershed"].iter()) {
            write_script(&tools, tool, &generic_tool(&fixtures, &log));
        }

        let config = GeofabricConfig {
            confluence_data_dir: Some(data.clone()),
            domain_name: Some("Fake".into()),
            taudem_dir: Some(tools.clone()),
            mpi_launcher: "none".into(),
            mpi_processes: Some(2),
            max_retries: 2,
            retry_delay: 0.0,
            stream_threshold: Some(100.0),
            min_gru_size: 1.0,
            polygonize_command: "definitely-not-a-polygonizer".into(),
            ..GeofabricConfig::default()
        };

        let project = data.join("domain_Fake");
        let dem = project.join("attributes/elevation/dem/domain_Fake_elv.tif");
        fs::create_dir_all(dem.parent().unwrap()).unwrap();
        fs::write(&dem, b"fake dem").unwrap();
        let pour = FeatureCollection::with_crs(
            vec![Feature::new(point!(x: 502_000.0, y: 5_000_500.0).into())],
            Some(CRS::from_epsg(32633)),
        );
        write_layer(&pour, project.join("shapefiles/pour_point/Fake_pourPoint.geojson")).unwrap();

        Self {
            _root: root,
            config,
            tools,
            log,
        }
    }

    fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn quick_runner(launcher: Launcher, tools: &Path) -> StageRunner {
    let policy = RetryPolicy {
        max_retries: 2,
        delay: Duration::ZERO,
    };
    StageRunner::new(policy, launcher, 2).with_tool_dir(Some(tools))
}

#[test]
fn full_delineation_with_fake_toolchain() {
    let project = Project::new();
    let outputs = GeofabricDelineator::new(&project.config).delineate().unwrap();

    let calls: Vec<String> = project
        .calls()
        .iter()
        .map(|c| c.split_whitespace().next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(calls, DELINEATION_TOOLS);

    let basins = read_layer(&outputs.basins_path).unwrap();
    assert_eq!(basins.len(), 3);
    assert!(basins.iter().all(|f| f.get_f64("GRU_area").unwrap() >= 1_000_000.0));
    let rivers = read_layer(&outputs.rivers_path).unwrap();
    assert_eq!(rivers.len(), 3);

    let interim_root = project.config.project_dir().unwrap().join("taudem-interim-files");
    assert!(!interim_root.exists());
}

#[test]
fn missing_dem_starts_no_process() {
    let project = Project::new();
    let config = GeofabricConfig {
        dem_path: "/nonexistent/dem.tif".into(),
        ..project.config.clone()
    };
    let err = GeofabricDelineator::new(&config).delineate().unwrap_err();
    assert!(matches!(err, Error::InputValidation(_)));
    assert!(project.calls().is_empty());
}

#[test]
fn failing_step_cleans_up_and_reports() {
    let project = Project::new();
    write_script(&project.tools, "aread8", "exit 1");
    let err = GeofabricDelineator::new(&project.config).delineate().unwrap_err();
    match err {
        Error::ExternalToolFailure { stage, attempts, .. } => {
            assert_eq!(stage, "aread8");
            assert_eq!(attempts, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!project.config.project_dir().unwrap().join("taudem-interim-files").exists());
}

#[test]
fn interim_files_kept_when_cleanup_disabled() {
    let project = Project::new();
    let config = GeofabricConfig {
        cleanup_intermediate_files: false,
        ..project.config.clone()
    };
    GeofabricDelineator::new(&config).delineate().unwrap();
    assert!(config.interim_dir().unwrap().join("elv-watersheds.tif").exists());
}

#[test]
fn flaky_step_succeeds_on_retry() {
    let dir = tempfile::tempdir().unwrap();
    let counter = dir.path().join("counter");
    let out = dir.path().join("out.tif");
    write_script(
        dir.path(),
        "flaky",
        &format!(
            r#"n=$(cat "{c}" 2>/dev/null || echo 0)
n=$((n + 1))
echo $n > "{c}"
[ $n -ge 2 ] || exit 1
: > "$2""#,
            c = counter.display()
        ),
    );
    let stage = CommandStage::new("flaky").output("-o", &out);
    quick_runner(Launcher::None, dir.path()).run(&stage).unwrap();
    assert_eq!(fs::read_to_string(&counter).unwrap().trim(), "2");
    assert!(out.exists());
}

#[test]
fn broken_launcher_falls_back_to_direct_invocation() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("launcher.log");
    let launcher = write_script(dir.path(), "fakerun", &format!("echo \"$*\" >> \"{}\"\nexit 1", log.display()));
    write_script(dir.path(), "tool", ": > \"$2\"");
    let out = dir.path().join("result.tif");

    let stage = CommandStage::new("tool").output("-o", &out);
    let runner = quick_runner(Launcher::Named(launcher.display().to_string()), dir.path());
    runner.run(&stage).unwrap();

    let launches = fs::read_to_string(&log).unwrap();
    assert_eq!(launches.lines().count(), 2);
    assert!(launches.lines().all(|l| l.starts_with("-n 2 ")));
    assert!(out.exists());
}

#[test]
fn step_without_its_outputs_is_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "lazy", "exit 0");
    let stage = CommandStage::new("lazy").output("-o", dir.path().join("never.tif"));
    let err = quick_runner(Launcher::None, dir.path()).run(&stage).unwrap_err();
    assert!(matches!(err, Error::ExternalToolFailure { attempts: 2, .. }));
}

#[test]
fn converter_falls_back_to_command_line() {
    let dir = tempfile::tempdir().unwrap();
    let not_a_tiff = dir.path().join("watersheds.tif");
    fs::write(&not_a_tiff, b"not a tiff").unwrap();
    let script = write_script(
        dir.path(),
        "polygonize",
        r#"cat > "$4" <<'EOF'
{"type": "FeatureCollection", "features": [
 {"type": "Feature", "properties": {"DN": 1},
  "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
 {"type": "Feature", "properties": {"DN": 0},
  "geometry": {"type": "Polygon", "coordinates": [[[1,0],[2,0],[2,1],[1,1],[1,0]]]}}
]}
EOF"#,
    );
    let converter = Converter::new(script.display().to_string());
    let layer = converter.convert(&not_a_tiff, &dir.path().join("basins.geojson")).unwrap();
    assert_eq!(layer.len(), 1);
    assert_eq!(layer.features[0].get_i64("DN"), Some(1));
}

#[test]
fn lumped_delineation_with_fake_toolchain() {
    let project = Project::new();
    let path = LumpedDelineator::new(&project.config).delineate().unwrap();
    assert!(path.ends_with("shapefiles/river_basins/Fake_riverBasins_lumped.geojson"));

    let basin = read_layer(&path).unwrap();
    assert_eq!(basin.len(), 1);
    assert_eq!(basin.features[0].get_i64("GRU_ID"), Some(1));
    approx::assert_relative_eq!(basin.features[0].get_f64("GRU_area").unwrap(), 8_000_000.0, max_relative = 1e-6);
    assert!(!project.config.lumped_interim_dir().unwrap().exists());
}
