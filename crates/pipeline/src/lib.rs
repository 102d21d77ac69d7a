//! # Geofabric Pipeline
//!
//! Orchestration of the geofabric engine:
//!
//! - **config**: typed YAML configuration with project-relative defaults
//! - **stage**: external flow-routing steps, retries and launcher fallback
//! - **taudem**: the step lists of the full and lumped delineations
//! - **convert**: watershed grid polygonization with a command-line fallback
//! - **delineate**, **subset**, **lumped**: the three pipelines

pub mod config;
pub mod convert;
pub mod delineate;
pub mod lumped;
pub mod output;
pub mod stage;
pub mod subset;
pub mod taudem;
pub mod upstream;

pub use config::GeofabricConfig;
pub use convert::Converter;
pub use delineate::{GeofabricDelineator, GeofabricOutputs};
pub use lumped::LumpedDelineator;
pub use stage::{CommandStage, Launcher, RetryPolicy, Stage, StageContext, StageOutputs, StageRunner};
pub use subset::GeofabricSubsetter;
