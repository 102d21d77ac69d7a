//! Drainage-network topology: schemas, graph construction, upstream closure
//! and outlet lookup

pub mod graph;
pub mod outlet;
pub mod schema;

pub use graph::{DrainageGraph, UpstreamClosure};
pub use outlet::{locate_outlet, pour_point};
pub use schema::{lookup, require, EdgeDirection, HydrofabricSchema, MERIT, NWS, TAUDEM, TDX};
