//! Settlement dynamics engine
//!
//! A deterministic, year-step simulation of a population of place-based
//! settlement nodes on a regular field grid: subsistence mix and domestic
//! technology, climate/fertility, an evolving transport graph, food flows
//! and migration, an SIR disease model, campaign logistics, and a
//! discrete-choice polity-switch allocator. A host world simulation drives
//! the engine one year at a time through [`World::tick_year`], lending it a
//! read-only field grid ([`host::FieldGrid`]) and country vector
//! ([`host::CountryView`]) and receiving a small [`host::CountryWriteBack`]
//! per country in return.
//!
//! ## Module structure
//!
//! - `types`    Scalar/identifier types and enums shared across the engine
//! - `node`     `SettlementNode`, the engine's primary owned entity
//! - `edge`     `TransportEdge`, the undirected transport graph's edges
//! - `field`    Per-field fertility/climate/irrigation state
//! - `country`  Per-country aggregates and the trade-hint matrix
//! - `packages` The static domestic-technology package table
//! - `host`     Read-only interfaces into the host world simulation
//! - `config`   The engine's configuration surface
//! - `math`     Small numeric helpers shared by every phase
//! - `hash`     The deterministic 64-bit mix and its uses as the sole RNG
//! - `world`    `World`, the engine's state container and tick entry point
//! - `phases`   One module per ordered tick phase, each an `impl World` block
//!
//! `tick_year` is the only mutation entry point; see `world::World` for the
//! full ordering and atomicity contract.

#[cfg(feature = "instrument")]
pub use instrument;

pub mod config;
pub mod country;
pub mod edge;
pub mod field;
pub mod hash;
pub mod host;
pub mod math;
pub mod node;
pub mod packages;
pub mod phases;
pub mod types;
pub mod world;

pub use config::EngineConfig;
pub use country::{SettlementCountryAggregate, TradeHintMatrix};
pub use edge::TransportEdge;
pub use field::FieldState;
pub use host::{CountryView, CountryWriteBack, FieldGrid, MacroEconomy};
pub use node::SettlementNode;
pub use types::{
    CountryId, EdgeIndex, FieldIndex, NodeId, NodeIndex, PackageId, SubsistenceMode, UNOWNED,
};
pub use world::{NodeScratch, Overlays, World};
