//! One module per ordered tick phase in `SPEC_FULL.md` §2. Each file adds an
//! `impl World` block with the phase's entry point, mirroring the way the
//! reference implementation groups `SettlementSystem`'s private methods.

pub mod init;
pub mod subsistence;
pub mod climate;
pub mod pastoral;
pub mod food;
pub mod households;
pub mod transport;
pub mod flows;
pub mod campaign;
pub mod disease;
pub mod growth;
pub mod join;
pub mod polity;
pub mod aggregate;
pub mod overlays;
