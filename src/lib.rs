//! `vin-reorg` binary-crate glue: CLI surface, pipeline orchestration, and
//! the Excel inventory writer. Domain logic itself lives in `reorg-core`;
//! this crate only wires it to a filesystem-driven CLI.

pub mod cli;
pub mod excel;
pub mod pipeline;
pub mod telemetry;
