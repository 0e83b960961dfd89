//! Drives [`chunk_sim`] from the command line: generates synthetic blocks or
//! collects real target counts from a node, runs the sweeps and writes the
//! report.

pub mod cli;
pub mod collector;
pub mod env;
pub mod provider;
pub mod retry;
pub mod tracing;
