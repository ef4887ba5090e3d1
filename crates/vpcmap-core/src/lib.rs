//! Core types for the vpcmap organization/network graph.
//!
//! Provides the graph data model ([`graph::Graph`]), structured composite node keys,
//! the typed resource-name parser, the run-scoped [`accumulator::GraphAccumulator`],
//! configuration loading and JSON output.

pub mod accumulator;
pub mod config;
pub mod graph;
pub mod keys;
pub mod resource;
pub mod schema;
pub mod storage;
