//! Discovery pipeline: organization walk, network topology resolution, peering classification.
//!
//! The [`walker::ResourceTreeWalker`] drives a run against any [`api::CloudApi`]
//! implementation, resolving each project's networks with
//! [`topology::NetworkTopologyResolver`] and deciding peering nodes/edges with
//! [`peering::classify`]. All graph writes go through one
//! [`vpcmap_core::accumulator::GraphAccumulator`] owned by the run.

pub mod api;
pub mod control;
pub mod error;
pub mod inventory;
pub mod peering;
pub mod topology;
pub mod walker;
