//! Garbage collection for a CI platform's worker-side resources.
//!
//! The reclaimers in [`gc`] run as independent periodic tasks against a
//! shared store ([`db`]) and the workers' runtime APIs ([`worker_client`]).

pub mod config;
pub mod db;
pub mod gc;
pub mod models;
pub mod observability;
pub mod worker_client;
