//! Export Kubernetes workloads as clean, re-appliable YAML.
//!
//! The binary is meant to be installed as a kubectl plugin, so that
//! `kubectl save deployment -n controller -o deployments.yaml` lists every
//! Deployment in `controller`, strips cluster-managed fields and writes the
//! result to stdout and to `deployments.yaml`.

pub mod cluster;
pub mod commands;
pub mod config;
pub mod pipeline;
pub mod sink;
pub mod telemetry;
pub mod yaml;
