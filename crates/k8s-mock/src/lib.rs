//! Mock Kubernetes API server for testing.
//!
//! Provides an HTTP server that can be used with kubeconfig-based connections.

pub mod http;

pub use http::{HttpMockK8sServer, MockFailure, RunningHttpMockK8sServer};
