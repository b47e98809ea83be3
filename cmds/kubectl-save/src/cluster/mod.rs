//! Kubernetes API access.
//!
//! Connection setup from kubeconfig and listing of workload objects, using
//! kube-rs directly rather than shelling out to kubectl.

pub mod client;
pub mod lister;
