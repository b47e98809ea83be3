//! Shared Kubernetes utilities for kubectl-save.
//!
//! Everything in here works on plain `serde_json` documents and never talks
//! to a cluster, so it can be tested without a running API server.

pub mod neat;
pub mod normalize;
pub mod workload;

pub use neat::{CleanError, FieldCleaner, IdentityHints, NeatCleaner, NeatOptions};
pub use normalize::{normalize, normalize_value, NormalizeError};
pub use workload::{InvalidWorkload, WorkloadInfo, WorkloadKind};
