//! Resource lifetime management: reference counts, deferred disposal and cleanup

pub mod auto_cleanup;
pub mod id;
pub mod registry;
pub mod teardown;

pub use auto_cleanup::{lock, shared, AutoCleanupTask, SharedRegistry};
pub use id::{IdentityKey, ResourceId, ResourceKind};
pub use registry::{KindStats, Resource, ResourceRecord, ResourceRegistry, ResourceStats};
pub use teardown::ReleaseCounters;
