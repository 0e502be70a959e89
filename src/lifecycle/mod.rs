//! Index lifecycle
//!
//! Every schema name owns a series of backend indexes, one per structural
//! version. At most one is Active; the alias `<prefix><schema>` follows it.
//!
//! Re-indexing after a structural change:
//!
//! 1. `create_index` the new version (Building)
//! 2. backfill it through the ingestion coordinator
//! 3. `swap_active`: move the alias, retire the old Active version and
//!    activate the new one in a single table change
//! 4. delete the old version after the grace period
//!
//! A Retiring version is never deleted while its schema has no Active
//! version, so an interrupted swap cannot lose the only copy of the data.

mod descriptor;
mod errors;
mod locks;
mod manager;
mod store;

pub use descriptor::{alias_name, index_id, IndexDescriptor, IndexState};
pub use errors::{LifecycleError, LifecycleResult};
pub use manager::IndexLifecycleManager;
pub use store::DescriptorStore;
