//! Storage chain resolution
//!
//! Follows re-routing storages (aliases, unions) from the storage owning a
//! path down to the physical storage that can hand out a fetch link. Each
//! hop is identified by `(mount path, actual path)`; revisiting an identity
//! ends the chain, as does a self-referencing candidate or reaching
//! [`MAX_CHAIN_DEPTH`] hops. None of these are errors.

use crate::{CoreError, Result};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};
use veil_storage::path::normalize;
use veil_storage::{MountTable, Storage};

/// Maximum number of hops in a chain
pub const MAX_CHAIN_DEPTH: usize = 16;

/// One hop of a chain
#[derive(Clone)]
pub struct ChainNode {
    pub storage: Arc<dyn Storage>,
    /// Virtual path that entered this hop
    pub virtual_path: String,
    /// Path inside `storage`
    pub actual_path: String,
}

impl fmt::Debug for ChainNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainNode")
            .field("mount", &self.storage.mount_path())
            .field("virtual_path", &self.virtual_path)
            .field("actual_path", &self.actual_path)
            .finish()
    }
}

/// Resolve `path` to its chain of storages, entry storage first.
///
/// On success the chain has at least one node.
#[instrument(skip(mounts))]
pub async fn resolve_chain(mounts: &MountTable, path: &str) -> Result<Vec<ChainNode>> {
    let mut current = normalize(path);
    let mut visited: HashSet<(String, String)> = HashSet::new();
    let mut chain: Vec<ChainNode> = Vec::new();

    while chain.len() < MAX_CHAIN_DEPTH {
        let (storage, actual) = mounts.resolve(&current).map_err(|source| CoreError::Resolution {
            path: current.clone(),
            source,
        })?;

        let identity = (normalize(storage.mount_path()), actual.clone());
        if !visited.insert(identity) {
            debug!(path = %current, mount = %storage.mount_path(), "storage chain cycle");
            break;
        }
        chain.push(ChainNode {
            storage: storage.clone(),
            virtual_path: current.clone(),
            actual_path: actual.clone(),
        });

        let Some(reroute) = storage.reroute() else {
            break;
        };
        let candidates = reroute
            .raw_paths(&actual)
            .await
            .map_err(|source| CoreError::Resolution {
                path: current.clone(),
                source,
            })?;
        let Some(next) = candidates.first().map(|raw| normalize(raw)) else {
            break;
        };
        if next == current {
            break;
        }
        current = next;
    }

    debug!(hops = chain.len(), "storage chain resolved");
    Ok(chain)
}
