use std::collections::HashMap;
use std::sync::Arc;

use tenantry_core::WorkspaceId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async mutexes keyed by workspace.
///
/// Entries nobody holds or waits on are pruned whenever a lock is taken, so
/// the map only grows with the number of workspaces locked concurrently.
#[derive(Clone, Default)]
pub(crate) struct WorkspaceLocks {
    locks: Arc<Mutex<HashMap<WorkspaceId, Arc<Mutex<()>>>>>,
}

impl WorkspaceLocks {
    pub(crate) async fn lock(&self, workspace_id: WorkspaceId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|locked_workspace_id, lock| {
                *locked_workspace_id == workspace_id || Arc::strong_count(lock) > 1
            });
            locks.entry(workspace_id).or_default().clone()
        };

        lock.lock_owned().await
    }

    #[cfg(test)]
    pub(crate) async fn tracked_workspaces(&self) -> usize {
        self.locks.lock().await.len()
    }
}
