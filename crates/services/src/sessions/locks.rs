use std::sync::Arc;

use dashmap::DashMap;
use quiz_core::model::UserId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per user; requests for different users never contend.
#[derive(Clone, Default)]
pub(crate) struct UserLocks {
    inner: Arc<DashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserLocks {
    /// Wait for exclusive access to `user_id`'s session.
    pub(crate) async fn acquire(&self, user_id: UserId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.inner.entry(user_id).or_default().value());
        lock.lock_owned().await
    }
}
