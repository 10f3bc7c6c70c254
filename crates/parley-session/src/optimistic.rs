//! Local-first conversation mutations with rollback.
//!
//! Every mutation changes the local list immediately, then asks the store to
//! persist it. If the store fails, the captured prior value is written back
//! and the error is returned.
//!
//! Mutations are not coalesced. Two overlapping mutations of the same field
//! each roll back to the value they captured, so an early failure that lands
//! after a later success restores the older value locally even though the
//! backend holds the newer one. Callers that care should [`MutationManager::refresh`].

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::store::{ConversationStore, ConversationSummary};

/// Apply a change locally, commit it, and undo it if the commit fails.
///
/// `apply` returns whatever `rollback` needs to restore the prior state.
pub async fn with_optimistic_update<S, T, E, Fut>(
    apply: impl FnOnce() -> S,
    commit: impl FnOnce() -> Fut,
    rollback: impl FnOnce(S),
) -> std::result::Result<T, E>
where
    Fut: Future<Output = std::result::Result<T, E>>,
{
    let snapshot = apply();
    match commit().await {
        Ok(value) => Ok(value),
        Err(e) => {
            rollback(snapshot);
            Err(e)
        }
    }
}

/// The locally held conversation list. Cloning shares the list.
#[derive(Debug, Clone, Default)]
pub struct ConversationList {
    inner: Arc<Mutex<Vec<ConversationSummary>>>,
}

impl ConversationList {
    pub fn new(conversations: Vec<ConversationSummary>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(conversations)),
        }
    }

    pub fn snapshot(&self) -> Vec<ConversationSummary> {
        self.inner.lock().clone()
    }

    pub fn get(&self, id: &str) -> Option<ConversationSummary> {
        self.inner.lock().iter().find(|c| c.id == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().iter().any(|c| c.id == id)
    }

    pub fn replace_all(&self, conversations: Vec<ConversationSummary>) {
        *self.inner.lock() = conversations;
    }

    /// Run `f` on one conversation, if present
    pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut ConversationSummary) -> R) -> Option<R> {
        let mut list = self.inner.lock();
        list.iter_mut().find(|c| c.id == id).map(f)
    }
}

/// Issues conversation mutations against a store, optimistically
pub struct MutationManager {
    store: Arc<dyn ConversationStore>,
    list: ConversationList,
}

impl MutationManager {
    pub fn new(store: Arc<dyn ConversationStore>, list: ConversationList) -> Self {
        Self { store, list }
    }

    pub fn list(&self) -> &ConversationList {
        &self.list
    }

    /// Reload the list from the store
    pub async fn refresh(&self) -> Result<()> {
        let conversations = self.store.list().await?;
        self.list.replace_all(conversations);
        Ok(())
    }

    pub async fn rename(&self, id: &str, title: &str) -> Result<()> {
        self.ensure_loaded(id)?;
        let new_title = title.to_string();
        with_optimistic_update(
            || {
                self.list
                    .update(id, |c| std::mem::replace(&mut c.title, new_title))
            },
            || self.store.rename(id, title),
            |previous| {
                if let Some(previous) = previous {
                    tracing::warn!("Rename of {} failed, restoring \"{}\"", id, previous);
                    self.list.update(id, |c| c.title = previous);
                }
            },
        )
        .await
    }

    pub async fn soft_delete(&self, id: &str) -> Result<()> {
        self.ensure_loaded(id)?;
        with_optimistic_update(
            || self.list.update(id, |c| std::mem::replace(&mut c.is_deleted, true)),
            || self.store.delete(id),
            |previous| {
                if let Some(previous) = previous {
                    tracing::warn!("Delete of {} failed, restoring it", id);
                    self.list.update(id, |c| c.is_deleted = previous);
                }
            },
        )
        .await
    }

    pub async fn set_visibility(&self, id: &str, is_public: bool) -> Result<()> {
        self.ensure_loaded(id)?;
        with_optimistic_update(
            || {
                self.list
                    .update(id, |c| std::mem::replace(&mut c.is_public, is_public))
            },
            || self.store.set_visibility(id, is_public),
            |previous| {
                if let Some(previous) = previous {
                    tracing::warn!("Visibility change of {} failed, rolling back", id);
                    self.list.update(id, |c| c.is_public = previous);
                }
            },
        )
        .await
    }

    pub async fn set_hidden(&self, id: &str, is_hidden: bool) -> Result<()> {
        self.ensure_loaded(id)?;
        with_optimistic_update(
            || {
                self.list
                    .update(id, |c| std::mem::replace(&mut c.is_hidden, is_hidden))
            },
            || self.store.set_hidden(id, is_hidden),
            |previous| {
                if let Some(previous) = previous {
                    tracing::warn!("Hide/unhide of {} failed, rolling back", id);
                    self.list.update(id, |c| c.is_hidden = previous);
                }
            },
        )
        .await
    }

    fn ensure_loaded(&self, id: &str) -> Result<()> {
        if self.list.contains(id) {
            Ok(())
        } else {
            Err(Error::ConversationNotFound(id.to_string()))
        }
    }
}
