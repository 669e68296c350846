use std::collections::HashMap;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use crate::domain::Id;

use super::sync_ext::MutexExt;

/// Hierarchical cancellation: a root (service-wide) token whose children are
/// per-batch tokens, whose children are per-item tokens. Cancelling a node
/// cascades to everything beneath it; cancelling a leaf never reaches back up.
#[derive(Default)]
pub struct CancellationTree {
    root: CancellationToken,
    batches: Mutex<HashMap<Id, CancellationToken>>,
}

impl CancellationTree {
    pub fn new() -> Self {
        Self { root: CancellationToken::new(), batches: Mutex::new(HashMap::new()) }
    }

    /// Returns the token for `batch_id`, creating one parented under the
    /// root if this is the first call for that batch.
    pub fn batch_token(&self, batch_id: Id) -> CancellationToken {
        let mut batches = self.batches.lock_unpoisoned();
        batches.entry(batch_id).or_insert_with(|| self.root.child_token()).clone()
    }

    /// A fresh per-item token parented under `batch_id`'s token.
    pub fn item_token(&self, batch_id: Id) -> CancellationToken {
        self.batch_token(batch_id).child_token()
    }

    /// A per-item token for a request outside any batch, parented directly
    /// under the root so it still observes service shutdown.
    pub fn standalone_item_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Cancels one batch and every item beneath it without touching the
    /// root or sibling batches.
    pub fn cancel_batch(&self, batch_id: Id) {
        if let Some(token) = self.batches.lock_unpoisoned().get(&batch_id) {
            token.cancel();
        }
    }

    /// Cancels the root token, cascading to every batch and item currently
    /// tracked. Used during graceful shutdown.
    pub fn cancel_all(&self) {
        self.root.cancel();
    }

    /// Drops bookkeeping for a batch once it has reached a terminal state.
    pub fn forget_batch(&self, batch_id: Id) {
        self.batches.lock_unpoisoned().remove(&batch_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::new_id;

    #[test]
    fn cancelling_root_cascades_to_batch_and_item() {
        let tree = CancellationTree::new();
        let batch_id = new_id();
        let batch = tree.batch_token(batch_id);
        let item = tree.item_token(batch_id);
        tree.cancel_all();
        assert!(batch.is_cancelled());
        assert!(item.is_cancelled());
    }

    #[test]
    fn cancelling_one_batch_does_not_affect_a_sibling() {
        let tree = CancellationTree::new();
        let a = new_id();
        let b = new_id();
        let token_a = tree.batch_token(a);
        let token_b = tree.batch_token(b);
        tree.cancel_batch(a);
        assert!(token_a.is_cancelled());
        assert!(!token_b.is_cancelled());
    }

    #[test]
    fn item_token_survives_unrelated_batch_cancellation() {
        let tree = CancellationTree::new();
        let a = new_id();
        let b = new_id();
        let item_a = tree.item_token(a);
        let _item_b = tree.item_token(b);
        tree.cancel_batch(b);
        assert!(!item_a.is_cancelled());
    }
}
