//! Document ledger: the canonical status mirror
//!
//! Every claim transition is reflected onto the document row and recorded
//! as one immutable history entry, inside the same store transaction that
//! moves the claim. The ledger is the only writer of `Document.status` and
//! `Document.holder_id`, which keeps the holder invariant in one place:
//! the holder is set iff the new status is an in-review status.

use crate::document::{Actor, Document, HistoryEntry};
use crate::error::ConformaResult;
use crate::status::DocumentStatus;
use crate::store::StoreTransaction;

pub struct DocumentLedger;

impl DocumentLedger {
    /// Move a document to `status` and append the matching history entry
    ///
    /// Must run inside the transaction that updates the claim; the caller
    /// commits both together or neither.
    pub fn transition(
        txn: &mut dyn StoreTransaction,
        document: &mut Document,
        status: DocumentStatus,
        actor: &Actor,
        note: &str,
    ) -> ConformaResult<HistoryEntry> {
        document.status = status;
        document.holder_id = if status.is_in_review() {
            Some(actor.id.clone())
        } else {
            None
        };
        txn.update_document(document)?;

        let entry = HistoryEntry::record(status, actor, note);
        txn.append_history(document.id, &entry)?;
        Ok(entry)
    }
}
