//! Change selection between the previous decrypted snapshot and new input

use crate::cache::record::{Record, RecordMap};

/// Per-record predicate deciding whether an input record must be decrypted
/// again or whether its previously decrypted value can be reused.
pub trait ShouldUpdate<I, O>: Send + Sync {
    fn should_update(&self, input: &I, previous: Option<&O>) -> bool;
}

impl<I, O, F> ShouldUpdate<I, O> for F
where
    F: Fn(&I, Option<&O>) -> bool + Send + Sync,
{
    fn should_update(&self, input: &I, previous: Option<&O>) -> bool {
        self(input, previous)
    }
}

/// Default predicate: re-decrypt everything present in the input
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysUpdate;

impl<I, O> ShouldUpdate<I, O> for AlwaysUpdate {
    fn should_update(&self, _input: &I, _previous: Option<&O>) -> bool {
        true
    }
}

/// Partition of one input snapshot
#[derive(Debug, Clone)]
pub struct Selection<I, O> {
    /// Records handed to the decryptor
    pub needs_decrypt: Vec<I>,
    /// Previously decrypted values reused as-is
    pub carry_over: RecordMap<O>,
}

impl<I, O: Record> Selection<I, O> {
    /// True when no decryption is required
    pub fn is_settled(&self) -> bool {
        self.needs_decrypt.is_empty()
    }

    /// Merge decrypted records over the carried-over values
    pub fn merge(self, decrypted: Vec<O>) -> RecordMap<O> {
        merge_decrypted(self.carry_over, decrypted)
    }
}

/// Overlay `decrypted` on `carry_over`; a decrypted record wins over a
/// carried-over value with the same id
pub fn merge_decrypted<O: Record>(carry_over: RecordMap<O>, decrypted: Vec<O>) -> RecordMap<O> {
    let mut value = carry_over;
    for record in decrypted {
        value.insert(record.id().to_string(), record);
    }
    value
}

/// Split `next` into records to decrypt and values to carry over.
///
/// Returns `None` when `next` is `None`: "no records" propagates without a
/// decryption call. With no previous snapshot every record is decrypted.
/// Records the predicate skips but that have no previous value are left
/// out of the carry-over.
pub fn select<I: Clone, O: Clone>(
    previous: Option<&RecordMap<O>>,
    next: Option<&RecordMap<I>>,
    predicate: &dyn ShouldUpdate<I, O>,
) -> Option<Selection<I, O>> {
    let next = next?;

    let Some(previous) = previous else {
        return Some(Selection {
            needs_decrypt: next.values().cloned().collect(),
            carry_over: RecordMap::new(),
        });
    };

    let mut selection = Selection {
        needs_decrypt: Vec::new(),
        carry_over: RecordMap::new(),
    };

    for (id, input) in next {
        let prior = previous.get(id);
        if predicate.should_update(input, prior) {
            selection.needs_decrypt.push(input.clone());
        } else if let Some(prior) = prior {
            selection.carry_over.insert(id.clone(), prior.clone());
        }
    }

    Some(selection)
}
