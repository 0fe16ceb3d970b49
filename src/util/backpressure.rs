//! Admission control for the pool's ready set and the timer's pending set.

use std::collections::BinaryHeap;

/// What to do with a submission that arrives while a bounded set is full.
///
/// In the pool's ready set, serial-queue continuations and tasks handed
/// over by the timer are exempt: they neither count against the capacity
/// nor get evicted, and inserting them never blocks. The timer thread
/// therefore never stalls on a full pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Block the submitter until an item leaves the set.
    #[default]
    Block,
    /// Fail the submission with [`Error::Rejected`](crate::Error::Rejected).
    Reject,
    /// Evict the earliest-submitted non-exempt item, then insert. A blocked
    /// caller whose task is evicted gets
    /// [`Error::Evicted`](crate::Error::Evicted).
    DropOldest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Admit,
    Wait,
    Reject,
    EvictOldest,
}

/// Capacity plus overflow policy for one set.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Bound {
    capacity: Option<usize>,
    policy: OverflowPolicy,
}

impl Bound {
    pub fn new(capacity: Option<usize>, policy: OverflowPolicy) -> Self {
        Self { capacity, policy }
    }

    pub fn admit(&self, len: usize) -> Admission {
        match self.capacity {
            Some(cap) if len >= cap => match self.policy {
                OverflowPolicy::Block => Admission::Wait,
                OverflowPolicy::Reject => Admission::Reject,
                OverflowPolicy::DropOldest => Admission::EvictOldest,
            },
            _ => Admission::Admit,
        }
    }
}

/// Items that remember their submission order.
pub(crate) trait Sequenced {
    fn seq(&self) -> u64;

    fn evictable(&self) -> bool {
        true
    }
}

/// Remove the evictable item with the smallest sequence number. O(n), only
/// taken on overflow. The heap is left untouched when nothing qualifies.
pub(crate) fn evict_oldest<T: Ord + Sequenced>(heap: &mut BinaryHeap<T>) -> Option<T> {
    heap.iter().find(|item| item.evictable())?;

    let mut items = std::mem::take(heap).into_vec();
    let oldest = items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.evictable())
        .min_by_key(|(_, item)| item.seq())
        .map(|(idx, _)| idx);
    let evicted = oldest.map(|idx| items.swap_remove(idx));
    *heap = BinaryHeap::from(items);
    evicted
}
