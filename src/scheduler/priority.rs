use crate::executor::{Priority, Task};
use crate::util::{evict_oldest, Sequenced};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;

/// A task waiting in the pool's ready set.
#[derive(Debug)]
pub(crate) struct WorkItem {
    pub task: Task,
    pub priority: Priority,
    seq: u64,
    /// Serial continuations and deferred hand-offs. Not counted against the
    /// capacity and never evicted.
    exempt: bool,
}

impl Sequenced for WorkItem {
    fn seq(&self) -> u64 {
        self.seq
    }

    fn evictable(&self) -> bool {
        !self.exempt
    }
}

// Ordered by priority alone. Items in the same tier come out in whatever
// order the heap yields, not submission order.
impl PartialEq for WorkItem {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}

impl Eq for WorkItem {}

impl PartialOrd for WorkItem {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for WorkItem {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority.cmp(&other.priority)
    }
}

/// Highest-priority-first set of runnable work. Not synchronized; the pool
/// keeps it behind its own mutex.
#[derive(Debug, Default)]
pub(crate) struct ReadySet {
    heap: BinaryHeap<WorkItem>,
    next_seq: u64,
    bounded: usize,
}

impl ReadySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item that counts against the capacity.
    pub fn push(&mut self, task: Task, priority: Priority) {
        self.insert(task, priority, false);
    }

    /// Insert an item that bypasses the capacity and cannot be evicted.
    pub fn push_exempt(&mut self, task: Task, priority: Priority) {
        self.insert(task, priority, true);
    }

    fn insert(&mut self, task: Task, priority: Priority, exempt: bool) {
        let seq = self.next_seq;
        self.next_seq += 1;
        if !exempt {
            self.bounded += 1;
        }
        self.heap.push(WorkItem {
            task,
            priority,
            seq,
            exempt,
        });
    }

    pub fn pop(&mut self) -> Option<WorkItem> {
        let item = self.heap.pop()?;
        self.release(&item);
        Some(item)
    }

    fn release(&mut self, item: &WorkItem) {
        if !item.exempt {
            self.bounded -= 1;
        }
    }

    #[cfg(test)]
    pub fn peek(&self) -> Option<Priority> {
        self.heap.peek().map(|item| item.priority)
    }

    /// Evict the earliest-submitted non-exempt item, if there is one.
    pub fn evict_oldest(&mut self) -> Option<WorkItem> {
        let item = evict_oldest(&mut self.heap)?;
        self.release(&item);
        Some(item)
    }

    /// Remove everything, leaving the set empty.
    pub fn take_all(&mut self) -> Vec<WorkItem> {
        self.bounded = 0;
        std::mem::take(&mut self.heap).into_vec()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Items that count against the capacity.
    pub fn bounded_len(&self) -> usize {
        self.bounded
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_task() -> Task {
        Task::new(|| {})
    }

    #[test]
    fn test_highest_priority_first() {
        let mut ready = ReadySet::new();

        ready.push(dummy_task(), Priority::Utility);
        ready.push(dummy_task(), Priority::UserInteractive);
        ready.push(dummy_task(), Priority::Background);
        ready.push(dummy_task(), Priority::UserInitiated);

        assert_eq!(ready.peek(), Some(Priority::UserInteractive));
        let order: Vec<Priority> = std::iter::from_fn(|| ready.pop().map(|i| i.priority)).collect();
        assert_eq!(
            order,
            vec![
                Priority::UserInteractive,
                Priority::UserInitiated,
                Priority::Utility,
                Priority::Background,
            ]
        );
        assert!(ready.is_empty());
    }

    #[test]
    fn test_evict_oldest_takes_first_submitted() {
        let mut ready = ReadySet::new();
        let first = dummy_task();
        let first_id = first.id();

        ready.push(first, Priority::UserInteractive);
        ready.push(dummy_task(), Priority::Background);
        ready.push(dummy_task(), Priority::Utility);

        let evicted = ready.evict_oldest().unwrap();
        assert_eq!(evicted.task.id(), first_id);
        assert_eq!(ready.len(), 2);
        assert_eq!(ready.peek(), Some(Priority::Utility));
    }

    #[test]
    fn test_exempt_items_are_never_evicted() {
        let mut ready = ReadySet::new();
        let continuation = dummy_task();
        let continuation_id = continuation.id();

        ready.push_exempt(continuation, Priority::Utility);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready.bounded_len(), 0);
        assert!(ready.evict_oldest().is_none());

        let plain = dummy_task();
        let plain_id = plain.id();
        ready.push(plain, Priority::Utility);
        assert_eq!(ready.bounded_len(), 1);

        assert_eq!(ready.evict_oldest().unwrap().task.id(), plain_id);
        assert_eq!(ready.bounded_len(), 0);
        assert_eq!(ready.pop().unwrap().task.id(), continuation_id);
        assert!(ready.is_empty());
    }

    #[test]
    fn test_take_all_empties() {
        let mut ready = ReadySet::new();
        for _ in 0..3 {
            ready.push(dummy_task(), Priority::Utility);
        }

        ready.push_exempt(dummy_task(), Priority::Utility);

        assert_eq!(ready.take_all().len(), 4);
        assert!(ready.is_empty());
        assert_eq!(ready.bounded_len(), 0);
        assert!(ready.pop().is_none());
    }
}
