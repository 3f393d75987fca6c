//! Worker capacity: runner slots plus a FIFO wait queue.
//!
//! A slot is held from admission until the runner process of that run has
//! been reaped. Slot holders remember the pid they were assigned so an exit
//! of a superseded process never frees the slot of its successor.

use std::collections::{HashMap, VecDeque};

use checkgrid_state::RunId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Granted,
    /// Queued at this 1-based position.
    Queued(usize),
}

#[derive(Debug)]
pub struct Slots {
    capacity: usize,
    /// Slot holders and the pid of their process once spawned.
    holders: HashMap<RunId, Option<u32>>,
    queue: VecDeque<RunId>,
}

impl Slots {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            holders: HashMap::new(),
            queue: VecDeque::new(),
        }
    }

    /// Claim a slot for `run_id`, or join the queue. A run that still holds
    /// its slot keeps it.
    pub fn acquire(&mut self, run_id: RunId) -> Admission {
        if self.holders.contains_key(&run_id) {
            return Admission::Granted;
        }
        if self.holders.len() < self.capacity {
            self.holders.insert(run_id, None);
            return Admission::Granted;
        }
        let position = match self.queue.iter().position(|id| *id == run_id) {
            Some(i) => i + 1,
            None => {
                self.queue.push_back(run_id);
                self.queue.len()
            }
        };
        Admission::Queued(position)
    }

    pub fn assign(&mut self, run_id: RunId, pid: u32) {
        self.holders.insert(run_id, Some(pid));
    }

    /// Free the slot held by process `pid` of `run_id`.
    pub fn release(&mut self, run_id: RunId, pid: u32) -> bool {
        if self.holders.get(&run_id) == Some(&Some(pid)) {
            self.holders.remove(&run_id);
            true
        } else {
            false
        }
    }

    /// Free a slot that never got a process.
    pub fn release_unspawned(&mut self, run_id: RunId) -> bool {
        if self.holders.get(&run_id) == Some(&None) {
            self.holders.remove(&run_id);
            true
        } else {
            false
        }
    }

    /// Remove `run_id` from the wait queue.
    pub fn cancel(&mut self, run_id: RunId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|id| *id != run_id);
        self.queue.len() != before
    }

    /// Pop the next queued run into a free slot.
    pub fn next(&mut self) -> Option<RunId> {
        if self.holders.len() >= self.capacity {
            return None;
        }
        let run_id = self.queue.pop_front()?;
        self.holders.insert(run_id, None);
        Some(run_id)
    }

    pub fn is_queued(&self, run_id: RunId) -> bool {
        self.queue.contains(&run_id)
    }

    pub fn in_use(&self) -> usize {
        self.holders.len()
    }

    pub fn queued(&self) -> Vec<RunId> {
        self.queue.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queues_beyond_capacity_in_fifo_order() {
        let mut slots = Slots::new(1);
        assert_eq!(slots.acquire(1), Admission::Granted);
        assert_eq!(slots.acquire(2), Admission::Queued(1));
        assert_eq!(slots.acquire(3), Admission::Queued(2));
        assert_eq!(slots.acquire(2), Admission::Queued(1));

        assert_eq!(slots.next(), None);
        slots.assign(1, 100);
        assert!(slots.release(1, 100));
        assert_eq!(slots.next(), Some(2));
        assert_eq!(slots.next(), None);
        assert_eq!(slots.queued(), vec![3]);
    }

    #[test]
    fn stale_pid_does_not_free_slot() {
        let mut slots = Slots::new(1);
        slots.acquire(1);
        slots.assign(1, 100);

        // Restart reuses the slot with a new process.
        assert_eq!(slots.acquire(1), Admission::Granted);
        slots.assign(1, 200);
        assert!(!slots.release(1, 100));
        assert_eq!(slots.in_use(), 1);
        assert!(slots.release(1, 200));
        assert_eq!(slots.in_use(), 0);
    }

    #[test]
    fn unspawned_and_cancelled() {
        let mut slots = Slots::new(1);
        slots.acquire(1);
        slots.acquire(2);
        assert!(slots.is_queued(2));
        assert!(slots.cancel(2));
        assert!(!slots.cancel(2));

        assert!(slots.release_unspawned(1));
        assert!(!slots.release_unspawned(1));
        assert_eq!(slots.in_use(), 0);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut slots = Slots::new(0);
        assert_eq!(slots.acquire(1), Admission::Granted);
    }
}
