use super::Lane;
use std::collections::VecDeque;

/// A two lane FIFO queue.
///
/// [`try_dequeue`](AdmissionQueue::try_dequeue) always yields the oldest
/// foreground entry while the foreground lane is non-empty, and only then the
/// oldest background entry. No operation blocks.
#[derive(Debug)]
pub struct AdmissionQueue<T> {
    foreground: VecDeque<T>,
    background: VecDeque<T>,
}

impl<T> AdmissionQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        AdmissionQueue {
            foreground: VecDeque::new(),
            background: VecDeque::new(),
        }
    }

    /// Append `item` to the back of `lane`.
    pub fn enqueue(&mut self, item: T, lane: Lane) {
        self.lane_mut(lane).push_back(item);
    }

    /// Remove and return the next entry by lane priority.
    pub fn try_dequeue(&mut self) -> Option<T> {
        self.foreground
            .pop_front()
            .or_else(|| self.background.pop_front())
    }

    /// The entry [`try_dequeue`](AdmissionQueue::try_dequeue) would return.
    pub fn peek(&self) -> Option<&T> {
        self.foreground.front().or_else(|| self.background.front())
    }

    /// Remove and return the oldest entry of `lane` only.
    pub fn pop_oldest(&mut self, lane: Lane) -> Option<T> {
        self.lane_mut(lane).pop_front()
    }

    /// Remove the first entry matching `predicate`, keeping the relative order
    /// of every other entry.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        for lane in [&mut self.foreground, &mut self.background] {
            if let Some(index) = lane.iter().position(&mut predicate) {
                return lane.remove(index);
            }
        }
        None
    }

    /// Remove every entry, foreground lane first.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.foreground.drain(..).chain(self.background.drain(..))
    }

    /// The number of entries in `lane`.
    pub fn lane_len(&self, lane: Lane) -> usize {
        match lane {
            Lane::Foreground => self.foreground.len(),
            Lane::Background => self.background.len(),
        }
    }

    /// The total number of entries across both lanes.
    pub fn len(&self) -> usize {
        self.foreground.len() + self.background.len()
    }

    /// Returns `true` if both lanes are empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lane_mut(&mut self, lane: Lane) -> &mut VecDeque<T> {
        match lane {
            Lane::Foreground => &mut self.foreground,
            Lane::Background => &mut self.background,
        }
    }
}

impl<T> Default for AdmissionQueue<T> {
    fn default() -> Self {
        AdmissionQueue::new()
    }
}
