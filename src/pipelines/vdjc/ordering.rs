//! Order reconstruction for results produced out of order by the worker pool.
//!
//! Items carry a contiguous `u64` index, the sequence number the dispatcher
//! assigned to their read. `OrderBuffer` holds early arrivals until the item
//! at the cursor shows up; `OrderedReceiver` drives a buffer from a channel
//! and yields items in ascending index order.

use crossbeam_channel::Receiver;
use std::collections::{btree_map, BTreeMap};

/// Item with a position in the original input order
pub trait Indexed {
    fn index(&self) -> u64;
}

impl<T> Indexed for (u64, T) {
    fn index(&self) -> u64 {
        self.0
    }
}

/// Reorders items by index, releasing each one as soon as every item before
/// it has been released.
#[derive(Debug)]
pub struct OrderBuffer<T> {
    pending: BTreeMap<u64, T>,
    next_index: u64,
    peak: usize,
}

impl<T: Indexed> OrderBuffer<T> {
    pub fn new(first_index: u64) -> Self {
        Self {
            pending: BTreeMap::new(),
            next_index: first_index,
            peak: 0,
        }
    }

    /// Buffer an item.
    ///
    /// An item whose index was already released, or is already buffered, is
    /// handed back to be released immediately.
    pub fn insert(&mut self, item: T) -> Option<T> {
        let index = item.index();
        if index < self.next_index {
            log::warn!(
                "Result {} arrived after result {} was released; emitting out of order",
                index,
                self.next_index - 1
            );
            return Some(item);
        }
        match self.pending.entry(index) {
            btree_map::Entry::Occupied(_) => {
                log::warn!("Duplicate result index {}; emitting out of order", index);
                Some(item)
            }
            btree_map::Entry::Vacant(slot) => {
                slot.insert(item);
                self.peak = self.peak.max(self.pending.len());
                None
            }
        }
    }

    /// Release the item at the cursor, if it has arrived
    pub fn pop_ready(&mut self) -> Option<T> {
        let item = self.pending.remove(&self.next_index)?;
        self.next_index += 1;
        Some(item)
    }

    /// Take every buffered item in ascending order, skipping over gaps
    pub fn drain(&mut self) -> btree_map::IntoValues<u64, T> {
        if let Some((&last, _)) = self.pending.last_key_value() {
            self.next_index = last + 1;
        }
        std::mem::take(&mut self.pending).into_values()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Largest number of items buffered at once
    pub fn peak(&self) -> usize {
        self.peak
    }

    pub fn next_index(&self) -> u64 {
        self.next_index
    }
}

/// Iterator over a results channel in index order.
///
/// Blocks while the next index is outstanding. When the channel closes with
/// items still buffered (a gap in the indices) they are released in
/// ascending order after a warning.
pub struct OrderedReceiver<T> {
    rx: Receiver<T>,
    buffer: OrderBuffer<T>,
    leftovers: Option<btree_map::IntoValues<u64, T>>,
}

impl<T: Indexed> OrderedReceiver<T> {
    pub fn new(rx: Receiver<T>, first_index: u64) -> Self {
        Self {
            rx,
            buffer: OrderBuffer::new(first_index),
            leftovers: None,
        }
    }

    pub fn peak_buffered(&self) -> usize {
        self.buffer.peak()
    }
}

impl<T: Indexed> Iterator for OrderedReceiver<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            if let Some(rest) = self.leftovers.as_mut() {
                return rest.next();
            }
            if let Some(item) = self.buffer.pop_ready() {
                return Some(item);
            }
            match self.rx.recv() {
                Ok(item) => {
                    if let Some(released) = self.buffer.insert(item) {
                        return Some(released);
                    }
                }
                Err(_) => {
                    if !self.buffer.is_empty() {
                        log::warn!(
                            "Result {} never arrived; releasing {} buffered results in index order",
                            self.buffer.next_index(),
                            self.buffer.len()
                        );
                    }
                    self.leftovers = Some(self.buffer.drain());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn indices<I: Iterator<Item = (u64, char)>>(items: I) -> Vec<u64> {
        items.map(|(i, _)| i).collect()
    }

    #[test]
    fn test_buffer_releases_in_order() {
        let mut buffer = OrderBuffer::new(0);
        assert!(buffer.insert((2, 'c')).is_none());
        assert!(buffer.insert((1, 'b')).is_none());
        assert!(buffer.pop_ready().is_none());
        assert!(buffer.insert((0, 'a')).is_none());

        let released: Vec<char> = std::iter::from_fn(|| buffer.pop_ready()).map(|(_, c)| c).collect();
        assert_eq!(released, vec!['a', 'b', 'c']);
        assert_eq!(buffer.peak(), 3);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_buffer_starts_at_first_index() {
        let mut buffer = OrderBuffer::new(100);
        buffer.insert((101, 'b'));
        buffer.insert((100, 'a'));
        assert_eq!(buffer.pop_ready(), Some((100, 'a')));
        assert_eq!(buffer.pop_ready(), Some((101, 'b')));
        assert_eq!(buffer.next_index(), 102);
    }

    #[test]
    fn test_duplicates_and_late_items_pass_through() {
        let mut buffer = OrderBuffer::new(0);
        buffer.insert((1, 'x'));
        assert_eq!(buffer.insert((1, 'y')), Some((1, 'y')));
        buffer.insert((0, 'a'));
        buffer.pop_ready();
        assert_eq!(buffer.insert((0, 'z')), Some((0, 'z')));
    }

    #[test]
    fn test_receiver_reorders_channel() {
        let (tx, rx) = unbounded();
        for i in [3u64, 0, 4, 2, 1, 5] {
            tx.send((i, 'r')).unwrap();
        }
        drop(tx);
        let mut ordered = OrderedReceiver::new(rx, 0);
        assert_eq!(indices(ordered.by_ref()), vec![0, 1, 2, 3, 4, 5]);
        assert!(ordered.peak_buffered() >= 1);
    }

    #[test]
    fn test_receiver_flushes_after_gap() {
        let (tx, rx) = unbounded();
        for i in [0u64, 5, 2, 1] {
            tx.send((i, 'r')).unwrap();
        }
        drop(tx);
        let ordered = OrderedReceiver::new(rx, 0);
        assert_eq!(indices(ordered), vec![0, 1, 2, 5]);
    }

    #[test]
    fn test_receiver_across_threads() {
        let (tx, rx) = crossbeam_channel::bounded(4);
        let producer = std::thread::spawn(move || {
            // Pairs swapped: 1,0,3,2,...
            for i in 0..50u64 {
                let index = i ^ 1;
                tx.send((index, 'r')).unwrap();
            }
        });
        let ordered = OrderedReceiver::new(rx, 0);
        assert_eq!(indices(ordered), (0..50).collect::<Vec<_>>());
        producer.join().unwrap();
    }
}
