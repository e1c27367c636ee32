//! Bounded ring buffer that keeps the most recent entries
//!
//! Writes never fail: once the buffer is full the oldest entry is
//! overwritten. Single-owner, so no atomics are needed.

/// Fixed-capacity ring buffer
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    /// Ring buffer storage
    buffer: Vec<Option<T>>,
    /// Buffer capacity
    capacity: usize,
    /// Write position (monotonically increasing)
    write_pos: usize,
}

impl<T: Clone> RingBuffer<T> {
    /// Create a new ring buffer with given capacity
    ///
    /// # Panics
    /// Panics if capacity is 0
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");

        RingBuffer {
            buffer: vec![None; capacity],
            capacity,
            write_pos: 0,
        }
    }

    /// Append a value, overwriting the oldest one when full
    pub fn write(&mut self, value: T) {
        let index = self.write_pos % self.capacity;
        self.buffer[index] = Some(value);
        self.write_pos += 1;
    }

    /// Retained entries, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        let count = self.len();
        let first = self.write_pos - count;

        (first..self.write_pos)
            .filter_map(|pos| self.buffer[pos % self.capacity].clone())
            .collect()
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.write_pos.min(self.capacity)
    }

    pub fn is_empty(&self) -> bool {
        self.write_pos == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buffer.iter_mut().for_each(|slot| *slot = None);
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_creation() {
        let rb: RingBuffer<u64> = RingBuffer::new(16);
        assert_eq!(rb.capacity(), 16);
        assert_eq!(rb.len(), 0);
        assert!(rb.is_empty());
    }

    #[test]
    fn test_write_and_read_in_order() {
        let mut rb = RingBuffer::new(8);
        rb.write(42);
        rb.write(100);
        rb.write(200);

        assert_eq!(rb.len(), 3);
        assert_eq!(rb.to_vec(), vec![42, 100, 200]);
    }

    #[test]
    fn test_buffer_wraparound_keeps_newest() {
        let mut rb = RingBuffer::new(8);
        for i in 0..20 {
            rb.write(i);
        }

        assert_eq!(rb.len(), 8);
        assert_eq!(rb.to_vec(), (12..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_clear() {
        let mut rb = RingBuffer::new(4);
        rb.write(1);
        rb.write(2);
        rb.clear();

        assert!(rb.is_empty());
        assert!(rb.to_vec().is_empty());
    }

    #[test]
    #[should_panic(expected = "Capacity must be greater than 0")]
    fn test_zero_capacity_panics() {
        let _rb: RingBuffer<u64> = RingBuffer::new(0);
    }
}
