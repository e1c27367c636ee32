//! Operation log for the simulated device
//!
//! A bounded history of human-readable operation descriptions:
//! - Fixed capacity, oldest entries silently overwritten
//! - Messages truncated to `LOG_MESSAGE_LEN` bytes
//! - Purely observational; allocation decisions never read it

mod ring_buffer;

pub use ring_buffer::RingBuffer;

/// Default number of retained log entries
pub const DEFAULT_LOG_CAPACITY: usize = 1024;

/// Maximum length of a single log message in bytes
pub const LOG_MESSAGE_LEN: usize = 128;

/// Bounded log of recent operations
#[derive(Debug, Clone)]
pub struct OperationLog {
    ring_buffer: RingBuffer<String>,
}

impl OperationLog {
    /// Create a new log retaining at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        OperationLog {
            ring_buffer: RingBuffer::new(capacity),
        }
    }

    /// Append a message, truncating it to `LOG_MESSAGE_LEN` bytes
    pub fn record(&mut self, message: impl Into<String>) {
        let mut message = message.into();
        truncate_on_char_boundary(&mut message, LOG_MESSAGE_LEN);
        tracing::trace!("oplog: {}", message);
        self.ring_buffer.write(message);
    }

    /// Retained entries, oldest first
    pub fn entries(&self) -> Vec<String> {
        self.ring_buffer.to_vec()
    }

    pub fn len(&self) -> usize {
        self.ring_buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring_buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring_buffer.capacity()
    }

    pub fn clear(&mut self) {
        self.ring_buffer.clear();
    }

    /// Replace the contents with previously persisted entries
    ///
    /// Only the newest `capacity` entries survive.
    pub fn restore<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.clear();
        for entry in entries {
            self.record(entry);
        }
    }
}

impl Default for OperationLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

fn truncate_on_char_boundary(s: &mut String, max_len: usize) {
    if s.len() <= max_len {
        return;
    }
    let mut cut = max_len;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_entries() {
        let mut log = OperationLog::new(4);
        log.record("reset");
        log.record(format!("allocate_contiguous: id={} size={}", 1, 5));

        assert_eq!(
            log.entries(),
            vec!["reset".to_string(), "allocate_contiguous: id=1 size=5".to_string()]
        );
    }

    #[test]
    fn test_oldest_entries_overwritten() {
        let mut log = OperationLog::new(3);
        for i in 0..5 {
            log.record(format!("op {}", i));
        }

        assert_eq!(log.len(), 3);
        assert_eq!(log.entries(), vec!["op 2", "op 3", "op 4"]);
    }

    #[test]
    fn test_long_messages_truncated() {
        let mut log = OperationLog::new(2);
        log.record("x".repeat(500));
        assert_eq!(log.entries()[0].len(), LOG_MESSAGE_LEN);

        // multi-byte characters are never split
        log.record("é".repeat(100));
        let entry = &log.entries()[1];
        assert!(entry.len() <= LOG_MESSAGE_LEN);
        assert!(entry.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_restore_keeps_newest() {
        let mut log = OperationLog::new(2);
        log.record("stale");
        log.restore(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(log.entries(), vec!["b", "c"]);
    }
}
