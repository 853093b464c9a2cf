//! Reassembly of the helper's chunked stdout into discrete records.

/// Splits an arbitrarily-chunked byte stream into newline-delimited records.
///
/// A record is only yielded once its trailing delimiter has arrived; the
/// undelimited tail stays buffered for the next feed. No byte is lost and no
/// record is yielded twice across feeds.
#[derive(Debug, Default)]
pub struct RecordFramer {
    buffer: Vec<u8>,
}

impl RecordFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` and drains every complete record, in order. Empty
    /// records (bare newlines) are discarded.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(bytes);

        let mut records = Vec::new();
        let mut start = 0usize;
        while start < self.buffer.len() {
            let Some(offset) = self.buffer[start..].iter().position(|&b| b == b'\n') else {
                break;
            };
            let end = start + offset;
            if end > start {
                records.push(self.buffer[start..end].to_vec());
            }
            start = end + 1;
        }
        if start > 0 {
            self.buffer.drain(..start);
        }
        records
    }

    /// Discards any buffered partial record.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Bytes waiting for their delimiter.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}
