//! Fixed-capacity circular buffer used to slice the microphone stream into
//! exact wire-sized frames.
//!
//! The capture device delivers blocks of whatever size the hardware prefers;
//! the transport wants frames of exactly `frame_samples`.  [`RingBuffer`]
//! sits between the two: blocks are pushed in, complete frames are popped
//! out in capture order via [`pop_frame`](RingBuffer::pop_frame).
//!
//! When the buffer is full, new samples **overwrite** the oldest data so the
//! most-recent `capacity` samples are always available — the freshest audio
//! wins when the consumer stalls.  Overwritten samples are counted in
//! [`overrun`](RingBuffer::overrun) so stalls show up in the logs instead of
//! passing silently.
//!
//! # Example
//!
//! ```rust
//! use voice_live::audio::RingBuffer;
//!
//! let mut buf = RingBuffer::new(8);
//! buf.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]);
//!
//! let frame = buf.pop_frame(4).unwrap();
//! assert_eq!(frame, vec![1.0, 2.0, 3.0, 4.0]);
//! assert_eq!(buf.len(), 1); // 5.0 is still waiting for a full frame
//! ```

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity circular buffer with frame-sized reads.
///
/// Generic over `T: Copy + Default` though the capture pipeline uses
/// `RingBuffer<f32>` exclusively.
///
/// ## Overflow behaviour
///
/// When [`push_slice`](Self::push_slice) would exceed `capacity`, the oldest
/// samples are overwritten and counted.  The buffer never allocates beyond
/// its initial capacity.
pub struct RingBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
    /// Index of the *next* write position (wraps around `capacity`).
    write_pos: usize,
    /// Number of valid samples currently stored (≤ `capacity`).
    len: usize,
    /// Cumulative count of samples overwritten before they were read.
    overrun: u64,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a new ring buffer with the given `capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            buf: vec![T::default(); capacity],
            capacity,
            write_pos: 0,
            len: 0,
            overrun: 0,
        }
    }

    /// Append `data`, overwriting (and counting) the oldest samples when the
    /// buffer is full.
    pub fn push_slice(&mut self, data: &[T]) {
        for &item in data {
            self.buf[self.write_pos] = item;
            self.write_pos = (self.write_pos + 1) % self.capacity;
            if self.len < self.capacity {
                self.len += 1;
            } else {
                self.overrun += 1;
            }
        }
    }

    /// Remove and return the oldest `frame_len` samples, or `None` when fewer
    /// are buffered.
    ///
    /// Repeated calls yield consecutive, non-overlapping frames in the exact
    /// order the samples were pushed.
    pub fn pop_frame(&mut self, frame_len: usize) -> Option<Vec<T>> {
        if frame_len == 0 || self.len < frame_len {
            return None;
        }

        let read_pos = self.read_pos();
        let mut frame = Vec::with_capacity(frame_len);
        for i in 0..frame_len {
            frame.push(self.buf[(read_pos + i) % self.capacity]);
        }
        self.len -= frame_len;
        Some(frame)
    }

    /// Drain all stored samples in chronological order and reset the buffer.
    pub fn drain(&mut self) -> Vec<T> {
        if self.len == 0 {
            return Vec::new();
        }

        let read_pos = self.read_pos();
        let mut result = Vec::with_capacity(self.len);
        for i in 0..self.len {
            result.push(self.buf[(read_pos + i) % self.capacity]);
        }

        self.clear();
        result
    }

    /// Discard all samples and reset the write position.
    ///
    /// The [`overrun`](Self::overrun) counter is cumulative and survives a
    /// clear.
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }

    /// Number of valid samples currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when the buffer contains no samples.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of samples the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cumulative count of samples lost to overwriting since construction.
    pub fn overrun(&self) -> u64 {
        self.overrun
    }

    /// Index of the oldest valid sample.
    fn read_pos(&self) -> usize {
        (self.write_pos + self.capacity - self.len) % self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Basic push / pop --------------------------------------------------

    #[test]
    fn pop_frame_returns_samples_in_push_order() {
        let mut buf = RingBuffer::new(8);
        buf.push_slice(&[1.0_f32, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(buf.pop_frame(4), Some(vec![1.0, 2.0, 3.0, 4.0]));
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn pop_frame_with_insufficient_samples_returns_none() {
        let mut buf = RingBuffer::new(8);
        buf.push_slice(&[1.0_f32, 2.0]);

        assert_eq!(buf.pop_frame(4), None);
        // The buffered samples are untouched.
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn pop_zero_length_frame_returns_none() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1.0_f32]);
        assert_eq!(buf.pop_frame(0), None);
    }

    #[test]
    fn consecutive_frames_do_not_overlap() {
        let mut buf = RingBuffer::new(16);
        buf.push_slice(&[1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);

        assert_eq!(buf.pop_frame(3), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(buf.pop_frame(3), Some(vec![4.0, 5.0, 6.0]));
        assert_eq!(buf.pop_frame(3), None);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn interleaved_push_and_pop_preserve_order() {
        let mut buf = RingBuffer::new(6);

        buf.push_slice(&[1.0_f32, 2.0, 3.0, 4.0]);
        assert_eq!(buf.pop_frame(2), Some(vec![1.0, 2.0]));

        buf.push_slice(&[5.0, 6.0, 7.0]);
        assert_eq!(buf.pop_frame(2), Some(vec![3.0, 4.0]));
        assert_eq!(buf.pop_frame(2), Some(vec![5.0, 6.0]));
        assert_eq!(buf.len(), 1);
    }

    // ---- Overflow (oldest sample discarded) --------------------------------

    #[test]
    fn overflow_drops_oldest_and_counts() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0]);

        assert_eq!(buf.len(), 4);
        assert_eq!(buf.overrun(), 2);
        assert_eq!(buf.drain(), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn pop_frame_after_overflow_starts_at_oldest_surviving_sample() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1.0_f32, 2.0, 3.0, 4.0, 5.0]); // 1.0 overwritten

        assert_eq!(buf.pop_frame(2), Some(vec![2.0, 3.0]));
    }

    // ---- Drain / clear semantics -------------------------------------------

    #[test]
    fn drain_empties_the_buffer() {
        let mut buf = RingBuffer::new(4);
        buf.push_slice(&[1.0_f32, 2.0]);

        assert_eq!(buf.drain(), vec![1.0, 2.0]);
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_empty_returns_empty_vec() {
        let mut buf: RingBuffer<f32> = RingBuffer::new(4);
        assert_eq!(buf.drain(), Vec::<f32>::new());
    }

    #[test]
    fn clear_keeps_cumulative_overrun() {
        let mut buf = RingBuffer::new(2);
        buf.push_slice(&[1.0_f32, 2.0, 3.0]); // one overrun
        buf.clear();

        assert!(buf.is_empty());
        assert_eq!(buf.overrun(), 1);

        buf.push_slice(&[9.0_f32]);
        assert_eq!(buf.drain(), vec![9.0]);
    }

    // ---- Panic guard -------------------------------------------------------

    #[test]
    #[should_panic(expected = "RingBuffer capacity must be > 0")]
    fn zero_capacity_panics() {
        let _buf: RingBuffer<f32> = RingBuffer::new(0);
    }
}
