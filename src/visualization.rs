use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

#[cfg(feature = "visualization")]
pub mod spectrum;

#[cfg(feature = "visualization")]
pub use spectrum::SpectrumAnalyzer;

/// Lock-free circular buffer of the most recent rendered samples
///
/// The audio thread is the only writer; any number of readers may take
/// snapshots. A snapshot taken while the writer is mid-block can mix old and
/// new samples, which is fine for drawing a spectrum.
pub struct VisualizationSink {
    slots: Box<[AtomicU32]>,
    head: AtomicUsize,
}

impl VisualizationSink {
    /// Create a new sink with the given capacity (at least 1)
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity.max(1))
            .map(|_| AtomicU32::new(0.0f32.to_bits()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            head: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Append one sample, overwriting the oldest (audio thread only)
    #[inline]
    pub fn push(&self, sample: f32) {
        let head = self.head.load(Ordering::Relaxed);
        self.slots[head % self.slots.len()].store(sample.to_bits(), Ordering::Relaxed);
        self.head.store(head.wrapping_add(1), Ordering::Release);
    }

    /// Zero every slot (audio thread only, e.g. when a new track arrives)
    pub fn clear(&self) {
        for slot in self.slots.iter() {
            slot.store(0.0f32.to_bits(), Ordering::Relaxed);
        }
        self.head.store(0, Ordering::Release);
    }

    /// Total samples pushed since the last clear (wraps on overflow)
    pub fn written(&self) -> usize {
        self.head.load(Ordering::Acquire)
    }

    /// Copy the ring into `out`, oldest sample first
    pub fn snapshot_into(&self, out: &mut Vec<f32>) {
        let capacity = self.slots.len();
        let head = self.head.load(Ordering::Acquire);
        out.clear();
        out.extend((0..capacity).map(|offset| {
            let index = head.wrapping_add(offset) % capacity;
            f32::from_bits(self.slots[index].load(Ordering::Relaxed))
        }));
    }

    /// Get a snapshot of current samples, oldest first
    pub fn snapshot(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.slots.len());
        self.snapshot_into(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_snapshot_is_oldest_first() {
        let sink = VisualizationSink::new(4);
        for i in 1..=6 {
            sink.push(i as f32);
        }
        assert_eq!(sink.snapshot(), vec![3.0, 4.0, 5.0, 6.0]);
        assert_eq!(sink.written(), 6);
    }

    #[test]
    fn test_partial_fill_keeps_zeros_in_front() {
        let sink = VisualizationSink::new(4);
        sink.push(0.5);
        sink.push(-0.5);
        assert_eq!(sink.snapshot(), vec![0.0, 0.0, 0.5, -0.5]);
    }

    #[test]
    fn test_clear() {
        let sink = VisualizationSink::new(8);
        for _ in 0..20 {
            sink.push(1.0);
        }
        sink.clear();
        assert!(sink.snapshot().iter().all(|&s| s == 0.0));
        assert_eq!(sink.written(), 0);
    }

    #[test]
    fn test_zero_capacity_is_bumped() {
        let sink = VisualizationSink::new(0);
        assert_eq!(sink.capacity(), 1);
        sink.push(0.25);
        assert_eq!(sink.snapshot(), vec![0.25]);
    }

    #[test]
    fn test_concurrent_reader_sees_only_written_values() {
        let sink = Arc::new(VisualizationSink::new(256));
        let writer = {
            let sink = sink.clone();
            std::thread::spawn(move || {
                for i in 0..100_000 {
                    sink.push((i % 7) as f32);
                }
            })
        };

        let mut snapshot = Vec::new();
        for _ in 0..1000 {
            sink.snapshot_into(&mut snapshot);
            assert_eq!(snapshot.len(), 256);
            assert!(snapshot.iter().all(|&s| (0.0..7.0).contains(&s)));
        }
        writer.join().unwrap();
    }
}
