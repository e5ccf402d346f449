use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Bins the player draws
pub const DEFAULT_BINS: usize = 64;

/// Magnitude spectrum of a visualization snapshot
///
/// Runs a forward FFT over the snapshot (zero padded or truncated to the
/// FFT size) and keeps the magnitudes of the lowest `bins` bins. Buffers
/// are allocated once; `analyze` itself does not allocate.
pub struct SpectrumAnalyzer {
    fft_size: usize,
    bins: usize,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl SpectrumAnalyzer {
    pub fn new(fft_size: usize, bins: usize) -> Self {
        let fft_size = fft_size.max(2);
        let bins = bins.clamp(1, fft_size / 2 + 1);
        let fft = FftPlanner::new().plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            fft_size,
            bins,
            fft,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
            magnitudes: vec![0.0; bins],
        }
    }

    /// Analyze the most recent `fft_size` samples and return bin magnitudes
    pub fn analyze(&mut self, samples: &[f32]) -> &[f32] {
        let start = samples.len().saturating_sub(self.fft_size);
        let input = &samples[start..];

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = input.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(if sample.is_finite() { sample } else { 0.0 }, 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (magnitude, bin) in self.magnitudes.iter_mut().zip(&self.buffer) {
            *magnitude = bin.norm();
        }
        &self.magnitudes
    }

    /// Get the frequency for a given bin index
    pub fn bin_to_frequency(&self, bin: usize, sample_rate: u32) -> f32 {
        bin as f32 * sample_rate as f32 / self.fft_size as f32
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn bins(&self) -> usize {
        self.bins
    }
}

/// Convert magnitudes to dB for display
pub fn to_decibels(magnitudes: &[f32]) -> Vec<f32> {
    magnitudes
        .iter()
        .map(|&mag| 20.0 * (mag + 1e-10).log10())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_peaks_in_its_bin() {
        let fft_size = 256;
        let mut analyzer = SpectrumAnalyzer::new(fft_size, DEFAULT_BINS);
        // Exactly 8 cycles across the window lands in bin 8
        let samples: Vec<f32> = (0..fft_size)
            .map(|i| (2.0 * std::f32::consts::PI * 8.0 * i as f32 / fft_size as f32).sin())
            .collect();

        let magnitudes = analyzer.analyze(&samples).to_vec();
        assert_eq!(magnitudes.len(), DEFAULT_BINS);
        let peak_bin = magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak_bin, 8);
        assert!((magnitudes[8] - fft_size as f32 / 2.0).abs() < 1e-2);
    }

    #[test]
    fn test_silence_is_flat_zero() {
        let mut analyzer = SpectrumAnalyzer::new(256, 64);
        assert!(analyzer.analyze(&[0.0; 256]).iter().all(|&m| m == 0.0));
    }

    #[test]
    fn test_short_input_is_zero_padded() {
        let mut analyzer = SpectrumAnalyzer::new(256, 64);
        let magnitudes = analyzer.analyze(&[1.0; 16]);
        // DC bin holds the sum of the input
        assert!((magnitudes[0] - 16.0).abs() < 1e-4);
    }

    #[test]
    fn test_bin_frequency() {
        let analyzer = SpectrumAnalyzer::new(256, 64);
        assert_eq!(analyzer.bin_to_frequency(1, 22050), 22050.0 / 256.0);
    }

    #[test]
    fn test_decibels() {
        let db = to_decibels(&[1.0, 10.0]);
        assert!(db[0].abs() < 1e-4);
        assert!((db[1] - 20.0).abs() < 1e-4);
    }
}
