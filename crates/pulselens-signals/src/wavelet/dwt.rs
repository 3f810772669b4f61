//! Daubechies-4 discrete wavelet decomposition (Mallat pyramid).
//!
//! Each level convolves the current approximation with the 4-tap scaling and
//! wavelet filters at stride 2, producing a half-length approximation and a
//! half-length detail sequence. Taps that fall past the end of the signal are
//! dropped rather than wrapped.
//!
//! # Subband layout
//! `details[0]` is the finest scale (highest frequencies). At sample rate `fs`,
//! `details[l]` covers roughly `fs / 2^(l+2) .. fs / 2^(l+1)` Hz and the final
//! approximation everything below `fs / 2^(levels+1)`.

use ndarray::Array1;

use crate::error::{Result, SignalError};

/// Daubechies-4 scaling (low-pass) filter
pub const DB4_SCALING: [f32; 4] = [
    0.482_962_913_144_534_1,
    0.836_516_303_737_807_9,
    0.224_143_868_042_013_4,
    -0.129_409_522_551_260_4,
];

/// Daubechies-4 wavelet (high-pass) filter
pub const DB4_WAVELET: [f32; 4] = [
    -0.129_409_522_551_260_4,
    -0.224_143_868_042_013_4,
    0.836_516_303_737_807_9,
    -0.482_962_913_144_534_1,
];

/// Output of one multi-level decomposition
#[derive(Debug, Clone)]
pub struct WaveletDecomposition {
    /// Detail coefficients per level, finest first
    pub details: Vec<Array1<f32>>,
    /// Final approximation coefficients
    pub approximation: Array1<f32>,
}

impl WaveletDecomposition {
    pub fn levels(&self) -> usize {
        self.details.len()
    }

    /// Every subband: details (finest first) followed by the approximation.
    pub fn bands(&self) -> impl Iterator<Item = &Array1<f32>> {
        self.details.iter().chain(std::iter::once(&self.approximation))
    }

    pub fn band_count(&self) -> usize {
        self.details.len() + 1
    }

    /// Sum of squared coefficients per subband, in `bands()` order.
    pub fn subband_energies(&self) -> Vec<f32> {
        self.bands().map(|band| band.iter().map(|c| c * c).sum()).collect()
    }

    /// Shannon entropy (bits) of the normalised energy distribution across subbands.
    ///
    /// Zero-energy bands contribute nothing; an all-zero decomposition has entropy 0.
    pub fn entropy(&self) -> f32 {
        shannon_entropy(&self.subband_energies())
    }
}

/// `-Σ p·log2(p)` over `energies / Σ energies`.
pub fn shannon_entropy(energies: &[f32]) -> f32 {
    let total: f32 = energies.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    energies
        .iter()
        .map(|&e| e / total)
        .filter(|&p| p > 0.0)
        .map(|p| -p * p.log2())
        .sum()
}

/// One analysis step: `(approximation, detail)`, each `floor(n / 2)` long.
pub fn decompose_step(signal: &Array1<f32>) -> (Array1<f32>, Array1<f32>) {
    let n = signal.len();
    let half = n / 2;
    let mut approx = Array1::zeros(half);
    let mut detail = Array1::zeros(half);

    for i in 0..half {
        let mut sum_a = 0.0;
        let mut sum_d = 0.0;
        for k in 0..4 {
            let idx = 2 * i + k;
            if idx < n {
                sum_a += signal[idx] * DB4_SCALING[k];
                sum_d += signal[idx] * DB4_WAVELET[k];
            }
        }
        approx[i] = sum_a;
        detail[i] = sum_d;
    }

    (approx, detail)
}

/// Decompose `signal` over `levels` levels.
///
/// Requires at least `2^levels` samples so that every level is non-empty.
pub fn decompose(signal: &Array1<f32>, levels: usize) -> Result<WaveletDecomposition> {
    let needed = 1usize << levels;
    if levels == 0 || signal.len() < needed {
        return Err(SignalError::InsufficientSamples {
            needed,
            got: signal.len(),
        });
    }
    if signal.iter().any(|x| !x.is_finite()) {
        return Err(SignalError::NonFiniteInput("wavelet window"));
    }

    let mut details = Vec::with_capacity(levels);
    let mut current = signal.clone();
    for _ in 0..levels {
        let (approx, detail) = decompose_step(&current);
        details.push(detail);
        current = approx;
    }

    Ok(WaveletDecomposition {
        details,
        approximation: current,
    })
}
