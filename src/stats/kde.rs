//! Gaussian kernel density estimate (violin bodies, histogram overlay)

use super::std_dev;

/// Gaussian KDE with Scott's rule bandwidth
#[derive(Debug, Clone)]
pub struct GaussianKde {
    samples: Vec<f64>,
    bandwidth: f64,
}

impl GaussianKde {
    /// Build a KDE from samples
    ///
    /// Returns `None` with fewer than two samples or zero spread.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(samples: &[f64]) -> Option<Self> {
        let sd = std_dev(samples, 1)?;
        if sd <= 0.0 || !sd.is_finite() {
            return None;
        }
        let bandwidth = sd * (samples.len() as f64).powf(-0.2);
        Some(Self {
            samples: samples.to_vec(),
            bandwidth,
        })
    }

    /// Kernel bandwidth
    #[must_use]
    pub const fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    /// Density at `x`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn density(&self, x: f64) -> f64 {
        let norm = self.samples.len() as f64 * self.bandwidth * (2.0 * std::f64::consts::PI).sqrt();
        self.samples
            .iter()
            .map(|s| {
                let z = (x - s) / self.bandwidth;
                (-0.5 * z * z).exp()
            })
            .sum::<f64>()
            / norm
    }
}
