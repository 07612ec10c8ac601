//! Separable gaussian blur kernels.
//!
//! A [`GaussBlurFilter`] holds the tap weights and texel offsets of a 1D
//! gaussian. The same kernel runs twice, once horizontally and once
//! vertically. Taps past the center sit halfway between two texels so
//! bilinear filtering averages a pair of texels per fetch.

use std::f32::consts::PI;

use crate::math::Vec2;

/// Most taps a kernel can hold. Always odd.
pub const MAX_BLUR_SAMPLES: usize = 15;

/// Smallest accepted blur amount. Smaller values would divide by zero.
const MIN_BLUR_AMOUNT: f32 = 0.01;

/// Gaussian tap weights and offsets for a map of a given size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussBlurFilter {
    sample_count: usize,
    blur_amount: f32,
    width: u32,
    height: u32,
    weights: [f32; MAX_BLUR_SAMPLES],
    /// Tap offsets in texels along the blur axis.
    offsets: [f32; MAX_BLUR_SAMPLES],
}

impl GaussBlurFilter {
    /// Build a kernel with `sample_count` taps for a `width` x `height` map.
    ///
    /// Even sample counts are rounded up to the next odd count, and the
    /// result is clamped to `1..=MAX_BLUR_SAMPLES`.
    pub fn new(sample_count: u32, blur_amount: f32, width: u32, height: u32) -> Self {
        let odd = sample_count as usize + 1 - (sample_count as usize % 2);
        let mut filter = Self {
            sample_count: odd.clamp(1, MAX_BLUR_SAMPLES),
            blur_amount: blur_amount.max(MIN_BLUR_AMOUNT),
            width: width.max(1),
            height: height.max(1),
            weights: [0.0; MAX_BLUR_SAMPLES],
            offsets: [0.0; MAX_BLUR_SAMPLES],
        };
        filter.compute();
        filter
    }

    /// Recompute for a new map size, keeping the blur amount.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.compute();
    }

    pub fn set_blur_amount(&mut self, blur_amount: f32) {
        self.blur_amount = blur_amount.max(MIN_BLUR_AMOUNT);
        self.compute();
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn blur_amount(&self) -> f32 {
        self.blur_amount
    }

    pub fn map_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Normalized tap weights. They sum to one.
    pub fn weights(&self) -> &[f32] {
        &self.weights[..self.sample_count]
    }

    /// Tap offsets in texels.
    pub fn texel_offsets(&self) -> &[f32] {
        &self.offsets[..self.sample_count]
    }

    /// Texture coordinate offset of tap `i` for the horizontal pass.
    pub fn offset_x(&self, i: usize) -> Vec2 {
        Vec2::new(self.offsets[i] / self.width as f32, 0.0)
    }

    /// Texture coordinate offset of tap `i` for the vertical pass.
    pub fn offset_y(&self, i: usize) -> Vec2 {
        Vec2::new(0.0, self.offsets[i] / self.height as f32)
    }

    fn gaussian(&self, n: f32) -> f32 {
        let theta = self.blur_amount;
        (1.0 / (2.0 * PI * theta).sqrt()) * (-(n * n) / (2.0 * theta * theta)).exp()
    }

    fn compute(&mut self) {
        self.weights = [0.0; MAX_BLUR_SAMPLES];
        self.offsets = [0.0; MAX_BLUR_SAMPLES];
        self.weights[0] = self.gaussian(0.0);
        let mut total = self.weights[0];

        for i in 0..self.sample_count / 2 {
            let weight = self.gaussian((i + 1) as f32);
            self.weights[i * 2 + 1] = weight;
            self.weights[i * 2 + 2] = weight;
            total += weight * 2.0;

            let offset = i as f32 * 2.0 + 1.5;
            self.offsets[i * 2 + 1] = offset;
            self.offsets[i * 2 + 2] = -offset;
        }

        for weight in &mut self.weights[..self.sample_count] {
            *weight /= total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_count_is_odd_and_clamped() {
        assert_eq!(GaussBlurFilter::new(4, 2.0, 64, 64).sample_count(), 5);
        assert_eq!(GaussBlurFilter::new(7, 2.0, 64, 64).sample_count(), 7);
        assert_eq!(GaussBlurFilter::new(0, 2.0, 64, 64).sample_count(), 1);
        assert_eq!(GaussBlurFilter::new(40, 2.0, 64, 64).sample_count(), MAX_BLUR_SAMPLES);
    }

    #[test]
    fn test_weights_are_normalized_and_symmetric() {
        let filter = GaussBlurFilter::new(15, 3.0, 512, 256);
        let weights = filter.weights();
        assert_eq!(weights.len(), 15);
        assert!((weights.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        for pair in weights[1..].chunks(2) {
            assert_eq!(pair[0], pair[1]);
        }
        // falls off away from the center
        assert!(weights[0] > weights[1]);
        assert!(weights[1] > weights[3]);
    }

    #[test]
    fn test_offsets_step_two_texels_per_tap() {
        let filter = GaussBlurFilter::new(5, 2.0, 100, 50);
        assert_eq!(filter.texel_offsets(), &[0.0, 1.5, -1.5, 3.5, -3.5]);
        assert!((filter.offset_x(1) - Vec2::new(0.015, 0.0)).norm() < 1e-6);
        assert!((filter.offset_y(3) - Vec2::new(0.0, 0.07)).norm() < 1e-6);
    }

    #[test]
    fn test_resize_keeps_weights() {
        let mut filter = GaussBlurFilter::new(9, 2.0, 100, 100);
        let weights = filter.weights().to_vec();
        filter.resize(200, 0);
        assert_eq!(filter.map_size(), (200, 1));
        assert_eq!(filter.weights(), weights.as_slice());
        assert_eq!(filter.offset_x(1), Vec2::new(1.5 / 200.0, 0.0));
    }

    #[test]
    fn test_zero_blur_amount_is_identity() {
        let filter = GaussBlurFilter::new(5, 0.0, 64, 64);
        assert_eq!(filter.weights()[0], 1.0);
        assert!(filter.weights()[1..].iter().all(|w| *w == 0.0));
    }
}
