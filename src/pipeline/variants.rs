//! Variant generation: one grayscale bitmap → five preprocessed bitmaps.
//!
//! QR detectors are sensitive to local contrast and module-edge sharpness.
//! Running the decoder over several cheap, complementary transforms recovers
//! codes a single fixed transform misses. Every variant derives from the same
//! input; none depends on another's output.
//!
//! | # | Technique | Effect |
//! |---|-----------|--------|
//! | 1 | `original` | input unchanged |
//! | 2 | `threshold` | global cut at 127, output strictly 0/255 |
//! | 3 | `adaptive_threshold` | 11×11 Gaussian-weighted local mean − 2 |
//! | 4 | `gaussian_blur` | 3×3 Gaussian smoothing |
//! | 5 | `equalize_hist` | global histogram equalisation |

use crate::config::ScanConfig;
use crate::output::{Bitmap, Technique};
use image::{GrayImage, Luma};
use imageproc::contrast::{self, equalize_histogram, ThresholdType};
use imageproc::filter::separable_filter_equal;

/// Tunables for the thresholding variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantParams {
    pub threshold: u8,
    pub block_size: u32,
    pub offset: i32,
}

impl Default for VariantParams {
    fn default() -> Self {
        Self {
            threshold: 127,
            block_size: 11,
            offset: 2,
        }
    }
}

impl From<&ScanConfig> for VariantParams {
    fn from(config: &ScanConfig) -> Self {
        Self {
            threshold: config.threshold,
            block_size: config.adaptive_block_size,
            offset: config.adaptive_offset,
        }
    }
}

/// Produce the five variants of `gray`, in [`Technique::ALL`] order.
pub fn generate(gray: &Bitmap, params: &VariantParams) -> Vec<Bitmap> {
    let luma = gray.luma();
    let src: &GrayImage = &luma;
    Technique::ALL
        .iter()
        .map(|&technique| {
            let image = match technique {
                Technique::Original => src.clone(),
                Technique::Threshold => threshold(src, params.threshold),
                Technique::AdaptiveThreshold => {
                    adaptive_threshold(src, params.block_size, params.offset)
                }
                Technique::GaussianBlur => gaussian_blur(src, 3),
                Technique::EqualizeHist => equalize_histogram(src),
            };
            Bitmap::gray(image, technique)
        })
        .collect()
}

/// Pixels strictly above `cut` become 255, the rest 0.
pub fn threshold(src: &GrayImage, cut: u8) -> GrayImage {
    contrast::threshold(src, cut, ThresholdType::Binary)
}

/// Local threshold against the Gaussian-weighted mean of a
/// `block_size`×`block_size` neighbourhood minus `offset`.
pub fn adaptive_threshold(src: &GrayImage, block_size: u32, offset: i32) -> GrayImage {
    let mean = separable_filter_equal(src, &gaussian_kernel(block_size));
    GrayImage::from_fn(src.width(), src.height(), |x, y| {
        let m = mean.get_pixel(x, y)[0] as i32;
        let v = src.get_pixel(x, y)[0] as i32;
        Luma([if v > m - offset { 255 } else { 0 }])
    })
}

/// Gaussian smoothing with a `ksize`×`ksize` kernel.
///
/// Borders replicate the edge pixel (imageproc's padding), not reflect-101,
/// so the outermost row and column can differ slightly from OpenCV output.
pub fn gaussian_blur(src: &GrayImage, ksize: u32) -> GrayImage {
    separable_filter_equal(src, &gaussian_kernel(ksize))
}

/// Normalised 1-D Gaussian kernel of odd length `ksize`.
///
/// Sigma follows the usual "derive from size" rule
/// `0.3·((ksize−1)/2 − 1) + 0.8`; size 3 uses the exact binomial `[¼ ½ ¼]`.
pub fn gaussian_kernel(ksize: u32) -> Vec<f32> {
    if ksize == 3 {
        return vec![0.25, 0.5, 0.25];
    }
    let ksize = ksize.max(1) | 1;
    let sigma = 0.3 * ((ksize as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (ksize / 2) as f64;
    let raw: Vec<f64> = (0..ksize)
        .map(|i| {
            let d = i as f64 - half;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|v| (v / sum) as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap(img: GrayImage) -> Bitmap {
        Bitmap::gray(img, Technique::Original)
    }

    #[test]
    fn generates_five_variants_in_order() {
        let src = GrayImage::from_fn(16, 9, |x, y| Luma([((x * 13 + y * 7) % 256) as u8]));
        let variants = generate(&bitmap(src.clone()), &VariantParams::default());

        let order: Vec<_> = variants.iter().map(|v| v.technique()).collect();
        assert_eq!(order, Technique::ALL.to_vec());
        for v in &variants {
            assert_eq!((v.width(), v.height()), (16, 9));
        }
        assert_eq!(variants[0].luma().as_raw(), src.as_raw());
    }

    #[test]
    fn threshold_is_strictly_binary() {
        let src = GrayImage::from_fn(256, 1, |x, _| Luma([x as u8]));
        let out = threshold(&src, 127);
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert_eq!(out.get_pixel(127, 0)[0], 0);
        assert_eq!(out.get_pixel(128, 0)[0], 255);
    }

    #[test]
    fn adaptive_threshold_uniform_field_is_white() {
        let src = GrayImage::from_pixel(20, 20, Luma([90]));
        let out = adaptive_threshold(&src, 11, 2);
        assert!(out.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn adaptive_threshold_keeps_dark_spot() {
        let mut src = GrayImage::from_pixel(21, 21, Luma([200]));
        src.put_pixel(10, 10, Luma([20]));
        let out = adaptive_threshold(&src, 11, 2);
        assert_eq!(out.get_pixel(10, 10)[0], 0);
        assert_eq!(out.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn adaptive_threshold_survives_illumination_gradient() {
        // Dark square on a left-to-right gradient: a global cut would lose it.
        let mut src = GrayImage::from_fn(40, 40, |x, _| Luma([(60 + x * 4) as u8]));
        for y in 18..22 {
            for x in 30..34 {
                src.put_pixel(x, y, Luma([100]));
            }
        }
        let out = adaptive_threshold(&src, 11, 2);
        assert_eq!(out.get_pixel(31, 19)[0], 0);
    }

    #[test]
    fn blur_spreads_an_impulse() {
        let mut src = GrayImage::from_pixel(5, 5, Luma([0]));
        src.put_pixel(2, 2, Luma([255]));
        let out = gaussian_blur(&src, 3);
        // Each pass truncates to u8: 255 -> 127 -> 63 at the centre.
        assert_eq!(out.get_pixel(2, 2)[0], 63);
        assert_eq!(out.get_pixel(1, 2)[0], 31);
        assert_eq!(out.get_pixel(1, 1)[0], 15);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn blur_replicates_border_pixels() {
        let src = GrayImage::from_raw(3, 1, vec![0, 0, 255]).unwrap();
        let out = gaussian_blur(&src, 3);
        // Replicate: .25*0 + .5*255 + .25*255. Reflect-101 would give 127.
        assert_eq!(out.get_pixel(2, 0)[0], 191);
    }

    #[test]
    fn blur_preserves_uniform_image() {
        let src = GrayImage::from_pixel(7, 3, Luma([77]));
        assert!(gaussian_blur(&src, 3).pixels().all(|p| p[0] == 77));
    }

    #[test]
    fn kernels_are_normalised_and_symmetric() {
        assert_eq!(gaussian_kernel(3), vec![0.25, 0.5, 0.25]);

        let k = gaussian_kernel(11);
        assert_eq!(k.len(), 11);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5, "sum = {sum}");
        for i in 0..5 {
            assert!((k[i] - k[10 - i]).abs() < 1e-7);
            assert!(k[i] < k[i + 1]);
        }
    }

    #[test]
    fn equalize_widens_low_contrast() {
        let src = GrayImage::from_fn(40, 10, |x, _| Luma([100 + (x / 10) as u8]));
        let variants = generate(&bitmap(src), &VariantParams::default());
        let eq = variants[4].luma();
        let min = eq.pixels().map(|p| p[0]).min().unwrap();
        let max = eq.pixels().map(|p| p[0]).max().unwrap();
        assert!(max - min > 100, "range {min}..{max}");
    }

    #[test]
    fn params_follow_config() {
        let config = ScanConfig::builder()
            .threshold(90)
            .adaptive_block_size(15)
            .adaptive_offset(5)
            .build()
            .unwrap();
        let params = VariantParams::from(&config);
        assert_eq!(
            params,
            VariantParams {
                threshold: 90,
                block_size: 15,
                offset: 5
            }
        );
    }
}
