//! Image preprocessing for the recognition model
//!
//! Scales a drawing to model height, composites it over an opaque black
//! canvas of the fixed model width, and converts it to a normalized NCHW
//! tensor. Transparent regions end up black.

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage, Rgba, RgbaImage};
use ndarray::Array4;
use tracing::debug;

use crate::config::PreprocessSettings;
use crate::error::RenderError;

/// Model input height
pub const REC_HEIGHT: u32 = 48;
/// Model input width
pub const REC_WIDTH: u32 = 320;

/// Preprocessing configuration
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// Target height for the recognition model
    pub rec_target_height: u32,
    /// Fixed padded width for the recognition model
    pub rec_max_width: u32,
    /// Mean values for normalization [R, G, B]
    pub mean: [f32; 3],
    /// Std values for normalization [R, G, B]
    pub std: [f32; 3],
    /// Resampling filter used when scaling to target height
    pub filter: FilterType,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            rec_target_height: REC_HEIGHT,
            rec_max_width: REC_WIDTH,
            // (pixel / 255.0 - 0.5) / 0.5 maps [0, 255] -> [-1, 1]
            mean: [0.5, 0.5, 0.5],
            std: [0.5, 0.5, 0.5],
            filter: FilterType::Triangle,
        }
    }
}

impl From<&PreprocessSettings> for PreprocessConfig {
    fn from(settings: &PreprocessSettings) -> Self {
        Self {
            filter: settings.filter.into(),
            ..Default::default()
        }
    }
}

/// Width the image occupies after scaling to `target_height`
///
/// `ceil(target_height * width / height)`, clamped to `[1, max_width]`.
pub fn target_width(width: u32, height: u32, target_height: u32, max_width: u32) -> u32 {
    let scaled = (u64::from(target_height) * u64::from(width)).div_ceil(u64::from(height.max(1)));
    scaled.clamp(1, u64::from(max_width)) as u32
}

/// Scale the image to model height and alpha-composite it over an opaque
/// black canvas of model width
pub fn render_padded(image: &DynamicImage, config: &PreprocessConfig) -> Result<RgbImage, RenderError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(RenderError::new(format!(
            "cannot draw a {}x{} image",
            width, height
        )));
    }

    let target_w = target_width(width, height, config.rec_target_height, config.rec_max_width);
    debug!(
        "Scaling {}x{} drawing to {}x{} (canvas {}x{})",
        width, height, target_w, config.rec_target_height, config.rec_max_width, config.rec_target_height
    );

    let rgba = image.to_rgba8();
    let resized = imageops::resize(&rgba, target_w, config.rec_target_height, config.filter);

    let mut canvas = RgbaImage::from_pixel(config.rec_max_width, config.rec_target_height, Rgba([0, 0, 0, 255]));
    imageops::overlay(&mut canvas, &resized, 0, 0);

    Ok(DynamicImage::ImageRgba8(canvas).to_rgb8())
}

/// Convert an RGB canvas to a normalized (1, 3, H, W) tensor
pub fn to_nchw(canvas: &RgbImage, mean: &[f32; 3], std: &[f32; 3]) -> Array4<f32> {
    let (w, h) = canvas.dimensions();

    Array4::from_shape_fn((1, 3, h as usize, w as usize), |(_, c, y, x)| {
        let p = canvas.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
        (p - mean[c]) / std[c]
    })
}

/// Full preprocessing pipeline for recognition
pub fn normalize_for_recognition(
    image: &DynamicImage,
    config: &PreprocessConfig,
) -> Result<Array4<f32>, RenderError> {
    let canvas = render_padded(image, config)?;
    Ok(to_nchw(&canvas, &config.mean, &config.std))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn white(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([255, 255, 255])))
    }

    fn assert_padding_from(tensor: &Array4<f32>, first_pad_col: usize) {
        for c in 0..3 {
            for y in 0..REC_HEIGHT as usize {
                for x in first_pad_col..REC_WIDTH as usize {
                    assert_eq!(tensor[[0, c, y, x]], -1.0, "channel {c} row {y} col {x}");
                }
            }
        }
    }

    #[test]
    fn test_target_width() {
        assert_eq!(target_width(100, 100, 48, 320), 48);
        assert_eq!(target_width(100, 48, 48, 320), 100);
        // 48 * 10 / 3 = 160 exactly
        assert_eq!(target_width(10, 3, 48, 320), 160);
        // 48 * 7 / 5 = 67.2 -> 68
        assert_eq!(target_width(7, 5, 48, 320), 68);
        assert_eq!(target_width(1, 1000, 48, 320), 1);
        assert_eq!(target_width(1000, 10, 48, 320), 320);
    }

    #[test]
    fn test_output_shape() {
        let tensor = normalize_for_recognition(&white(30, 60), &PreprocessConfig::default()).unwrap();
        assert_eq!(tensor.dim(), (1, 3, 48, 320));
    }

    #[test]
    fn test_square_drawing_is_right_padded() {
        let tensor = normalize_for_recognition(&white(200, 200), &PreprocessConfig::default()).unwrap();

        assert_padding_from(&tensor, 48);
        for c in 0..3 {
            assert!(tensor[[0, c, 24, 0]] > 0.9);
            assert!(tensor[[0, c, 24, 47]] > 0.9);
        }
    }

    #[test]
    fn test_fractional_width_rounds_up() {
        // 48 * 7 / 5 = 67.2, so the drawing covers columns 0..68
        let tensor = normalize_for_recognition(&white(7, 5), &PreprocessConfig::default()).unwrap();

        assert_padding_from(&tensor, 68);
        assert!(tensor[[0, 0, 10, 67]] > 0.0);
    }

    #[test]
    fn test_exact_max_ratio_fills_canvas() {
        let tensor = normalize_for_recognition(&white(320, 48), &PreprocessConfig::default()).unwrap();
        for c in 0..3 {
            assert!(tensor[[0, c, 0, 319]] > 0.9);
        }
    }

    #[test]
    fn test_wide_drawing_clamps_to_full_width() {
        let canvas = render_padded(&white(2000, 100), &PreprocessConfig::default()).unwrap();
        assert_eq!(canvas.dimensions(), (320, 48));

        let tensor = to_nchw(&canvas, &[0.5; 3], &[0.5; 3]);
        for y in 0..48 {
            assert!(tensor[[0, 0, y, 319]] > 0.9);
        }
    }

    #[test]
    fn test_normalization_range() {
        let mut img = RgbImage::new(48, 48);
        img.put_pixel(0, 0, Rgb([255, 0, 128]));
        let canvas = render_padded(&DynamicImage::ImageRgb8(img), &PreprocessConfig {
            filter: FilterType::Nearest,
            ..Default::default()
        })
        .unwrap();

        let tensor = to_nchw(&canvas, &[0.5; 3], &[0.5; 3]);
        assert_eq!(tensor[[0, 0, 0, 0]], 1.0);
        assert_eq!(tensor[[0, 1, 0, 0]], -1.0);
        assert!((tensor[[0, 2, 0, 0]] - (128.0 / 255.0 - 0.5) / 0.5).abs() < 1e-6);
        assert!(tensor.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn test_channel_major_layout() {
        let canvas = RgbImage::from_fn(4, 2, |x, y| Rgb([x as u8, y as u8, 255]));
        let tensor = to_nchw(&canvas, &[0.0; 3], &[1.0; 3]);

        assert_eq!(tensor.dim(), (1, 3, 2, 4));
        assert!((tensor[[0, 0, 1, 3]] - 3.0 / 255.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 1, 3]] - 1.0 / 255.0).abs() < 1e-6);
        assert_eq!(tensor[[0, 2, 0, 0]], 1.0);
    }

    #[test]
    fn test_zero_sized_image_is_render_error() {
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 10));
        assert!(normalize_for_recognition(&empty, &PreprocessConfig::default()).is_err());
    }

    #[test]
    fn test_transparent_background_is_black() {
        let rgba = RgbaImage::from_pixel(48, 48, Rgba([255, 255, 255, 0]));
        let tensor =
            normalize_for_recognition(&DynamicImage::ImageRgba8(rgba), &PreprocessConfig::default()).unwrap();

        assert_padding_from(&tensor, 0);
    }

    #[test]
    fn test_opaque_strokes_survive_compositing() {
        // White stroke in column 10 on an otherwise transparent drawing
        let rgba = RgbaImage::from_fn(48, 48, |x, _| {
            if x == 10 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([255, 255, 255, 0])
            }
        });
        let config = PreprocessConfig {
            filter: FilterType::Nearest,
            ..Default::default()
        };
        let tensor = normalize_for_recognition(&DynamicImage::ImageRgba8(rgba), &config).unwrap();

        for c in 0..3 {
            assert_eq!(tensor[[0, c, 20, 10]], 1.0);
            assert_eq!(tensor[[0, c, 20, 9]], -1.0);
            assert_eq!(tensor[[0, c, 20, 11]], -1.0);
        }
        assert_padding_from(&tensor, 48);
    }

    #[test]
    fn test_partial_alpha_blends_toward_black() {
        let rgba = RgbaImage::from_pixel(48, 48, Rgba([255, 255, 255, 128]));
        let config = PreprocessConfig {
            filter: FilterType::Nearest,
            ..Default::default()
        };
        let tensor = normalize_for_recognition(&DynamicImage::ImageRgba8(rgba), &config).unwrap();

        // 255 * 128/255 = 128 -> (128/255 - 0.5) / 0.5 is about 0
        assert!(tensor[[0, 0, 24, 24]].abs() < 0.02);
    }
}
