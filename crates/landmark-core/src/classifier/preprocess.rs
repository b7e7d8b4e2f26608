//! Image preprocessing for the landmark classifier.
//!
//! Teachable-Machine-style image models expect:
//! - A center square crop, resized to `image_size × image_size`
//! - RGB scaled to [-1, 1] via pixel / 127.5 - 1
//! - NHWC layout for TF exports, NCHW for PyTorch exports

use std::str::FromStr;

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::Array4;

const CHANNELS: usize = 3;

/// Input tensor layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputLayout {
    #[default]
    Nhwc,
    Nchw,
}

impl FromStr for InputLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nhwc" => Ok(Self::Nhwc),
            "nchw" => Ok(Self::Nchw),
            other => Err(format!("unknown input layout: {other}")),
        }
    }
}

/// Crop the largest centered square out of `image`.
fn center_square(image: &DynamicImage) -> DynamicImage {
    let (w, h) = image.dimensions();
    let side = w.min(h);
    image.crop_imm((w - side) / 2, (h - side) / 2, side, side)
}

/// Preprocess an image into a `[1, ...]` tensor for inference.
pub fn preprocess(image: &DynamicImage, image_size: u32, layout: InputLayout) -> Array4<f32> {
    let resized = center_square(image).resize_exact(image_size, image_size, FilterType::Triangle);
    let rgb = resized.to_rgb8();

    let size = image_size as usize;
    let mut tensor = match layout {
        InputLayout::Nhwc => Array4::<f32>::zeros((1, size, size, CHANNELS)),
        InputLayout::Nchw => Array4::<f32>::zeros((1, CHANNELS, size, size)),
    };

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for (c, &val) in pixel.0.iter().enumerate() {
            let v = val as f32 / 127.5 - 1.0;
            match layout {
                InputLayout::Nhwc => tensor[[0, y, x, c]] = v,
                InputLayout::Nchw => tensor[[0, c, y, x]] = v,
            }
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_preprocess_shape_nhwc() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(640, 480));
        let tensor = preprocess(&img, 224, InputLayout::Nhwc);
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
    }

    #[test]
    fn test_preprocess_shape_nchw() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(480, 640));
        let tensor = preprocess(&img, 96, InputLayout::Nchw);
        assert_eq!(tensor.shape(), &[1, 3, 96, 96]);
    }

    #[test]
    fn test_preprocess_normalization_range() {
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([255, 255, 255])));
        let tensor = preprocess(&white, 16, InputLayout::Nhwc);
        assert!(tensor.iter().all(|&v| (v - 1.0).abs() < 1e-4));

        let black = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([0, 0, 0])));
        let tensor = preprocess(&black, 16, InputLayout::Nhwc);
        assert!(tensor.iter().all(|&v| (v + 1.0).abs() < 1e-4));
    }

    #[test]
    fn test_center_square_crops_long_side() {
        // Red left third, white right two thirds: the crop keeps the middle
        let mut img = RgbImage::from_pixel(300, 100, Rgb([255, 255, 255]));
        for x in 0..100 {
            for y in 0..100 {
                img.put_pixel(x, y, Rgb([255, 0, 0]));
            }
        }
        let cropped = center_square(&DynamicImage::ImageRgb8(img));
        assert_eq!(cropped.dimensions(), (100, 100));
        assert_eq!(cropped.to_rgb8().get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_layout_from_str() {
        assert_eq!("nchw".parse::<InputLayout>(), Ok(InputLayout::Nchw));
        assert!("chw".parse::<InputLayout>().is_err());
    }
}
