use image::DynamicImage;
use ndarray::Array3;

use batchcast_api::error::TransformError;
use batchcast_api::tensor::Tensor;

const U8_MAX: f32 = u8::MAX as f32;
const U16_MAX: f32 = u16::MAX as f32;

/// Decode encoded image bytes. The format is sniffed from the content.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, TransformError> {
    Ok(image::load_from_memory(bytes)?)
}

/// Convert a decoded image into a float32 tensor of shape `[C, H, W]`.
///
/// `C` is the image's own channel count. With `scale`, 8-bit samples are
/// divided by 255 and 16-bit samples by 65535; float images are never scaled.
///
/// Scaling 16-bit images departs from torchvision's `ToTensor`, which only
/// rescales 8-bit data and returns wider integer modes unscaled. Pass
/// `scale = false` to keep raw 16-bit values.
pub fn image_to_tensor(image: &DynamicImage, scale: bool) -> Result<Tensor, TransformError> {
    let (channels, hwc) = match image {
        DynamicImage::ImageLuma8(buf) => (1, normalize(buf.as_raw(), U8_MAX, scale)),
        DynamicImage::ImageLumaA8(buf) => (2, normalize(buf.as_raw(), U8_MAX, scale)),
        DynamicImage::ImageRgb8(buf) => (3, normalize(buf.as_raw(), U8_MAX, scale)),
        DynamicImage::ImageRgba8(buf) => (4, normalize(buf.as_raw(), U8_MAX, scale)),
        DynamicImage::ImageLuma16(buf) => (1, normalize(buf.as_raw(), U16_MAX, scale)),
        DynamicImage::ImageLumaA16(buf) => (2, normalize(buf.as_raw(), U16_MAX, scale)),
        DynamicImage::ImageRgb16(buf) => (3, normalize(buf.as_raw(), U16_MAX, scale)),
        DynamicImage::ImageRgba16(buf) => (4, normalize(buf.as_raw(), U16_MAX, scale)),
        DynamicImage::ImageRgb32F(buf) => (3, buf.as_raw().clone()),
        DynamicImage::ImageRgba32F(buf) => (4, buf.as_raw().clone()),
        other => (4, other.to_rgba32f().into_raw()),
    };

    let height = image.height() as usize;
    let width = image.width() as usize;
    let chw = Array3::from_shape_vec((height, width, channels), hwc)?
        .permuted_axes([2, 0, 1])
        .as_standard_layout()
        .into_owned();
    Ok(Tensor::Float32(chw.into_dyn()))
}

fn normalize<T: Copy + Into<f32>>(raw: &[T], max: f32, scale: bool) -> Vec<f32> {
    if scale {
        raw.iter().map(|&v| v.into() / max).collect()
    } else {
        raw.iter().map(|&v| v.into()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn rgb_is_channel_first() {
        // 2 wide, 1 high: red then blue.
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 0, 255]));
        let t = image_to_tensor(&DynamicImage::ImageRgb8(img), true).unwrap();
        assert_eq!(t.shape(), &[3, 1, 2]);

        let a = t.as_f32().unwrap();
        assert_eq!(a[[0, 0, 0]], 1.0);
        assert_eq!(a[[0, 0, 1]], 0.0);
        assert_eq!(a[[2, 0, 0]], 0.0);
        assert_eq!(a[[2, 0, 1]], 1.0);
    }

    #[test]
    fn channel_count_follows_color_type() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(3, 2, Luma([51])));
        let t = image_to_tensor(&gray, true).unwrap();
        assert_eq!(t.shape(), &[1, 2, 3]);
        assert!(t.as_f32().unwrap().iter().all(|&v| (v - 0.2).abs() < 1e-6));

        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255])));
        assert_eq!(image_to_tensor(&rgba, true).unwrap().shape(), &[4, 1, 1]);
    }

    #[test]
    fn sixteen_bit_scales_by_u16_max() {
        let img: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_pixel(1, 1, Luma([u16::MAX]));
        let t = image_to_tensor(&DynamicImage::ImageLuma16(img), true).unwrap();
        assert_eq!(t.as_f32().unwrap()[[0, 0, 0]], 1.0);
    }

    #[test]
    fn unscaled_keeps_raw_values() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(1, 1, Luma([200])));
        let t = image_to_tensor(&img, false).unwrap();
        assert_eq!(t.as_f32().unwrap()[[0, 0, 0]], 200.0);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = decode_image(b"not-an-image").unwrap_err();
        assert!(err.is_decode());
    }
}
