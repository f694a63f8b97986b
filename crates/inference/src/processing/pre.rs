use crate::error::InferenceError;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image};
use image::DynamicImage;
use ndarray::{Array, IxDyn};

const LETTERBOX_COLOR: u8 = 114;

/// Maps model-input coordinates back onto the original image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
    pub orig_width: u32,
    pub orig_height: u32,
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl LetterboxTransform {
    /// Input-space point to original-image point, clamped to the image.
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let ox = ((x - self.offset_x) / self.scale).clamp(0.0, self.orig_width as f32);
        let oy = ((y - self.offset_y) / self.scale).clamp(0.0, self.orig_height as f32);
        (ox, oy)
    }
}

#[derive(Debug, Clone)]
pub struct PreProcessor {
    pub input_size: (u32, u32),
}

impl PreProcessor {
    pub fn new(input_size: (u32, u32)) -> Self {
        Self { input_size }
    }

    /// Letterbox `image` into the model input and scale pixels to 0-1, NCHW.
    pub fn preprocess(
        &self,
        image: &DynamicImage,
    ) -> Result<(Array<f32, IxDyn>, LetterboxTransform), InferenceError> {
        let _s = tracing::debug_span!("preprocess_image").entered();

        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(InferenceError::Preprocess(format!(
                "image has no pixels ({}x{})",
                width, height
            )));
        }

        tracing::trace!(width, height, "Preprocessing image dimensions");

        let (letterboxed, transform) = self.resize_and_letterbox(rgb.into_raw(), width, height)?;
        let input = Self::normalize(&letterboxed, self.input_size)?;

        Ok((input, transform))
    }

    fn resize_and_letterbox(
        &self,
        rgb: Vec<u8>,
        width: u32,
        height: u32,
    ) -> Result<(Vec<u8>, LetterboxTransform), InferenceError> {
        let (input_w, input_h) = self.input_size;

        let scale = (input_w as f32 / width as f32).min(input_h as f32 / height as f32);
        let new_width = ((width as f32 * scale).round() as u32).clamp(1, input_w);
        let new_height = ((height as f32 * scale).round() as u32).clamp(1, input_h);

        let offset_x = (input_w - new_width) / 2;
        let offset_y = (input_h - new_height) / 2;

        let src = Image::from_vec_u8(width, height, rgb, PixelType::U8x3)
            .map_err(|e| InferenceError::Preprocess(e.to_string()))?;
        let mut resized = Image::new(new_width, new_height, PixelType::U8x3);

        Resizer::new()
            .resize(
                &src,
                &mut resized,
                &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
            )
            .map_err(|e| InferenceError::Preprocess(e.to_string()))?;

        let mut letterboxed = vec![LETTERBOX_COLOR; (input_w * input_h * 3) as usize];
        let resized_data = resized.buffer();
        let stride = input_w * 3;
        let row_len = (new_width * 3) as usize;

        for y in 0..new_height {
            let src_row = (y * new_width * 3) as usize;
            let dst_row = ((y + offset_y) * stride + offset_x * 3) as usize;

            letterboxed[dst_row..dst_row + row_len]
                .copy_from_slice(&resized_data[src_row..src_row + row_len]);
        }

        let transform = LetterboxTransform {
            orig_width: width,
            orig_height: height,
            scale,
            offset_x: offset_x as f32,
            offset_y: offset_y as f32,
        };

        Ok((letterboxed, transform))
    }

    fn normalize(rgb: &[u8], (width, height): (u32, u32)) -> Result<Array<f32, IxDyn>, InferenceError> {
        let width = width as usize;
        let height = height as usize;
        let spatial = width * height;

        let mut output = vec![0.0f32; 3 * spatial];

        for (i, px) in rgb.chunks_exact(3).enumerate() {
            output[i] = px[0] as f32 / 255.0;
            output[i + spatial] = px[1] as f32 / 255.0;
            output[i + 2 * spatial] = px[2] as f32 / 255.0;
        }

        Array::from_shape_vec(IxDyn(&[1, 3, height, width]), output)
            .map_err(|e| InferenceError::Preprocess(e.to_string()))
    }
}
