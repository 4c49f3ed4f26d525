use crate::config::{DetectorConfig, TensorLayout};
use common::span_debug;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use image::RgbImage;
use ndarray::{Array, IxDyn};

/// Turns a decoded RGB image into the tensor the detector expects:
/// stretched to the network input size (no letterbox), then
/// `(pixel - mean) * scale` per channel, RGB in the model's layout.
pub struct PreProcessor {
    pub input_size: (u32, u32),
    layout: TensorLayout,
    scale: f32,
    mean: f32,
    resizer: Resizer,
}

impl PreProcessor {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            input_size: config.input_size,
            layout: config.input_layout,
            scale: config.input_scale,
            mean: config.input_mean,
            resizer: Resizer::new(),
        }
    }

    pub fn preprocess(&mut self, image: &RgbImage) -> anyhow::Result<Array<f32, IxDyn>> {
        let _s = span_debug!("preprocess_image");

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            anyhow::bail!("Cannot preprocess an empty {}x{} image", width, height);
        }

        tracing::trace!(
            width,
            height,
            input_width = self.input_size.0,
            input_height = self.input_size.1,
            "Preprocessing image"
        );

        let resized = self.resize(image)?;
        self.normalize(&resized)
    }

    fn resize(&mut self, image: &RgbImage) -> anyhow::Result<Image<'static>> {
        let _s = span_debug!("resize");

        let src = ImageRef::new(
            image.width(),
            image.height(),
            image.as_raw(),
            PixelType::U8x3,
        )?;

        let mut resized = Image::new(self.input_size.0, self.input_size.1, PixelType::U8x3);

        self.resizer.resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        Ok(resized)
    }

    fn normalize(&self, image: &Image) -> anyhow::Result<Array<f32, IxDyn>> {
        let _s = span_debug!("normalize");

        let width = image.width() as usize;
        let height = image.height() as usize;
        let spatial = width * height;

        let buf = image.buffer();
        let scale_value = |value: u8| (value as f32 - self.mean) * self.scale;

        let output = match self.layout {
            TensorLayout::Nchw => {
                let mut planar = vec![0.0f32; 3 * spatial];
                for (i, px) in buf.chunks_exact(3).enumerate() {
                    planar[i] = scale_value(px[0]);
                    planar[i + spatial] = scale_value(px[1]);
                    planar[i + 2 * spatial] = scale_value(px[2]);
                }
                Array::from_shape_vec(IxDyn(&[1, 3, height, width]), planar)?
            }
            TensorLayout::Nhwc => {
                let interleaved: Vec<f32> = buf.iter().map(|&v| scale_value(v)).collect();
                Array::from_shape_vec(IxDyn(&[1, height, width, 3]), interleaved)?
            }
        };

        Ok(output)
    }
}

impl Default for PreProcessor {
    fn default() -> Self {
        Self::new(&DetectorConfig::default())
    }
}
