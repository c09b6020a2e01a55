use crate::{common::*, error::EnvError, params};

/// Replaces far-depth pixels by white and moves channels first.
///
/// Returns a `(3, H, W)` `u8` tensor on `device`.
pub fn background_mask(
    rgb: &Array3<u8>,
    depth: &Array2<f32>,
    device: Device,
) -> Result<Tensor, EnvError> {
    let (height, width, channels) = rgb.dim();
    if channels != 3 || depth.dim() != (height, width) {
        return Err(EnvError::Shape(format!(
            "expect rgb (H, W, 3) and depth (H, W), but get {:?} and {:?}",
            rgb.dim(),
            depth.dim()
        )));
    }
    let (height, width) = (height as i64, width as i64);

    let image = Tensor::of_slice(&rgb.iter().copied().collect_vec())
        .view([height, width, 3])
        .to_device(device)
        .to_kind(Kind::Float);
    let depth = Tensor::of_slice(&depth.iter().copied().collect_vec())
        .view([height, width])
        .to_device(device);

    let mask = depth
        .lt(params::DEPTH_BACKGROUND_THRESHOLD)
        .to_kind(Kind::Float)
        .unsqueeze(-1);
    let masked = &image * &mask + (mask.ones_like() - &mask) * params::BACKGROUND_VALUE;

    Ok(masked.permute(&[2, 0, 1]).to_kind(Kind::Uint8))
}

/// Marks pixels whose segmentation color equals `color`.
///
/// Returns a `(1, H, W)` `u8` tensor of zeros and ones on `device`.
pub fn one_hot_affordance(
    segmentation: &Array3<u8>,
    color: [u8; 3],
    device: Device,
) -> Result<Tensor, EnvError> {
    let (height, width, channels) = segmentation.dim();
    if channels != 3 {
        return Err(EnvError::Shape(format!(
            "expect segmentation (H, W, 3), but get {:?}",
            segmentation.dim()
        )));
    }

    let affordance = Array2::from_shape_fn((height, width), |(row, col)| {
        let hit = (0..3).all(|channel| segmentation[[row, col, channel]] == color[channel]);
        hit as u8
    });

    Ok(Tensor::of_slice(&affordance.iter().copied().collect_vec())
        .view([1, height as i64, width as i64])
        .to_device(device))
}

/// Concatenates per-camera `(C, H, W)` tensors along channels.
pub fn composite(frames: &[Tensor]) -> Result<Tensor, EnvError> {
    let first = frames
        .first()
        .ok_or_else(|| EnvError::Configuration("no camera to composite".into()))?;
    let first_size = first.size();
    let spatial = match first_size.as_slice() {
        [_, height, width] => [*height, *width],
        _ => {
            return Err(EnvError::Shape(format!(
                "expect (C, H, W) camera frames, but get {:?}",
                first_size
            )))
        }
    };

    if let Some(frame) = frames
        .iter()
        .find(|frame| frame.dim() != 3 || frame.size()[1..] != spatial)
    {
        return Err(EnvError::Shape(format!(
            "cannot composite camera frame {:?} with {:?}",
            frame.size(),
            first.size()
        )));
    }

    Ok(Tensor::cat(frames, 0))
}
