mod memory;
mod summary;

pub use memory::{HistogramSummary, LogRecord, MemoryLogger};
pub use summary::SummaryLogger;

use crate::common::*;

/// Weight and bias handles of a layer, as seen by a logger.
#[derive(Debug, Clone, Copy)]
pub struct ParamSnapshot<'a> {
    pub weight: Option<&'a Tensor>,
    pub bias: Option<&'a Tensor>,
}

/// Sink for encoder diagnostics.
pub trait EncoderLogger {
    fn log_histogram(&mut self, tag: &str, values: &Tensor, step: usize) -> Fallible<()>;

    /// `image` is a single sample shaped `(C, H, W)`.
    fn log_image(&mut self, tag: &str, image: &Tensor, step: usize) -> Fallible<()>;

    fn log_param(&mut self, tag: &str, param: &ParamSnapshot<'_>, step: usize) -> Fallible<()>;
}

/// Lays the channels of a `(C, H, W)` or `(H, W)` tensor side by side as a
/// `(1, H, C * W)` grayscale `u8` image, each channel min-max normalized.
pub fn tile_channels(image: &Tensor) -> Fallible<Tensor> {
    let image = match image.dim() {
        2 => image.f_unsqueeze(0)?,
        3 => image.shallow_clone(),
        _ => bail!("cannot render tensor of shape {:?} as an image", image.size()),
    };
    let (channels, height, width) = image.size3()?;
    ensure!(
        channels > 0 && height > 0 && width > 0,
        "cannot render empty tensor of shape {:?}",
        image.size()
    );

    let flat = image
        .f_detach()?
        .f_to_kind(Kind::Float)?
        .f_reshape(&[channels, -1])?;
    let (lo, _) = flat.f_min_dim(1, true)?;
    let (hi, _) = flat.f_max_dim(1, true)?;
    let range = hi.f_sub(&lo)?.f_clamp_min(1e-12)?;

    let tiles = flat
        .f_sub(&lo)?
        .f_div(&range)?
        .f_mul_scalar(255.0)?
        .f_round()?
        .f_to_kind(Kind::Uint8)?
        .f_reshape(&[channels, height, width])?
        .f_permute(&[1, 0, 2])?
        .f_reshape(&[1, height, channels * width])?;
    Ok(tiles)
}
