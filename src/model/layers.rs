use crate::{common::*, error::EncoderError, logger::ParamSnapshot};

/// Ownership of a convolution's parameter storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvBinding {
    /// The weight and bias are the variables registered under this layer's path.
    Owned,
    /// The weight and bias alias the storage of another encoder's convolution.
    Tied,
}

/// Fallible `xs.apply(&conv)` for an unpadded convolution with the given stride.
pub fn conv_forward(conv: &nn::Conv2D, xs: &Tensor, stride: i64) -> Result<Tensor, TchError> {
    xs.f_conv2d(
        &conv.ws,
        conv.bs.as_ref(),
        &[stride, stride],
        &[0, 0],
        &[1, 1],
        1,
    )
}

/// Fallible `xs.apply(&linear)`.
pub fn linear_forward(linear: &nn::Linear, xs: &Tensor) -> Result<Tensor, TchError> {
    let ys = xs.f_matmul(&linear.ws.f_transpose(-1, -2)?)?;
    match &linear.bs {
        Some(bs) => ys.f_add(bs),
        None => Ok(ys),
    }
}

/// Fallible `xs.apply(&norm)`.
pub fn layer_norm_forward(norm: &nn::LayerNorm, xs: &Tensor, eps: f64) -> Result<Tensor, TchError> {
    xs.f_layer_norm(
        &norm.normalized_shape,
        norm.ws.as_ref(),
        norm.bs.as_ref(),
        eps,
        true,
    )
}

/// Makes `target` share the weight and bias storage of `source`.
///
/// `target` is left untouched when the parameter shapes disagree.
pub fn tie_conv(target: &mut nn::Conv2D, source: &nn::Conv2D) -> Result<(), EncoderError> {
    let bias_size = |conv: &nn::Conv2D| conv.bs.as_ref().map(Tensor::size);

    if target.ws.size() != source.ws.size() || bias_size(&*target) != bias_size(source) {
        return Err(EncoderError::Shape(format!(
            "cannot tie convolution weight {:?} to {:?}",
            target.ws.size(),
            source.ws.size()
        )));
    }

    target.ws = source.ws.shallow_clone();
    target.bs = source.bs.as_ref().map(Tensor::shallow_clone);
    Ok(())
}

pub fn conv_snapshot(conv: &nn::Conv2D) -> ParamSnapshot<'_> {
    ParamSnapshot {
        weight: Some(&conv.ws),
        bias: conv.bs.as_ref(),
    }
}

pub fn linear_snapshot(linear: &nn::Linear) -> ParamSnapshot<'_> {
    ParamSnapshot {
        weight: Some(&linear.ws),
        bias: linear.bs.as_ref(),
    }
}

pub fn layer_norm_snapshot(norm: &nn::LayerNorm) -> ParamSnapshot<'_> {
    ParamSnapshot {
        weight: norm.ws.as_ref(),
        bias: norm.bs.as_ref(),
    }
}
