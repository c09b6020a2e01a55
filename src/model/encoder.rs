use super::{
    diagnostics::EncoderDiagnostics,
    layers::{
        conv_forward, conv_snapshot, layer_norm_forward, layer_norm_snapshot, linear_forward,
        linear_snapshot, tie_conv, ConvBinding,
    },
};
use crate::{common::*, error::EncoderError, logger::EncoderLogger, params};
use static_assertions::const_assert_eq;

/// Side length of the last convolution's output for a square input.
pub const fn conv_out_side(resolution: i64, num_layers: i64) -> i64 {
    (resolution - params::CONV_KERNEL_SIZE) / params::CONV_FIRST_STRIDE + 1
        - (params::CONV_KERNEL_SIZE - 1) * (num_layers - 1)
}

const_assert_eq!(conv_out_side(64, 2), params::OUT_DIM_64[0].1);
const_assert_eq!(conv_out_side(64, 4), params::OUT_DIM_64[1].1);
const_assert_eq!(conv_out_side(64, 6), params::OUT_DIM_64[2].1);
const_assert_eq!(conv_out_side(84, 2), params::OUT_DIM_84[0].1);
const_assert_eq!(conv_out_side(84, 4), params::OUT_DIM_84[1].1);
const_assert_eq!(conv_out_side(84, 6), params::OUT_DIM_84[2].1);
const_assert_eq!(conv_out_side(128, 2), params::OUT_DIM_128[0].1);
const_assert_eq!(conv_out_side(128, 4), params::OUT_DIM_128[1].1);
const_assert_eq!(conv_out_side(128, 6), params::OUT_DIM_128[2].1);

/// Looks up the convolution output side.
///
/// Resolutions other than 64 and 128 use the 84x84 table.
pub fn lookup_out_dim(resolution: i64, num_layers: i64) -> Result<i64, EncoderError> {
    let table = match resolution {
        64 => &params::OUT_DIM_64,
        128 => &params::OUT_DIM_128,
        84 => &params::OUT_DIM_84,
        _ => {
            warn!(
                "no conv output table for {}x{} inputs, using the 84x84 table",
                resolution, resolution
            );
            &params::OUT_DIM_84
        }
    };

    table
        .iter()
        .find(|(layers, _)| *layers == num_layers)
        .map(|(_, out_dim)| *out_dim)
        .ok_or_else(|| {
            EncoderError::Configuration(format!(
                "unsupported number of conv layers {}, expect one of 2, 4, 6",
                num_layers
            ))
        })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelEncoderInit {
    pub obs_shape: Vec<i64>,
    #[serde(default = "default_feature_dim")]
    pub feature_dim: i64,
    #[serde(default = "default_num_layers")]
    pub num_layers: i64,
    #[serde(default = "default_num_filters")]
    pub num_filters: i64,
    #[serde(default = "default_output_logits")]
    pub output_logits: bool,
    #[serde(default = "default_pose_dim")]
    pub pose_dim: i64,
}

fn default_feature_dim() -> i64 {
    params::FEATURE_DIM
}

fn default_num_layers() -> i64 {
    params::NUM_LAYERS
}

fn default_num_filters() -> i64 {
    params::NUM_FILTERS
}

fn default_output_logits() -> bool {
    true
}

fn default_pose_dim() -> i64 {
    params::POSE_DIM
}

impl PixelEncoderInit {
    pub fn new(obs_shape: impl Into<Vec<i64>>) -> Self {
        Self {
            obs_shape: obs_shape.into(),
            feature_dim: default_feature_dim(),
            num_layers: default_num_layers(),
            num_filters: default_num_filters(),
            output_logits: default_output_logits(),
            pose_dim: default_pose_dim(),
        }
    }

    pub fn build<'p, P>(self, path: P) -> Result<PixelEncoder, EncoderError>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();

        let Self {
            obs_shape,
            feature_dim,
            num_layers,
            num_filters,
            output_logits,
            pose_dim,
        } = self;

        let (channels, height, width) = match obs_shape.as_slice() {
            &[c, h, w] => (c, h, w),
            _ => {
                return Err(EncoderError::Configuration(format!(
                    "observation shape must have 3 dimensions, but get {:?}",
                    obs_shape
                )))
            }
        };
        if [channels, height, width, feature_dim, num_filters, pose_dim]
            .iter()
            .any(|&dim| dim <= 0)
        {
            return Err(EncoderError::Configuration(format!(
                "dimensions must be positive, but get obs_shape={:?}, feature_dim={}, num_filters={}, pose_dim={}",
                obs_shape, feature_dim, num_filters, pose_dim
            )));
        }

        let out_dim = lookup_out_dim(width, num_layers)?;

        let conv_config = |stride| nn::ConvConfig {
            stride,
            ..Default::default()
        };

        let convs = (0..num_layers)
            .map(|index| {
                let in_channels = if index == 0 { channels } else { num_filters };
                nn::conv2d(
                    path / format!("conv{}", index + 1),
                    in_channels,
                    num_filters,
                    params::CONV_KERNEL_SIZE,
                    conv_config(conv_stride(index as usize)),
                )
            })
            .collect::<Vec<_>>();
        let conv_bindings = vec![ConvBinding::Owned; convs.len()];
        let fc = nn::linear(
            path / "fc",
            num_filters * out_dim * out_dim,
            feature_dim,
            Default::default(),
        );
        let ln = nn::layer_norm(
            path / "ln",
            vec![feature_dim],
            nn::LayerNormConfig {
                eps: params::LAYER_NORM_EPS,
                ..Default::default()
            },
        );
        let mlp1 = nn::linear(
            path / "mlp1",
            feature_dim + pose_dim,
            params::FUSION_HIDDEN_DIM,
            Default::default(),
        );
        let mlp2 = nn::linear(
            path / "mlp2",
            params::FUSION_HIDDEN_DIM,
            feature_dim,
            Default::default(),
        );

        debug!(
            "built pixel encoder: obs_shape={:?}, num_layers={}, num_filters={}, conv_out={}x{}, feature_dim={}",
            obs_shape, num_layers, num_filters, out_dim, out_dim, feature_dim
        );

        Ok(PixelEncoder {
            obs_shape: [channels, height, width],
            feature_dim,
            pose_dim,
            output_logits,
            convs,
            conv_bindings,
            fc,
            ln,
            mlp1,
            mlp2,
        })
    }
}

/// Stride of the `index`-th convolution; only the first one downsamples.
fn conv_stride(index: usize) -> i64 {
    if index == 0 {
        params::CONV_FIRST_STRIDE
    } else {
        1
    }
}

fn is_floating(kind: Kind) -> bool {
    matches!(
        kind,
        Kind::Half | Kind::BFloat16 | Kind::Float | Kind::Double
    )
}

/// Convolutional encoder of multi-camera pixel observations, fused with camera poses.
#[derive(Debug)]
pub struct PixelEncoder {
    obs_shape: [i64; 3],
    feature_dim: i64,
    pose_dim: i64,
    output_logits: bool,
    convs: Vec<nn::Conv2D>,
    conv_bindings: Vec<ConvBinding>,
    fc: nn::Linear,
    ln: nn::LayerNorm,
    mlp1: nn::Linear,
    mlp2: nn::Linear,
}

impl PixelEncoder {
    pub fn obs_shape(&self) -> [i64; 3] {
        self.obs_shape
    }

    pub fn feature_dim(&self) -> i64 {
        self.feature_dim
    }

    pub fn pose_dim(&self) -> i64 {
        self.pose_dim
    }

    pub fn num_layers(&self) -> usize {
        self.convs.len()
    }

    pub fn output_logits(&self) -> bool {
        self.output_logits
    }

    pub fn convs(&self) -> &[nn::Conv2D] {
        &self.convs
    }

    pub fn fc(&self) -> &nn::Linear {
        &self.fc
    }

    pub fn conv_bindings(&self) -> &[ConvBinding] {
        &self.conv_bindings
    }

    fn check_inputs(&self, obs: &Tensor, poses: &Tensor) -> Result<i64, EncoderError> {
        let obs_size = obs.size();
        let batch_size = match obs_size.as_slice() {
            &[b, c, h, w] if [c, h, w] == self.obs_shape && b > 0 => b,
            _ => {
                return Err(EncoderError::Shape(format!(
                    "expect observations of shape (N, {}, {}, {}), but get {:?}",
                    self.obs_shape[0], self.obs_shape[1], self.obs_shape[2], obs_size
                )))
            }
        };

        let pose_size = poses.size();
        if pose_size != [batch_size, self.pose_dim] {
            return Err(EncoderError::Shape(format!(
                "expect poses of shape ({}, {}), but get {:?}",
                batch_size, self.pose_dim, pose_size
            )));
        }

        if !is_floating(obs.kind()) || !is_floating(poses.kind()) {
            return Err(EncoderError::Shape(format!(
                "expect floating-point observations and poses, but get {:?} and {:?}",
                obs.kind(),
                poses.kind()
            )));
        }

        let [_, height, width] = self.obs_shape;
        let side = conv_out_side(height.min(width), self.convs.len() as i64);
        if side <= 0 {
            return Err(EncoderError::Shape(format!(
                "{}x{} observations are too small for {} conv layers",
                height,
                width,
                self.convs.len()
            )));
        }

        Ok(batch_size)
    }

    /// Runs the conv tower and flattens the last activation per sample.
    pub fn forward_conv(
        &self,
        obs: &Tensor,
        diagnostics: &mut EncoderDiagnostics,
    ) -> Result<Tensor, EncoderError> {
        diagnostics.record("obs", obs);

        let mut conv = obs.shallow_clone();
        for (index, layer) in self.convs.iter().enumerate() {
            conv = conv_forward(layer, &conv, conv_stride(index))?.f_relu()?;
            diagnostics.record(format!("conv{}", index + 1), &conv);
        }

        let batch_size = conv.size()[0];
        let flat = conv.f_view([batch_size, -1])?;

        let flat_dim = flat.size()[1];
        let in_dim = self.fc.ws.size()[1];
        if flat_dim != in_dim {
            return Err(EncoderError::Shape(format!(
                "conv output has {} features per sample but the projection expects {}",
                flat_dim, in_dim
            )));
        }

        Ok(flat)
    }

    /// Encodes a batch of observations and poses into a single `(1, feature_dim)` feature.
    ///
    /// The fusion stage averages over the batch, so the batch dimension is
    /// always reduced to one. `detach` cuts the gradient of the pooled fusion
    /// state, which the returned feature does not read from.
    pub fn forward(
        &self,
        obs: &Tensor,
        poses: &Tensor,
        detach: bool,
    ) -> Result<(Tensor, EncoderDiagnostics), EncoderError> {
        let batch_size = self.check_inputs(obs, poses)?;
        let mut diagnostics = EncoderDiagnostics::new();

        let h = self.forward_conv(obs, &mut diagnostics)?;
        let h = linear_forward(&self.fc, &h)?;

        let h = Tensor::f_cat(&[&h, poses], 1)?;
        let h = linear_forward(&self.mlp1, &h)?;
        let h = h
            .f_sum_dim_intlist(&[0], true, Kind::Float)?
            .f_div_scalar(batch_size as f64)?;
        let h_fc = linear_forward(&self.mlp2, &h)?;

        if detach {
            let _ = h.detach();
        }
        diagnostics.record("fc", &h_fc);

        let h_norm = layer_norm_forward(&self.ln, &h_fc, params::LAYER_NORM_EPS)?;
        diagnostics.record("ln", &h_norm);

        let out = if self.output_logits {
            h_norm
        } else {
            let out = h_norm.f_tanh()?;
            diagnostics.record("tanh", &out);
            out
        };

        Ok((out, diagnostics))
    }

    /// Ties every convolution of this encoder to the matching one of `source`.
    ///
    /// Only convolutions share storage afterwards. Nothing is tied when the
    /// conv stacks differ in structure.
    pub fn copy_conv_weights_from(&mut self, source: &PixelEncoder) -> Result<(), EncoderError> {
        if self.convs.len() != source.convs.len() {
            return Err(EncoderError::Shape(format!(
                "cannot tie {} conv layers to {} conv layers",
                self.convs.len(),
                source.convs.len()
            )));
        }
        for (index, (target, source)) in self.convs.iter().zip(source.convs.iter()).enumerate() {
            let bias_size = |conv: &nn::Conv2D| conv.bs.as_ref().map(Tensor::size);
            if target.ws.size() != source.ws.size() || bias_size(target) != bias_size(source) {
                return Err(EncoderError::Shape(format!(
                    "conv{} weight {:?} does not match source weight {:?}",
                    index + 1,
                    target.ws.size(),
                    source.ws.size()
                )));
            }
        }

        for ((target, binding), source) in self
            .convs
            .iter_mut()
            .zip(self.conv_bindings.iter_mut())
            .zip(source.convs.iter())
        {
            tie_conv(target, source)?;
            *binding = ConvBinding::Tied;
        }
        debug!("tied {} conv layers", self.convs.len());

        Ok(())
    }

    /// Emits diagnostics of the latest forward pass and parameter snapshots
    /// when `step` is a multiple of `log_freq`.
    pub fn log<L>(
        &self,
        diagnostics: &EncoderDiagnostics,
        logger: &mut L,
        step: usize,
        log_freq: usize,
    ) -> Fallible<()>
    where
        L: EncoderLogger + ?Sized,
    {
        ensure!(log_freq > 0, "log_freq must be positive");
        if step % log_freq != 0 {
            return Ok(());
        }

        let prefix = params::LOG_TAG_PREFIX;

        for (name, value) in diagnostics.iter() {
            logger.log_histogram(&format!("{}/{}_hist", prefix, name), value, step)?;
            if value.dim() > 2 {
                logger.log_image(&format!("{}/{}_img", prefix, name), &value.get(0), step)?;
            }
        }

        for (index, conv) in self.convs.iter().enumerate() {
            logger.log_param(
                &format!("{}/conv{}", prefix, index + 1),
                &conv_snapshot(conv),
                step,
            )?;
        }
        logger.log_param(&format!("{}/fc", prefix), &linear_snapshot(&self.fc), step)?;
        logger.log_param(
            &format!("{}/ln", prefix),
            &layer_norm_snapshot(&self.ln),
            step,
        )?;

        Ok(())
    }
}
