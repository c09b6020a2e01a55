mod diagnostics;
mod encoder;
mod layers;

pub use diagnostics::EncoderDiagnostics;
pub use encoder::{conv_out_side, lookup_out_dim, PixelEncoder, PixelEncoderInit};
pub use layers::{
    conv_forward, layer_norm_forward, linear_forward, tie_conv, ConvBinding,
};
