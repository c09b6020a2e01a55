use snerlrs::{
    common::*,
    logger::{LogRecord, MemoryLogger},
    model::{ConvBinding, PixelEncoder, PixelEncoderInit},
    params,
};

fn build(vs: &VarStore, resolution: i64, num_layers: i64, output_logits: bool) -> PixelEncoder {
    PixelEncoderInit {
        num_layers,
        output_logits,
        ..PixelEncoderInit::new(vec![9, resolution, resolution])
    }
    .build(&vs.root() / "encoder")
    .unwrap()
}

fn zeros_batch(encoder: &PixelEncoder, batch_size: i64) -> (Tensor, Tensor) {
    let [c, h, w] = encoder.obs_shape();
    let obs = Tensor::zeros(&[batch_size, c, h, w], (Kind::Float, Device::Cpu));
    let poses = Tensor::zeros(&[batch_size, encoder.pose_dim()], (Kind::Float, Device::Cpu));
    (obs, poses)
}

fn random_batch(encoder: &PixelEncoder, batch_size: i64) -> (Tensor, Tensor) {
    let [c, h, w] = encoder.obs_shape();
    let obs = Tensor::rand(&[batch_size, c, h, w], (Kind::Float, Device::Cpu)) * 255.;
    let poses = Tensor::randn(&[batch_size, encoder.pose_dim()], (Kind::Float, Device::Cpu));
    (obs, poses)
}

fn is_finite(tensor: &Tensor) -> bool {
    tensor.isnan().any().int64_value(&[]) == 0 && tensor.isinf().any().int64_value(&[]) == 0
}

#[test]
fn zero_inputs_give_finite_features() {
    for resolution in [64, 84, 128] {
        for num_layers in [2, 4, 6] {
            let vs = VarStore::new(Device::Cpu);
            let encoder = build(&vs, resolution, num_layers, true);
            let (obs, poses) = zeros_batch(&encoder, 2);

            let (out, _) = encoder.forward(&obs, &poses, false).unwrap();
            assert_eq!(out.size(), vec![1, params::FEATURE_DIM]);
            assert!(
                is_finite(&out),
                "non-finite output for {}x{} with {} layers",
                resolution,
                resolution,
                num_layers
            );
        }
    }
}

#[test]
fn forward_is_idempotent() {
    let vs = VarStore::new(Device::Cpu);
    let encoder = build(&vs, 64, 4, false);
    let (obs, poses) = random_batch(&encoder, 4);

    let (first, _) = encoder.forward(&obs, &poses, false).unwrap();
    let (second, _) = encoder.forward(&obs, &poses, false).unwrap();

    let diff = (first - second).abs().max().double_value(&[]);
    assert_eq!(diff, 0.0);
}

#[test]
fn tied_convs_share_storage() {
    let source_vs = VarStore::new(Device::Cpu);
    let target_vs = VarStore::new(Device::Cpu);
    let source = build(&source_vs, 64, 4, true);
    let mut target = build(&target_vs, 64, 4, true);

    target.copy_conv_weights_from(&source).unwrap();
    assert_eq!(target.conv_bindings(), vec![ConvBinding::Tied; 4]);
    assert_eq!(source.conv_bindings(), vec![ConvBinding::Owned; 4]);

    // conv parameters are shared
    let mut source_weight = source.convs()[2].ws.shallow_clone();
    tch::no_grad(|| {
        let _ = source_weight.fill_(0.25);
    });
    assert_eq!(target.convs()[2].ws.double_value(&[0, 0, 0, 0]), 0.25);

    let mut source_bias = source.convs()[0].bs.as_ref().unwrap().shallow_clone();
    tch::no_grad(|| {
        let _ = source_bias.fill_(-1.5);
    });
    assert_eq!(target.convs()[0].bs.as_ref().unwrap().double_value(&[3]), -1.5);

    // the projection is not
    let mut target_fc = target.fc().ws.shallow_clone();
    tch::no_grad(|| {
        let _ = target_fc.fill_(3.0);
    });
    assert_ne!(source.fc().ws.double_value(&[0, 0]), 3.0);

    let mut source_fc = source.fc().ws.shallow_clone();
    tch::no_grad(|| {
        let _ = source_fc.fill_(-3.0);
    });
    assert_eq!(target.fc().ws.double_value(&[0, 0]), 3.0);
}

#[test]
fn tied_encoders_agree_on_conv_activations() {
    let source_vs = VarStore::new(Device::Cpu);
    let target_vs = VarStore::new(Device::Cpu);
    let source = build(&source_vs, 84, 2, true);
    let mut target = build(&target_vs, 84, 2, true);
    target.copy_conv_weights_from(&source).unwrap();

    let (obs, poses) = random_batch(&source, 3);
    let (_, source_diag) = source.forward(&obs, &poses, false).unwrap();
    let (_, target_diag) = target.forward(&obs, &poses, false).unwrap();

    let diff = (source_diag.get("conv2").unwrap() - target_diag.get("conv2").unwrap())
        .abs()
        .max()
        .double_value(&[]);
    assert_eq!(diff, 0.0);
}

#[test]
fn tying_mismatched_structure_fails() {
    let source_vs = VarStore::new(Device::Cpu);
    let target_vs = VarStore::new(Device::Cpu);
    let source = build(&source_vs, 64, 4, true);
    let mut target = build(&target_vs, 64, 6, true);

    assert!(target.copy_conv_weights_from(&source).is_err());
    assert_eq!(target.conv_bindings(), vec![ConvBinding::Owned; 6]);

    let other_vs = VarStore::new(Device::Cpu);
    let mut narrow = PixelEncoderInit {
        num_filters: 16,
        ..PixelEncoderInit::new(vec![9, 64, 64])
    }
    .build(&other_vs.root())
    .unwrap();
    assert!(narrow.copy_conv_weights_from(&source).is_err());
    assert_eq!(narrow.conv_bindings(), vec![ConvBinding::Owned; 4]);
}

#[test]
fn batch_is_pooled_away() {
    let vs = VarStore::new(Device::Cpu);
    let encoder = build(&vs, 64, 2, true);

    for batch_size in [1, 8, 32] {
        let (obs, poses) = random_batch(&encoder, batch_size);
        let (out, diagnostics) = encoder.forward(&obs, &poses, false).unwrap();

        assert_eq!(out.size(), vec![1, params::FEATURE_DIM]);
        assert_eq!(diagnostics.get("obs").unwrap().size()[0], batch_size);
    }
}

#[test]
fn log_is_gated_by_frequency() {
    let vs = VarStore::new(Device::Cpu);
    let encoder = build(&vs, 64, 4, true);
    let (obs, poses) = random_batch(&encoder, 2);
    let (_, diagnostics) = encoder.forward(&obs, &poses, false).unwrap();

    let mut logger = MemoryLogger::new();
    for (step, log_freq) in [(1, 2), (5, 3), (7, 10), (1001, 1000)] {
        encoder.log(&diagnostics, &mut logger, step, log_freq).unwrap();
    }
    assert!(logger.records().is_empty());

    encoder.log(&diagnostics, &mut logger, 2000, 1000).unwrap();

    // obs, conv1..conv4, fc, ln
    let histograms = logger
        .records()
        .iter()
        .filter(|record| matches!(record, LogRecord::Histogram { .. }))
        .count();
    let images = logger
        .records()
        .iter()
        .filter(|record| matches!(record, LogRecord::Image { .. }))
        .count();
    let params = logger
        .records()
        .iter()
        .filter(|record| matches!(record, LogRecord::Param { .. }))
        .count();
    assert_eq!(histograms, 7);
    assert_eq!(images, 5);
    assert_eq!(params, 6);
    assert!(logger.records().iter().all(|record| record.step() == 2000));

    let tags = logger.tags();
    assert!(tags.contains(&"train_encoder/obs_hist"));
    assert!(tags.contains(&"train_encoder/conv4_img"));
    assert!(tags.contains(&"train_encoder/ln_hist"));
    assert!(!tags.contains(&"train_encoder/ln_img"));
    assert!(tags.contains(&"train_encoder/conv1"));
    assert!(tags.contains(&"train_encoder/fc"));
    assert!(tags.contains(&"train_encoder/ln"));
}

#[test]
fn log_image_uses_first_sample() {
    let vs = VarStore::new(Device::Cpu);
    let encoder = build(&vs, 64, 2, false);
    let (obs, poses) = random_batch(&encoder, 4);
    let (_, diagnostics) = encoder.forward(&obs, &poses, false).unwrap();

    let mut logger = MemoryLogger::new();
    encoder.log(&diagnostics, &mut logger, 0, 1).unwrap();

    let obs_image = logger.records().iter().find_map(|record| match record {
        LogRecord::Image { tag, shape, .. } if tag == "train_encoder/obs_img" => {
            Some(shape.clone())
        }
        _ => None,
    });
    assert_eq!(obs_image, Some(vec![9, 64, 64]));
    assert!(logger.tags().contains(&"train_encoder/tanh_hist"));
}

#[test]
fn zero_log_freq_is_rejected() {
    let vs = VarStore::new(Device::Cpu);
    let encoder = build(&vs, 64, 2, true);
    let (obs, poses) = zeros_batch(&encoder, 1);
    let (_, diagnostics) = encoder.forward(&obs, &poses, false).unwrap();

    let mut logger = MemoryLogger::new();
    assert!(encoder.log(&diagnostics, &mut logger, 0, 0).is_err());
    assert!(logger.records().is_empty());
}

#[test]
fn tanh_output_is_bounded() {
    let vs = VarStore::new(Device::Cpu);
    let squashed = build(&vs, 84, 4, false);
    let (obs, poses) = random_batch(&squashed, 8);

    let (out, _) = squashed.forward(&obs, &poses, false).unwrap();
    assert!(out.abs().max().double_value(&[]) <= 1.0);

    let logits_vs = VarStore::new(Device::Cpu);
    let logits = build(&logits_vs, 84, 4, true);
    let (out, diagnostics) = logits.forward(&obs, &poses, false).unwrap();
    assert!(diagnostics.get("tanh").is_none());
    // layer norm output has unit variance over 63 features
    assert!(out.abs().max().double_value(&[]) > 1.0);
}

#[test]
fn wrong_pose_dim_is_a_shape_error() {
    let vs = VarStore::new(Device::Cpu);
    let encoder = build(&vs, 64, 2, true);
    let (obs, _) = zeros_batch(&encoder, 2);
    let poses = Tensor::zeros(&[2, 7], (Kind::Float, Device::Cpu));

    assert!(matches!(
        encoder.forward(&obs, &poses, false),
        Err(snerlrs::error::EncoderError::Shape(_))
    ));

    let poses = Tensor::zeros(&[3, params::POSE_DIM], (Kind::Float, Device::Cpu));
    assert!(encoder.forward(&obs, &poses, false).is_err());
}

#[test]
fn wrong_obs_shape_is_a_shape_error() {
    let vs = VarStore::new(Device::Cpu);
    let encoder = build(&vs, 64, 2, true);
    let obs = Tensor::zeros(&[2, 3, 64, 64], (Kind::Float, Device::Cpu));
    let poses = Tensor::zeros(&[2, params::POSE_DIM], (Kind::Float, Device::Cpu));

    assert!(encoder.forward(&obs, &poses, false).is_err());
    assert!(encoder
        .forward(&obs.view([2 * 3 * 64 * 64]), &poses, false)
        .is_err());
}
