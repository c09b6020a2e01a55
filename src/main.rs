use snerlrs::{
    common::*,
    config::Config,
    logger::SummaryLogger,
    model::PixelEncoderInit,
};

/// Builds a tied pair of multi-view pixel encoders and runs them on a synthetic batch.
#[derive(FromArgs)]
struct Args {
    /// the config file.
    #[argh(option, default = "PathBuf::from(\"config.json5\")")]
    config: PathBuf,
}

fn main() -> Fallible<()> {
    pretty_env_logger::init();

    // Parse arguments
    let args: Args = argh::from_env();

    // load config
    let config = Config::open(&args.config)?;
    let device = config.device;
    let init: PixelEncoderInit = config.encoder.clone();

    if let Some(env) = &config.env {
        let channels = env.camera_names.len() * env.render_mode.channels_per_camera();
        let expect = [channels as i64, env.height as i64, env.width as i64];
        if init.obs_shape != expect {
            warn!(
                "encoder obs_shape {:?} does not match {} observations {:?}",
                init.obs_shape, env.env_name, expect
            );
        }
    }

    // online and target encoders live in separate var stores
    let online_vs = VarStore::new(device);
    let target_vs = VarStore::new(device);
    let online = init.clone().build(&online_vs.root() / "encoder")?;
    let mut target = init.build(&target_vs.root() / "encoder")?;
    target.copy_conv_weights_from(&online)?;
    info!("target conv bindings: {:?}", target.conv_bindings());

    // synthetic batch
    let batch_size = config.smoke.batch_size.get() as i64;
    let [channels, height, width] = online.obs_shape();
    let obs = Tensor::rand(&[batch_size, channels, height, width], (Kind::Float, device));
    let poses = Tensor::zeros(&[batch_size, online.pose_dim()], (Kind::Float, device));

    let (online_feature, diagnostics) = tch::no_grad(|| online.forward(&obs, &poses, false))?;
    let (target_feature, _) = tch::no_grad(|| target.forward(&obs, &poses, true))?;
    info!(
        "feature {:?}, online mean {:.4}, target mean {:.4}",
        online_feature.size(),
        online_feature.mean(Kind::Float).double_value(&[]),
        target_feature.mean(Kind::Float).double_value(&[]),
    );

    // emit diagnostics
    if config.logging.enabled {
        let mut logger = SummaryLogger::create(&config.logging.log_dir)?;
        online.log(
            &diagnostics,
            &mut logger,
            config.smoke.step,
            config.logging.log_freq.get(),
        )?;
        info!(
            "wrote encoder summaries to {}",
            config.logging.log_dir.display()
        );
    }

    Ok(())
}
