use super::{
    camera::{camera_id, camera_poses, perturbed_camera_name, CameraPoses},
    render::{background_mask, composite, one_hot_affordance},
    sim::{RenderMode, SimTransition, Simulator, StepInfo},
};
use crate::{common::*, error::EnvError, params};

/// Environments whose camera setup is not supported yet.
const UNSUPPORTED_ENVS: &[&str] = &["window-open-v2"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvWrapperInit {
    pub env_name: String,
    pub from_pixels: bool,
    pub height: usize,
    pub width: usize,
    /// Cameras rendered every step, in channel order.
    pub camera_names: Vec<String>,
    /// Custom cameras re-anchored on the task target at every reset.
    pub snerl_cam_names: Vec<String>,
    #[serde(default)]
    pub multicam_contrastive: bool,
    #[serde(default)]
    pub sparse_reward: bool,
    /// Also return the raw simulator state with every observation.
    #[serde(default)]
    pub tsne: bool,
    #[serde(default)]
    pub render_mode: RenderMode,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl EnvWrapperInit {
    pub fn build<S>(self, mut sim: S, device: Device) -> Result<EnvWrapper<S>, EnvError>
    where
        S: Simulator,
    {
        let Self {
            env_name,
            from_pixels,
            height,
            width,
            camera_names,
            snerl_cam_names,
            multicam_contrastive,
            sparse_reward,
            tsne,
            render_mode,
            seed,
        } = self;

        if !from_pixels {
            return Err(EnvError::Configuration(
                "only pixel observations are supported".into(),
            ));
        }
        if UNSUPPORTED_ENVS.contains(&env_name.as_str()) {
            return Err(EnvError::WorkInProgress(env_name));
        }
        if camera_names.is_empty() {
            return Err(EnvError::Configuration("no camera is configured".into()));
        }
        if height == 0 || width == 0 {
            return Err(EnvError::Configuration(format!(
                "invalid frame size {}x{}",
                height, width
            )));
        }

        sim.set_random_init(true);

        let snerl_cam_ids = snerl_cam_names
            .iter()
            .map(|name| camera_id(name))
            .collect::<Result<Vec<_>, _>>()?;
        let CameraPoses {
            positions: default_campos,
            ..
        } = camera_poses(
            sim.camera_positions().view(),
            sim.camera_rotations().view(),
            Some(snerl_cam_ids.as_slice()),
        )?;

        let max_episode_steps = sim.max_path_length();
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            "wrapping {} with {} cameras ({:?}), device {:?}",
            env_name,
            camera_names.len(),
            render_mode,
            device
        );

        Ok(EnvWrapper {
            sim,
            env_name,
            height,
            width,
            camera_names,
            snerl_cam_ids,
            default_campos,
            multicam_contrastive,
            sparse_reward,
            tsne,
            render_mode,
            device,
            max_episode_steps,
            rng,
        })
    }
}

#[derive(Debug)]
pub struct Observation {
    /// `(C, H, W)` `u8` multi-camera image.
    pub image: Tensor,
    /// Raw simulator state, kept when the wrapper is built with `tsne`.
    pub state: Option<Array1<f64>>,
}

#[derive(Debug)]
pub struct StepOutput {
    pub image: Tensor,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
    pub state: Option<Array1<f64>>,
}

/// Renders multi-camera pixel observations from a simulator.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct EnvWrapper<S> {
    #[derivative(Debug = "ignore")]
    sim: S,
    env_name: String,
    height: usize,
    width: usize,
    camera_names: Vec<String>,
    snerl_cam_ids: Vec<usize>,
    default_campos: Array2<f64>,
    multicam_contrastive: bool,
    sparse_reward: bool,
    tsne: bool,
    render_mode: RenderMode,
    device: Device,
    max_episode_steps: usize,
    rng: StdRng,
}

impl<S> EnvWrapper<S>
where
    S: Simulator,
{
    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    pub fn max_episode_steps(&self) -> usize {
        self.max_episode_steps
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Channels of a composited observation.
    pub fn observation_channels(&self) -> usize {
        let views = if self.multicam_contrastive { 2 } else { 1 };
        views * self.camera_names.len() * self.render_mode.channels_per_camera()
    }

    pub fn simulator(&self) -> &S {
        &self.sim
    }

    /// Current poses of the custom cameras.
    pub fn camera_poses(&self) -> Result<CameraPoses, EnvError> {
        camera_poses(
            self.sim.camera_positions().view(),
            self.sim.camera_rotations().view(),
            Some(self.snerl_cam_ids.as_slice()),
        )
    }

    pub fn reset(&mut self) -> Result<Observation, EnvError> {
        if self.multicam_contrastive {
            return Err(EnvError::WorkInProgress(
                "multi-camera contrastive reset".into(),
            ));
        }

        let state = self.sim.reset()?;

        let target = self.sim.target_position();
        for (index, &cam_id) in self.snerl_cam_ids.iter().enumerate() {
            let offset = self.default_campos.row(index);
            let position = [
                target[0] + offset[0],
                target[1] + offset[1],
                target[2] + offset[2],
            ];
            self.sim.set_camera_position(cam_id, position);
        }

        let cameras = self.camera_names.clone();
        let image = self.render_cameras(&cameras)?;
        debug!("reset {}, observation {:?}", self.env_name, image.size());

        Ok(Observation {
            image,
            state: self.tsne.then(|| state),
        })
    }

    pub fn step(&mut self, action: &[f64]) -> Result<StepOutput, EnvError> {
        let SimTransition {
            state,
            mut reward,
            terminated,
            truncated,
            info,
        } = self.sim.step(action)?;
        let mut done = terminated || truncated;

        let mut cameras = self.camera_names.clone();
        if self.multicam_contrastive {
            let perturbed = self
                .camera_names
                .iter()
                .map(|name| perturbed_camera_name(name, &mut self.rng))
                .collect::<Result<Vec<_>, _>>()?;
            cameras.extend(perturbed);
        }
        let image = self.render_cameras(&cameras)?;

        if self.sparse_reward {
            reward = info.success - 1.0;
        }
        if self.sim.curr_path_length() == self.max_episode_steps {
            done = true;
        }

        Ok(StepOutput {
            image,
            reward,
            done,
            info,
            state: self.tsne.then(|| state),
        })
    }

    fn render_cameras(&mut self, cameras: &[String]) -> Result<Tensor, EnvError> {
        let frames = cameras
            .iter()
            .map(|camera| {
                self.sim.set_camera(camera);
                let frame = self.sim.render()?;

                if frame.depth.dim() != (self.height, self.width) {
                    return Err(EnvError::Shape(format!(
                        "camera {} rendered {:?}, expect {}x{}",
                        camera,
                        frame.depth.dim(),
                        self.height,
                        self.width
                    )));
                }

                let image = background_mask(&frame.rgb, &frame.depth, self.device)?;

                match self.render_mode {
                    RenderMode::RgbdArray => Ok(image),
                    RenderMode::RgbArray => {
                        let segmentation = frame.segmentation.as_ref().ok_or_else(|| {
                            EnvError::Configuration(format!(
                                "camera {} rendered no segmentation in rgb_array mode",
                                camera
                            ))
                        })?;
                        let affordance = one_hot_affordance(
                            segmentation,
                            params::AFFORDANCE_COLOR,
                            self.device,
                        )?;
                        Ok(Tensor::cat(&[image, affordance], 0))
                    }
                }
            })
            .collect::<Result<Vec<_>, EnvError>>()?;

        composite(&frames)
    }
}
