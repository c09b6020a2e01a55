//! Multi-camera pixel observations from a manipulation simulator.

mod camera;
mod render;
mod sim;
mod wrapper;

pub use camera::{camera_id, camera_poses, perturbed_camera_name, CameraPoses};
pub use render::{background_mask, composite, one_hot_affordance};
pub use sim::{RenderMode, RenderedFrame, SimTransition, Simulator, StepInfo};
pub use wrapper::{EnvWrapper, EnvWrapperInit, Observation, StepOutput};
