use crate::common::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderMode {
    /// RGB plus depth. Each camera contributes 3 channels.
    #[serde(rename = "rgbd_array")]
    RgbdArray,
    /// RGB, segmentation and depth. Each camera contributes 3 channels plus
    /// a one-hot affordance channel.
    #[serde(rename = "rgb_array")]
    RgbArray,
}

impl Default for RenderMode {
    fn default() -> Self {
        Self::RgbdArray
    }
}

impl RenderMode {
    pub fn channels_per_camera(&self) -> usize {
        match self {
            Self::RgbdArray => 3,
            Self::RgbArray => 4,
        }
    }
}

/// Buffers rendered from one camera.
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    /// `(H, W, 3)` color image.
    pub rgb: Array3<u8>,
    /// `(H, W)` normalized depth, far plane at 1.
    pub depth: Array2<f32>,
    /// `(H, W, 3)` segmentation colors, present in [RenderMode::RgbArray].
    pub segmentation: Option<Array3<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    pub success: f64,
    #[serde(flatten)]
    pub extras: HashMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct SimTransition {
    pub state: Array1<f64>,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub info: StepInfo,
}

/// The part of a manipulation simulator the environment wrapper drives.
pub trait Simulator {
    fn reset(&mut self) -> Fallible<Array1<f64>>;

    fn step(&mut self, action: &[f64]) -> Fallible<SimTransition>;

    /// Renders from the camera selected by [Simulator::set_camera].
    fn render(&mut self) -> Fallible<RenderedFrame>;

    fn set_camera(&mut self, camera_name: &str);

    /// World positions of all cameras, `(num_cameras, 3)`.
    fn camera_positions(&self) -> Array2<f64>;

    /// Row-major world rotations of all cameras, `(num_cameras, 9)`.
    fn camera_rotations(&self) -> Array2<f64>;

    fn set_camera_position(&mut self, camera_id: usize, position: [f64; 3]);

    fn target_position(&self) -> [f64; 3];

    fn set_random_init(&mut self, random_init: bool);

    fn max_path_length(&self) -> usize;

    fn curr_path_length(&self) -> usize;
}
