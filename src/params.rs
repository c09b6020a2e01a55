// encoder input
pub const POSE_DIM: i64 = 16; // flattened 4x4 camera pose

// hyper-parameters: pixel encoder
pub const FEATURE_DIM: i64 = 63;
pub const NUM_LAYERS: i64 = 4;
pub const NUM_FILTERS: i64 = 32;
pub const FUSION_HIDDEN_DIM: i64 = 63;
pub const CONV_KERNEL_SIZE: i64 = 3;
pub const CONV_FIRST_STRIDE: i64 = 2;
pub const LAYER_NORM_EPS: f64 = 1e-5;

// conv output side per (resolution, layer count)
pub const OUT_DIM_64: [(i64, i64); 3] = [(2, 29), (4, 25), (6, 21)];
pub const OUT_DIM_84: [(i64, i64); 3] = [(2, 39), (4, 35), (6, 31)];
pub const OUT_DIM_128: [(i64, i64); 3] = [(2, 61), (4, 57), (6, 53)];

// rendering
pub const DEPTH_BACKGROUND_THRESHOLD: f64 = 0.999;
pub const BACKGROUND_VALUE: f64 = 255.0;
pub const AFFORDANCE_COLOR: [u8; 3] = [156, 104, 125];

// simulator camera layout: 4 built-in cameras first, 2 built-in cameras last
pub const CUSTOM_CAMERA_ID_OFFSET: usize = 4;
pub const CUSTOM_CAMERA_TRAILING: usize = 2;
pub const CUSTOM_CAMERA_PREFIX_LEN: usize = 6;

// camera perturbation ranges for multi-camera contrastive views
pub const PERTURB_LONGITUDE: i64 = 10;
pub const PERTURB_LATITUDE: i64 = 4;

// logging
pub const LOG_TAG_PREFIX: &str = "train_encoder";
pub const HISTOGRAM_BUCKETS: usize = 30;
