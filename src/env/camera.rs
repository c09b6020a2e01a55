use crate::{common::*, error::EnvError, params};

/// Maps a custom camera name to its simulator camera id.
///
/// The number after the 6-character prefix is offset past the built-in
/// cameras, e.g. `custom3` has id 7.
pub fn camera_id(name: &str) -> Result<usize, EnvError> {
    let index = name
        .get(params::CUSTOM_CAMERA_PREFIX_LEN..)
        .and_then(|suffix| suffix.parse::<usize>().ok())
        .ok_or_else(|| EnvError::CameraName(name.to_owned()))?;
    Ok(params::CUSTOM_CAMERA_ID_OFFSET + index)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraPoses {
    /// `(n, 4, 4)` homogeneous camera-to-world transforms.
    pub poses: Array3<f64>,
    /// `(n, 3)`
    pub positions: Array2<f64>,
    /// `(n, 9)`
    pub rotations: Array2<f64>,
}

impl CameraPoses {
    pub fn len(&self) -> usize {
        self.poses.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattened poses as a `(n, 16)` float tensor.
    pub fn pose_vectors(&self, device: Device) -> Tensor {
        let values = self.poses.iter().map(|&value| value as f32).collect_vec();
        Tensor::of_slice(&values)
            .view([self.len() as i64, 16])
            .to_device(device)
    }
}

/// Assembles camera pose matrices from simulator camera buffers.
///
/// Without `ids`, the custom cameras are selected, which sit between the 4
/// leading and 2 trailing built-in cameras.
pub fn camera_poses(
    positions: ArrayView2<'_, f64>,
    rotations: ArrayView2<'_, f64>,
    ids: Option<&[usize]>,
) -> Result<CameraPoses, EnvError> {
    let num_cameras = positions.nrows();
    if positions.ncols() != 3 || rotations.dim() != (num_cameras, 9) {
        return Err(EnvError::Shape(format!(
            "expect camera positions (n, 3) and rotations (n, 9), but get {:?} and {:?}",
            positions.dim(),
            rotations.dim()
        )));
    }

    let (positions, rotations) = match ids {
        Some(ids) => {
            if let Some(&id) = ids.iter().find(|&&id| id >= num_cameras) {
                return Err(EnvError::Configuration(format!(
                    "camera id {} is out of range for {} cameras",
                    id, num_cameras
                )));
            }
            (
                positions.select(Axis(0), ids),
                rotations.select(Axis(0), ids),
            )
        }
        None => {
            let begin = params::CUSTOM_CAMERA_ID_OFFSET;
            let end = num_cameras.saturating_sub(params::CUSTOM_CAMERA_TRAILING);
            if end < begin {
                return Err(EnvError::Configuration(format!(
                    "{} cameras leave no room for custom cameras",
                    num_cameras
                )));
            }
            (
                positions.slice(s![begin..end, ..]).to_owned(),
                rotations.slice(s![begin..end, ..]).to_owned(),
            )
        }
    };

    let num_selected = positions.nrows();
    let mut poses = Array3::<f64>::zeros((num_selected, 4, 4));
    for index in 0..num_selected {
        for row in 0..3 {
            for col in 0..3 {
                poses[[index, row, col]] = rotations[[index, row * 3 + col]];
            }
            poses[[index, row, 3]] = positions[[index, row]];
        }
        poses[[index, 3, 3]] = 1.0;
    }

    Ok(CameraPoses {
        poses,
        positions,
        rotations,
    })
}

/// Picks a neighboring view camera `cam2_{b+φ}_{c+ψ}` for a camera named `cam_b_c`.
pub fn perturbed_camera_name<R>(name: &str, rng: &mut R) -> Result<String, EnvError>
where
    R: Rng + ?Sized,
{
    let (longitude, latitude) = match name.split('_').collect_vec().as_slice() {
        [_, longitude, latitude] => {
            let parse = |text: &str| {
                text.parse::<i64>()
                    .map_err(|_| EnvError::CameraName(name.to_owned()))
            };
            (parse(*longitude)?, parse(*latitude)?)
        }
        _ => return Err(EnvError::CameraName(name.to_owned())),
    };

    let (phi, psi) = loop {
        let phi = rng.gen_range(-params::PERTURB_LONGITUDE..=params::PERTURB_LONGITUDE);
        let psi = rng.gen_range(-params::PERTURB_LATITUDE..=params::PERTURB_LATITUDE);
        if phi != 0 || psi != 0 {
            break (phi, psi);
        }
    };

    Ok(format!("cam2_{}_{}", longitude + phi, latitude + psi))
}
