//! Camera intrinsics and the extrinsic pose trajectory baked into the scene

use log::debug;
use nalgebra as na;

use crate::error::{Error, Result};
use crate::render::RenderBackend;

/// Number of poses sampled from the scene's camera path
pub const TRAJECTORY_FRAMES: usize = 60;

/// Pinhole calibration of the camera used to record the reference footage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Intrinsics {
    pub fn calibrated() -> Self {
        Self {
            fx: 605.455139160156,
            fy: 604.331848144531,
            cx: 325.368804931641,
            cy: 248.078979492188,
        }
    }

    /// `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`
    pub fn k_matrix(&self) -> na::Matrix3<f64> {
        na::Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    pub fn from_k_matrix(k: &na::Matrix3<f64>) -> Result<Self> {
        if k[(0, 1)] != 0.0 {
            return Err(Error::InvalidIntrinsics(format!(
                "skew must be zero, got {}",
                k[(0, 1)]
            )));
        }
        if k[(1, 0)] != 0.0 || k[(2, 0)] != 0.0 || k[(2, 1)] != 0.0 || k[(2, 2)] != 1.0 {
            return Err(Error::InvalidIntrinsics(
                "expected the form [[fx, 0, cx], [0, fy, cy], [0, 0, 1]]".to_string(),
            ));
        }
        if k[(0, 0)] <= 0.0 || k[(1, 1)] <= 0.0 {
            return Err(Error::InvalidIntrinsics(
                "focal lengths must be positive".to_string(),
            ));
        }

        Ok(Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        })
    }

    /// Horizontal and vertical field of view in radians for the given resolution
    pub fn field_of_view(&self, width: u32, height: u32) -> (f64, f64) {
        (
            2.0 * (width as f64 / (2.0 * self.fx)).atan(),
            2.0 * (height as f64 / (2.0 * self.fy)).atan(),
        )
    }
}

impl Default for Intrinsics {
    fn default() -> Self {
        Self::calibrated()
    }
}

/// Camera world transform split into location, rotation and scale
#[derive(Debug, Clone, PartialEq)]
pub struct CameraPose {
    pub location: na::Vector3<f64>,
    pub rotation: na::UnitQuaternion<f64>,
    pub scale: na::Vector3<f64>,
}

impl CameraPose {
    pub fn new(
        location: na::Vector3<f64>,
        rotation: na::UnitQuaternion<f64>,
        scale: na::Vector3<f64>,
    ) -> Self {
        Self {
            location,
            rotation,
            scale,
        }
    }

    /// Decompose an affine world matrix. A mirrored basis is folded into a negative scale.
    pub fn from_matrix(matrix: &na::Matrix4<f64>) -> Self {
        let location = matrix.fixed_view::<3, 1>(0, 3).into_owned();
        let linear = matrix.fixed_view::<3, 3>(0, 0).into_owned();

        let mut scale = na::Vector3::new(
            linear.column(0).norm(),
            linear.column(1).norm(),
            linear.column(2).norm(),
        );
        if linear.determinant() < 0.0 {
            scale = -scale;
        }

        let mut basis = linear;
        for (i, s) in scale.iter().enumerate() {
            if *s != 0.0 {
                basis.column_mut(i).unscale_mut(*s);
            }
        }
        let rotation = na::UnitQuaternion::from_rotation_matrix(
            &na::Rotation3::from_matrix_unchecked(basis),
        );

        Self {
            location,
            rotation,
            scale,
        }
    }

    /// Compose translation, rotation and scale back into a 4x4 matrix
    pub fn to_matrix(&self) -> na::Matrix4<f64> {
        na::Matrix4::new_translation(&self.location)
            * self.rotation.to_homogeneous()
            * na::Matrix4::new_nonuniform_scaling(&self.scale)
    }
}

/// The camera path sampled frame by frame from the open scene
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    poses: Vec<CameraPose>,
}

impl Trajectory {
    pub fn new(poses: Vec<CameraPose>) -> Self {
        Self { poses }
    }

    /// Step the scene through `frames` frames and record the camera pose of each one.
    /// Scene frames are numbered from 1.
    pub fn sample<B: RenderBackend + ?Sized>(backend: &mut B, frames: usize) -> Result<Self> {
        let mut poses = Vec::with_capacity(frames);
        for frame in 0..frames {
            let matrix_world = backend.camera_pose_at(frame as u32 + 1)?;
            let pose = CameraPose::from_matrix(&matrix_world);
            debug!("Frame {}: camera at {:?}", frame, pose.location.as_slice());
            poses.push(pose);
        }
        Ok(Self { poses })
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn pose(&self, frame: usize) -> Result<&CameraPose> {
        self.poses.get(frame).ok_or(Error::FrameOutOfRange {
            frame,
            available: self.poses.len(),
        })
    }

    /// Fail unless the first `frames` poses are all available
    pub fn check_frames(&self, frames: usize) -> Result<()> {
        if frames > self.poses.len() {
            return Err(Error::FrameOutOfRange {
                frame: self.poses.len(),
                available: self.poses.len(),
            });
        }
        Ok(())
    }
}
