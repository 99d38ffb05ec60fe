//! Boundary to an external Perspective-n-Point solver.
//!
//! This module only shapes data: it turns four assigned markers into the
//! image/object correspondences a solver expects, and turns the solver's
//! Rodrigues rotation vector and translation back into a [`Pose`]. Solving is
//! left to an implementation of [`PoseSolver`].

use nalgebra::{Isometry3, Matrix3, Point2, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::tracking::{MarkerSlot, Point, tracker::image_points};

/// Lens effective focal length in meters.
const EFFECTIVE_FOCAL_LENGTH_M: f64 = 1.484307e-3;
/// Physical pixel pitch in meters.
const PIXEL_PITCH_M: f64 = 11e-6;
/// Physical pixels per sensor axis.
const NATIVE_PIXELS: f64 = 98.0;

/// Pinhole intrinsics in pixels of the reported (interpolated) resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraIntrinsics {
    /// Intrinsics of the sensor optics at the given output resolution.
    ///
    /// The sensor interpolates its 98x98 array up to the configured
    /// resolution, so focal length scales with it. The principal point is the
    /// image centre.
    pub fn from_resolution(resolution_x: u16, resolution_y: u16) -> Self {
        let sensor_size = PIXEL_PITCH_M * NATIVE_PIXELS;
        let rx = f64::from(resolution_x);
        let ry = f64::from(resolution_y);
        Self {
            fx: EFFECTIVE_FOCAL_LENGTH_M * rx / sensor_size,
            fy: EFFECTIVE_FOCAL_LENGTH_M * ry / sensor_size,
            cx: 0.5 * rx,
            cy: 0.5 * ry,
        }
    }

    /// The 3x3 camera matrix.
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    /// Project a camera-space point to pixels.
    pub fn project(&self, point: &Point3<f64>) -> Point2<f64> {
        Point2::new(self.fx * point.x / point.z + self.cx, self.fy * point.y / point.z + self.cy)
    }
}

/// Physical size of the marker rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetGeometry {
    pub width_m: f64,
    pub height_m: f64,
}

impl Default for TargetGeometry {
    fn default() -> Self {
        Self { width_m: 0.08, height_m: 0.03 }
    }
}

impl TargetGeometry {
    /// Marker positions in target space, canonical order, centred on the origin.
    pub fn object_points(&self) -> [Point3<f64>; 4] {
        let w = 0.5 * self.width_m;
        let h = 0.5 * self.height_m;
        [
            Point3::new(-w, h, 0.0),
            Point3::new(w, h, 0.0),
            Point3::new(-w, -h, 0.0),
            Point3::new(w, -h, 0.0),
        ]
    }
}

/// Input handed to a [`PoseSolver`].
#[derive(Debug, Clone, PartialEq)]
pub struct PnpProblem {
    pub object_points: [Point3<f64>; 4],
    pub image_points: [Point2<f64>; 4],
    pub intrinsics: CameraIntrinsics,
}

/// Raw solver result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOutput {
    /// Rodrigues rotation vector: axis scaled by angle in radians.
    pub rotation: Vector3<f64>,
    pub translation: Vector3<f64>,
}

/// A Perspective-n-Point solver. `None` means no solution this frame.
pub trait PoseSolver {
    fn solve(&mut self, problem: &PnpProblem) -> Option<SolverOutput>;
}

impl<F> PoseSolver for F
where
    F: FnMut(&PnpProblem) -> Option<SolverOutput>,
{
    fn solve(&mut self, problem: &PnpProblem) -> Option<SolverOutput> {
        self(problem)
    }
}

/// Target pose in camera space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
}

impl Pose {
    pub fn from_solver(output: &SolverOutput) -> Self {
        Self { rotation: Rotation3::new(output.rotation), translation: output.translation }
    }

    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(self.translation),
            UnitQuaternion::from_rotation_matrix(&self.rotation),
        )
    }

    /// Distance from the camera to the target origin.
    pub fn distance(&self) -> f64 {
        self.translation.norm()
    }
}

/// Feeds tracked markers to a solver.
pub struct PoseEstimator<P> {
    solver: P,
    intrinsics: CameraIntrinsics,
    object_points: [Point3<f64>; 4],
}

impl<P: PoseSolver> PoseEstimator<P> {
    pub fn new(solver: P, intrinsics: CameraIntrinsics, target: TargetGeometry) -> Self {
        Self { solver, intrinsics, object_points: target.object_points() }
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    /// Build the solver input; `None` unless every marker is assigned.
    pub fn problem(&self, markers: &[MarkerSlot; 4]) -> Option<PnpProblem> {
        let points = image_points(markers)?;
        Some(PnpProblem {
            object_points: self.object_points,
            image_points: points.map(|p: Point| Point2::new(f64::from(p.x), f64::from(p.y))),
            intrinsics: self.intrinsics,
        })
    }

    /// Pose for this frame's markers, if they are all assigned and the solver succeeds.
    pub fn estimate(&mut self, markers: &[MarkerSlot; 4]) -> Option<Pose> {
        let Some(problem) = self.problem(markers) else {
            trace!("Skipping pose: not every marker is assigned");
            return None;
        };
        match self.solver.solve(&problem) {
            Some(output) => Some(Pose::from_solver(&output)),
            None => {
                debug!("Pose solver found no solution");
                None
            }
        }
    }
}
