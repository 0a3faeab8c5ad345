//! Exit-aperture detectors.
//!
//! A detector is a circular region on an axis-aligned plane. The walker asks
//! two questions of it: does a point lie inside the aperture, and did the
//! last hop's segment cross it.

use crate::common::Float;
use crate::geometry::{Point3f, Vector3f};

/// Slack applied to the segment parameter and the radial test.
const CROSSING_EPSILON: Float = 1e-13;

/// The axis-aligned planes a detector can be oriented on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DetectorPlane {
    /// Plane spanned by x and y (normal along z).
    XY,

    /// Plane spanned by x and z (normal along y).
    XZ,

    /// Plane spanned by y and z (normal along x).
    YZ,
}

impl DetectorPlane {
    /// Returns the plane normal.
    pub fn normal(&self) -> Vector3f {
        match self {
            Self::XY => Vector3f::new(0.0, 0.0, 1.0),
            Self::XZ => Vector3f::new(0.0, 1.0, 0.0),
            Self::YZ => Vector3f::new(1.0, 0.0, 0.0),
        }
    }
}

/// A circular aperture on an axis-aligned plane. Immutable after
/// construction.
#[derive(Clone, Debug)]
pub struct CircularDetector {
    /// Center of the aperture; also fixes the plane position.
    center: Point3f,

    /// Radius of the aperture.
    radius: Float,

    /// Orientation of the detector plane.
    plane: DetectorPlane,
}

impl CircularDetector {
    /// Create a new `CircularDetector`.
    ///
    /// * `center` - Center of the aperture.
    /// * `radius` - Radius of the aperture.
    /// * `plane`  - Orientation of the detector plane.
    pub fn new(center: Point3f, radius: Float, plane: DetectorPlane) -> Self {
        Self {
            center,
            radius,
            plane,
        }
    }

    /// Returns true when the point projects inside the aperture.
    ///
    /// * `p` - The point.
    pub fn contains(&self, p: &Point3f) -> bool {
        let d = *p - self.center;
        let r2 = match self.plane {
            DetectorPlane::XY => d.x * d.x + d.y * d.y,
            DetectorPlane::XZ => d.x * d.x + d.z * d.z,
            DetectorPlane::YZ => d.y * d.y + d.z * d.z,
        };
        r2 <= self.radius * self.radius + CROSSING_EPSILON
    }

    /// Returns true when the segment from `p_prev` to `p_curr` passes
    /// through the aperture.
    ///
    /// * `p_prev` - Segment start.
    /// * `p_curr` - Segment end.
    pub fn crossed_by(&self, p_prev: &Point3f, p_curr: &Point3f) -> bool {
        let n = self.plane.normal();
        let denom = n.dot(&(*p_curr - *p_prev));
        if denom == 0.0 {
            // Segment parallel to the detector plane.
            return false;
        }
        let u = n.dot(&(self.center - *p_prev)) / denom;
        if !(0.0..=1.0 + CROSSING_EPSILON).contains(&u) {
            return false;
        }
        let hit = *p_prev + u * (*p_curr - *p_prev);
        let d = hit - self.center;
        d.dot(&d) <= self.radius * self.radius + CROSSING_EPSILON
    }

    /// Returns the center of the aperture.
    pub fn center(&self) -> Point3f {
        self.center
    }

    /// Returns the radius of the aperture.
    pub fn radius(&self) -> Float {
        self.radius
    }

    /// Returns the orientation of the detector plane.
    pub fn plane(&self) -> DetectorPlane {
        self.plane
    }
}
