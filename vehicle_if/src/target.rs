//! # Tracked target input definitions
//!
//! The vision pipeline supplies one [`TargetCoordinates`] per guidance cycle. The guidance
//! software makes no assumption about the pipeline's production rate, only that each value is a
//! complete observation of the target at some instant.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Point2;
use serde::{Serialize, Deserialize};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// The position of the tracked target, as reported by the vision pipeline.
///
/// The auxiliary geometry fields are independent of each other, a pipeline with a rangefinder
/// and a gimbal supplies both. Some guidance strategies cannot run without a particular piece
/// of auxiliary geometry, for example distance-hold needs a measured range. Strategies reject
/// targets missing their required geometry rather than guessing.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetCoordinates {
    /// The position of the target centre in the camera image in pixels.
    ///
    /// The origin is the top left corner of the image, with X+ to the right and Y+ down.
    pub position_px: Point2<f64>,

    /// The measured straight-line range to the target, if the pipeline provides one.
    ///
    /// Units: meters
    pub range_m: Option<f64>,

    /// The camera gimbal angles at which the target is centred, if the camera is mounted on a
    /// tracking gimbal.
    pub gimbal_angles: Option<GimbalAngles>,

    /// The tracked bounding box extents, if the pipeline provides them.
    pub bounding_box: Option<BoundingBox>
}

/// Camera gimbal angles relative to the vehicle body frame.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GimbalAngles {
    /// Pan angle, positive to the right of the body X+ axis.
    ///
    /// Units: radians
    pub pan_rad: f64,

    /// Tilt angle, positive below the body horizontal plane.
    ///
    /// Units: radians
    pub tilt_rad: f64
}

/// Tracked bounding box extents in the camera image.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Units: pixels
    pub width_px: f64,

    /// Units: pixels
    pub height_px: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TargetCoordinates {
    /// Create a new target at the given image position with no auxiliary geometry.
    pub fn new(x_px: f64, y_px: f64) -> Self {
        Self {
            position_px: Point2::new(x_px, y_px),
            range_m: None,
            gimbal_angles: None,
            bounding_box: None
        }
    }

    /// Attach a measured range to the target.
    pub fn with_range(mut self, range_m: f64) -> Self {
        self.range_m = Some(range_m);
        self
    }

    /// Attach the gimbal angles at which the target is centred.
    pub fn with_gimbal_angles(mut self, pan_rad: f64, tilt_rad: f64) -> Self {
        self.gimbal_angles = Some(GimbalAngles { pan_rad, tilt_rad });
        self
    }

    /// Attach the tracked bounding box extents.
    pub fn with_bounding_box(mut self, width_px: f64, height_px: f64) -> Self {
        self.bounding_box = Some(BoundingBox {
            width_px,
            height_px
        });
        self
    }

    /// True if the position and all present auxiliary geometry are finite.
    pub fn is_valid(&self) -> bool {
        if !(self.position_px.x.is_finite() && self.position_px.y.is_finite()) {
            return false;
        }

        if let Some(range_m) = self.range_m {
            if !range_m.is_finite() {
                return false;
            }
        }

        if let Some(angles) = self.gimbal_angles {
            if !(angles.pan_rad.is_finite() && angles.tilt_rad.is_finite()) {
                return false;
            }
        }

        if let Some(bounding_box) = self.bounding_box {
            if !(bounding_box.width_px.is_finite() && bounding_box.height_px.is_finite()) {
                return false;
            }
        }

        true
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
