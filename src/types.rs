//! Shared domain types: poses and pose targets for the arm, gripper
//! commands, bin identifiers, and the detection snapshot that drives one
//! workflow instance.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CellError;

/// A full arm pose: position in millimetres, tool orientation in degrees
/// (yaw, pitch, roll).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, z: f64, a: f64, b: f64, c: f64) -> Self {
        Self { x, y, z, a, b, c }
    }

    /// Apply a partial target to this pose, returning the updated pose.
    pub fn apply(mut self, target: PoseTarget) -> Self {
        if let Some(x) = target.x {
            self.x = x;
        }
        if let Some(y) = target.y {
            self.y = y;
        }
        if let Some(z) = target.z {
            self.z = z;
        }
        if let Some(a) = target.a {
            self.a = a;
        }
        if let Some(b) = target.b {
            self.b = b;
        }
        if let Some(c) = target.c {
            self.c = c;
        }
        self
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.1}, {:.1}, {:.1} | {:.1}, {:.1}, {:.1})",
            self.x, self.y, self.z, self.a, self.b, self.c
        )
    }
}

/// A partial motion target. Axes left as `None` keep their current value,
/// mirroring how the arm accepts per-axis moves (move in z only, reorient
/// the tool only, and so on).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoseTarget {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub a: Option<f64>,
    pub b: Option<f64>,
    pub c: Option<f64>,
}

impl PoseTarget {
    /// Target a position, leaving the tool orientation unchanged.
    pub fn position(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
            ..Self::default()
        }
    }

    /// Target an x/y translation at the current height.
    pub fn translation(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    /// Target a height change only.
    pub fn height(z: f64) -> Self {
        Self {
            z: Some(z),
            ..Self::default()
        }
    }

    /// Target a tool orientation change only.
    pub fn orientation(a: f64, b: f64, c: f64) -> Self {
        Self {
            a: Some(a),
            b: Some(b),
            c: Some(c),
            ..Self::default()
        }
    }

    /// Target a complete pose.
    pub fn pose(pose: Pose) -> Self {
        Self {
            x: Some(pose.x),
            y: Some(pose.y),
            z: Some(pose.z),
            a: Some(pose.a),
            b: Some(pose.b),
            c: Some(pose.c),
        }
    }
}

impl fmt::Display for PoseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (axis, value) in [
            ("x", self.x),
            ("y", self.y),
            ("z", self.z),
            ("a", self.a),
            ("b", self.b),
            ("c", self.c),
        ] {
            if let Some(value) = value {
                if !first {
                    write!(f, " ")?;
                }
                write!(f, "{}={:.1}", axis, value)?;
                first = false;
            }
        }
        if first {
            write!(f, "(no axes)")?;
        }
        Ok(())
    }
}

/// The two commands the gripper accepts. Anything else is a contract
/// violation at the boundary where raw strings enter (config, CLI).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GripCommand {
    Open,
    Close,
}

impl GripCommand {
    /// Wire name the gripper transport sends over its byte stream.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Open => "open_claw",
            Self::Close => "close_claw",
        }
    }
}

impl fmt::Display for GripCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Close => write!(f, "close"),
        }
    }
}

impl FromStr for GripCommand {
    type Err = CellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" | "open_claw" => Ok(Self::Open),
            "close" | "close_claw" => Ok(Self::Close),
            other => Err(CellError::InvalidGripCommand(other.to_string())),
        }
    }
}

/// Destination bin identifier produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BinId(u8);

impl BinId {
    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for BinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bin {}", self.0)
    }
}

/// One detection reading in physical units: centre of the bounding region
/// plus its extent, and the detector's judgment of whether the object is
/// centred under the camera. Pixel-to-millimetre calibration happens behind
/// the [`DetectionSource`](crate::traits::DetectionSource) trait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub x_mm: f64,
    pub y_mm: f64,
    pub width_mm: f64,
    pub height_mm: f64,
    pub centered: bool,
}

/// Immutable snapshot of the object an admitted workflow will pick. Frozen
/// by the centering loop; every enqueued step captures a copy by value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectSnapshot {
    pub x_mm: f64,
    pub y_mm: f64,
    pub width_mm: f64,
    pub height_mm: f64,
}

impl ObjectSnapshot {
    pub fn from_detection(detection: &Detection) -> Self {
        Self {
            x_mm: detection.x_mm,
            y_mm: detection.y_mm,
            width_mm: detection.width_mm,
            height_mm: detection.height_mm,
        }
    }
}
