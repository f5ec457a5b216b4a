use std::fmt;
use std::marker::PhantomData;

use anyhow::{anyhow, Result};
use serde::ser::{Serialize, SerializeStruct, SerializeTuple, Serializer};

use super::labels::Label;

/// Marker for the coordinate space a box is expressed in.
///
/// Boxes are never implicitly global: a box only makes sense relative to the
/// buffer it was produced against. The space is carried in the type so a
/// vehicle-crop box cannot be drawn on (or cropped out of) the full frame by
/// accident.
pub trait CoordinateSpace: Copy + fmt::Debug + Send + Sync + 'static {
    const NAME: &'static str;
}

/// Whatever image was handed to a collaborator. Collaborator output is
/// retagged into a concrete space by the caller that knows which buffer it was.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Local;

/// The full input frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSpace;

/// A vehicle crop; its origin is the vehicle box's top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VehicleSpace;

impl CoordinateSpace for Local {
    const NAME: &'static str = "local";
}

impl CoordinateSpace for FrameSpace {
    const NAME: &'static str = "frame";
}

impl CoordinateSpace for VehicleSpace {
    const NAME: &'static str = "vehicle";
}

/// Axis-aligned box `(x1, y1, x2, y2)` with `x1 <= x2` and `y1 <= y2`.
pub struct BoundingBox<S: CoordinateSpace = Local> {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    space: PhantomData<S>,
}

impl<S: CoordinateSpace> BoundingBox<S> {
    /// Build a box, rejecting inverted corners.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Self> {
        if x1 > x2 || y1 > y2 {
            return Err(anyhow!(
                "invalid {} box ({}, {}, {}, {}): corners are inverted",
                S::NAME,
                x1,
                y1,
                x2,
                y2
            ));
        }
        Ok(Self::raw(x1, y1, x2, y2))
    }

    /// Build a box from two arbitrary corners.
    pub fn from_corners(ax: i32, ay: i32, bx: i32, by: i32) -> Self {
        Self::raw(ax.min(bx), ay.min(by), ax.max(bx), ay.max(by))
    }

    fn raw(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            space: PhantomData,
        }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    pub fn as_tuple(&self) -> (i32, i32, i32, i32) {
        (self.x1, self.y1, self.x2, self.y2)
    }

    /// Intersection over union with another box in the same space.
    pub fn iou(&self, other: &Self) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0) as i64 * (iy2 - iy1).max(0) as i64;
        if inter == 0 {
            return 0.0;
        }
        let union = self.area() + other.area() - inter;
        inter as f32 / union as f32
    }

    /// Reinterpret the box in another space without moving it.
    ///
    /// Only valid when the caller knows the box was produced against a buffer
    /// of space `T` (e.g. collaborator output for a vehicle crop).
    pub fn reframe<T: CoordinateSpace>(self) -> BoundingBox<T> {
        BoundingBox::raw(self.x1, self.y1, self.x2, self.y2)
    }

    /// Translate the box by `(dx, dy)` into space `T`.
    fn shifted<T: CoordinateSpace>(&self, dx: i32, dy: i32) -> BoundingBox<T> {
        BoundingBox::raw(self.x1 + dx, self.y1 + dy, self.x2 + dx, self.y2 + dy)
    }
}

impl BoundingBox<VehicleSpace> {
    /// Map a vehicle-crop box back into the frame, given the vehicle's frame box.
    pub fn to_frame(&self, vehicle: &BoundingBox<FrameSpace>) -> BoundingBox<FrameSpace> {
        self.shifted(vehicle.x1, vehicle.y1)
    }
}

// Manual impls: derives would put bounds on `S` through `PhantomData`.

impl<S: CoordinateSpace> Clone for BoundingBox<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: CoordinateSpace> Copy for BoundingBox<S> {}

impl<S: CoordinateSpace> PartialEq for BoundingBox<S> {
    fn eq(&self, other: &Self) -> bool {
        self.as_tuple() == other.as_tuple()
    }
}

impl<S: CoordinateSpace> Eq for BoundingBox<S> {}

impl<S: CoordinateSpace> fmt::Debug for BoundingBox<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BoundingBox<{}>({}, {}, {}, {})",
            S::NAME,
            self.x1,
            self.y1,
            self.x2,
            self.y2
        )
    }
}

impl<S: CoordinateSpace> fmt::Display for BoundingBox<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

/// Serialized as a plain 4-tuple of integers.
impl<S: CoordinateSpace> Serialize for BoundingBox<S> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        let mut tuple = serializer.serialize_tuple(4)?;
        tuple.serialize_element(&self.x1)?;
        tuple.serialize_element(&self.y1)?;
        tuple.serialize_element(&self.x2)?;
        tuple.serialize_element(&self.y2)?;
        tuple.end()
    }
}

/// One detected object. Immutable once constructed.
pub struct DetectionResult<S: CoordinateSpace = Local> {
    label: Label,
    confidence: f32,
    bbox: BoundingBox<S>,
}

impl<S: CoordinateSpace> DetectionResult<S> {
    /// Confidence is clamped into `[0, 1]`.
    pub fn new(label: Label, confidence: f32, bbox: BoundingBox<S>) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            label,
            confidence,
            bbox,
        }
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn class_name(&self) -> &'static str {
        self.label.as_str()
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bbox(&self) -> &BoundingBox<S> {
        &self.bbox
    }

    /// Retag the detection with the space of the buffer it was produced against.
    pub fn reframe<T: CoordinateSpace>(self) -> DetectionResult<T> {
        DetectionResult {
            label: self.label,
            confidence: self.confidence,
            bbox: self.bbox.reframe(),
        }
    }
}

impl<S: CoordinateSpace> Clone for DetectionResult<S> {
    fn clone(&self) -> Self {
        Self {
            label: self.label,
            confidence: self.confidence,
            bbox: self.bbox,
        }
    }
}

impl<S: CoordinateSpace> PartialEq for DetectionResult<S> {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label && self.confidence == other.confidence && self.bbox == other.bbox
    }
}

impl<S: CoordinateSpace> fmt::Debug for DetectionResult<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} ({:.2}) at {}>",
            self.class_name(),
            self.confidence,
            self.bbox
        )
    }
}

/// Serialized as `{class_name, confidence, box}`.
impl<S: CoordinateSpace> Serialize for DetectionResult<S> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        let mut state = serializer.serialize_struct("DetectionResult", 3)?;
        state.serialize_field("class_name", self.class_name())?;
        state.serialize_field("confidence", &self.confidence)?;
        state.serialize_field("box", &self.bbox)?;
        state.end()
    }
}
