mod backend;
pub mod backends;
mod labels;
mod registry;
mod result;

pub use backend::{ObjectDetector, PlateDetector, TextReading, TextRecognizer, TopDetection};
pub use backends::StubBackend;
pub use labels::{BrandClass, DamageClass, Label, LabelFamily, VehicleClass};
pub use registry::{BackendKind, DetectorSuite};
pub use result::{
    BoundingBox, CoordinateSpace, DetectionResult, FrameSpace, Local, VehicleSpace,
};
