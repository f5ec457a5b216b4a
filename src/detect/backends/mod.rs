pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::StubBackend;

#[cfg(feature = "backend-tract")]
pub use tract::{TractPlateReader, TractYoloDetector};
