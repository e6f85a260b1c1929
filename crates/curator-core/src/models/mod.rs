//! Domain models shared across components.

pub mod image;
pub mod time;
pub mod upload;

pub use image::{
    CameraInfo, ExistingPage, ImageCreator, ImageDates, ImageDimensions, ImageLocation, ImageUrls,
    Label, MediaImage,
};
pub use upload::{
    Batch, BatchStats, BatchUploadItem, ErrorLink, NewUploadItem, Preset, UploadDelta,
    UploadError, UploadRequest, UploadStatus, User,
};
