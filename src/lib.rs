pub mod cli;
pub mod cluster;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod pipeline;
pub mod preview;
pub mod transform;

pub use cli::Cli;
pub use cluster::{partition_points, KMeansCriteria, Partition};
pub use detection::{detect_regions, Detection};
pub use error::TrimError;
pub use geometry::{min_area_rect, order_corners, Point, RotatedRect};
pub use pipeline::{
    to_output_image, trim_image, trim_regions, TransformKind, TrimOptions, TrimmedRegion,
};
pub use preview::write_previews;
pub use transform::{rotate_crop_to_rect, warp, CropTransform};
