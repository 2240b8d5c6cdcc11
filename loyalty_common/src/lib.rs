mod points;

pub mod helpers;
pub mod op;
mod secret;

pub use points::{Points, PointsConversionError, POINTS_SCALE};
pub use secret::Secret;
