pub mod coordinates;
pub mod winding;
pub mod preprocessing;
pub mod extraction;
pub mod detection;
pub mod repair;

pub use coordinates::*;
pub use winding::*;
pub use preprocessing::*;
pub use extraction::*;
pub use detection::*;
pub use repair::*;
