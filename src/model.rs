pub mod geometry;
pub mod isochrone;
pub mod report;
pub mod route;
pub mod stop;

pub use geometry::*;
pub use isochrone::*;
pub use report::*;
pub use route::*;
pub use stop::*;
