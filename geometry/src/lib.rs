/// Defines the `BBox` bounding-box type.
pub mod bbox;
/// Diagram camera model: orthographic / perspective with principal-point shift.
pub mod camera;
/// Ray/primitive intersection kernels for spheres, triangles, quads and disks.
pub mod intersect;
/// The composite line primitive: capsule or truncated-cone body with cap or arrow ends.
pub mod line;
pub mod ray;

pub use bbox::BBox;
pub use camera::Camera;
pub use intersect::Hit;
pub use ray::{Ray, RAY_EPS};
