/// Defines useful functions for common math operations, tools and constants:
/// - 1D interval and min/max helpers,
/// - Simple interpolation on not only primitive types,
/// - Macros to check if two math quantities are close to each other.
pub mod float;

/// Homogeneous-coordinate maths module.
/// - Types: 3D points and vectors, 2D screen vectors, 3x3 matrices.
/// - Type `Frame` for rigid object-to-world and camera transforms.
/// - Function `normalize()` to build a normalized `Vec3`.
/// - Function `make_coord_system()` to build an orthogonal base from a `Vec3`.
pub mod hcm;
