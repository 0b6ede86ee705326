/// Represents intervals on the real-number axis. Any `Interval` covers at least 1 point.
/// There is no difference between open/closed intervals.
pub struct Interval {
    pub min: f32,
    pub max: f32,
}

/// 1 + \eps for f32. Multiply it to a `f32` number to get one that is larger by as little as
/// possible. The bounding-box slab test scales its far distance by this to keep rays that
/// graze a box edge from slipping between sibling boxes.
pub const ONE_PLUS_EPSILON: f32 = 1.0 + f32::EPSILON;

/// Computes the linear interpolation between `a` and `b`: (0, 1) -> (a, b).
///
/// This function also works if `a` and `b` are not "Scalable" by themselves - as long as `a-b`
/// can be scaled by a `f32`, and the difference can be added to either `a` or `b` to get back
/// `T` then `lerp` can be used. `Point3` can't be scaled, but the difference type `Vec3` can,
/// and point + vector is a point, so `lerp` works on 2 points.
pub fn lerp<T, U>(a: T, b: T, t: f32) -> T
where
    T: Copy + std::ops::Sub<T, Output = U>,
    U: Copy + std::ops::Mul<f32, Output = U> + std::ops::Add<T, Output = T>,
{
    (b - a) * t + a
}

pub trait Float: Sized {
    /// Returns the length of the other leg of a right triangle given the hypotenuse and a
    /// known one.
    fn cathetus(self, other: Self) -> Self;
    /// Computes `x / y` if y is nonzero; returns `None` if y is zero.
    fn try_divide(self, divisor: Self) -> Option<Self>;
}

impl Float for f32 {
    /// Computes the other right-angle side given the hypotenuse.
    /// Returns 0.0 if the hypotenuse (self) is shorter than the right-angle side.
    /// ```
    /// use math::float::Float;
    /// assert_eq!(1.0f32.cathetus(0.6), 0.8);
    /// assert_eq!(1.0f32.cathetus(-0.6), 0.8);
    /// ```
    fn cathetus(self, other: f32) -> f32 {
        (self.powi(2) - other.powi(2)).max(0.0).sqrt()
    }

    /// ```
    /// use math::float::Float;
    /// assert_eq!(1.0f32.try_divide(0.0), None);
    /// assert_eq!(1.0f32.try_divide(2.5), Some(0.4));
    /// ```
    fn try_divide(self, divisor: Self) -> Option<Self> {
        if divisor == 0.0 {
            None
        } else {
            Some(self / divisor)
        }
    }
}

impl Interval {
    /// Constructs an `Interval` with `a` and `b` being the endpoints.
    /// A comparison is made to determine which one is lesser / greater.
    pub fn new(a: f32, b: f32) -> Self {
        assert!(!a.is_nan());
        assert!(!b.is_nan());
        let (a, b) = min_max(a, b);
        Interval { min: a, max: b }
    }

    pub fn length(&self) -> f32 {
        assert!(self.max >= self.min);
        self.max - self.min
    }

    pub fn contains(&self, x: f32) -> bool {
        x >= self.min && x <= self.max
    }
}

pub fn min_max(a: f32, b: f32) -> (f32, f32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

pub trait Inside
where
    Self: std::cmp::PartialOrd + Sized + Copy,
{
    fn inside(self, interval: (Self, Self)) -> bool {
        let (left, right) = interval;
        left <= self && self <= right
    }
}

impl Inside for f32 {}

/// Solves `a x^2 + b x + c = 0` in the numerically stable form: the intermediate
/// `q = -0.5 (b + sign(b) sqrt(delta))` avoids catastrophic cancellation, and the two roots
/// are `q / a` and `c / q`. Returns the roots in increasing order, or `None` if delta < 0.
/// ```
/// let (x0, x1) = math::float::solve_quadratic(1.0, -5.0, 6.0).unwrap();
/// assert!((x0 - 2.0).abs() < 1e-6 && (x1 - 3.0).abs() < 1e-6);
/// assert!(math::float::solve_quadratic(1.0, 0.0, 1.0).is_none());
/// assert_eq!(math::float::solve_quadratic(3.0, 0.0, 0.0), Some((0.0, 0.0)));
/// ```
pub fn solve_quadratic(a: f32, b: f32, c: f32) -> Option<(f32, f32)> {
    if a == 0.0 {
        // Degenerate to linear; a double root keeps the caller's logic uniform.
        return (-c).try_divide(b).map(|t| (t, t));
    }
    let delta = b * b - 4.0 * a * c;
    if delta < 0.0 {
        return None;
    }
    let q = -0.5 * (b + b.signum() * delta.sqrt());
    if q == 0.0 {
        // b and c are both zero, so x^2 = 0; dividing by q would make a NaN root.
        return Some((0.0, 0.0));
    }
    let (x0, x1) = (q / a, c / q);
    Some(min_max(x0, x1))
}

#[macro_export]
macro_rules! assert_le {
    ($left:expr, $right:expr) => {
        if $left > $right {
            panic!(
                "Assertion failed: {} <= {} (values: {} vs. {})",
                stringify!($left),
                stringify!($right),
                $left,
                $right
            )
        }
    };
}

#[macro_export]
macro_rules! assert_near {
    ($left:expr, $right:expr, $tol:expr) => {
        if ($left - $right).abs() > $tol {
            panic!(
                "Assertion failed: {} ~ {} (values: {} vs. {})",
                stringify!($left),
                stringify!($right),
                $left,
                $right
            )
        }
    };
}
