#![warn(missing_docs)]

//! Math types for the strake geometric kernel.
//!
//! Thin wrappers around nalgebra providing domain-specific types for
//! parametric-surface geometry: 3D points and directions, 2D parameter
//! points, tolerance constants, and small guarded linear solves used by
//! the Newton iterations throughout the kernel.

use nalgebra::{Matrix2, Matrix3, Unit, Vector2, Vector3};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A point in 2D parameter space.
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in 2D parameter space.
pub type Vec2 = Vector2<f64>;

/// Sentinel half-extent for unbounded parameter axes.
///
/// Surfaces with no natural bound on an axis report `±UNBOUNDED` instead
/// of infinities so that interval arithmetic on domains stays finite.
pub const UNBOUNDED: f64 = 1e10;

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance tolerance in mm.
    pub linear: f64,
    /// Angular tolerance in radians.
    pub angular: f64,
}

impl Tolerance {
    /// Default kernel tolerances (1e-6 mm linear, 1e-9 rad angular).
    pub const DEFAULT: Self = Self {
        linear: 1e-6,
        angular: 1e-9,
    };

    /// Check if two points are coincident within tolerance.
    pub fn points_equal(&self, a: &Point3, b: &Point3) -> bool {
        (a - b).norm() < self.linear
    }

    /// Check if a scalar distance is effectively zero.
    pub fn is_zero(&self, d: f64) -> bool {
        d.abs() < self.linear
    }

    /// Check if two angles are effectively equal (in radians).
    pub fn angles_equal(&self, a: f64, b: f64) -> bool {
        (a - b).abs() < self.angular
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Solve the 2×2 system `m · x = rhs`.
///
/// Returns `None` when the determinant is numerically zero relative to the
/// magnitude of the matrix entries. Callers treat a `None` as a retryable
/// local failure (subdivide and try again), never as a fatal error.
pub fn solve2(m: &Matrix2<f64>, rhs: &Vec2) -> Option<Vec2> {
    let det = m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)];
    let scale = m.amax();
    if det.abs() <= 1e-14 * scale * scale {
        return None;
    }
    Some(Vec2::new(
        (rhs.x * m[(1, 1)] - rhs.y * m[(0, 1)]) / det,
        (rhs.y * m[(0, 0)] - rhs.x * m[(1, 0)]) / det,
    ))
}

/// Solve the 3×3 system `m · x = rhs` by Cramer's rule with a determinant
/// guard. Same `None` contract as [`solve2`].
pub fn solve3(m: &Matrix3<f64>, rhs: &Vec3) -> Option<Vec3> {
    let det = m.determinant();
    let scale = m.amax();
    if det.abs() <= 1e-14 * scale * scale * scale {
        return None;
    }
    let mut mx = *m;
    mx.set_column(0, rhs);
    let mut my = *m;
    my.set_column(1, rhs);
    let mut mz = *m;
    mz.set_column(2, rhs);
    Some(Vec3::new(
        mx.determinant() / det,
        my.determinant() / det,
        mz.determinant() / det,
    ))
}

/// Eigenvalues of a symmetric 2×2 matrix, smallest first.
pub fn symmetric_eigenvalues_2(m: &Matrix2<f64>) -> (f64, f64) {
    let half_trace = 0.5 * (m[(0, 0)] + m[(1, 1)]);
    let det = m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)];
    let disc = (half_trace * half_trace - det).max(0.0).sqrt();
    (half_trace - disc, half_trace + disc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve2_regular() {
        let m = Matrix2::new(2.0, 1.0, 1.0, 3.0);
        let rhs = Vec2::new(5.0, 10.0);
        let x = solve2(&m, &rhs).unwrap();
        assert!((m * x - rhs).norm() < 1e-12);
    }

    #[test]
    fn test_solve2_singular() {
        let m = Matrix2::new(1.0, 2.0, 2.0, 4.0);
        assert!(solve2(&m, &Vec2::new(1.0, 1.0)).is_none());
    }

    #[test]
    fn test_solve3_regular() {
        let m = Matrix3::new(4.0, 1.0, 0.0, 1.0, 3.0, 1.0, 0.0, 1.0, 2.0);
        let rhs = Vec3::new(1.0, 2.0, 3.0);
        let x = solve3(&m, &rhs).unwrap();
        assert!((m * x - rhs).norm() < 1e-12);
    }

    #[test]
    fn test_solve3_singular() {
        // Rank 2: third row is the sum of the first two.
        let m = Matrix3::new(1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0, 1.0, 2.0);
        assert!(solve3(&m, &Vec3::new(1.0, 1.0, 1.0)).is_none());
    }

    #[test]
    fn test_symmetric_eigenvalues() {
        let m = Matrix2::new(2.0, 1.0, 1.0, 2.0);
        let (lo, hi) = symmetric_eigenvalues_2(&m);
        assert!((lo - 1.0).abs() < 1e-12);
        assert!((hi - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_tolerance_points_equal() {
        let tol = Tolerance::DEFAULT;
        let a = Point3::new(1.0, 2.0, 3.0);
        let b = Point3::new(1.0 + 1e-7, 2.0, 3.0);
        assert!(tol.points_equal(&a, &b));
        let c = Point3::new(1.001, 2.0, 3.0);
        assert!(!tol.points_equal(&a, &c));
    }
}
