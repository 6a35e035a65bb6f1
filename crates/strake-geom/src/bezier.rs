//! Bicubic Bézier patch.
//!
//! The free-form collaborator used to exercise the generic kernel paths:
//! no closed-form intersections exist for it, so every query goes through
//! the cell hull index and Newton iteration.

use std::any::Any;

use strake_math::{Point2, Point3, Vec3};

use crate::{Surface, SurfaceKind};

/// Cubic Bernstein basis at `t`.
fn bernstein3(t: f64) -> [f64; 4] {
    let s = 1.0 - t;
    [s * s * s, 3.0 * t * s * s, 3.0 * t * t * s, t * t * t]
}

/// First derivative of the cubic Bernstein basis at `t`.
fn d_bernstein3(t: f64) -> [f64; 4] {
    let s = 1.0 - t;
    [
        -3.0 * s * s,
        3.0 * s * s - 6.0 * t * s,
        6.0 * t * s - 3.0 * t * t,
        3.0 * t * t,
    ]
}

/// Second derivative of the cubic Bernstein basis at `t`.
fn d2_bernstein3(t: f64) -> [f64; 4] {
    let s = 1.0 - t;
    [
        6.0 * s,
        -12.0 * s + 6.0 * t,
        6.0 * s - 12.0 * t,
        6.0 * t,
    ]
}

/// A bicubic Bézier patch over `(u, v) ∈ [0, 1]²`.
///
/// `P(u, v) = Σᵢⱼ Bᵢ(u) Bⱼ(v) · cp[i][j]` with cubic Bernstein basis B.
#[derive(Debug, Clone)]
pub struct BezierPatch {
    /// Control net, `cp[i][j]` with i along u and j along v.
    pub control_points: [[Point3; 4]; 4],
}

impl BezierPatch {
    /// Create a patch from its 4×4 control net.
    pub fn new(control_points: [[Point3; 4]; 4]) -> Self {
        Self { control_points }
    }

    /// Create a height-field patch over `[x0, x1] × [y0, y1]` with the
    /// given 4×4 grid of z heights (`heights[i][j]`, i along x).
    pub fn from_heights(x_range: (f64, f64), y_range: (f64, f64), heights: [[f64; 4]; 4]) -> Self {
        let mut cp = [[Point3::origin(); 4]; 4];
        for (i, row) in heights.iter().enumerate() {
            for (j, &z) in row.iter().enumerate() {
                let x = x_range.0 + (x_range.1 - x_range.0) * i as f64 / 3.0;
                let y = y_range.0 + (y_range.1 - y_range.0) * j as f64 / 3.0;
                cp[i][j] = Point3::new(x, y, z);
            }
        }
        Self::new(cp)
    }

    fn tensor(&self, bu: &[f64; 4], bv: &[f64; 4]) -> Vec3 {
        let mut acc = Vec3::zeros();
        for i in 0..4 {
            for j in 0..4 {
                acc += bu[i] * bv[j] * self.control_points[i][j].coords;
            }
        }
        acc
    }
}

impl Surface for BezierPatch {
    fn evaluate(&self, uv: Point2) -> Point3 {
        Point3::from(self.tensor(&bernstein3(uv.x), &bernstein3(uv.y)))
    }

    fn d_du(&self, uv: Point2) -> Vec3 {
        self.tensor(&d_bernstein3(uv.x), &bernstein3(uv.y))
    }

    fn d_dv(&self, uv: Point2) -> Vec3 {
        self.tensor(&bernstein3(uv.x), &d_bernstein3(uv.y))
    }

    fn d_duu(&self, uv: Point2) -> Vec3 {
        self.tensor(&d2_bernstein3(uv.x), &bernstein3(uv.y))
    }

    fn d_dvv(&self, uv: Point2) -> Vec3 {
        self.tensor(&bernstein3(uv.x), &d2_bernstein3(uv.y))
    }

    fn d_duv(&self, uv: Point2) -> Vec3 {
        self.tensor(&d_bernstein3(uv.x), &d_bernstein3(uv.y))
    }

    fn domain(&self) -> ((f64, f64), (f64, f64)) {
        ((0.0, 1.0), (0.0, 1.0))
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::BezierPatch
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
