//! Curve types and the tetrahedral-hull decomposition.
//!
//! A hull segment bounds a curved span by a straight-edged tetrahedron:
//! the chord endpoints plus two lateral "vertex" offsets applied at the
//! chord midpoint. Interference tests against these hulls drive the
//! broad-phase filtering of every curve intersection.

use std::f64::consts::PI;

use strake_math::{Dir3, Point3, Vec3};

use crate::{Curve3d, CurveKind, Plane};

/// One conservative hull segment of a curve.
#[derive(Debug, Clone)]
pub struct CurveHullSegment {
    /// Parameter at the start of the span.
    pub t0: f64,
    /// Parameter at the end of the span.
    pub t1: f64,
    /// Curve point at `t0`.
    pub start: Point3,
    /// Curve point at `t1`.
    pub end: Point3,
    /// First bounding vertex offset, applied at the chord midpoint.
    pub spread1: Vec3,
    /// Second bounding vertex offset, applied at the chord midpoint.
    pub spread2: Vec3,
}

impl CurveHullSegment {
    /// Parameter at the middle of the span (used as the subdivision point).
    pub fn mid_t(&self) -> f64 {
        0.5 * (self.t0 + self.t1)
    }

    /// The four hull vertices: chord endpoints and the two offset vertices.
    pub fn vertices(&self) -> [Point3; 4] {
        let mid = Point3::from(0.5 * (self.start.coords + self.end.coords));
        [self.start, self.end, mid + self.spread1, mid + self.spread2]
    }
}

/// Generic hull decomposition by sampling.
///
/// Splits `window` into `n` spans and bounds each span's deviation from
/// its chord by the largest sampled deviations on either side, inflated
/// by a safety factor. Exact for straight spans; conservative for smooth
/// curves sampled densely enough relative to their curvature.
pub fn sampled_hull_segments(
    curve: &dyn Curve3d,
    window: (f64, f64),
    n: usize,
) -> Vec<CurveHullSegment> {
    let n = n.max(1);
    let (t_lo, t_hi) = window;
    let mut segments = Vec::with_capacity(n);
    for k in 0..n {
        let t0 = t_lo + (t_hi - t_lo) * k as f64 / n as f64;
        let t1 = t_lo + (t_hi - t_lo) * (k + 1) as f64 / n as f64;
        let start = curve.evaluate(t0);
        let end = curve.evaluate(t1);
        let chord = end - start;
        let chord_len2 = chord.norm_squared();

        let mut spread1 = Vec3::zeros();
        let mut spread2 = Vec3::zeros();
        for s in 1..5 {
            let t = t0 + (t1 - t0) * s as f64 / 5.0;
            let p = curve.evaluate(t);
            let d = p - start;
            let dev = if chord_len2 > 0.0 {
                d - (d.dot(&chord) / chord_len2) * chord
            } else {
                d
            };
            if spread1.norm_squared() < 1e-30 || dev.dot(&spread1) >= 0.0 {
                if dev.norm() > spread1.norm() {
                    spread1 = dev;
                }
            } else if dev.norm() > spread2.norm() {
                spread2 = dev;
            }
        }
        // Inflate to cover the deviation between samples.
        segments.push(CurveHullSegment {
            t0,
            t1,
            start,
            end,
            spread1: 1.5 * spread1,
            spread2: 1.5 * spread2,
        });
    }
    segments
}

// =============================================================================
// Line3d
// =============================================================================

/// A 3D line defined by origin and direction.
///
/// Parameterization: `P(t) = origin + t * direction`
#[derive(Debug, Clone)]
pub struct Line3d {
    /// Starting point.
    pub origin: Point3,
    /// Direction (magnitude determines parameter speed).
    pub direction: Vec3,
}

impl Line3d {
    /// Line through two points, with `t=0` at `start` and `t=1` at `end`.
    pub fn from_points(start: Point3, end: Point3) -> Self {
        Self {
            origin: start,
            direction: end - start,
        }
    }
}

impl Curve3d for Line3d {
    fn evaluate(&self, t: f64) -> Point3 {
        self.origin + t * self.direction
    }

    fn tangent(&self, _t: f64) -> Vec3 {
        self.direction
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Line
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }

    fn plane_intersections(&self, plane: &Plane) -> Option<Vec<f64>> {
        let denom = self.direction.dot(plane.normal_dir.as_ref());
        if denom.abs() < 1e-14 {
            // Parallel: either disjoint or lying in the plane.
            return Some(Vec::new());
        }
        let t = (plane.origin - self.origin).dot(plane.normal_dir.as_ref()) / denom;
        Some(vec![t])
    }

    fn hull_segments(&self, window: (f64, f64), _n: usize) -> Vec<CurveHullSegment> {
        // A straight span is its own hull.
        vec![CurveHullSegment {
            t0: window.0,
            t1: window.1,
            start: self.evaluate(window.0),
            end: self.evaluate(window.1),
            spread1: Vec3::zeros(),
            spread2: Vec3::zeros(),
        }]
    }
}

// =============================================================================
// Circle3d
// =============================================================================

/// A circle in 3D space defined by center, frame, and radius.
///
/// Parameterization: `P(t) = center + radius * (cos(t) * x_dir + sin(t) * y_dir)`
/// with `t ∈ [0, 2π)`.
#[derive(Debug, Clone)]
pub struct Circle3d {
    /// Center of the circle.
    pub center: Point3,
    /// Radius.
    pub radius: f64,
    /// Reference direction for t=0.
    pub x_dir: Dir3,
    /// Second in-plane direction.
    pub y_dir: Dir3,
    /// Normal to the circle plane.
    pub normal: Dir3,
}

impl Circle3d {
    /// Circle in the XY plane.
    pub fn new(center: Point3, radius: f64) -> Self {
        Self {
            center,
            radius,
            x_dir: Dir3::new_normalize(Vec3::x()),
            y_dir: Dir3::new_normalize(Vec3::y()),
            normal: Dir3::new_normalize(Vec3::z()),
        }
    }

    /// Circle with a custom plane normal.
    pub fn with_normal(center: Point3, radius: f64, normal: Vec3) -> Self {
        let n = Dir3::new_normalize(normal);
        let arbitrary = if n.as_ref().x.abs() < 0.9 {
            Vec3::x()
        } else {
            Vec3::y()
        };
        let x = Dir3::new_normalize(arbitrary.cross(n.as_ref()));
        let y = Dir3::new_normalize(n.as_ref().cross(x.as_ref()));
        Self {
            center,
            radius,
            x_dir: x,
            y_dir: y,
            normal: n,
        }
    }
}

impl Curve3d for Circle3d {
    fn evaluate(&self, t: f64) -> Point3 {
        let (sin_t, cos_t) = t.sin_cos();
        self.center + self.radius * (cos_t * self.x_dir.as_ref() + sin_t * self.y_dir.as_ref())
    }

    fn tangent(&self, t: f64) -> Vec3 {
        let (sin_t, cos_t) = t.sin_cos();
        self.radius * (-sin_t * self.x_dir.as_ref() + cos_t * self.y_dir.as_ref())
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, 2.0 * PI)
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Circle
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }

    fn plane_intersections(&self, plane: &Plane) -> Option<Vec<f64>> {
        // Signed distance along the circle: d(t) = c + a·cos t + b·sin t
        let n = plane.normal_dir.as_ref();
        let c = (self.center - plane.origin).dot(n);
        let a = self.radius * self.x_dir.as_ref().dot(n);
        let b = self.radius * self.y_dir.as_ref().dot(n);
        let amp = (a * a + b * b).sqrt();
        if amp < 1e-14 {
            // Circle plane parallel to the cutting plane.
            return Some(Vec::new());
        }
        let ratio = -c / amp;
        if ratio.abs() > 1.0 {
            return Some(Vec::new());
        }
        let phase = b.atan2(a);
        let delta = ratio.acos();
        let wrap = |t: f64| t.rem_euclid(2.0 * PI);
        let t1 = wrap(phase + delta);
        let t2 = wrap(phase - delta);
        if (t1 - t2).abs() < 1e-12 {
            Some(vec![t1])
        } else {
            Some(vec![t1.min(t2), t1.max(t2)])
        }
    }

    fn hull_segments(&self, window: (f64, f64), n: usize) -> Vec<CurveHullSegment> {
        // Exact sagitta bound: the arc bulges outward from the chord by
        // r·(1 − cos(θ/2)) at the midpoint.
        let n = n.max(1);
        let (t_lo, t_hi) = window;
        let mut segments = Vec::with_capacity(n);
        for k in 0..n {
            let t0 = t_lo + (t_hi - t_lo) * k as f64 / n as f64;
            let t1 = t_lo + (t_hi - t_lo) * (k + 1) as f64 / n as f64;
            let start = self.evaluate(t0);
            let end = self.evaluate(t1);
            let arc_mid = self.evaluate(0.5 * (t0 + t1));
            let chord_mid = Point3::from(0.5 * (start.coords + end.coords));
            let bulge = arc_mid - chord_mid;
            segments.push(CurveHullSegment {
                t0,
                t1,
                start,
                end,
                spread1: 1.000001 * bulge,
                spread2: Vec3::zeros(),
            });
        }
        segments
    }
}

// =============================================================================
// Polyline3d
// =============================================================================

/// A piecewise linear curve through a point sequence.
///
/// Parameterized by segment index: `t ∈ [0, points.len() − 1]`, with
/// integer parameters at the vertices.
#[derive(Debug, Clone)]
pub struct Polyline3d {
    /// Vertices, at least two.
    pub points: Vec<Point3>,
}

impl Polyline3d {
    /// Create a polyline through the given vertices.
    pub fn new(points: Vec<Point3>) -> Self {
        debug_assert!(points.len() >= 2);
        Self { points }
    }

    fn segment_at(&self, t: f64) -> (usize, f64) {
        let last = self.points.len() - 1;
        let clamped = t.clamp(0.0, last as f64);
        let idx = (clamped.floor() as usize).min(last - 1);
        (idx, clamped - idx as f64)
    }
}

impl Curve3d for Polyline3d {
    fn evaluate(&self, t: f64) -> Point3 {
        let (idx, frac) = self.segment_at(t);
        let a = self.points[idx];
        let b = self.points[idx + 1];
        a + frac * (b - a)
    }

    fn tangent(&self, t: f64) -> Vec3 {
        let (idx, _) = self.segment_at(t);
        self.points[idx + 1] - self.points[idx]
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, (self.points.len() - 1) as f64)
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Polyline
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }

    fn plane_intersections(&self, plane: &Plane) -> Option<Vec<f64>> {
        let mut params = Vec::new();
        for i in 0..self.points.len() - 1 {
            let d0 = plane.signed_distance(&self.points[i]);
            let d1 = plane.signed_distance(&self.points[i + 1]);
            if d0 == 0.0 {
                params.push(i as f64);
            } else if d0 * d1 < 0.0 {
                params.push(i as f64 + d0 / (d0 - d1));
            }
        }
        let last = self.points.len() - 1;
        if plane.signed_distance(&self.points[last]) == 0.0 {
            params.push(last as f64);
        }
        Some(params)
    }

    fn hull_segments(&self, window: (f64, f64), _n: usize) -> Vec<CurveHullSegment> {
        // One exact hull per polyline segment overlapping the window.
        let (lo, hi) = window;
        let mut segments = Vec::new();
        for i in 0..self.points.len() - 1 {
            let t0 = (i as f64).max(lo);
            let t1 = ((i + 1) as f64).min(hi);
            if t0 >= t1 {
                continue;
            }
            segments.push(CurveHullSegment {
                t0,
                t1,
                start: self.evaluate(t0),
                end: self.evaluate(t1),
                spread1: Vec3::zeros(),
                spread2: Vec3::zeros(),
            });
        }
        segments
    }
}
