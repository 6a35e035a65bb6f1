#![warn(missing_docs)]

//! Surface and curve capability contracts for the strake kernel.
//!
//! The generic kernel algorithms (point inversion, directional extrema,
//! intersection) consume geometry exclusively through the [`Surface`] and
//! [`Curve3d`] traits defined here. Concrete analytic types (plane,
//! cylinder, cone, sphere, torus, bicubic patch, line, circle, polyline)
//! implement the contracts and additionally expose closed-form data for
//! the fast-path intersections selected by `surface_type()` dispatch.

use std::any::Any;

use strake_math::{Dir3, Point2, Point3, Vec3};

mod analytic;
mod bezier;
mod curve;
mod domain;
mod iso;

pub use analytic::{ConeSurface, CylinderSurface, Plane, SphereSurface, TorusSurface};
pub use bezier::BezierPatch;
pub use curve::{sampled_hull_segments, Circle3d, CurveHullSegment, Line3d, Polyline3d};
pub use domain::UvRect;
pub use iso::{IsoCurve, IsoParam};

/// The kind of a surface (for match-based dispatch of closed-form paths).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Infinite plane.
    Plane,
    /// Cylindrical surface (infinite extent along axis).
    Cylinder,
    /// Conical surface.
    Cone,
    /// Spherical surface.
    Sphere,
    /// Toroidal surface.
    Torus,
    /// Bicubic Bézier patch.
    BezierPatch,
}

/// A parametric surface in 3D space.
///
/// Invariant: `normal(uv)` is parallel to `d_du(uv) × d_dv(uv)` wherever
/// both tangents are non-null. At singular parameters (poles) the tangent
/// cross product degenerates and `normal` falls back to a nearby value.
pub trait Surface: Send + Sync + std::fmt::Debug {
    /// Evaluate the surface at parameter `(u, v)` to get a 3D point.
    fn evaluate(&self, uv: Point2) -> Point3;

    /// Partial derivative with respect to u at `(u, v)`.
    fn d_du(&self, uv: Point2) -> Vec3;

    /// Partial derivative with respect to v at `(u, v)`.
    fn d_dv(&self, uv: Point2) -> Vec3;

    /// Second partial derivative ∂²P/∂u².
    fn d_duu(&self, uv: Point2) -> Vec3;

    /// Second partial derivative ∂²P/∂v².
    fn d_dvv(&self, uv: Point2) -> Vec3;

    /// Mixed second partial derivative ∂²P/∂u∂v.
    fn d_duv(&self, uv: Point2) -> Vec3;

    /// Surface normal at parameter `(u, v)`.
    ///
    /// The default computes `normalize(d_du × d_dv)` and nudges the
    /// parameter toward the domain interior when the cross product
    /// degenerates (e.g. exactly at a pole).
    fn normal(&self, uv: Point2) -> Dir3 {
        let n = self.d_du(uv).cross(&self.d_dv(uv));
        if n.norm() > 1e-12 {
            return Dir3::new_normalize(n);
        }
        // Degenerate tangents: sample slightly toward the domain center.
        let ((u0, u1), (v0, v1)) = self.domain();
        let cu = 0.5 * (u0 + u1);
        let cv = 0.5 * (v0 + v1);
        let eps = 1e-6;
        let nudged = Point2::new(uv.x + eps * (cu - uv.x).signum(), uv.y + eps * (cv - uv.y).signum());
        let n2 = self.d_du(nudged).cross(&self.d_dv(nudged));
        if n2.norm() > 1e-12 {
            Dir3::new_normalize(n2)
        } else {
            Dir3::new_normalize(Vec3::z())
        }
    }

    /// Parameter domain as `((u_min, u_max), (v_min, v_max))`.
    ///
    /// Unbounded axes report `±strake_math::UNBOUNDED`.
    fn domain(&self) -> ((f64, f64), (f64, f64));

    /// The natural domain as a [`UvRect`].
    fn natural_rect(&self) -> UvRect {
        let (u, v) = self.domain();
        UvRect::new(u, v)
    }

    /// Whether the u axis wraps around.
    fn is_u_periodic(&self) -> bool {
        false
    }

    /// Whether the v axis wraps around.
    fn is_v_periodic(&self) -> bool {
        false
    }

    /// Length of one u period, when `is_u_periodic()`.
    fn u_period(&self) -> Option<f64> {
        None
    }

    /// Length of one v period, when `is_v_periodic()`.
    fn v_period(&self) -> Option<f64> {
        None
    }

    /// u parameters at which the surface degenerates to a point.
    fn u_singularities(&self) -> Vec<f64> {
        Vec::new()
    }

    /// v parameters at which the surface degenerates to a point.
    fn v_singularities(&self) -> Vec<f64> {
        Vec::new()
    }

    /// The kind of this surface.
    fn surface_type(&self) -> SurfaceKind;

    /// Clone this surface into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Surface>;

    /// Downcast to a concrete type via `Any`.
    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn Surface> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// The kind of a curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveKind {
    /// Straight line.
    Line,
    /// Circle.
    Circle,
    /// Piecewise linear curve.
    Polyline,
    /// Fixed-parameter curve on a surface.
    SurfaceIso,
}

/// A parametric curve in 3D space.
pub trait Curve3d: Send + Sync + std::fmt::Debug {
    /// Evaluate the curve at parameter `t` to get a 3D point.
    fn evaluate(&self, t: f64) -> Point3;

    /// Tangent vector at parameter `t` (not necessarily unit length).
    fn tangent(&self, t: f64) -> Vec3;

    /// Parameter domain `(t_min, t_max)`.
    fn domain(&self) -> (f64, f64);

    /// The kind of this curve.
    fn curve_type(&self) -> CurveKind;

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Curve3d>;

    /// Exact parameters where the curve crosses a plane, when the curve
    /// type supports a closed form. Generic curves return `None` and are
    /// handled through hull subdivision instead.
    fn plane_intersections(&self, _plane: &Plane) -> Option<Vec<f64>> {
        None
    }

    /// Decompose the window into conservative tetrahedral hull segments.
    ///
    /// Each segment bounds the curve between two parameters by its chord
    /// plus two lateral spread vectors. Generic implementations call
    /// [`sampled_hull_segments`], which samples the curve and
    /// bounds the observed deviation from the chord with a safety factor;
    /// analytic curves use exact sagitta bounds instead.
    fn hull_segments(&self, window: (f64, f64), n: usize) -> Vec<CurveHullSegment>;
}

impl Clone for Box<dyn Curve3d> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_normal_matches_cross_product() {
        let surfaces: Vec<Box<dyn Surface>> = vec![
            Box::new(Plane::xy()),
            Box::new(CylinderSurface::new(2.0)),
            Box::new(SphereSurface::new(3.0)),
            Box::new(TorusSurface::new(5.0, 1.0)),
            Box::new(ConeSurface::new(0.4)),
        ];
        for s in &surfaces {
            let uv = Point2::new(0.7, 0.9);
            let n = s.normal(uv);
            let cross = s.d_du(uv).cross(&s.d_dv(uv));
            let aligned = n.as_ref().dot(&cross.normalize()).abs();
            assert!(aligned > 1.0 - 1e-9, "{:?}", s.surface_type());
        }
    }

    #[test]
    fn test_second_derivatives_by_finite_difference() {
        let surfaces: Vec<Box<dyn Surface>> = vec![
            Box::new(CylinderSurface::new(2.0)),
            Box::new(SphereSurface::new(3.0)),
            Box::new(TorusSurface::new(5.0, 1.0)),
            Box::new(ConeSurface::new(0.4)),
        ];
        let uv = Point2::new(0.8, 0.6);
        let eps = 1e-6;
        for s in &surfaces {
            let duu_fd = (s.d_du(Point2::new(uv.x + eps, uv.y)) - s.d_du(uv)) / eps;
            let dvv_fd = (s.d_dv(Point2::new(uv.x, uv.y + eps)) - s.d_dv(uv)) / eps;
            let duv_fd = (s.d_du(Point2::new(uv.x, uv.y + eps)) - s.d_du(uv)) / eps;
            assert!((s.d_duu(uv) - duu_fd).norm() < 1e-4, "{:?}", s.surface_type());
            assert!((s.d_dvv(uv) - dvv_fd).norm() < 1e-4, "{:?}", s.surface_type());
            assert!((s.d_duv(uv) - duv_fd).norm() < 1e-4, "{:?}", s.surface_type());
        }
    }

    #[test]
    fn test_periodicity_flags() {
        let cyl = CylinderSurface::new(1.0);
        assert!(cyl.is_u_periodic());
        assert!(!cyl.is_v_periodic());
        assert!((cyl.u_period().unwrap() - 2.0 * PI).abs() < 1e-12);

        let torus = TorusSurface::new(2.0, 0.5);
        assert!(torus.is_u_periodic() && torus.is_v_periodic());

        let plane = Plane::xy();
        assert!(!plane.is_u_periodic() && !plane.is_v_periodic());
    }

    #[test]
    fn test_singularity_lists() {
        let sphere = SphereSurface::new(1.0);
        let poles = sphere.v_singularities();
        assert_eq!(poles.len(), 2);
        assert!((poles[0] + PI / 2.0).abs() < 1e-12);
        assert!((poles[1] - PI / 2.0).abs() < 1e-12);

        let cone = ConeSurface::new(0.3);
        assert_eq!(cone.v_singularities(), vec![0.0]);

        assert!(TorusSurface::new(2.0, 0.5).v_singularities().is_empty());
    }

    #[test]
    fn test_normal_at_sphere_pole_is_finite() {
        let sphere = SphereSurface::new(1.0);
        let n = sphere.normal(Point2::new(0.0, PI / 2.0));
        assert!(n.as_ref().norm().is_finite());
    }
}
