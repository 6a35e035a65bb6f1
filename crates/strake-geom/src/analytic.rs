//! Analytic surface types: plane, cylinder, cone, sphere, torus.
//!
//! Parameterizations match the usual CAD conventions; each type supplies
//! exact first and second derivatives so the Newton-based kernel
//! algorithms never fall back to finite differences.

use std::any::Any;
use std::f64::consts::PI;

use strake_math::{Dir3, Point2, Point3, Vec3, UNBOUNDED};

use crate::{Surface, SurfaceKind};

fn perpendicular_to(v: &Vec3) -> Vec3 {
    if v.x.abs() < 0.9 {
        Vec3::x()
    } else {
        Vec3::y()
    }
}

// =============================================================================
// Plane
// =============================================================================

/// An infinite plane defined by an origin point and a coordinate frame.
///
/// Parameterization: `P(u, v) = origin + u * x_dir + v * y_dir`
#[derive(Debug, Clone)]
pub struct Plane {
    /// Origin point on the plane.
    pub origin: Point3,
    /// Unit vector along the u direction.
    pub x_dir: Dir3,
    /// Unit vector along the v direction.
    pub y_dir: Dir3,
    /// Unit normal (x_dir × y_dir).
    pub normal_dir: Dir3,
}

impl Plane {
    /// Create a plane from origin and two direction vectors (need not be
    /// normalized).
    pub fn new(origin: Point3, x_dir: Vec3, y_dir: Vec3) -> Self {
        let x = Dir3::new_normalize(x_dir);
        let y = Dir3::new_normalize(y_dir);
        let n = Dir3::new_normalize(x_dir.cross(&y_dir));
        Self {
            origin,
            x_dir: x,
            y_dir: y,
            normal_dir: n,
        }
    }

    /// Create a plane from origin and normal; the in-plane frame is chosen
    /// arbitrarily.
    pub fn from_normal(origin: Point3, normal: Vec3) -> Self {
        let n = Dir3::new_normalize(normal);
        let arbitrary = perpendicular_to(n.as_ref());
        let x = Dir3::new_normalize(arbitrary.cross(n.as_ref()));
        let y = Dir3::new_normalize(n.as_ref().cross(x.as_ref()));
        Self {
            origin,
            x_dir: x,
            y_dir: y,
            normal_dir: n,
        }
    }

    /// XY plane at the origin.
    pub fn xy() -> Self {
        Self::new(Point3::origin(), Vec3::x(), Vec3::y())
    }

    /// XZ plane at the origin.
    pub fn xz() -> Self {
        Self::new(Point3::origin(), Vec3::x(), Vec3::z())
    }

    /// YZ plane at the origin.
    pub fn yz() -> Self {
        Self::new(Point3::origin(), Vec3::y(), Vec3::z())
    }

    /// Project a 3D point onto this plane's (u, v) parameter space.
    pub fn project(&self, p: &Point3) -> Point2 {
        let d = p - self.origin;
        Point2::new(d.dot(self.x_dir.as_ref()), d.dot(self.y_dir.as_ref()))
    }

    /// Signed distance from a point to this plane.
    pub fn signed_distance(&self, p: &Point3) -> f64 {
        (p - self.origin).dot(self.normal_dir.as_ref())
    }
}

impl Surface for Plane {
    fn evaluate(&self, uv: Point2) -> Point3 {
        self.origin + uv.x * self.x_dir.as_ref() + uv.y * self.y_dir.as_ref()
    }

    fn d_du(&self, _uv: Point2) -> Vec3 {
        *self.x_dir.as_ref()
    }

    fn d_dv(&self, _uv: Point2) -> Vec3 {
        *self.y_dir.as_ref()
    }

    fn d_duu(&self, _uv: Point2) -> Vec3 {
        Vec3::zeros()
    }

    fn d_dvv(&self, _uv: Point2) -> Vec3 {
        Vec3::zeros()
    }

    fn d_duv(&self, _uv: Point2) -> Vec3 {
        Vec3::zeros()
    }

    fn normal(&self, _uv: Point2) -> Dir3 {
        self.normal_dir
    }

    fn domain(&self) -> ((f64, f64), (f64, f64)) {
        ((-UNBOUNDED, UNBOUNDED), (-UNBOUNDED, UNBOUNDED))
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Plane
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Cylinder
// =============================================================================

/// A cylindrical surface defined by an axis line and radius.
///
/// Parameterization:
/// `P(u, v) = center + radius * (cos(u) * ref_dir + sin(u) * y_dir) + v * axis`
/// with `u ∈ [0, 2π)` the angle and `v` the height along the axis.
#[derive(Debug, Clone)]
pub struct CylinderSurface {
    /// Point at the base of the cylinder axis.
    pub center: Point3,
    /// Unit direction along the axis.
    pub axis: Dir3,
    /// Reference direction for u=0 (perpendicular to axis).
    pub ref_dir: Dir3,
    /// Radius.
    pub radius: f64,
}

impl CylinderSurface {
    /// Cylinder with axis along Z, centered at the origin.
    pub fn new(radius: f64) -> Self {
        Self {
            center: Point3::origin(),
            axis: Dir3::new_normalize(Vec3::z()),
            ref_dir: Dir3::new_normalize(Vec3::x()),
            radius,
        }
    }

    /// Cylinder with a custom center and axis.
    pub fn with_axis(center: Point3, axis: Vec3, radius: f64) -> Self {
        let a = Dir3::new_normalize(axis);
        let arbitrary = perpendicular_to(a.as_ref());
        let ref_dir = Dir3::new_normalize(arbitrary - arbitrary.dot(a.as_ref()) * a.as_ref());
        Self {
            center,
            axis: a,
            ref_dir,
            radius,
        }
    }

    fn y_dir(&self) -> Vec3 {
        self.axis.as_ref().cross(self.ref_dir.as_ref())
    }

    fn radial(&self, u: f64) -> Vec3 {
        let (sin_u, cos_u) = u.sin_cos();
        cos_u * self.ref_dir.as_ref() + sin_u * self.y_dir()
    }
}

impl Surface for CylinderSurface {
    fn evaluate(&self, uv: Point2) -> Point3 {
        self.center + self.radius * self.radial(uv.x) + uv.y * self.axis.as_ref()
    }

    fn d_du(&self, uv: Point2) -> Vec3 {
        let (sin_u, cos_u) = uv.x.sin_cos();
        self.radius * (-sin_u * self.ref_dir.as_ref() + cos_u * self.y_dir())
    }

    fn d_dv(&self, _uv: Point2) -> Vec3 {
        *self.axis.as_ref()
    }

    fn d_duu(&self, uv: Point2) -> Vec3 {
        -self.radius * self.radial(uv.x)
    }

    fn d_dvv(&self, _uv: Point2) -> Vec3 {
        Vec3::zeros()
    }

    fn d_duv(&self, _uv: Point2) -> Vec3 {
        Vec3::zeros()
    }

    fn normal(&self, uv: Point2) -> Dir3 {
        Dir3::new_normalize(self.radial(uv.x))
    }

    fn domain(&self) -> ((f64, f64), (f64, f64)) {
        ((0.0, 2.0 * PI), (-UNBOUNDED, UNBOUNDED))
    }

    fn is_u_periodic(&self) -> bool {
        true
    }

    fn u_period(&self) -> Option<f64> {
        Some(2.0 * PI)
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Cylinder
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Cone
// =============================================================================

/// A conical surface defined by an apex, axis, and half-angle.
///
/// Parameterization:
/// `P(u, v) = apex + v * (cos(a) * axis + sin(a) * (cos(u) * ref_dir + sin(u) * y_dir))`
/// with `u ∈ [0, 2π)` the angle and `v ≥ 0` the distance from the apex
/// along the cone. The apex `v = 0` is a singular parameter.
#[derive(Debug, Clone)]
pub struct ConeSurface {
    /// Apex (tip) of the cone.
    pub apex: Point3,
    /// Unit direction along the axis (apex toward base).
    pub axis: Dir3,
    /// Reference direction for u=0 (perpendicular to axis).
    pub ref_dir: Dir3,
    /// Half-angle in radians.
    pub half_angle: f64,
}

impl ConeSurface {
    /// Cone with apex at the origin and axis along Z.
    pub fn new(half_angle: f64) -> Self {
        Self {
            apex: Point3::origin(),
            axis: Dir3::new_normalize(Vec3::z()),
            ref_dir: Dir3::new_normalize(Vec3::x()),
            half_angle,
        }
    }

    /// Cone with a custom apex and axis.
    pub fn with_axis(apex: Point3, axis: Vec3, half_angle: f64) -> Self {
        let a = Dir3::new_normalize(axis);
        let arbitrary = perpendicular_to(a.as_ref());
        let ref_dir = Dir3::new_normalize(arbitrary - arbitrary.dot(a.as_ref()) * a.as_ref());
        Self {
            apex,
            axis: a,
            ref_dir,
            half_angle,
        }
    }

    fn y_dir(&self) -> Vec3 {
        self.axis.as_ref().cross(self.ref_dir.as_ref())
    }

    fn radial(&self, u: f64) -> Vec3 {
        let (sin_u, cos_u) = u.sin_cos();
        cos_u * self.ref_dir.as_ref() + sin_u * self.y_dir()
    }

    fn d_radial(&self, u: f64) -> Vec3 {
        let (sin_u, cos_u) = u.sin_cos();
        -sin_u * self.ref_dir.as_ref() + cos_u * self.y_dir()
    }
}

impl Surface for ConeSurface {
    fn evaluate(&self, uv: Point2) -> Point3 {
        let ca = self.half_angle.cos();
        let sa = self.half_angle.sin();
        self.apex + uv.y * (ca * self.axis.as_ref() + sa * self.radial(uv.x))
    }

    fn d_du(&self, uv: Point2) -> Vec3 {
        uv.y * self.half_angle.sin() * self.d_radial(uv.x)
    }

    fn d_dv(&self, uv: Point2) -> Vec3 {
        self.half_angle.cos() * self.axis.as_ref() + self.half_angle.sin() * self.radial(uv.x)
    }

    fn d_duu(&self, uv: Point2) -> Vec3 {
        -uv.y * self.half_angle.sin() * self.radial(uv.x)
    }

    fn d_dvv(&self, _uv: Point2) -> Vec3 {
        Vec3::zeros()
    }

    fn d_duv(&self, uv: Point2) -> Vec3 {
        self.half_angle.sin() * self.d_radial(uv.x)
    }

    fn normal(&self, uv: Point2) -> Dir3 {
        let ca = self.half_angle.cos();
        let sa = self.half_angle.sin();
        Dir3::new_normalize(ca * self.radial(uv.x) - sa * self.axis.as_ref())
    }

    fn domain(&self) -> ((f64, f64), (f64, f64)) {
        ((0.0, 2.0 * PI), (0.0, UNBOUNDED))
    }

    fn is_u_periodic(&self) -> bool {
        true
    }

    fn u_period(&self) -> Option<f64> {
        Some(2.0 * PI)
    }

    fn v_singularities(&self) -> Vec<f64> {
        vec![0.0]
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Cone
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Sphere
// =============================================================================

/// A spherical surface defined by center and radius.
///
/// Parameterization:
/// `P(u, v) = center + radius * (cos(v) * (cos(u) * ref_dir + sin(u) * y_dir) + sin(v) * axis)`
/// with `u ∈ [0, 2π)` longitude and `v ∈ [-π/2, π/2]` latitude. The poles
/// `v = ±π/2` are singular parameters.
#[derive(Debug, Clone)]
pub struct SphereSurface {
    /// Center of the sphere.
    pub center: Point3,
    /// Radius.
    pub radius: f64,
    /// Reference direction for u=0.
    pub ref_dir: Dir3,
    /// Axis direction (north pole).
    pub axis: Dir3,
}

impl SphereSurface {
    /// Sphere centered at the origin.
    pub fn new(radius: f64) -> Self {
        Self {
            center: Point3::origin(),
            radius,
            ref_dir: Dir3::new_normalize(Vec3::x()),
            axis: Dir3::new_normalize(Vec3::z()),
        }
    }

    /// Sphere with a custom center.
    pub fn with_center(center: Point3, radius: f64) -> Self {
        Self {
            center,
            radius,
            ref_dir: Dir3::new_normalize(Vec3::x()),
            axis: Dir3::new_normalize(Vec3::z()),
        }
    }

    fn y_dir(&self) -> Vec3 {
        self.axis.as_ref().cross(self.ref_dir.as_ref())
    }

    fn equatorial(&self, u: f64) -> Vec3 {
        let (sin_u, cos_u) = u.sin_cos();
        cos_u * self.ref_dir.as_ref() + sin_u * self.y_dir()
    }

    fn d_equatorial(&self, u: f64) -> Vec3 {
        let (sin_u, cos_u) = u.sin_cos();
        -sin_u * self.ref_dir.as_ref() + cos_u * self.y_dir()
    }
}

impl Surface for SphereSurface {
    fn evaluate(&self, uv: Point2) -> Point3 {
        let (sin_v, cos_v) = uv.y.sin_cos();
        self.center + self.radius * (cos_v * self.equatorial(uv.x) + sin_v * self.axis.as_ref())
    }

    fn d_du(&self, uv: Point2) -> Vec3 {
        self.radius * uv.y.cos() * self.d_equatorial(uv.x)
    }

    fn d_dv(&self, uv: Point2) -> Vec3 {
        let (sin_v, cos_v) = uv.y.sin_cos();
        self.radius * (-sin_v * self.equatorial(uv.x) + cos_v * self.axis.as_ref())
    }

    fn d_duu(&self, uv: Point2) -> Vec3 {
        -self.radius * uv.y.cos() * self.equatorial(uv.x)
    }

    fn d_dvv(&self, uv: Point2) -> Vec3 {
        let (sin_v, cos_v) = uv.y.sin_cos();
        -self.radius * (cos_v * self.equatorial(uv.x) + sin_v * self.axis.as_ref())
    }

    fn d_duv(&self, uv: Point2) -> Vec3 {
        -self.radius * uv.y.sin() * self.d_equatorial(uv.x)
    }

    fn normal(&self, uv: Point2) -> Dir3 {
        let (sin_v, cos_v) = uv.y.sin_cos();
        Dir3::new_normalize(cos_v * self.equatorial(uv.x) + sin_v * self.axis.as_ref())
    }

    fn domain(&self) -> ((f64, f64), (f64, f64)) {
        ((0.0, 2.0 * PI), (-PI / 2.0, PI / 2.0))
    }

    fn is_u_periodic(&self) -> bool {
        true
    }

    fn u_period(&self) -> Option<f64> {
        Some(2.0 * PI)
    }

    fn v_singularities(&self) -> Vec<f64> {
        vec![-PI / 2.0, PI / 2.0]
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Sphere
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Torus
// =============================================================================

/// A toroidal surface defined by center, axis, and two radii.
///
/// Parameterization:
/// ```text
/// P(u, v) = center + (R + r·cos(v))·(cos(u)·ref_dir + sin(u)·y_dir) + r·sin(v)·axis
/// ```
/// with `u` the toroidal angle and `v` the poloidal angle, both periodic
/// with period 2π. A degenerate (self-intersecting) torus with `r ≥ R` is
/// not supported by the kernel.
#[derive(Debug, Clone)]
pub struct TorusSurface {
    /// Center of the torus.
    pub center: Point3,
    /// Unit direction of the axis (perpendicular to the ring plane).
    pub axis: Dir3,
    /// Reference direction for u=0 (perpendicular to axis).
    pub ref_dir: Dir3,
    /// Major radius: center to tube center.
    pub major_radius: f64,
    /// Minor radius: tube radius.
    pub minor_radius: f64,
}

impl TorusSurface {
    /// Torus centered at the origin with axis along Z.
    pub fn new(major_radius: f64, minor_radius: f64) -> Self {
        Self {
            center: Point3::origin(),
            axis: Dir3::new_normalize(Vec3::z()),
            ref_dir: Dir3::new_normalize(Vec3::x()),
            major_radius,
            minor_radius,
        }
    }

    /// Torus with a custom center and axis.
    pub fn with_axis(center: Point3, axis: Vec3, major_radius: f64, minor_radius: f64) -> Self {
        let a = Dir3::new_normalize(axis);
        let arbitrary = perpendicular_to(a.as_ref());
        let ref_dir = Dir3::new_normalize(arbitrary - arbitrary.dot(a.as_ref()) * a.as_ref());
        Self {
            center,
            axis: a,
            ref_dir,
            major_radius,
            minor_radius,
        }
    }

    fn y_dir(&self) -> Vec3 {
        self.axis.as_ref().cross(self.ref_dir.as_ref())
    }

    fn tube_center_dir(&self, u: f64) -> Vec3 {
        let (sin_u, cos_u) = u.sin_cos();
        cos_u * self.ref_dir.as_ref() + sin_u * self.y_dir()
    }

    fn d_tube_center_dir(&self, u: f64) -> Vec3 {
        let (sin_u, cos_u) = u.sin_cos();
        -sin_u * self.ref_dir.as_ref() + cos_u * self.y_dir()
    }
}

impl Surface for TorusSurface {
    fn evaluate(&self, uv: Point2) -> Point3 {
        let (sin_v, cos_v) = uv.y.sin_cos();
        self.center
            + (self.major_radius + self.minor_radius * cos_v) * self.tube_center_dir(uv.x)
            + self.minor_radius * sin_v * self.axis.as_ref()
    }

    fn d_du(&self, uv: Point2) -> Vec3 {
        (self.major_radius + self.minor_radius * uv.y.cos()) * self.d_tube_center_dir(uv.x)
    }

    fn d_dv(&self, uv: Point2) -> Vec3 {
        let (sin_v, cos_v) = uv.y.sin_cos();
        -self.minor_radius * sin_v * self.tube_center_dir(uv.x)
            + self.minor_radius * cos_v * self.axis.as_ref()
    }

    fn d_duu(&self, uv: Point2) -> Vec3 {
        -(self.major_radius + self.minor_radius * uv.y.cos()) * self.tube_center_dir(uv.x)
    }

    fn d_dvv(&self, uv: Point2) -> Vec3 {
        let (sin_v, cos_v) = uv.y.sin_cos();
        -self.minor_radius * (cos_v * self.tube_center_dir(uv.x) + sin_v * self.axis.as_ref())
    }

    fn d_duv(&self, uv: Point2) -> Vec3 {
        -self.minor_radius * uv.y.sin() * self.d_tube_center_dir(uv.x)
    }

    fn normal(&self, uv: Point2) -> Dir3 {
        let (sin_v, cos_v) = uv.y.sin_cos();
        Dir3::new_normalize(cos_v * self.tube_center_dir(uv.x) + sin_v * self.axis.as_ref())
    }

    fn domain(&self) -> ((f64, f64), (f64, f64)) {
        ((0.0, 2.0 * PI), (0.0, 2.0 * PI))
    }

    fn is_u_periodic(&self) -> bool {
        true
    }

    fn is_v_periodic(&self) -> bool {
        true
    }

    fn u_period(&self) -> Option<f64> {
        Some(2.0 * PI)
    }

    fn v_period(&self) -> Option<f64> {
        Some(2.0 * PI)
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Torus
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_evaluate_and_project() {
        let p = Plane::xy();
        let pt = p.evaluate(Point2::new(3.0, 4.0));
        assert!((pt - Point3::new(3.0, 4.0, 0.0)).norm() < 1e-12);
        let uv = p.project(&Point3::new(5.0, 7.0, 99.0));
        assert!((uv.x - 5.0).abs() < 1e-12 && (uv.y - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_cylinder_evaluate() {
        let c = CylinderSurface::new(5.0);
        let pt = c.evaluate(Point2::new(0.0, 0.0));
        assert!((pt - Point3::new(5.0, 0.0, 0.0)).norm() < 1e-12);
        let pt2 = c.evaluate(Point2::new(PI / 2.0, 3.0));
        assert!((pt2 - Point3::new(0.0, 5.0, 3.0)).norm() < 1e-12);
    }

    #[test]
    fn test_cone_apex_is_singular_point() {
        let cone = ConeSurface::new(0.5);
        // Every u maps to the apex at v=0.
        let a = cone.evaluate(Point2::new(0.0, 0.0));
        let b = cone.evaluate(Point2::new(2.0, 0.0));
        assert!((a - b).norm() < 1e-15);
        assert!(cone.d_du(Point2::new(1.0, 0.0)).norm() < 1e-15);
    }

    #[test]
    fn test_sphere_evaluate() {
        let s = SphereSurface::new(10.0);
        let equator = s.evaluate(Point2::new(0.0, 0.0));
        assert!((equator - Point3::new(10.0, 0.0, 0.0)).norm() < 1e-12);
        let north = s.evaluate(Point2::new(0.3, PI / 2.0));
        assert!((north - Point3::new(0.0, 0.0, 10.0)).norm() < 1e-10);
    }

    #[test]
    fn test_torus_evaluate_and_normal() {
        let torus = TorusSurface::new(10.0, 3.0);
        let outer = torus.evaluate(Point2::new(0.0, 0.0));
        assert!((outer - Point3::new(13.0, 0.0, 0.0)).norm() < 1e-10);
        let inner = torus.evaluate(Point2::new(0.0, PI));
        assert!((inner - Point3::new(7.0, 0.0, 0.0)).norm() < 1e-10);
        let n = torus.normal(Point2::new(0.0, PI / 2.0));
        assert!((n.as_ref().z - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_oblique_cylinder_frame_is_orthonormal() {
        let c = CylinderSurface::with_axis(Point3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 1.0, 1.0), 2.0);
        assert!(c.axis.as_ref().dot(c.ref_dir.as_ref()).abs() < 1e-12);
        let p = c.evaluate(Point2::new(1.2, 0.7));
        // Distance from the axis line equals the radius.
        let d = p - c.center;
        let along = d.dot(c.axis.as_ref());
        assert!(((d - along * c.axis.as_ref()).norm() - 2.0).abs() < 1e-12);
    }
}
