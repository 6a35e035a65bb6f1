//! End-to-end kernel scenarios exercised through the session facade.

use std::f64::consts::PI;

use strake::{
    BezierPatch, Circle3d, Confidence, CurveClass, CurveIntersection, CylinderSurface,
    MinOutcome, Plane, Point3, SphereSurface, SurfaceSession, TorusSurface, UvRect, Vec3,
};

fn cylinder_session() -> SurfaceSession {
    SurfaceSession::with_extent(
        Box::new(CylinderSurface::new(1.0)),
        UvRect::new((0.0, 2.0 * PI), (-2.0, 2.0)),
    )
}

#[test]
fn test_plane_through_cylinder_axis_gives_two_lines() {
    let cylinder = cylinder_session();
    let result = cylinder.intersect_plane(&Plane::xz());
    assert_eq!(result.confidence, Confidence::Exact);
    assert_eq!(result.curves.len(), 2);
    let mut rulings: Vec<f64> = Vec::new();
    for curve in &result.curves {
        assert_eq!(curve.class, CurveClass::Line);
        let x = curve.points[0].point.x;
        for p in &curve.points {
            assert!((p.point.x - x).abs() < 1e-9);
            assert!(p.point.y.abs() < 1e-9);
        }
        rulings.push(x);
    }
    rulings.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert!((rulings[0] + 1.0).abs() < 1e-9);
    assert!((rulings[1] - 1.0).abs() < 1e-9);
}

#[test]
fn test_plane_across_cylinder_gives_circle() {
    let cylinder = cylinder_session();
    let result = cylinder.intersect_plane(&Plane::xy());
    assert_eq!(result.curves.len(), 1);
    let curve = &result.curves[0];
    assert_eq!(curve.class, CurveClass::Circle);
    assert!(curve.closed);
    for p in &curve.points {
        assert!(p.point.z.abs() < 1e-9);
        let r = (p.point.x * p.point.x + p.point.y * p.point.y).sqrt();
        assert!((r - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_orthogonal_cylinders_meet_in_two_loops() {
    let extent = UvRect::new((0.0, 2.0 * PI), (-1.5, 1.5));
    let a = SurfaceSession::with_extent(Box::new(CylinderSurface::new(1.0)), extent);
    let b = SurfaceSession::with_extent(
        Box::new(CylinderSurface::with_axis(Point3::origin(), Vec3::x(), 1.0)),
        extent,
    );
    let result = a.intersect_surface(&b);
    let closed: Vec<_> = result.curves.iter().filter(|c| c.closed).collect();
    assert_eq!(closed.len(), 2);
    for curve in &result.curves {
        for p in &curve.points {
            let r1 = (p.point.x * p.point.x + p.point.y * p.point.y).sqrt();
            let r2 = (p.point.y * p.point.y + p.point.z * p.point.z).sqrt();
            assert!((r1 - 1.0).abs() < 1e-3);
            assert!((r2 - 1.0).abs() < 1e-3);
        }
    }
}

#[test]
fn test_saddle_has_no_directional_minimum() {
    let mut h = [[0.0; 4]; 4];
    for (i, row) in h.iter_mut().enumerate() {
        for (j, z) in row.iter_mut().enumerate() {
            let x = -1.0 + 2.0 * i as f64 / 3.0;
            let y = -1.0 + 2.0 * j as f64 / 3.0;
            *z = x * x - y * y;
        }
    }
    let patch = BezierPatch::from_heights((-1.0, 1.0), (-1.0, 1.0), h);
    let session = SurfaceSession::new(Box::new(patch));
    let rect = UvRect::new((0.05, 0.95), (0.05, 0.95));
    let result = session.directional_extremum(Vec3::z(), rect).unwrap();
    assert_eq!(result.outcome, MinOutcome::NotPositiveDefinite);
    assert!(!result.outcome.is_minimum());
}

#[test]
fn test_tangent_plane_touches_sphere_in_no_curve() {
    let sphere = SurfaceSession::new(Box::new(SphereSurface::new(1.0)));
    let tangent = Plane::new(Point3::new(0.0, 0.0, 1.0), Vec3::x(), Vec3::y());
    let result = sphere.intersect_plane(&tangent);
    assert_eq!(result.confidence, Confidence::Exact);
    assert!(result.curves.is_empty());
}

#[test]
fn test_exterior_curve_misses_torus() {
    let torus = SurfaceSession::new(Box::new(TorusSurface::new(2.0, 0.5)));
    let orbit = Circle3d::new(Point3::origin(), 4.0);
    let result = torus.intersect_curve(&orbit, (0.0, 2.0 * PI)).unwrap();
    assert!(matches!(result, CurveIntersection::Empty));
}

#[test]
fn test_minimizer_monotone_on_cylinder() {
    // Height along -x over the cylinder is minimized at u = 0 where the
    // surface point is (1, 0, v); along +x the minimum sits at u = pi.
    let cylinder = cylinder_session();
    let rect = UvRect::new((2.0, 4.0), (0.0, 1.0));
    let result = cylinder.directional_extremum(Vec3::x(), rect).unwrap();
    assert!(result.outcome.is_minimum());
    assert!((result.uv.x - PI).abs() < 1e-6);
    assert!((result.value + 1.0).abs() < 1e-6);
}
