//! Closed-form intersections between analytic surface pairs.
//!
//! Plane/quadric and sphere/sphere combinations have exact intersection
//! curves (lines, circles, conics); computing them directly is both
//! faster and more accurate than the grid tracer, and the results carry
//! [`Confidence::Exact`]. Pairs without a closed form return `None` and
//! fall through to the numeric path.
//!
//! Curves are emitted as dense dual-parametrization samples. Samples
//! whose 3D position falls outside either index extent are dropped, so a
//! geometrically infinite result (a line, a hyperbola branch) comes back
//! clipped to the indexed regions.

use strake_geom::{
    ConeSurface, CylinderSurface, Plane, SphereSurface, Surface, SurfaceKind, TorusSurface,
};
use strake_hull::{Aabb3, CellIndex, OrientedBox};
use strake_math::{Dir3, Point3, Tolerance, Vec3};

use crate::surface_surface::{CurveClass, DualCurvePoint, DualSurfaceCurve, SurfaceIntersection};
use crate::Confidence;

/// Samples per closed conic curve.
const LOOP_SAMPLES: usize = 64;
/// Samples along a clipped line.
const LINE_SAMPLES: usize = 17;

/// Dispatch table over the surface kind pair.
///
/// Returns `None` when the pair has no closed form; `Some` with empty
/// curves means the pair was recognized and proven disjoint (or tangent
/// in a single point).
pub fn canonical_intersection(a: &CellIndex, b: &CellIndex) -> Option<SurfaceIntersection> {
    use SurfaceKind::*;
    match (a.surface().surface_type(), b.surface().surface_type()) {
        (Plane, Plane) => plane_plane(a, b),
        (Plane, Sphere) => plane_sphere(a, b),
        (Sphere, Plane) => plane_sphere(b, a).map(swap_sides),
        (Plane, Cylinder) => plane_cylinder(a, b),
        (Cylinder, Plane) => plane_cylinder(b, a).map(swap_sides),
        (Plane, Cone) => plane_cone(a, b),
        (Cone, Plane) => plane_cone(b, a).map(swap_sides),
        (Plane, Torus) => plane_torus(a, b),
        (Torus, Plane) => plane_torus(b, a).map(swap_sides),
        (Sphere, Sphere) => sphere_sphere(a, b),
        _ => None,
    }
}

/// Reverse the surface roles of a result computed with the indices
/// swapped.
fn swap_sides(mut result: SurfaceIntersection) -> SurfaceIntersection {
    for curve in &mut result.curves {
        for p in &mut curve.points {
            std::mem::swap(&mut p.uv1, &mut p.uv2);
        }
    }
    result
}

fn exact(curves: Vec<DualSurfaceCurve>) -> SurfaceIntersection {
    SurfaceIntersection {
        curves,
        confidence: Confidence::Exact,
    }
}

fn tolerance_of(a: &CellIndex, b: &CellIndex) -> f64 {
    Tolerance::DEFAULT.linear * a.scale().max(b.scale())
}

fn dualize(first: &CellIndex, second: &CellIndex, p: Point3) -> Option<DualCurvePoint> {
    let uv1 = first.position_of(&p)?;
    let uv2 = second.position_of(&p)?;
    Some(DualCurvePoint { point: p, uv1, uv2 })
}

/// Turn a cyclic ring of 3D samples into dual curves: one closed curve
/// when every sample maps onto both indices, otherwise the maximal runs
/// of mappable samples as open curves (runs meeting across the seam are
/// merged).
fn dualize_loop(
    first: &CellIndex,
    second: &CellIndex,
    samples: &[Point3],
    class: CurveClass,
) -> Vec<DualSurfaceCurve> {
    let dual: Vec<Option<DualCurvePoint>> = samples
        .iter()
        .map(|&p| dualize(first, second, p))
        .collect();
    if dual.iter().all(Option::is_some) {
        let points: Vec<_> = dual.into_iter().flatten().collect();
        if points.len() < 3 {
            return Vec::new();
        }
        return vec![DualSurfaceCurve {
            class,
            points,
            closed: true,
        }];
    }
    let mut runs = contiguous_runs(&dual);
    // The ring wraps: a run ending at the last sample continues into one
    // starting at the first.
    if runs.len() > 1 {
        let wraps = dual.first().is_some_and(Option::is_some)
            && dual.last().is_some_and(Option::is_some);
        if wraps {
            let head = runs.remove(0);
            if let Some(tail) = runs.last_mut() {
                tail.extend(head);
            }
        }
    }
    runs.into_iter()
        .filter(|r| r.len() >= 2)
        .map(|points| DualSurfaceCurve {
            class,
            points,
            closed: false,
        })
        .collect()
}

fn contiguous_runs(dual: &[Option<DualCurvePoint>]) -> Vec<Vec<DualCurvePoint>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for d in dual {
        match d {
            Some(p) => current.push(*p),
            None => {
                if !current.is_empty() {
                    runs.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

/// Uniform samples of a circle, first point at angle zero, not repeated
/// at the end.
fn circle_samples(center: Point3, normal: &Vec3, radius: f64) -> Vec<Point3> {
    let n = Dir3::new_normalize(*normal);
    let seed = if n.x.abs() < 0.9 { Vec3::x() } else { Vec3::y() };
    let x = Dir3::new_normalize(seed.cross(n.as_ref()));
    let y = n.as_ref().cross(x.as_ref());
    (0..LOOP_SAMPLES)
        .map(|i| {
            let t = 2.0 * std::f64::consts::PI * i as f64 / LOOP_SAMPLES as f64;
            center + radius * (t.cos() * x.as_ref() + t.sin() * y)
        })
        .collect()
}

fn circle_curves(
    first: &CellIndex,
    second: &CellIndex,
    center: Point3,
    normal: &Vec3,
    radius: f64,
) -> Vec<DualSurfaceCurve> {
    dualize_loop(
        first,
        second,
        &circle_samples(center, normal, radius),
        CurveClass::Circle,
    )
}

/// An infinite line clipped against the union of the two index bounds,
/// sampled and dualized.
fn line_curves(
    first: &CellIndex,
    second: &CellIndex,
    origin: Point3,
    dir: Vec3,
) -> Vec<DualSurfaceCurve> {
    let mut bounds = first.bounds();
    let other = second.bounds();
    bounds.include_point(&other.min);
    bounds.include_point(&other.max);
    let clip = OrientedBox::from_aabb(&bounds);
    let Some((t0, t1)) = clip.clip_line(&origin, &dir) else {
        return Vec::new();
    };
    let samples: Vec<Point3> = (0..LINE_SAMPLES)
        .map(|i| {
            let t = t0 + (t1 - t0) * i as f64 / (LINE_SAMPLES - 1) as f64;
            origin + t * dir
        })
        .collect();
    let dual: Vec<Option<DualCurvePoint>> = samples
        .iter()
        .map(|&p| dualize(first, second, p))
        .collect();
    contiguous_runs(&dual)
        .into_iter()
        .filter(|r| r.len() >= 2)
        .map(|points| DualSurfaceCurve {
            class: CurveClass::Line,
            points,
            closed: false,
        })
        .collect()
}

// =============================================================================
// Pair cases
// =============================================================================

fn plane_plane(a: &CellIndex, b: &CellIndex) -> Option<SurfaceIntersection> {
    let p1 = a.surface().as_any().downcast_ref::<Plane>()?;
    let p2 = b.surface().as_any().downcast_ref::<Plane>()?;
    let n1 = *p1.normal_dir.as_ref();
    let n2 = *p2.normal_dir.as_ref();
    let dir = n1.cross(&n2);
    if dir.norm() < 1e-12 {
        // Parallel: either disjoint or coincident; neither produces a
        // curve.
        return Some(exact(Vec::new()));
    }
    // Point on both planes with minimal norm relative to the origin,
    // found from the normal equations of the two plane constraints.
    let d1 = n1.dot(&p1.origin.coords);
    let d2 = n2.dot(&p2.origin.coords);
    let g11 = n1.dot(&n1);
    let g12 = n1.dot(&n2);
    let g22 = n2.dot(&n2);
    let det = g11 * g22 - g12 * g12;
    if det.abs() < 1e-14 {
        return Some(exact(Vec::new()));
    }
    let c1 = (d1 * g22 - d2 * g12) / det;
    let c2 = (d2 * g11 - d1 * g12) / det;
    let origin = Point3::from(c1 * n1 + c2 * n2);
    Some(exact(line_curves(a, b, origin, dir.normalize())))
}

fn plane_sphere(p: &CellIndex, s: &CellIndex) -> Option<SurfaceIntersection> {
    let plane = p.surface().as_any().downcast_ref::<Plane>()?;
    let sphere = s.surface().as_any().downcast_ref::<SphereSurface>()?;
    let tol = tolerance_of(p, s);
    let d = plane.signed_distance(&sphere.center);
    if d.abs() > sphere.radius + tol {
        return Some(exact(Vec::new()));
    }
    if (d.abs() - sphere.radius).abs() <= tol {
        // Tangent contact is a single point, not a curve.
        return Some(exact(Vec::new()));
    }
    let center = sphere.center - d * plane.normal_dir.as_ref();
    let radius = (sphere.radius * sphere.radius - d * d).sqrt();
    Some(exact(circle_curves(
        p,
        s,
        center,
        plane.normal_dir.as_ref(),
        radius,
    )))
}

fn plane_cylinder(p: &CellIndex, c: &CellIndex) -> Option<SurfaceIntersection> {
    let plane = p.surface().as_any().downcast_ref::<Plane>()?;
    let cyl = c.surface().as_any().downcast_ref::<CylinderSurface>()?;
    let tol = tolerance_of(p, c);
    let n = *plane.normal_dir.as_ref();
    let axis = *cyl.axis.as_ref();
    let align = n.dot(&axis);

    if align.abs() < 1e-9 {
        // Plane parallel to the axis: zero, one, or two ruling lines.
        let d = plane.signed_distance(&cyl.center);
        if d.abs() > cyl.radius + tol {
            return Some(exact(Vec::new()));
        }
        let foot = cyl.center - d * n;
        if (d.abs() - cyl.radius).abs() <= tol {
            return Some(exact(line_curves(p, c, foot, axis)));
        }
        let offset = (cyl.radius * cyl.radius - d * d).sqrt();
        let in_plane = axis.cross(&n).normalize();
        let mut curves = line_curves(p, c, foot + offset * in_plane, axis);
        curves.extend(line_curves(p, c, foot - offset * in_plane, axis));
        return Some(exact(curves));
    }

    if align.abs() > 1.0 - 1e-12 {
        // Plane perpendicular to the axis: a circle at the crossing
        // height.
        let t = plane.signed_distance(&cyl.center) / -align;
        let center = cyl.center + t * axis;
        return Some(exact(circle_curves(p, c, center, &axis, cyl.radius)));
    }

    // Oblique plane: an exact ellipse, sampled along the cylinder angle.
    let samples: Vec<Point3> = (0..LOOP_SAMPLES)
        .map(|i| {
            let u = 2.0 * std::f64::consts::PI * i as f64 / LOOP_SAMPLES as f64;
            let base = cyl.evaluate(strake_math::Point2::new(u, 0.0));
            let v = plane.signed_distance(&base) / -align;
            base + v * axis
        })
        .collect();
    Some(exact(dualize_loop(p, c, &samples, CurveClass::Ellipse)))
}

fn plane_cone(p: &CellIndex, c: &CellIndex) -> Option<SurfaceIntersection> {
    let plane = p.surface().as_any().downcast_ref::<Plane>()?;
    let cone = c.surface().as_any().downcast_ref::<ConeSurface>()?;
    let tol = tolerance_of(p, c);
    let n = *plane.normal_dir.as_ref();
    let apex_offset = plane.signed_distance(&cone.apex);
    if apex_offset.abs() <= tol {
        // Plane through the apex meets the cone in the apex point or in
        // generator lines; leave those to the numeric path.
        return None;
    }

    // Conic classification from the angle between the plane normal and
    // the cone axis.
    let cos_theta = n.dot(cone.axis.as_ref()).abs().clamp(0.0, 1.0);
    let theta = cos_theta.acos();
    let critical = std::f64::consts::FRAC_PI_2 - cone.half_angle;
    let class = if (theta - critical).abs() < 1e-9 {
        CurveClass::Parabola
    } else if theta < critical {
        CurveClass::Ellipse
    } else {
        CurveClass::Hyperbola
    };

    // Along a generator g(u) the plane is hit at
    // v(u) = -signed_distance(apex) / (n . g(u)); only v >= 0 lies on
    // this nappe.
    let (v0, v1) = c.extent().v;
    let ca = cone.half_angle.cos();
    let sa = cone.half_angle.sin();
    let samples = 4 * LOOP_SAMPLES;
    let dual: Vec<Option<DualCurvePoint>> = (0..samples)
        .map(|i| {
            let u = 2.0 * std::f64::consts::PI * i as f64 / samples as f64;
            let g = ca * cone.axis.as_ref()
                + sa * (u.cos() * cone.ref_dir.as_ref()
                    + u.sin() * cone.axis.as_ref().cross(cone.ref_dir.as_ref()));
            let denom = n.dot(&g);
            if denom.abs() < 1e-12 {
                return None;
            }
            let v = -apex_offset / denom;
            if v < v0 - tol || v > v1 + tol {
                return None;
            }
            dualize(p, c, cone.apex + v * g)
        })
        .collect();

    if class == CurveClass::Ellipse && dual.iter().all(Option::is_some) {
        let points: Vec<_> = dual.into_iter().flatten().collect();
        return Some(exact(vec![DualSurfaceCurve {
            class,
            points,
            closed: true,
        }]));
    }
    let mut runs = contiguous_runs(&dual);
    if runs.len() > 1 && dual_wraps(&dual) {
        let head = runs.remove(0);
        if let Some(tail) = runs.last_mut() {
            tail.extend(head);
        }
    }
    let curves = runs
        .into_iter()
        .filter(|r| r.len() >= 2)
        .map(|points| DualSurfaceCurve {
            class,
            points,
            closed: false,
        })
        .collect();
    Some(exact(curves))
}

fn dual_wraps(dual: &[Option<DualCurvePoint>]) -> bool {
    dual.first().is_some_and(Option::is_some) && dual.last().is_some_and(Option::is_some)
}

fn plane_torus(p: &CellIndex, t: &CellIndex) -> Option<SurfaceIntersection> {
    let plane = p.surface().as_any().downcast_ref::<Plane>()?;
    let torus = t.surface().as_any().downcast_ref::<TorusSurface>()?;
    let n = *plane.normal_dir.as_ref();
    let axis = *torus.axis.as_ref();
    if n.cross(&axis).norm() > 1e-9 {
        // Oblique plane/torus sections are quartics; trace numerically.
        return None;
    }
    let tol = tolerance_of(p, t);
    let d = plane.signed_distance(&torus.center);
    if d.abs() > torus.minor_radius + tol {
        return Some(exact(Vec::new()));
    }
    let center = torus.center - d * n;
    if (d.abs() - torus.minor_radius).abs() <= tol {
        // Grazing plane: one circle at the major radius.
        return Some(exact(circle_curves(
            p,
            t,
            center,
            &axis,
            torus.major_radius,
        )));
    }
    // Two concentric circles, inner and outer.
    let half_width = (torus.minor_radius * torus.minor_radius - d * d).sqrt();
    let mut curves = circle_curves(p, t, center, &axis, torus.major_radius + half_width);
    curves.extend(circle_curves(
        p,
        t,
        center,
        &axis,
        torus.major_radius - half_width,
    ));
    Some(exact(curves))
}

fn sphere_sphere(a: &CellIndex, b: &CellIndex) -> Option<SurfaceIntersection> {
    let s1 = a.surface().as_any().downcast_ref::<SphereSurface>()?;
    let s2 = b.surface().as_any().downcast_ref::<SphereSurface>()?;
    let tol = tolerance_of(a, b);
    let sep = s2.center - s1.center;
    let d = sep.norm();
    if d < tol {
        // Concentric: coincident or disjoint, no curve either way.
        return Some(exact(Vec::new()));
    }
    if d > s1.radius + s2.radius + tol || d < (s1.radius - s2.radius).abs() - tol {
        return Some(exact(Vec::new()));
    }
    if (d - (s1.radius + s2.radius)).abs() <= tol
        || (d - (s1.radius - s2.radius).abs()).abs() <= tol
    {
        // Tangent spheres meet in a point.
        return Some(exact(Vec::new()));
    }
    let u = sep / d;
    let h = (d * d + s1.radius * s1.radius - s2.radius * s2.radius) / (2.0 * d);
    let radius_sq = s1.radius * s1.radius - h * h;
    if radius_sq <= 0.0 {
        return Some(exact(Vec::new()));
    }
    let center = s1.center + h * u;
    Some(exact(circle_curves(a, b, center, &u, radius_sq.sqrt())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use strake_geom::UvRect;
    use strake_hull::IndexConfig;

    fn index_of(surface: Box<dyn Surface>, extent: UvRect) -> CellIndex {
        CellIndex::build(surface, extent, IndexConfig::default())
    }

    fn plane_index(plane: Plane, half: f64) -> CellIndex {
        index_of(Box::new(plane), UvRect::new((-half, half), (-half, half)))
    }

    #[test]
    fn test_plane_plane_line() {
        let a = plane_index(Plane::xy(), 3.0);
        let b = plane_index(Plane::xz(), 3.0);
        let result = canonical_intersection(&a, &b).unwrap();
        assert_eq!(result.confidence, Confidence::Exact);
        assert_eq!(result.curves.len(), 1);
        let curve = &result.curves[0];
        assert_eq!(curve.class, CurveClass::Line);
        for p in &curve.points {
            // The x axis.
            assert!(p.point.y.abs() < 1e-9);
            assert!(p.point.z.abs() < 1e-9);
        }
    }

    #[test]
    fn test_parallel_planes_empty() {
        let a = plane_index(Plane::xy(), 3.0);
        let b = plane_index(
            Plane::new(Point3::new(0.0, 0.0, 1.0), Vec3::x(), Vec3::y()),
            3.0,
        );
        let result = canonical_intersection(&a, &b).unwrap();
        assert!(result.curves.is_empty());
    }

    #[test]
    fn test_plane_sphere_circle() {
        let p = plane_index(
            Plane::new(Point3::new(0.0, 0.0, 0.5), Vec3::x(), Vec3::y()),
            3.0,
        );
        let s = index_of(
            Box::new(SphereSurface::new(1.0)),
            UvRect::new((0.0, 2.0 * PI), (-PI / 2.0, PI / 2.0)),
        );
        let result = canonical_intersection(&p, &s).unwrap();
        assert_eq!(result.curves.len(), 1);
        let curve = &result.curves[0];
        assert_eq!(curve.class, CurveClass::Circle);
        assert!(curve.closed);
        let expected = (1.0_f64 - 0.25).sqrt();
        for pt in &curve.points {
            assert!((pt.point.z - 0.5).abs() < 1e-9);
            let r = (pt.point.x * pt.point.x + pt.point.y * pt.point.y).sqrt();
            assert!((r - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_tangent_plane_sphere_no_curves() {
        let p = plane_index(
            Plane::new(Point3::new(0.0, 0.0, 1.0), Vec3::x(), Vec3::y()),
            3.0,
        );
        let s = index_of(
            Box::new(SphereSurface::new(1.0)),
            UvRect::new((0.0, 2.0 * PI), (-PI / 2.0, PI / 2.0)),
        );
        let result = canonical_intersection(&p, &s).unwrap();
        assert_eq!(result.confidence, Confidence::Exact);
        assert!(result.curves.is_empty());
    }

    #[test]
    fn test_plane_cylinder_two_lines() {
        // Plane through the axis of a unit cylinder: rulings at x = ±1.
        let p = plane_index(Plane::xz(), 3.0);
        let c = index_of(
            Box::new(CylinderSurface::new(1.0)),
            UvRect::new((0.0, 2.0 * PI), (-2.0, 2.0)),
        );
        let result = canonical_intersection(&p, &c).unwrap();
        assert_eq!(result.curves.len(), 2);
        for curve in &result.curves {
            assert_eq!(curve.class, CurveClass::Line);
            let x = curve.points[0].point.x;
            assert!((x.abs() - 1.0).abs() < 1e-9);
            for pt in &curve.points {
                assert!((pt.point.x - x).abs() < 1e-9);
                assert!(pt.point.y.abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_plane_cylinder_oblique_ellipse() {
        let p = plane_index(Plane::new(Point3::origin(), Vec3::x(), Vec3::new(0.0, 1.0, 1.0)), 4.0);
        let c = index_of(
            Box::new(CylinderSurface::new(1.0)),
            UvRect::new((0.0, 2.0 * PI), (-3.0, 3.0)),
        );
        let result = canonical_intersection(&p, &c).unwrap();
        assert_eq!(result.curves.len(), 1);
        let curve = &result.curves[0];
        assert_eq!(curve.class, CurveClass::Ellipse);
        assert!(curve.closed);
        for pt in &curve.points {
            let r = (pt.point.x * pt.point.x + pt.point.y * pt.point.y).sqrt();
            assert!((r - 1.0).abs() < 1e-9);
            // On the plane y = z... the plane spanned by x and (0,1,1)
            // has normal (0,-1,1)/sqrt(2).
            assert!((pt.point.z - pt.point.y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_plane_cone_ellipse() {
        // Horizontal plane, vertical cone: a circle, classified as an
        // ellipse section.
        let p = plane_index(
            Plane::new(Point3::new(0.0, 0.0, 1.0), Vec3::x(), Vec3::y()),
            4.0,
        );
        let c = index_of(
            Box::new(ConeSurface::new(PI / 6.0)),
            UvRect::new((0.0, 2.0 * PI), (0.0, 3.0)),
        );
        let result = canonical_intersection(&p, &c).unwrap();
        assert_eq!(result.curves.len(), 1);
        let curve = &result.curves[0];
        assert_eq!(curve.class, CurveClass::Ellipse);
        assert!(curve.closed);
        let expected_r = (PI / 6.0).tan();
        for pt in &curve.points {
            assert!((pt.point.z - 1.0).abs() < 1e-9);
            let r = (pt.point.x * pt.point.x + pt.point.y * pt.point.y).sqrt();
            assert!((r - expected_r).abs() < 1e-9);
        }
    }

    #[test]
    fn test_plane_cone_hyperbola_branch() {
        // Plane parallel to the axis, offset from it: one hyperbola
        // branch on the indexed nappe.
        let p = plane_index(
            Plane::new(Point3::new(0.5, 0.0, 0.0), Vec3::y(), Vec3::z()),
            6.0,
        );
        let c = index_of(
            Box::new(ConeSurface::new(PI / 6.0)),
            UvRect::new((0.0, 2.0 * PI), (0.0, 4.0)),
        );
        let result = canonical_intersection(&p, &c).unwrap();
        assert!(!result.curves.is_empty());
        for curve in &result.curves {
            assert_eq!(curve.class, CurveClass::Hyperbola);
            assert!(!curve.closed);
            for pt in &curve.points {
                assert!((pt.point.x - 0.5).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_plane_torus_two_circles() {
        let p = plane_index(Plane::xy(), 5.0);
        let t = index_of(
            Box::new(TorusSurface::new(2.0, 0.5)),
            UvRect::new((0.0, 2.0 * PI), (0.0, 2.0 * PI)),
        );
        let result = canonical_intersection(&p, &t).unwrap();
        assert_eq!(result.curves.len(), 2);
        let mut radii: Vec<f64> = result
            .curves
            .iter()
            .map(|c| c.points[0].point.coords.norm())
            .collect();
        radii.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((radii[0] - 1.5).abs() < 1e-9);
        assert!((radii[1] - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_oblique_plane_torus_defers_to_numeric() {
        let p = plane_index(
            Plane::new(Point3::origin(), Vec3::x(), Vec3::new(0.0, 1.0, 0.3)),
            5.0,
        );
        let t = index_of(
            Box::new(TorusSurface::new(2.0, 0.5)),
            UvRect::new((0.0, 2.0 * PI), (0.0, 2.0 * PI)),
        );
        assert!(canonical_intersection(&p, &t).is_none());
    }

    #[test]
    fn test_sphere_sphere_circle() {
        let a = index_of(
            Box::new(SphereSurface::new(1.0)),
            UvRect::new((0.0, 2.0 * PI), (-PI / 2.0, PI / 2.0)),
        );
        let b = index_of(
            Box::new(SphereSurface::with_center(Point3::new(1.0, 0.0, 0.0), 1.0)),
            UvRect::new((0.0, 2.0 * PI), (-PI / 2.0, PI / 2.0)),
        );
        let result = canonical_intersection(&a, &b).unwrap();
        assert_eq!(result.curves.len(), 1);
        let curve = &result.curves[0];
        assert!(curve.closed);
        let expected_r = (3.0_f64).sqrt() / 2.0;
        for pt in &curve.points {
            assert!((pt.point.x - 0.5).abs() < 1e-9);
            let r = (pt.point.y * pt.point.y + pt.point.z * pt.point.z).sqrt();
            assert!((r - expected_r).abs() < 1e-9);
        }
    }

    #[test]
    fn test_disjoint_spheres_empty() {
        let a = index_of(
            Box::new(SphereSurface::new(1.0)),
            UvRect::new((0.0, 2.0 * PI), (-PI / 2.0, PI / 2.0)),
        );
        let b = index_of(
            Box::new(SphereSurface::with_center(Point3::new(5.0, 0.0, 0.0), 1.0)),
            UvRect::new((0.0, 2.0 * PI), (-PI / 2.0, PI / 2.0)),
        );
        let result = canonical_intersection(&a, &b).unwrap();
        assert!(result.curves.is_empty());
    }
}
