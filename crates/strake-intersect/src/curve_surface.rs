//! Curve/surface intersection.
//!
//! A Newton walk solves the coupled system in `(u, v, t)` inside one
//! index cell and one curve hull segment at a time; non-convergent
//! combinations are subdivided (cell into four, segment into two) and
//! only sub-combinations whose hulls still interfere are retried.
//! Degenerate configurations (the curve lying in the surface, or
//! grazing it tangentially) are classified instead of iterated on.

use nalgebra::Matrix3;
use strake_geom::{Curve3d, CurveHullSegment, Surface, UvRect};
use strake_hull::{patch_hull, Aabb3, CellIndex, OrientedBox};
use strake_math::{solve3, Point2, Point3, Tolerance};

use crate::IntersectError;

/// Cosine threshold under which a curve direction counts as lying in
/// the surface's tangent plane.
const TANGENT_PLANE_COS: f64 = 0.02;

/// Subdivision depth cap for non-convergent cell/segment pairs.
const MAX_SUBDIVISION_DEPTH: usize = 8;

/// One isolated curve/surface intersection.
#[derive(Debug, Clone, Copy)]
pub struct CurveSurfaceHit {
    /// 3D intersection point.
    pub point: Point3,
    /// Surface parameter of the intersection.
    pub uv: Point2,
    /// Curve parameter of the intersection.
    pub t: f64,
    /// The curve grazes the surface here rather than crossing it.
    pub tangential: bool,
}

/// Classification of one cell-level intersection attempt.
#[derive(Debug, Clone)]
pub enum CurveSurfaceOutcome {
    /// The Newton walk found no intersection in this cell/window.
    NoIntersection,
    /// A unique transversal intersection was isolated.
    Point(CurveSurfaceHit),
    /// The curve lies in the surface over the queried window.
    CurveInSurface,
    /// The curve touches the surface tangentially.
    Tangential(CurveSurfaceHit),
}

/// Result of walking a whole curve against an indexed surface.
#[derive(Debug, Clone)]
pub enum CurveIntersection {
    /// The curve misses the surface.
    Empty,
    /// Isolated intersection points, ordered by curve parameter.
    Points(Vec<CurveSurfaceHit>),
    /// The curve lies in the surface; no discrete points exist.
    CurveInSurface,
}

/// Project a point onto the surface by Newton iteration on the
/// tangent/normal frame, returning the foot point parameter and the
/// remaining distance.
fn project_to_surface(
    surface: &dyn Surface,
    p: &Point3,
    seed: Point2,
    iters: usize,
) -> Option<(Point2, f64)> {
    let mut uv = seed;
    for _ in 0..iters {
        let s = surface.evaluate(uv);
        let r = *p - s;
        let su = surface.d_du(uv);
        let sv = surface.d_dv(uv);
        let n = surface.normal(uv).into_inner();
        let jac = Matrix3::from_columns(&[su, sv, n]);
        let delta = solve3(&jac, &r)?;
        uv = Point2::new(uv.x + delta.x, uv.y + delta.y);
        if delta.x.hypot(delta.y) < 1e-13 {
            break;
        }
    }
    let dist = (*p - surface.evaluate(uv)).norm();
    Some((uv, dist))
}

/// Whether the curve direction lies in the surface tangent plane at the
/// curve point `t`, with the curve point itself on the surface.
fn lies_in_surface_at(
    surface: &dyn Surface,
    curve: &dyn Curve3d,
    t: f64,
    seed: Point2,
    tol: f64,
) -> bool {
    let p = curve.evaluate(t);
    let Some((uv, dist)) = project_to_surface(surface, &p, seed, 16) else {
        return false;
    };
    if dist > tol {
        return false;
    }
    let dir = curve.tangent(t);
    let len = dir.norm();
    if len < 1e-14 {
        return false;
    }
    let n = surface.normal(uv);
    (dir.dot(&n) / len).abs() < TANGENT_PLANE_COS
}

/// One Newton attempt inside a cell rectangle and curve window.
///
/// Solves `[S_u, S_v, -C'] · [du, dv, dt]ᵗ = C(t) - S(u,v)` with all
/// three unknowns updated simultaneously, recomputing tangents each
/// step. A residual that fails to halve for several consecutive steps,
/// or an iterate that leaves the cell or window, ends the walk; the
/// degeneracy checks then decide between no-intersection,
/// curve-in-surface and tangential.
pub fn intersect_curve_cell(
    surface: &dyn Surface,
    curve: &dyn Curve3d,
    window: (f64, f64),
    rect: UvRect,
    scale: f64,
) -> CurveSurfaceOutcome {
    let tol = Tolerance::DEFAULT.linear * scale;
    let (t0, t1) = window;
    let t_span = (t1 - t0).max(1e-14);

    let mut uv = rect.center();
    let mut t = 0.5 * (t0 + t1);
    let mut prev_residual = f64::INFINITY;
    let mut stall = 0usize;
    let mut best = (f64::INFINITY, uv, t);

    for _ in 0..32 {
        let cp = curve.evaluate(t);
        let sp = surface.evaluate(uv);
        let r = cp - sp;
        let residual = r.norm();
        if residual < best.0 {
            best = (residual, uv, t);
        }
        if residual < tol {
            let inside_cell = rect.contains_with_tol(uv, 0.1 * rect.u_span().max(rect.v_span()));
            let inside_window = t >= t0 - 1e-9 * t_span && t <= t1 + 1e-9 * t_span;
            if !(inside_cell && inside_window) {
                // Converged outside this cell; its own cell will claim it.
                return CurveSurfaceOutcome::NoIntersection;
            }
            let hit = CurveSurfaceHit {
                point: surface.evaluate(uv),
                uv,
                t,
                tangential: false,
            };
            return CurveSurfaceOutcome::Point(hit);
        }
        // The walk must keep halving its residual to count as converging.
        if residual > 0.5 * prev_residual {
            stall += 1;
            if stall > 5 {
                break;
            }
        } else {
            stall = 0;
        }
        prev_residual = residual;

        let su = surface.d_du(uv);
        let sv = surface.d_dv(uv);
        let cd = curve.tangent(t);
        let jac = Matrix3::from_columns(&[su, sv, -cd]);
        let Some(delta) = solve3(&jac, &r) else {
            // Singular system is a retryable local failure: subdivide.
            break;
        };
        uv = Point2::new(uv.x + delta.x, uv.y + delta.y);
        t += delta.z;

        if t < t0 - t_span || t > t1 + t_span {
            break;
        }
        if !rect.contains_with_tol(uv, rect.u_span().max(rect.v_span())) {
            break;
        }
    }

    // Degeneracy classification before giving up: either the curve lies
    // in the surface over the whole window, or it grazes tangentially.
    let seed = rect.center();
    if lies_in_surface_at(surface, curve, t0, seed, tol)
        && lies_in_surface_at(surface, curve, t1, seed, tol)
        && lies_in_surface_at(surface, curve, 0.5 * (t0 + t1), seed, tol)
    {
        return CurveSurfaceOutcome::CurveInSurface;
    }

    if best.0 < 1e-3 * scale {
        let dir = curve.tangent(best.2);
        let len = dir.norm();
        let n = surface.normal(best.1);
        if len > 1e-14 && (dir.dot(&n) / len).abs() < TANGENT_PLANE_COS {
            if let Some(hit) = refine_tangential(surface, curve, window, best.1, tol) {
                return CurveSurfaceOutcome::Tangential(hit);
            }
        }
    }

    CurveSurfaceOutcome::NoIntersection
}

/// Newton cannot isolate a tangential touch; fall back to bracketing
/// the distance minimum over the window.
fn refine_tangential(
    surface: &dyn Surface,
    curve: &dyn Curve3d,
    window: (f64, f64),
    seed: Point2,
    tol: f64,
) -> Option<CurveSurfaceHit> {
    let dist_at = |t: f64, seed: Point2| -> Option<(f64, Point2)> {
        let p = curve.evaluate(t);
        let (uv, d) = project_to_surface(surface, &p, seed, 12)?;
        Some((d, uv))
    };
    let (mut lo, mut hi) = window;
    let mut uv_seed = seed;
    for _ in 0..40 {
        let m1 = lo + (hi - lo) / 3.0;
        let m2 = hi - (hi - lo) / 3.0;
        let (d1, uv1) = dist_at(m1, uv_seed)?;
        let (d2, uv2) = dist_at(m2, uv_seed)?;
        if d1 < d2 {
            hi = m2;
            uv_seed = uv1;
        } else {
            lo = m1;
            uv_seed = uv2;
        }
    }
    let t = 0.5 * (lo + hi);
    let (d, uv) = dist_at(t, uv_seed)?;
    if d < 10.0 * tol {
        Some(CurveSurfaceHit {
            point: surface.evaluate(uv),
            uv,
            t,
            tangential: true,
        })
    } else {
        None
    }
}

/// Conservative hull for a curve segment's tetrahedral bound.
fn segment_box(seg: &CurveHullSegment) -> (Aabb3, OrientedBox) {
    let aabb = Aabb3::from_points(seg.vertices().iter());
    (aabb, OrientedBox::from_aabb(&aabb))
}

struct WorkItem {
    rect: UvRect,
    seg: CurveHullSegment,
    depth: usize,
}

/// Walk `curve` over `window` against the indexed surface.
///
/// Every leaf cell whose hull interferes with a curve hull segment gets
/// a Newton attempt; non-convergent pairs are subdivided until the
/// depth cap. Hits are deduplicated and ordered by curve parameter.
pub fn intersect_curve(
    index: &CellIndex,
    curve: &dyn Curve3d,
    window: (f64, f64),
) -> Result<CurveIntersection, IntersectError> {
    let (d0, d1) = curve.domain();
    let span = d1 - d0;
    if window.0 < d0 - 1e-9 * span.abs() || window.1 > d1 + 1e-9 * span.abs() || window.0 > window.1
    {
        return Err(IntersectError::WindowOutsideDomain(window.0, window.1));
    }
    let surface = index.surface();
    let scale = index.scale();
    let tol = Tolerance::DEFAULT.linear * scale;

    // Whole-curve degeneracy first: a curve lying in the surface never
    // yields discrete points.
    let extent_center = index.extent().center();
    if lies_in_surface_at(surface, curve, window.0, extent_center, tol)
        && lies_in_surface_at(surface, curve, window.1, extent_center, tol)
        && lies_in_surface_at(surface, curve, 0.5 * (window.0 + window.1), extent_center, tol)
    {
        return Ok(CurveIntersection::CurveInSurface);
    }

    let segments = curve.hull_segments(window, 16);
    if segments.is_empty() {
        if window.1 - window.0 > 1e-14 {
            return Err(IntersectError::MissingHullSegments);
        }
        return Ok(CurveIntersection::Empty);
    }

    let mut queue: Vec<WorkItem> = Vec::new();
    for (_, cell) in index.leaves() {
        let cell_bounds = cell.hull.aabb();
        for seg in &segments {
            let (seg_bounds, seg_box) = segment_box(seg);
            if cell_bounds.overlaps(&seg_bounds) && cell.hull.interferes(&seg_box) {
                queue.push(WorkItem {
                    rect: cell.rect,
                    seg: seg.clone(),
                    depth: 0,
                });
            }
        }
    }

    let mut hits: Vec<CurveSurfaceHit> = Vec::new();
    while let Some(item) = queue.pop() {
        match intersect_curve_cell(surface, curve, (item.seg.t0, item.seg.t1), item.rect, scale) {
            CurveSurfaceOutcome::Point(hit) | CurveSurfaceOutcome::Tangential(hit) => {
                push_hit(&mut hits, hit, tol, span.abs());
            }
            CurveSurfaceOutcome::CurveInSurface => {
                return Ok(CurveIntersection::CurveInSurface);
            }
            CurveSurfaceOutcome::NoIntersection => {
                if item.depth >= MAX_SUBDIVISION_DEPTH {
                    continue;
                }
                // Subdivide the cell and halve the curve segment; only
                // interfering sub-combinations survive.
                let halves = curve.hull_segments((item.seg.t0, item.seg.t1), 2);
                for rect in item.rect.quarter() {
                    let hull = patch_hull(surface, rect, 2);
                    let hull_bounds = hull.aabb();
                    for seg in &halves {
                        let (seg_bounds, seg_box) = segment_box(seg);
                        if hull_bounds.overlaps(&seg_bounds) && hull.interferes(&seg_box) {
                            queue.push(WorkItem {
                                rect,
                                seg: seg.clone(),
                                depth: item.depth + 1,
                            });
                        }
                    }
                }
            }
        }
    }

    hits.sort_by(|a, b| a.t.partial_cmp(&b.t).unwrap_or(std::cmp::Ordering::Equal));
    if hits.is_empty() {
        Ok(CurveIntersection::Empty)
    } else {
        Ok(CurveIntersection::Points(hits))
    }
}

fn push_hit(hits: &mut Vec<CurveSurfaceHit>, hit: CurveSurfaceHit, tol: f64, t_span: f64) {
    let duplicate = hits.iter().any(|h| {
        (h.t - hit.t).abs() < 1e-7 * t_span.max(1.0) || (h.point - hit.point).norm() < tol
    });
    if !duplicate {
        hits.push(hit);
    }
}
