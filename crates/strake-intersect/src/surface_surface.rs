//! Surface/surface intersection by grid tracing.
//!
//! The broad phase pairs interfering cells of the two indices; the
//! distinct patch boundaries of those cells form a rectangular parameter
//! grid per surface. Every grid line is an iso-curve that the
//! curve/surface intersector walks against the other surface, yielding
//! intersection points that carry both parameter images. Points are
//! classified as entering or leaving their local grid cells, linked into
//! open chains or closed loops by cell-local connectivity, and emitted
//! as dual-parametrization polyline curves.
//!
//! Locally ambiguous grids (a cell with more than one entering or
//! leaving point) are refined by inserting bisecting grid lines and
//! restarting, a bounded number of times; exhaustion degrades to
//! best-effort linking marked [`Confidence::Low`].

use nalgebra::Matrix2;
use strake_geom::{IsoCurve, IsoParam, Surface};
use strake_hull::CellIndex;
use strake_math::{solve2, Point2, Point3, Vec2, Vec3};

use crate::closed_form;
use crate::curve_surface::{intersect_curve, CurveIntersection};
use crate::Confidence;

/// Geometric classification of an output curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveClass {
    /// Straight line.
    Line,
    /// Circle.
    Circle,
    /// Ellipse.
    Ellipse,
    /// Parabola branch.
    Parabola,
    /// Hyperbola branch.
    Hyperbola,
    /// Numerically traced polyline.
    Polyline,
}

/// One point of a dual-parametrization curve.
#[derive(Debug, Clone, Copy)]
pub struct DualCurvePoint {
    /// 3D position.
    pub point: Point3,
    /// Parameter image on the first surface.
    pub uv1: Point2,
    /// Parameter image on the second surface.
    pub uv2: Point2,
}

/// An intersection curve carrying both surfaces' parameter images.
#[derive(Debug, Clone)]
pub struct DualSurfaceCurve {
    /// Geometric classification.
    pub class: CurveClass,
    /// Ordered curve points. For closed curves the first point is not
    /// repeated at the end.
    pub points: Vec<DualCurvePoint>,
    /// Whether the curve closes on itself.
    pub closed: bool,
}

impl DualSurfaceCurve {
    /// Evaluate the curve at a normalized chord-length parameter in
    /// `[0, 1]`, interpolating linearly between stored points. Closed
    /// curves wrap back to their first point at `s = 1`.
    pub fn point_at(&self, s: f64) -> Point3 {
        let n = self.points.len();
        if n <= 1 {
            return self.points.first().map_or_else(Point3::origin, |p| p.point);
        }
        let segs = if self.closed { n } else { n - 1 };
        let lengths: Vec<f64> = (0..segs)
            .map(|i| (self.points[(i + 1) % n].point - self.points[i].point).norm())
            .collect();
        let total: f64 = lengths.iter().sum();
        if total < 1e-300 {
            return self.points[0].point;
        }
        let mut remaining = s.clamp(0.0, 1.0) * total;
        for (i, &len) in lengths.iter().enumerate() {
            if remaining <= len || i == segs - 1 {
                let frac = if len > 0.0 { (remaining / len).min(1.0) } else { 0.0 };
                let a = self.points[i].point;
                let b = self.points[(i + 1) % n].point;
                return a + frac * (b - a);
            }
            remaining -= len;
        }
        self.points[n - 1].point
    }
}

/// Result of a surface/surface intersection.
#[derive(Debug, Clone)]
pub struct SurfaceIntersection {
    /// The intersection curves; empty when the surfaces do not meet.
    pub curves: Vec<DualSurfaceCurve>,
    /// Trust level of the result.
    pub confidence: Confidence,
}

impl SurfaceIntersection {
    fn empty(confidence: Confidence) -> Self {
        Self {
            curves: Vec::new(),
            confidence,
        }
    }
}

/// Grid refinement retries before degrading to best-effort linking.
const MAX_AMBIGUITY_RETRIES: usize = 4;

/// Intersect two indexed surfaces.
///
/// Analytic pairs with closed-form intersections (plane/quadric,
/// sphere/sphere) bypass the numeric tracer; everything else goes
/// through the parameter grid.
pub fn intersect_surfaces(a: &CellIndex, b: &CellIndex) -> SurfaceIntersection {
    if let Some(result) = closed_form::canonical_intersection(a, b) {
        return result;
    }
    grid_trace(a, b)
}

/// Sorted distinct parameter values per axis: the grid lines.
#[derive(Debug, Clone)]
struct Grid {
    us: Vec<f64>,
    vs: Vec<f64>,
}

impl Grid {
    fn from_cells<'a>(rects: impl Iterator<Item = &'a strake_geom::UvRect>) -> Self {
        let mut us = Vec::new();
        let mut vs = Vec::new();
        for r in rects {
            us.push(r.u.0);
            us.push(r.u.1);
            vs.push(r.v.0);
            vs.push(r.v.1);
        }
        let mut grid = Self { us, vs };
        grid.normalize();
        grid
    }

    fn normalize(&mut self) {
        for axis in [&mut self.us, &mut self.vs] {
            axis.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let span = (axis.last().copied().unwrap_or(1.0)
                - axis.first().copied().unwrap_or(0.0))
            .abs()
            .max(1e-12);
            axis.dedup_by(|a, b| (*a - *b).abs() < 1e-9 * span);
        }
    }

    fn insert_u(&mut self, value: f64) {
        self.us.push(value);
        self.normalize();
    }

    fn insert_v(&mut self, value: f64) {
        self.vs.push(value);
        self.normalize();
    }

    fn u_range(&self) -> (f64, f64) {
        (self.us[0], *self.us.last().unwrap())
    }

    fn v_range(&self) -> (f64, f64) {
        (self.vs[0], *self.vs.last().unwrap())
    }

    fn snap_tol_u(&self) -> f64 {
        1e-6 * (self.u_range().1 - self.u_range().0).abs().max(1e-12)
    }

    fn snap_tol_v(&self) -> f64 {
        1e-6 * (self.v_range().1 - self.v_range().0).abs().max(1e-12)
    }
}

/// Whether a grid axis spans one full period of its surface, making the
/// first and last grid lines the same 3D curve.
#[derive(Debug, Clone, Copy, Default)]
struct GridWrap {
    u: bool,
    v: bool,
}

impl GridWrap {
    fn of(surface: &dyn Surface, grid: &Grid) -> Self {
        let span_matches = |period: Option<f64>, range: (f64, f64)| {
            period.is_some_and(|p| ((range.1 - range.0).abs() - p).abs() < 1e-9 * p)
        };
        Self {
            u: span_matches(surface.u_period(), grid.u_range()),
            v: span_matches(surface.v_period(), grid.v_range()),
        }
    }
}

/// A traced intersection point with its grid-line memberships and the
/// 2D crossing directions on both surfaces.
#[derive(Debug, Clone)]
struct GridPoint {
    point: Point3,
    uv1: Point2,
    uv2: Point2,
    /// Index of the grid u-line of surface 1 this point lies on.
    on_u1: Option<usize>,
    on_v1: Option<usize>,
    on_u2: Option<usize>,
    on_v2: Option<usize>,
    /// Parameter-space tangent of the intersection curve on surface 1.
    /// `None` at tangential contacts where the 3D tangent vanishes.
    dir1: Option<Vec2>,
    dir2: Option<Vec2>,
}

fn grid_trace(a: &CellIndex, b: &CellIndex) -> SurfaceIntersection {
    grid_trace_with_budget(a, b, MAX_AMBIGUITY_RETRIES)
}

/// Grid trace with an explicit refinement budget. `budget` restarts are
/// allowed before ambiguous cells stop triggering refinement and the
/// linking degrades to best effort.
fn grid_trace_with_budget(a: &CellIndex, b: &CellIndex, budget: usize) -> SurfaceIntersection {
    let pairs = a.interfering_pairs(b);
    if pairs.is_empty() {
        return SurfaceIntersection::empty(Confidence::Numeric);
    }
    let rects_a: Vec<_> = pairs
        .iter()
        .filter_map(|&(ka, _)| a.cell(ka).map(|c| c.rect))
        .collect();
    let rects_b: Vec<_> = pairs
        .iter()
        .filter_map(|&(_, kb)| b.cell(kb).map(|c| c.rect))
        .collect();
    let mut grid_a = Grid::from_cells(rects_a.iter());
    let mut grid_b = Grid::from_cells(rects_b.iter());

    let mut confidence = Confidence::Numeric;
    for retry in 0..=budget {
        let final_try = retry == budget;
        let (points, overlap) = collect_points(a, b, &grid_a, &grid_b);
        if overlap {
            confidence = Confidence::Low;
        }
        if points.len() < 2 {
            return SurfaceIntersection::empty(confidence);
        }

        let mut ambiguities = Vec::new();
        let mut edges = Vec::new();
        let wrap_a = GridWrap::of(a.surface(), &grid_a);
        let wrap_b = GridWrap::of(b.surface(), &grid_b);
        link_on_grid(
            &points,
            &grid_a,
            wrap_a,
            SurfaceSide::First,
            final_try,
            &mut edges,
            &mut ambiguities,
        );
        link_on_grid(
            &points,
            &grid_b,
            wrap_b,
            SurfaceSide::Second,
            final_try,
            &mut edges,
            &mut ambiguities,
        );

        if !final_try && !ambiguities.is_empty() {
            for amb in ambiguities {
                match amb {
                    Ambiguity::U1(x) => grid_a.insert_u(x),
                    Ambiguity::V1(x) => grid_a.insert_v(x),
                    Ambiguity::U2(x) => grid_b.insert_u(x),
                    Ambiguity::V2(x) => grid_b.insert_v(x),
                }
            }
            continue;
        }
        if final_try && !ambiguities.is_empty() {
            confidence = Confidence::Low;
        }

        let curves = assemble_curves(&points, edges);
        return SurfaceIntersection { curves, confidence };
    }
    unreachable!("retry loop always returns on the final attempt")
}

/// Intersect every grid line of each surface against the other surface,
/// then snap and merge the resulting points. The boolean reports whether
/// any grid line was found to lie in the other surface (overlapping
/// surfaces).
fn collect_points(
    a: &CellIndex,
    b: &CellIndex,
    grid_a: &Grid,
    grid_b: &Grid,
) -> (Vec<GridPoint>, bool) {
    let mut raw: Vec<GridPoint> = Vec::new();
    let mut overlap = false;

    let mut trace = |from_first: bool, iso: IsoCurve, window: (f64, f64)| {
        let target = if from_first { b } else { a };
        match intersect_curve(target, &iso, window) {
            Ok(CurveIntersection::Points(hits)) => {
                for hit in hits {
                    let (uv_own, uv_other) = (iso.uv_at(hit.t), hit.uv);
                    let (uv1, uv2) = if from_first {
                        (uv_own, uv_other)
                    } else {
                        (uv_other, uv_own)
                    };
                    raw.push(GridPoint {
                        point: hit.point,
                        uv1,
                        uv2,
                        on_u1: None,
                        on_v1: None,
                        on_u2: None,
                        on_v2: None,
                        dir1: None,
                        dir2: None,
                    });
                }
            }
            Ok(CurveIntersection::CurveInSurface) => {
                overlap = true;
            }
            Ok(CurveIntersection::Empty) | Err(_) => {}
        }
    };

    let (va0, va1) = grid_a.v_range();
    let (ua0, ua1) = grid_a.u_range();
    for &u in &grid_a.us {
        let iso = IsoCurve::new(a.surface().clone_box(), IsoParam::U(u), (va0, va1));
        trace(true, iso, (va0, va1));
    }
    for &v in &grid_a.vs {
        let iso = IsoCurve::new(a.surface().clone_box(), IsoParam::V(v), (ua0, ua1));
        trace(true, iso, (ua0, ua1));
    }
    let (vb0, vb1) = grid_b.v_range();
    let (ub0, ub1) = grid_b.u_range();
    for &u in &grid_b.us {
        let iso = IsoCurve::new(b.surface().clone_box(), IsoParam::U(u), (vb0, vb1));
        trace(false, iso, (vb0, vb1));
    }
    for &v in &grid_b.vs {
        let iso = IsoCurve::new(b.surface().clone_box(), IsoParam::V(v), (ub0, ub1));
        trace(false, iso, (ub0, ub1));
    }

    // Vertex snapping, then 3D merge of near-duplicates.
    for p in &mut raw {
        snap_point(p, grid_a, grid_b);
    }
    let tol3d = 1e-6 * a.scale().max(b.scale());
    let mut merged: Vec<GridPoint> = Vec::new();
    'outer: for p in raw {
        for q in &mut merged {
            if (q.point - p.point).norm() < tol3d {
                q.on_u1 = q.on_u1.or(p.on_u1);
                q.on_v1 = q.on_v1.or(p.on_v1);
                q.on_u2 = q.on_u2.or(p.on_u2);
                q.on_v2 = q.on_v2.or(p.on_v2);
                continue 'outer;
            }
        }
        merged.push(p);
    }

    // Crossing directions from the surface normals.
    for p in &mut merged {
        let t3d = a
            .surface()
            .normal(p.uv1)
            .cross(&b.surface().normal(p.uv2));
        if t3d.norm() > 1e-8 {
            p.dir1 = param_direction(a.surface(), p.uv1, &t3d);
            p.dir2 = param_direction(b.surface(), p.uv2, &t3d);
        }
    }

    (merged, overlap)
}

fn snap_point(p: &mut GridPoint, grid_a: &Grid, grid_b: &Grid) {
    let tu = grid_a.snap_tol_u();
    let tv = grid_a.snap_tol_v();
    for (i, &u) in grid_a.us.iter().enumerate() {
        if (p.uv1.x - u).abs() < tu {
            p.uv1.x = u;
            p.on_u1 = Some(i);
        }
    }
    for (j, &v) in grid_a.vs.iter().enumerate() {
        if (p.uv1.y - v).abs() < tv {
            p.uv1.y = v;
            p.on_v1 = Some(j);
        }
    }
    let tu = grid_b.snap_tol_u();
    let tv = grid_b.snap_tol_v();
    for (i, &u) in grid_b.us.iter().enumerate() {
        if (p.uv2.x - u).abs() < tu {
            p.uv2.x = u;
            p.on_u2 = Some(i);
        }
    }
    for (j, &v) in grid_b.vs.iter().enumerate() {
        if (p.uv2.y - v).abs() < tv {
            p.uv2.y = v;
            p.on_v2 = Some(j);
        }
    }
}

/// Project the 3D curve tangent into a surface's parameter space by
/// solving the first-fundamental-form system.
fn param_direction(surface: &dyn Surface, uv: Point2, t3d: &Vec3) -> Option<Vec2> {
    let su = surface.d_du(uv);
    let sv = surface.d_dv(uv);
    let gram = Matrix2::new(su.dot(&su), su.dot(&sv), su.dot(&sv), sv.dot(&sv));
    let rhs = Vec2::new(t3d.dot(&su), t3d.dot(&sv));
    let d = solve2(&gram, &rhs)?;
    if d.norm() < 1e-14 {
        None
    } else {
        Some(d.normalize())
    }
}

#[derive(Debug, Clone, Copy)]
enum SurfaceSide {
    First,
    Second,
}

#[derive(Debug, Clone, Copy)]
enum Ambiguity {
    U1(f64),
    V1(f64),
    U2(f64),
    V2(f64),
}

/// Link entering/leaving point pairs cell-by-cell on one surface's grid.
///
/// An edge point's role comes from comparing its crossing direction with
/// the cell's inward normal at that edge; points without a direction
/// (tangential contacts) are wildcards that absorb otherwise unmatched
/// points. Cells with more than one entering or leaving point report an
/// ambiguity unless this is the final attempt, in which case pairs are
/// matched greedily by direction continuity.
fn link_on_grid(
    points: &[GridPoint],
    grid: &Grid,
    wrap: GridWrap,
    side: SurfaceSide,
    final_try: bool,
    edges: &mut Vec<(usize, usize)>,
    ambiguities: &mut Vec<Ambiguity>,
) {
    let nu = grid.us.len();
    let nv = grid.vs.len();
    if nu < 2 || nv < 2 {
        return;
    }
    // On a full-period axis the first and last grid lines coincide in
    // 3D, so membership tests identify them.
    let same_u = |line: usize, on: Option<usize>| {
        on == Some(line)
            || (wrap.u
                && ((line == 0 && on == Some(nu - 1)) || (line == nu - 1 && on == Some(0))))
    };
    let same_v = |line: usize, on: Option<usize>| {
        on == Some(line)
            || (wrap.v
                && ((line == 0 && on == Some(nv - 1)) || (line == nv - 1 && on == Some(0))))
    };
    for i in 0..nu - 1 {
        for j in 0..nv - 1 {
            let (u0, u1) = (grid.us[i], grid.us[i + 1]);
            let (v0, v1) = (grid.vs[j], grid.vs[j + 1]);
            let mut entering = Vec::new();
            let mut leaving = Vec::new();
            let mut wildcards = Vec::new();
            let mut interior = Vec::new();
            for (id, p) in points.iter().enumerate() {
                let (uv, on_u, on_v, dir) = match side {
                    SurfaceSide::First => (p.uv1, p.on_u1, p.on_v1, p.dir1),
                    SurfaceSide::Second => (p.uv2, p.on_u2, p.on_v2, p.dir2),
                };
                let on_left = same_u(i, on_u);
                let on_right = same_u(i + 1, on_u);
                let on_bottom = same_v(j, on_v);
                let on_top = same_v(j + 1, on_v);
                let in_u = uv.x >= u0 - 1e-12 && uv.x <= u1 + 1e-12;
                let in_v = uv.y >= v0 - 1e-12 && uv.y <= v1 + 1e-12;
                let on_boundary = (on_left || on_right) && in_v || (on_bottom || on_top) && in_u;
                if !on_boundary {
                    // Crossings of the other surface's grid lines fall
                    // inside this cell; they get chained between the
                    // boundary points.
                    if in_u && in_v {
                        interior.push(id);
                    }
                    continue;
                }
                // Inward direction at this point's edge(s).
                let mut inward = Vec2::zeros();
                if on_left {
                    inward.x += 1.0;
                }
                if on_right {
                    inward.x -= 1.0;
                }
                if on_bottom {
                    inward.y += 1.0;
                }
                if on_top {
                    inward.y -= 1.0;
                }
                match dir {
                    None => wildcards.push(id),
                    Some(d) => {
                        let along = d.dot(&inward);
                        if along > 1e-9 {
                            entering.push(id);
                        } else if along < -1e-9 {
                            leaving.push(id);
                        } else {
                            wildcards.push(id);
                        }
                    }
                }
            }

            if entering.len() > 1 || leaving.len() > 1 {
                // Bisect between the two offending points, along the
                // axis that separates them most.
                let offenders = if entering.len() > 1 { &entering } else { &leaving };
                let (p0, p1) = (&points[offenders[0]], &points[offenders[1]]);
                let (a0, a1) = match side {
                    SurfaceSide::First => (p0.uv1, p1.uv1),
                    SurfaceSide::Second => (p0.uv2, p1.uv2),
                };
                let du = (a0.x - a1.x).abs();
                let dv = (a0.y - a1.y).abs();
                let amb = match (side, du > dv) {
                    (SurfaceSide::First, true) => Ambiguity::U1(0.5 * (a0.x + a1.x)),
                    (SurfaceSide::First, false) => Ambiguity::V1(0.5 * (a0.y + a1.y)),
                    (SurfaceSide::Second, true) => Ambiguity::U2(0.5 * (a0.x + a1.x)),
                    (SurfaceSide::Second, false) => Ambiguity::V2(0.5 * (a0.y + a1.y)),
                };
                ambiguities.push(amb);
                if !final_try {
                    continue;
                }
            }

            pair_cell_points(points, entering, leaving, interior, wildcards, edges);
        }
    }
}

/// Chain one cell's points into edges.
///
/// The regular case is one entering and one leaving point: the interior
/// points (crossings of the other surface's grid) are sorted along the
/// enter-to-leave segment and linked consecutively. Unbalanced cells
/// attach leftover directed points to the nearest wildcard (a
/// tangential contact); a cell holding nothing but two wildcards links
/// them directly.
fn pair_cell_points(
    points: &[GridPoint],
    mut entering: Vec<usize>,
    mut leaving: Vec<usize>,
    interior: Vec<usize>,
    wildcards: Vec<usize>,
    edges: &mut Vec<(usize, usize)>,
) {
    let had_directed = !entering.is_empty() || !leaving.is_empty();
    let mut push_edge = |a: usize, b: usize| {
        if a == b {
            return;
        }
        let e = (a.min(b), a.max(b));
        if !edges.contains(&e) {
            edges.push(e);
        }
    };

    if entering.len() == 1 && leaving.len() == 1 {
        let from = entering[0];
        let to = leaving[0];
        let axis = points[to].point - points[from].point;
        let mut chain = interior;
        chain.sort_by(|&x, &y| {
            let px = (points[x].point - points[from].point).dot(&axis);
            let py = (points[y].point - points[from].point).dot(&axis);
            px.partial_cmp(&py).unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut prev = from;
        for id in chain {
            push_edge(prev, id);
            prev = id;
        }
        push_edge(prev, to);
        return;
    }

    // Degenerate cells: match greedily by 3D proximity, leftover points
    // attach to wildcards.
    while let Some(e) = entering.pop() {
        if leaving.is_empty() {
            if let Some(&w) = nearest(points, &wildcards, e) {
                push_edge(e, w);
            }
            continue;
        }
        let best = leaving
            .iter()
            .enumerate()
            .min_by(|(_, &x), (_, &y)| {
                let dx = (points[x].point - points[e].point).norm();
                let dy = (points[y].point - points[e].point).norm();
                dx.partial_cmp(&dy).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(k, _)| k);
        if let Some(k) = best {
            let l = leaving.swap_remove(k);
            push_edge(e, l);
        }
    }
    for l in leaving {
        if let Some(&w) = nearest(points, &wildcards, l) {
            push_edge(l, w);
        }
    }
    // A cell crossed only by a tangential contact pairs its two
    // wildcards directly.
    if !had_directed && wildcards.len() == 2 {
        push_edge(wildcards[0], wildcards[1]);
    }
}

fn nearest<'a>(points: &[GridPoint], candidates: &'a [usize], to: usize) -> Option<&'a usize> {
    candidates.iter().min_by(|&&x, &&y| {
        let dx = (points[x].point - points[to].point).norm();
        let dy = (points[y].point - points[to].point).norm();
        dx.partial_cmp(&dy).unwrap_or(std::cmp::Ordering::Equal)
    })
}

/// Walk the link graph into ordered open chains and closed loops, then
/// prune collinear interior points.
fn assemble_curves(points: &[GridPoint], edges: Vec<(usize, usize)>) -> Vec<DualSurfaceCurve> {
    let n = points.len();
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (k, &(a, b)) in edges.iter().enumerate() {
        adjacency[a].push(k);
        adjacency[b].push(k);
    }
    let mut edge_used = vec![false; edges.len()];
    let mut curves = Vec::new();

    // Open chains first (odd-degree endpoints), then leftover loops.
    let mut starts: Vec<usize> = (0..n).filter(|&i| adjacency[i].len() % 2 == 1).collect();
    starts.extend(0..n);

    for start in starts {
        loop {
            let Some(&first_edge) = adjacency[start].iter().find(|&&e| !edge_used[e]) else {
                break;
            };
            let mut path = vec![start];
            let mut current = start;
            let mut next_edge = Some(first_edge);
            while let Some(e) = next_edge {
                edge_used[e] = true;
                let (a, b) = edges[e];
                let next = if a == current { b } else { a };
                let incoming = points[next].point - points[current].point;
                path.push(next);
                current = next;
                // Choose the unused continuation that bends the least.
                next_edge = adjacency[current]
                    .iter()
                    .copied()
                    .filter(|&e2| !edge_used[e2])
                    .max_by(|&x, &y| {
                        let sx = continuation_score(points, &edges, current, x, &incoming);
                        let sy = continuation_score(points, &edges, current, y, &incoming);
                        sx.partial_cmp(&sy).unwrap_or(std::cmp::Ordering::Equal)
                    });
                if current == start {
                    break;
                }
            }
            let closed = path.len() > 2 && path.first() == path.last();
            if closed {
                path.pop();
            }
            if path.len() < 2 {
                continue;
            }
            let mut curve_points: Vec<DualCurvePoint> = path
                .iter()
                .map(|&i| DualCurvePoint {
                    point: points[i].point,
                    uv1: points[i].uv1,
                    uv2: points[i].uv2,
                })
                .collect();
            prune_collinear(&mut curve_points, closed);
            if curve_points.len() >= 2 {
                curves.push(DualSurfaceCurve {
                    class: CurveClass::Polyline,
                    points: curve_points,
                    closed,
                });
            }
        }
    }
    curves
}

fn continuation_score(
    points: &[GridPoint],
    edges: &[(usize, usize)],
    current: usize,
    edge: usize,
    incoming: &Vec3,
) -> f64 {
    let (a, b) = edges[edge];
    let next = if a == current { b } else { a };
    let seg = points[next].point - points[current].point;
    let len = seg.norm();
    if len < 1e-14 {
        return -2.0;
    }
    if incoming.norm() > 1e-14 {
        incoming.normalize().dot(&(seg / len))
    } else {
        0.0
    }
}

/// Remove interior points that sit on the segment between neighbors.
fn prune_collinear(points: &mut Vec<DualCurvePoint>, closed: bool) {
    if points.len() < 3 {
        return;
    }
    let mut keep = vec![true; points.len()];
    let last = if closed { points.len() } else { points.len() - 1 };
    for i in 1..last {
        let prev = points[i - 1].point;
        let here = points[i % points.len()].point;
        let next = points[(i + 1) % points.len()].point;
        let chord = next - prev;
        let clen = chord.norm();
        if clen < 1e-14 {
            continue;
        }
        let deviation = (here - prev).cross(&(chord / clen)).norm();
        if deviation < 1e-9 * clen {
            keep[i % points.len()] = false;
        }
    }
    let mut idx = 0;
    points.retain(|_| {
        let k = keep[idx];
        idx += 1;
        k
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use strake_geom::{CylinderSurface, Plane, SphereSurface, UvRect};
    use strake_hull::IndexConfig;

    fn index_of(surface: Box<dyn Surface>, extent: UvRect) -> CellIndex {
        CellIndex::build(surface, extent, IndexConfig::default())
    }

    #[test]
    fn test_steinmetz_two_closed_curves() {
        // Orthogonal unit cylinders meet in the two Steinmetz curves.
        let extent = UvRect::new((0.0, 2.0 * PI), (-1.5, 1.5));
        let a = index_of(Box::new(CylinderSurface::new(1.0)), extent);
        let b = index_of(
            Box::new(CylinderSurface::with_axis(Point3::origin(), Vec3::x(), 1.0)),
            extent,
        );
        let result = intersect_surfaces(&a, &b);
        let closed: Vec<_> = result.curves.iter().filter(|c| c.closed).collect();
        assert_eq!(closed.len(), 2, "expected the two Steinmetz loops");
        for curve in &result.curves {
            for p in &curve.points {
                // On both cylinders.
                let r1 = (p.point.x * p.point.x + p.point.y * p.point.y).sqrt();
                let r2 = (p.point.y * p.point.y + p.point.z * p.point.z).sqrt();
                assert!((r1 - 1.0).abs() < 1e-3, "off first cylinder: {:?}", p.point);
                assert!((r2 - 1.0).abs() < 1e-3, "off second cylinder: {:?}", p.point);
            }
        }
    }

    #[test]
    fn test_intersection_symmetry() {
        let extent = UvRect::new((0.0, 2.0 * PI), (-1.5, 1.5));
        let a = index_of(Box::new(CylinderSurface::new(1.0)), extent);
        let b = index_of(
            Box::new(CylinderSurface::with_axis(Point3::origin(), Vec3::x(), 1.0)),
            extent,
        );
        let ab = intersect_surfaces(&a, &b);
        let ba = intersect_surfaces(&b, &a);
        assert_eq!(ab.curves.len(), ba.curves.len());
        // Every point of ab lies near some point of ba.
        for curve in &ab.curves {
            for p in &curve.points {
                let near = ba.curves.iter().flat_map(|c| &c.points).any(|q| {
                    (q.point - p.point).norm() < 1e-2
                });
                assert!(near, "{:?} missing from reversed result", p.point);
            }
        }
    }

    #[test]
    fn test_idempotence() {
        let extent = UvRect::new((0.0, 2.0 * PI), (-1.5, 1.5));
        let a = index_of(Box::new(CylinderSurface::new(1.0)), extent);
        let b = index_of(
            Box::new(CylinderSurface::with_axis(Point3::origin(), Vec3::x(), 1.0)),
            extent,
        );
        let first = intersect_surfaces(&a, &b);
        let second = intersect_surfaces(&a, &b);
        assert_eq!(first.curves.len(), second.curves.len());
        for (c1, c2) in first.curves.iter().zip(&second.curves) {
            assert_eq!(c1.points.len(), c2.points.len());
            for (p1, p2) in c1.points.iter().zip(&c2.points) {
                assert!((p1.point - p2.point).norm() < 1e-12);
            }
        }
    }

    #[test]
    fn test_exhausted_refinement_reports_low_confidence() {
        // With a zero refinement budget the first linking pass is also
        // the last; the Steinmetz grids start out with cells holding
        // two entering points, so the result must be marked low
        // confidence while the full budget resolves it cleanly.
        let extent = UvRect::new((0.0, 2.0 * PI), (-1.5, 1.5));
        let a = index_of(Box::new(CylinderSurface::new(1.0)), extent);
        let b = index_of(
            Box::new(CylinderSurface::with_axis(Point3::origin(), Vec3::x(), 1.0)),
            extent,
        );
        let starved = grid_trace_with_budget(&a, &b, 0);
        assert_eq!(starved.confidence, Confidence::Low);
        assert!(!starved.curves.is_empty());
        let refined = grid_trace_with_budget(&a, &b, MAX_AMBIGUITY_RETRIES);
        assert_eq!(refined.confidence, Confidence::Numeric);
    }

    #[test]
    fn test_disjoint_surfaces_empty() {
        let extent = UvRect::new((0.0, 2.0 * PI), (-1.0, 1.0));
        let a = index_of(Box::new(CylinderSurface::new(1.0)), extent);
        let b = index_of(
            Box::new(CylinderSurface::with_axis(
                Point3::new(10.0, 0.0, 0.0),
                Vec3::z(),
                1.0,
            )),
            extent,
        );
        let result = intersect_surfaces(&a, &b);
        assert!(result.curves.is_empty());
    }

    #[test]
    fn test_sphere_cylinder_numeric_loop() {
        // Unit sphere and a thin offset cylinder: two small closed
        // loops, one on each side of the sphere... the cylinder along z
        // at x=0.7 with radius 0.2 pierces the sphere twice.
        let sphere = index_of(
            Box::new(SphereSurface::new(1.0)),
            UvRect::new((0.0, 2.0 * PI), (-PI / 2.0, PI / 2.0)),
        );
        let cyl = index_of(
            Box::new(CylinderSurface::with_axis(
                Point3::new(0.7, 0.0, 0.0),
                Vec3::z(),
                0.2,
            )),
            UvRect::new((0.0, 2.0 * PI), (-1.5, 1.5)),
        );
        let result = intersect_surfaces(&sphere, &cyl);
        assert!(!result.curves.is_empty());
        for curve in &result.curves {
            for p in &curve.points {
                assert!((p.point.coords.norm() - 1.0).abs() < 1e-3);
                let dx = p.point.x - 0.7;
                let r = (dx * dx + p.point.y * p.point.y).sqrt();
                assert!((r - 0.2).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_plane_cylinder_dispatches_closed_form() {
        let plane = index_of(
            Box::new(Plane::xz()),
            UvRect::new((-3.0, 3.0), (-3.0, 3.0)),
        );
        let cyl = index_of(
            Box::new(CylinderSurface::new(1.0)),
            UvRect::new((0.0, 2.0 * PI), (-2.0, 2.0)),
        );
        let result = intersect_surfaces(&plane, &cyl);
        assert_eq!(result.confidence, Confidence::Exact);
        assert_eq!(result.curves.len(), 2);
        for curve in &result.curves {
            assert_eq!(curve.class, CurveClass::Line);
        }
    }
}
