#![warn(missing_docs)]

//! Adaptive cell hull index over parametric surfaces.
//!
//! The index recursively subdivides a surface's parameter extent into
//! patches whose corner normals agree to within a configured angle, and
//! bounds each accepted patch by a near-minimal oriented hexahedral hull.
//! The resulting cell tree serves every spatial query the kernel makes:
//! point-to-parameter inversion, line intersection, box hit tests and
//! the broad-phase cell pairing that drives surface intersection.
//!
//! Cells live in a slotmap arena with stable keys, so consumers can hold
//! onto cell identities across queries; a version counter tracks
//! invalidation when the underlying surface mutates.

mod aabb;
mod cell;

pub use aabb::Aabb3;
pub use cell::OrientedBox;

use nalgebra::{Cholesky, Matrix3, Matrix6, Vector6};
use slotmap::{new_key_type, SlotMap};
use strake_geom::{Surface, UvRect};
use strake_math::{solve3, Point2, Point3, Tolerance, Vec3};

new_key_type! {
    /// Stable handle to a cell in the index arena.
    pub struct CellKey;
}

/// Subdivision and query thresholds of the index.
///
/// The angular thresholds are expressed as cosines so corner-normal
/// comparison is a dot product.
#[derive(Debug, Clone, Copy)]
pub struct IndexConfig {
    /// Corner normals must agree to within this cosine for a patch to be
    /// accepted without subdivision (45°).
    pub flat_cos: f64,
    /// Beyond this cosine of divergence (90°) a floor-size patch is
    /// marked folded instead of subdivided further.
    pub fold_cos: f64,
    /// Smallest patch span, as a fraction of the full extent, below
    /// which subdivision stops.
    pub resolution: f64,
    /// Interior sample count per patch edge when bounding the hull.
    pub edge_samples: usize,
    /// Relative inflation of hull extents, scaled by the hull diagonal.
    pub hull_margin: f64,
    /// Newton iteration cap for point inversion and line intersection.
    pub max_newton_iters: usize,
    /// Candidate cells tried, nearest first, before inversion gives up.
    pub candidate_cells: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            flat_cos: std::f64::consts::FRAC_1_SQRT_2,
            fold_cos: 0.0,
            resolution: 1e-3,
            edge_samples: 4,
            hull_margin: 1e-6,
            max_newton_iters: 16,
            candidate_cells: 4,
        }
    }
}

/// Quadratic least-squares map from a hull's tangential coordinates to
/// surface parameters, used to seed point inversion.
#[derive(Debug, Clone)]
struct QuadFit {
    coeff_u: Vector6<f64>,
    coeff_v: Vector6<f64>,
}

impl QuadFit {
    fn basis(x: f64, y: f64) -> Vector6<f64> {
        Vector6::new(1.0, x, y, x * x, x * y, y * y)
    }

    fn eval(&self, x: f64, y: f64) -> Point2 {
        let b = Self::basis(x, y);
        Point2::new(self.coeff_u.dot(&b), self.coeff_v.dot(&b))
    }
}

/// One node of the cell tree: a parameter patch, its oriented hull and
/// the degeneracy flags recorded at acceptance time.
#[derive(Debug, Clone)]
pub struct HullCell {
    /// The parameter patch this cell bounds.
    pub rect: UvRect,
    /// Oriented hull proven to contain the patch's image.
    pub hull: OrientedBox,
    /// Hull is a thin slab: the patch is geometrically flat.
    pub is_flat: bool,
    /// Corner normals diverge beyond the fold threshold; subdivision was
    /// stopped by the resolution floor.
    pub is_folded: bool,
    /// Child keys; empty for a leaf.
    pub children: Vec<CellKey>,
    fit: Option<QuadFit>,
}

/// A line/surface intersection found through the index.
#[derive(Debug, Clone, Copy)]
pub struct LineHit {
    /// Parameter along the query line.
    pub t: f64,
    /// Surface parameter of the hit.
    pub uv: Point2,
    /// 3D intersection point.
    pub point: Point3,
}

/// Adaptive spatial index over one surface.
#[derive(Debug)]
pub struct CellIndex {
    surface: Box<dyn Surface>,
    extent: UvRect,
    cfg: IndexConfig,
    cells: SlotMap<CellKey, HullCell>,
    roots: Vec<CellKey>,
    leaves: Vec<CellKey>,
    version: u64,
    scale: f64,
    bounds: Aabb3,
}

impl CellIndex {
    /// Build an index over `extent` of `surface`.
    pub fn build(surface: Box<dyn Surface>, extent: UvRect, cfg: IndexConfig) -> Self {
        let mut index = Self {
            surface,
            extent,
            cfg,
            cells: SlotMap::with_key(),
            roots: Vec::new(),
            leaves: Vec::new(),
            version: 0,
            scale: 1.0,
            bounds: Aabb3::empty(),
        };
        index.rebuild();
        index
    }

    /// Build with default thresholds over the surface's natural domain,
    /// clamped to a workable extent for unbounded surfaces.
    pub fn over_natural_domain(surface: Box<dyn Surface>, cfg: IndexConfig) -> Self {
        let extent = working_extent(surface.as_ref());
        Self::build(surface, extent, cfg)
    }

    /// The indexed surface.
    pub fn surface(&self) -> &dyn Surface {
        self.surface.as_ref()
    }

    /// The indexed parameter extent.
    pub fn extent(&self) -> UvRect {
        self.extent
    }

    /// Version counter; bumped by [`CellIndex::invalidate`].
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Discard and rebuild all cells after a surface mutation, bumping
    /// the version so stale cell keys can be detected.
    pub fn invalidate(&mut self) {
        self.rebuild();
    }

    /// Replace the subdivision thresholds, then rebuild as
    /// [`CellIndex::invalidate`] does.
    pub fn reconfigure(&mut self, cfg: IndexConfig) {
        self.cfg = cfg;
        self.rebuild();
    }

    /// Access a cell by key.
    pub fn cell(&self, key: CellKey) -> Option<&HullCell> {
        self.cells.get(key)
    }

    /// Iterate the leaf cells tiling the extent.
    pub fn leaves(&self) -> impl Iterator<Item = (CellKey, &HullCell)> {
        self.leaves.iter().map(move |&k| (k, &self.cells[k]))
    }

    /// Characteristic length of the indexed geometry.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Axis-aligned bounds of all leaf hulls.
    pub fn bounds(&self) -> Aabb3 {
        self.bounds
    }

    fn rebuild(&mut self) {
        self.cells.clear();
        self.roots.clear();
        self.leaves.clear();
        self.version += 1;
        let root_rects = split_at_singularities(self.surface.as_ref(), self.extent);
        for rect in root_rects {
            let key = build_cell(
                self.surface.as_ref(),
                &self.cfg,
                &self.extent,
                rect,
                &mut self.cells,
                &mut self.leaves,
            );
            self.roots.push(key);
        }
        let mut bounds = Aabb3::empty();
        for &k in &self.leaves {
            let cell_bounds = self.cells[k].hull.aabb();
            bounds.include_point(&cell_bounds.min);
            bounds.include_point(&cell_bounds.max);
        }
        self.scale = bounds.diagonal().max(1.0);
        self.bounds = bounds;
    }

    /// Invert a 3D point to surface parameters.
    ///
    /// Tries the nearest few cells, seeding Newton iteration from each
    /// cell's cached quadratic fit. Returns `None` when no candidate
    /// converges to a point within tolerance of the query.
    pub fn position_of(&self, p: &Point3) -> Option<Point2> {
        let tol = Tolerance::DEFAULT.linear * self.scale;
        let mut candidates: Vec<CellKey> = self.leaves.clone();
        candidates.sort_by(|&a, &b| {
            let da = (self.cells[a].hull.center() - p).norm_squared();
            let db = (self.cells[b].hull.center() - p).norm_squared();
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        });
        for &key in candidates.iter().take(self.cfg.candidate_cells) {
            let cell = &self.cells[key];
            let seed = match &cell.fit {
                Some(fit) => {
                    let local = cell.hull.local_coords(p);
                    cell.rect.clamp(fit.eval(local.x, local.y))
                }
                None => cell.rect.center(),
            };
            if let Some(uv) = self.invert_in_cell(p, cell, seed, tol) {
                return Some(self.wrap_into_extent(uv));
            }
        }
        None
    }

    /// One Newton inversion attempt within a cell's neighborhood.
    fn invert_in_cell(&self, p: &Point3, cell: &HullCell, seed: Point2, tol: f64) -> Option<Point2> {
        let surface = self.surface.as_ref();
        let mut uv = seed;
        let mut prev_residual = f64::INFINITY;
        let mut outside_streak = 0usize;
        let margin_u = cell.rect.u_span();
        let margin_v = cell.rect.v_span();
        for _ in 0..self.cfg.max_newton_iters {
            let s = surface.evaluate(uv);
            let r = *p - s;
            let residual = r.norm();
            if residual < tol {
                return Some(uv);
            }
            // Divergence means the seed was in the wrong basin; let the
            // caller try the next candidate cell.
            if residual > prev_residual * 1.5 {
                return None;
            }
            prev_residual = prev_residual.min(residual);
            let su = surface.d_du(uv);
            let sv = surface.d_dv(uv);
            let n = surface.normal(uv).into_inner();
            let jac = Matrix3::from_columns(&[su, sv, n]);
            let delta = solve3(&jac, &r)?;
            uv = Point2::new(uv.x + delta.x, uv.y + delta.y);
            let roam = UvRect::new(
                (cell.rect.u.0 - margin_u, cell.rect.u.1 + margin_u),
                (cell.rect.v.0 - margin_v, cell.rect.v.1 + margin_v),
            );
            if roam.contains(uv) {
                outside_streak = 0;
            } else {
                outside_streak += 1;
                if outside_streak > 2 {
                    return None;
                }
            }
        }
        None
    }

    fn wrap_into_extent(&self, uv: Point2) -> Point2 {
        let mut uv = uv;
        if let Some(period) = self.surface.u_period() {
            while uv.x < self.extent.u.0 {
                uv.x += period;
            }
            while uv.x > self.extent.u.1 {
                uv.x -= period;
            }
        }
        if let Some(period) = self.surface.v_period() {
            while uv.y < self.extent.v.0 {
                uv.y += period;
            }
            while uv.y > self.extent.v.1 {
                uv.y -= period;
            }
        }
        uv
    }

    /// Intersect the line `origin + t·dir` with the surface.
    ///
    /// The cell tree is descended from the roots; subtrees whose hulls
    /// the line misses are skipped whole. Each surviving leaf yields one
    /// Newton attempt on the 3×3 system in `(u, v, t)`. Hits are
    /// deduplicated and sorted by line parameter.
    pub fn line_intersections(&self, origin: &Point3, dir: &Vec3) -> Vec<LineHit> {
        let tol = Tolerance::DEFAULT.linear * self.scale;
        let surface = self.surface.as_ref();
        let o = *origin;
        let d = *dir;
        let mut hits: Vec<LineHit> = Vec::new();
        let mut stack = self.roots.clone();
        while let Some(key) = stack.pop() {
            let cell = &self.cells[key];
            let Some((t0, t1)) = cell.hull.clip_line(origin, dir) else {
                continue;
            };
            if !cell.children.is_empty() {
                stack.extend(cell.children.iter().copied());
                continue;
            }
            let window = (t1 - t0).max(tol);
            let mut uv = cell.rect.center();
            let mut t = 0.5 * (t0 + t1);
            let mut converged = false;
            for _ in 0..self.cfg.max_newton_iters {
                let s = surface.evaluate(uv);
                let f = s - (o + t * d);
                if f.norm() < tol {
                    converged = true;
                    break;
                }
                let jac = Matrix3::from_columns(&[surface.d_du(uv), surface.d_dv(uv), -d]);
                let Some(delta) = solve3(&jac, &(-f)) else {
                    break;
                };
                uv = Point2::new(uv.x + delta.x, uv.y + delta.y);
                t += delta.z;
                // A hit that belongs to this cell stays near the clip
                // window; runaways are found again from their own cell.
                if t < t0 - window || t > t1 + window {
                    break;
                }
                if !cell.rect.contains_with_tol(uv, 2.0 * cell.rect.u_span().max(cell.rect.v_span())) {
                    break;
                }
            }
            if converged && cell.rect.contains_with_tol(uv, 1e-9 * self.scale + 1e-12) {
                if !hits.iter().any(|h| (h.t - t).abs() < tol) {
                    hits.push(LineHit {
                        t,
                        uv,
                        point: surface.evaluate(uv),
                    });
                }
            }
        }
        hits.sort_by(|a, b| a.t.partial_cmp(&b.t).unwrap_or(std::cmp::Ordering::Equal));
        hits
    }

    /// Test whether any part of the surface may lie inside `aabb`,
    /// returning a representative parameter of one interfering leaf.
    ///
    /// Subtrees whose interior hulls miss the box are pruned whole.
    pub fn hit_test(&self, aabb: &Aabb3) -> Option<Point2> {
        let probe = OrientedBox::from_aabb(aabb);
        let mut stack = self.roots.clone();
        while let Some(key) = stack.pop() {
            let cell = &self.cells[key];
            if !cell.hull.aabb().overlaps(aabb) || !cell.hull.interferes(&probe) {
                continue;
            }
            if cell.children.is_empty() {
                return Some(cell.rect.center());
            }
            stack.extend(cell.children.iter().copied());
        }
        None
    }

    /// All leaf-cell pairs of two indices whose hulls interfere.
    ///
    /// This is the broad phase of surface/surface intersection: the
    /// returned patch pairs define the parameter grids the intersector
    /// refines. Both trees are descended together, so non-interfering
    /// subtree pairs are rejected at the coarsest level that separates
    /// them.
    pub fn interfering_pairs(&self, other: &CellIndex) -> Vec<(CellKey, CellKey)> {
        let mut pairs = Vec::new();
        let mut stack: Vec<(CellKey, CellKey)> = Vec::new();
        for &ra in &self.roots {
            for &rb in &other.roots {
                stack.push((ra, rb));
            }
        }
        while let Some((ka, kb)) = stack.pop() {
            let ca = &self.cells[ka];
            let cb = &other.cells[kb];
            if !ca.hull.aabb().overlaps(&cb.hull.aabb()) || !ca.hull.interferes(&cb.hull) {
                continue;
            }
            match (ca.children.is_empty(), cb.children.is_empty()) {
                (true, true) => pairs.push((ka, kb)),
                (false, true) => stack.extend(ca.children.iter().map(|&c| (c, kb))),
                (true, false) => stack.extend(cb.children.iter().map(|&c| (ka, c))),
                (false, false) => {
                    for &a in &ca.children {
                        for &b in &cb.children {
                            stack.push((a, b));
                        }
                    }
                }
            }
        }
        pairs
    }
}

/// Clamp unbounded natural domains to a finite working extent.
fn working_extent(surface: &dyn Surface) -> UvRect {
    const WORKING_SPAN: f64 = 100.0;
    let ((u0, u1), (v0, v1)) = surface.domain();
    UvRect::new(
        (u0.max(-WORKING_SPAN), u1.min(WORKING_SPAN)),
        (v0.max(-WORKING_SPAN), v1.min(WORKING_SPAN)),
    )
}

/// Cut the extent at every interior singular parameter so no patch
/// straddles a pole.
fn split_at_singularities(surface: &dyn Surface, extent: UvRect) -> Vec<UvRect> {
    let eps_u = 1e-9 * extent.u_span();
    let eps_v = 1e-9 * extent.v_span();
    let mut u_cuts = vec![extent.u.0, extent.u.1];
    for s in surface.u_singularities() {
        if s > extent.u.0 + eps_u && s < extent.u.1 - eps_u {
            u_cuts.push(s);
        }
    }
    let mut v_cuts = vec![extent.v.0, extent.v.1];
    for s in surface.v_singularities() {
        if s > extent.v.0 + eps_v && s < extent.v.1 - eps_v {
            v_cuts.push(s);
        }
    }
    u_cuts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    v_cuts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mut rects = Vec::new();
    for uw in u_cuts.windows(2) {
        for vw in v_cuts.windows(2) {
            rects.push(UvRect::new((uw[0], uw[1]), (vw[0], vw[1])));
        }
    }
    rects
}

enum Split {
    Accept { folded: bool },
    HalveU,
    HalveV,
    Quarter,
}

fn decide_split(surface: &dyn Surface, cfg: &IndexConfig, extent: &UvRect, rect: UvRect) -> Split {
    let [c00, c10, c01, c11] = rect.corners();
    let n00 = surface.normal(c00);
    let n10 = surface.normal(c10);
    let n01 = surface.normal(c01);
    let n11 = surface.normal(c11);

    let across_u = n00.dot(&n10).min(n01.dot(&n11));
    let across_v = n00.dot(&n01).min(n10.dot(&n11));
    let diagonal = n00.dot(&n11).min(n10.dot(&n01));
    let worst = across_u.min(across_v).min(diagonal);

    if worst >= cfg.flat_cos {
        return Split::Accept { folded: false };
    }

    let u_at_floor = rect.u_span() <= cfg.resolution * extent.u_span();
    let v_at_floor = rect.v_span() <= cfg.resolution * extent.v_span();
    if u_at_floor && v_at_floor {
        return Split::Accept {
            folded: worst < cfg.fold_cos,
        };
    }
    if u_at_floor {
        return Split::HalveV;
    }
    if v_at_floor {
        return Split::HalveU;
    }
    // One-directional divergence halves along the divergent axis only.
    let u_diverges = across_u < cfg.flat_cos;
    let v_diverges = across_v < cfg.flat_cos;
    match (u_diverges, v_diverges) {
        (true, false) if diagonal >= cfg.flat_cos || across_v >= cfg.flat_cos => Split::HalveU,
        (false, true) if diagonal >= cfg.flat_cos || across_u >= cfg.flat_cos => Split::HalveV,
        _ => Split::Quarter,
    }
}

fn build_cell(
    surface: &dyn Surface,
    cfg: &IndexConfig,
    extent: &UvRect,
    rect: UvRect,
    cells: &mut SlotMap<CellKey, HullCell>,
    leaves: &mut Vec<CellKey>,
) -> CellKey {
    match decide_split(surface, cfg, extent, rect) {
        Split::Accept { folded } => {
            let cell = accept_cell(surface, cfg, rect, folded);
            let key = cells.insert(cell);
            leaves.push(key);
            key
        }
        split => {
            let child_rects: Vec<UvRect> = match split {
                Split::HalveU => rect.halve_u().to_vec(),
                Split::HalveV => rect.halve_v().to_vec(),
                _ => rect.quarter().to_vec(),
            };
            let children: Vec<CellKey> = child_rects
                .into_iter()
                .map(|r| build_cell(surface, cfg, extent, r, cells, leaves))
                .collect();
            // Interior nodes carry a hull too, so coarse-level pruning
            // can skip whole subtrees. The hull must enclose every child
            // hull or the pruning would miss leaf interferences.
            let mut cell = accept_cell(surface, cfg, rect, false);
            for &child in &children {
                for corner in cells[child].hull.corners() {
                    cell.hull.enclose(&corner);
                }
            }
            cell.children = children;
            cells.insert(cell)
        }
    }
}

/// Sample a grid over a patch, returning the 3D corner points, all grid
/// samples and the largest spacing between adjacent samples.
fn sample_patch(
    surface: &dyn Surface,
    rect: UvRect,
    edge_samples: usize,
) -> ([Point3; 4], Vec<Point3>, f64) {
    let corners_uv = rect.corners();
    let corners = [
        surface.evaluate(corners_uv[0]),
        surface.evaluate(corners_uv[1]),
        surface.evaluate(corners_uv[2]),
        surface.evaluate(corners_uv[3]),
    ];
    let n = edge_samples + 2;
    let mut samples = Vec::with_capacity(n * n);
    let mut max_step = 0.0f64;
    let mut prev_row: Vec<Point3> = Vec::new();
    for i in 0..n {
        let u = rect.u.0 + rect.u_span() * i as f64 / (n - 1) as f64;
        let mut row: Vec<Point3> = Vec::with_capacity(n);
        for j in 0..n {
            let v = rect.v.0 + rect.v_span() * j as f64 / (n - 1) as f64;
            let p = surface.evaluate(Point2::new(u, v));
            if j > 0 {
                max_step = max_step.max((p - row[j - 1]).norm());
            }
            if !prev_row.is_empty() {
                max_step = max_step.max((p - prev_row[j]).norm());
            }
            row.push(p);
        }
        samples.extend(row.iter().copied());
        prev_row = row;
    }
    (corners, samples, max_step)
}

/// Build a conservative oriented hull for an arbitrary patch of a
/// surface, outside any index. Used when subdivision creates patches
/// finer than the index's own cells.
pub fn patch_hull(surface: &dyn Surface, rect: UvRect, edge_samples: usize) -> OrientedBox {
    let (corners, samples, max_step) = sample_patch(surface, rect, edge_samples);
    let mut hull = OrientedBox::from_patch_corners(&corners, &samples, 0.0);
    let margin = 1e-6 * max_step.max(1e-12) + 0.25 * hull.thickness();
    hull.inflate(margin);
    hull
}

/// Finalize a patch into a cell: sample it, fit the hull and the
/// inversion seed.
fn accept_cell(surface: &dyn Surface, cfg: &IndexConfig, rect: UvRect, folded: bool) -> HullCell {
    // A full grid over the patch: boundary extrema and interior bulge
    // both end up inside the hull.
    let (corners, samples, max_step) = sample_patch(surface, rect, cfg.edge_samples);

    let mut hull = OrientedBox::from_patch_corners(&corners, &samples, 0.0);
    let raw_thickness = hull.thickness();
    let is_flat = raw_thickness < 1e-7 * max_step.max(1e-12);
    // Sag allowance for the surface between adjacent samples: the
    // observed curvature bounds what the grid can have missed.
    let margin = cfg.hull_margin * max_step.max(1e-12) + 0.25 * raw_thickness;
    hull.inflate(margin);
    let fit = fit_inversion(surface, &hull, rect);

    HullCell {
        rect,
        hull,
        is_flat,
        is_folded: folded,
        children: Vec::new(),
        fit,
    }
}

/// Least-squares quadratic from hull-local tangential coordinates to
/// surface parameters, fitted on a 3×3 grid plus the patch center.
fn fit_inversion(surface: &dyn Surface, hull: &OrientedBox, rect: UvRect) -> Option<QuadFit> {
    let mut ata = Matrix6::zeros();
    let mut atb_u = Vector6::zeros();
    let mut atb_v = Vector6::zeros();
    let mut sample = |uv: Point2| {
        let local = hull.local_coords(&surface.evaluate(uv));
        let b = QuadFit::basis(local.x, local.y);
        ata += b * b.transpose();
        atb_u += uv.x * b;
        atb_v += uv.y * b;
    };
    for i in 0..3 {
        let u = rect.u.0 + rect.u_span() * i as f64 / 2.0;
        for j in 0..3 {
            let v = rect.v.0 + rect.v_span() * j as f64 / 2.0;
            sample(Point2::new(u, v));
        }
    }
    sample(rect.center());

    let chol = Cholesky::new(ata)?;
    Some(QuadFit {
        coeff_u: chol.solve(&atb_u),
        coeff_v: chol.solve(&atb_v),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use strake_geom::{CylinderSurface, Plane, SphereSurface, TorusSurface};

    fn sphere_index() -> CellIndex {
        CellIndex::over_natural_domain(Box::new(SphereSurface::new(1.0)), IndexConfig::default())
    }

    #[test]
    fn test_leaves_tile_extent() {
        let index = sphere_index();
        let extent = index.extent();
        let total: f64 = index
            .leaves()
            .map(|(_, c)| c.rect.u_span() * c.rect.v_span())
            .sum();
        let expected = extent.u_span() * extent.v_span();
        assert!((total - expected).abs() < 1e-9 * expected);
        for (_, cell) in index.leaves() {
            assert!(extent.contains_with_tol(cell.rect.center(), 1e-12));
        }
    }

    #[test]
    fn test_leaf_normals_agree() {
        // Every accepted non-folded leaf satisfies the 45° criterion.
        let index = sphere_index();
        for (_, cell) in index.leaves() {
            if cell.is_folded {
                continue;
            }
            let corners = cell.rect.corners();
            let normals: Vec<_> = corners
                .iter()
                .map(|&uv| index.surface().normal(uv))
                .collect();
            for a in &normals {
                for b in &normals {
                    assert!(a.dot(b) >= IndexConfig::default().flat_cos - 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_hulls_contain_surface_samples() {
        let index = CellIndex::over_natural_domain(
            Box::new(TorusSurface::new(2.0, 0.5)),
            IndexConfig::default(),
        );
        for (_, cell) in index.leaves() {
            for i in 0..5 {
                for j in 0..5 {
                    let uv = Point2::new(
                        cell.rect.u.0 + cell.rect.u_span() * i as f64 / 4.0,
                        cell.rect.v.0 + cell.rect.v_span() * j as f64 / 4.0,
                    );
                    let p = index.surface().evaluate(uv);
                    assert!(
                        cell.hull.contains_point(&p, 1e-6),
                        "hull misses sample at {uv:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_position_of_round_trip() {
        let index = sphere_index();
        for &u in &[0.3, 1.7, 3.5, 5.2] {
            for &v in &[-1.2, -0.4, 0.1, 0.9] {
                let uv = Point2::new(u, v);
                let p = index.surface().evaluate(uv);
                let found = index.position_of(&p).expect("inversion failed");
                let q = index.surface().evaluate(found);
                assert!((q - p).norm() < 1e-6);
            }
        }
    }

    #[test]
    fn test_position_of_rejects_far_point() {
        let index = sphere_index();
        assert!(index.position_of(&Point3::new(7.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn test_line_through_sphere_hits_twice() {
        let index = sphere_index();
        let hits = index.line_intersections(&Point3::new(-5.0, 0.1, 0.1), &Vec3::x());
        assert_eq!(hits.len(), 2);
        for hit in &hits {
            assert!((hit.point.coords.norm() - 1.0).abs() < 1e-6);
        }
        assert!(hits[0].t < hits[1].t);
    }

    #[test]
    fn test_line_missing_surface() {
        let index = sphere_index();
        let hits = index.line_intersections(&Point3::new(-5.0, 3.0, 0.0), &Vec3::x());
        assert!(hits.is_empty());
    }

    #[test]
    fn test_hit_test() {
        let index = sphere_index();
        let near = Aabb3::new(Point3::new(0.9, -0.1, -0.1), Point3::new(1.1, 0.1, 0.1));
        assert!(index.hit_test(&near).is_some());
        let far = Aabb3::new(Point3::new(5.0, 5.0, 5.0), Point3::new(6.0, 6.0, 6.0));
        assert!(index.hit_test(&far).is_none());
    }

    #[test]
    fn test_interfering_pairs_of_crossing_cylinders() {
        let extent = UvRect::new((0.0, 2.0 * PI), (-2.0, 2.0));
        let a = CellIndex::build(
            Box::new(CylinderSurface::new(1.0)),
            extent,
            IndexConfig::default(),
        );
        let b = CellIndex::build(
            Box::new(CylinderSurface::with_axis(
                Point3::origin(),
                Vec3::x(),
                1.0,
            )),
            extent,
            IndexConfig::default(),
        );
        let pairs = a.interfering_pairs(&b);
        assert!(!pairs.is_empty());
        for &(ka, kb) in &pairs {
            assert!(a.cell(ka).is_some());
            assert!(b.cell(kb).is_some());
        }
    }

    #[test]
    fn test_pair_descent_matches_leaf_scan() {
        let a = sphere_index();
        let b = CellIndex::over_natural_domain(
            Box::new(CylinderSurface::with_axis(
                Point3::new(0.5, 0.0, 0.0),
                Vec3::x(),
                0.4,
            )),
            IndexConfig::default(),
        );
        let mut brute: Vec<(CellKey, CellKey)> = Vec::new();
        for (ka, ca) in a.leaves() {
            for (kb, cb) in b.leaves() {
                if ca.hull.interferes(&cb.hull) {
                    brute.push((ka, kb));
                }
            }
        }
        let pairs = a.interfering_pairs(&b);
        assert_eq!(pairs.len(), brute.len());
        for pair in &brute {
            assert!(pairs.contains(pair));
        }
    }

    #[test]
    fn test_interior_hulls_enclose_children() {
        let index = sphere_index();
        let mut interior_seen = false;
        for (_, cell) in index.cells.iter() {
            if cell.children.is_empty() {
                continue;
            }
            interior_seen = true;
            for &child in &cell.children {
                for corner in index.cells[child].hull.corners() {
                    assert!(cell.hull.contains_point(&corner, 1e-9));
                }
            }
        }
        assert!(interior_seen);
    }

    #[test]
    fn test_plane_index_is_single_flat_cell() {
        let extent = UvRect::new((-1.0, 1.0), (-1.0, 1.0));
        let index = CellIndex::build(Box::new(Plane::xy()), extent, IndexConfig::default());
        let leaves: Vec<_> = index.leaves().collect();
        assert_eq!(leaves.len(), 1);
        assert!(leaves[0].1.is_flat);
        assert!(!leaves[0].1.is_folded);
    }

    #[test]
    fn test_invalidate_bumps_version() {
        let mut index = sphere_index();
        let v0 = index.version();
        index.invalidate();
        assert!(index.version() > v0);
        // Queries still work after a rebuild.
        assert!(index
            .position_of(&Point3::new(0.0, 1.0, 0.0))
            .is_some());
    }
}
