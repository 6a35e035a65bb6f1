#![warn(missing_docs)]

//! Directional extremum search on parametric surfaces.
//!
//! Finds the parametric point where a surface's height along a fixed 3D
//! direction is minimal, by Newton iteration with exact second
//! derivatives or by an SR1 quasi-Newton approximation. Maximization is
//! minimization along the negated direction.
//!
//! Every search returns a [`MinResult`] whose [`MinOutcome`] classifies
//! how the iteration ended; the last valid parameter, point and gradient
//! ride along for diagnostics regardless of the outcome.

use nalgebra::Matrix2;
use strake_geom::{Surface, UvRect};
use strake_math::{solve2, symmetric_eigenvalues_2, Point2, Point3, Vec2, Vec3};

/// Tunable constants of the minimizer.
///
/// The defaults are empirical; the scenario tests in the facade crate pin
/// their observable behavior.
#[derive(Debug, Clone, Copy)]
pub struct MinConfig {
    /// Armijo sufficient-decrease constant.
    pub armijo: f64,
    /// Floor applied to the smallest Hessian eigenvalue so every step is
    /// a descent direction.
    pub eigen_floor: f64,
    /// Initial trial step length for the line search.
    pub step_seed: f64,
    /// Growth factor for domain stretching when the minimum appears to
    /// lie just outside the search rectangle.
    pub stretch_factor: f64,
    /// Hard iteration cap.
    pub max_iters: usize,
    /// Allowed out-of-rectangle excursions before giving up.
    pub max_excursions: usize,
    /// Iterations without meaningful decrease before reporting
    /// [`MinOutcome::NoProgress`].
    pub stagnation_limit: usize,
    /// Gradient norm below which the iterate counts as critical.
    pub gradient_tol: f64,
    /// Step norm below which a step counts as negligible.
    pub step_tol: f64,
    /// Gradient norm below which an excursion triggers domain stretching
    /// instead of [`MinOutcome::LeftDomainGradientLarge`].
    pub small_gradient: f64,
}

impl Default for MinConfig {
    fn default() -> Self {
        Self {
            armijo: 1e-4,
            eigen_floor: 1e-8,
            step_seed: 1.0,
            stretch_factor: 1.5,
            max_iters: 48,
            max_excursions: 3,
            stagnation_limit: 5,
            gradient_tol: 1e-9,
            step_tol: 1e-13,
            small_gradient: 0.05,
        }
    }
}

/// How a minimization ended.
///
/// The numbered variants reproduce the classic failure taxonomy of
/// directional surface minimizers: 0 stagnant, 1 left the domain, 2 too
/// many excursions, 3 no progress, 4 negligible step, 5 gradient small
/// but Hessian not positive definite, 6 invalid continuation, 7 minimum
/// outside the caller's rectangle, 8 left the domain with a gradient far
/// from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinOutcome {
    /// A local minimum was isolated inside the caller's rectangle.
    Converged,
    /// The line search could not produce a non-zero step (0).
    Stagnant,
    /// The iterate left the surface's natural domain (1).
    LeftDomain,
    /// More out-of-rectangle excursions than allowed (2).
    TooManyExcursions,
    /// Several iterations without sufficient decrease (3).
    NoProgress,
    /// Non-zero but negligible step, typically on a flat region near the
    /// boundary (4).
    NegligibleStep,
    /// Gradient vanishes but the Hessian is not positive definite: a
    /// saddle or maximum, not a minimum (5).
    NotPositiveDefinite,
    /// `continue_minimize` was called without carried state (6).
    InvalidContinuation,
    /// A minimum was found, but outside the caller's rectangle (7).
    OutsideRect,
    /// The iterate left the domain while the gradient was still large;
    /// the minimum probably does not exist in this domain (8).
    LeftDomainGradientLarge,
}

impl MinOutcome {
    /// Whether this outcome delivers a usable minimum.
    pub fn is_minimum(self) -> bool {
        matches!(self, MinOutcome::Converged | MinOutcome::OutsideRect)
    }
}

/// Result of a directional minimization.
#[derive(Debug, Clone)]
pub struct MinResult {
    /// Classification of how the search ended.
    pub outcome: MinOutcome,
    /// Last valid parameter point.
    pub uv: Point2,
    /// Surface point at `uv`.
    pub point: Point3,
    /// Objective gradient at `uv`.
    pub gradient: Vec2,
    /// Objective value (height along the direction) at `uv`.
    pub value: f64,
    /// Newton iterations performed.
    pub iterations: usize,
    /// Hessian (exact or SR1 approximation) carried for continuation.
    carry: Option<Matrix2<f64>>,
}

/// Minimize the surface height along `dir` over `rect` using Newton
/// iteration with exact second derivatives, starting at the rectangle
/// center.
pub fn minimize_rect(
    surface: &dyn Surface,
    dir: Vec3,
    rect: UvRect,
    cfg: &MinConfig,
) -> MinResult {
    let driver = Driver { surface, dir, cfg };
    driver.run(rect.center(), rect, HessianMode::Exact)
}

/// Minimize using the SR1 quasi-Newton approximation over `rect`.
///
/// The Hessian approximation is seeded from one trial step and updated by
/// symmetric-rank-one corrections. Useful when second derivatives are
/// expensive; the eigenvalue floor still guarantees descent directions.
pub fn sr1_rect(surface: &dyn Surface, dir: Vec3, rect: UvRect, cfg: &MinConfig) -> MinResult {
    let driver = Driver { surface, dir, cfg };
    let start = rect.center();
    let seed = driver.seed_sr1(start, &rect);
    driver.run(start, rect, HessianMode::Sr1(seed))
}

/// Resume a previous rectangle search with caller-supplied new bounds.
///
/// Requires the carried Hessian state of the previous result; without it
/// the request is invalid ([`MinOutcome::InvalidContinuation`]).
pub fn continue_minimize(
    surface: &dyn Surface,
    dir: Vec3,
    prev: &MinResult,
    rect: UvRect,
    cfg: &MinConfig,
) -> MinResult {
    let Some(carry) = prev.carry else {
        return MinResult {
            outcome: MinOutcome::InvalidContinuation,
            ..prev.clone()
        };
    };
    let driver = Driver { surface, dir, cfg };
    let start = if rect.contains(prev.uv) {
        prev.uv
    } else {
        rect.clamp(prev.uv)
    };
    driver.run(start, rect, HessianMode::Sr1(carry))
}

/// Minimize the surface height along `dir` restricted to the parametric
/// segment from `a` to `b`, by 1D Newton iteration.
pub fn minimize_line(
    surface: &dyn Surface,
    dir: Vec3,
    a: Point2,
    b: Point2,
    cfg: &MinConfig,
) -> MinResult {
    run_line(surface, dir, a, b, cfg, false)
}

/// SR1 variant of [`minimize_line`] (finite-difference curvature seed,
/// rank-one updates instead of exact second derivatives).
pub fn sr1_line(surface: &dyn Surface, dir: Vec3, a: Point2, b: Point2, cfg: &MinConfig) -> MinResult {
    run_line(surface, dir, a, b, cfg, true)
}

enum HessianMode {
    Exact,
    Sr1(Matrix2<f64>),
}

struct Driver<'a> {
    surface: &'a dyn Surface,
    dir: Vec3,
    cfg: &'a MinConfig,
}

impl Driver<'_> {
    fn value(&self, uv: Point2) -> f64 {
        self.surface.evaluate(uv).coords.dot(&self.dir)
    }

    fn gradient(&self, uv: Point2) -> Vec2 {
        Vec2::new(
            self.surface.d_du(uv).dot(&self.dir),
            self.surface.d_dv(uv).dot(&self.dir),
        )
    }

    fn exact_hessian(&self, uv: Point2) -> Matrix2<f64> {
        let huu = self.surface.d_duu(uv).dot(&self.dir);
        let hvv = self.surface.d_dvv(uv).dot(&self.dir);
        let huv = self.surface.d_duv(uv).dot(&self.dir);
        Matrix2::new(huu, huv, huv, hvv)
    }

    /// Scaled-identity SR1 seed from one finite-difference trial step.
    fn seed_sr1(&self, uv: Point2, rect: &UvRect) -> Matrix2<f64> {
        let h = 1e-4 * rect.u_span().min(rect.v_span()).max(1e-6);
        let g0 = self.gradient(uv);
        let step = if g0.norm() > 1e-14 {
            -h * g0.normalize()
        } else {
            Vec2::new(h, 0.0)
        };
        let g1 = self.gradient(uv + step);
        let y = g1 - g0;
        let curvature = y.dot(&step) / step.norm_squared();
        Matrix2::identity() * curvature.max(self.cfg.eigen_floor)
    }

    fn result(&self, outcome: MinOutcome, uv: Point2, iterations: usize, carry: Option<Matrix2<f64>>) -> MinResult {
        MinResult {
            outcome,
            uv,
            point: self.surface.evaluate(uv),
            gradient: self.gradient(uv),
            value: self.value(uv),
            iterations,
            carry,
        }
    }

    fn run(&self, start: Point2, rect: UvRect, mut mode: HessianMode) -> MinResult {
        let cfg = self.cfg;
        let natural = self.surface.natural_rect();
        let original = rect;
        let mut rect = rect;
        let mut uv = start;
        let mut excursions = 0usize;
        let mut stagnation = 0usize;
        let mut f_cur = self.value(uv);

        for iter in 0..cfg.max_iters {
            let g = self.gradient(uv);
            let hess = match &mode {
                HessianMode::Exact => self.exact_hessian(uv),
                HessianMode::Sr1(b) => *b,
            };
            let (lambda_min, _) = symmetric_eigenvalues_2(&hess);

            if g.norm() < cfg.gradient_tol {
                let carry = Some(hess);
                if lambda_min <= 0.0 {
                    return self.result(MinOutcome::NotPositiveDefinite, uv, iter, carry);
                }
                if !original.contains_with_tol(uv, 1e-12) {
                    return self.result(MinOutcome::OutsideRect, uv, iter, carry);
                }
                return self.result(MinOutcome::Converged, uv, iter, carry);
            }

            // Floor the smallest eigenvalue so the step descends.
            let corrected = if lambda_min < cfg.eigen_floor {
                hess + Matrix2::identity() * (cfg.eigen_floor - lambda_min)
            } else {
                hess
            };
            let p = match solve2(&corrected, &(-g)) {
                Some(p) => p,
                // Numerically singular even after correction: steepest
                // descent scaled to the rectangle.
                None => -g.normalize() * 0.1 * rect.u_span().max(rect.v_span()),
            };

            let Some(t) = self.armijo_search(uv, p, &g, f_cur) else {
                return self.result(MinOutcome::Stagnant, uv, iter, Some(hess));
            };
            let step = t * p;
            if step.norm() < cfg.step_tol {
                let near_edge = !rect.contains_with_tol(uv, -1e-9 * rect.u_span().max(rect.v_span()));
                let outcome = if near_edge {
                    MinOutcome::NegligibleStep
                } else {
                    MinOutcome::Stagnant
                };
                return self.result(outcome, uv, iter, Some(hess));
            }

            let mut next = uv + step;
            if !rect.contains(next) {
                excursions += 1;
                if excursions > cfg.max_excursions {
                    return self.result(MinOutcome::TooManyExcursions, uv, iter, Some(hess));
                }
                if g.norm() >= cfg.small_gradient {
                    return self.result(MinOutcome::LeftDomainGradientLarge, next, iter, Some(hess));
                }
                let (grown, clipped) = rect.stretched(cfg.stretch_factor, &natural);
                rect = grown;
                if !rect.contains(next) {
                    if clipped {
                        return self.result(MinOutcome::LeftDomain, uv, iter, Some(hess));
                    }
                    next = rect.clamp(next);
                }
            }

            // SR1 update from the accepted step.
            if let HessianMode::Sr1(b) = &mut mode {
                let s = next - uv;
                let y = self.gradient(next) - g;
                let r = y - *b * s;
                let denom = r.dot(&s);
                if denom.abs() > 1e-10 * r.norm() * s.norm() {
                    *b += r * r.transpose() / denom;
                }
            }

            let f_next = self.value(next);
            if f_cur - f_next < 1e-14 * (1.0 + f_cur.abs()) {
                stagnation += 1;
                let at = if f_next <= f_cur { next } else { uv };
                if stagnation >= cfg.stagnation_limit {
                    return self.result(MinOutcome::NoProgress, at, iter, match mode {
                        HessianMode::Exact => Some(self.exact_hessian(at)),
                        HessianMode::Sr1(b) => Some(b),
                    });
                }
                // Clamping an excursion can point the step uphill; the
                // Armijo guarantee held only for the unclamped point, so
                // an increasing step is refused outright.
                if f_next > f_cur {
                    continue;
                }
            } else {
                stagnation = 0;
            }
            uv = next;
            f_cur = f_next;
        }

        let carry = match mode {
            HessianMode::Exact => Some(self.exact_hessian(uv)),
            HessianMode::Sr1(b) => Some(b),
        };
        self.result(MinOutcome::NoProgress, uv, cfg.max_iters, carry)
    }

    /// Backtracking line search with quadratic, then cubic, interpolation
    /// of the step length until the Armijo condition holds.
    fn armijo_search(&self, x: Point2, p: Vec2, g: &Vec2, f0: f64) -> Option<f64> {
        let cfg = self.cfg;
        let slope = g.dot(&p);
        if slope >= 0.0 {
            return None;
        }
        let mut t = cfg.step_seed;
        let mut prev: Option<(f64, f64)> = None;
        for _ in 0..24 {
            let ft = self.value(x + t * p);
            if ft <= f0 + cfg.armijo * t * slope {
                return Some(t);
            }
            let t_next = match prev {
                // First backtrack: minimize the quadratic model through
                // f0, slope and ft.
                None => {
                    let denom = 2.0 * (ft - f0 - t * slope);
                    if denom.abs() > 1e-300 {
                        -slope * t * t / denom
                    } else {
                        0.5 * t
                    }
                }
                // Later backtracks: cubic model through both trials.
                Some((t_prev, f_prev)) => {
                    cubic_step(f0, slope, t, ft, t_prev, f_prev).unwrap_or(0.5 * t)
                }
            };
            prev = Some((t, ft));
            t = t_next.clamp(0.1 * t, 0.5 * t);
            if t < 1e-16 {
                return None;
            }
        }
        None
    }
}

/// Minimizer of the cubic interpolant through `(0, f0)` with slope
/// `slope`, `(t1, f1)` and `(t2, f2)`. `None` when the cubic degenerates.
fn cubic_step(f0: f64, slope: f64, t1: f64, f1: f64, t2: f64, f2: f64) -> Option<f64> {
    let d1 = f1 - f0 - slope * t1;
    let d2 = f2 - f0 - slope * t2;
    let denom = t1 * t1 * t2 * t2 * (t1 - t2);
    if denom.abs() < 1e-300 {
        return None;
    }
    let a = (t2 * t2 * d1 - t1 * t1 * d2) / denom;
    let b = (-t2 * t2 * t2 * d1 + t1 * t1 * t1 * d2) / denom;
    if a.abs() < 1e-300 {
        // Quadratic fallback.
        if b.abs() < 1e-300 {
            return None;
        }
        return Some(-slope / (2.0 * b));
    }
    let disc = b * b - 3.0 * a * slope;
    if disc < 0.0 {
        return None;
    }
    Some((-b + disc.sqrt()) / (3.0 * a))
}

/// 1D Newton minimization along the parametric segment `a → b`.
fn run_line(
    surface: &dyn Surface,
    dir: Vec3,
    a: Point2,
    b: Point2,
    cfg: &MinConfig,
    sr1: bool,
) -> MinResult {
    let seg = b - a;
    let driver = Driver { surface, dir, cfg };
    let uv_at = |s: f64| a + s * seg;
    let phi = |s: f64| driver.value(uv_at(s));
    let dphi = |s: f64| driver.gradient(uv_at(s)).dot(&seg);
    let d2phi_exact = |s: f64| (driver.exact_hessian(uv_at(s)) * seg).dot(&seg);

    // Allowed parameter range along the segment inside the natural domain.
    let natural = surface.natural_rect();
    let (nat_lo, nat_hi) = clip_segment(a, seg, &natural);

    let finish = |outcome: MinOutcome, s: f64, iterations: usize| {
        let uv = uv_at(s);
        MinResult {
            outcome,
            uv,
            point: surface.evaluate(uv),
            gradient: driver.gradient(uv),
            value: phi(s),
            iterations,
            carry: None,
        }
    };

    let mut lo = 0.0f64;
    let mut hi = 1.0f64;
    let mut s = 0.5;
    let mut excursions = 0usize;
    let mut stagnation = 0usize;
    let mut f_cur = phi(s);

    // SR1 seed: one finite-difference curvature estimate.
    let mut curv_approx = if sr1 {
        let h = 1e-5;
        (dphi(s + h) - dphi(s)) / h
    } else {
        0.0
    };

    for iter in 0..cfg.max_iters {
        let g = dphi(s);
        let curv = if sr1 { curv_approx } else { d2phi_exact(s) };

        if g.abs() < cfg.gradient_tol * seg.norm().max(1.0) {
            if curv <= 0.0 {
                return finish(MinOutcome::NotPositiveDefinite, s, iter);
            }
            if !(0.0..=1.0).contains(&s) {
                return finish(MinOutcome::OutsideRect, s, iter);
            }
            return finish(MinOutcome::Converged, s, iter);
        }

        let corrected = curv.max(cfg.eigen_floor);
        let p = -g / corrected;

        // Armijo backtracking on the section function.
        let slope = g * p;
        let mut t = cfg.step_seed;
        let mut accepted = None;
        for _ in 0..24 {
            let cand = s + t * p;
            if phi(cand) <= f_cur + cfg.armijo * t * slope {
                accepted = Some(t);
                break;
            }
            t *= 0.5;
        }
        let Some(t) = accepted else {
            return finish(MinOutcome::Stagnant, s, iter);
        };
        let step = t * p;
        if step.abs() < cfg.step_tol {
            let near_edge = s < lo + 1e-9 || s > hi - 1e-9;
            return finish(
                if near_edge {
                    MinOutcome::NegligibleStep
                } else {
                    MinOutcome::Stagnant
                },
                s,
                iter,
            );
        }

        let mut next = s + step;
        if next < lo || next > hi {
            excursions += 1;
            if excursions > cfg.max_excursions {
                return finish(MinOutcome::TooManyExcursions, s, iter);
            }
            if g.abs() >= cfg.small_gradient * seg.norm().max(1.0) {
                return finish(MinOutcome::LeftDomainGradientLarge, next.clamp(nat_lo, nat_hi), iter);
            }
            // Stretch the section interval, clamped to the natural domain.
            let mid = 0.5 * (lo + hi);
            let half = 0.5 * (hi - lo) * cfg.stretch_factor;
            let new_lo = (mid - half).max(nat_lo);
            let new_hi = (mid + half).min(nat_hi);
            let clipped = new_lo == lo && new_hi == hi;
            lo = new_lo;
            hi = new_hi;
            if next < lo || next > hi {
                if clipped {
                    return finish(MinOutcome::LeftDomain, s, iter);
                }
                next = next.clamp(lo, hi);
            }
        }

        if sr1 {
            let y = dphi(next) - g;
            let ds = next - s;
            let r = y - curv_approx * ds;
            if (r * ds).abs() > 1e-12 * r.abs() * ds.abs() {
                curv_approx += r * r / (r * ds);
            }
        }

        let f_next = phi(next);
        if f_cur - f_next < 1e-14 * (1.0 + f_cur.abs()) {
            stagnation += 1;
            let at = if f_next <= f_cur { next } else { s };
            if stagnation >= cfg.stagnation_limit {
                return finish(MinOutcome::NoProgress, at, iter);
            }
            // A clamped excursion can land uphill; refuse the move.
            if f_next > f_cur {
                continue;
            }
        } else {
            stagnation = 0;
        }
        s = next;
        f_cur = f_next;
    }

    finish(MinOutcome::NoProgress, s, cfg.max_iters)
}

/// Clip `a + s·seg` against `rect`, returning the allowed s-range.
fn clip_segment(a: Point2, seg: Vec2, rect: &UvRect) -> (f64, f64) {
    let mut lo = f64::NEG_INFINITY;
    let mut hi = f64::INFINITY;
    for (origin, delta, min, max) in [
        (a.x, seg.x, rect.u.0, rect.u.1),
        (a.y, seg.y, rect.v.0, rect.v.1),
    ] {
        if delta.abs() < 1e-300 {
            continue;
        }
        let s0 = (min - origin) / delta;
        let s1 = (max - origin) / delta;
        lo = lo.max(s0.min(s1));
        hi = hi.min(s0.max(s1));
    }
    (lo.max(-1e12), hi.min(1e12))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use strake_geom::{BezierPatch, CylinderSurface, Plane};

    fn bowl() -> BezierPatch {
        let mut h = [[0.0; 4]; 4];
        for (i, row) in h.iter_mut().enumerate() {
            for (j, z) in row.iter_mut().enumerate() {
                let x = -1.0 + 2.0 * i as f64 / 3.0;
                let y = -1.0 + 2.0 * j as f64 / 3.0;
                *z = x * x + y * y;
            }
        }
        BezierPatch::from_heights((-1.0, 1.0), (-1.0, 1.0), h)
    }

    fn saddle() -> BezierPatch {
        let mut h = [[0.0; 4]; 4];
        for (i, row) in h.iter_mut().enumerate() {
            for (j, z) in row.iter_mut().enumerate() {
                let x = -1.0 + 2.0 * i as f64 / 3.0;
                let y = -1.0 + 2.0 * j as f64 / 3.0;
                *z = x * x - y * y;
            }
        }
        BezierPatch::from_heights((-1.0, 1.0), (-1.0, 1.0), h)
    }

    #[test]
    fn test_bowl_minimum_at_center() {
        let patch = bowl();
        let rect = UvRect::new((0.05, 0.95), (0.05, 0.95));
        let res = minimize_rect(&patch, Vec3::z(), rect, &MinConfig::default());
        assert_eq!(res.outcome, MinOutcome::Converged);
        assert!((res.uv - Point2::new(0.5, 0.5)).norm() < 1e-6);
    }

    #[test]
    fn test_bowl_sr1_agrees_with_newton() {
        let patch = bowl();
        let rect = UvRect::new((0.05, 0.95), (0.05, 0.95));
        let newton = minimize_rect(&patch, Vec3::z(), rect, &MinConfig::default());
        let quasi = sr1_rect(&patch, Vec3::z(), rect, &MinConfig::default());
        assert!(quasi.outcome.is_minimum());
        assert!((newton.uv - quasi.uv).norm() < 1e-5);
    }

    #[test]
    fn test_saddle_reports_not_positive_definite() {
        // Starting at the saddle point: gradient vanishes, Hessian is
        // indefinite. A false minimum must not be reported.
        let patch = saddle();
        let rect = UvRect::new((0.0, 1.0), (0.0, 1.0));
        let res = minimize_rect(&patch, Vec3::z(), rect, &MinConfig::default());
        assert_eq!(res.outcome, MinOutcome::NotPositiveDefinite);
    }

    #[test]
    fn test_plane_along_normal_is_degenerate() {
        let plane = Plane::xy();
        let rect = UvRect::new((-1.0, 1.0), (-1.0, 1.0));
        let res = minimize_rect(&plane, Vec3::z(), rect, &MinConfig::default());
        assert_eq!(res.outcome, MinOutcome::NotPositiveDefinite);
    }

    #[test]
    fn test_cylinder_minimum_along_x() {
        // Height along +x on a unit cylinder is cos(u); minimal at u=π.
        let cyl = CylinderSurface::new(1.0);
        let rect = UvRect::new((2.0, 4.0), (0.0, 1.0));
        let res = minimize_rect(&cyl, Vec3::x(), rect, &MinConfig::default());
        assert_eq!(res.outcome, MinOutcome::Converged);
        assert!((res.uv.x - PI).abs() < 1e-7);
        assert!((res.value + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_monotone_decrease_to_result() {
        let cyl = CylinderSurface::new(1.0);
        let rect = UvRect::new((2.0, 4.0), (0.0, 1.0));
        let start_value = cyl.evaluate(rect.center()).coords.dot(&Vec3::x());
        let res = minimize_rect(&cyl, Vec3::x(), rect, &MinConfig::default());
        assert!(res.value <= start_value);
    }

    #[test]
    fn test_result_value_never_exceeds_start() {
        // Small windows force excursions, stretching and clamping; the
        // reported point must never be worse than the starting center,
        // whatever path the iteration takes.
        use strake_geom::TorusSurface;
        let torus = TorusSurface::new(2.0, 0.5);
        let dir = Vec3::new(1.0, 0.0, 1.0).normalize();
        for i in 0..8 {
            for j in 0..8 {
                let u0 = 2.0 * PI * i as f64 / 8.0;
                let v0 = 2.0 * PI * j as f64 / 8.0;
                let rect = UvRect::new((u0, u0 + 0.4), (v0, v0 + 0.4));
                let start = torus.evaluate(rect.center()).coords.dot(&dir);
                let res = minimize_rect(&torus, dir, rect, &MinConfig::default());
                assert!(
                    res.value <= start + 1e-12,
                    "worse than start at window ({i}, {j}): {} > {}",
                    res.value,
                    start
                );
            }
        }
    }

    #[test]
    fn test_left_domain_gradient_large() {
        // The minimum at u=π is far outside this window and the gradient
        // at the boundary is substantial.
        let cyl = CylinderSurface::new(1.0);
        let rect = UvRect::new((0.2, 0.5), (0.0, 1.0));
        let res = minimize_rect(&cyl, Vec3::x(), rect, &MinConfig::default());
        assert_eq!(res.outcome, MinOutcome::LeftDomainGradientLarge);
    }

    #[test]
    fn test_stretch_finds_minimum_just_outside() {
        // Window stops just short of u=π; the boundary gradient is small
        // enough that stretching is attempted and succeeds.
        let cyl = CylinderSurface::new(1.0);
        let rect = UvRect::new((3.10, 3.13), (0.0, 1.0));
        let res = minimize_rect(&cyl, Vec3::x(), rect, &MinConfig::default());
        assert_eq!(res.outcome, MinOutcome::OutsideRect);
        assert!((res.uv.x - PI).abs() < 1e-7);
    }

    #[test]
    fn test_line_minimization() {
        let cyl = CylinderSurface::new(1.0);
        let res = minimize_line(
            &cyl,
            Vec3::x(),
            Point2::new(2.0, 0.5),
            Point2::new(4.0, 0.5),
            &MinConfig::default(),
        );
        assert_eq!(res.outcome, MinOutcome::Converged);
        assert!((res.uv.x - PI).abs() < 1e-7);
    }

    #[test]
    fn test_sr1_line() {
        let cyl = CylinderSurface::new(1.0);
        let res = sr1_line(
            &cyl,
            Vec3::x(),
            Point2::new(2.5, 0.0),
            Point2::new(3.8, 0.0),
            &MinConfig::default(),
        );
        assert!(res.outcome.is_minimum());
        assert!((res.uv.x - PI).abs() < 1e-5);
    }

    #[test]
    fn test_invalid_continuation() {
        let cyl = CylinderSurface::new(1.0);
        let line_res = minimize_line(
            &cyl,
            Vec3::x(),
            Point2::new(2.0, 0.0),
            Point2::new(4.0, 0.0),
            &MinConfig::default(),
        );
        // Line results carry no rectangle state.
        let cont = continue_minimize(
            &cyl,
            Vec3::x(),
            &line_res,
            UvRect::new((0.0, 2.0 * PI), (0.0, 1.0)),
            &MinConfig::default(),
        );
        assert_eq!(cont.outcome, MinOutcome::InvalidContinuation);
    }

    #[test]
    fn test_continuation_with_new_bounds() {
        let cyl = CylinderSurface::new(1.0);
        // First search in a window away from the minimum.
        let first = minimize_rect(&cyl, Vec3::x(), UvRect::new((2.0, 2.8), (0.0, 1.0)), &MinConfig::default());
        // Continue with bounds that include it.
        let cont = continue_minimize(
            &cyl,
            Vec3::x(),
            &first,
            UvRect::new((2.0, 4.0), (0.0, 1.0)),
            &MinConfig::default(),
        );
        assert!(cont.outcome.is_minimum());
        assert!((cont.uv.x - PI).abs() < 1e-5);
    }
}
