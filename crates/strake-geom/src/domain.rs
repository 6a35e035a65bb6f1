//! Parametric rectangles.

use strake_math::Point2;

/// An axis-aligned rectangle in (u, v) parameter space.
///
/// Patches of the cell hull index, minimizer search windows, and
/// intersection working extents are all `UvRect`s. A patch is immutable
/// once its cell is finalized; subdivision replaces it wholesale with
/// its children.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvRect {
    /// u range as (min, max).
    pub u: (f64, f64),
    /// v range as (min, max).
    pub v: (f64, f64),
}

impl UvRect {
    /// Create a rectangle from two ranges.
    pub fn new(u: (f64, f64), v: (f64, f64)) -> Self {
        Self { u, v }
    }

    /// Width along u.
    pub fn u_span(&self) -> f64 {
        self.u.1 - self.u.0
    }

    /// Height along v.
    pub fn v_span(&self) -> f64 {
        self.v.1 - self.v.0
    }

    /// Center of the rectangle.
    pub fn center(&self) -> Point2 {
        Point2::new(0.5 * (self.u.0 + self.u.1), 0.5 * (self.v.0 + self.v.1))
    }

    /// Whether a parameter point lies inside (closed rectangle).
    pub fn contains(&self, p: Point2) -> bool {
        p.x >= self.u.0 && p.x <= self.u.1 && p.y >= self.v.0 && p.y <= self.v.1
    }

    /// Whether a parameter point lies inside, allowing `tol` slack.
    pub fn contains_with_tol(&self, p: Point2, tol: f64) -> bool {
        p.x >= self.u.0 - tol && p.x <= self.u.1 + tol && p.y >= self.v.0 - tol && p.y <= self.v.1 + tol
    }

    /// Clamp a parameter point into the rectangle.
    pub fn clamp(&self, p: Point2) -> Point2 {
        Point2::new(p.x.clamp(self.u.0, self.u.1), p.y.clamp(self.v.0, self.v.1))
    }

    /// The four corners in the order (u0,v0), (u1,v0), (u0,v1), (u1,v1).
    pub fn corners(&self) -> [Point2; 4] {
        [
            Point2::new(self.u.0, self.v.0),
            Point2::new(self.u.1, self.v.0),
            Point2::new(self.u.0, self.v.1),
            Point2::new(self.u.1, self.v.1),
        ]
    }

    /// Split into four quadrants at the center.
    pub fn quarter(&self) -> [UvRect; 4] {
        let c = self.center();
        [
            UvRect::new((self.u.0, c.x), (self.v.0, c.y)),
            UvRect::new((c.x, self.u.1), (self.v.0, c.y)),
            UvRect::new((self.u.0, c.x), (c.y, self.v.1)),
            UvRect::new((c.x, self.u.1), (c.y, self.v.1)),
        ]
    }

    /// Split into two halves across u.
    pub fn halve_u(&self) -> [UvRect; 2] {
        let cu = 0.5 * (self.u.0 + self.u.1);
        [
            UvRect::new((self.u.0, cu), self.v),
            UvRect::new((cu, self.u.1), self.v),
        ]
    }

    /// Split into two halves across v.
    pub fn halve_v(&self) -> [UvRect; 2] {
        let cv = 0.5 * (self.v.0 + self.v.1);
        [
            UvRect::new(self.u, (self.v.0, cv)),
            UvRect::new(self.u, (cv, self.v.1)),
        ]
    }

    /// Grow the rectangle about its center by `factor`, then intersect
    /// with `bound`. Returns the grown rectangle and whether growth was
    /// clipped by the bound on every side (no room left to stretch).
    pub fn stretched(&self, factor: f64, bound: &UvRect) -> (UvRect, bool) {
        let c = self.center();
        let hu = 0.5 * self.u_span() * factor;
        let hv = 0.5 * self.v_span() * factor;
        let grown = UvRect::new(
            ((c.x - hu).max(bound.u.0), (c.x + hu).min(bound.u.1)),
            ((c.y - hv).max(bound.v.0), (c.y + hv).min(bound.v.1)),
        );
        let clipped = grown == *self;
        (grown, clipped)
    }

    /// Intersection with another rectangle, if non-empty.
    pub fn intersection(&self, other: &UvRect) -> Option<UvRect> {
        let u = (self.u.0.max(other.u.0), self.u.1.min(other.u.1));
        let v = (self.v.0.max(other.v.0), self.v.1.min(other.v.1));
        if u.0 <= u.1 && v.0 <= v.1 {
            Some(UvRect::new(u, v))
        } else {
            None
        }
    }
}
