//! Iso-parameter curve adapter.
//!
//! Exposes a fixed-u or fixed-v curve on a surface through the [`Curve3d`]
//! contract. The surface/surface intersector walks these grid-line curves
//! against the other surface's cells.

use strake_math::{Point2, Point3, Vec3};

use crate::{sampled_hull_segments, Curve3d, CurveHullSegment, CurveKind, Surface};

/// Which parameter axis is held fixed, and at what value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IsoParam {
    /// Fixed u; the curve parameter runs along v.
    U(f64),
    /// Fixed v; the curve parameter runs along u.
    V(f64),
}

/// A fixed-parameter curve on a surface.
#[derive(Debug, Clone)]
pub struct IsoCurve {
    surface: Box<dyn Surface>,
    fixed: IsoParam,
    range: (f64, f64),
}

impl IsoCurve {
    /// Create the iso curve of `surface` at `fixed`, spanning `range` on
    /// the free axis.
    pub fn new(surface: Box<dyn Surface>, fixed: IsoParam, range: (f64, f64)) -> Self {
        Self {
            surface,
            fixed,
            range,
        }
    }

    /// The fixed axis and its value.
    pub fn fixed(&self) -> IsoParam {
        self.fixed
    }

    /// Map a curve parameter to the full surface parameter pair.
    pub fn uv_at(&self, t: f64) -> Point2 {
        match self.fixed {
            IsoParam::U(u) => Point2::new(u, t),
            IsoParam::V(v) => Point2::new(t, v),
        }
    }
}

impl Curve3d for IsoCurve {
    fn evaluate(&self, t: f64) -> Point3 {
        self.surface.evaluate(self.uv_at(t))
    }

    fn tangent(&self, t: f64) -> Vec3 {
        match self.fixed {
            IsoParam::U(_) => self.surface.d_dv(self.uv_at(t)),
            IsoParam::V(_) => self.surface.d_du(self.uv_at(t)),
        }
    }

    fn domain(&self) -> (f64, f64) {
        self.range
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::SurfaceIso
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }

    fn hull_segments(&self, window: (f64, f64), n: usize) -> Vec<CurveHullSegment> {
        sampled_hull_segments(self, window, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CylinderSurface;
    use std::f64::consts::PI;

    #[test]
    fn test_iso_u_runs_along_axis() {
        let cyl = CylinderSurface::new(1.0);
        let iso = IsoCurve::new(Box::new(cyl), IsoParam::U(0.0), (0.0, 2.0));
        let p0 = iso.evaluate(0.0);
        let p1 = iso.evaluate(2.0);
        assert!((p0 - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((p1 - Point3::new(1.0, 0.0, 2.0)).norm() < 1e-12);
        // Straight generator: tangent is the axis.
        assert!((iso.tangent(1.0) - Vec3::z()).norm() < 1e-12);
    }

    #[test]
    fn test_iso_v_is_circular() {
        let cyl = CylinderSurface::new(2.0);
        let iso = IsoCurve::new(Box::new(cyl), IsoParam::V(1.0), (0.0, 2.0 * PI));
        let quarter = iso.evaluate(PI / 2.0);
        assert!((quarter - Point3::new(0.0, 2.0, 1.0)).norm() < 1e-12);
    }
}
