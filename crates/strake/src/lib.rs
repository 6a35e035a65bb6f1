#![warn(missing_docs)]

//! strake, a parametric surface kernel.
//!
//! Surfaces expose exact derivatives through the [`Surface`] contract;
//! a [`SurfaceSession`] wraps one surface together with its lazily
//! built cell hull index and offers the kernel queries: point
//! inversion, line probing, directional extrema, and curve/surface and
//! surface/surface intersection.
//!
//! # Example
//!
//! ```rust
//! use strake::{Plane, SphereSurface, SurfaceSession};
//!
//! let sphere = SurfaceSession::new(Box::new(SphereSurface::new(1.0)));
//! let equator = sphere.intersect_plane(&Plane::xy());
//! assert_eq!(equator.curves.len(), 1);
//! assert!(equator.curves[0].closed);
//! ```

use std::sync::OnceLock;

use thiserror::Error;

pub use strake_extrema::{
    continue_minimize, minimize_line, minimize_rect, sr1_line, sr1_rect, MinConfig, MinOutcome,
    MinResult,
};
pub use strake_geom::{
    BezierPatch, Circle3d, ConeSurface, Curve3d, CurveHullSegment, CurveKind, CylinderSurface,
    IsoCurve, IsoParam, Line3d, Plane, Polyline3d, SphereSurface, Surface, SurfaceKind,
    TorusSurface, UvRect,
};
pub use strake_hull::{patch_hull, Aabb3, CellIndex, CellKey, HullCell, IndexConfig, LineHit, OrientedBox};
pub use strake_intersect::{
    canonical_intersection, intersect_curve, intersect_surfaces, Confidence, CurveClass,
    CurveIntersection, CurveSurfaceHit, CurveSurfaceOutcome, DualCurvePoint, DualSurfaceCurve,
    IntersectError, SurfaceIntersection,
};
pub use strake_math::{Dir3, Point2, Point3, Tolerance, Vec2, Vec3};

/// Violations of the kernel's calling contract.
///
/// Numeric difficulties never surface here; they are reported through
/// the query outcome enums.
#[derive(Debug, Error)]
pub enum ContractError {
    /// A query was given a direction vector of negligible length.
    #[error("direction vector has negligible length")]
    DegenerateDirection,
    /// A curve query violated the curve/surface contract.
    #[error(transparent)]
    Intersect(#[from] IntersectError),
}

/// A surface bound to its cell hull index.
///
/// The index is built on first use and cached; [`invalidate`] rebuilds
/// it and bumps the version counter, so long-lived sessions stay
/// coherent after the caller mutates shared tolerance context.
///
/// [`invalidate`]: SurfaceSession::invalidate
pub struct SurfaceSession {
    surface: Box<dyn Surface>,
    extent: Option<UvRect>,
    cfg: IndexConfig,
    index: OnceLock<CellIndex>,
}

impl SurfaceSession {
    /// Session over the surface's natural parameter domain (unbounded
    /// axes clamped to the working extent).
    pub fn new(surface: Box<dyn Surface>) -> Self {
        Self {
            surface,
            extent: None,
            cfg: IndexConfig::default(),
            index: OnceLock::new(),
        }
    }

    /// Session over an explicit parameter extent.
    pub fn with_extent(surface: Box<dyn Surface>, extent: UvRect) -> Self {
        Self {
            surface,
            extent: Some(extent),
            cfg: IndexConfig::default(),
            index: OnceLock::new(),
        }
    }

    /// Replace the index configuration. Has no effect on an already
    /// built index until [`invalidate`] is called.
    ///
    /// [`invalidate`]: SurfaceSession::invalidate
    pub fn set_config(&mut self, cfg: IndexConfig) {
        self.cfg = cfg;
    }

    /// The underlying surface.
    pub fn surface(&self) -> &dyn Surface {
        self.surface.as_ref()
    }

    /// The session's cell hull index, built on first access.
    pub fn index(&self) -> &CellIndex {
        self.index.get_or_init(|| match self.extent {
            Some(extent) => CellIndex::build(self.surface.clone_box(), extent, self.cfg),
            None => CellIndex::over_natural_domain(self.surface.clone_box(), self.cfg),
        })
    }

    /// Rebuild the index with the session's current configuration and
    /// bump its version counter.
    pub fn invalidate(&mut self) {
        if let Some(index) = self.index.get_mut() {
            index.reconfigure(self.cfg);
        }
    }

    /// Version of the cached index; zero before the first build.
    pub fn version(&self) -> u64 {
        self.index.get().map_or(0, CellIndex::version)
    }

    /// Invert a 3D point to surface parameters. `None` when the point
    /// does not lie on the indexed region within tolerance.
    pub fn position_of(&self, p: &Point3) -> Option<Point2> {
        self.index().position_of(p)
    }

    /// All transversal hits of an infinite line with the surface,
    /// ordered along the line.
    pub fn line_hits(&self, origin: &Point3, dir: &Vec3) -> Result<Vec<LineHit>, ContractError> {
        if dir.norm() < 1e-12 {
            return Err(ContractError::DegenerateDirection);
        }
        Ok(self.index().line_intersections(origin, dir))
    }

    /// Cheap spatial overlap probe: a parameter point of some leaf cell
    /// whose hull meets `aabb`, or `None`.
    pub fn hit_test(&self, aabb: &Aabb3) -> Option<Point2> {
        self.index().hit_test(aabb)
    }

    /// Intersect a 3D curve with this surface over a parameter window.
    pub fn intersect_curve(
        &self,
        curve: &dyn Curve3d,
        window: (f64, f64),
    ) -> Result<CurveIntersection, ContractError> {
        Ok(intersect_curve(self.index(), curve, window)?)
    }

    /// Intersection curves with another session's surface.
    pub fn intersect_surface(&self, other: &SurfaceSession) -> SurfaceIntersection {
        intersect_surfaces(self.index(), other.index())
    }

    /// Intersection curves with an infinite plane.
    ///
    /// The plane is indexed over a square extent large enough to cover
    /// this session's spatial bounds, so every curve the surface can
    /// contribute is reachable.
    pub fn intersect_plane(&self, plane: &Plane) -> SurfaceIntersection {
        let bounds = self.index().bounds();
        let mut half: f64 = 1.0;
        for corner in [bounds.min, bounds.max] {
            let local = plane.project(&corner);
            half = half.max(local.x.abs()).max(local.y.abs());
            half = half.max(plane.signed_distance(&corner).abs());
        }
        half *= 2.0;
        let plane_index = CellIndex::build(
            plane.clone_box(),
            UvRect::new((-half, half), (-half, half)),
            self.cfg,
        );
        intersect_surfaces(self.index(), &plane_index)
    }

    /// Minimize the surface's height along `dir` over a parameter
    /// rectangle with the exact-Hessian Newton driver.
    pub fn directional_extremum(
        &self,
        dir: Vec3,
        rect: UvRect,
    ) -> Result<MinResult, ContractError> {
        if dir.norm() < 1e-12 {
            return Err(ContractError::DegenerateDirection);
        }
        Ok(minimize_rect(self.surface.as_ref(), dir, rect, &MinConfig::default()))
    }
}
