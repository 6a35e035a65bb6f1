#![warn(missing_docs)]

//! Intersection algorithms for the strake kernel.
//!
//! Two entry points: [`intersect_curve`] walks a 3D curve against one
//! surface's cell hull index, and [`intersect_surfaces`] traces the
//! intersection curves of two indexed surfaces. Analytic surface pairs
//! with closed-form intersections bypass the numeric tracer entirely.

mod closed_form;
mod curve_surface;
mod surface_surface;

pub use closed_form::canonical_intersection;
pub use curve_surface::{
    intersect_curve, intersect_curve_cell, CurveIntersection, CurveSurfaceHit, CurveSurfaceOutcome,
};
pub use surface_surface::{
    intersect_surfaces, CurveClass, DualCurvePoint, DualSurfaceCurve, SurfaceIntersection,
};

use thiserror::Error;

/// How trustworthy an intersection result is.
///
/// Ambiguity retries that exhaust their budget degrade to best-effort
/// output marked [`Confidence::Low`] rather than looping indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// Produced by a closed-form solution.
    Exact,
    /// Produced by converged numeric tracing.
    Numeric,
    /// Numeric tracing hit its retry budget; output may be incomplete.
    Low,
}

/// Fatal contract violations between the kernel and its collaborators.
///
/// Numeric difficulties (singular systems, non-convergence) are never
/// errors; they surface as outcome enums. These are programming
/// mistakes.
#[derive(Debug, Error)]
pub enum IntersectError {
    /// A curve was queried over a window outside its domain.
    #[error("curve window [{0}, {1}] lies outside the curve domain")]
    WindowOutsideDomain(f64, f64),
    /// A curve returned no hull segments for a non-empty window, which
    /// every curve implementation is required to provide.
    #[error("curve provided no hull segments over a non-empty window")]
    MissingHullSegments,
}
