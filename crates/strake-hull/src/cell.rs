//! Oriented bounding hulls for surface patches.
//!
//! A patch's hull is a near-minimal-volume parallelepiped: a local
//! orthonormal frame (two tangential axes, one normal axis) plus
//! axis-aligned extents in that frame. The frame follows the patch
//! geometry, so flat patches become thin slabs and the separating-axis
//! interference test stays tight.

use nalgebra::Matrix3;
use strake_math::{Point3, Vec3};

use crate::aabb::Aabb3;

/// An oriented box: orthonormal frame, anchor point and local extents.
#[derive(Debug, Clone)]
pub struct OrientedBox {
    anchor: Point3,
    /// Columns are the unit axes of the local frame.
    frame: Matrix3<f64>,
    lo: Vec3,
    hi: Vec3,
}

impl OrientedBox {
    /// Build the minimal box in the frame suggested by four patch
    /// corners, enclosing all of `points`.
    ///
    /// The tangential axes are the sums of opposite edge vectors; the
    /// normal axis is the cross product of the two diagonals. Degenerate
    /// corner layouts (pole caps, slivers) fall back to whatever
    /// orthonormal frame can be completed.
    pub fn from_patch_corners(corners: &[Point3; 4], points: &[Point3], margin: f64) -> Self {
        let [p00, p10, p01, p11] = *corners;
        let axis_u = (p10 - p00) + (p11 - p01);
        let axis_v = (p01 - p00) + (p11 - p10);
        let axis_n = (p11 - p00).cross(&(p10 - p01));
        let frame = orthonormal_frame(axis_u, axis_v, axis_n);

        let anchor = p00;
        let mut lo = Vec3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
        let mut hi = -lo;
        for p in corners.iter().chain(points.iter()) {
            let local = frame.transpose() * (p - anchor);
            lo.x = lo.x.min(local.x);
            lo.y = lo.y.min(local.y);
            lo.z = lo.z.min(local.z);
            hi.x = hi.x.max(local.x);
            hi.y = hi.y.max(local.y);
            hi.z = hi.z.max(local.z);
        }
        lo.add_scalar_mut(-margin);
        hi.add_scalar_mut(margin);
        Self { anchor, frame, lo, hi }
    }

    /// Wrap an axis-aligned box in the identity frame.
    pub fn from_aabb(aabb: &Aabb3) -> Self {
        Self {
            anchor: aabb.min,
            frame: Matrix3::identity(),
            lo: Vec3::zeros(),
            hi: aabb.max - aabb.min,
        }
    }

    /// Extent along the normal (third) axis. Near zero for flat patches.
    pub fn thickness(&self) -> f64 {
        self.hi.z - self.lo.z
    }

    /// Coordinates of `p` in the local frame.
    pub fn local_coords(&self, p: &Point3) -> Vec3 {
        self.frame.transpose() * (p - self.anchor)
    }

    /// Grow the extents by `margin` on every side.
    pub fn inflate(&mut self, margin: f64) {
        self.lo.add_scalar_mut(-margin);
        self.hi.add_scalar_mut(margin);
    }

    /// Extend the extents to contain `p`.
    pub fn enclose(&mut self, p: &Point3) {
        let local = self.frame.transpose() * (p - self.anchor);
        self.lo.x = self.lo.x.min(local.x);
        self.lo.y = self.lo.y.min(local.y);
        self.lo.z = self.lo.z.min(local.z);
        self.hi.x = self.hi.x.max(local.x);
        self.hi.y = self.hi.y.max(local.y);
        self.hi.z = self.hi.z.max(local.z);
    }

    /// Center of the box.
    pub fn center(&self) -> Point3 {
        self.anchor + self.frame * (0.5 * (self.lo + self.hi))
    }

    fn half_extents(&self) -> Vec3 {
        0.5 * (self.hi - self.lo)
    }

    /// The eight corner points.
    pub fn corners(&self) -> [Point3; 8] {
        let mut out = [Point3::origin(); 8];
        for (i, c) in out.iter_mut().enumerate() {
            let local = Vec3::new(
                if i & 1 == 0 { self.lo.x } else { self.hi.x },
                if i & 2 == 0 { self.lo.y } else { self.hi.y },
                if i & 4 == 0 { self.lo.z } else { self.hi.z },
            );
            *c = self.anchor + self.frame * local;
        }
        out
    }

    /// World-space axis-aligned bounds.
    pub fn aabb(&self) -> Aabb3 {
        Aabb3::from_points(self.corners().iter())
    }

    /// Whether `p` lies inside the box, with tolerance.
    pub fn contains_point(&self, p: &Point3, tol: f64) -> bool {
        let local = self.frame.transpose() * (p - self.anchor);
        local.x >= self.lo.x - tol
            && local.x <= self.hi.x + tol
            && local.y >= self.lo.y - tol
            && local.y <= self.hi.y + tol
            && local.z >= self.lo.z - tol
            && local.z <= self.hi.z + tol
    }

    /// Separating-axis interference test between two oriented boxes.
    ///
    /// The fifteen candidate axes are the three face normals of each box
    /// and the nine pairwise edge cross products.
    pub fn interferes(&self, other: &OrientedBox) -> bool {
        let t = other.center() - self.center();
        let a = self.half_extents();
        let b = other.half_extents();
        // Rotation taking other's frame into this one's.
        let r = self.frame.transpose() * other.frame;
        let t = self.frame.transpose() * t;
        // Epsilon guards against nearly parallel edge pairs.
        let abs_r = r.map(|x| x.abs() + 1e-12);

        // Face normals of self.
        for i in 0..3 {
            let rb = abs_r.row(i);
            if t[i].abs() > a[i] + b.x * rb[0] + b.y * rb[1] + b.z * rb[2] {
                return false;
            }
        }
        // Face normals of other.
        for j in 0..3 {
            let rb = abs_r.column(j);
            let proj = t.x * r[(0, j)] + t.y * r[(1, j)] + t.z * r[(2, j)];
            if proj.abs() > b[j] + a.x * rb[0] + a.y * rb[1] + a.z * rb[2] {
                return false;
            }
        }
        // Edge cross products A_i × B_j.
        for i in 0..3 {
            let (i1, i2) = ((i + 1) % 3, (i + 2) % 3);
            for j in 0..3 {
                let (j1, j2) = ((j + 1) % 3, (j + 2) % 3);
                let ra = a[i1] * abs_r[(i2, j)] + a[i2] * abs_r[(i1, j)];
                let rb = b[j1] * abs_r[(i, j2)] + b[j2] * abs_r[(i, j1)];
                let proj = t[i2] * r[(i1, j)] - t[i1] * r[(i2, j)];
                if proj.abs() > ra + rb {
                    return false;
                }
            }
        }
        true
    }

    /// Clip the line `origin + t·dir` against the box; returns the
    /// parameter window `[t_enter, t_exit]` when the line crosses it.
    pub fn clip_line(&self, origin: &Point3, dir: &Vec3) -> Option<(f64, f64)> {
        let local_o = self.frame.transpose() * (origin - self.anchor);
        let local_d = self.frame.transpose() * dir;
        let mut t0 = f64::NEG_INFINITY;
        let mut t1 = f64::INFINITY;
        for i in 0..3 {
            if local_d[i].abs() < 1e-14 {
                if local_o[i] < self.lo[i] || local_o[i] > self.hi[i] {
                    return None;
                }
                continue;
            }
            let s0 = (self.lo[i] - local_o[i]) / local_d[i];
            let s1 = (self.hi[i] - local_o[i]) / local_d[i];
            t0 = t0.max(s0.min(s1));
            t1 = t1.min(s0.max(s1));
            if t0 > t1 {
                return None;
            }
        }
        Some((t0, t1))
    }
}

/// Complete `(u, v, n)` into an orthonormal frame, tolerating degenerate
/// inputs.
fn orthonormal_frame(u: Vec3, v: Vec3, n: Vec3) -> Matrix3<f64> {
    let eu = safe_normalize(u).unwrap_or_else(Vec3::x);
    let n = match safe_normalize(n) {
        Some(n) => n,
        None => safe_normalize(eu.cross(&v)).unwrap_or_else(|| arbitrary_perpendicular(&eu)),
    };
    // Re-orthogonalize the tangential pair against the normal axis.
    let eu = safe_normalize(eu - eu.dot(&n) * n).unwrap_or_else(|| arbitrary_perpendicular(&n));
    let ev = n.cross(&eu);
    Matrix3::from_columns(&[eu, ev, n])
}

fn safe_normalize(v: Vec3) -> Option<Vec3> {
    let len = v.norm();
    if len > 1e-12 {
        Some(v / len)
    } else {
        None
    }
}

fn arbitrary_perpendicular(v: &Vec3) -> Vec3 {
    let trial = if v.x.abs() < 0.9 { Vec3::x() } else { Vec3::y() };
    safe_normalize(v.cross(&trial)).unwrap_or_else(Vec3::z)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_patch_box() -> OrientedBox {
        let corners = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        OrientedBox::from_patch_corners(&corners, &[], 0.0)
    }

    #[test]
    fn test_flat_patch_is_thin() {
        let cell = unit_patch_box();
        assert!(cell.thickness() < 1e-12);
        assert!(cell.contains_point(&Point3::new(0.5, 0.5, 0.0), 1e-9));
        assert!(!cell.contains_point(&Point3::new(0.5, 0.5, 0.1), 1e-9));
    }

    #[test]
    fn test_bulged_sample_grows_extent() {
        let corners = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        let bulge = [Point3::new(0.5, 0.5, 0.2)];
        let cell = OrientedBox::from_patch_corners(&corners, &bulge, 0.0);
        assert!(cell.thickness() > 0.19);
        assert!(cell.contains_point(&bulge[0], 1e-9));
    }

    #[test]
    fn test_interference() {
        let a = unit_patch_box();
        let shifted = [
            Point3::new(0.5, 0.5, 0.0),
            Point3::new(1.5, 0.5, 0.0),
            Point3::new(0.5, 1.5, 0.0),
            Point3::new(1.5, 1.5, 0.0),
        ];
        let b = OrientedBox::from_patch_corners(&shifted, &[], 0.0);
        assert!(a.interferes(&b));

        let far = [
            Point3::new(3.0, 0.0, 1.0),
            Point3::new(4.0, 0.0, 1.0),
            Point3::new(3.0, 1.0, 1.0),
            Point3::new(4.0, 1.0, 1.0),
        ];
        let c = OrientedBox::from_patch_corners(&far, &[], 0.0);
        assert!(!a.interferes(&c));
    }

    #[test]
    fn test_line_clip() {
        let corners = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        let bulge = [Point3::new(0.5, 0.5, 0.5)];
        let cell = OrientedBox::from_patch_corners(&corners, &bulge, 0.0);
        // Vertical line through the middle.
        let hit = cell.clip_line(&Point3::new(0.5, 0.5, -1.0), &Vec3::z());
        let (t0, t1) = hit.unwrap();
        assert!(t0 >= 0.9 && t1 <= 1.6);
        // Line missing the box entirely.
        assert!(cell
            .clip_line(&Point3::new(5.0, 5.0, -1.0), &Vec3::z())
            .is_none());
    }

    #[test]
    fn test_aabb_conversion_round_trip() {
        let aabb = Aabb3::new(Point3::new(-1.0, -2.0, -3.0), Point3::new(1.0, 2.0, 3.0));
        let obb = OrientedBox::from_aabb(&aabb);
        assert!(obb.contains_point(&Point3::origin(), 0.0));
        let back = obb.aabb();
        assert!((back.min - aabb.min).norm() < 1e-12);
        assert!((back.max - aabb.max).norm() < 1e-12);
    }
}
