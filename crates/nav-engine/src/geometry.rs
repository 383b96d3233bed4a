//! Geometry helpers shared by the mesh and the query
//!
//! Points are `[f32; 3]` in mesh space (y up). Functions suffixed `_2d`
//! work on the xz-plane and ignore height.

use glam::Vec3;

/// Squared distance below which two points are considered equal
const EQUAL_THRESHOLD_SQR: f32 = (1.0 / 16384.0) * (1.0 / 16384.0);

#[inline]
fn to_vec3(v: &[f32; 3]) -> Vec3 {
    Vec3::from_array(*v)
}

/// Signed doubled area of triangle abc on the xz-plane
#[inline]
pub fn tri_area_2d(a: &[f32; 3], b: &[f32; 3], c: &[f32; 3]) -> f32 {
    let abx = b[0] - a[0];
    let abz = b[2] - a[2];
    let acx = c[0] - a[0];
    let acz = c[2] - a[2];
    acx * abz - abx * acz
}

/// Returns true if the points are within a tiny distance of each other
#[inline]
pub fn v_equal(a: &[f32; 3], b: &[f32; 3]) -> bool {
    vdist_sqr(a, b) < EQUAL_THRESHOLD_SQR
}

/// Euclidean distance
#[inline]
pub fn vdist(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    to_vec3(a).distance(to_vec3(b))
}

/// Squared euclidean distance
#[inline]
pub fn vdist_sqr(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    to_vec3(a).distance_squared(to_vec3(b))
}

/// Linear interpolation between a and b
#[inline]
pub fn vlerp(a: &[f32; 3], b: &[f32; 3], t: f32) -> [f32; 3] {
    to_vec3(a).lerp(to_vec3(b), t).to_array()
}

/// Returns true if the axis-aligned boxes overlap
#[inline]
pub fn overlap_bounds(amin: &[f32; 3], amax: &[f32; 3], bmin: &[f32; 3], bmax: &[f32; 3]) -> bool {
    !(amin[0] > bmax[0]
        || amax[0] < bmin[0]
        || amin[1] > bmax[1]
        || amax[1] < bmin[1]
        || amin[2] > bmax[2]
        || amax[2] < bmin[2])
}

/// Squared xz-distance from `pt` to segment pq, plus the segment parameter
/// of the closest point
pub fn dist_pt_seg_sqr_2d(pt: &[f32; 3], p: &[f32; 3], q: &[f32; 3]) -> (f32, f32) {
    let pqx = q[0] - p[0];
    let pqz = q[2] - p[2];
    let dx = pt[0] - p[0];
    let dz = pt[2] - p[2];
    let d = pqx * pqx + pqz * pqz;
    let mut t = pqx * dx + pqz * dz;
    if d > 0.0 {
        t /= d;
    }
    let t = t.clamp(0.0, 1.0);
    let dx = p[0] + t * pqx - pt[0];
    let dz = p[2] + t * pqz - pt[2];
    (dx * dx + dz * dz, t)
}

/// Closest point to `pt` on segment pq in 3D
pub fn closest_point_on_segment(pt: &[f32; 3], p: &[f32; 3], q: &[f32; 3]) -> [f32; 3] {
    let p = to_vec3(p);
    let pq = to_vec3(q) - p;
    let len_sqr = pq.length_squared();
    if len_sqr <= f32::EPSILON {
        return p.to_array();
    }
    let t = ((to_vec3(pt) - p).dot(pq) / len_sqr).clamp(0.0, 1.0);
    (p + pq * t).to_array()
}

/// Crossing-number point-in-polygon test on the xz-plane
pub fn point_in_polygon_2d(pt: &[f32; 3], verts: &[[f32; 3]]) -> bool {
    let mut inside = false;
    let n = verts.len();
    let mut j = n.wrapping_sub(1);
    for i in 0..n {
        let vi = &verts[i];
        let vj = &verts[j];
        if ((vi[2] > pt[2]) != (vj[2] > pt[2]))
            && (pt[0] < (vj[0] - vi[0]) * (pt[2] - vi[2]) / (vj[2] - vi[2]) + vi[0])
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Height of triangle abc under `p`, if p lies inside it on the xz-plane
pub fn closest_height_point_triangle(
    p: &[f32; 3],
    a: &[f32; 3],
    b: &[f32; 3],
    c: &[f32; 3],
) -> Option<f32> {
    let v0 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let v1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let v2 = [p[0] - a[0], p[1] - a[1], p[2] - a[2]];

    let denom = v0[0] * v1[2] - v0[2] * v1[0];
    if denom.abs() < f32::EPSILON {
        return None;
    }

    let mut u = v1[2] * v2[0] - v1[0] * v2[2];
    let mut v = v0[0] * v2[2] - v0[2] * v2[0];
    let (mut u_denom, eps) = (denom, 1e-4 * denom.abs());
    if u_denom < 0.0 {
        u = -u;
        v = -v;
        u_denom = -u_denom;
    }

    if u >= -eps && v >= -eps && (u + v) <= u_denom + eps {
        Some(a[1] + (v0[1] * u + v1[1] * v) / u_denom)
    } else {
        None
    }
}

/// Centroid of the given points
pub fn poly_center(verts: &[[f32; 3]]) -> [f32; 3] {
    if verts.is_empty() {
        return [0.0; 3];
    }
    let sum = verts.iter().fold(Vec3::ZERO, |acc, v| acc + to_vec3(v));
    (sum / verts.len() as f32).to_array()
}

/// Tile side facing the given side of a neighbour
#[inline]
pub fn opposite_tile(side: u8) -> u8 {
    (side + 4) & 0x7
}
