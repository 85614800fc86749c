//! Quadratic curve-correction test.
//!
//! The correction primitive `{p0, p1, p2}` carries a parameter pair `(t, s)` per vertex:
//! `p0 -> (0, 0)`, `p1 -> (0, 1)`, `p2 -> (1, 0)`. Interpolated across the triangle, `t` and
//! `s` are the barycentric weights of `p2` and `p1`. In the basis `u = s/2 + t`, `v = t` the
//! curve is `u^2 = v`; fragments between the chord and the curve satisfy `u^2 <= v` and are
//! kept, fragments between the curve and the control point are discarded.

/// `(t, s)` assigned to each vertex of the correction primitive.
pub const CURVE_VERTEX_PARAMS: [[f32; 2]; 3] = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0]];

/// Interpolate `(t, s)` from barycentric weights of `(p0, p1, p2)`.
#[inline(always)]
pub fn curve_params(bary: [f64; 3]) -> (f32, f32) {
    let mut t = 0.0f64;
    let mut s = 0.0f64;
    for (w, [vt, vs]) in bary.iter().zip(CURVE_VERTEX_PARAMS.iter()) {
        t += w * *vt as f64;
        s += w * *vs as f64;
    }
    (t as f32, s as f32)
}

/// True when a fragment at `(t, s)` lies inside the curved sliver and must be counted.
#[inline(always)]
pub fn curve_keeps(t: f32, s: f32) -> bool {
    let u = s * 0.5 + t;
    u * u <= t
}

/// The discard predicate, i.e. `!curve_keeps(t, s)`.
#[inline(always)]
pub fn curve_discards(t: f32, s: f32) -> bool {
    !curve_keeps(t, s)
}
