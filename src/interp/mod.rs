//! Linear and cubic interpolation over runtime-typed values.
//!
//! Two distinct signaling channels, which callers treat differently:
//!
//! - `Err(TypeMismatch)` when the input kinds differ. This is a caller
//!   contract violation and always a hard failure.
//! - `Ok(None)` when the kind is not continuously interpolable (booleans,
//!   integers, strings, and their vector forms). Callers are expected to
//!   fall back to the nearest sample.
//!
//! Compound values interpolate key-by-key: a member that is missing from
//! the other sample(s), differs in kind, or is itself non-interpolable is
//! copied from the primary sample (`y0` for the 2-point form, `y1` for the
//! 4-point form) instead of failing the whole operation.
//!
//! A process-wide registry lets collaborating modules install a custom
//! 2-point interpolator for a kind; entries are consulted ahead of the
//! built-in dispatch and are never unregistered.

use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::util::math::{
    BBox3d, BBox3f, DMat4, DQuat, DVec2, DVec3, DVec4, Mat3, Mat4, Quat, Vec2, Vec3, Vec4,
};
use crate::util::{Error, Result};
use crate::value::{CompoundValue, TypeId, Value};

/// A custom 2-point interpolator for one value kind. Inputs are guaranteed
/// to share the kind the function was registered under; returning `None`
/// marks the kind non-interpolable for that call.
pub type LinearFn = fn(&Value, &Value, f64) -> Option<Value>;

static REGISTRY: OnceLock<RwLock<HashMap<TypeId, LinearFn>>> = OnceLock::new();

fn registry() -> &'static RwLock<HashMap<TypeId, LinearFn>> {
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Install a custom 2-point interpolator for `tag`. Append-only: later
/// registrations for the same tag win, nothing is ever unregistered.
pub fn register_linear(tag: TypeId, f: LinearFn) {
    registry().write().insert(tag, f);
}

fn registered_linear(tag: TypeId) -> Option<LinearFn> {
    registry().read().get(&tag).copied()
}

/// Interpolate between two same-kind values at `x` in [0, 1], where 0
/// reproduces `y0` and 1 reproduces `y1`. Out-of-range `x` is not
/// rejected; extrapolation is the caller's responsibility.
pub fn linear(y0: &Value, y1: &Value, x: f64) -> Result<Option<Value>> {
    if y0.type_id() != y1.type_id() {
        return Err(Error::TypeMismatch {
            expected: y0.kind_name(),
            actual: y1.kind_name(),
        });
    }
    if let Some(f) = registered_linear(y0.type_id()) {
        return Ok(f(y0, y1, x));
    }
    Ok(linear_builtin(y0, y1, x))
}

/// Interpolate across four same-kind values at `x` in [0, 1], where the
/// middle pair brackets the target (`x == 0` reproduces `y1`).
pub fn cubic(y0: &Value, y1: &Value, y2: &Value, y3: &Value, x: f64) -> Result<Option<Value>> {
    for other in [y1, y2, y3] {
        if other.type_id() != y0.type_id() {
            return Err(Error::TypeMismatch {
                expected: y0.kind_name(),
                actual: other.kind_name(),
            });
        }
    }
    Ok(cubic_builtin(y0, y1, y2, y3, x))
}

/// Per-component blend arithmetic shared by the built-in kinds.
trait Blend: Copy {
    fn lerp(a: Self, b: Self, x: f64) -> Self;
    fn spline(y0: Self, y1: Self, y2: Self, y3: Self, x: f64) -> Self;
}

macro_rules! impl_blend {
    ($($ty:ty => $scalar:ty),* $(,)?) => {$(
        impl Blend for $ty {
            #[inline]
            fn lerp(a: Self, b: Self, x: f64) -> Self {
                let t = x as $scalar;
                a * (1.0 - t) + b * t
            }

            // Catmull-Rom blend; degenerates to y1 at x == 0 and y2 at x == 1.
            #[inline]
            fn spline(y0: Self, y1: Self, y2: Self, y3: Self, x: f64) -> Self {
                let t = x as $scalar;
                let t2 = t * t;
                let t3 = t2 * t;
                (y0 * -0.5 + y1 * 1.5 + y2 * -1.5 + y3 * 0.5) * t3
                    + (y0 * 1.0 + y1 * -2.5 + y2 * 2.0 + y3 * -0.5) * t2
                    + (y0 * -0.5 + y2 * 0.5) * t
                    + y1
            }
        }
    )*};
}

impl_blend!(
    f32 => f32,
    f64 => f64,
    Vec2 => f32,
    Vec3 => f32,
    Vec4 => f32,
    DVec2 => f64,
    DVec3 => f64,
    DVec4 => f64,
    Mat3 => f32,
    Mat4 => f32,
    DMat4 => f64,
);

impl Blend for BBox3f {
    fn lerp(a: Self, b: Self, x: f64) -> Self {
        Self::new(Blend::lerp(a.min, b.min, x), Blend::lerp(a.max, b.max, x))
    }

    fn spline(y0: Self, y1: Self, y2: Self, y3: Self, x: f64) -> Self {
        Self::new(
            Blend::spline(y0.min, y1.min, y2.min, y3.min, x),
            Blend::spline(y0.max, y1.max, y2.max, y3.max, x),
        )
    }
}

impl Blend for BBox3d {
    fn lerp(a: Self, b: Self, x: f64) -> Self {
        Self::new(Blend::lerp(a.min, b.min, x), Blend::lerp(a.max, b.max, x))
    }

    fn spline(y0: Self, y1: Self, y2: Self, y3: Self, x: f64) -> Self {
        Self::new(
            Blend::spline(y0.min, y1.min, y2.min, y3.min, x),
            Blend::spline(y0.max, y1.max, y2.max, y3.max, x),
        )
    }
}

fn lerp_quatf(a: Quat, b: Quat, x: f64) -> Quat {
    a.slerp(b, x as f32)
}

fn lerp_quatd(a: DQuat, b: DQuat, x: f64) -> DQuat {
    a.slerp(b, x)
}

// Component spline with renormalization; adequate for the densely sampled
// rotations these caches hold.
fn spline_quatf(y0: Quat, y1: Quat, y2: Quat, y3: Quat, x: f64) -> Quat {
    let v = Vec4::spline(
        Vec4::from_array(y0.to_array()),
        Vec4::from_array(y1.to_array()),
        Vec4::from_array(y2.to_array()),
        Vec4::from_array(y3.to_array()),
        x,
    );
    Quat::from_array(v.normalize().to_array())
}

fn spline_quatd(y0: DQuat, y1: DQuat, y2: DQuat, y3: DQuat, x: f64) -> DQuat {
    let v = DVec4::spline(
        DVec4::from_array(y0.to_array()),
        DVec4::from_array(y1.to_array()),
        DVec4::from_array(y2.to_array()),
        DVec4::from_array(y3.to_array()),
        x,
    );
    DQuat::from_array(v.normalize().to_array())
}

fn lerp_elems<T: Blend>(a: &[T], b: &[T], x: f64) -> Option<Vec<T>> {
    if a.len() != b.len() {
        return None;
    }
    Some(
        a.iter()
            .zip(b)
            .map(|(a, b)| T::lerp(*a, *b, x))
            .collect(),
    )
}

fn spline_elems<T: Blend>(y0: &[T], y1: &[T], y2: &[T], y3: &[T], x: f64) -> Option<Vec<T>> {
    if y0.len() != y1.len() || y0.len() != y2.len() || y0.len() != y3.len() {
        return None;
    }
    Some(
        (0..y1.len())
            .map(|i| T::spline(y0[i], y1[i], y2[i], y3[i], x))
            .collect(),
    )
}

fn linear_builtin(y0: &Value, y1: &Value, x: f64) -> Option<Value> {
    use Value::*;
    match (y0, y1) {
        (Float(a), Float(b)) => Some(Float(Blend::lerp(*a, *b, x))),
        (Double(a), Double(b)) => Some(Double(Blend::lerp(*a, *b, x))),
        (V2f(a), V2f(b)) => Some(V2f(Blend::lerp(*a, *b, x))),
        (V3f(a), V3f(b)) => Some(V3f(Blend::lerp(*a, *b, x))),
        (V2d(a), V2d(b)) => Some(V2d(Blend::lerp(*a, *b, x))),
        (V3d(a), V3d(b)) => Some(V3d(Blend::lerp(*a, *b, x))),
        (Quatf(a), Quatf(b)) => Some(Quatf(lerp_quatf(*a, *b, x))),
        (Quatd(a), Quatd(b)) => Some(Quatd(lerp_quatd(*a, *b, x))),
        (Color3f(a), Color3f(b)) => Some(Color3f(Blend::lerp(*a, *b, x))),
        (Color4f(a), Color4f(b)) => Some(Color4f(Blend::lerp(*a, *b, x))),
        (M33f(a), M33f(b)) => Some(M33f(Blend::lerp(*a, *b, x))),
        (M44f(a), M44f(b)) => Some(M44f(Blend::lerp(*a, *b, x))),
        (M44d(a), M44d(b)) => Some(M44d(Blend::lerp(*a, *b, x))),
        (Box3f(a), Box3f(b)) => Some(Box3f(Blend::lerp(*a, *b, x))),
        (Box3d(a), Box3d(b)) => Some(Box3d(Blend::lerp(*a, *b, x))),

        (FloatVec(a), FloatVec(b)) => lerp_elems(a, b, x).map(FloatVec),
        (DoubleVec(a), DoubleVec(b)) => lerp_elems(a, b, x).map(DoubleVec),
        (V2fVec(a), V2fVec(b)) => lerp_elems(a, b, x).map(V2fVec),
        (V3fVec(a), V3fVec(b)) => lerp_elems(a, b, x).map(V3fVec),
        (V3dVec(a), V3dVec(b)) => lerp_elems(a, b, x).map(V3dVec),
        (QuatfVec(a), QuatfVec(b)) => {
            if a.len() != b.len() {
                return None;
            }
            Some(QuatfVec(
                a.iter()
                    .zip(b)
                    .map(|(a, b)| lerp_quatf(*a, *b, x))
                    .collect(),
            ))
        }
        (Color3fVec(a), Color3fVec(b)) => lerp_elems(a, b, x).map(Color3fVec),
        (M44fVec(a), M44fVec(b)) => lerp_elems(a, b, x).map(M44fVec),

        (Compound(a), Compound(b)) => Some(Compound(linear_compound(a, b, x))),
        (List(a), List(b)) => linear_list(a, b, x).map(List),

        // Discrete kinds hold their value rather than blending.
        _ => None,
    }
}

fn cubic_builtin(y0: &Value, y1: &Value, y2: &Value, y3: &Value, x: f64) -> Option<Value> {
    use Value::*;
    match (y0, y1, y2, y3) {
        (Float(a), Float(b), Float(c), Float(d)) => {
            Some(Float(Blend::spline(*a, *b, *c, *d, x)))
        }
        (Double(a), Double(b), Double(c), Double(d)) => {
            Some(Double(Blend::spline(*a, *b, *c, *d, x)))
        }
        (V2f(a), V2f(b), V2f(c), V2f(d)) => Some(V2f(Blend::spline(*a, *b, *c, *d, x))),
        (V3f(a), V3f(b), V3f(c), V3f(d)) => Some(V3f(Blend::spline(*a, *b, *c, *d, x))),
        (V2d(a), V2d(b), V2d(c), V2d(d)) => Some(V2d(Blend::spline(*a, *b, *c, *d, x))),
        (V3d(a), V3d(b), V3d(c), V3d(d)) => Some(V3d(Blend::spline(*a, *b, *c, *d, x))),
        (Quatf(a), Quatf(b), Quatf(c), Quatf(d)) => {
            Some(Quatf(spline_quatf(*a, *b, *c, *d, x)))
        }
        (Quatd(a), Quatd(b), Quatd(c), Quatd(d)) => {
            Some(Quatd(spline_quatd(*a, *b, *c, *d, x)))
        }
        (Color3f(a), Color3f(b), Color3f(c), Color3f(d)) => {
            Some(Color3f(Blend::spline(*a, *b, *c, *d, x)))
        }
        (Color4f(a), Color4f(b), Color4f(c), Color4f(d)) => {
            Some(Color4f(Blend::spline(*a, *b, *c, *d, x)))
        }
        (M33f(a), M33f(b), M33f(c), M33f(d)) => Some(M33f(Blend::spline(*a, *b, *c, *d, x))),
        (M44f(a), M44f(b), M44f(c), M44f(d)) => Some(M44f(Blend::spline(*a, *b, *c, *d, x))),
        (M44d(a), M44d(b), M44d(c), M44d(d)) => Some(M44d(Blend::spline(*a, *b, *c, *d, x))),
        (Box3f(a), Box3f(b), Box3f(c), Box3f(d)) => {
            Some(Box3f(Blend::spline(*a, *b, *c, *d, x)))
        }
        (Box3d(a), Box3d(b), Box3d(c), Box3d(d)) => {
            Some(Box3d(Blend::spline(*a, *b, *c, *d, x)))
        }

        (FloatVec(a), FloatVec(b), FloatVec(c), FloatVec(d)) => {
            spline_elems(a, b, c, d, x).map(FloatVec)
        }
        (DoubleVec(a), DoubleVec(b), DoubleVec(c), DoubleVec(d)) => {
            spline_elems(a, b, c, d, x).map(DoubleVec)
        }
        (V2fVec(a), V2fVec(b), V2fVec(c), V2fVec(d)) => {
            spline_elems(a, b, c, d, x).map(V2fVec)
        }
        (V3fVec(a), V3fVec(b), V3fVec(c), V3fVec(d)) => {
            spline_elems(a, b, c, d, x).map(V3fVec)
        }
        (V3dVec(a), V3dVec(b), V3dVec(c), V3dVec(d)) => {
            spline_elems(a, b, c, d, x).map(V3dVec)
        }
        (QuatfVec(a), QuatfVec(b), QuatfVec(c), QuatfVec(d)) => {
            if a.len() != b.len() || a.len() != c.len() || a.len() != d.len() {
                return None;
            }
            Some(QuatfVec(
                (0..b.len())
                    .map(|i| spline_quatf(a[i], b[i], c[i], d[i], x))
                    .collect(),
            ))
        }
        (Color3fVec(a), Color3fVec(b), Color3fVec(c), Color3fVec(d)) => {
            spline_elems(a, b, c, d, x).map(Color3fVec)
        }
        (M44fVec(a), M44fVec(b), M44fVec(c), M44fVec(d)) => {
            spline_elems(a, b, c, d, x).map(M44fVec)
        }

        (Compound(a), Compound(b), Compound(c), Compound(d)) => {
            Some(Compound(cubic_compound(a, b, c, d, x)))
        }
        (List(a), List(b), List(c), List(d)) => cubic_list(a, b, c, d, x).map(List),

        _ => None,
    }
}

fn linear_compound(y0: &CompoundValue, y1: &CompoundValue, x: f64) -> CompoundValue {
    let mut result = CompoundValue::new();
    for (key, a) in y0 {
        let blended = y1
            .get(key)
            .filter(|b| b.type_id() == a.type_id())
            .and_then(|b| linear_builtin_or_registered(a, b, x));
        result.insert(key.clone(), blended.unwrap_or_else(|| a.clone()));
    }
    result
}

fn cubic_compound(
    y0: &CompoundValue,
    y1: &CompoundValue,
    y2: &CompoundValue,
    y3: &CompoundValue,
    x: f64,
) -> CompoundValue {
    let mut result = CompoundValue::new();
    for (key, b) in y1 {
        let others = [y0.get(key), y2.get(key), y3.get(key)];
        let blended = if others
            .iter()
            .all(|o| o.is_some_and(|v| v.type_id() == b.type_id()))
        {
            cubic_builtin(
                others[0].unwrap_or(b),
                b,
                others[1].unwrap_or(b),
                others[2].unwrap_or(b),
                x,
            )
        } else {
            None
        };
        result.insert(key.clone(), blended.unwrap_or_else(|| b.clone()));
    }
    result
}

fn linear_builtin_or_registered(a: &Value, b: &Value, x: f64) -> Option<Value> {
    if let Some(f) = registered_linear(a.type_id()) {
        return f(a, b, x);
    }
    linear_builtin(a, b, x)
}

fn linear_list(y0: &[Value], y1: &[Value], x: f64) -> Option<Vec<Value>> {
    if y0.len() != y1.len() {
        return None;
    }
    Some(
        y0.iter()
            .zip(y1)
            .map(|(a, b)| {
                if a.type_id() == b.type_id() {
                    linear_builtin_or_registered(a, b, x).unwrap_or_else(|| a.clone())
                } else {
                    a.clone()
                }
            })
            .collect(),
    )
}

fn cubic_list(
    y0: &[Value],
    y1: &[Value],
    y2: &[Value],
    y3: &[Value],
    x: f64,
) -> Option<Vec<Value>> {
    if y1.len() != y0.len() || y1.len() != y2.len() || y1.len() != y3.len() {
        return None;
    }
    Some(
        (0..y1.len())
            .map(|i| {
                let b = &y1[i];
                let same = [&y0[i], &y2[i], &y3[i]]
                    .iter()
                    .all(|v| v.type_id() == b.type_id());
                if same {
                    cubic_builtin(&y0[i], b, &y2[i], &y3[i], x).unwrap_or_else(|| b.clone())
                } else {
                    b.clone()
                }
            })
            .collect(),
    )
}
