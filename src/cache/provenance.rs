//! Provenance header generators.
//!
//! Pipelines can register named generator functions that run whenever a
//! cache file is created in a writable mode; each generated value is
//! written as an ordinary header. The registry is append-only and empty by
//! default, so caches contain exactly the headers their writers put there
//! unless generators are explicitly installed.

use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::value::{CompoundValue, Value};

/// A header generator: produces the value to write under its name.
pub type HeaderFn = fn() -> Value;

static REGISTRY: OnceLock<RwLock<Vec<(String, HeaderFn)>>> = OnceLock::new();

fn registry() -> &'static RwLock<Vec<(String, HeaderFn)>> {
    REGISTRY.get_or_init(|| RwLock::new(Vec::new()))
}

/// Install a generator to run on every cache file creation. Append-only;
/// registering the same name twice writes the later value last.
pub fn register_header(name: impl Into<String>, f: HeaderFn) {
    registry().write().push((name.into(), f));
}

/// Snapshot of the registered generators, in registration order.
pub(crate) fn generators() -> Vec<(String, HeaderFn)> {
    registry().read().clone()
}

/// The conventional tool-provenance compound (library name and version),
/// for pipelines that want it stamped into every cache file:
///
/// ```
/// framecache::cache::provenance::register_header(
///     "tool",
///     framecache::cache::provenance::standard_headers,
/// );
/// ```
pub fn standard_headers() -> Value {
    let mut info = CompoundValue::new();
    info.insert(
        "name".into(),
        Value::String(env!("CARGO_PKG_NAME").into()),
    );
    info.insert(
        "version".into(),
        Value::String(env!("CARGO_PKG_VERSION").into()),
    );
    Value::Compound(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_headers() {
        let Value::Compound(info) = standard_headers() else {
            panic!("expected compound header")
        };
        assert_eq!(
            info.get("name"),
            Some(&Value::String("framecache".into()))
        );
        assert!(info.contains_key("version"));
    }
}
