//! Continuous-time cache facade.
//!
//! An [`InterpolatedCache`] maps a fractional frame number onto the one,
//! two, or four per-tick cache files bracketing it, reads the raw samples
//! from each, and reconstructs a single value by interpolation. Cache
//! files are opened lazily in Read mode, named by substituting the tick
//! into a printf-style path template, and held in a pool bounded by a
//! least-recently-used eviction policy.
//!
//! Configuration methods take `&mut self` and are therefore exclusive;
//! all read-style methods take `&self` and may be called concurrently
//! from multiple threads. The pool lock is held only while looking up or
//! opening a cache, and each pooled cache has its own lock held only for
//! that one file's read, so reads of different ticks do not serialize
//! against each other. An entry evicted while a read still holds it stays
//! alive (and open) until that read completes.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::interp;
use crate::store::OpenMode;
use crate::util::{Error, Result};
use crate::value::{CompoundValue, Value};

use super::attribute::AttributeCache;
use super::oversamples::OversamplesCalculator;

/// How values are reconstructed between sample ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    /// Use the low bracketing sample only.
    #[default]
    None,
    /// Blend the two bracketing samples.
    Linear,
    /// Catmull-Rom blend over four samples: one behind, two ahead.
    Cubic,
}

struct CacheSlot {
    cache: Mutex<AttributeCache>,
}

struct PoolEntry {
    slot: Arc<CacheSlot>,
    last_used: u64,
}

#[derive(Default)]
struct Pool {
    entries: HashMap<i64, PoolEntry>,
    stamp: u64,
}

impl Pool {
    fn evict_down_to(&mut self, limit: usize) {
        while self.entries.len() > limit {
            let Some((&tick, _)) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
            else {
                break;
            };
            debug!(tick, "evicting least-recently-used cache");
            self.entries.remove(&tick);
        }
    }
}

/// Read-oriented cache keyed by continuous frame time, backed by one
/// attribute cache file per sample tick.
pub struct InterpolatedCache {
    template: Option<String>,
    interpolation: Interpolation,
    calculator: OversamplesCalculator,
    max_open_files: usize,
    pool: Mutex<Pool>,
}

impl Default for InterpolatedCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InterpolatedCache {
    /// Create a cache with no path template, `None` interpolation, the
    /// default oversamples calculator, and room for 10 open files.
    pub fn new() -> Self {
        Self {
            template: None,
            interpolation: Interpolation::None,
            calculator: OversamplesCalculator::default(),
            max_open_files: 10,
            pool: Mutex::new(Pool::default()),
        }
    }

    /// Create a cache reading files named by `template`, e.g.
    /// `"frame.%04d.cache"`.
    pub fn with_template(template: impl Into<String>) -> Self {
        let mut cache = Self::new();
        cache.template = Some(template.into());
        cache
    }

    /// Change the path template. Invalidates the pool when the template
    /// actually changes, since the tick-to-filename mapping changed.
    pub fn set_path_template(&mut self, template: impl Into<String>) {
        let template = template.into();
        if self.template.as_deref() != Some(template.as_str()) {
            self.template = Some(template);
            self.pool.get_mut().entries.clear();
        }
    }

    /// The current path template, if configured.
    pub fn path_template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    /// Change the interpolation mode; later reads use it immediately.
    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        self.interpolation = interpolation;
    }

    /// The current interpolation mode.
    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Change the frame-to-tick conversion.
    pub fn set_oversamples_calculator(&mut self, calculator: OversamplesCalculator) {
        self.calculator = calculator;
    }

    /// The current frame-to-tick conversion.
    pub fn oversamples_calculator(&self) -> OversamplesCalculator {
        self.calculator
    }

    /// Bound the number of cache files kept open, evicting immediately if
    /// the pool is over the new bound. Clamped to at least 1.
    pub fn set_max_open_files(&mut self, max_open_files: usize) {
        self.max_open_files = max_open_files.max(1);
        let limit = self.max_open_files;
        self.pool.get_mut().evict_down_to(limit);
    }

    /// The maximum number of cache files kept open.
    pub fn max_open_files(&self) -> usize {
        self.max_open_files
    }

    /// Number of cache files currently held open by the pool.
    pub fn open_files(&self) -> usize {
        self.pool.lock().entries.len()
    }

    /// Ticks currently held open by the pool, in ascending order.
    pub fn cached_ticks(&self) -> Vec<i64> {
        let mut ticks: Vec<i64> = self.pool.lock().entries.keys().copied().collect();
        ticks.sort_unstable();
        ticks
    }

    /// Read one attribute of one object at a frame. The value is
    /// interpolated across the bracketing ticks whenever the kind allows;
    /// non-interpolable kinds return the nearest sample unchanged.
    pub fn read(&self, frame: f64, obj: &str, attr: &str) -> Result<Value> {
        self.read_samples(frame, |cache| cache.read(obj, attr))
    }

    /// Read all attributes of one object at a frame, interpolating each.
    pub fn read_object(&self, frame: f64, obj: &str) -> Result<CompoundValue> {
        let mut result = CompoundValue::new();
        for attr in self.attributes(frame, obj)? {
            result.insert(attr.clone(), self.read(frame, obj, &attr)?);
        }
        Ok(result)
    }

    /// Read one header value at a frame, interpolated when possible.
    pub fn read_header(&self, frame: f64, hdr: &str) -> Result<Value> {
        self.read_samples(frame, |cache| cache.read_header(hdr))
    }

    /// Read all headers at a frame, interpolating each.
    pub fn read_headers(&self, frame: f64) -> Result<CompoundValue> {
        let mut result = CompoundValue::new();
        for hdr in self.headers(frame)? {
            result.insert(hdr.clone(), self.read_header(frame, &hdr)?);
        }
        Ok(result)
    }

    /// Object handles present at a frame (from the low bracketing tick).
    pub fn objects(&self, frame: f64) -> Result<Vec<String>> {
        Ok(self.low_slot(frame)?.cache.lock().objects())
    }

    /// Header handles present at a frame (from the low bracketing tick).
    pub fn headers(&self, frame: f64) -> Result<Vec<String>> {
        Ok(self.low_slot(frame)?.cache.lock().headers())
    }

    /// Attribute handles of one object at a frame.
    pub fn attributes(&self, frame: f64, obj: &str) -> Result<Vec<String>> {
        self.low_slot(frame)?.cache.lock().attributes(obj)
    }

    /// Attribute handles of one object matching a regex, at a frame.
    pub fn attributes_matching(
        &self,
        frame: f64,
        obj: &str,
        pattern: &str,
    ) -> Result<Vec<String>> {
        self.low_slot(frame)?
            .cache
            .lock()
            .attributes_matching(obj, pattern)
    }

    /// Whether the cache contains the object at a frame.
    pub fn contains(&self, frame: f64, obj: &str) -> Result<bool> {
        Ok(self.low_slot(frame)?.cache.lock().contains(obj))
    }

    /// Whether the cache contains the attribute at a frame.
    pub fn contains_attribute(&self, frame: f64, obj: &str, attr: &str) -> Result<bool> {
        Ok(self
            .low_slot(frame)?
            .cache
            .lock()
            .contains_attribute(obj, attr))
    }

    // Ticks whose files one value-bearing read needs, plus the fractional
    // offset and the index of the primary (nearest-fallback) sample.
    fn plan(&self, frame: f64) -> (Vec<i64>, f64, usize) {
        let (low, _high, x) = self.calculator.tick_interval(frame);
        let step = self.calculator.tick_step();
        if x == 0.0 || self.interpolation == Interpolation::None {
            return (vec![low], 0.0, 0);
        }
        match self.interpolation {
            Interpolation::Linear => (vec![low, low + step], x, 0),
            Interpolation::Cubic => (
                vec![low - step, low, low + step, low + 2 * step],
                x,
                1,
            ),
            Interpolation::None => unreachable!("handled above"),
        }
    }

    fn read_samples(
        &self,
        frame: f64,
        read_one: impl Fn(&AttributeCache) -> Result<Value>,
    ) -> Result<Value> {
        let (ticks, x, primary) = self.plan(frame);

        let mut slots = Vec::with_capacity(ticks.len());
        for tick in &ticks {
            slots.push(self.fetch(self.calculator.nearest_tick(*tick))?);
        }

        let mut samples = Vec::with_capacity(slots.len());
        for slot in &slots {
            let cache = slot.cache.lock();
            samples.push(read_one(&cache)?);
        }

        if samples.len() == 1 {
            return Ok(samples.remove(0));
        }

        // No lock is held here; interpolation works on copied values.
        let blended = match self.interpolation {
            Interpolation::Linear => interp::linear(&samples[0], &samples[1], x)?,
            Interpolation::Cubic => {
                interp::cubic(&samples[0], &samples[1], &samples[2], &samples[3], x)?
            }
            Interpolation::None => unreachable!("single sample handled above"),
        };

        Ok(match blended {
            Some(value) => value,
            None => samples.swap_remove(primary),
        })
    }

    fn low_slot(&self, frame: f64) -> Result<Arc<CacheSlot>> {
        let (low, _, _) = self.calculator.tick_interval(frame);
        self.fetch(low)
    }

    fn fetch(&self, tick: i64) -> Result<Arc<CacheSlot>> {
        let template = self
            .template
            .as_deref()
            .ok_or(Error::PathTemplateNotSet)?;

        let mut pool = self.pool.lock();
        pool.stamp += 1;
        let stamp = pool.stamp;

        if let Some(entry) = pool.entries.get_mut(&tick) {
            entry.last_used = stamp;
            return Ok(entry.slot.clone());
        }

        let path = substitute_tick(template, tick)?;
        debug!(tick, %path, "opening cache file");
        let cache = AttributeCache::open(&path, OpenMode::Read)?;
        let slot = Arc::new(CacheSlot {
            cache: Mutex::new(cache),
        });
        pool.entries.insert(
            tick,
            PoolEntry {
                slot: slot.clone(),
                last_used: stamp,
            },
        );
        pool.evict_down_to(self.max_open_files);
        Ok(slot)
    }
}

// Substitute a tick into a printf-style template: the first "%d" or
// zero-padded "%0Nd" field. A template with no such field is unusable.
fn substitute_tick(template: &str, tick: i64) -> Result<String> {
    let Some(pos) = template.find('%') else {
        return Err(Error::PathTemplateNotSet);
    };
    let spec = &template[pos + 1..];
    let zero_pad = spec.starts_with('0');
    let digits_start = usize::from(zero_pad);
    let digits_len = spec[digits_start..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    let after = digits_start + digits_len;
    if spec.as_bytes().get(after) != Some(&b'd') {
        return Err(Error::PathTemplateNotSet);
    }
    let width: usize = if digits_len > 0 {
        spec[digits_start..after]
            .parse()
            .map_err(|_| Error::PathTemplateNotSet)?
    } else {
        0
    };

    let number = if zero_pad {
        format!("{tick:0width$}")
    } else {
        format!("{tick:width$}")
    };
    Ok(format!(
        "{}{}{}",
        &template[..pos],
        number,
        &spec[after + 1..]
    ))
}
