//! Cache layer: per-tick attribute caches and the continuous-time facade.

pub mod attribute;
pub mod interpolated;
pub mod oversamples;
pub mod provenance;

pub use attribute::AttributeCache;
pub use interpolated::{Interpolation, InterpolatedCache};
pub use oversamples::OversamplesCalculator;
