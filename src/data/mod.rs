/// Data layer: core types, FITS decoding, loading, and filtering.
///
/// Architecture:
/// ```text
///  archive bytes / local .fits / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │fits/loader│  decode columns → LightCurve
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │ LightCurveSet │  Vec<LightCurve>, metadata index
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  apply metadata predicates → visible indices
///   └──────────┘
/// ```

pub mod fits;
pub mod filter;
pub mod loader;
pub mod model;
