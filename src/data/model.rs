use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ---------------------------------------------------------------------------
// MetaValue – a single per-curve metadata entry
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value (archive keys, FITS header keywords).
/// Used as `BTreeMap` / `BTreeSet` elements downstream, so it must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    String(String),
    Integer(i64),
    Float(f64),
    Null,
}

// -- Manual Eq/Ord so MetaValue can live in a BTreeSet despite the f64 --

impl Eq for MetaValue {}

impl PartialOrd for MetaValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetaValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use MetaValue::*;
        fn discriminant(v: &MetaValue) -> u8 {
            match v {
                Null => 0,
                Integer(_) => 1,
                Float(_) => 2,
                String(_) => 3,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::String(s) => write!(f, "{s}"),
            MetaValue::Integer(i) => write!(f, "{i}"),
            MetaValue::Float(v) => write!(f, "{v:.4}"),
            MetaValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetaValue {
    /// Interpret the value as `f64` for numeric colour gradients.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Float(v) => Some(*v),
            MetaValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// LightCurve – one archive file
// ---------------------------------------------------------------------------

/// One asteroid light curve: the four archive columns plus provenance.
///
/// The four vectors always have the same length (they come from one
/// binary-table extension with a single row count).
#[derive(Debug, Clone, Default)]
pub struct LightCurve {
    /// Observation epochs (`Time` column).
    pub time: Vec<f64>,
    /// Measured flux (`Flux` column).
    pub flux: Vec<f64>,
    /// 1-sigma flux uncertainty (`FluxUncertainty` column).
    pub flux_uncertainty: Vec<f64>,
    /// Per-point statistical weight (`Weight` column).
    pub weight: Vec<f64>,
    /// Unit of the time axis, from `TUNIT` (e.g. "MJD").
    pub time_unit: Option<String>,
    /// Unit of the flux axis, from `TUNIT` (e.g. "mJy").
    pub flux_unit: Option<String>,
    /// Provenance: asteroid / array / frequency, plus header keywords.
    pub metadata: BTreeMap<String, MetaValue>,
}

impl LightCurve {
    /// Number of photometric points.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Largest weight in the curve (0.0 for an empty curve).
    pub fn max_weight(&self) -> f64 {
        self.weight.iter().cloned().fold(0.0, f64::max)
    }

    /// Short human-readable label, e.g. "ceres pa5/f150".
    pub fn label(&self) -> String {
        let get = |k: &str| self.metadata.get(k).map(MetaValue::to_string);
        match (get("asteroid"), get("array"), get("frequency")) {
            (Some(n), Some(a), Some(f)) => format!("{n} {a}/{f}"),
            (Some(n), _, _) => n,
            _ => "light curve".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// LightCurveSet – all curves currently loaded in the viewer
// ---------------------------------------------------------------------------

/// The loaded curves with pre-computed metadata column indices.
#[derive(Debug, Clone, Default)]
pub struct LightCurveSet {
    /// All loaded curves.
    pub curves: Vec<LightCurve>,
    /// Ordered list of metadata column names seen across curves.
    pub column_names: Vec<String>,
    /// For each metadata column the sorted set of unique values.
    pub unique_values: BTreeMap<String, BTreeSet<MetaValue>>,
}

impl LightCurveSet {
    pub fn from_curves(curves: Vec<LightCurve>) -> Self {
        let mut set = LightCurveSet {
            curves,
            ..Default::default()
        };
        set.rebuild_index();
        set
    }

    /// Append a curve and refresh the column index.
    pub fn push(&mut self, curve: LightCurve) {
        self.curves.push(curve);
        self.rebuild_index();
    }

    fn rebuild_index(&mut self) {
        let mut column_names_set: BTreeSet<String> = BTreeSet::new();
        let mut unique_values: BTreeMap<String, BTreeSet<MetaValue>> = BTreeMap::new();

        for curve in &self.curves {
            for (col, val) in &curve.metadata {
                column_names_set.insert(col.clone());
                unique_values
                    .entry(col.clone())
                    .or_default()
                    .insert(val.clone());
            }
        }
        self.column_names = column_names_set.into_iter().collect();
        self.unique_values = unique_values;
    }

    /// Number of loaded curves.
    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }
}
