use std::time::Duration;

use crate::data::fits;
use crate::data::model::{LightCurve, MetaValue};

// ---------------------------------------------------------------------------
// Archive naming convention
// ---------------------------------------------------------------------------

/// Base URL of the public light-curve bucket (anonymous HTTPS GET).
pub const ARCHIVE_BASE_URL: &str =
    "https://cmb-act.s3.amazonaws.com/dr6_asteroid_lightcurves";

/// Detector arrays the archive publishes light curves for.
pub const ARRAYS: &[&str] = &["pa4", "pa5", "pa6"];

/// Frequency bands the archive publishes light curves for.
pub const FREQUENCIES: &[&str] = &["f090", "f150", "f220"];

/// Result type for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("asteroid name is empty")]
    EmptyName,

    #[error("no light curve in the archive for {0} (HTTP 404)")]
    NotFound(String),

    #[error("HTTP {status} fetching {key}")]
    Http { key: String, status: u16 },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("decoding {key}: {source}")]
    Fits {
        key: String,
        #[source]
        source: fits::FitsError,
    },
}

/// Identifies one light-curve file in the archive.
///
/// The archive stores one FITS file per (asteroid, array, frequency)
/// combination under the deterministic key
/// `{slug}_lc_{array}_{frequency}.fits`, e.g. `2005 UD` observed with
/// array `pa5` at `f150` lives at `2005_ud_lc_pa5_f150.fits`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightCurveKey {
    /// Asteroid designation as the user typed it (e.g. "Ceres", "2005 UD").
    pub name: String,
    /// Detector array identifier (e.g. "pa5").
    pub array: String,
    /// Frequency band identifier (e.g. "f150").
    pub frequency: String,
}

impl LightCurveKey {
    pub fn new(name: &str, array: &str, frequency: &str) -> Self {
        Self {
            name: name.to_string(),
            array: array.to_string(),
            frequency: frequency.to_string(),
        }
    }

    /// Object key inside the bucket. Pure and deterministic: the same
    /// (name, array, frequency) always yields the same key.
    pub fn object_key(&self) -> String {
        format!("{}_lc_{}_{}.fits", slug(&self.name), self.array, self.frequency)
    }

    /// Full URL of the file.
    pub fn url(&self) -> String {
        format!("{}/{}", ARCHIVE_BASE_URL, self.object_key())
    }
}

/// Normalise an asteroid designation for use in an object key:
/// trim, lowercase, and collapse internal whitespace runs to a single `_`.
pub fn slug(name: &str) -> String {
    name.trim()
        .split_whitespace()
        .map(|part| part.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Inverse of [`LightCurveKey::object_key`] for file names that follow the
/// convention, e.g. `2005_ud_lc_pa5_f150.fits`. Returns `None` for names
/// that do not match.
pub fn parse_object_key(file_name: &str) -> Option<LightCurveKey> {
    let stem = file_name.strip_suffix(".fits")?;
    // The slug may itself contain underscores, so split from the right.
    let (rest, frequency) = stem.rsplit_once('_')?;
    let (rest, array) = rest.rsplit_once('_')?;
    let name = rest.strip_suffix("_lc")?;
    if name.is_empty() || array.is_empty() || frequency.is_empty() {
        return None;
    }
    Some(LightCurveKey::new(name, array, frequency))
}

// ---------------------------------------------------------------------------
// Retrieval
// ---------------------------------------------------------------------------

const USER_AGENT: &str = concat!("rusty-ceres/", env!("CARGO_PKG_VERSION"));
const FETCH_TIMEOUT_SECS: u64 = 60;

/// Download and decode one light curve from the archive.
///
/// Blocking; callers that care about responsiveness (the UI) run this on
/// a worker thread. No retries or caching: a failure is reported and the
/// user can simply fetch again.
pub fn fetch(key: &LightCurveKey) -> ArchiveResult<LightCurve> {
    if slug(&key.name).is_empty() {
        return Err(ArchiveError::EmptyName);
    }

    let object_key = key.object_key();
    let url = key.url();
    log::info!("Fetching {url}");

    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
        .build()?;

    let response = client.get(&url).send()?;
    let status = response.status();

    if status.as_u16() == 404 {
        return Err(ArchiveError::NotFound(object_key));
    }
    if !status.is_success() {
        return Err(ArchiveError::Http {
            key: object_key,
            status: status.as_u16(),
        });
    }

    let bytes = response.bytes()?;
    log::debug!("Retrieved {object_key}: {} bytes", bytes.len());

    let mut curve = fits::read_lightcurve(&bytes).map_err(|source| ArchiveError::Fits {
        key: object_key.clone(),
        source,
    })?;
    annotate(&mut curve, key);
    Ok(curve)
}

/// Record where a curve came from so the viewer can filter and color by it.
/// Header keywords win over the key the user typed, when present.
pub fn annotate(curve: &mut LightCurve, key: &LightCurveKey) {
    let meta = &mut curve.metadata;
    meta.entry("asteroid".to_string())
        .or_insert_with(|| MetaValue::String(slug(&key.name)));
    meta.entry("array".to_string())
        .or_insert_with(|| MetaValue::String(key.array.clone()));
    meta.entry("frequency".to_string())
        .or_insert_with(|| MetaValue::String(key.frequency.clone()));
}
