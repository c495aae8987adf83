use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value as JsonValue;

use crate::archive;

use super::fits;
use super::model::{LightCurve, MetaValue};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a light curve from a local file. Dispatch by extension.
///
/// Supported formats:
/// * `.fits` – archive file (empty primary HDU + one BINTABLE)
/// * `.csv`  – flat export: header row `Time,Flux,FluxUncertainty,Weight`
/// * `.json` – flat export: `{ "time": [...], "flux": [...],
///   "flux_uncertainty": [...], "weight": [...], ...meta }`
pub fn load_file(path: &Path) -> Result<LightCurve> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let mut curve = match ext.as_str() {
        "fits" | "fit" => load_fits(path)?,
        "csv" => load_csv(path)?,
        "json" => load_json(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    // Files named by the archive convention carry their own provenance.
    if let Some(key) = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(archive::parse_object_key)
    {
        archive::annotate(&mut curve, &key);
    }
    Ok(curve)
}

// ---------------------------------------------------------------------------
// FITS loader
// ---------------------------------------------------------------------------

fn load_fits(path: &Path) -> Result<LightCurve> {
    let bytes = std::fs::read(path).context("reading FITS file")?;
    let curve = fits::read_lightcurve(&bytes)
        .with_context(|| format!("decoding {}", path.display()))?;
    Ok(curve)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row naming the four archive columns (any order),
/// one photometric point per record.
fn load_csv(path: &Path) -> Result<LightCurve> {
    let file = std::fs::File::open(path).context("opening CSV")?;
    load_csv_reader(file)
}

fn load_csv_reader<R: Read>(input: R) -> Result<LightCurve> {
    let mut reader = csv::Reader::from_reader(input);
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let column = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("CSV missing '{name}' column"))
    };
    let time_idx = column(fits::COLUMN_TIME)?;
    let flux_idx = column(fits::COLUMN_FLUX)?;
    let uncertainty_idx = column(fits::COLUMN_FLUX_UNCERTAINTY)?;
    let weight_idx = column(fits::COLUMN_WEIGHT)?;

    let mut curve = LightCurve::default();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let field = |idx: usize, name: &str| -> Result<f64> {
            let raw = record.get(idx).unwrap_or("").trim();
            raw.parse()
                .with_context(|| format!("Row {row_no}, {name}: '{raw}' is not a number"))
        };
        curve.time.push(field(time_idx, fits::COLUMN_TIME)?);
        curve.flux.push(field(flux_idx, fits::COLUMN_FLUX)?);
        curve
            .flux_uncertainty
            .push(field(uncertainty_idx, fits::COLUMN_FLUX_UNCERTAINTY)?);
        curve.weight.push(field(weight_idx, fits::COLUMN_WEIGHT)?);
    }
    Ok(curve)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema: one object per file, the four column arrays in
/// snake_case plus optional scalar metadata fields:
///
/// ```json
/// {
///   "time": [59000.5, 59001.5],
///   "flux": [12.0, 13.5],
///   "flux_uncertainty": [0.5, 0.75],
///   "weight": [1.0, 0.25],
///   "asteroid": "ceres",
///   "array": "pa5",
///   "frequency": "f150"
/// }
/// ```
fn load_json(path: &Path) -> Result<LightCurve> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    parse_json(&text)
}

fn parse_json(text: &str) -> Result<LightCurve> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;
    let obj = root.as_object().context("expected a top-level JSON object")?;

    let array = |name: &str| -> Result<Vec<f64>> {
        let arr = obj
            .get(name)
            .and_then(|v| v.as_array())
            .with_context(|| format!("missing or invalid '{name}' array"))?;
        arr.iter()
            .enumerate()
            .map(|(j, v)| {
                v.as_f64()
                    .with_context(|| format!("{name}[{j}]: not a number"))
            })
            .collect()
    };

    let mut curve = LightCurve {
        time: array("time")?,
        flux: array("flux")?,
        flux_uncertainty: array("flux_uncertainty")?,
        weight: array("weight")?,
        ..Default::default()
    };

    let n = curve.time.len();
    for (name, len) in [
        ("flux", curve.flux.len()),
        ("flux_uncertainty", curve.flux_uncertainty.len()),
        ("weight", curve.weight.len()),
    ] {
        if len != n {
            bail!("'{name}' has {len} values but 'time' has {n}");
        }
    }

    const COLUMNS: &[&str] = &["time", "flux", "flux_uncertainty", "weight"];
    for (key, val) in obj {
        if COLUMNS.contains(&key.as_str()) {
            continue;
        }
        curve.metadata.insert(key.clone(), json_to_meta(val));
    }
    Ok(curve)
}

fn json_to_meta(val: &JsonValue) -> MetaValue {
    match val {
        JsonValue::String(s) => MetaValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetaValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetaValue::Float(f)
            } else {
                MetaValue::String(n.to_string())
            }
        }
        JsonValue::Null => MetaValue::Null,
        other => MetaValue::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_columns_may_appear_in_any_order() {
        let text = "Flux,Time,Weight,FluxUncertainty\n12.0,59000.5,1.0,0.5\n13.5,59001.5,0.25,0.75\n";
        let curve = load_csv_reader(text.as_bytes()).unwrap();
        assert_eq!(curve.time, vec![59000.5, 59001.5]);
        assert_eq!(curve.flux, vec![12.0, 13.5]);
        assert_eq!(curve.flux_uncertainty, vec![0.5, 0.75]);
        assert_eq!(curve.weight, vec![1.0, 0.25]);
    }

    #[test]
    fn csv_missing_column_is_named_in_the_error() {
        let text = "Time,Flux,Weight\n59000.5,12.0,1.0\n";
        let err = load_csv_reader(text.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("FluxUncertainty"));
    }

    #[test]
    fn csv_bad_number_reports_row_and_column() {
        let text = "Time,Flux,FluxUncertainty,Weight\n59000.5,twelve,0.5,1.0\n";
        let err = load_csv_reader(text.as_bytes()).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("Flux"), "unexpected error: {msg}");
        assert!(msg.contains("twelve"), "unexpected error: {msg}");
    }

    #[test]
    fn json_object_with_metadata() {
        let text = r#"{
            "time": [59000.5],
            "flux": [12.0],
            "flux_uncertainty": [0.5],
            "weight": [1.0],
            "asteroid": "ceres",
            "orbit_class": "MBA",
            "number": 1
        }"#;
        let curve = parse_json(text).unwrap();
        assert_eq!(curve.len(), 1);
        assert_eq!(
            curve.metadata.get("asteroid"),
            Some(&MetaValue::String("ceres".into()))
        );
        assert_eq!(curve.metadata.get("number"), Some(&MetaValue::Integer(1)));
        assert!(!curve.metadata.contains_key("time"));
    }

    #[test]
    fn json_mismatched_lengths_rejected() {
        let text = r#"{
            "time": [59000.5, 59001.5],
            "flux": [12.0],
            "flux_uncertainty": [0.5],
            "weight": [1.0]
        }"#;
        let err = parse_json(text).unwrap_err();
        assert!(err.to_string().contains("flux"));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = load_file(Path::new("lightcurve.xlsx")).unwrap_err();
        assert!(err.to_string().contains(".xlsx"));
    }
}
