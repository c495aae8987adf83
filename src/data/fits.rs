//! Minimal FITS binary-table support for the light-curve archive.
//!
//! Archive files are small and uniform: an empty primary HDU followed by
//! one `BINTABLE` extension holding the four scalar columns `Time`,
//! `Flux`, `FluxUncertainty` and `Weight`. Only that subset is handled
//! here: no images, no ASCII tables, no variable-length arrays, no
//! `TSCAL`/`TZERO` scaling. Integer and single-precision columns are
//! widened to `f64` on read.

use std::collections::BTreeMap;

use byteorder::{BigEndian, ByteOrder};

use super::model::{LightCurve, MetaValue};

/// FITS files are laid out in 2880-byte blocks of 80-character cards.
const BLOCK: usize = 2880;
const CARD: usize = 80;
const CARDS_PER_BLOCK: usize = BLOCK / CARD;

/// The mandatory archive columns, in the order the writer emits them.
pub const COLUMN_TIME: &str = "Time";
pub const COLUMN_FLUX: &str = "Flux";
pub const COLUMN_FLUX_UNCERTAINTY: &str = "FluxUncertainty";
pub const COLUMN_WEIGHT: &str = "Weight";

pub type FitsResult<T> = Result<T, FitsError>;

#[derive(Debug, thiserror::Error)]
pub enum FitsError {
    #[error("file truncated at byte {0}")]
    Truncated(usize),

    #[error("not a FITS file (first card is not SIMPLE)")]
    NotFits,

    #[error("no BINTABLE extension found")]
    NoTable,

    #[error("missing required keyword {0}")]
    MissingKeyword(String),

    #[error("keyword {keyword} has invalid value '{value}'")]
    BadKeyword { keyword: String, value: String },

    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("column '{column}' has unsupported format '{format}'")]
    UnsupportedFormat { column: String, format: String },
}

// ---------------------------------------------------------------------------
// Header cards
// ---------------------------------------------------------------------------

/// One parsed FITS header: keyword → raw value text (comment stripped,
/// string values unquoted).
#[derive(Debug, Default)]
struct Header {
    cards: BTreeMap<String, String>,
}

impl Header {
    fn get(&self, keyword: &str) -> Option<&str> {
        self.cards.get(keyword).map(String::as_str)
    }

    fn get_usize(&self, keyword: &str) -> FitsResult<usize> {
        let raw = self
            .get(keyword)
            .ok_or_else(|| FitsError::MissingKeyword(keyword.to_string()))?;
        raw.parse().map_err(|_| FitsError::BadKeyword {
            keyword: keyword.to_string(),
            value: raw.to_string(),
        })
    }

    fn get_usize_or(&self, keyword: &str, default: usize) -> FitsResult<usize> {
        match self.get(keyword) {
            Some(raw) => raw.parse().map_err(|_| FitsError::BadKeyword {
                keyword: keyword.to_string(),
                value: raw.to_string(),
            }),
            None => Ok(default),
        }
    }

    /// Byte length of the data unit following this header (block padding
    /// excluded). Uses the general FITS rule
    /// `|BITPIX|/8 * GCOUNT * (PCOUNT + NAXIS1*…*NAXISn)`.
    fn data_len(&self) -> FitsResult<usize> {
        let naxis = self.get_usize_or("NAXIS", 0)?;
        if naxis == 0 {
            return Ok(0);
        }
        // BITPIX can be negative (IEEE float images); only its magnitude
        // matters for sizing.
        let bitpix_raw = self.get("BITPIX").unwrap_or("8");
        let bitpix: usize = bitpix_raw
            .trim_start_matches('-')
            .parse()
            .map_err(|_| FitsError::BadKeyword {
                keyword: "BITPIX".to_string(),
                value: bitpix_raw.to_string(),
            })?;
        let mut product = 1usize;
        for axis in 1..=naxis {
            product = product.saturating_mul(self.get_usize(&format!("NAXIS{axis}"))?);
        }
        let pcount = self.get_usize_or("PCOUNT", 0)?;
        let gcount = self.get_usize_or("GCOUNT", 1)?.max(1);
        // Saturate rather than overflow on hostile axis values; the
        // resulting length then fails the bounds checks downstream.
        Ok((bitpix / 8)
            .saturating_mul(gcount)
            .saturating_mul(pcount.saturating_add(product)))
    }
}

/// Parse one header starting at `offset`. Returns the header and the
/// offset of the data unit that follows it.
fn parse_header(bytes: &[u8], offset: usize) -> FitsResult<(Header, usize)> {
    let mut header = Header::default();
    let mut pos = offset;

    loop {
        if pos + BLOCK > bytes.len() {
            return Err(FitsError::Truncated(pos));
        }
        let mut saw_end = false;
        for card_idx in 0..CARDS_PER_BLOCK {
            let start = pos + card_idx * CARD;
            let card = &bytes[start..start + CARD];
            let keyword = String::from_utf8_lossy(&card[..8]).trim_end().to_string();
            if keyword == "END" {
                saw_end = true;
                break;
            }
            if keyword.is_empty() || keyword == "COMMENT" || keyword == "HISTORY" {
                continue;
            }
            // Value indicator "= " in columns 9-10.
            if &card[8..10] != b"= " {
                continue;
            }
            let value = parse_card_value(&card[10..]);
            header.cards.entry(keyword).or_insert(value);
        }
        pos += BLOCK;
        if saw_end {
            return Ok((header, pos));
        }
    }
}

/// Extract the value text from the part of a card after `= `. Quoted
/// strings are unquoted ('' is an escaped quote), everything else is the
/// token before the comment separator.
fn parse_card_value(field: &[u8]) -> String {
    let text = String::from_utf8_lossy(field);
    let trimmed = text.trim_start();
    if let Some(rest) = trimmed.strip_prefix('\'') {
        let mut value = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    value.push('\'');
                } else {
                    break;
                }
            } else {
                value.push(c);
            }
        }
        value.trim_end().to_string()
    } else {
        match trimmed.split('/').next() {
            Some(token) => token.trim().to_string(),
            None => String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Binary-table columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    I16,
    I32,
    I64,
    F32,
    F64,
    /// Present in the row layout but not readable as a scalar number.
    Opaque,
}

#[derive(Debug)]
struct Column {
    name: String,
    ty: ColumnType,
    /// Byte offset of the field within a row.
    offset: usize,
    width: usize,
    unit: Option<String>,
}

/// Decode a `TFORM` value into (type, byte width). Repeat counts other
/// than 1 make the field opaque for our purposes but still occupy their
/// bytes in the row.
fn parse_tform(form: &str) -> Option<(ColumnType, usize)> {
    let form = form.trim();
    let split = form.find(|c: char| c.is_ascii_alphabetic())?;
    let repeat: usize = if split == 0 {
        1
    } else {
        form[..split].parse().ok()?
    };
    let letter = form[split..].chars().next()?;
    let unit_width = match letter {
        'L' | 'B' | 'A' => 1,
        'X' => return Some((ColumnType::Opaque, repeat.div_ceil(8))),
        'I' => 2,
        'J' | 'E' => 4,
        'K' | 'D' | 'C' | 'P' => 8,
        'M' | 'Q' => 16,
        _ => return None,
    };
    let ty = if repeat != 1 {
        ColumnType::Opaque
    } else {
        match letter {
            'I' => ColumnType::I16,
            'J' => ColumnType::I32,
            'K' => ColumnType::I64,
            'E' => ColumnType::F32,
            'D' => ColumnType::F64,
            _ => ColumnType::Opaque,
        }
    };
    Some((ty, repeat * unit_width))
}

fn table_columns(header: &Header) -> FitsResult<Vec<Column>> {
    let tfields = header.get_usize("TFIELDS")?;
    let mut columns = Vec::with_capacity(tfields);
    let mut offset = 0usize;

    for i in 1..=tfields {
        let name = header
            .get(&format!("TTYPE{i}"))
            .unwrap_or("")
            .trim()
            .to_string();
        let form = header.get(&format!("TFORM{i}")).unwrap_or("").to_string();
        let (ty, width) = parse_tform(&form).ok_or_else(|| FitsError::UnsupportedFormat {
            column: name.clone(),
            format: form.clone(),
        })?;
        let unit = header
            .get(&format!("TUNIT{i}"))
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        columns.push(Column {
            name,
            ty,
            offset,
            width,
            unit,
        });
        offset += width;
    }
    Ok(columns)
}

fn read_column(
    data: &[u8],
    row_len: usize,
    n_rows: usize,
    column: &Column,
) -> FitsResult<Vec<f64>> {
    let mut values = Vec::with_capacity(n_rows);
    for row in 0..n_rows {
        let at = row * row_len + column.offset;
        let field = &data[at..at + column.width];
        let value = match column.ty {
            ColumnType::I16 => BigEndian::read_i16(field) as f64,
            ColumnType::I32 => BigEndian::read_i32(field) as f64,
            ColumnType::I64 => BigEndian::read_i64(field) as f64,
            ColumnType::F32 => BigEndian::read_f32(field) as f64,
            ColumnType::F64 => BigEndian::read_f64(field),
            ColumnType::Opaque => {
                return Err(FitsError::UnsupportedFormat {
                    column: column.name.clone(),
                    format: format!("{:?}", column.ty),
                })
            }
        };
        values.push(value);
    }
    Ok(values)
}

// ---------------------------------------------------------------------------
// Reading a light curve
// ---------------------------------------------------------------------------

/// Decode an archive file: skip the primary HDU, find the first
/// `BINTABLE` extension, and extract the four archive columns.
pub fn read_lightcurve(bytes: &[u8]) -> FitsResult<LightCurve> {
    let (primary, mut pos) = parse_header(bytes, 0)?;
    if primary.get("SIMPLE") != Some("T") {
        return Err(FitsError::NotFits);
    }
    pos = pos.saturating_add(padded(primary.data_len()?));

    // Walk extensions until the binary table shows up.
    let table = loop {
        if pos >= bytes.len() {
            return Err(FitsError::NoTable);
        }
        let (header, data_pos) = parse_header(bytes, pos)?;
        let data_len = header.data_len()?;
        if header.get("XTENSION") == Some("BINTABLE") {
            break (header, data_pos, data_len);
        }
        pos = data_pos.saturating_add(padded(data_len));
    };
    let (header, data_pos, data_len) = table;

    let row_len = header.get_usize("NAXIS1")?;
    let n_rows = header.get_usize("NAXIS2")?;
    let table_len = row_len.checked_mul(n_rows);
    if data_pos.saturating_add(data_len) > bytes.len()
        || table_len.map_or(true, |len| len > data_len)
    {
        return Err(FitsError::Truncated(bytes.len()));
    }
    let data = &bytes[data_pos..data_pos + data_len];

    let columns = table_columns(&header)?;
    // Row layout must fit inside NAXIS1, or column reads would run past
    // the row boundary.
    let layout_width = columns.last().map_or(0, |c| c.offset + c.width);
    if layout_width > row_len {
        return Err(FitsError::BadKeyword {
            keyword: "NAXIS1".to_string(),
            value: format!("{row_len} (columns span {layout_width} bytes)"),
        });
    }
    let find = |name: &'static str| -> FitsResult<&Column> {
        columns
            .iter()
            .find(|c| c.name == name)
            .ok_or(FitsError::MissingColumn(name))
    };

    let time_col = find(COLUMN_TIME)?;
    let flux_col = find(COLUMN_FLUX)?;
    let uncertainty_col = find(COLUMN_FLUX_UNCERTAINTY)?;
    let weight_col = find(COLUMN_WEIGHT)?;

    let mut curve = LightCurve {
        time: read_column(data, row_len, n_rows, time_col)?,
        flux: read_column(data, row_len, n_rows, flux_col)?,
        flux_uncertainty: read_column(data, row_len, n_rows, uncertainty_col)?,
        weight: read_column(data, row_len, n_rows, weight_col)?,
        time_unit: time_col.unit.clone(),
        flux_unit: flux_col.unit.clone(),
        metadata: BTreeMap::new(),
    };
    header_metadata(&header, &mut curve.metadata);
    Ok(curve)
}

/// Lift the provenance keywords the archive writes into curve metadata.
/// Values go through the same normalization as object keys, so an
/// `OBJECT` of `2005 UD` and a filename-derived `2005_ud` agree.
fn header_metadata(header: &Header, meta: &mut BTreeMap<String, MetaValue>) {
    let keywords = [
        ("OBJECT", "asteroid"),
        ("ARRAY", "array"),
        ("FREQ", "frequency"),
    ];
    for (keyword, column) in keywords {
        if let Some(value) = header.get(keyword) {
            let value = crate::archive::slug(value);
            if !value.is_empty() {
                meta.insert(column.to_string(), MetaValue::String(value));
            }
        }
    }
}

fn padded(len: usize) -> usize {
    len.div_ceil(BLOCK).saturating_mul(BLOCK)
}

// ---------------------------------------------------------------------------
// Writing a light curve
// ---------------------------------------------------------------------------

/// Serialize a light curve the way the archive lays its files out:
/// empty primary HDU, then one `BINTABLE` with four `D` columns.
/// Used by the sample generator and by tests.
pub fn write_lightcurve(curve: &LightCurve) -> Vec<u8> {
    let n_rows = curve.len();
    let row_len = 4 * 8;

    let mut out = Vec::new();

    // Primary HDU: no data, extensions follow.
    let mut cards: Vec<String> = vec![
        card_logical("SIMPLE", true),
        card_int("BITPIX", 8),
        card_int("NAXIS", 0),
        card_logical("EXTEND", true),
    ];
    write_header(&mut out, &mut cards);

    // Binary-table header.
    let mut cards: Vec<String> = vec![
        card_str("XTENSION", "BINTABLE"),
        card_int("BITPIX", 8),
        card_int("NAXIS", 2),
        card_int("NAXIS1", row_len as i64),
        card_int("NAXIS2", n_rows as i64),
        card_int("PCOUNT", 0),
        card_int("GCOUNT", 1),
        card_int("TFIELDS", 4),
    ];
    let names = [
        (COLUMN_TIME, curve.time_unit.as_deref()),
        (COLUMN_FLUX, curve.flux_unit.as_deref()),
        (COLUMN_FLUX_UNCERTAINTY, curve.flux_unit.as_deref()),
        (COLUMN_WEIGHT, None),
    ];
    for (i, (name, unit)) in names.into_iter().enumerate() {
        cards.push(card_str(&format!("TTYPE{}", i + 1), name));
        cards.push(card_str(&format!("TFORM{}", i + 1), "D"));
        if let Some(unit) = unit {
            cards.push(card_str(&format!("TUNIT{}", i + 1), unit));
        }
    }
    for (keyword, column) in [("OBJECT", "asteroid"), ("ARRAY", "array"), ("FREQ", "frequency")] {
        if let Some(value) = curve.metadata.get(column) {
            cards.push(card_str(keyword, &value.to_string()));
        }
    }
    write_header(&mut out, &mut cards);

    // Data unit: rows of four big-endian doubles.
    let data_start = out.len();
    for row in 0..n_rows {
        let mut field = [0u8; 8];
        for value in [
            curve.time[row],
            curve.flux[row],
            curve.flux_uncertainty[row],
            curve.weight[row],
        ] {
            BigEndian::write_f64(&mut field, value);
            out.extend_from_slice(&field);
        }
    }
    let data_len = out.len() - data_start;
    out.resize(data_start + padded(data_len), 0);
    out
}

fn write_header(out: &mut Vec<u8>, cards: &mut Vec<String>) {
    cards.push("END".to_string());
    let start = out.len();
    for card in cards.iter() {
        let mut bytes = card.clone().into_bytes();
        bytes.resize(CARD, b' ');
        out.extend_from_slice(&bytes);
    }
    let header_len = out.len() - start;
    out.resize(start + padded(header_len), b' ');
}

fn card_logical(keyword: &str, value: bool) -> String {
    format!("{keyword:<8}= {:>20}", if value { "T" } else { "F" })
}

fn card_int(keyword: &str, value: i64) -> String {
    format!("{keyword:<8}= {value:>20}")
}

fn card_str(keyword: &str, value: &str) -> String {
    format!("{keyword:<8}= '{value}'")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_curve() -> LightCurve {
        LightCurve {
            time: vec![59000.5, 59001.5, 59002.5],
            flux: vec![12.0, 13.5, 11.25],
            flux_uncertainty: vec![0.5, 0.75, 0.5],
            weight: vec![1.0, 0.25, 0.0],
            time_unit: Some("MJD".to_string()),
            flux_unit: Some("mJy".to_string()),
            metadata: [
                ("asteroid".to_string(), MetaValue::String("ceres".into())),
                ("array".to_string(), MetaValue::String("pa5".into())),
                ("frequency".to_string(), MetaValue::String("f150".into())),
            ]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn roundtrip_preserves_columns_units_and_provenance() {
        let bytes = write_lightcurve(&sample_curve());
        assert_eq!(bytes.len() % BLOCK, 0);

        let curve = read_lightcurve(&bytes).unwrap();
        assert_eq!(curve.time, vec![59000.5, 59001.5, 59002.5]);
        assert_eq!(curve.flux, vec![12.0, 13.5, 11.25]);
        assert_eq!(curve.flux_uncertainty, vec![0.5, 0.75, 0.5]);
        assert_eq!(curve.weight, vec![1.0, 0.25, 0.0]);
        assert_eq!(curve.time_unit.as_deref(), Some("MJD"));
        assert_eq!(curve.flux_unit.as_deref(), Some("mJy"));
        assert_eq!(
            curve.metadata.get("array"),
            Some(&MetaValue::String("pa5".into()))
        );
    }

    #[test]
    fn header_provenance_is_slugged_like_object_keys() {
        let mut curve = sample_curve();
        curve
            .metadata
            .insert("asteroid".to_string(), MetaValue::String("2005 UD".into()));

        let bytes = write_lightcurve(&curve);
        let loaded = read_lightcurve(&bytes).unwrap();
        assert_eq!(
            loaded.metadata.get("asteroid"),
            Some(&MetaValue::String("2005_ud".into()))
        );
    }

    #[test]
    fn rejects_non_fits_input() {
        let mut bytes = write_lightcurve(&sample_curve());
        bytes[0] = b'X'; // clobber the SIMPLE card
        assert!(matches!(read_lightcurve(&bytes), Err(FitsError::NotFits)));
    }

    #[test]
    fn reports_missing_column_by_name() {
        let bytes = write_lightcurve(&sample_curve());
        // Rename Weight in the header text so the reader cannot find it.
        let mut patched = bytes.clone();
        let needle = b"TTYPE4  = 'Weight'";
        let at = patched
            .windows(needle.len())
            .position(|w| w == needle)
            .unwrap();
        patched[at..at + needle.len()].copy_from_slice(b"TTYPE4  = 'Wrong '");
        match read_lightcurve(&patched) {
            Err(FitsError::MissingColumn(name)) => assert_eq!(name, COLUMN_WEIGHT),
            other => panic!("expected MissingColumn, got {other:?}"),
        }
        // The untouched file still reads fine.
        assert!(read_lightcurve(&bytes).is_ok());
    }

    #[test]
    fn truncated_data_is_an_error() {
        let bytes = write_lightcurve(&sample_curve());
        let cut = &bytes[..bytes.len() - BLOCK];
        assert!(matches!(
            read_lightcurve(cut),
            Err(FitsError::Truncated(_))
        ));
    }

    #[test]
    fn huge_axis_values_are_an_error_not_an_overflow() {
        let mut out = Vec::new();
        let mut cards = vec![
            card_logical("SIMPLE", true),
            card_int("BITPIX", 8),
            card_int("NAXIS", 0),
            card_logical("EXTEND", true),
        ];
        write_header(&mut out, &mut cards);

        // Axis sizes near usize::MAX whose product overflows 64 bits.
        let huge = "10000000000000000000";
        let mut cards = vec![
            card_str("XTENSION", "BINTABLE"),
            card_int("BITPIX", 8),
            card_int("NAXIS", 2),
            format!("{:<8}= {huge:>20}", "NAXIS1"),
            format!("{:<8}= {huge:>20}", "NAXIS2"),
            card_int("PCOUNT", 0),
            card_int("GCOUNT", 1),
            card_int("TFIELDS", 1),
            card_str("TTYPE1", COLUMN_TIME),
            card_str("TFORM1", "D"),
        ];
        write_header(&mut out, &mut cards);

        assert!(matches!(
            read_lightcurve(&out),
            Err(FitsError::Truncated(_))
        ));
    }

    #[test]
    fn tform_repeat_and_type_widths() {
        assert_eq!(parse_tform("D"), Some((ColumnType::F64, 8)));
        assert_eq!(parse_tform("1E"), Some((ColumnType::F32, 4)));
        assert_eq!(parse_tform("J"), Some((ColumnType::I32, 4)));
        assert_eq!(parse_tform("10A"), Some((ColumnType::Opaque, 10)));
        assert_eq!(parse_tform("3D"), Some((ColumnType::Opaque, 24)));
        assert_eq!(parse_tform(""), None);
    }

    #[test]
    fn quoted_card_values_unescape() {
        assert_eq!(parse_card_value(b"'BINTABLE'           / ext"), "BINTABLE");
        assert_eq!(parse_card_value(b"'O''Neill '"), "O'Neill");
        assert_eq!(parse_card_value(b"                   42 / n"), "42");
    }

    #[test]
    fn single_precision_columns_widen_to_f64() {
        // Build a one-row table with E (f32) columns by hand.
        let mut out = Vec::new();
        let mut cards = vec![
            card_logical("SIMPLE", true),
            card_int("BITPIX", 8),
            card_int("NAXIS", 0),
            card_logical("EXTEND", true),
        ];
        write_header(&mut out, &mut cards);

        let mut cards = vec![
            card_str("XTENSION", "BINTABLE"),
            card_int("BITPIX", 8),
            card_int("NAXIS", 2),
            card_int("NAXIS1", 16),
            card_int("NAXIS2", 1),
            card_int("PCOUNT", 0),
            card_int("GCOUNT", 1),
            card_int("TFIELDS", 4),
        ];
        for (i, name) in [COLUMN_TIME, COLUMN_FLUX, COLUMN_FLUX_UNCERTAINTY, COLUMN_WEIGHT]
            .into_iter()
            .enumerate()
        {
            cards.push(card_str(&format!("TTYPE{}", i + 1), name));
            cards.push(card_str(&format!("TFORM{}", i + 1), "E"));
        }
        write_header(&mut out, &mut cards);

        let data_start = out.len();
        for value in [59000.5f32, 12.5, 0.5, 1.0] {
            let mut field = [0u8; 4];
            BigEndian::write_f32(&mut field, value);
            out.extend_from_slice(&field);
        }
        let data_len = out.len() - data_start;
        out.resize(data_start + padded(data_len), 0);

        let curve = read_lightcurve(&out).unwrap();
        assert_eq!(curve.time, vec![59000.5]);
        assert_eq!(curve.flux, vec![12.5]);
        assert_eq!(curve.weight, vec![1.0]);
    }
}
