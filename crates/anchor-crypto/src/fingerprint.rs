//! SHA-256 fingerprints of off-system documents.
//!
//! Credentials are anchored by the SHA-256 digest of their canonical JSON
//! form, which is byte-for-byte what Python's
//! `json.dumps(doc, separators=(',', ':'), sort_keys=True)` emits:
//!
//! - object keys sorted by code point, no insignificant whitespace
//! - strings ASCII-only: anything outside `0x20..=0x7e` becomes a lowercase
//!   `\uXXXX` escape (a surrogate pair above the BMP), except the short
//!   escapes `\b \f \n \r \t`
//! - floats in shortest round-trip form with a `.0` on integral values and
//!   exponent notation (`1e+16`, `1e-05`) outside `1e-4 <= |x| < 1e16`
//!
//! Any party holding the document can recompute the fingerprint and ask the
//! registry whether it was anchored.

use anchor_types::AnchorHash;
use serde::Serialize;
use serde_json::{Number, Value};
use sha2::{Digest, Sha256};

/// Errors from fingerprint computation.
#[derive(Debug, thiserror::Error)]
pub enum FingerprintError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Serialize a JSON value in canonical form.
///
/// Key order is enforced here rather than relying on the map type behind
/// `serde_json::Value`, which may preserve insertion order.
pub fn canonical_json(value: &Value) -> Result<Vec<u8>, FingerprintError> {
    let mut out = Vec::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<(), FingerprintError> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push(b'{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(key, out);
                out.push(b':');
                write_canonical(&map[key], out)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        Value::String(text) => write_string(text, out),
        Value::Number(number) => write_number(number, out),
        scalar => serde_json::to_writer(&mut *out, scalar)?,
    }
    Ok(())
}

fn write_string(text: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in text.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\u{8}' => out.extend_from_slice(b"\\b"),
            '\u{c}' => out.extend_from_slice(b"\\f"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            ' '..='~' => out.push(c as u8),
            _ => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.extend_from_slice(format!("\\u{unit:04x}").as_bytes());
                }
            }
        }
    }
    out.push(b'"');
}

fn write_number(number: &Number, out: &mut Vec<u8>) {
    let text = number.to_string();
    if number.is_f64() {
        if let Some(float) = python_float(&text) {
            out.extend_from_slice(float.as_bytes());
            return;
        }
    }
    out.extend_from_slice(text.as_bytes());
}

/// Rewrite a shortest round-trip float (`1e16`, `1.5e-7`, `0.1`) the way
/// Python's `repr(float)` prints it.
fn python_float(text: &str) -> Option<String> {
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (mantissa, exponent) = match unsigned.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().ok()?),
        None => (unsigned, 0),
    };
    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));

    // Value is 0.DIGITS * 10^point.
    let mut digits = format!("{whole}{fraction}");
    let mut point = i32::try_from(whole.len()).ok()? + exponent;
    let leading = digits.len() - digits.trim_start_matches('0').len();
    digits.drain(..leading);
    point -= i32::try_from(leading).ok()?;
    digits.truncate(digits.trim_end_matches('0').len());
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if digits.is_empty() {
        out.push_str("0.0");
        return Some(out);
    }

    let scientific = point - 1;
    let len = i32::try_from(digits.len()).ok()?;
    if (-4..16).contains(&scientific) {
        if point <= 0 {
            out.push_str("0.");
            out.extend(std::iter::repeat('0').take(point.unsigned_abs() as usize));
            out.push_str(&digits);
        } else if point >= len {
            out.push_str(&digits);
            out.extend(std::iter::repeat('0').take((point - len) as usize));
            out.push_str(".0");
        } else {
            let (head, tail) = digits.split_at(point as usize);
            out.push_str(head);
            out.push('.');
            out.push_str(tail);
        }
    } else {
        let (head, tail) = digits.split_at(1);
        out.push_str(head);
        if !tail.is_empty() {
            out.push('.');
            out.push_str(tail);
        }
        let sign = if scientific < 0 { '-' } else { '+' };
        out.push_str(&format!("e{sign}{:02}", scientific.unsigned_abs()));
    }
    Some(out)
}

/// SHA-256 of raw bytes as an anchorable hash.
pub fn fingerprint_bytes(data: &[u8]) -> AnchorHash {
    AnchorHash::from_array(Sha256::digest(data).into())
}

/// SHA-256 of the canonical JSON form of any serializable document.
pub fn fingerprint_json<T: Serialize>(document: &T) -> Result<AnchorHash, FingerprintError> {
    let value = serde_json::to_value(document)?;
    Ok(fingerprint_bytes(&canonical_json(&value)?))
}
