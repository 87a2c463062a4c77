//! Precision-preserving JSON codec.
//!
//! `serde_json` is built with `arbitrary_precision`, so every number token is
//! kept as the digits it arrived with. The helpers here read those digits as
//! exact integers and refuse anything that would have to be rounded.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Number, Value};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected an integer, got `{0}`")]
    NotAnInteger(String),

    #[error("integer `{literal}` does not fit {target}")]
    OutOfRange {
        literal: String,
        target: &'static str,
    },
}

/// Serializes a payload for the wire.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(value)?)
}

/// Parses a payload from the wire.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, CodecError> {
    Ok(serde_json::from_str(text)?)
}

fn is_integer_literal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Reads a number token as an exact integer.
pub fn exact_integer(number: &Number) -> Result<i128, CodecError> {
    let literal = number.to_string();
    if !is_integer_literal(&literal) {
        return Err(CodecError::NotAnInteger(literal));
    }
    literal.parse::<i128>().map_err(|_| CodecError::OutOfRange {
        literal,
        target: "i128",
    })
}

/// Reads a signed 64-bit value from a number token or a quoted digit string.
pub fn exact_i64(value: &Value) -> Result<i64, CodecError> {
    let wide = match value {
        Value::Number(n) => exact_integer(n)?,
        Value::String(s) if is_integer_literal(s) => {
            s.parse::<i128>().map_err(|_| CodecError::OutOfRange {
                literal: s.clone(),
                target: "i128",
            })?
        }
        other => return Err(CodecError::NotAnInteger(other.to_string())),
    };
    i64::try_from(wide).map_err(|_| CodecError::OutOfRange {
        literal: wide.to_string(),
        target: "i64",
    })
}

/// Rejects any integer token in `value` that fits neither `i64` nor `u64`.
pub fn ensure_exact(value: &Value) -> Result<(), CodecError> {
    match value {
        Value::Number(n) => {
            let literal = n.to_string();
            if is_integer_literal(&literal) && !n.is_i64() && !n.is_u64() {
                return Err(CodecError::OutOfRange {
                    literal,
                    target: "i64 or u64",
                });
            }
            Ok(())
        }
        Value::Array(items) => items.iter().try_for_each(ensure_exact),
        Value::Object(map) => map.values().try_for_each(ensure_exact),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Expiry {
        seconds: i64,
    }

    #[test]
    fn test_i64_extremes_on_the_wire() {
        let text = encode(&json!({ "expirationTime": i64::MAX })).unwrap();
        assert_eq!(text, r#"{"expirationTime":9223372036854775807}"#);

        let text = encode(&Expiry { seconds: i64::MIN }).unwrap();
        assert_eq!(text, r#"{"seconds":-9223372036854775808}"#);
        let back: Expiry = decode(&text).unwrap();
        assert_eq!(back.seconds, i64::MIN);
    }

    #[test]
    fn test_value_keeps_digits() {
        let value: Value =
            decode(r#"{"n":9223372036854775807,"big":123456789012345678901234567890}"#).unwrap();
        assert_eq!(exact_i64(&value["n"]).unwrap(), i64::MAX);
        assert_eq!(
            exact_integer(value["big"].as_number().unwrap()).unwrap(),
            123456789012345678901234567890
        );
    }

    #[test]
    fn test_exact_i64_rejects_overflow_and_fractions() {
        let value: Value = decode(r#"[9223372036854775808, 1.5, 1e3, "-42", "x"]"#).unwrap();
        assert!(matches!(
            exact_i64(&value[0]),
            Err(CodecError::OutOfRange { target: "i64", .. })
        ));
        assert!(matches!(exact_i64(&value[1]), Err(CodecError::NotAnInteger(_))));
        assert!(matches!(exact_i64(&value[2]), Err(CodecError::NotAnInteger(_))));
        assert_eq!(exact_i64(&value[3]).unwrap(), -42);
        assert!(exact_i64(&value[4]).is_err());
    }

    #[test]
    fn test_ensure_exact_walks_nested_payloads() {
        let ok: Value =
            decode(r#"{"a":[18446744073709551615,-9223372036854775808,0.25]}"#).unwrap();
        assert!(ensure_exact(&ok).is_ok());

        let bad: Value = decode(r#"{"a":{"b":[1,18446744073709551616]}}"#).unwrap();
        assert!(ensure_exact(&bad).is_err());
    }

    proptest! {
        #[test]
        fn prop_i64_round_trip(v in (i64::MIN + 1)..=i64::MAX) {
            let text = encode(&json!({ "v": v })).unwrap();
            let value: Value = decode(&text).unwrap();
            prop_assert_eq!(exact_i64(&value["v"]).unwrap(), v);

            let typed: Expiry = decode(&encode(&Expiry { seconds: v }).unwrap()).unwrap();
            prop_assert_eq!(typed.seconds, v);
        }
    }
}
