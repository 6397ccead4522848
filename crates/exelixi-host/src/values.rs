//! Parsing and line-oriented I/O of scalar values.
//!
//! There is one parse function per type and each reports failure through its
//! `Result`. Integers accept C-style literals: an optional sign followed by
//! decimal, `0x`/`0X` hexadecimal, or leading-`0` octal digits. Surrounding
//! whitespace is ignored. Empty input and trailing characters are errors.

use std::io::{self, BufRead, Write};
use std::num::IntErrorKind;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseValueError {
    #[error("empty input")]
    Empty,
    #[error("invalid {kind} literal: {input:?}")]
    Invalid { input: String, kind: &'static str },
    #[error("{kind} literal out of range: {input:?}")]
    OutOfRange { input: String, kind: &'static str },
    #[error("unexpected end of input")]
    Eof,
    #[error("failed to read value: {0}")]
    Io(#[from] io::Error),
}

fn invalid(input: &str, kind: &'static str) -> ParseValueError {
    ParseValueError::Invalid {
        input: input.to_string(),
        kind,
    }
}

fn out_of_range(input: &str, kind: &'static str) -> ParseValueError {
    ParseValueError::OutOfRange {
        input: input.to_string(),
        kind,
    }
}

/// Split an integer literal into sign and magnitude.
fn parse_magnitude(input: &str, kind: &'static str) -> Result<(bool, u64), ParseValueError> {
    let token = input.trim();
    if token.is_empty() {
        return Err(ParseValueError::Empty);
    }
    let (negative, unsigned) = match token.as_bytes()[0] {
        b'-' => (true, &token[1..]),
        b'+' => (false, &token[1..]),
        _ => (false, token),
    };
    let (radix, digits) = if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        (16, hex)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (8, &unsigned[1..])
    } else {
        (10, unsigned)
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return Err(invalid(token, kind));
    }
    let magnitude = u64::from_str_radix(digits, radix).map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow => out_of_range(token, kind),
        _ => invalid(token, kind),
    })?;
    Ok((negative, magnitude))
}

pub fn parse_int(input: &str) -> Result<i32, ParseValueError> {
    let (negative, magnitude) = parse_magnitude(input, "int")?;
    let value = if negative {
        -i64::try_from(magnitude).map_err(|_| out_of_range(input.trim(), "int"))?
    } else {
        i64::try_from(magnitude).map_err(|_| out_of_range(input.trim(), "int"))?
    };
    i32::try_from(value).map_err(|_| out_of_range(input.trim(), "int"))
}

/// Negative literals are rejected rather than wrapped.
pub fn parse_uint(input: &str) -> Result<u32, ParseValueError> {
    let (negative, magnitude) = parse_magnitude(input, "uint")?;
    if negative && magnitude != 0 {
        return Err(out_of_range(input.trim(), "uint"));
    }
    u32::try_from(magnitude).map_err(|_| out_of_range(input.trim(), "uint"))
}

pub fn parse_float(input: &str) -> Result<f32, ParseValueError> {
    let token = input.trim();
    if token.is_empty() {
        return Err(ParseValueError::Empty);
    }
    token.parse::<f32>().map_err(|_| invalid(token, "float"))
}

pub fn parse_double(input: &str) -> Result<f64, ParseValueError> {
    let token = input.trim();
    if token.is_empty() {
        return Err(ParseValueError::Empty);
    }
    token.parse::<f64>().map_err(|_| invalid(token, "double"))
}

fn read_token<R: BufRead>(reader: &mut R) -> Result<String, ParseValueError> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(ParseValueError::Eof);
    }
    Ok(line)
}

/// Read one line and parse it as an `i32`.
pub fn read_int<R: BufRead>(reader: &mut R) -> Result<i32, ParseValueError> {
    parse_int(&read_token(reader)?)
}

pub fn read_uint<R: BufRead>(reader: &mut R) -> Result<u32, ParseValueError> {
    parse_uint(&read_token(reader)?)
}

pub fn read_float<R: BufRead>(reader: &mut R) -> Result<f32, ParseValueError> {
    parse_float(&read_token(reader)?)
}

pub fn read_double<R: BufRead>(reader: &mut R) -> Result<f64, ParseValueError> {
    parse_double(&read_token(reader)?)
}

pub fn write_int<W: Write>(writer: &mut W, value: i32) -> io::Result<()> {
    writeln!(writer, "{value}")
}

pub fn write_uint<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writeln!(writer, "{value}")
}

/// Six decimals, like C's `%f`.
pub fn write_float<W: Write>(writer: &mut W, value: f32) -> io::Result<()> {
    writeln!(writer, "{value:.6}")
}

pub fn write_double<W: Write>(writer: &mut W, value: f64) -> io::Result<()> {
    writeln!(writer, "{value:.6}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_int_bases() {
        assert_eq!(parse_int("42").unwrap(), 42);
        assert_eq!(parse_int("  -17\n").unwrap(), -17);
        assert_eq!(parse_int("+0x1F").unwrap(), 31);
        assert_eq!(parse_int("0X10").unwrap(), 16);
        assert_eq!(parse_int("010").unwrap(), 8);
        assert_eq!(parse_int("0").unwrap(), 0);
        assert_eq!(parse_int("-8888").unwrap(), -8888);
    }

    #[test]
    fn test_parse_int_limits() {
        assert_eq!(parse_int("-2147483648").unwrap(), i32::MIN);
        assert_eq!(parse_int("2147483647").unwrap(), i32::MAX);
        assert!(matches!(parse_int("2147483648"), Err(ParseValueError::OutOfRange { .. })));
        assert!(matches!(
            parse_int("99999999999999999999999"),
            Err(ParseValueError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_empty_and_whitespace_are_errors() {
        assert!(matches!(parse_int(""), Err(ParseValueError::Empty)));
        assert!(matches!(parse_uint("   \t"), Err(ParseValueError::Empty)));
        assert!(matches!(parse_float("\n"), Err(ParseValueError::Empty)));
        assert!(matches!(parse_double(""), Err(ParseValueError::Empty)));
    }

    #[test]
    fn test_trailing_garbage_is_invalid() {
        for input in ["12abc", "0x", "08", "--1", "+-1", "1 2", "-"] {
            assert!(
                matches!(parse_int(input), Err(ParseValueError::Invalid { .. })),
                "{input:?}"
            );
        }
        assert!(matches!(parse_double("1.5x"), Err(ParseValueError::Invalid { .. })));
    }

    #[test]
    fn test_parse_uint_rejects_negative() {
        assert_eq!(parse_uint("0xFFFFFFFF").unwrap(), u32::MAX);
        assert_eq!(parse_uint("-0").unwrap(), 0);
        assert!(matches!(parse_uint("-1"), Err(ParseValueError::OutOfRange { .. })));
    }

    #[test]
    fn test_parse_floats() {
        assert_eq!(parse_float(" 2.5 ").unwrap(), 2.5);
        assert_eq!(parse_double("-1e-3").unwrap(), -0.001);
    }

    #[test]
    fn test_read_values_line_by_line() {
        let mut input = Cursor::new("7\n0x20\n3.25\n");
        assert_eq!(read_int(&mut input).unwrap(), 7);
        assert_eq!(read_uint(&mut input).unwrap(), 32);
        assert_eq!(read_double(&mut input).unwrap(), 3.25);
        assert!(matches!(read_float(&mut input), Err(ParseValueError::Eof)));
    }

    #[test]
    fn test_write_values() {
        let mut out = Vec::new();
        write_int(&mut out, -3).unwrap();
        write_uint(&mut out, 9).unwrap();
        write_float(&mut out, 1.5).unwrap();
        write_double(&mut out, 0.1).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "-3\n9\n1.500000\n0.100000\n");
    }

    proptest! {
        #[test]
        fn prop_decimal_int_roundtrip(n in any::<i32>()) {
            prop_assert_eq!(parse_int(&n.to_string()).unwrap(), n);
        }

        #[test]
        fn prop_hex_uint_roundtrip(n in any::<u32>()) {
            prop_assert_eq!(parse_uint(&format!("{n:#x}")).unwrap(), n);
        }
    }
}
