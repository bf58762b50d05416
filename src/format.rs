//! Parsing and printing helpers for the CLI

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid number '{0}'")]
    Number(String),
    #[error("'{0}' does not fit in {1} bits")]
    Range(String, u32),
    #[error("invalid hex byte '{0}'")]
    HexByte(String),
    #[error("odd number of hex digits in '{0}'")]
    OddLength(String),
}

/// Parse decimal or `0x`-prefixed hex
pub fn parse_int(s: &str) -> Result<u64, ParseError> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| ParseError::Number(s.to_string()))
}

pub fn parse_u8(s: &str) -> Result<u8, ParseError> {
    let value = parse_int(s)?;
    u8::try_from(value).map_err(|_| ParseError::Range(s.to_string(), 8))
}

pub fn parse_u16(s: &str) -> Result<u16, ParseError> {
    let value = parse_int(s)?;
    u16::try_from(value).map_err(|_| ParseError::Range(s.to_string(), 16))
}

/// Parse a byte string: `"01 02 ff"`, `"01,02,ff"` or `"0102ff"`
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, ParseError> {
    let tokens: Vec<&str> = s
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    let mut bytes = Vec::new();
    for token in tokens {
        let token = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        if token.len() <= 2 {
            let byte =
                u8::from_str_radix(token, 16).map_err(|_| ParseError::HexByte(token.to_string()))?;
            bytes.push(byte);
            continue;
        }
        if token.len() % 2 != 0 {
            return Err(ParseError::OddLength(token.to_string()));
        }
        for i in (0..token.len()).step_by(2) {
            let pair = token
                .get(i..i + 2)
                .ok_or_else(|| ParseError::HexByte(token.to_string()))?;
            let byte =
                u8::from_str_radix(pair, 16).map_err(|_| ParseError::HexByte(pair.to_string()))?;
            bytes.push(byte);
        }
    }
    Ok(bytes)
}

/// Space-separated hex on one line
pub fn hex_line(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Offset-prefixed hex dump, 16 bytes per row
pub fn hex_dump(data: &[u8]) -> String {
    data.chunks(16)
        .enumerate()
        .map(|(row, chunk)| format!("{:04x}: {}", row * 16, hex_line(chunk)))
        .collect::<Vec<_>>()
        .join("\n")
}
