//! Receipt payload decoding
//!
//! The frontend already renders ESC/POS bytes, so decoding is a plain
//! base64 → bytes conversion today. The printer type is threaded through
//! so per-model transcoding can be added here without touching callers.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Serialize, Serializer};

use crate::error::DecodeError;

/// Printer model hint sent by the frontend (`tipoImpressora`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterType {
    EpsonTmT20,
    Daruma800,
    GenericEscPos,
    /// Unknown kinds are accepted and treated as generic ESC/POS
    Other(String),
}

impl PrinterType {
    pub fn as_str(&self) -> &str {
        match self {
            PrinterType::EpsonTmT20 => "EPSON_TM_T20",
            PrinterType::Daruma800 => "DARUMA_800",
            PrinterType::GenericEscPos => "GENERIC_ESCPOS",
            PrinterType::Other(s) => s,
        }
    }
}

impl From<&str> for PrinterType {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "EPSON_TM_T20" => PrinterType::EpsonTmT20,
            "DARUMA_800" => PrinterType::Daruma800,
            "GENERIC_ESCPOS" => PrinterType::GenericEscPos,
            _ => PrinterType::Other(s.trim().to_string()),
        }
    }
}

impl FromStr for PrinterType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(PrinterType::from(s))
    }
}

impl fmt::Display for PrinterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PrinterType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Decode a base64 receipt payload into raw printer bytes
///
/// Line breaks and other ASCII whitespace inside the payload are ignored,
/// matching what browsers produce when wrapping long base64 strings.
pub fn decode_payload(data: &str, printer_type: &PrinterType) -> Result<Vec<u8>, DecodeError> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(DecodeError::Empty);
    }

    let bytes = STANDARD.decode(compact.as_bytes())?;

    // All supported models take the frontend's ESC/POS bytes as-is.
    match printer_type {
        PrinterType::EpsonTmT20
        | PrinterType::Daruma800
        | PrinterType::GenericEscPos
        | PrinterType::Other(_) => Ok(bytes),
    }
}

/// Encode raw bytes back to the wire representation
pub fn encode_payload(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hello() {
        let bytes = decode_payload("SGVsbG8=", &PrinterType::EpsonTmT20).unwrap();
        assert_eq!(bytes, b"Hello");
    }

    #[test]
    fn test_decode_keeps_escpos_bytes() {
        // ESC @ + "Ol\xe1" + GS V 0
        let raw = [0x1B, 0x40, b'O', b'l', 0xE1, 0x1D, 0x56, 0x00];
        let encoded = encode_payload(&raw);
        let decoded = decode_payload(&encoded, &PrinterType::Daruma800).unwrap();
        assert_eq!(decoded, raw);
        assert_eq!(encode_payload(&decoded), encoded);
    }

    #[test]
    fn test_decode_ignores_line_wrapping() {
        let bytes = decode_payload("SGVs\r\nbG8=\n", &PrinterType::GenericEscPos).unwrap();
        assert_eq!(bytes, b"Hello");
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let err = decode_payload("not base64!!", &PrinterType::GenericEscPos).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidBase64(_)));
    }

    #[test]
    fn test_decode_rejects_empty() {
        let err = decode_payload("  \n ", &PrinterType::GenericEscPos).unwrap_err();
        assert!(matches!(err, DecodeError::Empty));
    }

    #[test]
    fn test_printer_type_parsing() {
        assert_eq!("EPSON_TM_T20".parse::<PrinterType>().unwrap(), PrinterType::EpsonTmT20);
        assert_eq!(PrinterType::from("daruma_800"), PrinterType::Daruma800);
        assert_eq!(
            PrinterType::from(" BEMATECH_MP4200 "),
            PrinterType::Other("BEMATECH_MP4200".into())
        );
        assert_eq!(PrinterType::GenericEscPos.to_string(), "GENERIC_ESCPOS");
    }
}
