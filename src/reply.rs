//! Text encoding of readings on the outbound topic.

use core::fmt::Write;

use log::warn;

/// Published instead of a number when the sensor could not be read.
pub const FAILURE_PAYLOAD: &str = "error";

/// Fits any `f32` rendered with two decimals.
pub const READING_CAPACITY: usize = 64;

pub type Reading = heapless::String<READING_CAPACITY>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReplyError {
    #[error("scale reported a sensor fault")]
    SensorFault,
    #[error("reply is not a decimal number")]
    Malformed,
}

/// Format a weight with two fractional digits.
pub fn format_reading(weight: f32) -> Reading {
    let mut text = Reading::new();
    // the widest value, -f32::MAX, takes 43 bytes
    if write!(text, "{:.2}", weight).is_err() {
        warn!("reading {} does not fit the reply buffer", weight);
        text.clear();
    }
    text
}

pub fn parse_reading(text: &str) -> Result<f32, ReplyError> {
    let text = text.trim();
    if text == FAILURE_PAYLOAD {
        return Err(ReplyError::SensorFault);
    }
    text.parse().map_err(|_| ReplyError::Malformed)
}

pub fn parse_payload(payload: &[u8]) -> Result<f32, ReplyError> {
    let text = core::str::from_utf8(payload).map_err(|_| ReplyError::Malformed)?;
    parse_reading(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_decimals() {
        assert_eq!(format_reading(10.0), "10.00");
        assert_eq!(format_reading(0.004), "0.00");
        assert_eq!(format_reading(-3.456), "-3.46");
        assert_eq!(format_reading(1234.5), "1234.50");
    }

    #[test]
    fn extremes_fit() {
        let widest = format_reading(-f32::MAX);
        assert_eq!(widest.len(), 43);
        assert!(widest.starts_with("-340282346"));
        assert!(widest.ends_with(".00"));
        assert_eq!(format_reading(f32::NAN), "NaN");
    }

    #[test]
    fn parses_what_the_scale_sends() {
        assert_eq!(parse_reading("10.00"), Ok(10.0));
        assert_eq!(parse_reading(" -3.46\n"), Ok(-3.46));
        assert_eq!(parse_payload(b"1234.50"), Ok(1234.5));
    }

    #[test]
    fn rejects_faults_and_garbage() {
        assert_eq!(parse_reading(FAILURE_PAYLOAD), Err(ReplyError::SensorFault));
        assert_eq!(parse_reading("ten grams"), Err(ReplyError::Malformed));
        assert_eq!(parse_reading(""), Err(ReplyError::Malformed));
        assert_eq!(parse_payload(&[0xFF, 0x31]), Err(ReplyError::Malformed));
    }
}
