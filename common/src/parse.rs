use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The reading lacks the `YES` CRC marker the one-wire driver emits.
    #[error("reading failed CRC validation")]
    InvalidChecksum,
    #[error("reading has no temperature marker")]
    MissingTemperature,
    #[error("temperature payload is not numeric: {0:?}")]
    InvalidNumber(String),
}

/// Parses a raw one-wire slave reading into degrees Celsius.
///
/// Expected shape (two lines from the kernel w1 driver):
///
/// ```text
/// 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
/// 72 01 4b 46 7f ff 0e 10 57 t=23125
/// ```
pub fn parse_w1_reading(raw: &[u8]) -> Result<f64, ParseError> {
    let text = String::from_utf8_lossy(raw);
    if !text.contains("YES") {
        return Err(ParseError::InvalidChecksum);
    }
    let payload = text
        .split_once("t=")
        .map(|(_, rest)| rest.trim())
        .ok_or(ParseError::MissingTemperature)?;
    let milli: f64 = payload
        .parse()
        .map_err(|_| ParseError::InvalidNumber(payload.to_string()))?;
    Ok(milli / 1000.0)
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const GOOD: &[u8] = b"72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n72 01 4b 46 7f ff 0e 10 57 t=23125\n";

    #[test]
    fn parses_a_valid_reading() {
        assert_eq!(parse_w1_reading(GOOD), Ok(23.125));
    }

    #[test]
    fn rejects_failed_crc() {
        let raw = b"72 01 4b 46 7f ff 0e 10 57 : crc=57 NO\n72 01 t=23125\n";
        assert_eq!(parse_w1_reading(raw), Err(ParseError::InvalidChecksum));
    }

    #[test]
    fn rejects_missing_temperature_marker() {
        let raw = b"72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n";
        assert_eq!(parse_w1_reading(raw), Err(ParseError::MissingTemperature));
    }

    #[test]
    fn rejects_non_numeric_payload() {
        let raw = b"crc=57 YES\nxx t=garbage\n";
        assert_eq!(
            parse_w1_reading(raw),
            Err(ParseError::InvalidNumber("garbage".to_string()))
        );
    }

    #[test]
    fn converts_celsius_to_fahrenheit() {
        assert_eq!(celsius_to_fahrenheit(0.0), 32.0);
        assert_eq!(celsius_to_fahrenheit(20.0), 68.0);
        assert_eq!(celsius_to_fahrenheit(-40.0), -40.0);
    }
}
