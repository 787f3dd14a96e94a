//! Inbound command URIs.
//!
//! The only recognised command is `/temp/<device-id>/<value>[%<suffix>]`,
//! typically sent by a hub automation as `/temp/123/22.5%C2%B0C`. The path is
//! taken raw, so encoded unit suffixes are still `%`-prefixed here.

use crate::error::CommandError;

pub const TEMP_COMMAND: &str = "temp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeCommand<'a> {
    /// External temperature reading for one device. The value is parsed
    /// lazily so an unknown device is reported before a bad value.
    CurrentTemp {
        device_id: &'a str,
        raw_value: Option<&'a str>,
    },
    /// Any other leading token is acknowledged without effect.
    Passthrough,
}

pub fn parse(uri: &str) -> Result<BridgeCommand<'_>, CommandError> {
    let parts: Vec<&str> = uri.split('/').collect();
    if parts.len() < 3 {
        return Err(CommandError::Malformed);
    }

    if parts[1] != TEMP_COMMAND {
        return Ok(BridgeCommand::Passthrough);
    }

    Ok(BridgeCommand::CurrentTemp {
        device_id: parts[2],
        raw_value: parts.get(3).copied(),
    })
}

/// Parses a temperature segment: only the text before the first `%` is
/// used, and a decimal comma is accepted in place of a period.
pub fn parse_temperature(raw: &str) -> Result<f32, CommandError> {
    let token = raw.split('%').next().unwrap_or_default();
    let normalized = token.replacen(',', ".", 1);
    let trimmed = normalized.trim();

    match trimmed.parse::<f32>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(CommandError::InvalidTemperature {
            raw: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_temp_command() {
        assert_eq!(
            parse("/temp/abc/22.5%C2%B0C"),
            Ok(BridgeCommand::CurrentTemp {
                device_id: "abc",
                raw_value: Some("22.5%C2%B0C"),
            })
        );
    }

    #[test]
    fn single_segment_is_malformed() {
        assert_eq!(parse("/temp"), Err(CommandError::Malformed));
        assert_eq!(parse("/"), Err(CommandError::Malformed));
        assert_eq!(parse(""), Err(CommandError::Malformed));
    }

    #[test]
    fn unknown_command_passes_through() {
        assert_eq!(parse("/humidity/abc/40"), Ok(BridgeCommand::Passthrough));
        assert_eq!(parse("/favicon.ico/x"), Ok(BridgeCommand::Passthrough));
    }

    #[test]
    fn missing_leading_slash_is_not_a_temp_command() {
        assert_eq!(parse("temp/abc/20"), Ok(BridgeCommand::Passthrough));
    }

    #[test]
    fn value_segment_is_optional_at_parse_time() {
        assert_eq!(
            parse("/temp/abc"),
            Ok(BridgeCommand::CurrentTemp {
                device_id: "abc",
                raw_value: None,
            })
        );
    }

    #[test]
    fn strips_encoded_unit_suffix() {
        assert_eq!(parse_temperature("22.5%C2%B0C"), Ok(22.5));
    }

    #[test]
    fn accepts_decimal_comma() {
        assert_eq!(parse_temperature("21,3"), Ok(21.3));
        assert_eq!(parse_temperature("21,3%C2%B0C"), Ok(21.3));
    }

    #[test]
    fn accepts_plain_and_negative_values() {
        assert_eq!(parse_temperature("20"), Ok(20.0));
        assert_eq!(parse_temperature("-4.5"), Ok(-4.5));
    }

    #[test]
    fn rejects_non_numeric_values() {
        for raw in ["", "%C2%B0C", "warm", "22.5C", "NaN", "inf"] {
            assert_eq!(
                parse_temperature(raw),
                Err(CommandError::InvalidTemperature {
                    raw: raw.to_string()
                }),
                "value {raw:?}"
            );
        }
    }
}
