//! ---
//! ems_section: "02-messaging-ipc-data-model"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Feature record model and filtered query engine."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

const MAX_DECIMALS: i32 = 4;

/// Decimal number transported as `number * 10^scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaledNumber {
    /// Integer mantissa.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<i64>,
    /// Base-10 exponent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<i8>,
}

impl ScaledNumber {
    /// Encode a float with at most four decimals.
    pub fn from_f64(value: f64) -> Self {
        let mut decimals = 0;
        let mut scaled = value;
        while decimals < MAX_DECIMALS && (scaled - scaled.round()).abs() > 1e-9 {
            decimals += 1;
            scaled = value * 10f64.powi(decimals);
        }
        Self {
            number: Some(scaled.round() as i64),
            scale: (decimals > 0).then(|| -(decimals as i8)),
        }
    }

    /// Decoded value; absent parts count as zero.
    pub fn value(&self) -> f64 {
        let number = self.number.unwrap_or_default() as f64;
        let scale = self.scale.unwrap_or_default() as i32;
        if scale < 0 {
            number / 10f64.powi(-scale)
        } else {
            number * 10f64.powi(scale)
        }
    }
}

impl From<f64> for ScaledNumber {
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}

/// ISO-8601 duration literal such as `PT2H` or `P1DT30M`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct XsDuration(pub String);

impl XsDuration {
    /// Render a duration using days, hours, minutes and seconds designators.
    pub fn from_std(duration: Duration) -> Self {
        let total = duration.as_secs();
        let days = total / 86_400;
        let hours = (total % 86_400) / 3_600;
        let minutes = (total % 3_600) / 60;
        let seconds = total % 60;

        let mut literal = String::from("P");
        if days > 0 {
            literal.push_str(&format!("{days}D"));
        }
        if hours > 0 || minutes > 0 || seconds > 0 || days == 0 {
            literal.push('T');
            if hours > 0 {
                literal.push_str(&format!("{hours}H"));
            }
            if minutes > 0 {
                literal.push_str(&format!("{minutes}M"));
            }
            if seconds > 0 || (hours == 0 && minutes == 0) {
                literal.push_str(&format!("{seconds}S"));
            }
        }
        Self(literal)
    }

    /// Parse the literal. Years and months have no fixed length and are rejected,
    /// as are negative durations.
    pub fn to_std(&self) -> Result<Duration, ModelError> {
        let invalid = || ModelError::InvalidDuration(self.0.clone());
        let body = self.0.trim().strip_prefix('P').ok_or_else(invalid)?;
        if body.is_empty() {
            return Err(invalid());
        }

        let mut seconds = 0f64;
        let mut in_time = false;
        let mut digits = String::new();
        let mut seen_component = false;
        for ch in body.chars() {
            match ch {
                'T' if !in_time && digits.is_empty() => in_time = true,
                '0'..='9' | '.' => digits.push(ch),
                designator => {
                    let amount: f64 = digits.parse().map_err(|_| invalid())?;
                    digits.clear();
                    let factor = match (in_time, designator) {
                        (false, 'W') => 604_800.0,
                        (false, 'D') => 86_400.0,
                        (true, 'H') => 3_600.0,
                        (true, 'M') => 60.0,
                        (true, 'S') => 1.0,
                        _ => return Err(invalid()),
                    };
                    seconds += amount * factor;
                    seen_component = true;
                }
            }
        }
        if !digits.is_empty() || !seen_component {
            return Err(invalid());
        }
        Duration::try_from_secs_f64(seconds).map_err(|_| invalid())
    }
}

impl fmt::Display for XsDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Relative time window attached to a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePeriod {
    /// Offset at which the window starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<XsDuration>,
    /// Offset at which the window ends; for limits, the remaining duration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<XsDuration>,
}

impl TimePeriod {
    /// Window ending after `duration`.
    pub fn ending_after(duration: Duration) -> Self {
        Self {
            start_time: None,
            end_time: Some(XsDuration::from_std(duration)),
        }
    }

    /// Duration until the end of the window.
    pub fn duration(&self) -> Result<Duration, ModelError> {
        match &self.end_time {
            Some(end) => end.to_std(),
            None => Err(ModelError::InvalidDuration(String::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_number_roundtrips_common_values() {
        assert_eq!(ScaledNumber::from_f64(10.0).value(), 10.0);
        let fractional = ScaledNumber::from_f64(4200.5);
        assert_eq!(fractional.number, Some(42005));
        assert_eq!(fractional.scale, Some(-1));
        assert!((fractional.value() - 4200.5).abs() < f64::EPSILON);
    }

    #[test]
    fn absent_parts_decode_as_zero() {
        assert_eq!(ScaledNumber::default().value(), 0.0);
        let no_scale = ScaledNumber {
            number: Some(16),
            scale: None,
        };
        assert_eq!(no_scale.value(), 16.0);
    }

    #[test]
    fn durations_parse_and_render() {
        assert_eq!(
            XsDuration("PT2H".into()).to_std().expect("parse"),
            Duration::from_secs(7_200)
        );
        assert_eq!(
            XsDuration("P1DT30M".into()).to_std().expect("parse"),
            Duration::from_secs(86_400 + 1_800)
        );
        assert_eq!(
            XsDuration("PT1.5S".into()).to_std().expect("parse"),
            Duration::from_millis(1_500)
        );
        assert_eq!(XsDuration::from_std(Duration::from_secs(7_200)).0, "PT2H");
        assert_eq!(XsDuration::from_std(Duration::ZERO).0, "PT0S");
        assert_eq!(
            XsDuration::from_std(Duration::from_secs(90_061)).0,
            "P1DT1H1M1S"
        );
    }

    #[test]
    fn malformed_durations_are_rejected() {
        for literal in [
            "",
            "P",
            "PT",
            "2H",
            "P1Y",
            "PT5",
            "PTXS",
            "P999999999999999D",
        ] {
            assert!(
                XsDuration(literal.into()).to_std().is_err(),
                "{literal} should not parse"
            );
        }
        let infinite = format!("PT{}S", "9".repeat(400));
        assert!(XsDuration(infinite).to_std().is_err());
    }
}
