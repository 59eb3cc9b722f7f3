//! S11 sweep reply parsing.
//!
//! A sweep reply is a block of sample lines followed by `OK`:
//!
//! ```text
//! $SWPD,0,2400.00,10.00,-5.00\r\n
//! $SWPD,0,2401.00,10.00,-6.00\r\n
//! OK\r\n
//! ```
//!
//! Each sample line carries the channel, frequency (MHz), forward power
//! (dBm) and reflected power (dBm).

use tracing::debug;

use sglink_core::error::Error;
use sglink_core::types::{SweepResult, SweepSample, SweepSampleError};

use crate::protocol::{BLOCK_TERMINATOR, FIELD_SEPARATOR, LINE_TERMINATOR};

/// Marker field that identifies a sample line.
pub const SWEEP_MARKER: &str = "$SWPD";

/// Number of fields in a sample line.
const SAMPLE_FIELDS: usize = 5;

/// Why a sweep reply was rejected as a whole.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SweepError {
    #[error("sweep reply malformed: {0}")]
    Malformed(&'static str),
}

impl From<SweepError> for Error {
    fn from(err: SweepError) -> Self {
        debug!(error = %err, "rejecting sweep reply");
        Error::SweepMalformed
    }
}

/// Parse a float field, reading anything unparseable as `0.0` and noting it.
fn parse_field(
    text: &str,
    line: usize,
    field: &'static str,
    issues: &mut Vec<SweepSampleError>,
) -> f64 {
    match text.trim().parse::<f64>() {
        Ok(value) => value,
        Err(_) => {
            issues.push(SweepSampleError {
                line,
                field,
                text: text.to_string(),
            });
            0.0
        }
    }
}

/// Parse the raw text of a sweep reply into samples.
///
/// The reply must contain at least one `$SWPD,` line and the `OK\r\n`
/// terminator, otherwise it is rejected. Within it, lines that are not
/// five-field sample lines are skipped and counted. Numeric fields that do
/// not parse are read as `0.0` and listed in [`SweepResult::issues`].
///
/// # Example
///
/// ```
/// use sglink_isc::sweep::parse_sweep;
///
/// let result = parse_sweep("$SWPD,0,2400,10,-5\r\nOK\r\n").unwrap();
/// assert_eq!(result.len(), 1);
/// assert_eq!(result.samples()[0].s11_db, -15.0);
/// ```
pub fn parse_sweep(raw: &str) -> Result<SweepResult, SweepError> {
    if !raw.contains(&format!("{SWEEP_MARKER}{FIELD_SEPARATOR}")) {
        return Err(SweepError::Malformed("no sample lines"));
    }
    if !raw.contains(BLOCK_TERMINATOR) {
        return Err(SweepError::Malformed("missing OK terminator"));
    }

    // The last two entries are the OK line and whatever follows its
    // terminator.
    let lines: Vec<&str> = raw.split(LINE_TERMINATOR).collect();
    let body = &lines[..lines.len().saturating_sub(2)];

    let mut samples = Vec::with_capacity(body.len());
    let mut issues = Vec::new();
    let mut skipped = 0;

    for (index, line) in body.iter().enumerate() {
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        if fields.len() != SAMPLE_FIELDS || !fields.contains(&SWEEP_MARKER) {
            skipped += 1;
            continue;
        }

        let frequency = parse_field(fields[2], index, "frequency", &mut issues);
        let forward = parse_field(fields[3], index, "forward", &mut issues);
        let reflected = parse_field(fields[4], index, "reflected", &mut issues);
        samples.push(SweepSample::new(frequency, forward, reflected));
    }

    Ok(SweepResult::new(samples, issues, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_samples() {
        let result =
            parse_sweep("$SWPD,0,2400.00,10.00,-5.00\r\n$SWPD,0,2401.00,10.00,-6.00\r\nOK\r\n")
                .unwrap();

        assert_eq!(result.len(), 2);
        let first = result.samples()[0];
        assert_eq!(first.frequency_mhz, 2400.0);
        assert_eq!(first.forward_power_dbm, 10.0);
        assert_eq!(first.reflected_power_dbm, -5.0);
        assert_eq!(first.s11_db, -15.0);
        assert!((first.reflection_percent - 3.162_277_660_168_38).abs() < 1e-9);

        let second = result.samples()[1];
        assert_eq!(second.frequency_mhz, 2401.0);
        assert_eq!(second.s11_db, -16.0);
        assert!(result.issues().is_empty());
        assert_eq!(result.skipped_lines(), 0);
    }

    #[test]
    fn malformed_line_is_skipped() {
        let raw = "$SWPD,0,2400,10,-5\r\n\
                   $SWPD,0,2401,10\r\n\
                   $SWPD,0,2402,10,-7\r\n\
                   OK\r\n";
        let result = parse_sweep(raw).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.skipped_lines(), 1);
        assert_eq!(result.samples()[1].frequency_mhz, 2402.0);
    }

    #[test]
    fn lines_without_marker_are_skipped() {
        let raw = "noise,a,b,c,d\r\n$SWPD,0,2400,10,-5\r\nOK\r\n";
        let result = parse_sweep(raw).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.skipped_lines(), 1);
    }

    #[test]
    fn missing_terminator_is_rejected() {
        assert_eq!(
            parse_sweep("$SWPD,0,2400,10,-5\r\n"),
            Err(SweepError::Malformed("missing OK terminator"))
        );
    }

    #[test]
    fn missing_marker_is_rejected() {
        assert_eq!(
            parse_sweep("OK\r\n"),
            Err(SweepError::Malformed("no sample lines"))
        );
    }

    #[test]
    fn only_invalid_lines_give_empty_result() {
        // The marker is present, but no line has five fields.
        let result = parse_sweep("$SWPD,0,2400\r\nOK\r\n").unwrap();
        assert!(result.is_empty());
        assert_eq!(result.skipped_lines(), 1);
    }

    #[test]
    fn unparseable_numbers_read_as_zero() {
        let result = parse_sweep("$SWPD,0,24x0,10,abc\r\nOK\r\n").unwrap();
        assert_eq!(result.len(), 1);

        let sample = result.samples()[0];
        assert_eq!(sample.frequency_mhz, 0.0);
        assert_eq!(sample.forward_power_dbm, 10.0);
        assert_eq!(sample.reflected_power_dbm, 0.0);

        let issues = result.issues();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].field, "frequency");
        assert_eq!(issues[0].text, "24x0");
        assert_eq!(issues[1].field, "reflected");
        assert_eq!(issues[1].line, 0);
    }

    #[test]
    fn whitespace_around_numbers_is_accepted() {
        let result = parse_sweep("$SWPD,0, 2400.5 ,10 , -5\r\nOK\r\n").unwrap();
        assert_eq!(result.samples()[0].frequency_mhz, 2400.5);
        assert!(result.issues().is_empty());
    }

    #[test]
    fn order_is_preserved() {
        let raw = "$SWPD,0,2405,10,-5\r\n$SWPD,0,2400,10,-5\r\n$SWPD,0,2410,10,-5\r\nOK\r\n";
        let freqs: Vec<f64> = parse_sweep(raw)
            .unwrap()
            .samples()
            .iter()
            .map(|s| s.frequency_mhz)
            .collect();
        assert_eq!(freqs, vec![2405.0, 2400.0, 2410.0]);
    }

    #[test]
    fn converts_to_sweep_malformed() {
        let err: Error = SweepError::Malformed("no sample lines").into();
        assert!(matches!(err, Error::SweepMalformed));
    }
}
