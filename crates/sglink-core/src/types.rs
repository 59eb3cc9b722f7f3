//! Sweep measurement types.

use std::fmt;

use crate::units::dbm_to_watt;

/// One frequency point of an S11 sweep.
///
/// Construct with [`SweepSample::new`], which derives the reflection values
/// from the forward and reflected power.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepSample {
    /// Frequency in MHz.
    pub frequency_mhz: f64,
    /// Forward power in dBm.
    pub forward_power_dbm: f64,
    /// Reflected power in dBm.
    pub reflected_power_dbm: f64,
    /// S11 in dB: reflected minus forward.
    pub s11_db: f64,
    /// Reflected power as a percentage of forward power (linear).
    pub reflection_percent: f64,
}

impl SweepSample {
    pub fn new(frequency_mhz: f64, forward_power_dbm: f64, reflected_power_dbm: f64) -> Self {
        SweepSample {
            frequency_mhz,
            forward_power_dbm,
            reflected_power_dbm,
            s11_db: reflected_power_dbm - forward_power_dbm,
            reflection_percent: dbm_to_watt(reflected_power_dbm) / dbm_to_watt(forward_power_dbm)
                * 100.0,
        }
    }
}

/// How S11 values are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum S11Notation {
    /// S11 in dB.
    #[default]
    Logarithmic,
    /// Reflection in percent.
    Linear,
}

impl S11Notation {
    /// Axis label for the value column.
    pub fn label(self) -> &'static str {
        match self {
            S11Notation::Logarithmic => "S11 (dB)",
            S11Notation::Linear => "Reflection (%)",
        }
    }
}

impl fmt::Display for S11Notation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A numeric field of a sample line that did not parse and was read as `0.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepSampleError {
    /// Zero-based index of the line within the sweep reply.
    pub line: usize,
    /// Which field failed (`"frequency"`, `"forward"`, `"reflected"`).
    pub field: &'static str,
    /// The offending text.
    pub text: String,
}

impl fmt::Display for SweepSampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: {} field {:?} is not a number, read as 0",
            self.line, self.field, self.text
        )
    }
}

/// The samples of one sweep, in the order the device reported them.
///
/// A result is built once per sweep and never modified afterwards; a new
/// sweep produces a new result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SweepResult {
    samples: Vec<SweepSample>,
    issues: Vec<SweepSampleError>,
    skipped_lines: usize,
}

impl SweepResult {
    pub fn new(
        samples: Vec<SweepSample>,
        issues: Vec<SweepSampleError>,
        skipped_lines: usize,
    ) -> Self {
        SweepResult {
            samples,
            issues,
            skipped_lines,
        }
    }

    pub fn samples(&self) -> &[SweepSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Numeric fields that failed to parse and were substituted with `0.0`.
    pub fn issues(&self) -> &[SweepSampleError] {
        &self.issues
    }

    /// Number of reply lines that were not valid sample lines.
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// `(frequency_mhz, value)` pairs for plotting in the given notation.
    pub fn series(&self, notation: S11Notation) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.samples.iter().map(move |s| match notation {
            S11Notation::Logarithmic => (s.frequency_mhz, s.s11_db),
            S11Notation::Linear => (s.frequency_mhz, s.reflection_percent),
        })
    }
}
