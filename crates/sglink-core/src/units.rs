//! Power unit conversion between dBm and watts.
//!
//! Both functions are plain floating-point formulas. Non-positive watt
//! values are not guarded: `watt_to_dbm(0.0)` is `-inf` and a negative input
//! is `NaN`, and callers decide how to display such values.

/// Convert a power level in dBm to watts.
///
/// # Example
///
/// ```
/// use sglink_core::dbm_to_watt;
///
/// assert_eq!(dbm_to_watt(0.0), 0.001);
/// assert!((dbm_to_watt(30.0) - 1.0).abs() < 1e-12);
/// ```
pub fn dbm_to_watt(dbm: f64) -> f64 {
    0.001 * 10f64.powf(0.1 * dbm)
}

/// Convert a power level in watts to dBm.
///
/// # Example
///
/// ```
/// use sglink_core::watt_to_dbm;
///
/// assert_eq!(watt_to_dbm(0.001), 0.0);
/// assert!((watt_to_dbm(1.0) - 30.0).abs() < 1e-12);
/// ```
pub fn watt_to_dbm(watt: f64) -> f64 {
    10.0 * watt.log10() + 30.0
}
