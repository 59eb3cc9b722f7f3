//! Serial port enumeration and signal generator autodetection.
//!
//! ISC boards enumerate as USB CDC devices with a fixed vendor/product id
//! pair. [`list_ports`] snapshots the ports the OS currently offers,
//! [`autodetect`] narrows a snapshot down to boards matching a
//! [`DeviceFilter`], and [`PortWatcher`] is the periodic tick a host loop
//! calls to notice ports appearing and disappearing.
//!
//! Enumeration never touches an open port, so the watcher may be polled
//! while a session is in the middle of an exchange.

use sglink_core::error::{Error, Result};
use tokio_serial::SerialPortType;

/// Vendor id reported by ISC signal generator boards.
pub const ISC_VENDOR_ID: u16 = 8137;
/// Product id reported by ISC signal generator boards.
pub const ISC_PRODUCT_ID: u16 = 131;

/// USB identity of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbId {
    pub vid: u16,
    pub pid: u16,
}

/// One serial port offered by the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name (e.g. `/dev/ttyACM0`, `COM3`).
    pub name: String,
    /// USB identity, when the port is a USB device.
    pub usb: Option<UsbId>,
}

impl PortInfo {
    pub fn new(name: impl Into<String>, usb: Option<UsbId>) -> Self {
        PortInfo {
            name: name.into(),
            usb,
        }
    }
}

impl From<tokio_serial::SerialPortInfo> for PortInfo {
    fn from(info: tokio_serial::SerialPortInfo) -> Self {
        let usb = match info.port_type {
            SerialPortType::UsbPort(usb) => Some(UsbId {
                vid: usb.vid,
                pid: usb.pid,
            }),
            _ => None,
        };
        PortInfo {
            name: info.port_name,
            usb,
        }
    }
}

/// Predicate selecting signal generator boards by USB identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFilter {
    pub vid: u16,
    pub pid: u16,
}

impl Default for DeviceFilter {
    fn default() -> Self {
        DeviceFilter {
            vid: ISC_VENDOR_ID,
            pid: ISC_PRODUCT_ID,
        }
    }
}

impl DeviceFilter {
    /// Whether `port` is a USB device with this filter's vendor and product id.
    pub fn matches(&self, port: &PortInfo) -> bool {
        port.usb
            .is_some_and(|usb| usb.vid == self.vid && usb.pid == self.pid)
    }
}

/// Snapshot the serial ports the OS currently offers.
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = tokio_serial::available_ports().map_err(|e| {
        tracing::error!(error = %e, "Failed to list serial ports");
        Error::Transport(format!("Failed to list serial ports: {e}"))
    })?;
    Ok(ports.into_iter().map(PortInfo::from).collect())
}

/// Return the ports in `ports` that match `filter`, in enumeration order.
///
/// Fails with [`Error::NoCandidateDevice`] when nothing matches; callers
/// connect to the first candidate and treat this error as fatal.
pub fn autodetect(ports: &[PortInfo], filter: &DeviceFilter) -> Result<Vec<PortInfo>> {
    let candidates: Vec<PortInfo> = ports
        .iter()
        .filter(|port| filter.matches(port))
        .cloned()
        .collect();

    match candidates.len() {
        0 => Err(Error::NoCandidateDevice),
        1 => Ok(candidates),
        n => {
            tracing::warn!(
                count = n,
                first = %candidates[0].name,
                "Multiple signal generator boards found"
            );
            Ok(candidates)
        }
    }
}

/// Whether two port snapshots differ in count or in any name, position by position.
pub fn ports_changed(old: &[PortInfo], new: &[PortInfo]) -> bool {
    old.len() != new.len() || old.iter().zip(new).any(|(a, b)| a.name != b.name)
}

/// Tracks the port list between polls.
///
/// Call [`PortWatcher::poll`] from the host loop (once a second is plenty);
/// it reports a new list only when something changed.
#[derive(Debug, Default)]
pub struct PortWatcher {
    known: Vec<PortInfo>,
}

impl PortWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The list seen at the last poll.
    pub fn ports(&self) -> &[PortInfo] {
        &self.known
    }

    /// Re-enumerate the OS ports. Returns the new list if it changed.
    pub fn poll(&mut self) -> Result<Option<&[PortInfo]>> {
        let current = list_ports()?;
        Ok(self.update(current))
    }

    /// Feed a snapshot taken elsewhere. Returns the new list if it changed.
    pub fn update(&mut self, current: Vec<PortInfo>) -> Option<&[PortInfo]> {
        let changed = ports_changed(&self.known, &current);
        self.known = current;
        if changed {
            tracing::debug!(count = self.known.len(), "Serial port list changed");
            Some(&self.known)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isc(name: &str) -> PortInfo {
        PortInfo::new(
            name,
            Some(UsbId {
                vid: ISC_VENDOR_ID,
                pid: ISC_PRODUCT_ID,
            }),
        )
    }

    fn other_usb(name: &str) -> PortInfo {
        PortInfo::new(name, Some(UsbId { vid: 0x0403, pid: 0x6001 }))
    }

    fn builtin(name: &str) -> PortInfo {
        PortInfo::new(name, None)
    }

    #[test]
    fn default_filter_is_isc_board() {
        let filter = DeviceFilter::default();
        assert_eq!(filter.vid, 8137);
        assert_eq!(filter.pid, 131);
    }

    #[test]
    fn filter_matches_only_usb_with_both_ids() {
        let filter = DeviceFilter::default();
        assert!(filter.matches(&isc("/dev/ttyACM0")));
        assert!(!filter.matches(&other_usb("/dev/ttyUSB0")));
        assert!(!filter.matches(&builtin("/dev/ttyS0")));
        assert!(!filter.matches(&PortInfo::new(
            "x",
            Some(UsbId {
                vid: ISC_VENDOR_ID,
                pid: 1
            })
        )));
    }

    #[test]
    fn autodetect_keeps_enumeration_order() {
        let ports = vec![
            builtin("/dev/ttyS0"),
            isc("/dev/ttyACM1"),
            other_usb("/dev/ttyUSB0"),
            isc("/dev/ttyACM0"),
        ];
        let found = autodetect(&ports, &DeviceFilter::default()).unwrap();
        let names: Vec<_> = found.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["/dev/ttyACM1", "/dev/ttyACM0"]);
    }

    #[test]
    fn autodetect_without_candidates_is_fatal() {
        let ports = vec![builtin("/dev/ttyS0"), other_usb("/dev/ttyUSB0")];
        let result = autodetect(&ports, &DeviceFilter::default());
        assert!(matches!(result, Err(Error::NoCandidateDevice)));

        let result = autodetect(&[], &DeviceFilter::default());
        assert!(matches!(result, Err(Error::NoCandidateDevice)));
    }

    #[test]
    fn custom_filter() {
        let filter = DeviceFilter {
            vid: 0x0403,
            pid: 0x6001,
        };
        let found = autodetect(&[isc("a"), other_usb("b")], &filter).unwrap();
        assert_eq!(found, vec![other_usb("b")]);
    }

    #[test]
    fn change_detection() {
        let a = vec![builtin("/dev/ttyS0"), isc("/dev/ttyACM0")];
        assert!(!ports_changed(&a, &a.clone()));
        assert!(ports_changed(&a, &a[..1]));
        assert!(ports_changed(&a, &[builtin("/dev/ttyS0"), isc("/dev/ttyACM1")]));
        // Only names are compared.
        assert!(!ports_changed(&a, &[builtin("/dev/ttyS0"), builtin("/dev/ttyACM0")]));
    }

    #[test]
    fn watcher_reports_only_changes() {
        let mut watcher = PortWatcher::new();
        assert!(watcher.ports().is_empty());

        // Empty to empty is not a change.
        assert!(watcher.update(Vec::new()).is_none());

        let first = watcher.update(vec![isc("/dev/ttyACM0")]).map(<[_]>::to_vec);
        assert_eq!(first, Some(vec![isc("/dev/ttyACM0")]));

        assert!(watcher.update(vec![isc("/dev/ttyACM0")]).is_none());

        let unplugged = watcher.update(Vec::new()).map(<[_]>::len);
        assert_eq!(unplugged, Some(0));
        assert!(watcher.ports().is_empty());
    }
}
