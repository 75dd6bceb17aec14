//! Display configuration entities shared by the decoder, the reconciler and
//! the profile files.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::constants::{mode, property};

/// Sparse attribute bag attached to monitors, modes and the state envelope
pub type Properties = BTreeMap<String, PropertyValue>;

/// JSON friendly mirror of the variant values Mutter puts in property bags
///
/// D-Bus structs and arrays both decode to `List`, dictionaries to `Map`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    Text(String),
    List(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
}

/// Connector plus the EDID identity of the panel plugged into it
///
/// This tuple is the join key between monitors and logical monitors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectorAndMonitorId {
    /// Connector name (e.g. HDMI-1, DP-1)
    pub connector: String,
    /// Vendor name (e.g. VSC)
    pub vendor: String,
    /// Product name (e.g. VX2705-2KP)
    pub product: String,
    /// Product serial
    pub serial: String,
}

impl ConnectorAndMonitorId {
    pub fn new(connector: &str, vendor: &str, product: &str, serial: &str) -> Self {
        Self {
            connector: connector.to_string(),
            vendor: vendor.to_string(),
            product: product.to_string(),
            serial: serial.to_string(),
        }
    }
}

impl fmt::Display for ConnectorAndMonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {} {})", self.connector, self.vendor, self.product, self.serial)
    }
}

/// One timing mode of a monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorMode {
    /// Session scoped mode token, only meaningful to the running compositor
    pub id: String,
    /// Width in physical pixels
    pub width: i32,
    /// Height in physical pixels
    pub height: i32,
    pub refresh_rate: f64,
    /// Scale preferred as per the compositor's calculations
    pub preferred_scale: f64,
    pub supported_scales: Vec<f64>,
    /// is-current, is-preferred, is-interlaced, ...
    #[serde(default)]
    pub properties: Properties,
}

impl MonitorMode {
    pub fn is_current(&self) -> bool {
        self.properties.contains_key(property::IS_CURRENT)
    }

    pub fn is_preferred(&self) -> bool {
        self.properties.contains_key(property::IS_PREFERRED)
    }

    /// Same resolution and refresh rate, regardless of the mode token
    pub fn same_timing(&self, other: &MonitorMode) -> bool {
        self.width == other.width
            && self.height == other.height
            && (self.refresh_rate - other.refresh_rate).abs() < mode::REFRESH_RATE_EPSILON
    }
}

/// Physical monitor with the modes it supports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: ConnectorAndMonitorId,
    pub modes: Vec<MonitorMode>,
    /// display-name, is-builtin, ...
    #[serde(default)]
    pub properties: Properties,
}

impl Monitor {
    /// First mode flagged `is-current`
    pub fn current_mode(&self) -> Option<&MonitorMode> {
        self.modes.iter().find(|m| m.is_current())
    }

    pub fn display_name(&self) -> Option<&str> {
        match self.properties.get(property::DISPLAY_NAME) {
            Some(PropertyValue::Text(name)) => Some(name),
            _ => None,
        }
    }
}

/// Rectangle of the logical desktop, fed by one or more physical monitors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalMonitor {
    pub x: i32,
    pub y: i32,
    pub scale: f64,
    /// 0: normal, 1: 90°, 2: 180°, 3: 270°, 4: flipped, 5-7: flipped and rotated
    pub transform: u32,
    pub primary: bool,
    /// Lookup keys into the sibling monitor list (more than one when mirroring)
    pub monitors: Vec<ConnectorAndMonitorId>,
    #[serde(default)]
    pub properties: Properties,
}

/// Everything `GetCurrentState` returns; also the content of a profile file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Generation counter, only valid in the session it was read from
    pub serial: u32,
    pub monitors: Vec<Monitor>,
    pub logical_monitors: Vec<LogicalMonitor>,
    #[serde(default)]
    pub properties: Properties,
}

impl StateSnapshot {
    /// Index monitors by identity
    ///
    /// Identities listed more than once keep every entry, in list order.
    pub fn monitor_index(&self) -> HashMap<&ConnectorAndMonitorId, Vec<&Monitor>> {
        let mut index: HashMap<_, Vec<_>> = HashMap::with_capacity(self.monitors.len());
        for monitor in &self.monitors {
            index.entry(&monitor.id).or_default().push(monitor);
        }
        index
    }

    /// Live monitor currently attached to `connector`
    pub fn monitor_on_connector(&self, connector: &str) -> Option<&Monitor> {
        self.monitors.iter().find(|m| m.id.connector == connector)
    }
}

/// Policy selector of `ApplyMonitorsConfig`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplyMethod {
    /// Only check that the configuration could be applied
    Verify,
    /// Apply until the user confirms, revert otherwise
    Temporary,
    /// Apply and keep across logout
    #[default]
    Persistent,
}

impl ApplyMethod {
    pub fn as_u32(self) -> u32 {
        match self {
            ApplyMethod::Verify => 0,
            ApplyMethod::Temporary => 1,
            ApplyMethod::Persistent => 2,
        }
    }
}

/// Connector to drive and the mode to drive it with
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorAndMode {
    pub connector: String,
    pub mode: String,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalMonitorRequest {
    pub x: i32,
    pub y: i32,
    pub scale: f64,
    pub transform: u32,
    pub primary: bool,
    pub monitors: Vec<ConnectorAndMode>,
}

/// Arguments of one `ApplyMonitorsConfig` call
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyRequest {
    pub serial: u32,
    pub method: ApplyMethod,
    pub logical_monitors: Vec<LogicalMonitorRequest>,
    pub properties: Properties,
}
