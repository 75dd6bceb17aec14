//! Client for Mutter's display configuration service
//!
//! Talks to `org.gnome.Mutter.DisplayConfig` on the session bus over a blocking
//! zbus connection. Replies are decoded by [`variant`], requests are encoded
//! into the `a(iiduba(ssa{sv}))` layout `ApplyMonitorsConfig` expects.

use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};
use zvariant::{Structure, Type, Value};

use crate::constants::dbus;

pub mod types;
pub mod variant;

pub use types::{
    ApplyMethod, ApplyRequest, ConnectorAndMode, ConnectorAndMonitorId, LogicalMonitor,
    LogicalMonitorRequest, Monitor, MonitorMode, Properties, PropertyValue, StateSnapshot,
};
pub use variant::DecodeError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to the session bus")]
    Connect(#[source] zbus::Error),

    #[error("{method} call failed")]
    Transport {
        method: &'static str,
        #[source]
        source: zbus::Error,
    },

    #[error("{method} returned an unexpected reply")]
    Decode {
        method: &'static str,
        #[source]
        source: DecodeError,
    },

    #[error("compositor rejected {method}: {name}: {detail}")]
    Rejected {
        method: &'static str,
        name: String,
        detail: String,
    },
}

/// The two display configuration operations the commands need
pub trait DisplayConfig {
    /// Read the live monitors, modes and logical layout
    fn read_current_state(&self) -> Result<StateSnapshot, ClientError>;

    /// Apply a logical layout; the compositor checks the serial
    fn apply_layout(&self, request: &ApplyRequest) -> Result<(), ClientError>;
}

/// Blocking session bus connection to Mutter
pub struct MutterDisplayConfig {
    proxy: zbus::blocking::Proxy<'static>,
}

impl MutterDisplayConfig {
    /// Connect to the session bus
    pub fn connect() -> Result<Self, ClientError> {
        let connection = zbus::blocking::Connection::session().map_err(ClientError::Connect)?;
        let proxy = zbus::blocking::Proxy::new(&connection, dbus::DESTINATION, dbus::PATH, dbus::INTERFACE)
            .map_err(ClientError::Connect)?;
        debug!(destination = dbus::DESTINATION, "connected to display config service");
        Ok(Self { proxy })
    }
}

impl DisplayConfig for MutterDisplayConfig {
    fn read_current_state(&self) -> Result<StateSnapshot, ClientError> {
        let method = dbus::GET_CURRENT_STATE;
        let transport = |source| ClientError::Transport { method, source };

        let reply = self.proxy.call_method(method, &()).map_err(transport)?;
        let state = decode_state_reply(&reply)?;

        info!(
            serial = state.serial,
            monitors = state.monitors.len(),
            logical_monitors = state.logical_monitors.len(),
            "read current display state"
        );
        Ok(state)
    }

    fn apply_layout(&self, request: &ApplyRequest) -> Result<(), ClientError> {
        let method = dbus::APPLY_MONITORS_CONFIG;
        let body = encode_apply_request(request);

        info!(
            serial = request.serial,
            method = ?request.method,
            logical_monitors = request.logical_monitors.len(),
            "applying monitors config"
        );
        self.proxy
            .call_method(method, &body)
            .map_err(|err| apply_error(method, err))?;
        Ok(())
    }
}

/// Decode the body of a `GetCurrentState` reply
fn decode_state_reply(reply: &zbus::Message) -> Result<StateSnapshot, ClientError> {
    let method = dbus::GET_CURRENT_STATE;
    let body = reply.body();
    let envelope: Structure<'_> = body
        .deserialize()
        .map_err(|source| ClientError::Transport { method, source })?;
    variant::state_from_structure(&envelope).map_err(|source| ClientError::Decode { method, source })
}

/// A D-Bus error reply is the compositor refusing the request, anything else
/// never reached it
fn apply_error(method: &'static str, err: zbus::Error) -> ClientError {
    match err {
        zbus::Error::MethodError(name, detail, _) => ClientError::Rejected {
            method,
            name: name.to_string(),
            detail: detail.unwrap_or_default(),
        },
        source => ClientError::Transport { method, source },
    }
}

/// `(ssa{sv})` element of a logical monitor request
#[derive(Debug, Serialize, Type)]
struct ConnectorAndModeWire<'a> {
    connector: &'a str,
    mode: &'a str,
    properties: HashMap<&'a str, Value<'a>>,
}

/// `(iiduba(ssa{sv}))` element of `ApplyMonitorsConfig`
#[derive(Debug, Serialize, Type)]
struct LogicalMonitorWire<'a> {
    x: i32,
    y: i32,
    scale: f64,
    transform: u32,
    primary: bool,
    monitors: Vec<ConnectorAndModeWire<'a>>,
}

type ApplyBody<'a> = (u32, u32, Vec<LogicalMonitorWire<'a>>, HashMap<&'a str, Value<'a>>);

fn encode_apply_request(request: &ApplyRequest) -> ApplyBody<'_> {
    let logical_monitors = request
        .logical_monitors
        .iter()
        .map(|lm| LogicalMonitorWire {
            x: lm.x,
            y: lm.y,
            scale: lm.scale,
            transform: lm.transform,
            primary: lm.primary,
            monitors: lm
                .monitors
                .iter()
                .map(|cm| ConnectorAndModeWire {
                    connector: &cm.connector,
                    mode: &cm.mode,
                    properties: variant::properties_to_map(&cm.properties),
                })
                .collect(),
        })
        .collect();

    (
        request.serial,
        request.method.as_u32(),
        logical_monitors,
        variant::properties_to_map(&request.properties),
    )
}
