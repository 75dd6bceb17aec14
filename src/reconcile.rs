//! Turn a saved display state into an `ApplyMonitorsConfig` request for the
//! live session.
//!
//! The saved layout is reproduced logical monitor by logical monitor. Every
//! physical monitor a logical monitor references is resolved in the saved
//! monitor list and driven with the mode that was current when the profile was
//! saved. The request always carries the live serial.

use thiserror::Error;
use tracing::{debug, warn};

use crate::display_config::{
    ApplyMethod, ApplyRequest, ConnectorAndMode, ConnectorAndMonitorId, LogicalMonitorRequest,
    MonitorMode, Properties, StateSnapshot,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconcileError {
    #[error("logical monitor {index} references monitor {id} which is not in the saved state")]
    UnknownMonitor { index: usize, id: ConnectorAndMonitorId },

    #[error("monitor {0} is listed more than once in the saved state")]
    DuplicateMonitor(ConnectorAndMonitorId),

    #[error("monitor {0} has no mode flagged as current")]
    NoCurrentMode(ConnectorAndMonitorId),
}

/// How the mode of each connector is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeStrategy {
    /// Reuse the saved mode token verbatim
    #[default]
    SavedId,
    /// Look up the live mode with the saved resolution and refresh rate, so
    /// profiles survive a compositor restart that renumbered the modes
    MatchTiming,
}

/// Build the request that restores `saved` on top of `live`
///
/// With [`ModeStrategy::SavedId`] only `live.serial` is read from the live state.
pub fn reconcile(
    saved: &StateSnapshot,
    live: &StateSnapshot,
    strategy: ModeStrategy,
) -> Result<ApplyRequest, ReconcileError> {
    let index = saved.monitor_index();

    let mut logical_monitors = Vec::with_capacity(saved.logical_monitors.len());
    for (i, logical) in saved.logical_monitors.iter().enumerate() {
        let mut monitors = Vec::with_capacity(logical.monitors.len());
        for id in &logical.monitors {
            let monitor = match index.get(id).map(Vec::as_slice) {
                Some([monitor]) => *monitor,
                Some([_, _, ..]) => return Err(ReconcileError::DuplicateMonitor(id.clone())),
                _ => return Err(ReconcileError::UnknownMonitor { index: i, id: id.clone() }),
            };
            let current = monitor
                .current_mode()
                .ok_or_else(|| ReconcileError::NoCurrentMode(id.clone()))?;

            let mode = match strategy {
                ModeStrategy::SavedId => current.id.clone(),
                ModeStrategy::MatchTiming => live_mode_id(live, &id.connector, current),
            };
            debug!(connector = %id.connector, mode = %mode, "resolved mode");

            monitors.push(ConnectorAndMode {
                connector: id.connector.clone(),
                mode,
                properties: Properties::new(),
            });
        }

        logical_monitors.push(LogicalMonitorRequest {
            x: logical.x,
            y: logical.y,
            scale: logical.scale,
            transform: logical.transform,
            primary: logical.primary,
            monitors,
        });
    }

    Ok(ApplyRequest {
        serial: live.serial,
        method: ApplyMethod::Persistent,
        logical_monitors,
        properties: Properties::new(),
    })
}

/// Token of the live mode with the same timing as `saved`, preferring the
/// compositor's recommended one. Falls back to the saved token.
fn live_mode_id(live: &StateSnapshot, connector: &str, saved: &MonitorMode) -> String {
    let Some(monitor) = live.monitor_on_connector(connector) else {
        warn!(connector, "connector not present in live state, keeping saved mode id");
        return saved.id.clone();
    };

    let mut candidates = monitor.modes.iter().filter(|m| m.same_timing(saved));
    let first = candidates.next();
    let chosen = if first.is_some_and(|m| m.is_preferred()) {
        first
    } else {
        candidates.find(|m| m.is_preferred()).or(first)
    };

    match chosen {
        Some(mode) => mode.id.clone(),
        None => {
            warn!(
                connector,
                width = saved.width,
                height = saved.height,
                refresh_rate = saved.refresh_rate,
                "no live mode with saved timing, keeping saved mode id"
            );
            saved.id.clone()
        }
    }
}
