//! Save GNOME display layouts as named profiles and switch between them
//!
//! Profiles are snapshots of `org.gnome.Mutter.DisplayConfig.GetCurrentState`
//! stored as JSON. Switching reconciles a snapshot against the live session
//! and hands the result to `ApplyMonitorsConfig`.

#![forbid(unsafe_code)]

pub mod commands;
pub mod constants;
pub mod display_config;
pub mod reconcile;
pub mod store;
