//! Application-wide constants
//!
//! Bus names, property keys and file layout used throughout the application,
//! kept in one place so the wire contract is easy to audit.

/// Mutter display configuration service on the session bus
pub mod dbus {
    /// Well-known bus name of the compositor's display configuration service
    pub const DESTINATION: &str = "org.gnome.Mutter.DisplayConfig";

    /// Object path exporting the interface
    pub const PATH: &str = "/org/gnome/Mutter/DisplayConfig";

    /// Interface name
    pub const INTERFACE: &str = "org.gnome.Mutter.DisplayConfig";

    /// Read the current monitors, modes and logical layout
    pub const GET_CURRENT_STATE: &str = "GetCurrentState";

    /// Apply a new logical layout
    pub const APPLY_MONITORS_CONFIG: &str = "ApplyMonitorsConfig";
}

/// Keys of the sparse property bags attached to monitors and modes
pub mod property {
    /// Present on the mode that was active when the state was read
    pub const IS_CURRENT: &str = "is-current";

    /// Present on the mode the compositor recommends for the monitor
    pub const IS_PREFERRED: &str = "is-preferred";

    /// Human readable monitor name
    pub const DISPLAY_NAME: &str = "display-name";
}

/// Profile storage layout
pub mod profile {
    /// Directory name under the user's config dir
    pub const APP_DIR: &str = "gdp";

    /// Extension appended to every profile name on disk
    pub const EXTENSION: &str = "json";

    /// Permission bits for a freshly created profile directory (owner-only writable)
    pub const DIR_MODE: u32 = 0o755;
}

/// Mode matching tolerances
pub mod mode {
    /// Two refresh rates closer than this (Hz) are the same timing
    pub const REFRESH_RATE_EPSILON: f64 = 0.01;
}
