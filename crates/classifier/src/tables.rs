//! Built-in classification tables
//!
//! Order matters in both tables: the first matching rule wins.

use crate::matcher::RuleSpec;

/// Unit reported when no rule matches
pub const UNKNOWN_UNIT: &str = "unknown";

/// Fields that are never stored as sensors
///
/// `loc_lat` / `loc_lon` are deliberately absent: they update the device
/// geolocation and are also recorded as ordinary metrics.
pub const STANDARD_IGNORE_RULES: &[RuleSpec<'static>] = &[
    RuleSpec::Exact("device_urn"),
    RuleSpec::Prefix("dev_"),
    RuleSpec::Prefix("gateway_"),
    RuleSpec::Prefix("service_"),
    RuleSpec::Exact("loc_alt"),
    RuleSpec::Exact("loc_when_motion_began"),
    RuleSpec::Exact("loc_olc"),
    RuleSpec::Exact("when_captured"),
];

/// Metric name -> physical unit
pub const STANDARD_UNIT_RULES: &[(RuleSpec<'static>, &str)] = &[
    (RuleSpec::Prefix("loc_"), "degrees"),
    (RuleSpec::Exact("env_temp"), "°C"),
    (RuleSpec::Exact("env_humid"), "percent"),
    (RuleSpec::Exact("env_press"), "hPa"),
    (RuleSpec::Exact("bat_voltage"), "volts"),
    (RuleSpec::Prefix("lnd_"), "counts/minute"),
    (RuleSpec::Pattern(r"^(pms|opc)[0-9]*_c[0-9]+"), "counts"),
    (RuleSpec::Pattern(r"^(pms|opc)[0-9]*_(pm|std)"), "μg/m³"),
    (RuleSpec::Pattern(r"^(pms|opc)[0-9]*_csecs"), "seconds"),
];
