//! Conversion between `zvariant` value trees and display configuration entities
//!
//! The `GetCurrentState` reply is read as an untyped [`Structure`] and decoded
//! field by field. Every accessor checks the shape before trusting it and
//! reports the position of the offending value, so a protocol change in the
//! compositor surfaces as an error instead of a silently misread identity.

use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use zvariant::{Array, Dict, Structure, Value};

use super::types::{
    ConnectorAndMonitorId, LogicalMonitor, Monitor, MonitorMode, Properties, PropertyValue,
    StateSnapshot,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("expected {expected} at {path}, found {found}")]
    Shape {
        expected: &'static str,
        found: String,
        path: String,
    },
    #[error("{path} references monitor {id} which is not in the monitor list")]
    DanglingMonitor { path: String, id: ConnectorAndMonitorId },
}

fn shape(expected: &'static str, value: &Value<'_>, path: &str) -> DecodeError {
    DecodeError::Shape {
        expected,
        found: format!("value of type `{}`", value.value_signature()),
        path: path.to_string(),
    }
}

fn child(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{path}.{field}")
    }
}

fn item(path: &str, index: usize) -> String {
    format!("{path}[{index}]")
}

/// Strip variant boxes (`v`) around a value
fn unboxed<'a>(value: &'a Value<'a>) -> &'a Value<'a> {
    match value {
        Value::Value(inner) => unboxed(inner),
        other => other,
    }
}

fn fields<'a>(
    value: &'a Value<'a>,
    arity: usize,
    expected: &'static str,
    path: &str,
) -> Result<&'a [Value<'a>], DecodeError> {
    match unboxed(value) {
        Value::Structure(s) if s.fields().len() == arity => Ok(s.fields()),
        other => Err(shape(expected, other, path)),
    }
}

fn elements<'a>(
    value: &'a Value<'a>,
    expected: &'static str,
    path: &str,
) -> Result<Vec<&'a Value<'a>>, DecodeError> {
    match unboxed(value) {
        Value::Array(array) => Ok(array.iter().collect()),
        other => Err(shape(expected, other, path)),
    }
}

fn string(value: &Value<'_>, path: &str) -> Result<String, DecodeError> {
    match unboxed(value) {
        Value::Str(s) => Ok(s.as_str().to_string()),
        other => Err(shape("string", other, path)),
    }
}

fn int32(value: &Value<'_>, path: &str) -> Result<i32, DecodeError> {
    match unboxed(value) {
        Value::I32(n) => Ok(*n),
        other => Err(shape("int32", other, path)),
    }
}

fn uint32(value: &Value<'_>, path: &str) -> Result<u32, DecodeError> {
    match unboxed(value) {
        Value::U32(n) => Ok(*n),
        other => Err(shape("uint32", other, path)),
    }
}

fn double(value: &Value<'_>, path: &str) -> Result<f64, DecodeError> {
    match unboxed(value) {
        Value::F64(n) => Ok(*n),
        other => Err(shape("double", other, path)),
    }
}

fn boolean(value: &Value<'_>, path: &str) -> Result<bool, DecodeError> {
    match unboxed(value) {
        Value::Bool(b) => Ok(*b),
        other => Err(shape("boolean", other, path)),
    }
}

fn doubles(value: &Value<'_>, path: &str) -> Result<Vec<f64>, DecodeError> {
    elements(value, "array of doubles", path)?
        .into_iter()
        .enumerate()
        .map(|(i, v)| double(v, &item(path, i)))
        .collect()
}

/// Decode a `(ssss)` identity tuple
pub fn identity_from_value(value: &Value<'_>, path: &str) -> Result<ConnectorAndMonitorId, DecodeError> {
    let f = fields(value, 4, "(connector, vendor, product, serial) struct", path)?;
    Ok(ConnectorAndMonitorId {
        connector: string(&f[0], &child(path, "connector"))?,
        vendor: string(&f[1], &child(path, "vendor"))?,
        product: string(&f[2], &child(path, "product"))?,
        serial: string(&f[3], &child(path, "serial"))?,
    })
}

/// Encode an identity back into its `(ssss)` wire shape
pub fn identity_to_value(id: &ConnectorAndMonitorId) -> Value<'_> {
    Value::Structure(Structure::from((
        id.connector.as_str(),
        id.vendor.as_str(),
        id.product.as_str(),
        id.serial.as_str(),
    )))
}

/// Decode a `(siiddada{sv})` mode
pub fn mode_from_value(value: &Value<'_>, path: &str) -> Result<MonitorMode, DecodeError> {
    let f = fields(value, 7, "(id, width, height, refresh rate, preferred scale, scales, properties) struct", path)?;
    Ok(MonitorMode {
        id: string(&f[0], &child(path, "id"))?,
        width: int32(&f[1], &child(path, "width"))?,
        height: int32(&f[2], &child(path, "height"))?,
        refresh_rate: double(&f[3], &child(path, "refresh_rate"))?,
        preferred_scale: double(&f[4], &child(path, "preferred_scale"))?,
        supported_scales: doubles(&f[5], &child(path, "supported_scales"))?,
        properties: properties_from_value(&f[6], &child(path, "properties"))?,
    })
}

/// Decode a `((ssss)a(siiddada{sv})a{sv})` monitor
pub fn monitor_from_value(value: &Value<'_>, path: &str) -> Result<Monitor, DecodeError> {
    let f = fields(value, 3, "(identity, modes, properties) struct", path)?;
    let modes_path = child(path, "modes");
    let modes = elements(&f[1], "array of modes", &modes_path)?
        .into_iter()
        .enumerate()
        .map(|(i, v)| mode_from_value(v, &item(&modes_path, i)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Monitor {
        id: identity_from_value(&f[0], &child(path, "id"))?,
        modes,
        properties: properties_from_value(&f[2], &child(path, "properties"))?,
    })
}

/// Decode a `(iiduba(ssss)a{sv})` logical monitor
pub fn logical_monitor_from_value(value: &Value<'_>, path: &str) -> Result<LogicalMonitor, DecodeError> {
    let f = fields(value, 7, "(x, y, scale, transform, primary, monitors, properties) struct", path)?;
    let monitors_path = child(path, "monitors");
    let monitors = elements(&f[5], "array of monitor identities", &monitors_path)?
        .into_iter()
        .enumerate()
        .map(|(i, v)| identity_from_value(v, &item(&monitors_path, i)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LogicalMonitor {
        x: int32(&f[0], &child(path, "x"))?,
        y: int32(&f[1], &child(path, "y"))?,
        scale: double(&f[2], &child(path, "scale"))?,
        transform: uint32(&f[3], &child(path, "transform"))?,
        primary: boolean(&f[4], &child(path, "primary"))?,
        monitors,
        properties: properties_from_value(&f[6], &child(path, "properties"))?,
    })
}

/// Decode an `a{sv}` property bag
pub fn properties_from_value(value: &Value<'_>, path: &str) -> Result<Properties, DecodeError> {
    match unboxed(value) {
        Value::Dict(dict) => map_from_dict(dict, path),
        other => Err(shape("a{sv} dictionary", other, path)),
    }
}

fn map_from_dict(dict: &Dict<'_, '_>, path: &str) -> Result<BTreeMap<String, PropertyValue>, DecodeError> {
    let mut map = BTreeMap::new();
    for (key, value) in dict.iter() {
        let key = match unboxed(key) {
            Value::Str(s) => s.as_str().to_string(),
            other => return Err(shape("string key", other, path)),
        };
        let decoded = property_from_value(value, &child(path, &key))?;
        map.insert(key, decoded);
    }
    Ok(map)
}

fn property_from_value(value: &Value<'_>, path: &str) -> Result<PropertyValue, DecodeError> {
    let decoded = match unboxed(value) {
        Value::Bool(b) => PropertyValue::Bool(*b),
        Value::U8(n) => PropertyValue::UInt(u64::from(*n)),
        Value::U16(n) => PropertyValue::UInt(u64::from(*n)),
        Value::U32(n) => PropertyValue::UInt(u64::from(*n)),
        Value::U64(n) => PropertyValue::UInt(*n),
        Value::I16(n) => PropertyValue::Int(i64::from(*n)),
        Value::I32(n) => PropertyValue::Int(i64::from(*n)),
        Value::I64(n) => PropertyValue::Int(*n),
        Value::F64(n) => PropertyValue::Double(*n),
        Value::Str(s) => PropertyValue::Text(s.as_str().to_string()),
        Value::ObjectPath(p) => PropertyValue::Text(p.as_str().to_string()),
        Value::Signature(s) => PropertyValue::Text(s.as_str().to_string()),
        Value::Array(array) => PropertyValue::List(
            array
                .iter()
                .enumerate()
                .map(|(i, v)| property_from_value(v, &item(path, i)))
                .collect::<Result<_, _>>()?,
        ),
        Value::Structure(s) => PropertyValue::List(
            s.fields()
                .iter()
                .enumerate()
                .map(|(i, v)| property_from_value(v, &item(path, i)))
                .collect::<Result<_, _>>()?,
        ),
        Value::Dict(dict) => PropertyValue::Map(map_from_dict(dict, path)?),
        other => return Err(shape("plain property value", other, path)),
    };
    Ok(decoded)
}

/// Encode a property for the wire
///
/// Lists and maps become arrays and dictionaries of variants (`av`, `a{sv}`).
pub fn property_to_value(value: &PropertyValue) -> Value<'_> {
    match value {
        PropertyValue::Bool(b) => Value::from(*b),
        PropertyValue::Int(n) => Value::from(*n),
        PropertyValue::UInt(n) => Value::from(*n),
        PropertyValue::Double(n) => Value::from(*n),
        PropertyValue::Text(s) => Value::from(s.as_str()),
        PropertyValue::List(items) => {
            let items: Vec<Value<'_>> = items.iter().map(property_to_value).collect();
            Value::Array(Array::from(items))
        }
        PropertyValue::Map(map) => Value::Dict(Dict::from(properties_to_map(map))),
    }
}

/// Encode a property bag as the `a{sv}` map zbus serializes
pub fn properties_to_map(properties: &Properties) -> HashMap<&str, Value<'_>> {
    properties
        .iter()
        .map(|(k, v)| (k.as_str(), property_to_value(v)))
        .collect()
}

/// Decode the full `GetCurrentState` reply
///
/// Only the shape is checked here. See [`check_references`] for the join
/// between logical monitors and monitors.
pub fn state_from_structure(envelope: &Structure<'_>) -> Result<StateSnapshot, DecodeError> {
    let f = envelope.fields();
    if f.len() != 4 {
        return Err(DecodeError::Shape {
            expected: "(serial, monitors, logical monitors, properties) reply",
            found: format!("{} fields", f.len()),
            path: "reply".to_string(),
        });
    }

    let serial = uint32(&f[0], "serial")?;
    let monitors = elements(&f[1], "array of monitors", "monitors")?
        .into_iter()
        .enumerate()
        .map(|(i, v)| monitor_from_value(v, &item("monitors", i)))
        .collect::<Result<Vec<_>, _>>()?;
    let logical_monitors = elements(&f[2], "array of logical monitors", "logical_monitors")?
        .into_iter()
        .enumerate()
        .map(|(i, v)| logical_monitor_from_value(v, &item("logical_monitors", i)))
        .collect::<Result<Vec<_>, _>>()?;
    let properties = properties_from_value(&f[3], "properties")?;

    Ok(StateSnapshot {
        serial,
        monitors,
        logical_monitors,
        properties,
    })
}

/// Every identity a logical monitor references must be in the monitor list
pub fn check_references(state: &StateSnapshot) -> Result<(), DecodeError> {
    let known: HashSet<&ConnectorAndMonitorId> = state.monitors.iter().map(|m| &m.id).collect();
    for (i, logical) in state.logical_monitors.iter().enumerate() {
        for (j, id) in logical.monitors.iter().enumerate() {
            if !known.contains(id) {
                return Err(DecodeError::DanglingMonitor {
                    path: item(&child(&item("logical_monitors", i), "monitors"), j),
                    id: id.clone(),
                });
            }
        }
    }
    Ok(())
}
