//! Throwaway JSON encoder used for nested object and array values.
//!
//! It carries no standard keys (message, level, time, ...): it only renders
//! the value handed to it and returns the bare JSON fragment. Values are
//! collected into a `serde_json::Value` tree and rendered by `serde_json`;
//! time and duration values honor the formatters of the owning
//! [`EncoderConfig`].

use crate::config::EncoderConfig;
use crate::encoder::{format_complex, format_f32, format_f64};
use crate::error::{Error, Result};
use crate::marshal::{ArrayEncoder, ArrayMarshaler, ObjectEncoder, ObjectMarshaler, Reflect};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

pub struct JsonEncoder<'a> {
    config: &'a EncoderConfig,
    object: Map<String, Value>,
    /// Namespaces opened in the current object, innermost last.
    namespaces: Vec<(String, Map<String, Value>)>,
    elements: Vec<Value>,
}

impl<'a> JsonEncoder<'a> {
    pub fn new(config: &'a EncoderConfig) -> Self {
        JsonEncoder {
            config,
            object: Map::new(),
            namespaces: Vec::new(),
            elements: Vec::new(),
        }
    }

    /// Render `value` as a JSON object fragment, e.g. `{"id":1}`.
    pub fn encode_object(config: &EncoderConfig, key: &str, value: &dyn ObjectMarshaler) -> Result<String> {
        let tree = JsonEncoder::new(config).object_value(value)?;
        render(key, &tree)
    }

    /// Render `value` as a JSON array fragment, e.g. `[1,2]`.
    pub fn encode_array(config: &EncoderConfig, key: &str, value: &dyn ArrayMarshaler) -> Result<String> {
        let tree = JsonEncoder::new(config).array_value(value)?;
        render(key, &tree)
    }

    fn object_value(&self, value: &dyn ObjectMarshaler) -> Result<Value> {
        let mut child = JsonEncoder::new(self.config);
        value.marshal_log_object(&mut child)?;
        Ok(Value::Object(child.into_object()))
    }

    fn array_value(&self, value: &dyn ArrayMarshaler) -> Result<Value> {
        let mut child = JsonEncoder::new(self.config);
        value.marshal_log_array(&mut child)?;
        Ok(Value::Array(child.elements))
    }

    /// Namespaces opened inside an object close with that object.
    fn into_object(mut self) -> Map<String, Value> {
        while let Some((key, map)) = self.namespaces.pop() {
            self.insert(key, Value::Object(map));
        }
        self.object
    }

    fn insert(&mut self, key: impl Into<String>, value: Value) {
        let target = match self.namespaces.last_mut() {
            Some((_, ns)) => ns,
            None => &mut self.object,
        };
        target.insert(key.into(), value);
    }

    fn float_value(&self, formatted: String, finite: bool) -> Value {
        if !finite {
            return Value::String(formatted);
        }
        // Parse the shortest text back so f32 values keep their short form.
        formatted
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map_or(Value::String(formatted), Value::Number)
    }

    fn duration_value(&self, value: chrono::Duration) -> Value {
        match &self.config.encode_duration {
            Some(f) => Value::String(f(value)),
            None => Value::from(duration_ticks(value)),
        }
    }

    fn time_value(&self, value: DateTime<Utc>) -> Value {
        match &self.config.encode_time {
            Some(f) => Value::String(f(value)),
            None => Value::from(value.timestamp_nanos_opt().unwrap_or(if value.timestamp() < 0 {
                i64::MIN
            } else {
                i64::MAX
            })),
        }
    }

    fn reflected_value(&self, key: &str, value: Option<&dyn Reflect>) -> Result<Value> {
        let Some(value) = value else {
            return Ok(Value::Null);
        };
        value.to_json_value().map_err(|source| Error::Json {
            key: key.to_string(),
            source,
        })
    }
}

fn render(key: &str, tree: &Value) -> Result<String> {
    serde_json::to_string(tree).map_err(|source| Error::Json {
        key: key.to_string(),
        source,
    })
}

/// Signed nanosecond ticks, saturating at the i64 range.
pub(crate) fn duration_ticks(value: chrono::Duration) -> i64 {
    value.num_nanoseconds().unwrap_or(if value < chrono::Duration::zero() {
        i64::MIN
    } else {
        i64::MAX
    })
}

impl ObjectEncoder for JsonEncoder<'_> {
    fn add_string(&mut self, key: &str, value: &str) {
        self.insert(key, Value::from(value));
    }

    fn add_bool(&mut self, key: &str, value: bool) {
        self.insert(key, Value::Bool(value));
    }

    fn add_i64(&mut self, key: &str, value: i64) {
        self.insert(key, Value::from(value));
    }

    fn add_u64(&mut self, key: &str, value: u64) {
        self.insert(key, Value::from(value));
    }

    fn add_f64(&mut self, key: &str, value: f64) {
        let v = self.float_value(format_f64(value), value.is_finite());
        self.insert(key, v);
    }

    fn add_f32(&mut self, key: &str, value: f32) {
        let v = self.float_value(format_f32(value), value.is_finite());
        self.insert(key, v);
    }

    fn add_complex128(&mut self, key: &str, re: f64, im: f64) {
        self.insert(key, Value::String(format_complex(re, im)));
    }

    fn add_duration(&mut self, key: &str, value: chrono::Duration) {
        let v = self.duration_value(value);
        self.insert(key, v);
    }

    fn add_time(&mut self, key: &str, value: DateTime<Utc>) {
        let v = self.time_value(value);
        self.insert(key, v);
    }

    fn add_binary(&mut self, key: &str, value: &[u8]) {
        self.insert(key, Value::String(STANDARD.encode(value)));
    }

    fn add_byte_string(&mut self, key: &str, value: &[u8]) {
        self.insert(key, Value::from(String::from_utf8_lossy(value).into_owned()));
    }

    fn add_object(&mut self, key: &str, value: &dyn ObjectMarshaler) -> Result<()> {
        let v = self.object_value(value)?;
        self.insert(key, v);
        Ok(())
    }

    fn add_array(&mut self, key: &str, value: &dyn ArrayMarshaler) -> Result<()> {
        let v = self.array_value(value)?;
        self.insert(key, v);
        Ok(())
    }

    fn add_reflected(&mut self, key: &str, value: Option<&dyn Reflect>) -> Result<()> {
        let v = self.reflected_value(key, value)?;
        self.insert(key, v);
        Ok(())
    }

    fn open_namespace(&mut self, key: &str) {
        self.namespaces.push((key.to_string(), Map::new()));
    }
}

impl ArrayEncoder for JsonEncoder<'_> {
    fn append_string(&mut self, value: &str) {
        self.elements.push(Value::from(value));
    }

    fn append_bool(&mut self, value: bool) {
        self.elements.push(Value::Bool(value));
    }

    fn append_i64(&mut self, value: i64) {
        self.elements.push(Value::from(value));
    }

    fn append_u64(&mut self, value: u64) {
        self.elements.push(Value::from(value));
    }

    fn append_f64(&mut self, value: f64) {
        let v = self.float_value(format_f64(value), value.is_finite());
        self.elements.push(v);
    }

    fn append_f32(&mut self, value: f32) {
        let v = self.float_value(format_f32(value), value.is_finite());
        self.elements.push(v);
    }

    fn append_complex128(&mut self, re: f64, im: f64) {
        self.elements.push(Value::String(format_complex(re, im)));
    }

    fn append_duration(&mut self, value: chrono::Duration) {
        let v = self.duration_value(value);
        self.elements.push(v);
    }

    fn append_time(&mut self, value: DateTime<Utc>) {
        let v = self.time_value(value);
        self.elements.push(v);
    }

    fn append_byte_string(&mut self, value: &[u8]) {
        self.elements
            .push(Value::from(String::from_utf8_lossy(value).into_owned()));
    }

    fn append_object(&mut self, value: &dyn ObjectMarshaler) -> Result<()> {
        let v = self.object_value(value)?;
        self.elements.push(v);
        Ok(())
    }

    fn append_array(&mut self, value: &dyn ArrayMarshaler) -> Result<()> {
        let v = self.array_value(value)?;
        self.elements.push(v);
        Ok(())
    }

    fn append_reflected(&mut self, value: Option<&dyn Reflect>) -> Result<()> {
        let v = self.reflected_value("", value)?;
        self.elements.push(v);
        Ok(())
    }
}
