//! Flat string-map encoder.
//!
//! Every field lands in a single `key -> string` map; later writes to the
//! same key win. Namespaces are ignored, nested objects and arrays are stored
//! as their JSON fragment, and values with no dedicated rule are serialized
//! with `serde_json`.

use crate::config::EncoderConfig;
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::json::{duration_ticks, JsonEncoder};
use crate::marshal::{ArrayMarshaler, ObjectEncoder, ObjectMarshaler, Reflect};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Finalized representation of one entry.
pub type FlatMap = BTreeMap<String, String>;

const NULL_LITERAL: &str = "null";

/// Shortest decimal string that parses back to exactly `value`.
///
/// NaN and the infinities become `NaN`, `+Inf` and `-Inf`.
pub fn format_f64(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

/// Like [`format_f64`] but shortest at single precision.
pub fn format_f32(value: f32) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f32::INFINITY {
        "+Inf".to_string()
    } else if value == f32::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

/// `<re>+<im>i`; a negative imaginary part supplies its own sign.
pub fn format_complex(re: f64, im: f64) -> String {
    let re = format_f64(re);
    let im = format_f64(im);
    if im.starts_with('-') || im.starts_with('+') {
        format!("{}{}i", re, im)
    } else {
        format!("{}+{}i", re, im)
    }
}

/// Accumulates fields into a flat map and finalizes entries.
///
/// Cloning copies the field map and shares the configuration.
pub struct FieldEncoder {
    config: Arc<EncoderConfig>,
    fields: FlatMap,
    reflect_buf: Vec<u8>,
}

impl FieldEncoder {
    pub fn new(config: Arc<EncoderConfig>) -> Self {
        FieldEncoder {
            config,
            fields: FlatMap::new(),
            reflect_buf: Vec::new(),
        }
    }

    pub fn config(&self) -> &Arc<EncoderConfig> {
        &self.config
    }

    /// Fields accumulated so far.
    pub fn fields(&self) -> &FlatMap {
        &self.fields
    }

    pub fn add_fields(&mut self, fields: &[Field]) -> Result<()> {
        for field in fields {
            field.add_to(self)?;
        }
        Ok(())
    }

    /// Produce the flat map for `entry`.
    ///
    /// Works on a clone: `self` keeps only its accumulated base fields. Entry
    /// fields are merged after the metadata keys so that an entry field
    /// sharing a name with a metadata key wins, as does the stack trace.
    pub fn encode_entry(&self, entry: &Entry, fields: &[Field]) -> Result<FlatMap> {
        let mut fin = self.clone();
        let cfg = Arc::clone(&self.config);

        if !cfg.level_key.is_empty() {
            fin.add_string(&cfg.level_key, &cfg.format_level(entry.level));
        }
        if !cfg.time_key.is_empty() {
            fin.add_time(&cfg.time_key, entry.time);
        }
        if !entry.logger_name.is_empty() && !cfg.name_key.is_empty() {
            let name = match &cfg.encode_name {
                Some(f) => f(&entry.logger_name),
                None => entry.logger_name.clone(),
            };
            fin.add_string(&cfg.name_key, &name);
        }
        if let Some(caller) = &entry.caller {
            // No default caller rendering exists.
            if let Some(f) = cfg.encode_caller.as_ref().filter(|_| !cfg.caller_key.is_empty()) {
                fin.add_string(&cfg.caller_key, &f(caller));
            }
            if !cfg.function_key.is_empty() {
                fin.add_string(&cfg.function_key, &caller.function);
            }
        }
        if !cfg.message_key.is_empty() {
            fin.add_string(&cfg.message_key, &entry.message);
        }

        fin.add_fields(fields)?;

        if !entry.stack.is_empty() && !cfg.stacktrace_key.is_empty() {
            fin.add_string(&cfg.stacktrace_key, &entry.stack);
        }

        Ok(fin.fields)
    }

    fn encode_reflected(&mut self, key: &str, value: Option<&dyn Reflect>) -> Result<String> {
        let Some(value) = value else {
            return Ok(NULL_LITERAL.to_string());
        };
        self.reflect_buf.clear();
        value
            .write_json(&mut self.reflect_buf)
            .map_err(|source| Error::Json {
                key: key.to_string(),
                source,
            })?;
        if self.reflect_buf.last() == Some(&b'\n') {
            self.reflect_buf.pop();
        }
        String::from_utf8(self.reflect_buf.clone()).map_err(|e| Error::encoding(key, e.to_string()))
    }
}

impl Clone for FieldEncoder {
    fn clone(&self) -> Self {
        FieldEncoder {
            config: Arc::clone(&self.config),
            fields: self.fields.clone(),
            reflect_buf: Vec::new(),
        }
    }
}

impl ObjectEncoder for FieldEncoder {
    fn add_string(&mut self, key: &str, value: &str) {
        self.fields.insert(key.to_string(), value.to_string());
    }

    fn add_bool(&mut self, key: &str, value: bool) {
        self.add_string(key, if value { "true" } else { "false" });
    }

    fn add_i64(&mut self, key: &str, value: i64) {
        self.add_string(key, &value.to_string());
    }

    fn add_u64(&mut self, key: &str, value: u64) {
        self.add_string(key, &value.to_string());
    }

    fn add_f64(&mut self, key: &str, value: f64) {
        self.add_string(key, &format_f64(value));
    }

    fn add_f32(&mut self, key: &str, value: f32) {
        self.add_string(key, &format_f32(value));
    }

    fn add_complex128(&mut self, key: &str, re: f64, im: f64) {
        self.add_string(key, &format_complex(re, im));
    }

    /// Integer nanosecond ticks; the duration formatter only applies to
    /// nested values.
    fn add_duration(&mut self, key: &str, value: chrono::Duration) {
        self.add_i64(key, duration_ticks(value));
    }

    fn add_time(&mut self, key: &str, value: DateTime<Utc>) {
        let formatted = self.config.format_time(value);
        self.add_string(key, &formatted);
    }

    fn add_binary(&mut self, key: &str, value: &[u8]) {
        self.add_string(key, &STANDARD.encode(value));
    }

    fn add_byte_string(&mut self, key: &str, value: &[u8]) {
        self.add_string(key, &String::from_utf8_lossy(value));
    }

    fn add_object(&mut self, key: &str, value: &dyn ObjectMarshaler) -> Result<()> {
        let json = JsonEncoder::encode_object(&self.config, key, value)?;
        self.add_string(key, &json);
        Ok(())
    }

    fn add_array(&mut self, key: &str, value: &dyn ArrayMarshaler) -> Result<()> {
        let json = JsonEncoder::encode_array(&self.config, key, value)?;
        self.add_string(key, &json);
        Ok(())
    }

    fn add_reflected(&mut self, key: &str, value: Option<&dyn Reflect>) -> Result<()> {
        let json = self.encode_reflected(key, value)?;
        self.add_string(key, &json);
        Ok(())
    }

    fn open_namespace(&mut self, _key: &str) {}
}
