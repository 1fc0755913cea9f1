//! Encoder traits and the self-describing marshaling capability.
//!
//! [`Field`](crate::field::Field) values are dispatched onto an
//! [`ObjectEncoder`]; nested objects and arrays describe themselves through
//! [`ObjectMarshaler`] / [`ArrayMarshaler`], and anything else that is
//! `serde::Serialize` goes through [`Reflect`].

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Receives typed key/value pairs.
///
/// Narrow integer widths default to the 64-bit methods; `isize`/`usize` are
/// widened the same way.
pub trait ObjectEncoder {
    fn add_string(&mut self, key: &str, value: &str);
    fn add_bool(&mut self, key: &str, value: bool);
    fn add_i64(&mut self, key: &str, value: i64);
    fn add_u64(&mut self, key: &str, value: u64);
    fn add_f64(&mut self, key: &str, value: f64);
    fn add_f32(&mut self, key: &str, value: f32);
    fn add_complex128(&mut self, key: &str, re: f64, im: f64);
    fn add_duration(&mut self, key: &str, value: chrono::Duration);
    fn add_time(&mut self, key: &str, value: DateTime<Utc>);
    fn add_binary(&mut self, key: &str, value: &[u8]);
    fn add_byte_string(&mut self, key: &str, value: &[u8]);
    fn add_object(&mut self, key: &str, value: &dyn ObjectMarshaler) -> Result<()>;
    fn add_array(&mut self, key: &str, value: &dyn ArrayMarshaler) -> Result<()>;
    /// `None` encodes as JSON `null`.
    fn add_reflected(&mut self, key: &str, value: Option<&dyn Reflect>) -> Result<()>;
    fn open_namespace(&mut self, key: &str);

    fn add_i32(&mut self, key: &str, value: i32) {
        self.add_i64(key, i64::from(value));
    }
    fn add_i16(&mut self, key: &str, value: i16) {
        self.add_i64(key, i64::from(value));
    }
    fn add_i8(&mut self, key: &str, value: i8) {
        self.add_i64(key, i64::from(value));
    }
    fn add_isize(&mut self, key: &str, value: isize) {
        self.add_i64(key, value as i64);
    }
    fn add_u32(&mut self, key: &str, value: u32) {
        self.add_u64(key, u64::from(value));
    }
    fn add_u16(&mut self, key: &str, value: u16) {
        self.add_u64(key, u64::from(value));
    }
    fn add_u8(&mut self, key: &str, value: u8) {
        self.add_u64(key, u64::from(value));
    }
    fn add_usize(&mut self, key: &str, value: usize) {
        self.add_u64(key, value as u64);
    }
    /// Widened to the 128-bit path, including the float formatting.
    fn add_complex64(&mut self, key: &str, re: f32, im: f32) {
        self.add_complex128(key, f64::from(re), f64::from(im));
    }
}

/// Receives the elements of a nested array.
pub trait ArrayEncoder {
    fn append_string(&mut self, value: &str);
    fn append_bool(&mut self, value: bool);
    fn append_i64(&mut self, value: i64);
    fn append_u64(&mut self, value: u64);
    fn append_f64(&mut self, value: f64);
    fn append_f32(&mut self, value: f32);
    fn append_complex128(&mut self, re: f64, im: f64);
    fn append_duration(&mut self, value: chrono::Duration);
    fn append_time(&mut self, value: DateTime<Utc>);
    fn append_byte_string(&mut self, value: &[u8]);
    fn append_object(&mut self, value: &dyn ObjectMarshaler) -> Result<()>;
    fn append_array(&mut self, value: &dyn ArrayMarshaler) -> Result<()>;
    fn append_reflected(&mut self, value: Option<&dyn Reflect>) -> Result<()>;

    fn append_i32(&mut self, value: i32) {
        self.append_i64(i64::from(value));
    }
    fn append_u32(&mut self, value: u32) {
        self.append_u64(u64::from(value));
    }
}

/// A value that knows how to write itself as a set of fields.
pub trait ObjectMarshaler: Send + Sync {
    fn marshal_log_object(&self, enc: &mut dyn ObjectEncoder) -> Result<()>;
}

/// A value that knows how to write itself as a sequence of elements.
pub trait ArrayMarshaler: Send + Sync {
    fn marshal_log_array(&self, enc: &mut dyn ArrayEncoder) -> Result<()>;
}

/// Fallback capability for values without a dedicated rule: JSON via serde.
pub trait Reflect: Send + Sync {
    fn write_json(&self, out: &mut Vec<u8>) -> serde_json::Result<()>;

    /// Same value as a tree, for embedding into a nested fragment.
    fn to_json_value(&self) -> serde_json::Result<serde_json::Value>;
}

impl<T> Reflect for T
where
    T: Serialize + Send + Sync,
{
    fn write_json(&self, out: &mut Vec<u8>) -> serde_json::Result<()> {
        serde_json::to_writer(out, self)
    }

    fn to_json_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// Adapts a closure into an [`ObjectMarshaler`].
pub struct ObjectMarshalerFn<F>(pub F);

impl<F> ObjectMarshalerFn<F>
where
    F: Fn(&mut dyn ObjectEncoder) -> Result<()> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        ObjectMarshalerFn(f)
    }
}

impl<F> ObjectMarshaler for ObjectMarshalerFn<F>
where
    F: Fn(&mut dyn ObjectEncoder) -> Result<()> + Send + Sync,
{
    fn marshal_log_object(&self, enc: &mut dyn ObjectEncoder) -> Result<()> {
        (self.0)(enc)
    }
}

/// Adapts a closure into an [`ArrayMarshaler`].
pub struct ArrayMarshalerFn<F>(pub F);

impl<F> ArrayMarshalerFn<F>
where
    F: Fn(&mut dyn ArrayEncoder) -> Result<()> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        ArrayMarshalerFn(f)
    }
}

impl<F> ArrayMarshaler for ArrayMarshalerFn<F>
where
    F: Fn(&mut dyn ArrayEncoder) -> Result<()> + Send + Sync,
{
    fn marshal_log_array(&self, enc: &mut dyn ArrayEncoder) -> Result<()> {
        (self.0)(enc)
    }
}

impl ArrayMarshaler for Vec<String> {
    fn marshal_log_array(&self, enc: &mut dyn ArrayEncoder) -> Result<()> {
        for s in self {
            enc.append_string(s);
        }
        Ok(())
    }
}

impl ArrayMarshaler for Vec<i64> {
    fn marshal_log_array(&self, enc: &mut dyn ArrayEncoder) -> Result<()> {
        for v in self {
            enc.append_i64(*v);
        }
        Ok(())
    }
}

impl ArrayMarshaler for Vec<f64> {
    fn marshal_log_array(&self, enc: &mut dyn ArrayEncoder) -> Result<()> {
        for v in self {
            enc.append_f64(*v);
        }
        Ok(())
    }
}

impl ArrayMarshaler for Vec<bool> {
    fn marshal_log_array(&self, enc: &mut dyn ArrayEncoder) -> Result<()> {
        for v in self {
            enc.append_bool(*v);
        }
        Ok(())
    }
}
