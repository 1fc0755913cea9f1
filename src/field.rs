use crate::error::Result;
use crate::marshal::{ArrayMarshaler, ObjectEncoder, ObjectMarshaler, Reflect};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Typed value carried by a [`Field`].
#[derive(Clone)]
pub enum FieldValue {
    Bool(bool),
    I64(i64),
    I32(i32),
    I16(i16),
    I8(i8),
    /// Platform-native signed integer, widened to 64 bits when encoded.
    Isize(isize),
    U64(u64),
    U32(u32),
    U16(u16),
    U8(u8),
    Usize(usize),
    F64(f64),
    F32(f32),
    Complex128(f64, f64),
    Complex64(f32, f32),
    Duration(chrono::Duration),
    Time(DateTime<Utc>),
    Binary(Vec<u8>),
    ByteString(Vec<u8>),
    String(String),
    Object(Arc<dyn ObjectMarshaler>),
    Array(Arc<dyn ArrayMarshaler>),
    Reflected(Option<Arc<dyn Reflect>>),
    Error(Arc<dyn std::error::Error + Send + Sync>),
    Namespace,
    Skip,
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(v) => write!(f, "Bool({})", v),
            FieldValue::I64(v) => write!(f, "I64({})", v),
            FieldValue::I32(v) => write!(f, "I32({})", v),
            FieldValue::I16(v) => write!(f, "I16({})", v),
            FieldValue::I8(v) => write!(f, "I8({})", v),
            FieldValue::Isize(v) => write!(f, "Isize({})", v),
            FieldValue::U64(v) => write!(f, "U64({})", v),
            FieldValue::U32(v) => write!(f, "U32({})", v),
            FieldValue::U16(v) => write!(f, "U16({})", v),
            FieldValue::U8(v) => write!(f, "U8({})", v),
            FieldValue::Usize(v) => write!(f, "Usize({})", v),
            FieldValue::F64(v) => write!(f, "F64({})", v),
            FieldValue::F32(v) => write!(f, "F32({})", v),
            FieldValue::Complex128(r, i) => write!(f, "Complex128({}, {})", r, i),
            FieldValue::Complex64(r, i) => write!(f, "Complex64({}, {})", r, i),
            FieldValue::Duration(v) => write!(f, "Duration({})", v),
            FieldValue::Time(v) => write!(f, "Time({})", v),
            FieldValue::Binary(v) => write!(f, "Binary({} bytes)", v.len()),
            FieldValue::ByteString(v) => write!(f, "ByteString({:?})", String::from_utf8_lossy(v)),
            FieldValue::String(v) => write!(f, "String({:?})", v),
            FieldValue::Object(_) => f.write_str("Object(..)"),
            FieldValue::Array(_) => f.write_str("Array(..)"),
            FieldValue::Reflected(Some(_)) => f.write_str("Reflected(..)"),
            FieldValue::Reflected(None) => f.write_str("Reflected(null)"),
            FieldValue::Error(e) => write!(f, "Error({})", e),
            FieldValue::Namespace => f.write_str("Namespace"),
            FieldValue::Skip => f.write_str("Skip"),
        }
    }
}

/// A typed key/value pair attached to an entry or a scoped core.
#[derive(Debug, Clone)]
pub struct Field {
    pub key: String,
    pub value: FieldValue,
}

impl Field {
    pub fn new(key: impl Into<String>, value: FieldValue) -> Self {
        Field {
            key: key.into(),
            value,
        }
    }

    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Field::new(key, FieldValue::Bool(value))
    }

    pub fn i64(key: impl Into<String>, value: i64) -> Self {
        Field::new(key, FieldValue::I64(value))
    }

    pub fn i32(key: impl Into<String>, value: i32) -> Self {
        Field::new(key, FieldValue::I32(value))
    }

    pub fn i16(key: impl Into<String>, value: i16) -> Self {
        Field::new(key, FieldValue::I16(value))
    }

    pub fn i8(key: impl Into<String>, value: i8) -> Self {
        Field::new(key, FieldValue::I8(value))
    }

    pub fn isize(key: impl Into<String>, value: isize) -> Self {
        Field::new(key, FieldValue::Isize(value))
    }

    pub fn u64(key: impl Into<String>, value: u64) -> Self {
        Field::new(key, FieldValue::U64(value))
    }

    pub fn u32(key: impl Into<String>, value: u32) -> Self {
        Field::new(key, FieldValue::U32(value))
    }

    pub fn u16(key: impl Into<String>, value: u16) -> Self {
        Field::new(key, FieldValue::U16(value))
    }

    pub fn u8(key: impl Into<String>, value: u8) -> Self {
        Field::new(key, FieldValue::U8(value))
    }

    pub fn usize(key: impl Into<String>, value: usize) -> Self {
        Field::new(key, FieldValue::Usize(value))
    }

    pub fn f64(key: impl Into<String>, value: f64) -> Self {
        Field::new(key, FieldValue::F64(value))
    }

    pub fn f32(key: impl Into<String>, value: f32) -> Self {
        Field::new(key, FieldValue::F32(value))
    }

    pub fn complex128(key: impl Into<String>, re: f64, im: f64) -> Self {
        Field::new(key, FieldValue::Complex128(re, im))
    }

    pub fn complex64(key: impl Into<String>, re: f32, im: f32) -> Self {
        Field::new(key, FieldValue::Complex64(re, im))
    }

    pub fn duration(key: impl Into<String>, value: chrono::Duration) -> Self {
        Field::new(key, FieldValue::Duration(value))
    }

    /// Durations beyond the signed range saturate.
    pub fn std_duration(key: impl Into<String>, value: std::time::Duration) -> Self {
        let value = chrono::Duration::from_std(value).unwrap_or(chrono::Duration::MAX);
        Field::duration(key, value)
    }

    pub fn time(key: impl Into<String>, value: DateTime<Utc>) -> Self {
        Field::new(key, FieldValue::Time(value))
    }

    pub fn binary(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Field::new(key, FieldValue::Binary(value.into()))
    }

    pub fn byte_string(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Field::new(key, FieldValue::ByteString(value.into()))
    }

    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Field::new(key, FieldValue::String(value.into()))
    }

    pub fn object(key: impl Into<String>, value: impl ObjectMarshaler + 'static) -> Self {
        Field::new(key, FieldValue::Object(Arc::new(value)))
    }

    pub fn array(key: impl Into<String>, value: impl ArrayMarshaler + 'static) -> Self {
        Field::new(key, FieldValue::Array(Arc::new(value)))
    }

    /// Any serializable value, rendered as JSON text.
    pub fn reflected<T>(key: impl Into<String>, value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        Field::new(key, FieldValue::Reflected(Some(Arc::new(value))))
    }

    /// Absent value, rendered as `null`.
    pub fn null(key: impl Into<String>) -> Self {
        Field::new(key, FieldValue::Reflected(None))
    }

    /// Error rendered through `Display` under the key `error`.
    pub fn error(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Field::named_error("error", err)
    }

    pub fn named_error(key: impl Into<String>, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Field::new(key, FieldValue::Error(Arc::new(err)))
    }

    pub fn namespace(key: impl Into<String>) -> Self {
        Field::new(key, FieldValue::Namespace)
    }

    /// A field that adds nothing, for conditional construction.
    pub fn skip() -> Self {
        Field::new("", FieldValue::Skip)
    }

    /// Write this field into `enc` using the rule for its value type.
    pub fn add_to(&self, enc: &mut dyn ObjectEncoder) -> Result<()> {
        let key = self.key.as_str();
        match &self.value {
            FieldValue::Bool(v) => enc.add_bool(key, *v),
            FieldValue::I64(v) => enc.add_i64(key, *v),
            FieldValue::I32(v) => enc.add_i32(key, *v),
            FieldValue::I16(v) => enc.add_i16(key, *v),
            FieldValue::I8(v) => enc.add_i8(key, *v),
            FieldValue::Isize(v) => enc.add_isize(key, *v),
            FieldValue::U64(v) => enc.add_u64(key, *v),
            FieldValue::U32(v) => enc.add_u32(key, *v),
            FieldValue::U16(v) => enc.add_u16(key, *v),
            FieldValue::U8(v) => enc.add_u8(key, *v),
            FieldValue::Usize(v) => enc.add_usize(key, *v),
            FieldValue::F64(v) => enc.add_f64(key, *v),
            FieldValue::F32(v) => enc.add_f32(key, *v),
            FieldValue::Complex128(r, i) => enc.add_complex128(key, *r, *i),
            FieldValue::Complex64(r, i) => enc.add_complex64(key, *r, *i),
            FieldValue::Duration(v) => enc.add_duration(key, *v),
            FieldValue::Time(v) => enc.add_time(key, *v),
            FieldValue::Binary(v) => enc.add_binary(key, v),
            FieldValue::ByteString(v) => enc.add_byte_string(key, v),
            FieldValue::String(v) => enc.add_string(key, v),
            FieldValue::Object(m) => enc.add_object(key, m.as_ref())?,
            FieldValue::Array(m) => enc.add_array(key, m.as_ref())?,
            FieldValue::Reflected(v) => enc.add_reflected(key, v.as_deref())?,
            FieldValue::Error(e) => enc.add_string(key, &e.to_string()),
            FieldValue::Namespace => enc.open_namespace(key),
            FieldValue::Skip => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncoderConfig;
    use crate::encoder::FieldEncoder;
    use crate::marshal::ObjectMarshalerFn;

    fn encode(fields: &[Field]) -> crate::encoder::FlatMap {
        let mut enc = FieldEncoder::new(Arc::new(EncoderConfig::default()));
        enc.add_fields(fields).unwrap();
        enc.fields().clone()
    }

    #[test]
    fn dispatches_each_kind() {
        let m = encode(&[
            Field::bool("ok", true),
            Field::i32("i32", -5),
            Field::isize("native", isize::MAX),
            Field::u8("u8", 255),
            Field::f32("ratio", 0.25),
            Field::complex128("z", 3.0, -2.0),
            Field::std_duration("wait", std::time::Duration::from_millis(2)),
            Field::binary("blob", vec![0x00, 0xFF]),
            Field::byte_string("bytes", &b"abc"[..]),
            Field::string("user", "alice"),
            Field::reflected("tags", vec!["a", "b"]),
            Field::null("nothing"),
        ]);
        assert_eq!(m["ok"], "true");
        assert_eq!(m["i32"], "-5");
        assert_eq!(m["native"], isize::MAX.to_string());
        assert_eq!(m["u8"], "255");
        assert_eq!(m["ratio"], "0.25");
        assert_eq!(m["z"], "3-2i");
        assert_eq!(m["wait"], "2000000");
        assert_eq!(m["blob"], "AP8=");
        assert_eq!(m["bytes"], "abc");
        assert_eq!(m["user"], "alice");
        assert_eq!(m["tags"], r#"["a","b"]"#);
        assert_eq!(m["nothing"], "null");
    }

    #[test]
    fn error_field_uses_display() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "config missing");
        let m = encode(&[Field::error(io)]);
        assert_eq!(m["error"], "config missing");
    }

    #[test]
    fn namespace_and_skip_add_nothing() {
        let m = encode(&[Field::namespace("req"), Field::skip(), Field::string("id", "9")]);
        assert_eq!(m.len(), 1);
        assert_eq!(m["id"], "9");
    }

    #[test]
    fn later_fields_overwrite_earlier() {
        let m = encode(&[Field::string("k", "first"), Field::i64("k", 2)]);
        assert_eq!(m["k"], "2");
    }

    #[test]
    fn object_field_debug_is_opaque() {
        let f = Field::object("o", ObjectMarshalerFn::new(|_| Ok(())));
        assert_eq!(format!("{:?}", f.value), "Object(..)");
    }
}
