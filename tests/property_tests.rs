//! Property-based tests for the flat encoder using proptest

use proptest::prelude::*;
use std::sync::Arc;
use tracing_logstore_sink::encoder::{format_complex, format_f32, format_f64};
use tracing_logstore_sink::entry::Entry;
use tracing_logstore_sink::{EncoderConfig, Field, FieldEncoder, Level};

fn level() -> impl Strategy<Value = Level> {
    prop_oneof![
        Just(Level::Debug),
        Just(Level::Info),
        Just(Level::Warn),
        Just(Level::Error),
        Just(Level::DPanic),
        Just(Level::Panic),
        Just(Level::Fatal),
    ]
}

proptest! {
    /// Finite floats parse back to the same value
    #[test]
    fn test_f64_text_roundtrip(value in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
        let text = format_f64(value);
        prop_assert_eq!(text.parse::<f64>().unwrap(), value);
    }

    #[test]
    fn test_f32_text_roundtrip(value in any::<f32>().prop_filter("finite", |v| v.is_finite())) {
        let text = format_f32(value);
        prop_assert_eq!(text.parse::<f32>().unwrap(), value);
    }

    /// Complex numbers always end in `i` and carry exactly one joining sign
    #[test]
    fn test_complex_shape(re in -1e6f64..1e6, im in -1e6f64..1e6) {
        let text = format_complex(re, im);
        prop_assert!(text.ends_with('i'));
        let re_text = format_f64(re);
        let rest = &text[re_text.len()..];
        prop_assert!(rest.starts_with('+') || rest.starts_with('-'));
    }

    /// Level names parse back to the same level
    #[test]
    fn test_level_str_roundtrip(level in level()) {
        let parsed: Level = level.as_str().parse().unwrap();
        prop_assert_eq!(parsed, level);
    }

    /// Fields added to a clone never appear in the original
    #[test]
    fn test_clone_isolation(
        base in proptest::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..8),
        extra in proptest::collection::btree_map("[A-Z]{1,8}", "[a-z0-9]{0,8}", 1..8),
    ) {
        let mut enc = FieldEncoder::new(Arc::new(EncoderConfig::default()));
        let base_fields: Vec<Field> = base.iter().map(|(k, v)| Field::string(k.as_str(), v.as_str())).collect();
        enc.add_fields(&base_fields).unwrap();

        let mut clone = enc.clone();
        let extra_fields: Vec<Field> = extra.iter().map(|(k, v)| Field::string(k.as_str(), v.as_str())).collect();
        clone.add_fields(&extra_fields).unwrap();

        prop_assert_eq!(enc.fields(), &base);
        prop_assert_eq!(clone.fields().len(), base.len() + extra.len());
    }

    /// Finalizing an entry leaves the encoder's own fields untouched
    #[test]
    fn test_encode_entry_is_pure(
        level in level(),
        message in ".{0,32}",
        fields in proptest::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..8),
    ) {
        let enc = FieldEncoder::new(Arc::new(EncoderConfig::production()));
        let entry_fields: Vec<Field> = fields.iter().map(|(k, v)| Field::string(k.as_str(), v.as_str())).collect();
        let flat = enc.encode_entry(&Entry::new(level, message.clone()), &entry_fields).unwrap();

        prop_assert!(enc.fields().is_empty());
        let expected_msg = fields.get("msg").cloned().unwrap_or(message);
        prop_assert_eq!(flat.get("msg"), Some(&expected_msg));
    }
}
