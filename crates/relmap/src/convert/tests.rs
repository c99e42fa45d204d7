use super::*;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Timelike, Utc};
use rust_decimal::Decimal;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn convert<D: ValueType>(value: impl ValueType) -> OrmResult<D> {
    TypeConverter::convert_to::<D>(Value::new(value))
}

#[test]
fn null_stays_null() {
    let out = TypeConverter::convert(None, TypeKey::of::<String>()).unwrap();
    assert!(out.is_none());
}

#[test]
fn same_type_is_returned_unchanged() {
    let v = Value::new(42_i64);
    let out = TypeConverter::convert(Some(v.clone()), TypeKey::of::<i64>()).unwrap();
    assert_eq!(out, Some(v));
}

#[test]
fn narrowing_rejects_values_that_do_not_round_trip() {
    assert!(convert::<u8>(300_i32).unwrap_err().is_conversion());
    assert!(convert::<i8>(300_i64).is_err());
    assert!(convert::<u32>(-1_i64).is_err());
    assert_eq!(convert::<u8>(255_i64).unwrap(), 255);
    assert_eq!(convert::<i16>(-5_i8).unwrap(), -5);
}

#[test]
fn string_integer_round_trip() {
    let text: String = convert(12345_i32).unwrap();
    assert_eq!(text, "12345");
    let back: i32 = convert(text).unwrap();
    assert_eq!(back, 12345);
    assert!(convert::<i32>("12x".to_string()).is_err());
}

#[test]
fn boolean_accepts_only_zero_and_one() {
    assert!(convert::<bool>(1_i32).unwrap());
    assert!(!convert::<bool>(0_u8).unwrap());
    assert!(convert::<bool>(2_i64).is_err());
    assert!(convert::<bool>('1').unwrap());
    assert!(convert::<bool>('x').is_err());
    assert_eq!(convert::<i16>(true).unwrap(), 1);
}

#[test]
fn float_narrowing_must_be_exact() {
    assert_eq!(convert::<f32>(0.5_f64).unwrap(), 0.5);
    assert!(convert::<f32>(0.1_f64).is_err());
    assert_eq!(convert::<i64>(3.0_f64).unwrap(), 3);
    assert!(convert::<i64>(3.5_f64).is_err());
    assert!(convert::<i64>(9_223_372_036_854_775_808.0_f64).is_err());
    assert_eq!(convert::<i64>(-9_223_372_036_854_775_808.0_f64).unwrap(), i64::MIN);
    assert!(convert::<u64>(-1.0_f64).is_err());
    assert_eq!(convert::<u64>(1024.0_f64).unwrap(), 1024);
}

#[test]
fn floats_and_decimals_narrow_to_small_integers() {
    assert_eq!(convert::<i32>(2.0_f64).unwrap(), 2);
    assert_eq!(convert::<u16>(2.0_f32).unwrap(), 2);
    assert!(convert::<i8>(200.0_f64).is_err());
    assert!(convert::<i32>(2.5_f64).is_err());

    assert_eq!(convert::<i32>(Decimal::from(5)).unwrap(), 5);
    assert!(convert::<u8>(Decimal::from(300)).unwrap_err().is_conversion());
    assert!(convert::<i16>(Decimal::new(15, 1)).is_err());
    assert_eq!(convert::<u64>(Decimal::from(u64::MAX)).unwrap(), u64::MAX);
}

#[test]
fn decimal_conversions() {
    let d: Decimal = convert("12.50".to_string()).unwrap();
    assert_eq!(d.to_string(), "12.50");
    assert!(convert::<i64>(d).is_err());
    let whole: Decimal = convert(7_i32).unwrap();
    assert_eq!(convert::<i64>(whole).unwrap(), 7);
}

#[test]
fn char_requires_exactly_one_character() {
    assert_eq!(convert::<char>("a".to_string()).unwrap(), 'a');
    assert!(convert::<char>("ab".to_string()).is_err());
    assert!(convert::<char>(String::new()).is_err());
}

#[test]
fn missing_converter_is_reported_with_both_types() {
    #[derive(Debug, Clone, PartialEq)]
    struct Opaque;

    let err = TypeConverter::get_for::<Opaque, i64>().unwrap_err();
    match err {
        OrmError::ConversionNotFound { from, to } => {
            assert!(from.ends_with("Opaque"));
            assert_eq!(to, "i64");
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = TypeConverter::convert(Some(Value::new(Opaque)), TypeKey::of::<i64>()).unwrap_err();
    assert!(matches!(err, OrmError::ConversionFailed { .. }));
}

#[test]
fn interface_fallback_is_cached_under_the_direct_key() {
    #[derive(Debug, Clone, PartialEq)]
    struct Meters(i32);

    register_interface(|m: Meters| m.0);

    let source = TypeKey::of::<Meters>();
    let destination = TypeKey::of::<String>();
    assert!(!TypeConverter::is_registered(source, destination));

    let out = TypeConverter::convert(Some(Value::new(Meters(5))), destination).unwrap();
    assert_eq!(out, Some(Value::new("5".to_string())));
    assert!(TypeConverter::is_registered(source, destination));

    let again: String = convert(Meters(6)).unwrap();
    assert_eq!(again, "6");
}

#[test]
fn superclass_chain_is_searched_after_interfaces() {
    #[derive(Debug, Clone, PartialEq)]
    struct Base(i64);
    #[derive(Debug, Clone, PartialEq)]
    struct Derived(i64);

    register_superclass(|d: Derived| Base(d.0));
    TypeConverter::new(|b: Base| Ok::<_, String>(format!("base:{}", b.0))).register();

    let out: String = convert(Derived(9)).unwrap();
    assert_eq!(out, "base:9");
}

#[test]
fn user_converter_replaces_existing_key() {
    #[derive(Debug, Clone, PartialEq)]
    struct Code(u16);

    TypeConverter::new(|c: Code| Ok::<_, String>(format!("A{}", c.0))).register();
    TypeConverter::new(|c: Code| Ok::<_, String>(format!("B{}", c.0))).register();
    assert_eq!(convert::<String>(Code(1)).unwrap(), "B1");
}

#[test]
fn chain_through_explicit_middle_type() {
    let chain = TypeConverter::chain::<String, NaiveDate, SystemTime>().unwrap();
    let out = chain.apply(Value::new("1970-01-02".to_string())).unwrap();
    let expected = UNIX_EPOCH + Duration::from_secs(86_400);
    assert_eq!(out.take::<SystemTime>().unwrap(), expected);

    let err = chain.apply(Value::new("not a date".to_string())).unwrap_err();
    assert!(err.is_conversion());
}

#[test]
fn fraction_digits_follow_the_nanosecond_remainder() {
    assert_eq!(fraction_digits(0), 0);
    assert_eq!(fraction_digits(500_000_000), 1);
    assert_eq!(fraction_digits(123_000_000), 3);
    assert_eq!(fraction_digits(123_456), 6);
    assert_eq!(fraction_digits(1), 9);
    assert_eq!(format_fraction(120_000_000), ".12");
    assert_eq!(format_fraction(0), "");
}

#[test]
fn date_time_text_uses_minimal_precision() {
    let dt = NaiveDate::from_ymd_opt(2024, 5, 6)
        .unwrap()
        .and_hms_nano_opt(7, 8, 9, 250_000_000)
        .unwrap();
    let text: String = convert(dt).unwrap();
    assert_eq!(text, "2024-05-06T07:08:09.25");
    let back: NaiveDateTime = convert(text).unwrap();
    assert_eq!(back, dt);

    let whole = dt.with_nanosecond(0).unwrap();
    assert_eq!(convert::<String>(whole).unwrap(), "2024-05-06T07:08:09");
}

#[test]
fn instants_convert_through_epoch_millis() {
    let t = UNIX_EPOCH + Duration::from_millis(1_500);
    let utc: DateTime<Utc> = convert(t).unwrap();
    assert_eq!(utc.timestamp_millis(), 1_500);
    assert_eq!(convert::<String>(utc).unwrap(), "1970-01-01T00:00:01.5Z");
    let millis: i64 = convert(t).unwrap();
    assert_eq!(millis, 1_500);
    let back: SystemTime = convert(millis).unwrap();
    assert_eq!(back, t);
}

#[test]
fn offset_date_time_text_round_trip() {
    let dt: DateTime<FixedOffset> = convert("2024-01-02T03:04:05.1+09:00".to_string()).unwrap();
    assert_eq!(dt.offset().local_minus_utc(), 9 * 3600);
    assert_eq!(convert::<String>(dt).unwrap(), "2024-01-02T03:04:05.1+09:00");
}

#[test]
fn local_date_time_uses_superclass_converters() {
    let utc = DateTime::from_timestamp_millis(0).unwrap();
    let local: chrono::DateTime<chrono::Local> = convert(utc).unwrap();
    let again: DateTime<Utc> = convert(local).unwrap();
    assert_eq!(again, utc);
}
