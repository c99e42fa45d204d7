//! Date/time converters.
//!
//! `SystemTime` travels through epoch milliseconds. Text forms are ISO-8601
//! with as many fractional-second digits as the value needs (0 to 9).

use super::{Tables, TypeConverter};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Number of fractional-second digits needed to print `nanos` without loss.
pub fn fraction_digits(nanos: u32) -> usize {
    let mut n = nanos % 1_000_000_000;
    if n == 0 {
        return 0;
    }
    let mut digits = 9;
    while n % 10 == 0 {
        n /= 10;
        digits -= 1;
    }
    digits
}

/// `".123"`-style fraction for `nanos`, or an empty string for whole seconds.
pub fn format_fraction(nanos: u32) -> String {
    let n = nanos % 1_000_000_000;
    let digits = fraction_digits(n);
    if digits == 0 {
        return String::new();
    }
    let padded = format!("{n:09}");
    format!(".{}", &padded[..digits])
}

fn format_time(t: NaiveTime) -> String {
    format!("{}{}", t.format("%H:%M:%S"), format_fraction(t.nanosecond()))
}

fn format_naive(dt: NaiveDateTime) -> String {
    format!("{}T{}", dt.date().format("%Y-%m-%d"), format_time(dt.time()))
}

fn millis_to_system(ms: i64) -> Result<SystemTime, String> {
    let span = Duration::from_millis(ms.unsigned_abs());
    let t = if ms >= 0 {
        UNIX_EPOCH.checked_add(span)
    } else {
        UNIX_EPOCH.checked_sub(span)
    };
    t.ok_or_else(|| format!("{ms} ms is outside the representable time range"))
}

fn system_to_millis(t: SystemTime) -> Result<i64, String> {
    let (span, negative) = match t.duration_since(UNIX_EPOCH) {
        Ok(span) => (span, false),
        Err(before) => (before.duration(), true),
    };
    let ms = i64::try_from(span.as_millis()).map_err(|_| "time is out of range".to_string())?;
    Ok(if negative { -ms } else { ms })
}

fn millis_to_utc(ms: i64) -> Result<DateTime<Utc>, String> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| format!("{ms} ms is outside the representable date range"))
}

fn parse_naive(text: &str) -> Result<NaiveDateTime, String> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|e| format!("cannot parse {text:?} as a date-time: {e}"))
}

fn parse_offset(text: &str) -> Result<DateTime<FixedOffset>, String> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z"))
        .map_err(|e| format!("cannot parse {text:?} as an offset date-time: {e}"))
}

pub(super) fn load(tables: &mut Tables) {
    // Epoch milliseconds.
    tables.add(TypeConverter::new(millis_to_system));
    tables.add(TypeConverter::new(system_to_millis));
    tables.add(TypeConverter::new(millis_to_utc));
    tables.add(TypeConverter::new(|v: DateTime<Utc>| Ok::<_, String>(v.timestamp_millis())));

    // Instants and offsets.
    tables.add(TypeConverter::new(|v: NaiveDateTime| Ok::<_, String>(v.and_utc())));
    tables.add(TypeConverter::new(|v: DateTime<Utc>| Ok::<_, String>(v.naive_utc())));
    tables.add(TypeConverter::new(|v: DateTime<Utc>| Ok::<_, String>(v.fixed_offset())));
    tables.add(TypeConverter::new(|v: DateTime<FixedOffset>| {
        Ok::<_, String>(v.with_timezone(&Utc))
    }));
    tables.add(TypeConverter::new(|v: DateTime<FixedOffset>| {
        Ok::<_, String>(v.with_timezone(&Local))
    }));
    tables.superclass(|v: DateTime<Local>| v.fixed_offset());

    // Calendar parts.
    tables.add(TypeConverter::new(|v: NaiveDate| {
        Ok::<_, String>(v.and_time(NaiveTime::MIN))
    }));
    tables.add(TypeConverter::new(|v: NaiveDateTime| Ok::<_, String>(v.date())));
    tables.add(TypeConverter::new(|v: NaiveDateTime| Ok::<_, String>(v.time())));
    tables.add(TypeConverter::new(|v: NaiveDate| {
        Ok::<_, String>(v.and_time(NaiveTime::MIN).and_utc())
    }));
    tables.add(TypeConverter::new(|v: DateTime<Utc>| Ok::<_, String>(v.date_naive())));

    // ISO text.
    tables.add(TypeConverter::new(|v: NaiveDate| {
        Ok::<_, String>(v.format("%Y-%m-%d").to_string())
    }));
    tables.add(TypeConverter::new(|v: String| {
        NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d")
            .map_err(|e| format!("cannot parse {v:?} as a date: {e}"))
    }));
    tables.add(TypeConverter::new(|v: NaiveTime| Ok::<_, String>(format_time(v))));
    tables.add(TypeConverter::new(|v: String| {
        NaiveTime::parse_from_str(v.trim(), "%H:%M:%S%.f")
            .map_err(|e| format!("cannot parse {v:?} as a time: {e}"))
    }));
    tables.add(TypeConverter::new(|v: NaiveDateTime| Ok::<_, String>(format_naive(v))));
    tables.add(TypeConverter::new(|v: String| parse_naive(&v)));
    tables.add(TypeConverter::new(|v: DateTime<Utc>| {
        Ok::<_, String>(format!("{}Z", format_naive(v.naive_utc())))
    }));
    tables.add(TypeConverter::new(|v: String| {
        parse_offset(&v).map(|dt| dt.with_timezone(&Utc))
    }));
    tables.add(TypeConverter::new(|v: DateTime<FixedOffset>| {
        Ok::<_, String>(format!(
            "{}{}",
            format_naive(v.naive_local()),
            v.format("%:z")
        ))
    }));
    tables.add(TypeConverter::new(|v: String| parse_offset(&v)));

    // Everything else composes through an explicit middle type.
    tables.chain::<SystemTime, i64, DateTime<Utc>>();
    tables.chain::<DateTime<Utc>, i64, SystemTime>();
    tables.chain::<NaiveDate, DateTime<Utc>, SystemTime>();
    tables.chain::<SystemTime, DateTime<Utc>, NaiveDate>();
    tables.chain::<SystemTime, DateTime<Utc>, NaiveDateTime>();
    tables.chain::<NaiveDateTime, DateTime<Utc>, SystemTime>();
    tables.chain::<SystemTime, DateTime<Utc>, String>();
    tables.chain::<String, DateTime<Utc>, SystemTime>();
    tables.chain::<i64, DateTime<Utc>, NaiveDateTime>();
    tables.chain::<NaiveDateTime, DateTime<Utc>, i64>();
    tables.chain::<NaiveDateTime, DateTime<Utc>, DateTime<FixedOffset>>();
    tables.chain::<DateTime<FixedOffset>, DateTime<Utc>, NaiveDateTime>();
    tables.chain::<DateTime<Utc>, DateTime<FixedOffset>, DateTime<Local>>();
    tables.chain::<String, DateTime<FixedOffset>, DateTime<Local>>();
    tables.chain::<SystemTime, DateTime<Utc>, DateTime<FixedOffset>>();
    tables.chain::<DateTime<FixedOffset>, DateTime<Utc>, SystemTime>();
}
