//! Built-in scalar converters: integers, floats, bool, char, decimal and text.

use super::{Tables, TypeConverter};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::any::TypeId;
use std::fmt::Display;

fn out_of_range(value: impl Display, target: &str) -> String {
    format!("{value} is out of range for {target}")
}

fn parse_error(text: &str, target: &str, err: impl Display) -> String {
    format!("cannot parse {text:?} as {target}: {err}")
}

macro_rules! int_to_ints {
    ($tables:ident; $src:ty => $($dst:ty),*) => {
        $(
            if TypeId::of::<$src>() != TypeId::of::<$dst>() {
                $tables.add(TypeConverter::new(|v: $src| {
                    <$dst>::try_from(v).map_err(|_| out_of_range(v, stringify!($dst)))
                }));
            }
        )*
    };
}

macro_rules! int_family {
    ($tables:ident; $($src:ty),*) => {
        $(
            int_to_ints!($tables; $src => i8, i16, i32, i64, u8, u16, u32, u64);

            $tables.add(TypeConverter::new(|v: bool| Ok::<$src, String>(if v { 1 } else { 0 })));
            $tables.add(TypeConverter::new(|v: $src| match v {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(format!("{other} is not a boolean (expected 0 or 1)")),
            }));
            $tables.add(TypeConverter::new(|v: String| {
                v.trim()
                    .parse::<$src>()
                    .map_err(|e| parse_error(&v, stringify!($src), e))
            }));
        )*
    };
}

pub(super) fn load(tables: &mut Tables) {
    int_family!(tables; i8, i16, i32, i64, u8, u16, u32, u64);

    // Narrow integers resolve text/float/decimal targets through i64.
    tables.interface(|v: i8| i64::from(v));
    tables.interface(|v: i16| i64::from(v));
    tables.interface(|v: i32| i64::from(v));
    tables.interface(|v: u8| i64::from(v));
    tables.interface(|v: u16| i64::from(v));
    tables.interface(|v: u32| i64::from(v));

    tables.add(TypeConverter::new(|v: i64| Ok::<_, String>(v.to_string())));
    tables.add(TypeConverter::new(|v: u64| Ok::<_, String>(v.to_string())));

    load_floats(tables);
    load_decimal(tables);
    load_text(tables);
    narrow_through_i64(tables);
}

/// Float and decimal sources reach the narrow integers through the exact `i64` converter.
fn narrow_through_i64(tables: &mut Tables) {
    tables.chain::<f64, i64, i8>();
    tables.chain::<f64, i64, i16>();
    tables.chain::<f64, i64, i32>();
    tables.chain::<f64, i64, u8>();
    tables.chain::<f64, i64, u16>();
    tables.chain::<f64, i64, u32>();
    tables.chain::<Decimal, i64, i8>();
    tables.chain::<Decimal, i64, i16>();
    tables.chain::<Decimal, i64, i32>();
    tables.chain::<Decimal, i64, u8>();
    tables.chain::<Decimal, i64, u16>();
    tables.chain::<Decimal, i64, u32>();
}

fn load_floats(tables: &mut Tables) {
    tables.add(TypeConverter::new(|v: f32| Ok::<_, String>(f64::from(v))));
    tables.add(TypeConverter::new(|v: f64| {
        let narrowed = v as f32;
        if f64::from(narrowed) == v || v.is_nan() {
            Ok(narrowed)
        } else {
            Err(format!("{v} cannot be represented exactly as f32"))
        }
    }));
    tables.interface(|v: f32| f64::from(v));

    tables.add(TypeConverter::new(|v: f64| {
        if v.fract() != 0.0 || !v.is_finite() {
            return Err(format!("{v} is not an integral value"));
        }
        // `as` saturates, so the range is checked before the cast.
        if (-9.223_372_036_854_775_808e18..9.223_372_036_854_775_808e18).contains(&v) {
            Ok(v as i64)
        } else {
            Err(out_of_range(v, "i64"))
        }
    }));
    tables.add(TypeConverter::new(|v: f64| {
        if v.fract() != 0.0 || !v.is_finite() {
            return Err(format!("{v} is not an integral value"));
        }
        if (0.0..1.844_674_407_370_955_2e19).contains(&v) {
            Ok(v as u64)
        } else {
            Err(out_of_range(v, "u64"))
        }
    }));
    tables.add(TypeConverter::new(|v: i64| {
        let f = v as f64;
        if f as i64 == v && f.abs() < 9.223_372_036_854_776e18 {
            Ok(f)
        } else {
            Err(format!("{v} cannot be represented exactly as f64"))
        }
    }));
    tables.add(TypeConverter::new(|v: bool| Ok::<_, String>(if v { 1.0_f64 } else { 0.0 })));

    tables.add(TypeConverter::new(|v: f64| Ok::<_, String>(v.to_string())));
    tables.add(TypeConverter::new(|v: f32| Ok::<_, String>(v.to_string())));
    tables.add(TypeConverter::new(|v: String| {
        v.trim().parse::<f64>().map_err(|e| parse_error(&v, "f64", e))
    }));
    tables.add(TypeConverter::new(|v: String| {
        v.trim().parse::<f32>().map_err(|e| parse_error(&v, "f32", e))
    }));
}

fn load_decimal(tables: &mut Tables) {
    tables.add(TypeConverter::new(|v: i64| Ok::<_, String>(Decimal::from(v))));
    tables.add(TypeConverter::new(|v: u64| Ok::<_, String>(Decimal::from(v))));
    tables.add(TypeConverter::new(|v: Decimal| {
        if !v.fract().is_zero() {
            return Err(format!("{v} is not an integral value"));
        }
        v.to_i64().ok_or_else(|| out_of_range(v, "i64"))
    }));
    tables.add(TypeConverter::new(|v: Decimal| {
        if !v.fract().is_zero() {
            return Err(format!("{v} is not an integral value"));
        }
        v.to_u64().ok_or_else(|| out_of_range(v, "u64"))
    }));
    tables.add(TypeConverter::new(|v: f64| {
        Decimal::try_from(v).map_err(|e| format!("{v} cannot be represented as a decimal: {e}"))
    }));
    tables.add(TypeConverter::new(|v: Decimal| {
        v.to_f64().ok_or_else(|| out_of_range(v, "f64"))
    }));
    tables.add(TypeConverter::new(|v: Decimal| Ok::<_, String>(v.to_string())));
    tables.add(TypeConverter::new(|v: String| {
        v.trim()
            .parse::<Decimal>()
            .map_err(|e| parse_error(&v, "Decimal", e))
    }));
}

fn load_text(tables: &mut Tables) {
    tables.add(TypeConverter::new(|v: bool| Ok::<_, String>(v.to_string())));
    tables.add(TypeConverter::new(|v: String| {
        match v.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(format!("{v:?} is not a boolean")),
        }
    }));

    tables.add(TypeConverter::new(|v: bool| Ok::<_, String>(if v { '1' } else { '0' })));
    tables.add(TypeConverter::new(|v: char| match v {
        '0' => Ok(false),
        '1' => Ok(true),
        other => Err(format!("{other:?} is not a boolean (expected '0' or '1')")),
    }));

    tables.add(TypeConverter::new(|v: char| Ok::<_, String>(v.to_string())));
    tables.add(TypeConverter::new(|v: String| {
        let mut chars = v.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(format!("{v:?} is not a single character")),
        }
    }));
    tables.add(TypeConverter::new(|v: char| Ok::<_, String>(u32::from(v))));
    tables.add(TypeConverter::new(|v: u32| {
        char::from_u32(v).ok_or_else(|| format!("{v} is not a valid char"))
    }));

    tables.add(TypeConverter::new(|v: uuid::Uuid| Ok::<_, String>(v.to_string())));
    tables.add(TypeConverter::new(|v: String| {
        uuid::Uuid::parse_str(v.trim()).map_err(|e| parse_error(&v, "Uuid", e))
    }));

    tables.add(TypeConverter::new(|v: serde_json::Value| Ok::<_, String>(v.to_string())));
    tables.add(TypeConverter::new(|v: String| {
        serde_json::from_str::<serde_json::Value>(&v).map_err(|e| parse_error(&v, "json", e))
    }));

    tables.add(TypeConverter::new(|v: String| Ok::<_, String>(v.into_bytes())));
    tables.add(TypeConverter::new(|v: Vec<u8>| {
        String::from_utf8(v).map_err(|e| format!("bytes are not valid UTF-8: {e}"))
    }));
}
