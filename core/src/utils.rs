use std::fmt;

use chrono::{DateTime, Utc};
use num_enum::TryFromPrimitive;

/// 100ns ticks between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_OFFSET: i64 = 116_444_736_000_000_000;
const TICKS_PER_SECOND: i64 = 10_000_000;

pub fn enum_name_or_hex<T>(raw: T::Primitive) -> String
where
    T: TryFromPrimitive + fmt::Debug,
    T::Primitive: fmt::LowerHex,
{
    match T::try_from_primitive(raw) {
        Ok(variant) => format!("{:?}", variant),
        Err(_) => format!("0x{:x}", raw),
    }
}

pub fn fmt_bytes(b: &[u8]) -> String {
    if b.iter().all(|&c| c.is_ascii_graphic() || c == b' ') {
        format!("b\"{}\"", String::from_utf8_lossy(b))
    } else {
        format!("0x{}", hex::encode(b))
    }
}

/// UTC timestamp to Windows FILETIME ticks (100ns since 1601).
pub fn to_filetime(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp()
        .saturating_mul(TICKS_PER_SECOND)
        .saturating_add(i64::from(ts.timestamp_subsec_nanos() / 100))
        .saturating_add(FILETIME_UNIX_OFFSET)
}

/// Windows FILETIME ticks to a UTC timestamp; `None` when out of range.
pub fn from_filetime(ticks: i64) -> Option<DateTime<Utc>> {
    let unix_ticks = ticks.checked_sub(FILETIME_UNIX_OFFSET)?;
    let secs = unix_ticks.div_euclid(TICKS_PER_SECOND);
    let nanos = (unix_ticks.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    DateTime::<Utc>::from_timestamp(secs, nanos)
}

/// Latin-1 bytes for the legacy name block. Characters outside the range become `?`.
pub fn to_latin1(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| if (c as u32) <= 0xFF { c as u32 as u8 } else { b'?' })
        .collect()
}

pub fn from_latin1(b: &[u8]) -> String {
    b.iter().map(|&c| c as char).collect()
}
