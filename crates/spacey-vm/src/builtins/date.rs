//! Date built-in object.
//!
//! A Date holds a time value: milliseconds since the epoch in UTC, or NaN
//! for an invalid date. Calendar arithmetic is done on that number directly
//! so the whole range of ±8.64e15 ms is covered. The host time zone comes
//! from `chrono::Local`, looked up at the instant being converted so that
//! daylight saving transitions are honored.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local, NaiveDate, TimeZone};

use super::{Builder, arg};
use crate::error::{Result, range_error, type_error};
use crate::gc::ObjectRef;
use crate::runtime::object::{JsObject, ObjectKind};
use crate::runtime::value::Value;
use crate::vm::{Hint, VM};

const MS_PER_DAY: f64 = 86_400_000.0;
const MAX_TIME: f64 = 8.64e15;

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub(super) fn register(builder: &mut Builder<'_>) {
    let prototype = builder.intrinsics.date_prototype;
    let constructor = builder.constructor("Date", 7, date_call, Some(date_construct), prototype);
    builder.method(constructor, "now", 0, now);
    builder.method(constructor, "parse", 1, parse);
    builder.method(constructor, "UTC", 7, utc);

    builder.method(prototype, "getTime", 0, get_time);
    builder.method(prototype, "valueOf", 0, get_time);
    builder.method(prototype, "getTimezoneOffset", 0, get_timezone_offset);
    builder.method(prototype, "getFullYear", 0, get_full_year);
    builder.method(prototype, "getMonth", 0, get_month);
    builder.method(prototype, "getDate", 0, get_date);
    builder.method(prototype, "getDay", 0, get_day);
    builder.method(prototype, "getHours", 0, get_hours);
    builder.method(prototype, "getMinutes", 0, get_minutes);
    builder.method(prototype, "getSeconds", 0, get_seconds);
    builder.method(prototype, "getMilliseconds", 0, get_milliseconds);
    builder.method(prototype, "getUTCFullYear", 0, get_utc_full_year);
    builder.method(prototype, "getUTCMonth", 0, get_utc_month);
    builder.method(prototype, "getUTCDate", 0, get_utc_date);
    builder.method(prototype, "getUTCDay", 0, get_utc_day);
    builder.method(prototype, "getUTCHours", 0, get_utc_hours);
    builder.method(prototype, "getUTCMinutes", 0, get_utc_minutes);
    builder.method(prototype, "getUTCSeconds", 0, get_utc_seconds);
    builder.method(prototype, "getUTCMilliseconds", 0, get_utc_milliseconds);

    builder.method(prototype, "setTime", 1, set_time);
    builder.method(prototype, "setFullYear", 3, set_full_year);
    builder.method(prototype, "setMonth", 2, set_month);
    builder.method(prototype, "setDate", 1, set_date);
    builder.method(prototype, "setHours", 4, set_hours);
    builder.method(prototype, "setMinutes", 3, set_minutes);
    builder.method(prototype, "setSeconds", 2, set_seconds);
    builder.method(prototype, "setMilliseconds", 1, set_milliseconds);
    builder.method(prototype, "setUTCFullYear", 3, set_utc_full_year);
    builder.method(prototype, "setUTCMonth", 2, set_utc_month);
    builder.method(prototype, "setUTCDate", 1, set_utc_date);
    builder.method(prototype, "setUTCHours", 4, set_utc_hours);
    builder.method(prototype, "setUTCMinutes", 3, set_utc_minutes);
    builder.method(prototype, "setUTCSeconds", 2, set_utc_seconds);
    builder.method(prototype, "setUTCMilliseconds", 1, set_utc_milliseconds);

    builder.method(prototype, "toString", 0, to_string);
    builder.method(prototype, "toDateString", 0, to_date_string);
    builder.method(prototype, "toTimeString", 0, to_time_string);
    builder.method(prototype, "toLocaleString", 0, to_string);
    builder.method(prototype, "toLocaleDateString", 0, to_date_string);
    builder.method(prototype, "toLocaleTimeString", 0, to_time_string);
    builder.method(prototype, "toISOString", 0, to_iso_string);
    let to_utc_string = builder.method(prototype, "toUTCString", 0, to_utc_string);
    builder.value(prototype, "toGMTString", Value::Object(to_utc_string));
    builder.method(prototype, "toJSON", 1, to_json);
    let to_primitive = builder.symbols.to_primitive.clone();
    builder.symbol_method(prototype, to_primitive, "[Symbol.toPrimitive]", 1, date_to_primitive);
}

// ============================================================================
// Time arithmetic
// ============================================================================

/// A broken-down time: year, month (0-based), date, hours, minutes,
/// seconds, milliseconds.
type Fields = [f64; 7];

const YEAR: usize = 0;
const MONTH: usize = 1;
const DATE: usize = 2;
const HOURS: usize = 3;
const MINUTES: usize = 4;
const SECONDS: usize = 5;
const MILLISECONDS: usize = 6;

fn day(t: f64) -> f64 {
    (t / MS_PER_DAY).floor()
}

fn week_day(t: f64) -> f64 {
    (day(t) + 4.0).rem_euclid(7.0)
}

/// Days from 1970-01-01 to the given proleptic Gregorian date.
fn days_from_civil(year: i64, month: i64, date: i64) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let year_of_era = year - era * 400;
    let day_of_year = (153 * ((month + 9) % 12) + 2) / 5 + date - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146_097 + day_of_era - 719_468
}

/// The date `days` after 1970-01-01 as (year, month 1-12, date).
fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let days = days + 719_468;
    let era = days.div_euclid(146_097);
    let day_of_era = days - era * 146_097;
    let year_of_era = (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let shifted_month = (5 * day_of_year + 2) / 153;
    let date = day_of_year - (153 * shifted_month + 2) / 5 + 1;
    let month = if shifted_month < 10 { shifted_month + 3 } else { shifted_month - 9 };
    let year = year_of_era + era * 400 + i64::from(month <= 2);
    (year, month, date)
}

/// Splits a finite time value into its fields.
fn fields_of(t: f64) -> Fields {
    let (year, month, date) = civil_from_days(day(t) as i64);
    let within_day = t.rem_euclid(MS_PER_DAY);
    [
        year as f64,
        (month - 1) as f64,
        date as f64,
        (within_day / 3_600_000.0).floor(),
        (within_day / 60_000.0).floor() % 60.0,
        (within_day / 1000.0).floor() % 60.0,
        within_day % 1000.0,
    ]
}

fn make_time(hours: f64, minutes: f64, seconds: f64, ms: f64) -> f64 {
    if ![hours, minutes, seconds, ms].iter().all(|n| n.is_finite()) {
        return f64::NAN;
    }
    hours.trunc() * 3_600_000.0 + minutes.trunc() * 60_000.0 + seconds.trunc() * 1000.0 + ms.trunc()
}

fn make_day(year: f64, month: f64, date: f64) -> f64 {
    if ![year, month, date].iter().all(|n| n.is_finite()) {
        return f64::NAN;
    }
    let year = year.trunc() + (month.trunc() / 12.0).floor();
    if year.abs() > 400_000.0 {
        return f64::NAN;
    }
    let month = month.trunc().rem_euclid(12.0);
    days_from_civil(year as i64, month as i64 + 1, 1) as f64 + date.trunc() - 1.0
}

fn make_date(day: f64, time: f64) -> f64 {
    if !day.is_finite() || !time.is_finite() {
        return f64::NAN;
    }
    day * MS_PER_DAY + time
}

fn make_from_fields(fields: &Fields) -> f64 {
    make_date(
        make_day(fields[YEAR], fields[MONTH], fields[DATE]),
        make_time(fields[HOURS], fields[MINUTES], fields[SECONDS], fields[MILLISECONDS]),
    )
}

fn time_clip(t: f64) -> f64 {
    if !t.is_finite() || t.abs() > MAX_TIME {
        return f64::NAN;
    }
    t.trunc() + 0.0
}

fn current_time_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as f64)
        .unwrap_or(f64::NAN)
}

/// Offset of local time from UTC at the UTC instant `t`, in milliseconds.
fn local_offset(t: f64) -> f64 {
    let seconds = DateTime::from_timestamp_millis(t as i64)
        .map(|instant| Local.offset_from_utc_datetime(&instant.naive_utc()).local_minus_utc())
        .unwrap_or_else(|| Local::now().offset().local_minus_utc());
    f64::from(seconds) * 1000.0
}

fn local_time(t: f64) -> f64 {
    if t.is_nan() {
        return t;
    }
    t + local_offset(t)
}

/// The UTC time value for a local wall-clock time. Skipped wall-clock
/// times resolve with the offset in force before the transition.
fn utc_time(local: f64) -> f64 {
    if !local.is_finite() {
        return f64::NAN;
    }
    let seconds = DateTime::from_timestamp_millis(local as i64)
        .and_then(|wall| Local.offset_from_local_datetime(&wall.naive_utc()).earliest())
        .map(|offset| offset.local_minus_utc());
    match seconds {
        Some(seconds) => local - f64::from(seconds) * 1000.0,
        None => local - local_offset(local - local_offset(local)),
    }
}

// ============================================================================
// Formatting and parsing
// ============================================================================

fn format_year(year: f64) -> String {
    if year < 0.0 {
        format!("-{:04}", -year)
    } else {
        format!("{year:04}")
    }
}

fn format_date_part(local: f64) -> String {
    let fields = fields_of(local);
    format!(
        "{} {} {:02} {}",
        DAY_NAMES[week_day(local) as usize],
        MONTH_NAMES[fields[MONTH] as usize],
        fields[DATE],
        format_year(fields[YEAR])
    )
}

fn format_time_part(t: f64, local: f64) -> String {
    let fields = fields_of(local);
    let offset = (local_offset(t) / 60_000.0) as i64;
    let sign = if offset < 0 { '-' } else { '+' };
    format!(
        "{:02}:{:02}:{:02} GMT{sign}{:02}{:02}",
        fields[HOURS],
        fields[MINUTES],
        fields[SECONDS],
        offset.abs() / 60,
        offset.abs() % 60
    )
}

fn format_date(t: f64) -> String {
    if t.is_nan() {
        return "Invalid Date".to_string();
    }
    let local = local_time(t);
    format!("{} {}", format_date_part(local), format_time_part(t, local))
}

fn format_utc(t: f64) -> String {
    let fields = fields_of(t);
    format!(
        "{}, {:02} {} {} {:02}:{:02}:{:02} GMT",
        DAY_NAMES[week_day(t) as usize],
        fields[DATE],
        MONTH_NAMES[fields[MONTH] as usize],
        format_year(fields[YEAR]),
        fields[HOURS],
        fields[MINUTES],
        fields[SECONDS]
    )
}

fn format_iso(t: f64) -> String {
    let fields = fields_of(t);
    let year = fields[YEAR];
    let year = if (0.0..=9999.0).contains(&year) {
        format!("{year:04}")
    } else if year < 0.0 {
        format!("-{:06}", -year)
    } else {
        format!("+{year:06}")
    };
    format!(
        "{year}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        fields[MONTH] + 1.0,
        fields[DATE],
        fields[HOURS],
        fields[MINUTES],
        fields[SECONDS],
        fields[MILLISECONDS]
    )
}

/// Reads the date time string format: `YYYY[-MM[-DD]][THH:mm[:ss[.sss]]][Z|±HH:mm]`
/// with `±YYYYYY` expanded years.
struct IsoReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl IsoReader<'_> {
    fn eat(&mut self, byte: u8) -> bool {
        let matched = self.bytes.get(self.position) == Some(&byte);
        if matched {
            self.position += 1;
        }
        matched
    }

    fn digits(&mut self, count: usize) -> Option<f64> {
        let digits = self.bytes.get(self.position..self.position + count)?;
        if !digits.iter().all(u8::is_ascii_digit) {
            return None;
        }
        self.position += count;
        Some(digits.iter().fold(0.0, |n, d| n * 10.0 + f64::from(d - b'0')))
    }

    fn fraction(&mut self) -> Option<f64> {
        let start = self.position;
        while self.bytes.get(self.position).is_some_and(u8::is_ascii_digit) {
            self.position += 1;
        }
        let digits = &self.bytes[start..self.position];
        if digits.is_empty() {
            return None;
        }
        Some(
            (0..3)
                .map(|i| digits.get(i).map_or(0.0, |d| f64::from(d - b'0')))
                .fold(0.0, |n, d| n * 10.0 + d),
        )
    }

    fn sign(&mut self) -> Option<f64> {
        if self.eat(b'+') {
            Some(1.0)
        } else if self.eat(b'-') {
            Some(-1.0)
        } else {
            None
        }
    }

    fn at_end(&self) -> bool {
        self.position == self.bytes.len()
    }
}

fn parse_iso(s: &str) -> Option<f64> {
    let mut reader = IsoReader { bytes: s.as_bytes(), position: 0 };
    let year = match reader.sign() {
        // -000000 is not a valid year
        Some(sign) => match reader.digits(6)? {
            year if year == 0.0 && sign < 0.0 => return None,
            year => sign * year,
        },
        None => reader.digits(4)?,
    };
    let (mut month, mut date) = (1.0, 1.0);
    if reader.eat(b'-') {
        month = reader.digits(2)?;
        if reader.eat(b'-') {
            date = reader.digits(2)?;
        }
    }
    if !(1.0..=12.0).contains(&month) {
        return None;
    }
    let days_in_month = make_day(year, month, 1.0) - make_day(year, month - 1.0, 1.0);
    if date < 1.0 || date > days_in_month {
        return None;
    }

    let mut time = [0.0; 4];
    let has_time = reader.eat(b'T') || reader.eat(b't');
    if has_time {
        time[0] = reader.digits(2)?;
        if !reader.eat(b':') {
            return None;
        }
        time[1] = reader.digits(2)?;
        if reader.eat(b':') {
            time[2] = reader.digits(2)?;
            if reader.eat(b'.') {
                time[3] = reader.fraction()?;
            }
        }
        let end_of_day = time[0] == 24.0 && time[1..].iter().all(|n| *n == 0.0);
        if (time[0] > 23.0 && !end_of_day) || time[1] > 59.0 || time[2] > 59.0 {
            return None;
        }
    }

    let offset = if reader.eat(b'Z') || reader.eat(b'z') {
        Some(0.0)
    } else if let Some(sign) = reader.sign() {
        let hours = reader.digits(2)?;
        reader.eat(b':');
        let minutes = reader.digits(2)?;
        if hours > 23.0 || minutes > 59.0 {
            return None;
        }
        Some(sign * (hours * 60.0 + minutes) * 60_000.0)
    } else {
        None
    };
    if !reader.at_end() {
        return None;
    }

    let t = make_date(
        make_day(year, month - 1.0, date),
        make_time(time[0], time[1], time[2], time[3]),
    );
    // Date-only forms are UTC, date-time forms without an offset are local
    let t = match offset {
        Some(offset) => t - offset,
        None if has_time => utc_time(t),
        None => t,
    };
    Some(time_clip(t))
}

/// Date.parse: the ISO format, then the formats `toString` and
/// `toUTCString` produce.
fn parse_date(s: &str) -> f64 {
    let s = s.trim();
    if let Some(t) = parse_iso(s) {
        return t;
    }
    if let Ok(instant) = DateTime::parse_from_rfc2822(s) {
        return time_clip(instant.timestamp_millis() as f64);
    }
    let without_zone_name = s.split(" (").next().unwrap_or(s);
    if let Ok(instant) = DateTime::parse_from_str(without_zone_name, "%a %b %d %Y %H:%M:%S GMT%z") {
        return time_clip(instant.timestamp_millis() as f64);
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%a %b %d %Y")
        && let Some(midnight) = date.and_hms_opt(0, 0, 0)
    {
        return time_clip(utc_time(midnight.and_utc().timestamp_millis() as f64));
    }
    f64::NAN
}

// ============================================================================
// Constructor and statics
// ============================================================================

/// Date(): the current time as a string, whatever the arguments.
fn date_call(_vm: &mut VM, _this: &Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::from(format_date(current_time_ms())))
}

/// Reads the `year, month[, date[, hours[, minutes[, seconds[, ms]]]]]`
/// argument list; two-digit years mean 19xx.
fn fields_from_args(vm: &mut VM, args: &[Value]) -> Result<Fields> {
    let mut fields: Fields = [f64::NAN, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
    for (index, value) in args.iter().take(7).enumerate() {
        fields[index] = vm.to_number(value)?;
    }
    let year = fields[YEAR];
    if year.is_finite() && (0.0..=99.0).contains(&year.trunc()) {
        fields[YEAR] = 1900.0 + year.trunc();
    }
    Ok(fields)
}

/// new Date(), new Date(value), new Date(year, month, ...)
fn date_construct(vm: &mut VM, args: &[Value], new_target: ObjectRef) -> Result<Value> {
    let time = match args {
        [] => current_time_ms(),
        [value] => {
            let existing = match value.as_object() {
                Some(object) => match vm.heap.object(object)?.kind {
                    ObjectKind::Date(t) => Some(t),
                    _ => None,
                },
                None => None,
            };
            match existing {
                Some(t) => t,
                None => match vm.to_primitive(value, Hint::Default)? {
                    Value::String(s) => parse_date(&s.to_std_string_lossy()),
                    primitive => time_clip(vm.to_number(&primitive)?),
                },
            }
        }
        _ => {
            let fields = fields_from_args(vm, args)?;
            time_clip(utc_time(make_from_fields(&fields)))
        }
    };
    let fallback = vm.realm.intrinsics.date_prototype;
    let prototype = vm.prototype_from_constructor(new_target, fallback)?;
    Ok(Value::Object(vm.alloc(JsObject::with_kind(Some(prototype), ObjectKind::Date(time)))))
}

/// Date.now()
fn now(_vm: &mut VM, _this: &Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::Number(current_time_ms()))
}

/// Date.parse(string)
fn parse(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let s = vm.to_rust_string(&arg(args, 0))?;
    Ok(Value::Number(parse_date(&s)))
}

/// Date.UTC(year, month, ...)
fn utc(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let fields = fields_from_args(vm, args)?;
    Ok(Value::Number(time_clip(make_from_fields(&fields))))
}

// ============================================================================
// Getters
// ============================================================================

/// thisTimeValue
fn this_time(vm: &VM, this: &Value) -> Result<(ObjectRef, f64)> {
    if let Some(object) = this.as_object()
        && let ObjectKind::Date(t) = vm.heap.object(object)?.kind
    {
        return Ok((object, t));
    }
    type_error(format!("this is not a Date object: {}", vm.describe(this)))
}

fn field(vm: &mut VM, this: &Value, index: usize, local: bool) -> Result<Value> {
    let (_, t) = this_time(vm, this)?;
    if t.is_nan() {
        return Ok(Value::Number(f64::NAN));
    }
    let t = if local { local_time(t) } else { t };
    Ok(Value::Number(fields_of(t)[index]))
}

/// Date.prototype.getTime(), also `valueOf`
fn get_time(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::Number(this_time(vm, this)?.1))
}

/// Date.prototype.getTimezoneOffset(): minutes from local time to UTC
fn get_timezone_offset(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let (_, t) = this_time(vm, this)?;
    if t.is_nan() {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number((t - local_time(t)) / 60_000.0))
}

/// Date.prototype.getFullYear()
fn get_full_year(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    field(vm, this, YEAR, true)
}

/// Date.prototype.getMonth()
fn get_month(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    field(vm, this, MONTH, true)
}

/// Date.prototype.getDate()
fn get_date(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    field(vm, this, DATE, true)
}

/// Date.prototype.getDay()
fn get_day(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let (_, t) = this_time(vm, this)?;
    Ok(Value::Number(if t.is_nan() { t } else { week_day(local_time(t)) }))
}

/// Date.prototype.getHours()
fn get_hours(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    field(vm, this, HOURS, true)
}

/// Date.prototype.getMinutes()
fn get_minutes(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    field(vm, this, MINUTES, true)
}

/// Date.prototype.getSeconds()
fn get_seconds(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    field(vm, this, SECONDS, true)
}

/// Date.prototype.getMilliseconds()
fn get_milliseconds(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    field(vm, this, MILLISECONDS, true)
}

/// Date.prototype.getUTCFullYear()
fn get_utc_full_year(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    field(vm, this, YEAR, false)
}

/// Date.prototype.getUTCMonth()
fn get_utc_month(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    field(vm, this, MONTH, false)
}

/// Date.prototype.getUTCDate()
fn get_utc_date(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    field(vm, this, DATE, false)
}

/// Date.prototype.getUTCDay()
fn get_utc_day(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let (_, t) = this_time(vm, this)?;
    Ok(Value::Number(if t.is_nan() { t } else { week_day(t) }))
}

/// Date.prototype.getUTCHours()
fn get_utc_hours(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    field(vm, this, HOURS, false)
}

/// Date.prototype.getUTCMinutes()
fn get_utc_minutes(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    field(vm, this, MINUTES, false)
}

/// Date.prototype.getUTCSeconds()
fn get_utc_seconds(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    field(vm, this, SECONDS, false)
}

/// Date.prototype.getUTCMilliseconds()
fn get_utc_milliseconds(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    field(vm, this, MILLISECONDS, false)
}

// ============================================================================
// Setters
// ============================================================================

/// Replaces up to `count` fields starting at `first` with the arguments;
/// missing trailing arguments keep the current field values. An invalid
/// date stays invalid, except that `setFullYear` starts over from +0.
fn set_fields(vm: &mut VM, this: &Value, args: &[Value], first: usize, count: usize, local: bool) -> Result<Value> {
    let (object, t) = this_time(vm, this)?;
    let base = match (t.is_nan(), first) {
        (true, YEAR) => 0.0,
        _ if local => local_time(t),
        _ => t,
    };
    let mut replacements = Vec::with_capacity(count);
    for index in 0..count.min(args.len().max(1)) {
        replacements.push(vm.to_number(&arg(args, index))?);
    }
    if base.is_nan() {
        return Ok(Value::Number(f64::NAN));
    }
    let mut fields = fields_of(base);
    for (offset, value) in replacements.into_iter().enumerate() {
        fields[first + offset] = value;
    }
    let updated = make_from_fields(&fields);
    let updated = time_clip(if local { utc_time(updated) } else { updated });
    vm.heap.object_mut(object)?.kind = ObjectKind::Date(updated);
    Ok(Value::Number(updated))
}

/// Date.prototype.setTime(time)
fn set_time(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let (object, _) = this_time(vm, this)?;
    let t = time_clip(vm.to_number(&arg(args, 0))?);
    vm.heap.object_mut(object)?.kind = ObjectKind::Date(t);
    Ok(Value::Number(t))
}

/// Date.prototype.setFullYear(year, month, date)
fn set_full_year(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    set_fields(vm, this, args, YEAR, 3, true)
}

/// Date.prototype.setMonth(month, date)
fn set_month(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    set_fields(vm, this, args, MONTH, 2, true)
}

/// Date.prototype.setDate(date)
fn set_date(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    set_fields(vm, this, args, DATE, 1, true)
}

/// Date.prototype.setHours(hours, minutes, seconds, ms)
fn set_hours(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    set_fields(vm, this, args, HOURS, 4, true)
}

/// Date.prototype.setMinutes(minutes, seconds, ms)
fn set_minutes(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    set_fields(vm, this, args, MINUTES, 3, true)
}

/// Date.prototype.setSeconds(seconds, ms)
fn set_seconds(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    set_fields(vm, this, args, SECONDS, 2, true)
}

/// Date.prototype.setMilliseconds(ms)
fn set_milliseconds(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    set_fields(vm, this, args, MILLISECONDS, 1, true)
}

/// Date.prototype.setUTCFullYear(year, month, date)
fn set_utc_full_year(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    set_fields(vm, this, args, YEAR, 3, false)
}

/// Date.prototype.setUTCMonth(month, date)
fn set_utc_month(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    set_fields(vm, this, args, MONTH, 2, false)
}

/// Date.prototype.setUTCDate(date)
fn set_utc_date(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    set_fields(vm, this, args, DATE, 1, false)
}

/// Date.prototype.setUTCHours(hours, minutes, seconds, ms)
fn set_utc_hours(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    set_fields(vm, this, args, HOURS, 4, false)
}

/// Date.prototype.setUTCMinutes(minutes, seconds, ms)
fn set_utc_minutes(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    set_fields(vm, this, args, MINUTES, 3, false)
}

/// Date.prototype.setUTCSeconds(seconds, ms)
fn set_utc_seconds(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    set_fields(vm, this, args, SECONDS, 2, false)
}

/// Date.prototype.setUTCMilliseconds(ms)
fn set_utc_milliseconds(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    set_fields(vm, this, args, MILLISECONDS, 1, false)
}

// ============================================================================
// Conversions
// ============================================================================

/// Date.prototype.toString()
fn to_string(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let (_, t) = this_time(vm, this)?;
    Ok(Value::from(format_date(t)))
}

/// Date.prototype.toDateString()
fn to_date_string(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let (_, t) = this_time(vm, this)?;
    if t.is_nan() {
        return Ok(Value::from("Invalid Date"));
    }
    Ok(Value::from(format_date_part(local_time(t))))
}

/// Date.prototype.toTimeString()
fn to_time_string(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let (_, t) = this_time(vm, this)?;
    if t.is_nan() {
        return Ok(Value::from("Invalid Date"));
    }
    Ok(Value::from(format_time_part(t, local_time(t))))
}

/// Date.prototype.toISOString()
fn to_iso_string(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let (_, t) = this_time(vm, this)?;
    if t.is_nan() {
        return range_error("Invalid time value");
    }
    Ok(Value::from(format_iso(t)))
}

/// Date.prototype.toUTCString(), also `toGMTString`
fn to_utc_string(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let (_, t) = this_time(vm, this)?;
    if t.is_nan() {
        return Ok(Value::from("Invalid Date"));
    }
    Ok(Value::from(format_utc(t)))
}

/// Date.prototype.toJSON(key): generic, calls `toISOString` on any object
/// whose number value is finite.
fn to_json(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let object = Value::Object(vm.to_object(this)?);
    if let Value::Number(n) = vm.to_primitive(&object, Hint::Number)?
        && !n.is_finite()
    {
        return Ok(Value::Null);
    }
    let method = vm.get_named(&object, "toISOString")?;
    if !vm.is_callable(&method) {
        return type_error("toISOString is not a function");
    }
    vm.call(&method, &object, &[])
}

/// Date.prototype[Symbol.toPrimitive](hint): strings unless asked for a number
fn date_to_primitive(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let Some(object) = this.as_object() else {
        return type_error(format!("Date.prototype[Symbol.toPrimitive] called on {}", vm.describe(this)));
    };
    let hint = match arg(args, 0) {
        Value::String(s) if s == "string" || s == "default" => Hint::String,
        Value::String(s) if s == "number" => Hint::Number,
        other => return type_error(format!("Invalid hint: {}", vm.describe(&other))),
    };
    vm.ordinary_to_primitive(object, hint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testing::{eval_str, thrown};

    #[test]
    fn test_civil_conversions() {
        assert_eq!(days_from_civil(1970, 1, 1), 0);
        assert_eq!(days_from_civil(2000, 3, 1), 11_017);
        assert_eq!(civil_from_days(-1), (1969, 12, 31));
        assert_eq!(civil_from_days(11_016), (2000, 2, 29));
        assert_eq!(fields_of(-1.0), [1969.0, 11.0, 31.0, 23.0, 59.0, 59.0, 999.0]);
        assert_eq!(week_day(0.0), 4.0);
        assert_eq!(make_day(2021.0, 13.0, 1.0), days_from_civil(2022, 2, 1) as f64);
    }

    #[test]
    fn test_time_clip() {
        assert_eq!(time_clip(MAX_TIME), MAX_TIME);
        assert!(time_clip(MAX_TIME + 1.0).is_nan());
        assert_eq!(time_clip(1.9), 1.0);
        assert!(time_clip(-0.0).is_sign_positive());
    }

    #[test]
    fn test_iso_round_trip() {
        assert_eq!(eval_str("new Date(0).toISOString()"), "1970-01-01T00:00:00.000Z");
        assert_eq!(eval_str("new Date(Date.UTC(2024, 1, 29, 12, 30, 15, 7)).toISOString()"), "2024-02-29T12:30:15.007Z");
        assert_eq!(eval_str("new Date(-1).toISOString()"), "1969-12-31T23:59:59.999Z");
        assert_eq!(eval_str("new Date(8.64e15).toISOString()"), "+275760-09-13T00:00:00.000Z");
        assert_eq!(eval_str("new Date(-8.64e15).toISOString()"), "-271821-04-20T00:00:00.000Z");
        assert!(thrown("new Date(NaN).toISOString()").starts_with("RangeError"));
    }

    #[test]
    fn test_parse_iso_forms() {
        assert_eq!(eval_str("Date.parse('1970-01-01T00:00:01Z')"), "1000");
        assert_eq!(eval_str("Date.parse('2000-01-01')"), "946684800000");
        assert_eq!(eval_str("Date.parse('2000-01')"), "946684800000");
        assert_eq!(eval_str("Date.parse('2000-01-01T00:00:00.5+01:00')"), "946681200500");
        assert_eq!(eval_str("Date.parse('+002000-01-01T00:00:00Z')"), "946684800000");
        assert_eq!(eval_str("Date.parse('-000001-01-01T00:00:00Z')"), "-62198755200000");
        for bad in ["2000-13-01", "2021-02-29", "2000-01-01T25:00Z", "-000000-01-01", "nonsense", ""] {
            assert_eq!(eval_str(&format!("Date.parse('{bad}')")), "NaN", "{bad}");
        }
    }

    #[test]
    fn test_parse_own_output() {
        let src = "var d = new Date(2020, 4, 17, 8, 9, 10); \
                   [Date.parse(d.toString()) === d.getTime(), Date.parse(d.toUTCString()) === d.getTime()].join()";
        assert_eq!(eval_str(src), "true,true");
        assert_eq!(eval_str("Date.parse('Thu, 01 Jan 1970 00:00:00 GMT')"), "0");
        assert_eq!(eval_str("var d = new Date(2020, 4, 17); Date.parse(d.toDateString()) === d.getTime()"), "true");
    }

    #[test]
    fn test_local_fields() {
        let src = "var d = new Date(2020, 0, 31, 13, 45, 30, 250); \
                   [d.getFullYear(), d.getMonth(), d.getDate(), d.getHours(), d.getMinutes(), d.getSeconds(), d.getMilliseconds()].join()";
        assert_eq!(eval_str(src), "2020,0,31,13,45,30,250");
        assert_eq!(eval_str("new Date(99, 0).getFullYear()"), "1999");
        let src = "var d = new Date(0); d.getTime() - (d.getTimezoneOffset() * -60000) === \
                   Date.UTC(d.getFullYear(), d.getMonth(), d.getDate(), d.getHours(), d.getMinutes())";
        assert_eq!(eval_str(src), "true");
    }

    #[test]
    fn test_utc_fields() {
        let src = "var d = new Date(Date.UTC(2021, 11, 31, 23, 59, 58, 1)); \
                   [d.getUTCFullYear(), d.getUTCMonth(), d.getUTCDate(), d.getUTCDay(), d.getUTCHours(), d.getUTCSeconds()].join()";
        assert_eq!(eval_str(src), "2021,11,31,5,23,58");
        assert_eq!(eval_str("new Date(0).toUTCString()"), "Thu, 01 Jan 1970 00:00:00 GMT");
        assert_eq!(eval_str("Date.UTC(2020)"), "1577836800000");
        assert_eq!(eval_str("isNaN(Date.UTC())"), "true");
    }

    #[test]
    fn test_setters() {
        let src = "var d = new Date(Date.UTC(2020, 0, 31)); d.setUTCMonth(1); d.toISOString()";
        assert_eq!(eval_str(src), "2020-03-02T00:00:00.000Z");
        let src = "var d = new Date(0); var r = d.setUTCHours(25, 1); [r === d.getTime(), d.toISOString()].join()";
        assert_eq!(eval_str(src), "true,1970-01-02T01:01:00.000Z");
        let src = "var d = new Date(2020, 5, 15, 10); d.setMinutes(90); [d.getHours(), d.getMinutes()].join()";
        assert_eq!(eval_str(src), "11,30");
        let src = "var d = new Date(NaN); [d.setDate(1), d.setUTCFullYear(2000), d.toISOString()].join()";
        assert_eq!(eval_str(src), "NaN,946684800000,2000-01-01T00:00:00.000Z");
        assert_eq!(eval_str("var d = new Date(0); d.setTime(8.64e15 + 1); String(d)"), "Invalid Date");
    }

    #[test]
    fn test_construction() {
        assert_eq!(eval_str("new Date(new Date(1234)).getTime()"), "1234");
        assert_eq!(eval_str("new Date('1970-01-01T00:00:00.042Z').getTime()"), "42");
        assert_eq!(eval_str("new Date({ valueOf() { return 7; } }).getTime()"), "7");
        assert_eq!(eval_str("typeof Date() + (Date.now() > 1.5e12)"), "stringtrue");
        assert_eq!(eval_str("Object.prototype.toString.call(new Date(0))"), "[object Date]");
        assert!(thrown("Date.prototype.getTime.call({})").starts_with("TypeError"));
        assert!(thrown("Date.prototype.getTime()").starts_with("TypeError"));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(eval_str("var d = new Date(5); [d + 1 === d.toString() + '1', d - 1, +d].join()"), "true,4,5");
        assert_eq!(eval_str("JSON.stringify({ at: new Date(0), bad: new Date(NaN) })"), r#"{"at":"1970-01-01T00:00:00.000Z","bad":null}"#);
        assert_eq!(eval_str("Date.prototype.toJSON.call({ toISOString() { return 'custom'; } })"), "custom");
        assert!(thrown("new Date(0)[Symbol.toPrimitive]('bogus')").starts_with("TypeError"));
        assert_eq!(eval_str("String(new Date(NaN))"), "Invalid Date");
        assert!(eval_str("new Date(0).toString()").contains(" GMT"));
    }
}
