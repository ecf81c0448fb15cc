use core::fmt::{Display, Write};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};

use crate::Error;
use crate::data::{Data, OpaqueValue, Value};
use crate::handler::{HandlerContext, HandlerRegistry};
use crate::visitor::{InputNode, Scalar};

/// Default format of `NaiveDate` values.
const DATE_FORMAT: &str = "%Y-%m-%d";
/// Default format of `NaiveDateTime` values.
const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// -----------------------------------------------------------------------------
// DateHandler

/// Handlers for `chrono` dates.
///
/// | tag             | Rust types                                   | default format          |
/// |-----------------|----------------------------------------------|-------------------------|
/// | `DateTime`      | `DateTime<Utc>`, `DateTime<FixedOffset>`     | configurable (RFC 3339) |
/// | `NaiveDateTime` | `NaiveDateTime`                              | `%Y-%m-%dT%H:%M:%S`     |
/// | `NaiveDate`     | `NaiveDate`                                  | `%Y-%m-%d`              |
///
/// A property overrides the format with a type parameter:
/// `#[serial(type = "DateTime<'%d/%m/%Y %H:%M'>")]`. When parsing a
/// `DateTime` without an offset, the default timezone applies.
///
/// # Examples
///
/// ```
/// use vl_serial::handler::{DateHandler, Direction, HandlerRegistry};
///
/// let mut registry = HandlerRegistry::new();
/// DateHandler::new("%Y-%m-%d %H:%M:%S %z", "+02:00").unwrap().register(&mut registry);
///
/// assert!(registry.contains("DateTime", Direction::Serialize));
/// assert!(registry.contains("NaiveDate", Direction::Deserialize));
/// assert!(DateHandler::new("%Y", "Europe/Paris").is_err());
/// ```
#[derive(Clone, Debug)]
pub struct DateHandler {
    default_format: String,
    default_timezone: FixedOffset,
}

impl Default for DateHandler {
    /// RFC 3339 in UTC.
    fn default() -> Self {
        Self {
            default_format: "%Y-%m-%dT%H:%M:%S%:z".into(),
            default_timezone: Utc.fix(),
        }
    }
}

impl DateHandler {
    /// Creates a handler with a default `DateTime` format and timezone.
    ///
    /// The timezone is `UTC` (or `Z`) or a fixed offset like `+02:00`.
    pub fn new(default_format: impl Into<String>, default_timezone: &str) -> Result<Self, Error> {
        Ok(Self {
            default_format: default_format.into(),
            default_timezone: Self::parse_timezone(default_timezone)?,
        })
    }

    /// Parses `UTC`, `Z`, `+HH:MM`, `-HH:MM` or `+HHMM`.
    pub fn parse_timezone(text: &str) -> Result<FixedOffset, Error> {
        let invalid = || Error::configuration(format!("unsupported timezone `{text}`"));
        let text = text.trim();
        if text.eq_ignore_ascii_case("utc") || text == "Z" {
            return Ok(Utc.fix());
        }

        let (sign, rest) = match text.split_at_checked(1) {
            Some(("+", rest)) => (1, rest),
            Some(("-", rest)) => (-1, rest),
            _ => return Err(invalid()),
        };
        let digits: String = rest.chars().filter(|ch| *ch != ':').collect();
        if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
        let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
        if minutes >= 60 {
            return Err(invalid());
        }
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
    }

    #[inline]
    pub fn default_format(&self) -> &str {
        &self.default_format
    }

    #[inline]
    pub fn default_timezone(&self) -> FixedOffset {
        self.default_timezone
    }

    /// Registers both directions of `DateTime`, `NaiveDateTime` and `NaiveDate`.
    pub fn register(self, registry: &mut HandlerRegistry) {
        let this = self.clone();
        registry.register_serialize("DateTime", move |visitor, data, ctx| {
            let format = ctx.param(0).unwrap_or(&this.default_format);
            let text = if let Some(date) = data.downcast_ref::<DateTime<FixedOffset>>() {
                render(date.format(format), ctx)?
            } else if let Some(date) = data.downcast_ref::<DateTime<Utc>>() {
                render(date.format(format), ctx)?
            } else {
                return Err(ctx.error("expected a `DateTime`"));
            };
            visitor.visit_str(&text)
        });

        let this = self.clone();
        registry.register_deserialize("DateTime", move |node, ctx| {
            let text = date_text(node, ctx)?;
            let format = ctx.param(0).unwrap_or(&this.default_format);
            this.parse_date_time(text, format)
                .map(|date| Value::Opaque(OpaqueValue::new(date)))
                .ok_or_else(|| ctx.error(format!("`{text}` does not match `{format}`")))
        });

        registry.register_serialize("NaiveDateTime", |visitor, data, ctx| {
            let date = typed::<NaiveDateTime>(data, ctx)?;
            visitor.visit_str(&render(date.format(ctx.param(0).unwrap_or(NAIVE_FORMAT)), ctx)?)
        });

        registry.register_deserialize("NaiveDateTime", |node, ctx| {
            let text = date_text(node, ctx)?;
            let format = ctx.param(0).unwrap_or(NAIVE_FORMAT);
            NaiveDateTime::parse_from_str(text, format)
                .ok()
                .or_else(|| midnight(text, format))
                .map(|date| Value::Opaque(OpaqueValue::new(date)))
                .ok_or_else(|| ctx.error(format!("`{text}` does not match `{format}`")))
        });

        registry.register_serialize("NaiveDate", |visitor, data, ctx| {
            let date = typed::<NaiveDate>(data, ctx)?;
            visitor.visit_str(&render(date.format(ctx.param(0).unwrap_or(DATE_FORMAT)), ctx)?)
        });

        registry.register_deserialize("NaiveDate", |node, ctx| {
            let text = date_text(node, ctx)?;
            let format = ctx.param(0).unwrap_or(DATE_FORMAT);
            NaiveDate::parse_from_str(text, format)
                .map(|date| Value::Opaque(OpaqueValue::new(date)))
                .map_err(|err| ctx.error(format!("`{text}` does not match `{format}`: {err}")))
        });
    }

    /// Parses a zoned date, falling back to the default timezone when the
    /// format carries no offset.
    fn parse_date_time(&self, text: &str, format: &str) -> Option<DateTime<FixedOffset>> {
        if let Ok(date) = DateTime::parse_from_str(text, format) {
            return Some(date);
        }
        let naive = NaiveDateTime::parse_from_str(text, format)
            .ok()
            .or_else(|| midnight(text, format))?;
        self.default_timezone.from_local_datetime(&naive).single()
    }
}

fn typed<'a, T: 'static>(data: &'a dyn Data, ctx: &HandlerContext<'_>) -> Result<&'a T, Error> {
    data.downcast_ref::<T>()
        .ok_or_else(|| ctx.error(format!("expected a `{}`", core::any::type_name::<T>())))
}

/// Formats lazily-formatted chrono output without panicking on bad formats.
fn render(formatted: impl Display, ctx: &HandlerContext<'_>) -> Result<String, Error> {
    let mut text = String::new();
    write!(text, "{formatted}").map_err(|_| ctx.error("invalid date format"))?;
    Ok(text)
}

fn date_text<'a>(node: &'a dyn InputNode, ctx: &HandlerContext<'_>) -> Result<&'a str, Error> {
    match node.scalar() {
        Some(Scalar::Str(text) | Scalar::Text(text)) => Ok(text.trim()),
        _ => Err(Error::mismatch(ctx.path(), "date string", node.kind())),
    }
}

fn midnight(text: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDate::parse_from_str(text, format)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

// -----------------------------------------------------------------------------
// Tests
