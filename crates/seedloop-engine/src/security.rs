//! Security / input limits (spec §4.11): size caps and sensitive-field
//! masking at the logging boundary.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::field::{Field, Visit};
use tracing::Subscriber;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

pub const MAX_INITIAL_CTX_BYTES: usize = 50_000;
pub const MAX_RESPONSE_BYTES: usize = 10_000;
pub const MAX_SEED_BYTES: usize = 1_000_000;
pub const MAX_LLM_RESP_BYTES: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeCheck {
    Ok,
    /// The caller must truncate with a warning, not reject (spec §4.11:
    /// LLM responses are truncated, never rejected outright).
    TruncateWithWarning,
    Rejected,
}

pub fn check_initial_context(bytes: &[u8]) -> SizeCheck {
    if bytes.len() > MAX_INITIAL_CTX_BYTES {
        SizeCheck::Rejected
    } else {
        SizeCheck::Ok
    }
}

pub fn check_user_response(bytes: &[u8]) -> SizeCheck {
    if bytes.len() > MAX_RESPONSE_BYTES {
        SizeCheck::Rejected
    } else {
        SizeCheck::Ok
    }
}

pub fn check_seed_file(bytes: &[u8]) -> SizeCheck {
    if bytes.len() > MAX_SEED_BYTES {
        SizeCheck::Rejected
    } else {
        SizeCheck::Ok
    }
}

/// LLM responses over the cap are truncated with a warning, not rejected —
/// the one exception to the reject-on-overflow rule (spec §4.11).
pub fn truncate_llm_response(text: &str) -> (String, bool) {
    if text.len() > MAX_LLM_RESP_BYTES {
        let mut end = MAX_LLM_RESP_BYTES;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        (text[..end].to_string(), true)
    } else {
        (text.to_string(), false)
    }
}

static SENSITIVE_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(api_key|password|token|bearer)").expect("static pattern compiles")
});

static SENSITIVE_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(sk-[A-Za-z0-9_-]+|pk-[A-Za-z0-9_-]+|Bearer\s+[A-Za-z0-9._-]+)").expect("static pattern compiles")
});

fn mask_value(value: &str) -> String {
    if value.len() <= 4 {
        "*".repeat(value.len())
    } else {
        format!("{}{}", "*".repeat(value.len() - 4), &value[value.len() - 4..])
    }
}

/// Masks sensitive field values in a `key=value` formatted log line,
/// retaining only the last four characters, per spec §4.11. Field-name
/// matches mask the whole value; value-pattern matches mask in place.
pub fn mask_sensitive(line: &str) -> String {
    let mut masked = SENSITIVE_VALUE
        .replace_all(line, |caps: &regex::Captures| mask_value(&caps[0]))
        .to_string();

    if let Some(m) = SENSITIVE_FIELD.find(&masked.clone()) {
        // Find the value following `key=` or `key: ` after the field name
        // match and mask up to the next whitespace or comma.
        let rest = &masked[m.end()..];
        if let Some(eq_offset) = rest.find(['=', ':']) {
            let value_start = m.end() + eq_offset + 1;
            let value_slice = &masked[value_start..];
            let value_len = value_slice
                .find(|c: char| c.is_whitespace() || c == ',')
                .unwrap_or(value_slice.len());
            let value = &masked[value_start..value_start + value_len];
            let replacement = mask_value(value.trim_matches('"'));
            masked = format!("{}{}{}", &masked[..value_start], replacement, &masked[value_start + value_len..]);
        }
    }
    masked
}

/// Collects one event's fields into a `key=value, ...` line, masking each
/// value through [`mask_sensitive`] as it is recorded. Shaped like
/// `tracing_subscriber::fmt`'s default field formatter so wrapping a
/// subscriber in [`MaskingLayer`] changes nothing about a log line but its
/// sensitive values.
#[derive(Default)]
struct MaskingVisitor {
    parts: Vec<String>,
}

impl Visit for MaskingVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let raw = format!("{}={value:?}", field.name());
        self.parts.push(mask_sensitive(&raw));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        let raw = format!("{}={value}", field.name());
        self.parts.push(mask_sensitive(&raw));
    }
}

/// A `tracing_subscriber::Layer` that runs every event's fields through
/// [`mask_sensitive`] before handing the formatted line to `sink` (spec
/// §4.11: masking must be automatic, not opt-in per call site).
pub struct MaskingLayer {
    sink: Arc<dyn Fn(&str) + Send + Sync>,
}

impl MaskingLayer {
    /// Writes masked lines to stdout.
    pub fn stdout() -> Self {
        Self::new(|line: &str| println!("{line}"))
    }

    /// Accepts an arbitrary sink, so callers (and tests) can capture the
    /// masked output instead of printing it.
    pub fn new(sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self { sink: Arc::new(sink) }
    }
}

impl<S> Layer<S> for MaskingLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MaskingVisitor::default();
        event.record(&mut visitor);
        let line = format!("{} {}: {}", event.metadata().level(), event.metadata().target(), visitor.parts.join(", "));
        (self.sink)(&line);
    }
}
