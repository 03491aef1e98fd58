use crate::transcript::Record;
use serde::Serialize;
use serde_json::Value;

/// Token counters carried on one assistant message (`message.usage`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input: u64,
    pub output: u64,
    pub cache_creation: u64,
    pub cache_read: u64,
    pub reasoning: u64,
}

/// Coerce a counter that may be missing, a float, or a numeric string.
/// Anything else (booleans, null, negative or garbage values) counts as 0.
fn tokens(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f as u64)
            .unwrap_or(0),
        _ => 0,
    }
}

impl Usage {
    /// Parse a usage object. Returns `None` for anything that isn't a
    /// non-empty object, so "no usage reported" stays distinguishable from
    /// "reported all zeros".
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object().filter(|o| !o.is_empty())?;
        let reasoning = match tokens(obj.get("reasoning_tokens")) {
            0 => tokens(obj.get("reasoning_output_tokens")),
            n => n,
        };
        Some(Self {
            input: tokens(obj.get("input_tokens")),
            output: tokens(obj.get("output_tokens")),
            cache_creation: tokens(obj.get("cache_creation_input_tokens")),
            cache_read: tokens(obj.get("cache_read_input_tokens")),
            reasoning,
        })
    }
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

/// Per-turn token totals. Cache and reasoning counters are side
/// information and stay out of `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub input: u64,
    pub output: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub input_cache_creation: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub input_cache_read: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub reasoning: u64,
    pub total: u64,
}

/// Sum usage across a turn's assistant messages. `None` when no message
/// carried usage at all.
pub fn aggregate(assistants: &[Record]) -> Option<UsageSummary> {
    let mut found = false;
    let mut sum = Usage::default();
    for usage in assistants.iter().filter_map(|r| r.usage.as_ref()) {
        found = true;
        sum.input = sum.input.saturating_add(usage.input);
        sum.output = sum.output.saturating_add(usage.output);
        sum.cache_creation = sum.cache_creation.saturating_add(usage.cache_creation);
        sum.cache_read = sum.cache_read.saturating_add(usage.cache_read);
        sum.reasoning = sum.reasoning.saturating_add(usage.reasoning);
    }
    found.then(|| UsageSummary {
        input: sum.input,
        output: sum.output,
        input_cache_creation: sum.cache_creation,
        input_cache_read: sum.cache_read,
        reasoning: sum.reasoning,
        total: sum.input.saturating_add(sum.output),
    })
}
