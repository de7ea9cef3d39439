//! The closed function registry: every name a template is allowed to call.
//! Registered once at engine construction as handlebars helpers; anything
//! not in [`FUNCTION_NAMES`] is rejected at parse time by
//! [`super::pipeline::convert_expression`].

use chrono::{DateTime, TimeZone, Utc};
use handlebars::{Context, Handlebars, Helper, HelperResult, Output, RenderContext, RenderError};
use serde_json::Value;

/// Every function name a conformant template may reference, grouped by
/// family to mirror the contract's own grouping.
pub const FUNCTION_NAMES: &[&str] = &[
    // time
    "humanizeTimestamp", "since", "until", "date", "unixEpoch", "now", "humanizeDuration",
    // string
    "toUpper", "toLower", "title", "truncate", "truncateWords", "join", "split", "trim",
    "trimPrefix", "trimSuffix",
    // math
    "humanize", "humanize1024", "add", "sub", "round",
    // collection
    "sortAlpha", "reverse", "uniq", "sortedPairs",
    // conditional
    "default", "empty", "ternary", "has", "coalesce",
    // url
    "urlEncode", "pathJoin", "pathBase",
    // encoding
    "b64enc", "b64dec", "toJson", "toPrettyJson",
];

pub fn register_all(hb: &mut Handlebars) {
    hb.register_helper("humanizeTimestamp", Box::new(humanize_timestamp));
    hb.register_helper("since", Box::new(since));
    hb.register_helper("until", Box::new(until));
    hb.register_helper("date", Box::new(date));
    hb.register_helper("unixEpoch", Box::new(unix_epoch));
    hb.register_helper("now", Box::new(now));
    hb.register_helper("humanizeDuration", Box::new(humanize_duration));

    hb.register_helper("toUpper", Box::new(to_upper));
    hb.register_helper("toLower", Box::new(to_lower));
    hb.register_helper("title", Box::new(title));
    hb.register_helper("truncate", Box::new(truncate));
    hb.register_helper("truncateWords", Box::new(truncate_words));
    hb.register_helper("join", Box::new(join));
    hb.register_helper("split", Box::new(split));
    hb.register_helper("trim", Box::new(trim));
    hb.register_helper("trimPrefix", Box::new(trim_prefix));
    hb.register_helper("trimSuffix", Box::new(trim_suffix));

    hb.register_helper("humanize", Box::new(humanize));
    hb.register_helper("humanize1024", Box::new(humanize1024));
    hb.register_helper("add", Box::new(add));
    hb.register_helper("sub", Box::new(sub));
    hb.register_helper("round", Box::new(round));

    hb.register_helper("sortAlpha", Box::new(sort_alpha));
    hb.register_helper("reverse", Box::new(reverse));
    hb.register_helper("uniq", Box::new(uniq));
    hb.register_helper("sortedPairs", Box::new(sorted_pairs));

    hb.register_helper("default", Box::new(default_fn));
    hb.register_helper("empty", Box::new(empty));
    hb.register_helper("ternary", Box::new(ternary));
    hb.register_helper("has", Box::new(has));
    hb.register_helper("coalesce", Box::new(coalesce));

    hb.register_helper("urlEncode", Box::new(url_encode));
    hb.register_helper("pathJoin", Box::new(path_join));
    hb.register_helper("pathBase", Box::new(path_base));

    hb.register_helper("b64enc", Box::new(b64enc));
    hb.register_helper("b64dec", Box::new(b64dec));
    hb.register_helper("toJson", Box::new(to_json));
    hb.register_helper("toPrettyJson", Box::new(to_pretty_json));
}

fn param_value<'a>(h: &'a Helper, index: usize) -> Result<&'a Value, RenderError> {
    h.param(index)
        .map(|p| p.value())
        .ok_or_else(|| RenderError::new(format!("missing argument at position {index}")))
}

fn as_str<'a>(value: &'a Value) -> &'a str {
    value.as_str().unwrap_or_default()
}

fn as_f64(value: &Value) -> f64 {
    value.as_f64().unwrap_or(0.0)
}

fn write(out: &mut dyn Output, s: &str) -> HelperResult {
    out.write(s)?;
    Ok(())
}

/// Parse a timestamp param that may be an RFC3339 string or unix seconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    if let Some(s) = value.as_str() {
        return DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc));
    }
    if let Some(n) = value.as_f64() {
        return Utc.timestamp_opt(n as i64, 0).single();
    }
    None
}

/// Render `d` (seconds, always treated as non-negative) using the greedy
/// `d h m s` policy with the trailing-zero component dropped and
/// sub-second durations rendered as milliseconds.
pub fn format_duration_secs(seconds: f64) -> String {
    let seconds = seconds.abs();
    if seconds < 1.0 {
        return format!("{}ms", (seconds * 1000.0).round() as i64);
    }
    let total = seconds.round() as i64;
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let mins = (total % 3_600) / 60;
    let secs = total % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 || !parts.is_empty() {
        parts.push(format!("{hours}h"));
    }
    if mins > 0 || !parts.is_empty() {
        parts.push(format!("{mins}m"));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{secs}s"));
    }
    // Drop a trailing-zero component (e.g. "2h 0m" -> "2h"), but never the
    // last remaining part.
    while parts.len() > 1 && parts.last().map(|p| p.starts_with('0')).unwrap_or(false) {
        parts.pop();
    }
    parts.join(" ")
}

fn humanize_timestamp(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let value = param_value(h, 0)?;
    let dt = parse_timestamp(value).ok_or_else(|| RenderError::new("humanizeTimestamp: invalid timestamp"))?;
    write(out, &dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

fn since(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let value = param_value(h, 0)?;
    let dt = parse_timestamp(value).ok_or_else(|| RenderError::new("since: invalid timestamp"))?;
    let secs = (Utc::now() - dt).num_milliseconds() as f64 / 1000.0;
    write(out, &format_duration_secs(secs))
}

fn until(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let value = param_value(h, 0)?;
    let dt = parse_timestamp(value).ok_or_else(|| RenderError::new("until: invalid timestamp"))?;
    let secs = (dt - Utc::now()).num_milliseconds() as f64 / 1000.0;
    write(out, &format_duration_secs(secs))
}

/// Translate a small subset of Go's reference-time layout tokens
/// (`2006-01-02 15:04:05`) into `chrono` strftime directives. Uncommon
/// tokens pass through unchanged rather than erroring, since the fixed
/// registry prioritizes the layouts alerting templates actually use.
fn go_layout_to_strftime(layout: &str) -> String {
    const REPLACEMENTS: &[(&str, &str)] = &[
        ("2006", "%Y"),
        ("06", "%y"),
        ("01", "%m"),
        ("02", "%d"),
        ("15", "%H"),
        ("03", "%I"),
        ("04", "%M"),
        ("05", "%S"),
        ("Jan", "%b"),
        ("Mon", "%a"),
        ("PM", "%p"),
        ("MST", "%Z"),
        ("Z07:00", "%:z"),
    ];
    let mut result = layout.to_string();
    for (from, to) in REPLACEMENTS {
        result = result.replace(from, to);
    }
    result
}

fn date(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let fmt = as_str(param_value(h, 0)?).to_string();
    let value = param_value(h, 1)?;
    let dt = parse_timestamp(value).ok_or_else(|| RenderError::new("date: invalid timestamp"))?;
    write(out, &dt.format(&go_layout_to_strftime(&fmt)).to_string())
}

fn unix_epoch(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let value = param_value(h, 0)?;
    let dt = parse_timestamp(value).ok_or_else(|| RenderError::new("unixEpoch: invalid timestamp"))?;
    write(out, &dt.timestamp().to_string())
}

fn now(_: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    write(out, &Utc::now().to_rfc3339())
}

fn humanize_duration(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let value = param_value(h, 0)?;
    write(out, &format_duration_secs(as_f64(value)))
}

fn to_upper(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    write(out, &as_str(param_value(h, 0)?).to_uppercase())
}

fn to_lower(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    write(out, &as_str(param_value(h, 0)?).to_lowercase())
}

fn title(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let s = as_str(param_value(h, 0)?);
    let titled = s
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    write(out, &titled)
}

fn truncate(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let n = as_f64(param_value(h, 0)?) as usize;
    let s = as_str(param_value(h, 1)?);
    write(out, &truncate_str(n, s))
}

/// Truncate `s` to at most `n` characters, appending an ellipsis when
/// shortened and `n >= 3` (the ellipsis itself consumes 3 of the budget);
/// otherwise a hard cut with no ellipsis.
pub fn truncate_str(n: usize, s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= n {
        return s.to_string();
    }
    if n >= 3 {
        let keep = n - 3;
        let mut result: String = chars[..keep].iter().collect();
        result.push_str("...");
        result
    } else {
        chars[..n].iter().collect()
    }
}

fn truncate_words(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let n = as_f64(param_value(h, 0)?) as usize;
    let s = as_str(param_value(h, 1)?);
    let words: Vec<&str> = s.split_whitespace().collect();
    if words.len() <= n {
        return write(out, s);
    }
    let mut joined = words[..n].join(" ");
    joined.push_str("...");
    write(out, &joined)
}

fn join(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let sep = as_str(param_value(h, 0)?);
    let list = param_value(h, 1)?;
    let items: Vec<String> = list
        .as_array()
        .map(|a| a.iter().map(value_to_plain_string).collect())
        .unwrap_or_default();
    write(out, &items.join(sep))
}

fn split(h: &Helper, _: &Handlebars, _: &Context, rc: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let sep = as_str(param_value(h, 0)?).to_string();
    let s = as_str(param_value(h, 1)?).to_string();
    let parts: Vec<Value> = s.split(sep.as_str()).map(|p| Value::String(p.to_string())).collect();
    let _ = rc;
    write(out, &serde_json::to_string(&parts).unwrap_or_default())
}

fn trim(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    write(out, as_str(param_value(h, 0)?).trim())
}

fn trim_prefix(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let prefix = as_str(param_value(h, 0)?);
    let s = as_str(param_value(h, 1)?);
    write(out, s.strip_prefix(prefix).unwrap_or(s))
}

fn trim_suffix(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let suffix = as_str(param_value(h, 0)?);
    let s = as_str(param_value(h, 1)?);
    write(out, s.strip_suffix(suffix).unwrap_or(s))
}

/// SI-style humanization (k/M/G, two decimals).
pub fn humanize_si(n: f64) -> String {
    const UNITS: &[(f64, &str)] = &[(1e9, "G"), (1e6, "M"), (1e3, "k")];
    for (scale, suffix) in UNITS {
        if n.abs() >= *scale {
            return format!("{:.2}{}", n / scale, suffix);
        }
    }
    format!("{n:.2}")
}

fn humanize(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    write(out, &humanize_si(as_f64(param_value(h, 0)?)))
}

/// Binary (KiB/MiB/GiB) humanization with two decimals.
pub fn humanize_binary(n: f64) -> String {
    const UNITS: &[(f64, &str)] = &[
        (1024.0 * 1024.0 * 1024.0, "GiB"),
        (1024.0 * 1024.0, "MiB"),
        (1024.0, "KiB"),
    ];
    for (scale, suffix) in UNITS {
        if n.abs() >= *scale {
            return format!("{:.2} {}", n / scale, suffix);
        }
    }
    format!("{n:.2} B")
}

fn humanize1024(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    write(out, &humanize_binary(as_f64(param_value(h, 0)?)))
}

fn add(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let a = as_f64(param_value(h, 0)?);
    let b = as_f64(param_value(h, 1)?);
    write(out, &format_number(a + b))
}

fn sub(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let a = as_f64(param_value(h, 0)?);
    let b = as_f64(param_value(h, 1)?);
    write(out, &format_number(a - b))
}

fn round(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let n = as_f64(param_value(h, 0)?);
    let digits = h.param(1).and_then(|p| p.value().as_f64()).unwrap_or(0.0) as i32;
    let factor = 10f64.powi(digits);
    write(out, &format_number((n * factor).round() / factor))
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

fn value_to_plain_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn sort_alpha(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let list = param_value(h, 0)?;
    let mut items: Vec<String> = list.as_array().map(|a| a.iter().map(value_to_plain_string).collect()).unwrap_or_default();
    items.sort();
    write(out, &serde_json::to_string(&items).unwrap_or_default())
}

fn reverse(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let list = param_value(h, 0)?;
    let mut items: Vec<Value> = list.as_array().cloned().unwrap_or_default();
    items.reverse();
    write(out, &serde_json::to_string(&items).unwrap_or_default())
}

fn uniq(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let list = param_value(h, 0)?;
    let mut seen = std::collections::HashSet::new();
    let mut items = Vec::new();
    for item in list.as_array().cloned().unwrap_or_default() {
        let key = value_to_plain_string(&item);
        if seen.insert(key) {
            items.push(item);
        }
    }
    write(out, &serde_json::to_string(&items).unwrap_or_default())
}

fn sorted_pairs(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let map = param_value(h, 0)?;
    let mut pairs: Vec<(String, String)> = map
        .as_object()
        .map(|m| m.iter().map(|(k, v)| (k.clone(), value_to_plain_string(v))).collect())
        .unwrap_or_default();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    let items: Vec<String> = pairs.into_iter().map(|(k, v)| format!("{k}={v}")).collect();
    write(out, &serde_json::to_string(&items).unwrap_or_default())
}

fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
    }
}

fn default_fn(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let d = param_value(h, 0)?;
    let v = param_value(h, 1)?;
    let chosen = if is_empty_value(v) { d } else { v };
    write(out, &value_to_plain_string(chosen))
}

fn empty(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    write(out, &is_empty_value(param_value(h, 0)?).to_string())
}

fn ternary(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let yes = param_value(h, 0)?;
    let no = param_value(h, 1)?;
    let cond = param_value(h, 2)?;
    let truthy = match cond {
        Value::Bool(b) => *b,
        other => !is_empty_value(other),
    };
    write(out, &value_to_plain_string(if truthy { yes } else { no }))
}

fn has(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let key = as_str(param_value(h, 0)?);
    let map = param_value(h, 1)?;
    let found = map.as_object().map(|m| m.contains_key(key)).unwrap_or(false);
    write(out, &found.to_string())
}

fn coalesce(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    for param in h.params() {
        if !is_empty_value(param.value()) {
            return write(out, &value_to_plain_string(param.value()));
        }
    }
    write(out, "")
}

fn url_encode(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    write(out, &urlencoding::encode(as_str(param_value(h, 0)?)))
}

fn path_join(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let parts: Vec<String> = h.params().iter().map(|p| value_to_plain_string(p.value())).collect();
    let joined = parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    write(out, &joined)
}

fn path_base(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    let path = as_str(param_value(h, 0)?);
    write(out, path.rsplit('/').next().unwrap_or(path))
}

fn b64enc(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    use base64::Engine;
    write(out, &base64::engine::general_purpose::STANDARD.encode(as_str(param_value(h, 0)?)))
}

fn b64dec(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    use base64::Engine;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(as_str(param_value(h, 0)?))
        .map_err(|e| RenderError::new(format!("b64dec: {e}")))?;
    write(out, &String::from_utf8_lossy(&decoded))
}

fn to_json(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    write(out, &serde_json::to_string(param_value(h, 0)?).unwrap_or_default())
}

fn to_pretty_json(h: &Helper, _: &Handlebars, _: &Context, _: &mut RenderContext, out: &mut dyn Output) -> HelperResult {
    write(out, &serde_json::to_string_pretty(param_value(h, 0)?).unwrap_or_default())
}
