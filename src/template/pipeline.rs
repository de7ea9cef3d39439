//! Preprocessor that lowers the Go-style mustache/pipe template surface
//! syntax (`{{ .Labels.alertname | toUpper }}`, `{{if .X}}...{{end}}`)
//! into handlebars syntax before the source ever reaches the handlebars
//! parser. This lets templates keep the exact notation the contract
//! specifies while still running on a real, sandboxed template engine.
//!
//! Unknown function names are rejected here, at preprocessing time, which
//! gives the "parse error" behavior the closed function registry
//! requires without handlebars itself knowing about the registry.

use crate::error::{Result, SentinelError};

use super::functions::FUNCTION_NAMES;

/// Lower the full Go-template-flavored `source` into handlebars syntax.
pub fn preprocess(source: &str) -> Result<String> {
    let mut output = String::with_capacity(source.len());
    let mut rest = source;
    let mut block_stack: Vec<&'static str> = Vec::new();

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let end = after_open
            .find("}}")
            .ok_or_else(|| SentinelError::template_parse(source, "unterminated {{ tag"))?;
        let tag = after_open[..end].trim();
        rest = &after_open[end + 2..];

        output.push_str(&lower_tag(tag, &mut block_stack, source)?);
    }
    output.push_str(rest);

    if !block_stack.is_empty() {
        return Err(SentinelError::template_parse(
            source,
            format!("unclosed block(s): {}", block_stack.join(", ")),
        ));
    }

    Ok(output)
}

fn lower_tag(tag: &str, block_stack: &mut Vec<&'static str>, source: &str) -> Result<String> {
    if let Some(cond) = tag.strip_prefix("if ") {
        block_stack.push("if");
        let expr = convert_expression(cond.trim(), source)?;
        return Ok(format!("{{{{#if {expr}}}}}"));
    }
    if let Some(list) = tag.strip_prefix("range ") {
        block_stack.push("each");
        let expr = convert_expression(list.trim(), source)?;
        return Ok(format!("{{{{#each {expr}}}}}"));
    }
    if tag == "else" {
        return Ok("{{else}}".to_string());
    }
    if tag == "end" {
        let kind = block_stack
            .pop()
            .ok_or_else(|| SentinelError::template_parse(source, "{{end}} with no open block"))?;
        return Ok(format!("{{{{/{kind}}}}}"));
    }

    let expr = convert_expression(tag, source)?;
    Ok(format!("{{{{{expr}}}}}"))
}

/// Convert one `{{ ... }}` expression body (already stripped of the
/// delimiters) from Go-template dot-path/pipe notation into a handlebars
/// expression, validating every referenced function name along the way.
pub fn convert_expression(expr: &str, source: &str) -> Result<String> {
    let stages = split_top_level(expr, '|');
    if stages.is_empty() {
        return Err(SentinelError::template_parse(source, "empty expression"));
    }

    let mut stages_iter = stages.into_iter();
    let base = stages_iter.next().expect("checked non-empty above");
    let base_tokens = tokenize_whitespace(&base);
    if base_tokens.is_empty() {
        return Err(SentinelError::template_parse(source, "empty expression"));
    }
    if base_tokens.len() > 1 && is_call_head(&base_tokens[0]) {
        validate_function_name(&base_tokens[0], source)?;
    }
    let mut cur = base_tokens.iter().map(|t| convert_token(t)).collect::<Vec<_>>().join(" ");

    for stage in stages_iter {
        let tokens = tokenize_whitespace(&stage);
        let fn_name = tokens
            .first()
            .ok_or_else(|| SentinelError::template_parse(source, "pipe stage with no function name"))?;
        validate_function_name(fn_name, source)?;

        let args: Vec<String> = tokens[1..].iter().map(|t| convert_token(t)).collect();
        let mut call = fn_name.clone();
        for arg in &args {
            call.push(' ');
            call.push_str(arg);
        }
        call.push(' ');
        call.push_str(&wrap_as_arg(&cur));
        cur = call;
    }

    Ok(cur)
}

fn validate_function_name(name: &str, source: &str) -> Result<()> {
    if FUNCTION_NAMES.contains(&name) {
        Ok(())
    } else {
        Err(SentinelError::template_parse(source, format!("unknown template function {name:?}")))
    }
}

/// A token is "calling" a function when it isn't a path (`.Foo`), a
/// quoted literal (`"..."`), or a bare number.
fn is_call_head(token: &str) -> bool {
    !(token.starts_with('.') || token.starts_with('"') || token.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false))
}

/// Convert a single leaf token: dot-paths drop their leading `.` (and the
/// lone root path `.` becomes `this`); anything else (quoted literals,
/// numbers, bare identifiers already valid in handlebars) passes through.
fn convert_token(token: &str) -> String {
    if let Some(path) = token.strip_prefix('.') {
        if path.is_empty() {
            "this".to_string()
        } else {
            path.to_string()
        }
    } else {
        token.to_string()
    }
}

fn wrap_as_arg(expr: &str) -> String {
    if expr.contains(' ') {
        format!("({expr})")
    } else {
        expr.to_string()
    }
}

/// Split `s` on top-level occurrences of `delim`, ignoring anything
/// inside double-quoted substrings.
fn split_top_level(s: &str, delim: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in s.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c == delim && !in_quotes => {
                parts.push(current.trim().to_string());
                current = String::new();
            }
            c => current.push(c),
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() || !parts.is_empty() {
        parts.push(trimmed.to_string());
    }
    parts
}

/// Split `s` on whitespace, keeping double-quoted substrings intact.
fn tokenize_whitespace(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in s.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
