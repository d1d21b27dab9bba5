// ABOUTME: Inline template interpolation for slide bodies
// ABOUTME: Replaces [[ path.to.field ]] tags with values from the slide and presentation

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub const OPEN_DELIMITER: &str = "[[";
pub const CLOSE_DELIMITER: &str = "]]";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (at byte {offset})")]
pub struct TemplateError {
    pub message: String,
    pub offset: usize,
}

impl TemplateError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// Render `source` against any serializable context.
pub fn render<C: Serialize>(source: &str, context: &C) -> Result<String, TemplateError> {
    // Skip serializing the context when there is nothing to interpolate
    if !source.contains(OPEN_DELIMITER) {
        return Ok(source.to_string());
    }
    let value = serde_json::to_value(context)
        .map_err(|e| TemplateError::new(format!("context is not serializable: {}", e), 0))?;
    render_value(source, &value)
}

/// Render `source` against an already serialized context.
pub fn render_value(source: &str, context: &Value) -> Result<String, TemplateError> {
    let mut output = String::with_capacity(source.len());
    let mut rest = source;
    let mut offset = 0;

    while let Some(start) = rest.find(OPEN_DELIMITER) {
        output.push_str(&rest[..start]);
        let tag_offset = offset + start;
        let after_open = &rest[start + OPEN_DELIMITER.len()..];
        let end = after_open
            .find(CLOSE_DELIMITER)
            .ok_or_else(|| TemplateError::new("unterminated tag", tag_offset))?;

        let expression = after_open[..end].trim();
        let value = lookup(context, expression)
            .map_err(|message| TemplateError::new(message, tag_offset))?;
        write_value(&mut output, value);

        let consumed = start + OPEN_DELIMITER.len() + end + CLOSE_DELIMITER.len();
        rest = &rest[consumed..];
        offset += consumed;
    }

    output.push_str(rest);
    Ok(output)
}

/// Resolve a dotted path such as `presentation.name` or `.slide.section_id`.
fn lookup<'a>(context: &'a Value, expression: &str) -> Result<&'a Value, String> {
    let path = expression.strip_prefix('.').unwrap_or(expression);
    if path.is_empty() {
        return Err("empty expression".to_string());
    }

    let mut current = context;
    for segment in path.split('.') {
        if segment.is_empty() || !segment.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(format!("invalid expression {:?}", expression));
        }
        current = match current {
            Value::Object(map) => map
                .get(segment)
                .ok_or_else(|| format!("no field {:?} in {:?}", segment, expression))?,
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index))
                .ok_or_else(|| format!("no index {:?} in {:?}", segment, expression))?,
            _ => {
                return Err(format!(
                    "cannot evaluate {:?} on a scalar in {:?}",
                    segment, expression
                ))
            }
        };
    }
    Ok(current)
}

fn write_value(output: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => output.push_str(s),
        Value::Bool(b) => output.push_str(&b.to_string()),
        Value::Number(n) => output.push_str(&n.to_string()),
        other => output.push_str(&other.to_string()),
    }
}
