use domain::GlitchType;
use serde::Deserialize;

use crate::error::ValidatorError;

/// The validator's decision, after parsing and clamping the model's raw
/// JSON output.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub is_glitch: bool,
    pub confidence: u8,
    pub reasoning: String,
    pub glitch_type: GlitchType,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    is_glitch: bool,
    #[serde(default)]
    confidence: i64,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    glitch_type: Option<String>,
}

/// §4.3 step 4 / §9 "strict parser": locate the first balanced `{...}` in
/// `text` (tolerating surrounding prose the model may have added despite
/// being asked not to), deserialize it, and reject anything missing the
/// required `is_glitch` field. Confidence is clamped to `[0,100]`; an
/// unrecognized or missing `glitch_type` maps to `Unknown` rather than
/// failing the whole response, since §3 treats it as informational.
pub fn parse_model_output(text: &str) -> Result<ModelOutput, ValidatorError> {
    let object = locate_balanced_object(text)
        .ok_or_else(|| ValidatorError::ParseFailure("no balanced JSON object found".into()))?;

    let raw: RawOutput = serde_json::from_str(object)
        .map_err(|e| ValidatorError::ParseFailure(e.to_string()))?;

    let confidence = raw.confidence.clamp(0, 100) as u8;
    let glitch_type = match raw.glitch_type.as_deref() {
        Some("decimal_error") => GlitchType::DecimalError,
        Some("database_error") => GlitchType::DatabaseError,
        Some("clearance") => GlitchType::Clearance,
        Some("coupon_stack") => GlitchType::CouponStack,
        _ => GlitchType::Unknown,
    };

    Ok(ModelOutput {
        is_glitch: raw.is_glitch,
        confidence,
        reasoning: raw.reasoning,
        glitch_type,
    })
}

/// Scan `text` for the first `{`, then track brace depth (ignoring braces
/// inside string literals) until it returns to zero, returning that
/// substring. Returns `None` if no balanced object exists.
fn locate_balanced_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }

    None
}
