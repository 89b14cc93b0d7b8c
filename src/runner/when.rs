//! When condition evaluation
//!
//! Evaluates the small `when` expression language:
//!
//! - boolean literals: `true`/`yes`/`1`, `false`/`no`/`0` (any case)
//! - bare variable references: `$name`, `${name}`, `{name}`
//! - a single comparison: `==`, `!=`, `>=`, `<=`, `>`, `<`
//!
//! Operators are matched by a fixed priority list, not by position. When an
//! expression contains several operator substrings, the first operator in
//! [`OPERATORS`] that occurs anywhere wins, so `a > b == c` splits on `==`.

use crate::error::{ConditionError, ConditionResult};
use crate::runner::ExecutionContext;

/// Comparison operators in match priority order
pub const OPERATORS: [&str; 6] = ["==", "!=", ">=", "<=", ">", "<"];

/// Evaluate a `when` expression against a context
///
/// The context is never modified. An error is returned for expressions that
/// are neither a literal, a variable reference, nor a comparison, and for
/// ordering comparisons between non-integers; callers decide what an error
/// means for the task.
pub fn evaluate_when(ctx: &ExecutionContext<'_>, expression: &str) -> ConditionResult<bool> {
    let expr = strip_quotes(expression.trim());

    if let Some(value) = parse_bool(expr) {
        return Ok(value);
    }

    if is_variable_reference(expr) {
        return Ok(match ctx.get_var(variable_name(expr)) {
            Some(value) => parse_bool(value).unwrap_or(!value.is_empty()),
            None => false,
        });
    }

    let operator = OPERATORS
        .iter()
        .copied()
        .find(|op| expr.contains(op))
        .ok_or_else(|| ConditionError::Malformed(expression.to_string()))?;

    let (left, right) = expr
        .split_once(operator)
        .ok_or_else(|| ConditionError::Malformed(expression.to_string()))?;
    let left = resolve_operand(ctx, left.trim());
    let right = resolve_operand(ctx, right.trim());

    compare(strip_quotes(left), strip_quotes(right), operator).ok_or_else(|| {
        ConditionError::NonNumericOperand {
            expression: expression.to_string(),
            operator,
        }
    })
}

/// Interpret a boolean literal (case-insensitive)
pub fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("yes") || s == "1" {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") || s.eq_ignore_ascii_case("no") || s == "0" {
        Some(false)
    } else {
        None
    }
}

fn is_variable_reference(s: &str) -> bool {
    s.starts_with('$') || s.starts_with('{')
}

/// Extract the name from `$name`, `${name}` or `{name}`
///
/// Anything after the first closing brace is ignored.
fn variable_name(s: &str) -> &str {
    let name = s.strip_prefix('$').unwrap_or(s);
    match name.strip_prefix('{') {
        Some(braced) => braced.split('}').next().unwrap_or(braced),
        None => name,
    }
}

/// Resolve an operand that may be a variable reference (unset is empty)
fn resolve_operand<'c>(ctx: &'c ExecutionContext<'_>, operand: &'c str) -> &'c str {
    if is_variable_reference(operand) {
        ctx.get_var(variable_name(operand)).unwrap_or("")
    } else {
        operand
    }
}

/// Strip one layer of surrounding double quotes
fn strip_quotes(s: &str) -> &str {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// Apply `operator`; `None` when an ordering operand is not an integer
fn compare(left: &str, right: &str, operator: &str) -> Option<bool> {
    match operator {
        "==" => Some(left == right),
        "!=" => Some(left != right),
        _ => {
            let l: i64 = left.parse().ok()?;
            let r: i64 = right.parse().ok()?;
            match operator {
                ">=" => Some(l >= r),
                "<=" => Some(l <= r),
                ">" => Some(l > r),
                "<" => Some(l < r),
                _ => None,
            }
        }
    }
}
