//! Condition evaluator for IfElse nodes.
//!
//! Conditions are evaluated after template substitution, so operands are raw
//! text rather than identifiers: `a === a` compares the two strings `a` and
//! `a`. Supported grammar, loosest binding first:
//!
//! - `||` and `&&` (quote- and parenthesis-aware)
//! - `!term` and `( ... )`
//! - `=== !== == != >= <= > <` between two operands
//! - a lone operand, judged by truthiness
//!
//! Operands may be single- or double-quoted. Two operands that both parse as
//! numbers are compared numerically, otherwise as strings.

use std::cmp::Ordering;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur during condition evaluation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    #[error("Condition is empty")]
    Empty,

    #[error("Unterminated quote in condition: {0}")]
    UnterminatedQuote(String),

    #[error("Unbalanced parentheses in condition: {0}")]
    UnbalancedParentheses(String),
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate a rendered IfElse condition.
pub fn evaluate_condition(expr: &str) -> Result<bool, ExpressionError> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(ExpressionError::Empty);
    }
    for disjunct in split_top_level(expr, "||")? {
        let mut all = true;
        for conjunct in split_top_level(disjunct, "&&")? {
            if !evaluate_term(conjunct.trim())? {
                all = false;
                break;
            }
        }
        if all {
            return Ok(true);
        }
    }
    Ok(false)
}

fn evaluate_term(term: &str) -> Result<bool, ExpressionError> {
    if term.is_empty() {
        return Err(ExpressionError::Empty);
    }
    if let Some(inner) = strip_outer_parens(term) {
        return evaluate_condition(inner);
    }
    if let Some((at, op)) = find_comparison(term)? {
        let left = term[..at].trim();
        let right = term[at + op.symbol().len()..].trim();
        return Ok(op.apply(unquote(left), unquote(right)));
    }
    if let Some(rest) = term.strip_prefix('!') {
        return Ok(!evaluate_term(rest.trim())?);
    }
    Ok(is_truthy(unquote(term)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    StrictEq,
    StrictNe,
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
}

impl CompareOp {
    /// Longest symbols first so that `===` is not read as `==`.
    const ALL: [CompareOp; 8] = [
        CompareOp::StrictEq,
        CompareOp::StrictNe,
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Ge,
        CompareOp::Le,
        CompareOp::Gt,
        CompareOp::Lt,
    ];

    fn symbol(&self) -> &'static str {
        match self {
            CompareOp::StrictEq => "===",
            CompareOp::StrictNe => "!==",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
        }
    }

    fn apply(&self, left: &str, right: &str) -> bool {
        let ordering = match (left.parse::<f64>(), right.parse::<f64>()) {
            (Ok(a), Ok(b)) => a.partial_cmp(&b),
            _ => Some(left.cmp(right)),
        };
        match (self, ordering) {
            (CompareOp::StrictEq | CompareOp::Eq, Some(o)) => o == Ordering::Equal,
            (CompareOp::StrictNe | CompareOp::Ne, Some(o)) => o != Ordering::Equal,
            (CompareOp::Ge, Some(o)) => o != Ordering::Less,
            (CompareOp::Le, Some(o)) => o != Ordering::Greater,
            (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
            (CompareOp::Lt, Some(o)) => o == Ordering::Less,
            // NaN compares unequal to everything.
            (CompareOp::StrictNe | CompareOp::Ne, None) => true,
            (_, None) => false,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    if let Ok(n) = value.parse::<f64>() {
        return n != 0.0 && !n.is_nan();
    }
    !matches!(value, "" | "false" | "null" | "undefined" | "NaN")
}

fn unquote(operand: &str) -> &str {
    let bytes = operand.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' || first == b'\'') && first == last {
            return &operand[1..operand.len() - 1];
        }
    }
    operand
}

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

/// Walks `expr` byte by byte, calling `visit` at every top-level position
/// (outside quotes, parenthesis depth zero). `visit` returns how many bytes
/// to consume, or `None` to step one byte.
fn scan_top_level(
    expr: &str,
    mut visit: impl FnMut(usize) -> Option<usize>,
) -> Result<(), ExpressionError> {
    let bytes = expr.as_bytes();
    let mut quote: Option<u8> = None;
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if let Some(q) = quote {
            if c == b'\\' {
                i += 2;
                continue;
            }
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match c {
            b'\'' | b'"' => quote = Some(c),
            b'(' => depth += 1,
            b')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ExpressionError::UnbalancedParentheses(expr.to_string()))?;
            }
            _ if depth == 0 => {
                if let Some(consumed) = visit(i) {
                    i += consumed;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    if quote.is_some() {
        return Err(ExpressionError::UnterminatedQuote(expr.to_string()));
    }
    if depth != 0 {
        return Err(ExpressionError::UnbalancedParentheses(expr.to_string()));
    }
    Ok(())
}

fn split_top_level<'a>(expr: &'a str, separator: &str) -> Result<Vec<&'a str>, ExpressionError> {
    let mut parts = Vec::new();
    let mut start = 0;
    scan_top_level(expr, |i| {
        if expr.as_bytes()[i..].starts_with(separator.as_bytes()) {
            parts.push(&expr[start..i]);
            start = i + separator.len();
            Some(separator.len())
        } else {
            None
        }
    })?;
    parts.push(&expr[start..]);
    Ok(parts)
}

fn find_comparison(term: &str) -> Result<Option<(usize, CompareOp)>, ExpressionError> {
    let mut found = None;
    scan_top_level(term, |i| {
        if found.is_some() {
            return None;
        }
        let rest = &term.as_bytes()[i..];
        found = CompareOp::ALL
            .into_iter()
            .find(|op| rest.starts_with(op.symbol().as_bytes()))
            .map(|op| (i, op));
        None
    })?;
    Ok(found)
}

/// The inside of `( ... )` when the first parenthesis closes at the very end.
fn strip_outer_parens(term: &str) -> Option<&str> {
    if !term.starts_with('(') || !term.ends_with(')') {
        return None;
    }
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in term.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return (i == term.len() - 1).then(|| &term[1..i]);
                }
            }
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
