//! Filter predicate combination.
//!
//! Filter conditions are opaque SQL fragments supplied by whoever writes the
//! configuration; they are joined, never parsed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::FilterColumn;
use crate::error::{ViewError, ViewResult};

/// Operator joining a filter term to the one before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOp {
    #[default]
    And,
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::And => write!(f, "AND"),
            LogicalOp::Or => write!(f, "OR"),
        }
    }
}

impl FromStr for LogicalOp {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(LogicalOp::And),
            "OR" => Ok(LogicalOp::Or),
            _ => Err(ViewError::InvalidOperator(s.to_string())),
        }
    }
}

/// Join an ordered list of filter terms into one boolean expression.
///
/// Each term renders as `<op> <column> <condition>`; the first term has no
/// operator. An empty list yields an empty string.
///
/// ```
/// use bqviews::config::FilterColumn;
/// use bqviews::predicate::{combine_filters, LogicalOp};
///
/// let filters = vec![
///     FilterColumn::new("account_name", "= 'acme'"),
///     FilterColumn::new("region", "= 'jp'").with_operator(LogicalOp::Or),
/// ];
/// assert_eq!(
///     combine_filters(&filters).unwrap(),
///     "account_name = 'acme' OR region = 'jp'"
/// );
/// ```
pub fn combine_filters(filters: &[FilterColumn]) -> ViewResult<String> {
    let mut tokens: Vec<String> = Vec::with_capacity(filters.len() * 3);

    for (i, filter) in filters.iter().enumerate() {
        // Validated even on the first term, where it is dropped.
        let op = filter.logical_op()?;
        if i > 0 {
            tokens.push(op.to_string());
        }
        tokens.push(filter.column_name.trim().to_string());
        tokens.push(filter.condition.trim().to_string());
    }

    Ok(tokens
        .into_iter()
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_is_empty_predicate() {
        assert_eq!(combine_filters(&[]).unwrap(), "");
    }

    #[test]
    fn test_single_filter_has_no_operator() {
        let filters = vec![FilterColumn::new("user_id", "= 42").with_operator(LogicalOp::Or)];
        assert_eq!(combine_filters(&filters).unwrap(), "user_id = 42");
    }

    #[test]
    fn test_default_operator_is_and() {
        let filters = vec![
            FilterColumn::new("account_name", "= 'acme'"),
            FilterColumn::new("status", "IN ('active', 'trial')"),
        ];
        assert_eq!(
            combine_filters(&filters).unwrap(),
            "account_name = 'acme' AND status IN ('active', 'trial')"
        );
    }

    #[test]
    fn test_order_is_preserved() {
        let filters = vec![
            FilterColumn::new("c", "= 3"),
            FilterColumn::new("a", "= 1").with_operator(LogicalOp::Or),
            FilterColumn::new("b", "= 2"),
        ];
        let sql = combine_filters(&filters).unwrap();
        assert_eq!(sql, "c = 3 OR a = 1 AND b = 2");
        assert!(!sql.starts_with("AND") && !sql.starts_with("OR"));
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!("and".parse::<LogicalOp>().unwrap(), LogicalOp::And);
        assert_eq!(" Or ".parse::<LogicalOp>().unwrap(), LogicalOp::Or);
        assert!(matches!(
            "XOR".parse::<LogicalOp>(),
            Err(ViewError::InvalidOperator(op)) if op == "XOR"
        ));
    }

    #[test]
    fn test_malformed_operator_fails() {
        let mut bad = FilterColumn::new("b", "= 2");
        bad.operator = Some("NAND".to_string());
        let filters = vec![FilterColumn::new("a", "= 1"), bad];
        assert!(combine_filters(&filters).is_err());
    }
}
