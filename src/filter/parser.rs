//! Parsers for the two surface syntaxes consumed by the engine (C2, spec
//! §4.2):
//!
//! - [`parse_filter_flag`] — a single leaf in `-f`-flag syntax.
//! - [`parse_query_expression`] — the full boolean grammar for `-q`.

use super::lexer::{tokenize, LexError, Token};
use super::{FilterNode, LogicalOp, Op};

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at byte {}", self.message, self.offset)
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for crate::errors::EngineError {
    fn from(e: ParseError) -> Self {
        crate::errors::EngineError::parse(e.offset, e.message)
    }
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError {
            offset: e.offset,
            message: e.message,
        }
    }
}

/// Error taxonomy strings named in spec §4.2, kept as constants so tests
/// and callers can match on them precisely.
pub mod error_kind {
    pub const MISSING_OPERATOR: &str = "missing operator";
    pub const MISSING_VALUE: &str = "missing value";
    pub const UNTERMINATED_QUOTE: &str = "unterminated quote";
    pub const UNBALANCED_PARENTHESIS: &str = "unbalanced parenthesis";
    pub const UNEXPECTED_TOKEN: &str = "unexpected token";
}

const HL_FLAG_OPERATORS: &[&str] = &["!=", "~=", "!~=", ">=", "<=", ">", "<", "="];

/// Parse a single leaf in hl-flag syntax: `field op value`. Operator
/// detection is greedy longest-match over `HL_FLAG_OPERATORS`; a plain
/// `field=value` with none of the extended operators present still yields
/// `equals` (spec §4.2 point 1).
pub fn parse_filter_flag(expr: &str) -> Result<FilterNode, ParseError> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(ParseError {
            offset: 0,
            message: error_kind::UNEXPECTED_TOKEN.to_string(),
        });
    }

    let mut best: Option<(usize, &str)> = None;
    for op in HL_FLAG_OPERATORS {
        if let Some(idx) = trimmed.find(op) {
            let better = match best {
                None => true,
                Some((best_idx, best_op)) => {
                    idx < best_idx || (idx == best_idx && op.len() > best_op.len())
                }
            };
            if better {
                best = Some((idx, op));
            }
        }
    }

    let Some((idx, op_str)) = best else {
        return Err(ParseError {
            offset: trimmed.len(),
            message: error_kind::MISSING_OPERATOR.to_string(),
        });
    };

    let field = trimmed[..idx].trim();
    if field.is_empty() {
        return Err(ParseError {
            offset: 0,
            message: error_kind::UNEXPECTED_TOKEN.to_string(),
        });
    }
    let raw_value = trimmed[idx + op_str.len()..].trim();
    if raw_value.is_empty() {
        return Err(ParseError {
            offset: trimmed.len(),
            message: error_kind::MISSING_VALUE.to_string(),
        });
    }
    let value = strip_quotes(raw_value)?;

    let (op, negate) = match op_str {
        "=" => (Op::Equals, false),
        "!=" => (Op::Equals, true),
        "~=" => (Op::Match, false),
        "!~=" => (Op::Match, true),
        ">" => (Op::Gt, false),
        ">=" => (Op::Gte, false),
        "<" => (Op::Lt, false),
        "<=" => (Op::Lte, false),
        _ => unreachable!(),
    };

    Ok(FilterNode::Leaf {
        field: field.to_string(),
        op,
        value,
        negate,
    })
}

fn strip_quotes(raw: &str) -> Result<String, ParseError> {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' || first == b'\'') && first == last {
            return Ok(raw[1..raw.len() - 1].to_string());
        }
        if first == b'"' || first == b'\'' {
            return Err(ParseError {
                offset: 0,
                message: error_kind::UNTERMINATED_QUOTE.to_string(),
            });
        }
    }
    Ok(raw.to_string())
}

/// Combine a list of `-f` leaves with implicit AND (spec §4.2: "A
/// multi-filter `-f` list combines with implicit AND").
pub fn combine_filter_flags(exprs: &[String]) -> Result<FilterNode, ParseError> {
    let mut children = Vec::with_capacity(exprs.len());
    for expr in exprs {
        children.push(parse_filter_flag(expr)?);
    }
    if children.len() == 1 {
        return Ok(children.remove(0));
    }
    Ok(FilterNode::and(children))
}

/// Parse the full query-expression grammar (spec §4.2 point 2).
pub fn parse_query_expression(expr: &str) -> Result<FilterNode, ParseError> {
    let tokens = tokenize(expr)?;
    let mut p = Parser { tokens, pos: 0 };
    let node = p.parse_or()?;
    p.expect_eof()?;
    Ok(node)
}

struct Parser {
    tokens: Vec<super::lexer::Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].offset
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        if matches!(self.peek(), Token::Eof) {
            Ok(())
        } else if matches!(self.peek(), Token::RParen) {
            Err(ParseError {
                offset: self.offset(),
                message: error_kind::UNBALANCED_PARENTHESIS.to_string(),
            })
        } else {
            Err(ParseError {
                offset: self.offset(),
                message: error_kind::UNEXPECTED_TOKEN.to_string(),
            })
        }
    }

    // or := and ("OR"|"||" and)*
    fn parse_or(&mut self) -> Result<FilterNode, ParseError> {
        let first = self.parse_and()?;
        let mut children = vec![first];
        while matches!(self.peek(), Token::Or) {
            self.advance();
            children.push(self.parse_and()?);
        }
        if children.len() == 1 {
            Ok(children.remove(0))
        } else {
            Ok(FilterNode::or(children))
        }
    }

    // and := not ("AND"|"&&" not)*
    fn parse_and(&mut self) -> Result<FilterNode, ParseError> {
        let first = self.parse_not()?;
        let mut children = vec![first];
        while matches!(self.peek(), Token::And) {
            self.advance();
            children.push(self.parse_not()?);
        }
        if children.len() == 1 {
            Ok(children.remove(0))
        } else {
            Ok(FilterNode::and(children))
        }
    }

    // not := ("NOT"|"!") primary | primary
    fn parse_not(&mut self) -> Result<FilterNode, ParseError> {
        if matches!(self.peek(), Token::Not) {
            self.advance();
            let inner = self.parse_primary()?;
            return Ok(inner.negated());
        }
        self.parse_primary()
    }

    // primary := "(" query ")" | "exists" "(" FIELD ")" | condition
    fn parse_primary(&mut self) -> Result<FilterNode, ParseError> {
        match self.peek().clone() {
            Token::LParen => {
                self.advance();
                let inner = self.parse_or()?;
                match self.peek() {
                    Token::RParen => {
                        self.advance();
                        Ok(inner)
                    }
                    _ => Err(ParseError {
                        offset: self.offset(),
                        message: error_kind::UNBALANCED_PARENTHESIS.to_string(),
                    }),
                }
            }
            Token::Exists => {
                self.advance();
                if !matches!(self.peek(), Token::LParen) {
                    return Err(ParseError {
                        offset: self.offset(),
                        message: error_kind::UNEXPECTED_TOKEN.to_string(),
                    });
                }
                self.advance();
                let field = match self.advance() {
                    Token::Field(f) => f,
                    Token::Value(v) => v,
                    _ => {
                        return Err(ParseError {
                            offset: self.offset(),
                            message: error_kind::UNEXPECTED_TOKEN.to_string(),
                        })
                    }
                };
                match self.peek() {
                    Token::RParen => {
                        self.advance();
                    }
                    _ => {
                        return Err(ParseError {
                            offset: self.offset(),
                            message: error_kind::UNBALANCED_PARENTHESIS.to_string(),
                        })
                    }
                }
                Ok(FilterNode::leaf(field, Op::Exists, ""))
            }
            Token::Field(_) => self.parse_condition(),
            Token::Eof => Err(ParseError {
                offset: self.offset(),
                message: error_kind::UNEXPECTED_TOKEN.to_string(),
            }),
            _ => Err(ParseError {
                offset: self.offset(),
                message: error_kind::UNEXPECTED_TOKEN.to_string(),
            }),
        }
    }

    // condition := FIELD op value
    fn parse_condition(&mut self) -> Result<FilterNode, ParseError> {
        let field = match self.advance() {
            Token::Field(f) => f,
            _ => unreachable!("caller checked Token::Field"),
        };

        let (op, negate) = match self.peek().clone() {
            Token::Operator(op, negate) => {
                self.advance();
                (op, negate)
            }
            Token::Eof | Token::RParen | Token::And | Token::Or => {
                return Err(ParseError {
                    offset: self.offset(),
                    message: error_kind::MISSING_OPERATOR.to_string(),
                })
            }
            _ => {
                return Err(ParseError {
                    offset: self.offset(),
                    message: error_kind::UNEXPECTED_TOKEN.to_string(),
                })
            }
        };

        let value = match self.peek().clone() {
            Token::Value(v) => {
                self.advance();
                v
            }
            Token::Field(v) => {
                self.advance();
                v
            }
            _ => {
                return Err(ParseError {
                    offset: self.offset(),
                    message: error_kind::MISSING_VALUE.to_string(),
                })
            }
        };

        Ok(FilterNode::Leaf {
            field,
            op,
            value,
            negate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_flag_plain_equals_is_legacy() {
        let node = parse_filter_flag("service=api").unwrap();
        assert_eq!(node, FilterNode::leaf("service", Op::Equals, "api"));
    }

    #[test]
    fn filter_flag_quoted_value_strips_quotes() {
        let node = parse_filter_flag(r#"service="my api""#).unwrap();
        assert_eq!(node, FilterNode::leaf("service", Op::Equals, "my api"));
    }

    #[test]
    fn filter_flag_negated_match() {
        let node = parse_filter_flag("service!~=api").unwrap();
        assert_eq!(
            node,
            FilterNode::Leaf {
                field: "service".into(),
                op: Op::Match,
                value: "api".into(),
                negate: true,
            }
        );
    }

    #[test]
    fn filter_flag_missing_operator() {
        let err = parse_filter_flag("justafield").unwrap_err();
        assert_eq!(err.message, error_kind::MISSING_OPERATOR);
    }

    #[test]
    fn query_expression_scenario_from_spec() {
        // (level=error OR status>=500) AND service="my api"
        let node =
            parse_query_expression(r#"(level=error OR status>=500) AND service="my api""#)
                .unwrap();
        match node {
            FilterNode::Branch {
                logic: LogicalOp::And,
                children,
            } => {
                assert_eq!(children.len(), 2);
                match &children[0] {
                    FilterNode::Branch {
                        logic: LogicalOp::Or,
                        children: or_children,
                    } => {
                        assert_eq!(
                            or_children[0],
                            FilterNode::leaf("level", Op::Equals, "error")
                        );
                        assert_eq!(
                            or_children[1],
                            FilterNode::leaf("status", Op::Gte, "500")
                        );
                    }
                    other => panic!("expected OR branch, got {other:?}"),
                }
                assert_eq!(
                    children[1],
                    FilterNode::leaf("service", Op::Equals, "my api")
                );
            }
            other => panic!("expected AND branch, got {other:?}"),
        }
    }

    #[test]
    fn exists_predicate() {
        let node = parse_query_expression("exists(trace_id)").unwrap();
        assert_eq!(node, FilterNode::leaf("trace_id", Op::Exists, ""));
    }

    #[test]
    fn not_wraps_primary() {
        let node = parse_query_expression("NOT level=error").unwrap();
        assert_eq!(
            node,
            FilterNode::Leaf {
                field: "level".into(),
                op: Op::Equals,
                value: "error".into(),
                negate: true,
            }
        );
    }

    #[test]
    fn contains_and_like_keywords() {
        let node = parse_query_expression(r#"message CONTAINS "timeout""#).unwrap();
        assert_eq!(node, FilterNode::leaf("message", Op::Match, "timeout"));

        let node = parse_query_expression(r#"service LIKE "api-*""#).unwrap();
        assert_eq!(node, FilterNode::leaf("service", Op::Wildcard, "api-*"));
    }

    #[test]
    fn unbalanced_parenthesis_reports_offset() {
        let err = parse_query_expression("(level=error").unwrap_err();
        assert_eq!(err.message, error_kind::UNBALANCED_PARENTHESIS);
    }

    #[test]
    fn missing_value_after_operator() {
        let err = parse_query_expression("level=").unwrap_err();
        assert_eq!(err.message, error_kind::MISSING_VALUE);
    }

    #[test]
    fn combine_filter_flags_implicit_and() {
        let node =
            combine_filter_flags(&["level=error".to_string(), "service=api".to_string()])
                .unwrap();
        assert_eq!(
            node,
            FilterNode::and(vec![
                FilterNode::leaf("level", Op::Equals, "error"),
                FilterNode::leaf("service", Op::Equals, "api"),
            ])
        );
    }
}
