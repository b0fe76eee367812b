//! Shared tokenizer for both the single-leaf `-f` syntax and the full
//! `-q` query grammar (C2, spec §4.2).

use super::Op;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Exists,
    /// `(op, negate)` — `!=` and `!~=` fold their leading `!` into negate
    /// rather than producing a separate `Not` token, since they bind to a
    /// single condition rather than a sub-expression.
    Operator(Op, bool),
    Field(String),
    Value(String),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    /// Byte offset of the first character of this token in the source.
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub offset: usize,
    pub message: String,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at byte {}", self.message, self.offset)
    }
}

/// Operators checked in longest-match-first order, per spec §4.2's
/// "greedy longest-match" tie-break rule.
const OPERATORS: &[(&str, Op, bool)] = &[
    ("!~=", Op::Match, true),
    ("~=", Op::Match, false),
    ("!=", Op::Equals, true),
    (">=", Op::Gte, false),
    ("<=", Op::Lte, false),
    (">", Op::Gt, false),
    ("<", Op::Lt, false),
    ("=", Op::Equals, false),
];

fn is_word_boundary(c: Option<char>) -> bool {
    match c {
        None => true,
        Some(c) => c.is_whitespace() || c == '(' || c == ')',
    }
}

pub fn tokenize(input: &str) -> Result<Vec<Spanned>, LexError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0usize;

    while pos < bytes.len() {
        let remaining = &input[pos..];
        let ch = remaining.chars().next().unwrap();

        if ch.is_whitespace() {
            pos += ch.len_utf8();
            continue;
        }

        if ch == '(' {
            tokens.push(Spanned {
                token: Token::LParen,
                offset: pos,
            });
            pos += 1;
            continue;
        }
        if ch == ')' {
            tokens.push(Spanned {
                token: Token::RParen,
                offset: pos,
            });
            pos += 1;
            continue;
        }

        if ch == '"' || ch == '\'' {
            let quote = ch;
            let body_start = pos + 1;
            let rest = &input[body_start..];
            let end = rest.find(quote).ok_or_else(|| LexError {
                offset: pos,
                message: "unterminated quote".to_string(),
            })?;
            let value = rest[..end].to_string();
            tokens.push(Spanned {
                token: Token::Value(value),
                offset: pos,
            });
            pos = body_start + end + 1;
            continue;
        }

        // `||` / `&&` shorthand logical operators.
        if remaining.starts_with("||") {
            tokens.push(Spanned {
                token: Token::Or,
                offset: pos,
            });
            pos += 2;
            continue;
        }
        if remaining.starts_with("&&") {
            tokens.push(Spanned {
                token: Token::And,
                offset: pos,
            });
            pos += 2;
            continue;
        }
        if ch == '!' && !remaining.starts_with("!=") && !remaining.starts_with("!~=") {
            tokens.push(Spanned {
                token: Token::Not,
                offset: pos,
            });
            pos += 1;
            continue;
        }

        // Reserved words, recognized only when followed by whitespace or
        // `(` (spec §4.2).
        let mut matched_reserved = false;
        for (word, tok) in [
            ("AND", Token::And),
            ("OR", Token::Or),
            ("NOT", Token::Not),
            ("EXISTS", Token::Exists),
            ("CONTAINS", Token::Operator(Op::Match, false)),
            ("LIKE", Token::Operator(Op::Wildcard, false)),
        ] {
            if remaining.len() >= word.len()
                && remaining[..word.len()].eq_ignore_ascii_case(word)
                && is_word_boundary(remaining[word.len()..].chars().next())
            {
                tokens.push(Spanned {
                    token: tok,
                    offset: pos,
                });
                pos += word.len();
                matched_reserved = true;
                break;
            }
        }
        if matched_reserved {
            continue;
        }

        // Operators, longest-match-first.
        let mut matched_op = false;
        for (lexeme, op, negate) in OPERATORS {
            if remaining.starts_with(lexeme) {
                tokens.push(Spanned {
                    token: Token::Operator(*op, *negate),
                    offset: pos,
                });
                pos += lexeme.len();
                matched_op = true;
                break;
            }
        }
        if matched_op {
            continue;
        }

        // Bareword: field name or unquoted value, terminated by whitespace,
        // parens, or the start of an operator.
        let word_end = remaining
            .char_indices()
            .find(|(i, c)| {
                c.is_whitespace()
                    || *c == '('
                    || *c == ')'
                    || OPERATORS.iter().any(|(lex, _, _)| remaining[*i..].starts_with(lex))
            })
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());

        if word_end == 0 {
            return Err(LexError {
                offset: pos,
                message: format!("unexpected character '{ch}'"),
            });
        }

        let word = &remaining[..word_end];
        tokens.push(Spanned {
            token: Token::Field(word.to_string()),
            offset: pos,
        });
        pos += word_end;
    }

    tokens.push(Spanned {
        token: Token::Eof,
        offset: bytes.len(),
    });
    Ok(tokens)
}
