//! `#if` / `#elif` expression evaluation

use crate::lexer::{self, Token, TokenType};
use crate::Preprocessor;
use anyhow::{anyhow, Result};

impl Preprocessor {
    /// Evaluate a conditional expression: `defined` is resolved first,
    /// then macros are expanded, and any identifier left over counts as 0.
    pub fn evaluate_condition(&self, condition: &str) -> Result<bool> {
        let resolved = self.resolve_defined(condition)?;
        let expanded = self.expand_macros(&resolved)?;

        let tokens: Vec<Token> = lexer::tokenize(&expanded)?
            .into_iter()
            .filter(|t| !matches!(
                t.token_type,
                TokenType::Whitespace(_) | TokenType::Comment(_) | TokenType::Newline
            ))
            .collect();

        let mut evaluator = ExprEvaluator { tokens, pos: 0, unevaluated: 0 };
        let value = evaluator
            .parse_conditional()
            .map_err(|e| anyhow!("{} in #if expression '{}'", e, condition))?;
        if !evaluator.at_end() {
            return Err(anyhow!(
                "Unexpected '{}' in #if expression '{}'",
                evaluator.peek_text(),
                condition
            ));
        }

        Ok(value != 0)
    }

    /// Replace `defined NAME` and `defined(NAME)` with 1 or 0
    fn resolve_defined(&self, condition: &str) -> Result<String> {
        let tokens = lexer::tokenize(condition)?;
        let mut out = String::new();
        let mut i = 0;

        let skip_ws = |i: &mut usize| {
            while matches!(tokens[*i].token_type, TokenType::Whitespace(_) | TokenType::Comment(_)) {
                *i += 1;
            }
        };

        while i < tokens.len() {
            match &tokens[i].token_type {
                TokenType::Identifier(word) if word == "defined" => {
                    i += 1;
                    skip_ws(&mut i);
                    let parenthesized = tokens[i].token_type == TokenType::LeftParen;
                    if parenthesized {
                        i += 1;
                        skip_ws(&mut i);
                    }
                    let TokenType::Identifier(name) = &tokens[i].token_type else {
                        return Err(anyhow!("Expected macro name after 'defined' in '{}'", condition));
                    };
                    out.push_str(if self.is_defined(name) { " 1 " } else { " 0 " });
                    i += 1;
                    if parenthesized {
                        skip_ws(&mut i);
                        if tokens[i].token_type != TokenType::RightParen {
                            return Err(anyhow!("Expected ')' after 'defined({}' in '{}'", name, condition));
                        }
                        i += 1;
                    }
                }
                TokenType::Comment(_) => {
                    out.push(' ');
                    i += 1;
                }
                TokenType::Eof => break,
                _ => {
                    out.push_str(&tokens[i].text);
                    i += 1;
                }
            }
        }

        Ok(out)
    }
}

/// Precedence-climbing evaluator over `intmax_t`-like values
struct ExprEvaluator {
    tokens: Vec<Token>,
    pos: usize,
    /// Nonzero while evaluating a short-circuited operand
    unevaluated: usize,
}

impl ExprEvaluator {
    fn parse_conditional(&mut self) -> Result<i64> {
        let condition = self.parse_binary(1)?;
        if !self.eat(&TokenType::Question) {
            return Ok(condition);
        }

        let (then_value, else_value) = if condition != 0 {
            let then_value = self.parse_conditional()?;
            self.expect(&TokenType::Colon, "':'")?;
            let else_value = self.skipped(|e| e.parse_conditional())?;
            (then_value, else_value)
        } else {
            let then_value = self.skipped(|e| e.parse_conditional())?;
            self.expect(&TokenType::Colon, "':'")?;
            let else_value = self.parse_conditional()?;
            (then_value, else_value)
        };

        Ok(if condition != 0 { then_value } else { else_value })
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<i64> {
        let mut lhs = self.parse_unary()?;

        while let Some(prec) = self.peek().and_then(|t| binary_precedence(&t.token_type)) {
            if prec < min_prec {
                break;
            }
            let op = self.advance().token_type;

            let short_circuit = match op {
                TokenType::LogicalAnd => lhs == 0,
                TokenType::LogicalOr => lhs != 0,
                _ => false,
            };
            let rhs = if short_circuit {
                self.skipped(|e| e.parse_binary(prec + 1))?
            } else {
                self.parse_binary(prec + 1)?
            };

            lhs = self.apply(&op, lhs, rhs)?;
        }

        Ok(lhs)
    }

    fn apply(&self, op: &TokenType, lhs: i64, rhs: i64) -> Result<i64> {
        let value = match op {
            TokenType::LogicalOr => (lhs != 0 || rhs != 0) as i64,
            TokenType::LogicalAnd => (lhs != 0 && rhs != 0) as i64,
            TokenType::Pipe => lhs | rhs,
            TokenType::Caret => lhs ^ rhs,
            TokenType::Ampersand => lhs & rhs,
            TokenType::EqualEqual => (lhs == rhs) as i64,
            TokenType::NotEqual => (lhs != rhs) as i64,
            TokenType::Less => (lhs < rhs) as i64,
            TokenType::Greater => (lhs > rhs) as i64,
            TokenType::LessEqual => (lhs <= rhs) as i64,
            TokenType::GreaterEqual => (lhs >= rhs) as i64,
            TokenType::LeftShift => lhs.wrapping_shl(rhs as u32),
            TokenType::RightShift => lhs.wrapping_shr(rhs as u32),
            TokenType::Plus => lhs.wrapping_add(rhs),
            TokenType::Minus => lhs.wrapping_sub(rhs),
            TokenType::Star => lhs.wrapping_mul(rhs),
            TokenType::Slash | TokenType::Percent if rhs == 0 => {
                if self.unevaluated > 0 {
                    0
                } else {
                    return Err(anyhow!("Division by zero"));
                }
            }
            TokenType::Slash => lhs.wrapping_div(rhs),
            TokenType::Percent => lhs.wrapping_rem(rhs),
            other => return Err(anyhow!("Unsupported operator {:?}", other)),
        };
        Ok(value)
    }

    fn parse_unary(&mut self) -> Result<i64> {
        let Some(kind) = self.peek().map(|t| t.token_type.clone()) else {
            return Err(anyhow!("Unexpected end of expression"));
        };

        match kind {
            TokenType::Bang => {
                self.advance();
                Ok((self.parse_unary()? == 0) as i64)
            }
            TokenType::Tilde => {
                self.advance();
                Ok(!self.parse_unary()?)
            }
            TokenType::Minus => {
                self.advance();
                Ok(self.parse_unary()?.wrapping_neg())
            }
            TokenType::Plus => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<i64> {
        let token = self.advance();
        match &token.token_type {
            TokenType::Number(text) => parse_integer(text),
            TokenType::CharLiteral(text) => parse_char(text),
            TokenType::LeftParen => {
                let value = self.parse_conditional()?;
                self.expect(&TokenType::RightParen, "')'")?;
                Ok(value)
            }
            TokenType::Identifier(_) => {
                // Unknown function-like checks such as __has_include(<x>) are false
                if self.eat(&TokenType::LeftParen) {
                    let mut depth = 1;
                    while depth > 0 {
                        match self.peek().map(|t| &t.token_type) {
                            Some(TokenType::LeftParen) => depth += 1,
                            Some(TokenType::RightParen) => depth -= 1,
                            Some(_) => {}
                            None => return Err(anyhow!("Unterminated argument list")),
                        }
                        self.advance();
                    }
                }
                Ok(0)
            }
            TokenType::Eof => Err(anyhow!("Unexpected end of expression")),
            _ => Err(anyhow!("Unexpected '{}'", token.text)),
        }
    }

    fn skipped<F>(&mut self, parse: F) -> Result<i64>
    where
        F: FnOnce(&mut Self) -> Result<i64>,
    {
        self.unevaluated += 1;
        let result = parse(self);
        self.unevaluated -= 1;
        result
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens
            .get(self.pos)
            .filter(|t| t.token_type != TokenType::Eof)
    }

    fn peek_text(&self) -> String {
        self.peek().map(|t| t.text.clone()).unwrap_or_default()
    }

    fn advance(&mut self) -> Token {
        match self.tokens.get(self.pos) {
            Some(token) => {
                self.pos += 1;
                token.clone()
            }
            None => Token {
                token_type: TokenType::Eof,
                text: String::new(),
                line: 0,
                column: 0,
            },
        }
    }

    fn eat(&mut self, token_type: &TokenType) -> bool {
        if self.peek().is_some_and(|t| &t.token_type == token_type) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token_type: &TokenType, what: &str) -> Result<()> {
        if self.eat(token_type) {
            Ok(())
        } else {
            Err(anyhow!("Expected {}", what))
        }
    }

    fn at_end(&self) -> bool {
        self.peek().is_none()
    }
}

fn binary_precedence(token_type: &TokenType) -> Option<u8> {
    let prec = match token_type {
        TokenType::LogicalOr => 1,
        TokenType::LogicalAnd => 2,
        TokenType::Pipe => 3,
        TokenType::Caret => 4,
        TokenType::Ampersand => 5,
        TokenType::EqualEqual | TokenType::NotEqual => 6,
        TokenType::Less | TokenType::Greater | TokenType::LessEqual | TokenType::GreaterEqual => 7,
        TokenType::LeftShift | TokenType::RightShift => 8,
        TokenType::Plus | TokenType::Minus => 9,
        TokenType::Star | TokenType::Slash | TokenType::Percent => 10,
        _ => return None,
    };
    Some(prec)
}

fn parse_integer(text: &str) -> Result<i64> {
    let digits = text.trim_end_matches(['u', 'U', 'l', 'L']);
    let lower = digits.to_ascii_lowercase();

    let parsed = if let Some(hex) = lower.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        u64::from_str_radix(bin, 2)
    } else if lower.len() > 1 && lower.starts_with('0') {
        u64::from_str_radix(&lower[1..], 8)
    } else {
        lower.parse::<u64>()
    };

    parsed
        .map(|v| v as i64)
        .map_err(|_| anyhow!("Invalid integer constant '{}'", text))
}

fn parse_char(text: &str) -> Result<i64> {
    let mut chars = text.chars();
    let value = match (chars.next(), chars.next()) {
        (Some('\\'), Some(escaped)) => match escaped {
            'n' => 10,
            't' => 9,
            'r' => 13,
            '0' => 0,
            'a' => 7,
            'b' => 8,
            'f' => 12,
            'v' => 11,
            'x' => {
                let hex: String = chars.collect();
                i64::from_str_radix(&hex, 16).map_err(|_| anyhow!("Invalid character constant '{}'", text))?
            }
            other => other as i64,
        },
        (Some(c), _) => c as i64,
        (None, _) => return Err(anyhow!("Empty character constant")),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(condition: &str) -> bool {
        let mut pp = Preprocessor::new();
        pp.define("ONE".to_string(), Some("1".to_string()));
        pp.define("VERSION".to_string(), Some("201112L".to_string()));
        pp.define_from_spec("PREREQ(maj, min)=((maj) >= 4 && (min) >= 2)").unwrap();
        pp.evaluate_condition(condition).unwrap()
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        assert!(eval("1 + 2 * 3 == 7"));
        assert!(eval("(1 + 2) * 3 == 9"));
        assert!(eval("1 << 4 == 16"));
        assert!(eval("-1 < 0"));
        assert!(eval("~0 == -1"));
        assert!(eval("10 % 4 == 2"));
    }

    #[test]
    fn test_defined_forms() {
        assert!(eval("defined ONE"));
        assert!(eval("defined(ONE) && !defined(TWO)"));
        assert!(!eval("defined( TWO )"));
    }

    #[test]
    fn test_macros_and_unknown_identifiers() {
        assert!(eval("VERSION >= 199901L"));
        assert!(!eval("UNDEFINED_NAME"));
        assert!(eval("PREREQ(4, 3)"));
        assert!(!eval("PREREQ(3, 9)"));
    }

    #[test]
    fn test_ternary_and_short_circuit() {
        assert!(eval("ONE ? 1 : 0"));
        assert!(!eval("0 && (1 / 0)"));
        assert!(eval("1 || (1 / 0)"));
    }

    #[test]
    fn test_numeric_bases_and_chars() {
        assert!(eval("0x10 == 16"));
        assert!(eval("010 == 8"));
        assert!(eval("'A' == 65"));
        assert!(eval("'\\n' == 10"));
    }

    #[test]
    fn test_unknown_function_like_check_is_false() {
        assert!(!eval("__has_include(<nothing.h>)"));
    }

    #[test]
    fn test_division_by_zero_is_an_error() {
        let pp = Preprocessor::new();
        assert!(pp.evaluate_condition("1 / 0").is_err());
    }
}
