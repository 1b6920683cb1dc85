//! Safe evaluator for per-period conditional override rules.
//!
//! Rules are written in a closed expression language over the two variables
//! `period` and `value`:
//!
//! ```text
//! rule   := [ "if" cond "then" ] "value" "=" expr
//! cond   := and ( "or" and )*
//! and    := cmp ( "and" cmp )*
//! cmp    := expr ( ">" | "<" | ">=" | "<=" | "==" | "!=" ) expr
//! expr   := term ( ("+" | "-") term )*
//! term   := factor ( ("*" | "/") factor )*
//! factor := "period" | "value" | number | "-" factor | "(" expr ")"
//!         | ("min" | "max") "(" expr "," expr ")"
//! ```
//!
//! The rule is parsed once into an expression tree and interpreted per period.
//! Nothing here ever compiles or executes caller-supplied code.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::ScfError;
use crate::ScfResult;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    If,
    Then,
    And,
    Or,
    Period,
    Value,
    Min,
    Max,
    Number(Decimal),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
    Assign,
    Gt,
    Lt,
    Ge,
    Le,
    EqEq,
    Ne,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Token::If => "if",
            Token::Then => "then",
            Token::And => "and",
            Token::Or => "or",
            Token::Period => "period",
            Token::Value => "value",
            Token::Min => "min",
            Token::Max => "max",
            Token::Number(n) => return write!(f, "{n}"),
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Comma => ",",
            Token::Assign => "=",
            Token::Gt => ">",
            Token::Lt => "<",
            Token::Ge => ">=",
            Token::Le => "<=",
            Token::EqEq => "==",
            Token::Ne => "!=",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FuncKind {
    Min,
    Max,
}

#[derive(Debug, Clone)]
enum Expr {
    Period,
    Value,
    Number(Decimal),
    Negate(Box<Expr>),
    Binary {
        op: ArithOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Func {
        kind: FuncKind,
        args: Box<(Expr, Expr)>,
    },
}

#[derive(Debug, Clone)]
enum Cond {
    Cmp { op: CmpOp, lhs: Expr, rhs: Expr },
    And(Box<Cond>, Box<Cond>),
    Or(Box<Cond>, Box<Cond>),
}

/// A parsed conditional override: `value = expr` guarded by an optional
/// `if`-condition.
#[derive(Debug, Clone)]
pub struct ConditionalRule {
    condition: Option<Cond>,
    action: Expr,
}

impl ConditionalRule {
    /// Parse a rule. Fails with `InvalidInput` on anything outside the grammar.
    pub fn parse(source: &str) -> ScfResult<Self> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let rule = parser.parse_rule()?;
        if parser.pos != parser.tokens.len() {
            return Err(parse_error(format!(
                "unexpected trailing input at '{}'",
                parser.tokens[parser.pos]
            )));
        }
        Ok(rule)
    }

    /// Evaluate the rule for one period, returning the (possibly unchanged)
    /// value.
    pub fn apply(&self, period: Decimal, value: Decimal) -> ScfResult<Decimal> {
        if let Some(cond) = &self.condition {
            if !eval_cond(cond, period, value)? {
                return Ok(value);
            }
        }
        eval_expr(&self.action, period, value)
    }
}

fn parse_error(message: impl Into<String>) -> ScfError {
    ScfError::InvalidInput {
        field: "conditional_logic".into(),
        reason: message.into(),
    }
}

fn tokenize(source: &str) -> ScfResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let number = Decimal::from_str(&literal)
                    .map_err(|_| parse_error(format!("invalid number '{literal}'")))?;
                tokens.push(Token::Number(number));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let mut word = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        word.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = match word.to_ascii_lowercase().as_str() {
                    "if" => Token::If,
                    "then" => Token::Then,
                    "and" => Token::And,
                    "or" => Token::Or,
                    "period" => Token::Period,
                    "value" => Token::Value,
                    "min" => Token::Min,
                    "max" => Token::Max,
                    _ => return Err(parse_error(format!("unknown identifier '{word}'"))),
                };
                tokens.push(token);
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::EqEq);
                } else {
                    tokens.push(Token::Assign);
                }
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ne);
                } else {
                    return Err(parse_error("'!' must be followed by '='"));
                }
            }
            other => return Err(parse_error(format!("unexpected character '{other}'"))),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> ScfResult<Token> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| parse_error("unexpected end of rule"))?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: Token) -> ScfResult<()> {
        let token = self.next()?;
        if token != expected {
            return Err(parse_error(format!("expected '{expected}', found '{token}'")));
        }
        Ok(())
    }

    fn parse_rule(&mut self) -> ScfResult<ConditionalRule> {
        let condition = if self.peek() == Some(&Token::If) {
            self.next()?;
            let cond = self.parse_cond()?;
            self.expect(Token::Then)?;
            Some(cond)
        } else {
            None
        };

        self.expect(Token::Value)?;
        self.expect(Token::Assign)?;
        let action = self.parse_expr()?;

        Ok(ConditionalRule { condition, action })
    }

    fn parse_cond(&mut self) -> ScfResult<Cond> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.next()?;
            let rhs = self.parse_and()?;
            lhs = Cond::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> ScfResult<Cond> {
        let mut lhs = self.parse_cmp()?;
        while self.peek() == Some(&Token::And) {
            self.next()?;
            let rhs = self.parse_cmp()?;
            lhs = Cond::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> ScfResult<Cond> {
        let lhs = self.parse_expr()?;
        let op = match self.next()? {
            Token::Gt => CmpOp::Gt,
            Token::Lt => CmpOp::Lt,
            Token::Ge => CmpOp::Ge,
            Token::Le => CmpOp::Le,
            Token::EqEq => CmpOp::Eq,
            Token::Ne => CmpOp::Ne,
            other => {
                return Err(parse_error(format!(
                    "expected comparison operator, found '{other}'"
                )))
            }
        };
        let rhs = self.parse_expr()?;
        Ok(Cond::Cmp { op, lhs, rhs })
    }

    fn parse_expr(&mut self) -> ScfResult<Expr> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => break,
            };
            self.next()?;
            let rhs = self.parse_term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> ScfResult<Expr> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => ArithOp::Mul,
                Some(Token::Slash) => ArithOp::Div,
                _ => break,
            };
            self.next()?;
            let rhs = self.parse_factor()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> ScfResult<Expr> {
        match self.next()? {
            Token::Period => Ok(Expr::Period),
            Token::Value => Ok(Expr::Value),
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Minus => Ok(Expr::Negate(Box::new(self.parse_factor()?))),
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Min => self.parse_func(FuncKind::Min),
            Token::Max => self.parse_func(FuncKind::Max),
            other => Err(parse_error(format!(
                "expected operand, found '{other}'"
            ))),
        }
    }

    fn parse_func(&mut self, kind: FuncKind) -> ScfResult<Expr> {
        self.expect(Token::LParen)?;
        let first = self.parse_expr()?;
        self.expect(Token::Comma)?;
        let second = self.parse_expr()?;
        self.expect(Token::RParen)?;
        Ok(Expr::Func {
            kind,
            args: Box::new((first, second)),
        })
    }
}

fn eval_cond(cond: &Cond, period: Decimal, value: Decimal) -> ScfResult<bool> {
    match cond {
        Cond::Cmp { op, lhs, rhs } => {
            let l = eval_expr(lhs, period, value)?;
            let r = eval_expr(rhs, period, value)?;
            Ok(match op {
                CmpOp::Gt => l > r,
                CmpOp::Lt => l < r,
                CmpOp::Ge => l >= r,
                CmpOp::Le => l <= r,
                CmpOp::Eq => l == r,
                CmpOp::Ne => l != r,
            })
        }
        Cond::And(a, b) => Ok(eval_cond(a, period, value)? && eval_cond(b, period, value)?),
        Cond::Or(a, b) => Ok(eval_cond(a, period, value)? || eval_cond(b, period, value)?),
    }
}

fn eval_expr(expr: &Expr, period: Decimal, value: Decimal) -> ScfResult<Decimal> {
    match expr {
        Expr::Period => Ok(period),
        Expr::Value => Ok(value),
        Expr::Number(n) => Ok(*n),
        Expr::Negate(inner) => Ok(-eval_expr(inner, period, value)?),
        Expr::Binary { op, lhs, rhs } => {
            let l = eval_expr(lhs, period, value)?;
            let r = eval_expr(rhs, period, value)?;
            match op {
                ArithOp::Add => Ok(l + r),
                ArithOp::Sub => Ok(l - r),
                ArithOp::Mul => Ok(l * r),
                ArithOp::Div => l.checked_div(r).ok_or_else(|| ScfError::DivisionByZero {
                    context: "conditional rule".into(),
                }),
            }
        }
        Expr::Func { kind, args } => {
            let a = eval_expr(&args.0, period, value)?;
            let b = eval_expr(&args.1, period, value)?;
            Ok(match kind {
                FuncKind::Min => a.min(b),
                FuncKind::Max => a.max(b),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn apply(rule: &str, period: i64, value: Decimal) -> Decimal {
        ConditionalRule::parse(rule)
            .unwrap()
            .apply(Decimal::from(period), value)
            .unwrap()
    }

    #[test]
    fn test_unconditional_assignment() {
        assert_eq!(apply("value = value * 2", 0, dec!(3)), dec!(6));
        assert_eq!(apply("value = 10", 0, dec!(3)), dec!(10));
    }

    #[test]
    fn test_condition_gates_assignment() {
        let rule = "if period > 36 and value > 5 then value = value * 0.9";
        assert_eq!(apply(rule, 40, dec!(8)), dec!(7.2));
        assert_eq!(apply(rule, 40, dec!(4)), dec!(4));
        assert_eq!(apply(rule, 10, dec!(8)), dec!(8));
    }

    #[test]
    fn test_or_condition() {
        let rule = "if period < 3 or period > 10 then value = 0";
        assert_eq!(apply(rule, 1, dec!(5)), dec!(0));
        assert_eq!(apply(rule, 12, dec!(5)), dec!(0));
        assert_eq!(apply(rule, 5, dec!(5)), dec!(5));
    }

    #[test]
    fn test_max_floor() {
        let rule = "if period > 48 then value = max(1, value)";
        assert_eq!(apply(rule, 50, dec!(0.25)), dec!(1));
        assert_eq!(apply(rule, 50, dec!(3)), dec!(3));
    }

    #[test]
    fn test_min_cap_and_arithmetic() {
        let rule = "value = min(value + 1, 10)";
        assert_eq!(apply(rule, 0, dec!(4)), dec!(5));
        assert_eq!(apply(rule, 0, dec!(12)), dec!(10));
    }

    #[test]
    fn test_unary_minus_and_parens() {
        assert_eq!(apply("value = -(value - 2) * 3", 0, dec!(5)), dec!(-9));
    }

    #[test]
    fn test_period_variable() {
        assert_eq!(apply("value = period / 2", 10, dec!(0)), dec!(5));
    }

    #[test]
    fn test_division_by_zero_is_an_error() {
        let rule = ConditionalRule::parse("value = value / period").unwrap();
        let err = rule.apply(Decimal::ZERO, dec!(5)).unwrap_err();
        assert!(matches!(err, ScfError::DivisionByZero { .. }));
    }

    #[test]
    fn test_reject_unknown_identifier() {
        assert!(ConditionalRule::parse("value = balance * 2").is_err());
    }

    #[test]
    fn test_reject_dangling_condition() {
        assert!(ConditionalRule::parse("if period > 36").is_err());
        assert!(ConditionalRule::parse("if period > then value = 1").is_err());
    }

    #[test]
    fn test_reject_assignment_to_period() {
        assert!(ConditionalRule::parse("period = 3").is_err());
    }

    #[test]
    fn test_reject_trailing_input() {
        assert!(ConditionalRule::parse("value = 1 value").is_err());
    }

    #[test]
    fn test_reject_empty_rule() {
        assert!(ConditionalRule::parse("").is_err());
    }
}
