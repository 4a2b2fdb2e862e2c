//! 过滤规格的语法分析器
//!
//! ## 解析流程
//!
//! ```text
//! FilterSpec::from_json()
//!   ├─ 顶层必须是 JSON 对象, 按键的插入顺序遍历
//!   └─ 每个值:
//!        ├─ 数组 → 每个元素调用 parse_filter_expr(), 空数组报错
//!        └─ 标量 → parse_filter_expr()
//!
//! parse_filter_expr()
//!   ├─ 字符串 → parse_range_expr()
//!   │            ├─ 成功 → LessThan / LessOrEqual / GreaterThan / GreaterOrEqual
//!   │            └─ 失败 → Equals(原字符串)
//!   ├─ 数字 / 布尔 → Equals
//!   └─ null / 对象 / 嵌套数组 → FilterError::InvalidValue
//! ```
//!
//! ## 范围表达式语法
//!
//! ```text
//! range  := op "(" digits ")"
//! op     := "lt" | "lte" | "gt" | "gte"      (不区分大小写)
//! digits := [0-9]+                           (必须能放进 i64)
//! ```
//!
//! 不允许空白、符号或小数点; 表达式之后不能有任何多余字符。

use crate::ast::{Condition, FieldPath, FilterExpr, FilterSpec, Literal, QueryOptions};
use crate::lexer::Lexer;
use crate::token::{Span, Token, TokenKind};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// 范围表达式解析失败; 调用方会把它降级为对原字符串的相等比较
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Option<Span>,
}

impl ParseError {
    fn new(message: String, span: Option<Span>) -> Self {
        Self { message, span }
    }

    fn at_position(message: String, span: Span) -> Self {
        Self { message, span: Some(span) }
    }
}

/// JSON 形式的过滤规格或查询选项不合法
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("filter spec must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("invalid filter value for field '{field}': {kind} is not a string, number or boolean")]
    InvalidValue { field: String, kind: &'static str },

    #[error("filter list for field '{field}' is empty")]
    EmptyList { field: String },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    position: usize,
    /// 输入末尾的位置, 用于构造 Eof token
    end: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        let end = tokens.last().map(|t| t.span.end).unwrap_or(0);
        Self {
            tokens,
            position: 0,
            end,
        }
    }

    /// 返回当前 token，不推进位置; 越过末尾时返回 Eof
    fn peek(&self) -> Token<'a> {
        self.tokens.get(self.position).cloned().unwrap_or(Token {
            kind: TokenKind::Eof,
            span: Span::new(self.end, self.end),
        })
    }

    /// 推进位置并返回当前 token
    fn advance(&mut self) -> Token<'a> {
        let token = self.peek();
        if self.position < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    /// 期望下一个 token 是指定的类型
    fn expect(&mut self, expected: TokenKind<'a>, what: &str) -> Result<Token<'a>, ParseError> {
        let token = self.advance();
        if token.kind == expected {
            Ok(token)
        } else {
            Err(ParseError::at_position(
                format!("期望 {}, 实际得到 {:?}", what, token.kind),
                token.span,
            ))
        }
    }

    /// 解析完整的范围表达式, 之后必须到达输入末尾
    pub fn parse(&mut self) -> Result<FilterExpr, ParseError> {
        let op = self.advance();
        let ctor: fn(i64) -> FilterExpr = match op.kind {
            TokenKind::Ident(name) => match name.to_ascii_lowercase().as_str() {
                "lt" => FilterExpr::LessThan,
                "lte" => FilterExpr::LessOrEqual,
                "gt" => FilterExpr::GreaterThan,
                "gte" => FilterExpr::GreaterOrEqual,
                _ => {
                    return Err(ParseError::at_position(
                        format!("未知的范围运算符: {}", name),
                        op.span,
                    ))
                }
            },
            other => {
                return Err(ParseError::at_position(
                    format!("期望范围运算符, 实际得到 {:?}", other),
                    op.span,
                ))
            }
        };

        self.expect(TokenKind::LParen, "'('")?;

        let number = self.advance();
        let value = match number.kind {
            TokenKind::Number(digits) => digits.parse::<i64>().map_err(|e| {
                ParseError::at_position(format!("数字超出范围: {} ({})", digits, e), number.span)
            })?,
            other => {
                return Err(ParseError::at_position(
                    format!("期望整数, 实际得到 {:?}", other),
                    number.span,
                ))
            }
        };

        self.expect(TokenKind::RParen, "')'")?;

        let rest = self.peek();
        if rest.kind != TokenKind::Eof {
            return Err(ParseError::at_position(
                format!("表达式之后有多余的输入: {:?}", rest.kind),
                rest.span,
            ));
        }

        Ok(ctor(value))
    }
}

/// 解析 `lt(N)` / `lte(N)` / `gt(N)` / `gte(N)`
pub fn parse_range_expr(input: &str) -> Result<FilterExpr, ParseError> {
    if input.is_empty() {
        return Err(ParseError::new("空的范围表达式".to_string(), None));
    }
    let tokens: Vec<_> = Lexer::new(input).collect();
    Parser::new(&tokens).parse()
}

/// 解析单个过滤表达式; 不是范围表达式的字符串按相等比较处理
pub fn parse_filter_expr(field: &str, value: &Value) -> Result<FilterExpr, FilterError> {
    match value {
        Value::String(s) => match parse_range_expr(s) {
            Ok(expr) => Ok(expr),
            Err(e) => {
                if looks_like_range(s) {
                    tracing::debug!(field, value = %s, error = %e, "range expression fell back to equality");
                }
                Ok(FilterExpr::Equals(Literal::String(s.clone())))
            }
        },
        Value::Number(n) => Ok(FilterExpr::Equals(Literal::Number(n.clone()))),
        Value::Bool(b) => Ok(FilterExpr::Equals(Literal::Bool(*b))),
        other => Err(FilterError::InvalidValue {
            field: field.to_string(),
            kind: json_kind(other),
        }),
    }
}

/// 只对看起来像范围表达式的字符串记录降级日志, 避免普通字符串刷屏
fn looks_like_range(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    ["lt(", "lte(", "gt(", "gte("].iter().any(|p| lower.starts_with(p))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl FilterSpec {
    /// 从 JSON 对象构造过滤规格, 保持键的插入顺序
    pub fn from_json(value: &Value) -> Result<Self, FilterError> {
        let Value::Object(map) = value else {
            return Err(FilterError::NotAnObject(json_kind(value)));
        };

        let mut spec = FilterSpec::new();
        for (key, value) in map {
            let condition = match value {
                Value::Array(items) => {
                    if items.is_empty() {
                        return Err(FilterError::EmptyList { field: key.clone() });
                    }
                    let exprs = items
                        .iter()
                        .map(|item| parse_filter_expr(key, item))
                        .collect::<Result<Vec<_>, _>>()?;
                    Condition::List(exprs)
                }
                scalar => Condition::Single(parse_filter_expr(key, scalar)?),
            };
            spec.push(FieldPath(key.clone()), condition);
        }
        Ok(spec)
    }

    pub fn from_json_str(input: &str) -> Result<Self, FilterError> {
        let value: Value = serde_json::from_str(input)?;
        Self::from_json(&value)
    }
}

impl QueryOptions {
    pub fn from_json(value: &Value) -> Result<Self, FilterError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(QueryOptions::deserialize(value)?)
    }

    pub fn from_json_str(input: &str) -> Result<Self, FilterError> {
        let value: Value = serde_json::from_str(input)?;
        Self::from_json(&value)
    }
}
