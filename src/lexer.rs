//! 范围过滤表达式的词法分析器
//!
//! 输入形如 `lt(5)`、`GTE(100)` 的字符串。锚定语法不允许任何空白，
//! 因此空白字符会被当作 `Illegal` 返回，而不是跳过。

use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    /// 读取连续的 ASCII 数字，保留原始文本，由语法分析器负责转换和溢出检查
    fn read_number(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.bump();
            } else {
                break;
            }
        }
        Token {
            kind: TokenKind::Number(&self.input[start..self.position]),
            span: Span::new(start, self.position),
        }
    }

    /// 读取运算符名称（只包含 ASCII 字母）
    fn read_ident(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphabetic() {
                self.bump();
            } else {
                break;
            }
        }
        Token {
            kind: TokenKind::Ident(&self.input[start..self.position]),
            span: Span::new(start, self.position),
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.position;

        let Some(c) = self.bump() else {
            return None; // 到达输入末尾
        };

        let token = match c {
            '(' => Token { kind: TokenKind::LParen, span: Span::new(start, self.position) },
            ')' => Token { kind: TokenKind::RParen, span: Span::new(start, self.position) },
            c if c.is_ascii_digit() => self.read_number(start),
            c if c.is_ascii_alphabetic() => self.read_ident(start),
            c => Token { kind: TokenKind::Illegal(c), span: Span::new(start, self.position) },
        };
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_range() {
        let mut lexer = Lexer::new("lt(5)");

        assert_eq!(lexer.next().unwrap().kind, TokenKind::Ident("lt"));
        assert_eq!(lexer.next().unwrap().kind, TokenKind::LParen);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Number("5"));
        assert_eq!(lexer.next().unwrap().kind, TokenKind::RParen);
        assert_eq!(lexer.next(), None);
    }

    #[test]
    fn test_spans_cover_source() {
        let tokens: Vec<_> = Lexer::new("gte(1234)").collect();
        let spans: Vec<_> = tokens.iter().map(|t| (t.span.start, t.span.end)).collect();
        assert_eq!(spans, vec![(0, 3), (3, 4), (4, 8), (8, 9)]);
    }

    #[test]
    fn test_whitespace_is_illegal() {
        let kinds: Vec<_> = Lexer::new("lt( 5)").map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident("lt"),
                TokenKind::LParen,
                TokenKind::Illegal(' '),
                TokenKind::Number("5"),
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn test_sign_and_decimal_point_are_illegal() {
        let kinds: Vec<_> = Lexer::new("gt(-1.5)").map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident("gt"),
                TokenKind::LParen,
                TokenKind::Illegal('-'),
                TokenKind::Number("1"),
                TokenKind::Illegal('.'),
                TokenKind::Number("5"),
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn test_mixed_case_ident_is_kept_verbatim() {
        let kinds: Vec<_> = Lexer::new("LtE(7)").map(|t| t.kind).collect();
        assert_eq!(kinds[0], TokenKind::Ident("LtE"));
    }

    #[test]
    fn test_non_ascii_input() {
        let kinds: Vec<_> = Lexer::new("lt(５)").map(|t| t.kind).collect();
        assert_eq!(kinds[2], TokenKind::Illegal('５'));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(Lexer::new("").next(), None);
    }
}
