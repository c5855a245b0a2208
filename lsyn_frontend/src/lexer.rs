//! Lexer for the Verilog subset, built on logos.

use logos::Logos;
use std::fmt;
use std::ops::Range;

use crate::FrontendError;

/// Tokens of the accepted Verilog subset.
#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*[^*]*\*+([^/*][^*]*\*+)*/")]
pub enum Token {
    #[token("module")]
    Module,
    #[token("endmodule")]
    EndModule,
    #[token("input")]
    Input,
    #[token("output")]
    Output,
    #[token("inout")]
    Inout,
    #[token("wire")]
    Wire,
    #[token("assign")]
    Assign,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_$]*", |lex| lex.slice().to_owned())]
    Ident(String),
    /// `<width>'<base><digits>`
    #[regex(r"[0-9]+'[bBoOdDhH][0-9a-fA-F_]+", |lex| parse_sized(lex.slice()))]
    Sized((u32, u64)),
    #[regex(r"[0-9][0-9_]*", |lex| lex.slice().replace('_', "").parse::<u64>().ok())]
    Number(u64),

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("=")]
    Eq,
    #[token("?")]
    Question,

    #[token("~")]
    Tilde,
    #[token("!")]
    Bang,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~^")]
    #[token("^~")]
    Xnor,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Module => "module",
            Self::EndModule => "endmodule",
            Self::Input => "input",
            Self::Output => "output",
            Self::Inout => "inout",
            Self::Wire => "wire",
            Self::Assign => "assign",
            Self::Ident(name) => return write!(f, "identifier '{name}'"),
            Self::Sized((width, value)) => return write!(f, "literal {width}'d{value}"),
            Self::Number(value) => return write!(f, "number {value}"),
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::Comma => ",",
            Self::Semi => ";",
            Self::Colon => ":",
            Self::Dot => ".",
            Self::Eq => "=",
            Self::Question => "?",
            Self::Tilde => "~",
            Self::Bang => "!",
            Self::Amp => "&",
            Self::Pipe => "|",
            Self::Caret => "^",
            Self::Xnor => "~^",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::EqEq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        };
        write!(f, "'{text}'")
    }
}

/// Parse `<width>'<base><digits>`; `None` on overflow or a bad digit.
fn parse_sized(text: &str) -> Option<(u32, u64)> {
    let (width, rest) = text.split_once('\'')?;
    let width = width.parse::<u32>().ok()?;
    let mut chars = rest.chars();
    let radix = match chars.next()? {
        'b' | 'B' => 2,
        'o' | 'O' => 8,
        'd' | 'D' => 10,
        'h' | 'H' => 16,
        _ => return None,
    };
    let digits = chars.as_str().replace('_', "");
    let value = u64::from_str_radix(&digits, radix).ok()?;
    Some((width, value))
}

/// 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    /// Line number.
    pub line: usize,
    /// Column number, in characters.
    pub col: usize,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Byte offset → line/column conversion.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    source: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    /// Index the line starts of `source`.
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { source, starts }
    }

    /// Position of byte `offset`.
    #[must_use]
    pub fn pos(&self, offset: usize) -> Pos {
        let line = self.starts.partition_point(|&start| start <= offset);
        let start = self.starts[line.saturating_sub(1)];
        let col = self
            .source
            .get(start..offset)
            .map_or(offset - start, |s| s.chars().count());
        Pos { line, col: col + 1 }
    }
}

/// A token with its source span and position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    /// The token.
    pub token: Token,
    /// Byte range in the source.
    pub span: Range<usize>,
    /// Start position.
    pub pos: Pos,
}

/// Tokenize a whole source file.
///
/// # Errors
///
/// [`FrontendError::Lex`] at the first character sequence that is not a token.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, FrontendError> {
    let index = LineIndex::new(source);
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let pos = index.pos(span.start);
        match result {
            Ok(token) => tokens.push(Spanned { token, span, pos }),
            Err(()) => {
                return Err(FrontendError::Lex {
                    line: pos.line,
                    col: pos.col,
                    text: lexer.slice().to_string(),
                });
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("module m_1 (input a); endmodule"),
            vec![
                Token::Module,
                Token::Ident("m_1".into()),
                Token::LParen,
                Token::Input,
                Token::Ident("a".into()),
                Token::RParen,
                Token::Semi,
                Token::EndModule,
            ]
        );
    }

    #[test]
    fn literals() {
        assert_eq!(
            kinds("4'b1010 8'hFF 3'd5 12 1_000"),
            vec![
                Token::Sized((4, 10)),
                Token::Sized((8, 255)),
                Token::Sized((3, 5)),
                Token::Number(12),
                Token::Number(1000),
            ]
        );
    }

    #[test]
    fn operators_and_comments() {
        assert_eq!(
            kinds("a ~^ b // trailing\n ^~ /* block\n comment */ <= >= != =="),
            vec![
                Token::Ident("a".into()),
                Token::Xnor,
                Token::Ident("b".into()),
                Token::Xnor,
                Token::Le,
                Token::Ge,
                Token::NotEq,
                Token::EqEq,
            ]
        );
    }

    #[test]
    fn positions() {
        let tokens = tokenize("module\n  foo").unwrap();
        assert_eq!(tokens[1].pos, Pos { line: 2, col: 3 });
    }

    #[test]
    fn bad_character() {
        let err = tokenize("assign y = a # b;").unwrap_err();
        assert!(matches!(err, FrontendError::Lex { line: 1, col: 14, .. }));
    }
}
