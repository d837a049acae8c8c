//! Token definitions for the expression language.

use std::ops::Range;

use logos::{Lexer, Logos};

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"#[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub(crate) enum Token {
    // Keywords
    #[token("let")]
    Let,
    #[token("in")]
    In,
    #[token("rec")]
    Rec,
    #[token("if")]
    If,
    #[token("then")]
    Then,
    #[token("else")]
    Else,
    #[token("assert")]
    Assert,
    #[token("with")]
    With,
    #[token("inherit")]
    Inherit,

    // Delimiters
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("...")]
    Ellipsis,
    #[token("@")]
    At,
    #[token("?")]
    Question,
    #[token("=")]
    Assign,

    // Operators
    #[token("==")]
    Eq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("++")]
    Concat,
    #[token("//")]
    Update,
    #[token("!")]
    Bang,
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("->")]
    Implies,

    // Literals
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"(([1-9][0-9]*\.[0-9]*)|(0?\.[0-9]+))([Ee][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[regex(r#""([^"\\]|\\.)*""#, unescape)]
    Str(String),

    /// `./a`, `../a`, `/a`, `a/b`. Recognized by [`tokenize`], not by the
    /// DFA: the prefix overlaps identifiers, numbers, `.` and `-`.
    Path(String),

    #[regex(r"~(/[a-zA-Z0-9._+\-]+)+/?", |lex| lex.slice().to_owned())]
    HomePath(String),

    /// `<nixpkgs>`, resolved against the search path at evaluation time.
    /// Recognized by [`tokenize`] so that `a<b` stays a comparison.
    SearchPath(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_'\-]*", |lex| lex.slice().to_owned())]
    Ident(String),
}

/// Strip the quotes and resolve escapes. Interpolation (`${`) is rejected.
fn unescape(lex: &mut Lexer<Token>) -> Option<String> {
    let slice = lex.slice();
    let body = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                other => out.push(other),
            },
            '$' if chars.peek() == Some(&'{') => return None,
            c => out.push(c),
        }
    }
    Some(out)
}

#[derive(Debug, Clone)]
pub(crate) struct Spanned<T> {
    pub value: T,
    pub span: Range<usize>,
}

pub(crate) type SpannedToken = Spanned<Token>;

/// Tokenize `source`. On failure returns the byte range of the offending
/// input.
pub(crate) fn tokenize(source: &str) -> Result<Vec<SpannedToken>, Range<usize>> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);
    loop {
        let rest = lexer.remainder();
        let trivia = trivia_len(rest);
        let start = source.len() - rest.len() + trivia;
        if let Some((value, len)) = path_token(&rest[trivia..]) {
            lexer.bump(trivia + len);
            tokens.push(Spanned {
                value,
                span: start..start + len,
            });
            continue;
        }
        match lexer.next() {
            Some(Ok(value)) => tokens.push(Spanned {
                value,
                span: lexer.span(),
            }),
            Some(Err(())) => return Err(lexer.span()),
            None => break,
        }
    }
    Ok(tokens)
}

fn is_path_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'+' | b'-')
}

/// Length of the whitespace and comments at the start of `s`. An
/// unterminated block comment is left for the lexer to reject.
fn trivia_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    loop {
        match bytes.get(i..) {
            Some([b' ' | b'\t' | b'\r' | b'\n', ..]) => i += 1,
            Some([b'#', ..]) => {
                i += bytes[i..].iter().position(|&b| b == b'\n').unwrap_or(bytes.len() - i);
            }
            Some([b'/', b'*', ..]) => match s[i + 2..].find("*/") {
                Some(end) => i += end + 4,
                None => return i,
            },
            _ => return i,
        }
    }
}

/// A path or search path literal at the start of `s`, with its length.
fn path_token(s: &str) -> Option<(Token, usize)> {
    let bytes = s.as_bytes();
    if bytes.first() == Some(&b'<') {
        let len = search_path_len(bytes)?;
        return Some((Token::SearchPath(s[1..len - 1].to_owned()), len));
    }
    let len = path_len(bytes)?;
    Some((Token::Path(s[..len].to_owned()), len))
}

/// `[path-char]* ('/' [path-char]+)+ '/'?`
fn path_len(bytes: &[u8]) -> Option<usize> {
    let mut i = bytes.iter().take_while(|&&b| is_path_char(b)).count();
    let mut segments = 0;
    while bytes.get(i) == Some(&b'/') {
        let run = bytes[i + 1..].iter().take_while(|&&b| is_path_char(b)).count();
        if run == 0 {
            break;
        }
        i += 1 + run;
        segments += 1;
    }
    if segments == 0 {
        return None;
    }
    if bytes.get(i) == Some(&b'/') && bytes.get(i + 1) != Some(&b'/') {
        i += 1;
    }
    Some(i)
}

/// `'<' [path-char]+ ('/' [path-char]+)* '>'`
fn search_path_len(bytes: &[u8]) -> Option<usize> {
    let mut i = 1;
    loop {
        let run = bytes[i..].iter().take_while(|&&b| is_path_char(b)).count();
        if run == 0 {
            return None;
        }
        i += run;
        match bytes.get(i) {
            Some(b'/') => i += 1,
            Some(b'>') => return Some(i + 1),
            _ => return None,
        }
    }
}
