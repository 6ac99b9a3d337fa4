//! Tokenizer for the reference JML frontend.
//!
//! Produces the whole token stream up front. Lexical problems do not abort
//! tokenization; they become `TokenKind::Error` tokens the parser turns into
//! `error` parse nodes.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    String,
    Punct,
    Error,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Identifier name, punctuation, number source, unescaped string value or
    /// error message.
    pub text: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == punct
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == keyword
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => f.write_str("end of file"),
            TokenKind::String => write!(f, "string \"{}\"", self.text),
            TokenKind::Error => write!(f, "invalid token ({})", self.text),
            _ => write!(f, "'{}'", self.text),
        }
    }
}

pub const KEYWORDS: &[&str] = &[
    "import", "from", "export", "page", "component", "prop", "state", "let", "const", "function",
    "if", "else", "for", "in", "while", "return", "break", "continue", "true", "false", "null",
];

pub fn is_keyword(text: &str) -> bool {
    KEYWORDS.contains(&text)
}

// Longest first so `===`-style prefixes never shadow longer operators.
const PUNCTUATION: &[&str] = &[
    "=>", "==", "!=", "<=", ">=", "&&", "||", "+=", "-=", "{", "}", "(", ")", "[", "]", ",", ";",
    ":", ".", "?", "=", "<", ">", "+", "-", "*", "/", "%", "!",
];

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
}

pub fn tokenize(source: &str) -> Vec<Token> {
    let mut lexer = Lexer {
        chars: source.chars().peekable(),
        line: 1,
        column: 1,
        tokens: Vec::new(),
    };
    lexer.run();
    lexer.tokens
}

impl<'a> Lexer<'a> {
    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next()
    }

    fn push(&mut self, kind: TokenKind, text: String, line: u32, column: u32) {
        self.tokens.push(Token {
            kind,
            text,
            line,
            column,
        });
    }

    fn run(&mut self) {
        loop {
            self.skip_trivia();
            let (line, column) = (self.line, self.column);
            let Some(c) = self.peek() else {
                self.push(TokenKind::Eof, String::new(), line, column);
                return;
            };

            if c.is_alphabetic() || c == '_' || c == '$' {
                let text = self.take_while(|c| c.is_alphanumeric() || c == '_' || c == '$');
                self.push(TokenKind::Ident, text, line, column);
            } else if c.is_ascii_digit() {
                let text = self.number();
                self.push(TokenKind::Number, text, line, column);
            } else if c == '"' || c == '\'' {
                match self.string(c) {
                    Ok(value) => self.push(TokenKind::String, value, line, column),
                    Err(message) => self.push(TokenKind::Error, message, line, column),
                }
            } else if let Some(punct) = self.punct() {
                self.push(TokenKind::Punct, punct.to_string(), line, column);
            } else {
                self.bump();
                self.push(
                    TokenKind::Error,
                    format!("unexpected character '{}'", c),
                    line,
                    column,
                );
            }
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_second() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek_second() == Some('*') => {
                    self.bump();
                    self.bump();
                    let mut previous = '\0';
                    while let Some(c) = self.bump() {
                        if previous == '*' && c == '/' {
                            break;
                        }
                        previous = c;
                    }
                }
                _ => return,
            }
        }
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if !keep(c) {
                break;
            }
            text.push(c);
            self.bump();
        }
        text
    }

    fn number(&mut self) -> String {
        let mut text = self.take_while(|c| c.is_ascii_digit());
        if self.peek() == Some('.') && self.peek_second().map_or(false, |c| c.is_ascii_digit()) {
            self.bump();
            text.push('.');
            text.push_str(&self.take_while(|c| c.is_ascii_digit()));
        }
        text
    }

    fn string(&mut self, quote: char) -> Result<String, String> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err("unterminated string literal".to_string()),
                Some(c) if c == quote => return Ok(value),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('0') => value.push('\0'),
                    Some(c) => value.push(c),
                    None => return Err("unterminated string literal".to_string()),
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn punct(&mut self) -> Option<&'static str> {
        let first = self.peek()?;
        let second = self.peek_second();
        let found = PUNCTUATION.iter().copied().find(|p| {
            let mut pc = p.chars();
            pc.next() == Some(first) && pc.next() == second.filter(|_| p.len() == 2)
        })?;
        for _ in 0..found.len() {
            self.bump();
        }
        Some(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(source: &str) -> Vec<String> {
        tokenize(source).into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_tokenizes_operators_longest_first() {
        assert_eq!(
            texts("a += b => c <= d"),
            vec!["a", "+=", "b", "=>", "c", "<=", "d", ""]
        );
    }

    #[test]
    fn test_positions_are_one_based() {
        let tokens = tokenize("page Home {\n  prop x;\n}");
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[3].line, tokens[3].column), (2, 3));
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn test_strings_unescape_and_comments_skip() {
        let tokens = tokenize("// header\n\"a\\\"b\" /* skip */ 'c' 3.25 4.x");
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].text, "a\"b");
        assert_eq!(tokens[1].text, "c");
        assert_eq!(tokens[2].text, "3.25");
        assert_eq!(tokens[3].text, "4");
        assert_eq!(tokens[4].text, ".");
    }

    #[test]
    fn test_lexical_errors_become_tokens() {
        let tokens = tokenize("let a = \"open\nlet b = @");
        assert_eq!(tokens[3].kind, TokenKind::Error);
        assert_eq!(tokens[3].text, "unterminated string literal");
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::Error && t.text.contains('@')));
    }
}
