//! JavaScript lexer/tokenizer
//!
//! Converts source text into a stream of tokens. The lexer records whether
//! a line terminator preceded each token, which the parser needs for
//! automatic semicolon insertion. A `/` in operand position is handed back
//! to the lexer through `rescan_regexp`.

use crate::util::{unicode, unicode_from_utf8};

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    String(String),
    Ident(String),
    RegExp { pattern: String, flags: String },

    // Operators and punctuation
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    StarStar,  // **
    PlusPlus,  // ++
    MinusMinus, // --

    Eq,        // =
    EqEq,      // ==
    EqEqEq,    // ===
    Bang,      // !
    BangEq,    // !=
    BangEqEq,  // !==

    Lt,        // <
    LtEq,      // <=
    Gt,        // >
    GtEq,      // >=

    LtLt,      // <<
    GtGt,      // >>
    GtGtGt,    // >>>

    Amp,       // &
    AmpAmp,    // &&
    Pipe,      // |
    PipePipe,  // ||
    Caret,     // ^
    Tilde,     // ~

    Question,  // ?
    Colon,     // :
    Semicolon, // ;
    Comma,     // ,
    Dot,       // .

    LParen,    // (
    RParen,    // )
    LBracket,  // [
    RBracket,  // ]
    LBrace,    // {
    RBrace,    // }

    // Compound assignment
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    StarStarEq,
    LtLtEq,
    GtGtEq,
    GtGtGtEq,
    AmpEq,
    PipeEq,
    CaretEq,

    // Keywords
    Break,
    Case,
    Catch,
    Continue,
    Debugger,
    Default,
    Delete,
    Do,
    Else,
    False,
    Finally,
    For,
    Function,
    If,
    In,
    InstanceOf,
    New,
    Null,
    Return,
    Switch,
    This,
    Throw,
    True,
    Try,
    TypeOf,
    Var,
    Void,
    While,

    // Block scoping is not modelled; both behave like `var`
    Const,
    Let,

    // Special
    Eof,
    Error(String),
}

/// Source position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourcePos {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

/// Lexer for JavaScript source code
pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
    /// Start of the most recently returned token
    token_start: SourcePos,
    /// A line terminator was skipped before the most recent token
    newline_before: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            token_start: SourcePos::default(),
            newline_before: false,
        }
    }

    /// Get the current source position
    pub fn position(&self) -> SourcePos {
        SourcePos {
            offset: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    /// Position of the first character of the last token
    pub fn token_start(&self) -> SourcePos {
        self.token_start
    }

    pub fn newline_before(&self) -> bool {
        self.newline_before
    }

    /// Peek at the current character without consuming it
    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    /// Peek at the next character
    fn peek_next(&self) -> Option<u8> {
        self.source.get(self.pos + 1).copied()
    }

    /// Consume the current character
    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else if c & 0xC0 != 0x80 {
            // Continuation bytes do not start a column
            self.column += 1;
        }
        Some(c)
    }

    /// Decode the code point at the cursor
    fn peek_char(&self) -> Option<(u32, usize)> {
        unicode_from_utf8(&self.source[self.pos..])
    }

    fn advance_by(&mut self, len: usize) {
        for _ in 0..len {
            self.advance();
        }
    }

    /// Skip whitespace and comments
    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                Some(b'\n') => {
                    self.newline_before = true;
                    self.advance();
                }
                Some(b' ' | b'\t' | b'\r' | 0x0B | 0x0C) => {
                    self.advance();
                }
                Some(b'/') if self.peek_next() == Some(b'/') => {
                    // Line comment; the newline itself is left for the loop
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some(b'/') if self.peek_next() == Some(b'*') => {
                    // Block comment
                    self.advance(); // /
                    self.advance(); // *
                    while let Some(c) = self.advance() {
                        if c == b'\n' {
                            self.newline_before = true;
                        }
                        if c == b'*' && self.peek() == Some(b'/') {
                            self.advance();
                            break;
                        }
                    }
                }
                Some(c) if c >= 0x80 => match self.peek_char() {
                    Some((cp, len)) if unicode::is_whitespace(cp) => {
                        if unicode::is_line_terminator(cp) {
                            self.newline_before = true;
                        }
                        self.advance_by(len);
                    }
                    _ => break,
                },
                _ => break,
            }
        }
    }

    /// Read the next token
    pub fn next_token(&mut self) -> Token {
        self.newline_before = false;
        self.skip_whitespace();
        self.token_start = self.position();

        let Some(c) = self.peek() else {
            return Token::Eof;
        };

        // Identifiers and keywords
        if c.is_ascii_alphabetic() || c == b'_' || c == b'$' {
            return self.read_identifier();
        }
        if c >= 0x80 {
            return match self.peek_char() {
                Some((cp, _)) if unicode::is_id_start(cp) => self.read_identifier(),
                _ => {
                    let (_, len) = self.peek_char().unwrap_or((0, 1));
                    let bytes = &self.source[self.pos..self.pos + len];
                    let text = String::from_utf8_lossy(bytes).into_owned();
                    self.advance_by(len);
                    Token::Error(format!("Unexpected character: {}", text))
                }
            };
        }

        // Numbers
        if c.is_ascii_digit()
            || (c == b'.' && self.peek_next().is_some_and(|d| d.is_ascii_digit()))
        {
            return self.read_number();
        }

        // Strings
        if c == b'"' || c == b'\'' {
            return self.read_string();
        }
        // Operators and punctuation
        self.advance();
        match c {
            b'+' => match self.peek() {
                Some(b'+') => { self.advance(); Token::PlusPlus }
                Some(b'=') => { self.advance(); Token::PlusEq }
                _ => Token::Plus
            }
            b'-' => match self.peek() {
                Some(b'-') => { self.advance(); Token::MinusMinus }
                Some(b'=') => { self.advance(); Token::MinusEq }
                _ => Token::Minus
            }
            b'*' => match self.peek() {
                Some(b'*') => {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        Token::StarStarEq
                    } else {
                        Token::StarStar
                    }
                }
                Some(b'=') => { self.advance(); Token::StarEq }
                _ => Token::Star
            }
            b'/' => match self.peek() {
                Some(b'=') => { self.advance(); Token::SlashEq }
                _ => Token::Slash
            }
            b'%' => match self.peek() {
                Some(b'=') => { self.advance(); Token::PercentEq }
                _ => Token::Percent
            }
            b'=' => match self.peek() {
                Some(b'=') => {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        Token::EqEqEq
                    } else {
                        Token::EqEq
                    }
                }
                _ => Token::Eq
            }
            b'!' => match self.peek() {
                Some(b'=') => {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        Token::BangEqEq
                    } else {
                        Token::BangEq
                    }
                }
                _ => Token::Bang
            }
            b'<' => match self.peek() {
                Some(b'<') => {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        Token::LtLtEq
                    } else {
                        Token::LtLt
                    }
                }
                Some(b'=') => { self.advance(); Token::LtEq }
                _ => Token::Lt
            }
            b'>' => match self.peek() {
                Some(b'>') => {
                    self.advance();
                    match self.peek() {
                        Some(b'>') => {
                            self.advance();
                            if self.peek() == Some(b'=') {
                                self.advance();
                                Token::GtGtGtEq
                            } else {
                                Token::GtGtGt
                            }
                        }
                        Some(b'=') => { self.advance(); Token::GtGtEq }
                        _ => Token::GtGt
                    }
                }
                Some(b'=') => { self.advance(); Token::GtEq }
                _ => Token::Gt
            }
            b'&' => match self.peek() {
                Some(b'&') => { self.advance(); Token::AmpAmp }
                Some(b'=') => { self.advance(); Token::AmpEq }
                _ => Token::Amp
            }
            b'|' => match self.peek() {
                Some(b'|') => { self.advance(); Token::PipePipe }
                Some(b'=') => { self.advance(); Token::PipeEq }
                _ => Token::Pipe
            }
            b'^' => match self.peek() {
                Some(b'=') => { self.advance(); Token::CaretEq }
                _ => Token::Caret
            }
            b'~' => Token::Tilde,
            b'?' => Token::Question,
            b':' => Token::Colon,
            b';' => Token::Semicolon,
            b',' => Token::Comma,
            b'.' => Token::Dot,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'[' => Token::LBracket,
            b']' => Token::RBracket,
            b'{' => Token::LBrace,
            b'}' => Token::RBrace,
            _ => Token::Error(format!("Unexpected character: {}", c as char))
        }
    }


    /// Read an identifier or keyword
    fn read_identifier(&mut self) -> Token {
        let start = self.pos;

        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' || c == b'$' {
                self.advance();
            } else if c >= 0x80 {
                match self.peek_char() {
                    Some((cp, len)) if unicode::is_id_continue(cp) => self.advance_by(len),
                    _ => break,
                }
            } else {
                break;
            }
        }

        let ident = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();

        // Check for keywords
        match ident.as_str() {
            "break" => Token::Break,
            "case" => Token::Case,
            "catch" => Token::Catch,
            "const" => Token::Const,
            "continue" => Token::Continue,
            "debugger" => Token::Debugger,
            "default" => Token::Default,
            "delete" => Token::Delete,
            "do" => Token::Do,
            "else" => Token::Else,
            "false" => Token::False,
            "finally" => Token::Finally,
            "for" => Token::For,
            "function" => Token::Function,
            "if" => Token::If,
            "in" => Token::In,
            "instanceof" => Token::InstanceOf,
            "let" => Token::Let,
            "new" => Token::New,
            "null" => Token::Null,
            "return" => Token::Return,
            "switch" => Token::Switch,
            "this" => Token::This,
            "throw" => Token::Throw,
            "true" => Token::True,
            "try" => Token::Try,
            "typeof" => Token::TypeOf,
            "var" => Token::Var,
            "void" => Token::Void,
            "while" => Token::While,
            _ => Token::Ident(ident)
        }
    }

    fn skip_digits(&mut self, radix: u32) {
        while let Some(c) = self.peek() {
            if (c as char).is_digit(radix) {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Read a number literal
    fn read_number(&mut self) -> Token {
        let start = self.pos;

        // Prefixed integers
        if self.peek() == Some(b'0') {
            let radix = match self.peek_next() {
                Some(b'x' | b'X') => 16,
                Some(b'o' | b'O') => 8,
                Some(b'b' | b'B') => 2,
                _ => 0,
            };
            if radix != 0 {
                self.advance();
                self.advance();
                let digits = self.pos;
                self.skip_digits(radix);
                let text = std::str::from_utf8(&self.source[digits..self.pos]).unwrap_or("");
                if text.is_empty() {
                    return Token::Error("Invalid number".to_string());
                }
                let value = text
                    .chars()
                    .filter_map(|c| c.to_digit(radix))
                    .fold(0.0, |acc, d| acc * radix as f64 + d as f64);
                return self.finish_number(Token::Number(value));
            }
        }

        // Integer part
        self.skip_digits(10);

        // Decimal part
        if self.peek() == Some(b'.') {
            self.advance(); // .
            self.skip_digits(10);
        }

        // Exponent part
        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.advance();
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.advance();
            }
            self.skip_digits(10);
        }

        let num_str = std::str::from_utf8(&self.source[start..self.pos]).unwrap_or("0");
        match num_str.parse::<f64>() {
            Ok(n) => self.finish_number(Token::Number(n)),
            Err(_) => Token::Error(format!("Invalid number: {}", num_str))
        }
    }

    /// A number may not run straight into an identifier (`3in`, `1px`)
    fn finish_number(&mut self, token: Token) -> Token {
        match self.peek() {
            Some(c) if c.is_ascii_alphanumeric() || c == b'_' || c == b'$' => {
                Token::Error("Invalid or unexpected token".to_string())
            }
            _ => token,
        }
    }

    fn read_hex(&mut self, digits: usize) -> Option<u32> {
        let mut value = 0;
        for _ in 0..digits {
            let d = (self.peek()? as char).to_digit(16)?;
            self.advance();
            value = value * 16 + d;
        }
        Some(value)
    }

    /// `\uXXXX`, combining a following low surrogate escape when present
    fn read_unicode_escape(&mut self) -> Option<char> {
        let unit = self.read_hex(4)?;
        if (0xD800..0xDC00).contains(&unit)
            && self.peek() == Some(b'\\')
            && self.peek_next() == Some(b'u')
        {
            let save = (self.pos, self.line, self.column);
            self.advance();
            self.advance();
            if let Some(low) = self.read_hex(4) {
                if let Some(cp) = unicode::combine_surrogates(unit, low) {
                    return char::from_u32(cp);
                }
            }
            (self.pos, self.line, self.column) = save;
        }
        // Lone surrogates cannot live in a Rust string
        Some(char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    /// Read a string literal
    fn read_string(&mut self) -> Token {
        let Some(quote) = self.advance() else {
            return Token::Eof;
        };
        let mut bytes = Vec::new();
        let mut escape = [0u8; 4];

        loop {
            match self.peek() {
                None | Some(b'\n') => return Token::Error("Unterminated string".to_string()),
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some(b'\\') => {
                    self.advance();
                    let decoded = match self.advance() {
                        Some(b'n') => '\n',
                        Some(b'r') => '\r',
                        Some(b't') => '\t',
                        Some(b'b') => '\u{8}',
                        Some(b'f') => '\u{c}',
                        Some(b'v') => '\u{b}',
                        Some(b'0') if !self.peek().is_some_and(|d| d.is_ascii_digit()) => '\0',
                        Some(b'x') => match self.read_hex(2).and_then(char::from_u32) {
                            Some(c) => c,
                            None => {
                                return Token::Error(
                                    "Invalid hexadecimal escape sequence".to_string(),
                                );
                            }
                        },
                        Some(b'u') => match self.read_unicode_escape() {
                            Some(c) => c,
                            None => {
                                return Token::Error("Invalid Unicode escape sequence".to_string());
                            }
                        },
                        // Line continuation
                        Some(b'\n') => continue,
                        Some(b'\r') => {
                            if self.peek() == Some(b'\n') {
                                self.advance();
                            }
                            continue;
                        }
                        Some(c) if c < 0x80 => c as char,
                        Some(_) => {
                            // Escaped non-ASCII character stands for itself
                            self.pos -= 1;
                            self.column -= 1;
                            continue;
                        }
                        None => return Token::Error("Unterminated string".to_string()),
                    };
                    bytes.extend_from_slice(decoded.encode_utf8(&mut escape).as_bytes());
                }
                Some(c) => {
                    self.advance();
                    bytes.push(c);
                }
            }
        }

        match String::from_utf8(bytes) {
            Ok(s) => Token::String(s),
            Err(e) => Token::String(String::from_utf8_lossy(e.as_bytes()).into_owned()),
        }
    }

    /// Re-read the last `/` or `/=` token as a regular expression literal
    pub fn rescan_regexp(&mut self) -> Token {
        let start = self.token_start;
        self.pos = start.offset;
        self.line = start.line;
        self.column = start.column;
        self.advance(); // opening /

        let body = self.pos;
        let mut in_class = false;
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    return Token::Error("Invalid regular expression: missing /".to_string())
                }
                Some(b'\\') => {
                    self.advance();
                    if self.peek().is_some_and(|c| c != b'\n') {
                        self.advance();
                    }
                }
                Some(b'[') => {
                    in_class = true;
                    self.advance();
                }
                Some(b']') => {
                    in_class = false;
                    self.advance();
                }
                Some(b'/') if !in_class => break,
                Some(_) => {
                    self.advance();
                }
            }
        }
        let pattern = String::from_utf8_lossy(&self.source[body..self.pos]).into_owned();
        self.advance(); // closing /

        let flags_start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.advance();
        }
        let flags = String::from_utf8_lossy(&self.source[flags_start..self.pos]).into_owned();
        Token::RegExp { pattern, flags }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers() {
        let mut lexer = Lexer::new("42 3.14 1e10 0x1F .5 0b101");

        assert!(matches!(lexer.next_token(), Token::Number(n) if n == 42.0));
        assert!(matches!(lexer.next_token(), Token::Number(n) if (n - 3.14).abs() < 0.001));
        assert!(matches!(lexer.next_token(), Token::Number(n) if n == 1e10));
        assert!(matches!(lexer.next_token(), Token::Number(n) if n == 31.0));
        assert!(matches!(lexer.next_token(), Token::Number(n) if n == 0.5));
        assert!(matches!(lexer.next_token(), Token::Number(n) if n == 5.0));
        assert!(matches!(Lexer::new("3px").next_token(), Token::Error(_)));
    }

    #[test]
    fn test_strings() {
        let mut lexer = Lexer::new(r#""hello" 'world' "a\tb\x41é" "café ☕""#);

        assert_eq!(lexer.next_token(), Token::String("hello".to_string()));
        assert_eq!(lexer.next_token(), Token::String("world".to_string()));
        assert_eq!(lexer.next_token(), Token::String("a\tbAé".to_string()));
        assert_eq!(lexer.next_token(), Token::String("café ☕".to_string()));
    }

    #[test]
    fn test_surrogate_pair_escape() {
        let mut lexer = Lexer::new(r#""\uD83D\uDE00""#);
        assert_eq!(lexer.next_token(), Token::String("😀".to_string()));
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("'abc\n'");
        assert!(matches!(lexer.next_token(), Token::Error(_)));
    }

    #[test]
    fn test_identifiers_and_keywords() {
        let mut lexer = Lexer::new("foo var if else of");

        assert_eq!(lexer.next_token(), Token::Ident("foo".to_string()));
        assert_eq!(lexer.next_token(), Token::Var);
        assert_eq!(lexer.next_token(), Token::If);
        assert_eq!(lexer.next_token(), Token::Else);
        assert_eq!(lexer.next_token(), Token::Ident("of".to_string()));
    }

    #[test]
    fn test_operators() {
        let mut lexer = Lexer::new("+ ++ += === !== >>>=");

        assert_eq!(lexer.next_token(), Token::Plus);
        assert_eq!(lexer.next_token(), Token::PlusPlus);
        assert_eq!(lexer.next_token(), Token::PlusEq);
        assert_eq!(lexer.next_token(), Token::EqEqEq);
        assert_eq!(lexer.next_token(), Token::BangEqEq);
        assert_eq!(lexer.next_token(), Token::GtGtGtEq);
    }

    #[test]
    fn test_comments() {
        let mut lexer = Lexer::new("1 // comment\n2 /* block */ 3");

        assert!(matches!(lexer.next_token(), Token::Number(n) if n == 1.0));
        assert!(matches!(lexer.next_token(), Token::Number(n) if n == 2.0));
        assert!(lexer.newline_before());
        assert!(matches!(lexer.next_token(), Token::Number(n) if n == 3.0));
        assert!(!lexer.newline_before());
    }

    #[test]
    fn test_line_tracking() {
        let mut lexer = Lexer::new("a\n  /* x\n */ b");

        lexer.next_token();
        assert_eq!(lexer.token_start().line, 1);
        lexer.next_token();
        assert_eq!(lexer.token_start().line, 3);
        assert_eq!(lexer.token_start().column, 5);
        assert!(lexer.newline_before());
    }

    #[test]
    fn test_regexp_rescan() {
        let mut lexer = Lexer::new("/a[/]b\\//gi.x");

        assert_eq!(lexer.next_token(), Token::Slash);
        assert_eq!(
            lexer.rescan_regexp(),
            Token::RegExp {
                pattern: "a[/]b\\/".to_string(),
                flags: "gi".to_string()
            }
        );
        assert_eq!(lexer.next_token(), Token::Dot);
    }
}
