//! Lexical analysis
//!
//! The scanner never fails. Malformed input is reported as
//! [`AnalysisError`]s and scanning continues with a best-effort token.

use sable_core::{
    AnalysisError, ErrorReporter, LineInfo, RecordingErrorListener, ScannerErrorCode, Source,
};

use crate::token::{Keyword, Token, TokenKind, TokenStream, PUNCTUATION};

#[derive(Debug, Clone)]
pub struct ScanResult {
    pub tokens: TokenStream,
    pub line_info: LineInfo,
    pub errors: Vec<AnalysisError>,
}

pub fn scan(source: &Source, content: &str, preserve_comments: bool) -> ScanResult {
    let mut listener = RecordingErrorListener::new();
    let tokens = {
        let mut scanner = Scanner {
            text: content,
            pos: 0,
            tokens: Vec::new(),
            pending_comments: Vec::new(),
            preserve_comments,
            reporter: ErrorReporter::new(&mut listener, source.clone()),
        };
        scanner.run();
        scanner.finish()
    };
    tracing::trace!(
        "Scanned {}: {} tokens, {} errors",
        source.short_name(),
        tokens.len(),
        listener.errors().len()
    );
    ScanResult {
        tokens,
        line_info: LineInfo::from_text(content),
        errors: listener.into_errors(),
    }
}

struct Scanner<'a> {
    text: &'a str,
    pos: usize,
    tokens: Vec<Token>,
    pending_comments: Vec<Token>,
    preserve_comments: bool,
    reporter: ErrorReporter<'a>,
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.text[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn rest(&self) -> &str {
        &self.text[self.pos..]
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        let mut token = Token::new(kind, start, &self.text[start..self.pos]);
        token.preceding_comments = std::mem::take(&mut self.pending_comments);
        self.tokens.push(token);
    }

    fn finish(mut self) -> TokenStream {
        let mut eof = Token::new(TokenKind::Eof, self.text.len(), "");
        eof.preceding_comments = std::mem::take(&mut self.pending_comments);
        self.tokens.push(eof);
        TokenStream::new(self.tokens, self.text.len())
    }

    fn run(&mut self) {
        while let Some(c) = self.peek() {
            let start = self.pos;
            match c {
                c if c.is_whitespace() => {
                    self.bump();
                }
                '/' if self.peek_at(1) == Some('/') => self.line_comment(start),
                '/' if self.peek_at(1) == Some('*') => self.block_comment(start),
                '\'' | '"' => self.string(start, false),
                'r' if matches!(self.peek_at(1), Some('\'') | Some('"')) => {
                    self.bump();
                    self.string(start, true);
                }
                c if is_identifier_start(c) => self.identifier(start),
                c if c.is_ascii_digit() => self.number(start),
                '.' if self.peek_at(1).map_or(false, |d| d.is_ascii_digit()) => self.number(start),
                c => self.punctuation(start, c),
            }
        }
    }

    fn comment(&mut self, start: usize) {
        if self.preserve_comments {
            self.pending_comments
                .push(Token::new(TokenKind::Comment, start, &self.text[start..self.pos]));
        }
    }

    fn line_comment(&mut self, start: usize) {
        while let Some(c) = self.peek() {
            if c == '\n' || c == '\r' {
                break;
            }
            self.bump();
        }
        self.comment(start);
    }

    fn block_comment(&mut self, start: usize) {
        self.pos += 2;
        let mut depth = 1;
        while depth > 0 {
            if self.rest().starts_with("*/") {
                self.pos += 2;
                depth -= 1;
            } else if self.rest().starts_with("/*") {
                self.pos += 2;
                depth += 1;
            } else if self.bump().is_none() {
                self.reporter.report(
                    start,
                    self.pos - start,
                    ScannerErrorCode::UnterminatedMultiLineComment,
                    &[],
                );
                break;
            }
        }
        self.comment(start);
    }

    fn identifier(&mut self, start: usize) {
        while self.peek().map_or(false, is_identifier_part) {
            self.bump();
        }
        let kind = match Keyword::from_lexeme(&self.text[start..self.pos]) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Identifier,
        };
        self.push(kind, start);
    }

    fn digits(&mut self) -> usize {
        let mut count = 0;
        while self.peek().map_or(false, |c| c.is_ascii_digit()) {
            self.bump();
            count += 1;
        }
        count
    }

    fn number(&mut self, start: usize) {
        if self.rest().starts_with("0x") || self.rest().starts_with("0X") {
            self.pos += 2;
            let mut count = 0;
            while self.peek().map_or(false, |c| c.is_ascii_hexdigit()) {
                self.bump();
                count += 1;
            }
            if count == 0 {
                self.reporter
                    .report(self.pos, 0, ScannerErrorCode::MissingDigit, &[]);
            }
            self.push(TokenKind::Integer, start);
            return;
        }

        let mut is_double = false;
        self.digits();
        if self.peek() == Some('.') && self.peek_at(1).map_or(false, |c| c.is_ascii_digit()) {
            self.bump();
            self.digits();
            is_double = true;
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            self.bump();
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.bump();
            }
            if self.digits() == 0 {
                self.reporter
                    .report(self.pos, 0, ScannerErrorCode::MissingDigit, &[]);
            }
            is_double = true;
        }
        let kind = if is_double {
            TokenKind::Double
        } else {
            TokenKind::Integer
        };
        self.push(kind, start);
    }

    fn string(&mut self, start: usize, raw: bool) {
        let quote = match self.bump() {
            Some(quote) => quote,
            None => return,
        };
        let triple_quote: String = std::iter::repeat(quote).take(3).collect();
        let triple = self.rest().starts_with(&triple_quote[1..]);
        if triple {
            self.pos += 2;
        }

        loop {
            match self.peek() {
                None => {
                    self.unterminated_string(start);
                    break;
                }
                Some('\n') | Some('\r') if !triple => {
                    self.unterminated_string(start);
                    break;
                }
                Some('\\') if !raw => {
                    self.bump();
                    self.bump();
                }
                Some('$') if !raw && self.peek_at(1) == Some('{') => {
                    self.pos += 2;
                    self.skip_interpolation_block();
                }
                Some(c) if c == quote => {
                    if !triple {
                        self.bump();
                        break;
                    }
                    if self.rest().starts_with(&triple_quote) {
                        self.pos += 3;
                        break;
                    }
                    self.bump();
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        self.push(TokenKind::String, start);
    }

    fn skip_interpolation_block(&mut self) {
        let mut depth = 1;
        while depth > 0 {
            match self.peek() {
                None | Some('\n') => return,
                Some('{') => depth += 1,
                Some('}') => depth -= 1,
                _ => {}
            }
            self.bump();
        }
    }

    fn unterminated_string(&mut self, start: usize) {
        self.reporter.report(
            start,
            self.pos - start,
            ScannerErrorCode::UnterminatedStringLiteral,
            &[],
        );
    }

    fn punctuation(&mut self, start: usize, c: char) {
        let matched = PUNCTUATION
            .iter()
            .find(|(lexeme, _)| self.rest().starts_with(lexeme))
            .map(|(lexeme, kind)| (lexeme.len(), *kind));
        match matched {
            Some((length, kind)) => {
                self.pos += length;
                self.push(kind, start);
            }
            None => {
                self.bump();
                let text = c.to_string();
                self.reporter.report(
                    start,
                    self.pos - start,
                    ScannerErrorCode::IllegalCharacter,
                    &[&text],
                );
            }
        }
    }
}

/// Decoded value of a string literal token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringValue {
    pub value: String,
    pub interpolated: bool,
}

/// Strip quotes, resolve escapes and detect interpolation in a string
/// literal's lexeme. Interpolated parts are kept verbatim in the value.
pub fn string_value(lexeme: &str) -> StringValue {
    let (raw, body) = match lexeme.strip_prefix('r') {
        Some(rest) => (true, rest),
        None => (false, lexeme),
    };
    let quote = match body.chars().next() {
        Some(quote @ ('\'' | '"')) => quote,
        _ => {
            return StringValue {
                value: body.to_string(),
                interpolated: false,
            }
        }
    };
    let triple: String = std::iter::repeat(quote).take(3).collect();
    let delimiter = if body.starts_with(&triple) { 3 } else { 1 };
    let inner = &body[delimiter.min(body.len())..];
    let inner = if inner.len() >= delimiter && inner.ends_with(&triple[..delimiter]) {
        &inner[..inner.len() - delimiter]
    } else {
        inner
    };

    let mut value = String::with_capacity(inner.len());
    let mut interpolated = false;
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if !raw => match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some('r') => value.push('\r'),
                Some(other) => value.push(other),
                None => {}
            },
            '$' if !raw => {
                if chars
                    .peek()
                    .map_or(false, |next| *next == '{' || is_identifier_start(*next))
                {
                    interpolated = true;
                }
                value.push(c);
            }
            _ => value.push(c),
        }
    }
    StringValue {
        value,
        interpolated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sable_core::ErrorCode;

    fn source() -> Source {
        Source::new("file:///test.dart")
    }

    fn kinds(text: &str) -> Vec<TokenKind> {
        scan(&source(), text, false)
            .tokens
            .iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("import 'a.dart' show x;"),
            vec![
                TokenKind::Keyword(Keyword::Import),
                TokenKind::String,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators_take_longest_match() {
        assert_eq!(
            kinds("a ~/ b => c != d"),
            vec![
                TokenKind::Identifier,
                TokenKind::TildeSlash,
                TokenKind::Identifier,
                TokenKind::FatArrow,
                TokenKind::Identifier,
                TokenKind::BangEq,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let result = scan(&source(), "1 2.5 .5 3e10 0xFF 1.foo", false);
        assert!(result.errors.is_empty());
        assert_eq!(
            result.tokens.lexemes(),
            vec!["1", "2.5", ".5", "3e10", "0xFF", "1", ".", "foo"]
        );
        assert_eq!(result.tokens.get(1).kind, TokenKind::Double);
        assert_eq!(result.tokens.get(4).kind, TokenKind::Integer);
    }

    #[test]
    fn test_missing_exponent_digit() {
        let result = scan(&source(), "1e+;", false);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            result.errors[0].code,
            ErrorCode::Scanner(ScannerErrorCode::MissingDigit)
        );
    }

    #[test]
    fn test_unterminated_string_still_produces_token() {
        let result = scan(&source(), "var s = 'abc\nvar t;", false);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].offset, 8);
        assert!(result.tokens.iter().any(|t| t.lexeme == "'abc"));
        assert!(result.tokens.eof().is_eof());
    }

    #[test]
    fn test_nested_block_comment() {
        let result = scan(&source(), "/* a /* b */ c */ x", false);
        assert!(result.errors.is_empty());
        assert_eq!(result.tokens.lexemes(), vec!["x"]);

        let unterminated = scan(&source(), "x /* never closed", false);
        assert_eq!(
            unterminated.errors[0].code,
            ErrorCode::Scanner(ScannerErrorCode::UnterminatedMultiLineComment)
        );
    }

    #[test]
    fn test_illegal_character() {
        let result = scan(&source(), "a # b", false);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].message, "Illegal character '#'");
        assert_eq!(result.tokens.lexemes(), vec!["a", "b"]);
    }

    #[test]
    fn test_preserved_comments_attach_to_next_token() {
        let result = scan(&source(), "/// Docs\nclass A {}", true);
        let class = result.tokens.get(0);
        assert!(class.is_keyword(Keyword::Class));
        assert_eq!(class.doc_comment(), Some("/// Docs"));

        let dropped = scan(&source(), "/// Docs\nclass A {}", false);
        assert!(dropped.tokens.get(0).preceding_comments.is_empty());
    }

    #[test]
    fn test_string_values() {
        assert_eq!(
            string_value("'a\\'b'"),
            StringValue {
                value: "a'b".to_string(),
                interpolated: false
            }
        );
        assert!(string_value("'$name.dart'").interpolated);
        assert!(string_value("\"${a}\"").interpolated);
        assert!(!string_value("r'$name'").interpolated);
        assert!(!string_value("'cost: $'").interpolated);
        assert_eq!(string_value("'''multi'''").value, "multi");
    }

    #[test]
    fn test_interpolation_block_is_part_of_string() {
        let result = scan(&source(), "var s = '${a}b';", false);
        assert!(result.errors.is_empty());
        assert!(result.tokens.iter().any(|t| t.lexeme == "'${a}b'"));
    }
}
