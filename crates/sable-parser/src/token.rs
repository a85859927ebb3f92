//! Tokens produced by the scanner

use std::fmt;

macro_rules! keywords {
    ($($variant:ident => $lexeme:literal),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Keyword {
            $($variant),*
        }

        impl Keyword {
            pub fn lexeme(&self) -> &'static str {
                match self {
                    $(Keyword::$variant => $lexeme),*
                }
            }

            pub fn from_lexeme(lexeme: &str) -> Option<Keyword> {
                match lexeme {
                    $($lexeme => Some(Keyword::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

// `show`, `hide`, `as`, `of` and `deferred` are contextual and scan as
// identifiers.
keywords! {
    Abstract => "abstract",
    Class => "class",
    Const => "const",
    Else => "else",
    Export => "export",
    Extends => "extends",
    False => "false",
    Final => "final",
    If => "if",
    Implements => "implements",
    Import => "import",
    Library => "library",
    New => "new",
    Null => "null",
    Part => "part",
    Return => "return",
    Static => "static",
    Super => "super",
    This => "this",
    True => "true",
    Var => "var",
    Void => "void",
    While => "while",
    With => "with",
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    Keyword(Keyword),
    Integer,
    Double,
    String,
    Comment,
    OpenParen,
    CloseParen,
    OpenCurly,
    CloseCurly,
    OpenSquare,
    CloseSquare,
    Semicolon,
    Comma,
    Period,
    Colon,
    Question,
    At,
    Eq,
    EqEq,
    BangEq,
    Bang,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    TildeSlash,
    AmpAmp,
    BarBar,
    FatArrow,
    Eof,
}

/// Operator and punctuation lexemes, longest first so the scanner can take
/// the first match.
pub(crate) const PUNCTUATION: &[(&str, TokenKind)] = &[
    ("~/", TokenKind::TildeSlash),
    ("==", TokenKind::EqEq),
    ("!=", TokenKind::BangEq),
    ("<=", TokenKind::LtEq),
    (">=", TokenKind::GtEq),
    ("&&", TokenKind::AmpAmp),
    ("||", TokenKind::BarBar),
    ("=>", TokenKind::FatArrow),
    ("(", TokenKind::OpenParen),
    (")", TokenKind::CloseParen),
    ("{", TokenKind::OpenCurly),
    ("}", TokenKind::CloseCurly),
    ("[", TokenKind::OpenSquare),
    ("]", TokenKind::CloseSquare),
    (";", TokenKind::Semicolon),
    (",", TokenKind::Comma),
    (".", TokenKind::Period),
    (":", TokenKind::Colon),
    ("?", TokenKind::Question),
    ("@", TokenKind::At),
    ("=", TokenKind::Eq),
    ("!", TokenKind::Bang),
    ("<", TokenKind::Lt),
    (">", TokenKind::Gt),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Star),
    ("/", TokenKind::Slash),
    ("%", TokenKind::Percent),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
    pub lexeme: String,
    /// Comments between the previous token and this one, kept only when
    /// comments are preserved
    pub preceding_comments: Vec<Token>,
}

impl Token {
    pub fn new(kind: TokenKind, offset: usize, lexeme: impl Into<String>) -> Self {
        Self {
            kind,
            offset,
            lexeme: lexeme.into(),
            preceding_comments: Vec::new(),
        }
    }

    pub fn length(&self) -> usize {
        self.lexeme.len()
    }

    pub fn end(&self) -> usize {
        self.offset + self.lexeme.len()
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }

    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Identifier
    }

    /// Identifier with the given text, for contextual keywords such as `show`
    pub fn is_identifier_named(&self, name: &str) -> bool {
        self.kind == TokenKind::Identifier && self.lexeme == name
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// Documentation comment immediately preceding this token, if any.
    pub fn doc_comment(&self) -> Option<&str> {
        self.preceding_comments
            .iter()
            .rev()
            .map(|comment| comment.lexeme.as_str())
            .find(|text| text.starts_with("///") || text.starts_with("/**"))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_eof() {
            write!(f, "<EOF>")
        } else {
            f.write_str(&self.lexeme)
        }
    }
}

/// The scanner's output: a token sequence that always ends with EOF
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    pub fn new(mut tokens: Vec<Token>, end_offset: usize) -> Self {
        if !tokens.last().map_or(false, Token::is_eof) {
            tokens.push(Token::new(TokenKind::Eof, end_offset, ""));
        }
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        // EOF only
        self.tokens.len() <= 1
    }

    /// Token at `index`, or the EOF token past the end.
    pub fn get(&self, index: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[index.min(last)]
    }

    pub fn eof(&self) -> &Token {
        &self.tokens[self.tokens.len() - 1]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter()
    }

    pub fn lexemes(&self) -> Vec<&str> {
        self.tokens
            .iter()
            .filter(|token| !token.is_eof())
            .map(|token| token.lexeme.as_str())
            .collect()
    }
}
