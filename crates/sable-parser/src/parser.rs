//! Recovering recursive-descent parser
//!
//! The parser always produces a [`CompilationUnit`]. Syntax errors are
//! recorded, missing tokens are treated as virtually inserted, and
//! unrecognised input is skipped up to the next `;`, `}` or declaration.

use sable_core::{
    AnalysisError, AnalysisOptions, ErrorCode, ErrorReporter, LineInfo, ParserErrorCode,
    RecordingErrorListener, Source,
};

use crate::ast::*;
use crate::scanner::{scan, string_value};
use crate::token::{Keyword, Token, TokenKind, TokenStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    pub parse_function_bodies: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            parse_function_bodies: true,
        }
    }
}

impl From<&AnalysisOptions> for ParseOptions {
    fn from(options: &AnalysisOptions) -> Self {
        Self {
            parse_function_bodies: options.analyze_function_bodies,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParseResult {
    pub unit: CompilationUnit,
    pub errors: Vec<AnalysisError>,
    pub has_library_directive: bool,
    pub has_part_of_directive: bool,
}

/// Scan and parse in one step. Scanner errors come first in `errors`.
#[derive(Debug, Clone)]
pub struct ParsedSource {
    pub unit: CompilationUnit,
    pub line_info: LineInfo,
    pub errors: Vec<AnalysisError>,
}

pub fn parse_source(source: &Source, content: &str, options: &AnalysisOptions) -> ParsedSource {
    let scanned = scan(source, content, options.preserve_comments);
    let parsed = Parser::new(source, &scanned.tokens, options.into()).parse_compilation_unit();
    let mut errors = scanned.errors;
    errors.extend(parsed.errors);
    ParsedSource {
        unit: parsed.unit,
        line_info: scanned.line_info,
        errors,
    }
}

pub struct Parser<'a> {
    tokens: &'a TokenStream,
    pos: usize,
    next_id: u32,
    options: ParseOptions,
    source: Source,
    listener: RecordingErrorListener,
}

impl<'a> Parser<'a> {
    pub fn new(source: &Source, tokens: &'a TokenStream, options: ParseOptions) -> Self {
        Self {
            tokens,
            pos: 0,
            next_id: 0,
            options,
            source: source.clone(),
            listener: RecordingErrorListener::new(),
        }
    }

    pub fn parse_compilation_unit(mut self) -> ParseResult {
        let mut directives = Vec::new();
        let mut declarations = Vec::new();
        let mut seen_declaration = false;

        while !self.current().is_eof() {
            let doc_comment = self.current().doc_comment().map(str::to_string);
            self.skip_metadata();
            let before = self.pos;

            if self.at_directive() {
                if seen_declaration {
                    self.error_at_current(ParserErrorCode::DirectiveAfterDeclaration, &[]);
                }
                directives.push(self.parse_directive());
            } else {
                seen_declaration = true;
                if let Some(declaration) = self.parse_declaration(doc_comment) {
                    declarations.push(declaration);
                }
            }

            if self.pos == before {
                self.advance();
            }
        }

        let unit = CompilationUnit {
            directives,
            declarations,
            span: Span::new(0, self.tokens.eof().offset),
            node_count: self.next_id,
        };
        tracing::trace!(
            "Parsed {}: {} directives, {} declarations, {} errors",
            self.source.short_name(),
            unit.directives.len(),
            unit.declarations.len(),
            self.listener.errors().len()
        );
        ParseResult {
            has_library_directive: unit.has_library_directive(),
            has_part_of_directive: unit.has_part_of_directive(),
            unit,
            errors: self.listener.into_errors(),
        }
    }

    // Token access

    fn current(&self) -> &'a Token {
        self.tokens.get(self.pos)
    }

    fn peek(&self, n: usize) -> &'a Token {
        self.tokens.get(self.pos + n)
    }

    fn advance(&mut self) -> &'a Token {
        let token = self.current();
        if !token.is_eof() {
            self.pos += 1;
        }
        token
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current().is(kind)
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        self.current().is_keyword(keyword)
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume `kind` or report it as missing without consuming anything.
    fn expect(&mut self, kind: TokenKind, lexeme: &str) -> bool {
        if self.eat(kind) {
            return true;
        }
        self.error_at_current(ParserErrorCode::ExpectedToken, &[lexeme]);
        false
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> bool {
        if self.eat_keyword(keyword) {
            return true;
        }
        self.error_at_current(ParserErrorCode::ExpectedToken, &[keyword.lexeme()]);
        false
    }

    fn error_at_current(&mut self, code: impl Into<ErrorCode>, arguments: &[&str]) {
        let token = self.current();
        self.error_at(Span::new(token.offset, token.length()), code, arguments);
    }

    fn error_at(&mut self, span: Span, code: impl Into<ErrorCode>, arguments: &[&str]) {
        ErrorReporter::new(&mut self.listener, self.source.clone()).report(
            span.offset,
            span.length,
            code,
            arguments,
        );
    }

    fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn last_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens.get(self.pos - 1).end()
        }
    }

    fn span_from(&self, start: usize) -> Span {
        Span::between(start, self.last_end().max(start))
    }

    /// Number of tokens in a type annotation that is directly followed by a
    /// name, or 0 when the current tokens do not start one.
    fn type_length(&self) -> usize {
        let first = self.peek(0);
        if first.is_keyword(Keyword::Void) {
            return 1;
        }
        if !first.is_identifier() {
            return 0;
        }
        if self.peek(1).is_identifier() {
            return 1;
        }
        if self.peek(1).is(TokenKind::Period)
            && self.peek(2).is_identifier()
            && self.peek(3).is_identifier()
        {
            return 3;
        }
        0
    }

    /// Skip tokens after an unparseable declaration or member.
    fn synchronize(&mut self, in_class_body: bool) {
        let mut depth = 0usize;
        loop {
            let token = self.current();
            match token.kind {
                TokenKind::Eof => return,
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::OpenCurly => depth += 1,
                TokenKind::CloseCurly => {
                    if depth == 0 {
                        if !in_class_body {
                            self.advance();
                        }
                        return;
                    }
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                TokenKind::Keyword(
                    Keyword::Class
                    | Keyword::Abstract
                    | Keyword::Import
                    | Keyword::Export
                    | Keyword::Library
                    | Keyword::Part,
                ) if depth == 0 && !in_class_body => return,
                _ => {}
            }
            self.advance();
        }
    }

    fn skip_metadata(&mut self) {
        while self.eat(TokenKind::At) {
            self.parse_identifier();
            if self.eat(TokenKind::Period) {
                self.parse_identifier();
            }
            if self.at(TokenKind::OpenParen) {
                self.parse_arguments();
            }
        }
    }

    // Directives

    fn at_directive(&self) -> bool {
        let token = self.current();
        token.is_keyword(Keyword::Library)
            || token.is_keyword(Keyword::Import)
            || token.is_keyword(Keyword::Export)
            || token.is_keyword(Keyword::Part)
    }

    fn parse_directive(&mut self) -> Directive {
        let start = self.current().offset;
        let id = self.next_id();
        if self.eat_keyword(Keyword::Library) {
            let name = self.parse_library_name();
            self.expect(TokenKind::Semicolon, ";");
            return Directive::Library(LibraryDirective {
                id,
                span: self.span_from(start),
                name,
            });
        }
        if self.eat_keyword(Keyword::Import) {
            let uri = self.parse_uri();
            let mut deferred = false;
            if self.current().is_identifier_named("deferred")
                && self.peek(1).is_identifier_named("as")
            {
                self.advance();
                deferred = true;
            }
            let prefix = if self.current().is_identifier_named("as") {
                self.advance();
                Some(self.parse_identifier())
            } else {
                None
            };
            let combinators = self.parse_combinators();
            self.expect(TokenKind::Semicolon, ";");
            return Directive::Import(ImportDirective {
                id,
                span: self.span_from(start),
                uri,
                deferred,
                prefix,
                combinators,
            });
        }
        if self.eat_keyword(Keyword::Export) {
            let uri = self.parse_uri();
            let combinators = self.parse_combinators();
            self.expect(TokenKind::Semicolon, ";");
            return Directive::Export(ExportDirective {
                id,
                span: self.span_from(start),
                uri,
                combinators,
            });
        }

        self.expect_keyword(Keyword::Part);
        if self.current().is_identifier_named("of") {
            self.advance();
            let target = if self.at(TokenKind::String) {
                PartOfTarget::Uri(self.parse_uri())
            } else {
                PartOfTarget::Name(self.parse_library_name())
            };
            self.expect(TokenKind::Semicolon, ";");
            return Directive::PartOf(PartOfDirective {
                id,
                span: self.span_from(start),
                target,
            });
        }
        let uri = self.parse_uri();
        self.expect(TokenKind::Semicolon, ";");
        Directive::Part(PartDirective {
            id,
            span: self.span_from(start),
            uri,
        })
    }

    fn parse_library_name(&mut self) -> LibraryName {
        let start = self.current().offset;
        let mut components = vec![self.parse_identifier()];
        while self.at(TokenKind::Period) && self.peek(1).is_identifier() {
            self.advance();
            components.push(self.parse_identifier());
        }
        LibraryName {
            components,
            span: self.span_from(start),
        }
    }

    fn parse_uri(&mut self) -> StringLiteral {
        if self.at(TokenKind::String) {
            return self.parse_string_literal();
        }
        self.error_at_current(ParserErrorCode::ExpectedStringLiteral, &[]);
        let offset = self.current().offset;
        StringLiteral {
            id: self.next_id(),
            value: String::new(),
            lexeme: String::new(),
            interpolated: false,
            span: Span::new(offset, 0),
        }
    }

    fn parse_string_literal(&mut self) -> StringLiteral {
        let token = self.advance();
        let decoded = string_value(&token.lexeme);
        StringLiteral {
            id: self.next_id(),
            value: decoded.value,
            lexeme: token.lexeme.clone(),
            interpolated: decoded.interpolated,
            span: Span::new(token.offset, token.length()),
        }
    }

    fn parse_combinators(&mut self) -> Vec<Combinator> {
        let mut combinators = Vec::new();
        loop {
            let kind = if self.current().is_identifier_named("show") {
                CombinatorKind::Show
            } else if self.current().is_identifier_named("hide") {
                CombinatorKind::Hide
            } else {
                break;
            };
            let start = self.current().offset;
            let id = self.next_id();
            self.advance();
            let mut names = vec![self.parse_identifier()];
            while self.eat(TokenKind::Comma) {
                names.push(self.parse_identifier());
            }
            combinators.push(Combinator {
                id,
                span: self.span_from(start),
                kind,
                names,
            });
        }
        combinators
    }

    // Declarations

    fn parse_declaration(&mut self, doc_comment: Option<String>) -> Option<Declaration> {
        if self.at_keyword(Keyword::Abstract) || self.at_keyword(Keyword::Class) {
            return Some(Declaration::Class(self.parse_class(doc_comment)));
        }
        if self.at_keyword(Keyword::Var)
            || self.at_keyword(Keyword::Final)
            || self.at_keyword(Keyword::Const)
        {
            return Some(Declaration::Variables(self.parse_top_level_variables()));
        }

        let type_length = self.type_length();
        let name = self.peek(type_length);
        if name.is_identifier() && self.peek(type_length + 1).is(TokenKind::OpenParen) {
            return Some(Declaration::Function(self.parse_function(doc_comment)));
        }
        if type_length > 0 && name.is_identifier() {
            return Some(Declaration::Variables(self.parse_top_level_variables()));
        }

        self.error_at_current(ParserErrorCode::ExpectedExecutable, &[]);
        self.synchronize(false);
        None
    }

    fn parse_top_level_variables(&mut self) -> TopLevelVariableDeclaration {
        let start = self.current().offset;
        let id = self.next_id();
        let variables = self.parse_variable_list();
        self.expect(TokenKind::Semicolon, ";");
        TopLevelVariableDeclaration {
            id,
            span: self.span_from(start),
            variables,
        }
    }

    fn parse_function(&mut self, doc_comment: Option<String>) -> FunctionDeclaration {
        let start = self.current().offset;
        let id = self.next_id();
        let return_type = if self.type_length() > 0 {
            Some(self.parse_type_name())
        } else {
            None
        };
        let name = self.parse_identifier();
        let parameters = self.parse_parameters();
        let body = self.parse_function_body(false);
        FunctionDeclaration {
            id,
            span: self.span_from(start),
            doc_comment,
            return_type,
            name,
            parameters,
            body,
        }
    }

    fn parse_class(&mut self, doc_comment: Option<String>) -> ClassDeclaration {
        let start = self.current().offset;
        let id = self.next_id();
        let is_abstract = self.eat_keyword(Keyword::Abstract);
        self.expect_keyword(Keyword::Class);
        let name = self.parse_identifier();

        let superclass = if self.eat_keyword(Keyword::Extends) {
            Some(self.parse_type_name())
        } else {
            None
        };
        let mixins = if self.eat_keyword(Keyword::With) {
            self.parse_type_list()
        } else {
            Vec::new()
        };
        let interfaces = if self.eat_keyword(Keyword::Implements) {
            self.parse_type_list()
        } else {
            Vec::new()
        };

        let mut members = Vec::new();
        if self.expect(TokenKind::OpenCurly, "{") {
            while !self.at(TokenKind::CloseCurly) && !self.current().is_eof() {
                self.skip_metadata();
                let before = self.pos;
                if let Some(member) = self.parse_member(&name.name) {
                    members.push(member);
                }
                if self.pos == before {
                    self.advance();
                }
            }
            self.expect(TokenKind::CloseCurly, "}");
        }

        ClassDeclaration {
            id,
            span: self.span_from(start),
            doc_comment,
            is_abstract,
            name,
            superclass,
            mixins,
            interfaces,
            members,
        }
    }

    fn parse_type_list(&mut self) -> Vec<TypeName> {
        let mut types = vec![self.parse_type_name()];
        while self.eat(TokenKind::Comma) {
            types.push(self.parse_type_name());
        }
        types
    }

    fn at_constructor(&self, class_name: &str, offset: usize) -> bool {
        self.peek(offset).is_identifier_named(class_name)
            && (self.peek(offset + 1).is(TokenKind::OpenParen)
                || (self.peek(offset + 1).is(TokenKind::Period)
                    && self.peek(offset + 2).is_identifier()
                    && self.peek(offset + 3).is(TokenKind::OpenParen)))
    }

    fn parse_member(&mut self, class_name: &str) -> Option<ClassMember> {
        let start = self.current().offset;

        if self.at_keyword(Keyword::Const) && self.at_constructor(class_name, 1) {
            self.advance();
            return Some(ClassMember::Constructor(self.parse_constructor(start, true)));
        }
        if self.at_constructor(class_name, 0) {
            return Some(ClassMember::Constructor(self.parse_constructor(start, false)));
        }

        let is_static = self.eat_keyword(Keyword::Static);
        if self.at_keyword(Keyword::Var)
            || self.at_keyword(Keyword::Final)
            || self.at_keyword(Keyword::Const)
        {
            return Some(ClassMember::Field(self.parse_field(start, is_static)));
        }

        let type_length = self.type_length();
        let name = self.peek(type_length);
        if name.is_identifier() && self.peek(type_length + 1).is(TokenKind::OpenParen) {
            let id = self.next_id();
            let return_type = if type_length > 0 {
                Some(self.parse_type_name())
            } else {
                None
            };
            let name = self.parse_identifier();
            let parameters = self.parse_parameters();
            let body = self.parse_function_body(true);
            return Some(ClassMember::Method(MethodDeclaration {
                id,
                span: self.span_from(start),
                is_static,
                return_type,
                name,
                parameters,
                body,
            }));
        }
        if type_length > 0 && name.is_identifier() {
            return Some(ClassMember::Field(self.parse_field(start, is_static)));
        }

        self.error_at_current(ParserErrorCode::ExpectedExecutable, &[]);
        self.synchronize(true);
        None
    }

    fn parse_field(&mut self, start: usize, is_static: bool) -> FieldDeclaration {
        let id = self.next_id();
        let variables = self.parse_variable_list();
        self.expect(TokenKind::Semicolon, ";");
        FieldDeclaration {
            id,
            span: self.span_from(start),
            is_static,
            variables,
        }
    }

    fn parse_constructor(&mut self, start: usize, is_const: bool) -> ConstructorDeclaration {
        let id = self.next_id();
        let return_type = self.parse_identifier();
        let name = if self.eat(TokenKind::Period) {
            Some(self.parse_identifier())
        } else {
            None
        };
        let parameters = self.parse_parameters();
        if self.at(TokenKind::Colon) {
            self.skip_initializers();
        }
        let body = self.parse_function_body(true);
        ConstructorDeclaration {
            id,
            span: self.span_from(start),
            is_const,
            return_type,
            name,
            parameters,
            body,
        }
    }

    /// Initializer lists are not modelled; skip to the body.
    fn skip_initializers(&mut self) {
        let mut depth = 0usize;
        loop {
            let token = self.current();
            match token.kind {
                TokenKind::Eof => return,
                TokenKind::OpenParen => depth += 1,
                TokenKind::CloseParen => depth = depth.saturating_sub(1),
                TokenKind::OpenCurly | TokenKind::Semicolon | TokenKind::FatArrow
                    if depth == 0 =>
                {
                    return
                }
                _ => {}
            }
            self.advance();
        }
    }

    fn parse_variable_list(&mut self) -> VariableList {
        let keyword = if self.eat_keyword(Keyword::Var) {
            VariableKeyword::Var
        } else if self.eat_keyword(Keyword::Final) {
            VariableKeyword::Final
        } else if self.eat_keyword(Keyword::Const) {
            VariableKeyword::Const
        } else {
            VariableKeyword::None
        };
        let type_name = if self.type_length() > 0 {
            Some(self.parse_type_name())
        } else {
            None
        };

        let mut variables = Vec::new();
        loop {
            let start = self.current().offset;
            let id = self.next_id();
            let name = self.parse_identifier();
            let initializer = if self.eat(TokenKind::Eq) {
                Some(self.parse_expression())
            } else {
                None
            };
            variables.push(VariableDeclaration {
                id,
                span: self.span_from(start),
                name,
                initializer,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        VariableList {
            keyword,
            type_name,
            variables,
        }
    }

    fn parse_parameters(&mut self) -> Vec<FormalParameter> {
        let mut parameters = Vec::new();
        if !self.expect(TokenKind::OpenParen, "(") {
            return parameters;
        }
        while !self.at(TokenKind::CloseParen) && !self.current().is_eof() {
            if self.eat(TokenKind::OpenSquare) {
                loop {
                    if self.at(TokenKind::CloseSquare) {
                        break;
                    }
                    parameters.push(self.parse_formal_parameter(ParameterKind::Positional));
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::CloseSquare, "]");
                break;
            }
            parameters.push(self.parse_formal_parameter(ParameterKind::Required));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseParen, ")");
        parameters
    }

    fn parse_formal_parameter(&mut self, kind: ParameterKind) -> FormalParameter {
        let start = self.current().offset;
        let id = self.next_id();
        let _ = self.eat_keyword(Keyword::Final) || self.eat_keyword(Keyword::Var);

        let mut type_name = None;
        let mut is_field_formal = false;
        if self.at_keyword(Keyword::This) && self.peek(1).is(TokenKind::Period) {
            self.advance();
            self.advance();
            is_field_formal = true;
        } else if self.type_length() > 0 {
            type_name = Some(self.parse_type_name());
        }
        let name = self.parse_identifier();
        let default_value = if kind == ParameterKind::Positional && self.eat(TokenKind::Eq) {
            Some(self.parse_expression())
        } else {
            None
        };
        FormalParameter {
            id,
            span: self.span_from(start),
            kind,
            type_name,
            name,
            is_field_formal,
            default_value,
        }
    }

    fn parse_function_body(&mut self, allow_empty: bool) -> FunctionBody {
        let start = self.current().offset;
        if self.at(TokenKind::OpenCurly) {
            if !self.options.parse_function_bodies {
                self.skip_block();
                return FunctionBody::Skipped(self.span_from(start));
            }
            return FunctionBody::Block(self.parse_block());
        }
        if self.at(TokenKind::FatArrow) {
            if !self.options.parse_function_bodies {
                self.skip_expression_body();
                return FunctionBody::Skipped(self.span_from(start));
            }
            let id = self.next_id();
            self.advance();
            let expression = self.parse_expression();
            self.expect(TokenKind::Semicolon, ";");
            return FunctionBody::Expression {
                id,
                span: self.span_from(start),
                expression,
            };
        }
        if self.at(TokenKind::Semicolon) {
            let span = Span::new(start, 1);
            self.advance();
            if !allow_empty {
                self.error_at(span, ParserErrorCode::MissingFunctionBody, &[]);
            }
            return FunctionBody::Empty(span);
        }
        self.error_at_current(ParserErrorCode::MissingFunctionBody, &[]);
        FunctionBody::Empty(Span::new(start, 0))
    }

    fn skip_block(&mut self) {
        let mut depth = 0usize;
        loop {
            let token = self.advance();
            match token.kind {
                TokenKind::OpenCurly => depth += 1,
                TokenKind::CloseCurly => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                TokenKind::Eof => {
                    self.error_at_current(ParserErrorCode::ExpectedToken, &["}"]);
                    return;
                }
                _ => {}
            }
        }
    }

    fn skip_expression_body(&mut self) {
        let mut depth = 0usize;
        loop {
            let token = self.current();
            match token.kind {
                TokenKind::Eof => {
                    self.error_at_current(ParserErrorCode::ExpectedToken, &[";"]);
                    return;
                }
                TokenKind::OpenParen | TokenKind::OpenCurly | TokenKind::OpenSquare => depth += 1,
                TokenKind::CloseParen | TokenKind::CloseCurly | TokenKind::CloseSquare => {
                    depth = depth.saturating_sub(1)
                }
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                _ => {}
            }
            self.advance();
        }
    }

    fn parse_type_name(&mut self) -> TypeName {
        let start = self.current().offset;
        let id = self.next_id();
        if self.at_keyword(Keyword::Void) {
            let token = self.advance();
            let name = Identifier {
                id: self.next_id(),
                name: "void".to_string(),
                span: Span::new(token.offset, token.length()),
            };
            return TypeName {
                id,
                span: name.span,
                prefix: None,
                name,
            };
        }
        let first = self.parse_identifier();
        if self.at(TokenKind::Period) && self.peek(1).is_identifier() {
            self.advance();
            let name = self.parse_identifier();
            return TypeName {
                id,
                span: self.span_from(start),
                prefix: Some(first),
                name,
            };
        }
        TypeName {
            id,
            span: self.span_from(start),
            prefix: None,
            name: first,
        }
    }

    fn parse_identifier(&mut self) -> Identifier {
        let token = self.current();
        if token.is_identifier() {
            self.advance();
            return Identifier {
                id: self.next_id(),
                name: token.lexeme.clone(),
                span: Span::new(token.offset, token.length()),
            };
        }
        self.error_at_current(ParserErrorCode::MissingIdentifier, &[]);
        self.synthetic_identifier()
    }

    fn synthetic_identifier(&mut self) -> Identifier {
        Identifier {
            id: self.next_id(),
            name: String::new(),
            span: Span::new(self.current().offset, 0),
        }
    }

    // Statements

    fn parse_block(&mut self) -> Block {
        let start = self.current().offset;
        let id = self.next_id();
        let mut statements = Vec::new();
        self.expect(TokenKind::OpenCurly, "{");
        while !self.at(TokenKind::CloseCurly) && !self.current().is_eof() {
            let before = self.pos;
            let statement = self.parse_statement();
            if self.pos == before {
                self.advance();
            } else {
                statements.push(statement);
            }
        }
        self.expect(TokenKind::CloseCurly, "}");
        Block {
            id,
            span: self.span_from(start),
            statements,
        }
    }

    fn parse_statement(&mut self) -> Statement {
        let start = self.current().offset;
        if self.at(TokenKind::OpenCurly) {
            return Statement::Block(self.parse_block());
        }
        let id = self.next_id();

        if self.at_keyword(Keyword::Var)
            || self.at_keyword(Keyword::Final)
            || self.at_keyword(Keyword::Const)
            || (self.type_length() > 0 && !self.at_keyword(Keyword::Void))
        {
            let variables = self.parse_variable_list();
            self.expect(TokenKind::Semicolon, ";");
            return Statement::Variables {
                id,
                span: self.span_from(start),
                variables,
            };
        }
        if self.eat_keyword(Keyword::Return) {
            let expression = if self.at(TokenKind::Semicolon) {
                None
            } else {
                Some(self.parse_expression())
            };
            self.expect(TokenKind::Semicolon, ";");
            return Statement::Return {
                id,
                span: self.span_from(start),
                expression,
            };
        }
        if self.eat_keyword(Keyword::If) {
            self.expect(TokenKind::OpenParen, "(");
            let condition = self.parse_expression();
            self.expect(TokenKind::CloseParen, ")");
            let then_branch = Box::new(self.parse_statement());
            let else_branch = if self.eat_keyword(Keyword::Else) {
                Some(Box::new(self.parse_statement()))
            } else {
                None
            };
            return Statement::If {
                id,
                span: self.span_from(start),
                condition,
                then_branch,
                else_branch,
            };
        }
        if self.eat_keyword(Keyword::While) {
            self.expect(TokenKind::OpenParen, "(");
            let condition = self.parse_expression();
            self.expect(TokenKind::CloseParen, ")");
            let body = Box::new(self.parse_statement());
            return Statement::While {
                id,
                span: self.span_from(start),
                condition,
                body,
            };
        }
        if self.eat(TokenKind::Semicolon) {
            return Statement::Empty {
                id,
                span: self.span_from(start),
            };
        }

        let expression = self.parse_expression();
        self.expect(TokenKind::Semicolon, ";");
        Statement::Expression {
            id,
            span: self.span_from(start),
            expression,
        }
    }

    // Expressions

    pub(crate) fn parse_expression(&mut self) -> Expression {
        let start = self.current().offset;
        let target = self.parse_binary(0);
        if !self.at(TokenKind::Eq) {
            return target;
        }
        self.advance();
        if !matches!(
            target.unparenthesized(),
            Expression::Identifier(_) | Expression::PropertyAccess { .. }
        ) {
            self.error_at(target.span(), ParserErrorCode::MissingAssignableSelector, &[]);
        }
        let id = self.next_id();
        let value = self.parse_expression();
        Expression::Assignment {
            id,
            span: self.span_from(start),
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    fn binary_operator(&self, level: usize) -> Option<BinaryOperator> {
        let operator = match self.current().kind {
            TokenKind::BarBar => BinaryOperator::Or,
            TokenKind::AmpAmp => BinaryOperator::And,
            TokenKind::EqEq => BinaryOperator::Equal,
            TokenKind::BangEq => BinaryOperator::NotEqual,
            TokenKind::Lt => BinaryOperator::Less,
            TokenKind::Gt => BinaryOperator::Greater,
            TokenKind::LtEq => BinaryOperator::LessEqual,
            TokenKind::GtEq => BinaryOperator::GreaterEqual,
            TokenKind::Plus => BinaryOperator::Add,
            TokenKind::Minus => BinaryOperator::Subtract,
            TokenKind::Star => BinaryOperator::Multiply,
            TokenKind::Slash => BinaryOperator::Divide,
            TokenKind::Percent => BinaryOperator::Modulo,
            TokenKind::TildeSlash => BinaryOperator::IntegerDivide,
            _ => return None,
        };
        (precedence(operator) == level).then_some(operator)
    }

    /// Left-associative binary operators, lowest precedence level first.
    fn parse_binary(&mut self, level: usize) -> Expression {
        if level > MAX_PRECEDENCE {
            return self.parse_unary();
        }
        let mut left = self.parse_binary(level + 1);
        while let Some(operator) = self.binary_operator(level) {
            self.advance();
            let right = self.parse_binary(level + 1);
            let span = Span::between(left.span().offset, right.span().end());
            left = Expression::Binary {
                id: self.next_id(),
                span,
                operator,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        left
    }

    fn parse_unary(&mut self) -> Expression {
        let start = self.current().offset;
        let operator = if self.at(TokenKind::Bang) {
            UnaryOperator::Not
        } else if self.at(TokenKind::Minus) {
            UnaryOperator::Negate
        } else {
            return self.parse_postfix();
        };
        self.advance();
        let operand = self.parse_unary();
        Expression::Unary {
            id: self.next_id(),
            span: self.span_from(start),
            operator,
            operand: Box::new(operand),
        }
    }

    fn parse_postfix(&mut self) -> Expression {
        let start = self.current().offset;
        let mut expression = self.parse_primary();
        while self.eat(TokenKind::Period) {
            let name = self.parse_identifier();
            if self.at(TokenKind::OpenParen) {
                let arguments = self.parse_arguments();
                expression = Expression::Invocation {
                    id: self.next_id(),
                    span: self.span_from(start),
                    target: Some(Box::new(expression)),
                    name,
                    arguments,
                };
            } else {
                expression = Expression::PropertyAccess {
                    id: self.next_id(),
                    span: self.span_from(start),
                    target: Box::new(expression),
                    name,
                };
            }
        }
        expression
    }

    fn parse_primary(&mut self) -> Expression {
        let token = self.current();
        let span = Span::new(token.offset, token.length());
        match token.kind {
            TokenKind::Integer => {
                self.advance();
                Expression::Integer {
                    id: self.next_id(),
                    span,
                    value: parse_integer(&token.lexeme),
                }
            }
            TokenKind::Double => {
                self.advance();
                Expression::Double {
                    id: self.next_id(),
                    span,
                    value: token.lexeme.parse().unwrap_or(0.0),
                }
            }
            TokenKind::String => Expression::String(self.parse_string_literal()),
            TokenKind::Keyword(Keyword::True) | TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Expression::Boolean {
                    id: self.next_id(),
                    span,
                    value: token.is_keyword(Keyword::True),
                }
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Expression::Null {
                    id: self.next_id(),
                    span,
                }
            }
            TokenKind::Keyword(Keyword::This) => {
                self.advance();
                Expression::This {
                    id: self.next_id(),
                    span,
                }
            }
            TokenKind::Keyword(Keyword::Super) => {
                self.advance();
                Expression::Super {
                    id: self.next_id(),
                    span,
                }
            }
            TokenKind::Keyword(Keyword::New) | TokenKind::Keyword(Keyword::Const) => {
                self.parse_instance_creation()
            }
            TokenKind::Identifier => {
                let name = self.parse_identifier();
                if self.at(TokenKind::OpenParen) {
                    let arguments = self.parse_arguments();
                    return Expression::Invocation {
                        id: self.next_id(),
                        span: self.span_from(span.offset),
                        target: None,
                        name,
                        arguments,
                    };
                }
                Expression::Identifier(name)
            }
            TokenKind::OpenParen => {
                self.advance();
                let expression = self.parse_expression();
                self.expect(TokenKind::CloseParen, ")");
                Expression::Parenthesized {
                    id: self.next_id(),
                    span: self.span_from(span.offset),
                    expression: Box::new(expression),
                }
            }
            _ => {
                self.error_at_current(ParserErrorCode::MissingExpression, &[]);
                Expression::Identifier(self.synthetic_identifier())
            }
        }
    }

    /// `new T(..)`, `new T.named(..)`, `new p.T(..)` or the `const` forms.
    /// `T.named` and `p.T` are indistinguishable here; the resolver decides.
    fn parse_instance_creation(&mut self) -> Expression {
        let start = self.current().offset;
        let is_const = self.at_keyword(Keyword::Const);
        self.advance();
        let type_name = self.parse_type_name();
        let constructor_name = if self.eat(TokenKind::Period) {
            Some(self.parse_identifier())
        } else {
            None
        };
        let arguments = self.parse_arguments();
        Expression::InstanceCreation {
            id: self.next_id(),
            span: self.span_from(start),
            is_const,
            type_name,
            constructor_name,
            arguments,
        }
    }

    fn parse_arguments(&mut self) -> ArgumentList {
        let start = self.current().offset;
        let mut arguments = Vec::new();
        if self.expect(TokenKind::OpenParen, "(") {
            while !self.at(TokenKind::CloseParen) && !self.current().is_eof() {
                let before = self.pos;
                arguments.push(self.parse_expression());
                if self.pos == before || !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::CloseParen, ")");
        }
        ArgumentList {
            span: self.span_from(start),
            arguments,
        }
    }
}

const MAX_PRECEDENCE: usize = 5;

fn precedence(operator: BinaryOperator) -> usize {
    match operator {
        BinaryOperator::Or => 0,
        BinaryOperator::And => 1,
        BinaryOperator::Equal | BinaryOperator::NotEqual => 2,
        BinaryOperator::Less
        | BinaryOperator::Greater
        | BinaryOperator::LessEqual
        | BinaryOperator::GreaterEqual => 3,
        BinaryOperator::Add | BinaryOperator::Subtract => 4,
        BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Modulo
        | BinaryOperator::IntegerDivide => 5,
    }
}

fn parse_integer(lexeme: &str) -> i64 {
    let parsed = match lexeme
        .strip_prefix("0x")
        .or_else(|| lexeme.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => lexeme.parse(),
    };
    parsed.unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> ParsedSource {
        parse_source(
            &Source::new("file:///test.dart"),
            text,
            &AnalysisOptions::default(),
        )
    }

    fn codes(parsed: &ParsedSource) -> Vec<&'static str> {
        parsed.errors.iter().map(|e| e.code.name()).collect()
    }

    #[test]
    fn test_directives() {
        let parsed = parse(indoc! {r#"
            library a.b;
            import 'dart:math' as math show max, min hide sqrt;
            import 'lazy.dart' deferred as lazy;
            export 'src/c.dart' hide Internal;
            part 'part.dart';
        "#});
        assert_eq!(codes(&parsed), Vec::<&str>::new());
        let unit = &parsed.unit;
        assert_eq!(unit.library_directive().unwrap().name.to_string(), "a.b");

        let imports: Vec<_> = unit.imports().collect();
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].uri.value, "dart:math");
        assert_eq!(imports[0].prefix.as_ref().unwrap().name, "math");
        assert_eq!(imports[0].combinators.len(), 2);
        assert_eq!(imports[0].combinators[0].kind, CombinatorKind::Show);
        assert_eq!(imports[0].combinators[0].names.len(), 2);
        assert!(imports[1].deferred);
        assert_eq!(unit.exports().count(), 1);
        assert_eq!(unit.parts().next().unwrap().uri.value, "part.dart");
    }

    #[test]
    fn test_part_of_forms() {
        let by_name = parse("part of a.b;");
        assert!(matches!(
            by_name.unit.part_of_directive().unwrap().target,
            PartOfTarget::Name(_)
        ));
        let by_uri = parse("part of 'a.dart';");
        assert!(matches!(
            by_uri.unit.part_of_directive().unwrap().target,
            PartOfTarget::Uri(_)
        ));
        assert!(by_uri.unit.has_part_of_directive());
        assert!(!by_uri.unit.has_library_directive());
    }

    #[test]
    fn test_class_with_members() {
        let parsed = parse(indoc! {"
            abstract class Shape extends Base with Mixin implements A, p.B {
              static final int count = 0;
              String name;
              Shape(this.name);
              Shape.unit() {}
              num area();
              void describe([String prefix = 'shape']) => print(prefix);
            }
        "});
        assert_eq!(codes(&parsed), Vec::<&str>::new());
        let class = parsed.unit.classes().next().unwrap();
        assert!(class.is_abstract);
        assert_eq!(class.superclass.as_ref().unwrap().to_string(), "Base");
        assert_eq!(class.mixins.len(), 1);
        assert_eq!(class.interfaces[1].to_string(), "p.B");
        assert_eq!(class.members.len(), 6);

        match &class.members[2] {
            ClassMember::Constructor(constructor) => {
                assert!(constructor.parameters[0].is_field_formal);
                assert!(constructor.name.is_none());
            }
            other => panic!("expected constructor, got {:?}", other),
        }
        match &class.members[4] {
            ClassMember::Method(method) => assert!(method.is_abstract()),
            other => panic!("expected method, got {:?}", other),
        }
        match &class.members[5] {
            ClassMember::Method(method) => {
                assert_eq!(method.parameters[0].kind, ParameterKind::Positional);
                assert!(method.parameters[0].default_value.is_some());
            }
            other => panic!("expected method, got {:?}", other),
        }
    }

    #[test]
    fn test_statements_and_precedence() {
        let parsed = parse(indoc! {"
            int f(int x) {
              var y = 1 + x * 2;
              if (y > 3 && x != 0) {
                return y;
              } else return -x;
              while (false) y = y ~/ 2;
            }
        "});
        assert_eq!(codes(&parsed), Vec::<&str>::new());
        let function = match &parsed.unit.declarations[0] {
            Declaration::Function(function) => function,
            other => panic!("expected function, got {:?}", other),
        };
        let block = match &function.body {
            FunctionBody::Block(block) => block,
            other => panic!("expected block, got {:?}", other),
        };
        assert_eq!(block.statements.len(), 3);
        match &block.statements[0] {
            Statement::Variables { variables, .. } => match &variables.variables[0].initializer {
                Some(Expression::Binary {
                    operator, right, ..
                }) => {
                    assert_eq!(*operator, BinaryOperator::Add);
                    assert!(matches!(
                        **right,
                        Expression::Binary {
                            operator: BinaryOperator::Multiply,
                            ..
                        }
                    ));
                }
                other => panic!("unexpected initializer {:?}", other),
            },
            other => panic!("expected variables, got {:?}", other),
        }
    }

    #[test]
    fn test_node_ids_are_unique() {
        let parsed = parse("class A { int m(int a) => a + 1; } var x = new A().m(2);");
        let mut ids = Vec::new();
        fn collect(expression: &Expression, ids: &mut Vec<NodeId>) {
            ids.push(expression.id());
            match expression {
                Expression::Invocation { target, .. } => {
                    if let Some(target) = target {
                        collect(target, ids);
                    }
                }
                Expression::Binary { left, right, .. } => {
                    collect(left, ids);
                    collect(right, ids);
                }
                _ => {}
            }
        }
        for declaration in &parsed.unit.declarations {
            if let Declaration::Variables(variables) = declaration {
                for variable in &variables.variables.variables {
                    collect(variable.initializer.as_ref().unwrap(), &mut ids);
                }
            }
        }
        let count = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), count);
        assert!(ids.iter().all(|id| id.0 < parsed.unit.node_count));
    }

    #[test]
    fn test_recovery_keeps_later_declarations() {
        let parsed = parse("class A { int x = ; } ) class B {} void main() { f( }");
        assert!(!parsed.errors.is_empty());
        let names: Vec<_> = parsed
            .unit
            .classes()
            .map(|class| class.name.name.clone())
            .collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(parsed.unit.declarations.len(), 3);
    }

    #[test]
    fn test_directive_after_declaration() {
        let parsed = parse("class A {}\nimport 'b.dart';");
        assert_eq!(codes(&parsed), vec!["DIRECTIVE_AFTER_DECLARATION"]);
        assert_eq!(parsed.unit.imports().count(), 1);
    }

    #[test]
    fn test_missing_function_body() {
        let parsed = parse("void f();");
        assert_eq!(codes(&parsed), vec!["MISSING_FUNCTION_BODY"]);
    }

    #[test]
    fn test_invalid_assignment_target() {
        let parsed = parse("void f() { 1 = 2; }");
        assert_eq!(codes(&parsed), vec!["MISSING_ASSIGNABLE_SELECTOR"]);
    }

    #[test]
    fn test_skipped_bodies() {
        let options = AnalysisOptions {
            analyze_function_bodies: false,
            ..AnalysisOptions::default()
        };
        let parsed = parse_source(
            &Source::new("file:///test.dart"),
            "int f() { if (true) { return 1; } return 2; } int g() => 3; class C { m() {} }",
            &options,
        );
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.unit.declarations.len(), 3);
        for declaration in &parsed.unit.declarations {
            if let Declaration::Function(function) = declaration {
                assert!(matches!(function.body, FunctionBody::Skipped(_)));
            }
        }
    }

    #[test]
    fn test_instance_creation_and_prefixed_calls() {
        let parsed = parse(
            "var a = new p.Thing.named(1); var b = const Point(); var c = math.max(1, 2);",
        );
        assert!(parsed.errors.is_empty());
        let initializers: Vec<&Expression> = parsed
            .unit
            .declarations
            .iter()
            .filter_map(|declaration| match declaration {
                Declaration::Variables(v) => v.variables.variables[0].initializer.as_ref(),
                _ => None,
            })
            .collect();
        match initializers[0] {
            Expression::InstanceCreation {
                type_name,
                constructor_name,
                is_const,
                ..
            } => {
                assert_eq!(type_name.to_string(), "p.Thing");
                assert_eq!(constructor_name.as_ref().unwrap().name, "named");
                assert!(!is_const);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            initializers[1],
            Expression::InstanceCreation { is_const: true, .. }
        ));
        assert!(matches!(
            initializers[2],
            Expression::Invocation {
                target: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn test_doc_comments_when_preserved() {
        let options = AnalysisOptions {
            preserve_comments: true,
            ..AnalysisOptions::default()
        };
        let parsed = parse_source(
            &Source::new("file:///test.dart"),
            "/// A widget.\nclass Widget {}",
            &options,
        );
        let class = parsed.unit.classes().next().unwrap();
        assert_eq!(class.doc_comment.as_deref(), Some("/// A widget."));
    }
}
