//! Diagnostics produced by analysis
//!
//! Every diagnostic is an immutable [`AnalysisError`] carrying an
//! [`ErrorCode`]. Codes are grouped by the stage that reports them; each code
//! has a stable UPPER_SNAKE name and a message template with `{0}`-style
//! placeholders.

use std::collections::HashMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::source::Source;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "info"),
            ErrorSeverity::Warning => write!(f, "warning"),
            ErrorSeverity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    SyntacticError,
    CompileTimeError,
    StaticWarning,
    StaticTypeWarning,
    Hint,
}

impl ErrorType {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ErrorType::SyntacticError | ErrorType::CompileTimeError => ErrorSeverity::Error,
            ErrorType::StaticWarning | ErrorType::StaticTypeWarning => ErrorSeverity::Warning,
            ErrorType::Hint => ErrorSeverity::Info,
        }
    }
}

macro_rules! error_codes {
    (
        $(#[$meta:meta])* $name:ident {
            $($variant:ident => ($code:literal, $message:literal)),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),*
        }

        impl $name {
            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $code),*
                }
            }

            pub fn message_template(&self) -> &'static str {
                match self {
                    $($name::$variant => $message),*
                }
            }
        }
    };
}

error_codes! {
    /// Lexical errors from the scanner
    ScannerErrorCode {
        UnterminatedStringLiteral => ("UNTERMINATED_STRING_LITERAL", "Unterminated string literal"),
        UnterminatedMultiLineComment => (
            "UNTERMINATED_MULTI_LINE_COMMENT",
            "Unterminated multi-line comment"
        ),
        IllegalCharacter => ("ILLEGAL_CHARACTER", "Illegal character '{0}'"),
        MissingDigit => ("MISSING_DIGIT", "Decimal digit expected"),
    }
}

error_codes! {
    ParserErrorCode {
        ExpectedToken => ("EXPECTED_TOKEN", "Expected to find '{0}'"),
        MissingIdentifier => ("MISSING_IDENTIFIER", "Expected an identifier"),
        MissingExpression => ("MISSING_EXPRESSION", "Expected an expression"),
        ExpectedExecutable => (
            "EXPECTED_EXECUTABLE",
            "Expected a method, getter, setter or operator declaration"
        ),
        ExpectedStringLiteral => ("EXPECTED_STRING_LITERAL", "Expected a string literal"),
        MissingFunctionBody => ("MISSING_FUNCTION_BODY", "A function body must be provided"),
        DirectiveAfterDeclaration => (
            "DIRECTIVE_AFTER_DECLARATION",
            "Directives must appear before any declarations"
        ),
        UnexpectedToken => ("UNEXPECTED_TOKEN", "Unexpected token '{0}'"),
        MissingAssignableSelector => (
            "MISSING_ASSIGNABLE_SELECTOR",
            "Missing selector such as \".<identifier>\""
        ),
    }
}

error_codes! {
    CompileTimeErrorCode {
        ImportOfNonLibrary => (
            "IMPORT_OF_NON_LIBRARY",
            "The imported library '{0}' must not have a part-of directive"
        ),
        ExportOfNonLibrary => (
            "EXPORT_OF_NON_LIBRARY",
            "The exported library '{0}' must not have a part-of directive"
        ),
        UriDoesNotExist => ("URI_DOES_NOT_EXIST", "Target of URI does not exist: '{0}'"),
        InvalidUri => ("INVALID_URI", "Invalid URI syntax: '{0}'"),
        UriWithInterpolation => ("URI_WITH_INTERPOLATION", "URIs cannot use string interpolation"),
        PartOfNonPart => (
            "PART_OF_NON_PART",
            "The included part '{0}' must have a part-of directive"
        ),
        DuplicateDefinition => ("DUPLICATE_DEFINITION", "The name '{0}' is already defined"),
        ExtendsNonClass => ("EXTENDS_NON_CLASS", "Classes can only extend other classes"),
        ImplementsNonClass => ("IMPLEMENTS_NON_CLASS", "Classes can only implement other classes"),
        MixinOfNonClass => ("MIXIN_OF_NON_CLASS", "Classes can only mixin other classes"),
        RecursiveInterfaceInheritance => (
            "RECURSIVE_INTERFACE_INHERITANCE",
            "'{0}' cannot be a superinterface of itself: {1}"
        ),
        ConstInitializedWithNonConstantValue => (
            "CONST_INITIALIZED_WITH_NON_CONSTANT_VALUE",
            "Const variables must be initialized with a constant value"
        ),
        ConstEvalThrowsException => (
            "CONST_EVAL_THROWS_EXCEPTION",
            "Evaluation of this constant expression causes exception"
        ),
        ConstEvalTypeNum => (
            "CONST_EVAL_TYPE_NUM",
            "In constant expressions, operand(s) of this operator must be of type 'num'"
        ),
        RecursiveCompileTimeConstant => (
            "RECURSIVE_COMPILE_TIME_CONSTANT",
            "Compile-time constant expression depends on itself"
        ),
    }
}

error_codes! {
    StaticWarningCode {
        ImportOfNonLibrary => (
            "IMPORT_OF_NON_LIBRARY",
            "The imported library '{0}' must not have a part-of directive"
        ),
        PartOfDifferentLibrary => (
            "PART_OF_DIFFERENT_LIBRARY",
            "Expected this library to be part of '{0}', not '{1}'"
        ),
        UndefinedClass => ("UNDEFINED_CLASS", "Undefined class '{0}'"),
        UndefinedIdentifier => ("UNDEFINED_IDENTIFIER", "Undefined name '{0}'"),
        AmbiguousImport => ("AMBIGUOUS_IMPORT", "The name '{0}' is defined in the libraries {1}"),
        AssignmentToFinal => (
            "ASSIGNMENT_TO_FINAL",
            "'{0}' cannot be used as a setter, it is final"
        ),
        ConcreteClassWithAbstractMember => (
            "CONCRETE_CLASS_WITH_ABSTRACT_MEMBER",
            "'{0}' must have a method body because '{1}' is not abstract"
        ),
        NonAbstractClassInheritsAbstractMember => (
            "NON_ABSTRACT_CLASS_INHERITS_ABSTRACT_MEMBER",
            "Missing concrete implementation of '{0}'"
        ),
        InvalidMethodOverrideRequired => (
            "INVALID_METHOD_OVERRIDE_REQUIRED",
            "Must have {0} required parameters or less to match the overridden method from '{1}'"
        ),
        InvalidMethodOverrideReturnType => (
            "INVALID_METHOD_OVERRIDE_RETURN_TYPE",
            "The return type '{0}' is not assignable to '{1}' as required by the method it is \
            overriding from '{2}'"
        ),
        InstantiateAbstractClass => (
            "INSTANTIATE_ABSTRACT_CLASS",
            "Abstract classes cannot be created with a 'new' expression"
        ),
        NotEnoughRequiredArguments => (
            "NOT_ENOUGH_REQUIRED_ARGUMENTS",
            "{0} required argument(s) expected, but {1} found"
        ),
        ExtraPositionalArguments => (
            "EXTRA_POSITIONAL_ARGUMENTS",
            "{0} positional arguments expected, but {1} found"
        ),
    }
}

error_codes! {
    StaticTypeWarningCode {
        UndefinedMethod => (
            "UNDEFINED_METHOD",
            "The method '{0}' is not defined for the class '{1}'"
        ),
        UndefinedFunction => ("UNDEFINED_FUNCTION", "The function '{0}' is not defined"),
        UndefinedGetter => ("UNDEFINED_GETTER", "There is no such getter '{0}' in '{1}'"),
        ReturnOfInvalidType => (
            "RETURN_OF_INVALID_TYPE",
            "The return type '{0}' is not a '{1}', as defined by the method '{2}'"
        ),
        InvalidAssignment => (
            "INVALID_ASSIGNMENT",
            "A value of type '{0}' cannot be assigned to a variable of type '{1}'"
        ),
        NonBoolCondition => ("NON_BOOL_CONDITION", "Conditions must have a static type of 'bool'"),
    }
}

error_codes! {
    HintCode {
        UnusedImport => ("UNUSED_IMPORT", "Unused import"),
        DuplicateImport => ("DUPLICATE_IMPORT", "Duplicate import"),
        DeadCode => ("DEAD_CODE", "Dead code"),
        UnusedLocalVariable => (
            "UNUSED_LOCAL_VARIABLE",
            "The value of the local variable '{0}' is not used"
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Scanner(ScannerErrorCode),
    Parser(ParserErrorCode),
    CompileTime(CompileTimeErrorCode),
    StaticWarning(StaticWarningCode),
    StaticTypeWarning(StaticTypeWarningCode),
    Hint(HintCode),
}

impl ErrorCode {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorCode::Scanner(code) => code.name(),
            ErrorCode::Parser(code) => code.name(),
            ErrorCode::CompileTime(code) => code.name(),
            ErrorCode::StaticWarning(code) => code.name(),
            ErrorCode::StaticTypeWarning(code) => code.name(),
            ErrorCode::Hint(code) => code.name(),
        }
    }

    pub fn message_template(&self) -> &'static str {
        match self {
            ErrorCode::Scanner(code) => code.message_template(),
            ErrorCode::Parser(code) => code.message_template(),
            ErrorCode::CompileTime(code) => code.message_template(),
            ErrorCode::StaticWarning(code) => code.message_template(),
            ErrorCode::StaticTypeWarning(code) => code.message_template(),
            ErrorCode::Hint(code) => code.message_template(),
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            ErrorCode::Scanner(_) | ErrorCode::Parser(_) => ErrorType::SyntacticError,
            ErrorCode::CompileTime(_) => ErrorType::CompileTimeError,
            ErrorCode::StaticWarning(_) => ErrorType::StaticWarning,
            ErrorCode::StaticTypeWarning(_) => ErrorType::StaticTypeWarning,
            ErrorCode::Hint(_) => ErrorType::Hint,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.error_type().severity()
    }

    /// Substitute `{n}` placeholders with the given arguments.
    pub fn format_message(&self, arguments: &[&str]) -> String {
        let mut message = self.message_template().to_string();
        for (index, argument) in arguments.iter().enumerate() {
            message = message.replace(&format!("{{{}}}", index), argument);
        }
        message
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

macro_rules! impl_from_code {
    ($($code:ident => $variant:ident),*) => {
        $(impl From<$code> for ErrorCode {
            fn from(code: $code) -> Self {
                ErrorCode::$variant(code)
            }
        })*
    };
}

impl_from_code! {
    ScannerErrorCode => Scanner,
    ParserErrorCode => Parser,
    CompileTimeErrorCode => CompileTime,
    StaticWarningCode => StaticWarning,
    StaticTypeWarningCode => StaticTypeWarning,
    HintCode => Hint
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AnalysisError {
    pub source: Source,
    pub offset: usize,
    pub length: usize,
    pub code: ErrorCode,
    pub message: String,
}

impl AnalysisError {
    pub fn new(
        source: Source,
        offset: usize,
        length: usize,
        code: impl Into<ErrorCode>,
        arguments: &[&str],
    ) -> Self {
        let code = code.into();
        Self {
            message: code.format_message(arguments),
            source,
            offset,
            length,
            code,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.code.severity()
    }

    pub fn error_type(&self) -> ErrorType {
        self.code.error_type()
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}:{}): {}",
            self.severity(),
            self.code,
            self.source.short_name(),
            self.offset,
            self.message
        )
    }
}

/// Collects the errors reported during one task
#[derive(Debug, Default)]
pub struct RecordingErrorListener {
    errors: Vec<AnalysisError>,
}

impl RecordingErrorListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_error(&mut self, error: AnalysisError) {
        self.errors.push(error);
    }

    pub fn add_all(&mut self, errors: impl IntoIterator<Item = AnalysisError>) {
        self.errors.extend(errors);
    }

    pub fn errors(&self) -> &[AnalysisError] {
        &self.errors
    }

    pub fn errors_for(&self, source: &Source) -> Vec<AnalysisError> {
        self.errors
            .iter()
            .filter(|error| &error.source == source)
            .cloned()
            .collect()
    }

    /// Errors grouped by the source they were reported against.
    pub fn errors_by_source(&self) -> HashMap<Source, Vec<AnalysisError>> {
        let mut grouped: HashMap<Source, Vec<AnalysisError>> = HashMap::new();
        for error in &self.errors {
            grouped
                .entry(error.source.clone())
                .or_default()
                .push(error.clone());
        }
        grouped
    }

    pub fn into_errors(self) -> Vec<AnalysisError> {
        self.errors
    }
}

/// Reports errors against one source into a listener
pub struct ErrorReporter<'a> {
    listener: &'a mut RecordingErrorListener,
    source: Source,
}

impl<'a> ErrorReporter<'a> {
    pub fn new(listener: &'a mut RecordingErrorListener, source: Source) -> Self {
        Self { listener, source }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn report(
        &mut self,
        offset: usize,
        length: usize,
        code: impl Into<ErrorCode>,
        arguments: &[&str],
    ) {
        self.listener.on_error(AnalysisError::new(
            self.source.clone(),
            offset,
            length,
            code,
            arguments,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_message_formatting() {
        let error = AnalysisError::new(
            Source::new("file:///a.dart"),
            10,
            3,
            StaticWarningCode::UndefinedClass,
            &["Foo"],
        );
        assert_eq!(error.message, "Undefined class 'Foo'");
        assert_eq!(error.code.name(), "UNDEFINED_CLASS");
        assert_eq!(error.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_non_library_import_variants_share_name() {
        let compile_time: ErrorCode = CompileTimeErrorCode::ImportOfNonLibrary.into();
        let warning: ErrorCode = StaticWarningCode::ImportOfNonLibrary.into();
        assert_eq!(compile_time.name(), warning.name());
        assert_ne!(compile_time, warning);
        assert_eq!(compile_time.severity(), ErrorSeverity::Error);
        assert_eq!(warning.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_error_serializes_code_by_name() {
        let error = AnalysisError::new(
            Source::new("file:///a.dart"),
            0,
            1,
            HintCode::DeadCode,
            &[],
        );
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["code"], "DEAD_CODE");
        assert_eq!(json["source"], "file:///a.dart");
    }

    #[test]
    fn test_reporter_binds_source() {
        let mut listener = RecordingErrorListener::new();
        let a = Source::new("file:///a.dart");
        let b = Source::new("file:///b.dart");
        ErrorReporter::new(&mut listener, a.clone()).report(0, 1, HintCode::UnusedImport, &[]);
        ErrorReporter::new(&mut listener, b.clone()).report(0, 1, HintCode::DeadCode, &[]);
        assert_eq!(listener.errors_for(&a).len(), 1);
        assert_eq!(listener.errors_by_source().len(), 2);
    }
}
