//! Syntax tree for the supported Dart subset
//!
//! Nodes are immutable once parsed. Every node that later stages annotate
//! carries a [`NodeId`], unique within its compilation unit, which keys the
//! resolver's side tables.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    pub offset: usize,
    pub length: usize,
}

impl Span {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    pub fn between(start: usize, end: usize) -> Self {
        Self {
            offset: start,
            length: end.saturating_sub(start),
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub id: NodeId,
    pub name: String,
    pub span: Span,
}

impl Identifier {
    /// Placeholder inserted by error recovery
    pub fn is_synthetic(&self) -> bool {
        self.name.is_empty()
    }

    pub fn is_private(&self) -> bool {
        self.name.starts_with('_')
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLiteral {
    pub id: NodeId,
    /// Value with escapes resolved
    pub value: String,
    /// Source text including quotes
    pub lexeme: String,
    pub interpolated: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompilationUnit {
    pub directives: Vec<Directive>,
    pub declarations: Vec<Declaration>,
    pub span: Span,
    /// Number of node ids handed out while parsing
    pub node_count: u32,
}

impl CompilationUnit {
    pub fn library_directive(&self) -> Option<&LibraryDirective> {
        self.directives.iter().find_map(|directive| match directive {
            Directive::Library(library) => Some(library),
            _ => None,
        })
    }

    pub fn part_of_directive(&self) -> Option<&PartOfDirective> {
        self.directives.iter().find_map(|directive| match directive {
            Directive::PartOf(part_of) => Some(part_of),
            _ => None,
        })
    }

    pub fn has_library_directive(&self) -> bool {
        self.library_directive().is_some()
    }

    pub fn has_part_of_directive(&self) -> bool {
        self.part_of_directive().is_some()
    }

    pub fn imports(&self) -> impl Iterator<Item = &ImportDirective> {
        self.directives.iter().filter_map(|directive| match directive {
            Directive::Import(import) => Some(import),
            _ => None,
        })
    }

    pub fn exports(&self) -> impl Iterator<Item = &ExportDirective> {
        self.directives.iter().filter_map(|directive| match directive {
            Directive::Export(export) => Some(export),
            _ => None,
        })
    }

    pub fn parts(&self) -> impl Iterator<Item = &PartDirective> {
        self.directives.iter().filter_map(|directive| match directive {
            Directive::Part(part) => Some(part),
            _ => None,
        })
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDeclaration> {
        self.declarations.iter().filter_map(|declaration| match declaration {
            Declaration::Class(class) => Some(class),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Library(LibraryDirective),
    PartOf(PartOfDirective),
    Import(ImportDirective),
    Export(ExportDirective),
    Part(PartDirective),
}

impl Directive {
    pub fn span(&self) -> Span {
        match self {
            Directive::Library(d) => d.span,
            Directive::PartOf(d) => d.span,
            Directive::Import(d) => d.span,
            Directive::Export(d) => d.span,
            Directive::Part(d) => d.span,
        }
    }
}

/// Dotted library name such as `a.b.c`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryName {
    pub components: Vec<Identifier>,
    pub span: Span,
}

impl fmt::Display for LibraryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.components.iter().map(|c| c.name.as_str()).collect();
        f.write_str(&names.join("."))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryDirective {
    pub id: NodeId,
    pub span: Span,
    pub name: LibraryName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartOfTarget {
    Name(LibraryName),
    Uri(StringLiteral),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartOfDirective {
    pub id: NodeId,
    pub span: Span,
    pub target: PartOfTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombinatorKind {
    Show,
    Hide,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combinator {
    pub id: NodeId,
    pub span: Span,
    pub kind: CombinatorKind,
    pub names: Vec<Identifier>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDirective {
    pub id: NodeId,
    pub span: Span,
    pub uri: StringLiteral,
    pub deferred: bool,
    pub prefix: Option<Identifier>,
    pub combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDirective {
    pub id: NodeId,
    pub span: Span,
    pub uri: StringLiteral,
    pub combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartDirective {
    pub id: NodeId,
    pub span: Span,
    pub uri: StringLiteral,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Class(ClassDeclaration),
    Function(FunctionDeclaration),
    Variables(TopLevelVariableDeclaration),
}

impl Declaration {
    pub fn span(&self) -> Span {
        match self {
            Declaration::Class(d) => d.span,
            Declaration::Function(d) => d.span,
            Declaration::Variables(d) => d.span,
        }
    }
}

/// A possibly prefixed type reference. `void` is a type name as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName {
    pub id: NodeId,
    pub span: Span,
    pub prefix: Option<Identifier>,
    pub name: Identifier,
}

impl TypeName {
    pub fn is_void(&self) -> bool {
        self.prefix.is_none() && self.name.name == "void"
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{}.{}", prefix.name, self.name.name),
            None => f.write_str(&self.name.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDeclaration {
    pub id: NodeId,
    pub span: Span,
    pub doc_comment: Option<String>,
    pub is_abstract: bool,
    pub name: Identifier,
    pub superclass: Option<TypeName>,
    pub mixins: Vec<TypeName>,
    pub interfaces: Vec<TypeName>,
    pub members: Vec<ClassMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassMember {
    Field(FieldDeclaration),
    Method(MethodDeclaration),
    Constructor(ConstructorDeclaration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKeyword {
    Var,
    Final,
    Const,
    /// Only a type was given
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableList {
    pub keyword: VariableKeyword,
    pub type_name: Option<TypeName>,
    pub variables: Vec<VariableDeclaration>,
}

impl VariableList {
    pub fn is_const(&self) -> bool {
        self.keyword == VariableKeyword::Const
    }

    pub fn is_final(&self) -> bool {
        matches!(self.keyword, VariableKeyword::Final | VariableKeyword::Const)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    pub id: NodeId,
    pub span: Span,
    pub name: Identifier,
    pub initializer: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDeclaration {
    pub id: NodeId,
    pub span: Span,
    pub is_static: bool,
    pub variables: VariableList,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDeclaration {
    pub id: NodeId,
    pub span: Span,
    pub is_static: bool,
    pub return_type: Option<TypeName>,
    pub name: Identifier,
    pub parameters: Vec<FormalParameter>,
    pub body: FunctionBody,
}

impl MethodDeclaration {
    pub fn is_abstract(&self) -> bool {
        matches!(self.body, FunctionBody::Empty(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorDeclaration {
    pub id: NodeId,
    pub span: Span,
    pub is_const: bool,
    /// Name of the enclosing class as written
    pub return_type: Identifier,
    /// `C.named`
    pub name: Option<Identifier>,
    pub parameters: Vec<FormalParameter>,
    pub body: FunctionBody,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub id: NodeId,
    pub span: Span,
    pub doc_comment: Option<String>,
    pub return_type: Option<TypeName>,
    pub name: Identifier,
    pub parameters: Vec<FormalParameter>,
    pub body: FunctionBody,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopLevelVariableDeclaration {
    pub id: NodeId,
    pub span: Span,
    pub variables: VariableList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Required,
    /// `[optional]` positional
    Positional,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormalParameter {
    pub id: NodeId,
    pub span: Span,
    pub kind: ParameterKind,
    pub type_name: Option<TypeName>,
    pub name: Identifier,
    /// `this.name`
    pub is_field_formal: bool,
    pub default_value: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    /// `;`
    Empty(Span),
    Block(Block),
    /// `=> expression;`
    Expression {
        id: NodeId,
        span: Span,
        expression: Expression,
    },
    /// Not parsed because function bodies were skipped
    Skipped(Span),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: NodeId,
    pub span: Span,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Block(Block),
    Variables {
        id: NodeId,
        span: Span,
        variables: VariableList,
    },
    Return {
        id: NodeId,
        span: Span,
        expression: Option<Expression>,
    },
    If {
        id: NodeId,
        span: Span,
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    While {
        id: NodeId,
        span: Span,
        condition: Expression,
        body: Box<Statement>,
    },
    Expression {
        id: NodeId,
        span: Span,
        expression: Expression,
    },
    Empty {
        id: NodeId,
        span: Span,
    },
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Block(block) => block.span,
            Statement::Variables { span, .. }
            | Statement::Return { span, .. }
            | Statement::If { span, .. }
            | Statement::While { span, .. }
            | Statement::Expression { span, .. }
            | Statement::Empty { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    IntegerDivide,
}

impl BinaryOperator {
    pub fn lexeme(&self) -> &'static str {
        match self {
            BinaryOperator::Or => "||",
            BinaryOperator::And => "&&",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::Greater => ">",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::IntegerDivide => "~/",
        }
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Subtract
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
                | BinaryOperator::Modulo
                | BinaryOperator::IntegerDivide
        )
    }

    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Less
                | BinaryOperator::Greater
                | BinaryOperator::LessEqual
                | BinaryOperator::GreaterEqual
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentList {
    pub span: Span,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Integer {
        id: NodeId,
        span: Span,
        value: i64,
    },
    Double {
        id: NodeId,
        span: Span,
        value: f64,
    },
    String(StringLiteral),
    Boolean {
        id: NodeId,
        span: Span,
        value: bool,
    },
    Null {
        id: NodeId,
        span: Span,
    },
    Identifier(Identifier),
    This {
        id: NodeId,
        span: Span,
    },
    Super {
        id: NodeId,
        span: Span,
    },
    /// `target.name`, which also covers prefixed identifiers
    PropertyAccess {
        id: NodeId,
        span: Span,
        target: Box<Expression>,
        name: Identifier,
    },
    /// `name(args)` or `target.name(args)`
    Invocation {
        id: NodeId,
        span: Span,
        target: Option<Box<Expression>>,
        name: Identifier,
        arguments: ArgumentList,
    },
    InstanceCreation {
        id: NodeId,
        span: Span,
        is_const: bool,
        type_name: TypeName,
        constructor_name: Option<Identifier>,
        arguments: ArgumentList,
    },
    Unary {
        id: NodeId,
        span: Span,
        operator: UnaryOperator,
        operand: Box<Expression>,
    },
    Binary {
        id: NodeId,
        span: Span,
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Assignment {
        id: NodeId,
        span: Span,
        target: Box<Expression>,
        value: Box<Expression>,
    },
    Parenthesized {
        id: NodeId,
        span: Span,
        expression: Box<Expression>,
    },
}

impl Expression {
    pub fn id(&self) -> NodeId {
        match self {
            Expression::String(literal) => literal.id,
            Expression::Identifier(identifier) => identifier.id,
            Expression::Integer { id, .. }
            | Expression::Double { id, .. }
            | Expression::Boolean { id, .. }
            | Expression::Null { id, .. }
            | Expression::This { id, .. }
            | Expression::Super { id, .. }
            | Expression::PropertyAccess { id, .. }
            | Expression::Invocation { id, .. }
            | Expression::InstanceCreation { id, .. }
            | Expression::Unary { id, .. }
            | Expression::Binary { id, .. }
            | Expression::Assignment { id, .. }
            | Expression::Parenthesized { id, .. } => *id,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Expression::String(literal) => literal.span,
            Expression::Identifier(identifier) => identifier.span,
            Expression::Integer { span, .. }
            | Expression::Double { span, .. }
            | Expression::Boolean { span, .. }
            | Expression::Null { span, .. }
            | Expression::This { span, .. }
            | Expression::Super { span, .. }
            | Expression::PropertyAccess { span, .. }
            | Expression::Invocation { span, .. }
            | Expression::InstanceCreation { span, .. }
            | Expression::Unary { span, .. }
            | Expression::Binary { span, .. }
            | Expression::Assignment { span, .. }
            | Expression::Parenthesized { span, .. } => *span,
        }
    }

    /// Strip any number of enclosing parentheses.
    pub fn unparenthesized(&self) -> &Expression {
        match self {
            Expression::Parenthesized { expression, .. } => expression.unparenthesized(),
            other => other,
        }
    }
}
