//! Flattened program representation produced by the parser.
//!
//! Every cross reference is an index into one of the append-only tables
//! on [`Program`]. Entries never move once pushed, so an index stays valid
//! for the lifetime of the program.

use crate::string_storage::{StringId, StringStorage};

/// Index of a record definition in [`Program::types`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(pub usize);

/// Closed set of value types, resolved once at parse time
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    String,
    Array(Box<Type>),
    Record(RecordId),
}

impl Type {
    pub fn array_of(elem: Type) -> Type {
        Type::Array(Box::new(elem))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Type::Int)
    }

    /// Element type when this is an array
    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// Values of this type live in a heap cell
    pub fn is_heap(&self) -> bool {
        !self.is_int()
    }
}

/// A named, typed declaration: global, local, argument or record member
#[derive(Debug, Clone, PartialEq)]
pub struct Dim {
    pub name: String,
    pub ty: Type,
    pub init: Option<usize>, // expression index, globals only after parsing
    pub line: usize,
}

/// User-defined record type
#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    pub name: String,
    pub members: Vec<Dim>,
}

impl RecordType {
    pub fn member_offset(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub args: Vec<Dim>,
    pub locals: Vec<Dim>,
    pub block: usize,
    pub line: usize,
}

impl Function {
    /// Argument or local declared under `name`
    pub fn variable(&self, name: &str) -> Option<&Dim> {
        self.args
            .iter()
            .chain(self.locals.iter())
            .find(|d| d.name == name)
    }
}

/// A statement tagged with the table its payload lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statement {
    Let(usize),
    Print(usize),
    Input(usize),
    If(usize),
    While(usize),
    For(usize),
    Return(Option<usize>), // expression index
    Break(u32),            // loop levels to leave
    Continue(u32),
    Call(usize),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Let {
    pub dest: usize, // varpath index
    pub src: usize,  // expression index
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Print {
    pub exprs: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Input {
    pub prompt: Option<StringId>,
    pub dest: usize, // varpath index
}

/// One arm of an `if`; `expr == None` is the `else` arm
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Condition {
    pub expr: Option<usize>,
    pub block: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub conds: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct While {
    pub expr: usize,
    pub block: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct For {
    pub var: usize, // varpath index
    pub start: usize,
    pub end: usize,
    pub step: i32,
    pub block: usize,
}

/// Variable-path instruction
#[derive(Debug, Clone, PartialEq)]
pub enum PathOp {
    Local(String),
    Global(String),
    Index(usize),  // expression yielding the element index
    Member(usize), // constant member offset
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarPath {
    pub ty: Type,
    pub ops: Vec<PathOp>,
}

/// Expression instruction. Stack effects are fixed per opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    // integers
    Int(i32),
    VarPath(usize),
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
    // strings
    Lit(StringId),
    VarPathStr(usize),
    StrCat,
    StrEq,
    StrNeq,
    // other
    VarPathPtr(usize),
    Call(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub ty: Type,
    pub ops: Vec<Op>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub ty: Type,
    pub expr: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Argument>,
    pub line: usize,
    pub column: usize,
}

/// Builtin intrinsics, recognised by name before user functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Push,
    Pop,
    Len,
    Default,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Builtin> {
        match name {
            "push" => Some(Builtin::Push),
            "pop" => Some(Builtin::Pop),
            "len" => Some(Builtin::Len),
            "default" => Some(Builtin::Default),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub module: Option<String>,
    pub types: Vec<RecordType>,
    pub globals: Vec<Dim>,
    pub functions: Vec<Function>,
    pub literals: StringStorage,
    pub blocks: Vec<Block>,
    pub lets: Vec<Let>,
    pub prints: Vec<Print>,
    pub inputs: Vec<Input>,
    pub ifs: Vec<If>,
    pub whiles: Vec<While>,
    pub fors: Vec<For>,
    pub varpaths: Vec<VarPath>,
    pub exprs: Vec<Expr>,
    pub calls: Vec<Call>,
}

fn push<T>(table: &mut Vec<T>, item: T) -> usize {
    table.push(item);
    table.len() - 1
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_block(&mut self) -> usize {
        push(&mut self.blocks, Block::default())
    }

    pub fn add_let(&mut self, item: Let) -> usize {
        push(&mut self.lets, item)
    }

    pub fn add_print(&mut self, item: Print) -> usize {
        push(&mut self.prints, item)
    }

    pub fn add_input(&mut self, item: Input) -> usize {
        push(&mut self.inputs, item)
    }

    pub fn add_if(&mut self, item: If) -> usize {
        push(&mut self.ifs, item)
    }

    pub fn add_while(&mut self, item: While) -> usize {
        push(&mut self.whiles, item)
    }

    pub fn add_for(&mut self, item: For) -> usize {
        push(&mut self.fors, item)
    }

    pub fn add_varpath(&mut self, item: VarPath) -> usize {
        push(&mut self.varpaths, item)
    }

    pub fn add_expr(&mut self, item: Expr) -> usize {
        push(&mut self.exprs, item)
    }

    pub fn add_call(&mut self, item: Call) -> usize {
        push(&mut self.calls, item)
    }

    pub fn find_type(&self, name: &str) -> Option<RecordId> {
        self.types.iter().position(|t| t.name == name).map(RecordId)
    }

    pub fn record(&self, id: RecordId) -> &RecordType {
        &self.types[id.0]
    }

    pub fn find_global(&self, name: &str) -> Option<&Dim> {
        self.globals.iter().find(|g| g.name == name)
    }

    pub fn find_function(&self, name: &str) -> Option<usize> {
        self.functions.iter().position(|f| f.name == name)
    }

    /// Source spelling of a type, e.g. `Point[]`
    pub fn type_name(&self, ty: &Type) -> String {
        match ty {
            Type::Int => "int".to_string(),
            Type::String => "string".to_string(),
            Type::Array(elem) => format!("{}[]", self.type_name(elem)),
            Type::Record(id) => self.record(*id).name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        let mut program = Program::new();
        program.types.push(RecordType {
            name: "Point".into(),
            members: vec![],
        });
        let point = Type::Record(RecordId(0));

        assert_eq!(program.type_name(&Type::Int), "int");
        assert_eq!(program.type_name(&Type::array_of(point.clone())), "Point[]");
        assert_eq!(
            program.type_name(&Type::array_of(Type::array_of(Type::String))),
            "string[][]"
        );
        assert_eq!(program.find_type("Point"), Some(RecordId(0)));
        assert!(point.is_heap());
    }

    #[test]
    fn test_tables_return_stable_indices() {
        let mut program = Program::new();
        let a = program.add_block();
        let b = program.add_block();
        assert_eq!((a, b), (0, 1));
        program.blocks[a].statements.push(Statement::Break(1));
        assert_eq!(program.blocks[0].statements, vec![Statement::Break(1)]);
    }

    #[test]
    fn test_builtin_names() {
        assert_eq!(Builtin::from_name("push"), Some(Builtin::Push));
        assert_eq!(Builtin::from_name("default"), Some(Builtin::Default));
        assert_eq!(Builtin::from_name("main"), None);
    }
}
