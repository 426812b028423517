// Parser module - splits parser into logical components
mod calls;
mod error;
mod expressions;
mod helpers;
mod sections;
mod statements;
mod varpath;

// Public exports
pub use error::ParseError;

use crate::lexer::Tokens;
use crate::limits::Limits;
use crate::program::Program;

/// Type-directed recursive-descent parser.
///
/// Names and types are resolved while tokens are consumed: how a variable
/// path or operator is parsed depends on the types inferred for what came
/// before it. The result is a fully resolved [`Program`].
pub struct Parser<'a> {
    tokens: &'a Tokens,
    current: usize,
    program: Program,
    limits: Limits,
    function: Option<usize>, // function whose body is being parsed
    loop_depth: u32,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a Tokens, limits: Limits) -> Self {
        Self {
            tokens,
            current: 0,
            program: Program::new(),
            limits,
            function: None,
            loop_depth: 0,
        }
    }

    // Main parsing entry point
    pub fn parse(mut self) -> Result<Program, ParseError> {
        self.parse_sections()?;
        self.validate_calls()?;
        log::debug!(
            "parsed {} types, {} globals, {} functions, {} calls",
            self.program.types.len(),
            self.program.globals.len(),
            self.program.functions.len(),
            self.program.calls.len()
        );
        Ok(self.program)
    }
}

// Public API function
pub fn parse(tokens: &Tokens) -> Result<Program, ParseError> {
    parse_with_limits(tokens, Limits::default())
}

pub fn parse_with_limits(tokens: &Tokens, limits: Limits) -> Result<Program, ParseError> {
    Parser::new(tokens, limits).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::program::{Op, PathOp, Statement, Type};

    fn parse_src(source: &str) -> Result<Program, ParseError> {
        let tokens = lex(source).unwrap();
        parse(&tokens)
    }

    fn parse_err(source: &str) -> ParseError {
        match parse_src(source) {
            Ok(_) => panic!("expected a parse error for:\n{}", source),
            Err(e) => e,
        }
    }

    #[test]
    fn test_sections_in_order() {
        let source = "\
module demo
type P
  dim x
  dim name string
end type
dim a P, n = 3
function main()
  print a.x
end function
";
        let program = parse_src(source).unwrap();
        assert_eq!(program.module.as_deref(), Some("demo"));
        assert_eq!(program.types.len(), 1);
        assert_eq!(program.types[0].members[1].ty, Type::String);
        assert_eq!(program.globals.len(), 2);
        assert_eq!(program.globals[1].ty, Type::Int);
        assert!(program.globals[1].init.is_some());
        assert_eq!(program.functions[0].name, "main");
    }

    #[test]
    fn test_section_order_is_enforced() {
        let err = parse_err("dim a\ntype P\nend type\n");
        assert!(err.message.contains("cannot follow"), "{}", err);

        let err = parse_err("module a\nmodule b\n");
        assert!(err.message.contains("cannot follow"), "{}", err);
    }

    #[test]
    fn test_varpath_resolution() {
        let source = "\
type P
  dim xs int[]
  dim q Q
end type
";
        // Q undeclared at this point
        let err = parse_err(source);
        assert!(err.message.contains("Undefined type"), "{}", err);
        assert_eq!(err.token, "Q");

        let source = "\
type Q
  dim name string
end type
type P
  dim xs int[]
  dim q Q
end type
dim ps P[]
function main()
  let ps[1].q.name = \"x\"
end function
";
        let program = parse_src(source).unwrap();
        let vp = &program.varpaths[0];
        assert_eq!(vp.ty, Type::String);
        assert_eq!(vp.ops[0], PathOp::Global("ps".into()));
        assert!(matches!(vp.ops[1], PathOp::Index(_)));
        assert_eq!(vp.ops[2], PathOp::Member(1));
        assert_eq!(vp.ops[3], PathOp::Member(0));
    }

    #[test]
    fn test_path_type_errors() {
        let err = parse_err("dim a\nfunction main()\n  let a[0] = 1\nend function\n");
        assert!(err.message.contains("not an array"), "{}", err);

        let err = parse_err("dim a\nfunction main()\n  let a.x = 1\nend function\n");
        assert!(err.message.contains("not a record"), "{}", err);

        let err = parse_err("type P\n  dim x\nend type\ndim a P\nfunction main()\n  let a.y = 1\nend function\n");
        assert!(err.message.contains("Undefined member"), "{}", err);
        assert_eq!(err.line, 6);

        let err = parse_err("function main()\n  print nope\nend function\n");
        assert!(err.message.contains("Undefined variable"), "{}", err);
        assert_eq!(err.token, "nope");
    }

    #[test]
    fn test_locals_shadow_globals() {
        let source = "\
dim s string
function main()
  dim s
  let s = 1
end function
";
        let program = parse_src(source).unwrap();
        let vp = &program.varpaths[0];
        assert_eq!(vp.ops[0], PathOp::Local("s".into()));
        assert_eq!(vp.ty, Type::Int);
    }

    #[test]
    fn test_local_initializer_is_placed_statement() {
        let source = "\
function main()
  print 1
  dim n = 2
  print n
end function
";
        let program = parse_src(source).unwrap();
        let function = &program.functions[0];
        assert_eq!(function.locals[0].init, None);
        let body = &program.blocks[function.block];
        assert_eq!(body.statements.len(), 3);
        let idx = match body.statements[1] {
            Statement::Let(idx) => idx,
            other => panic!("expected let, found {:?}", other),
        };
        let dest = &program.varpaths[program.lets[idx].dest];
        assert_eq!(dest.ops, vec![PathOp::Local("n".into())]);
    }

    #[test]
    fn test_expression_precedence() {
        let program = parse_src("dim a = 1 + 2 * 3 == 7\n").unwrap();
        let expr = &program.exprs[0];
        assert_eq!(
            expr.ops,
            vec![Op::Int(1), Op::Int(2), Op::Int(3), Op::Mul, Op::Add, Op::Int(7), Op::Eq]
        );
        assert_eq!(expr.ty, Type::Int);
    }

    #[test]
    fn test_parentheses_and_booleans() {
        let program = parse_src("dim a = (1 + 2) * -3 and true\n").unwrap();
        assert_eq!(
            program.exprs[0].ops,
            vec![Op::Int(1), Op::Int(2), Op::Add, Op::Int(-3), Op::Mul, Op::Int(1), Op::And]
        );
    }

    #[test]
    fn test_string_operators() {
        let program = parse_src("dim s string = \"a\" + \"b\"\ndim t = \"a\" != \"b\"\n").unwrap();
        assert_eq!(program.exprs[0].ty, Type::String);
        assert_eq!(program.exprs[0].ops[2], Op::StrCat);
        assert_eq!(program.exprs[1].ty, Type::Int);
        assert_eq!(program.exprs[1].ops[2], Op::StrNeq);
        assert_eq!(program.literals.len(), 2);

        let err = parse_err("dim s string = \"a\" - \"b\"\n");
        assert!(err.message.contains("Invalid operand"), "{}", err);

        let err = parse_err("dim s = 1 + \"b\"\n");
        assert!(err.message.contains("mismatch"), "{}", err);
    }

    #[test]
    fn test_initializer_type_checked() {
        let err = parse_err("dim s string = 5\n");
        assert!(err.message.contains("Type mismatch"), "{}", err);
    }

    #[test]
    fn test_control_statements() {
        let source = "\
function main()
  dim i
  for i = 1 to 10 step 2
    if i == 3
      continue
    else if i == 5
      break
    else
      print i
    end if
  end for
  while i != 0
    let i = i - 1
  end while
  return i
end function
";
        let program = parse_src(source).unwrap();
        assert_eq!(program.fors[0].step, 2);
        assert_eq!(program.ifs[0].conds.len(), 3);
        assert_eq!(program.ifs[0].conds[2].expr, None);
        let body = &program.blocks[program.functions[0].block];
        assert!(matches!(body.statements[2], Statement::Return(Some(_))));
    }

    #[test]
    fn test_loop_levels_checked() {
        let err = parse_err("function main()\n  break\nend function\n");
        assert!(err.message.contains("outside"), "{}", err);

        let source = "\
function main()
  while 1
    while 1
      break 3
    end while
  end while
end function
";
        let err = parse_err(source);
        assert!(err.message.contains("out of range"), "{}", err);
        assert_eq!(err.line, 4);

        let source = "\
function main()
  while 1
    while 1
      break 2
    end while
  end while
end function
";
        assert!(parse_src(source).is_ok());
    }

    #[test]
    fn test_forward_calls_validated_after_parse() {
        let source = "\
function main()
  call later(1, \"x\")
end function
function later(n int, s string)
end function
";
        assert!(parse_src(source).is_ok());

        let source = "\
function main()
  call later(\"x\")
end function
function later(n int)
end function
";
        let err = parse_err(source);
        assert!(err.message.contains("argument 1"), "{}", err);
        assert_eq!(err.line, 2);

        let err = parse_err("function main()\n  call nothing()\nend function\n");
        assert!(err.message.contains("Undefined function"), "{}", err);
    }

    #[test]
    fn test_builtin_signatures() {
        let ok = "\
dim xs int[]
dim s string
function main()
  call push(xs, 1)
  print len(xs) + len(s) + pop(xs)
  call default(s)
end function
";
        assert!(parse_src(ok).is_ok());

        let err = parse_err("dim xs int[]\nfunction main()\n  call push(xs, \"a\")\nend function\n");
        assert!(err.message.contains("push"), "{}", err);

        let err = parse_err("dim n\nfunction main()\n  call default(n)\nend function\n");
        assert!(err.message.contains("default"), "{}", err);

        let err = parse_err("function push(a int)\nend function\n");
        assert!(err.message.contains("builtin"), "{}", err);
    }

    #[test]
    fn test_duplicates_rejected() {
        let err = parse_err("dim a\ndim a string\n");
        assert!(err.message.contains("Duplicate global"), "{}", err);

        let err = parse_err("type P\n  dim x\n  dim x\nend type\n");
        assert!(err.message.contains("Duplicate member"), "{}", err);

        let err = parse_err("function f(a int)\n  dim a\nend function\n");
        assert!(err.message.contains("Duplicate local"), "{}", err);

        let err = parse_err("type P\n  dim self P\nend type\n");
        assert!(err.message.contains("contain itself"), "{}", err);
    }

    #[test]
    fn test_recursion_depth_limit() {
        let mut limits = Limits::default();
        limits.max_expr_depth = 8;
        let source = format!("dim a = {}1{}\n", "(".repeat(20), ")".repeat(20));
        let tokens = lex(&source).unwrap();
        let err = parse_with_limits(&tokens, limits).unwrap_err();
        assert!(err.message.contains("too deep"), "{}", err);
    }
}
