use super::{ParseError, Parser};
use crate::lexer::TokenKind;
use crate::program::{Builtin, Dim, Function, RecordId, RecordType, Type};

/// Top-level sections, in the only order they may appear
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Section {
    Start,
    Module,
    Types,
    Globals,
    Functions,
}

impl Section {
    fn name(self) -> &'static str {
        match self {
            Section::Start => "start",
            Section::Module => "module",
            Section::Types => "type",
            Section::Globals => "dim",
            Section::Functions => "function",
        }
    }
}

/// Where a `dim` declaration lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DimScope {
    Global,
    Local,
}

impl<'a> Parser<'a> {
    pub(super) fn parse_sections(&mut self) -> Result<(), ParseError> {
        let mut section = Section::Start;

        loop {
            self.skip_newlines();

            let next = match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::Module => Section::Module,
                TokenKind::Type => Section::Types,
                TokenKind::Dim => Section::Globals,
                TokenKind::Function => Section::Functions,
                _ => return Err(self.error("Unexpected command")),
            };

            // `module` may appear once; the rest may repeat but never go back
            if next < section || (next == Section::Module && section == Section::Module) {
                return Err(self.error(format!(
                    "{} section cannot follow {} section",
                    next.name(),
                    section.name()
                )));
            }
            section = next;

            match next {
                Section::Module => self.parse_module_name()?,
                Section::Types => self.parse_type_decl()?,
                Section::Globals => self.parse_global_dims()?,
                Section::Functions => self.parse_function()?,
                Section::Start => unreachable!("start is never a parsed section"),
            }
        }
        Ok(())
    }

    fn parse_module_name(&mut self) -> Result<(), ParseError> {
        self.consume(TokenKind::Module, "module")?;
        let name = self.expect_identifier("module name")?;
        self.expect_endl()?;
        self.program.module = Some(name);
        Ok(())
    }

    // type NAME / dim MEMBER [TYPE] ... / end type
    fn parse_type_decl(&mut self) -> Result<(), ParseError> {
        self.consume(TokenKind::Type, "type")?;
        let name_idx = self.current;
        let name = self.expect_identifier("type name")?;
        self.expect_endl()?;

        if name == "int" || name == "string" || self.program.find_type(&name).is_some() {
            return Err(self.error_at(name_idx, format!("Duplicate type '{}'", name)));
        }

        // Registered up front so members may hold arrays of the record itself
        let id = RecordId(self.program.types.len());
        self.program.types.push(RecordType {
            name: name.clone(),
            members: Vec::new(),
        });

        loop {
            self.skip_newlines();
            if self.peek_kind() == TokenKind::End {
                break;
            }
            self.consume(TokenKind::Dim, "'dim' or 'end type'")?;

            let member_idx = self.current;
            let line = self.current_token().line;
            let member = self.expect_identifier("member name")?;
            let ty = if self.peek_kind() == TokenKind::Identifier {
                self.parse_type()?
            } else {
                Type::Int
            };

            if self.program.types[id.0].member_offset(&member).is_some() {
                return Err(self.error_at(member_idx, format!("Duplicate member '{}'", member)));
            }
            if ty == Type::Record(id) {
                return Err(self.error_at(
                    member_idx,
                    format!("Record type '{}' cannot contain itself", name),
                ));
            }
            self.expect_endl()?;

            self.program.types[id.0].members.push(Dim {
                name: member,
                ty,
                init: None,
                line,
            });
        }

        self.consume(TokenKind::End, "end")?;
        self.consume(TokenKind::Type, "'type'")?;
        self.expect_endl()
    }

    /// TYPE := ('int' | 'string' | RECORD) ('[' ']')*
    pub(super) fn parse_type(&mut self) -> Result<Type, ParseError> {
        let name_idx = self.current;
        let name = self.expect_identifier("type name")?;

        let mut ty = match name.as_str() {
            "int" => Type::Int,
            "string" => Type::String,
            other => match self.program.find_type(other) {
                Some(id) => Type::Record(id),
                None => return Err(self.error_at(name_idx, "Undefined type")),
            },
        };

        while self.peek_kind() == TokenKind::LBracket && self.peek_next_kind(1) == TokenKind::RBracket
        {
            self.advance();
            self.advance();
            ty = Type::array_of(ty);
        }
        Ok(ty)
    }

    fn parse_global_dims(&mut self) -> Result<(), ParseError> {
        self.consume(TokenKind::Dim, "dim")?;
        loop {
            let dim = self.parse_dim_item(DimScope::Global)?;
            self.program.globals.push(dim);
            if !self.accept(TokenKind::Comma) {
                break;
            }
        }
        self.expect_endl()
    }

    /// NAME [TYPE] ['=' expr]; the name becomes visible only after its initializer
    pub(super) fn parse_dim_item(&mut self, scope: DimScope) -> Result<Dim, ParseError> {
        let name_idx = self.current;
        let line = self.current_token().line;
        let name = self.expect_identifier("variable name")?;

        self.check_variable_name(name_idx, &name, scope)?;

        let ty = if self.peek_kind() == TokenKind::Identifier {
            self.parse_type()?
        } else {
            Type::Int
        };

        let init = if self.accept(TokenKind::Assign) {
            let expr = self.parse_expression(0)?;
            self.check_assignable(&ty, expr)?;
            Some(expr)
        } else {
            None
        };

        Ok(Dim {
            name,
            ty,
            init,
            line,
        })
    }

    fn check_variable_name(
        &self,
        name_idx: usize,
        name: &str,
        scope: DimScope,
    ) -> Result<(), ParseError> {
        if name == "int" || name == "string" || self.program.find_type(name).is_some() {
            return Err(self.error_at(name_idx, format!("'{}' is a type name", name)));
        }

        let duplicate = match (scope, self.function) {
            (DimScope::Local, Some(f)) => self.program.functions[f].variable(name).is_some(),
            _ => self.program.find_global(name).is_some(),
        };
        if duplicate {
            let kind = match scope {
                DimScope::Global => "global",
                DimScope::Local => "local",
            };
            return Err(self.error_at(name_idx, format!("Duplicate {} '{}'", kind, name)));
        }
        Ok(())
    }

    /// Destination and source types must agree exactly
    pub(super) fn check_assignable(&self, dest: &Type, expr: usize) -> Result<(), ParseError> {
        let found = &self.program.exprs[expr].ty;
        if found != dest {
            return Err(self.error(format!(
                "Type mismatch: expected {}, found {}",
                self.program.type_name(dest),
                self.program.type_name(found)
            )));
        }
        Ok(())
    }

    // function NAME(ARG TYPE, ...) / body / end function
    fn parse_function(&mut self) -> Result<(), ParseError> {
        self.consume(TokenKind::Function, "function")?;
        let name_idx = self.current;
        let line = self.current_token().line;
        let name = self.expect_identifier("function name")?;

        if Builtin::from_name(&name).is_some() {
            return Err(self.error_at(name_idx, format!("Cannot redefine builtin '{}'", name)));
        }
        if self.program.find_function(&name).is_some() {
            return Err(self.error_at(name_idx, format!("Duplicate function '{}'", name)));
        }

        self.consume(TokenKind::LParen, "'('")?;
        let mut args: Vec<Dim> = Vec::new();
        if self.peek_kind() != TokenKind::RParen {
            loop {
                let arg_idx = self.current;
                let arg_line = self.current_token().line;
                let arg = self.expect_identifier("argument name")?;
                if arg == "int" || arg == "string" || self.program.find_type(&arg).is_some() {
                    return Err(self.error_at(arg_idx, format!("'{}' is a type name", arg)));
                }
                if args.iter().any(|a| a.name == arg) {
                    return Err(self.error_at(arg_idx, format!("Duplicate local '{}'", arg)));
                }
                let ty = self.parse_type()?;
                args.push(Dim {
                    name: arg,
                    ty,
                    init: None,
                    line: arg_line,
                });
                if !self.accept(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "')'")?;
        self.expect_endl()?;

        let block = self.program.add_block();
        self.program.functions.push(Function {
            name,
            args,
            locals: Vec::new(),
            block,
            line,
        });
        self.function = Some(self.program.functions.len() - 1);
        self.loop_depth = 0;

        self.parse_block(block, 0)?;

        self.consume(TokenKind::End, "end")?;
        self.consume(TokenKind::Function, "'function'")?;
        self.expect_endl()?;
        self.function = None;
        Ok(())
    }
}
