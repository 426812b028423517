use super::sections::DimScope;
use super::{ParseError, Parser};
use crate::lexer::TokenKind;
use crate::program::{
    Condition, For, If, Input, Let, PathOp, Print, Statement, Type, VarPath, While,
};

impl<'a> Parser<'a> {
    /// Statements up to (not including) `end`, `else` or end of file.
    /// Local `dim` lines are collected on the current function.
    pub(super) fn parse_block(&mut self, block: usize, depth: usize) -> Result<(), ParseError> {
        self.check_block_depth(depth)?;
        crate::grow(|| self.parse_statements(block, depth))
    }

    fn parse_statements(&mut self, block: usize, depth: usize) -> Result<(), ParseError> {
        loop {
            self.skip_newlines();
            match self.peek_kind() {
                TokenKind::End | TokenKind::Else | TokenKind::Eof => break,
                TokenKind::Dim => self.parse_local_dims(block)?,
                _ => {
                    let statement = self.parse_statement(depth)?;
                    self.program.blocks[block].statements.push(statement);
                }
            }
        }
        Ok(())
    }

    // The cell is made on function entry; an initializer runs as an
    // assignment at the point of declaration, every time control reaches it.
    fn parse_local_dims(&mut self, block: usize) -> Result<(), ParseError> {
        let f = match self.function {
            Some(f) => f,
            None => return Err(self.error("Local declaration outside of a function")),
        };
        self.consume(TokenKind::Dim, "dim")?;
        loop {
            let mut dim = self.parse_dim_item(DimScope::Local)?;
            if let Some(src) = dim.init.take() {
                let dest = self.program.add_varpath(VarPath {
                    ty: dim.ty.clone(),
                    ops: vec![PathOp::Local(dim.name.clone())],
                });
                let idx = self.program.add_let(Let {
                    dest,
                    src,
                    ty: dim.ty.clone(),
                });
                self.program.blocks[block].statements.push(Statement::Let(idx));
            }
            self.program.functions[f].locals.push(dim);
            if !self.accept(TokenKind::Comma) {
                break;
            }
        }
        self.expect_endl()
    }

    fn parse_statement(&mut self, depth: usize) -> Result<Statement, ParseError> {
        match self.peek_kind() {
            TokenKind::Let => {
                self.advance();
                self.parse_assignment(depth)
            }
            TokenKind::Identifier if self.peek_next_kind(1) == TokenKind::LParen => {
                self.parse_call_statement(depth)
            }
            TokenKind::Identifier => self.parse_assignment(depth),
            TokenKind::Call => {
                self.advance();
                if self.peek_kind() != TokenKind::Identifier {
                    return Err(self.error("Expected function name"));
                }
                self.parse_call_statement(depth)
            }
            TokenKind::Print => self.parse_print(depth),
            TokenKind::Input => self.parse_input(depth),
            TokenKind::If => self.parse_if(depth),
            TokenKind::While => self.parse_while(depth),
            TokenKind::For => self.parse_for(depth),
            TokenKind::Return => self.parse_return(depth),
            TokenKind::Break | TokenKind::Continue => self.parse_loop_jump(),
            _ => Err(self.error("Unexpected block statement")),
        }
    }

    // [let] varpath = expr
    fn parse_assignment(&mut self, depth: usize) -> Result<Statement, ParseError> {
        let dest = self.parse_varpath(depth)?;
        self.consume(TokenKind::Assign, "'='")?;
        let src = self.parse_expression(depth)?;

        let ty = self.program.varpaths[dest].ty.clone();
        self.check_assignable(&ty, src)?;
        self.expect_endl()?;

        let idx = self.program.add_let(Let { dest, src, ty });
        Ok(Statement::Let(idx))
    }

    fn parse_call_statement(&mut self, depth: usize) -> Result<Statement, ParseError> {
        let call = self.parse_call(depth)?;
        self.expect_endl()?;
        Ok(Statement::Call(call))
    }

    // print [expr (, expr)*]
    fn parse_print(&mut self, depth: usize) -> Result<Statement, ParseError> {
        self.consume(TokenKind::Print, "print")?;

        let mut exprs = Vec::new();
        if !self.at_endl() {
            loop {
                let expr = self.parse_expression(depth)?;
                let ty = &self.program.exprs[expr].ty;
                if !matches!(ty, Type::Int | Type::String) {
                    return Err(self.error(format!(
                        "Cannot print a value of type {}",
                        self.program.type_name(ty)
                    )));
                }
                exprs.push(expr);
                if !self.accept(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect_endl()?;

        let idx = self.program.add_print(Print { exprs });
        Ok(Statement::Print(idx))
    }

    // input ["prompt",] varpath
    fn parse_input(&mut self, depth: usize) -> Result<Statement, ParseError> {
        self.consume(TokenKind::Input, "input")?;

        let prompt = if self.peek_kind() == TokenKind::String {
            let text = self.current_text().to_string();
            self.advance();
            self.consume(TokenKind::Comma, "','")?;
            Some(self.program.literals.intern(&text))
        } else {
            None
        };

        let dest = self.parse_varpath(depth)?;
        let ty = &self.program.varpaths[dest].ty;
        if !matches!(ty, Type::Int | Type::String) {
            return Err(self.error(format!(
                "Cannot input into a value of type {}",
                self.program.type_name(ty)
            )));
        }
        self.expect_endl()?;

        let idx = self.program.add_input(Input { prompt, dest });
        Ok(Statement::Input(idx))
    }

    fn parse_int_expr(&mut self, depth: usize) -> Result<usize, ParseError> {
        let expr = self.parse_expression(depth)?;
        if !self.program.exprs[expr].ty.is_int() {
            return Err(self.error("Expected an int expression"));
        }
        Ok(expr)
    }

    /// Nested block followed by its `end KEYWORD` line
    fn parse_body(&mut self, depth: usize) -> Result<usize, ParseError> {
        self.expect_endl()?;
        let block = self.program.add_block();
        self.parse_block(block, depth + 1)?;
        Ok(block)
    }

    fn expect_end(&mut self, kind: TokenKind, expected: &str) -> Result<(), ParseError> {
        self.consume(TokenKind::End, "end")?;
        self.consume(kind, expected)?;
        self.expect_endl()
    }

    // if expr / else if expr / else / end if
    fn parse_if(&mut self, depth: usize) -> Result<Statement, ParseError> {
        self.consume(TokenKind::If, "if")?;

        let expr = self.parse_int_expr(depth)?;
        let block = self.parse_body(depth)?;
        let mut conds = vec![Condition {
            expr: Some(expr),
            block,
        }];

        while self.accept(TokenKind::Else) {
            if self.accept(TokenKind::If) {
                let expr = self.parse_int_expr(depth)?;
                let block = self.parse_body(depth)?;
                conds.push(Condition {
                    expr: Some(expr),
                    block,
                });
            } else {
                let block = self.parse_body(depth)?;
                conds.push(Condition { expr: None, block });
                break;
            }
        }
        self.expect_end(TokenKind::If, "'if'")?;

        let idx = self.program.add_if(If { conds });
        Ok(Statement::If(idx))
    }

    fn parse_while(&mut self, depth: usize) -> Result<Statement, ParseError> {
        self.consume(TokenKind::While, "while")?;
        let expr = self.parse_int_expr(depth)?;

        self.loop_depth += 1;
        let block = self.parse_body(depth)?;
        self.loop_depth -= 1;
        self.expect_end(TokenKind::While, "'while'")?;

        let idx = self.program.add_while(While { expr, block });
        Ok(Statement::While(idx))
    }

    // for varpath = expr to expr [step N]
    fn parse_for(&mut self, depth: usize) -> Result<Statement, ParseError> {
        self.consume(TokenKind::For, "for")?;

        let var_idx = self.current;
        let var = self.parse_varpath(depth)?;
        if !self.program.varpaths[var].ty.is_int() {
            return Err(self.error_at(var_idx, "Loop variable must be int"));
        }
        self.consume(TokenKind::Assign, "'='")?;
        let start = self.parse_int_expr(depth)?;
        self.consume(TokenKind::To, "'to'")?;
        let end = self.parse_int_expr(depth)?;

        let step = if self.accept(TokenKind::Step) {
            let step_idx = self.current;
            let step = self.parse_integer()?;
            if step == 0 {
                return Err(self.error_at(step_idx, "Loop step must be non-zero"));
            }
            step
        } else {
            1
        };

        self.loop_depth += 1;
        let block = self.parse_body(depth)?;
        self.loop_depth -= 1;
        self.expect_end(TokenKind::For, "'for'")?;

        let idx = self.program.add_for(For {
            var,
            start,
            end,
            step,
            block,
        });
        Ok(Statement::For(idx))
    }

    fn parse_return(&mut self, depth: usize) -> Result<Statement, ParseError> {
        self.consume(TokenKind::Return, "return")?;
        if self.at_endl() {
            self.expect_endl()?;
            return Ok(Statement::Return(None));
        }

        let expr = self.parse_expression(depth)?;
        if !self.program.exprs[expr].ty.is_int() {
            return Err(self.error("Return value must be int"));
        }
        self.expect_endl()?;
        Ok(Statement::Return(Some(expr)))
    }

    // break [N] / continue [N]
    fn parse_loop_jump(&mut self) -> Result<Statement, ParseError> {
        let keyword = self.peek_kind();
        let word = if keyword == TokenKind::Break {
            "break"
        } else {
            "continue"
        };
        if self.loop_depth == 0 {
            return Err(self.error(format!("'{}' outside of a loop", word)));
        }
        self.advance();

        let level_idx = self.current;
        let level = if self.peek_kind() == TokenKind::Integer {
            let level = self.current_text().parse::<u32>().unwrap_or(0);
            self.advance();
            level
        } else {
            1
        };
        if level == 0 || level > self.loop_depth {
            return Err(self.error_at(
                level_idx,
                format!(
                    "'{} {}' out of range: {} enclosing loop(s)",
                    word, level, self.loop_depth
                ),
            ));
        }
        self.expect_endl()?;

        Ok(if keyword == TokenKind::Break {
            Statement::Break(level)
        } else {
            Statement::Continue(level)
        })
    }
}
