//! The compilation engine: a recursive-descent parser fused with a
//! single-pass code generator.
//!
//! Each grammar rule below is one method. Methods consume tokens from the
//! cursor and emit VM instructions as a side effect; there is no separate
//! AST stage.

use crate::error::CompileError;
use crate::symbol_table::{SymbolKind, SymbolTable};
use crate::token::{TokenCursor, TokenKind};
use crate::vm_writer::{ArithmeticOp, Segment, VmWriter};

const MAX_INT_CONST: u32 = 32767;

/// Lifetime-of-one-class-compilation state: the class under compilation,
/// its two symbol tables, the label counter, and the output sink.
pub struct CompilationEngine<C: TokenCursor> {
    class_name: String,
    label_counter: u32,
    cursor: C,
    writer: VmWriter,
    class_table: SymbolTable,
    subroutine_table: SymbolTable,
}

impl<C: TokenCursor> CompilationEngine<C> {
    pub fn new(class_name: impl Into<String>, cursor: C) -> Self {
        CompilationEngine {
            class_name: class_name.into(),
            label_counter: 0,
            cursor,
            writer: VmWriter::new(),
            class_table: SymbolTable::new(),
            subroutine_table: SymbolTable::new(),
        }
    }

    /// Compiles one class and returns the accumulated VM text. Consumes the
    /// engine since the output buffer is owned exclusively for this one
    /// compilation.
    pub fn compile_class(mut self) -> Result<String, CompileError> {
        self.expect_symbol("class")?;

        let name = self.expect_identifier()?;
        if name != self.class_name {
            return Err(CompileError::ClassNameMismatch {
                expected: self.class_name.clone(),
                found: name,
            });
        }

        self.expect_symbol("{")?;
        self.compile_class_var_decs()?;
        self.compile_subroutines()?;
        self.expect_symbol("}")?;

        Ok(self.writer.into_output())
    }

    fn compile_class_var_decs(&mut self) -> Result<(), CompileError> {
        while self.current_is("static") || self.current_is("field") {
            let kind = if self.current_is("static") {
                SymbolKind::Static
            } else {
                SymbolKind::Field
            };
            self.cursor.advance();

            let r#type = self.expect_type()?;
            loop {
                let name = self.expect_identifier()?;
                self.class_table.define(&name, &r#type, kind)?;
                if self.current_is(",") {
                    self.cursor.advance();
                } else {
                    break;
                }
            }
            self.expect_symbol(";")?;
        }
        Ok(())
    }

    fn compile_subroutines(&mut self) -> Result<(), CompileError> {
        while self.current_is("constructor")
            || self.current_is("function")
            || self.current_is("method")
        {
            self.subroutine_table.reset();

            let subroutine_kind = self.cursor.current().lexeme.clone();
            self.cursor.advance();

            if self.current_is("void") {
                self.cursor.advance();
            } else {
                self.expect_type()?;
            }

            let name = self.expect_identifier()?;

            if subroutine_kind == "method" {
                let class_name = self.class_name.clone();
                self.subroutine_table
                    .define("this", &class_name, SymbolKind::Argument)?;
            }

            self.expect_symbol("(")?;
            self.compile_parameter_list()?;
            self.expect_symbol(")")?;

            self.expect_symbol("{")?;
            let n_locals = self.compile_var_decs()?;
            self.writer
                .function(&format!("{}.{}", self.class_name, name), n_locals);

            if subroutine_kind == "constructor" {
                let n_fields = self.class_table.var_count(SymbolKind::Field);
                self.writer.push(Segment::Constant, n_fields);
                self.writer.call("Memory.alloc", 1);
                self.writer.pop(Segment::Pointer, 0);
            } else if subroutine_kind == "method" {
                self.writer.push(Segment::Argument, 0);
                self.writer.pop(Segment::Pointer, 0);
            }

            self.compile_statements()?;
            self.expect_symbol("}")?;
        }
        Ok(())
    }

    fn compile_parameter_list(&mut self) -> Result<(), CompileError> {
        while !self.current_is(")") {
            let r#type = self.expect_type()?;
            let name = self.expect_identifier()?;
            self.subroutine_table
                .define(&name, &r#type, SymbolKind::Argument)?;
            if self.current_is(",") {
                self.cursor.advance();
            }
        }
        Ok(())
    }

    fn compile_var_decs(&mut self) -> Result<usize, CompileError> {
        let mut count = 0;
        while self.current_is("var") {
            self.cursor.advance();
            let r#type = self.expect_type()?;
            loop {
                let name = self.expect_identifier()?;
                self.subroutine_table
                    .define(&name, &r#type, SymbolKind::Local)?;
                count += 1;
                if self.current_is(",") {
                    self.cursor.advance();
                } else {
                    break;
                }
            }
            self.expect_symbol(";")?;
        }
        Ok(count)
    }

    fn compile_statements(&mut self) -> Result<(), CompileError> {
        loop {
            match self.cursor.current().lexeme.as_str() {
                "let" => self.compile_let()?,
                "if" => self.compile_if()?,
                "while" => self.compile_while()?,
                "do" => self.compile_do()?,
                "return" => self.compile_return()?,
                _ => break,
            }
        }
        Ok(())
    }

    fn compile_let(&mut self) -> Result<(), CompileError> {
        self.expect_symbol("let")?;
        let name = self.expect_identifier()?;

        if self.current_is("[") {
            self.cursor.advance();
            self.compile_expression()?;
            self.expect_symbol("]")?;
            self.push_variable(&name)?;
            self.writer.arith(ArithmeticOp::Add);

            self.expect_symbol("=")?;
            self.compile_expression()?;
            self.expect_symbol(";")?;

            self.writer.pop(Segment::Temp, 0);
            self.writer.pop(Segment::Pointer, 1);
            self.writer.push(Segment::Temp, 0);
            self.writer.pop(Segment::That, 0);
        } else {
            self.expect_symbol("=")?;
            self.compile_expression()?;
            self.expect_symbol(";")?;
            self.pop_variable(&name)?;
        }
        Ok(())
    }

    fn compile_if(&mut self) -> Result<(), CompileError> {
        let (l1, l2) = self.alloc_labels();

        self.expect_symbol("if")?;
        self.expect_symbol("(")?;
        self.compile_expression()?;
        self.expect_symbol(")")?;
        self.writer.arith(ArithmeticOp::Not);
        self.writer.if_goto(&l2);

        self.expect_symbol("{")?;
        self.compile_statements()?;
        self.expect_symbol("}")?;
        self.writer.goto(&l1);
        self.writer.label(&l2);

        if self.current_is("else") {
            self.cursor.advance();
            self.expect_symbol("{")?;
            self.compile_statements()?;
            self.expect_symbol("}")?;
        }
        self.writer.label(&l1);
        Ok(())
    }

    fn compile_while(&mut self) -> Result<(), CompileError> {
        let (l1, l2) = self.alloc_labels();

        self.expect_symbol("while")?;
        self.expect_symbol("(")?;
        self.writer.label(&l1);
        self.compile_expression()?;
        self.writer.arith(ArithmeticOp::Not);
        self.writer.if_goto(&l2);
        self.expect_symbol(")")?;

        self.expect_symbol("{")?;
        self.compile_statements()?;
        self.writer.goto(&l1);
        self.writer.label(&l2);
        self.expect_symbol("}")?;
        Ok(())
    }

    fn compile_do(&mut self) -> Result<(), CompileError> {
        self.expect_symbol("do")?;
        let name = self.expect_identifier()?;
        self.compile_subroutine_call(name)?;
        self.expect_symbol(";")?;
        self.writer.pop(Segment::Temp, 0);
        Ok(())
    }

    fn compile_return(&mut self) -> Result<(), CompileError> {
        self.expect_symbol("return")?;
        if self.current_is(";") {
            self.writer.push(Segment::Constant, 0);
        } else {
            self.compile_expression()?;
        }
        self.writer.write_return();
        self.expect_symbol(";")?;
        Ok(())
    }

    fn compile_expression(&mut self) -> Result<(), CompileError> {
        self.compile_term()?;
        loop {
            let op = self.cursor.current().lexeme.clone();
            if !is_binary_op(&op) {
                break;
            }
            self.cursor.advance();
            self.compile_term()?;
            match op.as_str() {
                "+" => self.writer.arith(ArithmeticOp::Add),
                "-" => self.writer.arith(ArithmeticOp::Sub),
                "&" => self.writer.arith(ArithmeticOp::And),
                "|" => self.writer.arith(ArithmeticOp::Or),
                "<" => self.writer.arith(ArithmeticOp::Lt),
                ">" => self.writer.arith(ArithmeticOp::Gt),
                "=" => self.writer.arith(ArithmeticOp::Eq),
                "*" => self.writer.call("Math.multiply", 2),
                "/" => self.writer.call("Math.divide", 2),
                _ => unreachable!("is_binary_op only admits the operators matched above"),
            }
        }
        Ok(())
    }

    fn compile_term(&mut self) -> Result<(), CompileError> {
        let current = self.cursor.current().clone();

        match current.kind {
            TokenKind::IntConst => {
                let value: u32 =
                    current
                        .lexeme
                        .parse()
                        .map_err(|_| CompileError::BadIntegerLiteral {
                            lexeme: current.lexeme.clone(),
                        })?;
                if value > MAX_INT_CONST {
                    return Err(CompileError::BadIntegerLiteral {
                        lexeme: current.lexeme.clone(),
                    });
                }
                self.writer.push(Segment::Constant, value as u16);
                self.cursor.advance();
                return Ok(());
            }
            TokenKind::StringConst => {
                self.writer
                    .push(Segment::Constant, current.lexeme.chars().count() as u16);
                self.writer.call("String.new", 1);
                for c in current.lexeme.chars() {
                    self.writer.push(Segment::Constant, c as u16);
                    self.writer.call("String.appendChar", 2);
                }
                self.cursor.advance();
                return Ok(());
            }
            _ => {}
        }

        match current.lexeme.as_str() {
            "true" => {
                self.writer.push(Segment::Constant, 0);
                self.writer.arith(ArithmeticOp::Not);
                self.cursor.advance();
                return Ok(());
            }
            "false" | "null" => {
                self.writer.push(Segment::Constant, 0);
                self.cursor.advance();
                return Ok(());
            }
            "this" => {
                self.writer.push(Segment::Pointer, 0);
                self.cursor.advance();
                return Ok(());
            }
            "(" => {
                self.cursor.advance();
                self.compile_expression()?;
                self.expect_symbol(")")?;
                return Ok(());
            }
            "-" => {
                self.cursor.advance();
                self.compile_term()?;
                self.writer.arith(ArithmeticOp::Neg);
                return Ok(());
            }
            "~" => {
                self.cursor.advance();
                self.compile_term()?;
                self.writer.arith(ArithmeticOp::Not);
                return Ok(());
            }
            _ => {}
        }

        let name = self.expect_identifier()?;
        if self.current_is("[") {
            self.cursor.advance();
            self.compile_expression()?;
            self.expect_symbol("]")?;
            self.push_variable(&name)?;
            self.writer.arith(ArithmeticOp::Add);
            self.writer.pop(Segment::Pointer, 1);
            self.writer.push(Segment::That, 0);
        } else if self.current_is("(") || self.current_is(".") {
            self.compile_subroutine_call(name)?;
        } else {
            self.push_variable(&name)?;
        }
        Ok(())
    }

    /// Shared tail of `subCall := (Id '.')? Id '(' exprList ')'` once the
    /// leading `Id` has already been consumed by the caller (a `do`
    /// statement or `term`'s bare/qualified-call branches).
    fn compile_subroutine_call(&mut self, name: String) -> Result<(), CompileError> {
        if self.current_is(".") {
            self.cursor.advance();

            let mut n_args = 0usize;
            let callee = if let Some((r#type, kind, index)) = self.resolve(&name) {
                self.writer.push(kind.segment(), index);
                n_args += 1;
                r#type
            } else {
                name
            };

            let member = self.expect_identifier()?;
            self.expect_symbol("(")?;
            n_args += self.compile_expression_list()?;
            self.expect_symbol(")")?;

            self.writer.call(&format!("{}.{}", callee, member), n_args);
            Ok(())
        } else if self.current_is("(") {
            self.writer.push(Segment::Pointer, 0);
            self.cursor.advance();
            let n_args = 1 + self.compile_expression_list()?;
            self.expect_symbol(")")?;

            self.writer
                .call(&format!("{}.{}", self.class_name, name), n_args);
            Ok(())
        } else {
            Err(CompileError::UnexpectedToken {
                expected: "'(' or '.'".to_string(),
                found: self.cursor.current().lexeme.clone(),
            })
        }
    }

    fn compile_expression_list(&mut self) -> Result<usize, CompileError> {
        let mut count = 0;
        if !self.current_is(")") {
            self.compile_expression()?;
            count += 1;
            while self.current_is(",") {
                self.cursor.advance();
                self.compile_expression()?;
                count += 1;
            }
        }
        Ok(count)
    }

    // --- scope resolution ---------------------------------------------------

    fn resolve(&self, name: &str) -> Option<(String, SymbolKind, u16)> {
        for table in [&self.subroutine_table, &self.class_table] {
            if let (Some(kind), Some(index), Some(r#type)) =
                (table.kind_of(name), table.index_of(name), table.type_of(name))
            {
                return Some((r#type.to_string(), kind, index));
            }
        }
        None
    }

    fn push_variable(&mut self, name: &str) -> Result<(), CompileError> {
        let (_, kind, index) = self
            .resolve(name)
            .ok_or_else(|| CompileError::UndefinedSymbol {
                name: name.to_string(),
            })?;
        self.writer.push(kind.segment(), index);
        Ok(())
    }

    fn pop_variable(&mut self, name: &str) -> Result<(), CompileError> {
        let (_, kind, index) = self
            .resolve(name)
            .ok_or_else(|| CompileError::UndefinedSymbol {
                name: name.to_string(),
            })?;
        self.writer.pop(kind.segment(), index);
        Ok(())
    }

    // --- token helpers -------------------------------------------------------

    fn current_is(&self, lexeme: &str) -> bool {
        self.cursor.current().is(lexeme)
    }

    fn expect_symbol(&mut self, lexeme: &str) -> Result<(), CompileError> {
        if !self.current_is(lexeme) {
            return Err(CompileError::UnexpectedToken {
                expected: lexeme.to_string(),
                found: self.cursor.current().lexeme.clone(),
            });
        }
        self.cursor.advance();
        Ok(())
    }

    fn expect_identifier(&mut self) -> Result<String, CompileError> {
        if !self.cursor.current().is_identifier() {
            return Err(CompileError::ExpectedIdentifier {
                found: self.cursor.current().lexeme.clone(),
            });
        }
        let name = self.cursor.current().lexeme.clone();
        self.cursor.advance();
        Ok(name)
    }

    fn expect_type(&mut self) -> Result<String, CompileError> {
        let current = self.cursor.current();
        let is_builtin = matches!(current.lexeme.as_str(), "int" | "char" | "boolean");
        if !is_builtin && !current.is_identifier() {
            return Err(CompileError::ExpectedType {
                found: current.lexeme.clone(),
            });
        }
        let r#type = current.lexeme.clone();
        self.cursor.advance();
        Ok(r#type)
    }

    fn alloc_labels(&mut self) -> (String, String) {
        let l1 = format!("{}_{}", self.class_name, self.label_counter);
        let l2 = format!("{}_{}", self.class_name, self.label_counter + 1);
        self.label_counter += 2;
        (l1, l2)
    }
}

fn is_binary_op(s: &str) -> bool {
    matches!(s, "+" | "-" | "*" | "/" | "&" | "|" | "<" | ">" | "=")
}
