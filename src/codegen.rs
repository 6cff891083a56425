//! Generación de código x86-64.
//!
//! El generador recorre el AST en profundidad emitiendo texto
//! ensamblador en sintaxis AT&T. El modelo de emisión usa un
//! acumulador: `%rax` contiene siempre el valor actual y `%rdi`
//! recibe el otro operando de una operación binaria. Los valores
//! pendientes se salvan en el stack con `push`/`pop`, y un contador
//! de profundidad verifica que cada sentencia deje el stack de
//! operandos exactamente balanceado.
//!
//! Las fallas aquí son bugs del compilador, nunca errores del
//! usuario: un AST bien formado por el parser no puede provocarlas.

use crate::parse::{BinOp, Expr, Function, Local, Stmt};
use std::io::{self, Write};

/// Emite el ensamblador completo de una función `main`.
///
/// Se asume que [`crate::frame::layout`] ya asignó offsets; el
/// único modo de falla externo es de E/S sobre el sink.
pub fn emit<W: Write>(function: &Function, output: &mut W) -> io::Result<()> {
    let codegen = Codegen {
        output,
        function,
        depth: 0,
        labels: 0,
    };

    codegen.write_asm()
}

/// Contexto de emisión de una compilación.
///
/// `depth` cuenta los valores salvados en el stack de operandos y
/// `labels` desambigua las etiquetas de control de flujo mediante
/// un contador monótono compartido por todos los `if`/`for`.
struct Codegen<'a, W> {
    output: &'a mut W,
    function: &'a Function,
    depth: u32,
    labels: u32,
}

impl<W: Write> Codegen<'_, W> {
    fn write_asm(mut self) -> io::Result<()> {
        writeln!(self.output, ".globl main")?;
        writeln!(self.output, "main:")?;

        // Prólogo, crea un stack frame
        emit!(self, "push", "%rbp")?;
        emit!(self, "mov", "%rsp, %rbp")?;

        // Se reserva memoria para locales
        if self.function.stack_size > 0 {
            emit!(self, "sub", "${}, %rsp", self.function.stack_size)?;
        }

        for stmt in &self.function.body {
            self.stmt(stmt)?;
            assert_eq!(self.depth, 0, "unbalanced operand stack");
        }

        // Todo `return` salta aquí: existe un único epílogo que
        // revierte al estado justo antes de la llamada
        writeln!(self.output, ".L.return:")?;
        emit!(self, "mov", "%rbp, %rsp")?;
        emit!(self, "pop", "%rbp")?;
        emit!(self, "ret")?;

        assert_eq!(self.depth, 0, "unbalanced operand stack");
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> io::Result<()> {
        match stmt {
            // El valor queda descartado en el acumulador
            Stmt::Expr(expr) => self.expr(expr.as_ref()),

            Stmt::Block(statements) => {
                for stmt in statements {
                    self.stmt(stmt)?;
                }

                Ok(())
            }

            Stmt::If {
                condition,
                then,
                orelse,
            } => {
                let label = self.next_label();

                self.expr(condition.as_ref())?;
                emit!(self, "cmp", "$0, %rax")?;
                emit!(self, "je", ".L.else.{}", label)?;

                self.stmt(then)?;
                emit!(self, "jmp", ".L.end.{}", label)?;

                writeln!(self.output, ".L.else.{}:", label)?;
                if let Some(orelse) = orelse {
                    self.stmt(orelse)?;
                }

                writeln!(self.output, ".L.end.{}:", label)
            }

            Stmt::For {
                init,
                condition,
                step,
                body,
            } => {
                let label = self.next_label();

                if let Some(init) = init {
                    self.expr(init.as_ref())?;
                }

                writeln!(self.output, ".L.begin.{}:", label)?;

                // Sin condición, el lazo es incondicional
                if let Some(condition) = condition {
                    self.expr(condition.as_ref())?;
                    emit!(self, "cmp", "$0, %rax")?;
                    emit!(self, "je", ".L.end.{}", label)?;
                }

                self.stmt(body)?;
                if let Some(step) = step {
                    self.expr(step.as_ref())?;
                }

                emit!(self, "jmp", ".L.begin.{}", label)?;
                writeln!(self.output, ".L.end.{}:", label)
            }

            Stmt::Return(expr) => {
                self.expr(expr.as_ref())?;
                emit!(self, "jmp", ".L.return")
            }
        }
    }

    fn expr(&mut self, expr: &Expr) -> io::Result<()> {
        match expr {
            Expr::Num(value) => emit!(self, "mov", "${}, %rax", value),

            Expr::Neg(operand) => {
                self.expr(operand.as_ref().as_ref())?;
                emit!(self, "neg", "%rax")
            }

            Expr::Var(_) => {
                self.addr(expr)?;
                emit!(self, "mov", "(%rax), %rax")
            }

            Expr::Assign(target, value) => {
                self.addr(target.as_ref().as_ref())?;
                self.push()?;

                self.expr(value.as_ref().as_ref())?;
                self.pop("%rdi")?;

                // El valor almacenado queda como resultado en %rax
                emit!(self, "mov", "%rax, (%rdi)")
            }

            Expr::Binary(lhs, op, rhs) => {
                // Derecha primero: al combinar, %rax contiene el
                // operando izquierdo y %rdi el derecho restaurado
                self.expr(rhs.as_ref().as_ref())?;
                self.push()?;

                self.expr(lhs.as_ref().as_ref())?;
                self.pop("%rdi")?;

                match op {
                    BinOp::Add => emit!(self, "add", "%rdi, %rax"),
                    BinOp::Sub => emit!(self, "sub", "%rdi, %rax"),
                    BinOp::Mul => emit!(self, "imul", "%rdi, %rax"),

                    BinOp::Div => {
                        emit!(self, "cqo")?;
                        emit!(self, "idiv", "%rdi")
                    }

                    BinOp::Equal
                    | BinOp::NotEqual
                    | BinOp::Less
                    | BinOp::LessOrEqual => {
                        emit!(self, "cmp", "%rdi, %rax")?;

                        let set = match op {
                            BinOp::Equal => "sete",
                            BinOp::NotEqual => "setne",
                            BinOp::Less => "setl",
                            BinOp::LessOrEqual => "setle",
                            _ => unreachable!(),
                        };

                        emit!(self, set, "%al")?;
                        emit!(self, "movzb", "%al, %rax")
                    }
                }
            }
        }
    }

    /// Computa en `%rax` la dirección absoluta de un lvalue.
    ///
    /// Solo una referencia a variable nombra una dirección; cualquier
    /// otro nodo en esta posición es un bug del parser.
    fn addr(&mut self, expr: &Expr) -> io::Result<()> {
        match expr {
            Expr::Var(Local(index)) => {
                let offset = self.function.locals[*index as usize].offset;
                emit!(self, "lea", "{}(%rbp), %rax", offset)
            }

            _ => panic!("not an lvalue: {:?}", expr),
        }
    }

    fn push(&mut self) -> io::Result<()> {
        self.depth += 1;
        emit!(self, "push", "%rax")
    }

    fn pop(&mut self, register: &str) -> io::Result<()> {
        self.depth -= 1;
        emit!(self, "pop", "{}", register)
    }

    fn next_label(&mut self) -> u32 {
        self.labels += 1;
        self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{frame, lex, parse, source::Source};

    fn asm(text: &str) -> String {
        let source = Source::new("<test>", text);
        let tokens = lex::tokenize(&source).unwrap();
        let mut function = parse::parse(&tokens).unwrap();
        frame::layout(&mut function);

        let mut output = Vec::new();
        emit(&function, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn return_of_a_constant() {
        let expected = "\
.globl main
main:
\tpush    %rbp
\tmov     %rsp, %rbp
\tmov     $42, %rax
\tjmp     .L.return
.L.return:
\tmov     %rbp, %rsp
\tpop     %rbp
\tret
";

        assert_eq!(asm("return 42;"), expected);
    }

    #[test]
    fn frame_is_reserved_for_locals() {
        let output = asm("a=3; b=5; return a+b*2;");

        assert!(output.contains("sub     $16, %rsp"));
        assert!(output.contains("lea     -8(%rbp), %rax"));
        assert!(output.contains("lea     -16(%rbp), %rax"));
        assert!(output.contains("mov     %rax, (%rdi)"));
        assert!(output.contains("mov     (%rax), %rax"));
    }

    #[test]
    fn binary_operands_balance_the_stack() {
        let output = asm("return (1+2) * (3-4) / (5*6);");

        let pushes = output.matches("push    %rax").count();
        let pops = output.matches("pop     %rdi").count();
        assert_eq!(pushes, pops);
        assert_eq!(pushes, 5);
    }

    #[test]
    fn comparisons_set_a_byte_flag() {
        let output = asm("return 1 == 2;");
        assert!(output.contains("cmp     %rdi, %rax"));
        assert!(output.contains("sete    %al"));
        assert!(output.contains("movzb   %al, %rax"));

        // `>` se emite como `<` con operandos intercambiados
        let output = asm("return 2 > 1;");
        assert!(output.contains("setl    %al"));
    }

    #[test]
    fn division_sign_extends() {
        let output = asm("return 7 / 2;");
        assert!(output.contains("\tcqo\n\tidiv    %rdi"));
    }

    #[test]
    fn if_without_else_still_emits_both_labels() {
        let output = asm("if (1) 2;");

        assert!(output.contains("je      .L.else.1"));
        assert!(output.contains("jmp     .L.end.1"));
        assert!(output.contains(".L.else.1:\n.L.end.1:"));
    }

    #[test]
    fn nested_control_flow_gets_distinct_labels() {
        let output = asm("if (1) { if (2) 3; } else 4; for (;;) ;");

        assert!(output.contains(".L.else.1:"));
        assert!(output.contains(".L.else.2:"));
        assert!(output.contains(".L.begin.3:"));
        assert!(output.contains(".L.end.3:"));
    }

    #[test]
    fn for_loop_tests_before_the_body() {
        let output = asm("i=0; for (i=0; i<5; i=i+1) {} return i;");

        let begin = output.find(".L.begin.1:").unwrap();
        let test = output.find("je      .L.end.1").unwrap();
        let back = output.find("jmp     .L.begin.1").unwrap();
        assert!(begin < test && test < back);
    }

    #[test]
    fn condition_free_for_loops_unconditionally() {
        let output = asm("for (;;) ;");

        assert!(output.contains("jmp     .L.begin.1"));
        assert!(!output.contains("je      .L.end.1"));
        assert!(output.contains(".L.end.1:"));
    }

    #[test]
    fn every_return_shares_one_epilogue() {
        let output = asm("if (1) { return 5; } return 9;");

        assert_eq!(output.matches("jmp     .L.return").count(), 2);
        assert_eq!(output.matches(".L.return:").count(), 1);
        assert_eq!(output.matches("\tret\n").count(), 1);
    }

    #[test]
    fn empty_blocks_emit_nothing() {
        let plain = asm("return 1;");
        let with_blocks = asm("{} ; {{}} return 1;");

        assert_eq!(plain, with_blocks);
    }

    #[test]
    #[should_panic(expected = "not an lvalue")]
    fn assigning_to_a_constant_is_a_compiler_bug() {
        use crate::parse::{Expr, Function, Stmt, Variable};
        use crate::source::{Located, Location};

        // Un AST así no puede salir del parser; se construye a mano
        let source = Source::new("<test>", "1 = 2;");
        let at = |span| Location::at(&source, span);

        let target = Located::at(Expr::Num(1), at(0..1));
        let value = Located::at(Expr::Num(2), at(4..5));
        let assign = Located::at(
            Expr::Assign(Box::new(target), Box::new(value)),
            at(0..5),
        );

        let function = Function {
            body: vec![Stmt::Expr(assign)],
            locals: Vec::<Variable>::new(),
            stack_size: 0,
        };

        let _ = emit(&function, &mut Vec::new());
    }
}
