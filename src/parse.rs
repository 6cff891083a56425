//! Análisis sintáctico.
//!
//! Descenso recursivo clásico: un método por regla gramatical.
//! Los niveles binarios se pliegan iterativamente (asociatividad
//! izquierda), mientras que la asignación se parsea a sí misma por
//! la derecha (asociatividad derecha). Las variables se declaran
//! implícitamente en su primer uso y quedan registradas en la tabla
//! de símbolos de la función, en orden de aparición.

use thiserror::Error;

use crate::{
    lex::{Identifier, Keyword, Token},
    source::{Located, Location},
};

/// Una función compilada: cuerpo, tabla de variables y tamaño de frame.
///
/// `stack_size` permanece en cero hasta que [`crate::frame::layout`]
/// asigna offsets y calcula el total alineado.
#[derive(Debug)]
pub struct Function {
    pub body: Vec<Stmt>,
    pub locals: Vec<Variable>,
    pub stack_size: i64,
}

/// Una variable local con su offset de frame asignado.
///
/// El offset es relativo a `%rbp` y por tanto negativo; vale cero
/// hasta que la fase de layout lo determina.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: Identifier,
    pub offset: i64,
}

/// Índice de una variable dentro de la tabla de su función.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Local(pub u32);

#[derive(Debug)]
pub enum Stmt {
    Expr(Located<Expr>),

    Block(Vec<Stmt>),

    If {
        condition: Located<Expr>,
        then: Box<Stmt>,
        orelse: Option<Box<Stmt>>,
    },

    For {
        init: Option<Located<Expr>>,
        condition: Option<Located<Expr>>,
        step: Option<Located<Expr>>,
        body: Box<Stmt>,
    },

    Return(Located<Expr>),
}

#[derive(Debug)]
pub enum Expr {
    Num(i64),
    Var(Local),
    Neg(Box<Located<Expr>>),
    Binary(Box<Located<Expr>>, BinOp, Box<Located<Expr>>),
    Assign(Box<Located<Expr>>, Box<Located<Expr>>),
}

/// Operadores binarios del AST.
///
/// No existen variantes para `>` ni `>=`: el parser las reduce a
/// [`BinOp::Less`] y [`BinOp::LessOrEqual`] intercambiando operandos,
/// de modo que el generador solo conoce cuatro comparaciones.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Expected {0}, found {1} instead")]
    UnexpectedToken(Token, Token),

    #[error("Expected an expression")]
    ExpectedExpr,
}

pub fn parse(tokens: &[Located<Token>]) -> Result<Function, Located<ParserError>> {
    let mut parser = Parser {
        tokens,
        position: 0,
        locals: Vec::new(),
    };

    let body = parser.program()?;
    let locals = parser
        .locals
        .into_iter()
        .map(|name| Variable { name, offset: 0 })
        .collect();

    Ok(Function {
        body,
        locals,
        stack_size: 0,
    })
}

/// Cursor sobre la secuencia de tokens.
///
/// El [`Token::Eof`] final es pegajoso: el cursor nunca avanza más
/// allá de él, por lo cual siempre existe un token actual sobre el
/// cual reportar errores.
struct Parser<'a> {
    tokens: &'a [Located<Token>],
    position: usize,
    locals: Vec<Identifier>,
}

type Parse<T> = Result<T, Located<ParserError>>;

impl Parser<'_> {
    // program = stmt*
    fn program(&mut self) -> Parse<Vec<Stmt>> {
        let mut statements = Vec::new();
        while *self.peek().as_ref() != Token::Eof {
            statements.push(self.stmt()?);
        }

        Ok(statements)
    }

    // stmt = "return" expr ";"
    //      | "if" "(" expr ")" stmt ("else" stmt)?
    //      | "for" "(" expr? ";" expr? ";" expr? ")" stmt
    //      | "{" stmt* "}"
    //      | expr? ";"
    fn stmt(&mut self) -> Parse<Stmt> {
        match self.peek().as_ref() {
            Token::Keyword(Keyword::Return) => self.return_stmt(),
            Token::Keyword(Keyword::If) => self.if_stmt(),
            Token::Keyword(Keyword::For) => self.for_stmt(),
            Token::OpenCurly => self.block(),

            // La sentencia vacía equivale a un bloque vacío
            Token::Semicolon => {
                self.advance();
                Ok(Stmt::Block(Vec::new()))
            }

            _ => {
                let expr = self.expr()?;
                self.expect(Token::Semicolon)?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn return_stmt(&mut self) -> Parse<Stmt> {
        self.keyword(Keyword::Return)?;
        let expr = self.expr()?;
        self.expect(Token::Semicolon)?;

        Ok(Stmt::Return(expr))
    }

    fn if_stmt(&mut self) -> Parse<Stmt> {
        self.keyword(Keyword::If)?;

        self.expect(Token::OpenParen)?;
        let condition = self.expr()?;
        self.expect(Token::CloseParen)?;

        let then = Box::new(self.stmt()?);
        let orelse = if self.eat(&Token::Keyword(Keyword::Else)) {
            Some(Box::new(self.stmt()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then,
            orelse,
        })
    }

    fn for_stmt(&mut self) -> Parse<Stmt> {
        self.keyword(Keyword::For)?;
        self.expect(Token::OpenParen)?;

        let init = self.optional_expr(Token::Semicolon)?;
        self.expect(Token::Semicolon)?;

        let condition = self.optional_expr(Token::Semicolon)?;
        self.expect(Token::Semicolon)?;

        let step = self.optional_expr(Token::CloseParen)?;
        self.expect(Token::CloseParen)?;

        let body = Box::new(self.stmt()?);

        Ok(Stmt::For {
            init,
            condition,
            step,
            body,
        })
    }

    fn block(&mut self) -> Parse<Stmt> {
        self.expect(Token::OpenCurly)?;

        let mut statements = Vec::new();
        while !self.eat(&Token::CloseCurly) {
            statements.push(self.stmt()?);
        }

        Ok(Stmt::Block(statements))
    }

    /// Una expresión que puede estar ausente si sigue `terminator`.
    fn optional_expr(&mut self, terminator: Token) -> Parse<Option<Located<Expr>>> {
        if *self.peek().as_ref() == terminator {
            Ok(None)
        } else {
            Ok(Some(self.expr()?))
        }
    }

    // expr = assign
    fn expr(&mut self) -> Parse<Located<Expr>> {
        self.assign()
    }

    // assign = equality ("=" assign)?
    fn assign(&mut self) -> Parse<Located<Expr>> {
        let target = self.equality()?;

        if self.eat(&Token::Assign) {
            let value = self.assign()?;
            Ok(binary_span(target, value, Expr::Assign))
        } else {
            Ok(target)
        }
    }

    // equality = relational (("==" | "!=") relational)*
    fn equality(&mut self) -> Parse<Located<Expr>> {
        let mut node = self.relational()?;

        loop {
            let op = match self.peek().as_ref() {
                Token::Equal => BinOp::Equal,
                Token::NotEqual => BinOp::NotEqual,
                _ => break Ok(node),
            };

            self.advance();
            let rhs = self.relational()?;
            node = binary_span(node, rhs, |lhs, rhs| Expr::Binary(lhs, op, rhs));
        }
    }

    // relational = add (("<" | "<=" | ">" | ">=") add)*
    //
    // `>` y `>=` no existen en el AST: se emiten como `<` y `<=`
    // con los operandos intercambiados.
    fn relational(&mut self) -> Parse<Located<Expr>> {
        let mut node = self.add()?;

        loop {
            let (op, swap) = match self.peek().as_ref() {
                Token::Less => (BinOp::Less, false),
                Token::LessOrEqual => (BinOp::LessOrEqual, false),
                Token::Greater => (BinOp::Less, true),
                Token::GreaterOrEqual => (BinOp::LessOrEqual, true),
                _ => break Ok(node),
            };

            self.advance();
            let rhs = self.add()?;

            node = binary_span(node, rhs, |lhs, rhs| {
                if swap {
                    Expr::Binary(rhs, op, lhs)
                } else {
                    Expr::Binary(lhs, op, rhs)
                }
            });
        }
    }

    // add = mul (("+" | "-") mul)*
    fn add(&mut self) -> Parse<Located<Expr>> {
        let mut node = self.mul()?;

        loop {
            let op = match self.peek().as_ref() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break Ok(node),
            };

            self.advance();
            let rhs = self.mul()?;
            node = binary_span(node, rhs, |lhs, rhs| Expr::Binary(lhs, op, rhs));
        }
    }

    // mul = unary (("*" | "/") unary)*
    fn mul(&mut self) -> Parse<Located<Expr>> {
        let mut node = self.unary()?;

        loop {
            let op = match self.peek().as_ref() {
                Token::Times => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break Ok(node),
            };

            self.advance();
            let rhs = self.unary()?;
            node = binary_span(node, rhs, |lhs, rhs| Expr::Binary(lhs, op, rhs));
        }
    }

    // unary = ("+" | "-") unary | primary
    fn unary(&mut self) -> Parse<Located<Expr>> {
        match self.peek().as_ref() {
            // `+` unario no afecta al signo
            Token::Plus => {
                self.advance();
                self.unary()
            }

            Token::Minus => {
                let minus = self.advance().location().clone();
                let operand = self.unary()?;

                let location = Location::span(minus, operand.location());
                Ok(Located::at(Expr::Neg(Box::new(operand)), location))
            }

            _ => self.primary(),
        }
    }

    // primary = "(" expr ")" | ident | num
    fn primary(&mut self) -> Parse<Located<Expr>> {
        let token = self.peek().clone();
        match token.as_ref() {
            Token::OpenParen => {
                self.advance();
                let expr = self.expr()?;
                self.expect(Token::CloseParen)?;

                Ok(expr)
            }

            Token::Num(value) => {
                self.advance();
                Ok(Located::at(Expr::Num(*value), token.location().clone()))
            }

            Token::Id(id) => {
                self.advance();
                let local = self.variable(id);

                Ok(Located::at(Expr::Var(local), token.location().clone()))
            }

            _ => Err(Located::at(
                ParserError::ExpectedExpr,
                token.location().clone(),
            )),
        }
    }

    /// Resuelve un identificador contra la tabla de símbolos.
    ///
    /// El primer uso de un nombre lo declara; usos posteriores
    /// reutilizan la misma entrada por igualdad exacta de nombre.
    fn variable(&mut self, id: &Identifier) -> Local {
        let index = self
            .locals
            .iter()
            .position(|known| known == id)
            .unwrap_or_else(|| {
                self.locals.push(id.clone());
                self.locals.len() - 1
            });

        Local(index as u32)
    }

    fn keyword(&mut self, keyword: Keyword) -> Parse<()> {
        self.expect(Token::Keyword(keyword))
    }

    fn expect(&mut self, expected: Token) -> Parse<()> {
        let found = self.peek();
        if *found.as_ref() == expected {
            self.advance();
            Ok(())
        } else {
            Err(Located::at(
                ParserError::UnexpectedToken(expected, found.as_ref().clone()),
                found.location().clone(),
            ))
        }
    }

    /// Consume el token actual solo si coincide.
    fn eat(&mut self, token: &Token) -> bool {
        if self.peek().as_ref() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn peek(&self) -> &Located<Token> {
        &self.tokens[self.position]
    }

    fn advance(&mut self) -> &Located<Token> {
        let current = &self.tokens[self.position];
        if *current.as_ref() != Token::Eof {
            self.position += 1;
        }

        current
    }
}

/// Construye un nodo binario cuya ubicación abarca ambos operandos.
fn binary_span<F>(lhs: Located<Expr>, rhs: Located<Expr>, build: F) -> Located<Expr>
where
    F: FnOnce(Box<Located<Expr>>, Box<Located<Expr>>) -> Expr,
{
    let location = Location::span(lhs.location().clone(), rhs.location());
    Located::at(build(Box::new(lhs), Box::new(rhs)), location)
}
