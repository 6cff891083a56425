//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone el texto del
//! programa en unidades léxicas denominadas tokens. Los espacios en
//! blanco se descartan durante esta operación. Cada token emitido
//! está asociado a una ubicación en el código fuente original, lo
//! cual permite rastrear errores tanto en los mismos como en
//! constructos más elevados de fases posteriores.
//!
//! # Contenido de un token
//! Operadores y puntuación se identifican por el hecho de lo que son
//! y no incluyen lexemas. Los identificadores sí incluyen su lexema
//! original. Las constantes literales se resuelven a sus valores en
//! vez de preservar sus lexemas.
//!
//! # Reglas importantes del lenguaje
//! - Los identificadores empiezan con letra o `'_'` y continúan con
//!   letras, dígitos o `'_'` (munch máximo).
//! - Las palabras reservadas (`return`, `if`, `else`, `for`) se
//!   reclasifican en una pasada posterior a la tokenización, nunca
//!   durante el escaneo. Así un identificador que apenas comienza
//!   con una palabra reservada jamás se confunde con ella.
//! - Los operadores de dos caracteres (`==`, `!=`, `<=`, `>=`) se
//!   reconocen con prioridad sobre los de un carácter.
//!
//! # Errores
//! El primer error aborta el análisis. No hay recuperación: ninguna
//! fase posterior debe ejecutarse sobre una secuencia incompleta.

use crate::source::{Located, Location, Source};
use std::{
    fmt::{self, Display},
    iter::Peekable,
    rc::Rc,
    str::{CharIndices, FromStr},
};

use thiserror::Error;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Carácter desconocido o inesperado en la entrada.
    #[error("Bad character {0:?} in input")]
    BadChar(char),

    /// Una constante entera se encuentra fuera de rango.
    #[error("Integer literal overflow, valid range is [0, {}]", i64::MAX)]
    IntOverflow,
}

/// Un identificador.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(Rc<str>);

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_ref().fmt(fmt)
    }
}

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir
/// completamente a una entidad léxica en el programa fuente.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identificador.
    Id(Identifier),

    /// Palabra clave.
    Keyword(Keyword),

    /// Literal de entero.
    Num(i64),

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `/`
    Slash,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `{`
    OpenCurly,

    /// `}`
    CloseCurly,

    /// `,`
    Comma,

    /// `;`
    Semicolon,

    /// `=`
    Assign,

    /// `==`
    Equal,

    /// `!=`
    NotEqual,

    /// `<`
    Less,

    /// `<=`
    LessOrEqual,

    /// `>`
    Greater,

    /// `>=`
    GreaterOrEqual,

    /// Fin de la entrada.
    ///
    /// La secuencia de tokens termina con exactamente uno de estos.
    Eof,
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Id(id) => write!(fmt, "identifier `{}`", id),
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            Num(integer) => write!(fmt, "literal `{}`", integer),
            Plus => fmt.write_str("`+`"),
            Minus => fmt.write_str("`-`"),
            Times => fmt.write_str("`*`"),
            Slash => fmt.write_str("`/`"),
            OpenParen => fmt.write_str("`(`"),
            CloseParen => fmt.write_str("`)`"),
            OpenCurly => fmt.write_str("`{`"),
            CloseCurly => fmt.write_str("`}`"),
            Comma => fmt.write_str("`,`"),
            Semicolon => fmt.write_str("`;`"),
            Assign => fmt.write_str("`=`"),
            Equal => fmt.write_str("`==`"),
            NotEqual => fmt.write_str("`!=`"),
            Less => fmt.write_str("`<`"),
            LessOrEqual => fmt.write_str("`<=`"),
            Greater => fmt.write_str("`>`"),
            GreaterOrEqual => fmt.write_str("`>=`"),
            Eof => fmt.write_str("end of input"),
        }
    }
}

/// Una palabra clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Return,
    If,
    Else,
    For,
}

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Keyword::*;
        let string = match self {
            Return => "return",
            If => "if",
            Else => "else",
            For => "for",
        };

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        use Keyword::*;

        const KEYWORDS: &[(&str, Keyword)] = &[
            ("return", Return),
            ("if", If),
            ("else", Else),
            ("for", For),
        ];

        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == string)
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Reduce la entrada a una secuencia de tokens o al primer error.
///
/// La secuencia resultante siempre termina con [`Token::Eof`], cuya
/// ubicación es el rango vacío al final del texto. Tras el escaneo,
/// una única pasada de corrección reclasifica como palabras clave a
/// los identificadores que coinciden exactamente con una reservada.
pub fn tokenize(source: &Rc<Source>) -> Result<Vec<Located<Token>>, Located<LexerError>> {
    let lexer = Lexer {
        source,
        chars: source.text().char_indices().peekable(),
    };

    let mut tokens = lexer.scan()?;

    for token in &mut tokens {
        if let Token::Id(id) = token.as_ref() {
            if let Ok(keyword) = Keyword::from_str(id.as_ref()) {
                let location = token.location().clone();
                *token = Located::at(Token::Keyword(keyword), location);
            }
        }
    }

    let end = source.text().len();
    tokens.push(Located::at(Token::Eof, Location::at(source, end..end)));

    Ok(tokens)
}

/// Escáner de una sola pasada, con lookahead de un carácter.
struct Lexer<'a> {
    source: &'a Rc<Source>,
    chars: Peekable<CharIndices<'a>>,
}

impl Lexer<'_> {
    fn scan(mut self) -> Result<Vec<Located<Token>>, Located<LexerError>> {
        let mut tokens = Vec::new();

        while let Some(&(start, c)) = self.chars.peek() {
            if c.is_ascii_whitespace() {
                self.chars.next();
                continue;
            }

            let token = if c.is_ascii_digit() {
                self.number(start)?
            } else if is_word_start(c) {
                self.word(start)
            } else {
                self.punctuator(start, c)?
            };

            tokens.push(token);
        }

        Ok(tokens)
    }

    /// Acumulación dígito por dígito de una constante entera.
    fn number(&mut self, start: usize) -> Result<Located<Token>, Located<LexerError>> {
        let mut value: i64 = 0;
        let mut end = start;

        while let Some(&(offset, digit)) = self.chars.peek() {
            if !digit.is_ascii_digit() {
                break;
            }

            let digit = digit.to_digit(10).unwrap() as i64;
            value = value
                .checked_mul(10)
                .and_then(|n| n.checked_add(digit))
                .ok_or_else(|| {
                    Located::at(
                        LexerError::IntOverflow,
                        Location::at(self.source, start..offset + 1),
                    )
                })?;

            end = offset + 1;
            self.chars.next();
        }

        Ok(Located::at(
            Token::Num(value),
            Location::at(self.source, start..end),
        ))
    }

    /// Término que puede resultar identificador o palabra clave.
    ///
    /// Aquí siempre se emite un identificador; la reclasificación
    /// ocurre después, sobre la secuencia completa.
    fn word(&mut self, start: usize) -> Located<Token> {
        let mut end = start;
        while let Some(&(offset, c)) = self.chars.peek() {
            if !is_word_char(c) {
                break;
            }

            end = offset + c.len_utf8();
            self.chars.next();
        }

        let text = &self.source.text()[start..end];
        Located::at(
            Token::Id(Identifier(Rc::from(text))),
            Location::at(self.source, start..end),
        )
    }

    /// Puntuación, probando primero los operadores de dos caracteres.
    fn punctuator(&mut self, start: usize, c: char) -> Result<Located<Token>, Located<LexerError>> {
        use Token::*;

        self.chars.next();
        let followed_by_equal = matches!(self.chars.peek(), Some(&(_, '=')));

        let (token, len) = match (c, followed_by_equal) {
            ('=', true) => (Equal, 2),
            ('!', true) => (NotEqual, 2),
            ('<', true) => (LessOrEqual, 2),
            ('>', true) => (GreaterOrEqual, 2),
            ('=', false) => (Assign, 1),
            ('<', false) => (Less, 1),
            ('>', false) => (Greater, 1),
            ('+', _) => (Plus, 1),
            ('-', _) => (Minus, 1),
            ('*', _) => (Times, 1),
            ('/', _) => (Slash, 1),
            ('(', _) => (OpenParen, 1),
            (')', _) => (CloseParen, 1),
            ('{', _) => (OpenCurly, 1),
            ('}', _) => (CloseCurly, 1),
            (',', _) => (Comma, 1),
            (';', _) => (Semicolon, 1),

            _ => {
                return Err(Located::at(
                    LexerError::BadChar(c),
                    Location::at(self.source, start..start + c.len_utf8()),
                ))
            }
        };

        if len == 2 {
            self.chars.next();
        }

        Ok(Located::at(token, Location::at(self.source, start..start + len)))
    }
}

/// Determina si un carácter puede iniciar un término.
fn is_word_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Determina si un carácter puede pertenecer a un término.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Result<Vec<Token>, LexerError> {
        let source = Source::new("<test>", text);
        match tokenize(&source) {
            Ok(tokens) => Ok(tokens.into_iter().map(Located::into_inner).collect()),
            Err(error) => Err(error.into_inner()),
        }
    }

    #[test]
    fn scans_a_statement() {
        use Token::*;

        let scanned = tokens("a = 3 * (b + 14);").unwrap();
        assert_eq!(
            scanned,
            vec![
                Id(Identifier(Rc::from("a"))),
                Assign,
                Num(3),
                Times,
                OpenParen,
                Id(Identifier(Rc::from("b"))),
                Plus,
                Num(14),
                CloseParen,
                Semicolon,
                Eof,
            ]
        );
    }

    #[test]
    fn two_character_operators_win() {
        use Token::*;

        let scanned = tokens("<= < == = >= > !=").unwrap();
        assert_eq!(
            scanned,
            vec![
                LessOrEqual,
                Less,
                Equal,
                Assign,
                GreaterOrEqual,
                Greater,
                NotEqual,
                Eof,
            ]
        );
    }

    #[test]
    fn keywords_are_fixed_up_after_scanning() {
        use Token::*;

        let scanned = tokens("return returnx; if iffy else fortune for").unwrap();
        assert_eq!(
            scanned,
            vec![
                Keyword(super::Keyword::Return),
                Id(Identifier(Rc::from("returnx"))),
                Semicolon,
                Keyword(super::Keyword::If),
                Id(Identifier(Rc::from("iffy"))),
                Keyword(super::Keyword::Else),
                Id(Identifier(Rc::from("fortune"))),
                Keyword(super::Keyword::For),
                Eof,
            ]
        );
    }

    #[test]
    fn ends_with_exactly_one_eof() {
        let scanned = tokens("").unwrap();
        assert_eq!(scanned, vec![Token::Eof]);
    }

    #[test]
    fn rejects_bad_characters() {
        assert!(matches!(tokens("1 $ 2"), Err(LexerError::BadChar('$'))));
        assert!(matches!(tokens("1 ! 2"), Err(LexerError::BadChar('!'))));
    }

    #[test]
    fn rejects_integer_overflow() {
        assert!(matches!(
            tokens("9223372036854775808"),
            Err(LexerError::IntOverflow)
        ));

        assert!(matches!(
            tokens("9223372036854775807").unwrap().as_slice(),
            [Token::Num(i64::MAX), Token::Eof]
        ));
    }

    #[test]
    fn bad_character_location_is_exact() {
        let source = Source::new("<test>", "1 $ 2");
        let error = tokenize(&source).unwrap_err();
        assert_eq!(error.location().text(), "$");
        assert_eq!(error.location().position().column(), 3);
    }
}
