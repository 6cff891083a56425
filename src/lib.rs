//! Compilador mínimo de expresiones y sentencias.
//!
//! # Front end
//! Cada programa es una única cadena de texto. Esta se somete
//! primero a análisis léxico en [`lex`], de lo cual se obtiene una
//! secuencia de tokens. La secuencia se dispone en un AST por medio
//! de análisis sintáctico en [`parse`], fase que además construye
//! la tabla de variables locales, con lo cual concluyen las fases
//! delanteras del compilador.
//!
//! # Back end
//! En esta sección el compilador deja de ser agnóstico al sistema
//! objetivo. Primero [`frame`] asigna a cada variable un offset
//! dentro del stack frame y calcula el tamaño total alineado.
//! Luego [`codegen`] recorre el AST emitiendo ensamblador x86-64
//! en sintaxis AT&T para una única función `main`; el ensamblado
//! y enlazado quedan delegados a la toolchain del sistema.

#[macro_use]
mod macros;

pub mod codegen;
pub mod error;
pub mod frame;
pub mod lex;
pub mod parse;
pub mod source;
