//! Reporte de diagnósticos fatales.
//!
//! La compilación es todo-o-nada: el primer error léxico o
//! sintáctico la aborta sin emitir ensamblador. Este módulo
//! toma ese único error, ya anotado con su ubicación, y lo
//! presenta junto a la línea de código ofensiva y un subrayado
//! de acento circunflejo bajo el token que lo causó.

use crate::source::{Located, Location};
use std::{
    error::Error,
    fmt::{self, Display},
};

mod sealed {
    pub trait Sealed {}
}

/// Un error con ubicación conocida en el programa fuente.
pub trait LocatedError: sealed::Sealed {
    fn source(&self) -> &dyn Error;
    fn location(&self) -> &Location;
}

/// Reporte final de una compilación fallida.
pub struct Diagnostics {
    kind: &'static str,
    error: Box<dyn 'static + LocatedError>,
}

impl Diagnostics {
    /// Cambia la categoría que encabeza el reporte.
    pub fn kind(self, kind: &'static str) -> Self {
        Diagnostics { kind, ..self }
    }
}

impl<E: 'static + LocatedError> From<E> for Diagnostics {
    fn from(error: E) -> Self {
        Diagnostics {
            kind: "error",
            error: Box::new(error),
        }
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostics { kind, error } = self;

        writeln!(fmt, "{}: {}", kind, error.source())?;

        let location = error.location();
        writeln!(fmt, " --> {}", location)?;

        let line_number = location.position().line();
        let digits = line_number.to_string().chars().count();

        let (line, skip) = location.line();
        let highlight = location.width();

        writeln!(fmt, "{:digits$} |", "")?;
        writeln!(fmt, "{:>digits$} | {}", line_number, line)?;
        writeln!(
            fmt,
            "{:digits$} | {:skip$}{:^<highlight$}",
            "",
            "",
            "",
            digits = digits,
            skip = skip,
            highlight = highlight
        )?;

        writeln!(fmt, "{:digits$} = token: {:?}", "", location.text())?;

        writeln!(fmt)?;
        writeln!(fmt, "Build failed with 1 error")
    }
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn source(&self) -> &dyn Error {
        self.as_ref()
    }

    fn location(&self) -> &Location {
        Located::location(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Source;
    use thiserror::Error;

    #[derive(Error, Debug)]
    #[error("something went wrong")]
    struct Oops;

    #[test]
    fn report_underlines_the_token() {
        let source = Source::new("<test>", "1 $ 2");
        let error = Located::at(Oops, Location::at(&source, 2..3));

        let report = Diagnostics::from(error).kind("Lexical error").to_string();
        assert!(report.starts_with("Lexical error: something went wrong\n"));
        assert!(report.contains(" --> <test>:1:3\n"));
        assert!(report.contains("1 | 1 $ 2\n"));
        assert!(report.contains("  |   ^\n"));
        assert!(report.contains("token: \"$\""));
        assert!(report.ends_with("Build failed with 1 error\n"));
    }
}
