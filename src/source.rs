//! Rastreo de ubicaciones originales en código fuente.
//!
//! Los distintos objetos internos que el compilador construye
//! deben llevar cuenta de rangos de posiciones en el código
//! fuente original, lo cual permite señalar un punto exacto
//! en donde ocurre un error de abstracción arbitraria.
//!
//! A diferencia de un compilador que lee archivos, aquí el
//! programa completo llega como una única cadena en memoria,
//! por lo cual una ubicación es simplemente un rango de bytes
//! dentro de esa cadena junto a una referencia compartida al
//! origen.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::Range,
    rc::Rc,
};

/// Un objeto cualquiera con una ubicación original asociada.
#[derive(Debug, Clone)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    /// Construye a partir de un valor y una ubicación.
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }

    /// Obtiene la ubicación.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Descarta la ubicación y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Nombre de origen y texto completo del programa.
pub struct Source {
    name: String,
    text: String,
}

impl Source {
    /// Crea un origen compartible a partir de su nombre y contenido.
    pub fn new<N: Into<String>, T: Into<String>>(name: N, text: T) -> Rc<Self> {
        Rc::new(Source {
            name: name.into(),
            text: text.into(),
        })
    }

    /// Obtiene el texto completo.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Una ubicación está conformada por un origen y un rango de bytes.
#[derive(Clone)]
pub struct Location {
    from: Rc<Source>,
    span: Range<usize>,
}

impl Location {
    /// Construye una ubicación dentro de un origen.
    pub fn at(from: &Rc<Source>, span: Range<usize>) -> Self {
        Location {
            from: Rc::clone(from),
            span,
        }
    }

    /// Unifica un rango de ubicaciones. Se asume el mismo origen.
    pub fn span(from: Location, to: &Location) -> Self {
        Location {
            from: from.from,
            span: from.span.start..to.span.end,
        }
    }

    /// Obtiene el fragmento de texto que cubre esta ubicación.
    pub fn text(&self) -> &str {
        &self.from.text[self.span.clone()]
    }

    /// Posición línea-columna del inicio del rango.
    pub fn position(&self) -> Position {
        let before = &self.from.text[..self.span.start];
        let line = before.matches('\n').count() as u32 + 1;
        let column = before
            .rsplit('\n')
            .next()
            .map(|rest| rest.chars().count() as u32 + 1)
            .unwrap_or(1);

        Position { line, column }
    }

    /// Línea completa de texto que contiene el inicio del rango.
    ///
    /// También se obtiene el índice de columna (en caracteres, base
    /// cero) donde comienza el rango dentro de esa línea, lo cual
    /// permite subrayar el fragmento exacto.
    pub fn line(&self) -> (&str, usize) {
        let text = self.from.text.as_str();
        let start = text[..self.span.start]
            .rfind('\n')
            .map(|index| index + 1)
            .unwrap_or(0);

        let end = text[self.span.start..]
            .find('\n')
            .map(|index| self.span.start + index)
            .unwrap_or(text.len());

        let column = text[start..self.span.start].chars().count();
        (&text[start..end], column)
    }

    /// Longitud del rango en caracteres, nunca menor a uno.
    pub fn width(&self) -> usize {
        self.text().chars().count().max(1)
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.from.name, self.position())
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Una posición línea-columna en el programa fuente.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    /// Obtiene el número de línea.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Obtiene el número de columna.
    pub fn column(&self) -> u32 {
        self.column
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_counts_lines_and_columns() {
        let source = Source::new("<test>", "abc\ndef");
        let location = Location::at(&source, 5..6);

        let position = location.position();
        assert_eq!(position.line(), 2);
        assert_eq!(position.column(), 2);
        assert_eq!(location.text(), "e");
    }

    #[test]
    fn line_recovers_context() {
        let source = Source::new("<test>", "a = 1;\nb = 2;");
        let location = Location::at(&source, 11..12);

        let (line, column) = location.line();
        assert_eq!(line, "b = 2;");
        assert_eq!(column, 4);
    }

    #[test]
    fn span_joins_ranges() {
        let source = Source::new("<test>", "1 + 23");
        let from = Location::at(&source, 0..1);
        let to = Location::at(&source, 4..6);

        let joined = Location::span(from, &to);
        assert_eq!(joined.text(), "1 + 23");
        assert_eq!(joined.width(), 6);
    }
}
