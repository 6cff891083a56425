//! Disposición del stack frame.
//!
//! Cada variable local ocupa una ranura de 8 bytes bajo `%rbp`.
//! La asignación es determinista: la variable *i* en orden de
//! aparición recibe el offset `-8 * (i + 1)`, y el tamaño total
//! del frame se redondea hacia arriba a la frontera de 16 bytes
//! que exige la ABI de x86-64.

use crate::parse::Function;

/// Bytes que ocupa una variable local.
const SLOT_SIZE: i64 = 8;

/// Frontera de alineamiento del stack.
const STACK_ALIGN: i64 = 16;

/// Asigna offsets a las variables y calcula el tamaño del frame.
///
/// Operación pura y sin modos de falla: el resultado depende
/// únicamente del orden de la tabla de variables.
pub fn layout(function: &mut Function) {
    let mut offset = 0;
    for variable in &mut function.locals {
        offset -= SLOT_SIZE;
        variable.offset = offset;
    }

    function.stack_size = align_to(-offset, STACK_ALIGN);
}

/// Redondea `n` hacia arriba al múltiplo de `align` más cercano.
fn align_to(n: i64, align: i64) -> i64 {
    (n + align - 1) / align * align
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex, parse, source::Source};

    fn laid_out(text: &str) -> Function {
        let source = Source::new("<test>", text);
        let tokens = lex::tokenize(&source).unwrap();
        let mut function = parse::parse(&tokens).unwrap();
        layout(&mut function);
        function
    }

    #[test]
    fn offsets_grow_downwards_in_declaration_order() {
        let function = laid_out("a=1; b=2; c=a+b;");

        let offsets: Vec<i64> = function.locals.iter().map(|v| v.offset).collect();
        assert_eq!(offsets, vec![-8, -16, -24]);
    }

    #[test]
    fn frame_size_is_aligned_to_sixteen() {
        assert_eq!(laid_out("return 0;").stack_size, 0);
        assert_eq!(laid_out("a=1; return a;").stack_size, 16);
        assert_eq!(laid_out("a=1; b=2; return a+b;").stack_size, 16);
        assert_eq!(laid_out("a=1; b=2; c=3; return c;").stack_size, 32);
    }

    #[test]
    fn frame_covers_every_local() {
        let function = laid_out("a=1; b=2; c=3; d=4; e=5;");

        assert_eq!(function.stack_size % 16, 0);
        assert!(function.stack_size >= 8 * function.locals.len() as i64);
    }

    #[test]
    fn align_to_rounds_up() {
        assert_eq!(align_to(0, 16), 0);
        assert_eq!(align_to(8, 16), 16);
        assert_eq!(align_to(16, 16), 16);
        assert_eq!(align_to(24, 16), 32);
    }
}
