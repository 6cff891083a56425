//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! compilación y expone una CLI. Los errores de compilación se
//! reportan a stderr y terminan el proceso con estado distinto
//! de cero, sin haber emitido ensamblador alguno.

use anyhow::Context;
use clap::{crate_version, Arg, Command};
use minicc::{codegen, error::Diagnostics, frame, lex, parse, source::Source};

use std::{fs::File, io::Write, process};

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = Command::new("minicc")
        .version(crate_version!())
        .arg(
            Arg::new("source")
                .value_name("SOURCE")
                .required(true)
                .help("Program text to compile"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .takes_value(true)
                .value_name("FILE")
                .default_value("-")
                .help("Output file ('-' for stdout)"),
        )
        .get_matches();

    let text = args.get_one::<String>("source").unwrap();
    let output = args.get_one::<String>("output").unwrap();

    let source = Source::new("<args>", text.as_str());

    // Fases delanteras: cualquier error aborta antes de emitir
    let diagnostics = match compile(&source) {
        Ok(function) => {
            return match output.as_str() {
                "-" => {
                    let stdout = std::io::stdout();
                    write(&function, &mut stdout.lock()).context("Failed to emit to stdout")
                }

                path => {
                    let mut file = File::create(path)
                        .with_context(|| format!("Failed to open for writing: {}", path))?;

                    write(&function, &mut file)
                        .with_context(|| format!("Failed to emit to file: {}", path))
                }
            };
        }

        Err(diagnostics) => diagnostics,
    };

    eprint!("{}", diagnostics);
    process::exit(1);
}

/// Ejecuta tokenización, parsing y layout de frame.
fn compile(source: &std::rc::Rc<Source>) -> Result<parse::Function, Diagnostics> {
    let tokens = lex::tokenize(source)
        .map_err(|error| Diagnostics::from(error).kind("Lexical error"))?;

    let mut function = parse::parse(&tokens)
        .map_err(|error| Diagnostics::from(error).kind("Syntax error"))?;

    frame::layout(&mut function);
    Ok(function)
}

fn write<W: Write>(function: &parse::Function, output: &mut W) -> anyhow::Result<()> {
    codegen::emit(function, output)?;
    Ok(())
}
