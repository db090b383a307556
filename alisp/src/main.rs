#[macro_use]
extern crate clap;

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Arg;
use thiserror::Error;

#[derive(Debug, Error)]
enum Error {
    #[error("Reading source file \"{0}\" failed: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("{0}")]
    Translate(#[from] alisp::TranslateError),
    #[error("Writing code file \"{0}\" failed: {1}")]
    Write(PathBuf, acode::Error),
}

fn main() {
    let matches = app_from_crate!()
        .arg(
            Arg::with_name("SOURCE")
                .help("Sets the source file to translate")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("TARGET")
                .help("Sets the code file to write")
                .required(true)
                .index(2),
        )
        .get_matches();

    let source = matches.value_of("SOURCE").unwrap();
    let target = matches.value_of("TARGET").unwrap();

    if let Err(err) = run(source, target) {
        eprintln!("{}", err);
        process::exit(1);
    }
}

fn run(source: &str, target: &str) -> Result<(), Error> {
    let text = fs::read_to_string(source)
        .map_err(|err| Error::Read(PathBuf::from(source), err))?;

    let program = alisp::translate(&text)?;

    acode::write_file(target, &program)
        .map_err(|err| Error::Write(PathBuf::from(target), err))?;

    println!(
        "source LoC: {} code instr: {}",
        text.split('\n').count(),
        program.code().len() + 1
    );
    Ok(())
}
