#[macro_use]
extern crate clap;

use std::path::Path;
use std::process;

use clap::Arg;

use amach::StopReason;

fn main() {
    env_logger::init();

    let matches = app_from_crate!()
        .arg(
            Arg::with_name("CODE")
                .help("Sets the program file to run")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("INPUT")
                .help("Sets the input file to feed to the machine")
                .required(true)
                .index(2),
        )
        .arg(
            Arg::with_name("DEBUG")
                .help("Sets the file to write the execution trace to")
                .index(3),
        )
        .get_matches();

    let code = Path::new(matches.value_of("CODE").unwrap());
    let input = Path::new(matches.value_of("INPUT").unwrap());
    let debug = matches.value_of("DEBUG").map(Path::new);

    match amach::run_code_file(code, input, debug) {
        Ok(summary) => {
            println!("{}", summary.output);
            if let StopReason::Fatal(err) = summary.stop {
                eprintln!("{}", err);
                process::exit(1);
            }
            println!(
                "instr_counter: {} ticks: {}",
                summary.instr_count, summary.ticks
            );
        }
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    }
}
