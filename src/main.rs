use clap::{Arg, ArgAction, Command};
use linklang::{init_tracing, repl, runner, Runtime};
use std::fs;
use std::path::Path;
use std::process;

fn main() {
    let matches = Command::new("link")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Interpreter for the Link scripting language")
        .arg(
            Arg::new("file")
                .help("The script file to execute")
                .value_name("FILE")
                .index(1),
        )
        .arg(
            Arg::new("interactive")
                .short('i')
                .long("interactive")
                .help("Start the REPL (after running FILE, if given)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Print the parsed AST before executing and enable debug logging")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let debug = matches.get_flag("debug");
    init_tracing(debug);

    let mut runtime = Runtime::new();
    let file = matches.get_one::<String>("file");

    if let Some(file_path) = file {
        let ok = run_file(&mut runtime, file_path, debug);
        if !ok && !matches.get_flag("interactive") {
            process::exit(1);
        }
    }

    if file.is_none() || matches.get_flag("interactive") {
        repl::start(&mut runtime, debug);
    }
}

fn run_file(runtime: &mut Runtime, path: &str, debug: bool) -> bool {
    if !Path::new(path).exists() {
        eprintln!("Error: File '{}' not found", path);
        return false;
    }

    match fs::read_to_string(path) {
        Ok(source) => runner::run(runtime, &source, Some(path), debug),
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path, e);
            false
        }
    }
}
