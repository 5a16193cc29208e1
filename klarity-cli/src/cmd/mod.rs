pub mod apply;
pub mod build;
pub mod clean;
pub mod dev;
pub mod doctor;
pub mod init;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Arg, value_parser};

/// The positional project directory every subcommand takes.
pub fn path_arg() -> Arg {
    Arg::new("path")
        .value_name("PATH")
        .help("The directory containing the Klarity project")
        .value_parser(value_parser!(PathBuf))
        .required(true)
}

/// Ask a yes/no question on stdin. End of input counts as "no".
pub fn confirm(prompt: &str) -> io::Result<bool> {
    confirm_with(prompt, &mut io::stdin().lock(), &mut io::stdout())
}

fn confirm_with(prompt: &str, input: &mut impl BufRead, output: &mut impl Write) -> io::Result<bool> {
    let mut line = String::new();
    loop {
        write!(output, "{prompt} (y/n): ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(false);
        }
        match line.trim().chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('y') => return Ok(true),
            Some('n') => return Ok(false),
            _ => writeln!(output, "Invalid input. Please enter 'y' or 'n'.")?,
        }
    }
}
