use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout = io::stdout();
    kinod::run(std::env::args_os(), &mut stdout)
}
