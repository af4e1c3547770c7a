use std::process::ExitCode;

fn main() -> ExitCode {
    mercato_cli::run()
}
