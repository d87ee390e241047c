use std::process::ExitCode;

fn main() -> ExitCode {
    datachat_cli::run()
}
