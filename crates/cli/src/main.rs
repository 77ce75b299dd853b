use std::process::ExitCode;

fn main() -> ExitCode {
    attache_cli::run()
}
