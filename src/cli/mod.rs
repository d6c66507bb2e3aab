pub mod args;

pub use args::Arguments;

use clap::error::ErrorKind;
use clap::Parser;

/// Maps a parse failure to the process exit status: help and version
/// requests are normal termination, everything else is a usage error.
pub fn exit_code_for(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

/// Parses the command line, terminating the process on `--help`,
/// `--version`, or any malformed/unknown flag before any stage runs.
pub fn parse() -> Arguments {
    match Arguments::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = exit_code_for(e.kind());
            let _ = e.print();
            std::process::exit(code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn help_is_normal_termination() {
        let err = Arguments::try_parse_from(["nanotu", "--help"]).unwrap_err();
        assert_eq!(exit_code_for(err.kind()), 0);
    }

    #[test]
    fn version_is_normal_termination() {
        let err = Arguments::try_parse_from(["nanotu", "--version"]).unwrap_err();
        assert_eq!(exit_code_for(err.kind()), 0);
    }

    #[test]
    fn unknown_flag_is_a_usage_error() {
        let err = Arguments::try_parse_from(["nanotu", "--bogus"]).unwrap_err();
        assert_eq!(exit_code_for(err.kind()), 1);
    }

    #[test]
    fn malformed_value_is_a_usage_error() {
        let err = Arguments::try_parse_from(["nanotu", "-q", "high"]).unwrap_err();
        assert_eq!(exit_code_for(err.kind()), 1);
    }
}
