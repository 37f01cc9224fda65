use clap::{builder::ValueParser, Arg, ArgAction, Command};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

/// Selectable levels, quietest first. The index is the `-v` count.
const LEVELS: [(&str, Level); 5] = [
    ("error", Level::ERROR),
    ("warn", Level::WARN),
    ("info", Level::INFO),
    ("debug", Level::DEBUG),
    ("trace", Level::TRACE),
];

/// Level selected by a verbosity count; anything past the table is `TRACE`.
#[must_use]
pub fn level(verbosity: u8) -> Level {
    LEVELS
        .get(usize::from(verbosity))
        .map_or(Level::TRACE, |(_, level)| *level)
}

/// Accepts a level name (case-insensitive) or its index, as used by `TANDEM_LOG_LEVEL`.
#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(|value: &str| -> Result<u8, String> {
        let value = value.trim();
        LEVELS
            .iter()
            .position(|(name, _)| name.eq_ignore_ascii_case(value))
            .or_else(|| value.parse::<usize>().ok().filter(|i| *i < LEVELS.len()))
            .and_then(|index| u8::try_from(index).ok())
            .ok_or_else(|| {
                let names: Vec<&str> = LEVELS.iter().map(|(name, _)| *name).collect();
                format!(
                    "invalid log level `{value}`, expected 0-{} or one of: {}",
                    LEVELS.len() - 1,
                    names.join(", ")
                )
            })
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("TANDEM_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}
