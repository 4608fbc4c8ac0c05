use std::num::ParseIntError;

use orbat_schema::{parse_timestamp, TimeUnit, TimestampError};
use thiserror::Error;

use crate::{CommandPayload, ShowTarget};

#[derive(Debug, Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("invalid integer '{value}' for {context}: {source}")]
    InvalidInteger {
        value: String,
        context: &'static str,
        source: ParseIntError,
    },
    #[error("invalid timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        source: TimestampError,
    },
    #[error("invalid time unit '{0}'")]
    InvalidUnit(String),
    #[error("invalid show target '{0}'")]
    InvalidShowTarget(String),
    #[error("unexpected argument '{0}'")]
    UnexpectedArgument(String),
}

#[derive(Debug, Error)]
#[error("line {line}: {source}")]
pub struct ScriptError {
    pub line: usize,
    #[source]
    pub source: CommandParseError,
}

pub fn parse_command_line(input: &str) -> Result<CommandPayload, CommandParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CommandParseError::Empty);
    }

    let mut parts = trimmed.split_whitespace();
    let verb = parts
        .next()
        .map(|v| v.to_ascii_lowercase())
        .ok_or(CommandParseError::Empty)?;

    match verb.as_str() {
        "time" => {
            let action = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("time action"))?
                .to_ascii_lowercase();
            match action.as_str() {
                "set" => {
                    let value = parts
                        .next()
                        .ok_or(CommandParseError::MissingArgument("timestamp"))?;
                    let timestamp = parse_timestamp(value).map_err(|source| {
                        CommandParseError::InvalidTimestamp {
                            value: value.to_string(),
                            source,
                        }
                    })?;
                    Ok(CommandPayload::SetTime { timestamp })
                }
                "add" | "subtract" | "sub" => {
                    let amount_str = parts
                        .next()
                        .ok_or(CommandParseError::MissingArgument("amount"))?;
                    let unit_str = parts
                        .next()
                        .ok_or(CommandParseError::MissingArgument("unit"))?;
                    let amount = parse_i64(amount_str, "time amount")?;
                    let unit = unit_str
                        .parse::<TimeUnit>()
                        .map_err(CommandParseError::InvalidUnit)?;
                    let normalize = match parts.next() {
                        None => false,
                        Some(flag) if flag.eq_ignore_ascii_case("normalize") => true,
                        Some(other) => {
                            return Err(CommandParseError::UnexpectedArgument(other.to_string()))
                        }
                    };
                    if action == "add" {
                        Ok(CommandPayload::AddTime {
                            amount,
                            unit,
                            normalize,
                        })
                    } else {
                        Ok(CommandPayload::SubtractTime {
                            amount,
                            unit,
                            normalize,
                        })
                    }
                }
                other => Err(CommandParseError::UnknownCommand(format!("time {other}"))),
            }
        }
        "next" => Ok(CommandPayload::NextKeyframe),
        "prev" | "previous" => Ok(CommandPayload::PrevKeyframe),
        "next-event" | "next_event" => Ok(CommandPayload::NextEvent),
        "prev-event" | "prev_event" => Ok(CommandPayload::PrevEvent),
        "undo" => Ok(CommandPayload::Undo),
        "redo" => Ok(CommandPayload::Redo),
        "show" => {
            let target_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("show target"))?
                .to_ascii_lowercase();
            let target = ShowTarget::parse(&target_str)
                .ok_or(CommandParseError::InvalidShowTarget(target_str))?;
            Ok(CommandPayload::Show { target })
        }
        "rename" => {
            let unit_id = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("unit id"))?
                .to_string();
            let name = parts.collect::<Vec<_>>().join(" ");
            if name.is_empty() {
                return Err(CommandParseError::MissingArgument("name"));
            }
            Ok(CommandPayload::RenameUnit { unit_id, name })
        }
        other => Err(CommandParseError::UnknownCommand(other.to_string())),
    }
}

/// Parse a script of one command per line; blank lines and `#` comments are skipped.
pub fn parse_script(script: &str) -> Result<Vec<CommandPayload>, ScriptError> {
    script
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(|(index, line)| {
            parse_command_line(line).map_err(|source| ScriptError {
                line: index + 1,
                source,
            })
        })
        .collect()
}

fn parse_i64(value: &str, context: &'static str) -> Result<i64, CommandParseError> {
    value
        .parse::<i64>()
        .map_err(|source| CommandParseError::InvalidInteger {
            value: value.to_string(),
            context,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_time_commands() {
        assert_eq!(
            parse_command_line("time add 2 day").expect("add"),
            CommandPayload::AddTime {
                amount: 2,
                unit: TimeUnit::Day,
                normalize: false
            }
        );
        assert_eq!(
            parse_command_line("TIME subtract 1 M normalize").expect("subtract"),
            CommandPayload::SubtractTime {
                amount: 1,
                unit: TimeUnit::Month,
                normalize: true
            }
        );
        assert_eq!(
            parse_command_line("time set 1970-01-01T00:00:01Z").expect("set"),
            CommandPayload::SetTime { timestamp: 1_000 }
        );
    }

    #[test]
    fn rename_keeps_spaces_in_name() {
        assert_eq!(
            parse_command_line("rename u1 2nd  Battalion").expect("rename"),
            CommandPayload::RenameUnit {
                unit_id: "u1".into(),
                name: "2nd Battalion".into()
            }
        );
        assert!(matches!(
            parse_command_line("rename u1"),
            Err(CommandParseError::MissingArgument("name"))
        ));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(parse_command_line("   "), Err(CommandParseError::Empty)));
        assert!(matches!(
            parse_command_line("time add two day"),
            Err(CommandParseError::InvalidInteger { .. })
        ));
        assert!(matches!(
            parse_command_line("time add 2 fortnight"),
            Err(CommandParseError::InvalidUnit(_))
        ));
        assert!(matches!(
            parse_command_line("show sides"),
            Err(CommandParseError::InvalidShowTarget(_))
        ));
        assert!(matches!(
            parse_command_line("warp"),
            Err(CommandParseError::UnknownCommand(_))
        ));
    }

    #[test]
    fn script_reports_line_numbers() {
        let commands = parse_script("# setup\nnext\n\nshow units\n").expect("script");
        assert_eq!(
            commands,
            vec![
                CommandPayload::NextKeyframe,
                CommandPayload::Show {
                    target: ShowTarget::Units
                }
            ]
        );
        let err = parse_script("next\nbogus\n").expect_err("bad line");
        assert_eq!(err.line, 2);
    }
}
