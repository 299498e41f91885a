use chrono::NaiveDate;
use skyfare_core::alert::{parse_date, AlertId, ValidationError};
use skyfare_core::AirportCode;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Help,
    Search,
    Stop,
    Alert(AlertArgs),
    Alerts,
    Cancel(AlertId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertArgs {
    pub origin: AirportCode,
    pub destination: AirportCode,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub passengers: u32,
    pub threshold_price: i64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command {0}")]
    Unknown(String),
    #[error("/{command}: {reason}")]
    BadArguments {
        command: &'static str,
        reason: ArgumentError,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArgumentError {
    #[error("wrong number of arguments")]
    WrongArity,
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

fn bad_arguments(command: &'static str) -> impl FnOnce(ArgumentError) -> CommandError {
    move |reason| CommandError::BadArguments { command, reason }
}

impl Command {
    /// `None` when the text is not a command at all.
    pub fn parse(text: &str) -> Option<Result<Command, CommandError>> {
        let mut parts = text.split_whitespace();
        let head = parts.next()?;
        let name = head.strip_prefix('/')?;
        // Group chats address commands as /alert@botname.
        let name = name.split('@').next().unwrap_or(name).to_ascii_lowercase();
        let args: Vec<&str> = parts.collect();

        let command = match name.as_str() {
            "start" => Ok(Command::Start),
            "help" => Ok(Command::Help),
            "search" => Ok(Command::Search),
            "stop" => Ok(Command::Stop),
            "alerts" => Ok(Command::Alerts),
            "alert" => parse_alert(&args)
                .map(Command::Alert)
                .map_err(bad_arguments("alert")),
            "cancel" => parse_cancel(&args)
                .map(Command::Cancel)
                .map_err(bad_arguments("cancel")),
            _ => Err(CommandError::Unknown(head.to_string())),
        };
        Some(command)
    }
}

fn parse_alert(args: &[&str]) -> Result<AlertArgs, ArgumentError> {
    let (origin, destination, start, end, passengers, price) = match args {
        [o, d, s, e, price] => (o, d, s, e, None, price),
        [o, d, s, e, passengers, price] => (o, d, s, e, Some(passengers), price),
        _ => return Err(ArgumentError::WrongArity),
    };

    let passengers = match passengers {
        Some(raw) => {
            let count = parse_number(raw)?;
            u32::try_from(count)
                .ok()
                .filter(|count| *count >= 1)
                .ok_or(ValidationError::InvalidPassengers(count))?
        }
        None => 1,
    };

    Ok(AlertArgs {
        origin: AirportCode::parse(origin)?,
        destination: AirportCode::parse(destination)?,
        start_date: parse_date(start)?,
        end_date: parse_date(end)?,
        passengers,
        threshold_price: parse_number(price)?,
    })
}

fn parse_cancel(args: &[&str]) -> Result<AlertId, ArgumentError> {
    match args {
        [id] => Ok(parse_number(id)?),
        _ => Err(ArgumentError::WrongArity),
    }
}

pub fn parse_number(raw: &str) -> Result<i64, ValidationError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ValidationError::InvalidNumber(raw.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Command, CommandError> {
        Command::parse(text).expect("text is a command")
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert!(Command::parse("MOW").is_none());
        assert!(Command::parse("   ").is_none());
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse("/start"), Ok(Command::Start));
        assert_eq!(parse("/help"), Ok(Command::Help));
        assert_eq!(parse("/search@skyfare_bot"), Ok(Command::Search));
        assert_eq!(parse("/ALERTS"), Ok(Command::Alerts));
        assert_eq!(parse("/cancel 12"), Ok(Command::Cancel(12)));
    }

    #[test]
    fn test_alert_without_passengers_defaults_to_one() {
        let Command::Alert(args) = parse("/alert mow led 2025-12-01 2025-12-15 8000").unwrap() else {
            panic!("expected an alert command");
        };
        assert_eq!(args.origin.as_str(), "MOW");
        assert_eq!(args.destination.as_str(), "LED");
        assert_eq!(args.passengers, 1);
        assert_eq!(args.threshold_price, 8000);
    }

    #[test]
    fn test_alert_with_passengers() {
        let Command::Alert(args) = parse("/alert MOW LED 2025-12-01 2025-12-15 2 8000").unwrap() else {
            panic!("expected an alert command");
        };
        assert_eq!(args.passengers, 2);
        assert_eq!(args.threshold_price, 8000);
    }

    fn alert_error(text: &str) -> ArgumentError {
        match parse(text) {
            Err(CommandError::BadArguments {
                command: "alert",
                reason,
            }) => reason,
            other => panic!("expected an /alert argument error, got {other:?}"),
        }
    }

    #[test]
    fn test_alert_argument_errors() {
        assert_eq!(alert_error("/alert MOW LED"), ArgumentError::WrongArity);
        assert!(matches!(
            alert_error("/alert MOSCOW LED 2025-12-01 2025-12-15 8000"),
            ArgumentError::Invalid(ValidationError::InvalidAirportCode(_))
        ));
        assert!(matches!(
            alert_error("/alert MOW LED 01.12.2025 2025-12-15 8000"),
            ArgumentError::Invalid(ValidationError::InvalidDate(_))
        ));
        assert!(matches!(
            alert_error("/alert MOW LED 2025-12-01 2025-12-15 cheap"),
            ArgumentError::Invalid(ValidationError::InvalidNumber(_))
        ));
        assert_eq!(
            alert_error("/alert MOW LED 2025-12-01 2025-12-15 0 8000"),
            ArgumentError::Invalid(ValidationError::InvalidPassengers(0))
        );
    }

    #[test]
    fn test_cancel_errors() {
        assert_eq!(
            parse("/cancel"),
            Err(CommandError::BadArguments {
                command: "cancel",
                reason: ArgumentError::WrongArity
            })
        );
        assert!(matches!(
            parse("/cancel abc"),
            Err(CommandError::BadArguments { command: "cancel", .. })
        ));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(parse("/book"), Err(CommandError::Unknown("/book".into())));
    }
}
