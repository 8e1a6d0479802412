use weatherbot_telegram::Message;

/// What a message asks the bot to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'a> {
    /// `/city <name>`; the name may be empty
    SetCity(&'a str),
    /// `/weather` without arguments
    SavedCityWeather,
    /// `/start`, `/help`
    Help,
    /// Any other command, by name
    Unknown(&'a str),
    /// Plain text, as typed (or `/weather <name>`): a place to look up
    Lookup(&'a str),
}

impl<'a> Request<'a> {
    /// `None` for messages without text.
    pub fn parse(message: &'a Message) -> Option<Self> {
        let text = message.text.as_deref()?;

        let Some(command) = message.command() else {
            return Some(Self::Lookup(text));
        };
        let args = message.command_arguments().unwrap_or_default();

        let request = match command {
            "city" => Self::SetCity(args),
            "weather" if args.is_empty() => Self::SavedCityWeather,
            "weather" => Self::Lookup(args),
            "start" | "help" => Self::Help,
            other => Self::Unknown(other),
        };
        Some(request)
    }
}
