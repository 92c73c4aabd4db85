//! Console input parsing

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Send a message, optionally forcing an agent
    Send {
        forced_agent: Option<String>,
        message: String,
    },
    /// Turn the agent lock on or off
    Lock(bool),
    /// Share this session's memory with the user's other sessions
    Share,
    /// Search the user's sessions
    Memory(String),
    Exit,
    Empty,
    /// Malformed command, with usage text
    Invalid(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ConsoleCommand::Empty;
        }
        if matches!(line.to_lowercase().as_str(), "exit" | "quit") {
            return ConsoleCommand::Exit;
        }

        let Some(rest) = line.strip_prefix('/') else {
            return ConsoleCommand::Send {
                forced_agent: None,
                message: line.to_string(),
            };
        };

        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };

        match name {
            "agent" => match args.split_once(char::is_whitespace) {
                Some((agent, message)) if !message.trim().is_empty() => ConsoleCommand::Send {
                    forced_agent: Some(agent.to_string()),
                    message: message.trim().to_string(),
                },
                _ => ConsoleCommand::Invalid("usage: /agent <name> <message>".into()),
            },
            "lock" => match args {
                "on" => ConsoleCommand::Lock(true),
                "off" => ConsoleCommand::Lock(false),
                _ => ConsoleCommand::Invalid("usage: /lock on|off".into()),
            },
            "share" => ConsoleCommand::Share,
            "memory" if !args.is_empty() => ConsoleCommand::Memory(args.to_string()),
            "memory" => ConsoleCommand::Invalid("usage: /memory <query>".into()),
            other => ConsoleCommand::Invalid(format!("unknown command /{}", other)),
        }
    }
}
