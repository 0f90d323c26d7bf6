//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

/// Lobby wire message. All three fields are always present on the wire;
/// an empty string means the field is unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub username: String,
    /// Chat text, or the command payload when `command` is set
    #[serde(rename = "message", default)]
    pub content: String,
    #[serde(default)]
    pub command: String,
}

impl Message {
    pub fn chat(username: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            content: content.into(),
            command: String::new(),
        }
    }

    pub fn command(command: Command, content: impl Into<String>) -> Self {
        Self {
            username: String::new(),
            content: content.into(),
            command: command.as_str().to_string(),
        }
    }

    /// Server notice that a match has begun against `opponent`
    pub fn start_game(opponent: impl Into<String>) -> Self {
        Self::command(Command::StartGame, opponent)
    }

    pub fn is_chat(&self) -> bool {
        self.command.is_empty()
    }

    /// Parsed command, `None` for chat messages
    pub fn parsed_command(&self) -> Option<Command> {
        if self.is_chat() {
            None
        } else {
            Some(Command::parse(&self.command))
        }
    }
}

/// Lobby commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ready,
    Unready,
    SetName,
    BotMatch,
    EndMatch,
    /// Server to client only
    StartGame,
    /// Anything else; kept so it can be logged or forwarded verbatim
    Other(String),
}

impl Command {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "READY" => Self::Ready,
            "UNREADY" => Self::Unready,
            "SETNAME" => Self::SetName,
            "BOT MATCH" => Self::BotMatch,
            "END MATCH" => Self::EndMatch,
            "START GAME" => Self::StartGame,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Ready => "READY",
            Self::Unready => "UNREADY",
            Self::SetName => "SETNAME",
            Self::BotMatch => "BOT MATCH",
            Self::EndMatch => "END MATCH",
            Self::StartGame => "START GAME",
            Self::Other(raw) => raw,
        }
    }
}

/// One side of the battle as seen in an [`Update`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FighterView {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Life")]
    pub life: i32,
}

/// Battle state snapshot from the battle engine, from one side's perspective
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    #[serde(rename = "Self")]
    pub me: FighterView,
    #[serde(rename = "Enemy")]
    pub enemy: FighterView,
    #[serde(rename = "Turn")]
    pub turn: u32,
    /// Human readable summary of the last resolved turn
    #[serde(rename = "Log", default)]
    pub log: Vec<String>,
}

impl Update {
    /// The battle is over once either side is out of life
    pub fn is_terminal(&self) -> bool {
        self.me.life <= 0 || self.enemy.life <= 0
    }
}

/// Anything the server writes to a client. Serialized without a tag: clients
/// tell the two apart by payload shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    Message(Message),
    Update(Update),
}

impl From<Message> for Outbound {
    fn from(msg: Message) -> Self {
        Self::Message(msg)
    }
}

impl From<Update> for Outbound {
    fn from(update: Update) -> Self {
        Self::Update(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(me: i32, enemy: i32) -> Update {
        Update {
            me: FighterView {
                name: "alice".to_string(),
                life: me,
            },
            enemy: FighterView {
                name: "bob".to_string(),
                life: enemy,
            },
            turn: 3,
            log: Vec::new(),
        }
    }

    #[test]
    fn test_message_uses_wire_field_names() {
        let msg: Message =
            serde_json::from_str(r#"{"username":"alice","message":"hi","command":""}"#).unwrap();
        assert_eq!(msg, Message::chat("alice", "hi"));
        assert!(msg.is_chat());

        let json = serde_json::to_value(Message::start_game("bob")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"username": "", "message": "bob", "command": "START GAME"})
        );
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let msg: Message = serde_json::from_str(r#"{"command":"READY"}"#).unwrap();
        assert_eq!(msg.username, "");
        assert_eq!(msg.content, "");
        assert_eq!(msg.parsed_command(), Some(Command::Ready));
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("BOT MATCH"), Command::BotMatch);
        assert_eq!(Command::parse("END MATCH"), Command::EndMatch);
        assert_eq!(Command::parse("ready"), Command::Other("ready".to_string()));
        assert_eq!(Command::Other("ATTACK".to_string()).as_str(), "ATTACK");
    }

    #[test]
    fn test_update_terminal_when_either_side_is_down() {
        assert!(!update(10, 10).is_terminal());
        assert!(update(0, 10).is_terminal());
        assert!(update(10, -4).is_terminal());
    }

    #[test]
    fn test_outbound_is_untagged_on_the_wire() {
        let msg = serde_json::to_value(Outbound::from(Message::chat("a", "b"))).unwrap();
        assert_eq!(msg["message"], "b");
        assert!(msg.get("Message").is_none());

        let upd = serde_json::to_value(Outbound::from(update(7, 0))).unwrap();
        assert_eq!(upd["Self"]["Life"], 7);
        assert_eq!(upd["Enemy"]["Life"], 0);
        assert_eq!(upd["Turn"], 3);
    }
}
