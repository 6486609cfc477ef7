//! Peer wire messages and the remote commands they carry

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::state::{ParseTimeError, TimeValue, TimerEngine};

/// Everything two peers say to each other
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncMessage {
    /// Ask the other side to resend its full model
    RequestContext,
    /// Full persisted model
    TimerModel { model: Value },
    /// `to` seconds remained at `date` (epoch seconds)
    Sync { to: i64, date: f64 },
    NewState {
        command: Command,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
}

impl SyncMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncMessage::RequestContext => "requestContext",
            SyncMessage::TimerModel { .. } => "timerModel",
            SyncMessage::Sync { .. } => "sync",
            SyncMessage::NewState { .. } => "newState",
        }
    }
}

/// Remote control of the selected timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Command {
    SetTime,
    Start,
    Reset,
    Stop,
    Pause,
    Resume,
    FastForward,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("command {0} needs a value")]
    MissingValue(Command),

    #[error("invalid time value: {0}")]
    InvalidTime(#[from] ParseTimeError),
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::SetTime => "setTime",
            Command::Start => "start",
            Command::Reset => "reset",
            Command::Stop => "stop",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::FastForward => "fastForward",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "setTime" => Some(Command::SetTime),
            "start" => Some(Command::Start),
            "reset" => Some(Command::Reset),
            "stop" => Some(Command::Stop),
            "pause" => Some(Command::Pause),
            "resume" => Some(Command::Resume),
            "fastForward" => Some(Command::FastForward),
            _ => None,
        }
    }

    /// Run the command against an engine. Returns false when the engine was
    /// not in a state the command applies to.
    pub fn apply(
        &self,
        engine: &mut TimerEngine,
        value: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, CommandError> {
        match self {
            Command::SetTime => {
                let value = value.ok_or(CommandError::MissingValue(*self))?;
                let time: TimeValue = value.parse()?;
                engine.set_starting_time(time.total_seconds() as i64);
                engine.stop();
                Ok(true)
            }
            Command::Start => {
                engine.start(now);
                Ok(true)
            }
            Command::Reset => {
                engine.reset();
                Ok(true)
            }
            Command::Stop => {
                engine.stop();
                Ok(true)
            }
            Command::Pause => Ok(engine.pause(now).is_some()),
            Command::Resume => Ok(engine.resume(None, now)),
            Command::FastForward => {
                engine.end();
                Ok(true)
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
