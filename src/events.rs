use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::entry::{Entry, GuildId};

/// Lifecycle events emitted by a player to the owning host application.
///
/// Events for one guild arrive in emission order; nothing is guaranteed
/// across guilds. The receiving side decides what to do with them (post a
/// chat message, update a dashboard, nothing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlayerEvent {
    Play { guild_id: GuildId, entry: Entry },
    Resume { guild_id: GuildId },
    Pause { guild_id: GuildId },
    Stop { guild_id: GuildId },
    FinishedPlaying { guild_id: GuildId, entry: Entry },
    EntryAdded { guild_id: GuildId, entry: Entry },
    Error {
        guild_id: GuildId,
        entry: Option<Entry>,
        message: String,
    },
}

impl PlayerEvent {
    pub fn guild_id(&self) -> GuildId {
        match self {
            PlayerEvent::Play { guild_id, .. }
            | PlayerEvent::Resume { guild_id }
            | PlayerEvent::Pause { guild_id }
            | PlayerEvent::Stop { guild_id }
            | PlayerEvent::FinishedPlaying { guild_id, .. }
            | PlayerEvent::EntryAdded { guild_id, .. }
            | PlayerEvent::Error { guild_id, .. } => *guild_id,
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<PlayerEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<PlayerEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Send that tolerates a dropped receiver; a host that stopped listening
/// must not stall playback.
pub(crate) fn emit(sender: &EventSender, event: PlayerEvent) {
    let _ = sender.send(event);
}
