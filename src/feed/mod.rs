use crate::messages::{Message, MessageService, ServiceError};

/// A change notification from the message store's realtime channel. The
/// feed refreshes wholesale on any event, so the payload carries only
/// what is useful for logging.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// The public browse feed: all published messages, newest first, with a
/// client-side substring filter. On refresh failure the previous good
/// list is kept and the error surfaces to the caller. Overlapping
/// refreshes resolve as last-completed-write-wins.
#[derive(Debug, Default)]
pub struct FeedView {
    messages: Vec<Message>,
}

impl FeedView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh(&mut self, service: &dyn MessageService) -> Result<(), ServiceError> {
        let fetched = service.fetch_all(None)?;
        self.messages = fetched;
        Ok(())
    }

    /// React to a realtime change notification with a full refetch.
    pub fn on_change(
        &mut self,
        event: &ChangeEvent,
        service: &dyn MessageService,
    ) -> Result<(), ServiceError> {
        tracing::debug!(kind = ?event.kind, id = ?event.id, "feed change notification");
        self.refresh(service)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Case-insensitive substring match over recipient, message body,
    /// song title, and artist. An empty query yields the full feed.
    pub fn filter(&self, query: &str) -> Vec<&Message> {
        if query.is_empty() {
            return self.messages.iter().collect();
        }
        let needle = query.to_lowercase();
        self.messages
            .iter()
            .filter(|m| {
                m.recipient.to_lowercase().contains(&needle)
                    || m.message.to_lowercase().contains(&needle)
                    || m.song_title.to_lowercase().contains(&needle)
                    || m.artist.to_lowercase().contains(&needle)
            })
            .collect()
    }
}
