use crossterm::event::Event;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use sqlpilot::{AssistResult, SqlAnswer};

/// Everything the main loop reacts to.
#[derive(Debug)]
pub enum AppEvent {
    Input(Event),
    /// A streamed fragment of the model answer.
    Chunk(String),
    /// The request finished (or failed, or was cancelled).
    Answer(AssistResult<SqlAnswer>),
}

pub struct EventHandler {
    tx: UnboundedSender<AppEvent>,
    rx: UnboundedReceiver<AppEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Sender for background tasks.
    pub fn sender(&self) -> UnboundedSender<AppEvent> {
        self.tx.clone()
    }

    /// Pending background events first, then terminal input.
    pub fn next(&mut self) -> anyhow::Result<Option<AppEvent>> {
        if let Ok(event) = self.rx.try_recv() {
            return Ok(Some(event));
        }
        if crossterm::event::poll(Duration::from_millis(50))? {
            Ok(Some(AppEvent::Input(crossterm::event::read()?)))
        } else {
            Ok(None)
        }
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}
