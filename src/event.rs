use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::session::types::TabKey;
use crate::sync::message::InboundEvent;
use crate::viewer::{Listing, Media};

/// Window events. All window state changes happen in response to one of these.
#[derive(Debug)]
pub enum Event {
    /// Periodic wake-up for debounce timers.
    Tick,
    /// One line of user input.
    Command(String),
    /// Input closed.
    InputClosed,
    /// Owner event delivered to this window.
    Sync(InboundEvent),
    /// A listing request finished.
    Listing {
        key: TabKey,
        generation: u64,
        result: Result<Listing>,
    },
    /// A media request finished.
    Media {
        key: TabKey,
        generation: u64,
        result: Result<Media>,
    },
}

/// Merges stdin lines, ticks and async results into one queue.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
    /// Create a handler that only forwards what is sent through [`EventHandler::sender`].
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { rx, tx }
    }

    /// Also read commands from stdin and tick every `tick_rate`.
    pub fn with_input(tick_rate: Duration) -> Self {
        let handler = Self::new();

        let input_tx = handler.tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if input_tx.send(Event::Command(line)).is_err() {
                            break;
                        }
                    }
                    Ok(None) | Err(_) => {
                        debug!("input closed");
                        let _ = input_tx.send(Event::InputClosed);
                        break;
                    }
                }
            }
        });

        let tick_tx = handler.tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_rate);
            loop {
                interval.tick().await;
                if tick_tx.send(Event::Tick).is_err() {
                    break;
                }
            }
        });

        handler
    }

    /// Get a sender clone for handlers and blocking host calls.
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Receive the next event.
    pub async fn next(&mut self) -> Result<Event> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| AppError::ChannelClosed("event queue".into()))
    }

    /// Take an event if one is queued.
    pub fn try_next(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}
