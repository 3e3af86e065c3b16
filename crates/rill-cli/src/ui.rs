//! Plain terminal rendering of chat events

use std::io::{self, Write};

use rill_chat::{ChatEvent, Controller, Submission};

/// Shown after the text while a reply is still streaming
pub const STREAMING_CURSOR: &str = "▌";

/// Erases the cursor cell
const ERASE_CURSOR: &str = "\x08 \x08";

/// Prints a reply as it streams in.
///
/// Deltas are written as they arrive. When the turn ends, whatever the final
/// content adds beyond what was printed (an error notice, say) is written too.
pub struct Renderer<W: Write> {
    out: W,
    show_cursor: bool,
    cursor_visible: bool,
    printed: usize,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, show_cursor: bool) -> Self {
        Self {
            out,
            show_cursor,
            cursor_visible: false,
            printed: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Render one event
    pub fn handle(&mut self, event: &ChatEvent) -> io::Result<()> {
        match event {
            ChatEvent::TurnStart { .. } => {
                self.printed = 0;
                self.draw_cursor()?;
            }
            ChatEvent::TurnUpdate { delta, .. } => {
                self.erase_cursor()?;
                self.out.write_all(delta.as_bytes())?;
                self.printed += delta.len();
                self.draw_cursor()?;
            }
            ChatEvent::TurnEnd { turn } => {
                self.erase_cursor()?;
                let rest = turn.content.get(self.printed..).unwrap_or(&turn.content);
                self.out.write_all(rest.as_bytes())?;
                self.out.write_all(b"\n")?;
                self.printed = 0;
            }
            ChatEvent::Cleared => self.erase_cursor()?,
            ChatEvent::RequestSent { .. } | ChatEvent::StreamOpened { .. } => {}
        }
        self.out.flush()
    }

    fn draw_cursor(&mut self) -> io::Result<()> {
        if self.show_cursor && !self.cursor_visible {
            self.out.write_all(STREAMING_CURSOR.as_bytes())?;
            self.cursor_visible = true;
        }
        Ok(())
    }

    fn erase_cursor(&mut self) -> io::Result<()> {
        if self.cursor_visible {
            self.out.write_all(ERASE_CURSOR.as_bytes())?;
            self.cursor_visible = false;
        }
        Ok(())
    }
}

/// Submit `input` and render the reply until the turn settles.
///
/// The submission future is always driven to completion so the controller
/// settles even when rendering fails.
pub async fn run_turn<W: Write>(
    chat: &Controller,
    input: &str,
    renderer: &mut Renderer<W>,
) -> Submission {
    let mut events = chat.events();
    let submit = chat.submit(input);
    tokio::pin!(submit);

    let mut render_ok = true;
    let outcome = loop {
        tokio::select! {
            outcome = &mut submit => break outcome,
            event = events.recv() => {
                if let Ok(event) = event {
                    render_ok = render_ok && renderer.handle(&event).is_ok();
                }
            }
        }
    };

    while let Ok(event) = events.try_recv() {
        render_ok = render_ok && renderer.handle(&event).is_ok();
    }
    if !render_ok {
        tracing::warn!("failed to write reply to the terminal");
    }
    outcome
}
