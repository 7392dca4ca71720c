use chirp_common::{ChatView, ChatViewModel, SessionAction};
use crossterm::event::{Event, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Layout, Position},
    style::{Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Paragraph},
    Frame,
};
use tokio::sync::mpsc;

mod keymap;
mod message_list;

pub use keymap::{parse_key_sequence, Action, Input, KeyCode, KeyEvent, Keymap};
pub use message_list::MessageListView;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    KeyBinding(String),
}

pub async fn run(model: ChatViewModel, keymap: Keymap<Action>) -> Result<(), Error> {
    let terminal = ratatui::init();
    let res = run_inner(terminal, model, keymap).await;
    ratatui::restore();
    res
}

async fn run_inner(
    mut term: ratatui::DefaultTerminal,
    mut model: ChatViewModel,
    mut keymap: Keymap<Action>,
) -> Result<(), Error> {
    use futures::stream::StreamExt;

    let (keys_tx, mut keys_rx) = mpsc::unbounded_channel();
    let (input_tx, mut input_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let action_tx = input_tx.clone();
        keymap
            .run(
                &mut keys_rx,
                |keys| {
                    let _ = input_tx.send(Input::Passthru(keys.to_vec()));
                },
                |action| {
                    let _ = action_tx.send(Input::Action(action));
                },
            )
            .await;
    });

    let mut term_events = crossterm::event::EventStream::new();
    let mut backend_open = true;
    loop {
        let view = model.view();
        term.draw(|frame| draw(frame, &view))?;
        tokio::select! {
            event = term_events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind != KeyEventKind::Release => {
                    let _ = keys_tx.send(KeyEvent::from(key));
                }
                Some(Ok(Event::Paste(text))) => model.push_str(&text),
                Some(Ok(event)) => tracing::debug!("{event:?}"),
                Some(Err(err)) => tracing::warn!("{err}"),
                None => {
                    tracing::info!("term events stream stopped, shutting down");
                    break;
                }
            },
            input = input_rx.recv() => match input {
                Some(Input::Action(Action::Quit)) | None => break,
                Some(Input::Action(action)) => dispatch(&mut model, action),
                Some(Input::Passthru(keys)) => type_keys(&mut model, &keys),
            },
            event = model.next_event(), if backend_open => match event {
                Some(event) => model.apply(event),
                None => {
                    tracing::info!("backend streams stopped");
                    backend_open = false;
                }
            },
        }
    }
    Ok(())
}

fn dispatch(model: &mut ChatViewModel, action: Action) {
    match action {
        Action::Login => model.login(),
        Action::Logout => model.logout(),
        Action::ToggleSession => model.toggle_session(),
        Action::Submit => model.submit(),
        Action::Quit => {}
    }
}

/// Edits the compose buffer with keys the keymap didn't claim.
fn type_keys(model: &mut ChatViewModel, keys: &[KeyEvent]) {
    for key in keys {
        match key.code {
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                model.push_str(c.encode_utf8(&mut [0; 4]));
            }
            KeyCode::Backspace => model.pop_char(),
            _ => tracing::trace!(?key, "ignored key"),
        }
    }
}

fn draw(frame: &mut Frame, view: &ChatView) {
    let [header, compose, messages] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(frame.area());

    frame.render_widget(header_line(view), header);

    frame.render_widget(
        Paragraph::new(view.compose.as_str()).block(Block::bordered().title("Write something")),
        compose,
    );
    let typed = u16::try_from(view.compose.chars().count()).unwrap_or(u16::MAX);
    let cursor_x = compose.x.saturating_add(1).saturating_add(typed);
    frame.set_cursor_position(Position::new(
        cursor_x.min(compose.right().saturating_sub(2)),
        compose.y + 1,
    ));

    frame.render_widget(&MessageListView::new(&view.lines), messages);
}

fn header_line(view: &ChatView) -> Line<'_> {
    let button = format!("[ {} ]", view.session_action.label());
    let status = match (&view.signed_in_as, view.session_action) {
        (Some(name), SessionAction::Logout) => format!(" signed in as {name}"),
        _ => " not signed in".to_owned(),
    };
    Line::from(vec![
        Span::styled(button, Style::new().bold().reversed()),
        Span::raw(status),
        Span::raw("   <C-l> login/logout  <CR> send  <Esc> quit").dim(),
    ])
}
