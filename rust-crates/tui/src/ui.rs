use std::io::stdout;

use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEventKind,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use futures::StreamExt;
use itertools::Itertools;
use ratatui::{
    prelude::*,
    widgets::*,
};

use crate::client::{
    AppSnapshot,
    Screen,
};
use touchline_core::{
    snapshot::BOARD_CELLS,
    view::TableView,
};

pub enum UserEvent {
    Quit,
    StartRoom,
    EnterGame,
    Roll,
    Redraw,
}

#[derive(Debug, Default)]
pub struct UiState {
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

pub type InputEvents = EventStream;

pub fn input_event_stream() -> InputEvents {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut InputEvents) -> Result<Event> {
    match events.next().await {
        Some(Ok(event)) => Ok(event),
        Some(Err(err)) => Err(eyre!("input stream error: {err}")),
        None => Err(eyre!("input stream closed")),
    }
}

pub fn interpret_event(event: Event) -> Option<UserEvent> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Some(UserEvent::Quit),
            KeyCode::Char('s') => Some(UserEvent::StartRoom),
            KeyCode::Char('g') => Some(UserEvent::EnterGame),
            KeyCode::Char('r') => Some(UserEvent::Roll),
            _ => None,
        },
        Event::Resize(_, _) => Some(UserEvent::Redraw),
        _ => None,
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    // Single persistent Terminal so buffers survive across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::event::DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen
    )?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| render(f, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

fn render(f: &mut Frame, snap: &AppSnapshot) {
    if let Some(error) = &snap.load_error {
        render_center_notice(f, error, "Press 'r' to retry, 'q' to quit", Color::Red);
        return;
    }
    match snap.screen {
        Screen::Lobby => render_lobby(f, snap),
        Screen::Game => render_game(f, snap),
    }
}

fn render_center_notice(f: &mut Frame, headline: &str, hint: &str, color: Color) {
    let area = f.area();
    let block = Block::default().borders(Borders::ALL);
    let lines = vec![
        Line::raw(""),
        Line::styled(headline.to_string(), Style::default().fg(color)),
        Line::raw(""),
        Line::styled(hint.to_string(), Style::default().fg(Color::DarkGray)),
    ];
    let notice = Paragraph::new(lines)
        .block(block)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(notice, area);
}

fn render_lobby(f: &mut Frame, snap: &AppSnapshot) {
    let Some(room) = &snap.room else {
        render_center_notice(f, "Loading room...", "'q' quits", Color::White);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(f.area());

    let header_lines = vec![
        Line::from(vec![
            Span::raw("Room "),
            Span::styled(
                room.room_id.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::raw("Join code: "),
            Span::styled(
                room.room_code.clone(),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  (share this with the other players)"),
        ]),
    ];
    let header = Paragraph::new(header_lines)
        .block(Block::default().borders(Borders::ALL).title("Touchline"));
    f.render_widget(header, chunks[0]);

    let items: Vec<ListItem> = room
        .players
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let role = if index == 0 { "host" } else { "player" };
            let you = if *name == room.user { " (you)" } else { "" };
            let line = format!("{name}{you}  -  {role}");
            let style = if index == 0 {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };
            ListItem::new(line).style(style)
        })
        .collect();
    let title = format!(
        "Participants ({}/{})",
        room.players.len(),
        room.max_players
    );
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(list, chunks[1]);

    let status = Paragraph::new(snap.status.clone())
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, chunks[2]);
}

fn render_game(f: &mut Frame, snap: &AppSnapshot) {
    let Some(table) = &snap.table else {
        render_center_notice(f, "Loading match state...", "'q' quits", Color::White);
        return;
    };

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(f.area());

    render_board(f, snap, table, columns[0]);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(6),
            Constraint::Length(9),
            Constraint::Length(3),
        ])
        .split(columns[1]);

    render_roster(f, snap, table, side[0]);
    render_dice(f, snap, side[1]);

    let status = Paragraph::new(snap.status.clone())
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, side[2]);
}

fn render_board(f: &mut Frame, snap: &AppSnapshot, table: &TableView, area: Rect) {
    let active_position = snap
        .turn
        .as_ref()
        .and_then(|t| t.active.as_ref())
        .map(|p| p.position);

    let items: Vec<ListItem> = (1..=BOARD_CELLS)
        .map(|position| {
            let name = snap
                .board
                .as_ref()
                .and_then(|b| b.cell(position))
                .map(|c| c.name.clone())
                .unwrap_or_else(|| format!("Cell {position}"));
            let tokens = table
                .occupancy
                .get(&position)
                .map(|players| {
                    players
                        .iter()
                        .map(|t| format!("P{}", t.seat_order))
                        .join(",")
                })
                .unwrap_or_default();
            let line = format!("{position:>2}  {name:<28} {tokens}");
            let mut style = Style::default();
            if Some(position) == active_position {
                style = style.fg(Color::Yellow).add_modifier(Modifier::BOLD);
            } else if !tokens.is_empty() {
                style = style.fg(Color::Green);
            }
            ListItem::new(line).style(style)
        })
        .collect();

    let title = snap
        .board
        .as_ref()
        .map(|b| format!("{} ({})", b.edition, b.currency))
        .unwrap_or_else(|| "Board".to_string());
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(list, area);
}

fn render_roster(f: &mut Frame, snap: &AppSnapshot, table: &TableView, area: Rect) {
    let symbol = snap
        .board
        .as_ref()
        .map(|b| b.currency_symbol.clone())
        .unwrap_or_else(|| "$".to_string());
    let active_id = snap
        .turn
        .as_ref()
        .and_then(|t| t.active.as_ref())
        .map(|p| p.id.clone());

    let items: Vec<ListItem> = table
        .roster
        .iter()
        .map(|card| {
            let you = if snap.you.as_deref() == Some(card.id.as_str()) {
                " (you)"
            } else {
                ""
            };
            let line = format!(
                "P{} {}{}  {}{}  cell {:>2}  holds {}",
                card.seat_order, card.id, you, symbol, card.money, card.position, card.holdings
            );
            let style = if active_id.as_deref() == Some(card.id.as_str()) {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(line).style(style)
        })
        .collect();

    let title = snap
        .board
        .as_ref()
        .map(|b| format!("{}s", b.terms.player))
        .unwrap_or_else(|| "Players".to_string());
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(list, area);
}

fn render_dice(f: &mut Frame, snap: &AppSnapshot, area: Rect) {
    let (a, b) = snap.dice;
    let faces = die_face(a)
        .iter()
        .zip(die_face(b))
        .map(|(left, right)| Line::raw(format!("{left}   {right}")))
        .collect::<Vec<_>>();

    let mut lines = faces;
    lines.push(Line::raw(""));
    if snap.rolling {
        lines.push(Line::styled(
            "Rolling...",
            Style::default().fg(Color::Magenta),
        ));
    } else if let Some(message) = &snap.roll_message {
        let stamp = snap
            .rolled_at
            .as_ref()
            .map(|at| format!("  [{at}]"))
            .unwrap_or_default();
        lines.push(Line::styled(
            format!("{message}{stamp}"),
            Style::default().fg(Color::Green),
        ));
    } else if let Some(error) = &snap.roll_error {
        lines.push(Line::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        ));
    } else {
        lines.push(Line::styled(
            "'r' rolls the dice",
            Style::default().fg(Color::DarkGray),
        ));
    }

    let dice = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Dice"));
    f.render_widget(dice, area);
}

fn die_face(value: u8) -> [&'static str; 3] {
    match value {
        1 => ["     ", "  o  ", "     "],
        2 => ["o    ", "     ", "    o"],
        3 => ["o    ", "  o  ", "    o"],
        4 => ["o   o", "     ", "o   o"],
        5 => ["o   o", "  o  ", "o   o"],
        _ => ["o   o", "o   o", "o   o"],
    }
}
