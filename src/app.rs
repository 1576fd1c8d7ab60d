use std::sync::mpsc;
use std::thread;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::installer::NodeInstaller;
use crate::model::config::AppConfig;
use crate::model::cursor::Direction as MoveDir;
use crate::model::focus::Focus;
use crate::model::text_field::TextField;
use crate::msg::Msg;

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

const INTRO: &str = "1. Enter the path to your ComfyUI custom_nodes directory  \
2. Add GitHub repository URLs (one per line)  \
3. Save Repository List  4. Install Custom Nodes";

pub struct App {
    pub focus: Focus,
    pub path: TextField,
    pub repos: TextField,
    pub output: String,
    output_scroll: u16,
    installer: NodeInstaller,
    pub should_quit: bool,
    pub event_tx: mpsc::Sender<Msg>,
    pub install_running: bool,
    spinner_frame: usize,
}

impl App {
    pub fn new(config: &AppConfig, installer: NodeInstaller, event_tx: mpsc::Sender<Msg>) -> Self {
        let mut path = TextField::single_line();
        let mut repos = TextField::multi_line();

        if !config.ui.default_path.is_empty() {
            path.set_text(&config.ui.default_path);
            repos.set_text(&installer.load_repos(&config.ui.default_path));
        }

        Self {
            focus: Focus::Path,
            path,
            repos,
            output: String::new(),
            output_scroll: 0,
            installer,
            should_quit: false,
            event_tx,
            install_running: false,
            spinner_frame: 0,
        }
    }

    // ── MVU: Update ──────────────────────────────────────────────

    pub fn update(&mut self, msg: Msg) -> Result<()> {
        match msg {
            Msg::Key(key) => self.handle_key(key),
            Msg::ValidatePath => {
                self.set_output(self.installer.validate_path(&self.path.text()));
            }
            Msg::PathChanged => {
                let loaded = self.installer.load_repos(&self.path.text());
                self.repos.set_text(&loaded);
            }
            Msg::SaveRepos => {
                let message = self
                    .installer
                    .save_repos(&self.repos.text(), &self.path.text());
                self.set_output(message);
            }
            Msg::InstallNodes => self.start_install(),
            Msg::InstallFinished(text) => {
                self.install_running = false;
                self.set_output(text);
            }
            Msg::Tick => {
                if self.install_running {
                    self.spinner_frame = (self.spinner_frame + 1) % SPINNER.len();
                }
            }
            Msg::Quit => self.should_quit = true,
            Msg::Resize => {}
        }
        Ok(())
    }

    fn set_output(&mut self, text: String) {
        self.output = text;
        self.output_scroll = 0;
    }

    /// Run the clone entry on a worker thread; the result comes back as
    /// `Msg::InstallFinished`. Only one run at a time.
    fn start_install(&mut self) {
        if self.install_running {
            tracing::warn!("install requested while a run is in progress");
            return;
        }

        self.install_running = true;
        self.set_output("Installing custom nodes. This can take a while...".to_string());

        let installer = self.installer.clone();
        let path = self.path.text();
        let tx = self.event_tx.clone();
        thread::spawn(move || {
            let text = installer.install_nodes(&path);
            if tx.send(Msg::InstallFinished(text)).is_err() {
                tracing::warn!("install finished after the UI closed");
            }
        });
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Esc => self.send(Msg::Quit),
            KeyCode::Char('q') | KeyCode::Char('c') if ctrl => self.send(Msg::Quit),
            KeyCode::Tab => self.focus = self.focus.next(),
            KeyCode::BackTab => self.focus = self.focus.prev(),
            KeyCode::F(2) => self.send(Msg::ValidatePath),
            KeyCode::F(3) => self.send(Msg::SaveRepos),
            KeyCode::F(5) => self.send(Msg::InstallNodes),
            KeyCode::PageUp => self.output_scroll = self.output_scroll.saturating_sub(5),
            KeyCode::PageDown => self.output_scroll = self.output_scroll.saturating_add(5),
            _ => self.handle_key_focused(key),
        }
    }

    fn handle_key_focused(&mut self, key: KeyEvent) {
        match self.focus {
            Focus::Path => {
                let before = self.path.text();
                edit_field(&mut self.path, key);
                if self.path.text() != before {
                    self.send(Msg::PathChanged);
                }
            }
            Focus::Repos => edit_field(&mut self.repos, key),
            button => {
                if matches!(key.code, KeyCode::Enter | KeyCode::Char(' ')) {
                    self.send(button_action(button));
                }
            }
        }
    }

    fn send(&self, msg: Msg) {
        let _ = self.event_tx.send(msg);
    }

    // ── MVU: View ────────────────────────────────────────────────

    pub fn view(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),      // header
                Constraint::Length(3),      // path
                Constraint::Percentage(35), // repos
                Constraint::Length(3),      // buttons
                Constraint::Min(5),         // output
                Constraint::Length(1),      // status bar
            ])
            .split(frame.area());

        self.render_header(frame, chunks[0]);
        self.render_path(frame, chunks[1]);
        self.render_repos(frame, chunks[2]);
        self.render_buttons(frame, chunks[3]);
        self.render_output(frame, chunks[4]);
        self.render_status_bar(frame, chunks[5]);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let header = Paragraph::new(Line::from(Span::styled(
            INTRO,
            Style::default().fg(Color::Gray),
        )))
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title(" ComfyUI Custom Node Installer ")
                .borders(Borders::BOTTOM)
                .style(Style::default().bg(Color::Rgb(20, 20, 30))),
        );
        frame.render_widget(header, area);
    }

    fn render_path(&mut self, frame: &mut Frame, area: Rect) {
        let focused = self.focus == Focus::Path;
        render_field(
            frame,
            area,
            &mut self.path,
            " Path to ComfyUI custom_nodes folder ",
            focused,
        );
    }

    fn render_repos(&mut self, frame: &mut Frame, area: Rect) {
        let focused = self.focus == Focus::Repos;
        render_field(
            frame,
            area,
            &mut self.repos,
            " GitHub Repositories (one per line) ",
            focused,
        );
    }

    fn render_buttons(&self, frame: &mut Frame, area: Rect) {
        let cells = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
            ])
            .split(area);

        let buttons = [
            (Focus::ValidateButton, "Validate Path [F2]"),
            (Focus::SaveButton, "Save Repository List [F3]"),
            (Focus::InstallButton, "Install Custom Nodes [F5]"),
        ];

        for ((focus, label), cell) in buttons.into_iter().zip(cells.iter()) {
            let style = if self.focus == focus {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else if focus == Focus::InstallButton {
                Style::default().fg(Color::Rgb(0, 255, 136))
            } else {
                Style::default().fg(Color::Gray)
            };

            let button = Paragraph::new(Line::from(Span::styled(format!(" {label} "), style)))
                .alignment(ratatui::layout::Alignment::Center)
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(button, *cell);
        }
    }

    fn render_output(&self, frame: &mut Frame, area: Rect) {
        let output = Paragraph::new(self.output.as_str())
            .wrap(Wrap { trim: false })
            .scroll((self.output_scroll, 0))
            .block(
                Block::default()
                    .title(" Output ")
                    .borders(Borders::ALL)
                    .style(Style::default().bg(Color::Rgb(12, 12, 18))),
            );
        frame.render_widget(output, area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let focus_span = Span::styled(
            format!(" {} ", self.focus.label()),
            Style::default()
                .fg(Color::Black)
                .bg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        );

        let activity = if self.install_running {
            format!(" installing {} ", SPINNER[self.spinner_frame])
        } else {
            String::new()
        };

        let info = Span::styled(
            format!(
                "{activity} Tab/Shift+Tab: Focus  Enter: Press  PgUp/PgDn: Scroll Output  Esc: Quit "
            ),
            Style::default().fg(Color::Gray).bg(Color::DarkGray),
        );

        let bar = Line::from(vec![focus_span, info]);
        frame.render_widget(
            Paragraph::new(bar).style(Style::default().bg(Color::DarkGray)),
            area,
        );
    }
}

fn edit_field(field: &mut TextField, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => field.insert_newline(),
        KeyCode::Backspace => field.delete_char_before(),
        KeyCode::Delete => field.delete_char_at(),
        KeyCode::Left => field.move_cursor(MoveDir::Left),
        KeyCode::Right => field.move_cursor(MoveDir::Right),
        KeyCode::Up => field.move_cursor(MoveDir::Up),
        KeyCode::Down => field.move_cursor(MoveDir::Down),
        KeyCode::Home => field.move_cursor(MoveDir::LineStart),
        KeyCode::End => field.move_cursor(MoveDir::LineEnd),
        KeyCode::Char(ch) if is_text_input(key.modifiers) => field.insert_char(ch),
        _ => {}
    }
}

/// Fit the field's viewport to the area inside the border, then draw it.
fn render_field(frame: &mut Frame, area: Rect, field: &mut TextField, title: &str, focused: bool) {
    field.viewport.height = area.height.saturating_sub(2);
    field.viewport.width = area.width.saturating_sub(2);
    field.scroll_to_cursor();

    let lines: Vec<Line> = field.visible_lines().into_iter().map(Line::from).collect();
    frame.render_widget(Paragraph::new(lines).block(field_block(title, focused)), area);

    if focused {
        let (col, row) = field.cursor_in_viewport();
        frame.set_cursor_position((area.x + 1 + col, area.y + 1 + row));
    }
}

/// Modifier sets that still produce a printable character. Windows reports
/// AltGr as Ctrl+Alt, which European layouts need for `\` and `@`.
fn is_text_input(modifiers: KeyModifiers) -> bool {
    let altgr = KeyModifiers::CONTROL | KeyModifiers::ALT;
    modifiers.difference(KeyModifiers::SHIFT).is_empty()
        || modifiers.difference(KeyModifiers::SHIFT) == altgr
}

fn button_action(focus: Focus) -> Msg {
    match focus {
        Focus::ValidateButton => Msg::ValidatePath,
        Focus::SaveButton => Msg::SaveRepos,
        _ => Msg::InstallNodes,
    }
}

fn field_block(title: &str, focused: bool) -> Block<'_> {
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border)
        .style(Style::default().bg(Color::Rgb(15, 15, 24)))
}
