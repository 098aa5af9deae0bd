use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use split_tracker::{
    format_money, format_timestamp, parse_amount, LedgerStore, Session, Summary, TransactionKind,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Ledger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Browse,
    AddForm,
    ConfirmDelete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Amount,
    Kind,
    Reason,
}

impl FormField {
    pub fn next(&self) -> Self {
        match self {
            FormField::Amount => FormField::Kind,
            FormField::Kind => FormField::Reason,
            FormField::Reason => FormField::Amount,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransactionForm {
    pub amount: String,
    pub kind_index: usize,
    pub reason: String,
    pub field: FormField,
}

impl Default for TransactionForm {
    fn default() -> Self {
        Self {
            amount: String::new(),
            kind_index: 0,
            reason: String::new(),
            field: FormField::Amount,
        }
    }
}

impl TransactionForm {
    pub fn kind(&self) -> TransactionKind {
        TransactionKind::ALL[self.kind_index % TransactionKind::ALL.len()]
    }

    pub fn next_kind(&mut self) {
        self.kind_index = (self.kind_index + 1) % TransactionKind::ALL.len();
    }

    pub fn previous_kind(&mut self) {
        let len = TransactionKind::ALL.len();
        self.kind_index = (self.kind_index + len - 1) % len;
    }
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
}

pub struct App<S: LedgerStore> {
    pub session: Session<S>,
    pub summary: Summary,
    pub screen: Screen,
    pub mode: Mode,
    pub login_state: ListState,
    pub table_state: TableState,
    pub form: TransactionForm,
    pub message: Option<StatusMessage>,
}

impl<S: LedgerStore> App<S> {
    pub fn new(mut session: Session<S>) -> Result<Self> {
        let summary = session.summary()?;
        let screen = if session.user().is_some() {
            Screen::Ledger
        } else {
            Screen::Login
        };

        let mut login_state = ListState::default();
        login_state.select(Some(0));

        let mut app = Self {
            session,
            summary,
            screen,
            mode: Mode::Browse,
            login_state,
            table_state: TableState::default(),
            form: TransactionForm::default(),
            message: None,
        };
        app.reset_selection();
        Ok(app)
    }

    pub fn refresh(&mut self) -> Result<()> {
        self.summary = self.session.summary()?;
        self.reset_selection();
        Ok(())
    }

    fn reset_selection(&mut self) {
        if self.summary.ledger.transactions.is_empty() {
            self.table_state.select(None);
        } else {
            let len = self.summary.ledger.transactions.len();
            let selected = self.table_state.selected().unwrap_or(0).min(len - 1);
            self.table_state.select(Some(selected));
        }
    }

    fn info(&mut self, text: String) {
        self.message = Some(StatusMessage { text, is_error: false });
    }

    fn error(&mut self, text: String) {
        self.message = Some(StatusMessage { text, is_error: true });
    }

    // ========================================================================
    // LOGIN
    // ========================================================================

    pub fn toggle_login_choice(&mut self) {
        let next = match self.login_state.selected() {
            Some(0) => 1,
            _ => 0,
        };
        self.login_state.select(Some(next));
    }

    pub fn confirm_login(&mut self) {
        let index = self.login_state.selected().unwrap_or(0);
        let name = self.session.settings().names()[index].to_string();

        match self.session.login(&name) {
            Ok(_) => {
                self.screen = Screen::Ledger;
                self.info(format!("Logged in as {}", name));
            }
            Err(err) => self.error(err.to_string()),
        }
    }

    pub fn logout(&mut self) {
        self.session.logout();
        self.screen = Screen::Login;
        self.mode = Mode::Browse;
        self.message = None;
    }

    // ========================================================================
    // ADD TRANSACTION
    // ========================================================================

    pub fn open_form(&mut self) {
        self.form = TransactionForm::default();
        self.mode = Mode::AddForm;
        self.message = None;
    }

    pub fn submit_form(&mut self) {
        let amount = match parse_amount(&self.form.amount) {
            Ok(amount) => amount,
            Err(err) => {
                self.error(err.to_string());
                return;
            }
        };

        let kind = self.form.kind();
        let result = self
            .session
            .add_transaction(kind, amount, &self.form.reason)
            .and_then(|tx| self.refresh().map(|_| tx));

        match result {
            Ok(tx) => {
                self.mode = Mode::Browse;
                self.table_state.select(Some(0));
                self.info(format!("Transaction recorded: {} {}", kind.label(), format_money(tx.amount)));
            }
            Err(err) => self.error(err.to_string()),
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Browse;
                self.message = None;
            }
            KeyCode::Enter => self.submit_form(),
            KeyCode::Tab | KeyCode::Down => self.form.field = self.form.field.next(),
            KeyCode::Left if self.form.field == FormField::Kind => self.form.previous_kind(),
            KeyCode::Right if self.form.field == FormField::Kind => self.form.next_kind(),
            KeyCode::Backspace => match self.form.field {
                FormField::Amount => {
                    self.form.amount.pop();
                }
                FormField::Reason => {
                    self.form.reason.pop();
                }
                FormField::Kind => {}
            },
            KeyCode::Char(c) => match self.form.field {
                FormField::Amount if c.is_ascii_digit() || c == '.' => self.form.amount.push(c),
                FormField::Reason => self.form.reason.push(c),
                FormField::Kind if c == ' ' => self.form.next_kind(),
                _ => {}
            },
            _ => {}
        }
    }

    // ========================================================================
    // DELETE TRANSACTION
    // ========================================================================

    /// Table rows are newest first
    fn selected_index(&self) -> Option<usize> {
        let len = self.summary.ledger.transactions.len();
        self.table_state
            .selected()
            .filter(|row| *row < len)
            .map(|row| len - 1 - row)
    }

    pub fn request_delete(&mut self) {
        if self.selected_index().is_some() {
            self.mode = Mode::ConfirmDelete;
        } else {
            self.error("No transaction selected".to_string());
        }
    }

    pub fn confirm_delete(&mut self) {
        self.mode = Mode::Browse;

        let Some(index) = self.selected_index() else {
            return;
        };
        let id = self.summary.ledger.transactions[index].id;

        let result = self
            .session
            .delete_transaction(id)
            .and_then(|tx| self.refresh().map(|_| tx));

        match result {
            Ok(tx) => self.info(format!("Transaction deleted: {} {}", tx.kind.label(), format_money(tx.amount))),
            Err(err) => self.error(err.to_string()),
        }
    }

    // ========================================================================
    // NAVIGATION
    // ========================================================================

    pub fn next(&mut self) {
        let len = self.summary.ledger.transactions.len();
        if len == 0 {
            return;
        }
        let i = match self.table_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.table_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.summary.ledger.transactions.len();
        if len == 0 {
            return;
        }
        let i = match self.table_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.table_state.select(Some(i));
    }

    /// Returns false when the app should exit
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match (self.screen, self.mode) {
            (Screen::Login, _) => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return false,
                KeyCode::Up | KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('k') => {
                    self.toggle_login_choice()
                }
                KeyCode::Enter => self.confirm_login(),
                _ => {}
            },
            (Screen::Ledger, Mode::AddForm) => self.handle_form_key(key),
            (Screen::Ledger, Mode::ConfirmDelete) => match key.code {
                KeyCode::Char('y') => self.confirm_delete(),
                KeyCode::Char('n') | KeyCode::Esc => self.mode = Mode::Browse,
                _ => {}
            },
            (Screen::Ledger, Mode::Browse) => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return false,
                KeyCode::Char('a') => self.open_form(),
                KeyCode::Char('d') | KeyCode::Delete => self.request_delete(),
                KeyCode::Char('u') => self.logout(),
                KeyCode::Char('r') => {
                    if let Err(err) = self.refresh() {
                        self.error(err.to_string());
                    }
                }
                KeyCode::Down | KeyCode::Char('j') => self.next(),
                KeyCode::Up | KeyCode::Char('k') => self.previous(),
                _ => {}
            },
        }
        true
    }
}

pub fn run_ui<S: LedgerStore>(app: &mut App<S>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: ratatui::backend::Backend, S: LedgerStore>(
    terminal: &mut Terminal<B>,
    app: &mut App<S>,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if !app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

fn ui<S: LedgerStore>(f: &mut Frame, app: &mut App<S>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.screen {
        Screen::Login => render_login(f, chunks[1], app),
        Screen::Ledger => {
            let content = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(6), Constraint::Min(0)])
                .split(chunks[1]);

            render_summary(f, content[0], app);
            render_table(f, content[1], app);

            match app.mode {
                Mode::AddForm => render_form(f, chunks[1], app),
                Mode::ConfirmDelete => render_confirm(f, chunks[1], app),
                Mode::Browse => {}
            }
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header<S: LedgerStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let mut spans = vec![Span::styled(
        "💸 Split Tracker",
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    )];

    if let Some(name) = app.session.user_name() {
        spans.push(Span::raw("  |  Logged in as: "));
        spans.push(Span::styled(
            name.to_string(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));
    }

    let header = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_login<S: LedgerStore>(f: &mut Frame, area: Rect, app: &mut App<S>) {
    let items: Vec<ListItem> = app
        .session
        .settings()
        .names()
        .iter()
        .map(|name| ListItem::new(name.to_string()))
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" 👋 Welcome! Who are you? "),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("→ ");

    f.render_stateful_widget(list, centered_rect(40, 30, area), &mut app.login_state);
}

fn render_summary<S: LedgerStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let ledger = &app.summary.ledger;
    let settlement = &app.summary.settlement;

    let balance_line = |name: &str, balance| {
        Line::from(vec![
            Span::styled(format!("{} balance: ", name), Style::default().fg(Color::White)),
            Span::styled(format_money(balance), Style::default().add_modifier(Modifier::BOLD)),
        ])
    };

    let settlement_style = if settlement.is_settled() {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    };
    let settlement_icon = if settlement.is_settled() { "✅ " } else { "💰 " };

    let lines = vec![
        balance_line(&ledger.party_a.name, ledger.party_a.balance),
        balance_line(&ledger.party_b.name, ledger.party_b.balance),
        Line::from(""),
        Line::from(vec![
            Span::raw(settlement_icon),
            Span::styled(app.summary.statement(), settlement_style),
        ]),
    ];

    let summary = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" 📒 Ledger Summary "),
    );

    f.render_widget(summary, area);
}

fn render_table<S: LedgerStore>(f: &mut Frame, area: Rect, app: &mut App<S>) {
    let header_cells = ["When", "Who", "Type", "Amount", "Reason"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let ledger = &app.summary.ledger;
    let rows = ledger.transactions.iter().rev().map(|tx| {
        let color = if tx.kind.is_settlement() {
            Color::Green
        } else {
            Color::White
        };

        Row::new(vec![
            Cell::from(format_timestamp(&tx.timestamp)),
            Cell::from(ledger.party(tx.actor).name.clone()),
            Cell::from(tx.kind.label()).style(Style::default().fg(color)),
            Cell::from(format_money(tx.amount)),
            Cell::from(truncate(&tx.reason, 30)),
        ])
        .height(1)
    });

    let title = if ledger.transactions.is_empty() {
        " 🧾 No transactions yet "
    } else {
        " 🧾 Transactions "
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(20),
            Constraint::Length(12),
            Constraint::Min(30),
            Constraint::Length(12),
            Constraint::Length(32),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(title))
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.table_state);
}

fn render_form<S: LedgerStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let popup = centered_rect(70, 50, area);
    let form = &app.form;

    let field_style = |field: FormField| {
        if form.field == field {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        }
    };

    let lines = vec![
        Line::from(vec![
            Span::styled("Amount: ", field_style(FormField::Amount)),
            Span::raw(format!("${}", form.amount)),
        ]),
        Line::from(vec![
            Span::styled("Type:   ", field_style(FormField::Kind)),
            Span::raw(format!("◀ {} ▶", form.kind().label())),
        ]),
        Line::from(vec![
            Span::styled("Reason: ", field_style(FormField::Reason)),
            Span::raw(form.reason.clone()),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "Tab next field | ←/→ change type | Enter save | Esc cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" New Transaction "),
    );

    f.render_widget(Clear, popup);
    f.render_widget(widget, popup);
}

fn render_confirm<S: LedgerStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let popup = centered_rect(60, 25, area);
    let description = app
        .selected_index()
        .map(|i| app.summary.ledger.transactions[i].describe(&app.summary.ledger))
        .unwrap_or_default();

    let lines = vec![
        Line::from("Are you sure you want to delete this transaction?"),
        Line::from(""),
        Line::from(Span::styled(description, Style::default().add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(vec![
            Span::styled("y", Style::default().fg(Color::Red)),
            Span::raw(" delete | "),
            Span::styled("n", Style::default().fg(Color::Yellow)),
            Span::raw(" keep"),
        ]),
    ];

    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(" 🗑️ Delete Transaction "),
    );

    f.render_widget(Clear, popup);
    f.render_widget(widget, popup);
}

fn render_status_bar<S: LedgerStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let mut status_spans = vec![];

    if let Some(message) = &app.message {
        let color = if message.is_error { Color::Red } else { Color::Green };
        status_spans.push(Span::styled(format!(" {} ", message.text), Style::default().fg(color)));
        status_spans.push(Span::raw(" | "));
    }

    let keys: &[(&str, &str)] = match app.screen {
        Screen::Login => &[("↑/↓", " Choose | "), ("Enter", " Continue | "), ("q", " Quit")],
        Screen::Ledger => &[
            ("a", " Add | "),
            ("d", " Delete | "),
            ("↑/↓", " Nav | "),
            ("u", " Switch user | "),
            ("q", " Quit"),
        ],
    };
    for (key, label) in keys {
        status_spans.push(Span::styled(*key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(*label));
    }

    let status_bar = Paragraph::new(Line::from(status_spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
