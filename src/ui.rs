//! Terminal presentation layer.
//!
//! Renders the node canvas, the control sidebar and the detail panels, and
//! owns the poll/tick/draw loop that drives the engine from the wall clock.
//! Overlays (the transaction entry form and the concepts reference) sit on
//! top of the main view and capture the keyboard while open.

use std::io;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use crossterm::{
    cursor::{Hide, Show},
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::debug;
use tui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Span, Spans},
    widgets::{
        canvas::{Canvas, Line as CanvasLine, Points, Rectangle},
        Block, Borders, Clear, Paragraph, Wrap,
    },
    Frame, Terminal,
};

use crate::engine::{Clock, Engine, SystemClock};
use crate::error::Result;
use crate::factory::CURRENCIES;
use crate::state::{SimState, MAX_TRANSACTIONS_PER_BLOCK};
use crate::types::Block as ChainBlock;

const FRAME_INTERVAL_MS: u64 = 50;

/// Which form field currently has the keyboard.
#[derive(Clone, Copy, PartialEq)]
enum FormField {
    From,
    To,
    Amount,
    Currency,
}

impl FormField {
    fn next(self) -> Self {
        match self {
            FormField::From => FormField::To,
            FormField::To => FormField::Amount,
            FormField::Amount => FormField::Currency,
            FormField::Currency => FormField::From,
        }
    }

    fn previous(self) -> Self {
        match self {
            FormField::From => FormField::Currency,
            FormField::To => FormField::From,
            FormField::Amount => FormField::To,
            FormField::Currency => FormField::Amount,
        }
    }
}

/// In-progress transaction entry, validated on submit.
struct TransactionForm {
    from: String,
    to: String,
    amount: String,
    currency_index: usize,
    field: FormField,
    error: Option<String>,
}

impl TransactionForm {
    fn new() -> Self {
        TransactionForm {
            from: String::new(),
            to: String::new(),
            amount: String::new(),
            currency_index: 0,
            field: FormField::From,
            error: None,
        }
    }

    fn currency(&self) -> &'static str {
        CURRENCIES[self.currency_index % CURRENCIES.len()]
    }
}

enum Overlay {
    None,
    Form(TransactionForm),
    Concepts { scroll: u16 },
}

struct App {
    engine: Engine<SystemClock>,
    overlay: Overlay,
    status: Option<String>,
    should_quit: bool,
}

/// Enter the alternate screen and run the visualizer until the user quits.
pub fn run() -> Result<()> {
    let mut engine = Engine::new(SystemClock);
    engine.subscribe(Box::new(|state: &SimState| {
        debug!(
            "state committed: counter={} pool={} propagations={}",
            state.block_counter,
            state.transaction_pool.len(),
            state.propagations.len()
        );
    }));
    let mut app = App {
        engine,
        overlay: Overlay::None,
        status: None,
        should_quit: false,
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, Hide)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_loop(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, Show)?;
    terminal.show_cursor()?;

    result
}

fn run_loop<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        if event::poll(Duration::from_millis(FRAME_INTERVAL_MS))? {
            if let Event::Key(key) = event::read()? {
                handle_key(app, key.code);
            }
        }

        app.engine.tick()?;
        let now = SystemClock.now_millis();
        terminal.draw(|f| draw(f, app, now))?;

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key(app: &mut App, code: KeyCode) {
    let overlay = std::mem::replace(&mut app.overlay, Overlay::None);
    match overlay {
        Overlay::Form(form) => handle_form_key(app, form, code),
        Overlay::Concepts { scroll } => match code {
            KeyCode::Esc | KeyCode::Char('c') | KeyCode::Char('q') => {}
            KeyCode::Up => app.overlay = Overlay::Concepts { scroll: scroll.saturating_sub(1) },
            KeyCode::Down => app.overlay = Overlay::Concepts { scroll: scroll.saturating_add(1) },
            _ => app.overlay = Overlay::Concepts { scroll },
        },
        Overlay::None => handle_main_key(app, code),
    }
}

fn handle_main_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Char(c) if ('a'..='e').contains(&c) => {
            app.engine.select_node(c.to_ascii_uppercase());
        }
        KeyCode::Char('m') => {
            // Mirror the disabled mine control: an empty pool never mines
            // from the UI, even though the engine could synthesize fillers.
            if app.engine.state().transaction_pool.is_empty() {
                app.status =
                    Some("Add transactions to the pool to mine a new block".to_string());
                return;
            }
            match app.engine.mine_block() {
                Ok(id) => {
                    let origin = app.engine.state().selected_node;
                    app.status = Some(format!("Node {} is mining block #{}...", origin, id));
                }
                Err(e) => app.status = Some(e.to_string()),
            }
        }
        KeyCode::Char('t') => app.overlay = Overlay::Form(TransactionForm::new()),
        KeyCode::Char('p') => {
            let enabled = !app.engine.state().network_pulse;
            app.engine.set_network_pulse(enabled);
        }
        KeyCode::Char('u') => {
            let enabled = !app.engine.state().auto_transactions;
            app.engine.set_auto_transactions(enabled);
            app.status = Some(if enabled {
                "Automatic transactions enabled (one every 3s)".to_string()
            } else {
                "Automatic transactions disabled".to_string()
            });
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            let speed = app.engine.state().propagation_speed + 1;
            app.engine.set_speed(speed);
        }
        KeyCode::Char('-') => {
            let speed = app.engine.state().propagation_speed.saturating_sub(1);
            app.engine.set_speed(speed);
        }
        KeyCode::Char('c') => app.overlay = Overlay::Concepts { scroll: 0 },
        _ => {}
    }
}

fn handle_form_key(app: &mut App, mut form: TransactionForm, code: KeyCode) {
    match code {
        KeyCode::Esc => {} // discard the form
        KeyCode::Enter => match submit_form(app, &form) {
            Ok(()) => app.status = Some("Transaction added to the pool".to_string()),
            Err(e) => {
                form.error = Some(e.to_string());
                app.overlay = Overlay::Form(form);
            }
        },
        KeyCode::Tab | KeyCode::Down => {
            form.field = form.field.next();
            app.overlay = Overlay::Form(form);
        }
        KeyCode::BackTab | KeyCode::Up => {
            form.field = form.field.previous();
            app.overlay = Overlay::Form(form);
        }
        KeyCode::Left => {
            if form.field == FormField::Currency {
                form.currency_index =
                    (form.currency_index + CURRENCIES.len() - 1) % CURRENCIES.len();
            }
            app.overlay = Overlay::Form(form);
        }
        KeyCode::Right => {
            if form.field == FormField::Currency {
                form.currency_index = (form.currency_index + 1) % CURRENCIES.len();
            }
            app.overlay = Overlay::Form(form);
        }
        KeyCode::Backspace => {
            match form.field {
                FormField::From => {
                    form.from.pop();
                }
                FormField::To => {
                    form.to.pop();
                }
                FormField::Amount => {
                    form.amount.pop();
                }
                FormField::Currency => {}
            }
            app.overlay = Overlay::Form(form);
        }
        KeyCode::Char(c) => {
            match form.field {
                FormField::From => form.from.push(c),
                FormField::To => form.to.push(c),
                FormField::Amount => {
                    // Numeric amount with a two-decimal step; loose char
                    // filter here, real validation happens on submit.
                    if c.is_ascii_digit() || c == '.' {
                        form.amount.push(c);
                    }
                }
                FormField::Currency => {}
            }
            app.overlay = Overlay::Form(form);
        }
        _ => app.overlay = Overlay::Form(form),
    }
}

fn submit_form(app: &mut App, form: &TransactionForm) -> Result<()> {
    let amount = form.amount.trim().parse::<f64>().map_err(|_| {
        crate::error::VizError::Transaction("amount must be a positive number".to_string())
    })?;
    app.engine
        .submit_transaction(&form.from, &form.to, amount, form.currency())
}

fn draw<B: Backend>(f: &mut Frame<B>, app: &App, now: u64) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(38),
            Constraint::Min(40),
            Constraint::Length(44),
        ])
        .split(f.size());

    let state = app.engine.state();
    draw_sidebar(f, chunks[0], state, app.status.as_deref());
    draw_network(f, chunks[1], state, now);
    draw_details(f, chunks[2], state);

    match &app.overlay {
        Overlay::None => {}
        Overlay::Form(form) => draw_form(f, form),
        Overlay::Concepts { scroll } => draw_concepts(f, *scroll),
    }
}

fn draw_sidebar<B: Backend>(f: &mut Frame<B>, area: Rect, state: &SimState, status: Option<&str>) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().fg(Color::DarkGray);

    let mut lines: Vec<Spans> = Vec::new();
    lines.push(Spans::from(Span::styled(
        format!(
            "Block counter : {}  ({} mined)",
            state.block_counter,
            state.total_mined()
        ),
        bold,
    )));

    // Origin node selector row, selected letter highlighted.
    let mut selector = vec![Span::raw("Origin node   : ")];
    for node in &state.nodes {
        let style = if node.id == state.selected_node {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        selector.push(Span::styled(format!(" {} ", node.id), style));
    }
    lines.push(Spans::from(selector));
    lines.push(Spans::from(format!(
        "Speed         : {}x",
        state.propagation_speed
    )));
    lines.push(Spans::from(format!(
        "[{}] Network pulse          (p)",
        if state.network_pulse { "x" } else { " " }
    )));
    lines.push(Spans::from(format!(
        "[{}] Automatic transactions (u)",
        if state.auto_transactions { "x" } else { " " }
    )));
    lines.push(Spans::from(""));

    lines.push(Spans::from(Span::styled(
        format!(
            "Transaction pool: {} pending",
            state.transaction_pool.len()
        ),
        bold,
    )));
    if state.transaction_pool.is_empty() {
        lines.push(Spans::from(Span::styled(
            "  no pending transactions",
            dim,
        )));
        lines.push(Spans::from(Span::styled(
            "  press 't' to create one",
            dim,
        )));
    } else {
        for tx in state.transaction_pool.iter().take(MAX_TRANSACTIONS_PER_BLOCK) {
            lines.push(Spans::from(format!(
                "  {} -> {}  {} {}",
                tx.from, tx.to, tx.amount, tx.currency
            )));
        }
        let overflow = state
            .transaction_pool
            .len()
            .saturating_sub(MAX_TRANSACTIONS_PER_BLOCK);
        if overflow > 0 {
            lines.push(Spans::from(Span::styled(format!("  +{} more", overflow), dim)));
        }
        lines.push(Spans::from(Span::styled(
            "  next step: press 'm' to mine",
            dim,
        )));
    }
    lines.push(Spans::from(""));

    lines.push(Spans::from(Span::styled("Keys", bold)));
    lines.push(Spans::from("  a-e  select origin node"));
    lines.push(Spans::from("  t    create transaction"));
    lines.push(Spans::from("  m    mine a new block"));
    lines.push(Spans::from("  +/-  propagation speed"));
    lines.push(Spans::from("  c    core concepts"));
    lines.push(Spans::from("  q    quit"));
    lines.push(Spans::from(""));

    lines.push(Spans::from(Span::styled("Legend", bold)));
    lines.push(Spans::from(Span::styled("  yellow  selected node", dim)));
    lines.push(Spans::from(Span::styled("  red     mining node", dim)));
    lines.push(Spans::from(Span::styled("  blue    communicating node", dim)));
    lines.push(Spans::from(Span::styled("  green   active propagation", dim)));

    if let Some(message) = status {
        lines.push(Spans::from(""));
        lines.push(Spans::from(Span::styled(
            message.to_string(),
            Style::default().fg(Color::Yellow),
        )));
    }

    let sidebar = Paragraph::new(lines)
        .block(
            Block::default()
                .title(" BLOCKCHAIN NETWORK ")
                .borders(Borders::ALL),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(sidebar, area);
}

fn draw_network<B: Backend>(f: &mut Frame<B>, area: Rect, state: &SimState, now: u64) {
    let canvas = Canvas::default()
        .block(Block::default().title(" NETWORK ").borders(Borders::ALL))
        .x_bounds([0.0, 800.0])
        .y_bounds([0.0, 460.0])
        .paint(|ctx| {
            // Connections between every pair of nodes. The layout uses
            // screen coordinates with y growing downward; the canvas grows
            // upward, so y is flipped here.
            for (i, a) in state.nodes.iter().enumerate() {
                for b in state.nodes.iter().skip(i + 1) {
                    let propagating = state.propagations.iter().any(|p| {
                        (p.from_node == a.id && p.to_node == b.id)
                            || (p.from_node == b.id && p.to_node == a.id)
                    });
                    let active = a.is_active || b.is_active;
                    let color = if propagating {
                        Color::Green
                    } else if active {
                        Color::Blue
                    } else {
                        Color::DarkGray
                    };
                    ctx.draw(&CanvasLine {
                        x1: a.x,
                        y1: 460.0 - a.y,
                        x2: b.x,
                        y2: 460.0 - b.y,
                        color,
                    });

                    if propagating {
                        // Dot travelling from the mining node to the peer.
                        let (from, to) = if state
                            .propagations
                            .iter()
                            .any(|p| p.from_node == a.id && p.to_node == b.id)
                        {
                            (a, b)
                        } else {
                            (b, a)
                        };
                        let t = (now % 800) as f64 / 800.0;
                        let dot = [(
                            from.x + (to.x - from.x) * t,
                            460.0 - (from.y + (to.y - from.y) * t),
                        )];
                        ctx.draw(&Points {
                            coords: &dot,
                            color: Color::Yellow,
                        });
                    } else if !active && state.network_pulse {
                        // Idle pulse: faint dots drifting along the edge.
                        let phase = (now % 1200) as f64 / 1200.0;
                        let mut dots = Vec::with_capacity(3);
                        for k in 0..3 {
                            let t = (phase + k as f64 / 3.0) % 1.0;
                            dots.push((
                                a.x + (b.x - a.x) * t,
                                460.0 - (a.y + (b.y - a.y) * t),
                            ));
                        }
                        ctx.draw(&Points {
                            coords: &dots,
                            color: Color::Gray,
                        });
                    }
                }
            }

            ctx.layer();

            for node in &state.nodes {
                let color = if node.is_mining {
                    Color::Red
                } else if node.is_active {
                    Color::Blue
                } else if node.id == state.selected_node {
                    Color::Yellow
                } else {
                    Color::Gray
                };
                let y = 460.0 - node.y;
                ctx.draw(&Rectangle {
                    x: node.x - 16.0,
                    y: y - 12.0,
                    width: 32.0,
                    height: 24.0,
                    color,
                });
                let label = if node.is_mining {
                    format!("{} *", node.id)
                } else {
                    node.id.to_string()
                };
                ctx.print(
                    node.x - 4.0,
                    y,
                    Spans::from(Span::styled(
                        label,
                        Style::default().fg(color).add_modifier(Modifier::BOLD),
                    )),
                );
                ctx.print(
                    node.x - 14.0,
                    y - 26.0,
                    Spans::from(Span::styled(
                        format!("{} blocks", node.blocks.len()),
                        Style::default().fg(Color::DarkGray),
                    )),
                );
            }
        });
    f.render_widget(canvas, area);
}

fn draw_details<B: Backend>(f: &mut Frame<B>, area: Rect, state: &SimState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(8)])
        .split(area);

    let selected = state.node(state.selected_node);

    let mut node_lines: Vec<Spans> = Vec::new();
    if let Some(node) = selected {
        let status = if node.is_mining {
            "Active mining"
        } else if node.is_active {
            "Communicating"
        } else {
            "Idle"
        };
        node_lines.push(Spans::from(format!("Status          : {}", status)));
        node_lines.push(Spans::from(format!("Blocks in chain : {}", node.blocks.len())));
        node_lines.push(Spans::from(format!("Blocks mined    : {}", node.blocks_mined)));
        if let Some(last) = node.blocks.last() {
            node_lines.push(Spans::from(format!("Last block      : #{}", last.id)));
        }
        node_lines.push(Spans::from(Span::styled(
            "Maintains a local copy of the chain",
            Style::default().fg(Color::DarkGray),
        )));
    }
    let node_panel = Paragraph::new(node_lines).block(
        Block::default()
            .title(format!(" NODE {} ", state.selected_node))
            .borders(Borders::ALL),
    );
    f.render_widget(node_panel, chunks[0]);

    let block_lines = selected
        .and_then(|n| n.blocks.last())
        .map(block_detail_lines)
        .unwrap_or_default();
    let block_panel = Paragraph::new(block_lines)
        .block(Block::default().title(" LAST BLOCK ").borders(Borders::ALL))
        .wrap(Wrap { trim: false });
    f.render_widget(block_panel, chunks[1]);
}

fn block_detail_lines(block: &ChainBlock) -> Vec<Spans<'static>> {
    let formatted_time = Utc
        .timestamp_millis_opt(block.timestamp as i64)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string());

    let mut lines: Vec<Spans> = vec![
        Spans::from(Span::styled(
            format!("Block #{}", block.id),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Spans::from(format!("Hash          : {}", block.hash)),
        Spans::from(format!("Previous hash : {}", block.previous_hash)),
        Spans::from(format!("Nonce         : {}", block.nonce)),
        Spans::from(format!("Merkle root   : {}", block.merkle_root)),
        Spans::from(format!("Timestamp     : {}", formatted_time)),
        Spans::from(format!("Transactions  : {}", block.transactions.len())),
    ];
    for tx in &block.transactions {
        lines.push(Spans::from(format!(
            "  {} -> {}  {} {} (fee {})",
            tx.from, tx.to, tx.amount, tx.currency, tx.fee
        )));
    }
    lines.push(Spans::from(""));
    lines.push(Spans::from(Span::styled(
        "The block hash covers previous hash,",
        Style::default().fg(Color::DarkGray),
    )));
    lines.push(Spans::from(Span::styled(
        "merkle root, nonce and block id.",
        Style::default().fg(Color::DarkGray),
    )));
    lines
}

fn draw_form<B: Backend>(f: &mut Frame<B>, form: &TransactionForm) {
    let area = centered_rect(46, 14, f.size());
    f.render_widget(Clear, area);

    let field_line = |label: &str, value: &str, active: bool| {
        let style = if active {
            Style::default().fg(Color::Black).bg(Color::Yellow)
        } else {
            Style::default()
        };
        Spans::from(vec![
            Span::raw(format!("{:<18}", label)),
            Span::styled(format!("{} ", value), style),
        ])
    };

    let mut lines = vec![
        field_line("From (sender):", &form.from, form.field == FormField::From),
        field_line("To (recipient):", &form.to, form.field == FormField::To),
        field_line("Amount:", &form.amount, form.field == FormField::Amount),
        field_line(
            "Currency:",
            &format!("< {} >", form.currency()),
            form.field == FormField::Currency,
        ),
        Spans::from(""),
    ];
    if let Some(error) = &form.error {
        lines.push(Spans::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    } else {
        let from = if form.from.is_empty() { "Flavio" } else { &form.from };
        let to = if form.to.is_empty() { "Laura" } else { &form.to };
        let amount = if form.amount.is_empty() { "1.00" } else { &form.amount };
        lines.push(Spans::from(Span::styled(
            format!("e.g. {} sends {} {} to {}", from, amount, form.currency(), to),
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines.push(Spans::from(Span::styled(
        "Tab next · Left/Right currency · Enter submit · Esc cancel",
        Style::default().fg(Color::DarkGray),
    )));

    let panel = Paragraph::new(lines)
        .block(
            Block::default()
                .title(" CREATE NEW TRANSACTION ")
                .borders(Borders::ALL),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(panel, area);
}

fn draw_concepts<B: Backend>(f: &mut Frame<B>, scroll: u16) {
    let size = f.size();
    let area = Rect {
        x: size.width / 10,
        y: size.height / 10,
        width: size.width - size.width / 5,
        height: size.height - size.height / 5,
    };
    f.render_widget(Clear, area);

    let panel = Paragraph::new(CONCEPTS_TEXT)
        .block(
            Block::default()
                .title(" CORE BLOCKCHAIN CONCEPTS (Up/Down scroll, Esc close) ")
                .borders(Borders::ALL),
        )
        .alignment(Alignment::Left)
        .scroll((scroll, 0))
        .wrap(Wrap { trim: false });
    f.render_widget(panel, area);
}

/// Fixed-size rectangle centered in `r`, clamped to the frame.
fn centered_rect(width: u16, height: u16, r: Rect) -> Rect {
    let width = width.min(r.width);
    let height = height.min(r.height);
    Rect {
        x: r.x + (r.width - width) / 2,
        y: r.y + (r.height - height) / 2,
        width,
        height,
    }
}

const CONCEPTS_TEXT: &str = "\
WHAT IS A BLOCK?

A block is a container of transactions plus a small header: its own hash,
the previous block's hash, a merkle root summarizing the transactions, a
nonce and a timestamp. Linking each block to the previous one's hash forms
the chain.

CRYPTOGRAPHY AND HASH FUNCTIONS

Real chains use cryptographic hash functions: deterministic, fast to
compute, irreversible, and wildly sensitive to input changes. This
visualizer fabricates its hashes (a reversible base64 slice) so you can see
the linking mechanism without any real cryptography.

MINING AND PROOF OF WORK

Miners collect pending transactions, then search for a nonce that makes the
block hash satisfy a difficulty target. Here mining is a fixed 2-second
animation and the nonce is random: the point is the sequence (collect,
mine, append, propagate), not the work.

DECENTRALIZED ARCHITECTURE

Every node keeps its own full copy of the chain. No central server decides
what is true; new blocks travel node to node until everyone has them. Watch
the staggered propagation after a block is mined: each peer receives and
appends its own copy.

SECURITY AND CONSENSUS

Real networks need a consensus rule (proof of work, proof of stake) so all
nodes agree on one history even with faulty or hostile participants. This
simulation has a single honest miner and no conflicts, so no consensus
protocol is modeled.

TRANSACTION FLOW

A transaction is created, waits in the shared pool, is selected by a miner
(oldest first, up to three per block here), gets sealed into a block, and
finally reaches every node through propagation.

IMMUTABILITY

Because each block embeds the previous block's hash, editing an old block
would change its hash and break every later link. Chains only grow: blocks
are appended, never removed.
";
