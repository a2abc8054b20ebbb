use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::api::{Api, ApiError};
use crate::bookmark::{BookmarkController, BookmarkOutcome, BookmarkTicket};
use crate::db::Database;
use crate::fetcher::{FetchStatus, FetchTicket, ListingFetcher, ListingView};
use crate::filter::{FilterStore, Location};
use crate::models::{self, ActiveFilter, DomainTag, PostPage, RoleCategory, RoleTag, SortOrder};
use crate::session::Session;

enum Message {
    Listing(FetchTicket, Result<PostPage, ApiError>),
    Bookmark(BookmarkTicket, Result<(), ApiError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PickerEntry {
    Role(RoleTag),
    Domain(DomainTag),
}

fn picker_entries() -> Vec<PickerEntry> {
    RoleTag::ALL
        .into_iter()
        .map(PickerEntry::Role)
        .chain(DomainTag::ALL.into_iter().map(PickerEntry::Domain))
        .collect()
}

struct AppState<'a> {
    store: FilterStore<'a>,
    session: Session<'a>,
    fetcher: ListingFetcher,
    bookmarks: BookmarkController,
    selected: usize,
    notice: Option<String>,
    login_prompt: bool,
    picker: Option<usize>,
    api_url: String,
}

impl AppState<'_> {
    fn next(&mut self) {
        let len = self.fetcher.posts().len();
        if len > 0 && self.selected < len - 1 {
            self.selected += 1;
        }
    }

    fn prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn last_page_index(&self) -> u32 {
        match self.fetcher.view() {
            ListingView::Loaded(page) => page.paginator.last_page.saturating_sub(1),
            _ => self.store.state().page,
        }
    }
}

pub async fn run_browse(api: Arc<dyn Api>, db: &Database, location: Location, api_url: &str) -> Result<()> {
    let store = FilterStore::mount(location, db)?;
    let mut state = AppState {
        store,
        session: Session::new(db),
        fetcher: ListingFetcher::new(),
        bookmarks: BookmarkController::new(),
        selected: 0,
        notice: None,
        login_prompt: false,
        picker: None,
        api_url: api_url.to_string(),
    };
    let (tx, mut rx) = mpsc::unbounded_channel();
    request_listing(&mut state, &api, &tx);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, &api, &tx, &mut rx);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn request_listing(state: &mut AppState<'_>, api: &Arc<dyn Api>, tx: &UnboundedSender<Message>) {
    let ticket = state.fetcher.begin(state.store.state(), &state.session);
    let api = Arc::clone(api);
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = api.list_posts(ticket.filter(), ticket.token()).await;
        let _ = tx.send(Message::Listing(ticket, result));
    });
}

fn request_bookmark(state: &mut AppState<'_>, api: &Arc<dyn Api>, tx: &UnboundedSender<Message>) {
    let Some(post) = state.fetcher.posts().get(state.selected) else {
        return;
    };
    match state
        .bookmarks
        .begin(&post.id, post.is_bookmarked, &state.session)
    {
        Ok(ticket) => {
            let api = Arc::clone(api);
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = api
                    .set_bookmark(ticket.post_id(), ticket.target(), ticket.token())
                    .await;
                let _ = tx.send(Message::Bookmark(ticket, result));
            });
        }
        Err(outcome) => handle_bookmark_outcome(state, outcome),
    }
}

fn handle_bookmark_outcome(state: &mut AppState<'_>, outcome: BookmarkOutcome) {
    match outcome {
        BookmarkOutcome::Updated(true) => state.notice = Some("Bookmarked.".to_string()),
        BookmarkOutcome::Updated(false) => state.notice = Some("Bookmark removed.".to_string()),
        BookmarkOutcome::LoginRequired => state.login_prompt = true,
        BookmarkOutcome::Suppressed => {}
        BookmarkOutcome::Failed(message) => state.notice = Some(message),
    }
}

fn handle_message(state: &mut AppState<'_>, message: Message, api: &Arc<dyn Api>, tx: &UnboundedSender<Message>) {
    match message {
        Message::Listing(ticket, result) => {
            match state.fetcher.complete(ticket, result, &state.session) {
                FetchStatus::Applied => {
                    let len = state.fetcher.posts().len();
                    if state.selected >= len {
                        state.selected = len.saturating_sub(1);
                    }
                }
                FetchStatus::Reload => {
                    state.notice = Some("Your session expired. Showing postings logged out.".to_string());
                    request_listing(state, api, tx);
                }
                FetchStatus::Stale | FetchStatus::Failed => {}
            }
        }
        Message::Bookmark(ticket, result) => {
            let post_id = ticket.post_id().to_string();
            let outcome = state.bookmarks.finish(ticket, result, &state.session);
            if let Some(post) = state
                .fetcher
                .posts_mut()
                .and_then(|posts| posts.iter_mut().find(|p| p.id == post_id))
            {
                outcome.apply_to(post);
            }
            handle_bookmark_outcome(state, outcome);
        }
    }
}

// Applies a filter mutation and refetches when it succeeded.
fn mutate(
    state: &mut AppState<'_>,
    api: &Arc<dyn Api>,
    tx: &UnboundedSender<Message>,
    change: impl FnOnce(&mut FilterStore<'_>) -> Result<bool>,
) {
    match change(&mut state.store) {
        Ok(true) => {
            state.selected = 0;
            request_listing(state, api, tx);
        }
        Ok(false) => {}
        Err(e) => state.notice = Some(format!("Could not save filters: {}", e)),
    }
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState<'_>,
    api: &Arc<dyn Api>,
    tx: &UnboundedSender<Message>,
    rx: &mut UnboundedReceiver<Message>,
) -> Result<()> {
    let mut list_state = ListState::default();

    loop {
        while let Ok(message) = rx.try_recv() {
            handle_message(state, message, api, tx);
        }

        list_state.select(if state.fetcher.posts().is_empty() {
            None
        } else {
            Some(state.selected)
        });
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if state.login_prompt {
            state.login_prompt = false;
            continue;
        }
        state.notice = None;

        if let Some(cursor) = state.picker {
            let entries = picker_entries();
            match key.code {
                KeyCode::Esc | KeyCode::Char('f') | KeyCode::Char('q') => state.picker = None,
                KeyCode::Down | KeyCode::Char('j') => {
                    state.picker = Some((cursor + 1).min(entries.len() - 1));
                }
                KeyCode::Up | KeyCode::Char('k') => state.picker = Some(cursor.saturating_sub(1)),
                KeyCode::Enter | KeyCode::Char(' ') => match entries[cursor] {
                    PickerEntry::Role(role) => {
                        mutate(state, api, tx, |store| store.toggle_role(role).map(|_| true));
                    }
                    PickerEntry::Domain(domain) => {
                        mutate(state, api, tx, |store| store.toggle_domain(domain).map(|_| true));
                    }
                },
                _ => {}
            }
            continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => break,
            KeyCode::Down | KeyCode::Char('j') => state.next(),
            KeyCode::Up | KeyCode::Char('k') => state.prev(),
            KeyCode::Char('n') | KeyCode::Right => {
                let page = state.store.state().page;
                if page < state.last_page_index() {
                    mutate(state, api, tx, |store| store.set_page(page + 1).map(|_| true));
                }
            }
            KeyCode::Char('p') | KeyCode::Left => {
                let page = state.store.state().page;
                if page > 0 {
                    mutate(state, api, tx, |store| store.set_page(page - 1).map(|_| true));
                }
            }
            KeyCode::Char('s') => {
                let order = match state.store.state().order {
                    SortOrder::Recent => SortOrder::Deadline,
                    SortOrder::Deadline => SortOrder::Recent,
                };
                mutate(state, api, tx, |store| store.set_sort_order(order).map(|_| true));
            }
            KeyCode::Char('a') => {
                let active = match state.store.state().active {
                    ActiveFilter::All => ActiveFilter::ActiveOnly,
                    ActiveFilter::ActiveOnly => ActiveFilter::All,
                };
                mutate(state, api, tx, |store| store.set_active_only(active).map(|_| true));
            }
            KeyCode::Char(c @ '1'..='4') => {
                let index = c as usize - '1' as usize;
                let category = RoleCategory::ALL[index];
                mutate(state, api, tx, |store| store.toggle_role_category(category).map(|_| true));
            }
            KeyCode::Char('d') => {
                mutate(state, api, tx, |store| store.toggle_all_domains().map(|_| true));
            }
            KeyCode::Char('r') => {
                mutate(state, api, tx, |store| store.reset_secondary_filters());
            }
            KeyCode::Char('f') => state.picker = Some(0),
            KeyCode::Char('g') => request_listing(state, api, tx),
            KeyCode::Char('b') => request_bookmark(state, api, tx),
            _ => {}
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &AppState<'_>, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    frame.render_widget(build_filter_bar(state), rows[0]);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(rows[1]);

    // Left panel: postings
    let title = match state.fetcher.view() {
        ListingView::Loading => " Postings (loading...) ".to_string(),
        ListingView::Loaded(page) => format!(" Postings ({}) ", page.posts.len()),
        _ => " Postings ".to_string(),
    };

    if let ListingView::Failed(message) = state.fetcher.view() {
        let error = Paragraph::new(message.as_str())
            .style(Style::default().fg(Color::Red))
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: true });
        frame.render_widget(error, chunks[0]);
    } else {
        let items: Vec<ListItem> = state
            .fetcher
            .posts()
            .iter()
            .map(|post| {
                let mark = if post.is_bookmarked { "*" } else { " " };
                ListItem::new(format!("{} {} | {}", mark, post.company_name, post.position_title))
            })
            .collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, chunks[0], list_state);
    }

    // Right panel: card detail
    let detail = Paragraph::new(build_detail(state))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false });
    frame.render_widget(detail, chunks[1]);

    let status = match &state.notice {
        Some(notice) => Span::styled(format!(" {}", notice), Style::default().fg(Color::Yellow)),
        None => Span::styled(
            format!(" ?{}", state.store.location().query()),
            Style::default().fg(Color::DarkGray),
        ),
    };
    frame.render_widget(Paragraph::new(Line::from(status)), rows[2]);

    let help = Paragraph::new(
        " j/k:move  n/p:page  s:sort a:recruiting 1-4:role group d:domains r:reset f:pick  b:bookmark g:refresh  q:quit",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, rows[3]);

    if let Some(cursor) = state.picker {
        draw_picker(frame, state, cursor);
    }
    if state.login_prompt {
        draw_login_prompt(frame);
    }
}

fn draw_picker(frame: &mut Frame, state: &AppState<'_>, cursor: usize) {
    let filter = state.store.state();
    let entries = picker_entries();
    let items: Vec<ListItem> = entries
        .iter()
        .map(|entry| {
            let (checked, label) = match entry {
                PickerEntry::Role(role) => (filter.roles.contains(role), format!("Role    {}", role.label())),
                PickerEntry::Domain(domain) => (filter.domains.contains(domain), format!("Domain  {}", domain)),
            };
            ListItem::new(format!("[{}] {}", if checked { "x" } else { " " }, label))
        })
        .collect();

    let area = centered(frame.area(), 40, entries.len() as u16 + 2);
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(" space:toggle  esc:close "))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));
    let mut list_state = ListState::default();
    list_state.select(Some(cursor));
    frame.render_widget(Clear, area);
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn build_filter_bar<'a>(state: &AppState<'_>) -> Paragraph<'a> {
    let filter = state.store.state();
    let changes = filter.secondary_changes();
    let changed = |on: bool| {
        if on {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        }
    };

    let groups: Vec<Span> = RoleCategory::ALL
        .iter()
        .enumerate()
        .map(|(i, category)| {
            let selected = filter.category_selected(*category);
            let any = category.roles().iter().any(|r| filter.roles.contains(r));
            let style = if selected {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else if any {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };
            Span::styled(format!("[{}]{} ", i + 1, category.as_str()), style)
        })
        .collect();

    let domains = if filter.domains.is_empty() {
        "all".to_string()
    } else {
        filter
            .domains
            .iter()
            .map(|d| d.as_str())
            .collect::<Vec<_>>()
            .join(",")
    };
    let last_page = state.last_page_index() + 1;

    let second = Line::from(vec![
        Span::styled(format!("Status: {}  ", filter.active.label()), changed(changes.status)),
        Span::styled(format!("Domains: {}  ", domains), changed(changes.domains)),
        Span::styled(format!("Sort: {}  ", filter.order.label()), changed(changes.sort)),
        Span::raw(format!("Page {}/{}", filter.page + 1, last_page.max(filter.page + 1))),
    ]);

    Paragraph::new(vec![Line::from(groups), second])
        .block(Block::default().borders(Borders::BOTTOM).title(" Filters "))
}

fn build_detail<'a>(state: &'a AppState<'_>) -> Text<'a> {
    let Some(post) = state.fetcher.posts().get(state.selected) else {
        return Text::raw("No posting selected");
    };

    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(
        post.position_title.as_str(),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(format!("at {}", post.company_name)));

    let location = post.primary_location();
    if !location.is_empty() {
        lines.push(Line::from(format!("Location: {}", location)));
    }
    if let Some(domain) = &post.domain {
        lines.push(Line::from(format!("Domain: {}", domain)));
    }
    if let Some(deadline) = &post.employment_end_date {
        lines.push(Line::from(format!("Deadline: {}", models::format_date(deadline))));
    }

    let tags: Vec<&str> = post.card_tags().collect();
    if !tags.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("Tags: {}", tags.join(", ")),
            Style::default().fg(Color::Cyan),
        )));
    }
    if let Some(key) = &post.profile_image_key {
        lines.push(Line::from(Span::styled(
            format!("Logo: {}", models::image_url(&state.api_url, key)),
            Style::default().fg(Color::DarkGray),
        )));
    }

    lines.push(Line::from(""));
    let bookmark = if post.is_bookmarked {
        Span::styled("Bookmarked", Style::default().fg(Color::Yellow))
    } else {
        Span::styled("Not bookmarked", Style::default().fg(Color::DarkGray))
    };
    lines.push(Line::from(bookmark));
    lines.push(Line::from(Span::styled(
        format!("id {}", post.id),
        Style::default().fg(Color::DarkGray),
    )));

    Text::from(lines)
}

fn draw_login_prompt(frame: &mut Frame) {
    let area = centered(frame.area(), 50, 7);
    let prompt = Paragraph::new(vec![
        Line::from(Span::styled(
            "Log in to bookmark postings",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("No account yet? Sign up now:"),
        Line::from("  internhasha login | internhasha signup"),
        Line::from(Span::styled("press any key", Style::default().fg(Color::DarkGray))),
    ])
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(Clear, area);
    frame.render_widget(prompt, area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
