use std::time::{Duration, Instant};

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};

use crate::{
    app::{App, Toast},
    tree::{NodeId, SiteTree},
    view::{CollapseState, ViewKind, ViewState, VisibleNode, node_label, selection_label},
};

const TITLE: &str = "Sitemap Tree";

pub fn ui(frame: &mut ratatui::Frame, app: &App, visible: &[VisibleNode]) {
    let area = frame.size();
    let footer_height = if area.height >= 6 { 2 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(footer_height)])
        .split(area);

    // The details panel is only drawn when there is room for it.
    let (main_area, details_area) = if chunks[0].width >= 80 {
        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(chunks[0]);
        (main_chunks[0], Some(main_chunks[1]))
    } else {
        (chunks[0], None)
    };

    match app.view.kind() {
        ViewKind::Tree => render_tree(frame, app, visible, main_area),
        ViewKind::Sunburst => render_sunburst(frame, app, visible, main_area),
    }

    if let Some(details_area) = details_area {
        let details_lines = match visible.get(app.cursor) {
            Some(row) => format_node_details(&app.tree, &app.view, row.id),
            None => vec!["No selection".to_string()],
        };
        let details = Paragraph::new(details_lines.join("\n"))
            .block(Block::default().title("Details").borders(Borders::ALL));
        frame.render_widget(details, details_area);
    }

    if footer_height > 0 {
        let footer = Paragraph::new(footer_lines(app).join("\n"));
        frame.render_widget(footer, chunks[1]);
    }

    if let Some(toast) = &app.toast {
        render_toast(frame, toast);
    }
}

fn render_tree(frame: &mut ratatui::Frame, app: &App, visible: &[VisibleNode], area: Rect) {
    let selected = app.view.selected();
    let items: Vec<ListItem> = visible
        .iter()
        .map(|row| {
            let marker = if app.tree.node(row.id).direct == 0 {
                " * "
            } else if app.view.view_children(&app.tree, row.id).is_empty() {
                "[+]"
            } else {
                "[-]"
            };
            let indent = "  ".repeat(row.depth);
            let label = node_label(&app.tree, row.id, row.depth == 0);
            let item = ListItem::new(format!("{indent}{marker} {label}"));
            if Some(row.id) == selected {
                item.style(Style::default().add_modifier(Modifier::BOLD))
            } else {
                item
            }
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().title(TITLE).borders(Borders::ALL))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default();
    if !visible.is_empty() {
        state.select(Some(app.cursor));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Arc {
    pub id: NodeId,
    pub start: f64,
    pub end: f64,
}

/// Lays out the displayed subtree as concentric rings, innermost first.
/// Each node spans a share of its parent proportional to its visible leaves.
pub fn sunburst_rings(tree: &SiteTree, view: &ViewState) -> Vec<Vec<Arc>> {
    let mut rings = Vec::new();
    layout_arc(tree, view, view.current_root(), 0, 0.0, 1.0, &mut rings);
    rings
}

fn layout_arc(
    tree: &SiteTree,
    view: &ViewState,
    id: NodeId,
    depth: usize,
    start: f64,
    end: f64,
    rings: &mut Vec<Vec<Arc>>,
) {
    if rings.len() <= depth {
        rings.push(Vec::new());
    }
    rings[depth].push(Arc { id, start, end });

    let children = view.view_children(tree, id);
    let weights: Vec<usize> = children
        .iter()
        .map(|&child| visible_leaves(tree, view, child))
        .collect();
    let total: usize = weights.iter().sum();
    let mut offset = start;
    for (&child, weight) in children.iter().zip(weights) {
        let span = (end - start) * weight as f64 / total as f64;
        layout_arc(tree, view, child, depth + 1, offset, offset + span, rings);
        offset += span;
    }
}

fn visible_leaves(tree: &SiteTree, view: &ViewState, id: NodeId) -> usize {
    let children = view.view_children(tree, id);
    if children.is_empty() {
        1
    } else {
        children
            .iter()
            .map(|&child| visible_leaves(tree, view, child))
            .sum()
    }
}

fn render_sunburst(frame: &mut ratatui::Frame, app: &App, visible: &[VisibleNode], area: Rect) {
    let block = Block::default().title(TITLE).borders(Borders::ALL);
    let inner = block.inner(area);
    let width = inner.width as usize;
    let cursor = visible.get(app.cursor).map(|row| row.id);
    let selected = app.view.selected();

    let lines: Vec<Line> = sunburst_rings(&app.tree, &app.view)
        .iter()
        .enumerate()
        .map(|(depth, ring)| {
            let mut spans = Vec::new();
            let mut column = 0usize;
            for arc in ring {
                let from = ((arc.start * width as f64).round() as usize).max(column);
                let to = ((arc.end * width as f64).round() as usize).min(width);
                if to <= from {
                    continue;
                }
                if from > column {
                    spans.push(Span::raw(" ".repeat(from - column)));
                }
                let label = node_label(&app.tree, arc.id, depth == 0);
                let mut style = Style::default();
                if Some(arc.id) == cursor {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                if Some(arc.id) == selected {
                    style = style.add_modifier(Modifier::BOLD);
                }
                spans.push(Span::styled(fit_label(&label, to - from), style));
                column = to;
            }
            Line::from(spans)
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// `label` behind a `|` separator, cut or padded to exactly `width` chars.
fn fit_label(label: &str, width: usize) -> String {
    let mut text: String = std::iter::once('|').chain(label.chars()).take(width).collect();
    let len = text.chars().count();
    text.extend(std::iter::repeat_n(' ', width - len));
    text
}

pub fn format_node_details(tree: &SiteTree, view: &ViewState, id: NodeId) -> Vec<String> {
    let node = tree.node(id);
    let mut lines = vec![format!("Name: {}", node.name)];
    match (&node.url, &node.computed_url) {
        (Some(url), _) => lines.push(format!("URL: {url}")),
        (None, Some(computed)) => lines.push(format!("Computed URL: {computed}")),
        (None, None) => {}
    }
    lines.push(format!("Path: {}", selection_label(tree.effective_url(id))));
    lines.push(format!("Depth: {}", tree.depth(id)));
    if node.direct > 0 {
        lines.push(format!("Children: {} direct, {} total", node.direct, node.total));
        let state = match view.collapse_state(id) {
            CollapseState::Unset => "default",
            CollapseState::Expanded => "expanded",
            CollapseState::Collapsed => "collapsed",
        };
        lines.push(format!("State: {state}"));
    }
    lines
}

fn footer_lines(app: &App) -> Vec<String> {
    let help = "q quit | r reload | up/down move | enter click | right/left expand/collapse | s set root | u up | R reset | v view | y yank | o open".to_string();
    let root = selection_label(app.tree.effective_url(app.view.current_root()));
    let mut info = format!(
        "view: {} | nodes: {} | root: {root}",
        app.view.kind().label(),
        app.view.node_count(&app.tree)
    );
    if let Some(selected) = app.view.selected() {
        info.push_str(&format!(
            " | selected: {}",
            selection_label(app.tree.effective_url(selected))
        ));
    }
    if let Some(status) = &app.status {
        info.push_str(&format!(" | {status}"));
    }
    vec![help, info]
}

pub fn ui_loading(frame: &mut ratatui::Frame, tick: usize, source: &str) {
    let block = Block::default().title(TITLE).borders(Borders::ALL);
    let paragraph = Paragraph::new(loading_message(tick, source)).block(block);
    frame.render_widget(paragraph, frame.size());
}

pub fn ui_failed(frame: &mut ratatui::Frame, message: &str) {
    let block = Block::default().title(TITLE).borders(Borders::ALL);
    let text = format!("load error: {message}\n\nr retry | q quit");
    frame.render_widget(Paragraph::new(text).block(block), frame.size());
}

pub fn loading_message(tick: usize, source: &str) -> String {
    let frames = ["|", "/", "-", "\\"];
    let frame = frames[tick % frames.len()];
    format!("{frame} loading {source}...")
}

fn render_toast(frame: &mut ratatui::Frame, toast: &Toast) {
    let area = frame.size();
    let width = (toast.message.len() as u16).saturating_add(4);
    let height = 3;
    let x = area.width.saturating_sub(width + 1);
    let rect = Rect::new(x, 1, width.min(area.width), height.min(area.height));
    let paragraph = Paragraph::new(toast.message.clone())
        .block(Block::default().title("Notice").borders(Borders::ALL));
    frame.render_widget(Clear, rect);
    frame.render_widget(paragraph, rect);
}

/// Coalesces resize bursts: only the most recent request schedules a redraw,
/// which fires once `window` has passed without a newer one.
pub struct ResizeDebounce {
    window: Duration,
    deadline: Option<Instant>,
}

impl ResizeDebounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn request(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn time_left(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}
