use crate::app::{App, DetailState, HourlyChart, Legend, MapKind, Screen};
use crate::braille::{BrailleCanvas, BLANK};
use crate::map::MapLayers;
use crate::scale::format_thousands;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph, Widget, Wrap},
    Frame,
};

/// Bar heights are drawn on a 0..=BAR_RESOLUTION scale
const BAR_RESOLUTION: u64 = 1000;

/// Rows of the legend gradient
const LEGEND_ROWS: u16 = 8;

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let layout = *app.layout();

    render_map(frame, app, layout.map);
    render_panel(frame, app, layout.panel);
    render_status_bar(frame, app, layout.status);
}

fn panel_block(title: String) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
}

fn render_map(frame: &mut Frame, app: &App, area: Rect) {
    let block = panel_block(app.kind.title().to_string());
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if let Screen::Failed { kind, error } = &app.screen {
        let text = vec![
            Line::from(Span::styled(
                format!("Could not load the {} map", kind_name(*kind)),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(error.as_str()),
            Line::from(""),
            Line::from(Span::styled("q: quit", Style::default().fg(Color::DarkGray))),
        ];
        frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), inner);
        return;
    }

    let Some(layers) = app.render_layers() else {
        return;
    };

    let cursor_pos = app.mouse_pos.and_then(|(col, row)| {
        let inside = col >= inner.x
            && col < inner.x + inner.width
            && row >= inner.y
            && row < inner.y + inner.height;
        inside.then(|| (col - inner.x, row - inner.y))
    });

    frame.render_widget(MapWidget { layers, cursor_pos }, inner);
}

fn kind_name(kind: MapKind) -> &'static str {
    match kind {
        MapKind::Us => "US",
        MapKind::World => "world",
    }
}

/// Braille map over per-cell region fills
struct MapWidget {
    layers: MapLayers,
    cursor_pos: Option<(u16, u16)>,
}

impl MapWidget {
    /// Render a braille canvas layer with a specific color
    fn render_layer(&self, canvas: &BrailleCanvas, color: Color, area: Rect, buf: &mut Buffer) {
        if canvas.is_empty() {
            return;
        }
        for (col, row, ch) in canvas.cells() {
            if col >= area.width as usize || row >= area.height as usize {
                continue;
            }
            let (x, y) = (area.x + col as u16, area.y + row as u16);
            buf[(x, y)].set_char(ch).set_fg(color);
        }
    }
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let filled = self.layers.fills.iter().any(Option::is_some);

        // Fills first, as cell backgrounds
        for row in 0..self.layers.rows.min(area.height as usize) {
            for col in 0..self.layers.cols.min(area.width as usize) {
                if let Some(rgb) = self.layers.fill(col, row) {
                    let (x, y) = (area.x + col as u16, area.y + row as u16);
                    buf[(x, y)].set_char(' ').set_bg(rgb.to_color());
                }
            }
        }

        // Outlines, then markers on top
        let border_color = if filled { Color::Gray } else { Color::Cyan };
        self.render_layer(&self.layers.borders, border_color, area, buf);
        self.render_layer(&self.layers.active, Color::Yellow, area, buf);
        self.render_layer(&self.layers.markers, Color::DarkGray, area, buf);
        self.render_layer(&self.layers.data_markers, Color::LightBlue, area, buf);
        self.render_layer(&self.layers.selected, Color::Red, area, buf);

        if let Some((cx, cy)) = self.cursor_pos {
            let (x, y) = (area.x + cx, area.y + cy);
            if buf[(x, y)].symbol().chars().all(|c| c == ' ' || c == BLANK) {
                buf[(x, y)].set_char('╋').set_fg(Color::Red);
            }
        }
    }
}

fn render_panel(frame: &mut Frame, app: &App, area: Rect) {
    match &app.screen {
        Screen::Us(_) => render_hourly_chart(frame, app.hourly_chart(), area),
        Screen::World(_) => {
            let [legend_area, detail_area] =
                Layout::vertical([Constraint::Length(LEGEND_ROWS + 5), Constraint::Min(3)]).areas(area);
            render_legend(frame, app, legend_area);
            render_detail(frame, app, detail_area);
        }
        Screen::Failed { .. } => frame.render_widget(panel_block(" Details ".into()), area),
    }
}

fn render_hourly_chart(frame: &mut Frame, chart: Option<HourlyChart>, area: Rect) {
    let Some(chart) = chart else {
        let block = panel_block(" Hourly ".into());
        let hint = Paragraph::new(vec![
            Line::from("Click a station or press Tab"),
            Line::from("to see its hourly totals."),
        ])
        .style(Style::default().fg(Color::DarkGray))
        .wrap(Wrap { trim: true })
        .block(block);
        frame.render_widget(hint, area);
        return;
    };

    let block = panel_block(format!(" {} ", chart.title));
    let inner_width = block.inner(area).width.max(1);
    let bar_width = (inner_width / chart.bars.len().max(1) as u16).max(1);

    let bars: Vec<Bar<'_>> = chart
        .bars
        .iter()
        .map(|bar| {
            let label = if bar_width >= bar.hour.len() as u16 {
                bar.hour.clone()
            } else {
                String::new()
            };
            Bar::default()
                .value((bar.height * BAR_RESOLUTION as f64).round() as u64)
                .text_value(String::new())
                .label(Line::from(label))
                .style(Style::default().fg(Color::LightBlue))
        })
        .collect();

    let [chart_area, axis_area] =
        Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).areas(area);

    let widget = BarChart::default()
        .block(block)
        .data(BarGroup::default().bars(&bars))
        .max(BAR_RESOLUTION)
        .bar_gap(0)
        .bar_width(bar_width);
    frame.render_widget(widget, chart_area);

    let axis = Line::from(vec![
        Span::styled(" max ", Style::default().fg(Color::DarkGray)),
        Span::styled(format_thousands(chart.y_max), Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(Paragraph::new(axis), axis_area);
}

fn render_legend(frame: &mut Frame, app: &App, area: Rect) {
    let block = panel_block(" Legend ".into());
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some((name, year)) = app.indicator_label() else {
        return;
    };
    let mut lines = vec![
        Line::from(Span::styled(name, Style::default().fg(Color::Green))),
        Line::from(Span::styled(year.to_string(), Style::default().fg(Color::Yellow))),
    ];

    match app.legend() {
        Some(legend) => lines.extend(gradient_lines(&legend, LEGEND_ROWS)),
        None if app.is_loading() => {}
        None => lines.push(Line::from("no data")),
    }
    if app.is_loading() {
        lines.push(Line::from(Span::styled(
            format!("loading {}...", app.view.year),
            Style::default().fg(Color::DarkGray),
        )));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Max color on top, min color at the bottom, extent labels beside them
fn gradient_lines(legend: &Legend, rows: u16) -> Vec<Line<'static>> {
    let last = rows.saturating_sub(1).max(1) as f64;
    (0..rows)
        .map(|row| {
            let color = legend.low.lerp(legend.high, 1.0 - row as f64 / last);
            let label = if row == 0 {
                legend.max_label.clone()
            } else if row + 1 == rows {
                legend.min_label.clone()
            } else {
                String::new()
            };
            Line::from(vec![
                Span::styled("   ", Style::default().bg(color.to_color())),
                Span::raw(" "),
                Span::raw(label),
            ])
        })
        .collect()
}

fn render_detail(frame: &mut Frame, app: &App, area: Rect) {
    let block = panel_block(" Country ".into());
    let label = Style::default().fg(Color::DarkGray);

    let lines = match app.detail() {
        Some(DetailState::Ready(detail)) => {
            let value = app
                .country_value(&detail.iso2)
                .map(format_thousands)
                .unwrap_or_else(|| "no data".into());
            let row = |key: &'static str, value: String| {
                Line::from(vec![Span::styled(format!("{key:<10}"), label), Span::raw(value)])
            };
            vec![
                Line::from(Span::styled(
                    detail.name.clone(),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )),
                row("value", value),
                row("region", detail.region.value.clone()),
                row("latitude", detail.latitude.clone()),
                row("longitude", detail.longitude.clone()),
                row("capital", detail.capital_city.clone()),
                row("income", detail.income_level.value.clone()),
                row("lending", detail.lending_type.value.clone()),
            ]
        }
        Some(DetailState::Loading { name, .. }) => vec![
            Line::from(Span::styled(name.clone(), Style::default().fg(Color::Cyan))),
            Line::from(Span::styled("loading...", label)),
        ],
        _ => vec![Line::from(Span::styled("Click a country", label))],
    };

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }).block(block), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let sep = || Span::styled(" | ", Style::default().fg(Color::DarkGray));
    let mut spans = vec![Span::styled(
        format!(" {} ", app.projection().name()),
        Style::default().fg(Color::Magenta),
    )];

    if let Some(text) = app.hover_text() {
        spans.push(sep());
        spans.push(Span::styled(text, Style::default().fg(Color::Yellow)));
    }

    if let Some(notice) = app.notice() {
        spans.push(sep());
        spans.push(Span::styled(
            notice.to_string(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }

    let help = match app.screen {
        Screen::Us(_) => " click:select/zoom tab:station r:reset q:quit",
        Screen::World(_) => " click:country [ ]:indicator , .:year p:projection r:reset q:quit",
        Screen::Failed { .. } => " q:quit",
    };
    spans.push(sep());
    spans.push(Span::styled(help, Style::default().fg(Color::DarkGray)));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::Rgb;
    use pretty_assertions::assert_eq;

    fn swatch(line: &Line<'_>) -> Option<Color> {
        line.spans[0].style.bg
    }

    fn text(line: &Line<'_>) -> String {
        line.spans[2].content.to_string()
    }

    #[test]
    fn test_gradient_runs_from_max_to_min() {
        let legend = Legend {
            high: Rgb::new(0x31, 0xa3, 0x54),
            low: Rgb::new(0xe5, 0xf5, 0xe0),
            max_label: "1,000".into(),
            min_label: "10".into(),
        };
        let lines = gradient_lines(&legend, LEGEND_ROWS);
        assert_eq!(lines.len(), LEGEND_ROWS as usize);

        let (first, last) = (&lines[0], &lines[lines.len() - 1]);
        assert_eq!(swatch(first), Some(Color::Rgb(0x31, 0xa3, 0x54)));
        assert_eq!(text(first), "1,000");
        assert_eq!(swatch(last), Some(Color::Rgb(0xe5, 0xf5, 0xe0)));
        assert_eq!(text(last), "10");
        assert!(lines[1..lines.len() - 1].iter().all(|l| text(l).is_empty()));
    }
}
