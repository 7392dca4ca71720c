use chirp_common::MessageLine;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Style, Stylize},
    text::{Line, Text},
    widgets::{List, ListItem, Widget},
};

/// The feed, newest message at the top.
#[derive(Debug)]
pub struct MessageListView<'a> {
    lines: &'a [MessageLine],
}

impl<'a> MessageListView<'a> {
    pub fn new(lines: &'a [MessageLine]) -> Self {
        Self { lines }
    }

    fn item(line: &MessageLine) -> ListItem<'static> {
        ListItem::new(Text::from(vec![
            Line::from(line.body.to_string()),
            Line::from(format!("{} - {}", line.time, line.author)).style(Style::new().dim()),
        ]))
    }
}

impl Widget for &MessageListView<'_> {
    fn render(self, area: Rect, buffer: &mut Buffer) {
        if self.lines.is_empty() {
            Line::from("No messages yet").dim().render(area, buffer);
            return;
        }
        List::new(self.lines.iter().map(MessageListView::item)).render(area, buffer);
    }
}
