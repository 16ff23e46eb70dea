//! Channel router: one scrollback shared by every logical channel.
//!
//! Lines keep the channel tag they were written with. Which lines are
//! visible depends only on that tag and the active channel, so switching
//! channels is a full re-filter of the buffer.

use std::collections::VecDeque;

use pistat_types::channel::ChannelId;
use pistat_types::output::{LineOptions, LineStyle, OutputSink};

/// Text of the marker shown on a device channel with no output.
pub const PLACEHOLDER_TEXT: &str = "No console output received yet for this device.";

/// One scrollback line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub id: u64,
    pub text: String,
    pub channel: ChannelId,
    pub style: LineStyle,
}

impl Line {
    pub fn is_placeholder(&self) -> bool {
        self.style == LineStyle::Placeholder
    }
}

/// Whether a line tagged `line` is shown while `active` is selected.
pub fn visible(line: &ChannelId, active: &ChannelId) -> bool {
    line == active || *line == ChannelId::Meta
}

/// What a renderer has to do to catch up with the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderUpdate {
    /// Discard what is on screen and draw these lines.
    Redraw(Vec<Line>),
    /// Draw these lines after what is already on screen.
    Append(Vec<Line>),
}

#[derive(Debug)]
pub struct ChannelRouter {
    lines: VecDeque<Line>,
    limit: usize,
    active: ChannelId,
    next_id: u64,
    /// Set when on-screen lines changed or the filter moved.
    dirty: bool,
    /// Visible lines added since the last [`ChannelRouter::take_render`].
    appended: Vec<u64>,
}

impl ChannelRouter {
    pub fn new(limit: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            limit: limit.max(1),
            active: ChannelId::Global,
            next_id: 1,
            dirty: false,
            appended: Vec::new(),
        }
    }

    pub fn active(&self) -> &ChannelId {
        &self.active
    }

    /// Change the active channel. Returns `false` if it was already active.
    pub fn set_active(&mut self, channel: ChannelId) -> bool {
        if self.active == channel {
            return false;
        }
        log::debug!("active channel {} -> {channel}", self.active);
        self.active = channel;
        self.dirty = true;
        self.appended.clear();
        true
    }

    /// Every buffered line, oldest first, regardless of visibility.
    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.lines.iter()
    }

    pub fn visible_lines(&self) -> impl Iterator<Item = &Line> {
        self.lines
            .iter()
            .filter(move |l| visible(&l.channel, &self.active))
    }

    /// Texts of the visible lines.
    pub fn visible_texts(&self) -> Vec<&str> {
        self.visible_lines().map(|l| l.text.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether any line, placeholder included, is tagged `channel`.
    pub fn has_lines_on(&self, channel: &ChannelId) -> bool {
        self.lines.iter().any(|l| &l.channel == channel)
    }

    /// Add the "no output yet" marker to an empty device channel.
    /// Returns `true` if one was added.
    pub fn add_placeholder(&mut self, channel: &ChannelId) -> bool {
        if !channel.is_device() || self.has_lines_on(channel) {
            return false;
        }
        self.push(
            PLACEHOLDER_TEXT.to_string(),
            channel.clone(),
            LineStyle::Placeholder,
        );
        true
    }

    /// What changed since the previous call, if anything.
    pub fn take_render(&mut self) -> Option<RenderUpdate> {
        if std::mem::take(&mut self.dirty) {
            self.appended.clear();
            return Some(RenderUpdate::Redraw(self.visible_lines().cloned().collect()));
        }
        if self.appended.is_empty() {
            return None;
        }
        let ids = std::mem::take(&mut self.appended);
        let fresh: Vec<Line> = self
            .lines
            .iter()
            .filter(|l| ids.contains(&l.id))
            .cloned()
            .collect();
        (!fresh.is_empty()).then_some(RenderUpdate::Append(fresh))
    }

    fn push(&mut self, text: String, channel: ChannelId, style: LineStyle) {
        let id = self.next_id;
        self.next_id += 1;
        if visible(&channel, &self.active) {
            self.appended.push(id);
        }
        self.lines.push_back(Line {
            id,
            text,
            channel,
            style,
        });
        while self.lines.len() > self.limit {
            if let Some(old) = self.lines.pop_front() {
                self.appended.retain(|&a| a != old.id);
            }
        }
    }

    fn remove_placeholder(&mut self, channel: &ChannelId) {
        let before = self.lines.len();
        self.lines
            .retain(|l| !(l.is_placeholder() && &l.channel == channel));
        if self.lines.len() != before && visible(channel, &self.active) {
            self.dirty = true;
        }
    }
}

impl OutputSink for ChannelRouter {
    fn write(&mut self, text: &str, opts: LineOptions) {
        let channel = opts.channel_or_global();
        if opts.style != LineStyle::Placeholder && channel.is_device() {
            self.remove_placeholder(&channel);
        }

        if opts.no_newline {
            let active = self.active.clone();
            if let Some(last) = self.lines.back_mut() {
                if last.channel == channel && !last.is_placeholder() {
                    last.text.push_str(text);
                    if visible(&channel, &active) && !self.appended.contains(&last.id) {
                        self.dirty = true;
                    }
                    return;
                }
            }
        }

        self.push(text.to_string(), channel, opts.style);
    }

    /// Removes the visible lines only; hidden channels keep their history.
    fn clear(&mut self) {
        let active = self.active.clone();
        self.lines.retain(|l| !visible(&l.channel, &active));
        self.appended.clear();
        self.dirty = true;
    }
}
