//! Output sink contract shared by command handlers and the scrollback.

use crate::channel::ChannelId;

/// Visual class of a rendered line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineStyle {
    #[default]
    Normal,
    /// Echo of a typed command (`> ...`).
    Prompt,
    /// Error or rejection notice.
    Error,
    /// Console announcements on the meta channel.
    Meta,
    /// "No output yet" marker for an empty device channel.
    Placeholder,
    /// Raw output streamed from a remote device.
    Output,
}

impl LineStyle {
    /// Class name used by renderers.
    pub fn as_class(self) -> &'static str {
        match self {
            Self::Normal => "line",
            Self::Prompt => "prompt",
            Self::Error => "error",
            Self::Meta => "meta",
            Self::Placeholder => "placeholder",
            Self::Output => "output",
        }
    }
}

/// Per-line options for [`OutputSink::write`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineOptions {
    /// Channel tag. `None` means `global`.
    pub channel: Option<ChannelId>,
    pub style: LineStyle,
    /// Append to the previous line instead of starting a new one.
    pub no_newline: bool,
}

impl LineOptions {
    pub fn on(channel: ChannelId) -> Self {
        Self {
            channel: Some(channel),
            ..Self::default()
        }
    }

    pub fn styled(mut self, style: LineStyle) -> Self {
        self.style = style;
        self
    }

    pub fn inline(mut self) -> Self {
        self.no_newline = true;
        self
    }

    /// The effective channel tag.
    pub fn channel_or_global(&self) -> ChannelId {
        self.channel.clone().unwrap_or_default()
    }
}

/// Destination for console lines. Writes never fail.
pub trait OutputSink {
    /// Append a tagged, styled line.
    fn write(&mut self, text: &str, opts: LineOptions);

    /// Empty the visible scrollback.
    fn clear(&mut self);
}

/// A sink that keeps every write in memory. Useful for tests and for
/// capturing output outside the scrollback.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub lines: Vec<(String, LineOptions)>,
    pub clears: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Just the text of every captured line.
    pub fn texts(&self) -> Vec<&str> {
        self.lines.iter().map(|(t, _)| t.as_str()).collect()
    }
}

impl OutputSink for MemorySink {
    fn write(&mut self, text: &str, opts: LineOptions) {
        self.lines.push((text.to_string(), opts));
    }

    fn clear(&mut self) {
        self.lines.clear();
        self.clears += 1;
    }
}
