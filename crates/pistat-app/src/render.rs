//! Plain-text renderer for scrollback updates.

use std::io::{self, Write};

use pistat_terminal::{Line, RenderUpdate};
use pistat_types::channel::ChannelId;
use pistat_types::output::LineStyle;

/// Printed before a full redraw so the new view is easy to spot.
const REDRAW_RULE: &str = "----------------------------------------";

pub fn draw(out: &mut impl Write, update: &RenderUpdate) -> io::Result<()> {
    match update {
        RenderUpdate::Redraw(lines) => {
            writeln!(out, "{REDRAW_RULE}")?;
            for line in lines {
                write_line(out, line)?;
            }
        },
        RenderUpdate::Append(lines) => {
            for line in lines {
                write_line(out, line)?;
            }
        },
    }
    out.flush()
}

fn write_line(out: &mut impl Write, line: &Line) -> io::Result<()> {
    match (&line.channel, line.style) {
        (ChannelId::Meta, _) => writeln!(out, "-- {}", line.text),
        (_, LineStyle::Error) => writeln!(out, "! {}", line.text),
        (_, LineStyle::Placeholder) => writeln!(out, "({})", line.text),
        _ => writeln!(out, "{}", line.text),
    }
}
