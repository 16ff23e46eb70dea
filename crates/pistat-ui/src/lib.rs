//! Presentation state behind the console: animated metrics, the stats
//! board fed by telemetry, the log book, and the accent theme.

pub mod animation;
pub mod logbook;
pub mod stats;
pub mod theme;

pub use animation::{Metric, Tween, TweenWindow};
pub use logbook::LogBook;
pub use stats::{StatTile, StatsBoard};
pub use theme::{Rgb, ThemeState};
