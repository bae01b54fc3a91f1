pub mod batch;
pub mod notice;
pub mod site;

pub use batch::*;
pub use notice::*;
pub use site::*;

// Message decorations
pub const EMOJI_ANNOUNCE: &str = "📢";
pub const EMOJI_BELL: &str = "🔔";
pub const EMOJI_PINNED: &str = "🌟";
pub const EMOJI_DATE: &str = "📅";

/// Title used when a row has no element matching the title selector.
pub const NO_TITLE: &str = "No title";
