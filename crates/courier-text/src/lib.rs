//! Text preparation for message display.
//!
//! The entry point is [`simplify`], which takes the decoded body of an
//! incoming message and produces the text the UI should render.

mod simplify;

pub use simplify::{simplify, MimeFormat};
