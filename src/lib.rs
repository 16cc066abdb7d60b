//! Term highlighting for LLM-annotated text.
//!
//! A chat model is asked to list the concepts in a piece of text. Its reply is
//! parsed by [`parser`] into [`TermRecord`]s, and [`highlight`] turns the text
//! plus those records into a gap-free sequence of [`Span`]s ready to render.

pub mod error;
pub mod highlight;
pub mod parser;
pub mod prompt;
pub mod render;
pub mod saved;
pub mod terms;

#[cfg(feature = "web")]
pub mod config;
#[cfg(feature = "web")]
pub mod provider;
#[cfg(feature = "web")]
pub mod web;

pub use highlight::{Span, highlight};
pub use parser::{parse_content, parse_response, parse_response_str};
pub use render::render_html;
pub use saved::SavedTermStore;
pub use terms::{DEFAULT_CATEGORY, TermRecord};
