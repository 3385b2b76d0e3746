//! Renderer command construction.
//!
//! - [`RenderParams`]: style, image template and score snapshot captured at start time;
//! - [`Renderer`]: builds the command line for one key;
//! - [`FfmpegRenderer`]: bottom-bar overlay styles and image templates on top of ffmpeg;
//! - [`CommandRenderer`]: fixed program, ignores params;
//! - [`escape_text`]: escaping for the filter grammar.

mod escape;
mod ffmpeg;
mod params;
mod renderer;
mod styles;

pub use escape::escape_text;
pub use ffmpeg::{FfmpegConfig, FfmpegRenderer, FontSet, filter_graph, template_graph};
pub use params::RenderParams;
pub use renderer::{CommandRenderer, RenderCommand, Renderer, RendererRef};
pub use styles::{DEFAULT_STYLE, OverlayStyle, SIMPLE_STYLE, STYLES, find_style};
