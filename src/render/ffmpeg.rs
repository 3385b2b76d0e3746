//! # ffmpeg-backed renderer.
//!
//! Reads the stream from `{input_base}/{key}`, composites the score overlay,
//! and publishes to `{output_base}/{key}`.
//!
//! ## Styles
//! - [`SIMPLE_STYLE`]: one `drawtext` line with the escaped score summary (`-vf`).
//! - any id from [`STYLES`](super::styles::STYLES): bottom-bar `filter_complex`
//!   graph (background, accent bar, team blocks, VS badge, status, venue and
//!   run rates), output mapped from the last label.
//!
//! ## Image template
//! When params carry a template path, the image is read as a second input,
//! anchored to the bottom edge of the video and the two scores plus the
//! status are drawn over it. The template takes precedence over any style.
//!
//! All text taken from the score record is passed through [`escape_text`].

use std::{ffi::OsString, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    core::StreamKey,
    error::SpawnError,
    render::{
        RenderParams,
        escape::escape_text,
        renderer::{RenderCommand, Renderer},
        styles::{DEFAULT_STYLE, OverlayStyle, SIMPLE_STYLE, find_style},
    },
    state::{ScoreState, score},
};

/// Font files used by `drawtext`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontSet {
    pub main: String,
    pub bold: String,
}

impl Default for FontSet {
    fn default() -> Self {
        if cfg!(target_os = "windows") {
            Self {
                main: "C:/Windows/Fonts/arial.ttf".into(),
                bold: "C:/Windows/Fonts/arialbd.ttf".into(),
            }
        } else if cfg!(target_os = "macos") {
            Self {
                main: "/System/Library/Fonts/Arial.ttf".into(),
                bold: "/System/Library/Fonts/Arial Bold.ttf".into(),
            }
        } else {
            Self {
                main: "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf".into(),
                bold: "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf".into(),
            }
        }
    }
}

/// Settings for [`FfmpegRenderer`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    /// Binary to execute (`ffmpeg` on `PATH` by default).
    pub binary: String,
    /// Base media address of incoming streams.
    pub input_base: String,
    /// Base media address the overlaid stream is published to.
    pub output_base: String,
    /// Style used when params carry none.
    pub default_style: String,
    pub fonts: FontSet,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".into(),
            input_base: "rtmp://localhost:1935/live".into(),
            output_base: "rtmp://localhost:1935/overlay".into(),
            default_style: DEFAULT_STYLE.into(),
            fonts: FontSet::default(),
        }
    }
}

impl FfmpegConfig {
    pub fn input_address(&self, key: &StreamKey) -> String {
        format!("{}/{}", self.input_base.trim_end_matches('/'), key)
    }

    pub fn output_address(&self, key: &StreamKey) -> String {
        format!("{}/{}", self.output_base.trim_end_matches('/'), key)
    }
}

/// Label of the last node in the styled filter graph.
const GRAPH_OUTPUT: &str = "[rates]";

/// Label of the last node in the image template graph.
const TEMPLATE_OUTPUT: &str = "[final]";

/// Renderer that launches ffmpeg with a score overlay.
#[derive(Clone, Debug, Default)]
pub struct FfmpegRenderer {
    cfg: FfmpegConfig,
}

impl FfmpegRenderer {
    pub fn new(cfg: FfmpegConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &FfmpegConfig {
        &self.cfg
    }

    fn simple_args(&self, state: &ScoreState, input: String, output: String) -> Vec<OsString> {
        let text = escape_text(&state.score_line());
        let filter = format!(
            "drawtext=text='{text}':fontcolor=white:fontsize=24:box=1:boxcolor=black@0.7:boxborderw=5:x=10:y=h-th-10"
        );
        [
            "-i", input.as_str(), "-vf", filter.as_str(), "-c:v", "libx264", "-preset", "ultrafast", "-c:a",
            "copy", "-f", "flv", output.as_str(),
        ]
        .into_iter()
        .map(OsString::from)
        .collect()
    }

    fn styled_args(
        &self,
        style: &OverlayStyle,
        state: &ScoreState,
        input: String,
        output: String,
    ) -> Vec<OsString> {
        let graph = filter_graph(style, state, &self.cfg.fonts);
        [
            "-i", input.as_str(), "-filter_complex", graph.as_str(), "-map", GRAPH_OUTPUT, "-c:v", "libx264",
            "-preset", "medium", "-crf", "23", "-maxrate", "6000k", "-bufsize", "12000k", "-c:a",
            "copy", "-f", "flv", output.as_str(),
        ]
        .into_iter()
        .map(OsString::from)
        .collect()
    }

    fn template_args(
        &self,
        template: &Path,
        state: &ScoreState,
        input: String,
        output: String,
    ) -> Vec<OsString> {
        let graph = template_graph(state, &self.cfg.fonts);
        let mut args: Vec<OsString> = vec![
            "-i".into(),
            input.into(),
            "-i".into(),
            template.as_os_str().to_owned(),
        ];
        args.extend(
            [
                "-filter_complex", graph.as_str(), "-map", TEMPLATE_OUTPUT, "-c:v", "libx264", "-preset",
                "medium", "-c:a", "copy", "-f", "flv", output.as_str(),
            ]
            .into_iter()
            .map(OsString::from),
        );
        args
    }
}

impl Renderer for FfmpegRenderer {
    fn command(&self, key: &StreamKey, params: &RenderParams) -> Result<RenderCommand, SpawnError> {
        let style_id = params.style().unwrap_or(&self.cfg.default_style);
        let input = self.cfg.input_address(key);
        let output = self.cfg.output_address(key);

        let args = if let Some(template) = params.template() {
            self.template_args(template, &params.state, input, output)
        } else if style_id == SIMPLE_STYLE {
            self.simple_args(&params.state, input, output)
        } else {
            let style = find_style(style_id).ok_or_else(|| SpawnError::UnknownStyle {
                style: style_id.to_string(),
            })?;
            self.styled_args(style, &params.state, input, output)
        };

        Ok(RenderCommand {
            program: OsString::from(&self.cfg.binary),
            args,
        })
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// Builds the `filter_complex` graph drawing the scores over an image
/// template (second input).
pub fn template_graph(state: &ScoreState, fonts: &FontSet) -> String {
    let text = |field: &str| escape_text(state.get_or(field, ""));
    [
        "[0:v][1:v]overlay=0:H-overlay_h[with_template]".to_string(),
        format!(
            "[with_template]drawtext=text='{}':fontcolor=white:fontsize=36:fontfile={}:x=80:y=H-80[score1]",
            text(score::TEAM1_SCORE),
            fonts.bold,
        ),
        format!(
            "[score1]drawtext=text='{}':fontcolor=white:fontsize=36:fontfile={}:x=W-200:y=H-80[score2]",
            text(score::TEAM2_SCORE),
            fonts.bold,
        ),
        format!(
            "[score2]drawtext=text='{}':fontcolor=yellow:fontsize=20:fontfile={}:x=W/2-50:y=H-30{TEMPLATE_OUTPUT}",
            text(score::STATUS),
            fonts.main,
        ),
    ]
    .join(",")
}

/// Builds the bottom-bar `filter_complex` graph for `style`.
pub fn filter_graph(style: &OverlayStyle, state: &ScoreState, fonts: &FontSet) -> String {
    let h = style.bottom_height;
    let text = |field: &str, fallback: &str| escape_text(state.get_or(field, fallback));
    let upper = |field: &str, fallback: &str| escape_text(&state.get_or(field, fallback).to_uppercase());
    let color = |field: &str, fallback: &'static str| state.get_or(field, fallback).to_string();
    let venue_line = escape_text(&format!(
        "{} • {}",
        state.get_or(score::VENUE, "Stadium"),
        state.get_or(score::MATCH_TYPE, "Match")
    ));

    [
        format!("color={}:size=1920x{h}[bg]", style.background_color),
        format!("color={}:size=1920x8[accent]", style.accent_color),
        "[0:v]scale=1920:1080[main]".to_string(),
        format!("[main][bg]overlay=0:H-{h}:shortest=1[with_bg]"),
        format!("[with_bg][accent]overlay=0:H-{h}:shortest=1[with_accent]"),
        format!(
            "[with_accent]drawtext=text='{}':fontcolor=white:fontsize=25:fontfile={}:x=50:y=H-90:box=1:boxcolor={}@0.8:boxborderw=3[team1]",
            upper(score::TEAM1, ""),
            fonts.bold,
            color(score::TEAM1_COLOR, "#FF6B35"),
        ),
        format!(
            "[team1]drawtext=text='{}':fontcolor=white:fontsize=48:fontfile={}:x=50:y=H-55[team1_score]",
            text(score::TEAM1_SCORE, ""),
            fonts.bold,
        ),
        format!(
            "[team1_score]drawtext=text='\\({} ov\\)':fontcolor=white:fontsize=24:fontfile={}:x=250:y=H-45[team1_overs]",
            text(score::TEAM1_OVERS, ""),
            fonts.main,
        ),
        format!(
            "[team1_overs]drawtext=text='VS':fontcolor=white:fontsize=28:fontfile={}:x=W/2-20:y=H-70:box=1:boxcolor=red@0.8:boxborderw=2[vs]",
            fonts.bold,
        ),
        format!(
            "[vs]drawtext=text='{}':fontcolor=white:fontsize=32:fontfile={}:x=W-350:y=H-90:box=1:boxcolor={}@0.8:boxborderw=3[team2]",
            upper(score::TEAM2, ""),
            fonts.bold,
            color(score::TEAM2_COLOR, "#FFD700"),
        ),
        format!(
            "[team2]drawtext=text='{}':fontcolor=white:fontsize=48:fontfile={}:x=W-350:y=H-55[team2_score]",
            text(score::TEAM2_SCORE, ""),
            fonts.bold,
        ),
        format!(
            "[team2_score]drawtext=text='\\({} ov\\)':fontcolor=white:fontsize=24:fontfile={}:x=W-150:y=H-45[team2_overs]",
            text(score::TEAM2_OVERS, ""),
            fonts.main,
        ),
        format!(
            "[team2_overs]drawtext=text='{}':fontcolor=yellow:fontsize=20:fontfile={}:x=W/2-100:y=H-25:box=1:boxcolor=black@0.7:boxborderw=2[status]",
            upper(score::STATUS, ""),
            fonts.main,
        ),
        format!(
            "[status]drawtext=text='{venue_line}':fontcolor=white:fontsize=18:fontfile={}:x=50:y=H-10[venue]",
            fonts.main,
        ),
        format!(
            "[venue]drawtext=text='CRR\\: {} • RRR\\: {}':fontcolor=white:fontsize=18:fontfile={}:x=W-300:y=H-20{GRAPH_OUTPUT}",
            text(score::CURRENT_RATE, "N/A"),
            text(score::REQUIRED_RATE, "N/A"),
            fonts.main,
        ),
    ]
    .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> StreamKey {
        StreamKey::new("test").unwrap()
    }

    fn args_of(cmd: &RenderCommand) -> Vec<String> {
        cmd.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn addresses_are_derived_from_key() {
        let renderer = FfmpegRenderer::default();
        let params = RenderParams::from_state(ScoreState::default()).with_style("simple");
        let cmd = renderer.command(&key(), &params).unwrap();
        let args = args_of(&cmd);

        assert_eq!(renderer.name(), "ffmpeg");
        assert_eq!(cmd.program, OsString::from("ffmpeg"));
        assert_eq!(args[1], "rtmp://localhost:1935/live/test");
        assert_eq!(args.last().unwrap(), "rtmp://localhost:1935/overlay/test");
    }

    #[test]
    fn simple_style_escapes_score_line() {
        let renderer = FfmpegRenderer::default();
        let state = ScoreState::default().with(score::STATUS, "Rain: delayed");
        let params = RenderParams::new(Some(SIMPLE_STYLE), state);
        let args = args_of(&renderer.command(&key(), &params).unwrap());

        let vf = &args[3];
        assert!(vf.starts_with("drawtext=text='India 245/4 \\(38.2\\) \\| "));
        assert!(vf.contains("Rain\\: delayed"));
    }

    #[test]
    fn default_style_builds_filter_graph() {
        let renderer = FfmpegRenderer::default();
        let params = RenderParams::from_state(ScoreState::default());
        let args = args_of(&renderer.command(&key(), &params).unwrap());

        assert_eq!(args[2], "-filter_complex");
        assert!(args[3].starts_with("color=0x000000:size=1920x120[bg]"));
        assert!(args[3].ends_with("[rates]"));
        assert!(args[3].contains("text='INDIA'"));
        assert_eq!(args[5], "[rates]");
    }

    #[test]
    fn unknown_style_is_a_spawn_error() {
        let renderer = FfmpegRenderer::default();
        let params = RenderParams::from_state(ScoreState::default()).with_style("neon");
        let err = renderer.command(&key(), &params).unwrap_err();
        assert!(matches!(err, SpawnError::UnknownStyle { style } if style == "neon"));
    }

    #[test]
    fn graph_escapes_injected_brackets() {
        let state = ScoreState::default().with(score::TEAM1_SCORE, "250/4 [dls]");
        let style = find_style("world_cup").unwrap();
        let graph = filter_graph(style, &state, &FontSet::default());
        assert!(graph.contains("text='250/4 \\[dls\\]'"));
    }

    #[test]
    fn template_is_second_input_and_wins_over_style() {
        let renderer = FfmpegRenderer::default();
        let state = ScoreState::default().with(score::STATUS, "Rain: delayed");
        let params = RenderParams::from_state(state)
            .with_style("world_cup")
            .with_template("/srv/overlay/bar.png");
        let args = args_of(&renderer.command(&key(), &params).unwrap());

        assert_eq!(
            args[..4],
            ["-i", "rtmp://localhost:1935/live/test", "-i", "/srv/overlay/bar.png"]
        );
        assert_eq!(args[4], "-filter_complex");
        assert_eq!(
            args[6..],
            [
                "-map", "[final]", "-c:v", "libx264", "-preset", "medium", "-c:a", "copy", "-f",
                "flv", "rtmp://localhost:1935/overlay/test",
            ]
        );

        let graph = &args[5];
        assert!(graph.starts_with("[0:v][1:v]overlay=0:H-overlay_h[with_template],"));
        assert!(graph.contains("[with_template]drawtext=text='245/4':"));
        assert!(graph.contains("[score1]drawtext=text='198/7':"));
        assert!(graph.contains("text='Rain\\: delayed':fontcolor=yellow"));
        assert!(graph.ends_with("[final]"));
    }

    #[test]
    fn template_skips_style_lookup() {
        let renderer = FfmpegRenderer::default();
        let params = RenderParams::from_state(ScoreState::default())
            .with_style("neon")
            .with_template("bar.png");
        assert!(renderer.command(&key(), &params).is_ok());
    }

    #[test]
    fn trailing_slash_in_base_is_ignored() {
        let cfg = FfmpegConfig {
            input_base: "rtmp://relay/live/".into(),
            ..FfmpegConfig::default()
        };
        assert_eq!(cfg.input_address(&key()), "rtmp://relay/live/test");
    }
}
