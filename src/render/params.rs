use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::state::ScoreState;

/// Everything a renderer needs to build its argument list at start time.
///
/// `style = None` means "renderer default" on a plain start, and "keep the
/// style of the process being replaced" when a debounced restart fires. The
/// same holds for `template`, an image composited under the score text; when
/// set it takes precedence over `style`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Arc<str>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
    pub state: ScoreState,
}

impl RenderParams {
    pub fn new(style: Option<&str>, state: ScoreState) -> Self {
        Self {
            style: style.map(Arc::from),
            template: None,
            state,
        }
    }

    /// Params without an explicit style.
    pub fn from_state(state: ScoreState) -> Self {
        Self {
            style: None,
            template: None,
            state,
        }
    }

    #[must_use]
    pub fn with_style(mut self, style: impl Into<Arc<str>>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Fills in `fallback` if no style was chosen.
    #[must_use]
    pub fn or_style(mut self, fallback: Option<&Arc<str>>) -> Self {
        if self.style.is_none() {
            self.style = fallback.cloned();
        }
        self
    }

    #[must_use]
    pub fn with_template(mut self, template: impl Into<PathBuf>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Fills in `fallback` if no template was chosen.
    #[must_use]
    pub fn or_template(mut self, fallback: Option<&Path>) -> Self {
        if self.template.is_none() {
            self.template = fallback.map(Path::to_path_buf);
        }
        self
    }

    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    pub fn template(&self) -> Option<&Path> {
        self.template.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_style_wins_over_fallback() {
        let inherited: Arc<str> = Arc::from("world_cup");
        let params = RenderParams::default()
            .with_style("simple")
            .or_style(Some(&inherited));
        assert_eq!(params.style(), Some("simple"));

        let params = RenderParams::default().or_style(Some(&inherited));
        assert_eq!(params.style(), Some("world_cup"));
    }

    #[test]
    fn template_is_inherited_only_when_unset() {
        let inherited = Path::new("/srv/overlay/old.png");
        let params = RenderParams::default().or_template(Some(inherited));
        assert_eq!(params.template(), Some(inherited));

        let params = RenderParams::default()
            .with_template("/srv/overlay/new.png")
            .or_template(Some(inherited));
        assert_eq!(params.template(), Some(Path::new("/srv/overlay/new.png")));
    }

    #[test]
    fn template_is_omitted_from_json_when_unset() {
        let raw = serde_json::to_value(RenderParams::default()).unwrap();
        assert!(raw.get("template").is_none());

        let params: RenderParams =
            serde_json::from_str(r#"{"template": "bar.png", "state": {}}"#).unwrap();
        assert_eq!(params.template(), Some(Path::new("bar.png")));
    }
}
