use std::sync::Arc;

use crate::{
    events::Bus,
    render::{FfmpegRenderer, Renderer, RendererRef},
    subscribers::{Subscribe, SubscriberSet},
};

use super::{Config, controller::Core, controller::LifecycleController};

/// Builder for [`LifecycleController`].
///
/// ```no_run
/// # async fn demo() {
/// use std::sync::Arc;
/// use rendervisor::{Config, FfmpegConfig, FfmpegRenderer, LifecycleController, LogWriter, Subscribe};
///
/// let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
/// let controller = LifecycleController::builder(Config::default())
///     .with_renderer(FfmpegRenderer::new(FfmpegConfig::default()))
///     .with_subscribers(subs)
///     .build();
/// # }
/// ```
pub struct ControllerBuilder {
    cfg: Config,
    renderer: Option<RendererRef>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ControllerBuilder {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            renderer: None,
            subscribers: Vec::new(),
        }
    }

    /// Sets the renderer. Defaults to [`FfmpegRenderer`] with default settings.
    pub fn with_renderer(self, renderer: impl Renderer) -> Self {
        self.with_renderer_ref(Arc::new(renderer))
    }

    /// Sets an already shared renderer, e.g. one used by several controllers.
    pub fn with_renderer_ref(mut self, renderer: RendererRef) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Sets event subscribers.
    ///
    /// Each gets a dedicated worker and bounded queue fed from the bus.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the controller.
    ///
    /// Must be called within a Tokio runtime when subscribers are set (their
    /// workers are spawned here).
    pub fn build(self) -> LifecycleController {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let renderer = self
            .renderer
            .unwrap_or_else(|| Arc::new(FfmpegRenderer::default()));
        tracing::debug!(
            renderer = renderer.name(),
            subscribers = self.subscribers.len(),
            "controller built"
        );

        let core = Arc::new(Core::new(self.cfg, bus.clone(), renderer));
        if !self.subscribers.is_empty() {
            let set = SubscriberSet::new(self.subscribers, bus);
            core.attach_listener(set);
        }
        LifecycleController::from_core(core)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::{
        core::StreamKey,
        render::{CommandRenderer, RenderParams},
    };

    #[tokio::test]
    async fn shared_renderer_drives_independent_controllers() {
        let renderer: RendererRef = Arc::new(CommandRenderer::new("sleep", ["30"]));
        assert_eq!(renderer.name(), "command");

        let a = LifecycleController::builder(Config::default())
            .with_renderer_ref(Arc::clone(&renderer))
            .build();
        let b = LifecycleController::builder(Config::default())
            .with_renderer_ref(renderer)
            .build();
        let key = StreamKey::new("test").unwrap();

        assert!(a.start(&key, RenderParams::default()).await.unwrap());
        assert!(b.start(&key, RenderParams::default()).await.unwrap());
        assert_eq!(a.generation(&key).await, 1);
        assert_eq!(b.generation(&key).await, 1);

        a.shutdown().await;
        assert_eq!(b.active_keys().await, vec![key]);
        b.shutdown().await;
    }
}
