//! Application context composing the registry, the loader and the quality controller.
//!
//! The runtime owns one [`SharedRegistry`] and hands it to both subsystems. It
//! does not own the scene graph; callers pass it into each operation.

use std::time::Duration;

use tokio::time::Instant;

use crate::core::camera::Camera;
use crate::core::config::ViewerConfig;
use crate::core::types::Result;
use crate::quality::{MetricsSource, OptimizationStats, QualityController, RenderTarget, TickReport};
use crate::resource::{lock, shared, AutoCleanupTask, ResourceRegistry, ResourceStats, SharedRegistry};
use crate::scene::SceneGraph;
use crate::streaming::{CullingReport, LoadObserver, LoadingStats, ProgressiveLoader};

/// Result of one [`SceneRuntime::tick`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub distance: CullingReport,
    pub quality: TickReport,
    pub cleaned: usize,
}

pub struct SceneRuntime {
    config: ViewerConfig,
    registry: SharedRegistry,
    loader: ProgressiveLoader,
    controller: QualityController,
    cleanup_task: AutoCleanupTask,
}

impl SceneRuntime {
    pub fn new(config: ViewerConfig) -> Result<Self> {
        config.validate()?;
        let registry = shared(ResourceRegistry::new(config.resources.clone())?);
        let loader = ProgressiveLoader::new(config.streaming.clone(), registry.clone())?;
        let controller = QualityController::new(config.quality.clone(), registry.clone())?;
        Ok(Self {
            config,
            registry,
            loader,
            controller,
            cleanup_task: AutoCleanupTask::new(),
        })
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn loader(&self) -> &ProgressiveLoader {
        &self.loader
    }

    pub fn controller(&self) -> &QualityController {
        &self.controller
    }

    /// Stream `graph`, then hand every loaded object to the quality controller.
    pub async fn load(&mut self, graph: &mut SceneGraph, observer: &mut dyn LoadObserver) -> LoadingStats {
        let stats = self.loader.load(graph, observer).await;

        let mut with_variants = 0;
        for member in self.loader.loaded_members() {
            if self.controller.track(graph, member.node, member.mesh) {
                with_variants += 1;
            }
        }
        log::debug!(
            "Tracking {} loaded objects, {} with LOD variants",
            self.loader.loaded_members().len(),
            with_variants
        );
        stats
    }

    /// Per-frame update: distance culling, then the quality step, then registry housekeeping.
    pub fn tick(
        &mut self,
        graph: &mut SceneGraph,
        camera: &Camera,
        metrics: &mut dyn MetricsSource,
        render: &mut dyn RenderTarget,
    ) -> FrameReport {
        let distance = self.loader.update_distance_culling(graph, camera.position);
        let quality = self.controller.tick(graph, camera, metrics, render);
        let cleaned = lock(&self.registry).update(Instant::now());
        FrameReport {
            distance,
            quality,
            cleaned,
        }
    }

    /// Run cleanup passes from a background task instead of from [`tick`](Self::tick).
    /// Returns `false` outside a tokio runtime.
    pub fn spawn_auto_cleanup(&mut self, interval: Duration) -> bool {
        lock(&self.registry).disable_auto_cleanup();
        self.cleanup_task.enable(self.registry.clone(), interval)
    }

    pub fn stop_auto_cleanup(&mut self) {
        self.cleanup_task.disable();
    }

    pub fn resource_stats(&self) -> ResourceStats {
        lock(&self.registry).stats()
    }

    pub fn loading_stats(&self) -> LoadingStats {
        self.loader.loading_stats()
    }

    pub fn optimization_stats(&self, graph: &SceneGraph) -> OptimizationStats {
        self.controller.optimization_stats(graph)
    }

    /// Release everything: LOD variants, the loading plan and every registered resource.
    pub fn teardown(&mut self, graph: &mut SceneGraph) -> usize {
        self.cleanup_task.disable();
        self.controller.shutdown(graph);
        self.loader.reset();
        let disposed = lock(&self.registry).dispose_all();
        log::info!("Runtime torn down, {} resources disposed", disposed);
        disposed
    }
}
