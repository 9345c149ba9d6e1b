//! Runtime engine that drives one run end to end.

use skiff_common::config::SkiffConfig;
use skiff_common::error::Result;
use skiff_common::types::{ExecutionResult, ImageReference};
use skiff_core::isolation::IsolationConfig;
use skiff_image::layer::LayerMaterializer;
use skiff_image::registry::{Registry, RegistryClient};

use crate::backend::{self, Executor};
use crate::scratch::ScratchSpace;

/// Coordinates the registry, the layer materializer, and the executor.
///
/// Stages run strictly in sequence and the first failure ends the run.
/// The scratch directory lives exactly as long as [`Engine::run`].
pub struct Engine<R, E> {
    registry: R,
    executor: E,
    config: SkiffConfig,
}

impl Engine<RegistryClient, Box<dyn Executor>> {
    /// Creates an engine talking to the configured registry with the
    /// platform's executor.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: SkiffConfig) -> Result<Self> {
        let registry = RegistryClient::new(config.registry.clone())?;
        Ok(Self::new(registry, backend::detect_executor(), config))
    }
}

impl<R: Registry, E: Executor> Engine<R, E> {
    /// Creates an engine from explicit parts.
    pub const fn new(registry: R, executor: E, config: SkiffConfig) -> Self {
        Self {
            registry,
            executor,
            config,
        }
    }

    /// Returns the configuration of this engine.
    #[must_use]
    pub const fn config(&self) -> &SkiffConfig {
        &self.config
    }

    /// Pulls `reference`, materializes it, and runs `command` inside it.
    ///
    /// The pull token is requested once and reused for the manifest and
    /// every blob. The command starts only after every layer is extracted.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing stage. A command exiting
    /// nonzero is not an error.
    pub fn run(
        &self,
        reference: &ImageReference,
        command: &str,
        args: &[String],
    ) -> Result<ExecutionResult> {
        let scratch = ScratchSpace::create(self.config.scratch_base.as_deref())?;
        tracing::info!(
            image = %reference,
            scratch = %scratch.path().display(),
            "starting run"
        );

        let result = self.run_in(&scratch, reference, command, args)?;

        if let Err(e) = scratch.close() {
            tracing::warn!(error = %e, "failed to remove scratch space");
        }
        Ok(result)
    }

    fn run_in(
        &self,
        scratch: &ScratchSpace,
        reference: &ImageReference,
        command: &str,
        args: &[String],
    ) -> Result<ExecutionResult> {
        let repository = reference.repository();
        let token = self.registry.resolve_token(&repository)?;
        let digests = self
            .registry
            .fetch_layer_digests(&repository, reference.tag(), &token)?;

        LayerMaterializer::new(&self.registry, scratch.blobs_dir()).materialize(
            &repository,
            &digests,
            &token,
            scratch.rootfs_dir(),
        )?;
        tracing::info!(layers = digests.len(), "root filesystem ready");

        let isolation = IsolationConfig::new(scratch.rootfs_dir(), &self.config.isolation);
        self.executor.run(command, args, &isolation)
    }
}
