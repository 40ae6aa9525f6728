//! `PipelineCompiler` (§4.6): three-step acquisition — cache probe,
//! fast-link, background optimize — orchestrated across the worker pool.

use std::sync::{Arc, Weak};

use ash::{vk, Device};
use log::{debug, warn};

use crate::config::{PipelineCompilerPolicy, PlatformCapabilities};
use crate::error::{PipelineError, PipelineResult, PipelineStage};
use crate::pipeline::cache::PipelineCache;
use crate::pipeline::gpl::GplLibraryCaches;
use crate::pipeline::handle::PipelineHandle;
use crate::pipeline::recipe::PipelineRecipe;
use crate::pipeline::shader::{resolve_pipeline_layout, ShaderModule};
use crate::pipeline::worker_pool::WorkerPool;

/// Orchestrates pipeline acquisition: monolithic synchronous builds, or the
/// GPL fast-link + background-optimize path, per `PipelineCompilerPolicy`.
pub struct PipelineCompiler {
    device: Device,
    cache: PipelineCache,
    policy: PipelineCompilerPolicy,
    capabilities: PlatformCapabilities,
    gpl_caches: Arc<GplLibraryCaches>,
    workers: WorkerPool,
}

impl PipelineCompiler {
    /// Construct a compiler bound to `device`, seeded from `initial_cache_blob`.
    pub fn new(
        device: Device,
        initial_cache_blob: &[u8],
        policy: PipelineCompilerPolicy,
        capabilities: PlatformCapabilities,
        worker_thread_override: Option<usize>,
    ) -> PipelineResult<Self> {
        let cache = PipelineCache::new(device.clone(), initial_cache_blob)?;
        let gpl_mode = Self::use_gpl(policy, capabilities);
        let thread_count = WorkerPool::default_thread_count(gpl_mode, worker_thread_override);
        Ok(Self {
            device,
            cache,
            policy,
            capabilities,
            gpl_caches: Arc::new(GplLibraryCaches::default()),
            workers: WorkerPool::new(thread_count),
        })
    }

    fn use_gpl(policy: PipelineCompilerPolicy, capabilities: PlatformCapabilities) -> bool {
        match policy {
            PipelineCompilerPolicy::ForceMonolithic => false,
            PipelineCompilerPolicy::Auto | PipelineCompilerPolicy::PreferGPL => capabilities.supports_gpl_path(),
        }
    }

    /// Synchronous entry point. Returns a handle immediately usable
    /// (baseline-only in GPL mode until background optimization lands, or
    /// already-optimized in the monolithic path).
    pub fn compile(&self, recipe: &PipelineRecipe) -> PipelineResult<Arc<PipelineHandle>> {
        if Self::use_gpl(self.policy, self.capabilities) {
            self.compile_gpl(recipe)
        } else {
            self.compile_monolithic(recipe)
        }
    }

    fn compile_monolithic(&self, recipe: &PipelineRecipe) -> PipelineResult<Arc<PipelineHandle>> {
        let vertex_module = ShaderModule::from_source(self.device.clone(), &recipe.vertex_shader)?;
        let fragment_module = ShaderModule::from_source(self.device.clone(), &recipe.fragment_shader)?;
        let layout = resolve_pipeline_layout(
            &self.device,
            &recipe.descriptor_set_layouts,
            &recipe.push_constant_ranges,
            recipe.external_layout,
        )?;

        let fail_on_compile_required = self.capabilities.contains(PlatformCapabilities::PIPELINE_CREATION_CACHE_CONTROL);

        if fail_on_compile_required {
            match self.build_monolithic(recipe, &vertex_module, &fragment_module, layout, true) {
                Ok(pipeline) => {
                    debug!("monolithic pipeline hit cache on first probe");
                    return Ok(Arc::new(PipelineHandle::new(self.device.clone(), pipeline, layout)));
                }
                Err(PipelineError::PipelineCreationFailed { result: vk::Result::PIPELINE_COMPILE_REQUIRED, .. }) => {
                    // Expected: fall through to a synchronous build below.
                }
                Err(other) => return Err(other),
            }
        }

        let pipeline = self.build_monolithic(recipe, &vertex_module, &fragment_module, layout, false)?;
        Ok(Arc::new(PipelineHandle::new(self.device.clone(), pipeline, layout)))
    }

    fn build_monolithic(
        &self,
        recipe: &PipelineRecipe,
        vertex_module: &ShaderModule,
        fragment_module: &ShaderModule,
        layout: vk::PipelineLayout,
        fail_on_compile_required: bool,
    ) -> PipelineResult<vk::Pipeline> {
        let vertex_entry = unsafe { std::ffi::CStr::from_bytes_with_nul_unchecked(b"main\0") };
        let fragment_entry = vertex_entry;
        let stages = [
            vertex_module.stage_info(vk::ShaderStageFlags::VERTEX, vertex_entry),
            fragment_module.stage_info(vk::ShaderStageFlags::FRAGMENT, fragment_entry),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&recipe.vertex_bindings)
            .vertex_attribute_descriptions(&recipe.vertex_attributes);
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder().topology(recipe.topology);
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder().viewport_count(1).scissor_count(1);
        let rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
            .polygon_mode(recipe.polygon_mode)
            .cull_mode(recipe.cull_mode)
            .front_face(recipe.front_face)
            .line_width(1.0);
        let multisample = vk::PipelineMultisampleStateCreateInfo::builder().rasterization_samples(recipe.sample_count);
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(recipe.depth_format.is_some())
            .depth_write_enable(recipe.depth_format.is_some())
            .depth_compare_op(recipe.depth_compare_op);

        let attachments: Vec<vk::PipelineColorBlendAttachmentState> = recipe
            .color_formats
            .iter()
            .map(|_| {
                vk::PipelineColorBlendAttachmentState::builder()
                    .color_write_mask(vk::ColorComponentFlags::RGBA)
                    .blend_enable(recipe.blend_enable)
                    .build()
            })
            .collect();
        let color_blend = vk::PipelineColorBlendStateCreateInfo::builder().attachments(&attachments);
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&recipe.dynamic_state);

        let mut rendering_info = vk::PipelineRenderingCreateInfo::builder()
            .color_attachment_formats(&recipe.color_formats)
            .depth_attachment_format(recipe.depth_format.unwrap_or(vk::Format::UNDEFINED))
            .build();

        let flags = if fail_on_compile_required {
            vk::PipelineCreateFlags::FAIL_ON_PIPELINE_COMPILE_REQUIRED_EXT
        } else {
            vk::PipelineCreateFlags::empty()
        };

        let create_info = vk::GraphicsPipelineCreateInfo::builder()
            .push_next(&mut rendering_info)
            .flags(flags)
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout);

        let stage = if fail_on_compile_required { PipelineStage::CacheProbe } else { PipelineStage::Monolithic };
        unsafe { self.device.create_graphics_pipelines(self.cache.handle(), &[create_info.build()], None) }
            .map(|pipelines| pipelines[0])
            .map_err(|(_, result)| PipelineError::PipelineCreationFailed { stage, result })
    }

    fn compile_gpl(&self, recipe: &PipelineRecipe) -> PipelineResult<Arc<PipelineHandle>> {
        let mut recipe = recipe.clone();
        recipe.cache.get_or_insert(self.cache.handle());

        let vertex_module = Arc::new(ShaderModule::from_source(self.device.clone(), &recipe.vertex_shader)?);
        let fragment_module = Arc::new(ShaderModule::from_source(self.device.clone(), &recipe.fragment_shader)?);
        let layout = resolve_pipeline_layout(
            &self.device,
            &recipe.descriptor_set_layouts,
            &recipe.push_constant_ranges,
            recipe.external_layout,
        )?;

        let fail_on_compile_required = self.capabilities.contains(PlatformCapabilities::PIPELINE_CREATION_CACHE_CONTROL);

        let fast_linked = if fail_on_compile_required {
            match crate::pipeline::gpl::build_and_link(
                &self.device,
                &self.gpl_caches,
                &recipe,
                &vertex_module,
                &fragment_module,
                layout,
                false,
                true,
            ) {
                Ok(pipeline) => {
                    debug!("GPL pipeline hit cache on first probe");
                    pipeline
                }
                Err(PipelineError::PipelineCreationFailed { result: vk::Result::PIPELINE_COMPILE_REQUIRED, .. }) => {
                    // Expected: at least one part or the link step wasn't cached.
                    crate::pipeline::gpl::build_and_link(
                        &self.device,
                        &self.gpl_caches,
                        &recipe,
                        &vertex_module,
                        &fragment_module,
                        layout,
                        false,
                        false,
                    )?
                }
                Err(PipelineError::PipelineCreationFailed { result, .. }) => {
                    return Err(PipelineError::CacheProbeFailed(result));
                }
                Err(other) => return Err(other),
            }
        } else {
            crate::pipeline::gpl::build_and_link(
                &self.device,
                &self.gpl_caches,
                &recipe,
                &vertex_module,
                &fragment_module,
                layout,
                false,
                false,
            )?
        };

        let handle = Arc::new(PipelineHandle::new(self.device.clone(), fast_linked, layout));

        let device = self.device.clone();
        let gpl_caches = Arc::clone(&self.gpl_caches);
        let recipe = recipe.clone();
        let handle_for_worker: Weak<PipelineHandle> = Arc::downgrade(&handle);

        self.workers.submit(move || {
            let Some(handle_for_worker) = handle_for_worker.upgrade() else {
                debug!("background pipeline optimization skipped, handle already dropped");
                return;
            };
            match crate::pipeline::gpl::build_and_link(
                &device,
                &gpl_caches,
                &recipe,
                &vertex_module,
                &fragment_module,
                layout,
                true,
                false,
            ) {
                Ok(optimized) => handle_for_worker.try_publish_optimized(optimized),
                Err(e) => warn!("background pipeline optimization failed, keeping baseline: {e}"),
            }
        });

        Ok(handle)
    }

    /// Block until every queued background optimization task has completed.
    pub fn wait_idle(&self) {
        self.workers.wait_idle();
    }

    /// Export the merged pipeline cache blob for the caller to persist.
    pub fn serialize_cache(&self) -> PipelineResult<Vec<u8>> {
        self.cache.serialize()
    }
}
