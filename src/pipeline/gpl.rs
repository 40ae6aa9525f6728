//! Graphics Pipeline Library support (§4.6 "GPL path"): four independently
//! compilable library fragments, each cached by content hash behind a
//! thread-safe read-mostly lock so repeated recipes reuse prior work.

use std::collections::HashMap;
use std::ffi::CStr;
use std::sync::RwLock;

use ash::{vk, Device};

use crate::error::{PipelineError, PipelineStage};
use crate::pipeline::recipe::PipelineRecipe;
use crate::pipeline::shader::ShaderModule;

const ENTRY_MAIN: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

/// One of the four GPL library fragments a pipeline links from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LibraryPartKind {
    /// Vertex input state only.
    VertexInput,
    /// Vertex shader + rasterizer state (viewport, cull, front-face, topology).
    PreRasterization,
    /// Fragment shader + depth/stencil state.
    FragmentShader,
    /// Color attachment formats, sample count, blend state.
    FragmentOutput,
}

/// A built library fragment: a `VkPipeline` created with the
/// `LIBRARY_KHR` flag and the corresponding `GraphicsPipelineLibraryCreateInfoEXT` flags.
pub struct LibraryPart {
    /// The fragment pipeline.
    pub pipeline: vk::Pipeline,
    /// Which fragment this is.
    pub kind: LibraryPartKind,
}

/// A read-mostly cache of built library parts, keyed by content hash.
/// Lookups take a shared lock; misses upgrade to an exclusive lock after a
/// double-checked read (§5 concurrency regime 2).
#[derive(Default)]
pub struct LibraryCache {
    parts: RwLock<HashMap<u64, vk::Pipeline>>,
}

impl LibraryCache {
    /// Return the cached pipeline for `hash`, or build it via `build` and
    /// insert it, handling the race where two threads miss concurrently by
    /// destroying the loser's redundant build.
    pub fn get_or_build(
        &self,
        device: &Device,
        hash: u64,
        build: impl FnOnce() -> Result<vk::Pipeline, PipelineError>,
    ) -> Result<vk::Pipeline, PipelineError> {
        if let Some(pipeline) = self.parts.read().unwrap().get(&hash) {
            return Ok(*pipeline);
        }

        let built = build()?;

        let mut write_guard = self.parts.write().unwrap();
        match write_guard.get(&hash) {
            Some(existing) => {
                // Another thread won the race; discard our redundant build.
                unsafe { device.destroy_pipeline(built, None) };
                Ok(*existing)
            }
            None => {
                write_guard.insert(hash, built);
                Ok(built)
            }
        }
    }
}

/// Four independent caches, one per fragment kind.
#[derive(Default)]
pub struct GplLibraryCaches {
    /// Vertex-input fragments.
    pub vertex_input: LibraryCache,
    /// Pre-rasterization fragments.
    pub pre_rasterization: LibraryCache,
    /// Fragment-shader fragments.
    pub fragment_shader: LibraryCache,
    /// Fragment-output fragments.
    pub fragment_output: LibraryCache,
}

fn library_flags(fail_on_compile_required: bool) -> vk::PipelineCreateFlags {
    let mut flags = vk::PipelineCreateFlags::LIBRARY_KHR | vk::PipelineCreateFlags::RETAIN_LINK_TIME_OPTIMIZATION_INFO_EXT;
    if fail_on_compile_required {
        flags |= vk::PipelineCreateFlags::FAIL_ON_PIPELINE_COMPILE_REQUIRED_EXT;
    }
    flags
}

fn library_part_stage(fail_on_compile_required: bool) -> PipelineStage {
    if fail_on_compile_required { PipelineStage::CacheProbe } else { PipelineStage::LibraryPart }
}

fn build_vertex_input(
    device: &Device,
    recipe: &PipelineRecipe,
    cache: Option<vk::PipelineCache>,
    fail_on_compile_required: bool,
) -> Result<vk::Pipeline, PipelineError> {
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
        .vertex_binding_descriptions(&recipe.vertex_bindings)
        .vertex_attribute_descriptions(&recipe.vertex_attributes);
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder().topology(recipe.topology);

    let lib_info = vk::GraphicsPipelineLibraryCreateInfoEXT::builder()
        .flags(vk::GraphicsPipelineLibraryFlagsEXT::VERTEX_INPUT_INTERFACE);

    let create_info = vk::GraphicsPipelineCreateInfo::builder()
        .push_next(&mut lib_info.build())
        .flags(library_flags(fail_on_compile_required))
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .layout(vk::PipelineLayout::null());

    create_single_pipeline(device, create_info.build(), cache, library_part_stage(fail_on_compile_required))
}

fn build_pre_rasterization(
    device: &Device,
    recipe: &PipelineRecipe,
    vertex_module: &ShaderModule,
    layout: vk::PipelineLayout,
    cache: Option<vk::PipelineCache>,
    fail_on_compile_required: bool,
) -> Result<vk::Pipeline, PipelineError> {
    let stage = vertex_module.stage_info(vk::ShaderStageFlags::VERTEX, ENTRY_MAIN);
    let stages = [stage];

    let viewport_state = vk::PipelineViewportStateCreateInfo::builder().viewport_count(1).scissor_count(1);
    let rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
        .polygon_mode(recipe.polygon_mode)
        .cull_mode(recipe.cull_mode)
        .front_face(recipe.front_face)
        .line_width(1.0);

    let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&recipe.dynamic_state);

    let mut lib_info = vk::GraphicsPipelineLibraryCreateInfoEXT::builder()
        .flags(vk::GraphicsPipelineLibraryFlagsEXT::PRE_RASTERIZATION_SHADERS)
        .build();

    let create_info = vk::GraphicsPipelineCreateInfo::builder()
        .push_next(&mut lib_info)
        .flags(library_flags(fail_on_compile_required))
        .stages(&stages)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization)
        .dynamic_state(&dynamic_state)
        .layout(layout);

    create_single_pipeline(device, create_info.build(), cache, library_part_stage(fail_on_compile_required))
}

fn build_fragment_shader(
    device: &Device,
    recipe: &PipelineRecipe,
    fragment_module: &ShaderModule,
    layout: vk::PipelineLayout,
    cache: Option<vk::PipelineCache>,
    fail_on_compile_required: bool,
) -> Result<vk::Pipeline, PipelineError> {
    let stage = fragment_module.stage_info(vk::ShaderStageFlags::FRAGMENT, ENTRY_MAIN);
    let stages = [stage];

    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
        .depth_test_enable(recipe.depth_format.is_some())
        .depth_write_enable(recipe.depth_format.is_some())
        .depth_compare_op(recipe.depth_compare_op);

    let mut lib_info = vk::GraphicsPipelineLibraryCreateInfoEXT::builder()
        .flags(vk::GraphicsPipelineLibraryFlagsEXT::FRAGMENT_SHADER)
        .build();

    let create_info = vk::GraphicsPipelineCreateInfo::builder()
        .push_next(&mut lib_info)
        .flags(library_flags(fail_on_compile_required))
        .stages(&stages)
        .depth_stencil_state(&depth_stencil)
        .layout(layout);

    create_single_pipeline(device, create_info.build(), cache, library_part_stage(fail_on_compile_required))
}

fn build_fragment_output(
    device: &Device,
    recipe: &PipelineRecipe,
    cache: Option<vk::PipelineCache>,
    fail_on_compile_required: bool,
) -> Result<vk::Pipeline, PipelineError> {
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
    let multisample = vk::PipelineMultisampleStateCreateInfo::builder().rasterization_samples(recipe.sample_count);

    let mut rendering_info = vk::PipelineRenderingCreateInfo::builder()
        .color_attachment_formats(&recipe.color_formats)
        .depth_attachment_format(recipe.depth_format.unwrap_or(vk::Format::UNDEFINED))
        .build();

    let mut lib_info = vk::GraphicsPipelineLibraryCreateInfoEXT::builder()
        .flags(vk::GraphicsPipelineLibraryFlagsEXT::FRAGMENT_OUTPUT_INTERFACE)
        .build();

    let create_info = vk::GraphicsPipelineCreateInfo::builder()
        .push_next(&mut lib_info)
        .push_next(&mut rendering_info)
        .flags(library_flags(fail_on_compile_required))
        .color_blend_state(&color_blend)
        .multisample_state(&multisample)
        .layout(vk::PipelineLayout::null());

    create_single_pipeline(device, create_info.build(), cache, library_part_stage(fail_on_compile_required))
}

fn create_single_pipeline(
    device: &Device,
    create_info: vk::GraphicsPipelineCreateInfo,
    cache: Option<vk::PipelineCache>,
    stage: PipelineStage,
) -> Result<vk::Pipeline, PipelineError> {
    let cache = cache.unwrap_or(vk::PipelineCache::null());
    let pipelines = unsafe { device.create_graphics_pipelines(cache, &[create_info], None) }
        .map_err(|(_, result)| PipelineError::PipelineCreationFailed { stage, result })?;
    Ok(pipelines[0])
}

/// Build (or fetch from cache) all four library parts for `recipe`, then
/// fast-link them into a single pipeline (§4.6 GPL path step 2-3).
///
/// When `fail_on_compile_required` is set, every part and the final link
/// are built with `FAIL_ON_PIPELINE_COMPILE_REQUIRED_EXT`, turning this into
/// a cache probe: a part or link step that isn't already in `recipe.cache`
/// fails fast with `PIPELINE_COMPILE_REQUIRED` instead of compiling.
pub fn build_and_link(
    device: &Device,
    caches: &GplLibraryCaches,
    recipe: &PipelineRecipe,
    vertex_module: &ShaderModule,
    fragment_module: &ShaderModule,
    layout: vk::PipelineLayout,
    optimize: bool,
    fail_on_compile_required: bool,
) -> Result<vk::Pipeline, PipelineError> {
    let vi_hash = recipe.vertex_input_content_hash();
    let pr_hash = recipe.pre_rasterization_content_hash();
    let fs_hash = recipe.fragment_shader_content_hash();
    let fo_hash = recipe.fragment_output_content_hash();

    let vertex_input = caches
        .vertex_input
        .get_or_build(device, vi_hash, || build_vertex_input(device, recipe, recipe.cache, fail_on_compile_required))?;
    let pre_rasterization = caches.pre_rasterization.get_or_build(device, pr_hash, || {
        build_pre_rasterization(device, recipe, vertex_module, layout, recipe.cache, fail_on_compile_required)
    })?;
    let fragment_shader = caches.fragment_shader.get_or_build(device, fs_hash, || {
        build_fragment_shader(device, recipe, fragment_module, layout, recipe.cache, fail_on_compile_required)
    })?;
    let fragment_output = caches
        .fragment_output
        .get_or_build(device, fo_hash, || build_fragment_output(device, recipe, recipe.cache, fail_on_compile_required))?;

    let libraries = [vertex_input, pre_rasterization, fragment_shader, fragment_output];
    let mut link_info = vk::PipelineLibraryCreateInfoEXT::builder().libraries(&libraries).build();

    let mut flags = vk::PipelineCreateFlags::empty();
    if optimize {
        flags |= vk::PipelineCreateFlags::LINK_TIME_OPTIMIZATION_EXT;
    }
    if fail_on_compile_required {
        flags |= vk::PipelineCreateFlags::FAIL_ON_PIPELINE_COMPILE_REQUIRED_EXT;
    }

    let create_info = vk::GraphicsPipelineCreateInfo::builder().push_next(&mut link_info).flags(flags).layout(layout);

    let stage = if fail_on_compile_required {
        PipelineStage::CacheProbe
    } else if optimize {
        PipelineStage::Optimize
    } else {
        PipelineStage::FastLink
    };
    create_single_pipeline(device, create_info.build(), recipe.cache, stage)
}
