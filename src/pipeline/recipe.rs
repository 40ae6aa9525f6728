//! `PipelineRecipe` (§3): the full input set for building one graphics pipeline.

use ash::vk;

/// SPIR-V source for one shader stage, as a path (loaded lazily) or
/// pre-loaded bytecode.
#[derive(Debug, Clone)]
pub enum ShaderSource {
    /// Load from a filesystem path at recipe-resolution time.
    Path(std::path::PathBuf),
    /// Already-loaded SPIR-V words.
    Bytecode(Vec<u32>),
}

/// The full set of inputs required to build a graphics pipeline (§3).
#[derive(Debug, Clone)]
pub struct PipelineRecipe {
    /// Vertex shader source.
    pub vertex_shader: ShaderSource,
    /// Fragment shader source.
    pub fragment_shader: ShaderSource,
    /// Vertex input binding descriptions.
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    /// Vertex input attribute descriptions.
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    /// Primitive topology.
    pub topology: vk::PrimitiveTopology,
    /// Polygon fill mode.
    pub polygon_mode: vk::PolygonMode,
    /// Cull mode.
    pub cull_mode: vk::CullModeFlags,
    /// Front-face winding.
    pub front_face: vk::FrontFace,
    /// Color attachment formats (dynamic rendering).
    pub color_formats: Vec<vk::Format>,
    /// Depth attachment format, if any.
    pub depth_format: Option<vk::Format>,
    /// Sample count.
    pub sample_count: vk::SampleCountFlags,
    /// Whether blending is enabled on every color attachment.
    pub blend_enable: bool,
    /// Depth compare op.
    pub depth_compare_op: vk::CompareOp,
    /// Dynamic pipeline state entries.
    pub dynamic_state: Vec<vk::DynamicState>,
    /// Push constant ranges.
    pub push_constant_ranges: Vec<vk::PushConstantRange>,
    /// Descriptor set layouts, in set-index order.
    pub descriptor_set_layouts: Vec<vk::DescriptorSetLayout>,
    /// An externally-built pipeline layout to reuse instead of building one
    /// from `descriptor_set_layouts`/`push_constant_ranges`.
    pub external_layout: Option<vk::PipelineLayout>,
    /// Pipeline cache to probe/populate, if any.
    pub cache: Option<vk::PipelineCache>,
}

impl PipelineRecipe {
    /// A content hash over the fields that define the vertex-input GPL
    /// library part (§4.6 step 2): binding/attribute descriptions.
    pub fn vertex_input_content_hash(&self) -> u64 {
        let mut h = crate::hash::Fnv1a64::new();
        for b in &self.vertex_bindings {
            std::hash::Hash::hash(&(b.binding, b.stride, b.input_rate), &mut HasherAdapter(&mut h));
        }
        for a in &self.vertex_attributes {
            std::hash::Hash::hash(&(a.location, a.binding, a.format, a.offset), &mut HasherAdapter(&mut h));
        }
        std::hash::Hasher::finish(&h)
    }

    /// Content hash for the pre-rasterization library part: vertex SPIR-V
    /// identity plus polygon/cull/front-face state.
    pub fn pre_rasterization_content_hash(&self) -> u64 {
        let mut h = crate::hash::Fnv1a64::new();
        hash_shader_source(&mut h, &self.vertex_shader);
        std::hash::Hash::hash(&(self.polygon_mode, self.cull_mode, self.front_face, self.topology), &mut HasherAdapter(&mut h));
        std::hash::Hasher::finish(&h)
    }

    /// Content hash for the fragment-shader library part: fragment SPIR-V
    /// identity plus depth format and compare op.
    pub fn fragment_shader_content_hash(&self) -> u64 {
        let mut h = crate::hash::Fnv1a64::new();
        hash_shader_source(&mut h, &self.fragment_shader);
        std::hash::Hash::hash(&(self.depth_format, self.depth_compare_op), &mut HasherAdapter(&mut h));
        std::hash::Hasher::finish(&h)
    }

    /// Content hash for the fragment-output library part: color format(s),
    /// depth format, sample count, blend enable.
    pub fn fragment_output_content_hash(&self) -> u64 {
        let mut h = crate::hash::Fnv1a64::new();
        std::hash::Hash::hash(&(self.color_formats.clone(), self.depth_format, self.sample_count, self.blend_enable), &mut HasherAdapter(&mut h));
        std::hash::Hasher::finish(&h)
    }
}

fn hash_shader_source(h: &mut crate::hash::Fnv1a64, source: &ShaderSource) {
    use std::hash::Hasher;
    match source {
        ShaderSource::Path(p) => h.write(p.to_string_lossy().as_bytes()),
        ShaderSource::Bytecode(words) => h.write(bytemuck::cast_slice(words)),
    }
}

/// Bridges `std::hash::Hash::hash` (which wants a generic `Hasher`) onto our
/// concrete `Fnv1a64`, since `Fnv1a64` intentionally doesn't implement
/// `BuildHasher`/default-construct-per-call semantics used by `HashMap`.
struct HasherAdapter<'a>(&'a mut crate::hash::Fnv1a64);

impl std::hash::Hasher for HasherAdapter<'_> {
    fn finish(&self) -> u64 {
        std::hash::Hasher::finish(self.0)
    }
    fn write(&mut self, bytes: &[u8]) {
        std::hash::Hasher::write(self.0, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_recipe() -> PipelineRecipe {
        PipelineRecipe {
            vertex_shader: ShaderSource::Bytecode(vec![0x0723_0203, 1, 2, 3]),
            fragment_shader: ShaderSource::Bytecode(vec![0x0723_0203, 4, 5, 6]),
            vertex_bindings: vec![],
            vertex_attributes: vec![],
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::CLOCKWISE,
            color_formats: vec![vk::Format::R8G8B8A8_UNORM],
            depth_format: None,
            sample_count: vk::SampleCountFlags::TYPE_1,
            blend_enable: false,
            depth_compare_op: vk::CompareOp::LESS,
            dynamic_state: vec![],
            push_constant_ranges: vec![],
            descriptor_set_layouts: vec![],
            external_layout: None,
            cache: None,
        }
    }

    #[test]
    fn identical_recipes_hash_identically() {
        let a = minimal_recipe();
        let b = minimal_recipe();
        assert_eq!(a.pre_rasterization_content_hash(), b.pre_rasterization_content_hash());
        assert_eq!(a.fragment_output_content_hash(), b.fragment_output_content_hash());
    }

    #[test]
    fn differing_cull_mode_changes_pre_rasterization_hash() {
        let a = minimal_recipe();
        let mut b = minimal_recipe();
        b.cull_mode = vk::CullModeFlags::FRONT;
        assert_ne!(a.pre_rasterization_content_hash(), b.pre_rasterization_content_hash());
    }

    #[test]
    fn differing_blend_changes_fragment_output_hash_only() {
        let a = minimal_recipe();
        let mut b = minimal_recipe();
        b.blend_enable = true;
        assert_ne!(a.fragment_output_content_hash(), b.fragment_output_content_hash());
        assert_eq!(a.pre_rasterization_content_hash(), b.pre_rasterization_content_hash());
    }
}
