//! Shader reflection data (§4.1 Layer 2, §4.7 descriptor resolution).
//!
//! The graph never parses SPIR-V itself; reflection is produced by the
//! pipeline compiler's shader front-end (`crate::pipeline::shader`) and
//! handed to `Graph::add_pass` alongside a pipeline/layout pair so the
//! bind-map in `PassBuilder::bind` can be resolved into descriptor writes.

use ash::vk;

/// One binding discovered in a shader module's descriptor sets.
#[derive(Debug, Clone)]
pub struct ReflectedBinding {
    /// The name the binding is reflected under (matches the bind-map key
    /// passed to `PassBuilder::bind`).
    pub name: String,
    /// Descriptor set index.
    pub set: u32,
    /// Binding index within the set.
    pub binding: u32,
    /// Descriptor type (sampler, combined image sampler, storage buffer, …).
    pub descriptor_type: vk::DescriptorType,
    /// Array element count (1 for a scalar binding).
    pub count: u32,
    /// Shader stages that reference this binding.
    pub stage_flags: vk::ShaderStageFlags,
}

/// The full set of bindings reflected across every stage of a pipeline.
///
/// When a pass is built from more than one shader stage (vertex +
/// fragment, say), bindings reflected from each stage are merged by
/// `(set, binding)`: identical declarations fold into one entry with a
/// unioned `stage_flags`; conflicting declarations (mismatched type or
/// count at the same slot) are a reflection-merge error surfaced at
/// pipeline build time, not at graph compile time.
#[derive(Debug, Clone, Default)]
pub struct ReflectionInfo {
    /// Every reflected binding, in no particular order.
    pub bindings: Vec<ReflectedBinding>,
    /// Push constant ranges, if any.
    pub push_constant_ranges: Vec<vk::PushConstantRange>,
}

impl ReflectionInfo {
    /// Merge `other`'s bindings into `self` by `(set, binding)`, unioning
    /// stage flags on an exact type/count match. Returns the name of the
    /// first conflicting binding found, if any.
    pub fn merge(&mut self, other: &ReflectionInfo) -> Result<(), String> {
        for incoming in &other.bindings {
            if let Some(existing) = self
                .bindings
                .iter_mut()
                .find(|b| b.set == incoming.set && b.binding == incoming.binding)
            {
                if existing.descriptor_type != incoming.descriptor_type || existing.count != incoming.count {
                    return Err(existing.name.clone());
                }
                existing.stage_flags |= incoming.stage_flags;
            } else {
                self.bindings.push(incoming.clone());
            }
        }
        self.push_constant_ranges.extend_from_slice(&other.push_constant_ranges);
        Ok(())
    }

    /// Look up a binding by its reflected name.
    pub fn find(&self, name: &str) -> Option<&ReflectedBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(name: &str, set: u32, binding: u32, ty: vk::DescriptorType, stages: vk::ShaderStageFlags) -> ReflectedBinding {
        ReflectedBinding { name: name.to_string(), set, binding, descriptor_type: ty, count: 1, stage_flags: stages }
    }

    #[test]
    fn merge_unions_stage_flags_on_identical_binding() {
        let mut a = ReflectionInfo {
            bindings: vec![binding(
                "u_camera",
                0,
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::VERTEX,
            )],
            ..Default::default()
        };
        let b = ReflectionInfo {
            bindings: vec![binding(
                "u_camera",
                0,
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::FRAGMENT,
            )],
            ..Default::default()
        };
        a.merge(&b).unwrap();
        assert_eq!(a.bindings.len(), 1);
        assert_eq!(a.bindings[0].stage_flags, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn merge_rejects_conflicting_type_at_same_slot() {
        let mut a = ReflectionInfo {
            bindings: vec![binding("tex", 0, 1, vk::DescriptorType::SAMPLED_IMAGE, vk::ShaderStageFlags::FRAGMENT)],
            ..Default::default()
        };
        let b = ReflectionInfo {
            bindings: vec![binding(
                "tex",
                0,
                1,
                vk::DescriptorType::STORAGE_IMAGE,
                vk::ShaderStageFlags::FRAGMENT,
            )],
            ..Default::default()
        };
        assert!(a.merge(&b).is_err());
    }
}
