//! Depth-only occluders: invisible meshes that hide overlay geometry behind
//! the tracked head.

/// Fragment shader for the occluder. Its color output is masked off by the
/// material, so the value only matters when debugging with color writes on.
pub const OCCLUDER_FRAGMENT_SHADER: &str =
    "precision lowp float;\n void main(void){\n gl_FragColor=vec4(1.,0.,0.,1.);\n }";

/// Occluders draw before everything with the default order of 0.
pub const OCCLUDER_RENDER_ORDER: i32 = -1;

/// Material state for a mesh that writes depth but no color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthOnlyMaterial {
    pub color_write: bool,
    pub depth_write: bool,
    pub depth_test: bool,
    pub fragment_shader: &'static str,
}

impl Default for DepthOnlyMaterial {
    fn default() -> Self {
        Self {
            color_write: false,
            depth_write: true,
            depth_test: true,
            fragment_shader: OCCLUDER_FRAGMENT_SHADER,
        }
    }
}

/// Geometry paired with a depth-only material, ready for the host renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct Occluder<G> {
    pub geometry: G,
    pub material: DepthOnlyMaterial,
    pub render_order: i32,
}

/// Wrap `geometry` so it masks what is behind it without being drawn itself.
pub fn create_occluder<G>(geometry: G) -> Occluder<G> {
    Occluder {
        geometry,
        material: DepthOnlyMaterial::default(),
        render_order: OCCLUDER_RENDER_ORDER,
    }
}
