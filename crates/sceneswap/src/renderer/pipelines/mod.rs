pub mod anchor;
pub mod blit;
pub mod captured_image;

/// Shader source prefixed with the shared uniform declarations.
macro_rules! with_common {
    ($file:literal) => {
        concat!(
            include_str!("../../../shaders/common.wgsl"),
            "\n",
            include_str!(concat!("../../../shaders/", $file))
        )
    };
}

pub(crate) use with_common;
