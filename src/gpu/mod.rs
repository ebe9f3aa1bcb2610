//! GPU rendering: device state, the composite pipeline, per-view
//! compositors, the shared-texture import ring, and the video plane.

pub mod compositor;
pub mod pipeline;
pub mod shared_texture;
pub mod state;
pub mod video;

pub use self::compositor::UiCompositor;
pub use self::state::{GpuState, PlatformCaps};
pub use self::video::{VideoPlane, VideoRenderController};
