pub mod preview;
pub mod setup;

pub use preview::{render_preview_frame, sync_preview_settings};
pub use setup::setup_preview;
