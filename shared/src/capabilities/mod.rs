mod export;

pub use self::export::{
    Export, ExportOperation, ExportOutput, SaveError, SaveResult, PNG_MIME_TYPE,
};

// Crux's built-in Render is enough to trigger view updates.
pub use crux_core::render::Render;

use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub render: Render<Event>,
    pub export: Export<Event>,
}
