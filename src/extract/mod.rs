//! Page-surface extraction: markup + accessibility tree into the region
//! model, and the script-global namespace into a capability catalog.

pub mod dom;
pub mod scripts;

pub use dom::{extract, PageModel};
pub use scripts::{
    scan, ApiMethod, DataLayerEntry, EventHandlerEntry, ExposedApiEntry, GlobalEntry, JsSurface,
};
