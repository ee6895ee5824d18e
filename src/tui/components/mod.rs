//! Widgets the main screen is built from

pub mod confirm;
pub mod input;
pub mod sidebar;
pub mod transcript;

pub use confirm::{ConfirmDialog, DialogAction};
pub use input::{InputAction, InputBox};
pub use sidebar::{Sidebar, SidebarItem, SidebarRow};
pub use transcript::render_transcript;
