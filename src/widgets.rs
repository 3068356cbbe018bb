//! Built-in widgets.

pub mod label;
pub mod toggle_button;

pub use label::Label;
pub use toggle_button::ToggleButton;
