/// Compile-time layout tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleTokens {
    pub spacing_4: i32,
    pub spacing_8: i32,
    pub spacing_12: i32,
    pub spacing_20: i32,
    pub window_default_width: i32,
    pub window_default_height: i32,
    pub chat_panel_width: i32,
    pub crop_outline_width: f64,
    pub key_dialog_width: i32,
}

pub const LAYOUT_TOKENS: StyleTokens = StyleTokens {
    spacing_4: 4,
    spacing_8: 8,
    spacing_12: 12,
    spacing_20: 20,
    window_default_width: 1000,
    window_default_height: 600,
    chat_panel_width: 300,
    crop_outline_width: 2.0,
    key_dialog_width: 420,
};
