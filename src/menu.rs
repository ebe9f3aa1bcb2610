//! Software-rendered native context menu.
//!
//! Opened from the web engine's run-context-menu callback; rasterised into
//! an RGBA pixel buffer with a system TTF font and blended onto the UI
//! compositor's output. The menu is the topmost input layer while open and
//! closes on ESC, item selection, a press outside its bounds, or focus
//! loss.

use std::fs;

use swash::scale::{Render, ScaleContext, Source};
use swash::zeno::Format;
use swash::{CacheKey, FontRef};

use crate::log;

/// Font size for menu labels, in pixels.
const FONT_SIZE: f32 = 14.0;
/// Height of one menu row.
pub const ITEM_HEIGHT: i32 = 28;
/// Horizontal text padding; also the cursor inset applied to the origin.
pub const PADDING_X: i32 = 10;
/// Vertical cursor inset applied to the origin.
pub const PADDING_Y: i32 = 6;
/// Minimum menu width.
pub const MIN_WIDTH: i32 = 120;

/// Standard font locations, tried in order.
const FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/TTF/Roboto-Regular.ttf",
    "/Library/Fonts/Arial Unicode.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "C:\\Windows\\Fonts\\segoeui.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// One entry from the engine's menu model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub command_id: i32,
    pub label: String,
    pub enabled: bool,
}

/// The engine's run-context-menu continuation: called once with the chosen
/// command id, or with `None` on dismissal.
pub struct MenuContinuation(Option<Box<dyn FnOnce(Option<i32>) + Send>>);

impl MenuContinuation {
    pub fn new(f: impl FnOnce(Option<i32>) + Send + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    fn finish(&mut self, command: Option<i32>) {
        if let Some(f) = self.0.take() {
            f(command);
        }
    }
}

impl std::fmt::Debug for MenuContinuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MenuContinuation")
    }
}

/// The rasterised menu, positioned in window pixels. RGBA, straight alpha.
pub struct MenuRaster<'a> {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [u8],
}

struct MenuFont {
    data: Vec<u8>,
    offset: u32,
    key: CacheKey,
    ascent: f32,
    context: ScaleContext,
}

impl MenuFont {
    fn load() -> Option<Self> {
        for path in FONT_PATHS {
            let Ok(data) = fs::read(path) else { continue };
            let Some(font) = FontRef::from_index(&data, 0) else {
                continue;
            };
            let metrics = font.metrics(&[]).scale(FONT_SIZE);
            let (offset, key) = (font.offset, font.key);
            log(&format!("menu: using font {path}"));
            return Some(Self {
                data,
                offset,
                key,
                ascent: metrics.ascent,
                context: ScaleContext::new(),
            });
        }
        None
    }

    fn font_ref(&self) -> FontRef<'_> {
        FontRef {
            data: &self.data,
            offset: self.offset,
            key: self.key,
        }
    }

    fn text_width(&self, text: &str) -> f32 {
        let font = self.font_ref();
        let glyph_metrics = font.glyph_metrics(&[]).scale(FONT_SIZE);
        let charmap = font.charmap();
        text.chars()
            .map(|c| glyph_metrics.advance_width(charmap.map(c)))
            .sum()
    }

    /// Rasterise `text` into the RGBA buffer with its baseline at
    /// `(x, baseline_y)`.
    fn draw_text(
        &mut self,
        text: &str,
        x: i32,
        baseline_y: i32,
        color: [u8; 3],
        pixels: &mut [u8],
        buf_w: i32,
        buf_h: i32,
    ) {
        let font = FontRef {
            data: &self.data,
            offset: self.offset,
            key: self.key,
        };
        let glyph_metrics = font.glyph_metrics(&[]).scale(FONT_SIZE);
        let charmap = font.charmap();
        let mut scaler = self.context.builder(font).size(FONT_SIZE).hint(true).build();

        let mut pen = x as f32;
        for ch in text.chars() {
            let glyph = charmap.map(ch);
            if let Some(image) = Render::new(&[Source::Outline])
                .format(Format::Alpha)
                .render(&mut scaler, glyph)
            {
                let gx = pen as i32 + image.placement.left;
                let gy = baseline_y - image.placement.top;
                for row in 0..image.placement.height as i32 {
                    let dy = gy + row;
                    if dy < 0 || dy >= buf_h {
                        continue;
                    }
                    for col in 0..image.placement.width as i32 {
                        let dx = gx + col;
                        if dx < 0 || dx >= buf_w {
                            continue;
                        }
                        let alpha =
                            image.data[(row * image.placement.width as i32 + col) as usize];
                        if alpha == 0 {
                            continue;
                        }
                        let i = ((dy * buf_w + dx) * 4) as usize;
                        let inv = 255 - alpha as u32;
                        for (c, &tint) in color.iter().enumerate() {
                            pixels[i + c] =
                                ((tint as u32 * alpha as u32 + pixels[i + c] as u32 * inv) / 255)
                                    as u8;
                        }
                        pixels[i + 3] = pixels[i + 3].max(alpha);
                    }
                }
            }
            pen += glyph_metrics.advance_width(glyph);
        }
    }
}

pub struct MenuOverlay {
    font: Option<MenuFont>,
    open: bool,
    items: Vec<MenuItem>,
    continuation: Option<MenuContinuation>,
    menu_x: i32,
    menu_y: i32,
    tex_width: i32,
    tex_height: i32,
    hover_index: i32,
    /// Swallow the button-up from the right-click that opened the menu.
    ignore_next_up: bool,
    pixels: Vec<u8>,
    needs_redraw: bool,
}

impl MenuOverlay {
    /// Locate a system font. When none is found the menu stays disabled and
    /// every open request is cancelled immediately.
    pub fn new() -> Self {
        let font = MenuFont::load();
        if font.is_none() {
            log("menu: no usable font found, context menu disabled");
        }
        Self {
            font,
            open: false,
            items: Vec::new(),
            continuation: None,
            menu_x: 0,
            menu_y: 0,
            tex_width: 0,
            tex_height: 0,
            hover_index: -1,
            ignore_next_up: false,
            pixels: Vec::new(),
            needs_redraw: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn enabled(&self) -> bool {
        self.font.is_some()
    }

    /// Open at `(x, y)` with the engine's items. The origin is inset so the
    /// cursor lands inside the menu.
    pub fn open(&mut self, x: i32, y: i32, items: Vec<MenuItem>, mut cont: MenuContinuation) {
        if self.font.is_none() || items.is_empty() {
            cont.finish(None);
            return;
        }
        let measure = |font: &MenuFont, label: &str| font.text_width(label);
        let widest = items
            .iter()
            .map(|item| measure(self.font.as_ref().unwrap(), &item.label))
            .fold(0.0f32, f32::max);
        self.open_with_layout(x, y, items, cont, widest.ceil() as i32);
    }

    fn open_with_layout(
        &mut self,
        x: i32,
        y: i32,
        items: Vec<MenuItem>,
        cont: MenuContinuation,
        widest_label: i32,
    ) {
        self.tex_width = MIN_WIDTH.max(widest_label + PADDING_X * 2);
        self.tex_height = items.len() as i32 * ITEM_HEIGHT;
        self.menu_x = x - PADDING_X;
        self.menu_y = y - PADDING_Y;
        self.items = items;
        self.continuation = Some(cont);
        self.hover_index = -1;
        self.ignore_next_up = true;
        self.open = true;
        self.render();
        self.needs_redraw = true;
    }

    /// Dismiss, cancelling the engine continuation.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        if let Some(mut cont) = self.continuation.take() {
            cont.finish(None);
        }
        self.reset();
    }

    fn select(&mut self, index: i32) {
        if !self.open || index < 0 {
            return;
        }
        let Some(item) = self.items.get(index as usize) else {
            return;
        };
        if !item.enabled {
            return;
        }
        let command = item.command_id;
        if let Some(mut cont) = self.continuation.take() {
            cont.finish(Some(command));
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.open = false;
        self.items.clear();
        self.pixels.clear();
        self.hover_index = -1;
        self.needs_redraw = true;
    }

    fn item_at(&self, x: i32, y: i32) -> i32 {
        if x < self.menu_x || x >= self.menu_x + self.tex_width {
            return -1;
        }
        if y < self.menu_y || y >= self.menu_y + self.tex_height {
            return -1;
        }
        let index = (y - self.menu_y) / ITEM_HEIGHT;
        if index >= 0 && (index as usize) < self.items.len() {
            index
        } else {
            -1
        }
    }

    /// Pointer motion while open: hover tracking. Always consumed.
    pub fn handle_mouse_move(&mut self, x: i32, y: i32) -> bool {
        if !self.open {
            return false;
        }
        let hover = self.item_at(x, y);
        if hover != self.hover_index {
            self.hover_index = hover;
            self.render();
            self.needs_redraw = true;
        }
        true
    }

    /// Pointer button while open. A press outside the bounds closes and lets
    /// the event fall through; the release that opened the menu is ignored
    /// once.
    pub fn handle_mouse_click(&mut self, x: i32, y: i32, down: bool) -> bool {
        if !self.open {
            return false;
        }
        if down {
            if self.item_at(x, y) < 0 {
                self.close();
                return false;
            }
        } else {
            if self.ignore_next_up {
                self.ignore_next_up = false;
                return true;
            }
            let index = self.item_at(x, y);
            if index >= 0 {
                self.select(index);
            }
        }
        true
    }

    /// ESC closes the menu; other keys are not consumed.
    pub fn handle_key_down(&mut self, vk: i32) -> bool {
        if !self.open {
            return false;
        }
        if vk == crate::input::keymap::vk::ESCAPE {
            self.close();
            return true;
        }
        false
    }

    /// The current raster for compositing, if the menu is open.
    pub fn raster(&self) -> Option<MenuRaster<'_>> {
        if !self.open || self.pixels.is_empty() {
            return None;
        }
        Some(MenuRaster {
            x: self.menu_x,
            y: self.menu_y,
            width: self.tex_width as u32,
            height: self.tex_height as u32,
            pixels: &self.pixels,
        })
    }

    /// True when the raster changed since the last frame.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }

    fn render(&mut self) {
        let Some(font) = self.font.as_mut() else {
            return;
        };
        if self.items.is_empty() {
            return;
        }
        let (w, h) = (self.tex_width, self.tex_height);
        self.pixels.clear();
        self.pixels.resize((w * h * 4) as usize, 0);

        let bg = [45u8, 45, 48, 240];
        let hover = [65u8, 65, 70, 255];
        let text = [230u8, 230, 230];
        let disabled = [120u8, 120, 120];

        for y in 0..h {
            let row_item = y / ITEM_HEIGHT;
            let hovered = row_item == self.hover_index
                && self
                    .items
                    .get(row_item as usize)
                    .is_some_and(|i| i.enabled);
            let color = if hovered { hover } else { bg };
            for x in 0..w {
                let i = ((y * w + x) * 4) as usize;
                self.pixels[i..i + 4].copy_from_slice(&color);
            }
        }

        for (index, item) in self.items.iter().enumerate() {
            let baseline =
                index as i32 * ITEM_HEIGHT + (ITEM_HEIGHT + font.ascent as i32) / 2;
            let color = if item.enabled { text } else { disabled };
            font.draw_text(
                &item.label,
                PADDING_X,
                baseline,
                color,
                &mut self.pixels,
                w,
                h,
            );
        }
    }
}

impl Default for MenuOverlay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;

    fn items() -> Vec<MenuItem> {
        vec![
            MenuItem {
                command_id: 100,
                label: "Back".into(),
                enabled: true,
            },
            MenuItem {
                command_id: 101,
                label: "Reload".into(),
                enabled: true,
            },
            MenuItem {
                command_id: 102,
                label: "Inspect".into(),
                enabled: false,
            },
        ]
    }

    fn recorder() -> (Arc<Mutex<Vec<Option<i32>>>>, MenuContinuation) {
        let record = Arc::new(Mutex::new(Vec::new()));
        let r = record.clone();
        let cont = MenuContinuation::new(move |cmd| r.lock().unwrap().push(cmd));
        (record, cont)
    }

    /// Open bypassing font discovery so tests run without system fonts.
    fn open_menu(menu: &mut MenuOverlay, x: i32, y: i32) -> Arc<Mutex<Vec<Option<i32>>>> {
        let (record, cont) = recorder();
        menu.open_with_layout(x, y, items(), cont, 80);
        record
    }

    fn bare_menu() -> MenuOverlay {
        MenuOverlay {
            font: None,
            open: false,
            items: Vec::new(),
            continuation: None,
            menu_x: 0,
            menu_y: 0,
            tex_width: 0,
            tex_height: 0,
            hover_index: -1,
            ignore_next_up: false,
            pixels: Vec::new(),
            needs_redraw: false,
        }
    }

    #[test]
    fn layout_covers_cursor_and_all_items() {
        let mut menu = bare_menu();
        open_menu(&mut menu, 200, 150);
        assert!(menu.is_open());
        assert_eq!(menu.menu_x, 200 - PADDING_X);
        assert_eq!(menu.menu_y, 150 - PADDING_Y);
        assert_eq!(menu.tex_height, 3 * ITEM_HEIGHT);
        assert!(menu.tex_width >= MIN_WIDTH);
        // The opening cursor position is inside the menu.
        assert_eq!(menu.item_at(200, 150), 0);
    }

    #[test]
    fn release_of_opening_click_does_not_select() {
        let mut menu = bare_menu();
        let record = open_menu(&mut menu, 100, 100);

        // Button-up right after opening, on top of item 0.
        assert!(menu.handle_mouse_click(100, 100, false));
        assert!(menu.is_open());
        assert!(record.lock().unwrap().is_empty());

        // A later release selects.
        assert!(menu.handle_mouse_click(100, 100, false));
        assert!(!menu.is_open());
        assert_eq!(record.lock().unwrap().as_slice(), &[Some(100)]);
    }

    #[test]
    fn press_outside_closes_and_falls_through() {
        let mut menu = bare_menu();
        let record = open_menu(&mut menu, 100, 100);
        // Press far outside: menu closes, event NOT consumed.
        assert!(!menu.handle_mouse_click(500, 500, true));
        assert!(!menu.is_open());
        assert_eq!(record.lock().unwrap().as_slice(), &[None]);
    }

    #[test]
    fn escape_closes_and_cancels() {
        let mut menu = bare_menu();
        let record = open_menu(&mut menu, 10, 10);
        assert!(menu.handle_key_down(crate::input::keymap::vk::ESCAPE));
        assert!(!menu.is_open());
        assert_eq!(record.lock().unwrap().as_slice(), &[None]);
    }

    #[test]
    fn disabled_items_cannot_be_selected() {
        let mut menu = bare_menu();
        let record = open_menu(&mut menu, 0, 0);
        menu.ignore_next_up = false;
        // Third row is disabled.
        let y = menu.menu_y + 2 * ITEM_HEIGHT + 2;
        assert!(menu.handle_mouse_click(menu.menu_x + 4, y, false));
        assert!(menu.is_open());
        assert!(record.lock().unwrap().is_empty());
    }

    #[test]
    fn open_without_font_cancels_immediately() {
        let mut menu = bare_menu();
        let (record, cont) = recorder();
        menu.open(0, 0, items(), cont);
        assert!(!menu.is_open());
        assert_eq!(record.lock().unwrap().as_slice(), &[None]);
    }

    #[test]
    fn hover_tracks_rows() {
        let mut menu = bare_menu();
        open_menu(&mut menu, 50, 50);
        menu.handle_mouse_move(50, 50 - PADDING_Y + ITEM_HEIGHT + 1);
        assert_eq!(menu.hover_index, 1);
        menu.handle_mouse_move(1000, 1000);
        assert_eq!(menu.hover_index, -1);
    }
}
