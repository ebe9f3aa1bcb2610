//! Web-engine cursor types mapped onto OS cursors.

use winit::window::CursorIcon;

/// Cursor types the web engine can report. Mirrors the engine's own cursor
/// enumeration so delegate events stay a plain value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorType {
    Pointer,
    Cross,
    Hand,
    IBeam,
    Wait,
    Help,
    EastResize,
    NorthResize,
    NorthEastResize,
    NorthWestResize,
    SouthResize,
    SouthEastResize,
    SouthWestResize,
    WestResize,
    NorthSouthResize,
    EastWestResize,
    NorthEastSouthWestResize,
    NorthWestSouthEastResize,
    ColumnResize,
    RowResize,
    MiddlePanning,
    EastPanning,
    NorthPanning,
    NorthEastPanning,
    NorthWestPanning,
    SouthPanning,
    SouthEastPanning,
    SouthWestPanning,
    WestPanning,
    Move,
    VerticalText,
    Cell,
    ContextMenu,
    Alias,
    Progress,
    NoDrop,
    Copy,
    None,
    NotAllowed,
    ZoomIn,
    ZoomOut,
    Grab,
    Grabbing,
    Custom,
}

/// Maps every engine cursor type to the nearest OS system cursor. Total:
/// unhandled shapes fall back to the default arrow.
pub fn to_cursor_icon(cursor: CursorType) -> CursorIcon {
    use CursorType as C;
    match cursor {
        C::Cross => CursorIcon::Crosshair,
        C::Hand => CursorIcon::Pointer,
        C::IBeam => CursorIcon::Text,
        C::Wait => CursorIcon::Wait,
        C::Help => CursorIcon::Help,
        C::EastResize | C::EastPanning => CursorIcon::EResize,
        C::NorthResize | C::NorthPanning => CursorIcon::NResize,
        C::NorthEastResize | C::NorthEastPanning => CursorIcon::NeResize,
        C::NorthWestResize | C::NorthWestPanning => CursorIcon::NwResize,
        C::SouthResize | C::SouthPanning => CursorIcon::SResize,
        C::SouthEastResize | C::SouthEastPanning => CursorIcon::SeResize,
        C::SouthWestResize | C::SouthWestPanning => CursorIcon::SwResize,
        C::WestResize | C::WestPanning => CursorIcon::WResize,
        C::NorthSouthResize => CursorIcon::NsResize,
        C::EastWestResize => CursorIcon::EwResize,
        C::NorthEastSouthWestResize => CursorIcon::NeswResize,
        C::NorthWestSouthEastResize => CursorIcon::NwseResize,
        C::ColumnResize => CursorIcon::ColResize,
        C::RowResize => CursorIcon::RowResize,
        C::MiddlePanning | C::Move => CursorIcon::Move,
        C::VerticalText => CursorIcon::VerticalText,
        C::Cell => CursorIcon::Cell,
        C::ContextMenu => CursorIcon::ContextMenu,
        C::Alias => CursorIcon::Alias,
        C::Progress => CursorIcon::Progress,
        C::NoDrop | C::NotAllowed => CursorIcon::NotAllowed,
        C::Copy => CursorIcon::Copy,
        C::ZoomIn => CursorIcon::ZoomIn,
        C::ZoomOut => CursorIcon::ZoomOut,
        C::Grab => CursorIcon::Grab,
        C::Grabbing => CursorIcon::Grabbing,
        C::Pointer | C::None | C::Custom => CursorIcon::Default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[CursorType] = &[
        CursorType::Pointer,
        CursorType::Cross,
        CursorType::Hand,
        CursorType::IBeam,
        CursorType::Wait,
        CursorType::Help,
        CursorType::EastResize,
        CursorType::NorthResize,
        CursorType::NorthEastResize,
        CursorType::NorthWestResize,
        CursorType::SouthResize,
        CursorType::SouthEastResize,
        CursorType::SouthWestResize,
        CursorType::WestResize,
        CursorType::NorthSouthResize,
        CursorType::EastWestResize,
        CursorType::NorthEastSouthWestResize,
        CursorType::NorthWestSouthEastResize,
        CursorType::ColumnResize,
        CursorType::RowResize,
        CursorType::MiddlePanning,
        CursorType::EastPanning,
        CursorType::NorthPanning,
        CursorType::NorthEastPanning,
        CursorType::NorthWestPanning,
        CursorType::SouthPanning,
        CursorType::SouthEastPanning,
        CursorType::SouthWestPanning,
        CursorType::WestPanning,
        CursorType::Move,
        CursorType::VerticalText,
        CursorType::Cell,
        CursorType::ContextMenu,
        CursorType::Alias,
        CursorType::Progress,
        CursorType::NoDrop,
        CursorType::Copy,
        CursorType::None,
        CursorType::NotAllowed,
        CursorType::ZoomIn,
        CursorType::ZoomOut,
        CursorType::Grab,
        CursorType::Grabbing,
        CursorType::Custom,
    ];

    #[test]
    fn mapping_is_total() {
        // Every variant maps without panicking; resize shapes keep their axis.
        for &cursor in ALL {
            let _ = to_cursor_icon(cursor);
        }
        assert_eq!(to_cursor_icon(CursorType::EastResize), CursorIcon::EResize);
        assert_eq!(
            to_cursor_icon(CursorType::NorthSouthResize),
            CursorIcon::NsResize
        );
    }

    #[test]
    fn unknown_shapes_fall_back_to_default() {
        assert_eq!(to_cursor_icon(CursorType::Custom), CursorIcon::Default);
        assert_eq!(to_cursor_icon(CursorType::None), CursorIcon::Default);
    }
}
