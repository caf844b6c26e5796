//! Layout calculations
//!
//! Pure functions for window mode resolution and rect derivation.
//!
//! # Responsibilities
//!
//! - Mode fallback against a window's mode-support mask
//! - Usable area after avoid areas are carved out
//! - Split divider placement, dragging limits and the two split halves
//! - Tile columns and cascade offsets
//!
//! # Design Contract
//!
//! - All functions are **pure**: no side effects, no state mutation
//! - Deterministic: same inputs always produce same outputs
//!
//! # NOT Responsible For
//!
//! - Which windows take part in a layout (see `container/`)
//! - Avoid-area bookkeeping (see `avoid_area.rs`)

use crate::avoid_area::{AvoidArea, AvoidEdge};
use crate::geometry::Rect;
use crate::window_node::{ModeSupport, WindowMode};

/// Effective mode for a requested mode.
///
/// The requested mode wins when supported; otherwise the first supported
/// mode in [`WindowMode::PRIORITY`]. An empty mask keeps the request.
pub fn resolve_mode(requested: WindowMode, support: ModeSupport) -> WindowMode {
    if support.supports(requested) {
        return requested;
    }
    WindowMode::PRIORITY
        .into_iter()
        .find(|mode| support.supports(*mode))
        .unwrap_or(requested)
}

/// Display area left once avoid areas are removed from its edges
pub fn limit_rect(display: &Rect, areas: &[AvoidArea]) -> Rect {
    let mut left = display.x;
    let mut top = display.y;
    let mut right = display.right();
    let mut bottom = display.bottom();

    for area in areas {
        match area.edge {
            AvoidEdge::Top => top = top.max(area.rect.bottom()),
            AvoidEdge::Bottom => bottom = bottom.min(area.rect.y),
            AvoidEdge::Left => left = left.max(area.rect.right()),
            AvoidEdge::Right => right = right.min(area.rect.x),
        }
    }

    if right <= left || bottom <= top {
        return Rect::new(left, top, 0, 0);
    }
    Rect::new(left, top, (right - left) as u32, (bottom - top) as u32)
}

/// Initial divider rect: across the short axis, at `ratio` along the long one
pub fn divider_rect(area: &Rect, ratio: f32, width: u32) -> Rect {
    if area.is_landscape() {
        let offset = (area.width as f32 * ratio) as i32 - width as i32 / 2;
        Rect::new(area.x + offset, area.y, width, area.height)
    } else {
        let offset = (area.height as f32 * ratio) as i32 - width as i32 / 2;
        Rect::new(area.x, area.y + offset, area.width, width)
    }
}

/// Move a divider by `delta` along the split axis, keeping `min_size` on
/// both sides. When the area is too small for that, the divider is centered.
pub fn drag_divider(area: &Rect, divider: &Rect, delta: i32, min_size: u32) -> Rect {
    let min = min_size as i32;
    if area.is_landscape() {
        let lo = area.x + min;
        let hi = area.right() - min - divider.width as i32;
        let x = if lo <= hi {
            (divider.x + delta).clamp(lo, hi)
        } else {
            area.x + (area.width as i32 - divider.width as i32) / 2
        };
        Rect::new(x, area.y, divider.width, area.height)
    } else {
        let lo = area.y + min;
        let hi = area.bottom() - min - divider.height as i32;
        let y = if lo <= hi {
            (divider.y + delta).clamp(lo, hi)
        } else {
            area.y + (area.height as i32 - divider.height as i32) / 2
        };
        Rect::new(area.x, y, area.width, divider.height)
    }
}

/// Primary and secondary rects on either side of the divider.
///
/// Primary is left (landscape) or top (portrait).
pub fn split_rects(area: &Rect, divider: &Rect) -> (Rect, Rect) {
    if area.is_landscape() {
        let primary_width = (divider.x - area.x).max(0) as u32;
        let secondary_x = divider.right();
        let secondary_width = (area.right() - secondary_x).max(0) as u32;
        (
            Rect::new(area.x, area.y, primary_width, area.height),
            Rect::new(secondary_x, area.y, secondary_width, area.height),
        )
    } else {
        let primary_height = (divider.y - area.y).max(0) as u32;
        let secondary_y = divider.bottom();
        let secondary_height = (area.bottom() - secondary_y).max(0) as u32;
        (
            Rect::new(area.x, area.y, area.width, primary_height),
            Rect::new(area.x, secondary_y, area.width, secondary_height),
        )
    }
}

/// Equal columns across `area`. The last column takes the rounding slack.
pub fn tile_rects(area: &Rect, count: usize) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }
    let column = area.width / count as u32;
    (0..count)
        .map(|i| {
            let x = area.x + (column * i as u32) as i32;
            let width = if i + 1 == count {
                area.width - column * i as u32
            } else {
                column
            };
            Rect::new(x, area.y, width, area.height)
        })
        .collect()
}

/// Default rect for the `index`-th auto-placed floating window: two thirds
/// of the area, stepped diagonally, wrapping before leaving the area.
pub fn cascade_rect(area: &Rect, index: usize, step: i32) -> Rect {
    let width = area.width * 2 / 3;
    let height = area.height * 2 / 3;
    let room_x = area.width as i32 - width as i32;
    let room_y = area.height as i32 - height as i32;
    let slots = if step > 0 {
        (room_x.min(room_y) / step).max(0) as usize + 1
    } else {
        1
    };
    let offset = step * (index % slots) as i32;
    Rect::new(area.x + offset, area.y + offset, width, height)
}

/// Check split invariants (for testing)
pub fn check_split(area: &Rect, divider: &Rect, primary: &Rect, secondary: &Rect) -> Result<(), String> {
    if area.is_landscape() {
        if primary.right() != divider.x || divider.right() != secondary.x {
            return Err(format!(
                "split columns not contiguous: primary={:?} divider={:?} secondary={:?}",
                primary, divider, secondary
            ));
        }
        let total = primary.width + divider.width + secondary.width;
        if total != area.width {
            return Err(format!("split width {} != area width {}", total, area.width));
        }
    } else {
        if primary.bottom() != divider.y || divider.bottom() != secondary.y {
            return Err(format!(
                "split rows not contiguous: primary={:?} divider={:?} secondary={:?}",
                primary, divider, secondary
            ));
        }
        let total = primary.height + divider.height + secondary.height;
        if total != area.height {
            return Err(format!("split height {} != area height {}", total, area.height));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANDSCAPE: Rect = Rect::new(0, 0, 1280, 720);
    const PORTRAIT: Rect = Rect::new(0, 0, 720, 1280);

    #[test]
    fn supported_request_wins() {
        let mask = ModeSupport::FULLSCREEN | ModeSupport::FLOATING;
        assert_eq!(resolve_mode(WindowMode::Floating, mask), WindowMode::Floating);
    }

    #[test]
    fn unsupported_split_falls_back_to_fullscreen() {
        let mask = ModeSupport::FULLSCREEN | ModeSupport::FLOATING;
        assert_eq!(resolve_mode(WindowMode::SplitPrimary, mask), WindowMode::Fullscreen);
        assert_eq!(resolve_mode(WindowMode::SplitSecondary, mask), WindowMode::Fullscreen);
    }

    #[test]
    fn fallback_follows_priority_order() {
        let mask = ModeSupport::FLOATING | ModeSupport::SPLIT_PRIMARY | ModeSupport::SPLIT_SECONDARY;
        assert_eq!(resolve_mode(WindowMode::Fullscreen, mask), WindowMode::Floating);

        let mask = ModeSupport::SPLIT_PRIMARY | ModeSupport::SPLIT_SECONDARY;
        assert_eq!(resolve_mode(WindowMode::Fullscreen, mask), WindowMode::SplitPrimary);
    }

    #[test]
    fn empty_mask_keeps_request() {
        assert_eq!(resolve_mode(WindowMode::Floating, ModeSupport::empty()), WindowMode::Floating);
    }

    #[test]
    fn limit_rect_without_areas_is_display() {
        assert_eq!(limit_rect(&LANDSCAPE, &[]), LANDSCAPE);
    }

    #[test]
    fn limit_rect_removes_bars() {
        let areas = [
            AvoidArea { edge: AvoidEdge::Top, rect: Rect::new(0, 0, 1280, 40) },
            AvoidArea { edge: AvoidEdge::Bottom, rect: Rect::new(0, 672, 1280, 48) },
        ];
        assert_eq!(limit_rect(&LANDSCAPE, &areas), Rect::new(0, 40, 1280, 632));
    }

    #[test]
    fn limit_rect_collapses_when_fully_covered() {
        let areas = [
            AvoidArea { edge: AvoidEdge::Top, rect: Rect::new(0, 0, 1280, 500) },
            AvoidArea { edge: AvoidEdge::Bottom, rect: Rect::new(0, 300, 1280, 420) },
        ];
        assert!(limit_rect(&LANDSCAPE, &areas).is_empty());
    }

    #[test]
    fn divider_splits_long_axis() {
        let landscape = divider_rect(&LANDSCAPE, 0.5, 16);
        assert_eq!(landscape, Rect::new(632, 0, 16, 720));

        let portrait = divider_rect(&PORTRAIT, 0.5, 16);
        assert_eq!(portrait, Rect::new(0, 632, 720, 16));
    }

    #[test]
    fn split_rects_are_contiguous() {
        for area in [LANDSCAPE, PORTRAIT, Rect::new(10, 40, 1001, 600)] {
            let divider = divider_rect(&area, 0.5, 16);
            let (primary, secondary) = split_rects(&area, &divider);
            assert!(check_split(&area, &divider, &primary, &secondary).is_ok(), "area {:?}", area);
        }
    }

    #[test]
    fn landscape_primary_is_left() {
        let divider = divider_rect(&LANDSCAPE, 0.5, 16);
        let (primary, secondary) = split_rects(&LANDSCAPE, &divider);
        assert_eq!(primary, Rect::new(0, 0, 632, 720));
        assert_eq!(secondary, Rect::new(648, 0, 632, 720));
    }

    #[test]
    fn drag_moves_along_axis_only() {
        let divider = divider_rect(&LANDSCAPE, 0.5, 16);
        let moved = drag_divider(&LANDSCAPE, &divider, 10, 200);
        assert_eq!(moved, Rect::new(642, 0, 16, 720));
    }

    #[test]
    fn drag_is_clamped_to_min_size() {
        let divider = divider_rect(&LANDSCAPE, 0.5, 16);
        let far_left = drag_divider(&LANDSCAPE, &divider, -5000, 200);
        assert_eq!(far_left.x, 200);

        let far_right = drag_divider(&LANDSCAPE, &divider, 5000, 200);
        assert_eq!(far_right.right(), 1280 - 200);
    }

    #[test]
    fn drag_in_tiny_area_centers_divider() {
        let area = Rect::new(0, 0, 300, 200);
        let divider = divider_rect(&area, 0.5, 16);
        let moved = drag_divider(&area, &divider, 50, 200);
        assert_eq!(moved.x, 142);
    }

    #[test]
    fn tile_columns_cover_area() {
        let tiles = tile_rects(&Rect::new(0, 40, 1000, 600), 3);
        assert_eq!(tiles.len(), 3);
        assert_eq!(tiles[0], Rect::new(0, 40, 333, 600));
        assert_eq!(tiles[1], Rect::new(333, 40, 333, 600));
        assert_eq!(tiles[2], Rect::new(666, 40, 334, 600));
        assert!(tile_rects(&LANDSCAPE, 0).is_empty());
    }

    #[test]
    fn cascade_steps_and_wraps() {
        let first = cascade_rect(&LANDSCAPE, 0, 48);
        let second = cascade_rect(&LANDSCAPE, 1, 48);
        assert_eq!(first, Rect::new(0, 0, 853, 480));
        assert_eq!(second, Rect::new(48, 48, 853, 480));

        // room_y = 240 -> 6 slots before wrapping
        assert_eq!(cascade_rect(&LANDSCAPE, 6, 48), first);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn dragged_split_stays_contiguous(
                width in 500u32..4000,
                height in 500u32..4000,
                ratio in 0.2f32..0.8,
                divider_width in 8u32..32,
                min_size in 0u32..200,
                delta in -5000i32..5000,
            ) {
                let area = Rect::new(0, 0, width, height);
                let divider = divider_rect(&area, ratio, divider_width);
                let moved = drag_divider(&area, &divider, delta, min_size);
                let (primary, secondary) = split_rects(&area, &moved);

                prop_assert!(check_split(&area, &moved, &primary, &secondary).is_ok());
                if area.is_landscape() {
                    prop_assert!(primary.width >= min_size && secondary.width >= min_size);
                } else {
                    prop_assert!(primary.height >= min_size && secondary.height >= min_size);
                }
            }
        }
    }
}
