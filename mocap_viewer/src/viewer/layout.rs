//! Window layout: a perspective viewport filling the left two-thirds and
//! three orthographic plane views stacked in the remaining third.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewportRect {
    pub fn aspect(&self) -> f32 {
        if self.height <= 0.0 {
            1.0
        } else {
            self.width / self.height
        }
    }
}

/// Coordinate plane shown by one orthographic viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrthoPlane {
    Xy,
    Yz,
    Xz,
}

#[derive(Debug, Clone, Copy)]
pub struct WindowLayout {
    pub perspective: ViewportRect,
    pub ortho: [(OrthoPlane, ViewportRect); 3],
}

pub fn split_window(width: u32, height: u32) -> WindowLayout {
    let width = width.max(1) as f32;
    let height = height.max(1) as f32;
    let main_width = (width * 2.0 / 3.0).floor();
    let side_width = width - main_width;
    let side_height = (height / 3.0).floor();

    let perspective = ViewportRect {
        x: 0.0,
        y: 0.0,
        width: main_width,
        height,
    };

    let column = |row: u32, plane: OrthoPlane| {
        (
            plane,
            ViewportRect {
                x: main_width,
                y: row as f32 * side_height,
                width: side_width,
                // The bottom cell absorbs the rounding remainder.
                height: if row == 2 {
                    height - 2.0 * side_height
                } else {
                    side_height
                },
            },
        )
    };

    WindowLayout {
        perspective,
        ortho: [
            column(0, OrthoPlane::Xy),
            column(1, OrthoPlane::Yz),
            column(2, OrthoPlane::Xz),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perspective_takes_the_left_two_thirds() {
        let layout = split_window(900, 600);
        assert_eq!(layout.perspective.x, 0.0);
        assert_eq!(layout.perspective.width, 600.0);
        assert_eq!(layout.perspective.height, 600.0);
    }

    #[test]
    fn ortho_views_tile_the_right_third_without_gaps() {
        let layout = split_window(800, 601);
        let main_width = layout.perspective.width;
        let mut covered = 0.0;
        for (_, rect) in layout.ortho {
            assert_eq!(rect.x, main_width);
            assert_eq!(rect.width, 800.0 - main_width);
            covered += rect.height;
        }
        assert_eq!(covered, 601.0);
    }

    #[test]
    fn plane_order_is_xy_yz_xz_top_to_bottom() {
        let layout = split_window(800, 600);
        let planes: Vec<_> = layout.ortho.iter().map(|(plane, _)| *plane).collect();
        assert_eq!(planes, vec![OrthoPlane::Xy, OrthoPlane::Yz, OrthoPlane::Xz]);
        assert!(layout.ortho[0].1.y < layout.ortho[1].1.y);
        assert!(layout.ortho[1].1.y < layout.ortho[2].1.y);
    }

    #[test]
    fn degenerate_windows_stay_positive() {
        let layout = split_window(0, 0);
        assert!(layout.perspective.width >= 0.0);
        assert!(layout.perspective.height >= 1.0);
    }
}
