use shared::geometry::distance;
use shared::{Coordinate, Rect};

/// World scale applied when mapping to the screen.
pub const VIEW_SCALE: f32 = 0.5;

/// What part of the world is currently shown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub center: Coordinate,
    pub scale: f32,
    /// Bounding box of all streamed sectors in world units. Inverted while
    /// no sector is known.
    pub sector_rect: Rect,
    /// Set once the center has followed a snake head.
    pub tracking: bool,
}

impl ViewState {
    pub fn new(game_radius: i32) -> Self {
        Self {
            center: Coordinate::new(game_radius, game_radius),
            scale: VIEW_SCALE,
            sector_rect: Self::empty_rect(game_radius),
            tracking: false,
        }
    }

    fn empty_rect(game_radius: i32) -> Rect {
        let max_coord = game_radius * 2;
        Rect::new(Coordinate::new(max_coord, max_coord), Coordinate::new(-1, -1))
    }

    pub fn ready(&self) -> bool {
        self.tracking
    }

    /// Whether at least one sector contributes to the rectangle.
    pub fn has_sectors(&self) -> bool {
        self.sector_rect.ul.x <= self.sector_rect.lr.x
    }

    /// Recompute the sector rectangle and follow `center` when given.
    /// Returns true if the center moved.
    pub fn update(
        &mut self,
        center: Option<Coordinate>,
        sectors: &[Coordinate],
        sector_size: i32,
        game_radius: i32,
    ) -> bool {
        let mut rect = Self::empty_rect(game_radius);
        for sector in sectors {
            let x = sector.x * sector_size;
            let y = sector.y * sector_size;
            rect.ul.x = rect.ul.x.min(x);
            rect.ul.y = rect.ul.y.min(y);
            rect.lr.x = rect.lr.x.max(x + sector_size);
            rect.lr.y = rect.lr.y.max(y + sector_size);
        }
        self.sector_rect = rect;
        self.scale = VIEW_SCALE;

        if center.is_some() {
            self.tracking = true;
        }
        match center {
            Some(center) if center != self.center => {
                self.center = center;
                true
            }
            _ => false,
        }
    }

    /// Distance from the center to the corner of the sector rectangle.
    pub fn view_radius(&self) -> i32 {
        if !self.has_sectors() {
            return 0;
        }
        distance(self.center, self.sector_rect.ul)
    }
}

/// Maps between world and screen coordinates for one viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewMapper {
    pub width: i32,
    pub height: i32,
}

impl ViewMapper {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn to_screen(&self, view: &ViewState, world: Coordinate) -> Coordinate {
        Coordinate::new(
            ((world.x - view.center.x) as f32 * view.scale) as i32 + self.width / 2,
            ((world.y - view.center.y) as f32 * view.scale) as i32 + self.height / 2,
        )
    }

    pub fn to_world(&self, view: &ViewState, screen: Coordinate) -> Coordinate {
        Coordinate::new(
            ((screen.x - self.width / 2) as f32 / view.scale) as i32 + view.center.x,
            ((screen.y - self.height / 2) as f32 / view.scale) as i32 + view.center.y,
        )
    }

    pub fn screen_center(&self) -> Coordinate {
        Coordinate::new(self.width / 2, self.height / 2)
    }

    /// World rectangle covered by the viewport.
    pub fn screen_rect(&self, view: &ViewState) -> Rect {
        Rect::new(
            self.to_world(view, Coordinate::new(0, 0)),
            self.to_world(view, Coordinate::new(self.width, self.height)),
        )
    }

    /// Whether a world point lands inside the viewport, with `margin` world
    /// units of slack on every side.
    pub fn on_screen(&self, view: &ViewState, world: Coordinate, margin: i32) -> bool {
        let rect = self.screen_rect(view);
        Rect::new(rect.ul.offset(-margin, -margin), rect.lr.offset(margin, margin)).contains(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view_at(x: i32, y: i32) -> ViewState {
        let mut view = ViewState::new(21600);
        view.update(Some(Coordinate::new(x, y)), &[], 300, 21600);
        view
    }

    #[test]
    fn test_center_maps_to_screen_center() {
        let mapper = ViewMapper::new(800, 600);
        let view = view_at(1000, 2000);
        assert_eq!(
            mapper.to_screen(&view, Coordinate::new(1000, 2000)),
            Coordinate::new(400, 300)
        );
        assert_eq!(
            mapper.to_screen(&view, Coordinate::new(1100, 1900)),
            Coordinate::new(450, 250)
        );
    }

    #[test]
    fn test_screen_to_world_inverts() {
        let mapper = ViewMapper::new(800, 600);
        let view = view_at(5000, 5000);
        let world = Coordinate::new(5120, 4880);
        let screen = mapper.to_screen(&view, world);
        assert_eq!(mapper.to_world(&view, screen), world);
    }

    #[test]
    fn test_sector_rect_spans_all_sectors() {
        let mut view = ViewState::new(21600);
        assert!(!view.ready());
        assert!(!view.has_sectors());
        assert_eq!(view.view_radius(), 0);

        let sectors = [Coordinate::new(2, 3), Coordinate::new(4, 1)];
        let moved = view.update(Some(Coordinate::new(900, 600)), &sectors, 300, 21600);
        assert!(moved);
        assert!(view.ready());
        assert_eq!(view.sector_rect.ul, Coordinate::new(600, 300));
        assert_eq!(view.sector_rect.lr, Coordinate::new(1500, 1200));
        assert_eq!(view.view_radius(), 424);

        assert!(!view.update(Some(Coordinate::new(900, 600)), &sectors, 300, 21600));
        assert!(!view.update(None, &[], 300, 21600));
        assert!(!view.has_sectors());
    }

    #[test]
    fn test_on_screen_margin() {
        let mapper = ViewMapper::new(200, 100);
        let view = view_at(1000, 1000);
        // viewport spans 400 x 200 world units
        assert!(mapper.on_screen(&view, Coordinate::new(1199, 1000), 0));
        assert!(!mapper.on_screen(&view, Coordinate::new(1250, 1000), 0));
        assert!(mapper.on_screen(&view, Coordinate::new(1250, 1000), 60));
    }
}
