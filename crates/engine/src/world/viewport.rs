use std::cell::RefCell;
use std::rc::Weak;

use super::entity::Character;

/// The visible window onto an area, in pixels.
pub trait Viewport {
    fn visible_size_px(&self) -> (f64, f64);
    fn offset_px(&self) -> (f64, f64);
    fn tick(&mut self, _dt_ms: u64) {}
    fn turn(&mut self) {}
}

/// Viewport that can follow a character and stay inside the area's pixel
/// bounds on axes that do not loop.
#[derive(Debug, Clone, Default)]
pub struct Camera {
    pub offset: (f64, f64),
    pub size: (f64, f64),
    bounds: Option<CameraBounds>,
    target: Option<Weak<RefCell<Character>>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraBounds {
    pub width_px: f64,
    pub height_px: f64,
    pub loop_x: bool,
    pub loop_y: bool,
}

impl Camera {
    pub fn new(size: (f64, f64)) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    pub fn set_bounds(&mut self, bounds: Option<CameraBounds>) {
        self.bounds = bounds;
    }

    /// Tracks `target` without keeping it alive.
    pub fn follow(&mut self, target: Weak<RefCell<Character>>) {
        self.target = Some(target);
        self.recenter();
    }

    pub fn stop_following(&mut self) {
        self.target = None;
    }

    fn recenter(&mut self) {
        let Some(target) = self.target.as_ref().and_then(Weak::upgrade) else {
            return;
        };
        let pixel = target.borrow().core().pixel();
        let mut x = pixel.x - self.size.0 * 0.5;
        let mut y = pixel.y - self.size.1 * 0.5;
        if let Some(bounds) = self.bounds {
            if !bounds.loop_x {
                x = clamp_axis(x, self.size.0, bounds.width_px);
            }
            if !bounds.loop_y {
                y = clamp_axis(y, self.size.1, bounds.height_px);
            }
        }
        self.offset = (x, y);
    }
}

/// Keeps `[offset, offset + view)` inside `[0, extent)`, centering when the
/// view is larger than the extent.
fn clamp_axis(offset: f64, view: f64, extent: f64) -> f64 {
    if view >= extent {
        return (extent - view) * 0.5;
    }
    offset.clamp(0.0, extent - view)
}

impl Viewport for Camera {
    fn visible_size_px(&self) -> (f64, f64) {
        self.size
    }

    fn offset_px(&self) -> (f64, f64) {
        self.offset
    }

    fn tick(&mut self, _dt_ms: u64) {
        self.recenter();
    }

    fn turn(&mut self) {
        self.recenter();
    }
}
