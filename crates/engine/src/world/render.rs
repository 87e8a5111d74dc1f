/// Drawing seam implemented by the rendering backend.
pub trait DrawSink {
    fn draw_image(&mut self, key: &str, x: f64, y: f64, z: f64);
    fn fill_rect(&mut self, argb: u32, x: f64, y: f64, width: f64, height: f64);
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    Image {
        key: String,
        x: f64,
        y: f64,
        z: f64,
    },
    Rect {
        argb: u32,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

/// Sink that keeps every call in order. Used by headless hosts and tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: Vec<DrawCall>,
}

impl RecordingSink {
    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    pub fn take(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn images(&self) -> impl Iterator<Item = &str> {
        self.calls.iter().filter_map(|call| match call {
            DrawCall::Image { key, .. } => Some(key.as_str()),
            DrawCall::Rect { .. } => None,
        })
    }
}

impl DrawSink for RecordingSink {
    fn draw_image(&mut self, key: &str, x: f64, y: f64, z: f64) {
        self.calls.push(DrawCall::Image {
            key: key.to_string(),
            x,
            y,
            z,
        });
    }

    fn fill_rect(&mut self, argb: u32, x: f64, y: f64, width: f64, height: f64) {
        self.calls.push(DrawCall::Rect {
            argb,
            x,
            y,
            width,
            height,
        });
    }
}
