use crate::foundation::core::Canvas;

/// One rendered frame in premultiplied RGBA8.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl FrameRGBA {
    /// Frame filled with a single premultiplied color.
    pub fn filled(canvas: Canvas, premul: [u8; 4]) -> Self {
        let mut data = vec![0u8; canvas.byte_len()];
        for px in data.chunks_exact_mut(4) {
            px.copy_from_slice(&premul);
        }
        Self {
            width: canvas.width,
            height: canvas.height,
            data,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }
}
