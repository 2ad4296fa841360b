use std::sync::Arc;

use vidcursor_core::FrameConverter;

use crate::Y4mFrame;

/// How the chroma planes of a Y4M stream are laid out relative to the luma plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chroma {
    /// Luma only. Converts to one gray byte per pixel.
    Mono,
    /// Chroma planes subsampled by `1 << x_shift` horizontally and
    /// `1 << y_shift` vertically. Converts to BGR.
    Subsampled { x_shift: u32, y_shift: u32 },
}

impl Chroma {
    /// The layout of an 8-bit colorspace, or `None` if it cannot be converted.
    pub fn from_colorspace(colorspace: y4m::Colorspace) -> Option<Self> {
        use y4m::Colorspace;

        match colorspace {
            Colorspace::Cmono => Some(Chroma::Mono),
            Colorspace::C420
            | Colorspace::C420jpeg
            | Colorspace::C420paldv
            | Colorspace::C420mpeg2 => Some(Chroma::Subsampled {
                x_shift: 1,
                y_shift: 1,
            }),
            Colorspace::C422 => Some(Chroma::Subsampled {
                x_shift: 1,
                y_shift: 0,
            }),
            Colorspace::C444 => Some(Chroma::Subsampled {
                x_shift: 0,
                y_shift: 0,
            }),
            _ => None,
        }
    }

    pub fn num_components(&self) -> usize {
        match self {
            Chroma::Mono => 1,
            Chroma::Subsampled { .. } => 3,
        }
    }
}

/// Converts Y4M frames to gray or BGR using BT.601 limited-range coefficients.
pub struct Y4mConverter {
    width: usize,
    height: usize,
    chroma: Chroma,
}

impl Y4mConverter {
    pub fn new(width: usize, height: usize, chroma: Chroma) -> Self {
        Self {
            width,
            height,
            chroma,
        }
    }
}

impl FrameConverter for Y4mConverter {
    type Frame = Arc<Y4mFrame>;

    fn convert(&mut self, frame: &Arc<Y4mFrame>, pixels: &mut [u8]) {
        let (w, h) = (self.width, self.height);

        match self.chroma {
            Chroma::Mono => {
                let n = (w * h).min(frame.y.len()).min(pixels.len());
                pixels[..n].copy_from_slice(&frame.y[..n]);
            }
            Chroma::Subsampled { x_shift, y_shift } => {
                let uv_w = (w + (1 << x_shift) - 1) >> x_shift;

                for (row, out_row) in pixels.chunks_exact_mut(w * 3).take(h).enumerate() {
                    let uv_row = (row >> y_shift) * uv_w;

                    for (col, bgr) in out_row.chunks_exact_mut(3).enumerate() {
                        let y = frame.y.get(row * w + col).copied().unwrap_or(16);
                        let uv = uv_row + (col >> x_shift);
                        let u = frame.u.get(uv).copied().unwrap_or(128);
                        let v = frame.v.get(uv).copied().unwrap_or(128);

                        let [r, g, b] = yuv_to_rgb(y, u, v);
                        bgr[0] = b;
                        bgr[1] = g;
                        bgr[2] = r;
                    }
                }
            }
        }
    }
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = 298 * (i32::from(y) - 16);
    let d = i32::from(u) - 128;
    let e = i32::from(v) - 128;

    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;

    [
        clamp(c + 409 * e),
        clamp(c - 100 * d - 208 * e),
        clamp(c + 516 * d),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(y: Vec<u8>, u: Vec<u8>, v: Vec<u8>) -> Arc<Y4mFrame> {
        Arc::new(Y4mFrame { y, u, v })
    }

    #[test]
    fn limited_range_extremes() {
        assert_eq!(yuv_to_rgb(16, 128, 128), [0, 0, 0]);
        assert_eq!(yuv_to_rgb(235, 128, 128), [255, 255, 255]);
        // Pure red in BT.601 limited range.
        let [r, g, b] = yuv_to_rgb(81, 90, 240);
        assert!(r > 250 && g < 5 && b < 5, "{} {} {}", r, g, b);
    }

    #[test]
    fn chroma_is_shared_by_subsampled_pixels() {
        let mut converter = Y4mConverter::new(
            2,
            2,
            Chroma::Subsampled {
                x_shift: 1,
                y_shift: 1,
            },
        );
        let mut pixels = vec![0; 2 * 2 * 3];
        converter.convert(
            &frame(vec![235, 16, 16, 235], vec![128], vec![128]),
            &mut pixels,
        );

        assert_eq!(
            pixels,
            vec![255, 255, 255, 0, 0, 0, 0, 0, 0, 255, 255, 255]
        );
    }

    #[test]
    fn bgr_order_with_full_chroma() {
        let mut converter = Y4mConverter::new(
            1,
            1,
            Chroma::Subsampled {
                x_shift: 0,
                y_shift: 0,
            },
        );
        let mut pixels = vec![0; 3];
        converter.convert(&frame(vec![81], vec![90], vec![240]), &mut pixels);

        assert!(pixels[2] > 250);
        assert!(pixels[0] < 5);
    }

    #[test]
    fn mono_copies_luma() {
        let mut converter = Y4mConverter::new(3, 1, Chroma::Mono);
        let mut pixels = vec![0; 3];
        converter.convert(&frame(vec![1, 2, 3], Vec::new(), Vec::new()), &mut pixels);
        assert_eq!(pixels, vec![1, 2, 3]);
    }

    #[test]
    fn colorspaces() {
        assert_eq!(
            Chroma::from_colorspace(y4m::Colorspace::C420jpeg).map(|c| c.num_components()),
            Some(3)
        );
        assert_eq!(
            Chroma::from_colorspace(y4m::Colorspace::Cmono),
            Some(Chroma::Mono)
        );
        assert_eq!(Chroma::from_colorspace(y4m::Colorspace::C420p10), None);
    }
}
