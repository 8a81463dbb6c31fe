//! ST7735 LCD on the Enviro board
//!
//! The 0.96" panel is 160x80 pixels, driven over `spidev` with a GPIO
//! data/command line and a GPIO backlight. Each canvas cell is 4x8 pixels.

use embedded_graphics::mono_font::iso_8859_1::FONT_4X6 as FONT;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::{Rgb565, RgbColor};
use embedded_graphics::prelude::{DrawTarget, Point, Primitive, Size};
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};
use embedded_graphics::Drawable;
use embedded_hal::digital::OutputPin;
use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::{CdevPin, Delay, SpidevDevice};
use mipidsi::interface::SpiInterface;
use mipidsi::models::ST7735s;
use mipidsi::options::{ColorInversion, ColorOrder, Orientation, Rotation as PanelRotation};
use mipidsi::{Builder, Display as MipiDisplay, NoResetPin};
use std::fmt;
use std::io;

use super::{Canvas, DisplaySink};

pub const SPI_DEVICE: &str = "/dev/spidev0.1";
const GPIO_CHIP: &str = "/dev/gpiochip0";
const DC_LINE: u32 = 9;
const BACKLIGHT_LINE: u32 = 12;
const SPI_SPEED_HZ: u32 = 10_000_000;

pub const CELL_WIDTH: u32 = 4;
pub const CELL_HEIGHT: u32 = 8;

const FOREGROUND: Rgb565 = Rgb565::WHITE;
const BACKGROUND: Rgb565 = Rgb565::BLACK;
const TEXT_STYLE: MonoTextStyle<Rgb565> = MonoTextStyle::new(&FONT, FOREGROUND);

type Panel = MipiDisplay<SpiInterface<'static, SpidevDevice, CdevPin>, ST7735s, NoResetPin>;

pub struct LcdDisplay {
    panel: Panel,
    backlight: CdevPin,
    delay: Delay,
    last: Option<Vec<String>>,
    asleep: bool,
}

impl LcdDisplay {
    /// Open the panel on the Enviro's SPI chip select 1
    pub fn open() -> io::Result<Self> {
        let mut spi = SpidevDevice::open(SPI_DEVICE).map_err(device_error)?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(SPI_SPEED_HZ)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        spi.configure(&options)?;

        let mut chip = Chip::new(GPIO_CHIP).map_err(device_error)?;
        let dc = output_pin(&mut chip, DC_LINE, 0)?;
        let backlight = output_pin(&mut chip, BACKLIGHT_LINE, 1)?;

        // lives as long as the process
        let buffer: &'static mut [u8] = Box::leak(vec![0u8; 512].into_boxed_slice());
        let di = SpiInterface::new(spi, dc, buffer);

        let mut delay = Delay;
        let panel = Builder::new(ST7735s, di)
            .display_size(80, 160)
            .display_offset(26, 1)
            .color_order(ColorOrder::Bgr)
            .invert_colors(ColorInversion::Inverted)
            .orientation(Orientation::new().rotate(PanelRotation::Deg90))
            .init(&mut delay)
            .map_err(device_error)?;

        tracing::info!("Using ST7735 LCD on {}", SPI_DEVICE);
        Ok(Self {
            panel,
            backlight,
            delay,
            last: None,
            asleep: false,
        })
    }

    fn wake(&mut self) -> io::Result<()> {
        self.panel.wake(&mut self.delay).map_err(device_error)?;
        self.backlight.set_high().map_err(device_error)?;
        self.asleep = false;
        Ok(())
    }
}

impl DisplaySink for LcdDisplay {
    fn show(&mut self, canvas: &Canvas) -> io::Result<()> {
        let rows = canvas.rows();
        if self.last.as_ref() == Some(&rows) {
            return Ok(());
        }
        if self.asleep {
            self.wake()?;
        }
        draw_canvas(&mut self.panel, canvas).map_err(device_error)?;
        self.last = Some(rows);
        Ok(())
    }

    fn blank(&mut self) -> io::Result<()> {
        self.backlight.set_low().map_err(device_error)?;
        self.panel.clear(BACKGROUND).map_err(device_error)?;
        self.panel.sleep(&mut self.delay).map_err(device_error)?;
        self.last = None;
        self.asleep = true;
        Ok(())
    }
}

// === Drawing ===

/// Draw every canvas cell at `CELL_WIDTH` x `CELL_HEIGHT` pixels
pub fn draw_canvas<T>(target: &mut T, canvas: &Canvas) -> Result<(), T::Error>
where
    T: DrawTarget<Color = Rgb565>,
{
    let cell_size = Size::new(CELL_WIDTH, CELL_HEIGHT);
    for y in 0..canvas.height() {
        for x in 0..canvas.width() {
            let origin = Point::new((x as u32 * CELL_WIDTH) as i32, (y as u32 * CELL_HEIGHT) as i32);
            Rectangle::new(origin, cell_size)
                .into_styled(PrimitiveStyle::with_fill(BACKGROUND))
                .draw(target)?;

            let c = canvas.get(x, y).unwrap_or(' ');
            if let Some(height) = block_height(c) {
                let top = origin + Point::new(0, (CELL_HEIGHT - height) as i32);
                Rectangle::new(top, Size::new(CELL_WIDTH, height))
                    .into_styled(PrimitiveStyle::with_fill(FOREGROUND))
                    .draw(target)?;
            } else if c != ' ' {
                let mut buf = [0u8; 4];
                Text::with_baseline(c.encode_utf8(&mut buf), origin + Point::new(0, 1), TEXT_STYLE, Baseline::Top)
                    .draw(target)?;
            }
        }
    }
    Ok(())
}

/// Lit pixel rows for the lower block characters U+2581..U+2588
fn block_height(c: char) -> Option<u32> {
    match c {
        '\u{2581}'..='\u{2588}' => Some((c as u32 - 0x2580) * CELL_HEIGHT / 8),
        _ => None,
    }
}

fn output_pin(chip: &mut Chip, line: u32, initial: u8) -> io::Result<CdevPin> {
    let handle = chip
        .get_line(line)
        .and_then(|l| l.request(LineRequestFlags::OUTPUT, initial, "enviromon"))
        .map_err(device_error)?;
    CdevPin::new(handle).map_err(device_error)
}

fn device_error(e: impl fmt::Debug) -> io::Error {
    io::Error::other(format!("{:?}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::mock_display::MockDisplay;

    fn draw(canvas: &Canvas) -> MockDisplay<Rgb565> {
        let mut display = MockDisplay::new();
        display.set_allow_overdraw(true);
        draw_canvas(&mut display, canvas).unwrap();
        display
    }

    fn cell_pixels(display: &MockDisplay<Rgb565>, cx: u32, cy: u32) -> Vec<Option<Rgb565>> {
        let mut pixels = Vec::new();
        for y in 0..CELL_HEIGHT {
            for x in 0..CELL_WIDTH {
                let p = Point::new((cx * CELL_WIDTH + x) as i32, (cy * CELL_HEIGHT + y) as i32);
                pixels.push(display.get_pixel(p));
            }
        }
        pixels
    }

    #[test]
    fn test_full_block_fills_cell() {
        let mut canvas = Canvas::new(3, 2);
        canvas.set(0, 0, '█');
        let display = draw(&canvas);
        assert!(cell_pixels(&display, 0, 0).iter().all(|p| *p == Some(FOREGROUND)));
        assert!(cell_pixels(&display, 2, 1).iter().all(|p| *p == Some(BACKGROUND)));
    }

    #[test]
    fn test_half_block_fills_bottom_rows() {
        let mut canvas = Canvas::new(3, 2);
        canvas.set(1, 0, '▄');
        let display = draw(&canvas);
        assert_eq!(display.get_pixel(Point::new(4, 3)), Some(BACKGROUND));
        assert_eq!(display.get_pixel(Point::new(4, 4)), Some(FOREGROUND));
        assert_eq!(display.get_pixel(Point::new(7, 7)), Some(FOREGROUND));
    }

    #[test]
    fn test_text_lands_in_its_cell() {
        let mut canvas = Canvas::new(3, 2);
        canvas.set(1, 1, 'T');
        let display = draw(&canvas);
        assert!(cell_pixels(&display, 1, 1).contains(&Some(FOREGROUND)));
        assert!(!cell_pixels(&display, 0, 1).contains(&Some(FOREGROUND)));
    }

    #[test]
    fn test_block_heights() {
        assert_eq!(block_height('▁'), Some(1));
        assert_eq!(block_height('▇'), Some(7));
        assert_eq!(block_height('█'), Some(8));
        assert_eq!(block_height('='), None);
    }
}
