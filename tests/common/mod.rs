//! Synthetic QR fixtures shared by the integration tests.

#![allow(dead_code)]

use image::{GrayImage, ImageFormat, Luma};
use qrcode::{Color, QrCode};
use std::io::Cursor;

/// Pixels per QR module.
pub const MODULE: u32 = 8;
/// Quiet zone around each symbol, in modules.
pub const QUIET: u32 = 4;

/// Side length in pixels of a rendered symbol including its quiet zone.
pub fn symbol_side(text: &str) -> u32 {
    let code = QrCode::new(text.as_bytes()).expect("encodable");
    (code.width() as u32 + 2 * QUIET) * MODULE
}

/// Draw `text` as a QR symbol into `canvas` with its top-left corner
/// (quiet zone included) at `(x0, y0)`.
pub fn draw_qr(canvas: &mut GrayImage, text: &str, x0: u32, y0: u32, dark: u8, light: u8) {
    let code = QrCode::new(text.as_bytes()).expect("encodable");
    let width = code.width() as u32;
    let colors = code.to_colors();
    let side = (width + 2 * QUIET) * MODULE;

    for y in 0..side {
        for x in 0..side {
            canvas.put_pixel(x0 + x, y0 + y, Luma([light]));
        }
    }
    for (i, color) in colors.iter().enumerate() {
        if *color != Color::Dark {
            continue;
        }
        let mx = (i as u32 % width + QUIET) * MODULE;
        let my = (i as u32 / width + QUIET) * MODULE;
        for dy in 0..MODULE {
            for dx in 0..MODULE {
                canvas.put_pixel(x0 + mx + dx, y0 + my + dy, Luma([dark]));
            }
        }
    }
}

/// A white image holding one black-on-white symbol.
pub fn qr_image(text: &str) -> GrayImage {
    let side = symbol_side(text);
    let mut canvas = GrayImage::from_pixel(side, side, Luma([255]));
    draw_qr(&mut canvas, text, 0, 0, 0, 255);
    canvas
}

/// Two symbols side by side on a white background.
pub fn two_qr_image(left: &str, right: &str) -> GrayImage {
    let (a, b) = (symbol_side(left), symbol_side(right));
    let gap = 8 * MODULE;
    let mut canvas = GrayImage::from_pixel(a + gap + b, a.max(b), Luma([255]));
    draw_qr(&mut canvas, left, 0, 0, 0, 255);
    draw_qr(&mut canvas, right, a + gap, 0, 0, 255);
    canvas
}

pub fn encode(image: &GrayImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).expect("encode fixture");
    buf.into_inner()
}

pub fn png(image: &GrayImage) -> Vec<u8> {
    encode(image, ImageFormat::Png)
}

pub fn blank_png(width: u32, height: u32) -> Vec<u8> {
    png(&GrayImage::from_pixel(width, height, Luma([255])))
}
