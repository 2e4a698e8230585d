#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use bowls::core::DetectionConfig;
use bowls::fiducial::builtins::DICT_4X4_50_HEAD;
use bowls::fiducial::render_marker;
use bowls::{MemorySettings, SettingsSnapshot, KEY_DETECTION_CONFIG};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

pub const MAT: Rgb<u8> = Rgb([40, 120, 50]);
pub const JACK: Rgb<u8> = Rgb([245, 245, 240]);
pub const DARK: Rgb<u8> = Rgb([20, 20, 25]);
pub const RED: Rgb<u8> = Rgb([200, 30, 30]);

pub fn fill_disc(img: &mut RgbImage, cx: f64, cy: f64, r: f64, color: Rgb<u8>) {
    let x0 = (cx - r).floor().max(0.0) as u32;
    let y0 = (cy - r).floor().max(0.0) as u32;
    let x1 = ((cx + r).ceil() as u32).min(img.width());
    let y1 = ((cy + r).ceil() as u32).min(img.height());
    for y in y0..y1 {
        for x in x0..x1 {
            let dx = x as f64 + 0.5 - cx;
            let dy = y as f64 + 0.5 - cy;
            if dx * dx + dy * dy <= r * r {
                img.put_pixel(x, y, color);
            }
        }
    }
}

/// Jack r=20 at (230, 150); dark bowl r=35 with a 100 px gap on the left,
/// red bowl r=33 with a 197 px gap on the right. Everything times `s`.
pub fn end_scene(s: f64) -> RgbImage {
    let w = (560.0 * s) as u32;
    let h = (300.0 * s) as u32;
    let mut img = RgbImage::from_pixel(w, h, MAT);
    fill_disc(&mut img, 230.0 * s, 150.0 * s, 20.0 * s, JACK);
    fill_disc(&mut img, 75.0 * s, 150.0 * s, 35.0 * s, DARK);
    fill_disc(&mut img, 480.0 * s, 150.0 * s, 33.0 * s, RED);
    img
}

fn stamp(img: &mut RgbImage, id: u32, x0: u32, y0: u32) {
    let marker = render_marker(&DICT_4X4_50_HEAD, id, 8, 8).expect("render");
    for y in 0..marker.height {
        for x in 0..marker.width {
            let v = marker.data[y * marker.width + x];
            img.put_pixel(x0 + x as u32, y0 + y as u32, Rgb([v, v, v]));
        }
    }
}

/// Gray mat with the given corner markers (centers 296 px apart), a white
/// jack r=20 at (200, 200) and a dark bowl r=30 at (300, 200).
pub fn marker_scene(ids: &[u32]) -> RgbImage {
    let mut img = RgbImage::from_pixel(400, 400, Rgb([200, 200, 200]));
    let origins = [(20, 20), (316, 20), (316, 316), (20, 316)];
    for &id in ids {
        let (x0, y0) = origins[id as usize];
        stamp(&mut img, id, x0, y0);
    }
    fill_disc(&mut img, 200.0, 200.0, 20.0, Rgb([250, 250, 250]));
    fill_disc(&mut img, 300.0, 200.0, 30.0, Rgb([20, 20, 20]));
    img
}

pub fn png_bytes(img: &RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png");
    buf
}

/// Detection without blur, so blob radii match the drawn discs.
pub fn sharp_config() -> DetectionConfig {
    DetectionConfig {
        blur_kernel_size: 1,
        ..DetectionConfig::default()
    }
}

pub fn sharp_snapshot() -> SettingsSnapshot {
    SettingsSnapshot {
        detection: sharp_config(),
        ..SettingsSnapshot::default()
    }
}

pub fn sharp_settings() -> Arc<MemorySettings> {
    Arc::new(MemorySettings::new().with(KEY_DETECTION_CONFIG, r#"{"blur_kernel_size": 1}"#))
}
