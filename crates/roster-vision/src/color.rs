use image::{Rgba, RgbaImage};

/// Hue in degrees [0, 360), saturation and lightness in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

pub fn rgb_to_hsl(r: u8, g: u8, b: u8) -> Hsl {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let delta = max - min;

    if delta < 1e-9 {
        return Hsl { h: 0.0, s: 0.0, l };
    }

    let s = if l > 0.5 {
        delta / (2.0 - max - min)
    } else {
        delta / (max + min)
    };

    let sector = if max == r {
        ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };

    Hsl {
        h: (sector * 60.0).rem_euclid(360.0),
        s,
        l,
    }
}

pub fn hsl_to_rgb(hsl: Hsl) -> [u8; 3] {
    let c = (1.0 - (2.0 * hsl.l - 1.0).abs()) * hsl.s;
    let hp = hsl.h.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r1, g1, b1) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = hsl.l - c / 2.0;
    let to_u8 = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    [to_u8(r1), to_u8(g1), to_u8(b1)]
}

/// Perceived brightness (ITU-R BT.601 weights), 0-255
pub fn luminance(px: &Rgba<u8>) -> f64 {
    0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64
}

/// Shortest angular distance between two hues, in degrees
pub fn hue_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).abs() % 360.0;
    d.min(360.0 - d)
}

/// Circular mean of hues so that 350° and 10° average to 0°, not 180°
pub fn mean_hue(hues: &[f64]) -> Option<f64> {
    if hues.is_empty() {
        return None;
    }
    let (sin, cos) = hues.iter().fold((0.0, 0.0), |(s, c), h| {
        let rad = h.to_radians();
        (s + rad.sin(), c + rad.cos())
    });
    if sin.abs() < 1e-9 && cos.abs() < 1e-9 {
        return None;
    }
    Some(sin.atan2(cos).to_degrees().rem_euclid(360.0))
}

/// Mean RGB of all pixels, `None` for an empty image
pub fn average_color(img: &RgbaImage) -> Option<[u8; 3]> {
    let n = img.width() as u64 * img.height() as u64;
    if n == 0 {
        return None;
    }
    let mut sum = [0u64; 3];
    for px in img.pixels() {
        sum[0] += px[0] as u64;
        sum[1] += px[1] as u64;
        sum[2] += px[2] as u64;
    }
    Some([
        (sum[0] / n) as u8,
        (sum[1] / n) as u8,
        (sum[2] / n) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_hues() {
        assert!((rgb_to_hsl(255, 0, 0).h - 0.0).abs() < 0.01);
        assert!((rgb_to_hsl(0, 255, 0).h - 120.0).abs() < 0.01);
        assert!((rgb_to_hsl(0, 0, 255).h - 240.0).abs() < 0.01);
        let grey = rgb_to_hsl(128, 128, 128);
        assert_eq!(grey.s, 0.0);
    }

    #[test]
    fn test_hsl_roundtrip_gold() {
        let rgb = hsl_to_rgb(Hsl { h: 45.0, s: 0.6, l: 0.5 });
        let back = rgb_to_hsl(rgb[0], rgb[1], rgb[2]);
        assert!((back.h - 45.0).abs() < 1.0, "hue {}", back.h);
        assert!((back.s - 0.6).abs() < 0.02);
        assert!((back.l - 0.5).abs() < 0.02);
    }

    #[test]
    fn test_hue_distance_wraps() {
        assert_eq!(hue_distance(350.0, 5.0), 15.0);
        assert_eq!(hue_distance(5.0, 350.0), 15.0);
        assert_eq!(hue_distance(90.0, 270.0), 180.0);
    }

    #[test]
    fn test_mean_hue_across_zero() {
        let mean = mean_hue(&[350.0, 10.0]).unwrap();
        assert!(hue_distance(mean, 0.0) < 0.01, "mean {}", mean);
        assert!(mean_hue(&[]).is_none());
    }

    #[test]
    fn test_luminance_weights() {
        assert!((luminance(&Rgba([255, 255, 255, 255])) - 255.0).abs() < 0.01);
        assert!((luminance(&Rgba([0, 255, 0, 255])) - 149.685).abs() < 0.01);
    }
}
