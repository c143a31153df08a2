use image::Rgb;

/// Parses `#rgb` or `#rrggbb` (the `#` is optional) into an RGB color.
///
/// Short form expands each nibble to a full byte, so `#0f0` is `#00ff00`.
/// Used as a clap value parser, hence the `String` error.
pub fn parse_hex_color(s: &str) -> Result<Rgb<u8>, String> {
    let digits = s.trim().trim_start_matches('#');
    let invalid = || format!("`{s}` is not a color. Expected `#rgb` or `#rrggbb`");

    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let value = u32::from_str_radix(digits, 16).map_err(|_| invalid())?;

    match digits.len() {
        3 => {
            let nibble = |shift: u32| ((value >> shift) & 0xf) as u8 * 17;
            Ok(Rgb([nibble(8), nibble(4), nibble(0)]))
        }
        6 => {
            let byte = |shift: u32| ((value >> shift) & 0xff) as u8;
            Ok(Rgb([byte(16), byte(8), byte(0)]))
        }
        _ => Err(invalid()),
    }
}
