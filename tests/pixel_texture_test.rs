use image::Rgba;
use sprite_ngin::resources::texture::{PICO8, PixelTexture, TextureManager, parse_hex_color};

const GRID: [&str; 8] = [
    "01234567",
    "89abcdef",
    "........",
    "f.e.d.c.",
    " 1 1 1 1",
    "77777777",
    "0......0",
    "fedcba98",
];

#[test]
fn palette_grid_scales_to_exact_blocks() {
    let texture = PixelTexture::new(&GRID)
        .with_palette(&PICO8)
        .with_pixel_size(32, 32)
        .build()
        .unwrap();
    assert_eq!((texture.width, texture.height), (256, 256));
    let image = texture.image().unwrap();

    for (gy, row) in GRID.iter().enumerate() {
        for (gx, cell) in row.chars().enumerate() {
            let expected = match cell {
                '.' | ' ' => Rgba([0, 0, 0, 0]),
                c => {
                    let index = c.to_digit(16).unwrap() as usize;
                    Rgba(parse_hex_color(PICO8[index]).unwrap())
                }
            };
            let (left, top) = (gx as u32 * 32, gy as u32 * 32);
            for (x, y) in [(left, top), (left + 31, top), (left, top + 31), (left + 31, top + 31), (left + 16, top + 9)] {
                assert_eq!(*image.get_pixel(x, y), expected, "cell ({gx}, {gy}) at ({x}, {y})");
            }
        }
    }
}

#[test]
fn non_square_pixels_stretch_each_axis() {
    let rows = ["12", "3."];
    let texture = PixelTexture::new(&rows)
        .with_palette(&PICO8)
        .with_pixel_size(4, 2)
        .build()
        .unwrap();
    assert_eq!((texture.width, texture.height), (8, 4));
    let image = texture.image().unwrap();
    assert_eq!(*image.get_pixel(7, 1), Rgba(parse_hex_color(PICO8[2]).unwrap()));
    assert_eq!(image.get_pixel(7, 3)[3], 0);
}

#[test]
fn generated_textures_register_with_the_manager() {
    let mut manager = TextureManager::new();
    let texture = PixelTexture::new(&GRID).with_palette(&PICO8).build().unwrap();
    let id = manager.add("sprite", texture);
    assert_eq!(manager.get("sprite"), id);
    assert_eq!(manager.texture(id).map(|t| t.key.as_str()), Some("sprite"));
    assert!(manager.take_pending().contains(&id));
}
