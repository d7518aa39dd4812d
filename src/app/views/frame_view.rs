use egui::TextureOptions;

use crate::app::views::View;
use crate::common::Frame;

/// Renders one RGB frame (preview or held still) into the central panel.
pub struct FrameView {
    texture_name: &'static str,
    frame: Frame,
}

impl FrameView {
    pub fn new(texture_name: &'static str, frame: Frame) -> Self {
        Self {
            texture_name,
            frame,
        }
    }
}

impl View for FrameView {
    fn draw(&mut self, ui: &mut egui::Ui) {
        let image = self.frame.image();
        let color_image = egui::ColorImage::from_rgb(
            [image.width() as usize, image.height() as usize],
            image.as_raw().as_slice(),
        );

        let texture_handle =
            ui.ctx()
                .load_texture(self.texture_name, color_image, TextureOptions::default());

        ui.image(&texture_handle);
    }
}
