pub mod frame_view;

pub use frame_view::FrameView;

pub trait View {
    fn draw(&mut self, ui: &mut egui::Ui);
}
