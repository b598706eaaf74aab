use std::path::PathBuf;
use std::time::Duration;

use crossbeam_channel::{Receiver, TryRecvError};
use iced::widget::{button, column, container, image, row, slider, text};
use iced::{Element, Length, Subscription, Task};

use facecount_core::detection::domain::detection_config::{ColorMode, ModelVariant};
use facecount_core::shared::constants::{
    DEFAULT_CAMERA_INDEX, DEFAULT_MIN_NEIGHBORS, DEFAULT_SCALE_FACTOR, IMAGE_EXTENSIONS,
    MAX_MIN_NEIGHBORS, MAX_SCALE_FACTOR, MIN_MIN_NEIGHBORS, MIN_SCALE_FACTOR,
};
use facecount_core::source::domain::frame_source::AcquisitionSource;

use crate::display::{info_text, DisplayFrame};
use crate::session::{spawn_loader, Session};

/// How often results are drained from the acquisition loop.
const REFRESH_INTERVAL: Duration = Duration::from_millis(30);

#[derive(Debug, Clone)]
pub enum Message {
    OpenImage,
    ImageSelected(Option<PathBuf>),
    OpenWebcam,
    Stop,
    SetColorMode(ColorMode),
    SetModel(ModelVariant),
    ScaleFactorChanged(f32),
    MinNeighborsChanged(u8),
    Tick,
}

pub struct App {
    loader: Option<Receiver<Result<Session, String>>>,
    session: Option<Session>,
    /// Source requested before the session was ready.
    pending_source: Option<AcquisitionSource>,
    frame: Option<DisplayFrame>,
    info: String,
    status: String,
    color_mode: ColorMode,
    model_variant: ModelVariant,
    scale_factor: f32,
    min_neighbors: u8,
}

impl App {
    pub fn new() -> (Self, Task<Message>) {
        (Self::with_loader(spawn_loader()), Task::none())
    }

    fn with_loader(loader: Receiver<Result<Session, String>>) -> Self {
        Self {
            loader: Some(loader),
            session: None,
            pending_source: None,
            frame: None,
            info: String::new(),
            status: "Loading cascades...".to_string(),
            color_mode: ColorMode::Color,
            model_variant: ModelVariant::Face,
            scale_factor: DEFAULT_SCALE_FACTOR as f32,
            min_neighbors: DEFAULT_MIN_NEIGHBORS as u8,
        }
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::OpenImage => {
                return Task::perform(
                    async {
                        rfd::AsyncFileDialog::new()
                            .set_title("Select image")
                            .add_filter("Images", IMAGE_EXTENSIONS)
                            .pick_file()
                            .await
                            .map(|h| h.path().to_path_buf())
                    },
                    Message::ImageSelected,
                );
            }
            Message::ImageSelected(Some(path)) => {
                self.switch_source(AcquisitionSource::FileStatic(path));
            }
            Message::ImageSelected(None) => {}
            Message::OpenWebcam => {
                self.switch_source(AcquisitionSource::Camera(DEFAULT_CAMERA_INDEX));
            }
            Message::Stop => {
                self.pending_source = None;
                if let Some(session) = &self.session {
                    session.stop();
                    self.status = "Stopped".to_string();
                }
            }
            Message::SetColorMode(mode) => {
                if let Some(session) = &self.session {
                    session.acquisition.configuration().set_color_mode(mode.clone());
                }
                self.color_mode = mode;
            }
            Message::SetModel(variant) => {
                if let Some(session) = &self.session {
                    session
                        .acquisition
                        .configuration()
                        .set_model_variant(variant.clone());
                }
                self.model_variant = variant;
            }
            Message::ScaleFactorChanged(value) => {
                self.scale_factor = value;
                if let Some(session) = &self.session {
                    session
                        .acquisition
                        .configuration()
                        .set_scale_factor(slider_scale(value));
                }
            }
            Message::MinNeighborsChanged(value) => {
                self.min_neighbors = value;
                if let Some(session) = &self.session {
                    session
                        .acquisition
                        .configuration()
                        .set_min_neighbors(u32::from(value));
                }
            }
            Message::Tick => {
                self.poll_loader();
                self.drain_results();
            }
        }
        Task::none()
    }

    fn switch_source(&mut self, source: AcquisitionSource) {
        let Some(session) = &self.session else {
            self.pending_source = Some(source);
            return;
        };

        session.stop();
        self.status = match session.acquisition.start(source.clone()) {
            Ok(()) => format!("Running: {source}"),
            Err(e) => {
                log::warn!("Could not start {source}: {e}");
                format!("Could not start {source}: {e}")
            }
        };
    }

    fn poll_loader(&mut self) {
        let Some(polled) = self.loader.as_ref().map(Receiver::try_recv) else {
            return;
        };
        match polled {
            Ok(Ok(session)) => {
                self.loader = None;
                self.attach(session);
            }
            Ok(Err(e)) => {
                self.loader = None;
                self.status = format!("Could not load cascades: {e}");
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.loader = None;
                self.status = "Cascade loader exited unexpectedly".to_string();
            }
        }
    }

    /// Pushes the current controls into the new session and starts any
    /// source picked while loading.
    fn attach(&mut self, session: Session) {
        let config = session.acquisition.configuration();
        config.set_model_variant(self.model_variant.clone());
        config.set_color_mode(self.color_mode.clone());
        config.set_scale_factor(slider_scale(self.scale_factor));
        config.set_min_neighbors(u32::from(self.min_neighbors));

        self.session = Some(session);
        self.status = "Ready".to_string();
        if let Some(source) = self.pending_source.take() {
            self.switch_source(source);
        }
    }

    fn drain_results(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        if let Some(result) = session.results.try_iter().last() {
            self.frame = Some(DisplayFrame::from_frame(&result.annotated_frame));
            self.info = info_text(&result);
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let controls = column![
            action("Open Image", Message::OpenImage),
            action("Open Webcam", Message::OpenWebcam),
            action("Stop", Message::Stop),
            toggle(
                "Coloured Image",
                self.color_mode == ColorMode::Color,
                Message::SetColorMode(ColorMode::Color),
            ),
            toggle(
                "Gray Scale Image",
                self.color_mode == ColorMode::Grayscale,
                Message::SetColorMode(ColorMode::Grayscale),
            ),
            toggle(
                "Detect Faces",
                self.model_variant == ModelVariant::Face,
                Message::SetModel(ModelVariant::Face),
            ),
            toggle(
                "Detect Eyes",
                self.model_variant == ModelVariant::Eye,
                Message::SetModel(ModelVariant::Eye),
            ),
            text(format!("Scale factor: {:.2}", self.scale_factor)),
            slider(
                MIN_SCALE_FACTOR as f32..=MAX_SCALE_FACTOR as f32,
                self.scale_factor,
                Message::ScaleFactorChanged,
            )
            .step(0.01f32),
            text(format!("Min neighbors: {}", self.min_neighbors)),
            slider(
                MIN_MIN_NEIGHBORS as u8..=MAX_MIN_NEIGHBORS as u8,
                self.min_neighbors,
                Message::MinNeighborsChanged,
            ),
            text(self.status.as_str()).size(12),
        ]
        .spacing(8)
        .width(Length::Fixed(220.0));

        let picture: Element<'_, Message> = match &self.frame {
            Some(frame) => image(frame.handle.clone())
                .width(Length::Fixed(frame.width))
                .height(Length::Fixed(frame.height))
                .into(),
            None => text("Open an image or the webcam to start counting").into(),
        };

        let display = column![text(self.info.as_str()).size(22), picture].spacing(10);

        container(row![controls, display].spacing(20))
            .padding(20)
            .into()
    }

    pub fn subscription(&self) -> Subscription<Message> {
        iced::time::every(REFRESH_INTERVAL).map(|_| Message::Tick)
    }
}

/// Slider values are `f32`; widening 1.01 gives 1.00999..., below the
/// accepted minimum. Snap to the slider's 0.01 step instead.
fn slider_scale(value: f32) -> f64 {
    (f64::from(value) * 100.0).round() / 100.0
}

fn action(label: &str, message: Message) -> Element<'_, Message> {
    button(text(label))
        .on_press(message)
        .width(Length::Fill)
        .style(button::primary)
        .into()
}

fn toggle(label: &str, selected: bool, message: Message) -> Element<'_, Message> {
    let style = if selected {
        button::primary
    } else {
        button::secondary
    };
    button(text(label))
        .on_press(message)
        .width(Length::Fill)
        .style(style)
        .into()
}
