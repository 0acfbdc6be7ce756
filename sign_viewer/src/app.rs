use crate::config::Config;
use crate::labels::ClassLabelTable;
use crate::request::{PredictionClient, PredictionError};
use eframe::egui;
use sign_proto::Classification;
use std::path::Path;
use std::sync::{mpsc, Arc};

const SUPPORTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let labels = ClassLabelTable::load(&config.labels)?;
    let client = Arc::new(PredictionClient::new(&config.prediction_service));
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([800.0, 500.0]),
        ..Default::default()
    };

    let app = ViewerApp::new(labels, client, runtime);
    eframe::run_native(
        "Traffic Sign Classification",
        options,
        Box::new(|_cc| Box::new(app)),
    )
    .map_err(|e| format!("failed to start viewer window: {}", e))?;

    Ok(())
}

enum RequestOutcome {
    Prediction(Classification),
    Rejected,
    Transport(String),
}

struct ViewerApp {
    labels: ClassLabelTable,
    client: Arc<PredictionClient>,
    runtime: tokio::runtime::Runtime,
    image_path: String,
    result_text: String,
    in_flight: bool,
    outcome_tx: mpsc::Sender<RequestOutcome>,
    outcome_rx: mpsc::Receiver<RequestOutcome>,
}

impl ViewerApp {
    fn new(
        labels: ClassLabelTable,
        client: Arc<PredictionClient>,
        runtime: tokio::runtime::Runtime,
    ) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::channel();

        Self {
            labels,
            client,
            runtime,
            image_path: String::new(),
            result_text: String::new(),
            in_flight: false,
            outcome_tx,
            outcome_rx,
        }
    }

    fn poll_outcome(&mut self) {
        if let Ok(outcome) = self.outcome_rx.try_recv() {
            self.in_flight = false;
            match outcome {
                RequestOutcome::Prediction(classification) => {
                    let name = self.labels.name_for(classification.class);
                    self.result_text = format_prediction(name, classification.score);
                }
                RequestOutcome::Rejected => {
                    self.result_text = "Error occurred during prediction".to_string();
                }
                RequestOutcome::Transport(e) => {
                    // transport failures leave the window contents untouched
                    tracing::error!("Prediction request failed: {}", e);
                }
            }
        }
    }

    fn spawn_request(&mut self, ctx: &egui::Context) {
        let path = self.image_path.trim().to_string();
        if path.is_empty() {
            tracing::warn!("No image selected");
            return;
        }
        if !has_supported_extension(Path::new(&path)) {
            tracing::warn!("Unsupported image extension: {}", path);
            return;
        }

        let image_data = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("Failed to read {}: {}", path, e);
                return;
            }
        };

        self.in_flight = true;
        let client = self.client.clone();
        let outcome_tx = self.outcome_tx.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let outcome = match client.predict(image_data).await {
                Ok(classification) => RequestOutcome::Prediction(classification),
                Err(PredictionError::ErrorReply) => RequestOutcome::Rejected,
                Err(e) => RequestOutcome::Transport(e.to_string()),
            };
            let _ = outcome_tx.send(outcome);
            ctx.request_repaint();
        });
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_outcome();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(20.0);
                ui.heading("Traffic Sign Classification");
                ui.add_space(20.0);

                ui.horizontal(|ui| {
                    ui.label("Image file:");
                    ui.text_edit_singleline(&mut self.image_path);
                });
                ui.label("jpg, jpeg and png images are supported");
                ui.add_space(10.0);

                let predict = ui.add_enabled(
                    !self.in_flight,
                    egui::Button::new("Predict").min_size(egui::vec2(150.0, 50.0)),
                );
                if predict.clicked() {
                    self.spawn_request(ctx);
                }

                ui.add_space(20.0);
                if self.in_flight {
                    ui.spinner();
                } else if !self.result_text.is_empty() {
                    ui.label(&self.result_text);
                }
            });
        });
    }
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn format_prediction(name: &str, score: f32) -> String {
    format!("Predicted Class: {}\nScore: {:.2}", name, score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions() {
        assert!(has_supported_extension(Path::new("sign.jpg")));
        assert!(has_supported_extension(Path::new("sign.JPEG")));
        assert!(has_supported_extension(Path::new("dir/sign.png")));
        assert!(!has_supported_extension(Path::new("sign.gif")));
        assert!(!has_supported_extension(Path::new("sign")));
    }

    #[test]
    fn test_prediction_text_rounds_score_to_two_decimals() {
        let text = format_prediction("No entry", 93.25678);

        assert_eq!(text, "Predicted Class: No entry\nScore: 93.26");
    }
}
