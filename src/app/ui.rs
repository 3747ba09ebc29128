use super::state::View;
use super::CsvUploader;
use crate::api::FileId;
use crate::upload::{PendingFile, UploadStatus};
use crate::utils::file_size::format_size;
use eframe::egui::{self, Align, Align2, Color32, RichText};

const ACCENT: Color32 = Color32::from_rgb(161, 89, 225);
const SUCCESS: Color32 = Color32::from_rgb(0, 180, 0);
const FAILURE: Color32 = Color32::from_rgb(220, 50, 50);
const MUTED: Color32 = Color32::from_rgb(150, 150, 150);

enum RowAction {
    Download(FileId, String),
    Preview(FileId, String),
}

impl CsvUploader {
    pub fn render(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("navigation").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                for view in [View::Upload, View::FileList] {
                    if ui
                        .selectable_label(self.state.view == view, view.label())
                        .clicked()
                        && self.state.view != view
                    {
                        self.navigate(view);
                    }
                }

                if let Some(banner) = &self.state.banner {
                    ui.with_layout(egui::Layout::right_to_left(Align::Center), |ui| {
                        ui.label(RichText::new(banner).color(MUTED));
                    });
                }
            });
            ui.add_space(4.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| match self.state.view {
                View::Upload => self.render_upload(ui),
                View::FileList => self.render_file_list(ui),
            });
        });

        self.render_toast(ctx);
    }

    fn render_upload(&mut self, ui: &mut egui::Ui) {
        ui.add_space(20.0);
        ui.vertical_centered(|ui| {
            ui.heading("CSV File Upload");
            ui.add_space(5.0);
            ui.label(
                RichText::new("Only .csv files are accepted")
                    .color(ui.visuals().text_color().gamma_multiply(0.7)),
            );
        });
        ui.add_space(20.0);

        let hovering = ui.ctx().input(|i| !i.raw.hovered_files.is_empty());
        let stroke_color = if hovering {
            ACCENT
        } else {
            ui.visuals().widgets.noninteractive.bg_stroke.color
        };

        egui::Frame::group(ui.style())
            .stroke(egui::Stroke::new(1.5, stroke_color))
            .inner_margin(24.0)
            .show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.vertical_centered(|ui| {
                    ui.label("Drag and drop your file(s) here, or");
                    ui.add_space(8.0);
                    ui.horizontal(|ui| {
                        if ui.button("📄 Select Files").clicked() {
                            self.pick_files();
                        }
                        if ui.button("📁 Add Folder").clicked() {
                            self.pick_folder();
                        }
                    });
                });
            });

        ui.add_space(20.0);

        ui.vertical_centered(|ui| {
            let can_upload =
                !self.state.uploads.pending().is_empty() && !self.state.uploads.is_uploading();
            ui.add_enabled_ui(can_upload, |ui| {
                let label = if self.state.uploads.is_uploading() {
                    "⏳ Uploading..."
                } else {
                    "📤 Upload"
                };
                let button = egui::Button::new(label).min_size(egui::vec2(200.0, 40.0));
                if ui.add(button).clicked() {
                    self.start_upload();
                }
            });
        });

        if let Some(error) = self.state.uploads.error() {
            ui.add_space(10.0);
            ui.vertical_centered(|ui| {
                ui.colored_label(FAILURE, error);
            });
        }

        if !self.state.uploads.pending().is_empty() {
            ui.add_space(20.0);
            ui.group(|ui| {
                ui.label(RichText::new("Files to Upload:").strong());
                ui.add_space(6.0);

                if self.state.uploads.is_uploading() {
                    let overall = egui::ProgressBar::new(self.state.overall_progress())
                        .show_percentage()
                        .fill(ACCENT);
                    ui.add(overall);
                    ui.label(self.state.status_text());
                    ui.add_space(6.0);
                }

                for file in self.state.uploads.pending() {
                    render_pending_row(ui, file);
                    ui.add_space(4.0);
                }
            });
        } else if !self.state.uploads.last_batch().is_empty() {
            ui.add_space(20.0);
            self.render_details(ui);
        }
    }

    fn render_details(&mut self, ui: &mut egui::Ui) {
        let label = if self.state.show_details {
            "Hide Details"
        } else {
            "Show Details"
        };
        if ui.button(label).clicked() {
            self.state.show_details = !self.state.show_details;
        }

        if self.state.show_details {
            egui::ScrollArea::vertical()
                .id_source("last_batch_details")
                .max_height(200.0)
                .show(ui, |ui| {
                    egui::Frame::none()
                        .fill(ui.style().visuals.extreme_bg_color)
                        .inner_margin(8.0)
                        .show(ui, |ui| {
                            for file in self.state.uploads.last_batch() {
                                render_pending_row(ui, file);
                                ui.add_space(4.0);
                            }
                        });
                });
        }
    }

    fn render_file_list(&mut self, ui: &mut egui::Ui) {
        ui.add_space(20.0);
        ui.horizontal(|ui| {
            ui.heading("Uploaded Files");
            if ui.button("🔄 Refresh").clicked() {
                self.refresh_files();
            }
            if self.state.files.is_loading() {
                ui.spinner();
            }
        });
        ui.add_space(10.0);

        if let Some(error) = &self.state.save_error {
            ui.colored_label(FAILURE, error);
            ui.add_space(6.0);
        }

        if self.state.files.records().is_empty() && !self.state.files.is_loading() {
            ui.label(RichText::new("No files uploaded yet").color(MUTED));
            return;
        }

        let mut actions = Vec::new();
        for record in self.state.files.records() {
            ui.group(|ui| {
                ui.set_width(ui.available_width());
                ui.horizontal(|ui| {
                    ui.label(&record.filename);
                    ui.with_layout(egui::Layout::right_to_left(Align::Center), |ui| {
                        if ui.button("Preview").clicked() {
                            actions.push(RowAction::Preview(
                                record.id.clone(),
                                record.filename.clone(),
                            ));
                        }
                        if ui.button("Download").clicked() {
                            actions.push(RowAction::Download(
                                record.id.clone(),
                                record.filename.clone(),
                            ));
                        }
                    });
                });

                if let Some(lines) = self.state.previews.cache().get(&record.filename) {
                    egui::Frame::none()
                        .fill(ui.style().visuals.extreme_bg_color)
                        .inner_margin(8.0)
                        .show(ui, |ui| {
                            ui.set_width(ui.available_width());
                            if lines.is_empty() {
                                ui.label(RichText::new("(empty file)").color(MUTED));
                            }
                            for line in lines {
                                ui.label(RichText::new(line).monospace());
                            }
                        });
                }
            });
            ui.add_space(4.0);
        }

        for action in actions {
            match action {
                RowAction::Download(id, filename) => {
                    self.state
                        .files
                        .download(&self.client, self.runtime.handle(), id, filename);
                }
                RowAction::Preview(id, filename) => {
                    self.state.previews.fetch_preview(
                        &self.client,
                        self.runtime.handle(),
                        id,
                        filename,
                    );
                }
            }
        }
    }

    fn render_toast(&self, ctx: &egui::Context) {
        let Some(toast) = &self.state.toast else {
            return;
        };

        egui::Area::new("upload_toast")
            .anchor(Align2::CENTER_BOTTOM, egui::vec2(0.0, -24.0))
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style())
                    .fill(SUCCESS.gamma_multiply(0.9))
                    .show(ui, |ui| {
                        ui.label(RichText::new(toast.message()).color(Color32::WHITE).strong());
                    });
            });
    }
}

fn render_pending_row(ui: &mut egui::Ui, file: &PendingFile) {
    ui.horizontal(|ui| {
        let (icon, color) = match &file.status {
            UploadStatus::Pending => ("⏸", MUTED),
            UploadStatus::Uploading => ("⏳", MUTED),
            UploadStatus::Done => ("✅", SUCCESS),
            UploadStatus::Failed(_) => ("❌", FAILURE),
        };
        ui.label(icon);
        ui.colored_label(color, file.name());
        if let Some(size) = file.file.size {
            ui.label(RichText::new(format_size(size)).color(MUTED));
        }
    });

    if file.status != UploadStatus::Pending {
        let bar = egui::ProgressBar::new(f32::from(file.progress) / 100.0)
            .show_percentage()
            .fill(ACCENT);
        ui.add(bar);
    }

    if let UploadStatus::Failed(reason) = &file.status {
        ui.colored_label(FAILURE, format!("{} - {}", file.name(), reason));
    }
}
