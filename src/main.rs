#[cfg(feature = "gui")]
use eframe::egui;

#[cfg(feature = "gui")]
use chordgrid::{Config, MidiOutputDevice, Sequencer, SynthOutput, ToggleOutcome};

#[cfg(feature = "gui")]
use std::path::PathBuf;

#[cfg(feature = "gui")]
use std::time::{Duration, Instant};

#[cfg(feature = "gui")]
fn main() -> Result<(), eframe::Error> {
    init_logging();

    let config_path: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("chordgrid.toml"));
    let config = match Config::load_or_default(&config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };
    let app = match HarmonyApp::new(config) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([720.0, 860.0])
            .with_title("Chordgrid"),
        ..Default::default()
    };

    eframe::run_native("Chordgrid", options, Box::new(|_cc| Ok(Box::new(app))))
}

#[cfg(not(feature = "gui"))]
fn main() {
    eprintln!("This binary requires the 'gui' feature to be enabled");
    std::process::exit(1);
}

#[cfg(feature = "gui")]
fn init_logging() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[cfg(feature = "gui")]
type Output = (SynthOutput, MidiOutputDevice);

#[cfg(feature = "gui")]
struct HarmonyApp {
    sequencer: Sequencer<Output>,
    session_length: Option<Duration>,
    session_deadline: Option<Instant>,
    session_over: bool,

    // UI state
    available_midi_ports: Vec<String>,
    selected_port: Option<usize>,
    status: Option<String>,
}

#[cfg(feature = "gui")]
impl HarmonyApp {
    fn new(config: Config) -> chordgrid::Result<Self> {
        let output = (SynthOutput::new(), MidiOutputDevice::new());
        let sequencer = Sequencer::new(&config, output)?;
        let session_length = config.session_duration();

        Ok(Self {
            sequencer,
            session_length,
            session_deadline: session_length.map(|d| Instant::now() + d),
            session_over: false,
            available_midi_ports: MidiOutputDevice::available_ports(),
            selected_port: None,
            status: None,
        })
    }

    fn update_session(&mut self, now: Instant) {
        if self.session_over {
            return;
        }
        if let Some(deadline) = self.session_deadline {
            if now >= deadline {
                self.sequencer.session_expired();
                self.session_over = true;
                self.status = Some("Time's up!".to_string());
            }
        }
    }

    fn new_session(&mut self) {
        self.sequencer.stop();
        self.sequencer.clear();
        self.session_deadline = self.session_length.map(|d| Instant::now() + d);
        self.session_over = false;
        self.status = None;
    }

    fn remaining(&self, now: Instant) -> Option<Duration> {
        self.session_deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    fn handle_toggle(&mut self, bar: usize, note: u8) {
        let name = self.sequencer.grid().range().name_of(note);
        if let ToggleOutcome::Locked(_) = self.sequencer.toggle_note(bar, note) {
            self.status = Some(format!("{} is locked in bar {}", name, bar + 1));
        }
    }
}

#[cfg(feature = "gui")]
impl eframe::App for HarmonyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.sequencer.poll_at(now);
        self.update_session(now);
        ctx.request_repaint_after(Duration::from_millis(16));
        let remaining = self.remaining(now);

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Chordgrid");
            ui.label("Pick notes in each bar to build a chord progression.");
            ui.add_space(10.0);

            // MIDI Port Selection
            let mut selected_port_changed = None;
            ui.horizontal(|ui| {
                ui.label("MIDI Output:");
                if self.available_midi_ports.is_empty() {
                    ui.label("No MIDI ports available");
                } else {
                    egui::ComboBox::from_label("")
                        .selected_text(
                            self.selected_port
                                .map(|i| self.available_midi_ports[i].as_str())
                                .unwrap_or("Select port..."),
                        )
                        .show_ui(ui, |ui| {
                            if ui.selectable_label(self.selected_port.is_none(), "None").clicked() {
                                selected_port_changed = Some(None);
                            }
                            for (i, port_name) in self.available_midi_ports.iter().enumerate() {
                                if ui
                                    .selectable_label(self.selected_port == Some(i), port_name)
                                    .clicked()
                                {
                                    selected_port_changed = Some(Some(i));
                                }
                            }
                        });
                }
            });

            match selected_port_changed {
                Some(Some(port_idx)) => match self.sequencer.sink_mut().1.connect(port_idx) {
                    Ok(()) => self.selected_port = Some(port_idx),
                    Err(e) => self.status = Some(e.to_string()),
                },
                Some(None) => {
                    self.sequencer.sink_mut().1.disconnect();
                    self.selected_port = None;
                }
                None => {}
            }

            ui.add_space(10.0);

            // Transport controls
            ui.horizontal(|ui| {
                let is_playing = self.sequencer.is_playing();

                if is_playing {
                    if ui.button("⏸ Stop").clicked() {
                        self.sequencer.stop();
                    }
                } else if ui
                    .add_enabled(!self.session_over, egui::Button::new("▶ Play"))
                    .clicked()
                {
                    self.sequencer.start_at(now);
                }

                if ui.button("Clear").clicked() {
                    self.sequencer.clear();
                }

                ui.add_space(20.0);

                ui.label("BPM:");
                let mut bpm = self.sequencer.tempo();
                if ui
                    .add_enabled(
                        !is_playing,
                        egui::Slider::new(&mut bpm, 40.0..=240.0).step_by(1.0),
                    )
                    .changed()
                {
                    self.sequencer.set_tempo(bpm);
                }

                if let Some(remaining) = remaining {
                    ui.add_space(20.0);
                    let secs = remaining.as_secs();
                    ui.label(format!("⏱ {}:{:02}", secs / 60, secs % 60));
                }
            });

            if self.session_over && ui.button("New session").clicked() {
                self.new_session();
            }

            ui.add_space(10.0);

            // Chord labels
            let bars = self.sequencer.bars();
            let cursor = self.sequencer.cursor();
            ui.horizontal(|ui| {
                ui.add_sized([50.0, 20.0], egui::Label::new(""));
                for bar in 0..bars {
                    let label = self
                        .sequencer
                        .chord_label(bar)
                        .map(|l| l.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    let text = if cursor == Some(bar) {
                        egui::RichText::new(label).strong().color(egui::Color32::LIGHT_GREEN)
                    } else {
                        egui::RichText::new(label)
                    };
                    ui.add_sized([140.0, 20.0], egui::Label::new(text));
                }
            });

            // Note grid, highest pitch on top
            let range = self.sequencer.grid().range();
            let mut clicked = None;
            egui::ScrollArea::vertical().show(ui, |ui| {
                for note in (0..range.total_notes() as u8).rev() {
                    ui.horizontal(|ui| {
                        ui.add_sized([50.0, 20.0], egui::Label::new(range.name_of(note).to_string()));
                        for bar in 0..bars {
                            let grid = self.sequencer.grid();
                            let active = grid.active_notes(bar).contains(note);
                            let fill = if grid.is_locked(bar, note) {
                                egui::Color32::from_rgb(200, 120, 40)
                            } else if active && cursor == Some(bar) {
                                egui::Color32::from_rgb(100, 200, 100)
                            } else if active {
                                egui::Color32::from_rgb(60, 60, 200)
                            } else if cursor == Some(bar) {
                                egui::Color32::from_rgb(50, 60, 50)
                            } else {
                                egui::Color32::from_rgb(40, 40, 40)
                            };

                            let button = egui::Button::new("")
                                .min_size(egui::vec2(140.0, 20.0))
                                .fill(fill);
                            if ui.add(button).clicked() {
                                clicked = Some((bar, note));
                            }
                        }
                    });
                }
            });
            if let Some((bar, note)) = clicked {
                self.handle_toggle(bar, note);
            }

            // Info
            ui.separator();
            ui.horizontal(|ui| {
                let progression = self.sequencer.progression();
                ui.label(progression.as_str());
                if ui.button("Copy").clicked() {
                    ui.output_mut(|o| o.copied_text = progression);
                }
            });
            if let Some(status) = &self.status {
                ui.colored_label(egui::Color32::YELLOW, status.as_str());
            }
            if !self.sequencer.sink().1.is_connected() {
                ui.colored_label(
                    egui::Color32::GRAY,
                    "No MIDI output connected - audio playback only",
                );
            }
        });
    }
}
