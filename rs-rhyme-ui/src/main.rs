use std::time::Duration;

use clap::Parser;
use eframe::{egui, Frame};
use egui::text::LayoutJob;
use egui::{Color32, Context, TextFormat};

use reqwest::blocking::Client;
use reqwest::{Result, StatusCode};
use serde::Deserialize;

use rs_rhyme_core::model::session::{Line, Step, DEFAULT_QUERY};
use rs_rhyme_core::Language;

/// Same yellow as the browser page.
const HIGHLIGHT: Color32 = Color32::from_rgb(0xee, 0xfa, 0x66);

/// Desktop client for rs-rhyme-server.
#[derive(Parser, Debug)]
#[command(name = "rs-rhyme-ui", version, about)]
struct Args {
    /// Base URL of the rhyme server
    #[arg(long, env = "RHYME_SERVER", default_value = "http://127.0.0.1:5000")]
    server: String,
}

/// Entry of `/v1/languages`.
#[derive(Deserialize, Debug)]
struct LanguageInfo {
    name: Language,
    installed: bool,
}

/// Body of `/v1/start`.
#[derive(Deserialize, Debug)]
struct Started {
    query: String,
    rhyme_words: Vec<String>,
}

/// REST context holding a reusable blocking HTTP client.
struct RESTContext {
    client: Client,
    base_url: String,
}

impl RESTContext {
    /// Creates a new REST context with a timeout.
    fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::new(60, 0))
            .build()?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    /// Sends a GET request to `/v1/languages`.
    fn get_languages(&self) -> Result<Vec<LanguageInfo>> {
        self.client
            .get(format!("{}/v1/languages", self.base_url))
            .send()?
            .error_for_status()?
            .json()
    }

    /// Sends a PUT request to `/v1/start` with query parameters.
    ///
    /// The first start of a language loads its model, hence the long timeout.
    fn put_start(&self, query: &str, language: Language) -> std::result::Result<Started, String> {
        let response = self.client
            .put(format!("{}/v1/start", self.base_url))
            .query(&[("query", query), ("language", language.as_str())])
            .timeout(Duration::new(600, 0))
            .send()
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(response.text().unwrap_or_else(|e| e.to_string()));
        }
        response.json().map_err(|e| e.to_string())
    }

    /// Sends a GET request to `/v1/mutate`. `None` once the session is over.
    fn get_mutate(&self) -> Result<Option<Step>> {
        let response = self.client
            .get(format!("{}/v1/mutate", self.base_url))
            .send()?
            .error_for_status()?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Ok(Some(response.json()?))
    }
}

/// Global UI state (MUST persist between frames in egui).
struct RhymeUI {
    rest: RESTContext,
    query: String,
    language: Language,
    languages: Vec<LanguageInfo>,

    running: bool,
    seed_line: Option<String>,
    rhyme_words: Vec<String>,
    step: Option<Step>,
    status: Option<String>,
}

impl RhymeUI {
    /// Initializes the UI with sane defaults.
    fn new(server: &str) -> Result<Self> {
        let mut ui = Self {
            rest: RESTContext::new(server)?,
            query: DEFAULT_QUERY.to_owned(),
            language: Language::default(),
            languages: Vec::new(),

            running: false,
            seed_line: None,
            rhyme_words: Vec::new(),
            step: None,
            status: None,
        };
        ui.get_languages();
        Ok(ui)
    }

    /// Performs the get languages request.
    fn get_languages(&mut self) {
        match self.rest.get_languages() {
            Ok(languages) => self.languages = languages,
            Err(e) => self.status = Some(format!("Error: {e}")),
        }
    }

    /// Performs the start request.
    fn put_start(&mut self) {
        self.step = None;
        self.seed_line = None;
        match self.rest.put_start(&self.query, self.language) {
            Ok(started) => {
                self.seed_line = Some(format!("{},", started.query));
                self.status = Some(format!("Rhyming with {}", started.rhyme_words.join(", ")));
                self.rhyme_words = started.rhyme_words;
                self.running = true;
            }
            Err(e) => {
                self.status = Some(format!("Error: {e}"));
                self.running = false;
            }
        }
    }

    /// Performs one mutate request.
    fn get_mutate(&mut self) {
        match self.rest.get_mutate() {
            Ok(Some(step)) => self.step = Some(step),
            Ok(None) => {
                self.running = false;
                self.status = Some("Done!".to_owned());
            }
            Err(e) => {
                self.running = false;
                self.status = Some(format!("Error: {e}"));
            }
        }
    }
}

/// Lays out a line with its changed words on a yellow background.
fn highlighted(line: &Line) -> LayoutJob {
    let words: Vec<&str> = line.text.split_whitespace().collect();
    let (start, end) = line.changed.unwrap_or((words.len(), words.len()));

    let mut job = LayoutJob::default();
    for (i, word) in words.iter().enumerate() {
        let mut format = TextFormat::default();
        if (start..end).contains(&i) {
            format.background = HIGHLIGHT;
            format.color = Color32::BLACK;
        }
        job.append(word, 0.0, format);
        if i + 1 < words.len() {
            job.append(" ", 0.0, TextFormat::default());
        }
    }
    job
}

impl eframe::App for RhymeUI {
    /// UI update loop (called every frame).
    fn update(&mut self, ctx: &Context, _: &mut Frame) {
        if self.running {
            self.get_mutate();
            ctx.request_repaint();
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("rs-rhyme");
            ui.label("Write your first line and press ENTER to rhyme:");

            let input = ui.add_sized(
                [ui.available_width(), 24.0],
                egui::TextEdit::singleline(&mut self.query),
            );
            let submitted = input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

            ui.horizontal(|ui| {
                ui.label("Language");
                for info in &self.languages {
                    ui.add_enabled_ui(info.installed, |ui| {
                        ui.radio_value(&mut self.language, info.name, info.name.as_str());
                    });
                }
            });

            let clicked = ui
                .add_enabled(!self.running, egui::Button::new("Rhyme"))
                .clicked();
            if (submitted || clicked) && !self.running {
                self.put_start();
            }

            ui.separator();
            ui.heading("My Suggestions:");

            let progress = self.step.as_ref().map_or(0.0, |step| step.progress);
            ui.add(egui::ProgressBar::new(progress).show_percentage());

            if let Some(status) = &self.status {
                ui.label(status);
            }

            if let Some(seed_line) = &self.seed_line {
                ui.strong(seed_line);
            }
            if let Some(step) = &self.step {
                for line in &step.lines {
                    ui.horizontal(|ui| {
                        ui.label("•");
                        ui.label(highlighted(line));
                    });
                }
            } else if self.running {
                for rhyme_word in &self.rhyme_words {
                    ui.label(format!("• … {rhyme_word}"));
                }
            }
        });
    }
}

/// Application entry point.
fn main() -> eframe::Result {
    env_logger::init();
    let args = Args::parse();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([520.0, 480.0])
            .with_resizable(true),
        ..Default::default()
    };

    eframe::run_native(
        "rs-rhyme",
        options,
        Box::new(move |_| Ok(Box::new(RhymeUI::new(&args.server)?))),
    )
}
