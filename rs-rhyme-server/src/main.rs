use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use actix_cors::Cors;
use actix_web::{get, middleware, put, web, App, HttpResponse, HttpServer, Responder};
use clap::Parser;
use log::info;
use serde::{Deserialize, Serialize};

use rs_rhyme_core::io::{has_model, normalize_folder};
use rs_rhyme_core::model::bert::load_model;
use rs_rhyme_core::model::generator::DefaultRng;
use rs_rhyme_core::model::session::{ITER_FACTOR, N_RHYMES};
use rs_rhyme_core::model::{MaskTokenizer, MaskedLanguageModel, RhymeGenerator, RhymeSession, SessionConfig};
use rs_rhyme_core::rhyme::{query_rhyme_words, DatamuseClient, RhymeSource, DATAMUSE_URL};
use rs_rhyme_core::{Language, RhymeError};

/// Browser front-end, served on `/`.
const INDEX_HTML: &str = include_str!("../static/index.html");

/// Serve rhyming second lines written by a masked language model.
#[derive(Parser, Debug)]
#[command(name = "rs-rhyme-server", version, about)]
struct Args {
	/// Address to bind
	#[arg(long, default_value = "127.0.0.1")]
	host: String,

	/// Port to listen on
	#[arg(short, long, default_value_t = 5000)]
	port: u16,

	/// Directory holding one sub-directory per language model
	#[arg(long, env = "RHYME_DATA_DIR", default_value = "./data")]
	data_dir: String,

	/// Base URL of the Datamuse API
	#[arg(long, env = "DATAMUSE_URL", default_value = DATAMUSE_URL)]
	datamuse_url: String,

	/// Maximum number of rhymes per session
	#[arg(long, default_value_t = N_RHYMES)]
	n_rhymes: usize,

	/// Mutations per word of the first line
	#[arg(long, default_value_t = ITER_FACTOR)]
	iter_factor: usize,
}

type SharedModel = Arc<dyn MaskedLanguageModel + Send + Sync>;
type SharedTokenizer = Arc<dyn MaskTokenizer + Send + Sync>;
type Loaded = (SharedModel, SharedTokenizer);
type Session = RhymeSession<SharedModel, SharedTokenizer, DefaultRng>;

/// Loads the model and tokenizer of a language. Runs on the blocking pool.
type ModelLoader = dyn Fn(Language) -> rs_rhyme_core::Result<Loaded> + Send + Sync;

/// Struct representing query parameters for `/v1/rhyme_words` and `/v1/start`
#[derive(Deserialize)]
struct RhymeQuery {
	query: Option<String>,
	language: Option<String>,
}

impl RhymeQuery {
	fn language(&self) -> Result<Language, Failure> {
		match &self.language {
			None => Ok(Language::default()),
			Some(s) => s.parse().map_err(Failure::BadRequest),
		}
	}
}

/// Body of a successful `/v1/start`.
#[derive(Serialize)]
struct Started {
	query: String,
	language: Language,
	rhyme_words: Vec<String>,
	max_iterations: usize,
}

#[derive(Serialize)]
struct LanguageInfo {
	name: Language,
	installed: bool,
}

/// State shared by all workers.
///
/// Settings and the rhyme source are read-only. The model cache and the
/// running session each sit behind their own lock, which is only held to
/// read, insert, swap or step; lookups and model loads run unlocked.
struct AppState {
	data_dir: PathBuf,
	config: SessionConfig,
	rhymes: Box<dyn RhymeSource + Send + Sync>,
	loader: Box<ModelLoader>,
	models: Mutex<HashMap<Language, Loaded>>,
	session: Mutex<Option<Session>>,
}

impl AppState {
	fn new(args: &Args, rhymes: Box<dyn RhymeSource + Send + Sync>, loader: Box<ModelLoader>) -> Self {
		Self {
			data_dir: normalize_folder(&args.data_dir),
			config: SessionConfig {
				n_rhymes: args.n_rhymes,
				iter_factor: args.iter_factor,
				..SessionConfig::default()
			},
			rhymes,
			loader,
			models: Mutex::new(HashMap::new()),
			session: Mutex::new(None),
		}
	}

	/// Model and tokenizer for `language`, loaded once per process.
	///
	/// Two concurrent first starts may both load; the first insert wins.
	fn model(&self, language: Language) -> Result<Loaded, Failure> {
		if let Some(loaded) = lock(&self.models)?.get(&language) {
			return Ok(loaded.clone());
		}

		info!("Loading {language} model");
		let loaded = (self.loader)(language)?;
		Ok(lock(&self.models)?.entry(language).or_insert(loaded).clone())
	}
}

/// Builds the BERT loader reading models under `data_dir`.
fn bert_loader(data_dir: PathBuf) -> Box<ModelLoader> {
	Box::new(move |language: Language| {
		let (model, tokenizer) = load_model(language.model_dir(&data_dir))?;
		Ok((Arc::new(model) as SharedModel, Arc::new(tokenizer) as SharedTokenizer))
	})
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, Failure> {
	mutex.lock().map_err(|_| Failure::Internal("Lock poisoned".to_owned()))
}

/// Error side of the blocking handlers, turned into a response on the async side.
#[derive(Debug)]
enum Failure {
	BadRequest(String),
	NotFound(String),
	Internal(String),
}

impl From<RhymeError> for Failure {
	fn from(e: RhymeError) -> Self {
		match e {
			RhymeError::NoRhymes => Failure::NotFound(e.to_string()),
			RhymeError::NotStarted | RhymeError::EmptyQuery | RhymeError::InvalidInput(_) => {
				Failure::BadRequest(e.to_string())
			}
			_ => Failure::Internal(e.to_string()),
		}
	}
}

impl Failure {
	fn into_response(self) -> HttpResponse {
		match self {
			Failure::BadRequest(body) => HttpResponse::BadRequest().body(body),
			Failure::NotFound(body) => HttpResponse::NotFound().body(body),
			Failure::Internal(body) => HttpResponse::InternalServerError().body(body),
		}
	}
}

/// Runs rhyme lookups, model loads and inference on actix's blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, HttpResponse>
where
	T: Send + 'static,
	F: FnOnce() -> Result<T, Failure> + Send + 'static,
{
	match web::block(f).await {
		Ok(Ok(value)) => Ok(value),
		Ok(Err(failure)) => Err(failure.into_response()),
		Err(_) => Err(HttpResponse::InternalServerError().body("Worker failed")),
	}
}

#[get("/")]
async fn index() -> impl Responder {
	HttpResponse::Ok()
		.content_type("text/html; charset=utf-8")
		.body(INDEX_HTML)
}

/// HTTP GET endpoint `/v1/languages`
///
/// Lists every language and whether its model directory is present.
#[get("/v1/languages")]
async fn get_languages(state: web::Data<AppState>) -> impl Responder {
	let languages: Vec<LanguageInfo> = Language::ALL
		.iter()
		.map(|&name| LanguageInfo { name, installed: has_model(name.model_dir(&state.data_dir)) })
		.collect();
	HttpResponse::Ok().json(languages)
}

/// HTTP GET endpoint `/v1/rhyme_words`
///
/// Returns the rhyme words for the last word of `query`, one per line.
#[get("/v1/rhyme_words")]
async fn get_rhyme_words(state: web::Data<AppState>, query: web::Query<RhymeQuery>) -> impl Responder {
	if let Err(failure) = query.language() {
		return failure.into_response();
	}
	let raw = query.query.clone().unwrap_or_default();

	let result = blocking(move || {
		let query = state.config.prepare_query(&raw);
		Ok(query_rhyme_words(&*state.rhymes, &query, Some(state.config.n_rhymes))?)
	})
	.await;

	match result {
		Ok(words) => HttpResponse::Ok().body(words.join("\n")),
		Err(response) => response,
	}
}

/// HTTP PUT endpoint `/v1/start`
///
/// Sanitizes the query, fetches rhyme words, loads (or reuses) the language
/// model and replaces the running session.
#[put("/v1/start")]
async fn put_start(state: web::Data<AppState>, query: web::Query<RhymeQuery>) -> impl Responder {
	let language = match query.language() {
		Ok(language) => language,
		Err(failure) => return failure.into_response(),
	};
	let raw = query.query.clone().unwrap_or_default();

	let result = blocking(move || {
		let config = SessionConfig { language, ..state.config.clone() };
		let query = config.prepare_query(&raw);

		let rhyme_words = query_rhyme_words(&*state.rhymes, &query, Some(config.n_rhymes))?;
		if rhyme_words.is_empty() {
			return Err(RhymeError::NoRhymes.into());
		}

		let (model, tokenizer) = state.model(language)?;
		let generator = RhymeGenerator::new(model, tokenizer)?;
		let session = RhymeSession::start(generator, &config, &query, &rhyme_words)?;

		let started = Started {
			query,
			language,
			rhyme_words: session.rhyme_words().to_vec(),
			max_iterations: session.max_iterations(),
		};
		*lock(&state.session)? = Some(session);
		Ok(started)
	})
	.await;

	match result {
		Ok(started) => HttpResponse::Ok().json(started),
		Err(response) => response,
	}
}

/// HTTP GET endpoint `/v1/mutate`
///
/// Runs one mutation of the current session. `204 No Content` once all
/// iterations are done.
#[get("/v1/mutate")]
async fn get_mutate(state: web::Data<AppState>) -> impl Responder {
	let result = blocking(move || {
		let mut session = lock(&state.session)?;
		let session = session.as_mut().ok_or(RhymeError::NotStarted)?;
		Ok(session.step()?)
	})
	.await;

	match result {
		Ok(Some(step)) => HttpResponse::Ok().json(step),
		Ok(None) => HttpResponse::NoContent().finish(),
		Err(response) => response,
	}
}

fn routes(cfg: &mut web::ServiceConfig) {
	cfg.service(index)
		.service(get_languages)
		.service(get_rhyme_words)
		.service(put_start)
		.service(get_mutate);
}

/// Main entry point for the server.
///
/// The Datamuse client is built before the async runtime starts. Models are
/// loaded lazily on the first `/v1/start` for a language and kept for the life
/// of the process. Only one session runs at a time.
fn main() -> std::io::Result<()> {
	env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
	let args = Args::parse();

	let datamuse = DatamuseClient::new(&args.datamuse_url).map_err(std::io::Error::other)?;
	let loader = bert_loader(normalize_folder(&args.data_dir));
	let state = web::Data::new(AppState::new(&args, Box::new(datamuse), loader));

	actix_web::rt::System::new().block_on(async move {
		info!("Listening on http://{}:{}", args.host, args.port);
		HttpServer::new(move || {
			App::new()
				.wrap(middleware::Logger::default())
				.wrap(Cors::permissive())
				.app_data(state.clone())
				.configure(routes)
		})
			.bind((args.host.as_str(), args.port))?
			.run()
			.await
	})
}

#[cfg(test)]
mod tests {
	use actix_web::http::StatusCode;
	use actix_web::test;
	use rs_rhyme_core::model::Step;

	use super::*;

	const VOCAB: [&str; 10] = ["[PAD]", "[MASK]", ",", ".", "i", "like", "cheese", "peace", "sun", "moon"];
	const SUN: usize = 8;

	/// Word-level tokenizer over `VOCAB`.
	struct WordTokenizer;

	impl MaskTokenizer for WordTokenizer {
		fn encode(&self, text: &str) -> rs_rhyme_core::Result<Vec<u32>> {
			let spaced = text.replace(',', " , ").replace('.', " . ");
			spaced
				.split_whitespace()
				.map(|word| {
					VOCAB
						.iter()
						.position(|t| *t == word.to_lowercase())
						.map(|id| id as u32)
						.ok_or_else(|| RhymeError::Tokenizer(format!("unknown word {word}")))
				})
				.collect()
		}

		fn decode(&self, ids: &[u32]) -> rs_rhyme_core::Result<String> {
			let words: Vec<&str> = ids.iter().filter(|&&id| id > 1).map(|&id| VOCAB[id as usize]).collect();
			Ok(words.join(" ").replace(" ,", ",").replace(" .", "."))
		}

		fn mask_token_id(&self) -> u32 {
			1
		}

		fn pad_token_id(&self) -> u32 {
			0
		}

		fn vocab(&self) -> Vec<(String, u32)> {
			VOCAB.iter().enumerate().map(|(id, t)| (t.to_string(), id as u32)).collect()
		}

		fn vocab_size(&self) -> usize {
			VOCAB.len()
		}
	}

	/// Model that always wants "sun".
	struct SunModel;

	impl MaskedLanguageModel for SunModel {
		fn predict(&self, batch: &[Vec<u32>]) -> rs_rhyme_core::Result<Vec<Vec<Vec<f32>>>> {
			let mut logits = vec![0.0; VOCAB.len()];
			logits[SUN] = 30.0;
			Ok(batch.iter().map(|row| vec![logits.clone(); row.len()]).collect())
		}
	}

	/// Rhymes "cheese" with "peace" and "moon", anything else with nothing.
	struct FixedRhymes;

	impl RhymeSource for FixedRhymes {
		fn rhyme_words(&self, word: &str, n_rhymes: Option<usize>) -> rs_rhyme_core::Result<Vec<String>> {
			let words = match word {
				"cheese" => vec!["peace".to_owned(), "moon".to_owned()],
				_ => Vec::new(),
			};
			Ok(words.into_iter().take(n_rhymes.unwrap_or(usize::MAX)).collect())
		}
	}

	fn state(extra_args: &[&str]) -> web::Data<AppState> {
		let mut argv = vec!["rs-rhyme-server", "--data-dir", "./no-such-data-dir"];
		argv.extend_from_slice(extra_args);
		let args = Args::parse_from(argv);
		let loader: Box<ModelLoader> =
			Box::new(|_| Ok((Arc::new(SunModel) as SharedModel, Arc::new(WordTokenizer) as SharedTokenizer)));
		web::Data::new(AppState::new(&args, Box::new(FixedRhymes), loader))
	}

	#[actix_web::test]
	async fn serves_browser_page() {
		let app = test::init_service(App::new().app_data(state(&[])).configure(routes)).await;
		let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
		assert_eq!(resp.status(), StatusCode::OK);
		let body = test::read_body(resp).await;
		let page = std::str::from_utf8(&body).unwrap();
		assert!(page.contains("/v1/mutate"));
		// The default radio is the first installed language, not the first listed
		assert!(page.contains("languages.find(l => l.installed)"));
	}

	#[actix_web::test]
	async fn mutate_without_session_is_bad_request() {
		let app = test::init_service(App::new().app_data(state(&[])).configure(routes)).await;
		let resp = test::call_service(&app, test::TestRequest::get().uri("/v1/mutate").to_request()).await;
		assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
		let body = test::read_body(resp).await;
		assert_eq!(body, "Generator was not started");
	}

	#[actix_web::test]
	async fn start_rejects_unknown_language() {
		let app = test::init_service(App::new().app_data(state(&[])).configure(routes)).await;
		let req = test::TestRequest::put().uri("/v1/start?query=hello&language=klingon").to_request();
		let resp = test::call_service(&app, req).await;
		assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
	}

	#[actix_web::test]
	async fn rhyme_words_rejects_unknown_language() {
		let app = test::init_service(App::new().app_data(state(&[])).configure(routes)).await;
		let req = test::TestRequest::get().uri("/v1/rhyme_words?query=cheese&language=klingon").to_request();
		let resp = test::call_service(&app, req).await;
		assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
	}

	#[actix_web::test]
	async fn rhyme_words_are_newline_separated() {
		let app = test::init_service(App::new().app_data(state(&[])).configure(routes)).await;
		let req = test::TestRequest::get().uri("/v1/rhyme_words?query=I%20like%20cheese!").to_request();
		let body = test::call_and_read_body(&app, req).await;
		assert_eq!(body, "peace\nmoon");
	}

	#[actix_web::test]
	async fn lists_languages_with_install_state() {
		let app = test::init_service(App::new().app_data(state(&[])).configure(routes)).await;
		let req = test::TestRequest::get().uri("/v1/languages").to_request();
		let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
		assert_eq!(
			body,
			serde_json::json!([
				{ "name": "english", "installed": false },
				{ "name": "dutch", "installed": false }
			])
		);
	}

	#[actix_web::test]
	async fn start_without_rhymes_is_not_found() {
		let app = test::init_service(App::new().app_data(state(&[])).configure(routes)).await;
		let req = test::TestRequest::put().uri("/v1/start?query=i%20like%20sun").to_request();
		let resp = test::call_service(&app, req).await;
		assert_eq!(resp.status(), StatusCode::NOT_FOUND);
		let body = test::read_body(resp).await;
		assert_eq!(body, "No rhyme words found");
	}

	#[actix_web::test]
	async fn start_then_mutate_until_done() {
		let app = test::init_service(
			App::new().app_data(state(&["--n-rhymes", "1", "--iter-factor", "2"])).configure(routes),
		)
		.await;

		let req = test::TestRequest::put().uri("/v1/start?query=i%20like%20cheese&language=english").to_request();
		let started: serde_json::Value = test::call_and_read_body_json(&app, req).await;
		assert_eq!(
			started,
			serde_json::json!({
				"query": "i like cheese",
				"language": "english",
				"rhyme_words": ["peace"],
				"max_iterations": 6
			})
		);

		for i in 0..6 {
			let req = test::TestRequest::get().uri("/v1/mutate").to_request();
			let step: Step = test::call_and_read_body_json(&app, req).await;
			assert_eq!(step.iteration, i);
			assert_eq!(step.lines.len(), 1);
			assert_eq!(step.lines[0].rhyme_word, "peace");
		}

		let req = test::TestRequest::get().uri("/v1/mutate").to_request();
		let resp = test::call_service(&app, req).await;
		assert_eq!(resp.status(), StatusCode::NO_CONTENT);
	}

	#[actix_web::test]
	async fn model_is_loaded_once_per_language() {
		let state = state(&[]);
		let app = test::init_service(App::new().app_data(state.clone()).configure(routes)).await;

		for _ in 0..2 {
			let req = test::TestRequest::put().uri("/v1/start?query=i%20like%20cheese").to_request();
			let resp = test::call_service(&app, req).await;
			assert_eq!(resp.status(), StatusCode::OK);
		}
		assert_eq!(state.models.lock().unwrap().len(), 1);
	}

	#[actix_web::test]
	async fn languages_answer_while_a_session_is_locked() {
		let state = state(&[]);
		let app = test::init_service(App::new().app_data(state.clone()).configure(routes)).await;

		let _held = state.session.lock().unwrap();
		let req = test::TestRequest::get().uri("/v1/languages").to_request();
		let resp = test::call_service(&app, req).await;
		assert_eq!(resp.status(), StatusCode::OK);
	}
}
