use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{Context, Result};
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use crate::data_uri::{self, DataUri, SourceImage};
use crate::error;
use crate::gemini::DrawingGenerator;
use crate::preview::Preview;
use crate::prompt;

/// Shown when the model answers without an image.
pub const NO_RENDERING_MESSAGE: &str = "The AI drafting engine failed to produce a rendering.";

/// File name used for exports.
pub const EXPORT_FILE_STEM: &str = "technical-blueprint";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppStatus {
    #[default]
    Idle,
    Uploading,
    Generating,
    Success,
    Error,
}

impl AppStatus {
    pub fn label(&self) -> &'static str {
        match self {
            AppStatus::Idle => "IDLE",
            AppStatus::Uploading => "UPLOADING",
            AppStatus::Generating => "GENERATING",
            AppStatus::Success => "SUCCESS",
            AppStatus::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    EditingContext,
    EditingPath,
}

/// The outcome of one successful generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    /// Drawing as a data URI.
    pub image_url: String,
    /// Source photo as a data URI.
    pub original_image: String,
    pub prompt: String,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
}

/// Editable single-line text with a char-indexed cursor.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    pub text: String,
    pub cursor: usize,
}

impl TextInput {
    fn byte_index(&self, char_idx: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_idx)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }

    fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn insert(&mut self, c: char) {
        let byte_pos = self.byte_index(self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn insert_str(&mut self, s: &str) {
        for c in s.chars().filter(|c| !c.is_control()) {
            self.insert(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = self.byte_index(self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.char_count() {
            let byte_pos = self.byte_index(self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.char_count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.char_count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }
}

type UploadTask = JoinHandle<error::Result<SourceImage>>;
type GenerationTask = JoinHandle<error::Result<Option<String>>>;

/// What was sent with an in-flight generation.
struct Submission {
    original_image: String,
    context: String,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub status: AppStatus,

    // Workspace
    pub selected_image: Option<SourceImage>,
    pub context: TextInput,
    pub result: Option<GenerationResult>,
    pub error: Option<String>,

    // File picker popup
    pub path_input: TextInput,

    /// Transient one-line message (file problems, export location).
    pub notice: Option<String>,
    pub last_export: Option<PathBuf>,
    pub export_dir: PathBuf,

    // Animation state
    pub animation_frame: u8,

    // Previews, decoded once per image
    pub source_preview: Option<Preview>,
    pub result_preview: Option<Preview>,

    generator: Arc<dyn DrawingGenerator>,
    upload_task: Option<(PathBuf, UploadTask)>,
    generation_task: Option<(Submission, GenerationTask)>,
}

impl App {
    pub fn new(generator: Arc<dyn DrawingGenerator>, export_dir: PathBuf) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            status: AppStatus::Idle,
            selected_image: None,
            context: TextInput::default(),
            result: None,
            error: None,
            path_input: TextInput::default(),
            notice: None,
            last_export: None,
            export_dir,
            animation_frame: 0,
            source_preview: None,
            result_preview: None,
            generator,
            upload_task: None,
            generation_task: None,
        }
    }

    pub fn model(&self) -> &str {
        self.generator.model()
    }

    /// Whether the generate trigger is live.
    pub fn can_submit(&self) -> bool {
        self.selected_image.is_some()
            && !matches!(self.status, AppStatus::Generating | AppStatus::Uploading)
    }

    /// The upload screen is shown until something is loaded.
    pub fn is_empty_workspace(&self) -> bool {
        self.selected_image.is_none() && self.result.is_none()
    }

    // File selection

    /// Starts reading `path` in the background. Any in-flight generation
    /// is dropped so the new image cannot be paired with a stale drawing.
    pub fn begin_upload(&mut self, path: PathBuf) {
        self.abort_generation();
        if let Some((_, task)) = self.upload_task.take() {
            task.abort();
        }

        info!(path = %path.display(), "loading source image");
        self.status = AppStatus::Uploading;
        self.notice = None;

        let read_path = path.clone();
        let task = tokio::spawn(async move { data_uri::read_image_file(&read_path).await });
        self.upload_task = Some((path, task));
    }

    pub fn finish_upload(&mut self, image: SourceImage) {
        self.source_preview = DataUri::parse(&image.data_uri)
            .and_then(|uri| uri.decode())
            .ok()
            .and_then(|bytes| Preview::from_bytes(&bytes));
        self.selected_image = Some(image);
        self.status = AppStatus::Idle;
        self.result = None;
        self.result_preview = None;
    }

    fn fail_upload(&mut self, path: &Path, message: String) {
        warn!(path = %path.display(), "could not load image: {message}");
        self.status = AppStatus::Idle;
        self.notice = Some(format!("Could not load {}: {}", path.display(), message));
    }

    // Generation

    /// Starts a generation for the selected image. Returns `false` when
    /// there is no image or the trigger is disabled.
    pub fn submit(&mut self) -> bool {
        let Some(image) = &self.selected_image else {
            return false;
        };
        if matches!(self.status, AppStatus::Generating | AppStatus::Uploading) {
            warn!(status = self.status.label(), "submit ignored, trigger disabled");
            return false;
        }

        let source = image.data_uri.clone();
        let (mime_type, data) = match DataUri::parse(&source) {
            Ok(uri) => (uri.mime_type, uri.data),
            Err(_) => (
                data_uri::DEFAULT_MIME_TYPE.to_string(),
                source.split_once(',').map(|(_, d)| d.to_string()).unwrap_or_default(),
            ),
        };
        let context = self.context.text.clone();
        let submission = Submission {
            original_image: source,
            context: context.clone(),
        };

        self.status = AppStatus::Generating;
        self.error = None;
        self.notice = None;

        info!(model = self.generator.model(), "generating drawing");

        let generator = Arc::clone(&self.generator);
        let task = tokio::spawn(async move {
            generator.generate(&data, &mime_type, &context).await
        });
        self.generation_task = Some((submission, task));
        true
    }

    /// Applies the outcome of a generation of `original_image` with the
    /// `context` that was sent, whatever the input holds by now.
    pub fn complete_generation(
        &mut self,
        original_image: String,
        context: &str,
        outcome: error::Result<Option<String>>,
    ) {
        match outcome {
            Ok(Some(image_url)) => {
                self.result_preview = DataUri::parse(&image_url)
                    .and_then(|uri| uri.decode())
                    .ok()
                    .and_then(|bytes| Preview::from_bytes(&bytes));
                self.result = Some(GenerationResult {
                    image_url,
                    original_image,
                    prompt: prompt::prompt_label(context),
                    timestamp: Utc::now().timestamp_millis(),
                });
                self.error = None;
                self.status = AppStatus::Success;
                info!("drawing generated");
            }
            Ok(None) => {
                error!("{NO_RENDERING_MESSAGE}");
                self.fail_generation(NO_RENDERING_MESSAGE.to_string());
            }
            Err(e) => {
                error!("generation failed: {e}");
                self.fail_generation(e.user_message());
            }
        }
    }

    fn fail_generation(&mut self, message: String) {
        self.error = Some(message);
        self.status = AppStatus::Error;
    }

    fn abort_generation(&mut self) {
        if let Some((_, task)) = self.generation_task.take() {
            info!("aborting in-flight generation");
            task.abort();
        }
    }

    /// Clears the workspace back to the initial state.
    pub fn reset(&mut self) {
        self.abort_generation();
        if let Some((_, task)) = self.upload_task.take() {
            task.abort();
        }

        self.selected_image = None;
        self.result = None;
        self.error = None;
        self.context.clear();
        self.path_input.clear();
        self.notice = None;
        self.last_export = None;
        self.source_preview = None;
        self.result_preview = None;
        self.input_mode = InputMode::Normal;
        self.status = AppStatus::Idle;
    }

    // Background tasks

    /// Collects background work that has finished, without blocking.
    pub async fn poll_tasks(&mut self) {
        if self.upload_task.as_ref().is_some_and(|(_, t)| t.is_finished()) {
            if let Some((path, task)) = self.upload_task.take() {
                self.apply_upload(&path, task.await);
            }
        }
        if self.generation_task.as_ref().is_some_and(|(_, t)| t.is_finished()) {
            if let Some((submission, task)) = self.generation_task.take() {
                self.apply_generation(submission, task.await);
            }
        }
    }

    /// Waits for all background work (headless mode).
    pub async fn wait_for_tasks(&mut self) {
        if let Some((path, task)) = self.upload_task.take() {
            self.apply_upload(&path, task.await);
        }
        if let Some((submission, task)) = self.generation_task.take() {
            self.apply_generation(submission, task.await);
        }
    }

    pub fn is_busy(&self) -> bool {
        self.upload_task.is_some() || self.generation_task.is_some()
    }

    fn apply_upload(
        &mut self,
        path: &Path,
        joined: std::result::Result<error::Result<SourceImage>, tokio::task::JoinError>,
    ) {
        match joined {
            Ok(Ok(image)) => self.finish_upload(image),
            Ok(Err(e)) => self.fail_upload(path, e.user_message()),
            Err(e) if e.is_cancelled() => {}
            Err(e) => self.fail_upload(path, error::user_message(&e)),
        }
    }

    fn apply_generation(
        &mut self,
        submission: Submission,
        joined: std::result::Result<error::Result<Option<String>>, tokio::task::JoinError>,
    ) {
        match joined {
            Ok(outcome) => self.complete_generation(
                submission.original_image,
                &submission.context,
                outcome,
            ),
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                error!("generation task failed: {e}");
                self.fail_generation(error::user_message(&e));
            }
        }
    }

    // Export

    /// Writes the result as a PNG into `dir`, never overwriting.
    pub fn export_result(&mut self, dir: &Path) -> Result<PathBuf> {
        let result = self
            .result
            .as_ref()
            .context("Nothing to export yet")?;

        let uri = DataUri::parse(&result.image_url)?;
        let bytes = uri.decode()?;
        let png = if data_uri::ImageFormat::from_magic_bytes(&bytes)
            == Some(data_uri::ImageFormat::Png)
        {
            bytes
        } else {
            let decoded = image::load_from_memory(&bytes)
                .context("Generated image could not be decoded for PNG export")?;
            let mut out = std::io::Cursor::new(Vec::new());
            decoded.write_to(&mut out, image::ImageFormat::Png)?;
            out.into_inner()
        };

        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = unique_export_path(dir);
        std::fs::write(&path, png)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!(path = %path.display(), "exported drawing");
        self.last_export = Some(path.clone());
        Ok(path)
    }

    /// Export action from the UI: reports the outcome as a notice.
    pub fn export_to_default_dir(&mut self) {
        let dir = self.export_dir.clone();
        match self.export_result(&dir) {
            Ok(path) => self.notice = Some(format!("Exported to {}", path.display())),
            Err(e) => {
                error!("export failed: {e:#}");
                self.notice = Some(format!("Export failed: {e}"));
            }
        }
    }

    pub fn tick_animation(&mut self) {
        self.animation_frame = (self.animation_frame + 1) % 4;
    }
}

fn unique_export_path(dir: &Path) -> PathBuf {
    let first = dir.join(format!("{EXPORT_FILE_STEM}.png"));
    if !first.exists() {
        return first;
    }
    (1..)
        .map(|n| dir.join(format!("{EXPORT_FILE_STEM}-{n}.png")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}
