//! reelforge: short vertical videos from a text script.
//!
//! One pipeline, executed once per run: load the script, synthesize
//! narration with an external TTS service, align captions, pick a random
//! background clip, compose the final video with ffmpeg, clean up. Every
//! non-trivial operation is delegated to an external service or to ffmpeg;
//! the pipeline only sequences calls and moves files.

pub mod background;
pub mod captions;
pub mod config;
pub mod error;
pub mod feed;
pub mod media;
pub mod script;
pub mod transcribe;
pub mod tts;
pub mod utils;

use std::path::{Path, PathBuf};

use crate::config::{Credentials, PipelineConfig};
use crate::error::{ReelError, Result};
use crate::media::compose::{
    self, CaptionPlacement, ComposeRequest, SpeakerVisual,
};
use crate::transcribe::WhisperClient;
use crate::tts::{ElevenLabsClient, VoiceSettings};
use crate::utils::temp::RunWorkspace;

/// Silence inserted between dialogue lines, seconds.
const LINE_GAP: f64 = 0.3;

/// Which narration input to use for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationSource {
    /// `inputs/script.txt`, single narrator, transcription-aligned captions.
    Script,
    /// `inputs/dialogue.json`, two speakers, alignment-derived word captions.
    Dialogue,
}

/// How the output file under `outputs/` is named.
#[derive(Debug, Clone, Copy)]
enum OutputNaming {
    /// `final_{timestamp}.mp4` (single-run mode).
    Timestamped,
    /// Slug of the dialogue's title and description (batch mode).
    FromTitle,
}

/// The video generation pipeline. Stages run strictly in sequence; every
/// failure is terminal for the run and temp files are cleaned up on both
/// paths.
pub struct ReelPipeline {
    base_dir: PathBuf,
    config: PipelineConfig,
    credentials: Credentials,
}

impl ReelPipeline {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        config: PipelineConfig,
        credentials: Credentials,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            config,
            credentials,
        }
    }

    /// Build a pipeline from `config.json` under `base_dir` and API keys from
    /// the environment. A missing credential fails here, before any stage.
    pub fn from_env(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        let config = PipelineConfig::load(&base_dir);
        let credentials = Credentials::from_env()?;
        Ok(Self::new(base_dir, config, credentials))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn inputs_dir(&self) -> PathBuf {
        self.base_dir.join("inputs")
    }

    fn backgrounds_dir(&self) -> PathBuf {
        self.inputs_dir().join("backgrounds")
    }

    fn assets_dir(&self) -> PathBuf {
        self.inputs_dir().join("assets")
    }

    fn dialogues_dir(&self) -> PathBuf {
        self.inputs_dir().join("dialogues")
    }

    fn outputs_dir(&self) -> PathBuf {
        self.base_dir.join("outputs")
    }

    /// Run the pipeline once and return the path of the composed video.
    pub async fn run(&self, source: NarrationSource) -> Result<PathBuf> {
        if !media::ffmpeg::ffmpeg_available() {
            return Err(ReelError::Composition(
                "ffmpeg/ffprobe not found on PATH".to_string(),
            ));
        }

        std::fs::create_dir_all(self.outputs_dir())?;
        let workspace = RunWorkspace::new()?;

        let result = match source {
            NarrationSource::Script => self.run_script(&workspace).await,
            NarrationSource::Dialogue => self.run_dialogue(&workspace).await,
        };

        // Cleanup is attempted regardless of where a failure occurred.
        workspace.cleanup();
        result
    }

    async fn run_script(&self, workspace: &RunWorkspace) -> Result<PathBuf> {
        let script = script::load_script(&self.inputs_dir().join("script.txt"))?;
        log::info!("script loaded: {} characters", script.chars().count());

        let tts_client = ElevenLabsClient::new(&self.credentials.elevenlabs_api_key);
        let narration = workspace.file("voice", "mp3");
        tts_client
            .synthesize(
                &script,
                &self.config.voice_id,
                &self.voice_settings(),
                &narration,
            )
            .await?;

        let whisper = WhisperClient::new(&self.credentials.openai_api_key);
        let segments = whisper.transcribe(&narration).await?;

        let background = background::select_background(
            &self.backgrounds_dir(),
            &mut rand::thread_rng(),
        )?;

        self.compose_output(
            &background,
            &narration,
            &segments,
            &[],
            CaptionPlacement::LowerThird,
            &compose::output_filename(chrono::Local::now()),
        )
    }

    /// Process every dialogue file under `inputs/dialogues/`, cycling through
    /// the background clips in name order. A failing file is logged and
    /// skipped; the batch continues with the next one.
    pub async fn run_batch(&self) -> Result<Vec<PathBuf>> {
        if !media::ffmpeg::ffmpeg_available() {
            return Err(ReelError::Composition(
                "ffmpeg/ffprobe not found on PATH".to_string(),
            ));
        }

        std::fs::create_dir_all(self.outputs_dir())?;

        let files = script::list_dialogue_files(&self.dialogues_dir())?;
        let backgrounds = background::list_candidates(&self.backgrounds_dir())?;
        if backgrounds.is_empty() {
            return Err(ReelError::NoBackgroundsFound(format!(
                "no video files in {}",
                self.backgrounds_dir().display()
            )));
        }
        log::info!(
            "batch: {} dialogue files, {} backgrounds",
            files.len(),
            backgrounds.len()
        );

        let mut outputs = Vec::new();
        for (i, file) in files.iter().enumerate() {
            let background = &backgrounds[i % backgrounds.len()];
            log::info!(
                "batch: {} with background {}",
                file.display(),
                background.display()
            );

            let workspace = RunWorkspace::new()?;
            let result = self
                .run_dialogue_file(&workspace, file, background, OutputNaming::FromTitle)
                .await;
            workspace.cleanup();

            match result {
                Ok(output) => outputs.push(output),
                Err(e) => log::error!("batch: {} failed: {}", file.display(), e),
            }
        }

        log::info!("batch complete: {} videos created", outputs.len());
        Ok(outputs)
    }

    async fn run_dialogue(&self, workspace: &RunWorkspace) -> Result<PathBuf> {
        let background = background::select_background(
            &self.backgrounds_dir(),
            &mut rand::thread_rng(),
        )?;
        self.run_dialogue_file(
            workspace,
            &self.inputs_dir().join("dialogue.json"),
            &background,
            OutputNaming::Timestamped,
        )
        .await
    }

    async fn run_dialogue_file(
        &self,
        workspace: &RunWorkspace,
        path: &Path,
        background: &Path,
        naming: OutputNaming,
    ) -> Result<PathBuf> {
        let dialogue = script::load_dialogue(path, &self.assets_dir())?;
        log::info!(
            "dialogue loaded: {} lines between {} characters",
            dialogue.dialogue.len(),
            dialogue.characters.len()
        );

        let tts_client = ElevenLabsClient::new(&self.credentials.elevenlabs_api_key);
        let settings = self.voice_settings();

        let mut clips = Vec::new();
        let mut segments = Vec::new();
        let mut offset = 0.0;

        for (i, line) in dialogue.dialogue.iter().enumerate() {
            // Referenced characters are validated by load_dialogue.
            let speaker = &dialogue.characters[&line.character];
            let clip = workspace.file(&format!("voice_{}", line.character), "mp3");

            let alignment = tts_client
                .synthesize_with_timestamps(&line.text, &speaker.voice_id, &settings, &clip)
                .await?;
            let words =
                captions::words_from_alignment(&alignment, offset, Some(&line.character))?;
            let duration = media::probe::media_duration(&clip)?;
            log::info!(
                "line {}: {} ({} words, {:.1}s)",
                i + 1,
                speaker.name,
                words.len(),
                duration
            );

            segments.extend(words);
            clips.push(clip);
            offset += duration + LINE_GAP;
        }

        let narration = workspace.file("narration", "mp3");
        media::audio::concat_with_gaps(&clips, LINE_GAP, &narration)?;

        let speakers = self.speaker_visuals(&dialogue, &segments);

        let file_name = match naming {
            OutputNaming::Timestamped => compose::output_filename(chrono::Local::now()),
            OutputNaming::FromTitle => {
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "dialogue".to_string());
                compose::titled_filename(
                    dialogue.title.as_deref().unwrap_or(&stem),
                    dialogue.description.as_deref().unwrap_or("Generated video"),
                )
            }
        };

        self.compose_output(
            background,
            &narration,
            &segments,
            &speakers,
            CaptionPlacement::Center,
            &file_name,
        )
    }

    /// Map dialogue characters to overlay positions and their active spans.
    /// Characters are assigned to the lower-left and lower-right anchors in
    /// sorted-id order, so placement is stable across runs.
    fn speaker_visuals(
        &self,
        dialogue: &script::DialogueScript,
        segments: &[captions::CaptionSegment],
    ) -> Vec<SpeakerVisual> {
        let positions =
            compose::overlay_positions(self.config.video_width, self.config.video_height);
        let spans = captions::speaker_spans(segments);

        let mut ids: Vec<&String> = dialogue.characters.keys().collect();
        ids.sort();

        ids.into_iter()
            .enumerate()
            .map(|(i, id)| {
                let speaker = &dialogue.characters[id];
                SpeakerVisual {
                    id: (*id).clone(),
                    caption_color: speaker.caption_color.clone(),
                    caption_stroke_color: speaker.caption_stroke_color.clone(),
                    image: Some(self.assets_dir().join(&speaker.image_file)),
                    position: positions[i.min(positions.len() - 1)],
                    spans: spans
                        .iter()
                        .filter(|(span_id, _, _)| span_id == id)
                        .map(|(_, start, end)| (*start, *end))
                        .collect(),
                }
            })
            .collect()
    }

    fn compose_output(
        &self,
        background: &Path,
        narration: &Path,
        segments: &[captions::CaptionSegment],
        speakers: &[SpeakerVisual],
        placement: CaptionPlacement,
        file_name: &str,
    ) -> Result<PathBuf> {
        let output = self.outputs_dir().join(file_name);

        compose::compose(&ComposeRequest {
            background,
            narration,
            segments,
            speakers,
            placement,
            config: &self.config,
            output: &output,
        })
    }

    fn voice_settings(&self) -> VoiceSettings {
        VoiceSettings {
            stability: self.config.voice_stability,
            similarity_boost: self.config.voice_similarity_boost,
        }
    }
}
