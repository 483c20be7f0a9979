use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use kokoro_dispatch::engines::kokoro::{EspeakConfig, KokoroEngine, KokoroModelParams};
use kokoro_dispatch::{Dispatcher, DispatcherConfig, DispatcherConfigBuilder};

/// Run one Kokoro TTS job and print its JSON envelope.
#[derive(Debug, Parser)]
#[command(name = "kokoro-worker", version)]
struct Args {
    /// Job JSON file; reads stdin when omitted or "-"
    job: Option<PathBuf>,

    /// Directory holding the ONNX model and voices-v1.0.bin
    #[arg(long, env = "KOKORO_MODEL_DIR", default_value = "models/kokoro")]
    model_dir: PathBuf,

    /// Inference threads (ORT default when unset)
    #[arg(long, env = "KOKORO_THREADS")]
    threads: Option<usize>,

    /// Where to cache the optimized ONNX graph
    #[arg(long, env = "KOKORO_OPTIMIZED_CACHE")]
    optimized_cache: Option<PathBuf>,

    /// Voice used when a job does not name one
    #[arg(long, env = "KOKORO_DEFAULT_VOICE")]
    default_voice: Option<String>,

    /// Language code used by phonemize when a job does not name one
    #[arg(long, env = "KOKORO_DEFAULT_LANGUAGE")]
    default_language: Option<String>,

    /// espeak-ng binary
    #[arg(long, env = "ESPEAK_NG_BIN")]
    espeak_bin: Option<PathBuf>,

    /// espeak-ng data directory
    #[arg(long, env = "ESPEAK_NG_DATA")]
    espeak_data: Option<PathBuf>,
}

impl Args {
    fn dispatcher_config(&self) -> Result<DispatcherConfig, Box<dyn std::error::Error>> {
        let mut builder = DispatcherConfigBuilder::default();
        if let Some(voice) = &self.default_voice {
            builder.default_voice(voice.as_str());
        }
        if let Some(language) = &self.default_language {
            builder.default_language(language.as_str());
        }
        Ok(builder.build()?)
    }

    fn read_job(&self) -> std::io::Result<String> {
        match &self.job {
            Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path),
            _ => {
                let mut job = String::new();
                std::io::stdin().read_to_string(&mut job)?;
                Ok(job)
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let config = args.dispatcher_config()?;

    let mut engine = KokoroEngine::with_espeak(EspeakConfig {
        bin_path: args.espeak_bin.clone(),
        data_path: args.espeak_data.clone(),
    });
    let load_start = Instant::now();
    engine.load_model(
        &args.model_dir,
        KokoroModelParams {
            num_threads: args.threads,
            optimized_model_cache_path: args.optimized_cache.clone(),
        },
    )?;
    log::info!(
        "Model loaded in {:.2?} with {} voices",
        load_start.elapsed(),
        engine.voices().len()
    );

    let job = args.read_job()?;
    let mut dispatcher = Dispatcher::new(engine, config);

    let started = Instant::now();
    let envelope = dispatcher.handle_json(&job);
    log::info!(
        "Job finished in {:.2?} (success: {})",
        started.elapsed(),
        envelope.success
    );

    println!("{}", serde_json::to_string(&envelope)?);
    Ok(())
}
