use std::path::{Path, PathBuf};

use clap::Args;
use mindbell_core::{BellSynthesizer, BellType, SynthConfig};

use super::{load_config, CommandResult};

#[derive(Args)]
pub struct RenderArgs {
    /// Bell to render: big or small
    pub bell: BellType,
    /// Output WAV file
    #[arg(short, long, default_value = "bell.wav")]
    pub output: PathBuf,
    /// Sample rate override
    #[arg(long)]
    pub sample_rate: Option<u32>,
}

pub fn run(args: RenderArgs, config_path: Option<&Path>) -> CommandResult {
    let config = load_config(config_path)?;
    let synth = BellSynthesizer::new(SynthConfig {
        sample_rate: args.sample_rate.unwrap_or(config.synth.sample_rate),
        ..config.synth
    });
    let buffer = synth.render_offline(args.bell)?;
    write_wav(&args.output, &buffer, synth.config().sample_rate)?;

    tracing::info!(
        bell = %args.bell,
        frames = buffer.len(),
        path = %args.output.display(),
        "bell rendered"
    );
    println!(
        "{} bell: {:.1}s written to {}",
        args.bell,
        buffer.len() as f64 / synth.config().sample_rate as f64,
        args.output.display()
    );
    Ok(())
}

/// 16-bit mono PCM.
fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in samples {
        writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()
}
