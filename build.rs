//! Build script for pwm-wav-player.

use std::{env, f64::consts::TAU, fs, path::Path, path::PathBuf};

const CHIME_SAMPLE_RATE_HZ: u32 = 11_025;
const CHIME_NOTES_HZ: [f64; 3] = [659.25, 830.61, 987.77];
const CHIME_NOTE_MS: u32 = 350;
const CHIME_AMPLITUDE: f64 = 12_000.0;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));

    // 1) WAV payload embedded by the demo
    println!("cargo:rerun-if-env-changed=PWM_AUDIO_WAV");
    let payload_path = out_dir.join("payload.wav");
    match env::var_os("PWM_AUDIO_WAV") {
        Some(source_path) => {
            let source_path = PathBuf::from(source_path);
            println!("cargo:rerun-if-changed={}", source_path.display());
            fs::copy(&source_path, &payload_path).unwrap_or_else(|error| {
                panic!(
                    "Failed to copy PWM_AUDIO_WAV {}: {error}",
                    source_path.display()
                )
            });
        }
        None => write_chime_wav(&payload_path),
    }

    // 2) Handle memory.x based on target
    let target = env::var("TARGET").expect("TARGET is set by cargo");
    let memory_x_name = if target.starts_with("thumbv8m") {
        // Pico 2 ARM
        Some("memory-pico2.x")
    } else if target.starts_with("thumbv6m") {
        // Pico 1
        Some("memory-pico1.x")
    } else {
        None
    };

    if let Some(memory_x_name) = memory_x_name {
        let memory_x = fs::read_to_string(memory_x_name)
            .unwrap_or_else(|error| panic!("Failed to read {memory_x_name}: {error}"));
        fs::write(out_dir.join("memory.x"), memory_x).expect("Failed to write memory.x");
        println!("cargo:rustc-link-search={}", out_dir.display());
        println!("cargo:rerun-if-changed={memory_x_name}");
    }
}

/// Three falling-off chime notes as 16-bit mono PCM.
fn write_chime_wav(payload_path: &Path) {
    let note_sample_count = CHIME_SAMPLE_RATE_HZ * CHIME_NOTE_MS / 1000;
    let mut pcm_bytes = Vec::new();

    for note_hz in CHIME_NOTES_HZ {
        for sample_index in 0..note_sample_count {
            let time_s = f64::from(sample_index) / f64::from(CHIME_SAMPLE_RATE_HZ);
            let progress = f64::from(sample_index) / f64::from(note_sample_count);
            // Short attack, exponential decay.
            let envelope = (progress * 50.0).min(1.0) * (-4.0 * progress).exp();
            let sample_value = (TAU * note_hz * time_s).sin() * envelope * CHIME_AMPLITUDE;
            pcm_bytes.extend_from_slice(&(sample_value.round() as i16).to_le_bytes());
        }
    }

    fs::write(payload_path, wav_bytes_s16le_mono(CHIME_SAMPLE_RATE_HZ, &pcm_bytes))
        .unwrap_or_else(|error| {
            panic!(
                "Failed to write generated WAV {}: {error}",
                payload_path.display()
            )
        });
}

fn wav_bytes_s16le_mono(sample_rate_hz: u32, pcm_bytes: &[u8]) -> Vec<u8> {
    const CHANNELS: u16 = 1;
    const BITS_PER_SAMPLE: u16 = 16;
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let byte_rate = sample_rate_hz * u32::from(block_align);
    let data_len = u32::try_from(pcm_bytes.len()).expect("chime fits in a WAV");

    let mut wav_bytes = Vec::with_capacity(pcm_bytes.len() + 44);
    wav_bytes.extend_from_slice(b"RIFF");
    wav_bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav_bytes.extend_from_slice(b"WAVE");
    wav_bytes.extend_from_slice(b"fmt ");
    wav_bytes.extend_from_slice(&16_u32.to_le_bytes());
    wav_bytes.extend_from_slice(&1_u16.to_le_bytes());
    wav_bytes.extend_from_slice(&CHANNELS.to_le_bytes());
    wav_bytes.extend_from_slice(&sample_rate_hz.to_le_bytes());
    wav_bytes.extend_from_slice(&byte_rate.to_le_bytes());
    wav_bytes.extend_from_slice(&block_align.to_le_bytes());
    wav_bytes.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    wav_bytes.extend_from_slice(b"data");
    wav_bytes.extend_from_slice(&data_len.to_le_bytes());
    wav_bytes.extend_from_slice(pcm_bytes);
    wav_bytes
}
