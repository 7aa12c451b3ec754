//! Synthetic WAV builders shared by host tests.

pub(crate) struct WavFormat {
    pub(crate) format: u16,
    pub(crate) channels: u16,
    pub(crate) sample_rate_hz: u32,
    pub(crate) bits: u16,
}

pub(crate) const MONO_16: WavFormat = WavFormat {
    format: 1,
    channels: 1,
    sample_rate_hz: 8_000,
    bits: 16,
};

pub(crate) fn chunk(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(payload.len() + 9);
    bytes.extend_from_slice(id);
    bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    bytes.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        bytes.push(0);
    }
    bytes
}

pub(crate) fn fmt_payload(wav_format: &WavFormat) -> Vec<u8> {
    let block_align = (wav_format.bits / 8).max(1) * wav_format.channels;
    let byte_rate = wav_format.sample_rate_hz * u32::from(block_align);
    let mut payload = Vec::with_capacity(16);
    payload.extend_from_slice(&wav_format.format.to_le_bytes());
    payload.extend_from_slice(&wav_format.channels.to_le_bytes());
    payload.extend_from_slice(&wav_format.sample_rate_hz.to_le_bytes());
    payload.extend_from_slice(&byte_rate.to_le_bytes());
    payload.extend_from_slice(&block_align.to_le_bytes());
    payload.extend_from_slice(&wav_format.bits.to_le_bytes());
    payload
}

pub(crate) fn riff(chunks: &[Vec<u8>]) -> Vec<u8> {
    let body_len: usize = chunks.iter().map(Vec::len).sum();
    let mut bytes = Vec::with_capacity(body_len + 12);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&((body_len + 4) as u32).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    for chunk_bytes in chunks {
        bytes.extend_from_slice(chunk_bytes);
    }
    bytes
}

pub(crate) fn wav_bytes(wav_format: &WavFormat, pcm: &[u8]) -> Vec<u8> {
    riff(&[chunk(b"fmt ", &fmt_payload(wav_format)), chunk(b"data", pcm)])
}

pub(crate) fn s16le(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|sample| sample.to_le_bytes()).collect()
}
