//! Streaming synthesis helpers.
//!
//! A synthesizer produces audio as a blocking iterator. We drive that
//! iterator on a blocking thread and forward each chunk over a bounded
//! channel, which gives the async side an [`AudioStream`] it can consume
//! chunk by chunk. On top of that stream sit the three delivery strategies:
//! whole-file aggregation, one WAV container per chunk, and raw PCM frames.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use futures_core::Stream;
use futures_util::StreamExt;
use tokio::sync::{mpsc, OwnedSemaphorePermit};
use tracing::{debug, error, warn};

use crate::audio::{silence_len, AudioChunk};
use crate::error::TtsError;
use crate::synth::{SpeechSynthesizer, SynthesisRequest};
use crate::wav::{encode_pcm16le, encode_wav, silence_pcm16le};

/// Chunks buffered between the model thread and the consumer.
const CHANNEL_CAPACITY: usize = 8;

pub type AudioStream = Pin<Box<dyn Stream<Item = Result<AudioChunk, TtsError>> + Send>>;

/// Encoded transport frames, ready to be written to a response body.
pub type FrameStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// Run `model.chunks(request)` on a blocking thread and stream its output.
///
/// Chunks arrive in exactly the order the model produced them. If the
/// returned stream is dropped, the producer stops at its next send and the
/// worker permit (if any) is released.
pub fn spawn_chunk_stream(
    model: Arc<dyn SpeechSynthesizer>,
    request: SynthesisRequest,
    permit: Option<OwnedSemaphorePermit>,
) -> AudioStream {
    let (tx, mut rx) = mpsc::channel::<Result<AudioChunk, TtsError>>(CHANNEL_CAPACITY);

    let producer = tokio::task::spawn_blocking(move || {
        let _permit = permit;

        let iter = match model.chunks(&request) {
            Ok(iter) => iter,
            Err(e) => {
                let _ = tx.blocking_send(Err(TtsError::Inference(e)));
                return;
            }
        };

        for (index, part) in iter.enumerate() {
            match part {
                Ok(chunk) => {
                    if tx.blocking_send(Ok(chunk)).is_err() {
                        debug!("Audio stream receiver dropped after {index} chunk(s), stopping synthesis");
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.blocking_send(Err(TtsError::Inference(e)));
                    break;
                }
            }
        }
        // tx is dropped here, closing the channel
    });

    Box::pin(stream! {
        while let Some(item) = rx.recv().await {
            yield item;
        }
        // A panicking model closes the channel too; don't report that as a clean end.
        if let Err(e) = producer.await {
            yield Err(TtsError::Worker(e.to_string()));
        }
    })
}

/// Consume a whole stream and build the final utterance.
///
/// Chunks are concatenated in arrival order, the sample rate of the first
/// chunk wins and the trailing silence is appended exactly once. A stream
/// with zero chunks yields `Ok(None)`. Any error aborts the aggregation.
pub async fn collect_stream<S>(mut stream: S) -> Result<Option<AudioChunk>, TtsError>
where
    S: Stream<Item = Result<AudioChunk, TtsError>> + Unpin,
{
    let mut combined: Option<AudioChunk> = None;

    while let Some(item) = stream.next().await {
        let chunk = item?;
        match combined.as_mut() {
            Some(acc) => acc.samples.extend_from_slice(&chunk.samples),
            None => combined = Some(chunk),
        }
    }

    Ok(combined.map(|mut audio| {
        audio.pad_trailing_silence();
        audio
    }))
}

/// Wait for the first chunk so its sample rate can be declared up front.
///
/// Returns `Ok(None)` when the stream ends without producing anything.
pub async fn split_first(
    mut stream: AudioStream,
) -> Result<Option<(AudioChunk, AudioStream)>, TtsError> {
    match stream.next().await {
        Some(Ok(first)) => Ok(Some((first, stream))),
        Some(Err(e)) => Err(e),
        None => Ok(None),
    }
}

/// One self-contained WAV file per chunk, then a final WAV holding only the
/// trailing silence.
///
/// `first` has already been pulled off the stream by [`split_first`], so a
/// failure before any audio never reaches this point. Later failures are
/// logged and the stream simply ends.
pub fn wav_frames(first: AudioChunk, mut rest: AudioStream) -> FrameStream {
    Box::pin(stream! {
        let sample_rate = first.sample_rate;

        match encode_wav(&first.samples, sample_rate) {
            Ok(frame) => yield frame,
            Err(e) => {
                error!("Stream error: {e}");
                return;
            }
        }

        while let Some(item) = rest.next().await {
            let chunk = match item {
                Ok(chunk) => chunk,
                Err(e) => {
                    error!("Stream error: {e}");
                    return;
                }
            };

            if chunk.sample_rate != sample_rate {
                warn!("Chunk sample rate {} differs from stream rate {sample_rate}", chunk.sample_rate);
            }

            match encode_wav(&chunk.samples, sample_rate) {
                Ok(frame) => yield frame,
                Err(e) => {
                    error!("Stream error: {e}");
                    return;
                }
            }
        }

        match encode_wav(&vec![0.0; silence_len(sample_rate)], sample_rate) {
            Ok(frame) => yield frame,
            Err(e) => error!("Stream error: {e}"),
        }
    })
}

/// Headerless 16-bit little-endian PCM, one frame per chunk, then one frame
/// of trailing silence.
///
/// `first` has already been pulled off the stream by [`split_first`]; its
/// sample rate is the one announced to the client.
pub fn pcm_frames(first: AudioChunk, mut rest: AudioStream) -> FrameStream {
    Box::pin(stream! {
        let sample_rate = first.sample_rate;
        yield encode_pcm16le(&first.samples);

        while let Some(item) = rest.next().await {
            match item {
                Ok(chunk) => yield encode_pcm16le(&chunk.samples),
                Err(e) => {
                    error!("Stream error: {e}");
                    return;
                }
            }
        }

        yield silence_pcm16le(sample_rate);
    })
}
