//! Shared audio output for the network-backed speech providers.
//!
//! rodio's `OutputStream` is not `Send`, so a dedicated thread owns the stream
//! and sink and is driven over an mpsc command channel. The thread polls the
//! sink between commands to detect end of playback and fire the pending
//! `on_ended` callback; a `Stop` command fires it early. The thread and the
//! output device are created lazily on the first `play`, so constructing a
//! handle on a machine with no audio device is harmless.

use rodio::{Decoder, OutputStream, Sink};
use std::io::Cursor;
use std::sync::{
    mpsc::{self, RecvTimeoutError, Sender},
    Arc, Mutex,
};
use std::thread;
use std::time::Duration;

use super::EndedCallback;

const ENABLE_LOGS: bool = true;
use crate::{log_error, log_info};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

enum PlaybackCommand {
    Play {
        bytes: Vec<u8>,
        volume: f32,
        speed: f32,
        on_ended: EndedCallback,
    },
    Stop,
}

pub struct PlaybackHandle {
    tx: Arc<Mutex<Option<Sender<PlaybackCommand>>>>,
}

impl PlaybackHandle {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
        }
    }

    /// Queue decoded-on-the-thread audio bytes for playback. Replaces any
    /// audio currently playing; the superseded announcement's callback fires
    /// immediately.
    pub fn play(
        &self,
        bytes: Vec<u8>,
        volume: f32,
        speed: f32,
        on_ended: EndedCallback,
    ) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        tx.send(PlaybackCommand::Play {
            bytes,
            volume,
            speed,
            on_ended,
        })
        .map_err(|e| e.to_string())
    }

    /// Stop playback and fire the pending callback. Safe when idle.
    pub fn stop(&self) {
        if let Ok(guard) = self.tx.lock() {
            if let Some(tx) = guard.as_ref() {
                let _ = tx.send(PlaybackCommand::Stop);
            }
        }
    }

    fn ensure_thread(&self) -> Result<Sender<PlaybackCommand>, String> {
        if let Some(tx) = self.tx.lock().map_err(|e| e.to_string())?.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<PlaybackCommand>();

        // Dedicated thread holding the non-Send audio objects
        thread::Builder::new()
            .name("speech-playback".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;
                let mut pending_ended: Option<EndedCallback> = None;

                fn ensure_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                ) -> Result<(), String> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                        let new_sink = Sink::try_new(&handle)
                            .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                loop {
                    match rx.recv_timeout(POLL_INTERVAL) {
                        Ok(PlaybackCommand::Play {
                            bytes,
                            volume,
                            speed,
                            on_ended,
                        }) => {
                            if let Some(ended) = pending_ended.take() {
                                ended();
                            }
                            if let Some(old) = sink.take() {
                                old.stop();
                            }

                            if let Err(err) = ensure_sink(&mut _stream, &mut sink) {
                                log_error!("speech playback unavailable: {}", err);
                                on_ended();
                                continue;
                            }

                            let source = match Decoder::new(Cursor::new(bytes)) {
                                Ok(source) => source,
                                Err(err) => {
                                    log_error!("failed to decode speech audio: {}", err);
                                    on_ended();
                                    continue;
                                }
                            };

                            if let Some(ref s) = sink {
                                s.set_volume(volume.clamp(0.0, 1.0));
                                s.set_speed(speed.clamp(0.5, 2.0));
                                s.append(source);
                                s.play();
                                pending_ended = Some(on_ended);
                            }
                        }
                        Ok(PlaybackCommand::Stop) => {
                            if let Some(s) = sink.take() {
                                s.stop();
                            }
                            if let Some(ended) = pending_ended.take() {
                                ended();
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            let finished = sink.as_ref().map(|s| s.empty()).unwrap_or(false);
                            if finished {
                                if let Some(ended) = pending_ended.take() {
                                    ended();
                                }
                            }
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            log_info!("speech playback thread shutting down");
                            if let Some(ended) = pending_ended.take() {
                                ended();
                            }
                            break;
                        }
                    }
                }
            })
            .map_err(|e| e.to_string())?;

        let tx_clone = tx.clone();
        *self.tx.lock().map_err(|e| e.to_string())? = Some(tx);
        Ok(tx_clone)
    }
}

impl Default for PlaybackHandle {
    fn default() -> Self {
        Self::new()
    }
}
