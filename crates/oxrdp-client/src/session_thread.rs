//! The reader thread: one loop reading frames, dispatching callbacks and
//! draining queued input events.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

use oxrdp_blocking::Framed;
use oxrdp_core::WriteBuf;
use oxrdp_pdu::input::InputEvent;
use oxrdp_session::{ActiveStage, ActiveStageOutput};

use crate::{BitmapUpdate, ClientError, RdpStream};

/// The typed callback set of a session: one callback per event kind
/// rather than a generic emitter.
#[derive(Default)]
pub(crate) struct Callbacks {
    pub on_error: Option<Box<dyn FnMut(&ClientError) + Send>>,
    pub on_close: Option<Box<dyn FnMut() + Send>>,
    pub on_success: Option<Box<dyn FnMut() + Send>>,
    pub on_ready: Option<Box<dyn FnMut() + Send>>,
    pub on_bitmap: Option<Box<dyn FnMut(Vec<BitmapUpdate>) + Send>>,
}

impl Callbacks {
    pub fn emit_success(&mut self) {
        if let Some(callback) = self.on_success.as_mut() {
            callback();
        }
    }

    pub fn emit_ready(&mut self) {
        if let Some(callback) = self.on_ready.as_mut() {
            callback();
        }
    }

    pub fn emit_error(&mut self, error: &ClientError) {
        if let Some(callback) = self.on_error.as_mut() {
            callback(error);
        }
    }

    pub fn emit_close(&mut self) {
        if let Some(callback) = self.on_close.as_mut() {
            callback();
        }
    }

    pub fn emit_bitmap(&mut self, updates: Vec<BitmapUpdate>) {
        if let Some(callback) = self.on_bitmap.as_mut() {
            callback(updates);
        }
    }
}

/// The single reader pipeline. Runs until the session ends, then fires
/// `on_close` exactly once (preceded by `on_error` on failure).
pub(crate) fn run(
    mut framed: Framed<RdpStream>,
    mut active_stage: ActiveStage,
    mut callbacks: Callbacks,
    input_rx: mpsc::Receiver<InputEvent>,
    closing: Arc<AtomicBool>,
) {
    let mut send_buf = WriteBuf::new();

    loop {
        if closing.load(Ordering::SeqCst) {
            // A graceful close requested by the user: best-effort shutdown
            // request, then stop reading.
            send_buf.clear();
            if active_stage.encode_shutdown_request(&mut send_buf).is_ok() {
                let _ = framed.write_all(send_buf.filled());
            }
            callbacks.emit_close();
            return;
        }

        // Queued input goes out between frames, in call order.
        if let Err(error) = flush_input(&mut framed, &mut active_stage, &input_rx, &mut send_buf) {
            error!(%error, "Failed to send input");
            callbacks.emit_error(&error);
            callbacks.emit_close();
            return;
        }

        let (action, frame) = match framed.read_pdu() {
            Ok(frame) => frame,
            Err(e) if is_poll_timeout(&e) => continue,
            Err(e) => {
                if closing.load(Ordering::SeqCst) {
                    callbacks.emit_close();
                } else {
                    let error = ClientError::Io(e);
                    error!(%error, "Session transport failed");
                    callbacks.emit_error(&error);
                    callbacks.emit_close();
                }
                return;
            }
        };

        let outputs = match active_stage.process(action, &frame) {
            Ok(outputs) => outputs,
            Err(e) => {
                let error = ClientError::Session(e);
                error!(%error, "Frame processing failed");
                callbacks.emit_error(&error);
                callbacks.emit_close();
                return;
            }
        };

        for output in outputs {
            match output {
                ActiveStageOutput::BitmapUpdates(updates) => callbacks.emit_bitmap(updates),
                ActiveStageOutput::Disconnect(reason) => {
                    info!(reason = reason.description(), "Session disconnected");
                    callbacks.emit_close();
                    return;
                }
            }
        }
    }
}

fn flush_input(
    framed: &mut Framed<RdpStream>,
    active_stage: &mut ActiveStage,
    input_rx: &mpsc::Receiver<InputEvent>,
    send_buf: &mut WriteBuf,
) -> Result<(), ClientError> {
    let events: Vec<InputEvent> = input_rx.try_iter().collect();

    if events.is_empty() {
        return Ok(());
    }

    send_buf.clear();
    active_stage.encode_input_events(events, send_buf)?;
    framed.write_all(send_buf.filled())?;

    Ok(())
}

fn is_poll_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
