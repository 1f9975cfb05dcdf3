//! Drives a [`DomBackend`] over framed stdio-style streams.
//!
//! The reader thread decodes host events, the calling thread owns the
//! document and the scheduler, the writer thread encodes op batches.

use crate::backend::DomBackend;
use crate::error::ProtocolError;
use crate::protocol::{DomEnvelope, HostEvent, reader_loop, ready_envelope, writer_loop};
use formkit::DialogBackend;
use std::io::{Read, Write};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender, TrySendError};
use std::thread;
use std::time::Instant;

pub struct DomHost {
    backend: DomBackend,
    stalled: u64,
}

impl DomHost {
    pub fn new(backend: DomBackend) -> Self {
        Self {
            backend,
            stalled: 0,
        }
    }

    pub fn backend(&self) -> &DomBackend {
        &self.backend
    }

    /// Runs until `reader` reaches end of stream, then flushes what the last
    /// events produced.
    pub fn serve<R, W>(&mut self, reader: R, writer: W) -> Result<(), ProtocolError>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let settings = self.backend.settings().clone();
        let (out_tx, out_rx) = mpsc::sync_channel(settings.dom_outbound_queue_cap);
        let writer_handle = thread::spawn(move || writer_loop(out_rx, writer));

        out_tx
            .send(ready_envelope())
            .map_err(|_| ProtocolError::Disconnected)?;

        let (in_tx, in_rx) = mpsc::channel::<HostEvent>();
        let reader_handle = thread::spawn(move || {
            let read_result = reader_loop(reader, |event| {
                if in_tx.send(event).is_err() {
                    log::debug!("event arrived after shutdown");
                }
            });
            if let Err(err) = &read_result {
                log::error!("reader loop terminated with error: {err}");
            }
            read_result
        });

        let mut outcome = Ok(());
        let mut reader_done = false;
        loop {
            match in_rx.recv_timeout(settings.poll_interval) {
                Ok(event) => {
                    if !self.backend.dispatch(&event) {
                        log::debug!("event for unknown node {}", event.target());
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    reader_done = true;
                    break;
                }
            }

            self.backend.tick(Instant::now());
            if let Err(err) = self.flush(&out_tx) {
                outcome = Err(err);
                break;
            }
        }

        if outcome.is_ok() {
            self.backend.tick(Instant::now());
            outcome = self.flush(&out_tx);
        }
        drop(out_tx);

        // A reader blocked on a live stream must not hang shutdown.
        if reader_done || reader_handle.is_finished() {
            match reader_handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    if outcome.is_ok() {
                        outcome = Err(err.into());
                    }
                }
                Err(err) => log::error!("reader thread join failed: {err:?}"),
            }
        } else {
            log::warn!("reader thread still active during shutdown; skipping join");
        }

        match writer_handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                log::error!("writer thread returned error: {err}");
                if outcome.is_ok() {
                    outcome = Err(err.into());
                }
            }
            Err(err) => log::error!("writer thread join failed: {err:?}"),
        }

        outcome
    }

    /// Queues the pending op batch. A full queue waits instead of dropping,
    /// since a lost batch would leave the page out of step with the mirror.
    fn flush(&mut self, tx: &SyncSender<DomEnvelope>) -> Result<(), ProtocolError> {
        let Some(envelope) = self.backend.take_envelope() else {
            return Ok(());
        };

        match tx.try_send(envelope) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(envelope)) => {
                self.stalled += 1;
                if self.stalled == 1 || self.stalled.is_power_of_two() {
                    log::warn!(
                        "dom outbound queue full (cap={}); stalled {} time(s)",
                        self.backend.settings().dom_outbound_queue_cap,
                        self.stalled
                    );
                }
                tx.send(envelope).map_err(|_| ProtocolError::Disconnected)
            }
            Err(TrySendError::Disconnected(_)) => Err(ProtocolError::Disconnected),
        }
    }
}
