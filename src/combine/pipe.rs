//! Synchronous in-memory byte pipe between the reducer and the bulk-load
//! thread.
//!
//! Built on a zero-capacity crossbeam channel: every `write` blocks until the
//! reading side takes the bytes, so the writer can never run more than one
//! chunk ahead of the reader. Dropping either end closes it; the other side
//! observes end-of-stream (reader) or `BrokenPipe` (writer).

use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::{self, BufRead, Read, Write};

enum Frame {
    Data(Vec<u8>),
    Failed(io::ErrorKind, String),
}

pub fn pipe() -> (PipeReader, PipeWriter) {
    let (tx, rx) = bounded(0);
    (
        PipeReader {
            rx: Some(rx),
            chunk: Vec::new(),
            pos: 0,
            failure: None,
        },
        PipeWriter { tx: Some(tx) },
    )
}

pub struct PipeWriter {
    tx: Option<Sender<Frame>>,
}

impl PipeWriter {
    /// Closes the pipe; the reader sees end-of-stream once it has taken
    /// everything already written.
    pub fn close(mut self) {
        self.tx.take();
    }

    /// Closes the pipe so the reader's next read fails with `err` instead of
    /// seeing a clean end-of-stream.
    pub fn close_with_error(mut self, err: &io::Error) {
        if let Some(tx) = self.tx.take() {
            // The reader may already be gone; then there is nobody to tell.
            let _ = tx.send(Frame::Failed(err.kind(), err.to_string()));
        }
    }
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "pipe writer closed"))?;

        tx.send(Frame::Data(buf.to_vec()))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct PipeReader {
    rx: Option<Receiver<Frame>>,
    chunk: Vec<u8>,
    pos: usize,
    failure: Option<(io::ErrorKind, String)>,
}

impl PipeReader {
    /// Closes the reading side; pending and future writes fail.
    pub fn close(mut self) {
        self.rx.take();
    }
}

impl BufRead for PipeReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        while self.pos >= self.chunk.len() {
            if let Some((kind, message)) = &self.failure {
                return Err(io::Error::new(*kind, message.clone()));
            }

            let Some(rx) = self.rx.as_ref() else {
                return Ok(&[]);
            };

            match rx.recv() {
                Ok(Frame::Data(data)) => {
                    self.chunk = data;
                    self.pos = 0;
                }
                Ok(Frame::Failed(kind, message)) => {
                    self.rx = None;
                    self.failure = Some((kind, message));
                }
                Err(_) => {
                    self.rx = None;
                    return Ok(&[]);
                }
            }
        }

        Ok(&self.chunk[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.chunk.len());
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}
