//! Chunked output over a bounded channel
//!
//! `ChannelSink` is the write end a transport hands to the result writer.
//! Bytes are grouped into chunks of at most `chunk_size` and sent over a
//! bounded crossbeam channel; a full channel blocks the writer, so at most
//! `capacity * chunk_size` bytes are ever in flight. The writer flushes
//! after each command, which ships a (possibly short) chunk per command.

use std::io::{self, Read, Write};

use crossbeam_channel::{bounded, Receiver, Sender};

/// Create a connected sink/receiver pair
pub fn channel(capacity: usize, chunk_size: usize) -> (ChannelSink, ChunkReceiver) {
    let (tx, rx) = bounded(capacity);
    let sink = ChannelSink {
        tx,
        buf: Vec::with_capacity(chunk_size),
        chunk_size: chunk_size.max(1),
        chunks_sent: 0,
        bytes_sent: 0,
    };
    let receiver = ChunkReceiver { rx, current: Vec::new(), pos: 0 };
    (sink, receiver)
}

pub struct ChannelSink {
    tx: Sender<Vec<u8>>,
    buf: Vec<u8>,
    chunk_size: usize,
    chunks_sent: u64,
    bytes_sent: u64,
}

impl ChannelSink {
    pub fn chunks_sent(&self) -> u64 {
        self.chunks_sent
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    fn send(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::replace(&mut self.buf, Vec::with_capacity(self.chunk_size));
        let len = chunk.len() as u64;
        self.tx
            .send(chunk)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "chunk receiver dropped"))?;
        self.chunks_sent += 1;
        self.bytes_sent += len;
        Ok(())
    }
}

impl Write for ChannelSink {
    /// Accepts at most what fits in the current chunk
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let room = self.chunk_size - self.buf.len();
        let n = room.min(data.len());
        self.buf.extend_from_slice(&data[..n]);
        if self.buf.len() == self.chunk_size {
            self.send()?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send()
    }
}

impl Drop for ChannelSink {
    fn drop(&mut self) {
        // receiver may already be gone
        let _ = self.send();
    }
}

/// Read end of a `ChannelSink`; EOF once the sink is dropped and drained.
pub struct ChunkReceiver {
    rx: Receiver<Vec<u8>>,
    current: Vec<u8>,
    pos: usize,
}

impl ChunkReceiver {
    /// Next whole chunk, blocking; `None` once the sink is gone
    pub fn recv_chunk(&mut self) -> Option<Vec<u8>> {
        if self.pos < self.current.len() {
            let rest = self.current.split_off(self.pos);
            self.current.clear();
            self.pos = 0;
            return Some(rest);
        }
        self.rx.recv().ok()
    }

    /// Chunks waiting in the channel
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Read for ChunkReceiver {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        while self.pos == self.current.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.current = chunk;
                    self.pos = 0;
                }
                Err(_) => return Ok(0),
            }
        }
        let n = out.len().min(self.current.len() - self.pos);
        out[..n].copy_from_slice(&self.current[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
