//! File-transfer state (C6): pending/accepted transfers, chunk reassembly
//! and persistence. Grounded on `original_source/states/file_state.py`.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;

use base64::Engine;

use crate::error::LsnpError;
use crate::fields::MessageId;

#[derive(Debug, Clone)]
pub struct FileTransfer {
    pub filename: String,
    pub filesize: u64,
    pub filetype: String,
    pub total_chunks: usize,
    pub chunk_size: usize,
    chunks: Vec<Option<Vec<u8>>>,
    pub received_count: usize,
}

impl FileTransfer {
    pub fn new(
        filename: String,
        filesize: u64,
        filetype: String,
        total_chunks: usize,
        chunk_size: usize,
    ) -> Self {
        FileTransfer {
            filename,
            filesize,
            filetype,
            total_chunks,
            chunk_size,
            chunks: vec![None; total_chunks],
            received_count: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total_chunks > 0 && self.received_count == self.total_chunks
    }
}

#[derive(Default)]
struct Inner {
    pending: HashMap<MessageId, FileTransfer>,
    accepted: HashSet<MessageId>,
    /// Last offered FILEID, for one-touch accept/reject.
    recent: Option<MessageId>,
}

pub struct FileTransferState {
    inner: Mutex<Inner>,
    received_dir: PathBuf,
}

impl FileTransferState {
    pub fn new(received_dir: PathBuf) -> Self {
        FileTransferState {
            inner: Mutex::new(Inner::default()),
            received_dir,
        }
    }

    pub fn add_pending_transfer(&self, fid: MessageId, ft: FileTransfer) {
        let mut g = self.inner.lock().unwrap();
        g.pending.insert(fid.clone(), ft);
        g.recent = Some(fid);
    }

    /// Accepts `fid`, or the most recently offered transfer if `fid` is
    /// `None`. If the transfer is already fully received, persists it
    /// immediately.
    pub fn accept_file(&self, fid: Option<MessageId>) -> Result<MessageId, LsnpError> {
        let (target, complete) = {
            let mut g = self.inner.lock().unwrap();
            let target = fid
                .or_else(|| g.recent.clone())
                .ok_or_else(|| LsnpError::InvalidUserInput("no pending file offer".into()))?;
            if !g.pending.contains_key(&target) {
                return Err(LsnpError::InvalidUserInput(format!(
                    "no pending transfer for file id {target}"
                )));
            }
            g.accepted.insert(target.clone());
            let complete = g.pending[&target].is_complete();
            (target, complete)
        };
        if complete {
            self.persist(&target)?;
        }
        Ok(target)
    }

    pub fn reject_file(&self, fid: Option<MessageId>) -> Result<MessageId, LsnpError> {
        let mut g = self.inner.lock().unwrap();
        let target = fid
            .or_else(|| g.recent.clone())
            .ok_or_else(|| LsnpError::InvalidUserInput("no pending file offer".into()))?;
        g.pending.remove(&target);
        g.accepted.remove(&target);
        Ok(target)
    }

    pub fn is_accepted(&self, fid: &MessageId) -> bool {
        self.inner.lock().unwrap().accepted.contains(fid)
    }

    /// On the first chunk for a transfer, a `total_chunks` mismatch against
    /// the FILE_OFFER reinitializes the buffer (first chunk wins); once
    /// progress has begun, a later mismatched chunk is logged and ignored.
    /// Returns whether the transfer is now complete.
    pub fn add_chunk(
        &self,
        fid: &MessageId,
        index: usize,
        data_b64: &str,
        total_chunks: usize,
    ) -> Result<bool, LsnpError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data_b64)
            .map_err(|e| LsnpError::MalformedFrame(format!("invalid base64 chunk data: {e}")))?;

        let mut g = self.inner.lock().unwrap();
        let ft = g
            .pending
            .get_mut(fid)
            .ok_or_else(|| LsnpError::InvalidUserInput(format!("unknown file transfer {fid}")))?;

        if ft.total_chunks != total_chunks {
            if ft.received_count == 0 {
                ft.total_chunks = total_chunks;
                ft.chunks = vec![None; total_chunks];
            } else {
                tracing::warn!(
                    %fid,
                    "ignoring chunk claiming a different total_chunks for an in-progress transfer"
                );
                return Ok(ft.is_complete());
            }
        }

        if index >= ft.chunks.len() {
            return Err(LsnpError::MalformedFrame(format!(
                "chunk index {index} out of range for {fid}"
            )));
        }
        if ft.chunks[index].is_none() {
            ft.chunks[index] = Some(bytes);
            ft.received_count += 1;
        }
        Ok(ft.is_complete())
    }

    /// Persists every accepted, fully-received transfer; returns their ids.
    pub fn complete_transfers(&self) -> Result<Vec<MessageId>, LsnpError> {
        let ready: Vec<MessageId> = {
            let g = self.inner.lock().unwrap();
            g.accepted
                .iter()
                .filter(|fid| g.pending.get(*fid).map(|t| t.is_complete()).unwrap_or(false))
                .cloned()
                .collect()
        };
        let mut done = Vec::new();
        for fid in ready {
            self.persist(&fid)?;
            done.push(fid);
        }
        Ok(done)
    }

    /// Purges transfers whose originating FILE_OFFER has expired.
    pub fn remove_transfers(&self, ids: &[MessageId]) {
        let mut g = self.inner.lock().unwrap();
        for id in ids {
            g.pending.remove(id);
            g.accepted.remove(id);
        }
    }

    fn persist(&self, fid: &MessageId) -> Result<(), LsnpError> {
        let (filename, bytes) = {
            let mut g = self.inner.lock().unwrap();
            let ft = g
                .pending
                .get(fid)
                .ok_or_else(|| LsnpError::IncompleteTransfer(fid.to_string()))?;
            let mut bytes = Vec::with_capacity(ft.filesize as usize);
            for (i, chunk) in ft.chunks.iter().enumerate() {
                match chunk {
                    Some(c) => bytes.extend_from_slice(c),
                    None => {
                        return Err(LsnpError::IncompleteTransfer(format!(
                            "{fid} is missing chunk {i}"
                        )))
                    }
                }
            }
            let filename = ft.filename.clone();
            g.pending.remove(fid);
            g.accepted.remove(fid);
            (filename, bytes)
        };

        std::fs::create_dir_all(&self.received_dir)?;
        std::fs::write(self.received_dir.join(&filename), &bytes)?;
        tracing::info!(%fid, filename, bytes = bytes.len(), "persisted completed file transfer");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    fn fid() -> MessageId {
        MessageId::generate()
    }

    #[test]
    fn chunks_in_any_order_reassemble_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let state = FileTransferState::new(dir.path().to_path_buf());
        let id = fid();
        state.add_pending_transfer(
            id.clone(),
            FileTransfer::new("image.png".into(), 6, "image/png".into(), 3, 2),
        );
        state.accept_file(Some(id.clone())).unwrap();

        let chunks: [&[u8]; 3] = [b"ab", b"cd", b"ef"];
        let encoded: Vec<String> = chunks
            .iter()
            .map(|c| base64::engine::general_purpose::STANDARD.encode(c))
            .collect();

        assert!(!state.add_chunk(&id, 2, &encoded[2], 3).unwrap());
        assert!(!state.add_chunk(&id, 0, &encoded[0], 3).unwrap());
        assert!(state.add_chunk(&id, 1, &encoded[1], 3).unwrap());

        state.complete_transfers().unwrap();
        let bytes = std::fs::read(dir.path().join("image.png")).unwrap();
        assert_eq!(bytes, b"abcdef");
    }

    #[test]
    fn duplicate_chunk_does_not_double_count() {
        let dir = tempfile::tempdir().unwrap();
        let state = FileTransferState::new(dir.path().to_path_buf());
        let id = fid();
        state.add_pending_transfer(
            id.clone(),
            FileTransfer::new("f.bin".into(), 2, "application/octet-stream".into(), 2, 1),
        );
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"x");
        state.add_chunk(&id, 0, &encoded, 2).unwrap();
        state.add_chunk(&id, 0, &encoded, 2).unwrap();
        // received_count must not have been double-incremented.
        assert!(!state.add_chunk(&id, 0, &encoded, 2).unwrap());
    }

    #[test]
    fn accept_after_completion_persists_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let state = FileTransferState::new(dir.path().to_path_buf());
        let id = fid();
        state.add_pending_transfer(
            id.clone(),
            FileTransfer::new("f.bin".into(), 1, "application/octet-stream".into(), 1, 1),
        );
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"z");
        state.add_chunk(&id, 0, &encoded, 1).unwrap();
        state.accept_file(Some(id)).unwrap();
        assert_eq!(std::fs::read(dir.path().join("f.bin")).unwrap(), b"z");
    }
}
