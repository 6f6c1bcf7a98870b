// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use super::{Request, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default upper bound on a single frame body
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("Failed to encode message: {0}")]
    Encode(String),

    #[error("Failed to decode message: {0}")]
    Decode(String),
}

/// Length-prefixed bincode framing: a 4-byte big-endian length, then the body
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_bytes: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameCodec {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    pub async fn read_request<T>(&self, io: &mut T) -> Result<Request, CodecError>
    where
        T: AsyncRead + Unpin + Send,
    {
        self.read_frame(io).await
    }

    pub async fn read_response<T>(&self, io: &mut T) -> Result<Response, CodecError>
    where
        T: AsyncRead + Unpin + Send,
    {
        self.read_frame(io).await
    }

    pub async fn write_request<T>(&self, io: &mut T, request: &Request) -> Result<(), CodecError>
    where
        T: AsyncWrite + Unpin + Send,
    {
        self.write_frame(io, request).await
    }

    pub async fn write_response<T>(
        &self,
        io: &mut T,
        response: &Response,
    ) -> Result<(), CodecError>
    where
        T: AsyncWrite + Unpin + Send,
    {
        self.write_frame(io, response).await
    }

    async fn read_frame<M, T>(&self, io: &mut T) -> Result<M, CodecError>
    where
        M: DeserializeOwned,
        T: AsyncRead + Unpin + Send,
    {
        let mut len_bytes = [0u8; 4];
        io.read_exact(&mut len_bytes).await?;
        let len = u32::from_be_bytes(len_bytes) as usize;

        // Refuse before allocating
        if len > self.max_frame_bytes {
            return Err(CodecError::FrameTooLarge {
                size: len,
                limit: self.max_frame_bytes,
            });
        }

        let mut buf = vec![0u8; len];
        io.read_exact(&mut buf).await?;

        bincode::deserialize(&buf).map_err(|e| CodecError::Decode(e.to_string()))
    }

    async fn write_frame<M, T>(&self, io: &mut T, message: &M) -> Result<(), CodecError>
    where
        M: Serialize,
        T: AsyncWrite + Unpin + Send,
    {
        let data = bincode::serialize(message).map_err(|e| CodecError::Encode(e.to_string()))?;
        if data.len() > self.max_frame_bytes {
            return Err(CodecError::FrameTooLarge {
                size: data.len(),
                limit: self.max_frame_bytes,
            });
        }

        let len = data.len() as u32;
        io.write_all(&len.to_be_bytes()).await?;
        io.write_all(&data).await?;
        io.flush().await?;
        Ok(())
    }
}
