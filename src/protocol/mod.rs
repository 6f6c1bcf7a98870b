// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Wire protocol
//!
//! One request and one response per TCP connection, each carried in a
//! length-prefixed bincode frame.

pub mod codec;
pub mod messages;

pub use codec::{CodecError, FrameCodec, DEFAULT_MAX_FRAME_BYTES};
pub use messages::{
    AuthFailure, Authenticator, ErrorKind, ErrorSignal, Payload, Reply, Request, Response,
};
