//! HTTP upgrade handshake, client side.

pub mod handshake;

pub use handshake::{
    HandshakeRequest, HandshakeResponse, ResponseHead, UpgradeRejection, WS_GUID,
    compute_accept_key, find_head_end, generate_key,
};
