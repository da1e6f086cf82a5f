//! Session establishment over a framed stream.
//!
//! ```text
//! Initiator                          Responder
//!   KeyShare(pub_i)        ───────►
//!                          ◄───────  KeyShare(pub_r)
//!   KeyConfirm(tag_i)      ───────►  verify tag_i
//!   verify tag_r           ◄───────  KeyConfirm(tag_r)
//! ```
//!
//! The session key itself never crosses the wire.

use channel_core::{KeyAgreement, Role, SessionKey};
use channel_types::{Handshake, KeyConfirm, KeyShare, HANDSHAKE_VERSION, PUBLIC_KEY_SIZE};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::HandshakeError;
use crate::frame::{read_frame, write_frame};

/// Run the handshake for `role` and return the confirmed session key.
pub async fn establish<S>(
    stream: &mut S,
    role: Role,
    max_frame_size: usize,
) -> Result<SessionKey, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let agreement = KeyAgreement::new();
    let share = Handshake::KeyShare(KeyShare {
        version: HANDSHAKE_VERSION,
        public_key: agreement.public_key(),
    });

    let peer_key = match role {
        Role::Initiator => {
            send(stream, &share, max_frame_size).await?;
            recv_key_share(stream, max_frame_size).await?
        }
        Role::Responder => {
            let peer_key = recv_key_share(stream, max_frame_size).await?;
            send(stream, &share, max_frame_size).await?;
            peer_key
        }
    };

    let agreed = agreement.complete(role, &peer_key)?;
    let ours = Handshake::KeyConfirm(KeyConfirm {
        tag: agreed.confirm_tag(),
    });

    match role {
        Role::Initiator => {
            send(stream, &ours, max_frame_size).await?;
            let tag = recv_key_confirm(stream, max_frame_size).await?;
            agreed.verify_peer(&tag)?;
        }
        Role::Responder => {
            let tag = recv_key_confirm(stream, max_frame_size).await?;
            agreed.verify_peer(&tag)?;
            send(stream, &ours, max_frame_size).await?;
        }
    }

    tracing::debug!("Handshake complete as {:?}", role);
    Ok(agreed.into_key())
}

async fn send<S>(stream: &mut S, message: &Handshake, max_frame_size: usize) -> Result<(), HandshakeError>
where
    S: AsyncWrite + Unpin,
{
    let bytes = message.to_bytes()?;
    write_frame(stream, &bytes, max_frame_size).await?;
    Ok(())
}

async fn recv<S>(stream: &mut S, max_frame_size: usize) -> Result<Handshake, HandshakeError>
where
    S: AsyncRead + Unpin,
{
    let bytes = read_frame(stream, max_frame_size)
        .await?
        .ok_or(HandshakeError::Closed)?;
    Ok(Handshake::from_bytes(&bytes)?)
}

async fn recv_key_share<S>(
    stream: &mut S,
    max_frame_size: usize,
) -> Result<[u8; PUBLIC_KEY_SIZE], HandshakeError>
where
    S: AsyncRead + Unpin,
{
    match recv(stream, max_frame_size).await? {
        Handshake::KeyShare(share) if share.version == HANDSHAKE_VERSION => Ok(share.public_key),
        Handshake::KeyShare(share) => Err(HandshakeError::VersionMismatch {
            local: HANDSHAKE_VERSION,
            remote: share.version,
        }),
        other => Err(HandshakeError::UnexpectedMessage {
            expected: "KeyShare",
            actual: other.kind(),
        }),
    }
}

async fn recv_key_confirm<S>(stream: &mut S, max_frame_size: usize) -> Result<Vec<u8>, HandshakeError>
where
    S: AsyncRead + Unpin,
{
    match recv(stream, max_frame_size).await? {
        Handshake::KeyConfirm(confirm) => Ok(confirm.tag),
        other => Err(HandshakeError::UnexpectedMessage {
            expected: "KeyConfirm",
            actual: other.kind(),
        }),
    }
}
