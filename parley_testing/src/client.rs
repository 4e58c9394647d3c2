//! Client helpers for talking to a running server.

use std::{io, net::SocketAddr, time::Duration};

use futures::{SinkExt, StreamExt};
use parley::{
    Request,
    Response,
    codec::{CodecError, ResponseCodec},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::sleep,
};
use tokio_util::codec::Framed;

/// Send `request` through the line codec and decode the single response.
///
/// # Errors
///
/// Returns [`CodecError::MalformedRequest`] if `request` cannot be framed,
/// [`CodecError::MalformedResponse`] if the reply breaks the grammar, and
/// [`CodecError::Io`] if the connection fails or closes without a reply.
pub async fn send_request(addr: SocketAddr, request: Request) -> Result<Response, CodecError> {
    let stream = TcpStream::connect(addr).await?;
    let mut framed = Framed::new(stream, ResponseCodec::default());
    framed.send(request).await?;
    match framed.next().await {
        Some(response) => response,
        None => Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
    }
}

/// Write `bytes`, half-close the connection, and return everything the
/// server wrote before closing.
///
/// # Errors
///
/// Returns any I/O error raised while connecting, writing or reading.
pub async fn send_raw(addr: SocketAddr, bytes: &[u8]) -> io::Result<Vec<u8>> {
    send_chunks(addr, &[bytes], Duration::ZERO).await
}

/// Like [`send_raw`], but write `chunks` separately with `pause` between them.
///
/// # Errors
///
/// Returns any I/O error raised while connecting, writing or reading.
pub async fn send_chunks(
    addr: SocketAddr,
    chunks: &[&[u8]],
    pause: Duration,
) -> io::Result<Vec<u8>> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 && !pause.is_zero() {
            sleep(pause).await;
        }
        stream.write_all(chunk).await?;
        stream.flush().await?;
    }
    stream.shutdown().await?;

    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await?;
    Ok(reply)
}

/// Connect and close again without sending anything.
///
/// Returns the bytes the server wrote before closing, which should be none.
///
/// # Errors
///
/// Returns any I/O error raised while connecting or reading.
pub async fn connect_and_close(addr: SocketAddr) -> io::Result<Vec<u8>> {
    send_chunks(addr, &[], Duration::ZERO).await
}
