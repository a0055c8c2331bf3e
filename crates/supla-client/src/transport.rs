//! Transport setup for peers.
//!
//! Both listeners speak the same framed protocol; the TLS path trusts
//! any server certificate because lightweight deployments run on
//! self-signed material.

use std::sync::Arc;

use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::CryptoProvider,
    pki_types::{CertificateDer, ServerName, UnixTime},
    DigitallySignedStruct, SignatureScheme,
};
use supla_proto::{PacketReader, PacketSender, PacketStream};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tokio_rustls::TlsConnector;

use crate::error::ClientError;

/// Packet stream over an erased transport.
pub type ClientStream =
    PacketStream<Box<dyn AsyncRead + Send + Unpin>, Box<dyn AsyncWrite + Send + Unpin>>;

/// Accepts any server certificate; signatures are still checked.
#[derive(Debug)]
struct TrustAnyCert(Arc<CryptoProvider>);

impl ServerCertVerifier for TrustAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

fn split_boxed<S>(stream: S) -> ClientStream
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read, write) = tokio::io::split(stream);
    PacketStream {
        reader: PacketReader::new(Box::new(read)),
        sender: PacketSender::new(Box::new(write)),
    }
}

/// Open a packet stream to a server, optionally over TLS.
pub async fn connect(host: &str, port: u16, secure: bool) -> Result<ClientStream, ClientError> {
    let tcp = TcpStream::connect((host, port)).await?;
    if !secure {
        return Ok(split_boxed(tcp));
    }

    let provider = match CryptoProvider::get_default() {
        Some(provider) => Arc::clone(provider),
        None => {
            let _ = CryptoProvider::install_default(rustls::crypto::ring::default_provider());
            Arc::new(rustls::crypto::ring::default_provider())
        },
    };

    let config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(TrustAnyCert(provider)))
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));
    let server_name = ServerName::try_from(host.to_owned())
        .map_err(|_| rustls::Error::General(format!("invalid server name {host:?}")))?;
    let tls = connector.connect(server_name, tcp).await?;
    Ok(split_boxed(tls))
}
