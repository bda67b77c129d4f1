use std::net::{Ipv4Addr, SocketAddr};

use tokio::net::TcpListener;

/// Port from the first argument, else `PORT`, else 8080.
fn port() -> Result<u16, std::io::Error> {
    let raw = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PORT").ok())
        .unwrap_or_else(|| "8080".to_string());
    raw.parse().map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("bad port {raw:?}"))
    })
}

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port()?));
    let listener = TcpListener::bind(addr).await?;
    println!("echo server started on port {}", addr.port());
    mock_server::run(listener).await
}
