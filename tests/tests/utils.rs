use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs logging once per test binary and starts a fresh mock service on
/// an ephemeral port owned by the calling test's runtime.
#[allow(unused)]
pub async fn init() -> SocketAddr {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::new(
                "rampage=debug,mock_service=info,axum::rejection=trace",
            ))
            .try_init();
    });

    mock_service::spawn()
        .await
        .expect("mock service failed to bind")
}

/// An address nothing is listening on.
#[allow(unused)]
pub async fn closed_port() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().expect("no local address");
    drop(listener);
    addr
}
