use http::header;
use micro_bridge::{EmbeddedServer, HandlerError, ServerConfig, ServerHttpRequest, ServerHttpResponse, handler_fn};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

async fn echo(request: ServerHttpRequest, mut response: Box<dyn ServerHttpResponse>) -> Result<(), HandlerError> {
    info!("{}{} {}", request.log_prefix(), request.method(), request.uri());

    let body = format!("{} {}\r\n", request.method(), request.path());
    if let Some(headers) = response.headers_mut() {
        headers.insert(header::CONTENT_TYPE, "text/plain; charset=utf-8".parse()?);
    }
    response.write_with(body.into()).await?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let port = std::env::args().nth(1).map(|port| port.parse()).transpose()?.unwrap_or(8080);

    let mut server = EmbeddedServer::with_config(ServerConfig::builder().host("127.0.0.1").port(port).build());
    server.set_handler(handler_fn(echo));
    server.init()?;
    server.start()?;
    info!(port = server.port(), "embedded server is up, press ctrl-c to stop");

    tokio::runtime::Builder::new_current_thread().enable_all().build()?.block_on(tokio::signal::ctrl_c())?;

    server.stop()?;
    server.reset();
    Ok(())
}
