//cargo run --package annotation --bin annotation_mcp_server
use annotation::{config::ConversionConfig, mcp::AnnotationMcpServer};
use rmcp::{transport::stdio, ServiceExt};
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    // Set up logging to stderr (MCP uses stdout for protocol communication)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish()
        .init();

    // ANNOTATION_CONFIG points at a .toml or .json file
    let config = match std::env::var("ANNOTATION_CONFIG") {
        Ok(path) => {
            tracing::info!("Loading configuration from {}", path);
            ConversionConfig::from_file(&path)?
        }
        Err(_) => ConversionConfig::default(),
    };

    tracing::info!("Starting Slide Annotation Conversion MCP server");

    let server = AnnotationMcpServer::with_config(config);

    let service = match server.serve(stdio()).await {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to start MCP server: {:?}", e);
            return Err(e.into());
        }
    };

    tracing::info!("MCP server started, listening on stdio");

    tokio::select! {
        result = service.waiting() => {
            match result {
                Ok(_) => tracing::info!("MCP server completed successfully"),
                Err(e) => {
                    tracing::error!("MCP server error: {:?}", e);
                    return Err(e.into());
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down gracefully");
        }
    }

    tracing::info!("MCP server shut down");
    Ok(())
}
