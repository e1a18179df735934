//! Streaming server fed by the synthetic camera
//!
//! Run with: cargo run --example camera_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example camera_server                    # binds to 0.0.0.0:8000
//!   cargo run --example camera_server localhost          # binds to 127.0.0.1:8000
//!   cargo run --example camera_server 127.0.0.1:9000     # binds to 127.0.0.1:9000
//!
//! ## Watching
//!
//! Connect a WebSocket client to `ws://localhost:8000/ws`; every binary
//! message is one JPEG frame. The camera starts with the first viewer and
//! stops after the last one leaves.
//!
//! ## Controlling
//!
//!   curl -X POST localhost:8000/start
//!   curl -X POST localhost:8000/stop
//!   curl localhost:8000/stats

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use image::{Rgb, RgbImage};

use framecast::pipeline::{InferenceModel, JpegAnnotator, StreamConfig, StreamController, SyntheticCamera};
use framecast::registry::SubscriptionRegistry;
use framecast::server::config::DEFAULT_PORT;
use framecast::{FramecastServer, InferenceError, ServerConfig};

/// Stand-in detector: outlines the middle of the frame
struct CenterBox {
    colour: Rgb<u8>,
    thickness: u32,
}

impl InferenceModel for CenterBox {
    fn infer(&self, mut image: RgbImage) -> Result<RgbImage, InferenceError> {
        let (width, height) = image.dimensions();
        if width < 4 || height < 4 {
            return Err(InferenceError::new(format!("frame too small: {}x{}", width, height)));
        }

        let (left, top) = (width / 4, height / 4);
        let (right, bottom) = (width - width / 4, height - height / 4);

        for y in top..bottom {
            for x in left..right {
                let edge = x < left + self.thickness
                    || x + self.thickness >= right
                    || y < top + self.thickness
                    || y + self.thickness >= bottom;
                if edge {
                    image.put_pixel(x, y, self.colour);
                }
            }
        }

        Ok(image)
    }
}

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:8000
/// - "localhost:9000" -> 127.0.0.1:9000
/// - "127.0.0.1" -> 127.0.0.1:8000
/// - "0.0.0.0:9000" -> 0.0.0.0:9000
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: camera_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:8000)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let config = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => ServerConfig::with_addr(addr),
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => ServerConfig::default(),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("framecast=debug".parse()?)
                .add_directive("camera_server=debug".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    let model = CenterBox {
        colour: Rgb([0, 255, 0]),
        thickness: 3,
    };

    let controller = StreamController::new(
        SyntheticCamera::new(Duration::from_millis(33)),
        JpegAnnotator::new(model),
        Arc::new(SubscriptionRegistry::new()),
        StreamConfig::default(),
    );

    println!("Starting frame server on {}", config.bind_addr);
    println!("Watch:  ws://{}/ws", config.bind_addr);
    println!("Stats:  curl {}/stats", config.bind_addr);
    println!();

    let server = FramecastServer::new(config, controller);

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        println!("\nShutting down...");
    };

    if let Err(e) = server.run_until(shutdown).await {
        eprintln!("Server error: {}", e);
    }

    Ok(())
}
