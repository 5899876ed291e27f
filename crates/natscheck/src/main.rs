//! natscheck binary entry point.

use clap::Parser;
use log::error;
use natscheck::cli::Cli;
use natscheck::dialer::TcpDialer;
use natscheck::telemetry;

#[tokio::main]
async fn main() {
    telemetry::init();

    let cli = Cli::parse();
    match cli.probe().run(&TcpDialer).await {
        Ok(reply) => println!("{reply}"),
        Err(err) => {
            error!("health check failed: {err}");
            std::process::exit(1);
        }
    }
}
