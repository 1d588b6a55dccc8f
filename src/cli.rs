use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "liquidmesh-node")]
#[command(version, about = "LiquidMesh P2P transport substrate node", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the node: bring up configured drivers and dial direct peers
    /// (default mode).
    Run,

    /// Print the node's configuration without starting any driver.
    Info,

    /// Run the node and periodically report connected-peer counts.
    Monitor {
        #[arg(short, long, default_value = "10", help = "Update interval in seconds")]
        interval: u64,
    },
}
