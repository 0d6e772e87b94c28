//! CLI commands for greenpath-route.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::cost::{CostModel, RoutingProfile};
use crate::graph::loader::{load_graph, GraphConfig};
use crate::graph::{GraphHandle, TravelMode, DEFAULT_MAX_SNAP_DISTANCE_M};
use crate::refresh::{spawn_refresh_loop, DirectEdgeAttribution, FileAqiSource, RefreshCoordinator};
use crate::search::{PathEngine, SearchConfig};
use crate::server::{run_server, AppState};

#[derive(Parser)]
#[command(name = "greenpath-route")]
#[command(about = "Exposure-aware green-path routing engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP query server with a recurring AQI refresh
    Serve {
        /// Serialized graph file
        #[arg(short, long)]
        graph: PathBuf,

        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// AQI snapshot document polled on the refresh interval
        #[arg(long)]
        aqi_file: Option<PathBuf>,

        /// Refresh interval in seconds
        #[arg(long, default_value = "300")]
        aqi_interval_secs: u64,

        /// Maximum snap distance in meters
        #[arg(long, default_value_t = DEFAULT_MAX_SNAP_DISTANCE_M)]
        max_snap_distance_m: f64,
    },

    /// Find route alternatives between two coordinates
    Route {
        /// Serialized graph file
        graph: PathBuf,

        /// Origin coordinate (lat,lon)
        #[arg(long)]
        from: String,

        /// Destination coordinate (lat,lon)
        #[arg(long)]
        to: String,

        /// Travel mode (walk, bike, transit)
        #[arg(long, default_value = "walk")]
        mode: String,

        /// Exposure sensitivity in [0, 1]
        #[arg(long, default_value = "0.5")]
        sensitivity: f64,

        /// Number of alternatives
        #[arg(short = 'k', long, default_value = "3")]
        alternatives: usize,
    },

    /// Print summary statistics for a graph file
    Inspect {
        /// Serialized graph file
        graph: PathBuf,
    },
}

fn parse_coord(s: &str) -> Result<(f64, f64)> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 2 {
        anyhow::bail!("Coordinate must be in format 'lat,lon'");
    }
    let lat = parts[0].trim().parse::<f64>()?;
    let lon = parts[1].trim().parse::<f64>()?;
    Ok((lat, lon))
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Serve {
                graph,
                port,
                aqi_file,
                aqi_interval_secs,
                max_snap_distance_m,
            } => {
                println!("Loading graph from {}...", graph.display());
                let loaded = load_graph(&graph, GraphConfig { max_snap_distance_m })?;
                println!(
                    "  ✓ {} nodes, {} edges (version {})",
                    loaded.node_count(),
                    loaded.edge_count(),
                    loaded.version()
                );

                let handle = GraphHandle::new(loaded);
                let engine = PathEngine::new(CostModel::default(), SearchConfig::default());
                let coordinator = Arc::new(RefreshCoordinator::new(
                    handle.clone(),
                    Box::new(DirectEdgeAttribution),
                ));

                let rt = tokio::runtime::Runtime::new()?;
                rt.block_on(async {
                    let (shutdown_tx, shutdown_rx) = watch::channel(false);
                    let refresh_task = aqi_file.map(|path| {
                        println!(
                            "Polling AQI snapshots from {} every {}s",
                            path.display(),
                            aqi_interval_secs
                        );
                        spawn_refresh_loop(
                            coordinator.clone(),
                            Arc::new(FileAqiSource::new(path)),
                            Duration::from_secs(aqi_interval_secs),
                            shutdown_rx,
                        )
                    });

                    let state = AppState::new(handle, engine, coordinator);
                    let result = run_server(state, port).await;

                    let _ = shutdown_tx.send(true);
                    if let Some(task) = refresh_task {
                        let _ = task.await;
                    }
                    result
                })
            }
            Commands::Route {
                graph,
                from,
                to,
                mode,
                sensitivity,
                alternatives,
            } => {
                let mode = TravelMode::parse(&mode)
                    .ok_or_else(|| anyhow!("invalid mode: {mode}. Use walk, bike, or transit."))?;
                let from = parse_coord(&from)?;
                let to = parse_coord(&to)?;

                println!("Loading graph from {}...", graph.display());
                let loaded = load_graph(&graph, GraphConfig::default())?;

                let engine = PathEngine::new(
                    CostModel::default(),
                    SearchConfig {
                        max_candidates: alternatives.max(1),
                        ..SearchConfig::default()
                    },
                );
                let profile = RoutingProfile::new(mode, sensitivity);
                let cancel = CancellationToken::new();
                let routes =
                    engine.find_routes(&loaded, from, to, &profile, alternatives, &cancel)?;

                println!(
                    "\n{} route(s), {} mode, sensitivity {:.2}:",
                    routes.len(),
                    mode.name(),
                    profile.sensitivity()
                );
                for (rank, route) in routes.iter().enumerate() {
                    println!(
                        "  #{} {:.0} m  cost {:.0}  noise {:.1} dB  greenery {:.2}  AQI {:.1}  ({} nodes)",
                        rank + 1,
                        route.length_m,
                        route.cost,
                        route.mean_noise_db,
                        route.mean_greenery,
                        route.mean_aqi,
                        route.nodes.len()
                    );
                }
                Ok(())
            }
            Commands::Inspect { graph } => {
                let loaded = load_graph(&graph, GraphConfig::default())?;
                let mut by_mode = [0usize; 3];
                let mut total_length = 0.0;
                for id in 0..loaded.edge_count() as u32 {
                    let edge = loaded.edge(id);
                    total_length += edge.length_m;
                    by_mode[match edge.mode {
                        TravelMode::Walk => 0,
                        TravelMode::Bike => 1,
                        TravelMode::Transit => 2,
                    }] += 1;
                }
                println!("Graph version: {}", loaded.version());
                println!("Nodes: {}", loaded.node_count());
                println!("Edges: {}", loaded.edge_count());
                println!("  walk: {}, bike: {}, transit: {}", by_mode[0], by_mode[1], by_mode[2]);
                println!("Total edge length: {:.1} km", total_length / 1000.0);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_coord;

    #[test]
    fn parses_lat_lon_pairs() {
        assert_eq!(parse_coord("60.16, 24.94").unwrap(), (60.16, 24.94));
        assert!(parse_coord("60.16").is_err());
        assert!(parse_coord("a,b").is_err());
    }
}
