use std::{sync::Arc, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand};
use commuter::{
    aggregate::Aggregator,
    config::TrackerConfig,
    directions::GoogleDirections,
    model::{AddressId, Role, Route},
    recommend::{RecommendError, Recommender},
    sampler::{RouteSampler, SampleRunOutcome},
    scheduler::Scheduler,
    store::{AddressRegistry, RedbStore},
};
use log::{error, info};

extern crate commuter;

#[derive(Parser)]
#[command(about = "Tracks commute times and suggests when to leave")]
struct Cli {
    #[command(flatten)]
    config: TrackerConfig,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register an address: `origin` (or `home`) / `destination` (or `work`).
    Add {
        role: Role,
        label: String,
        address: String,
    },
    List {
        #[arg(long = "type")]
        role: Option<Role>,
    },
    Delete { id: u64 },
    /// Sample every origin/destination pair once.
    Poll,
    /// Sample continuously until interrupted.
    Monitor {
        /// Minutes between samples.
        #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
        interval: u64,
    },
    Recommend {
        origin_id: u64,
        destination_id: u64,
        /// Target arrival time, HH:MM.
        #[arg(long, default_value = "09:00")]
        arrival: String,
    },
    Stats {
        origin_id: u64,
        destination_id: u64,
    },
    Current {
        origin_id: u64,
        destination_id: u64,
    },
}

type Sampler = RouteSampler<RedbStore, GoogleDirections>;

fn report(outcome: &SampleRunOutcome) {
    match outcome {
        SampleRunOutcome::Unconfigured => {
            println!("Warning: Google Maps API key not configured. Cannot poll commute times.")
        }
        SampleRunOutcome::NoPairs { .. } => {
            println!("No origin or destination addresses configured yet.")
        }
        SampleRunOutcome::Completed(report) => {
            for collected in &report.collected {
                println!("Logged: {}", collected);
            }
            for failure in &report.failures {
                println!(
                    "Error polling {} → {}: {}",
                    failure.origin.label, failure.destination.label, failure.error
                );
            }
        }
    }
}

async fn poll(sampler: &Sampler) {
    match sampler.sample_all().await {
        Ok(outcome) => report(&outcome),
        Err(err) => error!("Sampling run failed: {}", err),
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::init();
    let cli = Cli::parse();
    let store = Arc::new(
        RedbStore::open(&cli.config.db_path).context("Failed to open commute database")?,
    );

    match cli.command {
        Command::Add {
            role,
            label,
            address,
        } => {
            let address = store.add_address(&label, &address, role)?;
            println!(
                "Added {} address '{}' with ID {}",
                address.role, address.label, address.id
            );
        }
        Command::List { role } => {
            let addresses = store.addresses(role)?;
            if addresses.is_empty() {
                println!("No addresses found");
            } else {
                println!("\n{:<5} {:<12} {:<20} Address", "ID", "Type", "Label");
                println!("{}", "-".repeat(80));
                for address in addresses {
                    println!(
                        "{:<5} {:<12} {:<20} {}",
                        address.id.to_string(),
                        address.role.to_string(),
                        address.label,
                        address.address
                    );
                }
            }
        }
        Command::Delete { id } => {
            if store.delete_address(AddressId(id))? {
                println!("Deleted address with ID {}", id);
            } else {
                eprintln!("Error: Address with ID {} not found", id);
            }
        }
        Command::Poll => {
            let sampler = Sampler::new(
                store,
                cli.config.routing()?,
                cli.config.slot_zone()?,
                cli.config.query_timeout(),
            );
            println!("Polling current commute times...");
            poll(&sampler).await;
        }
        Command::Monitor { interval } => {
            let sampler = Sampler::new(
                store,
                cli.config.routing()?,
                cli.config.slot_zone()?,
                cli.config.query_timeout(),
            );
            let scheduler = Scheduler::new(Duration::from_secs(interval * 60))?;
            println!(
                "Starting continuous monitoring (polling every {} minutes)",
                interval
            );
            println!("Press Ctrl+C to stop");
            let sampler = &sampler;
            let runs = scheduler
                .run(
                    || poll(sampler),
                    async {
                        if let Err(err) = tokio::signal::ctrl_c().await {
                            error!("Failed to listen for Ctrl+C: {}", err);
                        }
                    },
                )
                .await;
            info!("Monitoring finished after {} run(s)", runs);
            println!("\nMonitoring stopped");
        }
        Command::Recommend {
            origin_id,
            destination_id,
            arrival,
        } => {
            let route = Route::new(AddressId(origin_id), AddressId(destination_id));
            let recommendations = match Recommender::new(store.as_ref()).recommend(route, &arrival)
            {
                Ok(recommendations) => recommendations,
                Err(RecommendError::InvalidArrival(err)) => anyhow::bail!(err),
                Err(err) => return Err(err.into()),
            };
            if recommendations.is_empty() {
                println!("Not enough data yet. Run 'monitor' to collect commute data.");
            } else {
                println!("\nOptimal departure times to arrive by {}:", arrival);
                println!(
                    "\n{:<12} {:<10} {:<12} Data Points",
                    "Day", "Depart", "Duration"
                );
                println!("{}", "-".repeat(60));
                for recommendation in recommendations {
                    println!(
                        "{:<12} {:<10} {:<12} {}",
                        recommendation.day,
                        recommendation.departure.to_string(),
                        format!("{} min", recommendation.expected_duration_minutes),
                        recommendation.data_points
                    );
                }
            }
        }
        Command::Stats {
            origin_id,
            destination_id,
        } => {
            let route = Route::new(AddressId(origin_id), AddressId(destination_id));
            let stats = Aggregator::new(store.as_ref()).statistics(route)?;
            if stats.total_samples == 0 {
                println!("No data available for this route yet.");
            } else {
                println!("\nRoute Statistics:");
                println!("  Total data points: {}", stats.total_samples);
                println!("  Minimum time:      {} minutes", stats.min_minutes);
                println!("  Average time:      {} minutes", stats.avg_minutes);
                println!("  Maximum time:      {} minutes", stats.max_minutes);
            }
        }
        Command::Current {
            origin_id,
            destination_id,
        } => {
            let sampler = Sampler::new(
                store,
                cli.config.routing()?,
                cli.config.slot_zone()?,
                cli.config.query_timeout(),
            );
            let route = Route::new(AddressId(origin_id), AddressId(destination_id));
            match sampler.current_estimate(route).await {
                Ok(estimate) => {
                    println!("\nCurrent commute time:");
                    println!(
                        "  Without traffic: {} minutes",
                        estimate.duration_seconds / 60
                    );
                    println!(
                        "  With traffic:    {} minutes",
                        estimate.traffic_or_plain_seconds() / 60
                    );
                    println!(
                        "  Distance:        {:.1} km",
                        estimate.distance_meters as f64 / 1000.0
                    );
                }
                Err(err) => {
                    println!("Could not get current commute time: {}", err);
                }
            }
        }
    }
    Ok(())
}
