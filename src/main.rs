use anyhow::Result;
use std::fs::File;
use std::io::Write;
use std::time::Instant;
use log::{info, error, debug};

use opinion_common::{SimulationConfig, Snapshot};
use opinion_engine::OpinionSimulation;

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    info!("Starting Opinion Engine (CPU Parallel)...");

    // --- Load Configuration ---
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = SimulationConfig::load(&config_path)?;

    info!("Using {} Rayon threads.", rayon::current_num_threads());

    // --- Initialize Simulation ---
    info!("Initializing lattice state on CPU...");
    let mut sim = OpinionSimulation::new(config)?;
    info!(
        "Lattice initialized: {}x{} cells, {} opinion values, seed {}.",
        sim.params().width,
        sim.params().height,
        sim.params().opinion_count,
        sim.params().seed
    );
    debug!("Simulation Parameters: {:#?}", sim.params());

    // --- Simulation Loop ---
    let total_steps = sim.config().timing.total_steps;
    let record_interval_steps = sim.config().timing.record_interval_steps.max(1);
    info!("Recording snapshot every {} steps.", record_interval_steps);

    info!("Starting simulation loop for {} steps...", total_steps);
    let start_time = Instant::now();
    let mut previous_print_time = start_time;

    // --- Initial Snapshot (step = 0) ---
    sim.record_snapshot();

    for step in 0..total_steps {
        let step_start_time = Instant::now();
        if let Err(e) = sim.step() {
            error!("Error during simulation step {}: {}", step + 1, e);
            anyhow::bail!("Simulation step failed.");
        }
        let step_duration = step_start_time.elapsed();

        // Print status periodically
        let current_time = Instant::now();
        let print_interval_secs = 5.0;
        let should_print_status =
            current_time.duration_since(previous_print_time).as_secs_f64() >= print_interval_secs;
        let is_record_step = (step + 1) % record_interval_steps == 0;
        let is_last_step = step == total_steps - 1;

        if should_print_status || is_record_step || is_last_step {
            info!(
                "Step [{}/{}] | Leaders: {} | Step Time: {:6.2} ms | Elapsed: {:.2} s",
                step + 1,
                total_steps,
                sim.leader_count(),
                step_duration.as_secs_f64() * 1000.0,
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = current_time;

            if is_record_step || is_last_step {
                sim.record_snapshot();
            }
        }
    }

    let total_duration = start_time.elapsed();
    info!(
        "Simulation finished in {:.3} seconds ({:.3} minutes).",
        total_duration.as_secs_f64(),
        total_duration.as_secs_f64() / 60.0
    );

    // --- Save Recorded Data ---
    if sim.config().output.save_stats {
        let output_format = sim.config().output.format.as_deref().unwrap_or("json");
        let base_filename = sim.config().output.base_filename.clone();
        save_snapshots(output_format, &base_filename, sim.recorded_snapshots())?;
    } else {
        info!("Skipping saving snapshots as per config (save_stats is false).");
    }

    // Save the final lattice if requested (separate from full snapshots)
    if sim.config().output.save_opinions {
        let filename = format!("{}_final_opinions.csv", sim.config().output.base_filename);
        save_final_opinions(&sim, &filename)?;
        info!("Final opinions saved to {}", filename);
    } else {
        info!("Skipping saving final opinions as per config.");
    }

    info!("Simulation Complete.");
    Ok(())
}

/// Serializes the recorded snapshots in the configured format. Unknown
/// formats fall back to JSON with an error logged.
fn save_snapshots(format: &str, base_filename: &str, snapshots: &[Snapshot]) -> Result<()> {
    match format {
        "bincode" => {
            // Binary format (much more compact)
            let filename = format!("{}_snapshots.bin", base_filename);
            let file = File::create(&filename)
                .map_err(|e| anyhow::anyhow!("Error creating snapshot file '{}': {}", filename, e))?;
            bincode::serialize_into(file, snapshots)
                .map_err(|e| anyhow::anyhow!("Error serializing snapshots to bincode: {}", e))?;
            info!("All snapshots saved to {} (binary format)", filename);
        }
        "messagepack" => {
            // MessagePack format (compact and cross-platform)
            let filename = format!("{}_snapshots.msgpack", base_filename);
            let mut file = File::create(&filename)
                .map_err(|e| anyhow::anyhow!("Error creating snapshot file '{}': {}", filename, e))?;
            rmp_serde::encode::write(&mut file, snapshots)
                .map_err(|e| anyhow::anyhow!("Error serializing snapshots to MessagePack: {}", e))?;
            info!("All snapshots saved to {} (MessagePack format)", filename);
        }
        other => {
            if other != "json" {
                error!("Unknown output format: {}. Using JSON instead.", other);
            }
            let filename = format!("{}_snapshots.json", base_filename);
            let mut file = File::create(&filename)
                .map_err(|e| anyhow::anyhow!("Error creating snapshot file '{}': {}", filename, e))?;
            let json_string = serde_json::to_string(snapshots)
                .map_err(|e| anyhow::anyhow!("Error serializing snapshots to JSON: {}", e))?;
            file.write_all(json_string.as_bytes())
                .map_err(|e| anyhow::anyhow!("Error writing snapshot JSON to '{}': {}", filename, e))?;
            info!("All snapshots saved to {}", filename);
        }
    }
    Ok(())
}

/// Writes the final per-cell lattice state as CSV.
fn save_final_opinions(sim: &OpinionSimulation, filename: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(filename)
        .map_err(|e| anyhow::anyhow!("Error creating CSV file '{}': {}", filename, e))?;
    writer.write_record(["row", "col", "opinion", "is_cult_leader"])?;
    for row in 0..sim.params().height {
        for col in 0..sim.params().width {
            if let Some(cell) = sim.cell_state(row, col) {
                writer.write_record([
                    row.to_string(),
                    col.to_string(),
                    cell.opinion.to_string(),
                    cell.is_cult_leader.to_string(),
                ])?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}
