//! Propagation Demo - "Watch a Population Settle"
//! ===============================================
//!
//! 30 agents on one opinion axis:
//! - agent 0 is a user who keeps insisting on 0.9
//! - agent 29 is strategic and steers toward 0.1
//! - everyone else follows similarity-weighted averaging
//!
//! Run:
//! ```bash
//! cargo run --example propagation_demo -p opinion_core
//! ```

use opinion_core::{
    AgentSeed, ColorScale, ConnectivityStrategy, InvariantReport, Network, NetworkConfig, OpinionStats,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Opinion Propagation Demo");
    println!("========================\n");

    let config = NetworkConfig::new(30, 1)
        .with_alpha_filter(0.8)
        .with_connectivity(ConnectivityStrategy::hybrid())
        .with_users(vec![AgentSeed::with_opinion(vec![0.9])], 0.9)
        .with_strategic(vec![AgentSeed::with_opinion(vec![0.1])], 7.0);
    let mut network = Network::new(config, 2024)?;

    for step in 0..20 {
        if step % 5 == 0 {
            network.add_user_opinion(&[0.9], 0)?;
        }
        let state = network.update_network(true);

        let report = InvariantReport::check(&network);
        if !report.passes() {
            return Err(report.to_string().into());
        }

        let stats = OpinionStats::compute(&state.opinions, &state.adjacency);
        let scale = ColorScale::compute(&state.opinions, network.roles());
        println!(
            "step {:>2}  mean {:.3}  std {:.3}  extreme {:>5.1}%  degree {:.1}  scale [{:.2}, {:.2}]",
            state.time_step,
            stats.mean[0],
            stats.std_dev[0],
            stats.extreme_fraction * 100.0,
            stats.mean_degree,
            scale.min,
            scale.max,
        );
    }

    let final_stats = OpinionStats::compute(network.opinions(), network.adjacency());
    println!("\nFinal statistics:\n{}", serde_json::to_string_pretty(&final_stats)?);
    Ok(())
}
